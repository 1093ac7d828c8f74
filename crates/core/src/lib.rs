//! Core library for the Pixel Sonifier.
//!
//! Images are read column by column: every column is a time step and every
//! sufficiently bright pixel in it becomes a sound event. The crate provides
//! the scanner that extracts those events, a waveform synthesizer and a MIDI
//! synthesizer that render them, a composer that joins per-image audio and an
//! orchestrator that runs the whole batch.

pub mod assets;
pub mod audio;
pub mod compose;
pub mod config;
pub mod document;
pub mod error;
pub mod mapping;
pub mod midi;
pub mod pipeline;
pub mod scan;
pub mod synth;

pub use assets::{list_inputs, ArtifactStore, SegmentKind};
pub use audio::{AudioBuffer, PcmBuffer, SAMPLE_RATE};
pub use compose::{Composer, Composition};
pub use config::{
    AudioConfig, CcPolicy, MidiConfig, PitchBendPolicy, Scale, SonifyConfig, SynthesisMode,
    VelocityPolicy, Waveform,
};
pub use document::{PixelEvent, ScanDocument, TimeStepColumn};
pub use error::{Result, SonifyError};
pub use midi::{MidiEvent, MidiEventKind, MidiSynthesizer, MidiTrack};
pub use pipeline::{ItemFailure, Orchestrator, OutputTarget, Phase, RunReport};
pub use scan::{ImagePlanes, Scanner};
pub use synth::WaveformSynthesizer;
