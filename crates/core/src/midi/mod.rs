//! Rendering of scan documents into a single MIDI track.
//!
//! Every non-empty column advances time by one sixteenth note. Pixels become
//! stacked notes routed to the channel of their dominant colour, optionally
//! preceded by a modulation-wheel value for the column and pitch bends that
//! follow sudden brightness changes on a channel.

use std::path::Path;

use midly::{
    num::{u14, u15, u4, u7},
    Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, TrackEvent, TrackEventKind,
};

use crate::{
    config::{CcPolicy, MidiConfig, PitchBendPolicy, VelocityPolicy},
    mapping, Result, ScanDocument, SonifyError, TimeStepColumn,
};

pub const TICKS_PER_QUARTER: u16 = 480;
/// One column lasts a sixteenth note.
pub const TICKS_PER_COLUMN: u32 = TICKS_PER_QUARTER as u32 / 4;
/// Fixed note-on to note-off distance.
pub const GATE_TICKS: u32 = TICKS_PER_COLUMN / 2;
/// Controller number of the modulation wheel.
pub const MODULATION_CC: u8 = 1;

const BEND_CENTER: i32 = 8192;
const BEND_MAX: i32 = 16383;
const BEND_RANGE: f64 = 4096.0;
const BEND_TRIGGER: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEventKind {
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8, velocity: u8 },
    ControlChange { controller: u8, value: u8 },
    /// 14-bit bend value, 8192 is centre.
    PitchBend { value: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// Ticks since the previous event in the track.
    pub delta: u32,
    /// Zero-based channel.
    pub channel: u8,
    pub kind: MidiEventKind,
}

/// Append-only list of events in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MidiTrack {
    events: Vec<MidiEvent>,
}

impl MidiTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: u32, channel: u8, kind: MidiEventKind) {
        self.events.push(MidiEvent {
            delta,
            channel,
            kind,
        });
    }

    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn total_ticks(&self) -> u64 {
        self.events.iter().map(|e| u64::from(e.delta)).sum()
    }

    /// Serialises the track as a single-track standard MIDI file.
    pub fn to_smf_bytes(&self) -> Result<Vec<u8>> {
        let mut events: Vec<TrackEvent<'static>> = self
            .events
            .iter()
            .map(|event| TrackEvent {
                delta: event.delta.into(),
                kind: TrackEventKind::Midi {
                    channel: u4::from(event.channel),
                    message: to_midly(event.kind),
                },
            })
            .collect();
        events.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let smf = Smf {
            header: Header::new(
                Format::SingleTrack,
                Timing::Metrical(u15::from(TICKS_PER_QUARTER)),
            ),
            tracks: vec![events],
        };

        let mut out = Vec::new();
        smf.write(&mut out)
            .map_err(|e| SonifyError::Midi(format!("failed to encode MIDI: {e}")))?;
        Ok(out)
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_smf_bytes()?)?;
        Ok(())
    }
}

fn to_midly(kind: MidiEventKind) -> MidiMessage {
    match kind {
        MidiEventKind::NoteOn { key, velocity } => MidiMessage::NoteOn {
            key: u7::from(key),
            vel: u7::from(velocity),
        },
        MidiEventKind::NoteOff { key, velocity } => MidiMessage::NoteOff {
            key: u7::from(key),
            vel: u7::from(velocity),
        },
        MidiEventKind::ControlChange { controller, value } => MidiMessage::Controller {
            controller: u7::from(controller),
            value: u7::from(value),
        },
        MidiEventKind::PitchBend { value } => MidiMessage::PitchBend {
            bend: PitchBend(u14::from(value)),
        },
    }
}

/// Bend for a brightness jump from `previous` to `current`, clamped to the
/// 14-bit range.
pub fn brightness_bend(previous: u8, current: u8) -> u16 {
    let change = f64::from(i32::from(current) - i32::from(previous)) / 255.0;
    let bend = (change * BEND_RANGE).round() as i32 + BEND_CENTER;
    bend.clamp(0, BEND_MAX) as u16
}

/// Renders scan documents into MIDI tracks.
#[derive(Debug, Clone)]
pub struct MidiSynthesizer {
    config: MidiConfig,
}

impl MidiSynthesizer {
    pub fn new(config: MidiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MidiConfig {
        &self.config
    }

    pub fn synthesize(&self, document: &ScanDocument) -> MidiTrack {
        let channels = self.config.channels();
        let mut track = MidiTrack::new();
        let mut last_brightness: [Option<u8>; 16] = [None; 16];

        for column in &document.columns {
            if let Some(value) = self.column_modulation(column) {
                track.push(
                    0,
                    channels[0],
                    MidiEventKind::ControlChange {
                        controller: MODULATION_CC,
                        value,
                    },
                );
            }

            for (position, event) in column.events.iter().enumerate() {
                let channel = channels[mapping::dominant_component(event.color)];
                let key = mapping::row_midi_pitch(event.row, document.height);
                let velocity = match self.config.velocity {
                    VelocityPolicy::Brightness => mapping::brightness_velocity(event.brightness),
                    VelocityPolicy::Fixed(value) => value.min(127),
                };

                let slot = &mut last_brightness[usize::from(channel & 0x0f)];
                if self.config.pitch_bend == PitchBendPolicy::BrightnessChange {
                    if let Some(previous) = *slot {
                        let jump = (i32::from(event.brightness) - i32::from(previous)).abs();
                        if jump > BEND_TRIGGER {
                            track.push(
                                0,
                                channel,
                                MidiEventKind::PitchBend {
                                    value: brightness_bend(previous, event.brightness),
                                },
                            );
                        }
                    }
                }
                *slot = Some(event.brightness);

                let onset = if position == 0 { TICKS_PER_COLUMN } else { 0 };
                track.push(onset, channel, MidiEventKind::NoteOn { key, velocity });
                track.push(GATE_TICKS, channel, MidiEventKind::NoteOff { key, velocity });
            }
        }

        track
    }

    pub fn synthesize_to_file(&self, document: &ScanDocument, path: impl AsRef<Path>) -> Result<()> {
        self.synthesize(document).write_file(path)
    }

    /// Mean saturation or brightness of the column scaled to 0–127.
    fn column_modulation(&self, column: &TimeStepColumn) -> Option<u8> {
        if column.events.is_empty() {
            return None;
        }
        let sum: f64 = match self.config.cc {
            CcPolicy::None => return None,
            CcPolicy::Saturation => column
                .events
                .iter()
                .map(|event| mapping::saturation(event.color))
                .sum(),
            CcPolicy::Brightness => column
                .events
                .iter()
                .map(|event| f64::from(event.brightness) / 255.0)
                .sum(),
        };
        let mean = sum / column.events.len() as f64;
        Some((mean * 127.0).round().clamp(0.0, 127.0) as u8)
    }
}
