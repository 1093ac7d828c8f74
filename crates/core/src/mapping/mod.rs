//! Routing of pixel attributes (row, brightness, colour) to musical
//! parameters shared by the waveform and MIDI synthesizers.

use crate::config::Scale;

/// Reference pitch of scale degree zero, octave zero.
pub const BASE_FREQUENCY: f64 = 220.0;
/// Number of octaves a quantized scale spans from the bottom to the top row.
pub const SCALE_OCTAVES: usize = 4;

const RAW_MIN_FREQUENCY: f64 = 80.0;
const RAW_SPAN: f64 = 1420.0;

const PENTATONIC: &[u8] = &[0, 2, 4, 7, 9];
const MAJOR: &[u8] = &[0, 2, 4, 5, 7, 9, 11];
const MINOR: &[u8] = &[0, 2, 3, 5, 7, 8, 10];

impl Scale {
    /// Semitone offsets within one octave, or `None` for the unquantized scale.
    pub fn degrees(self) -> Option<&'static [u8]> {
        match self {
            Scale::Raw => None,
            Scale::Pentatonic => Some(PENTATONIC),
            Scale::Major => Some(MAJOR),
            Scale::Minor => Some(MINOR),
        }
    }
}

/// Height-relative position of a row, 1.0 at the top edge and approaching 0
/// at the bottom.
pub fn elevation(row: u32, height: u32) -> f64 {
    let height = f64::from(height);
    (height - f64::from(row)) / height
}

/// Frequency of the `note_index`-th step of a scale, counting upward from
/// [`BASE_FREQUENCY`] and wrapping into higher octaves.
pub fn scale_frequency(note_index: usize, degrees: &[u8]) -> f64 {
    let notes = degrees.len();
    let octave = note_index / notes;
    let degree = usize::from(degrees[note_index % notes]);
    let semitones = (12 * octave + degree) as f64;
    BASE_FREQUENCY * 2f64.powf(semitones / 12.0)
}

/// Pitch in Hz for an event at `row`. Higher rows sound higher.
pub fn row_frequency(row: u32, height: u32, scale: Scale) -> f64 {
    let position = elevation(row, height);
    match scale.degrees() {
        None => RAW_MIN_FREQUENCY + position * RAW_SPAN,
        Some(degrees) => {
            let note_range = degrees.len() * SCALE_OCTAVES;
            let note_index = (position * note_range as f64).floor() as usize;
            scale_frequency(note_index, degrees)
        }
    }
}

/// Left and right gains. Events near the top pan right, near the bottom pan left.
pub fn row_pan(row: u32, height: u32) -> (f64, f64) {
    let pan = elevation(row, height);
    (1.0 - pan, pan)
}

/// MIDI note number for a row; row 0 maps to 127.
pub fn row_midi_pitch(row: u32, height: u32) -> u8 {
    let fraction = f64::from(row) / f64::from(height);
    let offset = (fraction * 127.0).floor().clamp(0.0, 127.0) as u8;
    127 - offset
}

/// Scales an 8-bit brightness to a 7-bit MIDI value.
pub fn brightness_velocity(brightness: u8) -> u8 {
    let value = (f64::from(brightness) / 255.0 * 127.0).round();
    value.min(127.0) as u8
}

/// HSL saturation in `[0, 1]`. Achromatic pixels have zero saturation.
pub fn saturation(rgb: [u8; 3]) -> f64 {
    let [r, g, b] = rgb.map(|c| f64::from(c) / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == min {
        return 0.0;
    }
    let denominator = 1.0 - (max + min - 1.0).abs();
    if denominator <= f64::EPSILON {
        return 0.0;
    }
    ((max - min) / denominator).clamp(0.0, 1.0)
}

/// Index of the largest colour component; ties go to the first maximum.
pub fn dominant_component(rgb: [u8; 3]) -> usize {
    let mut best = 0;
    for index in 1..3 {
        if rgb[index] > rgb[best] {
            best = index;
        }
    }
    best
}
