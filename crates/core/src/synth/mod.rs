use std::{f64::consts::TAU, path::Path};

use crate::{
    audio::{frames_for_duration, AudioBuffer, PcmBuffer, SAMPLE_RATE},
    config::{AudioConfig, SynthesisMode, Waveform},
    mapping, PixelEvent, Result, ScanDocument,
};

/// Shortest note any pixel produces, in seconds.
const MIN_NOTE_SECONDS: f64 = 0.01;
/// Headroom applied to the single oscillator in brightness mode.
const BRIGHTNESS_GAIN: f64 = 0.7;
/// Weight of each colour oscillator in RGB instrument mode.
const RGB_GAIN: f64 = 0.33;

/// One sample of `waveform` at `frequency`, `index` samples after onset.
pub fn oscillator(waveform: Waveform, frequency: f64, index: usize, sample_rate: u32) -> f64 {
    let cycles = frequency * (index as f64 / f64::from(sample_rate));
    match waveform {
        Waveform::Sine => (TAU * cycles).sin(),
        Waveform::Square => {
            if (TAU * cycles).sin() > 0.0 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Sawtooth => 2.0 * ((cycles + 0.5).fract() - 0.5),
    }
}

/// Renders scan documents into stereo PCM.
#[derive(Debug, Clone)]
pub struct WaveformSynthesizer {
    config: AudioConfig,
    sample_rate: u32,
}

impl WaveformSynthesizer {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            sample_rate: SAMPLE_RATE,
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length of every rendered segment, independent of image content.
    pub fn segment_len(&self) -> usize {
        frames_for_duration(self.config.duration_per_image, self.sample_rate)
    }

    /// Sums every event of `document` into an unnormalized buffer.
    pub fn render(&self, document: &ScanDocument) -> AudioBuffer {
        let total = self.segment_len();
        let mut buffer = AudioBuffer::silent(total, self.sample_rate);

        for column in &document.columns {
            let start =
                (f64::from(column.index) / f64::from(document.width) * total as f64).floor() as usize;
            for event in &column.events {
                let frequency =
                    mapping::row_frequency(event.row, document.height, self.config.scale);
                let wave = self.note(event, frequency);
                let (left, right) = mapping::row_pan(event.row, document.height);
                buffer.mix_in(start, &wave, [left as f32, right as f32]);
            }
        }

        buffer
    }

    /// Renders and finalizes `document` into 16-bit PCM.
    pub fn synthesize(&self, document: &ScanDocument) -> PcmBuffer {
        self.render(document).finalize()
    }

    pub fn synthesize_to_file(&self, document: &ScanDocument, path: impl AsRef<Path>) -> Result<()> {
        self.synthesize(document).write_wav(path)
    }

    /// Number of samples a pixel of the given brightness sounds for.
    pub fn note_len(&self, brightness: u8) -> usize {
        let seconds =
            MIN_NOTE_SECONDS + f64::from(brightness) / 255.0 * self.config.duration_per_image;
        frames_for_duration(seconds, self.sample_rate)
    }

    fn note(&self, event: &PixelEvent, frequency: f64) -> Vec<f32> {
        let len = self.note_len(event.brightness);
        let waveform = self.config.waveform;
        let rate = self.sample_rate;

        match self.config.mode {
            SynthesisMode::Brightness => {
                let gain = f64::from(event.brightness) / 255.0 * BRIGHTNESS_GAIN;
                (0..len)
                    .map(|i| (gain * oscillator(waveform, frequency, i, rate)) as f32)
                    .collect()
            }
            SynthesisMode::RgbInstrument => {
                let [r, g, b] = event.color.map(|c| f64::from(c) / 255.0 * RGB_GAIN);
                (0..len)
                    .map(|i| {
                        let base = r * oscillator(waveform, frequency, i, rate);
                        let octave = g * oscillator(Waveform::Sine, frequency * 2.0, i, rate);
                        let fifth = b * oscillator(Waveform::Sine, frequency * 1.5, i, rate);
                        (base + octave + fifth) as f32
                    })
                    .collect()
            }
        }
    }
}
