use std::{fmt, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Result, SonifyError};

/// Luma threshold used by the scanner unless configured otherwise.
pub const DEFAULT_THRESHOLD: u8 = 20;

/// Top-level configuration structure for a sonification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SonifyConfig {
    /// Pixels are kept only when their luma is strictly above this value.
    pub threshold: u8,
    /// Size of the synthesis worker pool. `None` uses available parallelism.
    pub workers: Option<usize>,
    pub audio: AudioConfig,
    pub midi: MidiConfig,
}

impl Default for SonifyConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            workers: None,
            audio: AudioConfig::default(),
            midi: MidiConfig::default(),
        }
    }
}

impl SonifyConfig {
    /// Loads a JSON preset. Missing fields fall back to their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot produce a valid run. Called once
    /// before any image is touched.
    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.midi.validate()?;
        if self.workers == Some(0) {
            return Err(SonifyError::config("workers must be >= 1 when set"));
        }
        Ok(())
    }
}

/// Parameters of the waveform synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Length in seconds of the segment rendered for every image.
    pub duration_per_image: f64,
    pub scale: Scale,
    pub mode: SynthesisMode,
    pub waveform: Waveform,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_per_image: 10.0,
            scale: Scale::Pentatonic,
            mode: SynthesisMode::RgbInstrument,
            waveform: Waveform::Sine,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        let duration = self.duration_per_image;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(SonifyError::config(format!(
                "duration_per_image must be a positive number of seconds, got {duration}"
            )));
        }
        Ok(())
    }
}

/// Parameters of the MIDI synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// One-based MIDI channel for red-dominant pixels.
    pub channel_r: u8,
    pub channel_g: u8,
    pub channel_b: u8,
    pub velocity: VelocityPolicy,
    pub cc: CcPolicy,
    pub pitch_bend: PitchBendPolicy,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            channel_r: 1,
            channel_g: 2,
            channel_b: 3,
            velocity: VelocityPolicy::Brightness,
            cc: CcPolicy::Saturation,
            pitch_bend: PitchBendPolicy::BrightnessChange,
        }
    }
}

impl MidiConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, channel) in [
            ("channel_r", self.channel_r),
            ("channel_g", self.channel_g),
            ("channel_b", self.channel_b),
        ] {
            if !(1..=16).contains(&channel) {
                return Err(SonifyError::config(format!(
                    "{name} must be between 1 and 16, got {channel}"
                )));
            }
        }
        if let VelocityPolicy::Fixed(value) = self.velocity {
            if value > 127 {
                return Err(SonifyError::config(format!(
                    "fixed velocity must be between 0 and 127, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Zero-based channels for red, green and blue.
    pub fn channels(&self) -> [u8; 3] {
        [
            self.channel_r.saturating_sub(1),
            self.channel_g.saturating_sub(1),
            self.channel_b.saturating_sub(1),
        ]
    }
}

/// Musical scale used to quantize row position to pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    /// Continuous 80–1500 Hz mapping without quantization.
    Raw,
    Pentatonic,
    Major,
    Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMode {
    /// A single oscillator whose amplitude follows pixel brightness.
    Brightness,
    /// Three oscillators weighted by the red, green and blue components.
    RgbInstrument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityPolicy {
    Brightness,
    Fixed(u8),
}

/// Source of the per-column modulation wheel (CC#1) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CcPolicy {
    Saturation,
    Brightness,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchBendPolicy {
    BrightnessChange,
    None,
}

fn unknown(axis: &str, value: &str, expected: &str) -> SonifyError {
    SonifyError::config(format!(
        "unknown {axis} `{value}` (expected one of: {expected})"
    ))
}

impl FromStr for Scale {
    type Err = SonifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(Self::Raw),
            "pentatonic" => Ok(Self::Pentatonic),
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            other => Err(unknown("scale", other, "raw, pentatonic, major, minor")),
        }
    }
}

impl FromStr for SynthesisMode {
    type Err = SonifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "brightness" => Ok(Self::Brightness),
            "rgb_instrument" => Ok(Self::RgbInstrument),
            other => Err(unknown("synthesis mode", other, "brightness, rgb_instrument")),
        }
    }
}

impl FromStr for Waveform {
    type Err = SonifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sine" => Ok(Self::Sine),
            "square" => Ok(Self::Square),
            "sawtooth" => Ok(Self::Sawtooth),
            other => Err(unknown("waveform", other, "sine, square, sawtooth")),
        }
    }
}

impl FromStr for VelocityPolicy {
    type Err = SonifyError;

    /// Accepts `brightness`, `fixed:<n>` or `fixed(<n>)`.
    fn from_str(s: &str) -> Result<Self> {
        if s == "brightness" {
            return Ok(Self::Brightness);
        }
        let value = s
            .strip_prefix("fixed:")
            .or_else(|| s.strip_prefix("fixed(").and_then(|v| v.strip_suffix(')')))
            .ok_or_else(|| unknown("velocity policy", s, "brightness, fixed:<0-127>"))?;
        let value: u8 = value
            .trim()
            .parse()
            .map_err(|_| SonifyError::config(format!("invalid fixed velocity `{value}`")))?;
        if value > 127 {
            return Err(SonifyError::config(format!(
                "fixed velocity must be between 0 and 127, got {value}"
            )));
        }
        Ok(Self::Fixed(value))
    }
}

impl FromStr for CcPolicy {
    type Err = SonifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "saturation" => Ok(Self::Saturation),
            "brightness" => Ok(Self::Brightness),
            "none" => Ok(Self::None),
            other => Err(unknown("cc policy", other, "saturation, brightness, none")),
        }
    }
}

impl FromStr for PitchBendPolicy {
    type Err = SonifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "brightness_change" => Ok(Self::BrightnessChange),
            "none" => Ok(Self::None),
            other => Err(unknown("pitch bend policy", other, "brightness_change, none")),
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Pentatonic => "pentatonic",
            Self::Major => "major",
            Self::Minor => "minor",
        })
    }
}

impl fmt::Display for SynthesisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Brightness => "brightness",
            Self::RgbInstrument => "rgb_instrument",
        })
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sine => "sine",
            Self::Square => "square",
            Self::Sawtooth => "sawtooth",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SonifyConfig::default().validate().unwrap();
    }

    #[test]
    fn parses_closed_enumerations() {
        assert_eq!("minor".parse::<Scale>().unwrap(), Scale::Minor);
        assert_eq!(
            "rgb_instrument".parse::<SynthesisMode>().unwrap(),
            SynthesisMode::RgbInstrument
        );
        assert_eq!("sawtooth".parse::<Waveform>().unwrap(), Waveform::Sawtooth);
        assert_eq!("none".parse::<CcPolicy>().unwrap(), CcPolicy::None);
        assert_eq!(
            "brightness_change".parse::<PitchBendPolicy>().unwrap(),
            PitchBendPolicy::BrightnessChange
        );
    }

    #[test]
    fn rejects_unknown_values() {
        let err = "lydian".parse::<Scale>().unwrap_err();
        assert!(err.to_string().contains("lydian"));
        assert!("triangle".parse::<Waveform>().is_err());
    }

    #[test]
    fn parses_fixed_velocity_forms() {
        assert_eq!(
            "fixed:100".parse::<VelocityPolicy>().unwrap(),
            VelocityPolicy::Fixed(100)
        );
        assert_eq!(
            "fixed(64)".parse::<VelocityPolicy>().unwrap(),
            VelocityPolicy::Fixed(64)
        );
        assert!("fixed:128".parse::<VelocityPolicy>().is_err());
        assert!("fixed:loud".parse::<VelocityPolicy>().is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = SonifyConfig::default();
        config.audio.duration_per_image = 0.0;
        assert!(config.validate().is_err());

        let mut config = SonifyConfig::default();
        config.midi.channel_g = 17;
        assert!(config.validate().is_err());

        let mut config = SonifyConfig::default();
        config.workers = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_presets_fill_in_defaults() {
        let config: SonifyConfig =
            serde_json::from_str(r#"{"audio": {"scale": "major"}, "midi": {"velocity": {"fixed": 90}}}"#)
                .unwrap();
        assert_eq!(config.audio.scale, Scale::Major);
        assert_eq!(config.audio.waveform, Waveform::Sine);
        assert_eq!(config.midi.velocity, VelocityPolicy::Fixed(90));
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn maps_channels_to_zero_based() {
        let midi = MidiConfig {
            channel_r: 16,
            ..MidiConfig::default()
        };
        assert_eq!(midi.channels(), [15, 1, 2]);
    }
}
