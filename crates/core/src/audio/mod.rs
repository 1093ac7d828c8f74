use std::path::Path;

use crate::{Result, SonifyError};

/// Sample rate of every rendered segment and of the final composition.
pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS: u16 = 2;

/// Number of frames needed for `seconds` of audio at `sample_rate`.
pub fn frames_for_duration(seconds: f64, sample_rate: u32) -> usize {
    (seconds * f64::from(sample_rate)).round().max(0.0) as usize
}

/// Floating point stereo accumulator. Rendered notes are summed into it and
/// it is turned into 16-bit PCM exactly once by [`AudioBuffer::finalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    frames: Vec<[f32; 2]>,
}

impl AudioBuffer {
    /// Creates a silent buffer of fixed length.
    pub fn silent(len: usize, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frames: vec![[0.0; 2]; len],
        }
    }

    pub fn with_duration(seconds: f64, sample_rate: u32) -> Self {
        Self::silent(frames_for_duration(seconds, sample_rate), sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[[f32; 2]] {
        &self.frames
    }

    /// Adds a mono wave into both channels starting at `start`, weighted by
    /// the per-channel gains. Anything past the end of the buffer is dropped.
    pub fn mix_in(&mut self, start: usize, wave: &[f32], gains: [f32; 2]) {
        if start >= self.frames.len() {
            return;
        }
        let end = (start + wave.len()).min(self.frames.len());
        for (frame, sample) in self.frames[start..end].iter_mut().zip(wave) {
            frame[0] += sample * gains[0];
            frame[1] += sample * gains[1];
        }
    }

    /// Largest absolute sample value across both channels.
    pub fn peak(&self) -> f32 {
        self.frames
            .iter()
            .flat_map(|frame| frame.iter())
            .fold(0.0_f32, |peak, sample| peak.max(sample.abs()))
    }

    /// Scales the buffer so its peak sits at full scale. Silent buffers are
    /// left untouched.
    pub fn normalize(&mut self) {
        let peak = self.peak();
        if peak > 0.0 {
            for frame in &mut self.frames {
                frame[0] /= peak;
                frame[1] /= peak;
            }
        }
    }

    /// Normalizes and truncates to signed 16-bit samples.
    pub fn finalize(mut self) -> PcmBuffer {
        self.normalize();
        let frames = self
            .frames
            .iter()
            .map(|frame| frame.map(|sample| (sample * f32::from(i16::MAX)) as i16))
            .collect();
        PcmBuffer {
            sample_rate: self.sample_rate,
            frames,
        }
    }
}

/// Finalized stereo 16-bit audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    sample_rate: u32,
    frames: Vec<[i16; 2]>,
}

impl PcmBuffer {
    pub fn new(sample_rate: u32, frames: Vec<[i16; 2]>) -> Self {
        Self {
            sample_rate,
            frames,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> &[[i16; 2]] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames.len() as f64 / f64::from(self.sample_rate)
    }

    /// Appends `other` along the time axis. Callers check sample rates.
    pub fn append(&mut self, other: &PcmBuffer) {
        self.frames.extend_from_slice(&other.frames);
    }

    /// Writes a 16-bit stereo WAV file, creating parent directories.
    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let spec = hound::WavSpec {
            channels: CHANNELS,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for frame in &self.frames {
            writer.write_sample(frame[0])?;
            writer.write_sample(frame[1])?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Reads a 16-bit integer WAV file. Mono input is duplicated into both
    /// channels.
    pub fn read_wav(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(SonifyError::msg(format!(
                "{} is not 16-bit integer PCM",
                path.display()
            )));
        }

        let samples = reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let frames = match spec.channels {
            1 => samples.iter().map(|&s| [s, s]).collect(),
            2 => samples
                .chunks_exact(2)
                .map(|pair| [pair[0], pair[1]])
                .collect(),
            channels => {
                return Err(SonifyError::msg(format!(
                    "{} has {channels} channels, expected mono or stereo",
                    path.display()
                )))
            }
        };

        Ok(Self {
            sample_rate: spec.sample_rate,
            frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn length_is_rounded_duration() {
        assert_eq!(AudioBuffer::with_duration(1.0, SAMPLE_RATE).len(), 44_100);
        assert_eq!(AudioBuffer::with_duration(0.5, SAMPLE_RATE).len(), 22_050);
        assert_eq!(frames_for_duration(0.00001, SAMPLE_RATE), 0);
        assert_eq!(frames_for_duration(0.0000115, SAMPLE_RATE), 1);
    }

    #[test]
    fn mixing_sums_and_clips_to_buffer_length() {
        let mut buffer = AudioBuffer::silent(4, SAMPLE_RATE);
        buffer.mix_in(2, &[1.0, 1.0, 1.0], [0.25, 0.75]);
        buffer.mix_in(3, &[1.0], [1.0, 1.0]);

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.frames()[1], [0.0, 0.0]);
        assert_eq!(buffer.frames()[2], [0.25, 0.75]);
        assert_eq!(buffer.frames()[3], [1.25, 1.75]);

        buffer.mix_in(10, &[1.0], [1.0, 1.0]);
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn normalization_reaches_full_scale() {
        let mut buffer = AudioBuffer::silent(3, SAMPLE_RATE);
        buffer.mix_in(0, &[0.1, -0.4, 0.2], [1.0, 0.5]);
        buffer.normalize();
        assert_relative_eq!(buffer.peak(), 1.0);
        assert_relative_eq!(buffer.frames()[1][0], -1.0);
    }

    #[test]
    fn silent_buffers_survive_normalization() {
        let mut buffer = AudioBuffer::silent(16, SAMPLE_RATE);
        buffer.normalize();
        assert!(buffer.frames().iter().all(|f| *f == [0.0, 0.0]));

        let pcm = buffer.finalize();
        assert_eq!(pcm.len(), 16);
        assert!(pcm.frames().iter().all(|f| *f == [0, 0]));
    }

    #[test]
    fn finalize_truncates_to_i16() {
        let mut buffer = AudioBuffer::silent(2, SAMPLE_RATE);
        buffer.mix_in(0, &[0.5, -1.0], [1.0, 0.0]);
        let pcm = buffer.finalize();
        assert_eq!(pcm.frames()[0], [16_383, 0]);
        assert_eq!(pcm.frames()[1], [-32_767, 0]);
    }

    #[test]
    fn wav_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("segment.wav");
        let pcm = PcmBuffer::new(SAMPLE_RATE, vec![[1, -1], [300, -300], [i16::MAX, i16::MIN]]);

        pcm.write_wav(&path).unwrap();
        let loaded = PcmBuffer::read_wav(&path).unwrap();
        assert_eq!(loaded, pcm);
    }

    #[test]
    fn mono_wav_files_are_widened_to_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(7_i16).unwrap();
        writer.finalize().unwrap();

        let loaded = PcmBuffer::read_wav(&path).unwrap();
        assert_eq!(loaded.sample_rate(), 22_050);
        assert_eq!(loaded.frames(), &[[7, 7]]);
    }
}
