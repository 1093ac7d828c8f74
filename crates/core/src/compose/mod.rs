use std::path::{Path, PathBuf};

use crate::{assets::sorted_files_with_extension, audio::PcmBuffer, Result, SonifyError};

/// Outcome of a composition: the concatenated audio plus the inputs that were
/// used and skipped.
#[derive(Debug, Clone)]
pub struct Composition {
    pub pcm: PcmBuffer,
    pub used: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Concatenates per-image segments into one track.
#[derive(Debug, Default, Clone, Copy)]
pub struct Composer;

impl Composer {
    pub fn new() -> Self {
        Self
    }

    /// Joins `segments` in the given order. The first segment's sample rate
    /// is authoritative; segments at any other rate are skipped with a warning.
    pub fn compose<I>(&self, segments: I) -> Result<Composition>
    where
        I: IntoIterator<Item = (PathBuf, PcmBuffer)>,
    {
        let mut output: Option<PcmBuffer> = None;
        let mut used = Vec::new();
        let mut skipped = Vec::new();

        for (source, segment) in segments {
            match output.as_mut() {
                None => output = Some(segment),
                Some(pcm) if pcm.sample_rate() == segment.sample_rate() => pcm.append(&segment),
                Some(pcm) => {
                    let err = SonifyError::SampleRateMismatch {
                        path: source.clone(),
                        expected: pcm.sample_rate(),
                        found: segment.sample_rate(),
                    };
                    tracing::warn!("skipping segment: {err}");
                    skipped.push(source);
                    continue;
                }
            }
            used.push(source);
        }

        let pcm = output
            .ok_or_else(|| SonifyError::EmptyInput("no audio segments to compose".to_string()))?;
        Ok(Composition { pcm, used, skipped })
    }

    /// Convenience wrapper for in-memory buffers without source names.
    pub fn compose_buffers(&self, buffers: Vec<PcmBuffer>) -> Result<PcmBuffer> {
        let named = buffers
            .into_iter()
            .enumerate()
            .map(|(index, pcm)| (PathBuf::from(format!("segment #{index}")), pcm));
        Ok(self.compose(named)?.pcm)
    }

    /// Reads every `.wav` file of `input_dir` in file-name order, composes
    /// them and writes the result to `output`.
    pub fn compose_dir(&self, input_dir: &Path, output: &Path) -> Result<Composition> {
        let files = sorted_files_with_extension(input_dir, "wav")?;
        if files.is_empty() {
            return Err(SonifyError::EmptyInput(format!(
                "no .wav files in {}",
                input_dir.display()
            )));
        }
        self.compose_files(&files, output)
    }

    /// Reads the WAV `files` in the given order, composes them and writes the
    /// result to `output`. Nothing is written when no segment qualifies.
    pub fn compose_files(&self, files: &[PathBuf], output: &Path) -> Result<Composition> {
        tracing::info!(count = files.len(), "composing segments");
        let mut segments = Vec::with_capacity(files.len());
        for file in files {
            let pcm = PcmBuffer::read_wav(file)
                .map_err(|err| SonifyError::msg(format!("{}: {err}", file.display())))?;
            segments.push((file.clone(), pcm));
        }

        let composition = self.compose(segments)?;
        composition.pcm.write_wav(output)?;
        tracing::info!(
            output = %output.display(),
            segments = composition.used.len(),
            skipped = composition.skipped.len(),
            seconds = composition.pcm.duration_seconds(),
            "composition written"
        );
        Ok(composition)
    }
}
