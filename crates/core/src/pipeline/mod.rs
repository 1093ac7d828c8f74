//! Batch orchestration: scan every image, render every document on a worker
//! pool, then compose the rendered segments into one track.
//!
//! The scan phase and the synthesis phase only communicate through scan
//! documents on disk, so each phase can also be driven on its own.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::{
    assets::{artifact_path, list_inputs, ArtifactStore, SegmentKind},
    compose::Composer,
    config::SonifyConfig,
    midi::MidiSynthesizer,
    scan::Scanner,
    synth::WaveformSynthesizer,
    Result, ScanDocument, SonifyError,
};

/// Phases of a run, in order. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Synthesizing,
    Composing,
    Completed,
    Failed,
}

/// What a run produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// One composed WAV file at the given path.
    Audio(PathBuf),
    /// One MIDI file per image, stored next to the given path.
    Midi(PathBuf),
}

impl OutputTarget {
    pub fn path(&self) -> &Path {
        match self {
            OutputTarget::Audio(path) | OutputTarget::Midi(path) => path,
        }
    }

    pub fn segment_kind(&self) -> SegmentKind {
        match self {
            OutputTarget::Audio(_) => SegmentKind::Wav,
            OutputTarget::Midi(_) => SegmentKind::Midi,
        }
    }
}

/// A single input that could not be processed.
#[derive(Debug)]
pub struct ItemFailure {
    pub path: PathBuf,
    pub error: SonifyError,
}

/// Result of the scan phase: persisted documents in input order plus the
/// images that failed.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub documents: Vec<PathBuf>,
    pub failures: Vec<ItemFailure>,
}

/// Result of the synthesis phase, in submission order.
#[derive(Debug, Default)]
pub struct SynthesisOutcome {
    pub segments: Vec<PathBuf>,
    pub failures: Vec<ItemFailure>,
}

impl SynthesisOutcome {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub phase: Phase,
    pub store: PathBuf,
    pub scan: ScanOutcome,
    pub synthesis: SynthesisOutcome,
    /// Path of the composed track, audio mode only.
    pub composed: Option<PathBuf>,
    /// Segments left out of the composition because of a sample-rate mismatch.
    pub skipped_segments: Vec<PathBuf>,
    pub compose_error: Option<SonifyError>,
}

impl RunReport {
    fn new(store: &Path) -> Self {
        Self {
            phase: Phase::Scanning,
            store: store.to_path_buf(),
            scan: ScanOutcome::default(),
            synthesis: SynthesisOutcome::default(),
            composed: None,
            skipped_segments: Vec::new(),
            compose_error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.phase == Phase::Completed
    }
}

/// Drives the scanner, synthesizers and composer over a batch of images.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: SonifyConfig,
}

impl Orchestrator {
    /// Validates `config` before any work is done.
    pub fn new(config: SonifyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SonifyConfig {
        &self.config
    }

    /// Runs all phases over the images of `input_dir`.
    ///
    /// Errors are returned only for problems found before any image is
    /// processed. Per-item failures are collected in the report.
    pub fn run(&self, input_dir: &Path, target: &OutputTarget) -> Result<RunReport> {
        let inputs = list_inputs(input_dir)?;
        let store = ArtifactStore::for_output(target.path(), target.segment_kind());
        store.prepare()?;
        tracing::info!(store = %store.root().display(), "intermediate files");

        let mut report = RunReport::new(store.root());

        tracing::info!(images = inputs.len(), "phase 1: scanning");
        report.scan = self.scan_phase(&inputs, &store.documents_dir());

        report.phase = Phase::Synthesizing;
        tracing::info!(documents = report.scan.documents.len(), "phase 2: synthesizing");
        report.synthesis =
            self.synthesis_phase(&report.scan.documents, &store.segments_dir(), store.kind())?;

        if !report.synthesis.succeeded() {
            tracing::error!(
                failed = report.synthesis.failures.len(),
                "synthesis failed, skipping composition"
            );
            report.phase = Phase::Failed;
            return Ok(report);
        }

        let output = match target {
            OutputTarget::Midi(_) => {
                report.phase = Phase::Completed;
                tracing::info!(files = report.synthesis.segments.len(), "midi files written");
                return Ok(report);
            }
            OutputTarget::Audio(output) => output,
        };

        report.phase = Phase::Composing;
        tracing::info!(segments = report.synthesis.segments.len(), "phase 3: composing");
        match Composer::new().compose_files(&report.synthesis.segments, output) {
            Ok(composition) => {
                report.composed = Some(output.clone());
                report.skipped_segments = composition.skipped;
                report.phase = Phase::Completed;
            }
            Err(err) => {
                tracing::error!("composition failed: {err}");
                report.compose_error = Some(err);
                report.phase = Phase::Failed;
            }
        }

        Ok(report)
    }

    /// Scans `inputs` one at a time in the given order, persisting each
    /// document into `documents_dir` before moving on. Unreadable images are
    /// recorded and skipped.
    pub fn scan_phase(&self, inputs: &[PathBuf], documents_dir: &Path) -> ScanOutcome {
        let scanner = Scanner::new(self.config.threshold);
        let total = inputs.len();
        let mut outcome = ScanOutcome::default();

        for (index, input) in inputs.iter().enumerate() {
            let destination = artifact_path(documents_dir, input, "json");
            let result = scanner
                .scan_path(input)
                .and_then(|document| document.save(&destination));
            match result {
                Ok(()) => {
                    tracing::info!(
                        progress = %format!("{}/{total}", index + 1),
                        file = %input.display(),
                        "scanned"
                    );
                    outcome.documents.push(destination);
                }
                Err(error) => {
                    tracing::warn!(file = %input.display(), "scan failed: {error}");
                    outcome.failures.push(ItemFailure {
                        path: input.clone(),
                        error,
                    });
                }
            }
        }

        outcome
    }

    /// Renders every document on a worker pool, writing `<stem>.<ext>` into
    /// `segments_dir`. All tasks run to completion; results are reported in
    /// submission order regardless of completion order.
    pub fn synthesis_phase(
        &self,
        documents: &[PathBuf],
        segments_dir: &Path,
        kind: SegmentKind,
    ) -> Result<SynthesisOutcome> {
        let pool = build_thread_pool(self.config.workers)?;
        let results: Vec<Result<PathBuf>> = pool.install(|| {
            documents
                .par_iter()
                .map(|document| self.render_segment(document, segments_dir, kind))
                .collect()
        });

        let total = documents.len();
        let mut outcome = SynthesisOutcome::default();
        for (index, (document, result)) in documents.iter().zip(results).enumerate() {
            match result {
                Ok(segment) => {
                    tracing::info!(
                        progress = %format!("{}/{total}", index + 1),
                        file = %segment.display(),
                        "synthesized"
                    );
                    outcome.segments.push(segment);
                }
                Err(error) => {
                    tracing::warn!("{error}");
                    outcome.failures.push(ItemFailure {
                        path: document.clone(),
                        error,
                    });
                }
            }
        }

        Ok(outcome)
    }

    fn render_segment(&self, document: &Path, segments_dir: &Path, kind: SegmentKind) -> Result<PathBuf> {
        let destination = artifact_path(segments_dir, document, kind.extension());
        let rendered = ScanDocument::load(document).and_then(|scan| match kind {
            SegmentKind::Wav => WaveformSynthesizer::new(self.config.audio.clone())
                .synthesize_to_file(&scan, &destination),
            SegmentKind::Midi => {
                MidiSynthesizer::new(self.config.midi.clone()).synthesize_to_file(&scan, &destination)
            }
        });

        rendered
            .map(|()| destination)
            .map_err(|err| SonifyError::Synthesis {
                path: document.to_path_buf(),
                reason: err.to_string(),
            })
    }
}

fn build_thread_pool(workers: Option<usize>) -> Result<rayon::ThreadPool> {
    if workers == Some(0) {
        return Err(SonifyError::config("workers must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = workers {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| SonifyError::msg(format!("failed to build worker pool: {e}")))
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::audio::{frames_for_duration, PcmBuffer, SAMPLE_RATE};

    fn test_config() -> SonifyConfig {
        let mut config = SonifyConfig::default();
        config.audio.duration_per_image = 0.05;
        config.workers = Some(2);
        config
    }

    fn write_image(dir: &Path, name: &str, value: u8) {
        RgbImage::from_fn(4, 3, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([value, value / 2, 255 - value])
            } else {
                Rgb([0, 0, 0])
            }
        })
        .save(dir.join(name))
        .unwrap();
    }

    fn batch(dir: &Path) -> PathBuf {
        let input = dir.join("frames");
        std::fs::create_dir_all(&input).unwrap();
        write_image(&input, "01.png", 200);
        std::fs::write(input.join("02.png"), b"garbage").unwrap();
        write_image(&input, "03.png", 90);
        input
    }

    #[test]
    fn rejects_invalid_configuration_up_front() {
        let mut config = test_config();
        config.audio.duration_per_image = -1.0;
        assert!(Orchestrator::new(config).is_err());
    }

    #[test]
    fn decode_failures_do_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let input = batch(dir.path());
        let output = dir.path().join("out").join("piece.wav");

        let report = Orchestrator::new(test_config())
            .unwrap()
            .run(&input, &OutputTarget::Audio(output.clone()))
            .unwrap();

        assert_eq!(report.phase, Phase::Completed);
        assert_eq!(report.scan.failures.len(), 1);
        let failure = &report.scan.failures[0];
        assert!(failure.path.ends_with("02.png"));
        assert!(matches!(failure.error, SonifyError::Decode { .. }));
        assert!(failure.error.to_string().contains("02.png"));

        let stems: Vec<_> = report
            .synthesis
            .segments
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(stems, vec!["01.wav", "03.wav"]);

        let composed = PcmBuffer::read_wav(&output).unwrap();
        assert_eq!(composed.sample_rate(), SAMPLE_RATE);
        assert_eq!(composed.len(), 2 * frames_for_duration(0.05, SAMPLE_RATE));
        assert_eq!(report.composed.as_deref(), Some(output.as_path()));
    }

    #[test]
    fn synthesis_failures_skip_composition() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("frames");
        std::fs::create_dir_all(&input).unwrap();
        write_image(&input, "a.png", 250);
        write_image(&input, "b.png", 120);

        let output = dir.path().join("piece.wav");
        let store = ArtifactStore::for_output(&output, SegmentKind::Wav);
        // a directory squatting on b's segment path makes its task fail
        std::fs::create_dir_all(store.segment_path(Path::new("b.png"))).unwrap();

        let report = Orchestrator::new(test_config())
            .unwrap()
            .run(&input, &OutputTarget::Audio(output.clone()))
            .unwrap();

        assert_eq!(report.phase, Phase::Failed);
        assert_eq!(report.synthesis.segments.len(), 1);
        assert_eq!(report.synthesis.failures.len(), 1);
        assert!(matches!(
            report.synthesis.failures[0].error,
            SonifyError::Synthesis { .. }
        ));
        assert!(report.synthesis.failures[0].path.ends_with("b.json"));
        assert!(report.composed.is_none());
        assert!(!output.exists());
    }

    #[test]
    fn midi_runs_write_one_file_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let input = batch(dir.path());
        let output = dir.path().join("piece.mid");

        let report = Orchestrator::new(test_config())
            .unwrap()
            .run(&input, &OutputTarget::Midi(output.clone()))
            .unwrap();

        assert!(report.is_success());
        assert!(report.composed.is_none());
        assert_eq!(report.synthesis.segments.len(), 2);
        for segment in &report.synthesis.segments {
            assert_eq!(segment.extension().unwrap(), "mid");
            let bytes = std::fs::read(segment).unwrap();
            assert!(midly::Smf::parse(&bytes).is_ok());
        }
        assert!(!output.exists());
    }

    #[test]
    fn reruns_reuse_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("frames");
        std::fs::create_dir_all(&input).unwrap();
        write_image(&input, "only.png", 180);
        let output = dir.path().join("piece.wav");

        let orchestrator = Orchestrator::new(test_config()).unwrap();
        let first = orchestrator
            .run(&input, &OutputTarget::Audio(output.clone()))
            .unwrap();
        let second = orchestrator
            .run(&input, &OutputTarget::Audio(output.clone()))
            .unwrap();

        assert!(first.is_success() && second.is_success());
        assert_eq!(first.synthesis.segments, second.synthesis.segments);
    }

    #[test]
    fn all_images_unreadable_fails_at_composition() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("frames");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("x.png"), b"nope").unwrap();
        let output = dir.path().join("piece.wav");

        let report = Orchestrator::new(test_config())
            .unwrap()
            .run(&input, &OutputTarget::Audio(output.clone()))
            .unwrap();

        assert_eq!(report.phase, Phase::Failed);
        assert!(matches!(
            report.compose_error,
            Some(SonifyError::EmptyInput(_))
        ));
        assert!(!output.exists());
    }

    #[test]
    fn synthesis_results_follow_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        let names = ["d.json", "a.json", "c.json", "b.json"];
        for name in names {
            ScanDocument {
                width: 1,
                height: 1,
                columns: Vec::new(),
            }
            .save(docs.join(name))
            .unwrap();
        }
        let documents: Vec<PathBuf> = names.iter().map(|n| docs.join(n)).collect();

        let mut config = test_config();
        config.workers = Some(4);
        let outcome = Orchestrator::new(config)
            .unwrap()
            .synthesis_phase(&documents, &dir.path().join("segments"), SegmentKind::Midi)
            .unwrap();

        let order: Vec<_> = outcome
            .segments
            .iter()
            .map(|p| p.file_stem().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(order, vec!["d", "a", "c", "b"]);
    }
}
