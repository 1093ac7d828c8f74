use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use pixel_sonifier_core::{
    assets::sorted_files_with_extension, list_inputs, CcPolicy, Composer, Orchestrator,
    OutputTarget, PitchBendPolicy, Scale, SegmentKind, SonifyConfig, SynthesisMode,
    VelocityPolicy, Waveform,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            output,
            midi,
            settings,
        } => run_pipeline(&input, &output, midi, &settings),
        Commands::Scan {
            input,
            output,
            settings,
        } => run_scan(&input, &output, &settings),
        Commands::Synth {
            input,
            output,
            settings,
        } => run_synth(&input, &output, SegmentKind::Wav, &settings),
        Commands::Midi {
            input,
            output,
            settings,
        } => run_synth(&input, &output, SegmentKind::Midi, &settings),
        Commands::Compose { input, output } => run_compose(&input, &output),
    }
}

fn run_pipeline(input: &Path, output: &Path, midi: bool, settings: &Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings.resolve()?)?;
    let target = if midi {
        OutputTarget::Midi(output.to_path_buf())
    } else {
        OutputTarget::Audio(output.to_path_buf())
    };
    tracing::info!(?input, ?target, "running full pipeline");

    let report = orchestrator
        .run(input, &target)
        .with_context(|| format!("cannot process {}", input.display()))?;

    for failure in &report.scan.failures {
        tracing::warn!(file = %failure.path.display(), "skipped: {}", failure.error);
    }
    for skipped in &report.skipped_segments {
        tracing::warn!(file = %skipped.display(), "left out of the composition");
    }
    if !report.is_success() {
        if let Some(err) = &report.compose_error {
            bail!("composition failed: {err}");
        }
        bail!(
            "{} of {} images failed to synthesize",
            report.synthesis.failures.len(),
            report.scan.documents.len()
        );
    }

    match report.composed {
        Some(path) => tracing::info!(output = %path.display(), "pipeline completed"),
        None => tracing::info!(store = %report.store.display(), "pipeline completed"),
    }
    Ok(())
}

fn run_scan(input: &Path, output: &Path, settings: &Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings.resolve()?)?;
    let inputs = if input.is_dir() {
        list_inputs(input)?
    } else {
        vec![input.to_path_buf()]
    };

    let outcome = orchestrator.scan_phase(&inputs, output);
    tracing::info!(
        documents = outcome.documents.len(),
        failed = outcome.failures.len(),
        "scan completed"
    );
    Ok(())
}

fn run_synth(input: &Path, output: &Path, kind: SegmentKind, settings: &Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings.resolve()?)?;
    let documents = if input.is_dir() {
        sorted_files_with_extension(input, "json")?
    } else {
        vec![input.to_path_buf()]
    };
    if documents.is_empty() {
        bail!("no .json files in {}", input.display());
    }

    let outcome = orchestrator.synthesis_phase(&documents, output, kind)?;
    if !outcome.succeeded() {
        bail!(
            "{} of {} documents failed to synthesize",
            outcome.failures.len(),
            documents.len()
        );
    }
    tracing::info!(files = outcome.segments.len(), dir = %output.display(), "synthesis completed");
    Ok(())
}

fn run_compose(input: &Path, output: &Path) -> anyhow::Result<()> {
    Composer::new()
        .compose_dir(input, output)
        .with_context(|| format!("cannot compose {}", input.display()))?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Turn image sequences into music", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan, synthesize and compose a folder of images.
    Run {
        /// Folder containing the image sequence, ordered by file name.
        #[arg(short, long)]
        input: PathBuf,
        /// Final WAV file, or the name of the MIDI run with `--midi`.
        #[arg(short, long)]
        output: PathBuf,
        /// Write one MIDI file per image instead of a composed WAV file.
        #[arg(long)]
        midi: bool,
        #[command(flatten)]
        settings: Settings,
    },
    /// Extract pixel data from an image or a folder of images.
    Scan {
        #[arg(short, long)]
        input: PathBuf,
        /// Folder for the generated .json documents.
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        settings: Settings,
    },
    /// Render scan documents to WAV segments.
    Synth {
        /// A .json document or a folder of them.
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        settings: Settings,
    },
    /// Render scan documents to MIDI files.
    Midi {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        settings: Settings,
    },
    /// Join the WAV files of a folder into one track.
    Compose {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Flags layered over a JSON preset (or the defaults).
#[derive(Args, Debug, Default)]
struct Settings {
    /// JSON preset with any subset of the configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Pixels at or below this luma are ignored.
    #[arg(long)]
    threshold: Option<u8>,
    /// Synthesis worker threads (defaults to available parallelism).
    #[arg(long)]
    workers: Option<usize>,
    /// Seconds of audio rendered for every image.
    #[arg(long)]
    duration: Option<f64>,
    /// raw, pentatonic, major or minor.
    #[arg(long)]
    scale: Option<Scale>,
    /// brightness or rgb_instrument.
    #[arg(long)]
    mode: Option<SynthesisMode>,
    /// sine, square or sawtooth.
    #[arg(long)]
    waveform: Option<Waveform>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=16))]
    channel_r: Option<u8>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=16))]
    channel_g: Option<u8>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=16))]
    channel_b: Option<u8>,
    /// brightness or fixed:<0-127>.
    #[arg(long)]
    velocity: Option<VelocityPolicy>,
    /// saturation, brightness or none.
    #[arg(long)]
    cc: Option<CcPolicy>,
    /// brightness_change or none.
    #[arg(long)]
    pitch_bend: Option<PitchBendPolicy>,
}

impl Settings {
    fn resolve(&self) -> anyhow::Result<SonifyConfig> {
        let mut config = match &self.config {
            Some(path) => SonifyConfig::from_json_file(path)
                .with_context(|| format!("cannot load preset {}", path.display()))?,
            None => SonifyConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        if let Some(duration) = self.duration {
            config.audio.duration_per_image = duration;
        }
        if let Some(scale) = self.scale {
            config.audio.scale = scale;
        }
        if let Some(mode) = self.mode {
            config.audio.mode = mode;
        }
        if let Some(waveform) = self.waveform {
            config.audio.waveform = waveform;
        }
        if let Some(channel) = self.channel_r {
            config.midi.channel_r = channel;
        }
        if let Some(channel) = self.channel_g {
            config.midi.channel_g = channel;
        }
        if let Some(channel) = self.channel_b {
            config.midi.channel_b = channel;
        }
        if let Some(velocity) = self.velocity {
            config.midi.velocity = velocity;
        }
        if let Some(cc) = self.cc {
            config.midi.cc = cc;
        }
        if let Some(pitch_bend) = self.pitch_bend {
            config.midi.pitch_bend = pitch_bend;
        }

        config.validate()?;
        Ok(config)
    }
}
