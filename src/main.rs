//! voxpolish command line interface
//!
//! Enhances voice recordings into broadcast-ready mono WAV files.

use clap::{Args, Parser, Subcommand};
use log::info;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use voxpolish::config::TrimReference;
use voxpolish::filter::integrated_loudness;
use voxpolish::{
    CommandSeparator, OutputFormat, PipelineConfig, PipelineResult, SourceSeparator, StageStatus,
    decoder, enhance_with_separator, stage,
};

#[derive(Parser)]
#[command(name = "voxpolish")]
#[command(about = "Voice recording enhancement pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enhance a recording into a mono 44.1 kHz WAV
    Enhance {
        /// Input audio file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[command(flatten)]
        tunables: Tunables,

        /// External separation tool; its arguments may use {input} and {output}
        #[arg(long, value_name = "PROG")]
        separator_cmd: Option<PathBuf>,

        /// Argument passed to the separation tool (repeatable)
        #[arg(long = "separator-arg", value_name = "ARG", allow_hyphen_values = true)]
        separator_args: Vec<String>,
    },

    /// Show what the decoder finds and the loudness after ingest
    Probe {
        /// Input audio file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

/// Overrides for the pipeline defaults
#[derive(Args)]
struct Tunables {
    /// Silence threshold in dB
    #[arg(long, allow_hyphen_values = true)]
    trim_db: Option<f32>,

    /// Measure the silence threshold against the loudest frame instead of full scale
    #[arg(long)]
    trim_relative: bool,

    /// Noise reduction strength, 0.0 to 1.0
    #[arg(long)]
    noise_strength: Option<f32>,

    /// Noise threshold in standard deviations above the noise floor
    #[arg(long)]
    noise_threshold: Option<f32>,

    /// Linear gain applied after noise gating
    #[arg(long)]
    post_gate_boost: Option<f32>,

    /// Highpass cutoff in Hz
    #[arg(long)]
    highpass_hz: Option<f32>,

    /// Compressor threshold in dBFS
    #[arg(long, allow_hyphen_values = true)]
    comp_threshold_db: Option<f32>,

    /// Compressor ratio
    #[arg(long)]
    comp_ratio: Option<f32>,

    /// Compressor attack in ms
    #[arg(long)]
    comp_attack_ms: Option<f32>,

    /// Compressor release in ms
    #[arg(long)]
    comp_release_ms: Option<f32>,

    /// High-shelf gain in dB
    #[arg(long, allow_hyphen_values = true)]
    shelf_gain_db: Option<f32>,

    /// High-shelf corner in Hz
    #[arg(long)]
    shelf_hz: Option<f32>,

    /// Target integrated loudness in LUFS
    #[arg(long, allow_hyphen_values = true)]
    target_lufs: Option<f32>,

    /// Limiter ceiling in dBFS
    #[arg(long, allow_hyphen_values = true)]
    ceiling_db: Option<f32>,

    /// Separator timeout in seconds
    #[arg(long)]
    separator_timeout: Option<u64>,

    /// Write 16-bit PCM instead of 32-bit float
    #[arg(long)]
    pcm16: bool,
}

impl Tunables {
    fn into_config(self) -> PipelineConfig {
        let mut config = PipelineConfig::default();

        if let Some(v) = self.trim_db {
            config.trim.threshold_db = v;
        }
        if self.trim_relative {
            config.trim.reference = TrimReference::Peak;
        }
        if let Some(v) = self.noise_strength {
            config.noise.strength = v;
        }
        if let Some(v) = self.noise_threshold {
            config.noise.threshold_std = v;
        }
        if let Some(v) = self.post_gate_boost {
            config.noise.post_gate_boost = v;
        }
        if let Some(v) = self.highpass_hz {
            config.tone.highpass_hz = v;
        }
        if let Some(v) = self.comp_threshold_db {
            config.tone.compressor.threshold_db = v;
        }
        if let Some(v) = self.comp_ratio {
            config.tone.compressor.ratio = v;
        }
        if let Some(v) = self.comp_attack_ms {
            config.tone.compressor.attack_ms = v;
        }
        if let Some(v) = self.comp_release_ms {
            config.tone.compressor.release_ms = v;
        }
        if let Some(v) = self.shelf_gain_db {
            config.tone.shelf_gain_db = v;
        }
        if let Some(v) = self.shelf_hz {
            config.tone.shelf_cutoff_hz = v;
        }
        if let Some(v) = self.target_lufs {
            config.target_lufs = v;
        }
        if let Some(v) = self.ceiling_db {
            config.limiter.ceiling_db = v;
        }
        if let Some(secs) = self.separator_timeout {
            config.separator.timeout = Duration::from_secs(secs);
        }
        if self.pcm16 {
            config.output_format = OutputFormat::Int16;
        }

        config
    }
}

fn extension_of(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_string)
        .ok_or_else(|| format!("{}: cannot tell the format without an extension", path.display()).into())
}

/// Write via a temporary file in the target directory, then rename
fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn print_stage_log(result: &PipelineResult) {
    println!("{:<20} {:<8} {:>10} {:>10} {:>10}", "stage", "status", "in", "out", "time");
    for report in &result.stages {
        let (status, reason) = match &report.status {
            StageStatus::Applied => ("applied", String::new()),
            StageStatus::FallenBack(fault) => ("skipped", fault.to_string()),
        };
        println!(
            "{:<20} {:<8} {:>10} {:>10} {:>10.1?} {}",
            report.kind.name(),
            status,
            report.input_len,
            report.output_len,
            report.elapsed,
            reason
        );
    }
}

fn run_enhance(
    input: PathBuf,
    output: PathBuf,
    tunables: Tunables,
    separator_cmd: Option<PathBuf>,
    separator_args: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = tunables.into_config();
    let extension = extension_of(&input)?;
    let bytes = std::fs::read(&input)?;

    let separator = separator_cmd.map(|program| {
        Arc::new(CommandSeparator::new(program, separator_args).with_timeout(config.separator.timeout))
            as Arc<dyn SourceSeparator>
    });

    let (wav, result) = enhance_with_separator(&bytes, &extension, &config, separator)?;
    write_atomically(&output, &wav)?;

    print_stage_log(&result);
    info!(
        "wrote {} ({:.2}s, peak {:.3})",
        output.display(),
        result.buffer.duration().as_secs_f64(),
        result.buffer.peak()
    );
    Ok(())
}

fn run_probe(input: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let extension = extension_of(&input)?;
    let bytes = std::fs::read(&input)?;

    let (raw, info) = decoder::decode_all(&bytes, &extension)?;
    let normalized = stage::normalize_waveform(&raw)?;
    let loudness = integrated_loudness(&normalized)?;

    println!("File:        {}", input.display());
    println!("Format:      {} ({})", info.extension, info.codec);
    println!("Sample rate: {} Hz", info.sample_rate);
    println!("Channels:    {}", info.channels);
    println!("Duration:    {:.3}s", info.duration_secs());
    if loudness.is_finite() {
        println!("Loudness:    {:.2} LUFS", loudness);
    } else {
        println!("Loudness:    silent");
    }
    println!("Peak:        {:.3}", normalized.peak());
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    info!("voxpolish {}", voxpolish::VERSION);

    match cli.command {
        Commands::Enhance {
            input,
            output,
            tunables,
            separator_cmd,
            separator_args,
        } => run_enhance(input, output, tunables, separator_cmd, separator_args),
        Commands::Probe { input } => run_probe(input),
    }
}
