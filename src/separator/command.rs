//! Separation by an external command line tool

use super::{Cancellation, SeparationError, SourceSeparator};
use crate::core::WaveformBuffer;
use crate::encoder::{OutputFormat, encode_to_vec};
use crate::error::AudioError;
use crate::filter::{Filter, Remix};
use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Placeholder replaced by the path of the WAV handed to the tool
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Placeholder replaced by the path the tool must write its WAV to
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Bytes of the tool's stderr included in a failure message
const STDERR_TAIL: usize = 512;

/// Runs an external separation tool once per segment.
///
/// Each call gets its own temporary directory holding `input.wav`,
/// `output.wav` and the tool's stderr; the directory is removed when the
/// call returns, whatever the outcome.
#[derive(Debug, Clone)]
pub struct CommandSeparator {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    poll_interval: Duration,
}

impl CommandSeparator {
    /// Create a separator running `program` with an argument template
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        CommandSeparator {
            program: program.into(),
            args,
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(20),
        }
    }

    /// Kill the tool if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn render_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }

    fn spawn(&self, args: &[String], stderr: File) -> Result<Child, SeparationError> {
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    SeparationError::Unavailable(format!("{}: {}", self.program.display(), e))
                }
                _ => SeparationError::Audio(AudioError::Io(e)),
            })
    }

    fn wait_with_deadline(
        &self,
        child: &mut Child,
        cancel: &Cancellation,
    ) -> Result<ExitStatus, SeparationError> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(AudioError::Io)? {
                return Ok(status);
            }

            let expired = started.elapsed() >= self.timeout;
            if expired || cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(if expired {
                    SeparationError::Timeout(self.timeout)
                } else {
                    SeparationError::Cancelled
                });
            }

            std::thread::sleep(self.poll_interval);
        }
    }

    fn stderr_tail(path: &Path) -> String {
        let mut text = String::new();
        if let Ok(mut file) = File::open(path) {
            let _ = file.read_to_string(&mut text);
        }
        let text = text.trim();
        let start = text
            .char_indices()
            .map(|(i, _)| i)
            .find(|&i| text.len() - i <= STDERR_TAIL)
            .unwrap_or(text.len());
        text[start..].to_string()
    }
}

/// Read a WAV of any layout as mono samples plus its sample rate
fn read_mono_wav(path: &Path) -> Result<(Vec<f32>, u32), SeparationError> {
    let mut reader = WavReader::open(path).map_err(AudioError::from)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(AudioError::from)?,
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(AudioError::from)?
        }
    };

    let buffer = WaveformBuffer::new(interleaved, spec.sample_rate, spec.channels)?;
    let mono = Remix::new().process(&buffer)?;
    Ok((mono.into_samples(), spec.sample_rate))
}

impl SourceSeparator for CommandSeparator {
    fn name(&self) -> &str {
        self.program.to_str().unwrap_or("command")
    }

    fn separate(&self, segment: &WaveformBuffer) -> Result<Vec<f32>, SeparationError> {
        self.separate_cancellable(segment, &Cancellation::new())
    }

    fn separate_cancellable(
        &self,
        segment: &WaveformBuffer,
        cancel: &Cancellation,
    ) -> Result<Vec<f32>, SeparationError> {
        if cancel.is_cancelled() {
            return Err(SeparationError::Cancelled);
        }

        let scratch = tempfile::Builder::new()
            .prefix("voxpolish-sep-")
            .tempdir()
            .map_err(AudioError::Io)?;

        let input_path = scratch.path().join("input.wav");
        let output_path = scratch.path().join("output.wav");
        let stderr_path = scratch.path().join("stderr.log");

        std::fs::write(&input_path, encode_to_vec(segment, OutputFormat::Float32)?)
            .map_err(AudioError::Io)?;
        let stderr = File::create(&stderr_path).map_err(AudioError::Io)?;

        let args = self.render_args(&input_path, &output_path);
        log::debug!("running separator {} {:?}", self.program.display(), args);

        let mut child = self.spawn(&args, stderr)?;
        let status = self.wait_with_deadline(&mut child, cancel)?;

        if !status.success() {
            return Err(SeparationError::Failed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                status,
                Self::stderr_tail(&stderr_path)
            )));
        }

        if !output_path.exists() {
            return Err(SeparationError::Failed(format!(
                "{} produced no output file",
                self.program.display()
            )));
        }

        let (samples, rate) = read_mono_wav(&output_path)?;
        if rate != segment.sample_rate() {
            return Err(SeparationError::UnsupportedInput(format!(
                "separator returned {} Hz for {} Hz input",
                rate,
                segment.sample_rate()
            )));
        }

        Ok(samples)
    }
}
