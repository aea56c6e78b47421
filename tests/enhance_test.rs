use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use voxpolish::filter::integrated_loudness;
use voxpolish::stage::ingest;
use voxpolish::{
    AudioError, EnhanceError, OutputFormat, Phase, Pipeline, PipelineConfig, SeparationError,
    SourceSeparator, StageFault, StageKind, StageStatus, WaveformBuffer, enhance,
    enhance_with_separator,
};

fn wav_i16(rate: u32, channels: u16, frames: usize, sample: impl Fn(usize) -> f32) -> Vec<u8> {
    let spec = WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let s = (sample(i).clamp(-1.0, 1.0) * 32767.0) as i16;
            for _ in 0..channels {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn wav_f32(rate: u32, samples: &[f32]) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn read_output(wav: &[u8]) -> (WavSpec, Vec<f32>) {
    let mut reader = WavReader::new(Cursor::new(wav.to_vec())).unwrap();
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().map(|s| s.unwrap()).collect(),
        SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.unwrap() as f32 / 32768.0)
            .collect(),
    };
    (spec, samples)
}

/// Speech-like test material: two syllable-rate modulated harmonics
fn speech_like_wav() -> Vec<u8> {
    wav_i16(44100, 1, 3 * 44100, |i| {
        let t = i as f32 / 44100.0;
        let syllables = 0.5 + 0.5 * (2.0 * PI * 4.0 * t).sin();
        syllables * (0.3 * (2.0 * PI * 180.0 * t).sin() + 0.15 * (2.0 * PI * 2400.0 * t).sin())
    })
}

#[test]
fn test_stereo_48k_full_scale_sine() {
    let bytes = wav_i16(48000, 2, 96000, |i| (2.0 * PI * 440.0 * i as f32 / 48000.0).sin());

    let (ingested, _) = ingest(&bytes, "wav").unwrap();
    assert!(ingested.is_mono());
    assert_eq!(ingested.sample_rate(), 44100);
    assert_eq!(ingested.frames(), 88200);

    let (wav, result) =
        enhance_with_separator(&bytes, "wav", &PipelineConfig::default(), None).unwrap();
    let (spec, samples) = read_output(&wav);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 44100);

    let peak = samples.iter().fold(0.0f32, |a, &s| a.max(s.abs()));
    assert!(peak <= 0.8913, "peak {}", peak);

    let buffer = WaveformBuffer::mono(samples, 44100).unwrap();
    let lufs = integrated_loudness(&buffer).unwrap();
    assert!((lufs + 16.0).abs() <= 0.5, "loudness {}", lufs);

    let source = result.source.unwrap();
    assert_eq!(source.sample_rate, 48000);
    assert_eq!(source.channels, 2);
}

#[test]
fn test_corrupt_input_is_fatal() {
    let bytes = speech_like_wav();
    let err = enhance(&bytes[..30], "wav", &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, EnhanceError::FatalIngest(_)));
    assert_eq!(err.phase(), Phase::Ingest);

    let blank = vec![0u8; 8192];
    assert!(matches!(
        enhance(&blank, "flac", &PipelineConfig::default()),
        Err(EnhanceError::FatalIngest(_))
    ));
}

#[test]
fn test_unsupported_extension() {
    let err = enhance(&speech_like_wav(), "xyz", &PipelineConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        EnhanceError::FatalIngest(AudioError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_near_silent_input_trimmed_away() {
    let bytes = wav_f32(44100, &vec![0.0001; 22050]);
    let (wav, result) =
        enhance_with_separator(&bytes, "wav", &PipelineConfig::default(), None).unwrap();

    let trim = result.report(StageKind::SilenceTrimmer).unwrap();
    assert_eq!(trim.status, StageStatus::Applied);
    assert!(trim.output_len < 1024);

    let (spec, samples) = read_output(&wav);
    assert_eq!(spec.sample_rate, 44100);
    assert!(samples.len() < 1024);
}

#[test]
fn test_all_zero_input_never_raises() {
    let n = 44100;
    let bytes = wav_f32(44100, &vec![0.0; n]);
    let wav = enhance(&bytes, "wav", &PipelineConfig::default()).unwrap();
    let (_, samples) = read_output(&wav);
    assert!(samples.len() <= n);
    assert!(samples.iter().all(|&s| s == 0.0));
}

#[test]
fn test_absent_separator_equals_direct_stages() {
    let bytes = speech_like_wav();
    let config = PipelineConfig::default();

    let (_, full) = enhance_with_separator(&bytes, "wav", &config, None).unwrap();

    let (ingested, _) = ingest(&bytes, "wav").unwrap();
    let mut pipeline = Pipeline::new(config).unwrap();
    let direct = pipeline.process(ingested).unwrap();

    assert_eq!(full.buffer, direct.buffer);
    assert!(matches!(
        full.stages[0].status,
        StageStatus::FallenBack(StageFault::Unavailable(_))
    ));
}

struct Sleepy(Duration);

impl SourceSeparator for Sleepy {
    fn name(&self) -> &str {
        "sleepy"
    }

    fn separate(&self, segment: &WaveformBuffer) -> Result<Vec<f32>, SeparationError> {
        thread::sleep(self.0);
        Ok(segment.samples().iter().map(|s| s * 0.5).collect())
    }
}

struct Missing;

impl SourceSeparator for Missing {
    fn name(&self) -> &str {
        "missing"
    }

    fn separate(&self, _segment: &WaveformBuffer) -> Result<Vec<f32>, SeparationError> {
        Err(SeparationError::Unavailable("model weights not installed".to_string()))
    }
}

#[test]
fn test_slow_separator_falls_back() {
    let bytes = speech_like_wav();
    let mut config = PipelineConfig::default();
    config.separator.timeout = Duration::from_millis(100);

    let (_, baseline) = enhance_with_separator(&bytes, "wav", &config, None).unwrap();
    let slow: Arc<dyn SourceSeparator> = Arc::new(Sleepy(Duration::from_secs(2)));
    let (_, result) = enhance_with_separator(&bytes, "wav", &config, Some(slow)).unwrap();

    assert!(matches!(
        result.stages[0].status,
        StageStatus::FallenBack(StageFault::Timeout(_))
    ));
    assert_eq!(result.buffer, baseline.buffer);
}

#[test]
fn test_failing_separator_falls_back() {
    let bytes = speech_like_wav();
    let missing: Arc<dyn SourceSeparator> = Arc::new(Missing);
    let (wav, result) =
        enhance_with_separator(&bytes, "wav", &PipelineConfig::default(), Some(missing)).unwrap();

    assert!(result.stages[0].fell_back());
    assert_eq!(result.fallbacks().count(), 1);
    assert!(!wav.is_empty());
}

#[test]
fn test_present_separator_is_applied() {
    let bytes = speech_like_wav();
    let fast: Arc<dyn SourceSeparator> = Arc::new(Sleepy(Duration::ZERO));
    let (_, result) =
        enhance_with_separator(&bytes, "wav", &PipelineConfig::default(), Some(fast)).unwrap();

    let report = result.report(StageKind::SourceSeparator).unwrap();
    assert_eq!(report.status, StageStatus::Applied);
    assert_eq!(report.input_len, report.output_len);
}

#[cfg(unix)]
#[test]
fn test_command_separator_roundtrip() {
    use voxpolish::CommandSeparator;

    let bytes = speech_like_wav();
    let config = PipelineConfig::default();
    let copy: Arc<dyn SourceSeparator> = Arc::new(CommandSeparator::new(
        "sh",
        vec![
            "-c".to_string(),
            "cp \"$1\" \"$2\"".to_string(),
            "sh".to_string(),
            "{input}".to_string(),
            "{output}".to_string(),
        ],
    ));

    let (_, baseline) = enhance_with_separator(&bytes, "wav", &config, None).unwrap();
    let (_, result) = enhance_with_separator(&bytes, "wav", &config, Some(copy)).unwrap();

    assert_eq!(result.stages[0].status, StageStatus::Applied);
    assert_eq!(result.buffer, baseline.buffer);
}

#[test]
fn test_concurrent_runs_are_independent() {
    let bytes = Arc::new(speech_like_wav());
    let expected = enhance(&bytes, "wav", &PipelineConfig::default()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bytes = Arc::clone(&bytes);
            thread::spawn(move || enhance(&bytes, "wav", &PipelineConfig::default()).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_pcm16_output() {
    let config = PipelineConfig {
        output_format: OutputFormat::Int16,
        ..PipelineConfig::default()
    };
    let wav = enhance(&speech_like_wav(), "wav", &config).unwrap();
    let (spec, samples) = read_output(&wav);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, SampleFormat::Int);
    assert!(!samples.is_empty());
}

#[test]
fn test_invalid_config_is_not_degradation() {
    let mut config = PipelineConfig::default();
    config.limiter.ceiling_db = 2.0;
    let err = enhance(&speech_like_wav(), "wav", &config).unwrap_err();
    assert_eq!(err.phase(), Phase::Config);
}
