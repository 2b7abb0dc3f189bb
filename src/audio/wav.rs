//! WAV artifact reading and writing.
//!
//! The capture process flushes its sample buffer here on stop; the stopping
//! invocation (and the `transcribe` subcommand) reads artifacts back,
//! downmixing and resampling to the transcriber's expected format.

use crate::defaults::SAMPLE_RATE;
use crate::error::{DictoggleError, Result};
use std::path::Path;

/// Write 16-bit PCM samples as a complete, standard WAV file.
///
/// The file is finalized before returning; a reader opening it afterwards
/// sees a valid header and all samples.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| DictoggleError::AudioCapture {
            message: format!("Failed to create WAV file {}: {}", path.display(), e),
        })?;

    {
        let mut writer16 = writer.get_i16_writer(samples.len() as u32);
        for &sample in samples {
            writer16.write_sample(sample);
        }
        writer16.flush().map_err(|e| DictoggleError::AudioCapture {
            message: format!("Failed to write WAV samples: {}", e),
        })?;
    }

    writer.finalize().map_err(|e| DictoggleError::AudioCapture {
        message: format!("Failed to finalize WAV file: {}", e),
    })
}

/// Read a WAV file back as 16 kHz mono i16 samples.
///
/// Accepts arbitrary source rates and channel counts: stereo is downmixed by
/// averaging, other rates are resampled with linear interpolation.
pub fn read_wav(path: &Path) -> Result<Vec<i16>> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| DictoggleError::ArtifactUnreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let spec = reader.spec();
    let source_rate = spec.sample_rate;
    let source_channels = spec.channels as usize;

    let raw_samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DictoggleError::ArtifactUnreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let mono_samples = if source_channels > 1 {
        raw_samples
            .chunks_exact(source_channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / source_channels as i32) as i16
            })
            .collect()
    } else {
        raw_samples
    };

    if source_rate == SAMPLE_RATE {
        Ok(mono_samples)
    } else {
        Ok(resample(&mono_samples, source_rate, SAMPLE_RATE))
    }
}

/// Duration represented by a mono sample buffer at the given rate.
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    sample_count as f64 / sample_rate as f64
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
