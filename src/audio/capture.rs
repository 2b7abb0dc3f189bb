//! Real audio capture using CPAL (Cross-Platform Audio Library).

use crate::audio::recorder::AudioSource;
use crate::audio::wav;
use crate::defaults;
use crate::error::{DictoggleError, Result};
use crate::sys::with_suppressed_stderr;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Preferred device names for GNOME/PipeWire environments.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns to filter out (not useful for voice input).
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

/// Check if a device name should be filtered out.
fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

/// Check if a device is a preferred device.
fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List all available audio input devices with filtering and recommendations.
///
/// # Returns
/// A vector of device names, with preferred devices marked with "\[recommended\]".
/// Filters out obviously unusable devices (surround channels, HDMI, etc.).
///
/// # Errors
/// Returns `DictoggleError::AudioCapture` if device enumeration fails.
pub fn list_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| DictoggleError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }

            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Get the best default input device, preferring PipeWire/PulseAudio.
///
/// This ensures we respect the desktop's audio device selection.
///
/// # Errors
/// Returns `DictoggleError::AudioDeviceNotFound` if no input device is available.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| DictoggleError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: We ensure that the stream is only accessed from a single thread at a time
/// through the Mutex wrapper in CpalAudioSource. The stream methods are called
/// synchronously and don't cross thread boundaries unsafely.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Real audio capture implementation using CPAL.
///
/// Captures 16-bit PCM at the configured rate (16kHz mono by default, as
/// required by Whisper). Tries the preferred format first (i16), then f32,
/// then falls back to the device's default config with software conversion
/// (channel mixing + resampling).
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Arc<Mutex<Option<SendableStream>>>,
    buffer: Arc<Mutex<Vec<i16>>>,
    callback_count: Arc<AtomicU64>,
    sample_rate: u32,
}

impl CpalAudioSource {
    /// Create a new CPAL audio source.
    ///
    /// # Arguments
    /// * `device_name` - Optional device name. If None, uses the default input device.
    /// * `sample_rate` - Target capture rate (normally [`defaults::SAMPLE_RATE`]).
    ///
    /// # Errors
    /// Returns errors if the device is not found or no input device exists.
    pub fn new(device_name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let devices = host
                    .input_devices()
                    .map_err(|e| DictoggleError::AudioCapture {
                        message: format!("Failed to enumerate devices: {}", e),
                    })?;

                let mut found_device = None;
                for dev in devices {
                    if let Ok(dev_name) = dev.name()
                        && dev_name == name
                    {
                        found_device = Some(dev);
                        break;
                    }
                }

                found_device.ok_or_else(|| DictoggleError::AudioDeviceNotFound {
                    device: name.to_string(),
                })
            } else {
                get_best_default_device()
            }
        })?;

        Ok(Self {
            device,
            stream: Arc::new(Mutex::new(None)),
            buffer: Arc::new(Mutex::new(Vec::new())),
            callback_count: Arc::new(AtomicU64::new(0)),
            sample_rate,
        })
    }

    /// Create a source for the default device at the default rate.
    pub fn default_device() -> Result<Self> {
        Self::new(None, defaults::SAMPLE_RATE)
    }

    /// Build the audio stream with the configured format.
    ///
    /// Tries in order:
    /// 1. i16 at the target rate, mono — preferred, zero-copy path
    /// 2. f32 at the target rate, mono — for devices that only expose float formats
    /// 3. Device default config — native rate/channels with software conversion
    fn build_stream(&self) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: self.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            eprintln!("Audio stream error: {}", err);
        };

        // Try i16 mono — works with PipeWire/PulseAudio which convert transparently
        let buffer = Arc::clone(&self.buffer);
        let counter = Arc::clone(&self.callback_count);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend_from_slice(data);
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // Try f32 mono — for devices that only expose float formats
        let buffer = Arc::clone(&self.buffer);
        let counter = Arc::clone(&self.callback_count);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend(
                        data.iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                    );
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // Fallback: capture at device's native config, convert in software.
        // Some PipeWire-ALSA setups accept non-native configs but never deliver data.
        self.build_stream_native()
    }

    /// Build a stream using the device's default/native config, with software
    /// channel mixing (stereo→mono) and resampling (native rate→target rate).
    fn build_stream_native(&self) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| DictoggleError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate();
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;

        let stream_config: cpal::StreamConfig = default_config.clone().into();

        eprintln!(
            "dictoggle: using native audio format ({}ch/{}Hz/{:?}), converting in software",
            native_channels,
            native_rate,
            default_config.sample_format(),
        );

        let err_callback = |err| {
            eprintln!("Audio stream error: {}", err);
        };

        let buffer = Arc::clone(&self.buffer);
        let counter = Arc::clone(&self.callback_count);

        match default_config.sample_format() {
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let converted =
                            downmix_and_resample(data, native_channels, native_rate, target_rate);
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend_from_slice(&converted);
                        }
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| DictoggleError::AudioCapture {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let i16_data: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        let converted = downmix_and_resample(
                            &i16_data,
                            native_channels,
                            native_rate,
                            target_rate,
                        );
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend_from_slice(&converted);
                        }
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| DictoggleError::AudioCapture {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            fmt => Err(DictoggleError::AudioCapture {
                message: format!(
                    "Unsupported native sample format: {:?}. \
                     Try specifying a device with --device.",
                    fmt
                ),
            }),
        }
    }
}

/// Mix multi-channel audio to mono and resample to the target rate.
fn downmix_and_resample(
    samples: &[i16],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Vec<i16> {
    let mono: Vec<i16> = if channels == 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    };

    if source_rate == target_rate {
        mono
    } else {
        wav::resample(&mono, source_rate, target_rate)
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        {
            let stream_guard = self.stream.lock().map_err(|e| DictoggleError::AudioCapture {
                message: format!("Failed to lock stream: {}", e),
            })?;
            if stream_guard.is_some() {
                return Ok(()); // Already started
            }
        }

        let stream = self.build_stream()?;
        stream.play().map_err(|e| DictoggleError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        // Wait briefly to check if the CPAL callback actually fires.
        // Some PipeWire-ALSA setups accept non-native configs but never deliver data.
        std::thread::sleep(std::time::Duration::from_millis(200));

        let final_stream = if self.callback_count.load(Ordering::Relaxed) == 0 {
            // Preferred config didn't deliver data — stop it, clear buffer, try native
            drop(stream);
            if let Ok(mut buf) = self.buffer.lock() {
                buf.clear();
            }

            let native_stream = self.build_stream_native()?;
            native_stream
                .play()
                .map_err(|e| DictoggleError::AudioCapture {
                    message: format!("Failed to start native audio stream: {}", e),
                })?;
            native_stream
        } else {
            stream
        };

        let mut stream_guard = self.stream.lock().map_err(|e| DictoggleError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;
        *stream_guard = Some(SendableStream(final_stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut stream_guard = self.stream.lock().map_err(|e| DictoggleError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;

        if let Some(sendable_stream) = stream_guard.take() {
            sendable_stream
                .0
                .pause()
                .map_err(|e| DictoggleError::AudioCapture {
                    message: format!("Failed to stop audio stream: {}", e),
                })?;
            // Dropping the stream closes the backend connection.
            drop(sendable_stream);
        }
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        let mut buffer = self.buffer.lock().map_err(|e| DictoggleError::AudioCapture {
            message: format!("Failed to lock audio buffer: {}", e),
        })?;

        Ok(std::mem::take(&mut *buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_filter_device() {
        assert!(should_filter_device("surround51"));
        assert!(should_filter_device("front:CARD=PCH"));
        assert!(should_filter_device("HDMI Output"));
        assert!(should_filter_device("Digital Output S/PDIF"));
        assert!(!should_filter_device("pipewire"));
        assert!(!should_filter_device("PulseAudio"));
        assert!(!should_filter_device("Built-in Audio"));
    }

    #[test]
    fn test_is_preferred_device() {
        assert!(is_preferred_device("pipewire"));
        assert!(is_preferred_device("PipeWire"));
        assert!(is_preferred_device("pulse"));
        assert!(is_preferred_device("PulseAudio"));
        assert!(!is_preferred_device("hw:0,0"));
        assert!(!is_preferred_device("default"));
    }

    #[test]
    fn test_downmix_and_resample_mono_identity() {
        let samples = vec![1i16, 2, 3, 4];
        assert_eq!(downmix_and_resample(&samples, 1, 16000, 16000), samples);
    }

    #[test]
    fn test_downmix_stereo_averages_channels() {
        let samples = vec![100i16, 200, 300, 400];
        assert_eq!(downmix_and_resample(&samples, 2, 16000, 16000), vec![150i16, 350]);
    }

    #[test]
    fn test_downmix_and_resample_48khz() {
        let samples = vec![1000i16; 4800];
        let converted = downmix_and_resample(&samples, 1, 48000, 16000);
        assert!(converted.len() >= 1590 && converted.len() <= 1610);
    }

    #[test]
    fn test_create_with_invalid_device_name() {
        let source = CpalAudioSource::new(Some("NonExistentDevice12345"), defaults::SAMPLE_RATE);
        // Depending on the host there may be no devices at all; both errors
        // are acceptable, success is not.
        assert!(source.is_err());
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_list_devices_returns_at_least_one_device() {
        let devices = list_devices().unwrap();
        assert!(!devices.is_empty(), "Expected at least one audio device");
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_audio_source_trait_implementation() {
        let mut source = CpalAudioSource::default_device().expect("Failed to create audio source");

        assert!(source.start().is_ok(), "Failed to start audio capture");
        assert!(source.read_samples().is_ok(), "Failed to read samples");
        assert!(source.stop().is_ok(), "Failed to stop audio capture");
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_read_samples_drains_buffer() {
        let mut source = CpalAudioSource::default_device().expect("Failed to create audio source");
        source.start().expect("Failed to start");

        std::thread::sleep(std::time::Duration::from_millis(100));

        let _samples1 = source.read_samples().expect("Failed to read samples");
        let _samples2 = source.read_samples().expect("Failed to read samples");

        source.stop().expect("Failed to stop");
    }
}
