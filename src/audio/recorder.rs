use crate::error::{DictoggleError, Result};

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
pub trait AudioSource: Send + Sync {
    /// Start capturing audio from the source.
    ///
    /// # Returns
    /// Ok(()) if the source started successfully, or an error
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    ///
    /// May block on backend teardown; callers that need a bounded stop must
    /// run this on a worker with a timeout.
    fn stop(&mut self) -> Result<()>;

    /// Drain buffered audio samples from the source.
    ///
    /// # Returns
    /// Vector of 16-bit PCM audio samples captured since the last drain
    fn read_samples(&mut self) -> Result<Vec<i16>>;
}

/// Mock audio source for testing
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    samples: Vec<i16>,
    should_fail_start: bool,
    should_fail_stop: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new mock audio source with default settings
    pub fn new() -> Self {
        Self {
            is_started: false,
            samples: vec![0i16; 160],
            should_fail_start: false,
            should_fail_stop: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Configure the mock to return specific samples
    pub fn with_samples(mut self, samples: Vec<i16>) -> Self {
        self.samples = samples;
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on stop
    pub fn with_stop_failure(mut self) -> Self {
        self.should_fail_stop = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(DictoggleError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        if self.should_fail_stop {
            Err(DictoggleError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = false;
            Ok(())
        }
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            Err(DictoggleError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            Ok(std::mem::take(&mut self.samples))
        }
    }
}
