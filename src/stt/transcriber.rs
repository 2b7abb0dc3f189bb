use crate::error::{DictoggleError, Result};
use std::sync::Arc;

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (real Whisper vs mock).
pub trait Transcriber: Send + Sync {
    /// Transcribe audio samples to text.
    ///
    /// # Arguments
    /// * `audio` - Audio samples as 16-bit PCM at 16kHz mono
    ///
    /// # Returns
    /// Transcribed text (empty string for silence) or an error
    fn transcribe(&self, audio: &[i16]) -> Result<String>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;

    /// Check if the transcriber is ready
    fn is_ready(&self) -> bool;
}

/// Implement Transcriber for Arc<T> to allow sharing across invocation stages.
impl<T: Transcriber> Transcriber for Arc<T> {
    fn transcribe(&self, audio: &[i16]) -> Result<String> {
        (**self).transcribe(audio)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Mock transcriber for testing
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    model_name: String,
    response: String,
    should_fail: bool,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock transcription".to_string(),
            should_fail: false,
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, _audio: &[i16]) -> Result<String> {
        if self.should_fail {
            Err(DictoggleError::TranscriptionInferenceFailed {
                message: "mock transcription failure".to_string(),
            })
        } else {
            Ok(self.response.clone())
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_transcriber_returns_response() {
        let transcriber = MockTranscriber::new("test-model").with_response("Hello, this is a test");

        let audio = vec![0i16; 1000];
        let result = transcriber.transcribe(&audio);

        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "Hello, this is a test");
    }

    #[test]
    fn test_mock_transcriber_returns_error_when_configured() {
        let transcriber = MockTranscriber::new("test-model").with_failure();

        let audio = vec![0i16; 1000];
        let result = transcriber.transcribe(&audio);

        assert!(result.is_err());
        match result {
            Err(DictoggleError::TranscriptionInferenceFailed { message }) => {
                assert_eq!(message, "mock transcription failure");
            }
            _ => panic!("Expected TranscriptionInferenceFailed error"),
        }
    }

    #[test]
    fn test_mock_transcriber_model_name() {
        let transcriber = MockTranscriber::new("whisper-base");
        assert_eq!(transcriber.model_name(), "whisper-base");
    }

    #[test]
    fn test_mock_transcriber_is_ready() {
        let ready_transcriber = MockTranscriber::new("test-model");
        assert!(ready_transcriber.is_ready());

        let failing_transcriber = MockTranscriber::new("test-model").with_failure();
        assert!(!failing_transcriber.is_ready());
    }

    #[test]
    fn test_transcriber_trait_is_object_safe() {
        let transcriber: Box<dyn Transcriber> =
            Box::new(MockTranscriber::new("test-model").with_response("boxed test"));

        assert_eq!(transcriber.model_name(), "test-model");
        assert!(transcriber.is_ready());

        let audio = vec![0i16; 100];
        assert_eq!(transcriber.transcribe(&audio).unwrap(), "boxed test");
    }

    #[test]
    fn test_arc_transcriber_delegates() {
        let transcriber = Arc::new(MockTranscriber::new("shared").with_response("shared text"));

        assert_eq!(transcriber.model_name(), "shared");
        assert_eq!(transcriber.transcribe(&[0i16; 10]).unwrap(), "shared text");
    }

    #[test]
    fn test_mock_transcriber_empty_audio() {
        let transcriber = MockTranscriber::new("test-model");
        let empty_audio: Vec<i16> = vec![];
        assert!(transcriber.transcribe(&empty_audio).is_ok());
    }
}
