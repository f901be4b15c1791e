//! Speech-to-text: one-shot, push-to-talk recognition.
//!
//! A recognizer performs exactly one attempt per call. The session controller guarantees
//! it is never asked to listen twice at once; recognizers do not guard against it.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// One-shot speech recognition in a given locale.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// `Ok(Some(text))` for one utterance, `Ok(None)` when the attempt ended without a
    /// result (silence, cancellation), `Err(Unsupported)` when recognition is unavailable.
    async fn recognize_once(&self, locale: &str) -> VoiceResult<Option<String>>;
}

/// Recognizer for hosts without speech recognition. Voice input reports an error;
/// everything else keeps working by touch.
#[derive(Debug, Default)]
pub struct UnsupportedRecognizer;

#[async_trait]
impl SpeechRecognizer for UnsupportedRecognizer {
    async fn recognize_once(&self, _locale: &str) -> VoiceResult<Option<String>> {
        Err(VoiceError::Unsupported(
            "Speech recognition not supported on this device.".to_string(),
        ))
    }
}

/// Push-to-talk over typed text: each listening attempt takes the next line sent on the
/// paired channel, or gives up after `timeout`.
pub struct TextEntryRecognizer {
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
    timeout: Duration,
}

impl TextEntryRecognizer {
    pub fn new(timeout: Duration) -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let recognizer = Self {
            rx: Mutex::new(rx),
            timeout,
        };
        (recognizer, tx)
    }
}

#[async_trait]
impl SpeechRecognizer for TextEntryRecognizer {
    async fn recognize_once(&self, locale: &str) -> VoiceResult<Option<String>> {
        let mut rx = self.rx.lock().await;
        info!(locale, "🎤 listening");
        match tokio::time::timeout(self.timeout, rx.recv()).await {
            Ok(Some(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("empty utterance");
                    Ok(None)
                } else {
                    Ok(Some(text.to_string()))
                }
            }
            Ok(None) => Err(VoiceError::Stt("text entry closed".to_string())),
            Err(_) => {
                debug!(timeout = ?self.timeout, "no speech before timeout");
                Ok(None)
            }
        }
    }
}
