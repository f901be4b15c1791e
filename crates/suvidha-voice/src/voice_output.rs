//! **SpeechOutput**: text-to-speech with a remote-then-local fallback.
//!
//! Remote audio is fetched from the server proxy and played through an [`AudioSink`];
//! any failure (network, quota, empty audio, playback) falls through to a
//! [`LocalSynthesizer`] speaking the same text in the same locale. The two paths run
//! one after the other inside a single task, so they are never audible together.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

/// Local synthesis speaks slightly slower than normal for kiosk clarity.
pub const LOCAL_SPEECH_RATE: f32 = 0.9;

/// espeak-ng's default speed in words per minute.
const ESPEAK_DEFAULT_WPM: f32 = 175.0;

/// Remote synthesis: text in, audio bytes (WAV) out.
#[async_trait]
pub trait RemoteTts: Send + Sync {
    /// Empty bytes mean "no audio"; quota exhaustion is [`VoiceError::RateLimited`].
    async fn synthesize(&self, text: &str, locale: &str) -> VoiceResult<Vec<u8>>;
}

/// Plays encoded audio and resolves when playback ends.
///
/// Dropping the returned future must stop playback.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, audio: Vec<u8>) -> VoiceResult<()>;
}

/// Platform speech synthesis. Resolves when the utterance has been spoken.
///
/// Dropping the returned future must silence it.
#[async_trait]
pub trait LocalSynthesizer: Send + Sync {
    async fn speak(&self, text: &str, locale: &str) -> VoiceResult<()>;
}

/// Which path produced the audible output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechOutcome {
    Remote,
    Local,
    /// Both paths failed; nothing was heard.
    Silent,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TtsReply {
    #[serde(default)]
    audio_data: Option<String>,
}

/// Remote TTS through the kiosk server proxy (`POST /api/tts`, base64 WAV in `audioData`).
#[derive(Debug, Clone)]
pub struct HttpTts {
    url: String,
    client: reqwest::Client,
}

impl HttpTts {
    pub fn new(base_url: &str, timeout: Duration) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            url: format!("{}/api/tts", base_url.trim_end_matches('/')),
            client,
        })
    }
}

#[async_trait]
impl RemoteTts for HttpTts {
    async fn synthesize(&self, text: &str, locale: &str) -> VoiceResult<Vec<u8>> {
        let body = serde_json::json!({ "text": text, "lang": locale });
        let res = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        let status = res.status();
        let raw = res.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || (!status.is_success() && raw.contains("RESOURCE_EXHAUSTED"))
        {
            return Err(VoiceError::RateLimited(format!("TTS quota exceeded ({})", status)));
        }
        if !status.is_success() {
            return Err(VoiceError::Tts(format!("TTS API error {}: {}", status, raw)));
        }
        let reply: TtsReply =
            serde_json::from_str(&raw).map_err(|e| VoiceError::Tts(format!("TTS reply: {}", e)))?;
        match reply.audio_data.filter(|d| !d.is_empty()) {
            Some(data) => Ok(base64::engine::general_purpose::STANDARD.decode(data.trim())?),
            None => Ok(Vec::new()),
        }
    }
}

fn split_command(command: &str) -> VoiceResult<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| VoiceError::Config("empty command".to_string()))?;
    Ok((program, parts.collect()))
}

/// Pipes audio into a player process on stdin (e.g. `aplay -q`).
#[derive(Debug, Clone)]
pub struct CommandAudioSink {
    command: String,
}

impl CommandAudioSink {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl AudioSink for CommandAudioSink {
    async fn play(&self, audio: Vec<u8>) -> VoiceResult<()> {
        if audio.is_empty() {
            return Ok(());
        }
        let (program, args) = split_command(&self.command)?;
        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VoiceError::Playback(format!("{}: {}", program, e)))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&audio)
                .await
                .map_err(|e| VoiceError::Playback(e.to_string()))?;
        }
        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(VoiceError::Playback(format!("{} exited with {}", program, status)))
        }
    }
}

/// Local synthesis through a command-line synthesizer (espeak-ng compatible flags).
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    command: String,
}

impl CommandSynthesizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl LocalSynthesizer for CommandSynthesizer {
    async fn speak(&self, text: &str, locale: &str) -> VoiceResult<()> {
        let (program, mut args) = split_command(&self.command)?;
        // espeak voices are keyed by language ("hi"), not region ("hi-IN").
        let voice = locale.split('-').next().unwrap_or(locale).to_ascii_lowercase();
        let wpm = (ESPEAK_DEFAULT_WPM * LOCAL_SPEECH_RATE).round() as u32;
        args.extend(["-v".to_string(), voice, "-s".to_string(), wpm.to_string()]);
        args.push(text.to_string());
        let status = Command::new(&program)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| VoiceError::Tts(format!("{}: {}", program, e)))?;
        if status.success() {
            Ok(())
        } else {
            Err(VoiceError::Tts(format!("{} exited with {}", program, status)))
        }
    }
}

/// In-process playback through the default output device.
#[cfg(feature = "native-audio")]
#[derive(Debug, Default)]
pub struct RodioSink;

#[cfg(feature = "native-audio")]
struct StopOnDrop(Arc<AtomicBool>);

#[cfg(feature = "native-audio")]
impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[cfg(feature = "native-audio")]
#[async_trait]
impl AudioSink for RodioSink {
    async fn play(&self, audio: Vec<u8>) -> VoiceResult<()> {
        use rodio::Source;

        if audio.is_empty() {
            return Ok(());
        }
        let stop = Arc::new(AtomicBool::new(false));
        let _guard = StopOnDrop(Arc::clone(&stop));
        // OutputStream is not Send; it lives and dies on the blocking thread.
        tokio::task::spawn_blocking(move || -> VoiceResult<()> {
            let (_stream, handle) = rodio::OutputStream::try_default()
                .map_err(|e| VoiceError::Playback(e.to_string()))?;
            let sink = rodio::Sink::try_new(&handle).map_err(|e| VoiceError::Playback(e.to_string()))?;
            let source = rodio::Decoder::new(std::io::Cursor::new(audio))
                .map_err(|e| VoiceError::Playback(format!("Decode failed: {}", e)))?;
            sink.append(source.convert_samples::<f32>());
            while !sink.empty() {
                if stop.load(Ordering::SeqCst) {
                    sink.stop();
                    break;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Ok(())
        })
        .await
        .map_err(|e| VoiceError::Playback(e.to_string()))?
    }
}

struct Voices {
    remote: Option<Arc<dyn RemoteTts>>,
    sink: Arc<dyn AudioSink>,
    local: Arc<dyn LocalSynthesizer>,
}

impl Voices {
    async fn utter(&self, text: &str, locale: &str) -> SpeechOutcome {
        if let Some(remote) = &self.remote {
            match remote.synthesize(text, locale).await {
                Ok(audio) if !audio.is_empty() => match self.sink.play(audio).await {
                    Ok(()) => return SpeechOutcome::Remote,
                    Err(e) => warn!(error = %e, "remote audio playback failed, falling back to local synthesis"),
                },
                Ok(_) => debug!("remote TTS returned no audio"),
                Err(e) if e.is_rate_limited() => warn!("TTS quota exceeded. Using local synthesis."),
                Err(e) => warn!(error = %e, "remote TTS failed, falling back to local synthesis"),
            }
        }
        match self.local.speak(text, locale).await {
            Ok(()) => SpeechOutcome::Local,
            Err(e) => {
                error!(error = %e, "local synthesis failed");
                SpeechOutcome::Silent
            }
        }
    }
}

/// The kiosk's single speech channel: at most one utterance is audible at a time.
pub struct SpeechOutput {
    voices: Arc<Voices>,
    current: Mutex<Option<AbortHandle>>,
    speaking: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
}

impl SpeechOutput {
    /// `remote` is optional so deployments without a TTS proxy go straight to local speech.
    pub fn new(
        remote: Option<Arc<dyn RemoteTts>>,
        sink: Arc<dyn AudioSink>,
        local: Arc<dyn LocalSynthesizer>,
    ) -> Self {
        Self {
            voices: Arc::new(Voices { remote, sink, local }),
            current: Mutex::new(None),
            speaking: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start speaking `text`, cancelling whatever is currently audible.
    ///
    /// Returns `None` for empty text (nothing to say). The handle resolves when this
    /// utterance ends; it is cancelled if `stop()` or a newer `speak()` intervenes.
    pub fn speak(&self, text: &str, locale: &str) -> Option<JoinHandle<SpeechOutcome>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.stop();

        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.speaking.store(true, Ordering::SeqCst);
        info!(locale, chars = text.chars().count(), "🔊 speaking");

        let voices = Arc::clone(&self.voices);
        let speaking = Arc::clone(&self.speaking);
        let generation = Arc::clone(&self.generation);
        let text = text.to_string();
        let locale = locale.to_string();
        let handle = tokio::spawn(async move {
            let outcome = voices.utter(&text, &locale).await;
            if generation.load(Ordering::SeqCst) == my_generation {
                speaking.store(false, Ordering::SeqCst);
            }
            debug!(?outcome, "utterance finished");
            outcome
        });

        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = Some(handle.abort_handle());
        Some(handle)
    }

    /// Cancel remote playback or local synthesis and clear `speaking` immediately.
    pub fn stop(&self) {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = previous {
            handle.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}

impl Drop for SpeechOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct FailingTts;

    #[async_trait]
    impl RemoteTts for FailingTts {
        async fn synthesize(&self, _text: &str, _locale: &str) -> VoiceResult<Vec<u8>> {
            Err(VoiceError::RateLimited("429".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingSink(AtomicUsize);

    #[async_trait]
    impl AudioSink for CountingSink {
        async fn play(&self, _audio: Vec<u8>) -> VoiceResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingLocal(Mutex<Vec<(String, String)>>);

    #[async_trait]
    impl LocalSynthesizer for RecordingLocal {
        async fn speak(&self, text: &str, locale: &str) -> VoiceResult<()> {
            self.0.lock().unwrap().push((text.to_string(), locale.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn quota_error_falls_back_to_local_with_same_text() {
        let sink = Arc::new(CountingSink::default());
        let local = Arc::new(RecordingLocal::default());
        let output = SpeechOutput::new(Some(Arc::new(FailingTts)), sink.clone(), local.clone());

        let outcome = output.speak("hello", "en-US").unwrap().await.unwrap();

        assert_eq!(outcome, SpeechOutcome::Local);
        assert_eq!(sink.0.load(Ordering::SeqCst), 0);
        assert_eq!(*local.0.lock().unwrap(), [("hello".to_string(), "en-US".to_string())]);
        assert!(!output.is_speaking());
    }

    struct WorkingTts;

    #[async_trait]
    impl RemoteTts for WorkingTts {
        async fn synthesize(&self, _text: &str, _locale: &str) -> VoiceResult<Vec<u8>> {
            Ok(vec![b'R', b'I', b'F', b'F'])
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl AudioSink for BrokenSink {
        async fn play(&self, _audio: Vec<u8>) -> VoiceResult<()> {
            Err(VoiceError::Playback("no output device".to_string()))
        }
    }

    #[derive(Default)]
    struct SlowLocal {
        finished: AtomicBool,
    }

    #[async_trait]
    impl LocalSynthesizer for SlowLocal {
        async fn speak(&self, _text: &str, _locale: &str) -> VoiceResult<()> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn remote_audio_leaves_local_synthesis_untouched() {
        let sink = Arc::new(CountingSink::default());
        let local = Arc::new(RecordingLocal::default());
        let output = SpeechOutput::new(Some(Arc::new(WorkingTts)), sink.clone(), local.clone());

        let outcome = output.speak("hello", "hi-IN").unwrap().await.unwrap();

        assert_eq!(outcome, SpeechOutcome::Remote);
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        assert!(local.0.lock().unwrap().is_empty());
        assert!(!output.is_speaking());
    }

    #[tokio::test]
    async fn playback_failure_falls_back_to_local() {
        let local = Arc::new(RecordingLocal::default());
        let output = SpeechOutput::new(Some(Arc::new(WorkingTts)), Arc::new(BrokenSink), local.clone());

        let outcome = output.speak("hello", "ta-IN").unwrap().await.unwrap();

        assert_eq!(outcome, SpeechOutcome::Local);
        assert_eq!(*local.0.lock().unwrap(), [("hello".to_string(), "ta-IN".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_in_flight_utterance() {
        let local = Arc::new(SlowLocal::default());
        let output = SpeechOutput::new(None, Arc::new(CountingSink::default()), local.clone());

        let utterance = output.speak("a long announcement", "hi-IN").unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(output.is_speaking());

        output.stop();
        assert!(!output.is_speaking());
        let joined = utterance.await;
        assert!(joined.is_err_and(|e| e.is_cancelled()));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!local.finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn empty_text_is_a_no_op() {
        let output = SpeechOutput::new(
            None,
            Arc::new(CountingSink::default()),
            Arc::new(RecordingLocal::default()),
        );
        assert!(output.speak("   ", "hi-IN").is_none());
        assert!(!output.is_speaking());
    }

    #[test]
    fn split_command_keeps_flags() {
        let (program, args) = split_command("aplay -q").unwrap();
        assert_eq!(program, "aplay");
        assert_eq!(args, ["-q"]);
        assert!(split_command("  ").is_err());
    }
}
