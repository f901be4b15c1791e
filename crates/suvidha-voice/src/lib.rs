//! # SUVIDHA Voice - Kiosk Voice Assistant
//!
//! Speech adapters, the guidance client and the session controller that decides when
//! the kiosk speaks, listens and navigates.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Voice Orchestrator                          │
//! │                                                                   │
//! │  UI events ──► ┌──────────────┐  SessionCommand  ┌─────────────┐  │
//! │  (handle)      │ VoiceSession │ ───────────────► │  executor   │  │
//! │                │ (sans-IO FSM)│ ◄─────────────── │ timers/tasks│  │
//! │                └──────────────┘   SessionEvent   └─────────────┘  │
//! │                                                      │    │   │   │
//! │        ┌───────────────┬─────────────────────────────┘    │   │   │
//! │        ▼               ▼                                  ▼   ▼   │
//! │  GuidanceClient   SpeechOutput (remote ─► local)   Speech  Action │
//! │  (/api/*)         CuePlayer (chime, click)         Recog.  Router │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod chime;
pub mod controller;
pub mod error;
pub mod guidance;
pub mod history;
pub mod orchestrator;
pub mod stt;
pub mod voice_output;

pub use chime::{Cue, CuePlayer};
pub use controller::{AssistantState, SessionCommand, SessionConfig, SessionEvent, VoiceSession};
pub use error::{VoiceError, VoiceResult};
pub use guidance::{
    AssistantResponse, GuidanceClient, GuidanceService, HttpGuidance, ANALYSIS_FAILED,
    MAX_DOCUMENT_BYTES, POSTER_ASPECT_RATIOS,
};
pub use history::ConversationHistory;
pub use orchestrator::{AssistantSnapshot, KioskEvent, OrchestratorHandle, Providers, VoiceOrchestrator};
pub use stt::{SpeechRecognizer, TextEntryRecognizer, UnsupportedRecognizer};
#[cfg(feature = "native-audio")]
pub use voice_output::RodioSink;
pub use voice_output::{
    AudioSink, CommandAudioSink, CommandSynthesizer, HttpTts, LocalSynthesizer, RemoteTts,
    SpeechOutcome, SpeechOutput, LOCAL_SPEECH_RATE,
};
