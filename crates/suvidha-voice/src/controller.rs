//! Voice assistant session controller.
//!
//! [`VoiceSession`] is a synchronous state machine. It never performs I/O; every side
//! effect (timers, provider calls, speech, navigation) is emitted as a
//! [`SessionCommand`] for the orchestrator to execute, and every result comes back as a
//! [`SessionEvent`] tagged with the sequence number of the request that produced it.
//! Results whose sequence is no longer current are discarded.

use crate::error::{VoiceError, VoiceResult};
use crate::guidance::AssistantResponse;
use crate::history::ConversationHistory;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use suvidha_core::{LanguageCode, NavAction, Screen};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantState {
    #[default]
    Idle,
    Listening,
    Processing,
    Speaking,
}

impl AssistantState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssistantState::Idle => "idle",
            AssistantState::Listening => "listening",
            AssistantState::Processing => "processing",
            AssistantState::Speaking => "speaking",
        }
    }
}

impl fmt::Display for AssistantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effects requested by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// (Re)arm the proactive debounce timer; any earlier one is superseded.
    ScheduleProactive { seq: u64, screen: Screen, delay: Duration },
    CancelProactive,
    FetchProactive {
        seq: u64,
        screen: Screen,
        language: LanguageCode,
        history: Vec<String>,
    },
    StartListening { locale: &'static str },
    FetchAssistant {
        seq: u64,
        utterance: String,
        screen: Screen,
        language: LanguageCode,
        history: Vec<String>,
    },
    Speak { seq: u64, text: String, locale: &'static str },
    StopSpeaking,
    PlayChime,
    Dispatch(NavAction),
    ResetGuidance,
    /// Replace the on-screen response bubble (`None` hides it).
    ShowResponse(Option<String>),
    /// A user-visible voice problem (e.g. recognition unsupported).
    ReportError(String),
    /// Arm the success-screen countdown back to the dashboard.
    ScheduleRedirect { seq: u64, delay: Duration },
    CancelRedirect,
}

/// Inputs to the controller: UI signals and the results of earlier commands.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Interaction,
    LocationChanged(Screen),
    MicPressed,
    UtteranceRecognized(String),
    /// Recognition ended without an utterance; `error` is set when it failed.
    ListeningEnded { error: Option<String> },
    ProactiveDue { seq: u64 },
    ProactiveResolved { seq: u64, screen: Screen, response: AssistantResponse },
    AssistantResolved { seq: u64, response: AssistantResponse },
    AssistantFailed { seq: u64, error: String },
    SpeechFinished { seq: u64 },
    RedirectDue { seq: u64 },
    LanguageChanged(LanguageCode),
    Teardown,
}

/// Timing knobs for the controller.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Quiet period after a screen change before narration is fetched (default: 300ms)
    pub proactive_debounce: Duration,

    /// Success-screen countdown before returning to the dashboard (default: 10s)
    pub success_redirect: Duration,

    /// Conversation lines sent with guidance calls (default: 10)
    pub history_cap: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            proactive_debounce: Duration::from_millis(300),
            success_redirect: Duration::from_secs(10),
            history_cap: 10,
        }
    }
}

impl From<&suvidha_core::KioskConfig> for SessionConfig {
    fn from(config: &suvidha_core::KioskConfig) -> Self {
        Self {
            proactive_debounce: config.proactive_debounce(),
            success_redirect: config.success_redirect(),
            history_cap: config.history_cap,
        }
    }
}

/// The assistant's per-session state machine.
pub struct VoiceSession {
    config: SessionConfig,
    state: AssistantState,
    /// One-way audio-unlock latch.
    has_interacted: bool,
    last_screen: Screen,
    language: LanguageCode,
    history: ConversationHistory,
    last_response: Option<String>,

    next_seq: u64,
    proactive_seq: u64,
    assistant_seq: u64,
    speech_seq: u64,
    redirect_seq: u64,

    command_tx: mpsc::UnboundedSender<SessionCommand>,
}

impl VoiceSession {
    /// Create a session resting on `screen`. Commands arrive on the returned receiver.
    pub fn new(
        config: SessionConfig,
        screen: Screen,
        language: LanguageCode,
    ) -> (Self, mpsc::UnboundedReceiver<SessionCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let history = ConversationHistory::new(config.history_cap);
        let session = Self {
            config,
            state: AssistantState::Idle,
            has_interacted: false,
            last_screen: screen,
            language,
            history,
            last_response: None,
            next_seq: 0,
            proactive_seq: 0,
            assistant_seq: 0,
            speech_seq: 0,
            redirect_seq: 0,
            command_tx,
        };
        (session, command_rx)
    }

    pub fn handle(&mut self, event: SessionEvent) -> VoiceResult<()> {
        match event {
            SessionEvent::Interaction => {
                self.record_interaction();
                Ok(())
            }
            SessionEvent::LocationChanged(screen) => self.on_location(screen),
            SessionEvent::MicPressed => self.on_mic_pressed(),
            SessionEvent::UtteranceRecognized(text) => self.on_utterance(&text),
            SessionEvent::ListeningEnded { error } => self.on_listening_ended(error),
            SessionEvent::ProactiveDue { seq } => self.on_proactive_due(seq),
            SessionEvent::ProactiveResolved { seq, screen, response } => {
                self.on_proactive_response(seq, screen, response)
            }
            SessionEvent::AssistantResolved { seq, response } => self.on_assistant_response(seq, response),
            SessionEvent::AssistantFailed { seq, error } => {
                self.on_assistant_failed(seq, &error);
                Ok(())
            }
            SessionEvent::SpeechFinished { seq } => {
                self.on_speech_finished(seq);
                Ok(())
            }
            SessionEvent::RedirectDue { seq } => self.on_redirect_due(seq),
            SessionEvent::LanguageChanged(language) => {
                self.set_language(language);
                Ok(())
            }
            SessionEvent::Teardown => self.teardown(),
        }
    }

    /// First click or touch anywhere unlocks audio for the rest of the session.
    pub fn record_interaction(&mut self) {
        if !self.has_interacted {
            info!("audio unlocked by first interaction");
            self.has_interacted = true;
        }
    }

    /// Recompute-on-location hook. Fires the login chime, the success countdown and the
    /// debounced proactive fetch, each only on an actual screen change.
    pub fn on_location(&mut self, screen: Screen) -> VoiceResult<()> {
        let previous = self.last_screen;
        if screen == previous {
            return Ok(());
        }
        self.last_screen = screen;
        debug!(from = %previous, to = %screen, "screen changed");

        if previous == Screen::Login && screen == Screen::Dashboard {
            self.emit(SessionCommand::PlayChime)?;
        }

        if screen == Screen::Success {
            self.redirect_seq = self.bump();
            self.emit(SessionCommand::ScheduleRedirect {
                seq: self.redirect_seq,
                delay: self.config.success_redirect,
            })?;
        } else if previous == Screen::Success {
            self.redirect_seq = self.bump();
            self.emit(SessionCommand::CancelRedirect)?;
        }

        if !self.has_interacted {
            debug!(screen = %screen, "audio still locked; no proactive guidance");
            return Ok(());
        }
        self.proactive_seq = self.bump();
        self.emit(SessionCommand::ScheduleProactive {
            seq: self.proactive_seq,
            screen,
            delay: self.config.proactive_debounce,
        })
    }

    /// The single mic control: stop if speaking, else start listening.
    pub fn on_mic_pressed(&mut self) -> VoiceResult<()> {
        self.record_interaction();
        match self.state {
            AssistantState::Speaking => {
                self.speech_seq = self.bump();
                self.state = AssistantState::Idle;
                self.emit(SessionCommand::StopSpeaking)
            }
            AssistantState::Listening | AssistantState::Processing => {
                debug!(state = %self.state, "mic control disabled");
                Ok(())
            }
            AssistantState::Idle => {
                self.state = AssistantState::Listening;
                self.emit(SessionCommand::StartListening {
                    locale: self.language.speech_locale(),
                })
            }
        }
    }

    pub fn on_utterance(&mut self, text: &str) -> VoiceResult<()> {
        if self.state != AssistantState::Listening {
            debug!(state = %self.state, "utterance arrived while not listening; discarded");
            return Ok(());
        }
        let text = text.trim();
        if text.is_empty() {
            self.state = AssistantState::Idle;
            return Ok(());
        }
        self.state = AssistantState::Processing;
        self.history.push_user(text);
        self.assistant_seq = self.bump();
        info!(seq = self.assistant_seq, screen = %self.last_screen, "processing utterance");
        self.emit(SessionCommand::FetchAssistant {
            seq: self.assistant_seq,
            utterance: text.to_string(),
            screen: self.last_screen,
            language: self.language,
            history: self.history.recent(),
        })
    }

    pub fn on_listening_ended(&mut self, error: Option<String>) -> VoiceResult<()> {
        if self.state == AssistantState::Listening {
            self.state = AssistantState::Idle;
        }
        match error {
            Some(message) => {
                warn!(error = %message, "speech recognition failed");
                self.emit(SessionCommand::ReportError(message))
            }
            None => Ok(()),
        }
    }

    pub fn on_proactive_due(&mut self, seq: u64) -> VoiceResult<()> {
        if seq != self.proactive_seq {
            debug!(seq, current = self.proactive_seq, "superseded proactive timer");
            return Ok(());
        }
        self.emit(SessionCommand::FetchProactive {
            seq,
            screen: self.last_screen,
            language: self.language,
            history: self.history.recent(),
        })
    }

    pub fn on_proactive_response(
        &mut self,
        seq: u64,
        screen: Screen,
        response: AssistantResponse,
    ) -> VoiceResult<()> {
        if seq != self.proactive_seq || screen != self.last_screen {
            debug!(seq, screen = %screen, "stale proactive guidance discarded");
            return Ok(());
        }
        if !response.has_text() {
            return Ok(());
        }
        // The user's own turn takes precedence over narration.
        if matches!(self.state, AssistantState::Listening | AssistantState::Processing) {
            debug!(state = %self.state, "proactive guidance dropped during a user turn");
            return Ok(());
        }
        self.show(Some(response.text.clone()))?;
        self.speak(response.text)
    }

    pub fn on_assistant_response(&mut self, seq: u64, response: AssistantResponse) -> VoiceResult<()> {
        if seq != self.assistant_seq || self.state != AssistantState::Processing {
            debug!(seq, current = self.assistant_seq, "stale assistant response discarded");
            return Ok(());
        }
        self.state = AssistantState::Idle;

        let action = response.nav_action();
        if response.has_text() {
            self.history.push_assistant(&response.text);
            self.show(Some(response.text.clone()))?;
            self.speak(response.text.clone())?;
        } else {
            self.show(None)?;
        }

        match action {
            Some(action) => self.emit(SessionCommand::Dispatch(action)),
            None => {
                if let Some(name) = response.action.as_deref() {
                    debug!(action = name, "response action not recognised; speaking only");
                }
                Ok(())
            }
        }
    }

    /// The guidance task itself died. Never leave `processing` stuck.
    pub fn on_assistant_failed(&mut self, seq: u64, error: &str) {
        if seq == self.assistant_seq && self.state == AssistantState::Processing {
            warn!(seq, error, "assistant request failed; returning to idle");
            self.state = AssistantState::Idle;
        }
    }

    pub fn on_speech_finished(&mut self, seq: u64) {
        if seq == self.speech_seq && self.state == AssistantState::Speaking {
            self.state = AssistantState::Idle;
        }
    }

    pub fn on_redirect_due(&mut self, seq: u64) -> VoiceResult<()> {
        if seq != self.redirect_seq || self.last_screen != Screen::Success {
            return Ok(());
        }
        info!("success countdown elapsed; returning to dashboard");
        self.emit(SessionCommand::Dispatch(NavAction::ToDashboard))
    }

    pub fn set_language(&mut self, language: LanguageCode) {
        self.language = language;
    }

    /// Logout: cancel timers, invalidate in-flight requests, clear the bubble and
    /// history, and ask the guidance service to forget the conversation.
    pub fn teardown(&mut self) -> VoiceResult<()> {
        info!("voice session teardown");
        self.proactive_seq = self.bump();
        self.assistant_seq = self.bump();
        self.redirect_seq = self.bump();
        self.emit(SessionCommand::CancelProactive)?;
        self.emit(SessionCommand::CancelRedirect)?;
        if self.state == AssistantState::Speaking {
            self.emit(SessionCommand::StopSpeaking)?;
        }
        self.speech_seq = self.bump();
        self.state = AssistantState::Idle;
        self.history.clear();
        self.show(None)?;
        self.emit(SessionCommand::ResetGuidance)
    }

    pub fn state(&self) -> AssistantState {
        self.state
    }

    pub fn screen(&self) -> Screen {
        self.last_screen
    }

    pub fn language(&self) -> LanguageCode {
        self.language
    }

    pub fn has_interacted(&self) -> bool {
        self.has_interacted
    }

    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    fn speak(&mut self, text: String) -> VoiceResult<()> {
        self.speech_seq = self.bump();
        self.state = AssistantState::Speaking;
        self.emit(SessionCommand::Speak {
            seq: self.speech_seq,
            text,
            locale: self.language.speech_locale(),
        })
    }

    fn show(&mut self, text: Option<String>) -> VoiceResult<()> {
        self.last_response = text.clone();
        self.emit(SessionCommand::ShowResponse(text))
    }

    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn emit(&self, command: SessionCommand) -> VoiceResult<()> {
        self.command_tx
            .send(command)
            .map_err(|e| VoiceError::ChannelSend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(screen: Screen) -> (VoiceSession, mpsc::UnboundedReceiver<SessionCommand>) {
        VoiceSession::new(SessionConfig::default(), screen, LanguageCode::Hi)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionCommand>) -> Vec<SessionCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            out.push(cmd);
        }
        out
    }

    #[test]
    fn transitions_before_interaction_schedule_nothing() {
        let (mut s, mut rx) = session(Screen::Welcome);
        s.on_location(Screen::Login).unwrap();
        s.on_location(Screen::Dashboard).unwrap();
        let commands = drain(&mut rx);
        assert!(!commands
            .iter()
            .any(|c| matches!(c, SessionCommand::ScheduleProactive { .. })));
        // The chime does not wait for audio unlock.
        assert_eq!(commands, [SessionCommand::PlayChime]);
    }

    #[test]
    fn rescheduling_supersedes_earlier_timer() {
        let (mut s, mut rx) = session(Screen::Login);
        s.record_interaction();
        s.on_location(Screen::Dashboard).unwrap();
        s.on_location(Screen::Creative).unwrap();
        let seqs: Vec<u64> = drain(&mut rx)
            .into_iter()
            .filter_map(|c| match c {
                SessionCommand::ScheduleProactive { seq, .. } => Some(seq),
                _ => None,
            })
            .collect();
        assert_eq!(seqs.len(), 2);

        s.on_proactive_due(seqs[0]).unwrap();
        assert!(drain(&mut rx).is_empty());
        s.on_proactive_due(seqs[1]).unwrap();
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [SessionCommand::FetchProactive { screen: Screen::Creative, .. }]
        ));
    }

    #[test]
    fn mic_toggle_depends_on_state() {
        let (mut s, mut rx) = session(Screen::Dashboard);
        s.on_mic_pressed().unwrap();
        assert_eq!(s.state(), AssistantState::Listening);
        assert_eq!(
            drain(&mut rx),
            [SessionCommand::StartListening { locale: "hi-IN" }]
        );

        // Double entry while listening is ignored.
        s.on_mic_pressed().unwrap();
        assert!(drain(&mut rx).is_empty());

        s.on_utterance("bijli bill").unwrap();
        assert_eq!(s.state(), AssistantState::Processing);
        s.on_mic_pressed().unwrap();
        assert_eq!(s.state(), AssistantState::Processing);
        let seq = match drain(&mut rx).as_slice() {
            [SessionCommand::FetchAssistant { seq, .. }] => *seq,
            other => panic!("unexpected {:?}", other),
        };

        s.on_assistant_response(seq, AssistantResponse::text("Bijli seva")).unwrap();
        assert_eq!(s.state(), AssistantState::Speaking);
        drain(&mut rx);

        s.on_mic_pressed().unwrap();
        assert_eq!(s.state(), AssistantState::Idle);
        assert_eq!(drain(&mut rx), [SessionCommand::StopSpeaking]);
    }

    #[test]
    fn empty_response_returns_to_idle_and_is_not_recorded() {
        let (mut s, mut rx) = session(Screen::Dashboard);
        s.on_mic_pressed().unwrap();
        s.on_utterance("hello").unwrap();
        let seq = s.assistant_seq;
        drain(&mut rx);

        s.on_assistant_response(seq, AssistantResponse::empty()).unwrap();

        assert_eq!(s.state(), AssistantState::Idle);
        assert_eq!(s.history().recent(), ["User: hello"]);
        assert_eq!(drain(&mut rx), [SessionCommand::ShowResponse(None)]);
    }

    #[test]
    fn action_is_dispatched_even_without_text() {
        let (mut s, mut rx) = session(Screen::Dashboard);
        s.on_mic_pressed().unwrap();
        s.on_utterance("go back").unwrap();
        let seq = s.assistant_seq;
        drain(&mut rx);

        let response = AssistantResponse {
            action: Some("go_back".to_string()),
            ..AssistantResponse::default()
        };
        s.on_assistant_response(seq, response).unwrap();
        assert!(drain(&mut rx).contains(&SessionCommand::Dispatch(NavAction::GoBack)));
    }

    #[test]
    fn failed_request_releases_processing() {
        let (mut s, _rx) = session(Screen::Dashboard);
        s.on_mic_pressed().unwrap();
        s.on_utterance("hello").unwrap();
        s.on_assistant_failed(s.assistant_seq, "task panicked");
        assert_eq!(s.state(), AssistantState::Idle);
    }

    #[test]
    fn late_response_after_teardown_is_ignored() {
        let (mut s, mut rx) = session(Screen::Dashboard);
        s.on_mic_pressed().unwrap();
        s.on_utterance("hello").unwrap();
        let seq = s.assistant_seq;
        s.teardown().unwrap();
        drain(&mut rx);

        s.on_assistant_response(seq, AssistantResponse::text("too late")).unwrap();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(s.state(), AssistantState::Idle);
        assert!(s.history().is_empty());
    }

    #[test]
    fn success_countdown_only_redirects_while_on_success() {
        let (mut s, mut rx) = session(Screen::ServiceDetail);
        s.on_location(Screen::Success).unwrap();
        let seq = match drain(&mut rx).as_slice() {
            [SessionCommand::ScheduleRedirect { seq, .. }] => *seq,
            other => panic!("unexpected {:?}", other),
        };
        s.on_redirect_due(seq).unwrap();
        assert_eq!(drain(&mut rx), [SessionCommand::Dispatch(NavAction::ToDashboard)]);

        s.on_location(Screen::Success).unwrap();
        s.on_location(Screen::Dashboard).unwrap();
        assert!(drain(&mut rx).contains(&SessionCommand::CancelRedirect));
        s.on_redirect_due(seq).unwrap();
        assert!(drain(&mut rx).is_empty());
    }
}
