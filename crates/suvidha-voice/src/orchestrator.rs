//! Voice Orchestrator - the kiosk's event loop
//!
//! Owns the kiosk session, the action router, the navigation host and every provider.
//! UI signals arrive through an [`OrchestratorHandle`]; provider results and timer expiries
//! come back as [`SessionEvent`]s on an internal channel. After each input the
//! orchestrator drains the controller's [`SessionCommand`]s and executes them, feeding any
//! resulting location change straight back into the controller.

use crate::chime::{Cue, CuePlayer};
use crate::controller::{AssistantState, SessionCommand, SessionConfig, SessionEvent, VoiceSession};
use crate::error::{VoiceError, VoiceResult};
use crate::guidance::GuidanceClient;
use crate::stt::SpeechRecognizer;
use crate::voice_output::SpeechOutput;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use suvidha_core::{
    resolve_screen, ActionParams, ActionRouter, DeepLink, KioskSession, LanguageCode, NavAction,
    NavigationHost, Screen, Service, User, WELCOME_PATH,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Signals from the kiosk UI.
#[derive(Debug, Clone)]
pub enum KioskEvent {
    /// A click or touch anywhere.
    Interaction,
    /// The floating mic control.
    MicPressed,
    /// An ordinary button mapped to a router action.
    Action { name: String, params: Option<ActionParams> },
    Login(User),
    Logout,
    Language(LanguageCode),
    Shutdown,
}

/// What the UI renders for the assistant and session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantSnapshot {
    pub state: AssistantState,
    pub screen: Screen,
    pub path: String,
    pub language: LanguageCode,
    /// Response bubble text, if shown.
    pub last_response: Option<String>,
    /// Last voice problem (e.g. recognition unsupported); cleared when listening restarts.
    pub voice_error: Option<String>,
    pub logged_in: bool,
    pub selected_service: Option<String>,
    /// Set when the current service route names an unknown service or sub-service.
    pub not_found: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Speech and guidance providers wired into the orchestrator.
pub struct Providers {
    pub guidance: GuidanceClient,
    pub speech: Arc<SpeechOutput>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub cues: Arc<CuePlayer>,
}

/// Cloneable entry point for UI code.
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<KioskEvent>,
    snapshot: watch::Receiver<AssistantSnapshot>,
}

impl OrchestratorHandle {
    pub fn send(&self, event: KioskEvent) -> VoiceResult<()> {
        self.tx
            .send(event)
            .map_err(|e| VoiceError::ChannelSend(e.to_string()))
    }

    pub fn interaction(&self) -> VoiceResult<()> {
        self.send(KioskEvent::Interaction)
    }

    pub fn mic_pressed(&self) -> VoiceResult<()> {
        self.send(KioskEvent::MicPressed)
    }

    pub fn action(&self, name: impl Into<String>, params: Option<ActionParams>) -> VoiceResult<()> {
        self.send(KioskEvent::Action {
            name: name.into(),
            params,
        })
    }

    pub fn login(&self, user: User) -> VoiceResult<()> {
        self.send(KioskEvent::Login(user))
    }

    pub fn logout(&self) -> VoiceResult<()> {
        self.send(KioskEvent::Logout)
    }

    pub fn set_language(&self, language: LanguageCode) -> VoiceResult<()> {
        self.send(KioskEvent::Language(language))
    }

    pub fn shutdown(&self) -> VoiceResult<()> {
        self.send(KioskEvent::Shutdown)
    }

    pub fn snapshot(&self) -> AssistantSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver for change notifications; `changed().await` wakes on every publish.
    pub fn subscribe(&self) -> watch::Receiver<AssistantSnapshot> {
        self.snapshot.clone()
    }
}

/// The main coordination loop.
pub struct VoiceOrchestrator {
    voice: VoiceSession,
    commands: mpsc::UnboundedReceiver<SessionCommand>,

    session: KioskSession,
    router: ActionRouter,
    nav: Box<dyn NavigationHost>,
    last_path: String,
    not_found: Option<String>,

    providers: Providers,

    ui_rx: mpsc::UnboundedReceiver<KioskEvent>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    snapshot_tx: watch::Sender<AssistantSnapshot>,

    proactive_timer: Option<JoinHandle<()>>,
    redirect_timer: Option<JoinHandle<()>>,
    bubble: Option<String>,
    voice_error: Option<String>,
}

impl VoiceOrchestrator {
    pub fn new(
        config: SessionConfig,
        session: KioskSession,
        router: ActionRouter,
        nav: Box<dyn NavigationHost>,
        providers: Providers,
    ) -> (Self, OrchestratorHandle) {
        info!("🎭 Initializing Voice Orchestrator");
        let last_path = nav.current_path();
        let screen = resolve_screen(&last_path);
        let not_found = not_found_notice(&router.catalog().resolve_deep_link(&last_path));
        let (voice, commands) = VoiceSession::new(config, screen, session.language());
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let initial = AssistantSnapshot {
            state: AssistantState::Idle,
            screen,
            path: last_path.clone(),
            language: session.language(),
            last_response: None,
            voice_error: None,
            logged_in: session.is_logged_in(),
            selected_service: session.selected_service().map(|s| s.id.clone()),
            not_found: not_found.clone(),
            updated_at: Utc::now(),
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        let orchestrator = Self {
            voice,
            commands,
            session,
            router,
            nav,
            last_path,
            not_found,
            providers,
            ui_rx,
            events_tx,
            events_rx,
            snapshot_tx,
            proactive_timer: None,
            redirect_timer: None,
            bubble: None,
            voice_error: None,
        };
        let handle = OrchestratorHandle {
            tx: ui_tx,
            snapshot: snapshot_rx,
        };
        (orchestrator, handle)
    }

    /// Run until `Shutdown` or until every handle is dropped.
    pub async fn run(mut self) -> VoiceResult<()> {
        info!(screen = %self.voice.screen(), "🚀 Voice Orchestrator running");
        self.publish();

        loop {
            tokio::select! {
                event = self.ui_rx.recv() => match event {
                    Some(KioskEvent::Shutdown) | None => break,
                    Some(event) => self.on_kiosk_event(event)?,
                },
                Some(event) = self.events_rx.recv() => self.voice.handle(event)?,
            }
            self.drain_commands()?;
            self.publish();
        }

        self.stop();
        info!("🛑 Voice Orchestrator stopped");
        Ok(())
    }

    fn on_kiosk_event(&mut self, event: KioskEvent) -> VoiceResult<()> {
        match event {
            KioskEvent::Interaction => self.voice.record_interaction(),
            KioskEvent::MicPressed => self.voice.on_mic_pressed()?,
            KioskEvent::Action { name, params } => {
                self.voice.record_interaction();
                self.providers.cues.play(Cue::Click);
                self.router
                    .dispatch_named(&name, params.as_ref(), &mut self.session, self.nav.as_mut());
                self.sync_location()?;
            }
            KioskEvent::Login(user) => {
                self.voice.record_interaction();
                self.session.login(user);
                self.router
                    .dispatch(&NavAction::ToDashboard, &mut self.session, self.nav.as_mut());
                self.sync_location()?;
            }
            KioskEvent::Logout => {
                self.session.logout();
                self.nav.navigate(WELCOME_PATH);
                self.sync_location()?;
                self.voice.set_language(self.session.language());
                self.voice.teardown()?;
            }
            KioskEvent::Language(language) => {
                self.voice.record_interaction();
                self.session.set_language(language);
                self.voice.set_language(language);
            }
            KioskEvent::Shutdown => {}
        }
        Ok(())
    }

    /// Feed the current location to the controller if it moved.
    fn sync_location(&mut self) -> VoiceResult<()> {
        let path = self.nav.current_path();
        if path == self.last_path {
            return Ok(());
        }
        let screen = resolve_screen(&path);
        debug!(path = %path, screen = %screen, "location changed");
        self.recover_service(&path);
        self.last_path = path;
        self.voice.on_location(screen)
    }

    /// Re-resolve the service from the route itself, so screens reached through history
    /// show the right service, or a not-found notice with a way back.
    fn recover_service(&mut self, path: &str) {
        let link = self.router.catalog().resolve_deep_link(path);
        self.not_found = not_found_notice(&link);
        if let Some(notice) = &self.not_found {
            warn!(path, notice = %notice, "route names an unknown service");
        }
        match link {
            DeepLink::Service(service)
            | DeepLink::SubService { service, .. }
            | DeepLink::SubServiceNotFound { service, .. } => self.select_if_changed(service),
            DeepLink::ServiceNotFound { .. } | DeepLink::NotAServicePath => {}
        }
    }

    fn select_if_changed(&mut self, service: Arc<Service>) {
        if self.session.selected_service().map(|s| s.id != service.id).unwrap_or(true) {
            self.session.select_service(service);
        }
    }

    fn drain_commands(&mut self) -> VoiceResult<()> {
        while let Ok(command) = self.commands.try_recv() {
            self.execute(command)?;
        }
        Ok(())
    }

    fn execute(&mut self, command: SessionCommand) -> VoiceResult<()> {
        match command {
            SessionCommand::ScheduleProactive { seq, screen, delay } => {
                debug!(seq, screen = %screen, "proactive guidance scheduled");
                let timer = self.timer(delay, SessionEvent::ProactiveDue { seq });
                if let Some(previous) = self.proactive_timer.replace(timer) {
                    previous.abort();
                }
            }
            SessionCommand::CancelProactive => {
                if let Some(timer) = self.proactive_timer.take() {
                    timer.abort();
                }
            }
            SessionCommand::FetchProactive {
                seq,
                screen,
                language,
                history,
            } => {
                let guidance = self.providers.guidance.clone();
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let response = guidance
                        .fetch_proactive_guidance(screen, language, &history)
                        .await;
                    let _ = tx.send(SessionEvent::ProactiveResolved { seq, screen, response });
                });
            }
            SessionCommand::StartListening { locale } => {
                self.voice_error = None;
                let recognizer = Arc::clone(&self.providers.recognizer);
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let event = match recognizer.recognize_once(locale).await {
                        Ok(Some(text)) => SessionEvent::UtteranceRecognized(text),
                        Ok(None) => SessionEvent::ListeningEnded { error: None },
                        Err(e) => SessionEvent::ListeningEnded {
                            error: Some(e.to_string()),
                        },
                    };
                    let _ = tx.send(event);
                });
            }
            SessionCommand::FetchAssistant {
                seq,
                utterance,
                screen,
                language,
                history,
            } => {
                let guidance = self.providers.guidance.clone();
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    // Inner task so a panic still reports back and releases `processing`.
                    let request = tokio::spawn(async move {
                        guidance
                            .fetch_assistant_guidance(&utterance, screen, language, &history)
                            .await
                    });
                    let event = match request.await {
                        Ok(response) => SessionEvent::AssistantResolved { seq, response },
                        Err(e) => SessionEvent::AssistantFailed {
                            seq,
                            error: e.to_string(),
                        },
                    };
                    let _ = tx.send(event);
                });
            }
            SessionCommand::Speak { seq, text, locale } => {
                let tx = self.events_tx.clone();
                match self.providers.speech.speak(&text, locale) {
                    Some(utterance) => {
                        tokio::spawn(async move {
                            if let Err(e) = utterance.await {
                                if e.is_panic() {
                                    error!(error = %e, "speech task panicked");
                                }
                            }
                            // Stopped or superseded utterances carry a stale seq and are ignored.
                            let _ = tx.send(SessionEvent::SpeechFinished { seq });
                        });
                    }
                    None => {
                        let _ = tx.send(SessionEvent::SpeechFinished { seq });
                    }
                }
            }
            SessionCommand::StopSpeaking => self.providers.speech.stop(),
            SessionCommand::PlayChime => self.providers.cues.play(Cue::Success),
            SessionCommand::Dispatch(action) => {
                self.router
                    .dispatch(&action, &mut self.session, self.nav.as_mut());
                self.sync_location()?;
            }
            SessionCommand::ResetGuidance => {
                // Fire-and-forget; failures are logged inside the client.
                drop(self.providers.guidance.reset_session());
            }
            SessionCommand::ShowResponse(text) => self.bubble = text,
            SessionCommand::ReportError(message) => {
                warn!(error = %message, "voice input unavailable");
                self.voice_error = Some(message);
            }
            SessionCommand::ScheduleRedirect { seq, delay } => {
                let timer = self.timer(delay, SessionEvent::RedirectDue { seq });
                if let Some(previous) = self.redirect_timer.replace(timer) {
                    previous.abort();
                }
            }
            SessionCommand::CancelRedirect => {
                if let Some(timer) = self.redirect_timer.take() {
                    timer.abort();
                }
            }
        }
        Ok(())
    }

    fn timer(&self, delay: Duration, event: SessionEvent) -> JoinHandle<()> {
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        })
    }

    fn publish(&self) {
        let snapshot = AssistantSnapshot {
            state: self.voice.state(),
            screen: self.voice.screen(),
            path: self.last_path.clone(),
            language: self.session.language(),
            last_response: self.bubble.clone(),
            voice_error: self.voice_error.clone(),
            logged_in: self.session.is_logged_in(),
            selected_service: self.session.selected_service().map(|s| s.id.clone()),
            not_found: self.not_found.clone(),
            updated_at: Utc::now(),
        };
        self.snapshot_tx.send_if_modified(|current| {
            let changed = current.state != snapshot.state
                || current.screen != snapshot.screen
                || current.path != snapshot.path
                || current.language != snapshot.language
                || current.last_response != snapshot.last_response
                || current.voice_error != snapshot.voice_error
                || current.logged_in != snapshot.logged_in
                || current.selected_service != snapshot.selected_service
                || current.not_found != snapshot.not_found;
            if changed {
                *current = snapshot;
            }
            changed
        });
    }

    fn stop(&mut self) {
        for timer in [self.proactive_timer.take(), self.redirect_timer.take()]
            .into_iter()
            .flatten()
        {
            timer.abort();
        }
        self.providers.speech.stop();
    }
}

/// Notice for a service route the catalog cannot satisfy.
fn not_found_notice(link: &DeepLink) -> Option<String> {
    match link {
        DeepLink::ServiceNotFound { service_id } => Some(format!("Service '{}' not found", service_id)),
        DeepLink::SubServiceNotFound {
            service,
            sub_service_id,
        } => Some(format!(
            "Service option '{}' not found under '{}'",
            sub_service_id, service.id
        )),
        _ => None,
    }
}
