//! SUVIDHA Kiosk Host
//!
//! Runs the voice assistant against the guidance server and drives it from line
//! commands on stdin, standing in for the touch screen and the microphone.

use anyhow::{bail, Context};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use suvidha_core::{
    ActionParams, ActionRouter, AuthMethod, Catalog, KioskConfig, KioskSession, LanguageCode,
    MemoryNavigator, User,
};
use suvidha_voice::{
    AssistantSnapshot, AssistantState, AudioSink, CommandSynthesizer, CuePlayer, GuidanceClient,
    HttpGuidance, HttpTts, OrchestratorHandle, Providers, RemoteTts, SessionConfig, SpeechOutput,
    TextEntryRecognizer, VoiceOrchestrator, POSTER_ASPECT_RATIOS,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
commands:
  tap                          touch the screen
  mic                          press the floating mic button
  say <text>                   press the mic and speak <text>
  go <action> [key=value ...]  press a button, e.g. go navigate_to_service serviceId=water
  back                         press the back button
  login aadhaar|phone <digits> sign in from the keypad
  login biometric              sign in with the fingerprint reader
  logout
  lang <code>                  en hi bn te mr ta gu kn ml pa
  services                     list the service catalog
  analyze <file> [mime]        upload a bill or document for analysis
  poster <ratio> <prompt>      generate a poster into poster.png
  status                       print the assistant snapshot
  quit";

const POSTER_FILE: &str = "poster.png";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[suvidha-kiosk] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = KioskConfig::load().context("load kiosk configuration")?;
    info!(
        guidance = %config.guidance_base_url,
        tts_enabled = config.tts_enabled,
        language = config.default_language.code(),
        "SUVIDHA kiosk starting"
    );

    let guidance = GuidanceClient::new(Arc::new(HttpGuidance::new(
        config.guidance_base_url.clone(),
        config.http_timeout(),
    )?));
    let remote: Option<Arc<dyn RemoteTts>> = if config.tts_enabled {
        Some(Arc::new(HttpTts::new(&config.guidance_base_url, config.http_timeout())?))
    } else {
        None
    };
    let sink = audio_sink(&config);
    let speech = Arc::new(SpeechOutput::new(
        remote,
        Arc::clone(&sink),
        Arc::new(CommandSynthesizer::new(config.local_tts_command.clone())),
    ));
    let (recognizer, typed) = TextEntryRecognizer::new(config.listen_timeout());

    let catalog = Catalog::builtin().context("load service catalog")?;
    let providers = Providers {
        guidance: guidance.clone(),
        speech,
        recognizer: Arc::new(recognizer),
        cues: Arc::new(CuePlayer::new(sink)),
    };
    let (orchestrator, handle) = VoiceOrchestrator::new(
        SessionConfig::from(&config),
        KioskSession::new(config.default_language),
        ActionRouter::new(Arc::clone(&catalog)),
        Box::new(MemoryNavigator::default()),
        providers,
    );
    let runner = tokio::spawn(orchestrator.run());
    tokio::spawn(render(handle.clone()));

    let console = Console {
        handle: handle.clone(),
        typed,
        guidance,
        catalog,
    };
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match console.run(&line).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break,
                    Err(e) => println!("error: {:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("CTRL-C received; shutting down kiosk");
                break;
            }
        }
    }

    // The loop may already have exited on its own; a failed send is fine then.
    let _ = handle.shutdown();
    match runner.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!(error = %e, "voice orchestrator failed");
            Err(e.into())
        }
        Err(e) => Err(anyhow::anyhow!("voice orchestrator task: {}", e)),
    }
}

#[cfg(feature = "native-audio")]
fn audio_sink(_config: &KioskConfig) -> Arc<dyn AudioSink> {
    Arc::new(suvidha_voice::RodioSink)
}

#[cfg(not(feature = "native-audio"))]
fn audio_sink(config: &KioskConfig) -> Arc<dyn AudioSink> {
    Arc::new(suvidha_voice::CommandAudioSink::new(config.audio_player_command.clone()))
}

/// Print what the screen would show whenever the snapshot changes.
async fn render(handle: OrchestratorHandle) {
    let mut updates = handle.subscribe();
    let mut shown = updates.borrow().clone();
    while updates.changed().await.is_ok() {
        let current = updates.borrow_and_update().clone();
        if current.path != shown.path {
            println!("📍 {} ({})", current.path, current.screen);
        }
        if current.not_found != shown.not_found {
            if let Some(notice) = &current.not_found {
                println!("🚫 {} (type 'back' to return)", notice);
            }
        }
        if current.state != shown.state {
            println!("   assistant: {:?}", current.state);
        }
        if current.last_response != shown.last_response {
            if let Some(text) = &current.last_response {
                println!("💬 {}", text);
            }
        }
        if current.voice_error != shown.voice_error {
            if let Some(message) = &current.voice_error {
                println!("⚠️  {}", message);
            }
        }
        shown = current;
    }
}

enum Flow {
    Continue,
    Quit,
}

struct Console {
    handle: OrchestratorHandle,
    typed: UnboundedSender<String>,
    guidance: GuidanceClient,
    catalog: Arc<Catalog>,
}

impl Console {
    async fn run(&self, line: &str) -> anyhow::Result<Flow> {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "help" | "?" => println!("{}", HELP),
            "tap" => self.handle.interaction()?,
            "mic" => self.handle.mic_pressed()?,
            "say" => self.say(rest)?,
            "go" => {
                let mut words = rest.split_whitespace();
                let Some(name) = words.next() else {
                    bail!("usage: go <action> [key=value ...]");
                };
                self.handle.action(name, parse_params(words)?)?;
            }
            "back" => self.handle.action("go_back", None)?,
            "login" => self.handle.login(parse_login(rest)?)?,
            "logout" => self.handle.logout()?,
            "lang" => {
                let language = LanguageCode::from_str(rest)?;
                println!("language: {} ({})", language.name(), language.native_name());
                self.handle.set_language(language)?;
            }
            "services" => self.list_services(),
            "analyze" => self.analyze(rest).await?,
            "poster" => self.poster(rest).await?,
            "status" => print_snapshot(&self.handle.snapshot())?,
            "quit" | "exit" => return Ok(Flow::Quit),
            other => bail!("unknown command '{}' (try 'help')", other),
        }
        Ok(Flow::Continue)
    }

    /// Push-to-talk: the typed text becomes the next recognized utterance.
    fn say(&self, text: &str) -> anyhow::Result<()> {
        if text.is_empty() {
            bail!("usage: say <text>");
        }
        let state = self.handle.snapshot().state;
        if state != AssistantState::Idle {
            bail!("assistant is busy ({:?}); press 'mic' to interrupt speech", state);
        }
        self.typed
            .send(text.to_string())
            .context("speech input closed")?;
        self.handle.mic_pressed()?;
        Ok(())
    }

    fn list_services(&self) {
        let language = self.handle.snapshot().language;
        for service in self.catalog.services() {
            let title = service
                .localized(language)
                .map(|t| t.title.as_str())
                .unwrap_or(service.id.as_str());
            println!("{} {:<14} {}", service.icon, service.id, title);
            for sub in &service.sub_services {
                let title = sub
                    .localized(language)
                    .map(|t| t.title.as_str())
                    .unwrap_or(sub.id.as_str());
                println!("     {:<16} {}", sub.id, title);
            }
        }
    }

    async fn analyze(&self, args: &str) -> anyhow::Result<()> {
        let mut words = args.split_whitespace();
        let Some(file) = words.next() else {
            bail!("usage: analyze <file> [mime]");
        };
        let mime = match words.next() {
            Some(mime) => mime.to_string(),
            None => guess_mime(Path::new(file))
                .with_context(|| format!("cannot tell the type of '{}'; pass a mime type", file))?
                .to_string(),
        };
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("read {}", file))?;
        let summary = self.guidance.analyze_document(&bytes, &mime).await?;
        println!("📄 {}", summary);
        Ok(())
    }

    async fn poster(&self, args: &str) -> anyhow::Result<()> {
        let (ratio, prompt) = args.split_once(' ').unwrap_or((args, ""));
        if !POSTER_ASPECT_RATIOS.contains(&ratio) || prompt.trim().is_empty() {
            bail!("usage: poster <{}> <prompt>", POSTER_ASPECT_RATIOS.join("|"));
        }
        match self.guidance.generate_poster(prompt, ratio).await {
            Some(png) => {
                tokio::fs::write(POSTER_FILE, &png)
                    .await
                    .with_context(|| format!("write {}", POSTER_FILE))?;
                println!("🖼️  saved {} ({} bytes)", POSTER_FILE, png.len());
            }
            None => println!("no poster was generated"),
        }
        Ok(())
    }
}

fn parse_params<'a>(words: impl Iterator<Item = &'a str>) -> anyhow::Result<Option<ActionParams>> {
    let mut params = ActionParams::new();
    for word in words {
        let Some((key, value)) = word.split_once('=') else {
            bail!("expected key=value, got '{}'", word);
        };
        params.insert(key.to_string(), value.to_string());
    }
    Ok((!params.is_empty()).then_some(params))
}

fn parse_login(args: &str) -> anyhow::Result<User> {
    let (method, digits) = args.split_once(' ').unwrap_or((args, ""));
    let method = match method {
        "biometric" => return Ok(User::biometric()),
        "aadhaar" => AuthMethod::Aadhaar,
        "phone" => AuthMethod::Phone,
        _ => bail!("usage: login aadhaar|phone <digits> | login biometric"),
    };
    let user = User::verify(method, digits)?;
    println!("signed in: {}", method.format_digits(&user.masked_id()));
    Ok(user)
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn print_snapshot(snapshot: &AssistantSnapshot) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(snapshot)?);
    Ok(())
}
