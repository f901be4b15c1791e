//! Kiosk configuration.
//!
//! Precedence: built-in defaults < TOML file (`SUVIDHA_CONFIG`, else `config/kiosk.toml`)
//! < environment variables prefixed `SUVIDHA__` (e.g. `SUVIDHA__GUIDANCE_BASE_URL`).
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | guidance_base_url | http://localhost:3000 | Server proxy hosting `/api/*` guidance and TTS routes. |
//! | tts_enabled | true | Try remote TTS before local synthesis. |
//! | default_language | hi | Language a fresh session starts in. |
//! | history_cap | 10 | Conversation lines passed to guidance calls. |
//! | proactive_debounce_ms | 300 | Delay before screen-entry narration is fetched. |
//! | listen_timeout_secs | 8 | Silence after which a listening attempt ends without a result. |
//! | http_timeout_secs | 60 | Client-side ceiling for provider HTTP calls. |
//! | local_tts_command | espeak-ng | Local speech synthesizer used as the TTS fallback. |
//! | audio_player_command | aplay | Player that receives WAV bytes on stdin. |
//! | success_redirect_secs | 10 | Countdown on the success screen before returning to the dashboard. |

use crate::error::CoreResult;
use crate::locale::LanguageCode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/kiosk.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KioskConfig {
    pub guidance_base_url: String,
    pub tts_enabled: bool,
    pub default_language: LanguageCode,
    pub history_cap: usize,
    pub proactive_debounce_ms: u64,
    pub listen_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub local_tts_command: String,
    pub audio_player_command: String,
    pub success_redirect_secs: u64,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            guidance_base_url: "http://localhost:3000".to_string(),
            tts_enabled: true,
            default_language: LanguageCode::Hi,
            history_cap: 10,
            proactive_debounce_ms: 300,
            listen_timeout_secs: 8,
            http_timeout_secs: 60,
            local_tts_command: "espeak-ng".to_string(),
            audio_player_command: "aplay".to_string(),
            success_redirect_secs: 10,
        }
    }
}

impl KioskConfig {
    /// Load from the default file location and environment.
    pub fn load() -> CoreResult<Self> {
        let path = std::env::var("SUVIDHA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load from an explicit file (missing file => defaults) and environment.
    pub fn load_from(path: &Path) -> CoreResult<Self> {
        let defaults = KioskConfig::default();
        let builder = config::Config::builder()
            .set_default("guidance_base_url", defaults.guidance_base_url)?
            .set_default("tts_enabled", defaults.tts_enabled)?
            .set_default("default_language", defaults.default_language.code())?
            .set_default("history_cap", defaults.history_cap as i64)?
            .set_default("proactive_debounce_ms", defaults.proactive_debounce_ms as i64)?
            .set_default("listen_timeout_secs", defaults.listen_timeout_secs as i64)?
            .set_default("http_timeout_secs", defaults.http_timeout_secs as i64)?
            .set_default("local_tts_command", defaults.local_tts_command)?
            .set_default("audio_player_command", defaults.audio_player_command)?
            .set_default("success_redirect_secs", defaults.success_redirect_secs as i64)?;

        let builder = builder.add_source(config::File::from(path).required(false));

        let built = builder
            .add_source(config::Environment::with_prefix("SUVIDHA").separator("__"))
            .build()?;

        let mut cfg: KioskConfig = built.try_deserialize()?;
        cfg.history_cap = cfg.history_cap.max(1);
        Ok(cfg)
    }

    pub fn proactive_debounce(&self) -> Duration {
        Duration::from_millis(self.proactive_debounce_ms)
    }

    pub fn listen_timeout(&self) -> Duration {
        Duration::from_secs(self.listen_timeout_secs.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn success_redirect(&self) -> Duration {
        Duration::from_secs(self.success_redirect_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = KioskConfig::load_from(&dir.path().join("absent")).unwrap();
        assert_eq!(cfg.proactive_debounce(), Duration::from_millis(300));
        assert_eq!(cfg.default_language, LanguageCode::Hi);
        assert_eq!(cfg.history_cap, 10);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "default_language = \"ta\"\nhistory_cap = 0\nguidance_base_url = \"http://kiosk.local\"").unwrap();

        let cfg = KioskConfig::load_from(&path).unwrap();
        assert_eq!(cfg.default_language, LanguageCode::Ta);
        assert_eq!(cfg.guidance_base_url, "http://kiosk.local");
        // A zero cap would starve guidance calls of context.
        assert_eq!(cfg.history_cap, 1);
    }
}
