//! Guidance client: the kiosk's only outbound conversational dependency.
//!
//! [`GuidanceService`] is the raw provider seam (HTTP in production, fakes in tests).
//! [`GuidanceClient`] wraps it with the absorption contract: fetches always resolve to an
//! [`AssistantResponse`] (empty on any failure), reset is fire-and-forget.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use suvidha_core::{ActionParams, LanguageCode, NavAction, Screen};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Largest document accepted for analysis.
pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

/// Shown in place of an analysis when the provider call fails.
pub const ANALYSIS_FAILED: &str = "Analysis failed. Please try again.";

/// Poster aspect ratios offered on the creative screen.
pub const POSTER_ASPECT_RATIOS: [&str; 5] = ["1:1", "3:4", "4:3", "9:16", "16:9"];

/// Spoken text plus an optional navigation intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<ActionParams>,
}

impl AssistantResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// The action as a router intent; unknown names or missing params yield `None`.
    pub fn nav_action(&self) -> Option<NavAction> {
        let name = self.action.as_deref()?;
        NavAction::parse(name, self.params.as_ref())
    }

    /// Parse a provider body leniently.
    ///
    /// A JSON object contributes `text`, `action` and `params` (non-string param values
    /// are stringified); a JSON string or plain text becomes `text` with no action.
    /// HTML or XML bodies yield an empty response.
    pub fn from_body(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => {
                let text = map
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let action = map
                    .get("action")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string);
                let params = map.get("params").and_then(Value::as_object).map(|obj| {
                    obj.iter()
                        .filter(|(_, v)| !v.is_null())
                        .map(|(k, v)| {
                            let value = match v {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            };
                            (k.clone(), value)
                        })
                        .collect::<ActionParams>()
                });
                Self { text, action, params }
            }
            Ok(Value::String(text)) => Self::text(text),
            Ok(_) => Self::empty(),
            // Markup here is an error or proxy page, not something to read aloud.
            Err(_) if raw.trim_start().starts_with('<') => {
                warn!(chars = raw.len(), "guidance body is markup, not a reply; ignoring");
                Self::empty()
            }
            Err(_) => Self::text(raw.trim()),
        }
    }
}

/// Raw guidance provider. Errors propagate; absorption happens in [`GuidanceClient`].
#[async_trait]
pub trait GuidanceService: Send + Sync {
    /// Narration for a newly entered screen.
    async fn proactive(
        &self,
        screen: Screen,
        language: LanguageCode,
        history: &[String],
    ) -> VoiceResult<AssistantResponse>;

    /// Interpretation of a spoken utterance in the context of the current screen.
    async fn assistant(
        &self,
        utterance: &str,
        screen: Screen,
        language: LanguageCode,
        history: &[String],
    ) -> VoiceResult<AssistantResponse>;

    /// Clear server-side conversation state.
    async fn reset(&self) -> VoiceResult<()>;

    /// Summarise an uploaded document (base64 payload).
    async fn analyze_document(&self, base64_data: &str, mime_type: &str) -> VoiceResult<String>;

    /// Generate a poster image; returns base64 PNG data when the provider produced one.
    async fn generate_poster(&self, prompt: &str, aspect_ratio: &str) -> VoiceResult<Option<String>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProactiveRequest<'a> {
    current_context: &'a str,
    language: &'a str,
    user_history: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssistantRequest<'a> {
    user_input: &'a str,
    current_context: &'a str,
    language: &'a str,
    user_history: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRequest<'a> {
    base64_data: &'a str,
    mime_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PosterRequest<'a> {
    prompt: &'a str,
    aspect_ratio: &'a str,
}

/// Guidance over the kiosk's server proxy (`/api/*`). Provider keys never leave the server.
#[derive(Debug, Clone)]
pub struct HttpGuidance {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGuidance {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Config(format!("guidance HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}/api/{}", self.base_url, route)
    }

    async fn post<B: Serialize + ?Sized>(&self, route: &str, body: &B) -> VoiceResult<String> {
        let res = self.client.post(self.url(route)).json(body).send().await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || (!status.is_success() && text.contains("RESOURCE_EXHAUSTED"))
        {
            return Err(VoiceError::RateLimited(format!("/api/{} returned {}", route, status)));
        }
        if !status.is_success() {
            return Err(VoiceError::Guidance(format!("/api/{} returned {}: {}", route, status, text)));
        }
        Ok(text)
    }
}

#[async_trait]
impl GuidanceService for HttpGuidance {
    async fn proactive(
        &self,
        screen: Screen,
        language: LanguageCode,
        history: &[String],
    ) -> VoiceResult<AssistantResponse> {
        let body = ProactiveRequest {
            current_context: screen.as_str(),
            language: language.code(),
            user_history: history,
        };
        let raw = self.post("proactive", &body).await?;
        Ok(AssistantResponse::from_body(&raw))
    }

    async fn assistant(
        &self,
        utterance: &str,
        screen: Screen,
        language: LanguageCode,
        history: &[String],
    ) -> VoiceResult<AssistantResponse> {
        let body = AssistantRequest {
            user_input: utterance,
            current_context: screen.as_str(),
            language: language.code(),
            user_history: history,
        };
        let raw = self.post("assistant", &body).await?;
        Ok(AssistantResponse::from_body(&raw))
    }

    async fn reset(&self) -> VoiceResult<()> {
        self.post("reset-session", &serde_json::json!({})).await?;
        Ok(())
    }

    async fn analyze_document(&self, base64_data: &str, mime_type: &str) -> VoiceResult<String> {
        let raw = self
            .post("analyze-document", &DocumentRequest { base64_data, mime_type })
            .await?;
        let text = AssistantResponse::from_body(&raw).text;
        if text.trim().is_empty() {
            Ok("Analysis complete.".to_string())
        } else {
            Ok(text)
        }
    }

    async fn generate_poster(&self, prompt: &str, aspect_ratio: &str) -> VoiceResult<Option<String>> {
        let raw = self
            .post("generate-poster", &PosterRequest { prompt, aspect_ratio })
            .await?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| VoiceError::Guidance(format!("poster response: {}", e)))?;
        Ok(value
            .get("imageData")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }
}

/// Failure-absorbing facade over a [`GuidanceService`].
///
/// The client does not deduplicate concurrent calls; the session controller tags each
/// request with a sequence number and drops stale results.
#[derive(Clone)]
pub struct GuidanceClient {
    service: Arc<dyn GuidanceService>,
}

impl GuidanceClient {
    pub fn new(service: Arc<dyn GuidanceService>) -> Self {
        Self { service }
    }

    /// Screen-entry narration. Any failure yields an empty response.
    pub async fn fetch_proactive_guidance(
        &self,
        screen: Screen,
        language: LanguageCode,
        history: &[String],
    ) -> AssistantResponse {
        match self.service.proactive(screen, language, history).await {
            Ok(response) => response,
            Err(e) => {
                absorb("proactive", &e);
                AssistantResponse::empty()
            }
        }
    }

    /// Response to a user utterance. Any failure yields an empty response with no action.
    pub async fn fetch_assistant_guidance(
        &self,
        utterance: &str,
        screen: Screen,
        language: LanguageCode,
        history: &[String],
    ) -> AssistantResponse {
        match self.service.assistant(utterance, screen, language, history).await {
            Ok(response) => response,
            Err(e) => {
                absorb("assistant", &e);
                AssistantResponse::empty()
            }
        }
    }

    /// Best-effort reset of server-side history. The returned handle may be dropped.
    pub fn reset_session(&self) -> JoinHandle<()> {
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            match service.reset().await {
                Ok(()) => info!("guidance session reset"),
                Err(e) => absorb("reset", &e),
            }
        })
    }

    /// Analyse an uploaded document.
    ///
    /// Oversized files and non-image/PDF types are rejected before any call; provider
    /// failures become [`ANALYSIS_FAILED`].
    pub async fn analyze_document(&self, bytes: &[u8], mime_type: &str) -> VoiceResult<String> {
        if bytes.len() > MAX_DOCUMENT_BYTES {
            return Err(VoiceError::DocumentRejected(format!(
                "file is {} bytes; the limit is 5MB",
                bytes.len()
            )));
        }
        let mime = mime_type.trim().to_ascii_lowercase();
        if !(mime.starts_with("image/") || mime == "application/pdf") {
            return Err(VoiceError::DocumentRejected(format!(
                "unsupported type '{}'",
                mime_type
            )));
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        match self.service.analyze_document(&encoded, &mime).await {
            Ok(text) => Ok(text),
            Err(e) => {
                absorb("analyze-document", &e);
                Ok(ANALYSIS_FAILED.to_string())
            }
        }
    }

    /// Generate a civic-awareness poster. Returns decoded PNG bytes, or `None` on any failure.
    pub async fn generate_poster(&self, prompt: &str, aspect_ratio: &str) -> Option<Vec<u8>> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }
        let aspect_ratio = if POSTER_ASPECT_RATIOS.contains(&aspect_ratio) {
            aspect_ratio
        } else {
            debug!(aspect_ratio, "unknown aspect ratio, using 1:1");
            POSTER_ASPECT_RATIOS[0]
        };
        match self.service.generate_poster(prompt, aspect_ratio).await {
            Ok(Some(data)) => match base64::engine::general_purpose::STANDARD.decode(data.trim()) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(error = %e, "poster payload was not base64");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                absorb("generate-poster", &e);
                None
            }
        }
    }
}

fn absorb(call: &str, err: &VoiceError) {
    match err {
        VoiceError::RateLimited(_) | VoiceError::Http(_) | VoiceError::Guidance(_) => {
            warn!(call, error = %err, "guidance call failed; continuing without guidance")
        }
        _ => error!(call, error = %err, "unexpected guidance failure"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action_and_stringifies_params() {
        let body = r#"{"text":"Opening water","action":"navigate_to_service","params":{"serviceId":"water","n":3}}"#;
        let response = AssistantResponse::from_body(body);
        assert_eq!(response.text, "Opening water");
        assert_eq!(
            response.nav_action(),
            Some(NavAction::ToService {
                service_id: "water".to_string()
            })
        );
        assert_eq!(response.params.unwrap().get("n").map(String::as_str), Some("3"));
    }

    #[test]
    fn plain_text_body_becomes_text_without_action() {
        let response = AssistantResponse::from_body("  Namaste!  ");
        assert_eq!(response.text, "Namaste!");
        assert!(response.action.is_none());
    }

    #[test]
    fn markup_body_is_not_spoken() {
        for body in [
            "<!DOCTYPE html><html><body>502 Bad Gateway</body></html>",
            "  <html>maintenance</html>",
        ] {
            assert_eq!(AssistantResponse::from_body(body), AssistantResponse::empty());
        }
    }

    #[test]
    fn unknown_action_has_no_intent() {
        let response = AssistantResponse::from_body(r#"{"text":"ok","action":"launch_rocket"}"#);
        assert_eq!(response.action.as_deref(), Some("launch_rocket"));
        assert_eq!(response.nav_action(), None);
    }

    #[test]
    fn request_bodies_use_camel_case() {
        let history = vec!["User: hi".to_string()];
        let body = serde_json::to_value(AssistantRequest {
            user_input: "bill",
            current_context: Screen::Dashboard.as_str(),
            language: "hi",
            user_history: &history,
        })
        .unwrap();
        assert_eq!(body["userInput"], "bill");
        assert_eq!(body["currentContext"], "dashboard");
        assert_eq!(body["userHistory"][0], "User: hi");
    }
}
