//! # SUVIDHA Core - Kiosk Domain Model
//!
//! Everything the kiosk knows without talking to a provider: which screen a location
//! path denotes, the static service catalog, the per-kiosk session, and how symbolic
//! navigation actions become concrete route changes.
//!
//! ```text
//!   location path ──► resolve_screen ──► Screen ──► (voice controller)
//!
//!   "navigate_to_service" ──► NavAction::parse ──► ActionRouter::dispatch
//!        + {serviceId}                                  │        │
//!                                                       ▼        ▼
//!                                               KioskSession  NavigationHost
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod locale;
pub mod navigation;
pub mod router;
pub mod screen;
pub mod session;

pub use catalog::{Catalog, DeepLink, LocalizedText, Service, SubService};
pub use config::KioskConfig;
pub use error::{CoreError, CoreResult};
pub use locale::{speech_locale_for_code, LanguageCode, FALLBACK_SPEECH_LOCALE};
pub use navigation::{MemoryNavigator, NavigationHost};
pub use router::{ActionParams, ActionRouter, NavAction, RouteOutcome};
pub use screen::{
    path_segments, resolve_screen, Screen, CREATIVE_PATH, DASHBOARD_PATH, LOGIN_PATH, STATUS_PATH,
    SUCCESS_PATH, WELCOME_PATH,
};
pub use session::{AuthMethod, KioskSession, User};
