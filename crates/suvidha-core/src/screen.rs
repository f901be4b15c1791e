//! Logical screen identity derived from the navigation location.
//!
//! The kiosk never stores "which screen am I on" separately from the path; it is
//! recomputed from the location on every change. Two-level service routes are
//! dynamic: `/{serviceId}` is a service dashboard and `/{serviceId}/{subServiceId}`
//! is a sub-service detail form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the user is currently looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Welcome,
    Login,
    Dashboard,
    ServiceDashboard,
    ServiceDetail,
    Status,
    Success,
    Creative,
}

impl Screen {
    pub const ALL: [Screen; 8] = [
        Screen::Welcome,
        Screen::Login,
        Screen::Dashboard,
        Screen::ServiceDashboard,
        Screen::ServiceDetail,
        Screen::Status,
        Screen::Success,
        Screen::Creative,
    ];

    /// Wire name sent to the guidance service as `currentContext`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Welcome => "welcome",
            Screen::Login => "login",
            Screen::Dashboard => "dashboard",
            Screen::ServiceDashboard => "service_dashboard",
            Screen::ServiceDetail => "service_detail",
            Screen::Status => "status",
            Screen::Success => "success",
            Screen::Creative => "creative",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed routes, in the order they are checked.
pub const WELCOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const STATUS_PATH: &str = "/status";
pub const SUCCESS_PATH: &str = "/success";
pub const CREATIVE_PATH: &str = "/creative";

/// Strip any query string or fragment; they never affect screen identity.
fn strip_suffix(path: &str) -> &str {
    let end = path.find(|c: char| c == '?' || c == '#').unwrap_or(path.len());
    &path[..end]
}

/// Non-empty `/`-separated segments of a location path.
pub fn path_segments(path: &str) -> Vec<&str> {
    strip_suffix(path).split('/').filter(|s| !s.is_empty()).collect()
}

/// Map a location path to its logical screen. Total: every input yields a screen.
pub fn resolve_screen(path: &str) -> Screen {
    match strip_suffix(path) {
        WELCOME_PATH => return Screen::Welcome,
        LOGIN_PATH => return Screen::Login,
        DASHBOARD_PATH => return Screen::Dashboard,
        STATUS_PATH => return Screen::Status,
        SUCCESS_PATH => return Screen::Success,
        CREATIVE_PATH => return Screen::Creative,
        _ => {}
    }
    match path_segments(path).len() {
        1 => Screen::ServiceDashboard,
        2 => Screen::ServiceDetail,
        _ => Screen::Welcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_routes_resolve_directly() {
        assert_eq!(resolve_screen("/"), Screen::Welcome);
        assert_eq!(resolve_screen("/login"), Screen::Login);
        assert_eq!(resolve_screen("/dashboard"), Screen::Dashboard);
        assert_eq!(resolve_screen("/status"), Screen::Status);
        assert_eq!(resolve_screen("/success"), Screen::Success);
        assert_eq!(resolve_screen("/creative"), Screen::Creative);
    }

    #[test]
    fn dynamic_routes_by_segment_count() {
        assert_eq!(resolve_screen("/electricity"), Screen::ServiceDashboard);
        assert_eq!(resolve_screen("/electricity/bill-payment"), Screen::ServiceDetail);
        assert_eq!(resolve_screen("/unknown/deep/path"), Screen::Welcome);
    }

    #[test]
    fn odd_inputs_fall_back_to_welcome() {
        assert_eq!(resolve_screen(""), Screen::Welcome);
        assert_eq!(resolve_screen("//"), Screen::Welcome);
        assert_eq!(resolve_screen("/a/b/c/d"), Screen::Welcome);
    }

    #[test]
    fn query_and_trailing_slash_do_not_change_identity() {
        assert_eq!(resolve_screen("/login?lang=hi"), Screen::Login);
        assert_eq!(resolve_screen("/water/"), Screen::ServiceDashboard);
        assert_eq!(resolve_screen("/water/bill-payment#form"), Screen::ServiceDetail);
    }

    #[test]
    fn wire_names_round_trip_through_serde() {
        for screen in Screen::ALL {
            let json = serde_json::to_string(&screen).unwrap();
            assert_eq!(json, format!("\"{}\"", screen.as_str()));
        }
    }
}
