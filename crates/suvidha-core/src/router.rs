//! Navigation Action Router: symbolic actions to concrete in-app transitions.
//!
//! Actions arrive as strings from two places: the guidance service (interpreted speech)
//! and ordinary UI buttons. They are parsed once into [`NavAction`], a closed set, and
//! matched exhaustively. Anything that does not parse is ignored, never an error.

use crate::catalog::Catalog;
use crate::navigation::NavigationHost;
use crate::screen::{
    path_segments, CREATIVE_PATH, DASHBOARD_PATH, LOGIN_PATH, STATUS_PATH, SUCCESS_PATH,
    WELCOME_PATH,
};
use crate::session::KioskSession;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Parameter map carried alongside an action name.
pub type ActionParams = HashMap<String, String>;

/// Every navigation the kiosk knows how to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    ToLogin,
    ToDashboard,
    ToCreative,
    ToStatus,
    ToSuccess,
    ToWelcome,
    ToService { service_id: String },
    ToSubService { service_id: String, sub_service_id: String },
    GoBack,
}

fn param(params: Option<&ActionParams>, key: &str) -> Option<String> {
    params
        .and_then(|p| p.get(key))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A parameter that becomes one path segment; separators would change the route shape.
fn segment_param(params: Option<&ActionParams>, key: &str) -> Option<String> {
    param(params, key).filter(|v| !v.contains(['/', '?', '#']))
}

impl NavAction {
    /// Parse a wire action. Unknown names, or known names missing a required
    /// parameter, yield `None`.
    pub fn parse(name: &str, params: Option<&ActionParams>) -> Option<NavAction> {
        let action = match name.trim() {
            "navigate_to_login" => NavAction::ToLogin,
            "navigate_to_dashboard" => NavAction::ToDashboard,
            "navigate_to_creative" => NavAction::ToCreative,
            "navigate_to_status" => NavAction::ToStatus,
            "navigate_to_success" => NavAction::ToSuccess,
            "navigate_to_welcome" => NavAction::ToWelcome,
            "navigate_to_service" => NavAction::ToService {
                service_id: segment_param(params, "serviceId")?,
            },
            "navigate_to_sub_service" => NavAction::ToSubService {
                service_id: segment_param(params, "serviceId")?,
                sub_service_id: segment_param(params, "subServiceId")?,
            },
            "go_back" => NavAction::GoBack,
            _ => return None,
        };
        Some(action)
    }

    /// Wire name of this action.
    pub fn name(&self) -> &'static str {
        match self {
            NavAction::ToLogin => "navigate_to_login",
            NavAction::ToDashboard => "navigate_to_dashboard",
            NavAction::ToCreative => "navigate_to_creative",
            NavAction::ToStatus => "navigate_to_status",
            NavAction::ToSuccess => "navigate_to_success",
            NavAction::ToWelcome => "navigate_to_welcome",
            NavAction::ToService { .. } => "navigate_to_service",
            NavAction::ToSubService { .. } => "navigate_to_sub_service",
            NavAction::GoBack => "go_back",
        }
    }
}

/// What a dispatch did to the navigation host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Pushed this path.
    Navigated(String),
    /// Used the host's generic history back.
    WentBack,
    /// Nothing changed (unknown action or unknown service).
    Ignored,
}

/// Maps actions to navigation against the static catalog.
#[derive(Debug, Clone)]
pub struct ActionRouter {
    catalog: Arc<Catalog>,
}

impl ActionRouter {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Parse and dispatch a string-typed action.
    pub fn dispatch_named(
        &self,
        name: &str,
        params: Option<&ActionParams>,
        session: &mut KioskSession,
        nav: &mut dyn NavigationHost,
    ) -> RouteOutcome {
        match NavAction::parse(name, params) {
            Some(action) => self.dispatch(&action, session, nav),
            None => {
                debug!(action = %name, "ignoring unrecognised action");
                RouteOutcome::Ignored
            }
        }
    }

    pub fn dispatch(
        &self,
        action: &NavAction,
        session: &mut KioskSession,
        nav: &mut dyn NavigationHost,
    ) -> RouteOutcome {
        let outcome = match action {
            NavAction::ToLogin => push(nav, LOGIN_PATH),
            NavAction::ToDashboard => push(nav, DASHBOARD_PATH),
            NavAction::ToCreative => push(nav, CREATIVE_PATH),
            NavAction::ToStatus => push(nav, STATUS_PATH),
            NavAction::ToSuccess => push(nav, SUCCESS_PATH),
            NavAction::ToWelcome => push(nav, WELCOME_PATH),
            NavAction::ToService { service_id } => match self.catalog.find_service(service_id) {
                Some(service) => {
                    let path = service.dashboard_path();
                    session.select_service(service);
                    push(nav, &path)
                }
                None => RouteOutcome::Ignored,
            },
            // The sub-service id is not validated here; the detail screen handles unknown ids.
            NavAction::ToSubService {
                service_id,
                sub_service_id,
            } => match self.catalog.find_service(service_id) {
                Some(service) => {
                    let path = format!("{}/{}", service.dashboard_path(), sub_service_id);
                    session.select_service(service);
                    push(nav, &path)
                }
                None => RouteOutcome::Ignored,
            },
            NavAction::GoBack => go_back(nav),
        };
        info!(action = action.name(), outcome = ?outcome, "action dispatched");
        outcome
    }
}

fn push(nav: &mut dyn NavigationHost, path: &str) -> RouteOutcome {
    nav.navigate(path);
    RouteOutcome::Navigated(path.to_string())
}

/// Context-sensitive back, by path shape: `/login` -> welcome, `/a/b` -> `/a`, any other
/// single segment (services, status, creative, success, dashboard) -> dashboard, and
/// everything else -> host history.
fn go_back(nav: &mut dyn NavigationHost) -> RouteOutcome {
    let current = nav.current_path();
    let segments = path_segments(&current);
    let target = match segments.as_slice() {
        [single] if format!("/{}", single) == LOGIN_PATH => Some(WELCOME_PATH.to_string()),
        [service, _] => Some(format!("/{}", service)),
        [_] => Some(DASHBOARD_PATH.to_string()),
        _ => None,
    };
    match target {
        Some(path) => push(nav, &path),
        None => {
            nav.back();
            RouteOutcome::WentBack
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::MemoryNavigator;

    fn params(pairs: &[(&str, &str)]) -> ActionParams {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parse_requires_params_for_service_actions() {
        assert_eq!(NavAction::parse("navigate_to_service", None), None);
        assert_eq!(
            NavAction::parse("navigate_to_sub_service", Some(&params(&[("serviceId", "gas")]))),
            None
        );
        assert_eq!(
            NavAction::parse("navigate_to_service", Some(&params(&[("serviceId", " gas ")]))),
            Some(NavAction::ToService {
                service_id: "gas".to_string()
            })
        );
        assert_eq!(NavAction::parse("not_a_real_action", None), None);
    }

    #[test]
    fn names_round_trip() {
        for name in [
            "navigate_to_login",
            "navigate_to_dashboard",
            "navigate_to_creative",
            "navigate_to_status",
            "navigate_to_success",
            "navigate_to_welcome",
            "go_back",
        ] {
            assert_eq!(NavAction::parse(name, None).unwrap().name(), name);
        }
    }

    #[test]
    fn go_back_from_unmatched_path_uses_history() {
        let mut nav = MemoryNavigator::default();
        nav.navigate("/dashboard");
        nav.navigate("/water/a/b");
        assert_eq!(go_back(&mut nav), RouteOutcome::WentBack);
        assert_eq!(nav.current_path(), "/dashboard");
    }

    #[test]
    fn path_separators_in_ids_are_rejected() {
        for id in ["a/b", "a?x=1", "a#top"] {
            assert_eq!(
                NavAction::parse("navigate_to_service", Some(&params(&[("serviceId", id)]))),
                None,
                "{}",
                id
            );
            assert_eq!(
                NavAction::parse(
                    "navigate_to_sub_service",
                    Some(&params(&[("serviceId", "water"), ("subServiceId", id)]))
                ),
                None,
                "{}",
                id
            );
        }
    }
}
