//! Kiosk session: the single owner of language, logged-in citizen and selected service.
//!
//! One session exists per kiosk; it is created with defaults at start-up, mutated by
//! login/logout and service selection, and reset to defaults on logout.

use crate::catalog::Service;
use crate::error::{CoreError, CoreResult};
use crate::locale::LanguageCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// How the citizen identified themselves at the login screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// 12-digit Aadhaar number.
    Aadhaar,
    /// 10-digit mobile number.
    Phone,
}

impl AuthMethod {
    pub fn required_digits(&self) -> usize {
        match self {
            AuthMethod::Aadhaar => 12,
            AuthMethod::Phone => 10,
        }
    }

    /// Group digits for display on the keypad readout (4-4-4 or 5-5).
    pub fn format_digits(&self, digits: &str) -> String {
        let group = match self {
            AuthMethod::Aadhaar => 4,
            AuthMethod::Phone => 5,
        };
        digits
            .chars()
            .collect::<Vec<_>>()
            .chunks(group)
            .map(|c| c.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The logged-in citizen.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub id_digits: String,
}

impl User {
    /// Accept a keypad entry when it has exactly the digits the method requires.
    pub fn verify(method: AuthMethod, digits: &str) -> CoreResult<User> {
        let digits = digits.trim();
        if digits.len() != method.required_digits() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::InvalidCredentials(format!(
                "expected {} digits",
                method.required_digits()
            )));
        }
        Ok(User {
            name: "Citizen User".to_string(),
            id_digits: digits.to_string(),
        })
    }

    /// Result of a successful fingerprint scan.
    pub fn biometric() -> User {
        User {
            name: "Verified Citizen".to_string(),
            id_digits: String::new(),
        }
    }

    /// Id with all but the last four digits hidden.
    pub fn masked_id(&self) -> String {
        let n = self.id_digits.chars().count();
        self.id_digits
            .chars()
            .enumerate()
            .map(|(i, c)| if i + 4 < n { 'X' } else { c })
            .collect()
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .field("id_digits", &self.masked_id())
            .finish()
    }
}

/// Mutable per-kiosk state.
#[derive(Debug, Clone, Default)]
pub struct KioskSession {
    language: LanguageCode,
    default_language: LanguageCode,
    user: Option<User>,
    selected_service: Option<Arc<Service>>,
}

impl KioskSession {
    pub fn new(default_language: LanguageCode) -> Self {
        Self {
            language: default_language,
            default_language,
            user: None,
            selected_service: None,
        }
    }

    pub fn language(&self) -> LanguageCode {
        self.language
    }

    pub fn set_language(&mut self, language: LanguageCode) {
        self.language = language;
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn login(&mut self, user: User) {
        info!(user = ?user, "citizen logged in");
        self.user = Some(user);
    }

    pub fn selected_service(&self) -> Option<&Arc<Service>> {
        self.selected_service.as_ref()
    }

    pub fn select_service(&mut self, service: Arc<Service>) {
        self.selected_service = Some(service);
    }

    /// Tear down to start-up defaults.
    pub fn logout(&mut self) {
        info!("session reset to defaults");
        self.user = None;
        self.selected_service = None;
        self.language = self.default_language;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn aadhaar_needs_twelve_digits() {
        assert!(User::verify(AuthMethod::Aadhaar, "123412341234").is_ok());
        assert!(User::verify(AuthMethod::Aadhaar, "12341234123").is_err());
        assert!(User::verify(AuthMethod::Aadhaar, "12341234123a").is_err());
        assert!(User::verify(AuthMethod::Phone, "9876543210").is_ok());
    }

    #[test]
    fn debug_output_masks_identity_digits() {
        let user = User::verify(AuthMethod::Aadhaar, "123412341234").unwrap();
        let shown = format!("{:?}", user);
        assert!(shown.contains("XXXXXXXX1234"));
        assert!(!shown.contains("123412341234"));
    }

    #[test]
    fn keypad_readout_groups_digits() {
        assert_eq!(AuthMethod::Aadhaar.format_digits("123412341234"), "1234 1234 1234");
        assert_eq!(AuthMethod::Phone.format_digits("9876543210"), "98765 43210");
    }

    #[test]
    fn logout_restores_defaults() {
        let catalog = Catalog::builtin().unwrap();
        let mut session = KioskSession::new(LanguageCode::Hi);
        session.set_language(LanguageCode::Ta);
        session.login(User::biometric());
        session.select_service(catalog.find_service("gas").unwrap());

        session.logout();

        assert!(session.user().is_none());
        assert!(session.selected_service().is_none());
        assert_eq!(session.language(), LanguageCode::Hi);
    }
}
