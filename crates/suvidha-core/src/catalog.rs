//! Static catalog of civic services and their sub-services.
//!
//! The catalog ships inside the binary as TOML and is parsed once; every consumer
//! shares the same immutable `Arc<Catalog>`. Screens reached directly by URL
//! (bypassing the router) re-resolve their service here via [`Catalog::resolve_deep_link`].

use crate::error::{CoreError, CoreResult};
use crate::locale::LanguageCode;
use crate::screen::{path_segments, resolve_screen, Screen};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

static BUILTIN: OnceCell<Arc<Catalog>> = OnceCell::new();

/// Title and description in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub title: String,
    pub description: String,
}

/// A specific transaction type offered under a parent service (e.g. "Bill Payment").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubService {
    pub id: String,
    pub icon: String,
    pub color: String,
    /// Translation key for the call-to-action label (`apply_now`, `request_now`, `book_now`).
    pub action_label_key: String,
    pub translations: HashMap<LanguageCode, LocalizedText>,
}

/// A civic service shown as a dashboard card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub icon: String,
    pub color: String,
    #[serde(default)]
    pub sub_services: Vec<SubService>,
    pub translations: HashMap<LanguageCode, LocalizedText>,
}

fn localized(map: &HashMap<LanguageCode, LocalizedText>, lang: LanguageCode) -> Option<&LocalizedText> {
    map.get(&lang).or_else(|| map.get(&LanguageCode::En))
}

impl SubService {
    /// Text in `lang`, falling back to English.
    pub fn localized(&self, lang: LanguageCode) -> Option<&LocalizedText> {
        localized(&self.translations, lang)
    }
}

impl Service {
    /// Text in `lang`, falling back to English.
    pub fn localized(&self, lang: LanguageCode) -> Option<&LocalizedText> {
        localized(&self.translations, lang)
    }

    pub fn find_sub_service(&self, sub_service_id: &str) -> Option<&SubService> {
        self.sub_services.iter().find(|s| s.id == sub_service_id)
    }

    /// Route of this service's sub-dashboard.
    pub fn dashboard_path(&self) -> String {
        format!("/{}", self.id)
    }
}

/// Result of resolving a service route without help from the session.
#[derive(Debug, Clone, PartialEq)]
pub enum DeepLink {
    /// `/{serviceId}` with a known service.
    Service(Arc<Service>),
    /// `/{serviceId}/{subServiceId}` with both ids known.
    SubService { service: Arc<Service>, sub_service_id: String },
    /// Service id not in the catalog; the screen shows "service not found" with a way back.
    ServiceNotFound { service_id: String },
    /// Known service but unknown sub-service id.
    SubServiceNotFound { service: Arc<Service>, sub_service_id: String },
    /// Path is not a one- or two-segment service route.
    NotAServicePath,
}

/// Immutable list of services.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    services: Vec<Arc<Service>>,
}

#[derive(Deserialize)]
struct CatalogFile {
    services: Vec<Service>,
}

impl Catalog {
    /// Parse a catalog document. Service ids must be unique and non-empty.
    pub fn from_toml_str(raw: &str) -> CoreResult<Self> {
        let file: CatalogFile = toml::from_str(raw)?;
        let mut seen = std::collections::HashSet::new();
        for service in &file.services {
            if service.id.trim().is_empty() {
                return Err(CoreError::Catalog("service with empty id".to_string()));
            }
            if !seen.insert(service.id.clone()) {
                return Err(CoreError::Catalog(format!("duplicate service id '{}'", service.id)));
            }
        }
        Ok(Self {
            services: file.services.into_iter().map(Arc::new).collect(),
        })
    }

    /// The catalog embedded in the binary, parsed on first use.
    pub fn builtin() -> CoreResult<Arc<Catalog>> {
        BUILTIN
            .get_or_try_init(|| Catalog::from_toml_str(BUILTIN_CATALOG).map(Arc::new))
            .cloned()
    }

    pub fn services(&self) -> &[Arc<Service>] {
        &self.services
    }

    pub fn find_service(&self, service_id: &str) -> Option<Arc<Service>> {
        self.services.iter().find(|s| s.id == service_id).cloned()
    }

    /// Recover the service (and sub-service) a location path points at.
    pub fn resolve_deep_link(&self, path: &str) -> DeepLink {
        if !matches!(resolve_screen(path), Screen::ServiceDashboard | Screen::ServiceDetail) {
            return DeepLink::NotAServicePath;
        }
        let segments = path_segments(path);
        let (service_id, sub_service_id) = match segments.as_slice() {
            [service] => (*service, None),
            [service, sub] => (*service, Some(*sub)),
            _ => return DeepLink::NotAServicePath,
        };
        let Some(service) = self.find_service(service_id) else {
            return DeepLink::ServiceNotFound {
                service_id: service_id.to_string(),
            };
        };
        match sub_service_id {
            None => DeepLink::Service(service),
            Some(sub) if service.find_sub_service(sub).is_some() => DeepLink::SubService {
                service,
                sub_service_id: sub.to_string(),
            },
            Some(sub) => DeepLink::SubServiceNotFound {
                service,
                sub_service_id: sub.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_six_services_with_three_options_each() {
        let catalog = Catalog::builtin().unwrap();
        let ids: Vec<&str> = catalog.services().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["electricity", "water", "gas", "waste", "health", "certificates"]);
        for service in catalog.services() {
            assert_eq!(service.sub_services.len(), 3, "{}", service.id);
            for lang in LanguageCode::ALL {
                assert!(service.localized(lang).is_some());
            }
        }
    }

    #[test]
    fn localized_text_falls_back_to_english() {
        let raw = r#"
            [[services]]
            id = "water"
            icon = "droplet"
            color = "bg-cyan-500"
            translations.en = { title = "Water", description = "Supply" }
        "#;
        let catalog = Catalog::from_toml_str(raw).unwrap();
        let water = catalog.find_service("water").unwrap();
        assert_eq!(water.localized(LanguageCode::Ta).unwrap().title, "Water");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let raw = r#"
            [[services]]
            id = "gas"
            icon = "flame"
            color = "x"
            translations = {}

            [[services]]
            id = "gas"
            icon = "flame"
            color = "x"
            translations = {}
        "#;
        assert!(matches!(Catalog::from_toml_str(raw), Err(CoreError::Catalog(_))));
    }

    #[test]
    fn deep_links_resolve_or_report_not_found() {
        let catalog = Catalog::builtin().unwrap();
        assert!(matches!(catalog.resolve_deep_link("/electricity"), DeepLink::Service(s) if s.id == "electricity"));
        assert!(matches!(
            catalog.resolve_deep_link("/waste/collection"),
            DeepLink::SubService { sub_service_id, .. } if sub_service_id == "collection"
        ));
        assert!(matches!(
            catalog.resolve_deep_link("/telecom/recharge"),
            DeepLink::ServiceNotFound { service_id } if service_id == "telecom"
        ));
        assert!(matches!(
            catalog.resolve_deep_link("/gas/teleport"),
            DeepLink::SubServiceNotFound { .. }
        ));
        assert_eq!(catalog.resolve_deep_link("/"), DeepLink::NotAServicePath);
        // Fixed single-segment routes are screens, not unknown services.
        for path in ["/dashboard", "/status", "/success", "/creative", "/login"] {
            assert_eq!(catalog.resolve_deep_link(path), DeepLink::NotAServicePath, "{}", path);
        }
    }
}
