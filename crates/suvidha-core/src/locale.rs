//! Supported written languages and their speech-provider locale tags.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Locale used when a language has no speech mapping.
pub const FALLBACK_SPEECH_LOCALE: &str = "hi-IN";

/// Language the kiosk starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    En,
    #[default]
    Hi,
    Bn,
    Te,
    Mr,
    Ta,
    Gu,
    Kn,
    Ml,
    Pa,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 10] = [
        LanguageCode::En,
        LanguageCode::Hi,
        LanguageCode::Bn,
        LanguageCode::Te,
        LanguageCode::Mr,
        LanguageCode::Ta,
        LanguageCode::Gu,
        LanguageCode::Kn,
        LanguageCode::Ml,
        LanguageCode::Pa,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Hi => "hi",
            LanguageCode::Bn => "bn",
            LanguageCode::Te => "te",
            LanguageCode::Mr => "mr",
            LanguageCode::Ta => "ta",
            LanguageCode::Gu => "gu",
            LanguageCode::Kn => "kn",
            LanguageCode::Ml => "ml",
            LanguageCode::Pa => "pa",
        }
    }

    /// English name, as used in guidance prompts.
    pub fn name(&self) -> &'static str {
        match self {
            LanguageCode::En => "English",
            LanguageCode::Hi => "Hindi",
            LanguageCode::Bn => "Bengali",
            LanguageCode::Te => "Telugu",
            LanguageCode::Mr => "Marathi",
            LanguageCode::Ta => "Tamil",
            LanguageCode::Gu => "Gujarati",
            LanguageCode::Kn => "Kannada",
            LanguageCode::Ml => "Malayalam",
            LanguageCode::Pa => "Punjabi",
        }
    }

    /// Name in its own script, as shown on the language picker.
    pub fn native_name(&self) -> &'static str {
        match self {
            LanguageCode::En => "English",
            LanguageCode::Hi => "हिन्दी",
            LanguageCode::Bn => "বাংলা",
            LanguageCode::Te => "తెలుగు",
            LanguageCode::Mr => "मराठी",
            LanguageCode::Ta => "தமிழ்",
            LanguageCode::Gu => "ગુજરાતી",
            LanguageCode::Kn => "ಕನ್ನಡ",
            LanguageCode::Ml => "മലയാളം",
            LanguageCode::Pa => "ਪੰਜਾਬੀ",
        }
    }

    /// BCP-47 tag handed to recognition and synthesis providers.
    pub fn speech_locale(&self) -> &'static str {
        match self {
            LanguageCode::En => "en-IN",
            LanguageCode::Hi => "hi-IN",
            LanguageCode::Bn => "bn-IN",
            LanguageCode::Te => "te-IN",
            LanguageCode::Mr => "mr-IN",
            LanguageCode::Ta => "ta-IN",
            LanguageCode::Gu => "gu-IN",
            LanguageCode::Kn => "kn-IN",
            LanguageCode::Ml => "ml-IN",
            LanguageCode::Pa => "pa-IN",
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LanguageCode {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let needle = s.trim().to_ascii_lowercase();
        LanguageCode::ALL
            .into_iter()
            .find(|l| l.code() == needle)
            .ok_or_else(|| CoreError::UnknownLanguage(s.to_string()))
    }
}

/// Speech locale for a raw language code; unmapped codes use the baseline locale.
pub fn speech_locale_for_code(code: &str) -> &'static str {
    code.parse::<LanguageCode>()
        .map(|l| l.speech_locale())
        .unwrap_or(FALLBACK_SPEECH_LOCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_language_maps_to_an_indian_locale() {
        for lang in LanguageCode::ALL {
            let tag = lang.speech_locale();
            assert!(tag.starts_with(lang.code()));
            assert!(tag.ends_with("-IN"));
        }
    }

    #[test]
    fn unmapped_code_uses_fallback_locale() {
        assert_eq!(speech_locale_for_code("fr"), FALLBACK_SPEECH_LOCALE);
        assert_eq!(speech_locale_for_code("TA"), "ta-IN");
    }

    #[test]
    fn default_language_is_hindi() {
        assert_eq!(LanguageCode::default(), LanguageCode::Hi);
        assert!("xx".parse::<LanguageCode>().is_err());
    }
}
