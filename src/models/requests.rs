//! Request DTOs for the diagnostics API
//!
//! Defines the structure of incoming query strings.

use serde::Deserialize;

use crate::locale::{parse_locale_list, Locale};

/// Query of the resolve endpoint (GET /entities/:id?locales=en,de)
///
/// # Fields
/// - `locales`: Comma separated locales; the cache's prefetch locales if absent
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveQuery {
    /// Comma separated locale list
    #[serde(default)]
    pub locales: Option<String>,
}

impl ResolveQuery {
    /// Validates the query
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        match &self.locales {
            Some(raw) if parse_locale_list(raw).is_empty() => {
                Some("Locales cannot be empty".to_string())
            }
            _ => None,
        }
    }

    /// Requested locales; empty means the cache defaults.
    pub fn locales(&self) -> Vec<Locale> {
        self.locales
            .as_deref()
            .map(parse_locale_list)
            .unwrap_or_default()
    }
}
