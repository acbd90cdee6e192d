//! Locale Module
//!
//! Language identifiers scoping localized payloads, plus coverage helpers.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

// == Locale ==
/// A language/region identifier such as `en` or `pt-br`.
///
/// Stored lower-cased so `EN` and `en` address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locale(String);

impl Locale {
    /// Creates a locale from any string, normalizing case and whitespace.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_lowercase())
    }

    /// Returns the normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Locale {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let locale = Locale::new(s);
        if locale.0.is_empty() {
            return Err(CacheError::InvalidRequest("Locale cannot be empty".to_string()));
        }
        Ok(locale)
    }
}

// == Locale Parsing ==
/// Parses a comma separated list (`"en, de,hu"`), skipping empty items.
pub fn parse_locale_list(raw: &str) -> Vec<Locale> {
    let mut seen = BTreeSet::new();
    raw.split(',')
        .filter_map(|part| part.parse::<Locale>().ok())
        .filter(|locale| seen.insert(locale.clone()))
        .collect()
}

// == Missing Locales ==
/// Returns the locales of `wanted` that are not present in `available`.
pub fn missing_locales<'a>(
    wanted: impl IntoIterator<Item = &'a Locale>,
    available: &BTreeSet<Locale>,
) -> BTreeSet<Locale> {
    wanted
        .into_iter()
        .filter(|locale| !available.contains(*locale))
        .cloned()
        .collect()
}
