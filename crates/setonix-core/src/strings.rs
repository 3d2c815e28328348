//! Localized UI strings carried by the update manifest.
//!
//! Strings are stored per locale and looked up for a single culture with a
//! fallback chain: the exact locale (`en-GB`), then its language (`en`),
//! then English, then an empty string.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

const FALLBACK_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid locale")]
pub struct LocaleParseError(pub String);

/// A language with an optional region, normalized as `ll` or `ll-RR`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    language: String,
    region: Option<String>,
}

impl Locale {
    /// Parse `de`, `en-GB`, `en_GB`, `en_GB.UTF-8` or `sr_RS@latin` style
    /// identifiers. Encoding and modifier suffixes are ignored.
    ///
    /// # Errors
    /// Returns an error unless the language is 2-3 ASCII letters and the
    /// optional region is 2 letters or 3 digits.
    pub fn parse(text: &str) -> Result<Self, LocaleParseError> {
        let invalid = || LocaleParseError(text.to_string());

        let base = text
            .trim()
            .split(['.', '@'])
            .next()
            .unwrap_or_default();
        let mut parts = base.split(['-', '_']);
        let language = parts.next().unwrap_or_default();
        if !(2..=3).contains(&language.len()) || !language.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(invalid());
        }

        let region = match parts.next() {
            None => None,
            Some(region)
                if (region.len() == 2 && region.bytes().all(|b| b.is_ascii_alphabetic()))
                    || (region.len() == 3 && region.bytes().all(|b| b.is_ascii_digit())) =>
            {
                Some(region.to_ascii_uppercase())
            }
            Some(_) => return Err(invalid()),
        };

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            language: language.to_ascii_lowercase(),
            region,
        })
    }

    /// The English fallback locale.
    #[must_use]
    pub fn invariant() -> Self {
        Self {
            language: FALLBACK_LANGUAGE.to_string(),
            region: None,
        }
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    #[must_use]
    pub fn name(&self) -> String {
        match &self.region {
            Some(region) => format!("{}-{region}", self.language),
            None => self.language.clone(),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[derive(Debug, Clone)]
pub struct LocalizedStrings {
    culture: Locale,
    strings: HashMap<String, HashMap<String, String>>,
}

impl LocalizedStrings {
    #[must_use]
    pub fn new(culture: Locale) -> Self {
        Self {
            culture,
            strings: HashMap::new(),
        }
    }

    #[must_use]
    pub fn culture(&self) -> &Locale {
        &self.culture
    }

    /// Add `text` under `key` for `locale`. Returns `false` and keeps the
    /// existing text when the locale already has that key.
    pub fn add(&mut self, locale: &Locale, key: &str, text: &str) -> bool {
        let entries = self.strings.entry(locale.name()).or_default();
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), text.to_string());
        true
    }

    /// The string for `key` in the current culture, falling back to the
    /// culture's language, then English, then `""`.
    #[must_use]
    pub fn get(&self, key: &str) -> &str {
        let candidates = [
            self.culture.name(),
            self.culture.language.clone(),
            FALLBACK_LANGUAGE.to_string(),
        ];
        candidates
            .iter()
            .filter_map(|locale| self.strings.get(locale))
            .find_map(|entries| entries.get(key))
            .map_or("", String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.values().all(HashMap::is_empty)
    }
}
