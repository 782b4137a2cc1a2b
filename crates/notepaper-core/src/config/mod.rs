//! Client configuration.
//!
//! Notepaper needs exactly two public values to reach its backend: the
//! Supabase project URL and the project's anon key. Both are safe to ship;
//! secret credentials must never be stored here.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const SUPABASE_URL_ENV: &str = "NOTEPAPER_SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "NOTEPAPER_SUPABASE_ANON_KEY";

/// Validated connection settings for the hosted backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl ClientConfig {
    /// Build a config from raw values, trimming and validating them.
    pub fn new(supabase_url: impl Into<String>, supabase_anon_key: impl Into<String>) -> Result<Self> {
        let supabase_url = normalize_required_http_url(supabase_url.into(), "supabase_url")?;
        let supabase_anon_key =
            normalize_required_value(supabase_anon_key.into(), "supabase_anon_key")?;
        Ok(Self {
            supabase_url,
            supabase_anon_key,
        })
    }

    /// Resolve a config from optional sources, preferring `overrides` field by field.
    ///
    /// Returns `Ok(None)` when neither source provides any value, and an error
    /// when only one of the two required values could be found.
    pub fn resolve(
        overrides: (Option<String>, Option<String>),
        fallback: (Option<String>, Option<String>),
    ) -> Result<Option<Self>> {
        let url = non_blank(overrides.0).or_else(|| non_blank(fallback.0));
        let anon_key =
            non_blank(overrides.1).or_else(|| non_blank(fallback.1));

        match (url, anon_key) {
            (None, None) => Ok(None),
            (Some(url), Some(anon_key)) => Self::new(url, anon_key).map(Some),
            (Some(_), None) => Err(Error::Config(format!(
                "{SUPABASE_ANON_KEY_ENV} is required when a Supabase URL is set"
            ))),
            (None, Some(_)) => Err(Error::Config(format!(
                "{SUPABASE_URL_ENV} is required when a Supabase anon key is set"
            ))),
        }
    }

    /// Read the `NOTEPAPER_SUPABASE_*` environment variables.
    pub fn env_values() -> (Option<String>, Option<String>) {
        (
            std::env::var(SUPABASE_URL_ENV).ok(),
            std::env::var(SUPABASE_ANON_KEY_ENV).ok(),
        )
    }

    /// Base URL of the PostgREST API
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.supabase_url)
    }
}

/// Trimmed value, or `None` when missing or blank.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn has_http_scheme(url: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

fn normalize_required_value(raw: String, field: &str) -> Result<String> {
    non_blank(Some(raw))
        .ok_or_else(|| Error::Config(format!("config field '{field}' is required")))
}

fn normalize_required_http_url(raw: String, field: &str) -> Result<String> {
    let value = normalize_required_value(raw, field)?;
    if has_http_scheme(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(format!(
            "config field '{field}' must include http:// or https://"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_and_strips_trailing_slash() {
        let config = ClientConfig::new(" https://project.supabase.co/ ", " anon ").unwrap();
        assert_eq!(config.supabase_url, "https://project.supabase.co");
        assert_eq!(config.supabase_anon_key, "anon");
        assert_eq!(config.rest_url(), "https://project.supabase.co/rest/v1");
    }

    #[test]
    fn new_rejects_url_without_scheme() {
        let error = ClientConfig::new("project.supabase.co", "anon").unwrap_err();
        assert!(error.to_string().contains("http://"));
    }

    #[test]
    fn resolve_prefers_overrides_per_field() {
        let config = ClientConfig::resolve(
            (Some("https://override.supabase.co".to_string()), None),
            (
                Some("https://profile.supabase.co".to_string()),
                Some("profile-key".to_string()),
            ),
        )
        .unwrap()
        .unwrap();
        assert_eq!(config.supabase_url, "https://override.supabase.co");
        assert_eq!(config.supabase_anon_key, "profile-key");
    }

    #[test]
    fn resolve_without_values_is_none() {
        assert!(ClientConfig::resolve((None, None), (None, Some("  ".to_string())))
            .unwrap()
            .is_none());
    }

    #[test]
    fn blank_values_are_missing() {
        assert_eq!(non_blank(Some(" \t".to_string())), None);
        assert_eq!(non_blank(Some(" key ".to_string())), Some("key".to_string()));
        assert!(has_http_scheme("http://localhost:54321"));
        assert!(!has_http_scheme("ftp://example.com"));
    }

    #[test]
    fn resolve_rejects_partial_config() {
        let error =
            ClientConfig::resolve((Some("https://x.supabase.co".to_string()), None), (None, None))
                .unwrap_err();
        assert!(error.to_string().contains(SUPABASE_ANON_KEY_ENV));
    }
}
