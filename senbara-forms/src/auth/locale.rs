//! Locale resolution from `Accept-Language`.

use axum::http::HeaderValue;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LocaleError {
    #[error("Accept-Language is not visible ASCII")]
    InvalidHeader,

    #[error("malformed Accept-Language entry: {0:?}")]
    MalformedEntry(String),
}

pub trait LocaleResolver: Send + Sync {
    fn resolve(&self, accept_language: Option<&HeaderValue>) -> Result<String, LocaleError>;
}

/// Picks the highest-quality supported language, matching on the primary
/// subtag (`de-AT` selects `de`).
#[derive(Debug, Clone)]
pub struct AcceptLanguageResolver {
    supported: Vec<String>,
    default_locale: String,
}

impl AcceptLanguageResolver {
    pub fn new(supported: Vec<String>, default_locale: impl Into<String>) -> Self {
        Self {
            supported: supported
                .into_iter()
                .map(|l| l.to_ascii_lowercase())
                .collect(),
            default_locale: default_locale.into(),
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }
}

impl LocaleResolver for AcceptLanguageResolver {
    fn resolve(&self, accept_language: Option<&HeaderValue>) -> Result<String, LocaleError> {
        let Some(header) = accept_language else {
            return Ok(self.default_locale.clone());
        };

        let header = header.to_str().map_err(|_| LocaleError::InvalidHeader)?;

        let mut ranges = parse_accept_language(header)?;
        // Stable: equal weights keep header order.
        ranges.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (tag, weight) in ranges {
            if weight <= 0.0 {
                continue;
            }
            if tag == "*" {
                return Ok(self.default_locale.clone());
            }

            let primary = tag.split('-').next().unwrap_or_default().to_ascii_lowercase();
            if let Some(locale) = self.supported.iter().find(|s| **s == primary) {
                return Ok(locale.clone());
            }
        }

        Ok(self.default_locale.clone())
    }
}

fn parse_accept_language(header: &str) -> Result<Vec<(&str, f32)>, LocaleError> {
    let mut ranges = Vec::new();

    for entry in header.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let mut parts = entry.split(';');
        let tag = parts.next().unwrap_or_default().trim();
        if !is_language_range(tag) {
            return Err(LocaleError::MalformedEntry(entry.to_string()));
        }

        let mut weight = 1.0;
        for param in parts {
            let Some((name, value)) = param.trim().split_once('=') else {
                return Err(LocaleError::MalformedEntry(entry.to_string()));
            };
            if name.trim().eq_ignore_ascii_case("q") {
                weight = value
                    .trim()
                    .parse::<f32>()
                    .ok()
                    .filter(|q| (0.0..=1.0).contains(q))
                    .ok_or_else(|| LocaleError::MalformedEntry(entry.to_string()))?;
            }
        }

        ranges.push((tag, weight));
    }

    Ok(ranges)
}

fn is_language_range(tag: &str) -> bool {
    tag == "*"
        || (!tag.is_empty()
            && tag
                .split('-')
                .all(|sub| (1..=8).contains(&sub.len()) && sub.bytes().all(|b| b.is_ascii_alphanumeric())))
}
