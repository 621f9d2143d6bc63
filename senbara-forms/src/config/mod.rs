//! Process configuration.
//!
//! Everything is read from environment variables once at startup; a `.env`
//! file in the working directory is loaded first when present.

use std::path::PathBuf;

use url::Url;

use crate::api::server::ApiServerConfig;
use crate::{Error, Result};

const DEFAULT_DATABASE_URL: &str = "sqlite:senbara.db?mode=rwc";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_SCOPES: &str = "openid email offline_access";
const DEFAULT_LOCALE: &str = "en";
const DEFAULT_SUPPORTED_LOCALES: &str = "en,de";

/// Identity provider client settings.
#[derive(Debug, Clone)]
pub struct OidcConfig {
    /// Issuer base URL; discovery and the logout endpoint hang off it.
    pub issuer: Url,
    pub client_id: String,
    pub client_secret: Option<String>,
    /// Callback URL, also the post-logout redirect target.
    pub redirect_url: Url,
    pub scopes: Vec<String>,
}

/// Links shown on the consent prompt.
#[derive(Debug, Clone, Default)]
pub struct SiteConfig {
    pub privacy_url: Option<String>,
    pub imprint_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LocaleConfig {
    pub default_locale: String,
    pub supported: Vec<String>,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default_locale: DEFAULT_LOCALE.to_string(),
            supported: split_list(DEFAULT_SUPPORTED_LOCALES),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_dir: PathBuf,
    pub server: ApiServerConfig,
    pub oidc: OidcConfig,
    pub site: SiteConfig,
    pub locale: LocaleConfig,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            return Err(Error::config(format!("failed to load .env: {e}")));
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| Error::config(format!("{key} is required")));

        let mut server = ApiServerConfig::default();
        if let Some(bind_address) = var("API_BIND_ADDRESS") {
            server.bind_address = bind_address;
        }
        if let Some(port) = var("API_PORT") {
            server.port = port
                .trim()
                .parse()
                .map_err(|e| Error::config(format!("API_PORT: {e}")))?;
        }
        if let Some(limit) = var("BODY_LIMIT_BYTES") {
            server.body_limit = limit
                .trim()
                .parse()
                .map_err(|e| Error::config(format!("BODY_LIMIT_BYTES: {e}")))?;
        }

        let oidc = OidcConfig {
            issuer: parse_url("OIDC_ISSUER", &required("OIDC_ISSUER")?)?,
            client_id: required("OIDC_CLIENT_ID")?,
            client_secret: var("OIDC_CLIENT_SECRET"),
            redirect_url: parse_url("OIDC_REDIRECT_URL", &required("OIDC_REDIRECT_URL")?)?,
            scopes: var("OIDC_SCOPES")
                .unwrap_or_else(|| DEFAULT_SCOPES.to_string())
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        };

        let mut locale = LocaleConfig::default();
        if let Some(default_locale) = var("DEFAULT_LOCALE") {
            locale.default_locale = default_locale.trim().to_ascii_lowercase();
        }
        if let Some(supported) = var("SUPPORTED_LOCALES") {
            locale.supported = split_list(&supported);
        }
        if !locale.supported.contains(&locale.default_locale) {
            locale.supported.push(locale.default_locale.clone());
        }

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            log_dir: PathBuf::from(var("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string())),
            server,
            oidc,
            site: SiteConfig {
                privacy_url: var("PRIVACY_URL"),
                imprint_url: var("IMPRINT_URL"),
            },
            locale,
        })
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url> {
    Url::parse(value.trim()).map_err(|e| Error::config(format!("{key}: {e}")))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
