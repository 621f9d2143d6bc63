//! OpenID Connect client.
//!
//! Implements [`IdentityVerifier`] and [`TokenExchanger`] against a provider
//! discovered through `/.well-known/openid-configuration`.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use parking_lot::{Mutex, RwLock};
use std::time::Instant;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::provider::{CredentialPair, IdentityVerifier, OidcError, TokenExchanger, VerifiedIdentity};
use crate::config::OidcConfig;

const DEFAULT_ID_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Minimum time between two key set refetches triggered by unknown key ids.
pub const DEFAULT_JWKS_REFETCH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// The subset of the discovery document used here.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

pub struct OidcClient {
    http: reqwest::Client,
    config: OidcConfig,
    metadata: ProviderMetadata,
    authorization_endpoint: Url,
    keys: RwLock<JwkSet>,
    last_refetch: Mutex<Option<Instant>>,
    refetch_interval: std::time::Duration,
}

impl OidcClient {
    /// Fetch the provider's discovery document and signing keys.
    pub async fn discover(http: reqwest::Client, config: OidcConfig) -> Result<Self, OidcError> {
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            config.issuer.as_str().trim_end_matches('/')
        );

        let metadata: ProviderMetadata = http
            .get(&discovery_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| OidcError::Discovery(e.to_string()))?
            .json()
            .await
            .map_err(|e| OidcError::Discovery(e.to_string()))?;

        let keys = fetch_jwks(&http, &metadata.jwks_uri).await?;

        info!(
            issuer = %config.issuer,
            keys = keys.keys.len(),
            "Discovered identity provider"
        );

        Self::with_metadata(http, config, metadata, keys)
    }

    /// Build a client from already known provider metadata and keys.
    pub fn with_metadata(
        http: reqwest::Client,
        config: OidcConfig,
        metadata: ProviderMetadata,
        keys: JwkSet,
    ) -> Result<Self, OidcError> {
        let authorization_endpoint = Url::parse(&metadata.authorization_endpoint).map_err(|e| {
            OidcError::Discovery(format!("invalid authorization endpoint: {e}"))
        })?;

        Ok(Self {
            http,
            config,
            metadata,
            authorization_endpoint,
            keys: RwLock::new(keys),
            last_refetch: Mutex::new(None),
            refetch_interval: DEFAULT_JWKS_REFETCH_INTERVAL,
        })
    }

    pub fn with_refetch_interval(mut self, interval: std::time::Duration) -> Self {
        self.refetch_interval = interval;
        self
    }

    pub fn issuer(&self) -> &Url {
        &self.config.issuer
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[&self.config.client_id]);
        // Url always renders an empty path as "/".
        let issuer = self.config.issuer.as_str();
        validation.set_issuer(&[issuer, issuer.trim_end_matches('/')]);
        validation
    }

    fn cached_keys(&self, kid: Option<&str>) -> Vec<Jwk> {
        let keys = self.keys.read();
        keys.keys
            .iter()
            .filter(|jwk| kid.is_none() || jwk.common.key_id.as_deref() == kid)
            .cloned()
            .collect()
    }

    /// Claim the refetch slot unless one was taken within the interval.
    fn try_start_refetch(&self) -> bool {
        let mut last = self.last_refetch.lock();
        let now = Instant::now();
        if last.is_some_and(|at| now.duration_since(at) < self.refetch_interval) {
            return false;
        }
        *last = Some(now);
        true
    }

    /// Keys that may have signed a token with key id `kid`.
    ///
    /// An unknown key id triggers a refetch of the key set, at most once per
    /// refetch interval.
    async fn candidate_keys(&self, kid: Option<&str>) -> Result<Vec<Jwk>, OidcError> {
        let keys = self.cached_keys(kid);
        if !keys.is_empty() || kid.is_none() {
            return Ok(keys);
        }

        if !self.try_start_refetch() {
            debug!(kid = ?kid, "Unknown signing key, JWKS refetch throttled");
            return Ok(keys);
        }

        debug!(kid = ?kid, "Unknown signing key, refetching JWKS");
        let fresh = fetch_jwks(&self.http, &self.metadata.jwks_uri).await?;
        *self.keys.write() = fresh;

        Ok(self.cached_keys(kid))
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<CredentialPair, OidcError> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.push(("client_id", self.config.client_id.as_str()));
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let response = self
            .http
            .post(&self.metadata.token_endpoint)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OidcError::Exchange(format!("{status}: {body}")));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| OidcError::Exchange(e.to_string()))?;

        let lifetime = tokens
            .expires_in
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_ID_TOKEN_LIFETIME_SECS);

        Ok(CredentialPair {
            id_token: tokens.id_token.filter(|t| !t.is_empty()),
            expires_at: Utc::now() + Duration::seconds(lifetime),
            refresh_token: tokens.refresh_token.filter(|t| !t.is_empty()),
        })
    }
}

async fn fetch_jwks(http: &reqwest::Client, jwks_uri: &str) -> Result<JwkSet, OidcError> {
    http.get(jwks_uri)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| OidcError::Jwks(e.to_string()))?
        .json()
        .await
        .map_err(|e| OidcError::Jwks(e.to_string()))
}

#[async_trait]
impl IdentityVerifier for OidcClient {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, OidcError> {
        let header =
            decode_header(id_token).map_err(|e| OidcError::InvalidToken(e.to_string()))?;
        let validation = self.validation(header.alg);

        let candidates = self.candidate_keys(header.kid.as_deref()).await?;
        if candidates.is_empty() {
            return Err(OidcError::InvalidToken("no matching signing key".to_string()));
        }

        let mut last_error = None;
        for jwk in &candidates {
            let key = match DecodingKey::from_jwk(jwk) {
                Ok(key) => key,
                Err(e) => {
                    warn!(kid = ?jwk.common.key_id, error = %e, "Skipping unusable signing key");
                    continue;
                }
            };

            match decode::<Value>(id_token, &key, &validation) {
                Ok(data) => return Ok(VerifiedIdentity { claims: data.claims }),
                Err(e) => last_error = Some(e),
            }
        }

        Err(OidcError::InvalidToken(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no usable signing key".to_string()),
        ))
    }
}

#[async_trait]
impl TokenExchanger for OidcClient {
    fn authorization_url(&self, state: &str) -> String {
        let scope = self.config.scopes.join(" ");

        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_url.as_str())
            .append_pair("scope", &scope)
            .append_pair("state", state);

        url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<CredentialPair, OidcError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_url.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, OidcError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http_client::build_http_client;
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SECRET: &[u8] = b"test-secret-key-32-chars-long!!";
    const SECRET_B64: &str = "dGVzdC1zZWNyZXQta2V5LTMyLWNoYXJzLWxvbmchIQ";

    fn config(issuer: &str) -> OidcConfig {
        OidcConfig {
            issuer: Url::parse(issuer).unwrap(),
            client_id: "senbara".to_string(),
            client_secret: Some("s3cret".to_string()),
            redirect_url: Url::parse("https://forms.example.com/authorize").unwrap(),
            scopes: vec!["openid".to_string(), "email".to_string()],
        }
    }

    fn metadata(base: &str) -> ProviderMetadata {
        ProviderMetadata {
            authorization_endpoint: "https://auth.example.com/oidc/auth".to_string(),
            token_endpoint: format!("{base}/token"),
            jwks_uri: format!("{base}/jwks"),
        }
    }

    fn keys_with_id(kid: &str) -> JwkSet {
        serde_json::from_value(json!({
            "keys": [{ "kty": "oct", "kid": kid, "alg": "HS256", "k": SECRET_B64 }]
        }))
        .unwrap()
    }

    fn keys() -> JwkSet {
        keys_with_id("k1")
    }

    fn client(issuer: &str, token_base: &str) -> OidcClient {
        OidcClient::with_metadata(
            build_http_client(std::time::Duration::from_secs(5)).unwrap(),
            config(issuer),
            metadata(token_base),
            keys(),
        )
        .unwrap()
    }

    fn sign(claims: Value, kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = kid.map(str::to_string);
        encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn claims(issuer: &str) -> Value {
        json!({
            "iss": issuer,
            "aud": "senbara",
            "exp": Utc::now().timestamp() + 600,
            "email": "alice@example.com",
            "email_verified": true,
        })
    }

    #[test]
    fn test_authorization_url() {
        let client = client("https://auth.example.com/", "http://127.0.0.1:9");
        let url = Url::parse(&client.authorization_url("%2Fcontacts")).unwrap();

        assert_eq!(url.path(), "/oidc/auth");
        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "senbara");
        assert_eq!(query["redirect_uri"], "https://forms.example.com/authorize");
        assert_eq!(query["scope"], "openid email");
        assert_eq!(query["state"], "%2Fcontacts");
    }

    #[tokio::test]
    async fn test_verify_valid_token() {
        let issuer = "https://auth.example.com/";
        let client = client(issuer, "http://127.0.0.1:9");

        let token = sign(claims(issuer), Some("k1"));
        let identity = client.verify(&token).await.unwrap();
        assert_eq!(identity.claims["email"], "alice@example.com");

        let token = sign(claims(issuer), None);
        assert!(client.verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_rejects_wrong_audience_and_expired() {
        let issuer = "https://auth.example.com/";
        let client = client(issuer, "http://127.0.0.1:9");

        let mut wrong_audience = claims(issuer);
        wrong_audience["aud"] = json!("someone-else");
        let token = sign(wrong_audience, Some("k1"));
        assert!(matches!(
            client.verify(&token).await,
            Err(OidcError::InvalidToken(_))
        ));

        let mut expired = claims(issuer);
        expired["exp"] = json!(Utc::now().timestamp() - 3600);
        let token = sign(expired, Some("k1"));
        assert!(client.verify(&token).await.is_err());

        assert!(client.verify("not-a-jwt").await.is_err());
    }

    async fn spawn_token_endpoint() -> String {
        let app = Router::new().route(
            "/token",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                match form.get("grant_type").map(String::as_str) {
                    Some("authorization_code") if form.get("code").map(String::as_str) == Some("c1") => {
                        Json(json!({
                            "access_token": "a",
                            "id_token": "id-1",
                            "refresh_token": "r-1",
                            "expires_in": 300,
                        }))
                        .into_response()
                    }
                    Some("refresh_token") => Json(json!({
                        "access_token": "a",
                        "id_token": "id-2",
                    }))
                    .into_response(),
                    _ => (
                        axum::http::StatusCode::BAD_REQUEST,
                        Json(json!({ "error": "invalid_grant" })),
                    )
                        .into_response(),
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}")
    }

    use axum::response::IntoResponse;

    #[tokio::test]
    async fn test_token_exchange() {
        let base = spawn_token_endpoint().await;
        let client = client("https://auth.example.com/", &base);

        let pair = client.exchange_code("c1").await.unwrap();
        assert_eq!(pair.id_token.as_deref(), Some("id-1"));
        assert_eq!(pair.refresh_token.as_deref(), Some("r-1"));
        let lifetime = pair.expires_at - Utc::now();
        assert!(lifetime <= Duration::seconds(300) && lifetime > Duration::seconds(290));

        let pair = client.refresh("r-1").await.unwrap();
        assert_eq!(pair.id_token.as_deref(), Some("id-2"));
        assert_eq!(pair.refresh_token, None);
        assert!(pair.expires_at - Utc::now() > Duration::seconds(3500));

        assert!(matches!(
            client.exchange_code("bad").await,
            Err(OidcError::Exchange(_))
        ));
    }

    /// Serves a key set holding only `k2` and counts the requests.
    async fn spawn_jwks_endpoint() -> (String, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();
        let app = Router::new().route(
            "/jwks",
            axum::routing::get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::to_value(keys_with_id("k2")).unwrap())
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), fetches)
    }

    #[tokio::test]
    async fn test_rotated_key_is_fetched() {
        let issuer = "https://auth.example.com/";
        let (base, fetches) = spawn_jwks_endpoint().await;
        let client = client(issuer, &base);

        let token = sign(claims(issuer), Some("k2"));
        let identity = client.verify(&token).await.unwrap();
        assert_eq!(identity.claims["email"], "alice@example.com");
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // Cached from now on.
        client.verify(&token).await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_key_ids_are_throttled() {
        let issuer = "https://auth.example.com/";
        let (base, fetches) = spawn_jwks_endpoint().await;
        let client = client(issuer, &base);

        for i in 0..50 {
            let token = sign(claims(issuer), Some(&format!("forged-{i}")));
            assert!(matches!(
                client.verify(&token).await,
                Err(OidcError::InvalidToken(_))
            ));
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refetch_allowed_after_interval() {
        let issuer = "https://auth.example.com/";
        let (base, fetches) = spawn_jwks_endpoint().await;
        let client =
            client(issuer, &base).with_refetch_interval(std::time::Duration::from_millis(50));

        let token = sign(claims(issuer), Some("forged"));
        assert!(client.verify(&token).await.is_err());
        assert!(client.verify(&token).await.is_err());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert!(client.verify(&token).await.is_err());
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
