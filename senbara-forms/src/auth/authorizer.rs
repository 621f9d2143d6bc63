//! Per-request session authorization.
//!
//! A session is rebuilt from the two credential cookies on every request;
//! nothing is stored server-side. [`SessionAuthorizer::authorize`] turns the
//! request into an [`Authorization`] decision, and every cookie change it
//! wants is returned as [`CookieUpdates`] for the handler to apply.

use std::sync::Arc;

use axum::http::header::{ACCEPT_LANGUAGE, REFERER};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::claims::IdentityClaims;
use super::cookies::{CookieUpdates, RequestCookies};
use super::locale::{LocaleError, LocaleResolver};
use super::provider::{IdentityVerifier, TokenExchanger, VerifiedIdentity};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("could not localize: {0}")]
    Localization(#[from] LocaleError),

    #[error("could not login: {0}")]
    Login(String),

    #[error("could not login: email not verified")]
    EmailNotVerified,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Localization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Login(_) | Self::EmailNotVerified => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Whether the authorizer may redirect and write cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Read-only: never redirects, never refreshes, never writes cookies.
    /// Anything short of a verified identity yields an anonymous session.
    Probe,
    /// May refresh credentials, redirect to the provider, or ask for consent.
    Enforcing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub logout_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Option<Identity>,
    pub locale: String,
}

/// Outcome of authorizing one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Authorization {
    /// Verified identity. `cookies` holds refreshed credentials, if any.
    SignedIn {
        identity: Identity,
        locale: String,
        cookies: CookieUpdates,
    },
    /// Probe mode without a usable identity.
    Anonymous(Session),
    /// Send the caller to `location`; the handler must stop here.
    Redirect { location: String },
    /// First visit without consent; render the consent prompt and stop.
    ConsentRequired { locale: String },
}

impl Authorization {
    /// Whether the handler must stop and respond with the decision itself.
    pub fn must_redirect(&self) -> bool {
        matches!(self, Self::Redirect { .. } | Self::ConsentRequired { .. })
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Redirect { .. } => StatusCode::FOUND,
            _ => StatusCode::OK,
        }
    }

    pub fn session(&self) -> Session {
        match self {
            Self::SignedIn {
                identity, locale, ..
            } => Session {
                identity: Some(identity.clone()),
                locale: locale.clone(),
            },
            Self::Anonymous(session) => session.clone(),
            Self::ConsentRequired { locale } => Session {
                identity: None,
                locale: locale.clone(),
            },
            Self::Redirect { .. } => Session {
                identity: None,
                locale: String::new(),
            },
        }
    }
}

/// What the authorizer needs from an HTTP request.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    pub cookies: RequestCookies,
    pub referer: Option<String>,
    /// Path and query of the request itself.
    pub request_url: String,
    /// `consent=on` was submitted.
    pub consent: bool,
    pub accept_language: Option<HeaderValue>,
}

impl AuthRequest {
    pub fn from_parts(headers: &HeaderMap, uri: &Uri) -> Self {
        let consent = uri
            .query()
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .any(|(key, value)| key == "consent" && is_consent(&value))
            })
            .unwrap_or(false);

        Self {
            cookies: RequestCookies::from_headers(headers),
            referer: headers
                .get(REFERER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            request_url: uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
            consent,
            accept_language: headers.get(ACCEPT_LANGUAGE).cloned(),
        }
    }

    /// Override the consent flag with a submitted form field.
    pub fn with_consent(mut self, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.consent = is_consent(value);
        }
        self
    }

    /// Where to land after a round trip through the provider.
    pub fn return_url(&self) -> &str {
        self.referer
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or("/")
    }
}

fn is_consent(value: &str) -> bool {
    value.trim() == "on"
}

pub struct SessionAuthorizer {
    verifier: Arc<dyn IdentityVerifier>,
    exchanger: Arc<dyn TokenExchanger>,
    locales: Arc<dyn LocaleResolver>,
    issuer: Url,
    post_logout_redirect_url: String,
}

impl SessionAuthorizer {
    pub fn new(
        verifier: Arc<dyn IdentityVerifier>,
        exchanger: Arc<dyn TokenExchanger>,
        locales: Arc<dyn LocaleResolver>,
        issuer: Url,
        post_logout_redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            verifier,
            exchanger,
            locales,
            issuer,
            post_logout_redirect_url: post_logout_redirect_url.into(),
        }
    }

    pub fn locale(&self, accept_language: Option<&HeaderValue>) -> Result<String, AuthError> {
        Ok(self.locales.resolve(accept_language)?)
    }

    pub async fn authorize(
        &self,
        req: &AuthRequest,
        mode: AuthMode,
    ) -> Result<Authorization, AuthError> {
        let locale = self.locale(req.accept_language.as_ref())?;

        match mode {
            AuthMode::Probe => self.probe(req, locale).await,
            AuthMode::Enforcing => self.enforce(req, locale).await,
        }
    }

    async fn probe(&self, req: &AuthRequest, locale: String) -> Result<Authorization, AuthError> {
        let anonymous = |locale: String| {
            Ok(Authorization::Anonymous(Session {
                identity: None,
                locale,
            }))
        };

        if req.cookies.refresh_token().is_none() {
            return anonymous(locale);
        }
        let Some(id_token) = req.cookies.id_token() else {
            return anonymous(locale);
        };

        let verified = match self.verifier.verify(id_token).await {
            Ok(verified) => verified,
            Err(e) => {
                debug!(error = %e, "Identity token rejected in probe");
                return anonymous(locale);
            }
        };

        let claims = decode_claims(&verified)?;
        if !claims.email_verified {
            return anonymous(locale);
        }

        Ok(Authorization::SignedIn {
            identity: Identity {
                email: claims.email,
                logout_url: self.logout_url(id_token)?,
            },
            locale,
            cookies: CookieUpdates::new(),
        })
    }

    async fn enforce(&self, req: &AuthRequest, locale: String) -> Result<Authorization, AuthError> {
        let Some(refresh_token) = req.cookies.refresh_token() else {
            if req.consent {
                return Ok(self.redirect_to_provider(req.return_url()));
            }
            return Ok(Authorization::ConsentRequired { locale });
        };

        let Some(stored_id_token) = req.cookies.id_token() else {
            // A refresh token means consent was given before; no interstitial
            // page, so the provider brings the caller back to this URL.
            return Ok(self.redirect_to_provider(&req.request_url));
        };

        let mut cookies = CookieUpdates::new();

        let (id_token, verified) = match self.verifier.verify(stored_id_token).await {
            Ok(verified) => (stored_id_token.to_string(), verified),
            Err(e) => {
                debug!(error = %e, "Identity token rejected, refreshing");
                match self.refresh(refresh_token, &mut cookies).await {
                    Some(refreshed) => refreshed,
                    None => return Ok(self.redirect_to_provider(req.return_url())),
                }
            }
        };

        let claims = decode_claims(&verified)?;
        if !claims.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        Ok(Authorization::SignedIn {
            identity: Identity {
                email: claims.email,
                logout_url: self.logout_url(&id_token)?,
            },
            locale,
            cookies,
        })
    }

    /// Trade the refresh token for new credentials.
    ///
    /// `None` means the caller has to sign in again.
    async fn refresh(
        &self,
        refresh_token: &str,
        cookies: &mut CookieUpdates,
    ) -> Option<(String, VerifiedIdentity)> {
        let pair = match self.exchanger.refresh(refresh_token).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, "Token refresh failed");
                return None;
            }
        };

        let Some(id_token) = pair.id_token else {
            debug!("Token refresh returned no identity token");
            return None;
        };

        let verified = match self.verifier.verify(&id_token).await {
            Ok(verified) => verified,
            Err(e) => {
                warn!(error = %e, "Refreshed identity token rejected");
                return None;
            }
        };

        if let Some(new_refresh_token) = pair.refresh_token.as_deref() {
            cookies.set_refresh_token(new_refresh_token);
        }
        cookies.set_id_token(&id_token, pair.expires_at);

        Some((id_token, verified))
    }

    fn redirect_to_provider(&self, return_url: &str) -> Authorization {
        Authorization::Redirect {
            location: self.sign_in_url(return_url),
        }
    }

    /// Provider authorization URL whose `state` carries the escaped
    /// `return_url`.
    pub fn sign_in_url(&self, return_url: &str) -> String {
        self.exchanger
            .authorization_url(&urlencoding::encode(return_url))
    }

    /// `{issuer}/oidc/logout?id_token_hint=..&post_logout_redirect_uri=..`
    pub fn logout_url(&self, id_token: &str) -> Result<String, AuthError> {
        let mut url = self.issuer.clone();

        url.path_segments_mut()
            .map_err(|_| AuthError::Login(format!("issuer {} cannot be a base", self.issuer)))?
            .pop_if_empty()
            .extend(["oidc", "logout"]);

        url.query_pairs_mut()
            .append_pair("id_token_hint", id_token)
            .append_pair("post_logout_redirect_uri", &self.post_logout_redirect_url);

        Ok(url.into())
    }

    /// Exchange an authorization code for credential cookies.
    pub async fn complete_sign_in(&self, code: &str) -> Result<CookieUpdates, AuthError> {
        let pair = self
            .exchanger
            .exchange_code(code)
            .await
            .map_err(|e| AuthError::Login(e.to_string()))?;

        let id_token = pair
            .id_token
            .as_deref()
            .ok_or_else(|| AuthError::Login("no identity token in response".to_string()))?;

        let mut cookies = CookieUpdates::new();
        if let Some(refresh_token) = pair.refresh_token.as_deref() {
            cookies.set_refresh_token(refresh_token);
        }
        cookies.set_id_token(id_token, pair.expires_at);

        Ok(cookies)
    }

    pub fn sign_out(&self) -> CookieUpdates {
        let mut cookies = CookieUpdates::new();
        cookies.clear_credentials();
        cookies
    }
}

fn decode_claims(verified: &VerifiedIdentity) -> Result<IdentityClaims, AuthError> {
    IdentityClaims::decode(&verified.claims).map_err(|e| AuthError::Login(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::cookies::{ID_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
    use crate::auth::locale::AcceptLanguageResolver;
    use crate::auth::provider::{CredentialPair, OidcError};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REDIRECT_URL: &str = "https://forms.example.com/authorize";

    struct FakeVerifier {
        tokens: HashMap<String, Value>,
    }

    impl FakeVerifier {
        fn new(tokens: &[(&str, Value)]) -> Self {
            Self {
                tokens: tokens
                    .iter()
                    .map(|(t, c)| (t.to_string(), c.clone()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl IdentityVerifier for FakeVerifier {
        async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, OidcError> {
            self.tokens
                .get(id_token)
                .map(|claims| VerifiedIdentity {
                    claims: claims.clone(),
                })
                .ok_or_else(|| OidcError::InvalidToken("expired".to_string()))
        }
    }

    #[derive(Default)]
    struct FakeExchanger {
        refresh_result: Mutex<Option<CredentialPair>>,
        code_result: Mutex<Option<CredentialPair>>,
        refresh_calls: AtomicUsize,
    }

    impl FakeExchanger {
        fn refreshing_to(pair: CredentialPair) -> Self {
            Self {
                refresh_result: Mutex::new(Some(pair)),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl TokenExchanger for FakeExchanger {
        fn authorization_url(&self, state: &str) -> String {
            Url::parse_with_params("https://auth.example.com/oidc/auth", &[("state", state)])
                .unwrap()
                .to_string()
        }

        async fn exchange_code(&self, _code: &str) -> Result<CredentialPair, OidcError> {
            self.code_result
                .lock()
                .clone()
                .ok_or_else(|| OidcError::Exchange("invalid_grant".to_string()))
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<CredentialPair, OidcError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_result
                .lock()
                .clone()
                .ok_or_else(|| OidcError::Exchange("invalid_grant".to_string()))
        }
    }

    struct FailingLocales;

    impl LocaleResolver for FailingLocales {
        fn resolve(&self, _: Option<&HeaderValue>) -> Result<String, LocaleError> {
            Err(LocaleError::InvalidHeader)
        }
    }

    fn verified_claims(email: &str) -> Value {
        json!({ "email": email, "email_verified": true })
    }

    fn expiry() -> DateTime<Utc> {
        DateTime::from_timestamp(2_000_000_000, 0).unwrap()
    }

    fn authorizer(
        verifier: FakeVerifier,
        exchanger: Arc<FakeExchanger>,
    ) -> SessionAuthorizer {
        SessionAuthorizer::new(
            Arc::new(verifier),
            exchanger,
            Arc::new(AcceptLanguageResolver::new(
                vec!["en".to_string(), "de".to_string()],
                "en",
            )),
            Url::parse("https://auth.example.com/").unwrap(),
            REDIRECT_URL,
        )
    }

    fn request(cookies: &[(&str, &str)]) -> AuthRequest {
        let cookies = cookies
            .iter()
            .fold(RequestCookies::default(), |c, (name, value)| c.with(name, value));
        AuthRequest {
            cookies,
            referer: Some("https://forms.example.com/contacts".to_string()),
            request_url: "/journal?page=2".to_string(),
            consent: false,
            accept_language: None,
        }
    }

    fn state_of(location: &str) -> String {
        Url::parse(location)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_visit_requires_consent() {
        let auth = authorizer(FakeVerifier::new(&[]), Arc::default());

        let decision = auth
            .authorize(&request(&[]), AuthMode::Enforcing)
            .await
            .unwrap();

        assert_eq!(
            decision,
            Authorization::ConsentRequired {
                locale: "en".to_string()
            }
        );
        assert!(decision.must_redirect());
        assert_eq!(decision.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_consent_redirects_with_referer_state() {
        let auth = authorizer(FakeVerifier::new(&[]), Arc::default());
        let req = request(&[]).with_consent(Some(" on "));

        let decision = auth.authorize(&req, AuthMode::Enforcing).await.unwrap();

        let Authorization::Redirect { location } = &decision else {
            panic!("expected redirect, got {decision:?}");
        };
        assert!(location.starts_with("https://auth.example.com/oidc/auth?"));
        assert_eq!(
            state_of(location),
            urlencoding::encode("https://forms.example.com/contacts")
        );
        assert_eq!(decision.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_consent_without_referer_returns_home() {
        let auth = authorizer(FakeVerifier::new(&[]), Arc::default());
        let mut req = request(&[]).with_consent(Some("on"));
        req.referer = Some("   ".to_string());

        let decision = auth.authorize(&req, AuthMode::Enforcing).await.unwrap();

        let Authorization::Redirect { location } = decision else {
            panic!("expected redirect");
        };
        assert_eq!(state_of(&location), "%2F");
    }

    #[tokio::test]
    async fn test_refresh_token_without_id_token_skips_consent() {
        let auth = authorizer(FakeVerifier::new(&[]), Arc::default());
        let req = request(&[(REFRESH_TOKEN_COOKIE, "r1")]).with_consent(Some("on"));

        let decision = auth.authorize(&req, AuthMode::Enforcing).await.unwrap();

        let Authorization::Redirect { location } = decision else {
            panic!("expected redirect");
        };
        assert_eq!(state_of(&location), urlencoding::encode("/journal?page=2"));
    }

    #[tokio::test]
    async fn test_valid_session() {
        let auth = authorizer(
            FakeVerifier::new(&[("id-1", verified_claims("alice@example.com"))]),
            Arc::default(),
        );
        let req = request(&[(REFRESH_TOKEN_COOKIE, "r1"), (ID_TOKEN_COOKIE, "id-1")]);

        let decision = auth.authorize(&req, AuthMode::Enforcing).await.unwrap();

        let Authorization::SignedIn {
            identity, cookies, ..
        } = decision
        else {
            panic!("expected signed in");
        };
        assert_eq!(identity.email, "alice@example.com");
        assert_eq!(
            identity.logout_url,
            "https://auth.example.com/oidc/logout?id_token_hint=id-1&post_logout_redirect_uri=https%3A%2F%2Fforms.example.com%2Fauthorize"
        );
        assert!(cookies.is_empty());
    }

    #[tokio::test]
    async fn test_unverified_email_is_unauthorized() {
        let auth = authorizer(
            FakeVerifier::new(&[(
                "id-1",
                json!({ "email": "alice@example.com", "email_verified": false }),
            )]),
            Arc::default(),
        );
        let req = request(&[(REFRESH_TOKEN_COOKIE, "r1"), (ID_TOKEN_COOKIE, "id-1")]);

        let err = auth
            .authorize(&req, AuthMode::Enforcing)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::EmailNotVerified));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_overwrites_both_cookies() {
        let exchanger = Arc::new(FakeExchanger::refreshing_to(CredentialPair {
            id_token: Some("id-2".to_string()),
            expires_at: expiry(),
            refresh_token: Some("r2".to_string()),
        }));
        let auth = authorizer(
            FakeVerifier::new(&[("id-2", verified_claims("alice@example.com"))]),
            exchanger.clone(),
        );
        let req = request(&[(REFRESH_TOKEN_COOKIE, "r1"), (ID_TOKEN_COOKIE, "id-old")]);

        let decision = auth.authorize(&req, AuthMode::Enforcing).await.unwrap();

        let Authorization::SignedIn {
            identity, cookies, ..
        } = decision
        else {
            panic!("expected signed in");
        };
        assert_eq!(exchanger.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(identity.logout_url.contains("id_token_hint=id-2"));
        assert_eq!(cookies.get(REFRESH_TOKEN_COOKIE).unwrap().value(), "r2");
        let id_cookie = cookies.get(ID_TOKEN_COOKIE).unwrap();
        assert_eq!(id_cookie.value(), "id-2");
        assert_eq!(
            id_cookie.expires_datetime().unwrap().unix_timestamp(),
            expiry().timestamp()
        );
    }

    #[tokio::test]
    async fn test_refresh_without_new_refresh_token_keeps_old_one() {
        let exchanger = Arc::new(FakeExchanger::refreshing_to(CredentialPair {
            id_token: Some("id-2".to_string()),
            expires_at: expiry(),
            refresh_token: None,
        }));
        let auth = authorizer(
            FakeVerifier::new(&[("id-2", verified_claims("alice@example.com"))]),
            exchanger,
        );
        let req = request(&[(REFRESH_TOKEN_COOKIE, "r1"), (ID_TOKEN_COOKIE, "id-old")]);

        let decision = auth.authorize(&req, AuthMode::Enforcing).await.unwrap();

        let Authorization::SignedIn { cookies, .. } = decision else {
            panic!("expected signed in");
        };
        assert!(cookies.get(REFRESH_TOKEN_COOKIE).is_none());
        assert_eq!(cookies.get(ID_TOKEN_COOKIE).unwrap().value(), "id-2");
    }

    #[tokio::test]
    async fn test_failed_refresh_redirects() {
        let auth = authorizer(FakeVerifier::new(&[]), Arc::default());
        let req = request(&[(REFRESH_TOKEN_COOKIE, "r1"), (ID_TOKEN_COOKIE, "id-old")]);

        let decision = auth.authorize(&req, AuthMode::Enforcing).await.unwrap();

        let Authorization::Redirect { location } = decision else {
            panic!("expected redirect");
        };
        assert_eq!(
            state_of(&location),
            urlencoding::encode("https://forms.example.com/contacts")
        );
    }

    #[tokio::test]
    async fn test_refresh_without_usable_id_token_redirects() {
        for id_token in [None, Some("id-unknown".to_string())] {
            let exchanger = Arc::new(FakeExchanger::refreshing_to(CredentialPair {
                id_token,
                expires_at: expiry(),
                refresh_token: Some("r2".to_string()),
            }));
            let auth = authorizer(FakeVerifier::new(&[]), exchanger);
            let req = request(&[(REFRESH_TOKEN_COOKIE, "r1"), (ID_TOKEN_COOKIE, "id-old")]);

            let decision = auth.authorize(&req, AuthMode::Enforcing).await.unwrap();
            assert!(matches!(decision, Authorization::Redirect { .. }));
        }
    }

    #[tokio::test]
    async fn test_undecodable_claims_fail_login() {
        let auth = authorizer(
            FakeVerifier::new(&[("id-1", json!({ "sub": "1234" }))]),
            Arc::default(),
        );
        let req = request(&[(REFRESH_TOKEN_COOKIE, "r1"), (ID_TOKEN_COOKIE, "id-1")]);

        for mode in [AuthMode::Probe, AuthMode::Enforcing] {
            let err = auth.authorize(&req, mode).await.unwrap_err();
            assert!(matches!(err, AuthError::Login(_)));
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_probe_never_redirects_or_refreshes() {
        let exchanger = Arc::new(FakeExchanger::refreshing_to(CredentialPair {
            id_token: Some("id-2".to_string()),
            expires_at: expiry(),
            refresh_token: None,
        }));
        let auth = authorizer(
            FakeVerifier::new(&[
                ("id-2", verified_claims("alice@example.com")),
                (
                    "id-unverified",
                    json!({ "email": "bob@example.com", "email_verified": false }),
                ),
            ]),
            exchanger.clone(),
        );

        let cases = [
            request(&[]).with_consent(Some("on")),
            request(&[(REFRESH_TOKEN_COOKIE, "r1")]),
            request(&[(ID_TOKEN_COOKIE, "id-2")]),
            request(&[(REFRESH_TOKEN_COOKIE, "r1"), (ID_TOKEN_COOKIE, "id-old")]),
            request(&[
                (REFRESH_TOKEN_COOKIE, "r1"),
                (ID_TOKEN_COOKIE, "id-unverified"),
            ]),
        ];

        for req in cases {
            let decision = auth.authorize(&req, AuthMode::Probe).await.unwrap();
            assert_eq!(
                decision,
                Authorization::Anonymous(Session {
                    identity: None,
                    locale: "en".to_string(),
                })
            );
            assert!(!decision.must_redirect());
        }
        assert_eq!(exchanger.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_probe_signed_in() {
        let auth = authorizer(
            FakeVerifier::new(&[("id-1", verified_claims("alice@example.com"))]),
            Arc::default(),
        );
        let mut req = request(&[(REFRESH_TOKEN_COOKIE, "r1"), (ID_TOKEN_COOKIE, "id-1")]);
        req.accept_language = Some(HeaderValue::from_static("de-DE,de;q=0.9"));

        let session = auth
            .authorize(&req, AuthMode::Probe)
            .await
            .unwrap()
            .session();

        assert_eq!(session.locale, "de");
        assert_eq!(session.identity.unwrap().email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_locale_failure_is_internal_error() {
        let auth = SessionAuthorizer::new(
            Arc::new(FakeVerifier::new(&[])),
            Arc::new(FakeExchanger::default()),
            Arc::new(FailingLocales),
            Url::parse("https://auth.example.com/").unwrap(),
            REDIRECT_URL,
        );

        for mode in [AuthMode::Probe, AuthMode::Enforcing] {
            let err = auth.authorize(&request(&[]), mode).await.unwrap_err();
            assert!(matches!(err, AuthError::Localization(_)));
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_logout_url_keeps_issuer_path() {
        let auth = SessionAuthorizer::new(
            Arc::new(FakeVerifier::new(&[])),
            Arc::new(FakeExchanger::default()),
            Arc::new(AcceptLanguageResolver::new(vec!["en".to_string()], "en")),
            Url::parse("https://auth.example.com/realms/senbara").unwrap(),
            REDIRECT_URL,
        );

        let url = auth.logout_url("tok").unwrap();
        assert!(url.starts_with("https://auth.example.com/realms/senbara/oidc/logout?id_token_hint=tok&"));
    }

    #[tokio::test]
    async fn test_complete_sign_in() {
        let exchanger = Arc::new(FakeExchanger::default());
        let auth = authorizer(FakeVerifier::new(&[]), exchanger.clone());

        assert!(matches!(
            auth.complete_sign_in("code").await,
            Err(AuthError::Login(_))
        ));

        *exchanger.code_result.lock() = Some(CredentialPair {
            id_token: None,
            expires_at: expiry(),
            refresh_token: Some("r1".to_string()),
        });
        assert!(matches!(
            auth.complete_sign_in("code").await,
            Err(AuthError::Login(_))
        ));

        *exchanger.code_result.lock() = Some(CredentialPair {
            id_token: Some("id-1".to_string()),
            expires_at: expiry(),
            refresh_token: Some("r1".to_string()),
        });
        let cookies = auth.complete_sign_in("code").await.unwrap();
        assert_eq!(cookies.get(REFRESH_TOKEN_COOKIE).unwrap().value(), "r1");
        assert_eq!(cookies.get(ID_TOKEN_COOKIE).unwrap().value(), "id-1");
    }

    #[test]
    fn test_request_from_parts() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("refresh_token=r1"),
        );
        headers.insert(REFERER, HeaderValue::from_static("https://forms.example.com/"));
        let uri: Uri = "/login?consent=on".parse().unwrap();

        let req = AuthRequest::from_parts(&headers, &uri);

        assert!(req.consent);
        assert_eq!(req.cookies.refresh_token(), Some("r1"));
        assert_eq!(req.return_url(), "https://forms.example.com/");
        assert_eq!(req.request_url, "/login?consent=on");
        assert!(!req.with_consent(Some("off")).consent);
    }
}
