//! Credential cookies.
//!
//! Two cookies carry the whole session: the provider's refresh token and
//! its identity token. Every cookie written here is `HttpOnly`, `Secure`,
//! `SameSite=Strict` and scoped to `/`.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use chrono::{DateTime, Utc};
use cookie::time::{Duration, OffsetDateTime};
use cookie::{Cookie, Expiration, SameSite};
use tracing::warn;

pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const ID_TOKEN_COOKIE: &str = "id_token";

const REFRESH_TOKEN_LIFETIME_DAYS: i64 = 365;

/// Cookies sent with a request.
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    values: HashMap<String, String>,
}

impl RequestCookies {
    /// Collect every `Cookie` header. Unparseable pairs are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut values = HashMap::new();

        for header in headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };

            for cookie in Cookie::split_parse_encoded(header).flatten() {
                values
                    .entry(cookie.name().to_string())
                    .or_insert_with(|| cookie.value().to_string());
            }
        }

        Self { values }
    }

    /// Non-empty value of the cookie `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.get(REFRESH_TOKEN_COOKIE)
    }

    pub fn id_token(&self) -> Option<&str> {
        self.get(ID_TOKEN_COOKIE)
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

/// `Set-Cookie` headers to apply to a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieUpdates(Vec<Cookie<'static>>);

impl CookieUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a refresh token for one year from now.
    pub fn set_refresh_token(&mut self, token: &str) {
        let expires = OffsetDateTime::now_utc() + Duration::days(REFRESH_TOKEN_LIFETIME_DAYS);
        self.push(credential_cookie(
            REFRESH_TOKEN_COOKIE,
            token,
            Expiration::DateTime(expires),
        ));
    }

    /// Store an identity token until the provider-issued expiry.
    pub fn set_id_token(&mut self, token: &str, expires_at: DateTime<Utc>) {
        let expires = match OffsetDateTime::from_unix_timestamp(expires_at.timestamp()) {
            Ok(at) => Expiration::DateTime(at),
            Err(e) => {
                warn!(error = %e, "Identity token expiry out of range, using a session cookie");
                Expiration::Session
            }
        };
        self.push(credential_cookie(ID_TOKEN_COOKIE, token, expires));
    }

    /// Expire both credential cookies.
    pub fn clear_credentials(&mut self) {
        for name in [REFRESH_TOKEN_COOKIE, ID_TOKEN_COOKIE] {
            let mut cookie = credential_cookie(name, "", Expiration::Session);
            cookie.set_max_age(Duration::seconds(-1));
            self.push(cookie);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie<'static>> {
        self.0.iter()
    }

    /// Last written cookie named `name`.
    pub fn get(&self, name: &str) -> Option<&Cookie<'static>> {
        self.0.iter().rev().find(|c| c.name() == name)
    }

    fn push(&mut self, cookie: Cookie<'static>) {
        self.0.push(cookie);
    }
}

fn credential_cookie(name: &'static str, value: &str, expires: Expiration) -> Cookie<'static> {
    Cookie::build((name, value.to_string()))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .path("/")
        .expires(expires)
        .build()
}

impl IntoResponseParts for CookieUpdates {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        for cookie in self.0 {
            match HeaderValue::from_str(&cookie.encoded().to_string()) {
                Ok(value) => {
                    res.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => warn!(cookie = cookie.name(), error = %e, "Dropping unencodable cookie"),
            }
        }
        Ok(res)
    }
}
