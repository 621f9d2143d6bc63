//! Login, provider callback and sign-out.

use axum::{
    Form, Router,
    extract::{Query, State},
    http::{HeaderMap, Uri, header::ACCEPT_LANGUAGE},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{Gate, found, require_session};
use crate::api::error::ApiResult;
use crate::api::pages;
use crate::api::server::AppState;
use crate::auth::AuthRequest;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login).post(login_form))
        .route("/authorize", get(authorize_callback))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub consent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

async fn login(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> ApiResult<Response> {
    let req = AuthRequest::from_parts(&headers, &uri);
    login_with(&state, req).await
}

async fn login_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<LoginForm>,
) -> ApiResult<Response> {
    let req = AuthRequest::from_parts(&headers, &uri).with_consent(form.consent.as_deref());
    login_with(&state, req).await
}

/// Signed-in callers go back to where they came from.
async fn login_with(state: &AppState, req: AuthRequest) -> ApiResult<Response> {
    match require_session(state, &req).await? {
        Gate::Halt(response) => Ok(response),
        Gate::Proceed { cookies, .. } => Ok((cookies, found(req.return_url())).into_response()),
    }
}

/// `target` if it is a local path or an absolute `http(s)` URL.
///
/// Anything else (`javascript:`, `data:`, protocol-relative `//host`) would
/// end up as the link on the redirect page.
fn safe_return_url(target: &str) -> Option<String> {
    let target = target.trim();

    if target.starts_with('/') {
        if target.starts_with("//") || target.starts_with("/\\") {
            return None;
        }
        return Some(target.to_string());
    }

    let url = Url::parse(target).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.into())
}

/// Provider callback.
///
/// Without a `code` this is the post-logout landing: both credential cookies
/// are cleared. With one, the code is exchanged for credential cookies.
/// Either way the browser continues to the address carried in `state`.
async fn authorize_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> ApiResult<Response> {
    let locale = state.authorizer.locale(headers.get(ACCEPT_LANGUAGE))?;

    let return_url = params
        .state
        .as_deref()
        .and_then(|s| urlencoding::decode(s).ok())
        .and_then(|s| safe_return_url(&s))
        .unwrap_or_else(|| "/".to_string());

    let code = params.code.as_deref().map(str::trim).unwrap_or_default();
    if code.is_empty() {
        debug!("Signing out");
        let cookies = state.authorizer.sign_out();
        let page = pages::redirect_page(&locale, "Signing you out ...", &return_url, &state.site);
        return Ok((cookies, page).into_response());
    }

    let cookies = state.authorizer.complete_sign_in(code).await?;
    info!("Signed in");

    let page = pages::redirect_page(&locale, "Signing you in ...", &return_url, &state.site);
    Ok((cookies, page).into_response())
}
