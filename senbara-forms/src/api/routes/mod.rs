//! API route modules.

pub mod auth;
pub mod health;
pub mod index;
pub mod userdata;

use axum::Router;
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiResult;
use crate::api::pages;
use crate::api::server::AppState;
use crate::auth::{AuthMode, AuthRequest, Authorization, CookieUpdates, Identity};

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(index::router())
        .merge(auth::router())
        .nest("/userdata", userdata::router())
        .nest("/health", health::router())
        .with_state(state)
}

/// Result of enforcing authorization in a handler.
pub(crate) enum Gate {
    /// Run the handler; apply `cookies` to its response.
    Proceed {
        identity: Identity,
        cookies: CookieUpdates,
    },
    /// Respond with this and stop.
    Halt(Response),
}

/// Authorize `req` in enforcing mode.
///
/// Redirects and the consent prompt become [`Gate::Halt`]; hard failures
/// become errors.
pub(crate) async fn require_session(state: &AppState, req: &AuthRequest) -> ApiResult<Gate> {
    let decision = state
        .authorizer
        .authorize(req, AuthMode::Enforcing)
        .await?;

    Ok(match decision {
        Authorization::SignedIn {
            identity, cookies, ..
        } => Gate::Proceed { identity, cookies },
        Authorization::Redirect { location } => Gate::Halt(found(&location)),
        Authorization::ConsentRequired { locale } => {
            Gate::Halt(pages::consent_page(&locale, &state.site).into_response())
        }
        // Probe-only outcome.
        Authorization::Anonymous(_) => Gate::Halt(StatusCode::UNAUTHORIZED.into_response()),
    })
}

/// `302 Found` to `location`.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}
