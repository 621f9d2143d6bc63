//! Landing route.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, Uri},
    routing::get,
};
use serde::Serialize;

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::auth::{AuthMode, AuthRequest};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub email: Option<String>,
    pub logout_url: Option<String>,
    pub locale: String,
}

/// Session summary for UIs that adapt to the login state.
///
/// Never redirects and never touches cookies.
async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> ApiResult<Json<IndexResponse>> {
    let req = AuthRequest::from_parts(&headers, &uri);
    let session = state
        .authorizer
        .authorize(&req, AuthMode::Probe)
        .await?
        .session();

    let (email, logout_url) = match session.identity {
        Some(identity) => (Some(identity.email), Some(identity.logout_url)),
        None => (None, None),
    };

    Ok(Json(IndexResponse {
        email,
        logout_url,
        locale: session.locale,
    }))
}
