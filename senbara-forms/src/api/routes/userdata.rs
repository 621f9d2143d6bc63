//! Download, upload and deletion of the caller's personal data.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{
        HeaderMap, Uri,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::info;

use super::{Gate, require_session};
use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::auth::AuthRequest;
use crate::userdata::{ImportMode, JSON_LINES_CONTENT_TYPE};

const EXPORT_FILENAME: &str = "senbara-forms-userdata.jsonl";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(export_userdata)
                .post(import_userdata)
                .delete(delete_userdata),
        )
        .route("/delete", post(delete_userdata))
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportParams {
    #[serde(default)]
    pub mode: ImportMode,
}

/// Download every record of the account as one JSONL document.
async fn export_userdata(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> ApiResult<Response> {
    let req = AuthRequest::from_parts(&headers, &uri);
    let (identity, cookies) = match require_session(&state, &req).await? {
        Gate::Proceed { identity, cookies } => (identity, cookies),
        Gate::Halt(response) => return Ok(response),
    };

    let document = state.userdata.export_json_lines(&identity.email).await?;

    Ok((
        cookies,
        [
            (CONTENT_TYPE, JSON_LINES_CONTENT_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!(r#"attachment; filename="{EXPORT_FILENAME}""#),
            ),
        ],
        document,
    )
        .into_response())
}

/// Import a JSONL document into the account, all or nothing.
async fn import_userdata(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(params): Query<ImportParams>,
    body: String,
) -> ApiResult<Response> {
    let req = AuthRequest::from_parts(&headers, &uri);
    let (identity, cookies) = match require_session(&state, &req).await? {
        Gate::Proceed { identity, cookies } => (identity, cookies),
        Gate::Halt(response) => return Ok(response),
    };

    let stats = state
        .userdata
        .import_json_lines(&identity.email, params.mode, &body)
        .await?;

    info!(mode = ?params.mode, ?stats, "Import finished");

    Ok((cookies, Json(stats)).into_response())
}

/// Remove every record of the account.
async fn delete_userdata(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> ApiResult<Response> {
    let req = AuthRequest::from_parts(&headers, &uri);
    let (identity, cookies) = match require_session(&state, &req).await? {
        Gate::Proceed { identity, cookies } => (identity, cookies),
        Gate::Halt(response) => return Ok(response),
    };

    let stats = state.userdata.delete(&identity.email).await?;

    Ok((cookies, Json(stats)).into_response())
}
