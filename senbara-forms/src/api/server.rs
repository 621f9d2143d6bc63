//! API server setup and configuration.

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::routes;
use crate::auth::SessionAuthorizer;
use crate::config::SiteConfig;
use crate::database::DbPool;
use crate::error::{Error, Result};
use crate::userdata::UserDataStore;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Request body size limit in bytes
    pub body_limit: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 1337,
            body_limit: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub authorizer: Arc<SessionAuthorizer>,
    pub userdata: UserDataStore,
    /// Read pool, used for health probes
    pub pool: DbPool,
    /// Links rendered on the consent prompt and redirect pages
    pub site: SiteConfig,
}

impl AppState {
    pub fn new(authorizer: Arc<SessionAuthorizer>, userdata: UserDataStore, pool: DbPool) -> Self {
        Self {
            start_time: Instant::now(),
            authorizer,
            userdata,
            pool,
            site: SiteConfig::default(),
        }
    }

    pub fn with_site(mut self, site: SiteConfig) -> Self {
        self.site = site;
        self
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        routes::create_router(self.state.clone())
            .layer(DefaultBodyLimit::max(self.config.body_limit))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|req: &Request| {
                        if req.uri().path().starts_with("/health") {
                            Span::none()
                        } else {
                            let mut make_span = tower_http::trace::DefaultMakeSpan::new()
                                .level(tracing::Level::INFO);
                            use tower_http::trace::MakeSpan;
                            make_span.make_span(req)
                        }
                    })
                    .on_request(|req: &Request, span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let mut on_request =
                            tower_http::trace::DefaultOnRequest::new().level(tracing::Level::INFO);
                        use tower_http::trace::OnRequest;
                        on_request.on_request(req, span);
                    })
                    .on_response(
                        |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                            if span.is_disabled() {
                                return;
                            }
                            let on_response = tower_http::trace::DefaultOnResponse::new()
                                .level(tracing::Level::INFO);
                            use tower_http::trace::OnResponse;
                            on_response.on_response(res, latency, span);
                        },
                    )
                    .on_failure(
                        |class: tower_http::classify::ServerErrorsFailureClass,
                         latency: Duration,
                         span: &Span| {
                            if span.is_disabled() {
                                return;
                            }
                            let mut on_failure = tower_http::trace::DefaultOnFailure::new()
                                .level(tracing::Level::ERROR);
                            use tower_http::trace::OnFailure;
                            on_failure.on_failure(class, latency, span);
                        },
                    ),
            )
    }

    /// Serve until the cancellation token fires.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("invalid API bind address: {e}")))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await?;

        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
