use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use senbara_forms::api::{ApiServer, AppState};
use senbara_forms::auth::{AcceptLanguageResolver, OidcClient, SessionAuthorizer};
use senbara_forms::config::AppConfig;
use senbara_forms::userdata::UserDataStore;
use senbara_forms::utils::http_client::build_http_client;
use senbara_forms::{database, logging};

const PROVIDER_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    let _log_guard = logging::init_logging(&config.log_dir)?;
    let shutdown = CancellationToken::new();
    logging::start_retention_cleanup(config.log_dir.clone(), shutdown.child_token());

    // Initialize database
    let pool = database::init_pool(&config.database_url).await?;
    let write_pool = database::init_write_pool(&config.database_url).await?;
    database::run_migrations(&write_pool).await?;

    let http = build_http_client(PROVIDER_REQUEST_TIMEOUT)?;
    let oidc = Arc::new(OidcClient::discover(http, config.oidc.clone()).await?);

    let authorizer = SessionAuthorizer::new(
        oidc.clone(),
        oidc,
        Arc::new(AcceptLanguageResolver::new(
            config.locale.supported.clone(),
            config.locale.default_locale.clone(),
        )),
        config.oidc.issuer.clone(),
        config.oidc.redirect_url.as_str(),
    );

    let state = AppState::new(
        Arc::new(authorizer),
        UserDataStore::new(pool.clone(), write_pool),
        pool,
    )
    .with_site(config.site.clone());

    let server = ApiServer::new(config.server.clone(), state);
    let server_token = server.cancel_token();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        server_token.cancel();
    });

    info!("senbara-forms initialized successfully");

    let result = server.run().await;
    shutdown.cancel();
    result?;

    Ok(())
}
