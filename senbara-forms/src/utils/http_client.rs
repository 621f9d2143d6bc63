use std::{sync::OnceLock, time::Duration};

use tracing::debug;

const USER_AGENT: &str = concat!("senbara-forms/", env!("CARGO_PKG_VERSION"));

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate may have installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the client used for identity provider requests.
///
/// Redirects are not followed: discovery and token endpoints answer directly.
pub fn build_http_client(request_timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::none());

    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }

    builder.build()
}
