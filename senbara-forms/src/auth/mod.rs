//! Cookie-based sessions backed by an OpenID Connect provider.

pub mod authorizer;
pub mod claims;
pub mod cookies;
pub mod locale;
pub mod oidc;
pub mod provider;

pub use authorizer::{
    AuthError, AuthMode, AuthRequest, Authorization, Identity, Session, SessionAuthorizer,
};
pub use claims::{ClaimsError, IdentityClaims};
pub use cookies::{CookieUpdates, ID_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, RequestCookies};
pub use locale::{AcceptLanguageResolver, LocaleError, LocaleResolver};
pub use oidc::{OidcClient, ProviderMetadata};
pub use provider::{CredentialPair, IdentityVerifier, OidcError, TokenExchanger, VerifiedIdentity};
