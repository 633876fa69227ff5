//! OAuth/SSO connection for the botline auth manager.
//!
//! Implements the [`AuthConnection`](botline_core::connection::AuthConnection)
//! capability over a confidential-client token endpoint: silent tokens from a
//! per-user cache, on-behalf-of exchange of client-held assertions, and
//! verification-code redemption, with the HTTP transport behind the
//! [`TokenEndpoint`](endpoint::TokenEndpoint) trait.
pub mod cache;
pub mod connection;
pub mod endpoint;
pub mod options;

pub use cache::TokenCache;
pub use connection::{OAUTH_CARD_CONTENT_TYPE, OauthConnection};
pub use endpoint::{AccessToken, ReqwestTokenEndpoint, TokenEndpoint, TokenEndpointError};
pub use options::OauthOptions;
