use thiserror::Error;

/// Errors surfaced synchronously by the auth manager.
///
/// Configuration mistakes (`MissingConnectionKey`, `UnknownConnection`) are
/// raised to the caller; failures inside a sign-in attempt are folded into
/// the [`SignInResponse`](crate::response::SignInResponse) instead so the
/// conversation can continue.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unknown auth connection '{0}'")]
    UnknownConnection(String),
    #[error("an auth connection key is required but none was provided or configured")]
    MissingConnectionKey,
    #[error("auth connection failed")]
    Connection(#[source] anyhow::Error),
}
