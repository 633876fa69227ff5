use std::env;

use anyhow::{Context, Result};
use time::Duration;

/// Configuration for an OAuth/SSO connection against a confidential-client
/// token endpoint.
#[derive(Debug, Clone)]
pub struct OauthOptions {
    pub client_id: String,
    pub client_secret: String,
    /// Issuer base, e.g. `https://login.example.com/common`. The token
    /// endpoint lives at `{authority}/oauth2/v2.0/token`.
    pub authority: String,
    pub scopes: Vec<String>,
    /// Interactive sign-in entry point offered to the user when a silent
    /// exchange is not possible.
    pub sign_in_link: Option<String>,
    /// Cached tokens expiring within this window count as expired.
    pub token_leeway: Duration,
}

impl OauthOptions {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority: authority.into(),
            scopes: Vec::new(),
            sign_in_link: None,
            token_leeway: Duration::minutes(5),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sign_in_link(mut self, link: impl Into<String>) -> Self {
        self.sign_in_link = Some(link.into());
        self
    }

    pub fn with_token_leeway(mut self, leeway: Duration) -> Self {
        self.token_leeway = leeway;
        self
    }

    /// Builds options from `OAUTH_CLIENT_ID`, `OAUTH_CLIENT_SECRET`, and
    /// `OAUTH_AUTHORITY`, with `OAUTH_SIGN_IN_LINK` optional.
    pub fn from_env() -> Result<Self> {
        let client_id = env::var("OAUTH_CLIENT_ID").context("OAUTH_CLIENT_ID must be set")?;
        let client_secret =
            env::var("OAUTH_CLIENT_SECRET").context("OAUTH_CLIENT_SECRET must be set")?;
        let authority = env::var("OAUTH_AUTHORITY").context("OAUTH_AUTHORITY must be set")?;
        let mut options = Self::new(client_id, client_secret, authority);
        if let Ok(link) = env::var("OAUTH_SIGN_IN_LINK") {
            options.sign_in_link = Some(link);
        }
        Ok(options)
    }
}
