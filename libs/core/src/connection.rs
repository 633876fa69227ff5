use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::context::TurnContext;
use crate::response::SignInResponse;
use crate::state::TurnState;

/// Token produced by a connection, with optional provider-reported expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenResult {
    pub token: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

impl TokenResult {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Observer for sign-in outcomes, invoked by the auth manager only.
///
/// Connections never call these themselves; they expose an optional hook via
/// [`AuthConnection::hooks`] and the manager dispatches after the attempt
/// settles. Both methods default to no-ops so implementations can observe
/// just one side.
#[async_trait]
pub trait SignInHooks: Send + Sync {
    async fn on_sign_in_success(&self, _ctx: &TurnContext, _state: &mut TurnState) {}

    async fn on_sign_in_failure(
        &self,
        _ctx: &TurnContext,
        _state: &mut TurnState,
        _response: &SignInResponse,
    ) {
    }
}

/// One configured identity flow capable of producing tokens for a user.
///
/// Operation results distinguish three outcomes: `Ok(Some(_))` success,
/// `Ok(None)` more interaction required (an expected state, not a failure),
/// and `Err(_)` a provider or connection failure.
#[async_trait]
pub trait AuthConnection: Send + Sync {
    /// Returns a token already available without user interaction, if any.
    /// Never prompts.
    async fn get_token(&self, ctx: &TurnContext) -> Result<Option<String>>;

    /// Starts or continues the interactive sign-in flow. May send a prompt
    /// to the user; returns a token only when the flow completes
    /// synchronously.
    async fn sign_in(&self, ctx: &TurnContext, state: &mut TurnState) -> Result<Option<String>>;

    /// Completes a silent token exchange from client-held credentials.
    /// `Ok(None)` means the client must perform interactive consent first.
    async fn exchange_token(
        &self,
        ctx: &TurnContext,
        state: &mut TurnState,
    ) -> Result<Option<TokenResult>>;

    /// Completes a flow in which the channel verifies interactive sign-in
    /// state.
    async fn verify_state(
        &self,
        ctx: &TurnContext,
        state: &mut TurnState,
    ) -> Result<Option<TokenResult>>;

    /// Clears connection-held credentials for the current user. Required to
    /// be a no-op when the user is already signed out.
    async fn sign_out(&self, ctx: &TurnContext, state: &mut TurnState) -> Result<()>;

    /// Optional sign-in outcome observer.
    fn hooks(&self) -> Option<Arc<dyn SignInHooks>> {
        None
    }
}
