use std::sync::Arc;

use anyhow::anyhow;
use http::StatusCode;
use metrics::counter;
use tracing::{Instrument, debug, warn};

use crate::activity::InvokeResponse;
use crate::connection::AuthConnection;
use crate::context::TurnContext;
use crate::error::AuthError;
use crate::registry::ConnectionRegistry;
use crate::response::{SignInResponse, SignInStatus};
use crate::state::TurnState;
use crate::telemetry;
use crate::tracker::{BeginExchange, ExchangeKey, ExchangeTracker};

/// Drives a single sign-in attempt to completion, pending, or error.
///
/// The manager owns the connection registry and the exchange tracker and is
/// meant to be built once at startup and shared via `Arc` with the
/// request-handling code. Each [`sign_in`](Self::sign_in) call runs the full
/// state machine for the inbound activity: silent-token short-circuit,
/// activity classification, exchange de-duplication, token adoption, and
/// hook dispatch.
#[derive(Default)]
pub struct AuthManager {
    default: Option<String>,
    connections: ConnectionRegistry,
    exchanges: ExchangeTracker,
}

impl AuthManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection used when callers do not name one explicitly.
    pub fn with_default_connection(mut self, name: impl Into<String>) -> Self {
        self.default = Some(name.into());
        self
    }

    /// Replaces the exchange tracker, e.g. to configure a TTL or duplicate
    /// policy.
    pub fn with_tracker(mut self, tracker: ExchangeTracker) -> Self {
        self.exchanges = tracker;
        self
    }

    /// Looks up a registered connection; fails loudly for unknown names.
    pub fn get(&self, name: &str) -> Result<Arc<dyn AuthConnection>, AuthError> {
        self.connections.get(name)
    }

    /// Registers a connection, overwriting any previous one of that name.
    pub fn set(&self, name: impl Into<String>, connection: Arc<dyn AuthConnection>) {
        self.connections.set(name, connection);
    }

    /// Runs one sign-in attempt for the turn's inbound activity.
    ///
    /// Configuration mistakes (no resolvable key, unknown connection) and
    /// failures of the silent-token probe are returned as errors; everything
    /// that happens inside the attempt itself is folded into the
    /// [`SignInResponse`].
    pub async fn sign_in(
        &self,
        ctx: &TurnContext,
        state: &mut TurnState,
        key: Option<&str>,
    ) -> Result<SignInResponse, AuthError> {
        let key = self.resolve_key(key)?;
        let connection = self.connections.get(key)?;
        let span = telemetry::sign_in_span(key, ctx);

        async {
            if let Some(token) = connection
                .get_token(ctx)
                .await
                .map_err(AuthError::Connection)?
            {
                debug!(connection = key, "token already available");
                state.temp.auth_tokens.insert(key.to_string(), token);
                let response = SignInResponse::complete();
                self.record_outcome(key, &response);
                return Ok(response);
            }

            let mut response = SignInResponse::pending();
            match self.run_attempt(key, connection.as_ref(), ctx, state).await {
                Ok(Some(token)) => {
                    state.temp.auth_tokens.insert(key.to_string(), token);
                    response.status = SignInStatus::Complete;
                    if let Some(hooks) = connection.hooks() {
                        hooks.on_sign_in_success(ctx, state).await;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(connection = key, error = %err, "sign-in attempt failed");
                    response = SignInResponse::error(err.to_string());
                    if let Some(hooks) = connection.hooks() {
                        hooks.on_sign_in_failure(ctx, state, &response).await;
                    }
                }
            }

            self.record_outcome(key, &response);
            Ok(response)
        }
        .instrument(span)
        .await
    }

    /// Clears connection-held credentials for the current user.
    ///
    /// Resolves the key like [`sign_in`](Self::sign_in) and delegates; the
    /// exchange tracker and the turn's token map are untouched.
    pub async fn sign_out(
        &self,
        ctx: &TurnContext,
        state: &mut TurnState,
        key: Option<&str>,
    ) -> Result<(), AuthError> {
        let key = self.resolve_key(key)?;
        let connection = self.connections.get(key)?;
        connection
            .sign_out(ctx, state)
            .instrument(telemetry::sign_out_span(key, ctx))
            .await
            .map_err(AuthError::Connection)
    }

    fn resolve_key<'a>(&'a self, key: Option<&'a str>) -> Result<&'a str, AuthError> {
        key.or(self.default.as_deref())
            .ok_or(AuthError::MissingConnectionKey)
    }

    /// Classifies the activity and runs the matching connection operation.
    ///
    /// `Ok(None)` means the attempt stays pending: a duplicate exchange
    /// delivery, a consent-required exchange already answered with 412, or
    /// an interactive flow that has not produced a token yet.
    async fn run_attempt(
        &self,
        key: &str,
        connection: &dyn AuthConnection,
        ctx: &TurnContext,
        state: &mut TurnState,
    ) -> anyhow::Result<Option<String>> {
        let activity = ctx.activity();
        if activity.is_token_exchange() {
            let exchange_key = exchange_key(key, ctx)?;
            let request_id = activity
                .value_str("id")
                .ok_or_else(|| anyhow!("token exchange invoke is missing a request id"))?;

            if self.exchanges.begin(exchange_key.clone(), request_id) == BeginExchange::Duplicate {
                debug!(exchange = %exchange_key, "duplicate exchange delivery");
                counter!("auth_exchange_deduped_total", "connection" => key.to_string())
                    .increment(1);
                return Ok(None);
            }

            match connection.exchange_token(ctx, state).await? {
                Some(result) => {
                    self.exchanges.complete(&exchange_key);
                    Ok(Some(result.token))
                }
                None => {
                    // The entry stays tracked so re-deliveries of this
                    // attempt keep deduplicating against it.
                    debug!(exchange = %exchange_key, "exchange needs interactive consent");
                    counter!(
                        "auth_exchange_consent_required_total",
                        "connection" => key.to_string()
                    )
                    .increment(1);
                    ctx.send_invoke_response(InvokeResponse::status(
                        StatusCode::PRECONDITION_FAILED,
                    ))
                    .await?;
                    Ok(None)
                }
            }
        } else if activity.is_verify_state() {
            Ok(connection
                .verify_state(ctx, state)
                .await?
                .map(|result| result.token))
        } else {
            connection.sign_in(ctx, state).await
        }
    }

    fn record_outcome(&self, key: &str, response: &SignInResponse) {
        counter!(
            "auth_sign_in_total",
            "connection" => key.to_string(),
            "status" => response.status.as_str()
        )
        .increment(1);
    }
}

fn exchange_key(key: &str, ctx: &TurnContext) -> anyhow::Result<ExchangeKey> {
    let user_id = ctx
        .from_id()
        .ok_or_else(|| anyhow!("exchange activity is missing a sender id"))?;
    let conversation_id = ctx
        .conversation_id()
        .ok_or_else(|| anyhow!("exchange activity is missing a conversation id"))?;
    Ok(ExchangeKey::new(user_id, conversation_id, key))
}
