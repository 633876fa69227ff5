use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use botline_core::activity::{Activity, Attachment};
use botline_core::connection::{AuthConnection, SignInHooks, TokenResult};
use botline_core::context::TurnContext;
use botline_core::state::TurnState;

use crate::cache::TokenCache;
use crate::endpoint::{AccessToken, ReqwestTokenEndpoint, TokenEndpoint};
use crate::options::OauthOptions;

/// Attachment content type channels recognize as a sign-in card.
pub const OAUTH_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.oauth";

/// OAuth/SSO connection backed by a confidential-client token endpoint.
///
/// The silent path serves tokens from a per-user cache; the exchange path
/// forwards the client-held assertion on behalf of the user; the
/// verify-state path redeems the channel's verification code. Interactive
/// sign-in offers the configured sign-in link as a card.
pub struct OauthConnection {
    name: String,
    options: OauthOptions,
    endpoint: Arc<dyn TokenEndpoint>,
    cache: TokenCache,
    hooks: Option<Arc<dyn SignInHooks>>,
}

impl OauthConnection {
    pub fn new(
        name: impl Into<String>,
        options: OauthOptions,
    ) -> Result<Self, crate::endpoint::TokenEndpointError> {
        let endpoint = ReqwestTokenEndpoint::new(reqwest::Client::new(), &options)?;
        Ok(Self::with_endpoint(name, options, Arc::new(endpoint)))
    }

    /// Builds the connection over a caller-supplied endpoint, e.g. a test
    /// double or a custom transport.
    pub fn with_endpoint(
        name: impl Into<String>,
        options: OauthOptions,
        endpoint: Arc<dyn TokenEndpoint>,
    ) -> Self {
        let cache = TokenCache::new(options.token_leeway);
        Self {
            name: name.into(),
            options,
            endpoint,
            cache,
            hooks: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SignInHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn adopt(&self, ctx: &TurnContext, token: AccessToken) -> TokenResult {
        if let Some(user_id) = ctx.from_id() {
            self.cache.insert(user_id, token.clone());
        }
        TokenResult {
            token: token.token,
            expires_at: token.expires_at,
        }
    }

    fn sign_in_card(&self) -> Option<Activity> {
        let link = self.options.sign_in_link.as_deref()?;
        let mut activity = Activity::new("message");
        activity.attachments.push(Attachment {
            content_type: OAUTH_CARD_CONTENT_TYPE.into(),
            content: json!({
                "text": "Sign in to continue",
                "connectionName": self.name,
                "buttons": [
                    {"type": "signin", "title": "Sign in", "value": link}
                ],
            }),
            name: None,
        });
        Some(activity)
    }
}

#[async_trait]
impl AuthConnection for OauthConnection {
    async fn get_token(&self, ctx: &TurnContext) -> Result<Option<String>> {
        Ok(ctx.from_id().and_then(|user_id| self.cache.get(user_id)))
    }

    async fn sign_in(&self, ctx: &TurnContext, _state: &mut TurnState) -> Result<Option<String>> {
        match self.sign_in_card() {
            Some(card) => {
                debug!(connection = self.name.as_str(), "prompting for interactive sign-in");
                ctx.send_activity(card).await?;
            }
            None => {
                debug!(
                    connection = self.name.as_str(),
                    "no sign-in link configured; nothing to prompt with"
                );
            }
        }
        Ok(None)
    }

    async fn exchange_token(
        &self,
        ctx: &TurnContext,
        _state: &mut TurnState,
    ) -> Result<Option<TokenResult>> {
        let Some(assertion) = ctx.activity().value_str("token") else {
            // nothing to exchange; the client has to go interactive
            return Ok(None);
        };
        let exchanged = self
            .endpoint
            .exchange_assertion(assertion, &self.options.scopes)
            .await?;
        Ok(exchanged.map(|token| self.adopt(ctx, token)))
    }

    async fn verify_state(
        &self,
        ctx: &TurnContext,
        _state: &mut TurnState,
    ) -> Result<Option<TokenResult>> {
        let Some(code) = ctx.activity().value_str("state") else {
            return Ok(None);
        };
        let redeemed = self
            .endpoint
            .redeem_code(code, &self.options.scopes)
            .await?;
        Ok(redeemed.map(|token| self.adopt(ctx, token)))
    }

    async fn sign_out(&self, ctx: &TurnContext, _state: &mut TurnState) -> Result<()> {
        if let Some(user_id) = ctx.from_id() {
            self.cache.remove(user_id);
        }
        Ok(())
    }

    fn hooks(&self) -> Option<Arc<dyn SignInHooks>> {
        self.hooks.clone()
    }
}
