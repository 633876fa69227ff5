use std::time::Instant;

use async_trait::async_trait;
use http::StatusCode;
use metrics::{counter, histogram};
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::options::OauthOptions;

const OBO_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Token minted by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Error)]
pub enum TokenEndpointError {
    #[error("token endpoint configuration invalid")]
    Config(#[source] anyhow::Error),
    #[error("token endpoint transport failed")]
    Transport(#[source] reqwest::Error),
    #[error("token endpoint returned {status}: {message}")]
    Endpoint { status: StatusCode, message: String },
    #[error("token endpoint response body invalid")]
    Decode(#[source] anyhow::Error),
}

/// Confidential-client token endpoint.
///
/// Both operations return `Ok(None)` when the provider needs the user to
/// complete an interactive step first (expected, not a failure): a rejected
/// on-behalf-of assertion pending consent, or a verification code that does
/// not redeem.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchanges a client-held assertion on behalf of the user.
    async fn exchange_assertion(
        &self,
        assertion: &str,
        scopes: &[String],
    ) -> Result<Option<AccessToken>, TokenEndpointError>;

    /// Redeems a verification code produced by an interactive sign-in.
    async fn redeem_code(
        &self,
        code: &str,
        scopes: &[String],
    ) -> Result<Option<AccessToken>, TokenEndpointError>;
}

pub struct ReqwestTokenEndpoint {
    client: Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

impl ReqwestTokenEndpoint {
    pub fn new(client: Client, options: &OauthOptions) -> Result<Self, TokenEndpointError> {
        let token_url = Url::parse(&format!(
            "{}/oauth2/v2.0/token",
            options.authority.trim_end_matches('/')
        ))
        .map_err(|err| TokenEndpointError::Config(err.into()))?;
        Ok(Self {
            client,
            token_url,
            client_id: options.client_id.clone(),
            client_secret: options.client_secret.clone(),
        })
    }

    async fn post_grant(
        &self,
        grant: &str,
        form: &[(&str, &str)],
    ) -> Result<Option<AccessToken>, TokenEndpointError> {
        let started = Instant::now();
        let response = self
            .client
            .post(self.token_url.clone())
            .form(form)
            .send()
            .await
            .map_err(|err| {
                counter!("oauth_token_errors_total", "kind" => "transport", "grant" => grant.to_string())
                    .increment(1);
                TokenEndpointError::Transport(err)
            })?;

        let status = response.status();
        histogram!(
            "oauth_token_roundtrip_seconds",
            "grant" => grant.to_string(),
            "status" => status.as_str().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        if status.is_success() {
            let body = response
                .json::<TokenBody>()
                .await
                .map_err(|err| TokenEndpointError::Decode(err.into()))?;
            let expires_at = body
                .expires_in
                .map(|seconds| OffsetDateTime::now_utc() + time::Duration::seconds(seconds));
            return Ok(Some(AccessToken {
                token: body.access_token,
                expires_at,
            }));
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable>".to_string());
        match classify_error_body(&body) {
            ErrorDisposition::InteractionRequired => {
                debug!(grant, "provider requires user interaction");
                Ok(None)
            }
            ErrorDisposition::Hard(message) => {
                Err(TokenEndpointError::Endpoint { status, message })
            }
        }
    }
}

#[async_trait]
impl TokenEndpoint for ReqwestTokenEndpoint {
    async fn exchange_assertion(
        &self,
        assertion: &str,
        scopes: &[String],
    ) -> Result<Option<AccessToken>, TokenEndpointError> {
        let scope = scopes.join(" ");
        self.post_grant(
            "on_behalf_of",
            &[
                ("grant_type", OBO_GRANT),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("assertion", assertion),
                ("scope", scope.as_str()),
                ("requested_token_use", "on_behalf_of"),
            ],
        )
        .await
    }

    async fn redeem_code(
        &self,
        code: &str,
        scopes: &[String],
    ) -> Result<Option<AccessToken>, TokenEndpointError> {
        let scope = scopes.join(" ");
        self.post_grant(
            "authorization_code",
            &[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("scope", scope.as_str()),
            ],
        )
        .await
    }
}

enum ErrorDisposition {
    InteractionRequired,
    Hard(String),
}

/// Splits provider error bodies into "user must interact" and hard failures.
///
/// `invalid_grant` (and the consent-related suberrors some providers attach)
/// means the grant cannot be satisfied silently; anything else is a real
/// rejection.
fn classify_error_body(body: &str) -> ErrorDisposition {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        suberror: Option<String>,
        error_description: Option<String>,
    }

    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return ErrorDisposition::Hard(body.to_string());
    };
    let error = parsed.error.as_deref().unwrap_or_default();
    let suberror = parsed.suberror.as_deref().unwrap_or_default();
    if error == "invalid_grant" || error == "interaction_required" || suberror == "consent_required"
    {
        return ErrorDisposition::InteractionRequired;
    }
    ErrorDisposition::Hard(
        parsed
            .error_description
            .unwrap_or_else(|| body.to_string()),
    )
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_required_bodies_are_not_hard_failures() {
        let body = r#"{"error":"invalid_grant","suberror":"consent_required","error_description":"AADSTS65001"}"#;
        assert!(matches!(
            classify_error_body(body),
            ErrorDisposition::InteractionRequired
        ));
    }

    #[test]
    fn interaction_required_maps_to_interaction() {
        let body = r#"{"error":"interaction_required"}"#;
        assert!(matches!(
            classify_error_body(body),
            ErrorDisposition::InteractionRequired
        ));
    }

    #[test]
    fn other_provider_errors_stay_hard() {
        let body = r#"{"error":"invalid_client","error_description":"secret expired"}"#;
        match classify_error_body(body) {
            ErrorDisposition::Hard(message) => assert_eq!(message, "secret expired"),
            ErrorDisposition::InteractionRequired => panic!("expected hard failure"),
        }
    }

    #[test]
    fn unparseable_bodies_surface_verbatim() {
        match classify_error_body("upstream proxy error") {
            ErrorDisposition::Hard(message) => assert_eq!(message, "upstream proxy error"),
            ErrorDisposition::InteractionRequired => panic!("expected hard failure"),
        }
    }

    #[test]
    fn token_url_is_derived_from_authority() {
        let options = OauthOptions::new("id", "secret", "https://login.example.com/common/");
        let endpoint = ReqwestTokenEndpoint::new(Client::new(), &options).unwrap();
        assert_eq!(
            endpoint.token_url.as_str(),
            "https://login.example.com/common/oauth2/v2.0/token"
        );
    }
}
