use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Invoke name carried by a silent token-exchange delivery.
pub const TOKEN_EXCHANGE_INVOKE_NAME: &str = "signin/tokenExchange";
/// Invoke name carried by a channel-side state verification delivery.
pub const VERIFY_STATE_INVOKE_NAME: &str = "signin/verifyState";

/// Activity type for plain invoke deliveries.
pub const INVOKE_TYPE: &str = "invoke";
/// Activity type used to answer an invoke on the same turn.
pub const INVOKE_RESPONSE_TYPE: &str = "invokeResponse";

/// Conversational activity in the Bot Framework wire shape.
///
/// Only the fields the sign-in flows touch are modeled as struct members;
/// everything else a channel sends survives round-trips through `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default)]
    pub id: String,
    pub r#type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default)]
    pub from: Option<ChannelAccount>,
    #[serde(default)]
    pub recipient: Option<ChannelAccount>,
    #[serde(default)]
    pub conversation: Option<ConversationAccount>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub reply_to_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Activity {
    /// Creates a new activity with the provided type and empty payload.
    pub fn new(r#type: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            r#type: r#type.into(),
            name: None,
            timestamp: None,
            from: None,
            recipient: None,
            conversation: None,
            text: None,
            attachments: Vec::new(),
            value: None,
            reply_to_id: None,
            channel_id: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Builds the invoke-response activity answering `reply_to` on the same turn.
    pub fn invoke_response(reply_to: &Activity, response: InvokeResponse) -> Self {
        let mut activity = Activity::new(INVOKE_RESPONSE_TYPE);
        activity.reply_to_id = Some(reply_to.id.clone());
        activity.conversation = reply_to.conversation.clone();
        activity.value = serde_json::to_value(response).ok();
        activity
    }

    pub fn ensure_defaults(&mut self) {
        if self.id.trim().is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
        if self.r#type.trim().is_empty() {
            self.r#type = "message".into();
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(OffsetDateTime::now_utc());
        }
    }

    /// True when this delivery is a silent token-exchange invoke.
    pub fn is_token_exchange(&self) -> bool {
        self.r#type == INVOKE_TYPE && self.name.as_deref() == Some(TOKEN_EXCHANGE_INVOKE_NAME)
    }

    /// True when this delivery is a state-verification invoke.
    pub fn is_verify_state(&self) -> bool {
        self.r#type == INVOKE_TYPE && self.name.as_deref() == Some(VERIFY_STATE_INVOKE_NAME)
    }

    /// Looks up a string field on the invoke payload (`value`).
    pub fn value_str(&self, field: &str) -> Option<&str> {
        self.value
            .as_ref()
            .and_then(|value| value.get(field))
            .and_then(serde_json::Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub name: Option<String>,
}

/// Synchronous answer to an invoke delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvokeResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl InvokeResponse {
    pub fn status(status: http::StatusCode) -> Self {
        Self {
            status: status.as_u16(),
            body: None,
        }
    }
}
