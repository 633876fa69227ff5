use serde::{Deserialize, Serialize};

/// Terminal classification of a single sign-in attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignInStatus {
    /// More interaction is required before a token can be produced.
    Pending,
    /// A token was acquired and stored for the turn.
    Complete,
    /// The connection failed; details are in `reason`/`message`.
    Error,
}

/// Failure classification attached to an `Error` response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SignInReason {
    Other,
}

impl SignInStatus {
    /// Lowercase label used in metrics and payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignInStatus::Pending => "pending",
            SignInStatus::Complete => "complete",
            SignInStatus::Error => "error",
        }
    }
}

/// Outcome of one sign-in attempt, returned to the hosting pipeline.
///
/// Built fresh per attempt and mutated only while the attempt runs; callers
/// receive it by value once the attempt settles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignInResponse {
    pub status: SignInStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SignInReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SignInResponse {
    pub fn pending() -> Self {
        Self {
            status: SignInStatus::Pending,
            reason: None,
            message: None,
        }
    }

    pub fn complete() -> Self {
        Self {
            status: SignInStatus::Complete,
            reason: None,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SignInStatus::Error,
            reason: Some(SignInReason::Other),
            message: Some(message.into()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == SignInStatus::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_carries_reason_and_message() {
        let response = SignInResponse::error("endpoint unreachable");
        assert_eq!(response.status, SignInStatus::Error);
        assert_eq!(response.reason, Some(SignInReason::Other));
        assert_eq!(response.message.as_deref(), Some("endpoint unreachable"));
    }

    #[test]
    fn statuses_serialize_lowercase() {
        let json = serde_json::to_value(SignInResponse::pending()).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("reason").is_none());
    }
}
