use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::activity::{Activity, InvokeResponse};

/// Shared handle to the channel-facing sender for the current turn.
pub type SharedActivitySender = Arc<dyn ActivitySender>;

/// Outbound half of a turn: delivers activities back to the channel.
///
/// The hosting pipeline provides the real implementation; [`BufferedSender`]
/// collects sends in memory for tests and standalone runs.
#[async_trait]
pub trait ActivitySender: Send + Sync {
    async fn send(&self, activity: Activity) -> Result<()>;
}

/// Per-turn context handed to connections and the auth manager.
///
/// Carries the inbound activity plus the sender used to answer on the same
/// turn. Cheap to clone; the sender is shared.
#[derive(Clone)]
pub struct TurnContext {
    activity: Activity,
    sender: SharedActivitySender,
}

impl TurnContext {
    pub fn new(mut activity: Activity, sender: SharedActivitySender) -> Self {
        activity.ensure_defaults();
        Self { activity, sender }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    /// Channel identifier of the sending user, when present.
    pub fn from_id(&self) -> Option<&str> {
        self.activity.from.as_ref().map(|account| account.id.as_str())
    }

    /// Conversation identifier, when present.
    pub fn conversation_id(&self) -> Option<&str> {
        self.activity
            .conversation
            .as_ref()
            .map(|account| account.id.as_str())
    }

    pub async fn send_activity(&self, activity: Activity) -> Result<()> {
        self.sender.send(activity).await
    }

    /// Answers the inbound invoke with the given synchronous response.
    pub async fn send_invoke_response(&self, response: InvokeResponse) -> Result<()> {
        self.send_activity(Activity::invoke_response(&self.activity, response))
            .await
    }
}

/// In-memory sender that records every outbound activity.
#[derive(Default)]
pub struct BufferedSender {
    sent: Mutex<Vec<Activity>>,
}

impl BufferedSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the activities sent so far, in order.
    pub fn sent(&self) -> Vec<Activity> {
        self.sent.lock().expect("sender buffer poisoned").clone()
    }
}

#[async_trait]
impl ActivitySender for BufferedSender {
    async fn send(&self, activity: Activity) -> Result<()> {
        self.sent
            .lock()
            .expect("sender buffer poisoned")
            .push(activity);
        Ok(())
    }
}
