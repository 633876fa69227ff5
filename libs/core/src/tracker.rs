use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Composite key identifying one in-flight token exchange.
///
/// A channel may re-deliver the same exchange invoke; everything that makes
/// the delivery "the same attempt" is the user, the conversation, and the
/// connection it targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExchangeKey {
    pub user_id: String,
    pub conversation_id: String,
    pub connection: String,
}

impl ExchangeKey {
    pub fn new(
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        connection: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            connection: connection.into(),
        }
    }
}

impl fmt::Display for ExchangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.user_id, self.conversation_id, self.connection
        )
    }
}

/// How a tracker treats a delivery whose key is already in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateExchangePolicy {
    /// Answer the duplicate as pending without touching the provider. The
    /// at-most-one-in-flight guarantee holds.
    #[default]
    Deduplicate,
    /// Let the new delivery replace the tracked one and reach the provider
    /// again. Relaxes the in-flight guarantee for the retry delivery.
    ClearAndRetry,
}

/// Outcome of [`ExchangeTracker::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginExchange {
    /// The key was free (or reclaimed); the caller owns the exchange.
    Started,
    /// The key is already in flight; the caller must not call the provider.
    Duplicate,
}

#[derive(Debug, Clone)]
struct InFlight {
    request_id: String,
    started_at: Instant,
}

/// Tracks in-flight token exchanges so duplicate channel deliveries collapse
/// into a single provider call.
///
/// Entries are inserted when an exchange begins and removed when it
/// completes successfully. An exchange answered with a precondition-required
/// response keeps its entry so later re-deliveries still deduplicate against
/// the original attempt. Without a TTL such an entry lives until the process
/// exits; [`with_ttl`](Self::with_ttl) opts into eviction of abandoned
/// attempts.
#[derive(Default)]
pub struct ExchangeTracker {
    inner: DashMap<ExchangeKey, InFlight>,
    ttl: Option<Duration>,
    policy: DuplicateExchangePolicy,
}

impl ExchangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evicts entries older than `ttl` the next time an exchange begins.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_policy(mut self, policy: DuplicateExchangePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DuplicateExchangePolicy {
        self.policy
    }

    /// Atomically claims `key` for the delivery identified by `request_id`.
    ///
    /// The check-and-insert happens under the map's shard lock, so of two
    /// concurrent deliveries for the same key exactly one observes
    /// [`BeginExchange::Started`].
    pub fn begin(&self, key: ExchangeKey, request_id: impl Into<String>) -> BeginExchange {
        self.sweep();
        let in_flight = InFlight {
            request_id: request_id.into(),
            started_at: Instant::now(),
        };
        match self.inner.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(in_flight);
                BeginExchange::Started
            }
            Entry::Occupied(mut slot) => match self.policy {
                DuplicateExchangePolicy::Deduplicate => BeginExchange::Duplicate,
                DuplicateExchangePolicy::ClearAndRetry => {
                    slot.insert(in_flight);
                    BeginExchange::Started
                }
            },
        }
    }

    /// Releases `key` after its exchange completed successfully.
    pub fn complete(&self, key: &ExchangeKey) {
        self.inner.remove(key);
    }

    /// Request identifier of the tracked delivery, if the key is in flight.
    pub fn request_id(&self, key: &ExchangeKey) -> Option<String> {
        self.inner.get(key).map(|entry| entry.request_id.clone())
    }

    pub fn contains(&self, key: &ExchangeKey) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn sweep(&self) {
        let Some(ttl) = self.ttl else {
            return;
        };
        let now = Instant::now();
        self.inner
            .retain(|_, in_flight| now.duration_since(in_flight.started_at) <= ttl);
    }
}
