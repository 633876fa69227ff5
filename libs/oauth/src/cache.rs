use dashmap::DashMap;
use time::{Duration, OffsetDateTime};

use crate::endpoint::AccessToken;

/// Per-user token cache backing the silent sign-in path.
///
/// Tokens whose expiry falls within the leeway window are treated as already
/// expired so a token handed to a downstream call does not die mid-request.
pub struct TokenCache {
    inner: DashMap<String, AccessToken>,
    leeway: Duration,
}

impl TokenCache {
    pub fn new(leeway: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            leeway,
        }
    }

    pub fn get(&self, user_id: &str) -> Option<String> {
        let entry = self.inner.get(user_id)?;
        if self.is_expired(&entry) {
            drop(entry);
            self.inner.remove(user_id);
            return None;
        }
        Some(entry.token.clone())
    }

    pub fn insert(&self, user_id: impl Into<String>, token: AccessToken) {
        self.inner.insert(user_id.into(), token);
    }

    pub fn remove(&self, user_id: &str) {
        self.inner.remove(user_id);
    }

    fn is_expired(&self, token: &AccessToken) -> bool {
        match token.expires_at {
            Some(expires_at) => expires_at - self.leeway <= OffsetDateTime::now_utc(),
            None => false,
        }
    }
}
