use std::sync::Arc;

use dashmap::DashMap;

use crate::connection::AuthConnection;
use crate::error::AuthError;

/// Thread-safe registry mapping a connection name to its configured
/// [`AuthConnection`].
///
/// Registrations are expected at startup before concurrent traffic; reads
/// are safe under concurrency, but racing writers for the same name are not
/// serialized beyond last-write-wins.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: DashMap<String, Arc<dyn AuthConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Looks up a connection, failing loudly when the name was never
    /// registered.
    pub fn get(&self, name: &str) -> Result<Arc<dyn AuthConnection>, AuthError> {
        self.inner
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AuthError::UnknownConnection(name.to_string()))
    }

    /// Registers a connection under `name`, overwriting any previous entry.
    pub fn set(&self, name: impl Into<String>, connection: Arc<dyn AuthConnection>) {
        self.inner.insert(name.into(), connection);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
