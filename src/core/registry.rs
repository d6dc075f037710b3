//! Registry of live sessions.
//!
//! The registry uses DashMap so connection handlers can register and
//! deregister concurrently without a global lock. Each entry carries a
//! [`CancellationToken`] that graceful shutdown fans out to.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::session::SessionId;

/// Registry record for one live session.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub id: SessionId,
    pub client_ip: Option<IpAddr>,
    /// Unix seconds at registration
    pub connected_at: u64,
    pub shutdown: CancellationToken,
}

impl SessionEntry {
    pub fn new(id: SessionId, client_ip: Option<IpAddr>) -> Self {
        let connected_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            id,
            client_ip,
            connected_at,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Serializable view of a [`SessionEntry`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub client_ip: Option<String>,
    pub connected_at: u64,
}

impl From<&SessionEntry> for SessionSummary {
    fn from(entry: &SessionEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            client_ip: entry.client_ip.map(|ip| ip.to_string()),
            connected_at: entry.connected_at,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. A duplicate id replaces the previous entry.
    pub fn add(&self, entry: SessionEntry) {
        debug!(session_id = %entry.id, "Registering session");
        self.sessions.insert(entry.id, entry);
    }

    /// Deregister a session. Returns the entry if it was present; removing an
    /// unknown id is a no-op.
    pub fn remove(&self, id: &SessionId) -> Option<SessionEntry> {
        let removed = self.sessions.remove(id).map(|(_, entry)| entry);
        if removed.is_some() {
            debug!(session_id = %id, "Deregistered session");
        }
        removed
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Summaries of every live session, oldest first.
    pub fn snapshot(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|entry| SessionSummary::from(entry.value()))
            .collect();
        summaries.sort_by(|a, b| a.connected_at.cmp(&b.connected_at).then(a.id.cmp(&b.id)));
        summaries
    }

    /// Cancel every registered session. Entries are removed by their own
    /// handlers as they wind down.
    pub fn shutdown_all(&self) -> usize {
        let mut count = 0;
        for entry in self.sessions.iter() {
            entry.shutdown.cancel();
            count += 1;
        }
        info!(sessions = count, "Signalled shutdown to all sessions");
        count
    }

    /// Register `entry` and return a guard that deregisters it on drop.
    pub fn register(self: &Arc<Self>, entry: SessionEntry) -> RegistrationGuard {
        let id = entry.id;
        self.add(entry);
        RegistrationGuard {
            registry: Arc::clone(self),
            id,
            on_release: None,
        }
    }
}

/// Deregisters its session when dropped, including during unwinding.
pub struct RegistrationGuard {
    registry: Arc<SessionRegistry>,
    id: SessionId,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl RegistrationGuard {
    /// Run `release` once, just before the session is deregistered.
    pub fn with_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(release));
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl std::fmt::Debug for RegistrationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationGuard")
            .field("id", &self.id)
            .field("has_release", &self.on_release.is_some())
            .finish()
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release();
        }
        self.registry.remove(&self.id);
    }
}
