//! Shared application state.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::config::ServerConfig;
use crate::core::conversation::ContextWindowBuilder;
use crate::core::llm::{GenerationResult, SharedGenerator, create_generator};
use crate::core::registry::SessionRegistry;

/// Reason a new WebSocket connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionLimitError {
    #[error("global WebSocket connection limit reached")]
    GlobalLimitReached,
    #[error("per-IP connection limit reached")]
    PerIpLimitReached,
}

/// Application state shared across all handlers.
pub struct AppState {
    pub config: ServerConfig,
    /// Generation backend shared by every session
    pub generator: SharedGenerator,
    /// Live sessions, for shutdown fan-out and the operational endpoint
    pub sessions: Arc<SessionRegistry>,
    context: ContextWindowBuilder,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, usize>,
}

impl AppState {
    /// Build state with the generation backend described by `config`.
    pub fn new(config: ServerConfig) -> GenerationResult<Arc<Self>> {
        let generator = create_generator(&config)?;
        Ok(Self::with_generator(config, generator))
    }

    /// Build state around an already constructed generator.
    pub fn with_generator(config: ServerConfig, generator: SharedGenerator) -> Arc<Self> {
        let context = ContextWindowBuilder::new(config.system_prompt());
        Arc::new(Self {
            config,
            generator,
            sessions: Arc::new(SessionRegistry::new()),
            context,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Window builder carrying the configured persona directive.
    pub fn context_builder(&self) -> ContextWindowBuilder {
        self.context.clone()
    }

    pub fn generation_timeout(&self) -> Duration {
        self.config.generation_timeout()
    }

    /// Reserve a connection slot for `ip`.
    ///
    /// Every successful call must be paired with [`AppState::release_connection`].
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        if let Some(max) = self.config.max_websocket_connections {
            let reserved = self
                .ws_connections
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    (current < max).then_some(current + 1)
                });
            if reserved.is_err() {
                return Err(ConnectionLimitError::GlobalLimitReached);
            }
        } else {
            self.ws_connections.fetch_add(1, Ordering::AcqRel);
        }

        let mut per_ip = self.ip_connections.entry(ip).or_insert(0);
        if *per_ip >= self.config.max_connections_per_ip {
            drop(per_ip);
            self.ws_connections.fetch_sub(1, Ordering::AcqRel);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *per_ip += 1;
        debug!(ip = %ip, count = *per_ip, "Connection slot acquired");
        Ok(())
    }

    /// Return a slot obtained from [`AppState::try_acquire_connection`].
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });

        self.ip_connections.remove_if_mut(&ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
        debug!(ip = %ip, "Connection slot released");
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: IpAddr) -> usize {
        self.ip_connections.get(&ip).map(|c| *c).unwrap_or(0)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("provider", &self.generator.provider_name())
            .field("model", &self.generator.model())
            .field("sessions", &self.sessions.len())
            .field("ws_connections", &self.ws_connection_count())
            .finish()
    }
}
