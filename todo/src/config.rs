//! Configuration management for the todo store.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::reducer::DEFAULT_EXPIRY_TICK;
use crate::reply::ReplyQueue;
use crate::types::{Settings, DEFAULT_COMPLETED_EXPIRY_MILLIS};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use todo_store_runtime::StoreConfig;

/// Store configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoConfig {
    /// How long a completed todo lives when auto-expiry is on (milliseconds)
    pub completed_expiry_millis: u64,
    /// Interval between expiry sweeps (milliseconds)
    pub expiry_tick_millis: u64,
    /// Switch auto-expiry on right after creation
    pub auto_expire: bool,
    /// Capacity of the runtime's action broadcast channel
    pub broadcast_capacity: usize,
    /// Replies kept before the oldest are dropped
    pub reply_capacity: usize,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
    /// Log filter (trace, debug, info, warn, error or an `EnvFilter` directive)
    pub log_level: String,
}

impl TodoConfig {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparsable variables fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            completed_expiry_millis: env::var("TODO_COMPLETED_EXPIRY_MILLIS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.completed_expiry_millis),
            expiry_tick_millis: env::var("TODO_EXPIRY_TICK_MILLIS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&ms: &u64| ms > 0)
                .unwrap_or(defaults.expiry_tick_millis),
            auto_expire: env::var("TODO_AUTO_EXPIRE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.auto_expire),
            broadcast_capacity: env::var("TODO_BROADCAST_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.broadcast_capacity),
            reply_capacity: env::var("TODO_REPLY_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.reply_capacity),
            shutdown_timeout: env::var("TODO_SHUTDOWN_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.shutdown_timeout),
            log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Sets the completed-todo lifetime
    #[must_use]
    pub const fn with_completed_expiry_millis(mut self, millis: u64) -> Self {
        self.completed_expiry_millis = millis;
        self
    }

    /// Sets the sweep interval, at least 1 ms
    #[must_use]
    pub const fn with_expiry_tick_millis(mut self, millis: u64) -> Self {
        self.expiry_tick_millis = if millis == 0 { 1 } else { millis };
        self
    }

    /// Switches auto-expiry on or off at creation
    #[must_use]
    pub const fn with_auto_expire(mut self, enabled: bool) -> Self {
        self.auto_expire = enabled;
        self
    }

    /// Sets the reply queue capacity
    #[must_use]
    pub const fn with_reply_capacity(mut self, capacity: usize) -> Self {
        self.reply_capacity = capacity;
        self
    }

    /// Sets the shutdown timeout in seconds
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, secs: u64) -> Self {
        self.shutdown_timeout = secs;
        self
    }

    /// Interval between expiry sweeps
    #[must_use]
    pub const fn expiry_tick(&self) -> Duration {
        let millis = if self.expiry_tick_millis == 0 { 1 } else { self.expiry_tick_millis };
        Duration::from_millis(millis)
    }

    /// Settings a freshly created store starts with
    ///
    /// Auto-expiry always starts off; [`crate::TodoStore::create`] switches
    /// it on through a command so the sweep gets scheduled.
    #[must_use]
    pub const fn initial_settings(&self) -> Settings {
        Settings {
            auto_expire_completed_todos: false,
            completed_expiry_millis: self.completed_expiry_millis,
        }
    }

    /// Runtime configuration for the underlying store
    #[must_use]
    pub const fn store_config(&self) -> StoreConfig {
        StoreConfig::new(
            self.broadcast_capacity,
            Duration::from_secs(self.shutdown_timeout),
        )
    }
}

impl Default for TodoConfig {
    fn default() -> Self {
        Self {
            completed_expiry_millis: DEFAULT_COMPLETED_EXPIRY_MILLIS,
            #[allow(clippy::cast_possible_truncation)] // 10ms fits
            expiry_tick_millis: DEFAULT_EXPIRY_TICK.as_millis() as u64,
            auto_expire: false,
            broadcast_capacity: 16,
            reply_capacity: ReplyQueue::DEFAULT_CAPACITY,
            shutdown_timeout: 5,
            log_level: "info".to_string(),
        }
    }
}
