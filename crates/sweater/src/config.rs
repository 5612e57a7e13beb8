//! Shop Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SweaterError};
use crate::hardware_concurrency::{self, MAX_HARDWARE_CONCURRENCY_ENV};

/// Default bound on queued jobs per shop
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Largest accepted job queue capacity
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;

/// Default time an idle worker sleeps before rechecking for shutdown
pub const DEFAULT_PARK_TIMEOUT_MS: u64 = 100;

/// Shop configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    /// Total number of workers, the calling thread included.
    /// `None` means one per hardware thread.
    pub workers: Option<usize>,

    /// Upper bound applied to the detected hardware concurrency
    pub max_hardware_concurrency: Option<usize>,

    /// Worker thread names are `{prefix}-{index}`
    pub thread_name_prefix: String,

    /// Worker thread stack size (bytes)
    pub stack_size: Option<usize>,

    /// Capacity of the job queue (rounded up to a power of two)
    pub queue_capacity: usize,

    /// Idle worker park timeout (milliseconds)
    pub park_timeout_ms: u64,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            workers: None,
            max_hardware_concurrency: None,
            thread_name_prefix: "sweater".to_string(),
            stack_size: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            park_timeout_ms: DEFAULT_PARK_TIMEOUT_MS,
        }
    }
}

impl ShopConfig {
    /// Defaults overridden by `SWEATER_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `SWEATER_*` key.
    pub fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("SWEATER_WORKERS") {
            let workers = parse_usize("SWEATER_WORKERS", &value)?;
            if workers == 0 {
                return Err(SweaterError::InvalidWorkerCount(0));
            }
            config.workers = Some(workers);
        }
        if let Some(value) = lookup(MAX_HARDWARE_CONCURRENCY_ENV) {
            config.max_hardware_concurrency =
                Some(hardware_concurrency::parse_max_hardware_concurrency(&value)?);
        }
        if let Some(value) = lookup("SWEATER_THREAD_NAME_PREFIX") {
            let prefix = value.trim();
            if prefix.is_empty() {
                return Err(SweaterError::Config {
                    key: "SWEATER_THREAD_NAME_PREFIX",
                    value,
                });
            }
            config.thread_name_prefix = prefix.to_string();
        }
        if let Some(value) = lookup("SWEATER_STACK_SIZE") {
            config.stack_size = Some(parse_usize("SWEATER_STACK_SIZE", &value)?);
        }
        if let Some(value) = lookup("SWEATER_QUEUE_CAPACITY") {
            let capacity = parse_usize("SWEATER_QUEUE_CAPACITY", &value)?;
            if capacity == 0 || capacity > MAX_QUEUE_CAPACITY {
                return Err(SweaterError::Config {
                    key: "SWEATER_QUEUE_CAPACITY",
                    value,
                });
            }
            config.queue_capacity = capacity;
        }
        if let Some(value) = lookup("SWEATER_PARK_TIMEOUT_MS") {
            config.park_timeout_ms = value
                .trim()
                .parse()
                .map_err(|_| SweaterError::Config {
                    key: "SWEATER_PARK_TIMEOUT_MS",
                    value: value.clone(),
                })?;
        }

        Ok(config)
    }

    /// Set the total worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the thread name prefix
    pub fn with_thread_name_prefix(mut self, prefix: &str) -> Self {
        self.thread_name_prefix = prefix.to_string();
        self
    }

    /// Park timeout as a [`Duration`]
    pub fn park_timeout(&self) -> Duration {
        Duration::from_millis(self.park_timeout_ms.max(1))
    }

    /// Worker count this config resolves to on the current machine
    pub fn resolved_workers(&self) -> usize {
        let workers = self.workers.unwrap_or_else(crate::hardware_concurrency);
        match self.max_hardware_concurrency {
            Some(max) if self.workers.is_none() => workers.min(max),
            _ => workers,
        }
        .max(1)
    }
}

fn parse_usize(key: &'static str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| SweaterError::Config {
        key,
        value: value.to_string(),
    })
}
