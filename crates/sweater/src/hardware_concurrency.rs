//! Hardware Concurrency
//!
//! Number of hardware threads the shops size themselves to, detected once
//! per process and optionally capped.

use std::sync::OnceLock;

use crate::error::{Result, SweaterError};

/// Compile-time cap on hardware concurrency for the target.
///
/// Android devices top out at 8 cores in practice.
#[cfg(target_os = "android")]
pub const MAX_HARDWARE_CONCURRENCY: Option<usize> = Some(8);

/// Compile-time cap on hardware concurrency for the target.
#[cfg(not(target_os = "android"))]
pub const MAX_HARDWARE_CONCURRENCY: Option<usize> = None;

/// Environment variable that overrides [`MAX_HARDWARE_CONCURRENCY`]
pub const MAX_HARDWARE_CONCURRENCY_ENV: &str = "SWEATER_MAX_HARDWARE_CONCURRENCY";

static HARDWARE_CONCURRENCY: OnceLock<usize> = OnceLock::new();

/// Hardware threads reported by the OS right now (at least 1)
pub fn detected() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Parse a hardware concurrency cap. Zero is rejected.
pub fn parse_max_hardware_concurrency(value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(max) if max > 0 => Ok(max),
        _ => Err(SweaterError::Config {
            key: MAX_HARDWARE_CONCURRENCY_ENV,
            value: value.to_string(),
        }),
    }
}

/// Effective cap: the env override if it is valid, otherwise the target's
/// compile-time cap.
pub fn max_hardware_concurrency() -> Option<usize> {
    let Ok(value) = std::env::var(MAX_HARDWARE_CONCURRENCY_ENV) else {
        return MAX_HARDWARE_CONCURRENCY;
    };
    match parse_max_hardware_concurrency(&value) {
        Ok(max) => Some(max),
        Err(err) => {
            tracing::warn!("Ignoring {}", err);
            MAX_HARDWARE_CONCURRENCY
        }
    }
}

/// `detected` limited to `max`, never below 1
pub fn capped(detected: usize, max: Option<usize>) -> usize {
    match max {
        Some(max) => detected.min(max),
        None => detected,
    }
    .max(1)
}

/// Hardware concurrency used by the shops.
///
/// Detected on first call and fixed for the lifetime of the process.
pub fn hardware_concurrency() -> usize {
    *HARDWARE_CONCURRENCY.get_or_init(|| {
        let detected = detected();
        let max = max_hardware_concurrency();
        let value = capped(detected, max);
        tracing::debug!(detected, ?max, value, "Hardware concurrency");
        value
    })
}
