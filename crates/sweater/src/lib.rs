//! Sweater
//!
//! Spreads the sweat of parallel loops over a shop of workers.
//!
//! # Shops
//! - [`GenericShop`]: worker pool fed by a lock-free concurrent queue
//!   (every target except iOS/macOS, or anywhere with the `generic-shop`
//!   feature)
//! - `AppleShop`: thin layer over Grand Central Dispatch (iOS/macOS)
//!
//! [`DefaultShop`] names whichever one the target uses, and [`shop()`]
//! returns the process-wide instance.
//!
//! # Example
//! ```rust,no_run
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! let sum = AtomicU64::new(0);
//! sweater::spread_the_sweat(1000, |begin, end| {
//!     let partial: u64 = (begin..end).map(u64::from).sum();
//!     sum.fetch_add(partial, Ordering::Relaxed);
//! });
//! assert_eq!(sum.into_inner(), 499_500);
//!
//! let answer = sweater::dispatch(|| 6 * 7).wait().unwrap();
//! assert_eq!(answer, 42);
//! ```

pub mod config;
pub mod error;
pub mod future;
pub mod hardware_concurrency;
pub mod job;
pub mod latch;
pub mod parallel;
#[cfg(any(feature = "generic-shop", not(any(target_os = "ios", target_os = "macos"))))]
pub mod queue;
pub mod range;
pub mod shop;

pub use config::ShopConfig;
pub use error::{Result, SweaterError};
pub use future::{Dispatched, Promise};
pub use hardware_concurrency::hardware_concurrency;
pub use job::{Job, panic_message};
pub use parallel::{parallel_for, parallel_map, parallel_reduce};
pub use range::{Iterations, WorkerRange, worker_range, worker_ranges};
pub use shop::{DefaultShop, Shop, shop};

#[cfg(any(feature = "generic-shop", not(any(target_os = "ios", target_os = "macos"))))]
pub use queue::ConcurrentQueue;
#[cfg(any(feature = "generic-shop", not(any(target_os = "ios", target_os = "macos"))))]
pub use shop::GenericShop;
#[cfg(all(not(feature = "generic-shop"), any(target_os = "ios", target_os = "macos")))]
pub use shop::AppleShop;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of workers in the global shop
pub fn number_of_workers() -> usize {
    shop().number_of_workers()
}

/// Run `work` over `[0, iterations)` on the global shop, split into
/// contiguous per-worker ranges. Blocks until every range is done.
pub fn spread_the_sweat<F>(iterations: Iterations, work: F)
where
    F: Fn(Iterations, Iterations) + Sync,
{
    shop().spread_the_sweat(iterations, work)
}

/// Run `work` asynchronously on the global shop.
pub fn fire_and_forget<F>(work: F)
where
    F: FnOnce() + Send + 'static,
{
    shop().fire_and_forget(work)
}

/// Run `work` asynchronously on the global shop and hand back its result.
pub fn dispatch<F, R>(work: F) -> Dispatched<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    shop().dispatch(work)
}
