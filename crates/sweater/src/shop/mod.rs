//! Shops
//!
//! A shop owns (or borrows from the OS) a set of workers and spreads work
//! over them.
//! - `GenericShop`: worker threads fed by a [`ConcurrentQueue`](crate::queue::ConcurrentQueue)
//! - `AppleShop`: Grand Central Dispatch global queue

use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use crate::config::ShopConfig;
use crate::future::{self, Dispatched};
use crate::range::Iterations;

#[cfg(any(feature = "generic-shop", not(any(target_os = "ios", target_os = "macos"))))]
mod generic;
#[cfg(any(feature = "generic-shop", not(any(target_os = "ios", target_os = "macos"))))]
pub use generic::GenericShop;

#[cfg(all(not(feature = "generic-shop"), any(target_os = "ios", target_os = "macos")))]
mod apple;
#[cfg(all(not(feature = "generic-shop"), any(target_os = "ios", target_os = "macos")))]
pub use apple::AppleShop;

/// Shop used by the free functions of this crate
#[cfg(any(feature = "generic-shop", not(any(target_os = "ios", target_os = "macos"))))]
pub type DefaultShop = GenericShop;

/// Shop used by the free functions of this crate
#[cfg(all(not(feature = "generic-shop"), any(target_os = "ios", target_os = "macos")))]
pub type DefaultShop = AppleShop;

/// A pool of workers that parallel work is spread over
pub trait Shop: Send + Sync {
    /// Number of workers that `spread_the_sweat` splits iterations over
    fn number_of_workers(&self) -> usize;

    /// Run `work(start, stop)` for contiguous, disjoint ranges covering
    /// `[0, iterations)`, one range per worker. At most
    /// `number_of_workers()` ranges are issued and none is empty.
    ///
    /// Blocks until every range has been processed. If any range panics,
    /// the remaining ranges still run and the first panic is then resumed
    /// on the caller.
    fn spread_the_sweat<F>(&self, iterations: Iterations, work: F)
    where
        F: Fn(Iterations, Iterations) + Sync;

    /// Run `work` asynchronously. A panic inside `work` is logged and
    /// swallowed.
    fn fire_and_forget<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static;

    /// Run `work` asynchronously and hand back its result
    fn dispatch<F, R>(&self, work: F) -> Dispatched<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (promise, dispatched) = future::channel();
        self.fire_and_forget(move || match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(value) => promise.set_value(value),
            Err(payload) => promise.set_panic(payload),
        });
        dispatched
    }
}

static SHOP: OnceLock<DefaultShop> = OnceLock::new();

/// The process-wide shop, created on first use from `SWEATER_*`
/// environment variables.
pub fn shop() -> &'static DefaultShop {
    SHOP.get_or_init(|| {
        let config = ShopConfig::from_env().unwrap_or_else(|err| {
            tracing::warn!("Invalid shop configuration, using defaults: {}", err);
            ShopConfig::default()
        });
        DefaultShop::global(config)
    })
}
