//! Apple Shop
//!
//! Spreads work over Grand Central Dispatch's global queue instead of
//! owning threads.

use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use super::Shop;
use crate::config::ShopConfig;
use crate::job::Job;
use crate::range::{self, Iterations};

#[repr(C)]
struct DispatchQueueObject {
    _private: [u8; 0],
}

type DispatchQueueRef = *mut DispatchQueueObject;

/// `QOS_CLASS_USER_INITIATED` from `<sys/qos.h>`
const QOS_CLASS_USER_INITIATED: isize = 0x19;

// libdispatch ships in libSystem, which every Apple target links.
unsafe extern "C" {
    fn dispatch_get_global_queue(identifier: isize, flags: usize) -> DispatchQueueRef;

    fn dispatch_apply_f(
        iterations: usize,
        queue: DispatchQueueRef,
        context: *mut c_void,
        work: extern "C" fn(*mut c_void, usize),
    );

    fn dispatch_async_f(
        queue: DispatchQueueRef,
        context: *mut c_void,
        work: extern "C" fn(*mut c_void),
    );
}

/// Handle to a global dispatch queue
#[derive(Clone, Copy)]
struct GlobalQueue(DispatchQueueRef);

// SAFETY: global queues live for the whole process and libdispatch
// accepts submissions from any thread.
unsafe impl Send for GlobalQueue {}
unsafe impl Sync for GlobalQueue {}

impl GlobalQueue {
    fn high_priority() -> Self {
        // SAFETY: plain query of an immortal global object.
        Self(unsafe { dispatch_get_global_queue(QOS_CLASS_USER_INITIATED, 0) })
    }
}

/// Context handed to `dispatch_apply_f`
struct Apply<'a, F> {
    work: &'a F,
    iterations: Iterations,
    chunks: usize,
    panic: Mutex<Option<Box<dyn Any + Send>>>,
}

extern "C" fn apply_chunk<F>(context: *mut c_void, index: usize)
where
    F: Fn(Iterations, Iterations) + Sync,
{
    // SAFETY: `context` is the `Apply` living on the stack of
    // `spread_the_sweat`, which blocks inside dispatch_apply_f.
    let apply = unsafe { &*(context as *const Apply<'_, F>) };
    let chunk = range::worker_range(index, apply.iterations, apply.chunks);

    // Unwinding out of an extern "C" function aborts, so the panic is
    // carried over to the caller instead.
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| {
        (apply.work)(chunk.start, chunk.stop)
    })) {
        let mut slot = apply.panic.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(payload);
        }
    }
}

extern "C" fn run_job(context: *mut c_void) {
    // SAFETY: `context` came from `Box::into_raw` in `fire_and_forget` and
    // libdispatch calls this exactly once.
    let job = unsafe { Box::from_raw(context as *mut Job) };
    job.run_logged();
}

/// Grand Central Dispatch shop
pub struct AppleShop {
    queue: GlobalQueue,
    workers: usize,
}

impl fmt::Debug for AppleShop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppleShop")
            .field("workers", &self.workers)
            .finish()
    }
}

impl AppleShop {
    /// Shop with one worker per hardware thread
    pub fn new() -> Self {
        Self::global(ShopConfig::default())
    }

    /// Shop for process-wide use.
    ///
    /// GCD owns the threads, so only the worker count is taken from the
    /// configuration.
    pub fn global(config: ShopConfig) -> Self {
        let workers = config.resolved_workers();
        tracing::debug!(workers, "Dispatch shop ready");
        Self {
            queue: GlobalQueue::high_priority(),
            workers,
        }
    }
}

impl Default for AppleShop {
    fn default() -> Self {
        Self::new()
    }
}

impl Shop for AppleShop {
    fn number_of_workers(&self) -> usize {
        self.workers
    }

    fn spread_the_sweat<F>(&self, iterations: Iterations, work: F)
    where
        F: Fn(Iterations, Iterations) + Sync,
    {
        // Striding keeps dispatch_apply from making one indirect call per
        // iteration.
        let chunks = range::chunk_count(iterations, self.workers);
        if chunks == 0 {
            return;
        }

        let apply = Apply {
            work: &work,
            iterations,
            chunks,
            panic: Mutex::new(None),
        };

        // SAFETY: dispatch_apply_f returns only after every chunk has run,
        // so `apply` outlives all uses of the context pointer.
        unsafe {
            dispatch_apply_f(
                chunks,
                self.queue.0,
                &apply as *const Apply<'_, F> as *mut c_void,
                apply_chunk::<F>,
            );
        }

        let payload = apply
            .panic
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(payload) = payload {
            panic::resume_unwind(payload);
        }
    }

    fn fire_and_forget<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let context = Box::into_raw(Box::new(Job::new(work)));
        // SAFETY: ownership of the job passes to `run_job`.
        unsafe {
            dispatch_async_f(self.queue.0, context as *mut c_void, run_job);
        }
    }
}
