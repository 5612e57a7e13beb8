//! Jobs
//!
//! Type-erased units of work handed to a shop.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Boxed work function
pub type JobFn = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work queued on a shop.
///
/// Zero-sized closures box without allocating, so stateless work costs
/// nothing beyond the vtable pointer.
pub struct Job {
    func: JobFn,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").finish_non_exhaustive()
    }
}

impl Job {
    /// Wrap a closure
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { func: Box::new(work) }
    }

    /// Run the job, letting a panic unwind into the caller
    pub fn run(self) {
        (self.func)();
    }

    /// Run the job, catching a panic and returning its payload
    pub fn run_isolated(self) -> Result<(), Box<dyn Any + Send>> {
        let func = self.func;
        panic::catch_unwind(AssertUnwindSafe(func))
    }

    /// Run the job and log (rather than propagate) a panic.
    ///
    /// Returns `false` if the job panicked.
    pub fn run_logged(self) -> bool {
        match self.run_isolated() {
            Ok(()) => true,
            Err(payload) => {
                tracing::error!("Detached work panicked: {}", panic_message(payload.as_ref()));
                false
            }
        }
    }
}

/// Human readable text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
