//! Dispatched Results
//!
//! One-shot promise/future pair carrying the result of dispatched work
//! back to the caller. The future side can be waited on from a thread or
//! awaited from async code.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use crate::error::{Result, SweaterError};
use crate::job::panic_message;

/// Result slot shared by a promise and its future
struct Shared<T> {
    state: Mutex<State<T>>,
    condvar: Condvar,
}

struct State<T> {
    outcome: Option<Result<T>>,
    /// The outcome has been handed out already
    taken: bool,
    waker: Option<Waker>,
}

impl<T> State<T> {
    fn is_settled(&self) -> bool {
        self.taken || self.outcome.is_some()
    }

    fn take(&mut self) -> Option<Result<T>> {
        match self.outcome.take() {
            Some(outcome) => {
                self.taken = true;
                Some(outcome)
            }
            None if self.taken => Some(Err(SweaterError::ResultTaken)),
            None => None,
        }
    }
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, outcome: Result<T>) {
        let waker = {
            let mut state = self.lock();
            if state.is_settled() {
                return;
            }
            state.outcome = Some(outcome);
            self.condvar.notify_all();
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Create a connected promise/future pair
pub fn channel<T>() -> (Promise<T>, Dispatched<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            outcome: None,
            taken: false,
            waker: None,
        }),
        condvar: Condvar::new(),
    });
    (
        Promise {
            shared: Some(Arc::clone(&shared)),
        },
        Dispatched { shared },
    )
}

/// Producer side. Dropping it unfulfilled breaks the promise.
pub struct Promise<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("fulfilled", &self.shared.is_none())
            .finish()
    }
}

impl<T> Promise<T> {
    /// Deliver the value
    pub fn set_value(mut self, value: T) {
        if let Some(shared) = self.shared.take() {
            shared.complete(Ok(value));
        }
    }

    /// Deliver a panic caught while producing the value
    pub fn set_panic(mut self, payload: Box<dyn Any + Send>) {
        if let Some(shared) = self.shared.take() {
            shared.complete(Err(SweaterError::WorkPanicked(panic_message(
                payload.as_ref(),
            ))));
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.complete(Err(SweaterError::BrokenPromise));
        }
    }
}

/// Consumer side: the eventual result of dispatched work
#[must_use = "dropping a Dispatched discards the work's result"]
pub struct Dispatched<T> {
    shared: Arc<Shared<T>>,
}

impl<T> fmt::Debug for Dispatched<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatched")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl<T> Dispatched<T> {
    /// Whether waiting would return at once
    pub fn is_ready(&self) -> bool {
        self.shared.lock().is_settled()
    }

    /// Block until the work has finished
    pub fn wait(self) -> Result<T> {
        let mut state = self.shared.lock();
        loop {
            if let Some(outcome) = state.take() {
                return outcome;
            }
            state = self
                .shared
                .condvar
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout`. Gives the handle back if the work has
    /// not finished yet.
    pub fn wait_timeout(self, timeout: Duration) -> std::result::Result<Result<T>, Self> {
        let outcome = {
            let state = self.shared.lock();
            let (mut state, _) = self
                .shared
                .condvar
                .wait_timeout_while(state, timeout, |state| !state.is_settled())
                .unwrap_or_else(PoisonError::into_inner);
            state.take()
        };
        outcome.ok_or(self)
    }

    /// Take the result if it is ready, otherwise give the handle back
    pub fn try_take(self) -> std::result::Result<Result<T>, Self> {
        let outcome = self.shared.lock().take();
        outcome.ok_or(self)
    }
}

impl<T> Future for Dispatched<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.lock();
        match state.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                match &mut state.waker {
                    Some(waker) if waker.will_wake(cx.waker()) => {}
                    slot => *slot = Some(cx.waker().clone()),
                }
                Poll::Pending
            }
        }
    }
}
