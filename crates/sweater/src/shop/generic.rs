//! Generic Shop
//!
//! Worker threads pulling jobs from a shared concurrent queue. The thread
//! calling `spread_the_sweat` counts as one of the workers.

use std::any::Any;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::Shop;
use crate::config::ShopConfig;
use crate::error::{Result, SweaterError};
use crate::job::Job;
use crate::latch::Latch;
use crate::queue::ConcurrentQueue;
use crate::range::{self, Iterations};

/// How long a thread waiting on its chunks sleeps between helping rounds
const HELP_INTERVAL: Duration = Duration::from_millis(1);

/// State shared between the shop and its workers
struct Inner {
    /// Pending jobs
    queue: ConcurrentQueue<Job>,
    /// Guards parking so that wake-ups cannot be lost
    park: Mutex<()>,
    /// Wakes parked workers
    wake: Condvar,
    /// Tells workers to exit once the queue is drained
    shutdown: AtomicBool,
    /// Jobs currently running on worker threads
    active: AtomicUsize,
    /// Idle worker park timeout
    park_timeout: Duration,
}

impl Inner {
    fn new(config: &ShopConfig) -> Self {
        Self {
            queue: ConcurrentQueue::new(config.queue_capacity),
            park: Mutex::new(()),
            wake: Condvar::new(),
            shutdown: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            park_timeout: config.park_timeout(),
        }
    }

    fn push(&self, job: Job) {
        let mut job = job;
        loop {
            match self.queue.push(job) {
                Ok(()) => break,
                Err(rejected) => {
                    job = rejected;
                    // Queue full: make room by doing some of the work here.
                    match self.queue.pop() {
                        Some(other) => {
                            other.run_logged();
                        }
                        None => thread::yield_now(),
                    }
                }
            }
        }

        let _guard = self.park.lock().unwrap_or_else(PoisonError::into_inner);
        self.wake.notify_one();
    }

    fn run(&self, job: Job) {
        self.active.fetch_add(1, Ordering::SeqCst);
        job.run_logged();
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn worker_loop(&self) {
        loop {
            if let Some(job) = self.queue.pop() {
                self.run(job);
                continue;
            }

            let guard = self.park.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.queue.is_empty() {
                continue;
            }
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            // Timed so a missed notification only costs one timeout.
            let _ = self
                .wake
                .wait_timeout(guard, self.park_timeout)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        let _guard = self.park.lock().unwrap_or_else(PoisonError::into_inner);
        self.wake.notify_all();
    }
}

/// Worker thread
struct Worker {
    id: usize,
    thread: Option<JoinHandle<()>>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl Worker {
    fn spawn(id: usize, inner: Arc<Inner>, config: &ShopConfig) -> Result<Self> {
        let mut builder =
            thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread = builder.spawn(move || {
            tracing::trace!(worker = id, "Worker started");
            inner.worker_loop();
            tracing::trace!(worker = id, "Worker stopped");
        })?;

        Ok(Self {
            id,
            thread: Some(thread),
        })
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            // The shop may be dropped by one of its own jobs. That worker
            // cannot join itself; it exits once its current job returns.
            if thread.thread().id() == thread::current().id() {
                tracing::trace!(worker = self.id, "Detaching current worker");
                return;
            }
            if thread.join().is_err() {
                tracing::error!(worker = self.id, "Worker thread panicked");
            }
        }
    }
}

/// Bookkeeping for one `spread_the_sweat` call
struct Sweat {
    latch: Latch,
    panic: Mutex<Option<Box<dyn Any + Send>>>,
}

impl Sweat {
    fn record_panic(&self, payload: Box<dyn Any + Send>) {
        let mut slot = self.panic.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(payload);
        }
    }

    fn take_panic(&self) -> Option<Box<dyn Any + Send>> {
        self.panic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Worker pool shop
pub struct GenericShop {
    inner: Arc<Inner>,
    workers: Vec<Worker>,
    config: ShopConfig,
}

impl fmt::Debug for GenericShop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericShop")
            .field("workers", &self.workers)
            .field("pending_jobs", &self.pending_jobs())
            .field("active_jobs", &self.active_jobs())
            .finish()
    }
}

impl GenericShop {
    /// Create a shop with `workers` workers in total (the calling thread
    /// included), using default settings otherwise.
    pub fn new(workers: usize) -> Result<Self> {
        Self::with_config(ShopConfig::default().with_workers(workers))
    }

    /// Create a shop from a configuration
    pub fn with_config(config: ShopConfig) -> Result<Self> {
        if config.workers == Some(0) {
            return Err(SweaterError::InvalidWorkerCount(0));
        }

        let mut shop = Self {
            inner: Arc::new(Inner::new(&config)),
            workers: Vec::new(),
            config,
        };
        shop.spawn_workers(shop.config.resolved_workers())?;
        Ok(shop)
    }

    /// Shop for process-wide use. Never fails: if threads cannot be
    /// spawned, all work runs on the calling thread.
    pub fn global(config: ShopConfig) -> Self {
        match Self::with_config(config.clone()) {
            Ok(shop) => shop,
            Err(err) => {
                tracing::error!("Falling back to a single-worker shop: {}", err);
                Self {
                    inner: Arc::new(Inner::new(&config)),
                    workers: Vec::new(),
                    config,
                }
            }
        }
    }

    /// Configuration the shop was built from
    pub fn config(&self) -> &ShopConfig {
        &self.config
    }

    /// Jobs waiting in the queue
    pub fn pending_jobs(&self) -> usize {
        self.inner.queue.len()
    }

    /// Jobs currently running on worker threads
    pub fn active_jobs(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Nothing queued and nothing running
    pub fn is_idle(&self) -> bool {
        self.pending_jobs() == 0 && self.active_jobs() == 0
    }

    /// Replace the worker threads so that the shop has `workers` workers in
    /// total. Queued jobs are finished by the old threads first.
    pub fn set_number_of_workers(&mut self, workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(SweaterError::InvalidWorkerCount(0));
        }
        if workers == self.number_of_workers() {
            return Ok(());
        }

        self.stop_workers();
        self.inner.shutdown.store(false, Ordering::Release);
        self.config.workers = Some(workers);
        self.spawn_workers(workers)
    }

    fn spawn_workers(&mut self, workers: usize) -> Result<()> {
        let threads = workers.saturating_sub(1);
        self.workers.reserve(threads);
        for id in 0..threads {
            match Worker::spawn(id, Arc::clone(&self.inner), &self.config) {
                Ok(worker) => self.workers.push(worker),
                Err(err) => {
                    self.stop_workers();
                    return Err(err);
                }
            }
        }
        tracing::debug!(workers, threads, "Shop staffed");
        Ok(())
    }

    fn stop_workers(&mut self) {
        self.inner.signal_shutdown();
        for worker in &mut self.workers {
            worker.join();
        }
        self.workers.clear();
    }

    /// Run queued jobs on this thread until `latch` is released
    fn help_until(&self, latch: &Latch) {
        while !latch.is_released() {
            match self.inner.queue.pop() {
                Some(job) => {
                    job.run_logged();
                }
                None => {
                    latch.wait_timeout(HELP_INTERVAL);
                }
            }
        }
    }
}

impl Shop for GenericShop {
    fn number_of_workers(&self) -> usize {
        self.workers.len() + 1
    }

    fn spread_the_sweat<F>(&self, iterations: Iterations, work: F)
    where
        F: Fn(Iterations, Iterations) + Sync,
    {
        let chunks = range::chunk_count(iterations, self.number_of_workers());
        match chunks {
            0 => return,
            1 => return work(0, iterations),
            _ => {}
        }

        let sweat = Arc::new(Sweat {
            latch: Latch::new(chunks - 1),
            panic: Mutex::new(None),
        });

        let work_ref: &(dyn Fn(Iterations, Iterations) + Sync + '_) = &work;
        // SAFETY: every job holding this reference counts the latch down
        // after its last use of it, and this function does not return or
        // unwind before the latch is released. The jobs themselves cannot
        // be dropped unrun: workers drain the queue before exiting and the
        // shop outlives this call.
        let work_static: &'static (dyn Fn(Iterations, Iterations) + Sync + 'static) =
            unsafe { mem::transmute(work_ref) };

        for index in 1..chunks {
            let chunk = range::worker_range(index, iterations, chunks);
            let sweat = Arc::clone(&sweat);
            self.inner.push(Job::new(move || {
                let result =
                    panic::catch_unwind(AssertUnwindSafe(|| work_static(chunk.start, chunk.stop)));
                if let Err(payload) = result {
                    sweat.record_panic(payload);
                }
                sweat.latch.count_down();
            }));
        }

        let first = range::worker_range(0, iterations, chunks);
        let local = panic::catch_unwind(AssertUnwindSafe(|| work(first.start, first.stop)));

        self.help_until(&sweat.latch);

        if let Err(payload) = local {
            panic::resume_unwind(payload);
        }
        if let Some(payload) = sweat.take_panic() {
            panic::resume_unwind(payload);
        }
    }

    fn fire_and_forget<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job = Job::new(work);
        if self.workers.is_empty() {
            job.run_logged();
        } else {
            self.inner.push(job);
        }
    }
}

impl Drop for GenericShop {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::time::Instant;

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_number_of_workers() {
        let shop = GenericShop::new(3).unwrap();
        assert_eq!(shop.number_of_workers(), 3);
        assert_eq!(shop.workers.len(), 2);
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            GenericShop::new(0),
            Err(SweaterError::InvalidWorkerCount(0))
        ));
    }

    #[test]
    fn test_spread_covers_every_iteration_once() {
        let shop = GenericShop::new(4).unwrap();
        let hits: Vec<AtomicUsize> = (0..1000).map(|_| AtomicUsize::new(0)).collect();

        shop.spread_the_sweat(1000, |start, stop| {
            for i in start..stop {
                hits[i as usize].fetch_add(1, Ordering::Relaxed);
            }
        });

        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_spread_zero_iterations() {
        let shop = GenericShop::new(4).unwrap();
        let calls = AtomicUsize::new(0);
        shop.spread_the_sweat(0, |_, _| {
            calls.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_spread_chunks_are_non_empty() {
        let shop = GenericShop::new(8).unwrap();
        let chunks = Mutex::new(Vec::new());
        shop.spread_the_sweat(3, |start, stop| {
            assert!(start < stop);
            chunks.lock().unwrap().push((start, stop));
        });

        let mut chunks = chunks.into_inner().unwrap();
        chunks.sort();
        assert_eq!(chunks, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_spread_single_worker_runs_inline() {
        let shop = GenericShop::new(1).unwrap();
        let caller = thread::current().id();
        shop.spread_the_sweat(10, |start, stop| {
            assert_eq!((start, stop), (0, 10));
            assert_eq!(thread::current().id(), caller);
        });
    }

    #[test]
    fn test_spread_resumes_panic_after_all_chunks() {
        let shop = GenericShop::new(4).unwrap();
        let finished = AtomicUsize::new(0);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            shop.spread_the_sweat(4, |start, _| {
                if start == 2 {
                    panic!("chunk failed");
                }
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }));

        assert!(result.is_err());
        assert_eq!(finished.load(Ordering::SeqCst), 3);

        // Workers survive the panic.
        let sum = AtomicU64::new(0);
        shop.spread_the_sweat(100, |start, stop| {
            sum.fetch_add((start..stop).map(u64::from).sum(), Ordering::Relaxed);
        });
        assert_eq!(sum.load(Ordering::Relaxed), 4950);
    }

    #[test]
    fn test_fire_and_forget() {
        let shop = GenericShop::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            shop.fire_and_forget(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        wait_until(|| counter.load(Ordering::SeqCst) == 10);
    }

    #[test]
    fn test_fire_and_forget_panic_is_contained() {
        let shop = GenericShop::new(2).unwrap();
        shop.fire_and_forget(|| panic!("detached failure"));

        let value = shop.dispatch(|| 5).wait().unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn test_dispatch_value_and_panic() {
        let shop = GenericShop::new(3).unwrap();
        assert_eq!(shop.dispatch(|| "hello".len()).wait().unwrap(), 5);

        let failed = shop.dispatch(|| -> u8 { panic!("no value") }).wait();
        assert!(matches!(failed, Err(SweaterError::WorkPanicked(ref m)) if m == "no value"));
    }

    #[test]
    fn test_drop_drains_queue() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let shop = GenericShop::with_config(ShopConfig {
                queue_capacity: 256,
                ..ShopConfig::default().with_workers(2)
            })
            .unwrap();
            for _ in 0..100 {
                let counter = Arc::clone(&counter);
                shop.fire_and_forget(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_full_queue_applies_backpressure() {
        let shop = GenericShop::with_config(ShopConfig {
            queue_capacity: 2,
            ..ShopConfig::default().with_workers(2)
        })
        .unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..64 {
            let counter = Arc::clone(&counter);
            shop.fire_and_forget(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        wait_until(|| counter.load(Ordering::SeqCst) == 64);
    }

    #[test]
    fn test_set_number_of_workers() {
        let mut shop = GenericShop::new(2).unwrap();
        shop.set_number_of_workers(5).unwrap();
        assert_eq!(shop.number_of_workers(), 5);
        assert_eq!(shop.config().workers, Some(5));

        let calls = AtomicUsize::new(0);
        shop.spread_the_sweat(5, |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        shop.set_number_of_workers(1).unwrap();
        assert_eq!(shop.number_of_workers(), 1);
        assert!(matches!(
            shop.set_number_of_workers(0),
            Err(SweaterError::InvalidWorkerCount(0))
        ));
    }

    #[test]
    fn test_last_handle_dropped_on_worker() {
        let shop = Arc::new(GenericShop::new(3).unwrap());
        let handle = Arc::clone(&shop);
        let dispatched = shop.dispatch(move || {
            thread::sleep(Duration::from_millis(50));
            drop(handle);
            thread::current().name().map(str::to_string)
        });
        drop(shop);

        let name = dispatched.wait().unwrap();
        assert!(name.is_some_and(|n| n.starts_with("sweater-")));
    }

    #[test]
    fn test_thread_names() {
        let config = ShopConfig::default()
            .with_workers(2)
            .with_thread_name_prefix("sweat");
        let shop = GenericShop::with_config(config).unwrap();
        let name = shop
            .dispatch(|| thread::current().name().map(str::to_string))
            .wait()
            .unwrap();
        assert_eq!(name.as_deref(), Some("sweat-0"));
    }

    #[test]
    fn test_is_idle_after_work() {
        let shop = GenericShop::new(2).unwrap();
        shop.dispatch(|| thread::sleep(Duration::from_millis(5)))
            .wait()
            .unwrap();
        wait_until(|| shop.is_idle());
    }
}
