//! Concurrent Queue
//!
//! Bounded lock-free multi-producer, multi-consumer queue feeding the
//! generic shop's workers.

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::MAX_QUEUE_CAPACITY;

/// Pads a value to its own cache line
#[repr(align(64))]
struct CachePadded<T>(T);

/// Ring buffer slot
struct Slot<T> {
    /// Equals the slot index when free for the push at that position,
    /// index + 1 when holding the value for the pop at that position.
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Multi-producer, multi-consumer bounded queue
///
/// Each slot carries a sequence number, so every push and pop claims its
/// position with a single CAS on the shared cursor.
pub struct ConcurrentQueue<T> {
    /// Ring buffer
    buffer: Box<[Slot<T>]>,
    /// Mask for index wrapping (capacity - 1)
    mask: usize,
    /// Next position to pop
    head: CachePadded<AtomicUsize>,
    /// Next position to push
    tail: CachePadded<AtomicUsize>,
}

impl<T> fmt::Debug for ConcurrentQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

impl<T> ConcurrentQueue<T> {
    /// Create a queue with the given capacity, rounded up to a power of 2
    /// and clamped to `[2, MAX_QUEUE_CAPACITY]`
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity
            .clamp(2, MAX_QUEUE_CAPACITY)
            .checked_next_power_of_two()
            .unwrap_or(MAX_QUEUE_CAPACITY);
        let buffer: Vec<_> = (0..capacity)
            .map(|index| Slot {
                sequence: AtomicUsize::new(index),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Self {
            buffer: buffer.into_boxed_slice(),
            mask: capacity - 1,
            head: CachePadded(AtomicUsize::new(0)),
            tail: CachePadded(AtomicUsize::new(0)),
        }
    }

    /// Push an item.
    ///
    /// Returns `Err(item)` if the queue is full.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut position = self.tail.0.load(Ordering::Relaxed);
        loop {
            let slot = &self.buffer[position & self.mask];
            let sequence = slot.sequence.load(Ordering::Acquire);
            let diff = sequence as isize - position as isize;

            if diff == 0 {
                match self.tail.0.compare_exchange_weak(
                    position,
                    position.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: the CAS gave this thread exclusive access
                        // to the slot until the sequence store below.
                        unsafe { (*slot.value.get()).write(item) };
                        slot.sequence
                            .store(position.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => position = current,
                }
            } else if diff < 0 {
                // Slot still holds a value from the previous lap
                return Err(item);
            } else {
                position = self.tail.0.load(Ordering::Relaxed);
            }
        }
    }

    /// Pop an item, `None` if empty
    pub fn pop(&self) -> Option<T> {
        let mut position = self.head.0.load(Ordering::Relaxed);
        loop {
            let slot = &self.buffer[position & self.mask];
            let sequence = slot.sequence.load(Ordering::Acquire);
            let diff = sequence as isize - position.wrapping_add(1) as isize;

            if diff == 0 {
                match self.head.0.compare_exchange_weak(
                    position,
                    position.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: the CAS gave this thread exclusive access
                        // to an initialised slot.
                        let item = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.sequence.store(
                            position.wrapping_add(self.mask).wrapping_add(1),
                            Ordering::Release,
                        );
                        return Some(item);
                    }
                    Err(current) => position = current,
                }
            } else if diff < 0 {
                return None;
            } else {
                position = self.head.0.load(Ordering::Relaxed);
            }
        }
    }

    /// Approximate number of queued items
    pub fn len(&self) -> usize {
        let tail = self.tail.0.load(Ordering::Acquire);
        let head = self.head.0.load(Ordering::Acquire);
        tail.wrapping_sub(head).min(self.capacity())
    }

    /// Check if (approximately) empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued items
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }
}

impl<T> Drop for ConcurrentQueue<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

// SAFETY: slots are only accessed by the thread that claimed them through
// the cursors.
unsafe impl<T: Send> Send for ConcurrentQueue<T> {}
unsafe impl<T: Send> Sync for ConcurrentQueue<T> {}
