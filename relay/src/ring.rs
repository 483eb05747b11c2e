//! Bounded lock-free SPSC FIFO ring.
//!
//! In contrast to the two snapshot primitives, the ring is a queue: every
//! successfully pushed item is delivered exactly once and in order. Nothing
//! is dropped silently; backpressure surfaces as an `Err` from
//! [`Producer::push`].
//!
//! - [`Producer::push`] - wait-free, O(1): two index loads, one slot copy,
//!   one release store. Safe to call from interrupt context.
//! - [`Consumer::pop`] - wait-free, O(1), symmetric.
//!
//! The capacity `N` is a compile-time power of two (≥ 2). One slot is kept
//! free as the full/empty sentinel, so a ring of capacity `N` holds at most
//! `N - 1` live items — the price of distinguishing full from empty without
//! an extra shared counter.
//!
//! # Example
//!
//! ```
//! let (producer, consumer) = relay::ring::channel::<u64, 8>();
//!
//! producer.push(1).unwrap();
//! producer.push(2).unwrap();
//! assert_eq!(consumer.pop(), Some(1));
//! assert_eq!(consumer.pop(), Some(2));
//! assert_eq!(consumer.pop(), None);
//! ```
//!
//! # Blocking helpers
//!
//! [`Producer::push_blocking`] and [`Consumer::pop_blocking`] spin until
//! space or data is available. They exist for the *non*-real-time side of a
//! channel (a logger thread draining an ISR's ring, say) and are not part of
//! the wait-free surface: the real-time role should only ever call the
//! non-blocking operations.

use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use minstant::Instant;

use crate::align::{CACHE_LINE_BYTES, CachePadded};
use crate::cell::{PhantomUnsync, SlotCell};
use crate::exchange::Exchange;
use crate::trace::debug;

const _: () = assert!(cfg!(target_has_atomic = "ptr"));

/// Timeout specification for the blocking helpers.
#[derive(Debug, Clone, Copy)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

struct CapacityCheck<const N: usize>;

impl<const N: usize> CapacityCheck<N> {
    /// Compile-time assertion that the capacity is a power of two and >= 2.
    const OK: () = assert!(
        N >= 2 && N.is_power_of_two(),
        "ring capacity must be a power of two and >= 2"
    );
}

/// Shared state carrier: the two indices and the slot array.
///
/// `head` and `tail` each sit on their own cache line, and an explicit pad
/// keeps `buffer[0]` off the `tail` line: the consumer bumping `tail` must
/// not invalidate the line the producer is currently filling.
#[repr(C)]
struct Core<T, const N: usize> {
    /// Index of the next slot to write. Written by the producer (release),
    /// read by the producer (relaxed) and the consumer (acquire).
    head: CachePadded<AtomicUsize>,
    /// Index of the next slot to read. Written by the consumer (release),
    /// read by the consumer (relaxed) and the producer (acquire).
    tail: CachePadded<AtomicUsize>,
    _pad: [u8; CACHE_LINE_BYTES],
    buffer: [SlotCell<MaybeUninit<T>>; N],
}

impl<T, const N: usize> Core<T, N> {
    fn new() -> Self {
        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            _pad: [0; CACHE_LINE_BYTES],
            // SAFETY: an array of uninitialized MaybeUninit cells needs no
            // initialization; SlotCell is repr(transparent) over its payload.
            buffer: unsafe { MaybeUninit::uninit().assume_init() },
        }
    }

    /// Attempts to push an item (producer side).
    ///
    /// # Safety
    ///
    /// Caller must be the sole producer, non-reentrantly.
    #[inline]
    unsafe fn push(&self, item: T) -> Result<(), T> {
        // Producer owns head; relaxed is enough for its own last store.
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) & (N - 1);

        // Acquire pairs with the consumer's release-store of tail, proving
        // the slot at `head` has been vacated before we overwrite it.
        if next == self.tail.load(Ordering::Acquire) {
            return Err(item); // full: the sentinel slot is all that's left
        }

        // SAFETY: head != tail and next != tail, so slot `head` is outside
        // the live window and owned by the producer until the store below.
        unsafe {
            self.buffer[head].get().write(MaybeUninit::new(item));
        }

        // Publication point: the slot bytes happen-before any consumer that
        // observes the new head.
        self.head.store(next, Ordering::Release);
        Ok(())
    }

    /// Attempts to pop an item (consumer side).
    ///
    /// # Safety
    ///
    /// Caller must be the sole consumer, non-reentrantly.
    #[inline]
    unsafe fn pop(&self) -> Option<T> {
        // Consumer owns tail; relaxed is enough for its own last store.
        let tail = self.tail.load(Ordering::Relaxed);

        // Acquire pairs with the producer's release-store of head, so the
        // item at `tail` is fully written before we copy it.
        if tail == self.head.load(Ordering::Acquire) {
            return None; // empty
        }

        // SAFETY: tail != head, so slot `tail` holds an item the producer
        // fully wrote before publishing head past it.
        let item = unsafe { self.buffer[tail].get().read().assume_init() };

        // Vacate the slot for the producer.
        self.tail.store((tail + 1) & (N - 1), Ordering::Release);
        Some(item)
    }
}

/// Write end of the ring.
///
/// Move-only; the producer role transfers rather than duplicates:
///
/// ```compile_fail
/// let (producer, _consumer) = relay::ring::channel::<u32, 4>();
/// let moved = producer;
/// producer.push(1); // error: use of moved value
/// # let _ = moved;
/// ```
///
/// `Producer` is [`Send`] but not [`Sync`]: it can move to another thread,
/// but `&Producer` cannot be shared (no concurrent `push()`).
pub struct Producer<T: Exchange, const N: usize> {
    core: Arc<Core<T, N>>,
    _unsync: PhantomUnsync,
}

impl<T: Exchange, const N: usize> Producer<T, N> {
    /// Attempts to push an item (wait-free).
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if the ring is full; the caller decides whether to
    /// retry later, drop, or escalate.
    #[inline]
    pub fn push(&self, item: T) -> Result<(), T> {
        // SAFETY: the channel hands out exactly one Producer, and !Sync plus
        // &self-by-move keeps its use single-threaded.
        unsafe { self.core.push(item) }
    }

    /// Spins until space is available, then pushes. Not wait-free; for the
    /// non-real-time side only.
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` on timeout.
    pub fn push_blocking(&self, mut item: T, timeout: Timeout) -> Result<(), T> {
        let deadline = match timeout {
            Timeout::Infinite => None,
            Timeout::Duration(d) => Some(Instant::now() + d),
        };
        loop {
            match self.push(item) {
                Ok(()) => return Ok(()),
                Err(returned) => {
                    item = returned;
                    if let Some(dl) = deadline
                        && Instant::now() > dl
                    {
                        return Err(item);
                    }
                    std::hint::spin_loop();
                }
            }
        }
    }

    /// Approximate fullness — telemetry only.
    ///
    /// Both indices are loaded relaxed; the answer may be stale by the time
    /// it is returned and must not be used for flow control.
    #[must_use]
    pub fn is_full(&self) -> bool {
        let head = self.core.head.load(Ordering::Relaxed);
        let next = (head + 1) & (N - 1);
        next == self.core.tail.load(Ordering::Relaxed)
    }

    /// Number of items the ring can hold: `N - 1` (one slot is the sentinel).
    #[must_use]
    pub const fn usable_capacity(&self) -> usize {
        N - 1
    }
}

/// Read end of the ring.
///
/// Move-only, [`Send`] + `!Sync`, exactly like [`Producer`]:
///
/// ```compile_fail
/// let (_producer, consumer) = relay::ring::channel::<u32, 4>();
/// let moved = consumer;
/// consumer.pop(); // error: use of moved value
/// # let _ = moved;
/// ```
pub struct Consumer<T: Exchange, const N: usize> {
    core: Arc<Core<T, N>>,
    _unsync: PhantomUnsync,
}

impl<T: Exchange, const N: usize> Consumer<T, N> {
    /// Attempts to pop the oldest item (wait-free).
    ///
    /// Returns `None` if the ring is empty.
    #[inline]
    #[must_use]
    pub fn pop(&self) -> Option<T> {
        // SAFETY: the channel hands out exactly one Consumer, and !Sync plus
        // &self-by-move keeps its use single-threaded.
        unsafe { self.core.pop() }
    }

    /// Spins until an item is available, then pops. Not wait-free; for the
    /// non-real-time side only.
    ///
    /// Returns `None` on timeout.
    #[must_use]
    pub fn pop_blocking(&self, timeout: Timeout) -> Option<T> {
        let deadline = match timeout {
            Timeout::Infinite => None,
            Timeout::Duration(d) => Some(Instant::now() + d),
        };
        loop {
            if let Some(item) = self.pop() {
                return Some(item);
            }
            if let Some(dl) = deadline
                && Instant::now() > dl
            {
                return None;
            }
            std::hint::spin_loop();
        }
    }

    /// Approximate emptiness — telemetry only.
    ///
    /// Both indices are loaded relaxed; see [`Producer::is_full`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.tail.load(Ordering::Relaxed) == self.core.head.load(Ordering::Relaxed)
    }

    /// Number of items the ring can hold: `N - 1` (one slot is the sentinel).
    #[must_use]
    pub const fn usable_capacity(&self) -> usize {
        N - 1
    }
}

/// Creates a ring channel of capacity `N`, returning its unique
/// producer/consumer pair.
///
/// `N` must be a power of two and at least 2; anything else fails to
/// compile. The roles are handed out exactly once each.
#[must_use]
pub fn channel<T: Exchange, const N: usize>() -> (Producer<T, N>, Consumer<T, N>) {
    let () = CapacityCheck::<N>::OK;

    let core = Arc::new(Core::new());

    debug!(
        payload = std::any::type_name::<T>(),
        capacity = N,
        "ring channel created"
    );

    let producer = Producer {
        core: Arc::clone(&core),
        _unsync: PhantomData,
    };
    let consumer = Consumer {
        core,
        _unsync: PhantomData,
    };

    (producer, consumer)
}
