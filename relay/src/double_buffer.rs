//! Ping-pong snapshot register (last-writer-wins).
//!
//! A `double_buffer` channel carries the *latest* published snapshot from one
//! real-time writer to one reader. It is a frame primitive, not a queue:
//! intermediate updates may be lost, reads never fail, and neither side ever
//! waits for the other.
//!
//! - [`Writer::write`] - wait-free, O(1): one relaxed load, one slot copy,
//!   one release store. Safe to call from interrupt or high-priority context.
//! - [`Reader::read`] - O(1): one acquire load plus one slot copy. Always
//!   succeeds.
//!
//! # Example
//!
//! ```
//! let (writer, reader) = relay::double_buffer::channel::<u32>();
//!
//! writer.write(1);
//! writer.write(2);
//! assert_eq!(reader.read(), 2);
//! ```
//!
//! # Before the first write
//!
//! The channel is constructed with both slots holding `T::default()`, so a
//! read that races ahead of the first write returns the default value. The
//! reader cannot distinguish "nothing published yet" from a legitimately
//! published default snapshot; layer a version counter on top if that
//! distinction matters.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::align::CachePadded;
use crate::cell::{PhantomUnsync, SlotCell};
use crate::exchange::Exchange;
use crate::trace::debug;

// The published index deliberately uses a 32-bit atomic rather than a byte:
// only 32-bit (and wider) atomics are uniformly available across the targets
// this crate cares about.
const _: () = assert!(cfg!(target_has_atomic = "32"));

/// Shared state carrier: two padded value slots plus the published index.
///
/// Each slot sits on its own cache line so the writer filling the inactive
/// slot never contends with the reader copying the published one.
#[repr(C)]
struct Core<T> {
    slots: [CachePadded<SlotCell<T>>; 2],
    /// Index of the currently published slot: 0 or 1. Written only by the
    /// writer (release), read by the reader (acquire).
    published: CachePadded<AtomicU32>,
}

impl<T: Exchange + Default> Core<T> {
    fn new() -> Self {
        Self {
            slots: [
                CachePadded::new(SlotCell::new(T::default())),
                CachePadded::new(SlotCell::new(T::default())),
            ],
            published: CachePadded::new(AtomicU32::new(0)),
        }
    }
}

/// Write end of a double buffer.
///
/// Only one writer exists per channel; the handle is move-only, so the
/// producer role transfers rather than duplicates:
///
/// ```compile_fail
/// let (writer, _reader) = relay::double_buffer::channel::<u32>();
/// let moved = writer;
/// writer.write(1); // error: use of moved value
/// # let _ = moved;
/// ```
///
/// # Thread safety
///
/// `Writer` is [`Send`] but **not** [`Sync`]: it can migrate to another
/// thread, but `&Writer` cannot be shared (no concurrent `write()`).
pub struct Writer<T: Exchange> {
    core: Arc<Core<T>>,
    _unsync: PhantomUnsync,
}

impl<T: Exchange> Writer<T> {
    /// Publishes a new snapshot (wait-free).
    ///
    /// The value lands in the inactive slot first; the release store of the
    /// flipped index is the publication point, ordering the slot bytes before
    /// any reader that observes the new index.
    #[inline]
    pub fn write(&self, value: T) {
        // Relaxed is enough here: the writer is the only mutator of
        // `published`, and synchronization with the reader is carried by the
        // release store below.
        let cur = self.core.published.load(Ordering::Relaxed);
        let next = cur ^ 1;

        // SAFETY: `next` is the inactive slot. The reader only copies from
        // the slot named by `published`, which still holds `cur` until the
        // release store below, so the writer owns `slots[next]` exclusively.
        unsafe {
            self.core.slots[next as usize].get().write(value);
        }

        self.core.published.store(next, Ordering::Release);
    }
}

/// Read end of a double buffer.
///
/// Move-only for the same reason as [`Writer`]; see the thread-safety notes
/// there.
///
/// ```compile_fail
/// let (_writer, reader) = relay::double_buffer::channel::<u32>();
/// let moved = reader;
/// reader.read(); // error: use of moved value
/// # let _ = moved;
/// ```
pub struct Reader<T: Exchange> {
    core: Arc<Core<T>>,
    _unsync: PhantomUnsync,
}

impl<T: Exchange> Reader<T> {
    /// Copies out the latest published snapshot. Never fails.
    #[inline]
    #[must_use]
    pub fn read(&self) -> T {
        let idx = self.core.published.load(Ordering::Acquire);

        // SAFETY: the acquire load pairs with the writer's release store of
        // `published`, so every byte written into `slots[idx]` before that
        // publication is visible. The writer never touches the published slot
        // again until it republishes the other one.
        unsafe { self.core.slots[idx as usize].get().read() }
    }
}

/// Creates a double-buffer channel, returning its unique writer/reader pair.
///
/// This is the only way to obtain the handles: the producer and consumer
/// roles are handed out exactly once each, which is what enforces the
/// one-producer/one-consumer contract — by construction, not at run time.
#[must_use]
pub fn channel<T: Exchange + Default>() -> (Writer<T>, Reader<T>) {
    let core = Arc::new(Core::new());

    debug!(payload = std::any::type_name::<T>(), "double-buffer channel created");

    let writer = Writer {
        core: Arc::clone(&core),
        _unsync: PhantomData,
    };
    let reader = Reader {
        core,
        _unsync: PhantomData,
    };

    (writer, reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::CACHE_LINE_BYTES;

    #[derive(crate::Exchange, Clone, Copy, Default, Debug, PartialEq, Eq)]
    #[repr(C)]
    struct Pod32 {
        x: i32,
        y: i32,
    }

    #[derive(crate::Exchange, Clone, Copy, Debug, PartialEq, Eq)]
    #[repr(C)]
    struct LargePod {
        data: [u8; 128],
    }

    impl Default for LargePod {
        fn default() -> Self {
            Self { data: [0; 128] }
        }
    }

    #[test]
    fn initial_state_publishes_slot_zero() {
        let (writer, _reader) = channel::<Pod32>();
        assert_eq!(writer.core.published.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn read_before_write_returns_default() {
        let (_writer, reader) = channel::<Pod32>();
        assert_eq!(reader.read(), Pod32 { x: 0, y: 0 });
    }

    #[test]
    fn write_then_read() {
        let (writer, reader) = channel::<Pod32>();
        writer.write(Pod32 { x: 1, y: 2 });
        assert_eq!(reader.read(), Pod32 { x: 1, y: 2 });
    }

    #[test]
    fn latest_wins() {
        let (writer, reader) = channel::<Pod32>();
        writer.write(Pod32 { x: 1, y: 2 });
        writer.write(Pod32 { x: 3, y: 4 });
        assert_eq!(reader.read(), Pod32 { x: 3, y: 4 });
    }

    #[test]
    fn repeated_reads_are_idempotent() {
        let (writer, reader) = channel::<Pod32>();
        writer.write(Pod32 { x: 5, y: -5 });
        assert_eq!(reader.read(), reader.read());
    }

    #[test]
    fn read_always_succeeds_interleaved() {
        let (writer, reader) = channel::<Pod32>();
        for i in 0..50 {
            writer.write(Pod32 { x: i, y: -i });
            assert_eq!(reader.read(), Pod32 { x: i, y: -i });
            assert_eq!(reader.read(), Pod32 { x: i, y: -i });
        }
    }

    #[test]
    fn published_index_alternates_per_write() {
        let (writer, _reader) = channel::<Pod32>();
        for expected in [1, 0, 1, 0] {
            writer.write(Pod32::default());
            assert_eq!(writer.core.published.load(Ordering::Relaxed), expected);
        }
    }

    #[test]
    fn large_payload_roundtrip() {
        let (writer, reader) = channel::<LargePod>();
        let mut v = LargePod::default();
        for (i, b) in v.data.iter_mut().enumerate() {
            *b = i as u8;
        }
        writer.write(v);
        assert_eq!(reader.read(), v);
    }

    #[test]
    fn slots_and_index_on_separate_cache_lines() {
        let (writer, _reader) = channel::<Pod32>();
        let core = &*writer.core;

        let slot0 = core.slots[0].get() as usize;
        let slot1 = core.slots[1].get() as usize;
        let published = core.published.as_ptr() as usize;

        assert!(slot0.abs_diff(slot1) >= CACHE_LINE_BYTES);
        assert!(published.abs_diff(slot0) >= CACHE_LINE_BYTES);
        assert!(published.abs_diff(slot1) >= CACHE_LINE_BYTES);
    }
}
