//! Two-slot snapshot mailbox with a reader-claim protocol (latest-wins).
//!
//! Like [`double_buffer`](crate::double_buffer), a mailbox delivers only the
//! most recent publication. Unlike it, the reader gets a *miss* signal: if no
//! snapshot has been published yet, or the writer republished in the middle
//! of the read, [`Reader::try_read`] returns `None` without copying anything.
//! A torn read can therefore never be observed.
//!
//! - [`Writer::publish`] - wait-free, a bounded handful of atomic operations
//!   plus one slot copy. No loops, no CAS.
//! - [`Reader::try_read`] - wait-free, same bound. On `None` the caller keeps
//!   whatever state it already had and simply skips this tick; the primitive
//!   never retries internally, which keeps the real-time path bounded.
//!
//! # Example
//!
//! ```
//! let (writer, reader) = relay::mailbox::channel::<u32>();
//!
//! assert_eq!(reader.try_read(), None);
//! writer.publish(7);
//! assert_eq!(reader.try_read(), Some(7));
//! ```
//!
//! # Protocol sketch
//!
//! The writer owns `pub_state` (which slot is published, or none); the reader
//! owns `lock_state` (which slot it is currently copying, or none). The
//! reader brackets its copy with two loads of `pub_state` separated by a
//! release-store of its claim; the writer's acquire-load of `lock_state`
//! forbids it from reselecting a claimed slot, which closes the ABA window:
//! equal bracketing loads imply the slot bytes were never touched in between.

use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::align::CachePadded;
use crate::cell::{PhantomUnsync, SlotCell};
use crate::exchange::Exchange;
use crate::trace::debug;

// Only three logical states per control word, so a byte is enough; the
// platform must provide genuine single-byte atomics.
const _: () = assert!(cfg!(target_has_atomic = "8"));

// pub_state  : 0 = slot 0 published, 1 = slot 1 published, 2 = nothing
// lock_state : 0 = slot 0 claimed,   1 = slot 1 claimed,   2 = unclaimed
const SLOT0: u8 = 0;
const SLOT1: u8 = 1;
const NONE: u8 = 2;
const UNLOCKED: u8 = 2;

/// Shared state carrier: two padded slots and the two control bytes.
///
/// `pub_state` and `lock_state` live on separate cache lines: the writer
/// stores to `pub_state` on every publish while the reader stores to
/// `lock_state` on every read, and sharing a line would ping-pong it between
/// the two cores.
#[repr(C)]
struct Core<T> {
    slots: [CachePadded<SlotCell<MaybeUninit<T>>>; 2],
    /// Which slot is currently published, or [`NONE`]. Written only by the
    /// writer (release), read by both sides (acquire).
    pub_state: CachePadded<AtomicU8>,
    /// Which slot the reader currently holds, or [`UNLOCKED`]. Written only
    /// by the reader (release), read by the writer (acquire).
    lock_state: CachePadded<AtomicU8>,
}

impl<T> Core<T> {
    fn new() -> Self {
        Self {
            slots: [
                CachePadded::new(SlotCell::new(MaybeUninit::uninit())),
                CachePadded::new(SlotCell::new(MaybeUninit::uninit())),
            ],
            pub_state: CachePadded::new(AtomicU8::new(NONE)),
            lock_state: CachePadded::new(AtomicU8::new(UNLOCKED)),
        }
    }
}

/// Write end of a mailbox.
///
/// Move-only; the producer role transfers, it never duplicates:
///
/// ```compile_fail
/// let (writer, _reader) = relay::mailbox::channel::<u32>();
/// let moved = writer;
/// writer.publish(1); // error: use of moved value
/// # let _ = moved;
/// ```
///
/// `Writer` is [`Send`] but not [`Sync`] - it can migrate between threads
/// but `&Writer` cannot be shared.
pub struct Writer<T: Exchange> {
    core: Arc<Core<T>>,
    _unsync: PhantomUnsync,
}

impl<T: Exchange> Writer<T> {
    /// Publishes a new snapshot (wait-free, bounded, no loops).
    ///
    /// Slot selection: the reader holds at most one slot, so the *other*
    /// slot is always free to write. When nothing is claimed, slot 1 is
    /// picked arbitrarily.
    #[inline]
    pub fn publish(&self, value: T) {
        let core = &*self.core;

        // Acquire pairs with the reader's release-store of its claim; after
        // this load the writer is guaranteed to see any claim that the reader
        // could still be acting on.
        let locked = core.lock_state.load(Ordering::Acquire);
        let j = if locked == SLOT1 { SLOT0 } else { SLOT1 };

        // Invalidate before overwriting a currently-published slot, so the
        // reader cannot begin a claim on bytes that are about to change.
        // No race: j is not the claimed slot, so the reader is not between
        // its claim and its verify for j right now.
        if core.pub_state.load(Ordering::Acquire) == j {
            core.pub_state.store(NONE, Ordering::Release);
        }

        // SAFETY: slot j is neither claimed by the reader (j != locked) nor
        // reachable through pub_state (invalidated above if it was), so the
        // writer owns it exclusively until the release store below.
        unsafe {
            core.slots[j as usize].get().write(MaybeUninit::new(value));
        }

        core.pub_state.store(j, Ordering::Release);
    }
}

/// Read end of a mailbox.
///
/// Move-only, [`Send`] + `!Sync`, exactly like [`Writer`]:
///
/// ```compile_fail
/// let (_writer, reader) = relay::mailbox::channel::<u32>();
/// let moved = reader;
/// reader.try_read(); // error: use of moved value
/// # let _ = moved;
/// ```
pub struct Reader<T: Exchange> {
    core: Arc<Core<T>>,
    _unsync: PhantomUnsync,
}

impl<T: Exchange> Reader<T> {
    /// Attempts to copy out the latest stable snapshot (wait-free, bounded).
    ///
    /// Returns `None` when nothing has been published yet or when the writer
    /// republished between the two bracketing loads (a publication race).
    /// Either way nothing is copied and the claim is released: on every
    /// return path the reader holds no slot.
    ///
    /// There is no internal retry. A caller that needs fresher data simply
    /// calls again on its next tick, keeping its previous value meanwhile.
    #[inline]
    #[must_use]
    pub fn try_read(&self) -> Option<T> {
        let core = &*self.core;

        let p1 = core.pub_state.load(Ordering::Acquire);
        if p1 == NONE {
            // lock_state is already UNLOCKED: postcondition of the previous
            // call, and the initial state of a fresh channel.
            return None;
        }

        // Claim slot p1. The release makes the claim visible to the writer's
        // acquire-load at the head of its next publish.
        core.lock_state.store(p1, Ordering::Release);

        // Verify the publication did not move while we claimed. If the
        // writer republished in between, the slot may be mid-overwrite:
        // abort without copying.
        let p2 = core.pub_state.load(Ordering::Acquire);
        if p2 != p1 {
            core.lock_state.store(UNLOCKED, Ordering::Release);
            return None;
        }

        // SAFETY: p1 == p2 means no publish landed between claim and verify.
        // For the writer to overwrite slot p1 now it would first have to
        // observe our claim (its acquire-load of lock_state) and is then
        // barred from selecting p1. pub_state == p1 also proves the slot was
        // fully written before the writer's release-publish, so the bytes
        // are initialized and stable for the copy.
        let value = unsafe { core.slots[p1 as usize].get().read().assume_init() };

        core.lock_state.store(UNLOCKED, Ordering::Release);
        Some(value)
    }
}

/// Creates a mailbox channel, returning its unique writer/reader pair.
///
/// The roles are handed out exactly once each; the move-only handles are
/// what enforce the one-producer/one-consumer contract.
#[must_use]
pub fn channel<T: Exchange>() -> (Writer<T>, Reader<T>) {
    let core = Arc::new(Core::new());

    debug!(payload = std::any::type_name::<T>(), "mailbox channel created");

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
