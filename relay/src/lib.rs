//! Wait-free SPSC exchange primitives for real-time producers and consumers.
//!
//! This crate provides three single-producer/single-consumer primitives for
//! hard real-time contexts — interrupt handlers, high-priority tasks, and
//! control loops that must hand data to lower-priority consumers without
//! ever blocking:
//!
//! - [`double_buffer`] - a ping-pong snapshot register. The reader always
//!   gets the latest published value; reads cannot fail.
//! - [`mailbox`] - a two-slot snapshot mailbox whose claim/verify protocol
//!   detects publication races, so the reader either gets a consistent
//!   snapshot or an honest miss — never a torn value.
//! - [`ring`] - a bounded FIFO ring. Every accepted item is delivered
//!   exactly once, in order; a full ring rejects the push.
//!
//! All hot-path operations are wait-free: a bounded number of atomic loads
//! and stores plus one byte copy of the payload, with no CAS, no loops, no
//! allocation, and no syscalls. Payload types implement the [`Exchange`]
//! contract (plain, byte-copyable data), checkable with
//! `#[derive(Exchange)]`.
//!
//! The one-producer/one-consumer contract is enforced by shape, not by
//! checks: each channel constructor returns exactly one move-only writer and
//! one move-only reader, and neither can be cloned or shared.
//!
//! Around the primitives sit a [`task`] stepping wrapper with a heartbeat
//! for supervisors, and the [`wal`] utilities (CRC32C, the 64-byte log
//! record) that the anticipated write-ahead log consumes.

// Allow the crate to reference itself as ::relay for derive macro usage
extern crate self as relay;

pub mod align;
pub mod double_buffer;
pub mod exchange;
pub mod mailbox;
pub mod ring;
pub mod task;
pub mod trace;
pub mod wal;

mod cell;

#[doc(inline)]
pub use relay_derive::Exchange;

#[doc(inline)]
pub use exchange::Exchange;

// Hidden re-export for the derive macro
#[doc(hidden)]
pub use exchange::Exchange as __ExchangePrivate;
