//! Interior-mutable slot cells used by the primitive cores.
//!
//! Every value slot is owned by exactly one role at any point in the SPSC
//! protocol; the atomic control words establish the hand-over. The cells here
//! only package that invariant for the compiler.

use std::cell::{Cell, UnsafeCell};
use std::marker::PhantomData;

/// A value slot whose ownership transfers between producer and consumer via
/// the surrounding protocol's release/acquire pairs.
#[repr(transparent)]
pub(crate) struct SlotCell<T>(UnsafeCell<T>);

impl<T> SlotCell<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Raw pointer to the slot contents.
    ///
    /// Callers must only dereference while their role owns the slot under the
    /// protocol of the enclosing primitive.
    pub(crate) const fn get(&self) -> *mut T {
        self.0.get()
    }
}

// SAFETY: a slot is written only by the producer and read only by the
// consumer, never both at once; the release-store / acquire-load pair on the
// owning primitive's control word orders the accesses.
unsafe impl<T: Send> Sync for SlotCell<T> {}
unsafe impl<T: Send> Send for SlotCell<T> {}

/// Marker field that keeps a handle `Send` but opts it out of `Sync`.
///
/// A `&Writer`/`&Reader` shared across threads would duplicate a role; the
/// handles stay movable between threads but never shareable.
pub(crate) type PhantomUnsync = PhantomData<Cell<&'static ()>>;
