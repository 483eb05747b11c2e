//! Cache-line geometry shared by every primitive core.
//!
//! All shared control words and value slots are padded out to a full cache
//! line so that the producer and the consumer never invalidate each other's
//! lines while touching logically independent fields.

use std::ops::{Deref, DerefMut};

/// Cache line size assumed by the padding layout.
///
/// 64 bytes covers x86_64 and the common ARM configurations. Layout tests
/// assert field distances against this constant, so changing it here changes
/// the whole crate consistently.
pub const CACHE_LINE_BYTES: usize = 64;

/// Pads and aligns `T` to occupy at least one full cache line.
///
/// The wrapper is transparent for all practical purposes: it derefs to the
/// inner value and adds no behavior, only layout.
#[derive(Debug, Default)]
#[repr(C)]
#[repr(align(64))]
pub struct CachePadded<T> {
    value: T,
}

impl<T> CachePadded<T> {
    /// Wraps `value` in a cache-line-sized cell.
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    /// Unwraps the inner value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for CachePadded<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

// The repr(align) literal above must stay in sync with CACHE_LINE_BYTES.
const _: () = assert!(std::mem::align_of::<CachePadded<u8>>() == CACHE_LINE_BYTES);
