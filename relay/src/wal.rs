//! Write-ahead-log support utilities.
//!
//! The log itself (backends, writers, dispatch) lives outside this crate;
//! what lives here is the part the real-time side needs: a checksum that is
//! cheap and allocation-free ([`crc32c`]) and the fixed 64-byte record that
//! producers hand off through a [`ring`](crate::ring) ([`record`]).

pub mod crc32c;
pub mod record;
