//! Fixed 64-byte log record with CRC32C sealing.
//!
//! One record is one cache line and one [`Exchange`](crate::Exchange)
//! payload, so producers hand sealed records to the log writer through a
//! [`ring`](crate::ring) without serialization or allocation. The checksum
//! covers everything after itself (bytes 4..64), so any corruption of the
//! header, sequence numbers, timestamps, or payload is detected on verify.
//!
//! Byte layout (`#[repr(C)]`, no padding):
//!
//! ```text
//! [0..4)    crc32         checksum over bytes [4..64)
//! [4]       version       record format version
//! [5]       event_type
//! [6]       flags
//! [7]       producer_id
//! [8..16)   global_seq    total log order
//! [16..24)  commit_ts     100 µs ticks, coordinator time
//! [24..32)  event_ts      100 µs ticks, producer time
//! [32..40)  producer_seq  local producer order
//! [40..50)  reserved
//! [50..64)  payload
//! ```

use thiserror::Error;

use crate::wal::crc32c::crc32c;

/// Size of a serialized record: exactly one 64-byte cache line.
pub const RECORD_SIZE: usize = 64;

/// Current record format version.
pub const RECORD_VERSION: u8 = 2;

/// Offset of the first checksummed byte.
const CRC_COVERED_FROM: usize = 4;

/// Errors surfaced when verifying a record read back from the log.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// The stored checksum does not match the record contents.
    #[error("record checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// The record carries a format version this build does not understand.
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u8),
}

/// A fixed-layout write-ahead-log record.
#[derive(crate::Exchange, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct LogRecord {
    /// Checksum over bytes `[4..64)`; written by [`seal`](Self::seal).
    pub crc32: u32,

    pub version: u8,
    pub event_type: u8,
    pub flags: u8,
    pub producer_id: u8,

    /// Total log order, assigned by the coordinator.
    pub global_seq: u64,

    /// Commit timestamp in 100 µs ticks, coordinator clock.
    pub commit_ts: u64,
    /// Event timestamp in 100 µs ticks, producer clock.
    pub event_ts: u64,
    /// Local producer order.
    pub producer_seq: u64,

    pub reserved: [u8; 10],
    pub payload: [u8; 14],
}

// The layout above is load-bearing: records are checksummed and shipped as
// raw bytes. Field sizes sum to exactly RECORD_SIZE, so there is no padding.
const _: () = assert!(std::mem::size_of::<LogRecord>() == RECORD_SIZE);
const _: () = assert!(std::mem::align_of::<LogRecord>() == 8);

impl LogRecord {
    /// An unsealed record of the current version with all counters zeroed.
    #[must_use]
    pub const fn new(event_type: u8, producer_id: u8) -> Self {
        Self {
            crc32: 0,
            version: RECORD_VERSION,
            event_type,
            flags: 0,
            producer_id,
            global_seq: 0,
            commit_ts: 0,
            event_ts: 0,
            producer_seq: 0,
            reserved: [0; 10],
            payload: [0; 14],
        }
    }

    /// The record as raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; RECORD_SIZE] {
        // SAFETY: LogRecord is repr(C), padding-free (size assertion above),
        // and every field is plain data, so reinterpreting it as its bytes
        // is valid for the lifetime of the borrow.
        unsafe { &*(self as *const Self as *const [u8; RECORD_SIZE]) }
    }

    fn computed_crc(&self) -> u32 {
        crc32c(&self.as_bytes()[CRC_COVERED_FROM..])
    }

    /// Computes and stores the checksum over bytes `[4..64)`.
    ///
    /// Call after the last field mutation and before handing the record off.
    pub fn seal(&mut self) {
        self.crc32 = self.computed_crc();
    }

    /// Checks version and checksum of a record read back from the log.
    ///
    /// # Errors
    ///
    /// [`RecordError::UnsupportedVersion`] for an unknown format version,
    /// [`RecordError::ChecksumMismatch`] when any covered byte changed since
    /// [`seal`](Self::seal).
    pub fn verify(&self) -> Result<(), RecordError> {
        if self.version != RECORD_VERSION {
            return Err(RecordError::UnsupportedVersion(self.version));
        }

        let computed = self.computed_crc();
        if computed != self.crc32 {
            return Err(RecordError::ChecksumMismatch {
                stored: self.crc32,
                computed,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> LogRecord {
        let mut record = LogRecord::new(3, 7);
        record.global_seq = 41;
        record.commit_ts = 1_000_001;
        record.event_ts = 1_000_000;
        record.producer_seq = 12;
        record.payload[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        record.seal();
        record
    }

    #[test]
    fn field_offsets_match_the_documented_layout() {
        let record = LogRecord::new(0, 0);
        let base = &record as *const _ as usize;

        assert_eq!(&record.crc32 as *const _ as usize - base, 0);
        assert_eq!(&record.version as *const _ as usize - base, 4);
        assert_eq!(&record.event_type as *const _ as usize - base, 5);
        assert_eq!(&record.flags as *const _ as usize - base, 6);
        assert_eq!(&record.producer_id as *const _ as usize - base, 7);
        assert_eq!(&record.global_seq as *const _ as usize - base, 8);
        assert_eq!(&record.commit_ts as *const _ as usize - base, 16);
        assert_eq!(&record.event_ts as *const _ as usize - base, 24);
        assert_eq!(&record.producer_seq as *const _ as usize - base, 32);
        assert_eq!(&record.reserved as *const _ as usize - base, 40);
        assert_eq!(&record.payload as *const _ as usize - base, 50);
    }

    #[test]
    fn seal_then_verify_roundtrip() {
        let record = sample_record();
        assert_eq!(record.verify(), Ok(()));
    }

    #[test]
    fn unsealed_record_fails_verification() {
        let mut record = LogRecord::new(1, 1);
        record.global_seq = 99;
        assert!(matches!(
            record.verify(),
            Err(RecordError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn corrupted_byte_is_detected() {
        let mut record = sample_record();
        record.payload[0] ^= 0x01;
        assert!(matches!(
            record.verify(),
            Err(RecordError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn corrupted_sequence_is_detected() {
        let mut record = sample_record();
        record.global_seq += 1;
        assert!(matches!(
            record.verify(),
            Err(RecordError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut record = sample_record();
        record.version = RECORD_VERSION + 1;
        record.seal();
        assert_eq!(
            record.verify(),
            Err(RecordError::UnsupportedVersion(RECORD_VERSION + 1))
        );
    }

    #[test]
    fn crc_ignores_its_own_field() {
        let mut record = sample_record();
        let sealed_crc = record.crc32;
        record.crc32 = 0;
        record.seal();
        assert_eq!(record.crc32, sealed_crc);
    }

    #[test]
    fn sealed_records_flow_through_a_ring() {
        let (producer, consumer) = crate::ring::channel::<LogRecord, 8>();

        for seq in 0..5 {
            let mut record = LogRecord::new(2, 1);
            record.producer_seq = seq;
            record.seal();
            producer.push(record).unwrap();
        }

        for seq in 0..5 {
            let record = consumer.pop().expect("record lost in transit");
            assert_eq!(record.producer_seq, seq);
            assert_eq!(record.verify(), Ok(()));
        }
    }

    #[test]
    fn error_display_is_actionable() {
        let err = RecordError::ChecksumMismatch {
            stored: 0x1234_5678,
            computed: 0x9ABC_DEF0,
        };
        assert_eq!(
            err.to_string(),
            "record checksum mismatch: stored 0x12345678, computed 0x9abcdef0"
        );
    }
}
