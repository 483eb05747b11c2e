//! Cross-thread stress tests for the three SPSC primitives.
//!
//! Each test runs a real producer thread against a real consumer thread.
//! The payload is a `{x, -x}` pair: any observation with `x != -y` would be
//! a torn read, which the primitives promise can never happen.

use std::thread;

use relay::{double_buffer, mailbox, ring};

/// Payload whose halves must always agree: `y == -x`.
#[derive(relay::Exchange, Clone, Copy, Default, Debug, PartialEq, Eq)]
#[repr(C)]
struct Mirrored {
    x: i32,
    y: i32,
}

impl Mirrored {
    fn new(x: i32) -> Self {
        Self { x, y: -x }
    }

    fn assert_consistent(self) {
        assert_eq!(self.x, -self.y, "torn read: {self:?}");
    }
}

/// Bound on consumer attempts after the producer halted. Generous, but a
/// bound: eventual visibility must not require unbounded retries.
const VISIBILITY_ATTEMPTS: usize = 10_000_000;

const PRODUCED: i32 = 100_000;

#[test]
fn double_buffer_no_torn_reads_and_eventual_visibility() {
    let (writer, reader) = double_buffer::channel::<Mirrored>();

    let producer = thread::spawn(move || {
        for i in 1..=PRODUCED {
            writer.write(Mirrored::new(i));
        }
    });

    let consumer = thread::spawn(move || {
        let mut last = 0;
        while last < PRODUCED {
            let snapshot = reader.read();
            snapshot.assert_consistent();
            // Snapshots may skip values but never run backwards.
            assert!(snapshot.x >= last, "snapshot regressed: {} < {last}", snapshot.x);
            last = snapshot.x;
        }
        reader
    });

    producer.join().unwrap();
    let reader = consumer.join().unwrap();

    // Producer halted: the final value must become visible promptly.
    let mut seen_final = false;
    for _ in 0..VISIBILITY_ATTEMPTS {
        if reader.read() == Mirrored::new(PRODUCED) {
            seen_final = true;
            break;
        }
    }
    assert!(seen_final, "final snapshot never became visible");
}

#[test]
fn double_buffer_sustained_concurrent_reads() {
    let (writer, reader) = double_buffer::channel::<Mirrored>();
    let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let stop_consumer = std::sync::Arc::clone(&stop);

    let consumer = thread::spawn(move || {
        let mut reads = 0u64;
        while !stop_consumer.load(std::sync::atomic::Ordering::Acquire) {
            reader.read().assert_consistent();
            reads += 1;
        }
        reads
    });

    for i in 1..=PRODUCED {
        writer.write(Mirrored::new(i));
    }
    stop.store(true, std::sync::atomic::Ordering::Release);

    let reads = consumer.join().unwrap();
    assert!(reads > 0);
}

#[test]
fn mailbox_no_torn_reads_and_eventual_visibility() {
    let (writer, reader) = mailbox::channel::<Mirrored>();

    let producer = thread::spawn(move || {
        for i in 1..=PRODUCED {
            writer.publish(Mirrored::new(i));
        }
    });

    let consumer = thread::spawn(move || {
        let mut last = 0;
        let mut hits = 0u64;
        let mut misses = 0u64;
        while last < PRODUCED {
            match reader.try_read() {
                Some(snapshot) => {
                    snapshot.assert_consistent();
                    assert!(snapshot.x >= last);
                    last = snapshot.x;
                    hits += 1;
                }
                // A miss is a legitimate outcome (no data yet or a
                // publication race); the consumer keeps its sticky state.
                None => misses += 1,
            }
        }
        (reader, hits, misses)
    });

    producer.join().unwrap();
    let (reader, hits, _misses) = consumer.join().unwrap();
    assert!(hits > 0);

    let mut seen_final = false;
    for _ in 0..VISIBILITY_ATTEMPTS {
        if reader.try_read() == Some(Mirrored::new(PRODUCED)) {
            seen_final = true;
            break;
        }
    }
    assert!(seen_final, "final snapshot never became visible");
}

#[test]
fn ring_delivers_every_item_in_order() {
    const TOTAL: u64 = 200_000;

    let (producer, consumer) = ring::channel::<u64, 64>();

    let producer_thread = thread::spawn(move || {
        for i in 1..=TOTAL {
            let mut item = i;
            loop {
                match producer.push(item) {
                    Ok(()) => break,
                    Err(rejected) => {
                        item = rejected;
                        std::hint::spin_loop();
                    }
                }
            }
        }
    });

    let consumer_thread = thread::spawn(move || {
        let mut received = Vec::with_capacity(TOTAL as usize);
        while received.len() < TOTAL as usize {
            match consumer.pop() {
                Some(item) => received.push(item),
                None => std::hint::spin_loop(),
            }
        }
        received
    });

    producer_thread.join().unwrap();
    let received = consumer_thread.join().unwrap();

    // No loss, no duplication, no reordering: exactly 1..=TOTAL.
    assert_eq!(received.len() as u64, TOTAL);
    for (index, item) in received.iter().enumerate() {
        assert_eq!(*item, index as u64 + 1);
    }
}

#[test]
fn ring_no_torn_reads_under_contention() {
    const TOTAL: i32 = 100_000;

    let (producer, consumer) = ring::channel::<Mirrored, 16>();

    let producer_thread = thread::spawn(move || {
        for i in 1..=TOTAL {
            let mut item = Mirrored::new(i);
            loop {
                match producer.push(item) {
                    Ok(()) => break,
                    Err(rejected) => {
                        item = rejected;
                        std::hint::spin_loop();
                    }
                }
            }
        }
    });

    let consumer_thread = thread::spawn(move || {
        let mut expected = 1;
        while expected <= TOTAL {
            if let Some(item) = consumer.pop() {
                item.assert_consistent();
                assert_eq!(item.x, expected);
                expected += 1;
            } else {
                std::hint::spin_loop();
            }
        }
    });

    producer_thread.join().unwrap();
    consumer_thread.join().unwrap();
}

#[test]
fn ring_blocking_helpers_bridge_threads() {
    use relay::ring::Timeout;

    let (producer, consumer) = ring::channel::<u64, 8>();

    let producer_thread = thread::spawn(move || {
        for i in 0..1000 {
            producer.push_blocking(i, Timeout::Infinite).unwrap();
        }
    });

    for i in 0..1000 {
        let item = consumer.pop_blocking(Timeout::Infinite);
        assert_eq!(item, Some(i));
    }

    producer_thread.join().unwrap();
}

#[test]
fn handles_migrate_between_threads() {
    // The handles are Send: constructing on one thread and using on others
    // is the intended deployment shape (ISR core vs. mainline core).
    let (writer, reader) = double_buffer::channel::<u64>();

    let t = thread::spawn(move || {
        writer.write(99);
        writer
    });
    let writer = t.join().unwrap();
    writer.write(100);

    let t = thread::spawn(move || {
        assert_eq!(reader.read(), 100);
    });
    t.join().unwrap();
}
