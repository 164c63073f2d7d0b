//! Property tests for packet ordering guarantees.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use proptest::prelude::*;

use flowline_engine::prelude::*;

struct Numbered(u64);
impl Packet for Numbered {}

fn wait_until(cond: impl Fn() -> bool, deadline: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

proptest! {
    /// Packets pushed from one thread through a chain of direct pads arrive
    /// in push order at the terminal node.
    #[test]
    fn prop_direct_chain_preserves_order(values in proptest::collection::vec(any::<u64>(), 0..200)) {
        let mut pipeline = Pipeline::new();

        let relay = pipeline.add_fn_node(|node, packet, _| match node.pad("output") {
            Ok(out) => out.push(packet, Duration::ZERO),
            Err(_) => false,
        });
        relay.add_input("input");
        relay.add_output("output");

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let consumer = pipeline.add_fn_node(move |_, packet, _| {
            match packet.downcast::<Numbered>() {
                Some(packet) => {
                    sink.lock().expect("sink lock").push(packet.0);
                    true
                }
                None => false,
            }
        });
        consumer.add_input("input");

        pipeline.connect(
            &relay.pad("output").expect("relay output"),
            &consumer.pad("input").expect("consumer input"),
        );
        pipeline.start().expect("start");

        for &value in &values {
            prop_assert!(relay.push_to("input", Arc::new(Numbered(value)), Duration::ZERO));
        }

        let received = received.lock().expect("sink lock");
        prop_assert_eq!(&*received, &values);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// FIFO holds along a single bounded-queue pad: the worker delivers in
    /// exactly the order pushes were accepted.
    #[test]
    fn prop_queue_pad_preserves_fifo(values in proptest::collection::vec(any::<u64>(), 0..40)) {
        let mut pipeline = Pipeline::new();

        let received = Arc::new(Mutex::new(Vec::new()));
        let count = Arc::new(AtomicUsize::new(0));
        let (sink, tally) = (Arc::clone(&received), Arc::clone(&count));
        let consumer = pipeline.add_fn_node(move |_, packet, _| {
            match packet.downcast::<Numbered>() {
                Some(packet) => {
                    sink.lock().expect("sink lock").push(packet.0);
                    tally.fetch_add(1, Ordering::SeqCst);
                    true
                }
                None => false,
            }
        });
        consumer.add_bounded_input("input", 4);

        pipeline.start().expect("start");

        for &value in &values {
            prop_assert!(consumer.push_to(
                "input",
                Arc::new(Numbered(value)),
                Duration::from_secs(2),
            ));
        }

        prop_assert!(wait_until(
            || count.load(Ordering::SeqCst) == values.len(),
            Duration::from_secs(2),
        ));
        {
            let received = received.lock().expect("sink lock");
            prop_assert_eq!(&*received, &values);
        }

        pipeline.stop();
    }
}
