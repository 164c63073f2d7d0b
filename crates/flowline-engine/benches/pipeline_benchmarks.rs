//! Delivery-path benchmarks for the pipeline engine.

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use flowline_engine::prelude::*;

struct Sample(u64);
impl Packet for Sample {}

fn direct_chain(length: usize) -> (Pipeline, Arc<Node>, Arc<AtomicU64>) {
    let mut pipeline = Pipeline::new();

    let head = pipeline.add_fn_node(|node, packet, _| match node.pad("output") {
        Ok(out) => out.push(packet, Duration::ZERO),
        Err(_) => false,
    });
    head.add_input("input");
    head.add_output("output");

    let mut tail = Arc::clone(&head);
    for _ in 1..length {
        let relay = pipeline.add_fn_node(|node, packet, _| match node.pad("output") {
            Ok(out) => out.push(packet, Duration::ZERO),
            Err(_) => false,
        });
        relay.add_input("input");
        relay.add_output("output");
        pipeline.connect(
            &tail.pad("output").expect("output"),
            &relay.pad("input").expect("input"),
        );
        tail = relay;
    }

    let total = Arc::new(AtomicU64::new(0));
    let sum = Arc::clone(&total);
    let consumer = pipeline.add_fn_node(move |_, packet, _| match packet.downcast::<Sample>() {
        Some(packet) => {
            sum.fetch_add(packet.0, Ordering::Relaxed);
            true
        }
        None => false,
    });
    consumer.add_input("input");
    pipeline.connect(
        &tail.pad("output").expect("output"),
        &consumer.pad("input").expect("input"),
    );

    (pipeline, head, total)
}

fn bench_direct_delivery(c: &mut Criterion) {
    let (mut pipeline, head, _total) = direct_chain(1);
    pipeline.start().expect("start");

    c.bench_function("direct_delivery_one_hop", |b| {
        b.iter(|| {
            black_box(head.push_to("input", Arc::new(Sample(1)), Duration::ZERO));
        })
    });
}

fn bench_direct_chain_four_hops(c: &mut Criterion) {
    let (mut pipeline, head, _total) = direct_chain(4);
    pipeline.start().expect("start");

    c.bench_function("direct_delivery_four_hops", |b| {
        b.iter(|| {
            black_box(head.push_to("input", Arc::new(Sample(1)), Duration::ZERO));
        })
    });
}

fn bench_splitter_fan_out(c: &mut Criterion) {
    let mut pipeline = Pipeline::new();
    let tee = Splitter::spawn(&mut pipeline, 2);
    for branch in 1..=2 {
        let consumer = pipeline.add_fn_node(|_, _, _| true);
        consumer.add_input("input");
        pipeline.connect(
            &tee.pad(&format!("output_{branch}")).expect("branch"),
            &consumer.pad("input").expect("input"),
        );
    }
    pipeline.start().expect("start");

    c.bench_function("splitter_fan_out_two_branches", |b| {
        b.iter(|| {
            black_box(tee.push_to("input", Arc::new(Sample(1)), Duration::ZERO));
        })
    });
}

fn bench_packet_downcast(c: &mut Criterion) {
    c.bench_function("packet_downcast", |b| {
        b.iter(|| {
            let packet: PacketRef = Arc::new(Sample(7));
            black_box(packet.downcast::<Sample>());
        })
    });
}

criterion_group!(
    benches,
    bench_direct_delivery,
    bench_direct_chain_four_hops,
    bench_splitter_fan_out,
    bench_packet_downcast
);
criterion_main!(benches);
