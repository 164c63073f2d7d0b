//! Text-processing demo: read lines, reverse each one, print the result.
//!
//! Usage: `cargo run --example line_reverser [path]`. Without an argument a
//! few built-in sample lines are used.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use flowline_engine::prelude::*;

struct Line(String);
impl Packet for Line {}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let lines: Vec<String> = match std::env::args().nth(1) {
        Some(path) => fs::read_to_string(&path)
            .with_context(|| format!("reading {path}"))?
            .lines()
            .map(str::to_string)
            .collect(),
        None => ["flowline", "packets over pads", "pipelines all the way down"]
            .map(str::to_string)
            .to_vec(),
    };

    let mut pipeline = Pipeline::new();

    let reverser = pipeline.add_node(TypedNode::new(|node: &Node, line: Arc<Line>, _: &Pad| {
        let reversed: String = line.0.chars().rev().collect();
        match node.pad("output") {
            Ok(out) => out.push(Arc::new(Line(reversed)), Duration::from_millis(100)),
            Err(_) => false,
        }
    }));
    reverser.add_bounded_input("input", 4);
    reverser.add_output("output");

    let printer = pipeline.add_node(TypedNode::new(|_: &Node, line: Arc<Line>, _: &Pad| {
        println!("{}", line.0);
        true
    }));
    printer.add_input("input");

    pipeline.connect(
        &reverser.pad("output")?,
        &printer.pad("input")?,
    );

    pipeline.start()?;
    for line in lines {
        reverser.push_to("input", Arc::new(Line(line)), Duration::from_millis(100));
    }
    pipeline.stop();

    Ok(())
}
