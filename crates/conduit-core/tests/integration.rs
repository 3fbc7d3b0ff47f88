//! End-to-end graph scenarios: diamonds, fan-in and multi-block rendering.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use conduit_core::{Graph, PluginDescriptor, PortDescriptor, Ports, Processor};

const BLOCK: usize = 128;

/// Emits a ramp continuing across blocks: sample n of the stream is `n * step`.
struct Ramp {
    next: f32,
    step: f32,
}

impl Processor for Ramp {
    fn run(&mut self, ports: &mut Ports<'_>) {
        for s in ports.audio_out(0) {
            *s = self.next;
            self.next += self.step;
        }
    }
}

/// Two outputs: "left" = input, "right" = -input. Counts its runs.
struct Splitter {
    runs: Arc<AtomicUsize>,
}

impl Processor for Splitter {
    fn run(&mut self, ports: &mut Ports<'_>) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        let frames = ports.frames();
        let mut tmp = [0.0f32; BLOCK];
        tmp[..frames].copy_from_slice(ports.audio_in(0));
        ports.audio_out(1).copy_from_slice(&tmp[..frames]);
        for (o, i) in ports.audio_out(2).iter_mut().zip(&tmp[..frames]) {
            *o = -i;
        }
    }
}

/// Copies input to output and counts runs.
struct Thru {
    runs: Arc<AtomicUsize>,
}

impl Processor for Thru {
    fn run(&mut self, ports: &mut Ports<'_>) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        let (input, output) = ports.audio_in_out(0, 1);
        output.copy_from_slice(input);
    }
}

fn ramp_desc() -> PluginDescriptor {
    PluginDescriptor::new(
        "urn:test:ramp",
        "Ramp",
        vec![PortDescriptor::audio_output("out")],
    )
}

fn splitter_desc() -> PluginDescriptor {
    PluginDescriptor::new(
        "urn:test:split",
        "Splitter",
        vec![
            PortDescriptor::audio_input("in"),
            PortDescriptor::audio_output("left"),
            PortDescriptor::audio_output("right"),
        ],
    )
}

fn thru_desc() -> PluginDescriptor {
    PluginDescriptor::new(
        "urn:test:thru",
        "Thru",
        vec![
            PortDescriptor::audio_input("in"),
            PortDescriptor::audio_output("out"),
        ],
    )
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[test]
fn diamond_renders_each_instance_once() {
    let mut graph = Graph::new(48000.0, BLOCK, 1, 256);
    let (ra, rb, rc, rd) = (counter(), counter(), counter(), counter());
    let a = graph.add_instance(&thru_desc(), Box::new(Thru { runs: ra.clone() }));
    let b = graph.add_instance(&thru_desc(), Box::new(Thru { runs: rb.clone() }));
    let c = graph.add_instance(&thru_desc(), Box::new(Thru { runs: rc.clone() }));
    let d = graph.add_instance(&thru_desc(), Box::new(Thru { runs: rd.clone() }));
    graph.connect(a, "out", b, "in").unwrap();
    graph.connect(a, "out", c, "in").unwrap();
    graph.connect(b, "out", d, "in").unwrap();
    graph.connect(c, "out", d, "in").unwrap();
    graph.connect_to_output(d, "out", 0).unwrap();

    let pass = graph.run(BLOCK);
    for runs in [&ra, &rb, &rc, &rd] {
        assert_eq!(runs.load(Ordering::Relaxed), 1);
    }
    for id in [a, b, c, d] {
        assert_eq!(graph.last_pass(id).unwrap(), pass);
    }

    graph.run(BLOCK);
    for runs in [&ra, &rb, &rc, &rd] {
        assert_eq!(runs.load(Ordering::Relaxed), 2);
    }
}

#[test]
fn two_outputs_to_two_channels_over_three_blocks() {
    let mut graph = Graph::new(48000.0, BLOCK, 2, 256);
    let runs = counter();
    let a = graph.add_instance(
        &ramp_desc(),
        Box::new(Ramp {
            next: 0.0,
            step: 1.0,
        }),
    );
    let b = graph.add_instance(&splitter_desc(), Box::new(Splitter { runs: runs.clone() }));
    graph.connect(a, "out", b, "in").unwrap();
    graph.connect_to_output(b, "left", 0).unwrap();
    graph.connect_to_output(b, "right", 1).unwrap();

    for block in 0..3 {
        graph.run(BLOCK);
        let base = (block * BLOCK) as f32;
        let left = graph.output(0);
        let right = graph.output(1);
        assert_eq!(left.len(), BLOCK);
        for n in 0..BLOCK {
            assert_eq!(left[n], base + n as f32, "block {block} frame {n}");
            assert_eq!(right[n], -(base + n as f32), "block {block} frame {n}");
        }
    }
    assert_eq!(runs.load(Ordering::Relaxed), 3);
}

#[test]
fn disconnected_producer_leaves_no_stale_samples() {
    let mut graph = Graph::new(48000.0, BLOCK, 1, 256);
    let a = graph.add_instance(
        &ramp_desc(),
        Box::new(Ramp {
            next: 1.0,
            step: 0.0,
        }),
    );
    graph.connect_to_output(a, "out", 0).unwrap();
    graph.run(BLOCK);
    assert!(graph.output(0).iter().all(|&s| s == 1.0));

    graph.disconnect_from_output(a, "out", 0).unwrap();
    graph.run(BLOCK);
    assert!(graph.output(0).iter().all(|&s| s == 0.0));
}

#[test]
fn short_block_renders_requested_frames() {
    let mut graph = Graph::new(48000.0, BLOCK, 1, 256);
    let a = graph.add_instance(
        &ramp_desc(),
        Box::new(Ramp {
            next: 0.0,
            step: 1.0,
        }),
    );
    graph.connect_to_output(a, "out", 0).unwrap();
    graph.run(10);
    assert_eq!(graph.output(0).len(), 10);
    graph.run(10);
    assert_eq!(graph.output(0)[0], 10.0);
}

#[test]
fn instances_of_tracks_plugin_uri() {
    let mut graph = Graph::new(48000.0, BLOCK, 1, 256);
    let a = graph.add_instance(&thru_desc(), Box::new(Thru { runs: counter() }));
    let b = graph.add_instance(&thru_desc(), Box::new(Thru { runs: counter() }));
    graph.add_instance(
        &ramp_desc(),
        Box::new(Ramp {
            next: 0.0,
            step: 0.0,
        }),
    );
    assert_eq!(graph.instances_of("urn:test:thru"), vec![a, b]);
    graph.remove_instance(a).unwrap();
    assert_eq!(graph.instances_of("urn:test:thru"), vec![b]);
}
