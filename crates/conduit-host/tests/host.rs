//! Host commands end to end: registry → graph → driver, plus scheduling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use conduit_core::{
    EVENT_HEADER_SIZE, Error, PluginDescriptor, PortDescriptor, Ports, Preset, PresetValue, Processor, Status, Urid,
    uris,
};
use conduit_host::{ConfigError, Host, HostConfig, HostError, PluginRegistry};
use conduit_io::{MockBackend, MockDevice};
use conduit_sched::ManualClock;
use parking_lot::Mutex;

const SYNTH: &str = "urn:test:synth";
const LEVEL: &str = "urn:test:level";
const THRU: &str = "urn:test:thru";

type Received = Arc<Mutex<Vec<(Urid, Vec<u8>)>>>;

/// Records every delivered event and outputs silence.
struct Recorder {
    received: Received,
}

impl Processor for Recorder {
    fn run(&mut self, ports: &mut Ports<'_>) {
        let mut received = self.received.lock();
        for event in ports.events_in(0) {
            received.push((event.kind, event.body.to_vec()));
        }
        drop(received);
        ports.audio_out(1).fill(0.0);
    }
}

/// Outputs its `level` control as a constant signal.
struct Level {
    deactivated: Arc<AtomicUsize>,
}

impl Processor for Level {
    fn run(&mut self, ports: &mut Ports<'_>) {
        let level = ports.control(0);
        ports.audio_out(1).fill(level);
    }

    fn deactivate(&mut self) {
        self.deactivated.fetch_add(1, Ordering::Relaxed);
    }
}

struct Thru;

impl Processor for Thru {
    fn run(&mut self, ports: &mut Ports<'_>) {
        let (input, output) = ports.audio_in_out(0, 1);
        output.copy_from_slice(input);
    }
}

struct Fixture {
    host: Host,
    received: Received,
    deactivated: Arc<AtomicUsize>,
}

fn fixture(config: HostConfig) -> Fixture {
    let received = Received::default();
    let deactivated = Arc::new(AtomicUsize::new(0));
    let mut registry = PluginRegistry::new();

    let sink = Arc::clone(&received);
    registry.register(
        PluginDescriptor::new(
            SYNTH,
            "Recorder",
            vec![
                PortDescriptor::event_input("midi"),
                PortDescriptor::audio_output("out"),
            ],
        ),
        move |_| {
            Box::new(Recorder {
                received: Arc::clone(&sink),
            })
        },
    );

    let counter = Arc::clone(&deactivated);
    registry.register(
        PluginDescriptor::new(
            LEVEL,
            "Level",
            vec![
                PortDescriptor::control_input("level", 0.0, 1.0, 0.25),
                PortDescriptor::audio_output("out"),
            ],
        ),
        move |_| {
            Box::new(Level {
                deactivated: Arc::clone(&counter),
            })
        },
    );
    registry.add_preset(
        LEVEL,
        Preset {
            name: "loud".to_owned(),
            values: vec![
                ("level".to_owned(), PresetValue::Float(0.9)),
                ("missing".to_owned(), PresetValue::Float(1.0)),
                (
                    "out".to_owned(),
                    PresetValue::Other {
                        type_uri: uris::ATOM_SEQUENCE.to_owned(),
                        bytes: vec![1, 2, 3],
                    },
                ),
            ],
        },
    );

    registry.register(
        PluginDescriptor::new(
            THRU,
            "Thru",
            vec![
                PortDescriptor::audio_input("in"),
                PortDescriptor::audio_output("out"),
            ],
        ),
        |_| Box::new(Thru),
    );

    Fixture {
        host: Host::with_registry(config, registry).unwrap(),
        received,
        deactivated,
    }
}

fn small_config() -> HostConfig {
    HostConfig {
        block_size: 64,
        default_interval_ms: 100,
        ..HostConfig::default()
    }
}

/// Renders `frames` frames and returns channel 0.
fn render(host: &Host, frames: usize) -> Vec<f32> {
    let mut device = MockDevice::new(host.config().output_channels);
    host.driver().render(&mut device, frames, frames).unwrap();
    device.channel(0)
}

#[test]
fn play_sends_note_on_then_gated_note_off() {
    let Fixture {
        mut host, received, ..
    } = fixture(small_config());
    let synth = host.instantiate(SYNTH).unwrap();
    host.connect_to_output(synth, "out", 0).unwrap();
    let midi = host.interner().get(uris::MIDI_EVENT).unwrap();

    host.play(synth, "midi", &[60, 64], 100, 50).unwrap();
    render(&host, 64);
    assert_eq!(
        *received.lock(),
        vec![(midi, vec![0x90, 60, 100]), (midi, vec![0x90, 64, 100])]
    );

    assert_eq!(host.tick(49), 0);
    assert_eq!(host.tick(50), 0);
    render(&host, 64);
    assert_eq!(host.tick(60), 1);
    render(&host, 64);

    let received = received.lock();
    assert_eq!(received.len(), 4);
    assert_eq!(received[2], (midi, vec![0x80, 60, 0]));
    assert_eq!(received[3], (midi, vec![0x80, 64, 0]));
}

#[test]
fn note_off_waits_for_two_rendered_blocks() {
    let Fixture {
        mut host, received, ..
    } = fixture(small_config());
    let synth = host.instantiate(SYNTH).unwrap();
    host.connect_to_output(synth, "out", 0).unwrap();

    host.play(synth, "midi", &[72], 90, 0).unwrap();
    assert_eq!(host.tick(500), 0);
    assert_eq!(host.pending_events(), 1);

    render(&host, 64);
    assert_eq!(host.tick(510), 0);
    render(&host, 64);
    assert_eq!(host.tick(520), 1);
    render(&host, 64);
    assert_eq!(received.lock().len(), 2);
}

#[test]
fn full_queue_still_releases_sent_notes() {
    // Room for exactly one three-byte event.
    let config = HostConfig {
        event_capacity: EVENT_HEADER_SIZE + 8,
        ..small_config()
    };
    let Fixture {
        mut host, received, ..
    } = fixture(config);
    let synth = host.instantiate(SYNTH).unwrap();
    host.connect_to_output(synth, "out", 0).unwrap();
    let midi = host.interner().get(uris::MIDI_EVENT).unwrap();

    let err = host.play(synth, "midi", &[60, 64], 100, 10).unwrap_err();
    assert!(matches!(err, HostError::Graph(Error::EventBufferFull(_))));
    assert!(host.last_error().starts_with("send_midi"));
    assert_eq!(host.pending_events(), 1);

    render(&host, 64);
    render(&host, 64);
    assert_eq!(host.tick(10), 1);
    render(&host, 64);

    assert_eq!(
        *received.lock(),
        vec![(midi, vec![0x90, 60, 100]), (midi, vec![0x80, 60, 0])]
    );
}

#[test]
fn unconnected_synth_keeps_messages_queued() {
    let Fixture {
        mut host, received, ..
    } = fixture(small_config());
    let synth = host.instantiate(SYNTH).unwrap();
    host.send_midi(synth, "midi", &[0xb0, 7, 127]).unwrap();

    render(&host, 64);
    assert!(received.lock().is_empty());

    host.connect_to_output(synth, "out", 1).unwrap();
    render(&host, 64);
    assert_eq!(received.lock().len(), 1);
}

#[test]
fn set_param_reaches_audio() {
    let Fixture { mut host, .. } = fixture(small_config());
    let level = host.instantiate(LEVEL).unwrap();
    host.connect_to_output(level, "out", 0).unwrap();

    assert_eq!(render(&host, 8), vec![0.25; 8]);
    assert_eq!(host.set_param(level, "level", 3.0).unwrap(), 1.0);
    assert_eq!(render(&host, 8), vec![1.0; 8]);
}

#[test]
fn param_writes_never_silence_rendering() {
    let Fixture { mut host, .. } = fixture(small_config());
    let level = host.instantiate(LEVEL).unwrap();
    host.connect_to_output(level, "out", 0).unwrap();
    host.set_param(level, "level", 1.0).unwrap();

    let mut driver = host.driver();
    let done = AtomicBool::new(false);
    let (output, writes) = std::thread::scope(|s| {
        let audio = s.spawn(|| {
            let mut device = MockDevice::new(2);
            for _ in 0..2000 {
                driver.render(&mut device, 64, 64).unwrap();
            }
            done.store(true, Ordering::Release);
            device.channel(0)
        });

        let mut writes = 0u64;
        loop {
            host.set_param(level, "level", 1.0).unwrap();
            writes += 1;
            if done.load(Ordering::Acquire) {
                break;
            }
        }
        (audio.join().unwrap(), writes)
    });

    assert!(writes > 0);
    assert_eq!(host.shared().skipped_blocks(), 0);
    assert_eq!(host.shared().audio_iteration(), 2000);
    assert_eq!(output.len(), 2000 * 64);
    assert!(output.iter().all(|&s| s == 1.0));
}

#[test]
fn preset_applies_float_values_only() {
    let Fixture { mut host, .. } = fixture(small_config());
    let level = host.instantiate(LEVEL).unwrap();
    host.connect_to_output(level, "out", 0).unwrap();

    assert_eq!(host.load_preset(level, "loud").unwrap(), 1);
    assert_eq!(render(&host, 4), vec![0.9; 4]);

    let err = host.load_preset(level, "quiet").unwrap_err();
    assert!(matches!(err, HostError::PresetNotFound { .. }));
    assert!(host.last_error().contains("quiet"));

    let inline = Preset::from_floats("inline", &[("level", 0.5)]);
    assert_eq!(host.apply_preset(level, &inline).unwrap(), 1);
    assert_eq!(render(&host, 4), vec![0.5; 4]);
}

#[test]
fn unloading_plugin_frees_its_instances() {
    let Fixture {
        mut host,
        deactivated,
        ..
    } = fixture(small_config());
    let a = host.instantiate(LEVEL).unwrap();
    let b = host.instantiate(LEVEL).unwrap();
    let thru = host.instantiate(THRU).unwrap();
    host.connect(a, "out", thru, "in").unwrap();
    host.connect(b, "out", thru, "in").unwrap();
    host.connect_to_output(thru, "out", 0).unwrap();

    assert_eq!(host.unload_plugin(LEVEL).unwrap(), 2);
    assert_eq!(deactivated.load(Ordering::Relaxed), 2);
    assert!(host.graph().lock().producers(thru, "in").unwrap().is_empty());
    assert_eq!(render(&host, 4), vec![0.0; 4]);

    assert!(matches!(
        host.instantiate(LEVEL),
        Err(HostError::PluginNotFound(_))
    ));
    assert!(host.unload_plugin(LEVEL).is_err());
    assert!(host.last_error().starts_with("unload_plugin"));

    // Handles of the freed instances went with them.
    assert!(matches!(
        host.set_param(a, "level", 1.0),
        Err(HostError::Graph(Error::InstanceNotFound(_)))
    ));
}

#[test]
fn rejected_connections_are_recorded() {
    let Fixture { mut host, .. } = fixture(small_config());
    let synth = host.instantiate(SYNTH).unwrap();
    let a = host.instantiate(THRU).unwrap();
    let b = host.instantiate(THRU).unwrap();

    let result = host.connect(synth, "midi", a, "in");
    assert_eq!(Status::of(&result), Status::Err);
    assert!(matches!(
        result,
        Err(HostError::Graph(Error::WrongPortRole { .. }))
    ));
    assert!(host.last_error().starts_with("connect"));

    host.connect(a, "out", b, "in").unwrap();
    assert!(matches!(
        host.connect(b, "out", a, "in"),
        Err(HostError::Graph(Error::CycleDetected { .. }))
    ));
    assert!(matches!(
        host.connect_to_output(a, "out", 9),
        Err(HostError::Graph(Error::InvalidChannel { .. }))
    ));
    assert_eq!(host.shared().error_count(), 3);
}

#[test]
fn node_automates_parameter() {
    let Fixture { mut host, .. } = fixture(small_config());
    let level = host.instantiate(LEVEL).unwrap();
    host.connect_to_output(level, "out", 0).unwrap();

    host.add_node(move |host, _, count| {
        let _ = host.set_param(level, "level", count as f32 * 0.1);
    });
    for now in (0..=250).step_by(10) {
        host.tick(now);
    }

    let value = host.graph().lock().control(level, "level").unwrap().get();
    assert!((value - 0.2).abs() < 1e-6);
}

#[test]
fn child_node_follows_parent_through_host() {
    let Fixture { mut host, .. } = fixture(small_config());
    let fired = Arc::new(Mutex::new(Vec::new()));

    let parent = host.add_node(|_, _, _| {});
    let log = Arc::clone(&fired);
    let child = host.add_node(move |host, _, _| log.lock().push(host.now_ms()));
    host.node_mut(child).unwrap().set_divisor(2);

    host.tick(0);
    host.follow(child, parent).unwrap();
    for now in (10..=300).step_by(10) {
        host.tick(now);
    }

    // Child fired once on its own, then every half parent period.
    assert_eq!(*fired.lock(), vec![0, 100, 150, 200, 250, 300]);
}

#[test]
fn run_stops_on_shutdown() {
    let Fixture { mut host, .. } = fixture(small_config());
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    host.add_node(move |host, _, n| {
        seen.fetch_add(1, Ordering::Relaxed);
        if n == 2 {
            host.request_shutdown();
        }
    });

    host.run(ManualClock::new(0));

    assert_eq!(count.load(Ordering::Relaxed), 3);
    assert!(host.shared().is_done());
}

#[test]
fn stream_renders_through_backend() {
    let Fixture { mut host, .. } = fixture(small_config());
    let level = host.instantiate(LEVEL).unwrap();
    host.connect_to_output(level, "out", 1).unwrap();

    let backend = MockBackend::new();
    let stream = host.start_stream(&backend).unwrap();
    let period = backend.pump(100).unwrap();

    assert_eq!(period.len(), 200);
    assert!(period.iter().step_by(2).all(|&s| s == 0.0));
    assert!(period.iter().skip(1).step_by(2).all(|&s| s == 0.25));
    assert_eq!(host.shared().audio_iteration(), 2);

    backend.inject_error("device unplugged");
    assert!(host.last_error().contains("device unplugged"));

    drop(stream);
    assert!(!backend.is_streaming());
}

#[test]
fn config_file_drives_host() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conduit.toml");
    std::fs::write(
        &path,
        "sample_rate = 48000\nblock_size = 32\noutput_channels = 1\n",
    )
    .unwrap();

    let config = HostConfig::load(&path).unwrap();
    let Fixture { host, .. } = fixture(config);
    assert_eq!(host.graph().lock().block_size(), 32);
    assert_eq!(host.graph().lock().output_channels(), 1);
    assert_eq!(host.stream_config().sample_rate, 48000);

    let missing = HostConfig::load(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(missing, ConfigError::ReadFile { .. }));
}
