//! Property-based tests for the graph mixer and the URI interner.

use proptest::prelude::*;
use conduit_core::{Graph, Interner, PluginDescriptor, PortDescriptor, Ports, Processor};

struct Constant(f32);

impl Processor for Constant {
    fn run(&mut self, ports: &mut Ports<'_>) {
        ports.audio_out(0).fill(self.0);
    }
}

fn constant_desc() -> PluginDescriptor {
    PluginDescriptor::new(
        "urn:test:const",
        "Constant",
        vec![PortDescriptor::audio_output("out")],
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A sink channel fed by any set of constant sources equals their sum,
    /// accumulated in connection order.
    #[test]
    fn fan_in_is_ordered_sum(
        values in prop::collection::vec(-1.0f32..=1.0f32, 0..8),
        frames in 1usize..=64,
    ) {
        let mut graph = Graph::new(48000.0, 64, 1, 256);
        for &v in &values {
            let id = graph.add_instance(&constant_desc(), Box::new(Constant(v)));
            graph.connect_to_output(id, "out", 0).unwrap();
        }
        graph.run(frames);

        let mut expected = 0.0f32;
        for (i, &v) in values.iter().enumerate() {
            expected = if i == 0 { v } else { expected + v };
        }
        let out = graph.output(0);
        prop_assert_eq!(out.len(), frames);
        for &s in out {
            prop_assert_eq!(s, expected);
        }
    }

    /// Interned ids are dense from 1 and resolve back to their names.
    #[test]
    fn interner_ids_dense_and_stable(names in prop::collection::vec("[a-z]{1,6}", 1..32)) {
        let mut interner = Interner::new();
        let ids: Vec<_> = names.iter().map(|n| interner.intern(n)).collect();

        for (name, id) in names.iter().zip(&ids) {
            prop_assert_eq!(interner.resolve(*id), Some(name.as_str()));
            prop_assert_eq!(interner.intern(name), *id);
            prop_assert!(id.get() as usize <= interner.len());
        }
        let mut distinct: Vec<_> = ids.iter().map(|id| id.get()).collect();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(distinct, (1..=interner.len() as u32).collect::<Vec<_>>());
    }
}
