use proptest::prelude::*;
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;
use topoprobe::config::{Config, TopologySettings};
use topoprobe::error::TopoprobeError;
use topoprobe::graph::{Graph, NodeId};
use topoprobe::probe::{Bundle, BundleAssembler, Constructor, Context, Handler, HandlerRegistry, Platform};

struct Probe;

impl Handler for Probe {
    fn start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn probe(_: &Context, _: &mut Bundle) -> anyhow::Result<Option<Box<dyn Handler>>> {
    Ok(Some(Box::new(Probe)))
}

fn failing(_: &Context, _: &mut Bundle) -> anyhow::Result<Option<Box<dyn Handler>>> {
    anyhow::bail!("construction failed")
}

const KNOWN: [&str; 6] = ["netlink", "netns", "ovsdb", "docker", "lldp", "runc"];

fn registry() -> HandlerRegistry {
    HandlerRegistry::from_entries(KNOWN.iter().map(|name| (*name, probe as Constructor)))
}

fn context() -> Context {
    Context::new(Arc::new(Config::default()), Graph::new(), NodeId::new("host"))
}

fn assembler(registry: &HandlerRegistry, linux: bool) -> BundleAssembler<'_> {
    BundleAssembler::new(registry).with_platform(Platform::with_namespace_introspection(linux))
}

fn known_name() -> impl Strategy<Value = String> {
    prop::sample::select(KNOWN.to_vec()).prop_map(str::to_string)
}

proptest! {
    #[test]
    fn unknown_names_are_unsupported(name in "[a-z]{1,12}") {
        prop_assume!(!KNOWN.contains(&name.as_str()));
        let registry = registry();
        let mut bundle = Bundle::new();

        let err = registry.construct(&name, &context(), &mut bundle).err().unwrap();

        prop_assert!(matches!(err, TopoprobeError::UnsupportedProbe(ref n) if *n == name));
        prop_assert!(bundle.is_empty());
    }

    #[test]
    fn duplicates_yield_one_handler(names in prop::collection::vec(known_name(), 0..20), linux in any::<bool>()) {
        let registry = registry();
        let bundle = assembler(&registry, linux)
            .assemble(&context(), &TopologySettings::with_probes(names.clone()))
            .unwrap();

        let mut expected: BTreeSet<String> = names.into_iter().collect();
        if linux {
            expected.insert("netlink".to_string());
            expected.insert("netns".to_string());
        }
        let actual: BTreeSet<String> = bundle.names().map(str::to_string).collect();

        prop_assert_eq!(actual, expected.clone());
        prop_assert_eq!(bundle.len(), expected.len());
    }

    #[test]
    fn order_does_not_change_contents(names in prop::sample::subsequence(KNOWN.to_vec(), 0..=KNOWN.len())) {
        let registry = registry();
        let forward = assembler(&registry, false)
            .assemble(&context(), &TopologySettings::with_probes(names.iter().copied()))
            .unwrap();
        let backward = assembler(&registry, false)
            .assemble(&context(), &TopologySettings::with_probes(names.iter().rev().copied()))
            .unwrap();

        let forward_names: BTreeSet<&str> = forward.names().collect();
        let backward_names: BTreeSet<&str> = backward.names().collect();
        prop_assert_eq!(forward_names, backward_names);
        prop_assert_eq!(forward.names().collect::<Vec<_>>(), names);
    }

    #[test]
    fn first_failure_aborts(prefix in prop::sample::subsequence(KNOWN.to_vec(), 0..=KNOWN.len())) {
        let registry = HandlerRegistry::from_entries(
            KNOWN
                .iter()
                .map(|name| (*name, probe as Constructor))
                .chain([("broken", failing as Constructor)]),
        );
        let mut probes: Vec<&str> = prefix.clone();
        probes.push("broken");
        probes.extend(KNOWN.iter().copied().filter(|n| !prefix.contains(n)));

        let err = assembler(&registry, false)
            .assemble(&context(), &TopologySettings::with_probes(probes))
            .unwrap_err();

        prop_assert_eq!(err.probe_name(), Some("broken"));
    }
}
