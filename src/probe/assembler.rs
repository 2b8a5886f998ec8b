//! Builds the probe bundle from platform defaults and configuration
//!
//! Assembly is synchronous and fail-fast: the first constructor or
//! extension error aborts the whole call and the partially built bundle is
//! dropped, never returned.

use crate::config::TopologySettings;
use crate::extension::{open_shared_module, ExtensionLoader, ModuleOpener};
use crate::probe::{Bundle, Context, HandlerRegistry, Platform};
use crate::Result;
use indexmap::IndexSet;
use tracing::{debug, info, warn};

pub struct BundleAssembler<'a> {
    registry: &'a HandlerRegistry,
    platform: Platform,
    opener: ModuleOpener,
}

impl<'a> BundleAssembler<'a> {
    pub fn new(registry: &'a HandlerRegistry) -> Self {
        Self {
            registry,
            platform: Platform::current(),
            opener: open_shared_module,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_module_opener(mut self, opener: ModuleOpener) -> Self {
        self.opener = opener;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Platform mandatory probes followed by the configured ones, first
    /// occurrence kept.
    pub fn desired_probes(&self, settings: &TopologySettings) -> Vec<String> {
        let mandatory = self
            .platform
            .mandatory_probes()
            .iter()
            .map(|probe| probe.as_str().to_string());

        dedup(mandatory.chain(settings.probes.iter().cloned()))
    }

    pub fn extension_loader(&self, settings: &TopologySettings) -> ExtensionLoader {
        ExtensionLoader::new(&settings.extensions_dir)
            .with_platform(self.platform)
            .with_opener(self.opener)
    }

    pub fn assemble(&self, ctx: &Context, settings: &TopologySettings) -> Result<Bundle> {
        let _span = ctx.logger().enter();

        let probes = self.desired_probes(settings);
        info!("Topology probes: {:?}", probes);

        let mut bundle = Bundle::new();

        for name in &probes {
            if bundle.contains(name) {
                debug!("Probe {} already in bundle, skipping", name);
                continue;
            }

            match self.registry.construct(name, ctx, &mut bundle)? {
                Some(handler) => {
                    bundle.add_handler(name.as_str(), handler);
                }
                None => info!("Probe {} is disabled on this host", name),
            }
        }

        let extensions = dedup(settings.extensions.iter().cloned());
        info!("Topology extensions: {:?}", extensions);

        let loader = self.extension_loader(settings);
        for name in &extensions {
            if bundle.contains(name) {
                warn!(
                    "Extension {} skipped: a probe with that name is already registered",
                    name
                );
                continue;
            }

            loader.load_into(name, ctx, &mut bundle)?;
        }

        info!(
            "Topology bundle ready with {} probes: {:?}",
            bundle.len(),
            bundle.names().collect::<Vec<_>>()
        );
        Ok(bundle)
    }
}

fn dedup<I: IntoIterator<Item = String>>(names: I) -> Vec<String> {
    names
        .into_iter()
        .collect::<IndexSet<String>>()
        .into_iter()
        .collect()
}
