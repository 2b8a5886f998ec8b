//! Named network namespaces, attached under the netlink probe

use crate::graph::Metadata;
use crate::probe::{Bundle, Context, Handler};
use crate::probes::netlink::NetlinkHandler;
use crate::probes::SourceHandler;
use anyhow::{anyhow, Context as _};
use serde_json::Value;
use std::any::Any;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_RUN_PATH: &str = "/var/run/netns";

pub struct NetnsHandler {
    source: SourceHandler,
    run_path: PathBuf,
    namespaces: Vec<String>,
}

impl NetnsHandler {
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }
}

impl Handler for NetnsHandler {
    fn start(&mut self) -> anyhow::Result<()> {
        self.source.start()?;

        self.namespaces = list_namespaces(&self.run_path)?;
        for namespace in &self.namespaces {
            self.source.publish_child(namespace, "netns");
        }
        info!(
            "netns probe found {} namespaces in {}",
            self.namespaces.len(),
            self.run_path.display()
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.source.stop();
        self.namespaces.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn new_probe(ctx: &Context, bundle: &mut Bundle) -> anyhow::Result<Option<Box<dyn Handler>>> {
    let netlink = bundle
        .downcast_handler::<NetlinkHandler>("netlink")
        .ok_or_else(|| anyhow!("netns probe requires the netlink probe"))?;
    let parent = netlink.node_id().clone();

    let run_path = ctx
        .config()
        .get_string("agent.topology.netns.run_path")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RUN_PATH));

    if !run_path.is_dir() {
        info!("netns probe disabled: {} not available", run_path.display());
        return Ok(None);
    }

    let mut metadata = Metadata::new();
    metadata.insert(
        "RunPath".to_string(),
        Value::from(run_path.display().to_string()),
    );

    Ok(Some(Box::new(NetnsHandler {
        source: SourceHandler::new(ctx, "netns", "netns", metadata).under(parent),
        run_path,
        namespaces: Vec::new(),
    })))
}

fn list_namespaces(run_path: &Path) -> anyhow::Result<Vec<String>> {
    let entries = std::fs::read_dir(run_path)
        .with_context(|| format!("Failed to list {}", run_path.display()))?;

    let mut namespaces = Vec::new();
    for entry in entries {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            namespaces.push(name.to_string());
        }
    }
    namespaces.sort();
    Ok(namespaces)
}
