//! Built-in probe constructors
//!
//! Each constructor checks whether its data source exists on this host and
//! opts out with `Ok(None)` when it does not. Once started, a probe
//! publishes a node for its source under the host node (or under the node of
//! the probe it depends on) and withdraws it on stop.

pub mod netlink;
pub mod netns;
pub mod sources;

use crate::graph::{Metadata, Node, NodeId};
use crate::probe::{Context, Handler};
use anyhow::anyhow;
use serde_json::Value;
use std::any::Any;
use std::path::PathBuf;
use tracing::{debug, info};

/// Graph publication shared by the built-in probes.
pub struct SourceHandler {
    ctx: Context,
    probe: &'static str,
    node: Node,
    parent: NodeId,
    running: bool,
}

impl SourceHandler {
    pub fn new(ctx: &Context, probe: &'static str, node_type: &str, mut metadata: Metadata) -> Self {
        metadata.insert("Type".to_string(), Value::from(node_type));
        metadata.insert("Probe".to_string(), Value::from(probe));
        metadata
            .entry("Name".to_string())
            .or_insert_with(|| Value::from(probe));

        Self {
            ctx: ctx.clone(),
            probe,
            node: Node::new(ctx.root().child(probe), metadata),
            parent: ctx.root().clone(),
            running: false,
        }
    }

    /// Publish under `parent` instead of the host node.
    pub fn under(mut self, parent: NodeId) -> Self {
        self.node.id = parent.child(self.probe);
        self.parent = parent;
        self
    }

    pub fn probe(&self) -> &'static str {
        self.probe
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node.id
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Publish a node owned by this probe's node.
    pub fn publish_child(&self, suffix: &str, node_type: &str) -> NodeId {
        let id = self.node.id.child(suffix);
        let mut metadata = Metadata::new();
        metadata.insert("Type".to_string(), Value::from(node_type));
        metadata.insert("Name".to_string(), Value::from(suffix));

        let graph = self.ctx.graph();
        graph.add_node(Node::new(id.clone(), metadata));
        graph.link(&self.node.id, &id);
        id
    }

    fn remove_children(&self) {
        let graph = self.ctx.graph();
        for child in graph.children(&self.node.id) {
            graph.remove_node(&child);
        }
    }
}

impl Handler for SourceHandler {
    fn start(&mut self) -> anyhow::Result<()> {
        let _enter = self.ctx.logger().enter();
        if self.running {
            return Ok(());
        }

        let graph = self.ctx.graph();
        if !graph.contains(&self.parent) {
            return Err(anyhow!(
                "{} probe: parent node {} is not in the graph",
                self.probe,
                self.parent
            ));
        }

        graph.add_node(self.node.clone());
        graph.link(&self.parent, &self.node.id);
        self.running = true;

        info!("{} probe publishing under {}", self.probe, self.node.id);
        Ok(())
    }

    fn stop(&mut self) {
        let _enter = self.ctx.logger().enter();
        if !self.running {
            return;
        }

        self.remove_children();
        self.ctx.graph().remove_node(&self.node.id);
        self.running = false;

        debug!("{} probe stopped", self.probe);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Configured endpoint of `probe` (`agent.topology.<probe>.endpoint`).
pub(crate) fn configured_endpoint(ctx: &Context, probe: &str) -> Option<String> {
    ctx.config()
        .get_string(&format!("agent.topology.{}.endpoint", probe))
}

/// Local endpoint path of `probe`, falling back to `default`.
pub(crate) fn local_endpoint(ctx: &Context, probe: &str, default: &str) -> PathBuf {
    configured_endpoint(ctx, probe)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}
