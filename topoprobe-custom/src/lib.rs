//! Sample topology extension
//!
//! Build with `cargo build -p topoprobe-custom` and install the resulting
//! `libcustom.so` as `<extensions_dir>/custom.so`, then list `custom` under
//! `agent.topology.extensions`.
//!
//! The probe publishes one node described by `agent.topology.custom.labels`
//! under the host node. Setting `agent.topology.custom.enabled: false` makes
//! the constructor opt out.

use serde_json::Value;
use std::any::Any;
use topoprobe::graph::{Metadata, Node, NodeId};
use topoprobe::probe::{Bundle, Context, Handler};
use tracing::info;

pub struct CustomHandler {
    ctx: Context,
    node: Node,
    started: bool,
}

impl CustomHandler {
    pub fn node_id(&self) -> &NodeId {
        &self.node.id
    }
}

impl Handler for CustomHandler {
    fn start(&mut self) -> anyhow::Result<()> {
        let _enter = self.ctx.logger().enter();
        let graph = self.ctx.graph();

        graph.add_node(self.node.clone());
        graph.link(self.ctx.root(), &self.node.id);
        self.started = true;

        info!("custom probe publishing {}", self.node.id);
        Ok(())
    }

    fn stop(&mut self) {
        if self.started {
            self.ctx.graph().remove_node(&self.node.id);
            self.started = false;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn new_probe(ctx: &Context, _bundle: &mut Bundle) -> anyhow::Result<Option<Box<dyn Handler>>> {
    let config = ctx.config();
    if !config.get_or("agent.topology.custom.enabled", true)? {
        return Ok(None);
    }

    let mut metadata = Metadata::new();
    metadata.insert("Type".to_string(), Value::from("custom"));
    metadata.insert("Name".to_string(), Value::from("custom"));
    if let Some(labels) = config.get::<Metadata>("agent.topology.custom.labels")? {
        metadata.insert("Labels".to_string(), Value::Object(labels));
    }

    Ok(Some(Box::new(CustomHandler {
        ctx: ctx.clone(),
        node: Node::new(ctx.root().child("custom"), metadata),
        started: false,
    })))
}

topoprobe::export_probe!(new_probe);
