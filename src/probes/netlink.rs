//! Host network interfaces

use crate::graph::{Metadata, NodeId};
use crate::probe::{Bundle, Context, Handler};
use crate::probes::SourceHandler;
use anyhow::Context as _;
use serde_json::Value;
use std::any::Any;
use std::path::PathBuf;
use tracing::{info, warn};

pub const PROC_NET_DEV: &str = "/proc/net/dev";

pub struct NetlinkHandler {
    source: SourceHandler,
    net_dev: PathBuf,
    interfaces: Vec<String>,
}

impl NetlinkHandler {
    /// Graph node other probes attach namespace data under.
    pub fn node_id(&self) -> &NodeId {
        self.source.node_id()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }
}

impl Handler for NetlinkHandler {
    fn start(&mut self) -> anyhow::Result<()> {
        self.source.start()?;

        let contents = std::fs::read_to_string(&self.net_dev)
            .with_context(|| format!("Failed to read {}", self.net_dev.display()))?;
        self.interfaces = parse_interfaces(&contents);

        for interface in &self.interfaces {
            self.source.publish_child(interface, "interface");
        }
        info!("netlink probe found {} interfaces", self.interfaces.len());
        Ok(())
    }

    fn stop(&mut self) {
        self.source.stop();
        self.interfaces.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn new_probe(ctx: &Context, _bundle: &mut Bundle) -> anyhow::Result<Option<Box<dyn Handler>>> {
    let net_dev = ctx
        .config()
        .get_string("agent.topology.netlink.net_dev")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(PROC_NET_DEV));

    if !net_dev.exists() {
        info!(
            "netlink probe disabled: {} not available",
            net_dev.display()
        );
        return Ok(None);
    }

    check_privileges();

    let mut metadata = Metadata::new();
    metadata.insert(
        "Source".to_string(),
        Value::from(net_dev.display().to_string()),
    );

    Ok(Some(Box::new(NetlinkHandler {
        source: SourceHandler::new(ctx, "netlink", "netlink", metadata),
        net_dev,
        interfaces: Vec::new(),
    })))
}

/// Interface names from the `/proc/net/dev` table.
pub fn parse_interfaces(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, _)| name.trim())
        .filter(|name| !name.is_empty() && !name.contains('|'))
        .map(str::to_string)
        .collect()
}

#[cfg(unix)]
fn check_privileges() {
    let euid = unsafe { libc::geteuid() };

    if euid != 0 {
        warn!(
            "Not running as root (euid={}). Ensure CAP_NET_ADMIN and CAP_SYS_ADMIN are granted.",
            euid
        );
    }
}

#[cfg(not(unix))]
fn check_privileges() {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::testing;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  123456     100    0    0    0     0          0         0   123456     100    0    0    0     0       0          0
  eth0: 9876543    2000    0    0    0     0          0         0  1234567    1500    0    0    0     0       0          0
";

    #[test]
    fn test_parse_interfaces() {
        assert_eq!(parse_interfaces(NET_DEV), vec!["lo", "eth0"]);
        assert!(parse_interfaces("").is_empty());
    }

    #[test]
    fn test_disabled_without_source() {
        let ctx = testing::context_with_config(
            "agent:\n  topology:\n    netlink:\n      net_dev: /nonexistent/net/dev\n",
        );
        let mut bundle = Bundle::new();

        assert!(new_probe(&ctx, &mut bundle).unwrap().is_none());
    }

    #[test]
    fn test_publishes_interfaces() {
        let dir = tempfile::tempdir().unwrap();
        let net_dev = dir.path().join("dev");
        std::fs::write(&net_dev, NET_DEV).unwrap();

        let ctx = testing::context_with_config(&format!(
            "agent:\n  topology:\n    netlink:\n      net_dev: {}\n",
            net_dev.display()
        ));
        let mut bundle = Bundle::new();
        let mut handler = new_probe(&ctx, &mut bundle).unwrap().unwrap();

        handler.start().unwrap();
        let netlink = handler.as_any().downcast_ref::<NetlinkHandler>().unwrap();
        assert_eq!(netlink.interfaces(), ["lo", "eth0"]);
        assert!(ctx.graph().contains(&NodeId::new("host/netlink/eth0")));

        handler.stop();
        assert_eq!(ctx.graph().len(), 1);
    }
}
