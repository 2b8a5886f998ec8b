//! Probes backed by a local daemon socket or a remote API

use crate::graph::Metadata;
use crate::probe::{Bundle, Context, Handler};
use crate::probes::{configured_endpoint, local_endpoint, SourceHandler};
use anyhow::anyhow;
use serde_json::Value;
use tracing::info;

type ProbeResult = anyhow::Result<Option<Box<dyn Handler>>>;

/// Enabled only when its endpoint exists on the host.
fn local_source(ctx: &Context, probe: &'static str, node_type: &str, default: &str) -> ProbeResult {
    let endpoint = local_endpoint(ctx, probe, default);

    if !endpoint.exists() {
        info!(
            "{} probe disabled: {} not available",
            probe,
            endpoint.display()
        );
        return Ok(None);
    }

    Ok(Some(Box::new(SourceHandler::new(
        ctx,
        probe,
        node_type,
        endpoint_metadata(&endpoint.display().to_string()),
    ))))
}

/// Requires an explicitly configured endpoint.
fn remote_source(ctx: &Context, probe: &'static str, node_type: &str) -> ProbeResult {
    let endpoint = configured_endpoint(ctx, probe).ok_or_else(|| {
        anyhow!(
            "{} probe requires agent.topology.{}.endpoint to be set",
            probe,
            probe
        )
    })?;

    Ok(Some(Box::new(SourceHandler::new(
        ctx,
        probe,
        node_type,
        endpoint_metadata(&endpoint),
    ))))
}

fn endpoint_metadata(endpoint: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("Endpoint".to_string(), Value::from(endpoint));
    metadata
}

pub fn new_ovsdb_probe(ctx: &Context, _bundle: &mut Bundle) -> ProbeResult {
    local_source(ctx, "ovsdb", "ovsbridge", "/var/run/openvswitch/db.sock")
}

pub fn new_lxd_probe(ctx: &Context, _bundle: &mut Bundle) -> ProbeResult {
    local_source(ctx, "lxd", "container", "/var/lib/lxd/unix.socket")
}

pub fn new_docker_probe(ctx: &Context, _bundle: &mut Bundle) -> ProbeResult {
    local_source(ctx, "docker", "container", "/var/run/docker.sock")
}

pub fn new_libvirt_probe(ctx: &Context, _bundle: &mut Bundle) -> ProbeResult {
    local_source(ctx, "libvirt", "libvirt", "/var/run/libvirt/libvirt-sock")
}

pub fn new_runc_probe(ctx: &Context, _bundle: &mut Bundle) -> ProbeResult {
    local_source(ctx, "runc", "container", "/run/runc")
}

pub fn new_vpp_probe(ctx: &Context, _bundle: &mut Bundle) -> ProbeResult {
    local_source(ctx, "vpp", "vpp", "/run/vpp/api.sock")
}

pub fn new_socketinfo_probe(ctx: &Context, _bundle: &mut Bundle) -> ProbeResult {
    local_source(ctx, "socketinfo", "socketinfo", "/proc/net/tcp")
}

pub fn new_neutron_probe(ctx: &Context, _bundle: &mut Bundle) -> ProbeResult {
    remote_source(ctx, "neutron", "neutron")
}

pub fn new_opencontrail_probe(ctx: &Context, _bundle: &mut Bundle) -> ProbeResult {
    remote_source(ctx, "opencontrail", "opencontrail")
}

pub fn new_bess_probe(ctx: &Context, _bundle: &mut Bundle) -> ProbeResult {
    remote_source(ctx, "bess", "bess")
}

/// LLDP listens on the configured interfaces, all of them when unset.
pub fn new_lldp_probe(ctx: &Context, _bundle: &mut Bundle) -> ProbeResult {
    let interfaces = ctx
        .config()
        .get_string_list("agent.topology.lldp.interfaces")?;

    let mut metadata = Metadata::new();
    metadata.insert(
        "Interfaces".to_string(),
        Value::from(if interfaces.is_empty() {
            vec!["*".to_string()]
        } else {
            interfaces
        }),
    );

    Ok(Some(Box::new(SourceHandler::new(ctx, "lldp", "lldp", metadata))))
}
