pub mod assembler;
pub mod bundle;
pub mod context;
pub mod platform;
pub mod registry;

pub use assembler::BundleAssembler;
pub use bundle::Bundle;
pub use context::Context;
pub use platform::Platform;
pub use registry::HandlerRegistry;

use crate::probes;
use crate::TopoprobeError;
use std::any::Any;
use std::str::FromStr;

/// Runtime object of an active probe.
pub trait Handler: Send + Sync {
    fn start(&mut self) -> anyhow::Result<()>;

    fn stop(&mut self);

    /// Lets a dependent probe downcast a prerequisite found in the bundle.
    fn as_any(&self) -> &dyn Any;
}

/// Calling convention shared by built-in and extension probes.
///
/// `Ok(None)` means the probe opted out (its data source is not present)
/// and nothing is added to the bundle.
pub type Constructor = fn(&Context, &mut Bundle) -> ConstructorResult;

/// What a [`Constructor`] returns.
pub type ConstructorResult = anyhow::Result<Option<Box<dyn Handler>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinProbe {
    Netlink,
    Netns,
    Ovsdb,
    Lxd,
    Docker,
    Lldp,
    Neutron,
    Opencontrail,
    Socketinfo,
    Libvirt,
    Runc,
    Vpp,
    Bess,
}

impl BuiltinProbe {
    pub const ALL: [BuiltinProbe; 13] = [
        BuiltinProbe::Netlink,
        BuiltinProbe::Netns,
        BuiltinProbe::Ovsdb,
        BuiltinProbe::Lxd,
        BuiltinProbe::Docker,
        BuiltinProbe::Lldp,
        BuiltinProbe::Neutron,
        BuiltinProbe::Opencontrail,
        BuiltinProbe::Socketinfo,
        BuiltinProbe::Libvirt,
        BuiltinProbe::Runc,
        BuiltinProbe::Vpp,
        BuiltinProbe::Bess,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            BuiltinProbe::Netlink => "netlink",
            BuiltinProbe::Netns => "netns",
            BuiltinProbe::Ovsdb => "ovsdb",
            BuiltinProbe::Lxd => "lxd",
            BuiltinProbe::Docker => "docker",
            BuiltinProbe::Lldp => "lldp",
            BuiltinProbe::Neutron => "neutron",
            BuiltinProbe::Opencontrail => "opencontrail",
            BuiltinProbe::Socketinfo => "socketinfo",
            BuiltinProbe::Libvirt => "libvirt",
            BuiltinProbe::Runc => "runc",
            BuiltinProbe::Vpp => "vpp",
            BuiltinProbe::Bess => "bess",
        }
    }

    pub fn constructor(&self) -> Constructor {
        match self {
            BuiltinProbe::Netlink => probes::netlink::new_probe,
            BuiltinProbe::Netns => probes::netns::new_probe,
            BuiltinProbe::Ovsdb => probes::sources::new_ovsdb_probe,
            BuiltinProbe::Lxd => probes::sources::new_lxd_probe,
            BuiltinProbe::Docker => probes::sources::new_docker_probe,
            BuiltinProbe::Lldp => probes::sources::new_lldp_probe,
            BuiltinProbe::Neutron => probes::sources::new_neutron_probe,
            BuiltinProbe::Opencontrail => probes::sources::new_opencontrail_probe,
            BuiltinProbe::Socketinfo => probes::sources::new_socketinfo_probe,
            BuiltinProbe::Libvirt => probes::sources::new_libvirt_probe,
            BuiltinProbe::Runc => probes::sources::new_runc_probe,
            BuiltinProbe::Vpp => probes::sources::new_vpp_probe,
            BuiltinProbe::Bess => probes::sources::new_bess_probe,
        }
    }
}

impl std::fmt::Display for BuiltinProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BuiltinProbe {
    type Err = TopoprobeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        BuiltinProbe::ALL
            .iter()
            .copied()
            .find(|probe| probe.as_str() == name)
            .ok_or_else(|| TopoprobeError::UnsupportedProbe(name.to_string()))
    }
}
