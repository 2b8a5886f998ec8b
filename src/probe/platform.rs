//! Platform capability query driving the default probe set

use crate::probe::BuiltinProbe;

const NAMESPACE_PROBES: &[BuiltinProbe] = &[BuiltinProbe::Netlink, BuiltinProbe::Netns];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    namespace_introspection: bool,
}

impl Platform {
    /// Capabilities of the platform this binary was built for.
    pub const fn current() -> Self {
        Self {
            namespace_introspection: cfg!(target_os = "linux"),
        }
    }

    pub const fn with_namespace_introspection(enabled: bool) -> Self {
        Self {
            namespace_introspection: enabled,
        }
    }

    /// Whether low-level packet/namespace introspection is available.
    pub const fn supports_namespace_introspection(&self) -> bool {
        self.namespace_introspection
    }

    /// Probes always attempted first, in this order; most other probes
    /// assume they are present.
    pub fn mandatory_probes(&self) -> &'static [BuiltinProbe] {
        if self.namespace_introspection {
            NAMESPACE_PROBES
        } else {
            &[]
        }
    }

    /// File extension of loadable shared modules (`so`, `dylib`, `dll`).
    pub const fn shared_module_extension(&self) -> &'static str {
        std::env::consts::DLL_EXTENSION
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}
