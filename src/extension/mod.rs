//! Probes loaded from shared modules at runtime
//!
//! An extension is a `cdylib` built against this crate that exports a single
//! [`ExtensionDeclaration`] under the symbol [`ENTRY_SYMBOL`]
//! (`TOPOPROBE_EXTENSION`). The declaration is emitted with
//! [`export_probe!`](crate::export_probe):
//!
//! ```rust,ignore
//! use topoprobe::probe::{Bundle, Context, Handler};
//!
//! fn new_probe(ctx: &Context, bundle: &mut Bundle) -> anyhow::Result<Option<Box<dyn Handler>>> {
//!     // ...
//! }
//!
//! topoprobe::export_probe!(new_probe);
//! ```
//!
//! The host only checks the declaration's structure: ABI revision, the
//! constructor signature text, and the compiler and crate versions it was
//! built with. Extension behavior is trusted; operators decide which
//! extensions are configured.

pub mod loader;

pub use loader::{open_shared_module, ExtensionLoader, ExtensionModule, ModuleOpener};

use crate::probe::{Constructor, Context};
use crate::{Result, TopoprobeError};
use std::ffi::CStr;
use std::os::raw::c_char;

/// Name of the exported declaration static.
pub const ENTRY_SYMBOL: &str = "TOPOPROBE_EXTENSION";

/// Bumped whenever the layout of [`ExtensionDeclaration`] changes.
pub const ABI_VERSION: u32 = 1;

#[doc(hidden)]
pub const ENTRY_SYMBOL_NUL: &[u8] = b"TOPOPROBE_EXTENSION\0";

#[doc(hidden)]
pub const CONSTRUCTOR_SIGNATURE_NUL: &str =
    "fn(&Context, &mut Bundle) -> anyhow::Result<Option<Box<dyn Handler>>>\0";

#[doc(hidden)]
pub const RUSTC_VERSION_NUL: &str = concat!(env!("TOPOPROBE_RUSTC_VERSION"), "\0");

#[doc(hidden)]
pub const CORE_VERSION_NUL: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Constructor signature every extension must export.
pub fn expected_signature() -> Signature<'static> {
    Signature {
        abi_version: ABI_VERSION,
        constructor: strip_nul(CONSTRUCTOR_SIGNATURE_NUL),
        rustc_version: strip_nul(RUSTC_VERSION_NUL),
        core_version: strip_nul(CORE_VERSION_NUL),
    }
}

fn strip_nul(s: &'static str) -> &'static str {
    s.trim_end_matches('\0')
}

/// Exported by every extension under [`ENTRY_SYMBOL`].
///
/// `abi_version` comes first so the host can reject a foreign layout before
/// reading any other field.
///
/// # Safety
///
/// The string pointers are null or point to immutable NUL-terminated
/// `'static` data. Fields are private and [`ExtensionDeclaration::new`] only
/// stores this crate's constants, so safe code cannot break that.
#[repr(C)]
pub struct ExtensionDeclaration {
    abi_version: u32,
    rustc_version: *const c_char,
    core_version: *const c_char,
    signature: *const c_char,
    constructor: Constructor,
}

// SAFETY: every pointer refers to immutable 'static data (see above).
unsafe impl Sync for ExtensionDeclaration {}

impl ExtensionDeclaration {
    /// Declaration stamped with this build's ABI, compiler and versions.
    pub const fn new(constructor: Constructor) -> Self {
        Self {
            abi_version: ABI_VERSION,
            rustc_version: RUSTC_VERSION_NUL.as_ptr() as *const c_char,
            core_version: CORE_VERSION_NUL.as_ptr() as *const c_char,
            signature: CONSTRUCTOR_SIGNATURE_NUL.as_ptr() as *const c_char,
            constructor,
        }
    }

    pub fn abi_version(&self) -> u32 {
        self.abi_version
    }

    /// Signature as declared by the extension.
    pub fn signature(&self) -> Signature<'_> {
        // SAFETY: the pointers are null or NUL-terminated 'static data.
        unsafe {
            Signature {
                abi_version: self.abi_version,
                constructor: read_c_str(self.signature),
                rustc_version: read_c_str(self.rustc_version),
                core_version: read_c_str(self.core_version),
            }
        }
    }
}

unsafe fn read_c_str<'a>(ptr: *const c_char) -> &'a str {
    if ptr.is_null() {
        return "<missing>";
    }
    CStr::from_ptr(ptr).to_str().unwrap_or("<invalid utf-8>")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature<'a> {
    pub abi_version: u32,
    pub constructor: &'a str,
    pub rustc_version: &'a str,
    pub core_version: &'a str,
}

impl std::fmt::Display for Signature<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [abi {}, topoprobe {}, {}]",
            self.constructor, self.abi_version, self.core_version, self.rustc_version
        )
    }
}

/// Check an extension's declaration against the host convention and return
/// its constructor. Nothing from the extension is invoked.
pub fn verify_declaration(name: &str, declaration: &ExtensionDeclaration) -> Result<Constructor> {
    let expected = expected_signature();

    if declaration.abi_version != expected.abi_version {
        return Err(TopoprobeError::InvalidExtensionSignature {
            name: name.to_string(),
            expected: expected.to_string(),
            observed: format!("abi {}", declaration.abi_version),
        });
    }

    // The ABI revision matches, so the remaining fields have our layout.
    let observed = declaration.signature();
    if observed != expected {
        return Err(TopoprobeError::InvalidExtensionSignature {
            name: name.to_string(),
            expected: expected.to_string(),
            observed: observed.to_string(),
        });
    }

    Ok(declaration.constructor)
}

/// Route this module's `tracing` events to the host subscriber carried by
/// `ctx`. Only the first call in a module takes effect.
#[doc(hidden)]
pub fn install_host_dispatch(ctx: &Context) {
    if tracing::dispatcher::set_global_default(ctx.dispatch().clone()).is_ok() {
        tracing::debug!("Extension logging routed to the host subscriber");
    }
}

/// Export `$constructor` as this module's probe entry point.
///
/// The constructor must have the [`Constructor`](crate::probe::Constructor)
/// signature; anything else fails to compile. The generated entry point
/// routes the module's logging to the host before calling it.
#[macro_export]
macro_rules! export_probe {
    ($constructor:path) => {
        fn __topoprobe_entry(
            ctx: &$crate::probe::Context,
            bundle: &mut $crate::probe::Bundle,
        ) -> $crate::probe::ConstructorResult {
            $crate::extension::install_host_dispatch(ctx);
            $constructor(ctx, bundle)
        }

        #[no_mangle]
        pub static TOPOPROBE_EXTENSION: $crate::extension::ExtensionDeclaration =
            $crate::extension::ExtensionDeclaration::new(__topoprobe_entry);
    };
}
