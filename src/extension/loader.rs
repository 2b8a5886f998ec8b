use crate::extension::{verify_declaration, ExtensionDeclaration, ENTRY_SYMBOL, ENTRY_SYMBOL_NUL};
use crate::probe::{Bundle, Constructor, Context, Platform};
use crate::{Result, TopoprobeError};
use anyhow::anyhow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A shared module loaded into the process.
pub trait ExtensionModule: Send + Sync {
    /// Resolve the exported [`ExtensionDeclaration`]. `Err` carries the
    /// resolver's reason when the symbol is absent.
    fn declaration(&self) -> std::result::Result<&ExtensionDeclaration, String>;
}

impl ExtensionModule for libloading::Library {
    fn declaration(&self) -> std::result::Result<&ExtensionDeclaration, String> {
        // SAFETY: the symbol is read as a pointer to a static and only
        // dereferenced when non-null. Whether it really is an
        // `ExtensionDeclaration` is checked by `verify_declaration` through
        // the leading ABI revision.
        unsafe {
            let symbol = self
                .get::<*const ExtensionDeclaration>(ENTRY_SYMBOL_NUL)
                .map_err(|e| e.to_string())?;
            let declaration = *symbol;
            declaration
                .as_ref()
                .ok_or_else(|| "symbol resolves to a null address".to_string())
        }
    }
}

/// Opens the module file at a path.
pub type ModuleOpener = fn(&Path) -> anyhow::Result<Arc<dyn ExtensionModule>>;

/// Load a shared module with the platform dynamic loader.
pub fn open_shared_module(path: &Path) -> anyhow::Result<Arc<dyn ExtensionModule>> {
    // SAFETY: loading runs the module's initializers. Extensions are
    // trusted code chosen by the operator.
    let library = unsafe { libloading::Library::new(path) }?;
    Ok(Arc::new(library))
}

pub struct ExtensionLoader {
    extensions_dir: PathBuf,
    platform: Platform,
    opener: ModuleOpener,
}

impl ExtensionLoader {
    pub fn new(extensions_dir: impl Into<PathBuf>) -> Self {
        Self {
            extensions_dir: extensions_dir.into(),
            platform: Platform::current(),
            opener: open_shared_module,
        }
    }

    pub fn with_opener(mut self, opener: ModuleOpener) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn extensions_dir(&self) -> &Path {
        &self.extensions_dir
    }

    /// `<extensions_dir>/<name>.<shared module extension>`
    pub fn module_path(&self, name: &str) -> PathBuf {
        self.extensions_dir
            .join(format!("{}.{}", name, self.platform.shared_module_extension()))
    }

    /// Open the module for `name` and verify its entry point. Nothing in the
    /// module is invoked yet.
    pub fn load(&self, name: &str) -> Result<LoadedExtension> {
        let path = self.module_path(name);
        info!("Loading extension {} from {}", name, path.display());

        if !path.exists() {
            return Err(TopoprobeError::ExtensionLoadError {
                name: name.to_string(),
                path: path.clone(),
                source: anyhow!("{} not found", path.display()),
            });
        }

        let module = (self.opener)(&path).map_err(|source| TopoprobeError::ExtensionLoadError {
            name: name.to_string(),
            path: path.clone(),
            source,
        })?;

        let constructor = bind(name, module.as_ref())?;
        debug!("Extension {} exports a compliant entry point", name);

        Ok(LoadedExtension {
            name: name.to_string(),
            path,
            constructor,
            module,
        })
    }

    /// Load, verify and instantiate `name`, adding its handler (if any) to
    /// `bundle`. Returns whether a handler was added.
    pub fn load_into(&self, name: &str, ctx: &Context, bundle: &mut Bundle) -> Result<bool> {
        self.load(name)?.instantiate(ctx, bundle)
    }
}

fn bind(name: &str, module: &dyn ExtensionModule) -> Result<Constructor> {
    let declaration =
        module
            .declaration()
            .map_err(|reason| TopoprobeError::NonCompliantExtension {
                name: name.to_string(),
                symbol: ENTRY_SYMBOL.to_string(),
                reason,
            })?;

    verify_declaration(name, declaration)
}

/// A verified extension whose constructor has not been called yet.
pub struct LoadedExtension {
    name: String,
    path: PathBuf,
    constructor: Constructor,
    module: Arc<dyn ExtensionModule>,
}

impl LoadedExtension {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the constructor. The module is handed to `bundle` first and stays
    /// loaded as long as the bundle lives, even when the constructor fails or
    /// opts out.
    pub fn instantiate(self, ctx: &Context, bundle: &mut Bundle) -> Result<bool> {
        bundle.retain_module(self.module);

        // Errors are rendered here: their code lives in the module, which
        // the caller may unload before reporting them.
        let handler = (self.constructor)(ctx, bundle).map_err(|source| {
            TopoprobeError::ExtensionConstructionFailed {
                name: self.name.clone(),
                source: anyhow!("{:#}", source),
            }
        })?;

        match handler {
            Some(handler) => Ok(bundle.add_extension_handler(self.name, handler)),
            None => {
                info!("Extension {} disabled itself", self.name);
                Ok(false)
            }
        }
    }
}

impl std::fmt::Debug for LoadedExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedExtension")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::graph::{Graph, NodeId};
    use crate::probe::Handler;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Marker;

    impl Handler for Marker {
        fn start(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn stop(&mut self) {}

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn marker_probe(_: &Context, _: &mut Bundle) -> anyhow::Result<Option<Box<dyn Handler>>> {
        Ok(Some(Box::new(Marker)))
    }

    fn broken_probe(_: &Context, _: &mut Bundle) -> anyhow::Result<Option<Box<dyn Handler>>> {
        anyhow::bail!("controller unreachable")
    }

    /// Registers a helper under another name and opts out itself.
    fn with_helper(_: &Context, bundle: &mut Bundle) -> anyhow::Result<Option<Box<dyn Handler>>> {
        bundle.add_handler("helper", Box::new(Marker));
        Ok(None)
    }

    static MARKER: ExtensionDeclaration = ExtensionDeclaration::new(marker_probe);
    static BROKEN: ExtensionDeclaration = ExtensionDeclaration::new(broken_probe);
    static HELPER: ExtensionDeclaration = ExtensionDeclaration::new(with_helper);

    static HELPER_UNLOADS: AtomicUsize = AtomicUsize::new(0);
    static BROKEN_UNLOADS: AtomicUsize = AtomicUsize::new(0);

    /// Counts how often it is unloaded.
    struct TrackedModule {
        declaration: &'static ExtensionDeclaration,
        unloads: &'static AtomicUsize,
    }

    impl ExtensionModule for TrackedModule {
        fn declaration(&self) -> std::result::Result<&ExtensionDeclaration, String> {
            Ok(self.declaration)
        }
    }

    impl Drop for TrackedModule {
        fn drop(&mut self) {
            self.unloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn open_helper(_: &Path) -> anyhow::Result<Arc<dyn ExtensionModule>> {
        Ok(Arc::new(TrackedModule {
            declaration: &HELPER,
            unloads: &HELPER_UNLOADS,
        }))
    }

    fn open_tracked_broken(_: &Path) -> anyhow::Result<Arc<dyn ExtensionModule>> {
        Ok(Arc::new(TrackedModule {
            declaration: &BROKEN,
            unloads: &BROKEN_UNLOADS,
        }))
    }

    struct FakeModule(Option<&'static ExtensionDeclaration>);

    impl ExtensionModule for FakeModule {
        fn declaration(&self) -> std::result::Result<&ExtensionDeclaration, String> {
            self.0
                .ok_or_else(|| "undefined symbol: TOPOPROBE_EXTENSION".to_string())
        }
    }

    fn open_marker(_: &Path) -> anyhow::Result<Arc<dyn ExtensionModule>> {
        Ok(Arc::new(FakeModule(Some(&MARKER))))
    }

    fn open_broken(_: &Path) -> anyhow::Result<Arc<dyn ExtensionModule>> {
        Ok(Arc::new(FakeModule(Some(&BROKEN))))
    }

    fn open_bare(_: &Path) -> anyhow::Result<Arc<dyn ExtensionModule>> {
        Ok(Arc::new(FakeModule(None)))
    }

    fn context() -> Context {
        Context::new(Arc::new(Config::default()), Graph::new(), NodeId::new("host"))
    }

    fn touch_module(dir: &Path, name: &str) {
        let loader = ExtensionLoader::new(dir);
        std::fs::write(loader.module_path(name), b"").unwrap();
    }

    #[test]
    fn test_module_path() {
        let loader = ExtensionLoader::new("/opt/ext");
        let expected = format!("/opt/ext/custom.{}", std::env::consts::DLL_EXTENSION);
        assert_eq!(loader.module_path("custom"), PathBuf::from(expected));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ExtensionLoader::new(dir.path());

        let err = loader.load("custom").unwrap_err();

        assert!(matches!(err, TopoprobeError::ExtensionLoadError { ref name, .. } if name == "custom"));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ExtensionLoader::new(dir.path());
        std::fs::write(loader.module_path("garbage"), b"definitely not an ELF object").unwrap();

        let err = loader.load("garbage").unwrap_err();

        assert!(matches!(err, TopoprobeError::ExtensionLoadError { .. }));
        assert_eq!(err.probe_name(), Some("garbage"));
    }

    #[test]
    fn test_missing_entry_point() {
        let dir = tempfile::tempdir().unwrap();
        touch_module(dir.path(), "bare");
        let loader = ExtensionLoader::new(dir.path()).with_opener(open_bare);

        let err = loader.load("bare").unwrap_err();

        match err {
            TopoprobeError::NonCompliantExtension { name, symbol, reason } => {
                assert_eq!(name, "bare");
                assert_eq!(symbol, ENTRY_SYMBOL);
                assert!(reason.contains("undefined symbol"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_into_bundle() {
        let dir = tempfile::tempdir().unwrap();
        touch_module(dir.path(), "custom");
        let loader = ExtensionLoader::new(dir.path()).with_opener(open_marker);
        let mut bundle = Bundle::new();

        let added = loader.load_into("custom", &context(), &mut bundle).unwrap();

        assert!(added);
        assert!(bundle.is_extension("custom"));
        assert!(bundle.downcast_handler::<Marker>("custom").is_some());
    }

    #[test]
    fn test_constructor_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        touch_module(dir.path(), "contrail");
        let loader = ExtensionLoader::new(dir.path()).with_opener(open_broken);
        let mut bundle = Bundle::new();

        let err = loader
            .load_into("contrail", &context(), &mut bundle)
            .unwrap_err();

        assert!(matches!(err, TopoprobeError::ExtensionConstructionFailed { .. }));
        assert!(err.to_string().contains("controller unreachable"));
        assert!(bundle.is_empty());
    }

    #[test]
    fn test_module_outlives_helper_handlers() {
        let dir = tempfile::tempdir().unwrap();
        touch_module(dir.path(), "sidecar");
        let loader = ExtensionLoader::new(dir.path()).with_opener(open_helper);
        let mut bundle = Bundle::new();

        let added = loader.load_into("sidecar", &context(), &mut bundle).unwrap();

        assert!(!added);
        assert!(bundle.contains("helper"));
        assert!(!bundle.contains("sidecar"));
        assert_eq!(bundle.module_count(), 1);
        assert_eq!(HELPER_UNLOADS.load(Ordering::SeqCst), 0);

        bundle.start().unwrap();
        bundle.stop();
        drop(bundle);

        assert_eq!(HELPER_UNLOADS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_module_kept_after_constructor_error() {
        let dir = tempfile::tempdir().unwrap();
        touch_module(dir.path(), "contrail");
        let loader = ExtensionLoader::new(dir.path()).with_opener(open_tracked_broken);
        let mut bundle = Bundle::new();

        loader
            .load_into("contrail", &context(), &mut bundle)
            .unwrap_err();

        assert_eq!(bundle.module_count(), 1);
        assert_eq!(BROKEN_UNLOADS.load(Ordering::SeqCst), 0);

        drop(bundle);
        assert_eq!(BROKEN_UNLOADS.load(Ordering::SeqCst), 1);
    }
}
