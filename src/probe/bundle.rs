//! Ordered collection of active probe handlers

use crate::extension::ExtensionModule;
use crate::probe::Handler;
use crate::{Result, TopoprobeError};
use anyhow::anyhow;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Entry {
    handler: Box<dyn Handler>,
    extension: bool,
}

/// Probe name -> handler, in insertion order. At most one handler per name.
///
/// Extension modules opened while building the bundle stay loaded until the
/// bundle itself is dropped, whatever their constructor returned: a
/// constructor may leave code behind in handlers it registered under other
/// names.
#[derive(Default)]
pub struct Bundle {
    entries: IndexMap<String, Entry>,
    started: usize,
    // Declared after `entries` so every handler drops before any module.
    modules: Vec<Arc<dyn ExtensionModule>>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler under `name`. Returns false, leaving the bundle
    /// untouched, if the name is already taken.
    pub fn add_handler(&mut self, name: impl Into<String>, handler: Box<dyn Handler>) -> bool {
        self.insert(name.into(), handler, false)
    }

    /// Add a handler built by an extension constructor. The module must
    /// already be held with [`Bundle::retain_module`].
    pub(crate) fn add_extension_handler(
        &mut self,
        name: impl Into<String>,
        handler: Box<dyn Handler>,
    ) -> bool {
        self.insert(name.into(), handler, true)
    }

    /// Keep `module` loaded for the rest of the bundle's life.
    pub(crate) fn retain_module(&mut self, module: Arc<dyn ExtensionModule>) {
        if !self.modules.iter().any(|held| Arc::ptr_eq(held, &module)) {
            self.modules.push(module);
        }
    }

    /// Number of extension modules held loaded by this bundle.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    fn insert(&mut self, name: String, handler: Box<dyn Handler>, extension: bool) -> bool {
        if self.entries.contains_key(&name) {
            debug!("Handler {} already registered, keeping the first one", name);
            return false;
        }
        self.entries.insert(name, Entry { handler, extension });
        true
    }

    pub fn get_handler(&self, name: &str) -> Option<&dyn Handler> {
        self.entries.get(name).map(|e| e.handler.as_ref())
    }

    pub fn get_handler_mut(&mut self, name: &str) -> Option<&mut (dyn Handler + 'static)> {
        self.entries.get_mut(name).map(|e| e.handler.as_mut())
    }

    /// Typed lookup of a prerequisite handler.
    pub fn downcast_handler<T: 'static>(&self, name: &str) -> Option<&T> {
        self.get_handler(name)?.as_any().downcast_ref::<T>()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_extension(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map(|e| e.extension)
            .unwrap_or(false)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Handler)> {
        self.entries
            .iter()
            .map(|(name, e)| (name.as_str(), e.handler.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start every handler in insertion order. On failure the handlers
    /// already started are stopped again, in reverse order.
    pub fn start(&mut self) -> Result<()> {
        while let Some((name, entry)) = self.entries.get_index_mut(self.started) {
            info!("Starting probe {}", name);

            if let Err(source) = entry.handler.start() {
                // The error may have been built by module code; render it
                // while the modules are still loaded.
                let source = if self.modules.is_empty() {
                    source
                } else {
                    anyhow!("{:#}", source)
                };
                let err = TopoprobeError::ProbeStartFailed {
                    name: name.clone(),
                    source,
                };
                warn!("{}", err);
                self.stop();
                return Err(err);
            }
            self.started += 1;
        }
        Ok(())
    }

    /// Stop started handlers in reverse insertion order.
    pub fn stop(&mut self) {
        while self.started > 0 {
            self.started -= 1;
            if let Some((name, entry)) = self.entries.get_index_mut(self.started) {
                info!("Stopping probe {}", name);
                entry.handler.stop();
            }
        }
    }
}

impl std::fmt::Debug for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundle")
            .field("handlers", &self.entries.keys().collect::<Vec<_>>())
            .field("started", &self.started)
            .field("modules", &self.modules.len())
            .finish()
    }
}
