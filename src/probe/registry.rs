//! Name -> constructor table for built-in probes

use crate::probe::{BuiltinProbe, Bundle, Constructor, Context, Handler};
use crate::{Result, TopoprobeError};
use indexmap::IndexMap;
use tracing::debug;

/// Closed dispatch table, fixed once built.
///
/// Constructors receive the in-progress bundle so a probe can look up a
/// prerequisite registered before it; ordering is the assembler's concern.
#[derive(Clone)]
pub struct HandlerRegistry {
    table: IndexMap<&'static str, Constructor>,
}

impl HandlerRegistry {
    /// Registry of every probe compiled into this crate.
    pub fn builtin() -> Self {
        Self::from_entries(
            BuiltinProbe::ALL
                .iter()
                .map(|probe| (probe.as_str(), probe.constructor())),
        )
    }

    /// Build a registry from explicit entries. On duplicate names the first
    /// entry wins.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Constructor)>,
    {
        let mut table = IndexMap::new();
        for (name, constructor) in entries {
            table.entry(name).or_insert(constructor);
        }
        Self { table }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.table.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn constructor(&self, name: &str) -> Result<Constructor> {
        self.table
            .get(name)
            .copied()
            .ok_or_else(|| TopoprobeError::UnsupportedProbe(name.to_string()))
    }

    /// Instantiate the built-in probe `name`.
    pub fn construct(
        &self,
        name: &str,
        ctx: &Context,
        bundle: &mut Bundle,
    ) -> Result<Option<Box<dyn Handler>>> {
        let constructor = self.constructor(name)?;

        debug!("Instantiating probe {}", name);
        constructor(ctx, bundle).map_err(|source| TopoprobeError::ProbeConstructionFailed {
            name: name.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.table.keys()).finish()
    }
}
