//! Named-array registry connecting modules (`SPEC_FULL.md` §3 "Named arrays", §6 "Named-array
//! registry").
//!
//! Two concerns are kept in one small struct because they share a name: *declaration* (which
//! module exports which name, checked once at `Init`, fatal on mismatch) and *content* (the
//! ordered list of [`CandidateId`]s a module actually produced this event, replaced every
//! `Process`).

use crate::candidate::CandidateId;
use crate::error::{Error, Result};
use rustc_hash::FxHashMap;

/// Registry of named object arrays shared by every module in a [`crate::pipeline::Pipeline`].
#[derive(Debug, Default)]
pub struct ArrayRegistry {
    /// Module that declared each array name as an export, used only for duplicate-export and
    /// unresolved-import diagnostics.
    declared_by: FxHashMap<String, String>,
    /// Current event's contents, keyed by array name.
    arrays: FxHashMap<String, Vec<CandidateId>>,
}

impl ArrayRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that `module` will export `name`. Fatal (`Error::Config`) if another module
    /// already declared the same name — array export is exactly one module per name
    /// (`SPEC_FULL.md` §3).
    pub fn declare_export(&mut self, module: &str, name: &str) -> Result<()> {
        if let Some(owner) = self.declared_by.get(name) {
            return Err(Error::Config {
                module: module.to_owned(),
                detail: format!("array '{name}' is already exported by module '{owner}'"),
            });
        }
        self.declared_by.insert(name.to_owned(), module.to_owned());
        self.arrays.insert(name.to_owned(), Vec::new());
        Ok(())
    }

    /// Resolves `module`'s import of `name` against the exports declared so far. Fatal
    /// (`Error::Resolve`) if no module has declared `name` as an export
    /// (`SPEC_FULL.md` §6, §7). Resolution only inspects declarations made by modules earlier in
    /// the pipeline, matching the declaration-order execution guarantee of §5.
    pub fn declare_import(&self, module: &str, name: &str) -> Result<()> {
        if self.declared_by.contains_key(name) {
            Ok(())
        } else {
            Err(Error::Resolve {
                module: module.to_owned(),
                array: name.to_owned(),
            })
        }
    }

    /// Replaces the contents of `name` with `ids` for the current event. The name must already
    /// be declared; callers reach this exclusively through
    /// [`crate::module::ModuleContext::export_array`], which enforces that by construction.
    pub fn export(&mut self, name: &str, ids: Vec<CandidateId>) {
        self.arrays.insert(name.to_owned(), ids);
    }

    /// Borrows the current event's contents of `name`, or an empty slice if the array has not
    /// been populated yet this event.
    #[must_use]
    pub fn import(&self, name: &str) -> &[CandidateId] {
        self.arrays.get(name).map_or(&[], Vec::as_slice)
    }

    /// Clears every array's per-event *contents*. Declarations (which module owns which name)
    /// persist for the lifetime of the run.
    pub fn clear_event(&mut self) {
        for array in self.arrays.values_mut() {
            array.clear();
        }
    }
}
