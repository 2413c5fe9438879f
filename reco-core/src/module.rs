//! The `Module` lifecycle contract (`SPEC_FULL.md` §4.2).
//!
//! A module never calls another module directly; it only reads and writes named arrays through
//! the context it is handed. `InitContext` is used once per module at start-up to declare which
//! arrays it exports/imports (fatal-on-error, per §7); `ModuleContext` is used once per module
//! per event to do the actual work.

use crate::arrays::ArrayRegistry;
use crate::candidate::CandidateId;
use crate::config::ModuleConfig;
use crate::error::Result;
use crate::factory::Factory;
use crate::pdg::PdgTable;
use crate::rng::RandomService;

/// Context handed to [`Module::init`].
pub struct InitContext<'a> {
    name: String,
    registry: &'a mut ArrayRegistry,
    config: ModuleConfig,
}

impl<'a> InitContext<'a> {
    pub(crate) fn new(name: String, registry: &'a mut ArrayRegistry, config: ModuleConfig) -> Self {
        Self {
            name,
            registry,
            config,
        }
    }

    /// Declares that this module exports `name`. Fatal at `Init` if another module already
    /// declared it.
    pub fn export_array(&mut self, name: &str) -> Result<()> {
        self.registry.declare_export(&self.name, name)
    }

    /// Declares that this module imports `name`, resolved lazily against the exports declared by
    /// modules that ran `Init` earlier. Fatal at `Init` if unresolved.
    pub fn import_array(&mut self, name: &str) -> Result<()> {
        self.registry.declare_import(&self.name, name)
    }

    /// Reads an integer parameter with a default.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.config.get_int(key, default)
    }

    /// Reads a floating-point parameter with a default.
    #[must_use]
    pub fn get_double(&self, key: &str, default: f64) -> f64 {
        self.config.get_double(key, default)
    }

    /// Reads a boolean parameter with a default.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.config.get_bool(key, default)
    }

    /// Reads a string parameter with a default.
    #[must_use]
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.config.get_string(key, default)
    }

    /// Reads a required string parameter.
    pub fn require_string(&self, key: &str) -> Result<String> {
        self.config.require_string(key)
    }

    /// Reads a ragged nested list of floats.
    #[must_use]
    pub fn get_param(&self, key: &str) -> Vec<Vec<f64>> {
        self.config.get_param(key)
    }
}

/// Context handed to [`Module::process`] once per event.
pub struct ModuleContext<'a> {
    /// The current event's candidate pool.
    pub factory: &'a mut Factory,
    /// Seeded random-number service, shared by every module in declaration order.
    pub rng: &'a mut RandomService,
    /// Read-only particle-property table.
    pub pdg: &'a PdgTable,
    arrays: &'a mut ArrayRegistry,
    config: ModuleConfig,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(
        factory: &'a mut Factory,
        arrays: &'a mut ArrayRegistry,
        rng: &'a mut RandomService,
        pdg: &'a PdgTable,
        config: ModuleConfig,
    ) -> Self {
        Self {
            factory,
            rng,
            pdg,
            arrays,
            config,
        }
    }

    /// Borrows the current contents of the named array.
    #[must_use]
    pub fn import_array(&self, name: &str) -> &[CandidateId] {
        self.arrays.import(name)
    }

    /// Replaces the contents of a previously declared export with `ids`.
    pub fn export_array(&mut self, name: &str, ids: Vec<CandidateId>) {
        self.arrays.export(name, ids);
    }

    /// Reads an integer parameter with a default.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.config.get_int(key, default)
    }

    /// Reads a floating-point parameter with a default.
    #[must_use]
    pub fn get_double(&self, key: &str, default: f64) -> f64 {
        self.config.get_double(key, default)
    }

    /// Reads a boolean parameter with a default.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.config.get_bool(key, default)
    }

    /// Reads a string parameter with a default.
    #[must_use]
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.config.get_string(key, default)
    }

    /// Reads a ragged nested list of floats.
    #[must_use]
    pub fn get_param(&self, key: &str) -> Vec<Vec<f64>> {
        self.config.get_param(key)
    }
}

/// A configurable processing stage (`SPEC_FULL.md` §4.2).
pub trait Module {
    /// Name used for array-declaration diagnostics and to look up this module's configuration
    /// block.
    fn name(&self) -> &str;

    /// Declares imports/exports and reads configuration. Called once, in pipeline declaration
    /// order, before any event is processed. Errors here are fatal to the run.
    fn init(&mut self, ctx: &mut InitContext) -> Result<()>;

    /// Does this module's work for the current event. Called once per event, in the same
    /// declaration order as `init`. Errors here cause the event to be skipped.
    fn process(&mut self, ctx: &mut ModuleContext) -> Result<()>;

    /// Runs once at shutdown, in reverse declaration order. The default implementation does
    /// nothing; most modules have no run-level teardown.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
