//! Module ordering and lifecycle (`SPEC_FULL.md` §4.2, §5).
//!
//! `Pipeline` owns every long-lived, run-scoped piece of state (the module list, the array
//! registry's declarations, the RNG, the PDG table, the configuration) and the per-event
//! candidate pool. It is deliberately not `Sync`: `SPEC_FULL.md` §5 is explicit that there is no
//! parallelism *across* modules or events.

use crate::arrays::ArrayRegistry;
use crate::candidate::{Candidate, CandidateId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::EventRecord;
use crate::factory::Factory;
use crate::module::{InitContext, Module, ModuleContext};
use crate::pdg::PdgTable;
use crate::rng::RandomService;

const READER_MODULE_NAME: &str = "Reader";
const READER_ARRAYS: [&str; 4] = ["allParticles", "stableParticles", "partons", "LHEParticles"];

/// Outcome of running one event through the pipeline (`SPEC_FULL.md` §7 policy).
#[derive(Debug)]
pub enum EventOutcome {
    /// Every module ran to completion.
    Processed,
    /// The event failed the `EventRecord::validate` consistency check before any module ran.
    InputRejected(String),
    /// A module's `process` raised during this event; `module` names the offending module.
    ModuleFailed {
        /// Name of the module whose `process` call raised.
        module: String,
        /// The error it raised.
        error: Error,
    },
}

/// Events processed / failed / skipped counters, emitted at `Finish` (`SPEC_FULL.md` §7).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Events that ran every module to completion.
    pub processed: u64,
    /// Events whose validation failed before any module ran.
    pub skipped: u64,
    /// Events a module's `process` rejected mid-run.
    pub failed: u64,
}

impl RunStats {
    /// Total number of events the pipeline was asked to process.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.processed + self.skipped + self.failed
    }
}

/// Wires configured modules into a declaration-ordered pipeline and drives them event by event.
pub struct Pipeline {
    modules: Vec<Box<dyn Module>>,
    factory: Factory,
    arrays: ArrayRegistry,
    rng: RandomService,
    pdg: PdgTable,
    config: Config,
    stats: RunStats,
}

impl Pipeline {
    /// Creates a pipeline over `modules`, in the order they should run every event.
    #[must_use]
    pub fn new(modules: Vec<Box<dyn Module>>, config: Config, seed: u64) -> Self {
        Self {
            modules,
            factory: Factory::new(),
            arrays: ArrayRegistry::new(),
            rng: RandomService::new(seed),
            pdg: PdgTable::standard(),
            config,
            stats: RunStats::default(),
        }
    }

    /// Runs every module's `Init` in declaration order (`SPEC_FULL.md` §4.2). The reader's three
    /// (plus optional LHE) input arrays are declared as pre-existing exports first, since they
    /// are populated by `load_event`, not by any configured module.
    pub fn init(&mut self) -> Result<()> {
        for name in READER_ARRAYS {
            self.arrays.declare_export(READER_MODULE_NAME, name)?;
        }
        for module in &mut self.modules {
            let module_config = self.config.module(module.name());
            let mut ctx = InitContext::new(module.name().to_owned(), &mut self.arrays, module_config);
            module.init(&mut ctx)?;
        }
        Ok(())
    }

    /// Loads one generator-level event into the candidate pool and the reader's arrays, then
    /// runs every module's `Process` in declaration order (`SPEC_FULL.md` §5). Returns without
    /// propagating an error in the normal "event skipped" cases of §7; the caller inspects
    /// [`EventOutcome`] and, if it wants to, logs it. Updates the run's [`RunStats`] either way.
    pub fn process_event(&mut self, record: &EventRecord) -> EventOutcome {
        self.factory.clear();
        self.arrays.clear_event();

        if let Err(detail) = record.validate() {
            self.stats.skipped += 1;
            return EventOutcome::InputRejected(detail);
        }

        self.load_event(record);

        for module in &mut self.modules {
            let module_config = self.config.module(module.name());
            let mut ctx = ModuleContext::new(
                &mut self.factory,
                &mut self.arrays,
                &mut self.rng,
                &self.pdg,
                module_config,
            );
            if let Err(error) = module.process(&mut ctx) {
                self.stats.failed += 1;
                return EventOutcome::ModuleFailed {
                    module: module.name().to_owned(),
                    error,
                };
            }
        }

        self.stats.processed += 1;
        EventOutcome::Processed
    }

    fn load_event(&mut self, record: &EventRecord) {
        let all_ids: Vec<CandidateId> = record
            .all_particles
            .iter()
            .map(|p| {
                let id = self.factory.new_candidate();
                *self.factory.get_mut(id) = Candidate {
                    momentum: p.momentum,
                    position: p.position,
                    pid: p.pid,
                    status: p.status,
                    m1: p.m1,
                    m2: p.m2,
                    d1: p.d1,
                    d2: p.d2,
                    charge: p.charge,
                    spin: p.spin,
                    mass: p.mass,
                    ..Candidate::default()
                };
                id
            })
            .collect();

        let stable_ids: Vec<CandidateId> = record.stable_indices.iter().map(|&i| all_ids[i]).collect();
        let parton_ids: Vec<CandidateId> = record.parton_indices.iter().map(|&i| all_ids[i]).collect();

        let lhe_ids: Vec<CandidateId> = record
            .lhe_particles
            .iter()
            .map(|p| {
                let id = self.factory.new_candidate();
                *self.factory.get_mut(id) = Candidate {
                    momentum: p.momentum,
                    position: p.position,
                    pid: p.pid,
                    status: p.status,
                    m1: p.m1,
                    m2: p.m2,
                    d1: p.d1,
                    d2: p.d2,
                    charge: p.charge,
                    spin: p.spin,
                    mass: p.mass,
                    ..Candidate::default()
                };
                id
            })
            .collect();

        self.arrays.export("allParticles", all_ids);
        self.arrays.export("stableParticles", stable_ids);
        self.arrays.export("partons", parton_ids);
        self.arrays.export("LHEParticles", lhe_ids);
    }

    /// Runs every module's `Finish` in reverse declaration order and returns the run's summary
    /// (`SPEC_FULL.md` §4.2, §7).
    pub fn finish(&mut self) -> Result<RunStats> {
        for module in self.modules.iter_mut().rev() {
            module.finish()?;
        }
        Ok(self.stats)
    }

    /// Read-only access to this event's candidate pool, e.g. for a writer module
    /// (`SPEC_FULL.md` §4.6 TreeWriter) to resolve array contents into full `Candidate` values.
    #[must_use]
    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// Read-only access to the named-array registry, for the same purpose as
    /// [`Pipeline::factory`].
    #[must_use]
    pub fn arrays(&self) -> &ArrayRegistry {
        &self.arrays
    }

    /// The run's counters so far.
    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.stats
    }
}
