//! Assembles the standard reconstruction chain (`SPEC_FULL.md` §2 "Data flow").
//!
//! The CLI always runs the same declaration order; which stages actually do anything for a given
//! run is controlled entirely through the YAML configuration (e.g. `PileUpMerger.MeanPileUp: 0`
//! leaves pile-up disabled, as it already is by default).

use reco_core::btagger::BTagger;
use reco_core::calorimeter::Calorimeter;
use reco_core::io::{EventSink, TreeWriter};
use reco_core::jetfinder::JetFinder;
use reco_core::module::Module;
use reco_core::modules::{Isolation, MissingEt, PileUpMerger, ParticlePropagator, ScalarHt};

/// Builds the module list `reco` drives every run through: overlay pile-up, propagate tracks,
/// segment the calorimeter, cluster jets, tag flavour, isolate photons, sum missing/scalar ET, and
/// finally snapshot the requested branches to `sink`.
///
/// `PileUpMerger` must run before `ParticlePropagator`: it adds the overlaid particles to the
/// event's particle pool, and only the propagator turns pool particles into `chargedHadrons`
/// tracks. Declaring them the other way round would silently drop every pile-up track from
/// `eflowTracks`, along with everything downstream that depends on it (tower suppression, track
/// isolation, MET).
pub fn standard_modules(
    branches: Vec<String>,
    sink: Box<dyn EventSink + Send + Sync>,
) -> Vec<Box<dyn Module>> {
    vec![
        Box::new(PileUpMerger::default()),
        Box::new(ParticlePropagator::new()),
        Box::new(Calorimeter::new()),
        Box::new(JetFinder::new()),
        Box::new(BTagger::new()),
        Box::new(Isolation::new()),
        Box::new(MissingEt::new()),
        Box::new(ScalarHt::new()),
        Box::new(TreeWriter::new(branches, sink)),
    ]
}
