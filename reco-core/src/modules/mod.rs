//! Glue modules (`SPEC_FULL.md` §4.6, component C6): fully specified `Module` implementations that
//! round out the pipeline around the three "hard core" stages (`calorimeter`, `jetfinder`,
//! `btagger`).

pub mod isolation;
pub mod met;
pub mod pileup;
pub mod propagator;

pub use isolation::Isolation;
pub use met::{MissingEt, ScalarHt};
pub use pileup::{LibraryPileUpSource, PileUpMerger, PileUpSource};
pub use propagator::ParticlePropagator;
