#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

//! Core of a fast detector-response simulator for collider physics.
//!
//! This crate owns the reconstruction pipeline: a per-event candidate pool (`factory`), a
//! module execution framework driven by named object arrays (`module`, `pipeline`), and the
//! physics stages that populate those arrays (`calorimeter`, `jetfinder`, `btagger`, and the
//! glue modules under `modules`). Event I/O, the parton-shower generator, and the PDG database
//! are treated as external collaborators and are represented here by narrow traits with minimal
//! built-in implementations (`io`, `pdg`).

pub mod arrays;
pub mod btagger;
pub mod calorimeter;
pub mod candidate;
pub mod clustering;
pub mod config;
pub mod error;
pub mod event;
pub mod factory;
pub mod io;
pub mod jetfinder;
pub mod module;
pub mod modules;
pub mod pdg;
pub mod pipeline;
pub mod rng;

pub use error::{Error, Result};
