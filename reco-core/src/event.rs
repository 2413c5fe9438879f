//! Generator-level input and event-header entities (`SPEC_FULL.md` §3 "Event header entities",
//! §6 "Input event interface").
//!
//! Building these is the job of the Les Houches / HepMC reader, which is an external
//! collaborator (`SPEC_FULL.md` §1); this module only defines the data the reconstruction core
//! expects to receive, plus the header records that ride along to the output but never
//! participate in the module graph.

use crate::candidate::{FourPosition, FourVector};
use serde::{Deserialize, Serialize};

/// One generator-level particle, as carried in `allParticles`/`LHEParticles`
/// (`SPEC_FULL.md` §3, §6).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenParticle {
    /// Four-momentum.
    pub momentum: FourVector,
    /// Production vertex.
    pub position: FourPosition,
    /// PDG Monte-Carlo id.
    pub pid: i32,
    /// Generator status code (`1` means stable/final-state).
    pub status: i32,
    /// First-mother index into the same event's `all_particles`, or `-1`.
    pub m1: i32,
    /// Second-mother index into the same event's `all_particles`, or `-1`.
    pub m2: i32,
    /// First-daughter index into the same event's `all_particles`, or `-1`.
    pub d1: i32,
    /// Second-daughter index into the same event's `all_particles`, or `-1`.
    pub d2: i32,
    /// Electric charge in units of the elementary charge.
    pub charge: f64,
    /// Spin quantum number carried by the generator (`0.0` if unused).
    pub spin: f64,
    /// Rest mass carried by the generator.
    pub mass: f64,
}

/// A generator-level input event, already split into the arrays the pipeline expects
/// (`SPEC_FULL.md` §6): `all_particles` (everything), and index lists into it for the
/// stable-particle and hard-process-parton subsets, plus an independent matrix-element-level
/// parton list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Sequence number of this event within the run.
    pub number: i64,
    /// Every generator-level particle produced this event.
    pub all_particles: Vec<GenParticle>,
    /// Indices into `all_particles` with `status == 1` (final-state particles).
    pub stable_indices: Vec<usize>,
    /// Indices into `all_particles` identifying the post-shower partons fed to the b-tagger.
    pub parton_indices: Vec<usize>,
    /// Matrix-element-level partons (Les Houches event), independent of `all_particles`.
    pub lhe_particles: Vec<GenParticle>,
    /// Event-header metadata, if the reader attached one.
    pub header: Option<EventHeader>,
}

impl EventRecord {
    /// Basic consistency check used by the pipeline before running any module
    /// (`SPEC_FULL.md` §3 invariant (c), §7 `InputError`): every mother/daughter index must be
    /// `-1` or a valid index into `all_particles`, and no momentum component may be NaN.
    pub fn validate(&self) -> Result<(), String> {
        let n = i64::try_from(self.all_particles.len()).unwrap_or(i64::MAX);
        for (i, p) in self.all_particles.iter().enumerate() {
            for (label, idx) in [("M1", p.m1), ("M2", p.m2), ("D1", p.d1), ("D2", p.d2)] {
                if idx != -1 && (idx < 0 || idx >= n) {
                    return Err(format!(
                        "particle {i}: {label} index {idx} out of range for {n} particles"
                    ));
                }
            }
            let m = p.momentum;
            if [m.e, m.px, m.py, m.pz].iter().any(|x| x.is_nan()) {
                return Err(format!("particle {i}: NaN momentum component"));
            }
        }
        Ok(())
    }
}

/// Header variant attached by the reader: the bare run/event numbering plus whichever
/// generator-specific block (LHEF or HepMC) it produced (`SPEC_FULL.md` §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventHeader {
    /// Les Houches Event Format header.
    Lhef(LhefEventInfo),
    /// HepMC header.
    HepMc(HepMcEventInfo),
}

/// `Event` entity: event number and wall-clock bookkeeping (`SPEC_FULL.md` §3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Sequence number of this event within the run.
    pub number: i64,
    /// Wall-clock time spent reading this event, in seconds.
    pub read_time_s: f64,
    /// Wall-clock time spent processing this event, in seconds.
    pub proc_time_s: f64,
}

/// `LHEFEvent` entity: generator weights, PDFs and scales from a Les Houches event
/// (`SPEC_FULL.md` §3).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LhefEventInfo {
    /// Event weights, one per requested reweighting variant.
    pub weights: Vec<f64>,
    /// Renormalisation/factorisation scale used to generate the event, GeV.
    pub scale: f64,
    /// Strong coupling constant at `scale`.
    pub alpha_qcd: f64,
    /// Electromagnetic coupling constant at `scale`.
    pub alpha_qed: f64,
}

/// `HepMCEvent` entity: generator weights and scale from a HepMC event (`SPEC_FULL.md` §3).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HepMcEventInfo {
    /// Event weights, one per requested reweighting variant.
    pub weights: Vec<f64>,
    /// Event scale, GeV.
    pub scale: f64,
}
