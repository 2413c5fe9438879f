//! Jet-clustering capability interface (`SPEC_FULL.md` §4.4 "Clustering capability", design note
//! §9 "External clustering library").
//!
//! The real system leans on a third-party sequential-recombination library; here that is a
//! narrow `ClusterEngine` trait any implementation can satisfy, plus one in-tree backend,
//! `NativeClusterEngine`, covering the generalised-kt family (anti-kt, kt, Cambridge/Aachen) with
//! one distance-exponent parameter.

use crate::candidate::{delta_phi, FourVector};
use serde::{Deserialize, Serialize};

/// Jet algorithm requested by configuration. `JetClu`/`MidPoint`/`SisCone` are cone algorithms
/// outside the sequential-recombination family `NativeClusterEngine` implements; they are
/// accepted as configuration values and silently treated as `AntiKt` (`SPEC_FULL.md` §4.4).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum JetAlgorithm {
    /// Cone algorithm, falls back to anti-kt on this backend.
    JetClu,
    /// Cone algorithm, falls back to anti-kt on this backend.
    MidPoint,
    /// Cone algorithm, falls back to anti-kt on this backend.
    SisCone,
    /// Generalised-kt with exponent `p = 1`.
    Kt,
    /// Generalised-kt with exponent `p = 0`.
    CambridgeAachen,
    /// Generalised-kt with exponent `p = -1`. Default.
    AntiKt,
}

impl JetAlgorithm {
    /// The generalised-kt distance exponent this algorithm corresponds to on this backend.
    #[must_use]
    pub fn exponent(self) -> f64 {
        match self {
            Self::Kt => 1.0,
            Self::CambridgeAachen => 0.0,
            Self::AntiKt | Self::JetClu | Self::MidPoint | Self::SisCone => -1.0,
        }
    }
}

/// Area-estimation scheme requested by configuration (`SPEC_FULL.md` §4.4). `NativeClusterEngine`
/// does not sample ghosts; any variant other than `None` yields the flat `pi * R^2` approximation
/// documented in `DESIGN.md`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AreaDefinition {
    /// No area is computed; jets carry a zero area four-vector.
    None,
    /// Active area with explicit ghosts.
    ActiveExplicitGhosts,
    /// One-pass passive-ghost area.
    OnePassivePassiveGhost,
    /// Passive area.
    Passive,
    /// Voronoi area.
    Voronoi,
    /// Active area.
    Active,
}

/// One clustered jet: its summed four-momentum, area (zero unless an area definition was
/// configured), and the indices into the engine's input slice that ended up inside it.
#[derive(Clone, Debug)]
pub struct ClusteredJet {
    /// Summed four-momentum of the jet's constituents.
    pub momentum: FourVector,
    /// Jet area four-vector; zero if no [`AreaDefinition`] other than `None` was requested.
    pub area: FourVector,
    /// Indices into the engine's `inputs` slice identifying this jet's constituents.
    pub constituents: Vec<usize>,
}

/// Capability interface standing in for an external jet-clustering library
/// (`SPEC_FULL.md` §4.4, §9). Any conforming implementation — including an FFI binding to a
/// third-party tool — may be substituted without changing the jet finder.
pub trait ClusterEngine {
    /// Clusters `inputs` (already filtered and pT-ordered by the caller) with `algo` at radius
    /// `r`, returning inclusive jets in no particular order. Callers apply the pT-min cut and
    /// sort descending by pT themselves (`SPEC_FULL.md` §4.4 step 2).
    fn cluster(&self, inputs: &[FourVector], algo: JetAlgorithm, r: f64, area_def: AreaDefinition) -> Vec<ClusteredJet>;
}

/// In-tree generalised sequential-recombination backend (`SPEC_FULL.md` §4.4).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeClusterEngine;

impl NativeClusterEngine {
    /// Creates a new engine. Stateless: every call to `cluster` is independent.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

struct PartialJet {
    momentum: FourVector,
    constituents: Vec<usize>,
}

/// Runs the generalised-kt sequential recombination with distance exponent `p` at radius `r`
/// (`SPEC_FULL.md` §4.4): pairwise `O(n^2)` distance search per merge, `O(n^3)` total — adequate
/// for the object multiplicities the calorimeter stage produces.
fn cluster_sequential(inputs: &[FourVector], p: f64, r: f64) -> Vec<PartialJet> {
    let mut active: Vec<PartialJet> = inputs
        .iter()
        .enumerate()
        .map(|(i, v)| PartialJet {
            momentum: *v,
            constituents: vec![i],
        })
        .collect();
    let mut jets = Vec::new();

    while !active.is_empty() {
        if active.len() == 1 {
            jets.push(active.pop().unwrap());
            break;
        }

        let mut best_dib = (f64::INFINITY, 0usize);
        for (i, jet) in active.iter().enumerate() {
            let di_b = jet.momentum.pt().powf(2.0 * p);
            if di_b < best_dib.0 {
                best_dib = (di_b, i);
            }
        }

        let mut best_dij = (f64::INFINITY, 0usize, 0usize);
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                let a = &active[i].momentum;
                let b = &active[j].momentum;
                let deta = a.eta() - b.eta();
                let dphi = delta_phi(a.phi(), b.phi());
                let dr2 = deta.mul_add(deta, dphi * dphi);
                let dij = a.pt().powf(2.0 * p).min(b.pt().powf(2.0 * p)) * dr2 / (r * r);
                if dij < best_dij.0 {
                    best_dij = (dij, i, j);
                }
            }
        }

        if best_dib.0 <= best_dij.0 {
            jets.push(active.remove(best_dib.1));
        } else {
            let (i, j) = (best_dij.1, best_dij.2);
            let b = active.remove(j);
            let a = active.remove(i);
            let mut constituents = a.constituents;
            constituents.extend(b.constituents);
            active.push(PartialJet {
                momentum: a.momentum + b.momentum,
                constituents,
            });
        }
    }

    jets
}

impl ClusterEngine for NativeClusterEngine {
    fn cluster(&self, inputs: &[FourVector], algo: JetAlgorithm, r: f64, area_def: AreaDefinition) -> Vec<ClusteredJet> {
        let area = if matches!(area_def, AreaDefinition::None) {
            FourVector::default()
        } else {
            FourVector::new(std::f64::consts::PI * r * r, 0.0, 0.0, 0.0)
        };
        cluster_sequential(inputs, algo.exponent(), r)
            .into_iter()
            .map(|jet| ClusteredJet {
                momentum: jet.momentum,
                area,
                constituents: jet.constituents,
            })
            .collect()
    }
}
