//! Jet finding and substructure (`SPEC_FULL.md` §4.4).
//!
//! Delegates the actual clustering to a [`crate::clustering::ClusterEngine`]; this module owns
//! everything downstream of "I have a list of jets": rho estimation, constituent bookkeeping,
//! trimming and N-subjettiness.

use crate::candidate::{delta_phi, delta_r, Candidate, CandidateFlags, CandidateId, FourVector, Substructure, SubstructureMass};
use crate::clustering::{AreaDefinition, ClusterEngine, ClusteredJet, JetAlgorithm, NativeClusterEngine};
use crate::error::Result;
use crate::module::{InitContext, Module, ModuleContext};

const TRIM_R: f64 = 0.2;
const TRIM_PT_FRAC: f64 = 0.05;
const NSUBJETTINESS_BETA: f64 = 1.0;
const NSUBJETTINESS_R0: f64 = 0.8;
const SUBSTRUCTURE_PT_THRESHOLD: f64 = 200.0;

fn parse_algorithm(name: &str) -> JetAlgorithm {
    match name {
        "JetClu" => JetAlgorithm::JetClu,
        "MidPoint" => JetAlgorithm::MidPoint,
        "SisCone" => JetAlgorithm::SisCone,
        "Kt" => JetAlgorithm::Kt,
        "CambridgeAachen" => JetAlgorithm::CambridgeAachen,
        _ => JetAlgorithm::AntiKt,
    }
}

fn parse_area_definition(name: &str) -> AreaDefinition {
    match name {
        "ActiveExplicitGhosts" => AreaDefinition::ActiveExplicitGhosts,
        "OnePassivePassiveGhost" => AreaDefinition::OnePassivePassiveGhost,
        "Passive" => AreaDefinition::Passive,
        "Voronoi" => AreaDefinition::Voronoi,
        "Active" => AreaDefinition::Active,
        _ => AreaDefinition::None,
    }
}

/// Exclusive generalised-kt clustering (`p = 1`) stopped once `n` clusters remain, used to pick
/// N-subjettiness axes. If `constituents.len() <= n`, returns the constituents unchanged — every
/// particle is its own axis, which correctly drives τ_N to zero for that particle.
fn exclusive_kt_axes(constituents: &[FourVector], n: usize) -> Vec<FourVector> {
    if constituents.len() <= n {
        return constituents.to_vec();
    }
    let mut active = constituents.to_vec();
    while active.len() > n {
        let mut best = (f64::INFINITY, 0usize, 1usize);
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                let a = &active[i];
                let b = &active[j];
                let deta = a.eta() - b.eta();
                let dphi = delta_phi(a.phi(), b.phi());
                let dr2 = deta.mul_add(deta, dphi * dphi);
                let dij = a.pt().min(b.pt()).powi(2) * dr2;
                if dij < best.0 {
                    best = (dij, i, j);
                }
            }
        }
        let b = active.remove(best.2);
        let a = active.remove(best.1);
        active.push(a + b);
    }
    active
}

/// `tau_N = sum_k(pt_k * min_i deltaR(k, axis_i)^beta) / (sum_k(pt_k) * R0^beta)`.
fn n_subjettiness(constituents: &[FourVector], n: usize) -> f64 {
    let axes = exclusive_kt_axes(constituents, n);
    let total_pt: f64 = constituents.iter().map(FourVector::pt).sum();
    if total_pt <= 0.0 {
        return 0.0;
    }
    let d0 = total_pt * NSUBJETTINESS_R0.powf(NSUBJETTINESS_BETA);
    let numerator: f64 = constituents
        .iter()
        .map(|c| {
            let min_dr = axes
                .iter()
                .map(|axis| delta_r(c.eta(), c.phi(), axis.eta(), axis.phi()))
                .fold(f64::INFINITY, f64::min);
            c.pt() * min_dr.powf(NSUBJETTINESS_BETA)
        })
        .sum();
    numerator / d0
}

/// Trims a jet's constituents (`SPEC_FULL.md` §4.4 step 5): recluster with Cambridge/Aachen at
/// `TRIM_R`, drop subjets below `TRIM_PT_FRAC` of the original jet's pT.
fn trim(jet_pt: f64, constituents: &[FourVector]) -> SubstructureMass {
    let mut subjets = cluster_sequential_ca(constituents, TRIM_R);
    subjets.sort_by(|a, b| b.pt().total_cmp(&a.pt()));
    let threshold = TRIM_PT_FRAC * jet_pt;
    let surviving: Vec<FourVector> = subjets.into_iter().filter(|s| s.pt() > threshold).collect();

    let summed = surviving.iter().fold(FourVector::default(), |acc, s| acc + *s);
    let mass = summed.mass().max(0.0);
    let mut slots = [FourVector::default(); 3];
    for (slot, subjet) in slots.iter_mut().zip(surviving.iter()) {
        *slot = *subjet;
    }
    SubstructureMass {
        mass,
        subjet_count: u8::try_from(surviving.len().min(255)).unwrap_or(255),
        subjets: slots,
    }
}

/// Inclusive Cambridge/Aachen (`p = 0`) clustering used only by [`trim`]; unlike
/// [`crate::clustering::NativeClusterEngine`] this never needs area or an engine trait object, so
/// it is kept local and simple.
fn cluster_sequential_ca(constituents: &[FourVector], r: f64) -> Vec<FourVector> {
    let mut active = constituents.to_vec();
    let mut jets = Vec::new();
    while !active.is_empty() {
        if active.len() == 1 {
            jets.push(active.pop().unwrap());
            break;
        }
        let mut best = (f64::INFINITY, 0usize, 1usize);
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                let a = &active[i];
                let b = &active[j];
                let deta = a.eta() - b.eta();
                let dphi = delta_phi(a.phi(), b.phi());
                let dr2 = deta.mul_add(deta, dphi * dphi);
                let dij = dr2 / (r * r);
                if dij < best.0 {
                    best = (dij, i, j);
                }
            }
        }
        // Cambridge/Aachen has no beam distance: the closest pair always merges.
        let b = active.remove(best.2);
        let a = active.remove(best.1);
        active.push(a + b);
    }
    jets
}

fn substructure_for(jet_pt: f64, constituents: &[FourVector]) -> Substructure {
    if jet_pt <= SUBSTRUCTURE_PT_THRESHOLD {
        return Substructure::default();
    }
    let trimmed = trim(jet_pt, constituents);
    let largest_mass = trimmed.subjets[0].mass();
    let mass_drop = if trimmed.mass > 0.0 { largest_mass / trimmed.mass } else { 1.0 };
    Substructure {
        tau1: n_subjettiness(constituents, 1),
        tau2: n_subjettiness(constituents, 2),
        tau3: n_subjettiness(constituents, 3),
        trimmed,
        mass_drop,
        w_tag: mass_drop < 0.4 && trimmed.mass > 60.0 && trimmed.mass < 120.0,
        top_tag: trimmed.subjet_count >= 3 && trimmed.mass > 140.0 && trimmed.mass < 230.0,
        h_tag: mass_drop < 0.4 && trimmed.mass > 100.0 && trimmed.mass < 140.0,
        ..Substructure::default()
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}

/// Clusters candidate objects into jets and derives substructure (`SPEC_FULL.md` §4.4).
pub struct JetFinder {
    input_array: String,
    algorithm: JetAlgorithm,
    radius: f64,
    pt_min: f64,
    keep_pile_up: bool,
    area_def: AreaDefinition,
    rho_eta_ranges: Vec<(f64, f64)>,
    engine: Box<dyn ClusterEngine + Send + Sync>,
}

impl Default for JetFinder {
    fn default() -> Self {
        Self {
            input_array: "eflowTowers".to_owned(),
            algorithm: JetAlgorithm::AntiKt,
            radius: 0.5,
            pt_min: 20.0,
            keep_pile_up: true,
            area_def: AreaDefinition::None,
            rho_eta_ranges: Vec::new(),
            engine: Box::new(NativeClusterEngine::new()),
        }
    }
}

impl JetFinder {
    /// Creates a jet finder with the built-in default parameters and the native clustering
    /// backend; `init` overrides these from configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for JetFinder {
    fn name(&self) -> &str {
        "JetFinder"
    }

    fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        self.input_array = ctx.get_string("JetInputArray", "eflowTowers");
        ctx.import_array(&self.input_array)?;
        ctx.export_array("jets")?;
        ctx.export_array("rho")?;

        self.algorithm = parse_algorithm(&ctx.get_string("JetAlgorithm", "AntiKt"));
        self.radius = ctx.get_double("ParameterR", 0.5);
        self.pt_min = ctx.get_double("JetPTMin", 20.0);
        self.keep_pile_up = ctx.get_bool("KeepPileUp", true);
        self.area_def = parse_area_definition(&ctx.get_string("AreaDefinition", "None"));
        self.rho_eta_ranges = ctx
            .get_param("RhoEtaRange")
            .into_iter()
            .filter_map(|row| match row.as_slice() {
                [lo, hi] => Some((*lo, *hi)),
                _ => None,
            })
            .collect();
        Ok(())
    }

    fn process(&mut self, ctx: &mut ModuleContext) -> Result<()> {
        let input_ids: Vec<CandidateId> = ctx.import_array(&self.input_array).to_vec();

        let filtered: Vec<CandidateId> = input_ids
            .into_iter()
            .filter(|&id| self.keep_pile_up || !ctx.factory.get(id).flags.contains(CandidateFlags::IS_PU))
            .collect();
        let momenta: Vec<FourVector> = filtered.iter().map(|&id| ctx.factory.get(id).momentum).collect();

        let mut clustered: Vec<ClusteredJet> = self.engine.cluster(&momenta, self.algorithm, self.radius, self.area_def);
        clustered.retain(|jet| jet.momentum.pt() > self.pt_min);
        clustered.sort_by(|a, b| b.momentum.pt().total_cmp(&a.momentum.pt()));

        let mut rho_ids = Vec::with_capacity(self.rho_eta_ranges.len());
        for &(eta_lo, eta_hi) in &self.rho_eta_ranges {
            let mut densities: Vec<f64> = clustered
                .iter()
                .filter(|j| j.momentum.eta() >= eta_lo && j.momentum.eta() < eta_hi)
                .map(|j| if j.area.e > 0.0 { j.momentum.pt() / j.area.e } else { 0.0 })
                .collect();
            let rho_value = median(&mut densities);
            let id = ctx.factory.new_candidate();
            *ctx.factory.get_mut(id) = Candidate {
                momentum: FourVector::new(rho_value, 0.0, 0.0, 0.0),
                tower_edges: [eta_lo, eta_hi, 0.0, 0.0],
                ..Candidate::default()
            };
            rho_ids.push(id);
        }

        let mut jet_ids = Vec::with_capacity(clustered.len());
        for jet in &clustered {
            let constituent_momenta: Vec<FourVector> =
                jet.constituents.iter().map(|&i| ctx.factory.get(filtered[i]).momentum).collect();

            let eta_j = jet.momentum.eta();
            let phi_j = jet.momentum.phi();
            let (delta_eta, delta_phi_max) = constituent_momenta.iter().fold((0.0_f64, 0.0_f64), |(de, dp), c| {
                (de.max((c.eta() - eta_j).abs()), dp.max(delta_phi(c.phi(), phi_j)))
            });

            let jet_id = ctx.factory.new_candidate();
            let composition: Vec<CandidateId> = jet.constituents.iter().map(|&i| filtered[i]).collect();
            *ctx.factory.get_mut(jet_id) = Candidate {
                momentum: jet.momentum,
                area: jet.area,
                composition,
                delta_eta,
                delta_phi: delta_phi_max,
                substructure: substructure_for(jet.momentum.pt(), &constituent_momenta),
                ..Candidate::default()
            };
            jet_ids.push(jet_id);
        }

        ctx.export_array("jets", jet_ids);
        ctx.export_array("rho", rho_ids);
        Ok(())
    }
}
