//! Parton matching and flavour assignment (`SPEC_FULL.md` §4.5).
//!
//! Mother/daughter fields on a post-shower `Candidate` are positional indices into the
//! `allParticles` array (copied verbatim from the generator record, `SPEC_FULL.md` §3 invariant
//! (c)); resolving them means indexing into the `allParticles` export, not the factory pool
//! directly.

use crate::candidate::{delta_r, Candidate, CandidateId, FlavourVariant, FLAVOUR_VARIANT_COUNT};
use crate::error::Result;
use crate::module::{InitContext, Module, ModuleContext};
use rustc_hash::FxHashMap;

const LHE_DEDUP_DELTA_R: f64 = 0.001;
const CONTAMINATION_DELTA_R: f64 = 0.7;

/// A per-flavour b-tagging efficiency, evaluated at a jet's `(pT, |eta|)` (`SPEC_FULL.md` §4.5).
/// Deliberately a small closed type rather than a general expression parser: the configuration
/// only ever needs a flat value or a step function in pT.
#[derive(Clone, Debug)]
pub enum EffFormula {
    /// Flat efficiency regardless of kinematics.
    Constant(f64),
    /// Ascending `(pt_upper_bound, efficiency)` steps; `|eta|` is accepted for interface symmetry
    /// with other per-kinematics formulas but unused by this variant. pT above the last bound
    /// uses the last entry's efficiency.
    PiecewiseInPt(Vec<(f64, f64)>),
}

impl EffFormula {
    fn eval(&self, pt: f64) -> f64 {
        match self {
            Self::Constant(eff) => *eff,
            Self::PiecewiseInPt(rows) => rows
                .iter()
                .find(|(bound, _)| pt <= *bound)
                .or_else(|| rows.last())
                .map_or(0.0, |(_, eff)| *eff),
        }
    }
}

fn parse_formula(rows: &[Vec<f64>]) -> Option<EffFormula> {
    match rows {
        [] => None,
        [single] if single.len() == 1 => Some(EffFormula::Constant(single[0])),
        rows => {
            let steps: Vec<(f64, f64)> = rows
                .iter()
                .filter_map(|r| match r.as_slice() {
                    [bound, eff] => Some((*bound, *eff)),
                    _ => None,
                })
                .collect();
            if steps.is_empty() {
                None
            } else {
                Some(EffFormula::PiecewiseInPt(steps))
            }
        }
    }
}

struct Parton {
    pid: i32,
    pt: f64,
    dr_to_jet: f64,
}

/// Flavour classification and b-tagging (`SPEC_FULL.md` §4.5).
pub struct BTagger {
    pt_min: f64,
    eta_max: f64,
    delta_r_max: f64,
    formulas: FxHashMap<i32, EffFormula>,
}

impl Default for BTagger {
    fn default() -> Self {
        Self {
            pt_min: 1.0,
            eta_max: 2.5,
            delta_r_max: 0.5,
            formulas: FxHashMap::default(),
        }
    }
}

impl BTagger {
    /// Creates a b-tagger with spec defaults; `init` overrides from configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn formula_for(&self, flavour: i32) -> Option<&EffFormula> {
        self.formulas.get(&flavour).or_else(|| self.formulas.get(&0))
    }

    fn is_quark_or_gluon_pid(pid: i32) -> bool {
        (1..=5).contains(&pid.abs()) || pid == 21
    }
}

impl Module for BTagger {
    fn name(&self) -> &str {
        "BTagger"
    }

    fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        ctx.import_array("allParticles")?;
        ctx.import_array("partons")?;
        ctx.import_array("LHEParticles")?;
        ctx.import_array("jets")?;

        self.pt_min = ctx.get_double("PartonPTMin", 1.0);
        self.eta_max = ctx.get_double("PartonEtaMax", 2.5);
        self.delta_r_max = ctx.get_double("DeltaR", 0.5);

        for flavour in [0, 1, 2, 3, 4, 5, 21] {
            let key = format!("EffFormula{flavour}");
            if let Some(formula) = parse_formula(&ctx.get_param(&key)) {
                self.formulas.insert(flavour, formula);
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn process(&mut self, ctx: &mut ModuleContext) -> Result<()> {
        let all_particles: Vec<CandidateId> = ctx.import_array("allParticles").to_vec();
        let parton_ids: Vec<CandidateId> = ctx.import_array("partons").to_vec();
        let lhe_ids: Vec<CandidateId> = ctx.import_array("LHEParticles").to_vec();
        let jet_ids: Vec<CandidateId> = ctx.import_array("jets").to_vec();

        // A parton is non-terminal, and excluded from the algorithmic pool, if either daughter is
        // itself a quark or gluon. Checks both daughters independently rather than stopping at the
        // first match.
        let is_non_terminal = |c: &Candidate| {
            [c.d1, c.d2].into_iter().any(|d| {
                usize::try_from(d)
                    .ok()
                    .and_then(|i| all_particles.get(i))
                    .is_some_and(|&daughter_id| Self::is_quark_or_gluon_pid(ctx.factory.get(daughter_id).pid))
            })
        };

        let lhe_partons: Vec<(CandidateId, i32, f64, f64, f64, f64)> = lhe_ids
            .iter()
            .filter_map(|&id| {
                let c = ctx.factory.get(id);
                (c.status == 1 && Self::is_quark_or_gluon_pid(c.pid) && c.pt() > self.pt_min && c.eta().abs() < self.eta_max)
                    .then(|| (id, c.pid, c.pt(), c.eta(), c.phi(), c.charge))
            })
            .collect();

        let algorithmic_partons: Vec<(CandidateId, i32, f64, f64, f64)> = parton_ids
            .iter()
            .filter_map(|&id| {
                let c = ctx.factory.get(id);
                if !(Self::is_quark_or_gluon_pid(c.pid) && c.pt() > self.pt_min && c.eta().abs() < self.eta_max) {
                    return None;
                }
                if is_non_terminal(c) {
                    return None;
                }
                let duplicate_of_lhe = lhe_partons.iter().any(|&(_, pid, _, eta, phi, charge)| {
                    pid == c.pid && (charge - c.charge).abs() < 1e-9 && delta_r(c.eta(), c.phi(), eta, phi) < LHE_DEDUP_DELTA_R
                });
                (!duplicate_of_lhe).then(|| (id, c.pid, c.pt(), c.eta(), c.phi()))
            })
            .collect();

        // post-shower partons eligible as Physics-derivation contaminants: heavy flavour (|PID|
        // >= 4, excluding the gluon) that is still decaying.
        let contaminants: Vec<(i32, f64, f64, i32)> = parton_ids
            .iter()
            .filter_map(|&id| {
                let c = ctx.factory.get(id);
                if c.pid.abs() < 4 || c.pid == 21 || c.d1 == -1 {
                    return None;
                }
                let mother_pid = usize::try_from(c.m1).ok().and_then(|i| all_particles.get(i)).map(|&m| ctx.factory.get(m).pid);
                Some((c.pid, c.eta(), c.phi(), mother_pid.unwrap_or(0)))
            })
            .collect();

        for &jet_id in &jet_ids {
            let (jet_eta, jet_phi) = {
                let jet = ctx.factory.get(jet_id);
                (jet.momentum.eta(), jet.momentum.phi())
            };

            let in_cone_algo: Vec<Parton> = algorithmic_partons
                .iter()
                .filter_map(|&(_, pid, pt, eta, phi)| {
                    let dr = delta_r(eta, phi, jet_eta, jet_phi);
                    (dr <= self.delta_r_max).then_some(Parton { pid, pt, dr_to_jet: dr })
                })
                .collect();

            let nearest2 = in_cone_algo.iter().min_by(|a, b| a.dr_to_jet.total_cmp(&b.dr_to_jet)).map_or(0, |p| p.pid);
            let highest_pt = in_cone_algo.iter().max_by(|a, b| a.pt.total_cmp(&b.pt)).map_or(0, |p| p.pid);
            let heaviest = if in_cone_algo.iter().any(|p| p.pid.abs() == 5) {
                5
            } else if in_cone_algo.iter().any(|p| p.pid.abs() == 4) {
                4
            } else {
                0
            };
            let flavour_algo = if heaviest != 0 { heaviest } else { highest_pt };

            let max_quark = in_cone_algo.iter().filter(|p| (1..=5).contains(&p.pid.abs())).map(|p| p.pid.abs()).max().unwrap_or(0);
            let has_gluon = in_cone_algo.iter().any(|p| p.pid == 21);
            let flavour_default = if max_quark > 0 { max_quark } else if has_gluon { 21 } else { 0 };

            let in_cone_lhe: Vec<&(CandidateId, i32, f64, f64, f64, f64)> =
                lhe_partons.iter().filter(|&&(_, _, _, eta, phi, _)| delta_r(eta, phi, jet_eta, jet_phi) <= self.delta_r_max).collect();
            let nearest3 = in_cone_lhe
                .iter()
                .min_by(|a, b| delta_r(a.3, a.4, jet_eta, jet_phi).total_cmp(&delta_r(b.3, b.4, jet_eta, jet_phi)))
                .map_or(0, |p| p.1);

            let flavour_physics = if in_cone_lhe.len() == 1 {
                let (_, lhe_pid, ..) = *in_cone_lhe[0];
                let reset = contaminants.iter().any(|&(pid, eta, phi, mother_pid)| {
                    pid.abs() != lhe_pid.abs()
                        && delta_r(eta, phi, jet_eta, jet_phi) < CONTAMINATION_DELTA_R
                        && mother_pid != lhe_pid
                });
                if reset {
                    0
                } else {
                    lhe_pid
                }
            } else {
                0
            };

            let flavours = [
                flavour_algo,
                flavour_default,
                flavour_physics,
                nearest2,
                nearest3,
                heaviest,
                highest_pt,
            ];

            const VARIANTS: [FlavourVariant; FLAVOUR_VARIANT_COUNT] = [
                FlavourVariant::Algo,
                FlavourVariant::Default,
                FlavourVariant::Physics,
                FlavourVariant::Nearest2,
                FlavourVariant::Nearest3,
                FlavourVariant::Heaviest,
                FlavourVariant::HighestPt,
            ];

            let r = ctx.rng.uniform();
            let jet = ctx.factory.get_mut(jet_id);
            let jet_pt = jet.pt();
            for (variant, flavour) in VARIANTS.into_iter().zip(flavours) {
                jet.flavour.set(variant, flavour);
                if let Some(formula) = self.formula_for(flavour) {
                    jet.flavour.tag[variant as usize] = r <= formula.eval(jet_pt);
                }
            }
        }

        Ok(())
    }
}
