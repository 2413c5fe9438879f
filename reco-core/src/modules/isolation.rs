//! Isolation-cone sums (`SPEC_FULL.md` §3, §4.6).

use crate::candidate::{delta_r, CandidateFlags};
use crate::error::Result;
use crate::module::{InitContext, Module, ModuleContext};

/// Delta-beta pile-up correction factor, the standard CMS-style `0.5` applied to the neutral
/// component.
const DELTA_BETA_FACTOR: f64 = 0.5;

/// `Isolation` module (`SPEC_FULL.md` §4.6): for every candidate in `candidate_array`, sums the
/// pT of reference objects (`reference_array`) within a ΔR cone, split by charged/neutral/pile-up,
/// and writes the five isolation variants onto the candidate. Exports the same candidates (now
/// mutated) under `output_array`.
pub struct Isolation {
    candidate_array: String,
    reference_array: String,
    rho_array: String,
    output_array: String,
    delta_r_max: f64,
}

impl Default for Isolation {
    fn default() -> Self {
        Self {
            candidate_array: "photons".to_owned(),
            reference_array: "eflowTracks".to_owned(),
            rho_array: "rho".to_owned(),
            output_array: "photons/isolated".to_owned(),
            delta_r_max: 0.5,
        }
    }
}

impl Isolation {
    /// Creates an isolation module over photons against `eflowTracks`; `init` overrides from
    /// configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for Isolation {
    fn name(&self) -> &str {
        "Isolation"
    }

    fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        self.candidate_array = ctx.get_string("CandidateInputArray", &self.candidate_array);
        self.reference_array = ctx.get_string("IsolationInputArray", &self.reference_array);
        self.rho_array = ctx.get_string("RhoInputArray", &self.rho_array);
        self.delta_r_max = ctx.get_double("DeltaRMax", self.delta_r_max);
        self.output_array = ctx.get_string("OutputArray", &format!("{}/isolated", self.candidate_array));

        ctx.import_array(&self.candidate_array)?;
        ctx.import_array(&self.reference_array)?;
        ctx.import_array(&self.rho_array)?;
        ctx.export_array(&self.output_array)?;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ModuleContext) -> Result<()> {
        let candidates = ctx.import_array(&self.candidate_array).to_vec();
        let references = ctx.import_array(&self.reference_array).to_vec();
        let rho_ids = ctx.import_array(&self.rho_array).to_vec();

        let rho_value = rho_ids.first().map_or(0.0, |&id| ctx.factory.get(id).momentum.e);
        let cone_area = std::f64::consts::PI * self.delta_r_max * self.delta_r_max;

        for &cand_id in &candidates {
            let (cand_eta, cand_phi, cand_pt) = {
                let c = ctx.factory.get(cand_id);
                (c.eta(), c.phi(), c.pt())
            };

            let (mut charged_hadron, mut neutral, mut charged_pu) = (0.0, 0.0, 0.0);
            for &ref_id in &references {
                if ref_id == cand_id {
                    continue;
                }
                let r = ctx.factory.get(ref_id);
                if delta_r(r.eta(), r.phi(), cand_eta, cand_phi) > self.delta_r_max {
                    continue;
                }
                if r.flags.contains(CandidateFlags::IS_PU) {
                    if r.charge != 0.0 {
                        charged_pu += r.pt();
                    }
                } else if r.charge != 0.0 {
                    charged_hadron += r.pt();
                } else {
                    neutral += r.pt();
                }
            }

            let all_particle = charged_hadron + neutral + charged_pu;
            let track_only = if cand_pt > 0.0 { charged_hadron / cand_pt } else { 0.0 };
            let delta_beta_corrected = if cand_pt > 0.0 {
                (charged_hadron + (neutral - DELTA_BETA_FACTOR * charged_pu).max(0.0)) / cand_pt
            } else {
                0.0
            };
            let rho_corrected = if cand_pt > 0.0 {
                (charged_hadron + (neutral - rho_value * cone_area).max(0.0)) / cand_pt
            } else {
                0.0
            };

            let c = ctx.factory.get_mut(cand_id);
            c.isolation.charged_hadron_energy = charged_hadron;
            c.isolation.neutral_energy = neutral;
            c.isolation.charged_pu_energy = charged_pu;
            c.isolation.all_particle_energy = all_particle;
            c.isolation.track_only = track_only;
            c.isolation.delta_beta_corrected = delta_beta_corrected;
            c.isolation.rho_corrected = rho_corrected;
        }

        ctx.export_array(&self.output_array, candidates);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::ArrayRegistry;
    use crate::candidate::{Candidate, CandidateFlags, FourVector};
    use crate::config::Config;
    use crate::factory::Factory;
    use crate::pdg::PdgTable;
    use crate::rng::RandomService;

    #[test]
    fn charged_track_in_cone_raises_track_isolation() {
        let mut factory = Factory::new();
        let mut arrays = ArrayRegistry::new();
        let mut rng = RandomService::new(1);
        let pdg = PdgTable::standard();

        let photon = factory.new_candidate();
        *factory.get_mut(photon) = Candidate {
            momentum: FourVector::new(50.0, 50.0, 0.0, 0.0),
            ..Candidate::default()
        };
        let track = factory.new_candidate();
        *factory.get_mut(track) = Candidate {
            momentum: FourVector::new(5.0, 5.0, 0.1, 0.0),
            charge: 1.0,
            ..Candidate::default()
        };
        let pu_track = factory.new_candidate();
        *factory.get_mut(pu_track) = Candidate {
            momentum: FourVector::new(2.0, 2.0, 0.05, 0.0),
            charge: 1.0,
            flags: CandidateFlags::IS_PU,
            ..Candidate::default()
        };

        arrays.declare_export("Reader", "photons").unwrap();
        arrays.declare_export("Reader", "eflowTracks").unwrap();
        arrays.declare_export("Reader", "rho").unwrap();
        arrays.export("photons", vec![photon]);
        arrays.export("eflowTracks", vec![track, pu_track]);
        arrays.export("rho", vec![]);

        let config = Config::parse("Isolation:\n  DeltaRMax: 0.5\n").unwrap();
        let mut iso = Isolation::new();
        {
            let mut init_ctx = InitContext::new("Isolation".to_owned(), &mut arrays, config.module("Isolation"));
            iso.init(&mut init_ctx).unwrap();
        }
        {
            let mut ctx = ModuleContext::new(&mut factory, &mut arrays, &mut rng, &pdg, config.module("Isolation"));
            iso.process(&mut ctx).unwrap();
        }

        let tagged = factory.get(photon);
        assert!(tagged.isolation.track_only > 0.0);
        assert!(tagged.isolation.charged_pu_energy > 0.0);
        assert_eq!(arrays.import("photons/isolated").len(), 1);
    }
}
