//! Event-level scalar and vector pT sums (`SPEC_FULL.md` §3, §4.6).
//!
//! §4.6 names the input triplet as *eflowTracks* + *eflowPhotons* + *eflowNeutralHadrons*, the
//! standard Delphes energy-flow split; this calorimeter (§4.3) does not produce that three-way
//! split, only *eflowTracks*, *photons* and one combined residual array *eflowTowers*. The
//! defaults below use the arrays the calorimeter actually exports instead of inventing a
//! split it never makes.

use crate::candidate::{Candidate, FourVector};
use crate::error::Result;
use crate::module::{InitContext, Module, ModuleContext};

const DEFAULT_INPUTS: [&str; 3] = ["eflowTracks", "photons", "eflowTowers"];

fn sum_momentum(ctx: &ModuleContext, arrays: &[String]) -> FourVector {
    let mut total = FourVector::default();
    for name in arrays {
        for &id in ctx.import_array(name) {
            total += ctx.factory.get(id).momentum;
        }
    }
    total
}

/// `MissingET` module (`SPEC_FULL.md` §4.6): negative vector pT sum of the energy-flow objects,
/// exported as a single-entry array holding one `Candidate` whose momentum is `-sum`.
pub struct MissingEt {
    input_arrays: Vec<String>,
    output_array: String,
}

impl Default for MissingEt {
    fn default() -> Self {
        Self {
            input_arrays: DEFAULT_INPUTS.iter().map(|&s| s.to_owned()).collect(),
            output_array: "missingET".to_owned(),
        }
    }
}

impl MissingEt {
    /// Creates a missing-ET module over the standard energy-flow triplet; `init` overrides from
    /// configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for MissingEt {
    fn name(&self) -> &str {
        "MissingET"
    }

    fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        for name in &self.input_arrays {
            ctx.import_array(name)?;
        }
        self.output_array = ctx.get_string("OutputArray", &self.output_array);
        ctx.export_array(&self.output_array)?;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ModuleContext) -> Result<()> {
        let sum = sum_momentum(ctx, &self.input_arrays);
        let id = ctx.factory.new_candidate();
        *ctx.factory.get_mut(id) = Candidate {
            momentum: FourVector::new(sum.pt(), -sum.px, -sum.py, 0.0),
            ..Candidate::default()
        };
        ctx.export_array(&self.output_array, vec![id]);
        Ok(())
    }
}

/// `ScalarHT` module (`SPEC_FULL.md` §4.6): scalar pT sum of the energy-flow objects, exported as
/// a single-entry array whose `Candidate` carries the sum in `momentum.e` (the same flat-record
/// convention used for `Rho`).
pub struct ScalarHt {
    input_arrays: Vec<String>,
    output_array: String,
}

impl Default for ScalarHt {
    fn default() -> Self {
        Self {
            input_arrays: DEFAULT_INPUTS.iter().map(|&s| s.to_owned()).collect(),
            output_array: "scalarHT".to_owned(),
        }
    }
}

impl ScalarHt {
    /// Creates a scalar-HT module over the standard energy-flow triplet; `init` overrides from
    /// configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for ScalarHt {
    fn name(&self) -> &str {
        "ScalarHT"
    }

    fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        for name in &self.input_arrays {
            ctx.import_array(name)?;
        }
        self.output_array = ctx.get_string("OutputArray", &self.output_array);
        ctx.export_array(&self.output_array)?;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ModuleContext) -> Result<()> {
        let mut scalar_sum = 0.0;
        for name in &self.input_arrays {
            for &id in ctx.import_array(name) {
                scalar_sum += ctx.factory.get(id).pt();
            }
        }
        let id = ctx.factory.new_candidate();
        *ctx.factory.get_mut(id) = Candidate {
            momentum: FourVector::new(scalar_sum, 0.0, 0.0, 0.0),
            ..Candidate::default()
        };
        ctx.export_array(&self.output_array, vec![id]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::ArrayRegistry;
    use crate::config::Config;
    use crate::factory::Factory;
    use crate::pdg::PdgTable;
    use crate::rng::RandomService;

    #[test]
    fn missing_et_is_negative_vector_sum() {
        let mut factory = Factory::new();
        let mut arrays = ArrayRegistry::new();
        let mut rng = RandomService::new(1);
        let pdg = PdgTable::standard();

        let a = factory.new_candidate();
        *factory.get_mut(a) = Candidate {
            momentum: FourVector::new(10.0, 10.0, 0.0, 0.0),
            ..Candidate::default()
        };
        let b = factory.new_candidate();
        *factory.get_mut(b) = Candidate {
            momentum: FourVector::new(10.0, -5.0, 0.0, 0.0),
            ..Candidate::default()
        };

        arrays.declare_export("Reader", "eflowTracks").unwrap();
        arrays.declare_export("Reader", "photons").unwrap();
        arrays.declare_export("Reader", "eflowTowers").unwrap();
        arrays.export("eflowTracks", vec![a, b]);
        arrays.export("photons", vec![]);
        arrays.export("eflowTowers", vec![]);

        let config = Config::empty();
        let mut met = MissingEt::new();
        {
            let mut init_ctx = InitContext::new("MissingET".to_owned(), &mut arrays, config.module("MissingET"));
            met.init(&mut init_ctx).unwrap();
        }
        {
            let mut ctx = ModuleContext::new(&mut factory, &mut arrays, &mut rng, &pdg, config.module("MissingET"));
            met.process(&mut ctx).unwrap();
        }

        let met_ids = arrays.import("missingET");
        assert_eq!(met_ids.len(), 1);
        let met_candidate = factory.get(met_ids[0]);
        assert!((met_candidate.momentum.px - (-5.0)).abs() < 1e-9);
    }

    #[test]
    fn scalar_ht_sums_pt_magnitudes() {
        let mut factory = Factory::new();
        let mut arrays = ArrayRegistry::new();
        let mut rng = RandomService::new(1);
        let pdg = PdgTable::standard();

        let a = factory.new_candidate();
        *factory.get_mut(a) = Candidate {
            momentum: FourVector::new(10.0, 10.0, 0.0, 0.0),
            ..Candidate::default()
        };
        let b = factory.new_candidate();
        *factory.get_mut(b) = Candidate {
            momentum: FourVector::new(10.0, -5.0, 0.0, 0.0),
            ..Candidate::default()
        };

        arrays.declare_export("Reader", "eflowTracks").unwrap();
        arrays.declare_export("Reader", "photons").unwrap();
        arrays.declare_export("Reader", "eflowTowers").unwrap();
        arrays.export("eflowTracks", vec![a, b]);
        arrays.export("photons", vec![]);
        arrays.export("eflowTowers", vec![]);

        let config = Config::empty();
        let mut sht = ScalarHt::new();
        {
            let mut init_ctx = InitContext::new("ScalarHT".to_owned(), &mut arrays, config.module("ScalarHT"));
            sht.init(&mut init_ctx).unwrap();
        }
        {
            let mut ctx = ModuleContext::new(&mut factory, &mut arrays, &mut rng, &pdg, config.module("ScalarHT"));
            sht.process(&mut ctx).unwrap();
        }

        let ht_ids = arrays.import("scalarHT");
        let ht_candidate = factory.get(ht_ids[0]);
        assert!((ht_candidate.momentum.e - 15.0).abs() < 1e-9);
    }
}
