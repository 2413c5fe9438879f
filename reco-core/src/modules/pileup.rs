//! Minimum-bias pile-up overlay (`SPEC_FULL.md` §4.6).

use crate::candidate::{Candidate, CandidateFlags, FourPosition};
use crate::error::Result;
use crate::event::GenParticle;
use crate::module::{InitContext, Module, ModuleContext};
use crate::rng::RandomService;

/// Supplies minimum-bias vertices to overlay onto the hard-scatter event. Stands in for an
/// external pile-up library (`SPEC_FULL.md` §4.6, same capability-interface pattern as
/// `ClusterEngine`): a real deployment would read from a minimum-bias sample file.
pub trait PileUpSource {
    /// Returns the generator-level particles of one minimum-bias interaction.
    fn sample_vertex(&mut self, rng: &mut RandomService) -> Vec<GenParticle>;
}

/// A fixed, cyclically-sampled library of minimum-bias vertices, for configurations that supply a
/// small in-memory sample instead of reading an external pile-up file.
#[derive(Default)]
pub struct LibraryPileUpSource {
    library: Vec<Vec<GenParticle>>,
    cursor: usize,
}

impl LibraryPileUpSource {
    /// Creates a source that cycles through `library` in order, wrapping around. An empty library
    /// yields empty vertices forever (equivalent to disabling pile-up).
    #[must_use]
    pub const fn new(library: Vec<Vec<GenParticle>>) -> Self {
        Self { library, cursor: 0 }
    }
}

impl PileUpSource for LibraryPileUpSource {
    fn sample_vertex(&mut self, _rng: &mut RandomService) -> Vec<GenParticle> {
        if self.library.is_empty() {
            return Vec::new();
        }
        let vertex = self.library[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.library.len();
        vertex
    }
}

/// `PileUpMerger` module (`SPEC_FULL.md` §4.6): overlays a Poisson-distributed number of
/// minimum-bias interactions (mean `mean_pile_up`) onto the event, offsetting each interaction's
/// vertex and marking its particles `IsPU`, then re-exports the merged `allParticles` /
/// `stableParticles` pair in place.
pub struct PileUpMerger {
    source: Box<dyn PileUpSource + Send + Sync>,
    mean_pile_up: f64,
    vertex_z_sigma_mm: f64,
    vertex_t_sigma_mm: f64,
}

impl Default for PileUpMerger {
    fn default() -> Self {
        Self {
            source: Box::new(LibraryPileUpSource::default()),
            mean_pile_up: 0.0,
            vertex_z_sigma_mm: 50.0,
            vertex_t_sigma_mm: 160.0,
        }
    }
}

impl PileUpMerger {
    /// Creates a merger reading from `source`; `init` overrides the mean multiplicity and vertex
    /// spread from configuration. Disabled (`mean_pile_up == 0`) by default.
    #[must_use]
    pub fn new(source: Box<dyn PileUpSource + Send + Sync>) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }
}

impl Module for PileUpMerger {
    fn name(&self) -> &str {
        "PileUpMerger"
    }

    fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        self.mean_pile_up = ctx.get_double("MeanPileUp", self.mean_pile_up);
        self.vertex_z_sigma_mm = ctx.get_double("VertexZSigma", self.vertex_z_sigma_mm);
        self.vertex_t_sigma_mm = ctx.get_double("VertexTSigma", self.vertex_t_sigma_mm);

        // `allParticles`/`stableParticles` are already declared by the reader; this module
        // merges into them in place rather than re-declaring the export.
        ctx.import_array("allParticles")?;
        ctx.import_array("stableParticles")?;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ModuleContext) -> Result<()> {
        if self.mean_pile_up <= 0.0 {
            return Ok(());
        }

        let mut all_particles = ctx.import_array("allParticles").to_vec();
        let mut stable_particles = ctx.import_array("stableParticles").to_vec();

        let n_vertices = ctx.rng.poisson(self.mean_pile_up);
        for _ in 0..n_vertices {
            let dz = self.vertex_z_sigma_mm * ctx.rng.standard_normal();
            let dt = self.vertex_t_sigma_mm * ctx.rng.standard_normal();
            let particles = self.source.sample_vertex(ctx.rng);
            for p in particles {
                let id = ctx.factory.new_candidate();
                let c = ctx.factory.get_mut(id);
                *c = Candidate {
                    momentum: p.momentum,
                    position: FourPosition {
                        x: p.position.x,
                        y: p.position.y,
                        z: p.position.z + dz,
                        t: p.position.t + dt,
                    },
                    pid: p.pid,
                    status: p.status,
                    m1: -1,
                    m2: -1,
                    d1: -1,
                    d2: -1,
                    charge: p.charge,
                    spin: p.spin,
                    mass: p.mass,
                    flags: CandidateFlags::IS_PU,
                    ..Candidate::default()
                };
                all_particles.push(id);
                if p.status == 1 {
                    stable_particles.push(id);
                }
            }
        }

        ctx.export_array("allParticles", all_particles);
        ctx.export_array("stableParticles", stable_particles);
        Ok(())
    }
}
