//! Calorimeter segmentation, hit-binning and resolution model (`SPEC_FULL.md` §4.3).
//!
//! The module packs every track and particle that lands on the η-φ grid into a 64-bit sortable
//! hit, groups hits into towers by sorting, then finalises each tower in one pass. Sorting is
//! what replaces an explicit two-level (η, φ) map: after the sort, all hits belonging to one
//! tower are contiguous.

use crate::candidate::{Candidate, CandidateId, FourPosition, FourVector, TimeSample};
use crate::error::{Error, Result};
use crate::module::{InitContext, Module, ModuleContext};
use rustc_hash::FxHashMap;

const TRACK_FLAG: u64 = 1;
const EM_FLAG: u64 = 2;
const NO_TIME_SENTINEL: f64 = 999_999.0;

fn pack_hit(eta_bin: usize, phi_bin: usize, flags: u64, index: usize) -> u64 {
    ((eta_bin as u64) << 48) | ((phi_bin as u64) << 32) | (flags << 24) | (index as u64)
}

fn unpack_hit(hit: u64) -> (usize, usize, u64, usize) {
    let eta_bin = (hit >> 48) as usize;
    let phi_bin = ((hit >> 32) & 0xFFFF) as usize;
    let flags = (hit >> 24) & 0xFF;
    let index = (hit & 0x00FF_FFFF) as usize;
    (eta_bin, phi_bin, flags, index)
}

/// The irregular η-φ segmentation: one shared vector of η edges, and one φ-edge vector per η bin.
#[derive(Debug, Clone)]
struct CaloGrid {
    eta_edges: Vec<f64>,
    phi_edges: Vec<Vec<f64>>,
}

impl CaloGrid {
    /// Builds a grid from `EtaPhiBins`' ragged rows: row 0 is the ascending η edges; row `k`
    /// (`k >= 1`) is the ascending φ edges for η bin `k - 1`.
    fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let [eta_edges, phi_rows @ ..] = rows else {
            return Err(Error::Config {
                module: "Calorimeter".to_owned(),
                detail: "EtaPhiBins must have at least one row (the eta edges)".to_owned(),
            });
        };
        if eta_edges.len() < 2 {
            return Err(Error::Config {
                module: "Calorimeter".to_owned(),
                detail: "EtaPhiBins eta-edge row must list at least two edges".to_owned(),
            });
        }
        if phi_rows.len() != eta_edges.len() - 1 {
            return Err(Error::Config {
                module: "Calorimeter".to_owned(),
                detail: format!(
                    "EtaPhiBins declares {} eta bins but {} phi-edge rows",
                    eta_edges.len() - 1,
                    phi_rows.len()
                ),
            });
        }
        for row in phi_rows {
            if row.len() < 2 {
                return Err(Error::Config {
                    module: "Calorimeter".to_owned(),
                    detail: "every phi-edge row must list at least two edges".to_owned(),
                });
            }
        }
        Ok(Self {
            eta_edges: eta_edges.clone(),
            phi_edges: phi_rows.to_vec(),
        })
    }

    /// Lower-inclusive, upper-exclusive bisection. Returns `None` if `eta`/`phi` fall outside the
    /// configured range.
    fn lookup(&self, eta: f64, phi: f64) -> Option<(usize, usize)> {
        if eta < self.eta_edges[0] || eta >= *self.eta_edges.last().unwrap() {
            return None;
        }
        let eta_bin = self.eta_edges.partition_point(|&edge| edge <= eta) - 1;
        let phi_edges = &self.phi_edges[eta_bin];
        if phi < phi_edges[0] || phi >= *phi_edges.last().unwrap() {
            return None;
        }
        let phi_bin = phi_edges.partition_point(|&edge| edge <= phi) - 1;
        Some((eta_bin, phi_bin))
    }

    fn edges(&self, eta_bin: usize, phi_bin: usize) -> [f64; 4] {
        let phi_edges = &self.phi_edges[eta_bin];
        [
            self.eta_edges[eta_bin],
            self.eta_edges[eta_bin + 1],
            phi_edges[phi_bin],
            phi_edges[phi_bin + 1],
        ]
    }

    fn centre(&self, eta_bin: usize, phi_bin: usize) -> (f64, f64) {
        let [eta_lo, eta_hi, phi_lo, phi_hi] = self.edges(eta_bin, phi_bin);
        (0.5 * (eta_lo + eta_hi), 0.5 * (phi_lo + phi_hi))
    }
}

/// One row of a resolution table: `sigma/E = sqrt((a/sqrt(E))^2 + (b/E)^2 + c^2)` for `|eta| <=
/// eta_max`, the standard stochastic/noise/constant calorimeter parametrisation. Rows are tried
/// in ascending `eta_max` order; `|eta|` beyond the last row uses that last row.
#[derive(Debug, Clone, Default)]
struct ResolutionTable {
    rows: Vec<(f64, f64, f64, f64)>,
}

impl ResolutionTable {
    fn from_rows(rows: &[Vec<f64>]) -> Self {
        let mut rows: Vec<(f64, f64, f64, f64)> = rows
            .iter()
            .filter_map(|r| match r.as_slice() {
                [eta_max, a, b, c] => Some((*eta_max, *a, *b, *c)),
                _ => None,
            })
            .collect();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { rows }
    }

    /// Absolute (not fractional) smearing width for an energy deposit `e` at pseudorapidity `eta`.
    fn sigma(&self, eta: f64, e: f64) -> f64 {
        let Some(&(_, a, b, c)) = self
            .rows
            .iter()
            .find(|(eta_max, ..)| eta.abs() <= *eta_max)
            .or_else(|| self.rows.last())
        else {
            return 0.0;
        };
        if e <= 0.0 {
            return 0.0;
        }
        let fraction = ((a / e.sqrt()).powi(2) + (b / e).powi(2) + c * c).sqrt();
        fraction * e
    }
}

fn tower_momentum(eta: f64, phi: f64, e: f64) -> FourVector {
    let pt = e / eta.cosh();
    FourVector::new(e, pt * phi.cos(), pt * phi.sin(), pt * eta.sinh())
}

struct LocalTower {
    eta_bin: usize,
    phi_bin: usize,
    ecal_sum: f64,
    hcal_sum: f64,
    track_ecal_sum: f64,
    track_hcal_sum: f64,
    composition: Vec<CandidateId>,
    track_ids: Vec<CandidateId>,
    time_samples: Vec<TimeSample>,
    has_em_hit: bool,
    has_track_hit: bool,
}

impl LocalTower {
    fn new(eta_bin: usize, phi_bin: usize) -> Self {
        Self {
            eta_bin,
            phi_bin,
            ecal_sum: 0.0,
            hcal_sum: 0.0,
            track_ecal_sum: 0.0,
            track_hcal_sum: 0.0,
            composition: Vec::new(),
            track_ids: Vec::new(),
            time_samples: Vec::new(),
            has_em_hit: false,
            has_track_hit: false,
        }
    }
}

/// Aggregates tracks and particles into calorimeter towers and splits them into energy-flow
/// objects (`SPEC_FULL.md` §4.3).
pub struct Calorimeter {
    particle_array: String,
    track_array: String,
    grid: Option<CaloGrid>,
    energy_fractions: FxHashMap<i32, (f64, f64)>,
    default_fraction: (f64, f64),
    ecal_resolution: ResolutionTable,
    hcal_resolution: ResolutionTable,
    timing_e_min: f64,
}

impl Default for Calorimeter {
    fn default() -> Self {
        Self {
            particle_array: "stableParticles".to_owned(),
            track_array: "chargedHadrons".to_owned(),
            grid: None,
            energy_fractions: FxHashMap::default(),
            default_fraction: (1.0, 0.0),
            ecal_resolution: ResolutionTable::default(),
            hcal_resolution: ResolutionTable::default(),
            timing_e_min: 0.0,
        }
    }
}

impl Calorimeter {
    /// Creates a calorimeter with the built-in default import-array names and no segmentation;
    /// `init` must configure the grid before `process` can run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn energy_fraction(&self, pid: i32) -> (f64, f64) {
        self.energy_fractions.get(&pid).copied().unwrap_or(self.default_fraction)
    }
}

impl Module for Calorimeter {
    fn name(&self) -> &str {
        "Calorimeter"
    }

    fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        self.particle_array = ctx.get_string("ParticleInputArray", "stableParticles");
        self.track_array = ctx.get_string("TrackInputArray", "chargedHadrons");
        ctx.import_array(&self.particle_array)?;
        ctx.import_array(&self.track_array)?;
        ctx.export_array("towers")?;
        ctx.export_array("eflowTracks")?;
        ctx.export_array("eflowTowers")?;
        ctx.export_array("photons")?;

        self.grid = Some(CaloGrid::from_rows(&ctx.get_param("EtaPhiBins"))?);

        for row in ctx.get_param("EnergyFraction") {
            if let [pid, fecal, fhcal] = row.as_slice() {
                #[allow(clippy::cast_possible_truncation)]
                let pid = *pid as i32;
                if pid == 0 {
                    self.default_fraction = (*fecal, *fhcal);
                } else {
                    self.energy_fractions.insert(pid, (*fecal, *fhcal));
                }
            }
        }

        self.ecal_resolution = ResolutionTable::from_rows(&ctx.get_param("ECalResolutionFormula"));
        self.hcal_resolution = ResolutionTable::from_rows(&ctx.get_param("HCalResolutionFormula"));
        self.timing_e_min = ctx.get_double("TimingEMin", 0.0);
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn process(&mut self, ctx: &mut ModuleContext) -> Result<()> {
        let Some(grid) = &self.grid else {
            return Err(Error::Config {
                module: self.name().to_owned(),
                detail: "Calorimeter grid was not configured at Init".to_owned(),
            });
        };

        let tracks: Vec<CandidateId> = ctx.import_array(&self.track_array).to_vec();
        let particles: Vec<CandidateId> = ctx.import_array(&self.particle_array).to_vec();

        let mut refs: Vec<(bool, CandidateId)> = Vec::with_capacity(tracks.len() + particles.len());
        let mut hits: Vec<u64> = Vec::with_capacity(tracks.len() + particles.len());

        for &id in &tracks {
            let c = ctx.factory.get(id);
            if let Some((eta_bin, phi_bin)) = grid.lookup(c.momentum.eta(), c.momentum.phi()) {
                let index = refs.len();
                refs.push((true, id));
                hits.push(pack_hit(eta_bin, phi_bin, TRACK_FLAG, index));
            }
        }
        for &id in &particles {
            let c = ctx.factory.get(id);
            if let Some((eta_bin, phi_bin)) = grid.lookup(c.momentum.eta(), c.momentum.phi()) {
                let is_em = matches!(c.pid.abs(), 11 | 22);
                let index = refs.len();
                refs.push((false, id));
                hits.push(pack_hit(eta_bin, phi_bin, if is_em { EM_FLAG } else { 0 }, index));
            }
        }

        hits.sort_unstable();

        let mut towers: Vec<LocalTower> = Vec::new();
        let mut current: Option<LocalTower> = None;

        for hit in hits {
            let (eta_bin, phi_bin, flags, index) = unpack_hit(hit);
            let starts_new_tower = match &current {
                Some(t) => t.eta_bin != eta_bin || t.phi_bin != phi_bin,
                None => true,
            };
            if starts_new_tower {
                if let Some(finished) = current.take() {
                    towers.push(finished);
                }
                current = Some(LocalTower::new(eta_bin, phi_bin));
            }
            let tower = current.as_mut().unwrap();
            let (is_track, id) = refs[index];
            let c = ctx.factory.get(id);
            if is_track {
                let (fecal, fhcal) = self.energy_fraction(c.pid);
                tower.track_ecal_sum += c.momentum.e * fecal;
                tower.track_hcal_sum += c.momentum.e * fhcal;
                tower.track_ids.push(id);
                tower.has_track_hit = true;
            } else {
                let (fecal, fhcal) = self.energy_fraction(c.pid);
                let ecal = c.momentum.e * fecal;
                tower.ecal_sum += ecal;
                tower.hcal_sum += c.momentum.e * fhcal;
                if ecal > self.timing_e_min {
                    tower.time_samples.push(TimeSample { energy: ecal, time: c.position.t });
                }
                tower.composition.push(id);
                if flags & EM_FLAG != 0 {
                    tower.has_em_hit = true;
                }
            }
        }
        if let Some(finished) = current.take() {
            towers.push(finished);
        }

        let mut tower_ids = Vec::with_capacity(towers.len());
        let mut photon_ids = Vec::new();
        let mut eflow_tracks = Vec::new();
        let mut eflow_tower_ids = Vec::new();

        for tower in towers {
            let (eta_c, phi_c) = grid.centre(tower.eta_bin, tower.phi_bin);
            let ecal_smeared = ctx.rng.log_normal(tower.ecal_sum, self.ecal_resolution.sigma(eta_c, tower.ecal_sum));
            let hcal_smeared = ctx.rng.log_normal(tower.hcal_sum, self.hcal_resolution.sigma(eta_c, tower.hcal_sum));

            let weight_sum: f64 = tower.time_samples.iter().map(|s| s.energy.sqrt()).sum();
            let time = if weight_sum > 0.0 {
                tower.time_samples.iter().map(|s| s.energy.sqrt() * s.time).sum::<f64>() / weight_sum
            } else {
                NO_TIME_SENTINEL
            };

            let e_total = ecal_smeared + hcal_smeared;
            let tower_id = ctx.factory.new_candidate();
            {
                let candidate = ctx.factory.get_mut(tower_id);
                *candidate = Candidate {
                    momentum: tower_momentum(eta_c, phi_c, e_total),
                    position: FourPosition { x: 0.0, y: 0.0, z: 0.0, t: time },
                    e_em: ecal_smeared,
                    e_had: hcal_smeared,
                    tower_edges: grid.edges(tower.eta_bin, tower.phi_bin),
                    tower_times: tower.time_samples.clone(),
                    composition: tower.composition.clone(),
                    ..Candidate::default()
                };
            }
            tower_ids.push(tower_id);

            if tower.has_em_hit && !tower.has_track_hit {
                photon_ids.push(tower_id);
            }
            eflow_tracks.extend(tower.track_ids.iter().copied());

            let ecal_resid = (ecal_smeared - tower.track_ecal_sum).max(0.0);
            let hcal_resid = (hcal_smeared - tower.track_hcal_sum).max(0.0);
            if ecal_resid + hcal_resid > 0.0 {
                let residual_id = ctx.factory.clone_candidate(tower_id);
                let candidate = ctx.factory.get_mut(residual_id);
                candidate.e_em = ecal_resid;
                candidate.e_had = hcal_resid;
                candidate.momentum = tower_momentum(eta_c, phi_c, ecal_resid + hcal_resid);
                candidate.composition = tower.composition;
                eflow_tower_ids.push(residual_id);
            }
        }

        ctx.export_array("towers", tower_ids);
        ctx.export_array("photons", photon_ids);
        ctx.export_array("eflowTracks", eflow_tracks);
        ctx.export_array("eflowTowers", eflow_tower_ids);
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
    use float_cmp::approx_eq;

    fn test_grid() -> CaloGrid {
        CaloGrid::from_rows(&[
            vec![-1.5, 0.0, 1.5],
            vec![-std::f64::consts::PI, 0.0, std::f64::consts::PI],
            vec![-std::f64::consts::PI, 0.0, std::f64::consts::PI],
        ])
        .unwrap()
    }

    #[test]
    fn grid_lookup_is_lower_inclusive() {
        let grid = test_grid();
        assert_eq!(grid.lookup(0.0, 0.0), Some((1, 1)));
        // exactly on the upper edge of the grid: outside
        assert_eq!(grid.lookup(1.5, 0.0), None);
        // exactly on the lower edge of the grid: belongs to the first bin
        assert_eq!(grid.lookup(-1.5, 0.0), Some((0, 1)));
    }

    #[test]
    fn grid_rejects_malformed_rows() {
        assert!(CaloGrid::from_rows(&[vec![0.0, 1.0]]).is_err());
        assert!(CaloGrid::from_rows(&[]).is_err());
    }

    #[test]
    fn resolution_falls_back_to_widest_bin() {
        let table = ResolutionTable::from_rows(&[vec![1.0, 0.1, 0.0, 0.0]]);
        assert!(table.sigma(5.0, 100.0) > 0.0);
        assert_eq!(table.sigma(5.0, 0.0), 0.0);
    }

    #[test]
    fn single_photon_produces_one_tower_and_one_photon() {
        let mut factory = Factory::new();
        let mut arrays = ArrayRegistry::new();
        let mut rng = RandomService::new(1);
        let pdg = PdgTable::standard();

        // a single stable photon along eta=0.3 with E=100 GeV
        let eta = 0.3f64;
        let pt = 100.0 / eta.cosh();
        let momentum = FourVector::new(100.0, pt, 0.0, pt * eta.sinh());
        let id = factory.new_candidate();
        *factory.get_mut(id) = Candidate {
            momentum,
            pid: 22,
            status: 1,
            ..Candidate::default()
        };

        arrays.declare_export("Reader", "stableParticles").unwrap();
        arrays.declare_export("Reader", "chargedHadrons").unwrap();
        arrays.export("stableParticles", vec![id]);
        arrays.export("chargedHadrons", vec![]);

        let config = Config::parse(
            r"
Calorimeter:
  EtaPhiBins:
    - [-1.5, 0.0, 1.5]
    - [-3.2, 0.0, 3.2]
    - [-3.2, 0.0, 3.2]
  EnergyFraction:
    - [0, 1.0, 0.0]
    - [22, 1.0, 0.0]
",
        )
        .unwrap();

        let mut calo = Calorimeter::new();
        {
            let mut init_ctx = InitContext::new("Calorimeter".to_owned(), &mut arrays, config.module("Calorimeter"));
            calo.init(&mut init_ctx).unwrap();
        }
        {
            let mut ctx = ModuleContext::new(&mut factory, &mut arrays, &mut rng, &pdg, config.module("Calorimeter"));
            calo.process(&mut ctx).unwrap();
        }

        assert_eq!(arrays.import("towers").len(), 1);
        assert_eq!(arrays.import("photons").len(), 1);
        assert_eq!(arrays.import("eflowTowers").len(), 1);

        let tower = factory.get(arrays.import("towers")[0]);
        assert!(approx_eq!(f64, tower.e_em, 100.0, epsilon = 1.0));
        assert!(approx_eq!(f64, tower.e_had, 0.0, epsilon = 1e-9));
    }
}
