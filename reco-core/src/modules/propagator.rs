//! Charged-particle helix propagation to the calorimeter face (`SPEC_FULL.md` §4.6).

use crate::candidate::{Candidate, FourPosition};
use crate::error::Result;
use crate::module::{InitContext, Module, ModuleContext};

/// GeV / (tesla * metre) conversion constant relating transverse momentum to the radius of
/// curvature of a charged particle in a uniform axial field.
const CURVATURE_CONSTANT: f64 = 0.3;

fn rotate_around(cx: f64, cy: f64, x: f64, y: f64, angle: f64) -> (f64, f64) {
    let (s, c) = angle.sin_cos();
    let (dx, dy) = (x - cx, y - cy);
    (cx + dx * c - dy * s, cy + dx * s + dy * c)
}

/// Intersections of a circle of radius `r` centred at `(cx, cy)` with one of radius `radius`
/// centred at the origin, or `None` if the circles do not meet.
fn circle_intersections(cx: f64, cy: f64, r: f64, radius: f64) -> Option<[(f64, f64); 2]> {
    let d = cx.hypot(cy);
    if d > radius + r || d < (radius - r).abs() || d == 0.0 {
        return None;
    }
    let a = (d * d - r * r + radius * radius) / (2.0 * d);
    let h2 = radius * radius - a * a;
    if h2 < 0.0 {
        return None;
    }
    let h = h2.sqrt();
    let (ux, uy) = (cx / d, cy / d);
    let (mx, my) = (a * ux, a * uy);
    let (perp_x, perp_y) = (-uy, ux);
    Some([
        (mx + h * perp_x, my + h * perp_y),
        (mx - h * perp_x, my - h * perp_y),
    ])
}

/// Transverse arc angle, in the rotation direction `sign`, from the particle's start point to
/// `target`, travelling around `(cx, cy)` with radius `r`.
fn arc_angle_to(cx: f64, cy: f64, start: (f64, f64), target: (f64, f64), sign: f64) -> f64 {
    let theta_start = (start.1 - cy).atan2(start.0 - cx);
    let theta_target = (target.1 - cy).atan2(target.0 - cx);
    let mut delta = sign * (theta_target - theta_start);
    let two_pi = 2.0 * std::f64::consts::PI;
    delta = delta.rem_euclid(two_pi);
    delta
}

/// Result of propagating one particle to the tracking volume boundary.
struct Propagated {
    position: FourPosition,
    /// `true` if a crossing of the barrel or an end-cap was found.
    exited: bool,
}

/// Propagates a charged particle on a helix in a uniform axial field `bz` (tesla) out to a
/// cylinder of transverse `radius` and half-length `half_length` (both mm).
fn propagate_helix(c: &Candidate, radius: f64, half_length: f64, bz: f64) -> Propagated {
    let (x0, y0, z0, t0) = (c.position.x, c.position.y, c.position.z, c.position.t);
    let (px, py, pz) = (c.momentum.px, c.momentum.py, c.momentum.pz);
    let pt = px.hypot(py);

    if c.charge == 0.0 || bz == 0.0 || pt == 0.0 {
        return propagate_straight(c, radius, half_length);
    }

    let r = pt * 1000.0 / (CURVATURE_CONSTANT * c.charge.abs() * bz);
    let phi0 = py.atan2(px);
    let sign = if c.charge * bz > 0.0 { -1.0 } else { 1.0 };
    let cx = x0 - sign * r * phi0.sin();
    let cy = y0 + sign * r * phi0.cos();

    let barrel_arc = circle_intersections(cx, cy, r, radius).map(|points| {
        points
            .into_iter()
            .map(|p| arc_angle_to(cx, cy, (x0, y0), p, sign))
            .fold(f64::INFINITY, f64::min)
    });

    let endcap_arc = if pz != 0.0 {
        let target_z = if pz > 0.0 { half_length } else { -half_length };
        let needed = (target_z - z0) * pt / pz;
        (needed > 0.0).then(|| needed / r)
    } else {
        None
    };

    let chosen_arc = match (barrel_arc, endcap_arc) {
        (Some(b), Some(e)) => Some(b.min(e)),
        (Some(b), None) => Some(b),
        (None, Some(e)) => Some(e),
        (None, None) => None,
    };

    let Some(arc) = chosen_arc else {
        return Propagated {
            position: c.position,
            exited: false,
        };
    };

    let transverse_len = r * arc;
    let p = pt.hypot(pz);
    let total_len = transverse_len * (p / pt);
    let (fx, fy) = rotate_around(cx, cy, x0, y0, sign * arc);
    let fz = z0 + transverse_len * (pz / pt);

    Propagated {
        position: FourPosition {
            x: fx,
            y: fy,
            z: fz,
            t: t0 + total_len,
        },
        exited: true,
    }
}

/// Straight-line propagation for neutral particles (or charged ones in a zero field), to whichever
/// of the barrel or end-caps is reached first.
fn propagate_straight(c: &Candidate, radius: f64, half_length: f64) -> Propagated {
    let (x0, y0, z0, t0) = (c.position.x, c.position.y, c.position.z, c.position.t);
    let (px, py, pz, e) = (c.momentum.px, c.momentum.py, c.momentum.pz, c.momentum.e);
    let pt = px.hypot(py);
    if e <= 0.0 {
        return Propagated {
            position: c.position,
            exited: false,
        };
    }

    let t_barrel = if pt > 0.0 {
        let a = px * px + py * py;
        let b = 2.0 * (x0 * px + y0 * py);
        let cc = x0 * x0 + y0 * y0 - radius * radius;
        let disc = b * b - 4.0 * a * cc;
        (disc >= 0.0).then(|| (-b + disc.sqrt()) / (2.0 * a)).filter(|&s| s > 0.0)
    } else {
        None
    };
    let t_endcap = if pz != 0.0 {
        let target_z = if pz > 0.0 { half_length } else { -half_length };
        let s = (target_z - z0) / pz;
        (s > 0.0).then_some(s)
    } else {
        None
    };

    let s = match (t_barrel, t_endcap) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => {
            return Propagated {
                position: c.position,
                exited: false,
            }
        }
    };

    Propagated {
        position: FourPosition {
            x: x0 + px * s,
            y: y0 + py * s,
            z: z0 + pz * s,
            t: t0 + e * s,
        },
        exited: true,
    }
}

/// `ParticlePropagator` module (`SPEC_FULL.md` §4.6): propagates every stable particle's track to
/// the edge of the tracking volume, exporting both the propagated `stableParticles` and the
/// subset with a well-defined helix crossing as `chargedHadrons`.
pub struct ParticlePropagator {
    input_array: String,
    radius_mm: f64,
    half_length_mm: f64,
    bz_tesla: f64,
}

impl Default for ParticlePropagator {
    fn default() -> Self {
        Self {
            input_array: "stableParticles".to_owned(),
            radius_mm: 1290.0,
            half_length_mm: 3000.0,
            bz_tesla: 3.8,
        }
    }
}

impl ParticlePropagator {
    /// Creates a propagator with standard collider-detector defaults (1.29 m barrel radius, 3.0 m
    /// half-length, 3.8 T axial field); `init` overrides from configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for ParticlePropagator {
    fn name(&self) -> &str {
        "ParticlePropagator"
    }

    fn init(&mut self, ctx: &mut InitContext) -> Result<()> {
        self.input_array = ctx.get_string("InputArray", &self.input_array);
        self.radius_mm = ctx.get_double("Radius", self.radius_mm);
        self.half_length_mm = ctx.get_double("HalfLength", self.half_length_mm);
        self.bz_tesla = ctx.get_double("Bz", self.bz_tesla);

        // `stableParticles` is already declared by the reader; this module overwrites its
        // contents in place (propagated positions) rather than re-declaring the export.
        ctx.import_array(&self.input_array)?;
        ctx.export_array("chargedHadrons")?;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ModuleContext) -> Result<()> {
        let ids = ctx.import_array(&self.input_array).to_vec();
        let mut charged_hadrons = Vec::new();

        for &id in &ids {
            let propagated = propagate_helix(ctx.factory.get(id), self.radius_mm, self.half_length_mm, self.bz_tesla);
            let c = ctx.factory.get_mut(id);
            if propagated.exited {
                c.position = propagated.position;
            }
            if c.charge != 0.0 && propagated.exited {
                charged_hadrons.push(id);
            }
        }

        ctx.export_array("stableParticles", ids);
        ctx.export_array("chargedHadrons", charged_hadrons);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::ArrayRegistry;
    use crate::candidate::FourVector;
    use crate::config::Config;
    use crate::factory::Factory;
    use crate::pdg::PdgTable;
    use crate::rng::RandomService;

    fn harness() -> (Factory, ArrayRegistry, RandomService, PdgTable) {
        (Factory::new(), ArrayRegistry::new(), RandomService::new(1), PdgTable::standard())
    }

    #[test]
    fn neutral_particle_reaches_barrel_in_straight_line() {
        let (mut factory, mut arrays, mut rng, pdg) = harness();
        let id = factory.new_candidate();
        *factory.get_mut(id) = Candidate {
            momentum: FourVector::new(10.0, 10.0, 0.0, 0.0),
            charge: 0.0,
            ..Candidate::default()
        };
        arrays.declare_export("Reader", "stableParticles").unwrap();
        arrays.export("stableParticles", vec![id]);

        let config = Config::parse("ParticlePropagator:\n  Radius: 1000.0\n  HalfLength: 3000.0\n").unwrap();
        let mut prop = ParticlePropagator::new();
        {
            let mut init_ctx = InitContext::new("ParticlePropagator".to_owned(), &mut arrays, config.module("ParticlePropagator"));
            prop.init(&mut init_ctx).unwrap();
        }
        {
            let mut ctx = ModuleContext::new(&mut factory, &mut arrays, &mut rng, &pdg, config.module("ParticlePropagator"));
            prop.process(&mut ctx).unwrap();
        }

        let moved = factory.get(id);
        assert!((moved.position.x - 1000.0).abs() < 1e-6);
        assert!((moved.position.y).abs() < 1e-6);
    }

    #[test]
    fn charged_particle_that_exits_is_recorded_as_charged_hadron() {
        let (mut factory, mut arrays, mut rng, pdg) = harness();
        let id = factory.new_candidate();
        *factory.get_mut(id) = Candidate {
            momentum: FourVector::new(50.0, 40.0, 30.0, 0.0),
            charge: 1.0,
            ..Candidate::default()
        };
        arrays.declare_export("Reader", "stableParticles").unwrap();
        arrays.export("stableParticles", vec![id]);

        let config = Config::parse("ParticlePropagator:\n  Radius: 1150.0\n  HalfLength: 2600.0\n  Bz: 3.8\n").unwrap();
        let mut prop = ParticlePropagator::new();
        {
            let mut init_ctx = InitContext::new("ParticlePropagator".to_owned(), &mut arrays, config.module("ParticlePropagator"));
            prop.init(&mut init_ctx).unwrap();
        }
        {
            let mut ctx = ModuleContext::new(&mut factory, &mut arrays, &mut rng, &pdg, config.module("ParticlePropagator"));
            prop.process(&mut ctx).unwrap();
        }

        assert_eq!(arrays.import("chargedHadrons").len(), 1);
    }
}
