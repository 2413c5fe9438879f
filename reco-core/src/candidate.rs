//! The universal per-event object (`SPEC_FULL.md` §3, design note §9: "flat record, not deep
//! inheritance").
//!
//! Every calorimeter tower, track, jet, lepton and photon the pipeline produces is one
//! `Candidate`, fields unioned across what any physics module might want to set. Cross-candidate
//! references (composition, generator mother/daughter links) are plain arena indices rather than
//! pointers or `TRef`s; the arena itself is [`crate::factory::Factory`].

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Index of a [`Candidate`] inside a [`crate::factory::Factory`]'s per-event arena. Never valid
/// across an event boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub u32);

/// A Lorentz four-vector, used both for momentum and for four-area (`SPEC_FULL.md` §3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FourVector {
    /// Energy (or area "energy" component for jet areas).
    pub e: f64,
    /// x-momentum component.
    pub px: f64,
    /// y-momentum component.
    pub py: f64,
    /// z-momentum component.
    pub pz: f64,
}

impl FourVector {
    /// Builds a four-vector from its components.
    #[must_use]
    pub const fn new(e: f64, px: f64, py: f64, pz: f64) -> Self {
        Self { e, px, py, pz }
    }

    /// Transverse momentum.
    #[must_use]
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    /// Pseudorapidity; `0.0` for a vector along the beam axis with zero pT (degenerate, but
    /// never reached by physical calorimeter towers since they always carry transverse
    /// momentum).
    #[must_use]
    pub fn eta(&self) -> f64 {
        let p = (self.px * self.px + self.py * self.py + self.pz * self.pz).sqrt();
        if p <= self.pz.abs() {
            return if self.pz >= 0.0 { f64::INFINITY } else { f64::NEG_INFINITY };
        }
        0.5 * ((p + self.pz) / (p - self.pz)).ln()
    }

    /// Azimuthal angle in `(-pi, pi]`.
    #[must_use]
    pub fn phi(&self) -> f64 {
        self.py.atan2(self.px)
    }

    /// Rapidity (not pseudorapidity): `0.5 * ln((E+pz)/(E-pz))`.
    #[must_use]
    pub fn rapidity(&self) -> f64 {
        0.5 * ((self.e + self.pz) / (self.e - self.pz)).ln()
    }

    /// Invariant mass squared, `E^2 - |p|^2`; may be (slightly) negative due to smearing or
    /// rounding, by design left unclamped for callers that need to detect that.
    #[must_use]
    pub fn mass_squared(&self) -> f64 {
        self.e.mul_add(self.e, -(self.px * self.px + self.py * self.py + self.pz * self.pz))
    }

    /// Invariant mass, `sqrt(max(0, m^2))`.
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass_squared().max(0.0).sqrt()
    }
}

impl std::ops::Add for FourVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            e: self.e + rhs.e,
            px: self.px + rhs.px,
            py: self.py + rhs.py,
            pz: self.pz + rhs.pz,
        }
    }
}

impl std::ops::AddAssign for FourVector {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// A spacetime position (`SPEC_FULL.md` §3's four-position), kept as a separate type from
/// [`FourVector`] even though the shape is the same, since the physical meaning of `t` (time,
/// not energy) differs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FourPosition {
    /// x coordinate, mm.
    pub x: f64,
    /// y coordinate, mm.
    pub y: f64,
    /// z coordinate, mm.
    pub z: f64,
    /// time coordinate, mm/c.
    pub t: f64,
}

bitflags! {
    /// Boolean flags carried by a [`Candidate`] (`SPEC_FULL.md` §3).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CandidateFlags: u8 {
        /// Particle originates from a pile-up interaction.
        const IS_PU = 1 << 0;
        /// Reconstructed object was tagged as pile-up (post-hoc, by a pile-up-jet-ID module).
        const IS_RECO_PU = 1 << 1;
        /// Candidate is a constituent of some other candidate's composition (not a top-level
        /// output object).
        const IS_CONSTITUENT = 1 << 2;
        /// Candidate is an electromagnetic-calorimeter candidate (electron/photon-like hit).
        const IS_EM_CAND = 1 << 3;
        /// Candidate is a fake object inserted by a module for bookkeeping, not a physical hit.
        const IS_FAKE_OBJECT = 1 << 4;
    }
}

/// The seven jet-flavour definitions of `SPEC_FULL.md` §3/§4.5.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[repr(usize)]
pub enum FlavourVariant {
    /// Algorithmic definition (heaviest-in-cone, falling back to highest-pT).
    Algo = 0,
    /// Secondary "default" definition (max PID in cone).
    Default = 1,
    /// Physics (matrix-element) definition.
    Physics = 2,
    /// Nearest post-shower parton, algorithmic filtering.
    Nearest2 = 3,
    /// Nearest matrix-element (LHE) parton.
    Nearest3 = 4,
    /// Heaviest parton in cone.
    Heaviest = 5,
    /// Highest-pT parton in cone.
    HighestPt = 6,
}

/// Number of [`FlavourVariant`]s.
pub const FLAVOUR_VARIANT_COUNT: usize = 7;

/// All flavour-assignment results for a jet: one PID-like value and one tag bit per variant
/// (`SPEC_FULL.md` §4.5). `0` means "no flavour assigned" for both flavour and tag arrays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlavourResult {
    /// Assigned flavour per variant; values are in `{0, 1, 2, 3, 4, 5, 21}`.
    pub flavour: [i32; FLAVOUR_VARIANT_COUNT],
    /// Tag bit per variant, set iff the shared per-jet random draw fell below the matching
    /// efficiency formula.
    pub tag: [bool; FLAVOUR_VARIANT_COUNT],
}

impl FlavourResult {
    /// Reads the flavour value assigned for `variant`.
    #[must_use]
    pub fn get(&self, variant: FlavourVariant) -> i32 {
        self.flavour[variant as usize]
    }

    /// Sets the flavour value assigned for `variant`.
    pub fn set(&mut self, variant: FlavourVariant, value: i32) {
        self.flavour[variant as usize] = value;
    }

    /// Reads the tag bit for `variant`.
    #[must_use]
    pub fn tagged(&self, variant: FlavourVariant) -> bool {
        self.tag[variant as usize]
    }
}

/// Up to three subjets recorded by the trimmer (`SPEC_FULL.md` §4.4), plus the derived mass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubstructureMass {
    /// Jet mass after the grooming algorithm.
    pub mass: f64,
    /// Number of subjets that survived grooming.
    pub subjet_count: u8,
    /// Momenta of up to three leading subjets (unused slots are zeroed).
    pub subjets: [FourVector; 3],
}

/// N-subjettiness and grooming observables attached to a jet above the pT threshold
/// (`SPEC_FULL.md` §4.4). All fields are sentinel-zero for jets at or below the threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Substructure {
    /// 1-subjettiness.
    pub tau1: f64,
    /// 2-subjettiness.
    pub tau2: f64,
    /// 3-subjettiness.
    pub tau3: f64,
    /// Trimmed-jet observables (the only grooming algorithm this crate computes; see
    /// `DESIGN.md`).
    pub trimmed: SubstructureMass,
    /// Pruned-jet observables; not computed by this implementation (sentinel zero), see
    /// `DESIGN.md`.
    pub pruned: SubstructureMass,
    /// Soft-drop observables; not computed by this implementation (sentinel zero), see
    /// `DESIGN.md`.
    pub soft_drop: SubstructureMass,
    /// `largest_subjet_mass / trimmed_mass`, `1.0` if `trimmed_mass == 0`.
    pub mass_drop: f64,
    /// W-boson tag (`mass_drop < 0.4 && 60 < trimmed_mass < 120`).
    pub w_tag: bool,
    /// Top-quark tag (`subjet_count >= 3 && 140 < trimmed_mass < 230`).
    pub top_tag: bool,
    /// Higgs-boson tag (`mass_drop < 0.4 && 100 < trimmed_mass < 140`).
    pub h_tag: bool,
}

/// Per-tower (energy, time) sample accumulated while a tower is open (`SPEC_FULL.md` §4.3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSample {
    /// ECAL energy of the contributing particle.
    pub energy: f64,
    /// Timing of the contributing particle.
    pub time: f64,
}

/// Isolation sums accumulated by the isolation module (`SPEC_FULL.md` §3/§4.6).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IsolationVars {
    /// Delta-beta pile-up-corrected isolation.
    pub delta_beta_corrected: f64,
    /// rho-corrected isolation.
    pub rho_corrected: f64,
    /// Track-only isolation (no neutral contribution).
    pub track_only: f64,
    /// Charged-hadron energy in the isolation cone.
    pub charged_hadron_energy: f64,
    /// Neutral-hadron energy in the isolation cone.
    pub neutral_energy: f64,
    /// Charged pile-up energy in the isolation cone.
    pub charged_pu_energy: f64,
    /// All-particle energy in the isolation cone.
    pub all_particle_energy: f64,
}

/// The universal reconstructed-object record (`SPEC_FULL.md` §3).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Four-momentum.
    pub momentum: FourVector,
    /// Four-position (vertex or, for towers, the tower-centre / time sample).
    pub position: FourPosition,
    /// Four-area, populated by the jet finder when an area definition is configured.
    pub area: FourVector,

    /// PDG Monte-Carlo id, `0` if not a generator-level particle (e.g. a tower).
    pub pid: i32,
    /// Generator status code.
    pub status: i32,
    /// Index of the first mother in `allParticles`, or `-1`.
    pub m1: i32,
    /// Index of the second mother in `allParticles`, or `-1`.
    pub m2: i32,
    /// Index of the first daughter in `allParticles`, or `-1`.
    pub d1: i32,
    /// Index of the second daughter in `allParticles`, or `-1`.
    pub d2: i32,
    /// Electric charge in units of the elementary charge.
    pub charge: f64,
    /// Spin quantum number as carried by the generator (`0` if unused).
    pub spin: f64,
    /// Rest mass as carried by the generator (may differ from `momentum.mass()` before
    /// smearing).
    pub mass: f64,

    /// Boolean status flags.
    pub flags: CandidateFlags,

    /// Isolation sums.
    pub isolation: IsolationVars,

    /// Energy deposited in the electromagnetic section of the calorimeter.
    pub e_em: f64,
    /// Energy deposited in the hadronic section of the calorimeter.
    pub e_had: f64,

    /// Jet flavour / b-tag results.
    pub flavour: FlavourResult,
    /// Tau-lepton tag.
    pub tau_tag: bool,

    /// Jet substructure observables.
    pub substructure: Substructure,

    /// Maximum absolute η distance of any constituent from the jet axis (`SPEC_FULL.md` §4.4
    /// step 4). `0.0` for non-jet candidates.
    pub delta_eta: f64,
    /// Maximum absolute (wraparound-aware) φ distance of any constituent from the jet axis.
    /// `0.0` for non-jet candidates.
    pub delta_phi: f64,

    /// Pile-up-jet-ID observables (mean-pT-squared weighted by this jet's constituents' pile-up
    /// fraction); `0.0` if not computed.
    pub pileup_jet_id: f64,

    /// Tower edges `[eta_lo, eta_hi, phi_lo, phi_hi]`, populated only for calorimeter towers.
    pub tower_edges: [f64; 4],
    /// Per-hit `(energy, time)` samples accumulated while the tower was open.
    pub tower_times: Vec<TimeSample>,

    /// This candidate's composition: an ordered list of child candidates in the *same* event
    /// pool (`SPEC_FULL.md` §4.1).
    pub composition: Vec<CandidateId>,
}

impl Candidate {
    /// `PT`, `Eta`, `Phi`, `Rapidity` kinematic accessors derived from `momentum`
    /// (`SPEC_FULL.md` §3, invariant (d)).
    #[must_use]
    pub fn pt(&self) -> f64 {
        self.momentum.pt()
    }

    /// See [`Candidate::pt`].
    #[must_use]
    pub fn eta(&self) -> f64 {
        self.momentum.eta()
    }

    /// See [`Candidate::pt`].
    #[must_use]
    pub fn phi(&self) -> f64 {
        self.momentum.phi()
    }

    /// See [`Candidate::pt`].
    #[must_use]
    pub fn rapidity(&self) -> f64 {
        self.momentum.rapidity()
    }

    /// Resets this candidate to its all-default state (`SPEC_FULL.md` §4.1, `Clear`). Used only
    /// by [`crate::factory::Factory`]'s pool recycling, never by application code directly.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Smallest angular separation between two azimuthal angles, wrapped into `[0, pi]`.
#[must_use]
pub fn delta_phi(a: f64, b: f64) -> f64 {
    let mut d = (a - b) % (2.0 * std::f64::consts::PI);
    if d > std::f64::consts::PI {
        d -= 2.0 * std::f64::consts::PI;
    } else if d < -std::f64::consts::PI {
        d += 2.0 * std::f64::consts::PI;
    }
    d.abs()
}

/// Angular distance `sqrt(delta_eta^2 + delta_phi^2)`.
#[must_use]
pub fn delta_r(eta_a: f64, phi_a: f64, eta_b: f64, phi_b: f64) -> f64 {
    let deta = eta_a - eta_b;
    let dphi = delta_phi(phi_a, phi_b);
    deta.hypot(dphi)
}
