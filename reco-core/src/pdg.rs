//! Read-only PDG particle-property lookup.
//!
//! The real PDG database is an external collaborator (see `SPEC_FULL.md` §1); this module
//! provides the narrow read-only slice of it the reconstruction pipeline actually consults:
//! mass, charge and a "is this a coloured parton" flag, keyed by PDG Monte-Carlo id.

use rustc_hash::FxHashMap;

/// One entry of the PDG table.
#[derive(Clone, Debug, PartialEq)]
pub struct PdgEntry {
    /// Short particle name, for diagnostics only.
    pub name: &'static str,
    /// Mass in GeV.
    pub mass: f64,
    /// Electric charge in units of the elementary charge.
    pub charge: f64,
    /// True for quarks (1-6) and the gluon (21).
    pub is_parton: bool,
}

const DEFAULT_ENTRY: PdgEntry = PdgEntry {
    name: "unknown",
    mass: 0.0,
    charge: 0.0,
    is_parton: false,
};

/// Read-only PID -> [`PdgEntry`] table, built once and shared (by reference) across a run.
pub struct PdgTable {
    entries: FxHashMap<i32, PdgEntry>,
}

impl PdgTable {
    /// Builds the built-in table covering the species a generator-level event typically carries:
    /// quarks, the gluon, the photon, charged leptons, and the handful of long-lived hadrons a
    /// fast simulation needs a charge/mass for. Unknown PIDs fall back to [`DEFAULT_ENTRY`]
    /// rather than erroring, mirroring the calorimeter's own PID-0 fallback (`SPEC_FULL.md` §4.3).
    #[must_use]
    pub fn standard() -> Self {
        let mut entries = FxHashMap::default();
        let mut add = |id: i32, name: &'static str, mass: f64, charge: f64, is_parton: bool| {
            entries.insert(
                id,
                PdgEntry {
                    name,
                    mass,
                    charge,
                    is_parton,
                },
            );
        };

        add(1, "d", 0.0048, -1.0 / 3.0, true);
        add(2, "u", 0.0022, 2.0 / 3.0, true);
        add(3, "s", 0.095, -1.0 / 3.0, true);
        add(4, "c", 1.27, 2.0 / 3.0, true);
        add(5, "b", 4.18, -1.0 / 3.0, true);
        add(6, "t", 172.76, 2.0 / 3.0, true);
        add(21, "g", 0.0, 0.0, true);
        add(22, "gamma", 0.0, 0.0, false);
        add(11, "e-", 0.000_511, -1.0, false);
        add(13, "mu-", 0.105_658, -1.0, false);
        add(15, "tau-", 1.776_86, -1.0, false);
        add(12, "nu_e", 0.0, 0.0, false);
        add(14, "nu_mu", 0.0, 0.0, false);
        add(16, "nu_tau", 0.0, 0.0, false);
        add(211, "pi+", 0.139_570, 1.0, false);
        add(111, "pi0", 0.134_977, 0.0, false);
        add(321, "K+", 0.493_677, 1.0, false);
        add(2212, "p", 0.938_272, 1.0, false);
        add(2112, "n", 0.939_565, 0.0, false);

        // antiparticles: same mass, opposite charge, mirrored id
        for id in [1, 2, 3, 4, 5, 6, 11, 13, 15, 211, 321, 2212] {
            if let Some(e) = entries.get(&id).cloned() {
                entries.insert(
                    -id,
                    PdgEntry {
                        charge: -e.charge,
                        ..e
                    },
                );
            }
        }

        Self { entries }
    }

    /// Looks up `pid`, returning the built-in default entry for unknown ids.
    #[must_use]
    pub fn lookup(&self, pid: i32) -> PdgEntry {
        self.entries.get(&pid).cloned().unwrap_or(DEFAULT_ENTRY)
    }

    /// True for quarks (|pid| in 1..=6) and the gluon (pid == 21).
    #[must_use]
    pub fn is_quark_or_gluon(pid: i32) -> bool {
        (1..=6).contains(&pid.abs()) || pid == 21
    }
}

impl Default for PdgTable {
    fn default() -> Self {
        Self::standard()
    }
}
