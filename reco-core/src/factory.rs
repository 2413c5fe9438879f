//! Per-event candidate pool (`SPEC_FULL.md` §4.1).
//!
//! `Candidate` does not hold a reference back to its owning `Factory` (Rust ownership makes a
//! literal back-pointer awkward); instead every cross-candidate operation — composition,
//! cloning, overlap testing — is a method on `Factory` that takes [`CandidateId`]s, matching the
//! arena-of-indices re-architecture called for in the spec's design notes (§9).

use crate::candidate::{Candidate, CandidateId};

/// Owns every [`Candidate`] created during the current event; reset at event boundaries.
#[derive(Debug, Default)]
pub struct Factory {
    pool: Vec<Candidate>,
}

impl Factory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces a fresh, zero-initialised candidate bound to this factory. Never fails.
    pub fn new_candidate(&mut self) -> CandidateId {
        let id = CandidateId(u32::try_from(self.pool.len()).expect("event pool exceeds u32::MAX"));
        self.pool.push(Candidate::default());
        id
    }

    /// Borrows a candidate.
    #[must_use]
    pub fn get(&self, id: CandidateId) -> &Candidate {
        &self.pool[id.0 as usize]
    }

    /// Mutably borrows a candidate.
    pub fn get_mut(&mut self, id: CandidateId) -> &mut Candidate {
        &mut self.pool[id.0 as usize]
    }

    /// Appends `child` to `parent`'s composition. No uniqueness enforcement: the same child may
    /// be added to several parents, and the same child may be added twice to one parent
    /// (`SPEC_FULL.md` §4.1).
    pub fn add_candidate(&mut self, parent: CandidateId, child: CandidateId) {
        self.pool[parent.0 as usize].composition.push(child);
    }

    /// Produces a shallow copy of `source`'s attributes bound to this factory, with a fresh,
    /// empty composition (`SPEC_FULL.md` §4.1). Returns the new candidate's id.
    pub fn clone_candidate(&mut self, source: CandidateId) -> CandidateId {
        let mut clone = self.pool[source.0 as usize].clone();
        clone.composition.clear();
        let id = CandidateId(u32::try_from(self.pool.len()).expect("event pool exceeds u32::MAX"));
        self.pool.push(clone);
        id
    }

    /// True iff `a` appears in `b`'s composition, `b` appears in `a`'s composition, or the two
    /// compositions share at least one entry (`SPEC_FULL.md` §4.1, used for lepton/jet
    /// cross-cleaning).
    #[must_use]
    pub fn overlaps(&self, a: CandidateId, b: CandidateId) -> bool {
        let ca = &self.pool[a.0 as usize].composition;
        let cb = &self.pool[b.0 as usize].composition;
        if ca.contains(&b) || cb.contains(&a) {
            return true;
        }
        ca.iter().any(|x| cb.contains(x))
    }

    /// Number of candidates currently held by the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// True if the pool currently holds no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Releases every candidate in the pool, ready for the next event. Idempotent: calling
    /// `clear` on an already-empty pool is a no-op (`SPEC_FULL.md` §8).
    pub fn clear(&mut self) {
        self.pool.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_candidate_is_zero_initialised() {
        let mut f = Factory::new();
        let id = f.new_candidate();
        assert_eq!(*f.get(id), Candidate::default());
    }

    #[test]
    fn add_candidate_builds_composition_without_uniqueness() {
        let mut f = Factory::new();
        let parent = f.new_candidate();
        let child = f.new_candidate();
        f.add_candidate(parent, child);
        f.add_candidate(parent, child);
        assert_eq!(f.get(parent).composition, vec![child, child]);
    }

    #[test]
    fn clone_is_shallow_with_empty_composition() {
        let mut f = Factory::new();
        let parent = f.new_candidate();
        let child = f.new_candidate();
        f.add_candidate(parent, child);
        f.get_mut(parent).pid = 11;

        let clone = f.clone_candidate(parent);
        assert_eq!(f.get(clone).pid, 11);
        assert!(f.get(clone).composition.is_empty());
        assert_ne!(clone, parent);
    }

    #[test]
    fn overlaps_detects_parent_child_and_shared_children() {
        let mut f = Factory::new();
        let a = f.new_candidate();
        let b = f.new_candidate();
        let shared = f.new_candidate();
        f.add_candidate(a, shared);
        f.add_candidate(b, shared);
        assert!(f.overlaps(a, b));

        let c = f.new_candidate();
        let d = f.new_candidate();
        f.add_candidate(c, d);
        assert!(f.overlaps(c, d));

        let e = f.new_candidate();
        let g = f.new_candidate();
        assert!(!f.overlaps(e, g));
    }

    #[test]
    fn clear_is_idempotent() {
        let mut f = Factory::new();
        f.new_candidate();
        f.clear();
        assert!(f.is_empty());
        f.clear();
        assert!(f.is_empty());
    }
}
