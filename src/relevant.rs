//! The relevant-atom set R used by BFWS.
//!
//! R holds the atoms that some IW simulation found on a witness path to a
//! subgoal, each annotated with whether the search has reached it since.
//! `|R reached|` is the second half of the BFWS novelty type.

use hashbrown::HashMap;

use crate::object::{Object, VariableIdx};
use crate::state::{Atom, State};

/// Status of one relevant atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomStatus {
    /// Relevant, not yet achieved on the way to the current node.
    Unreached,
    /// Relevant and achieved somewhere along the current path.
    Reached,
}

/// A set of goal-relevant atoms with per-atom reached marks.
///
/// Atoms outside the map are irrelevant; marking ignores them.
#[derive(Debug, Clone, Default)]
pub struct RelevantAtomSet {
    atoms: HashMap<Atom, AtomStatus>,
}

impl RelevantAtomSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an atom as relevant and unreached. Re-inserting a reached
    /// atom leaves it reached.
    pub fn insert_unreached(&mut self, atom: Atom) {
        self.atoms.entry(atom).or_insert(AtomStatus::Unreached);
    }

    /// Mark every relevant atom that holds in `state` as reached.
    ///
    /// With `mark_negative` unset, false-valued boolean atoms are not
    /// markable: only positive information counts as progress.
    pub fn mark_reached(&mut self, state: &State, mark_negative: bool) {
        for i in 0..state.num_variables() {
            let var = VariableIdx::new(i as u32);
            let value = state.get(var);
            if !mark_negative && value == Object::Bool(false) {
                continue;
            }
            if let Some(status) = self.atoms.get_mut(&(var, value)) {
                *status = AtomStatus::Reached;
            }
        }
    }

    pub fn status(&self, atom: &Atom) -> Option<AtomStatus> {
        self.atoms.get(atom).copied()
    }

    pub fn num_reached(&self) -> u32 {
        self.atoms
            .values()
            .filter(|s| **s == AtomStatus::Reached)
            .count() as u32
    }

    pub fn num_unreached(&self) -> u32 {
        self.atoms
            .values()
            .filter(|s| **s == AtomStatus::Unreached)
            .count() as u32
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    fn var(raw: u32) -> VariableIdx {
        VariableIdx::new(raw)
    }

    #[test]
    fn atoms_start_unreached() {
        let mut set = RelevantAtomSet::new();
        set.insert_unreached((var(0), Object::Bool(true)));
        assert_eq!(set.num_unreached(), 1);
        assert_eq!(set.num_reached(), 0);
    }

    #[test]
    fn marking_flips_matching_atoms_only() {
        let mut set = RelevantAtomSet::new();
        set.insert_unreached((var(0), Object::Bool(true)));
        set.insert_unreached((var(1), Object::Bool(true)));

        let state = State::new(vec![Object::Bool(true), Object::Bool(false)]);
        set.mark_reached(&state, false);

        assert_eq!(set.status(&(var(0), Object::Bool(true))), Some(AtomStatus::Reached));
        assert_eq!(
            set.status(&(var(1), Object::Bool(true))),
            Some(AtomStatus::Unreached)
        );
        assert_eq!(set.num_reached(), 1);
    }

    #[test]
    fn negative_atoms_need_the_mark_negative_flag() {
        let mut set = RelevantAtomSet::new();
        set.insert_unreached((var(0), Object::Bool(false)));
        let state = State::new(vec![Object::Bool(false)]);

        set.mark_reached(&state, false);
        assert_eq!(set.num_reached(), 0);

        set.mark_reached(&state, true);
        assert_eq!(set.num_reached(), 1);
    }

    #[test]
    fn irrelevant_atoms_are_ignored() {
        let mut set = RelevantAtomSet::new();
        set.insert_unreached((var(0), Object::Int(3)));
        let state = State::new(vec![Object::Int(5)]);
        set.mark_reached(&state, true);
        assert_eq!(set.num_reached(), 0);
    }

    #[test]
    fn reinsertion_does_not_reset_reached_marks() {
        let mut set = RelevantAtomSet::new();
        set.insert_unreached((var(0), Object::Bool(true)));
        set.mark_reached(&State::new(vec![Object::Bool(true)]), false);
        set.insert_unreached((var(0), Object::Bool(true)));
        assert_eq!(set.num_reached(), 1);
    }
}
