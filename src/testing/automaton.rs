//! The state space walked by the linearizability search.

use std::hash::{Hash, Hasher};

/// A node in the linearization search: the sequential model state reached
/// so far together with how many actors of each thread have already been
/// linearized.
///
/// Two equal configurations have identical futures, so the verifier keeps
/// a visited set of them and explores each at most once. This relies on
/// the model's deep equality and stable hash contract.
#[derive(Clone, Debug)]
pub struct Configuration<S> {
    sequential: S,
    positions: Vec<usize>,
}

impl<S> Configuration<S> {
    pub fn new(sequential: S, positions: Vec<usize>) -> Configuration<S> {
        Configuration { sequential, positions }
    }
}

impl<S: Eq> PartialEq for Configuration<S> {
    fn eq(&self, other: &Self) -> bool {
        self.positions == other.positions && self.sequential == other.sequential
    }
}

impl<S: Eq> Eq for Configuration<S> {}

impl<S: Hash> Hash for Configuration<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sequential.hash(state);
        self.positions.hash(state);
    }
}
