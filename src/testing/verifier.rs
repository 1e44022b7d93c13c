use std::collections::HashSet;
use std::hash::Hash;

use super::automaton::Configuration;
use super::history::History;
use super::registry::OperationRegistry;

/// Contract a sequential model must satisfy to drive verification.
///
/// `Default` gives the initial state, `Clone` lets the search branch, and
/// `Eq` plus `Hash` must agree on deep state so equal configurations are
/// explored once. Any type with those bounds is a model; there is nothing
/// to implement beyond them.
pub trait SequentialSpec: Default + Clone + Eq + Hash {}

impl<S: Default + Clone + Eq + Hash> SequentialSpec for S {}

/// Nodes explored before the search gives up and reports an inconclusive
/// verdict instead of an answer.
pub const DEFAULT_SEARCH_BUDGET: u64 = 1_000_000;

/// Result of checking one history against the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Some legal linearization reproduces every recorded outcome.
    Linearizable,
    /// No legal linearization exists; the witness points at the earliest
    /// divergence found.
    NonLinearizable(Counterexample),
    /// The search budget ran out before the state space was covered.
    /// Neither a pass nor a violation.
    Inconclusive,
}

/// Where the search got stuck.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Counterexample {
    /// The single-threaded init part already disagrees with the model at
    /// this actor index. No search is involved.
    InitDivergence { index: usize },
    /// Every branch of the parallel search died. `frontier[t]` is how far
    /// into thread `t` the longest-surviving branch got before its next
    /// candidate diverged.
    Exhausted { linearized: usize, frontier: Vec<usize> },
    /// The parallel part linearized, but the single-threaded post part
    /// then diverged at this actor index on every complete branch.
    PostDivergence { index: usize },
}

/// Decides whether a recorded history is linearizable with respect to a
/// sequential model.
///
/// The search walks per-thread frontiers: at each step it tries to
/// linearize the next pending invocation of some thread, provided no other
/// pending invocation finished strictly before that one started. Each
/// candidate is replayed against a clone of the model and kept only when
/// the model reproduces the recorded outcome. Visited configurations are
/// memoized, which is what makes the search tractable on histories full of
/// commuting operations.
pub struct LinearizabilityVerifier<'r, C, S> {
    registry: &'r OperationRegistry<C, S>,
    budget: u64,
}

impl<'r, C, S: SequentialSpec> LinearizabilityVerifier<'r, C, S> {
    pub fn new(registry: &'r OperationRegistry<C, S>) -> LinearizabilityVerifier<'r, C, S> {
        LinearizabilityVerifier {
            registry,
            budget: DEFAULT_SEARCH_BUDGET,
        }
    }

    pub fn with_budget(registry: &'r OperationRegistry<C, S>, budget: u64) -> Self {
        LinearizabilityVerifier { registry, budget }
    }

    pub fn verify(&self, history: &History) -> Verdict {
        let mut model = S::default();

        // Init actors ran alone, so their only legal order is program
        // order.
        for (index, inv) in history.init.iter().enumerate() {
            let op = self.registry.op(inv.actor.op);
            let outcome = op.invoke_sequential(&mut model, &inv.actor.args);
            if outcome != inv.outcome {
                return Verdict::NonLinearizable(Counterexample::InitDivergence { index });
            }
        }

        let mut search = Search {
            registry: self.registry,
            history,
            budget: self.budget,
            explored: 0,
            visited: HashSet::new(),
            best_linearized: 0,
            best_frontier: vec![0; history.parallel.len()],
            best_post: None,
        };
        match search.dfs(model, vec![0; history.parallel.len()]) {
            Step::Found => Verdict::Linearizable,
            Step::Budget => Verdict::Inconclusive,
            Step::Exhausted => Verdict::NonLinearizable(match search.best_post {
                Some(index) => Counterexample::PostDivergence { index },
                None => Counterexample::Exhausted {
                    linearized: search.best_linearized,
                    frontier: search.best_frontier,
                },
            }),
        }
    }
}

enum Step {
    Found,
    Exhausted,
    Budget,
}

struct Search<'a, C, S> {
    registry: &'a OperationRegistry<C, S>,
    history: &'a History,
    budget: u64,
    explored: u64,
    visited: HashSet<Configuration<S>>,
    best_linearized: usize,
    best_frontier: Vec<usize>,
    best_post: Option<usize>,
}

impl<'a, C, S: SequentialSpec> Search<'a, C, S> {
    fn dfs(&mut self, model: S, positions: Vec<usize>) -> Step {
        self.explored += 1;
        if self.explored > self.budget {
            return Step::Budget;
        }
        if !self
            .visited
            .insert(Configuration::new(model.clone(), positions.clone()))
        {
            return Step::Exhausted;
        }

        let linearized: usize = positions.iter().sum();
        if linearized > self.best_linearized {
            self.best_linearized = linearized;
            self.best_frontier = positions.clone();
        }
        if linearized == self.history.parallel_len() {
            return self.replay_post(model);
        }

        for t in 0..positions.len() {
            let candidate = match self.history.parallel[t].get(positions[t]) {
                Some(inv) => inv,
                None => continue,
            };
            // Real-time constraint: an invocation that ended before this
            // one started must be linearized first.
            let mut eligible = true;
            for (u, thread) in self.history.parallel.iter().enumerate() {
                if u == t {
                    continue;
                }
                if let Some(pending) = thread.get(positions[u]) {
                    if pending.end < candidate.start {
                        eligible = false;
                        break;
                    }
                }
            }
            if !eligible {
                continue;
            }

            let mut next = model.clone();
            let op = self.registry.op(candidate.actor.op);
            let outcome = op.invoke_sequential(&mut next, &candidate.actor.args);
            if outcome != candidate.outcome {
                continue;
            }
            let mut advanced = positions.clone();
            advanced[t] += 1;
            match self.dfs(next, advanced) {
                Step::Exhausted => continue,
                done => return done,
            }
        }
        Step::Exhausted
    }

    fn replay_post(&mut self, mut model: S) -> Step {
        for (index, inv) in self.history.post.iter().enumerate() {
            let op = self.registry.op(inv.actor.op);
            let outcome = op.invoke_sequential(&mut model, &inv.actor.args);
            if outcome != inv.outcome {
                match self.best_post {
                    Some(best) if best >= index => {}
                    _ => self.best_post = Some(index),
                }
                return Step::Exhausted;
            }
        }
        Step::Found
    }
}

/// A verifier that accepts every history. Stands in for the real one when
/// verification is disabled and only crashes and invariant violations are
/// of interest.
pub struct EpsilonVerifier;

impl EpsilonVerifier {
    pub fn verify(&self, _history: &History) -> Verdict {
        Verdict::Linearizable
    }
}
