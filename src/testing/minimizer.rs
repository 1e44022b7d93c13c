use super::scenario::Scenario;

/// Greedy scenario reducer.
///
/// Given a failing scenario and a callback that re-runs a candidate and
/// reports whether the same kind of failure reproduces, the minimizer
/// repeatedly drops a single actor, keeps the candidate when the failure
/// survives, and stops at a local minimum: a scenario where removing any
/// one actor makes the failure disappear. A parallel thread left without
/// actors is removed entirely.
///
/// The callback decides what counts as the same failure, so the caller can
/// require a matching verdict kind rather than any failure at all.
pub struct ScenarioMinimizer<F> {
    reproduce: F,
}

impl<F> ScenarioMinimizer<F> {
    pub fn new(reproduce: F) -> ScenarioMinimizer<F> {
        ScenarioMinimizer { reproduce }
    }

    /// Shrink `scenario`, starting from a known failure `witness`. Returns
    /// the reduced scenario together with the witness of its failure.
    pub fn minimize<T>(&mut self, scenario: Scenario, witness: T) -> (Scenario, T)
    where
        F: FnMut(&Scenario) -> Option<T>,
    {
        let mut current = scenario;
        let mut witness = witness;
        while let Some((smaller, w)) = self.reduce_once(&current) {
            current = smaller;
            witness = w;
        }
        (current, witness)
    }

    fn reduce_once<T>(&mut self, scenario: &Scenario) -> Option<(Scenario, T)>
    where
        F: FnMut(&Scenario) -> Option<T>,
    {
        // Later actors first: failures usually hinge on the early prefix,
        // so the tail shrinks fastest.
        for t in (0..scenario.parallel.len()).rev() {
            for at in (0..scenario.parallel[t].len()).rev() {
                let mut candidate = scenario.clone();
                candidate.parallel[t].remove(at);
                if candidate.parallel[t].is_empty() {
                    candidate.parallel.remove(t);
                }
                if let Some(w) = (self.reproduce)(&candidate) {
                    return Some((candidate, w));
                }
            }
        }
        for at in (0..scenario.init.len()).rev() {
            let mut candidate = scenario.clone();
            candidate.init.remove(at);
            if let Some(w) = (self.reproduce)(&candidate) {
                return Some((candidate, w));
            }
        }
        for at in (0..scenario.post.len()).rev() {
            let mut candidate = scenario.clone();
            candidate.post.remove(at);
            if let Some(w) = (self.reproduce)(&candidate) {
                return Some((candidate, w));
            }
        }
        None
    }
}
