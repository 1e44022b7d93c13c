use super::registry::OperationRegistry;
use super::scenario::Actor;
use super::value::Outcome;

/// One recorded actor execution: the outcome plus start and end tokens
/// drawn from the execution's shared atomic counter.
///
/// Tokens are not wall-clock times. They only bound the orderings the
/// verifier may consider: if one invocation's end token precedes another's
/// start token, the two did not overlap and must be linearized in that
/// order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub actor: Actor,
    pub outcome: Outcome,
    pub start: u64,
    pub end: u64,
}

impl Invocation {
    /// True when the real-time intervals of `self` and `other` overlap,
    /// leaving both linearization orders eligible.
    pub fn overlaps(&self, other: &Invocation) -> bool {
        !(self.end < other.start || other.end < self.start)
    }
}

/// Everything recorded while executing one scenario: the init results in
/// program order, the parallel results per thread in program order, and
/// the post results. Immutable once execution completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct History {
    pub init: Vec<Invocation>,
    pub parallel: Vec<Vec<Invocation>>,
    pub post: Vec<Invocation>,
}

impl History {
    pub fn parallel_len(&self) -> usize {
        self.parallel.iter().map(|t| t.len()).sum()
    }

    pub fn render<C, S>(&self, registry: &OperationRegistry<C, S>) -> String {
        let mut out = String::new();
        if !self.init.is_empty() {
            out.push_str("Init part:\n");
            out.push_str(&render_line(&self.init, registry));
            out.push('\n');
        }
        out.push_str("Parallel part:\n");
        for thread in &self.parallel {
            out.push_str(&render_line(thread, registry));
            out.push('\n');
        }
        if !self.post.is_empty() {
            out.push_str("Post part:\n");
            out.push_str(&render_line(&self.post, registry));
            out.push('\n');
        }
        out
    }
}

fn render_line<C, S>(invocations: &[Invocation], registry: &OperationRegistry<C, S>) -> String {
    let rendered: Vec<String> = invocations
        .iter()
        .map(|inv| {
            format!(
                "{}: {} (start={}, end={})",
                inv.actor.render(registry),
                inv.outcome,
                inv.start,
                inv.end
            )
        })
        .collect();
    format!("[{}]", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::super::value::Value;
    use super::*;

    fn invocation(start: u64, end: u64) -> Invocation {
        Invocation {
            actor: Actor { op: 0, args: vec![] },
            outcome: Outcome::Returned(Value::Unit),
            start,
            end,
        }
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = invocation(0, 3);
        let b = invocation(1, 2);
        let c = invocation(4, 5);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }
}
