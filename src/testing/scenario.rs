use super::registry::OperationRegistry;
use super::value::Value;

/// One concrete invocation: an operation index into the registry plus the
/// generated argument values. Actors carry no identity beyond their
/// position in a scenario.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub op: usize,
    pub args: Vec<Value>,
}

impl Actor {
    pub fn render<C, S>(&self, registry: &OperationRegistry<C, S>) -> String {
        let name = registry.op(self.op).name();
        let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
        format!("{}({})", name, args.join(", "))
    }
}

/// A generated test case: an init part run single-threaded before
/// parallelism begins, a parallel part partitioned into per-thread actor
/// sequences, and a post part run single-threaded afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scenario {
    pub init: Vec<Actor>,
    pub parallel: Vec<Vec<Actor>>,
    pub post: Vec<Actor>,
}

impl Scenario {
    pub fn threads(&self) -> usize {
        self.parallel.len()
    }

    pub fn total_actors(&self) -> usize {
        let parallel: usize = self.parallel.iter().map(|t| t.len()).sum();
        self.init.len() + parallel + self.post.len()
    }

    pub fn render<C, S>(&self, registry: &OperationRegistry<C, S>) -> String {
        let mut out = String::new();
        if !self.init.is_empty() {
            out.push_str("Execution scenario (init part):\n");
            out.push_str(&render_line(&self.init, registry));
            out.push('\n');
        }
        out.push_str("Execution scenario (parallel part):\n");
        for thread in &self.parallel {
            out.push_str(&render_line(thread, registry));
            out.push('\n');
        }
        if !self.post.is_empty() {
            out.push_str("Execution scenario (post part):\n");
            out.push_str(&render_line(&self.post, registry));
            out.push('\n');
        }
        out
    }
}

fn render_line<C, S>(actors: &[Actor], registry: &OperationRegistry<C, S>) -> String {
    let rendered: Vec<String> = actors.iter().map(|a| a.render(registry)).collect();
    format!("[{}]", rendered.join(", "))
}
