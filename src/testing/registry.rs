use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;

use super::value::{Outcome, Value};

/// A source of generated argument values for one operation parameter.
///
/// Generators are invoked independently for every occurrence of the
/// operation in a scenario, so there is no cross-actor correlation.
pub trait ParamGen: Send + Sync {
    fn next(&self, rng: &mut StdRng) -> Value;
}

/// Generates small integers in `[lo, hi)`.
///
/// The default band is `[-5, 11)`: small enough that generated keys
/// collide often, which is where container bugs live.
pub struct IntGen {
    lo: i64,
    hi: i64,
}

impl IntGen {
    pub fn new(lo: i64, hi: i64) -> IntGen {
        assert!(lo < hi, "empty generator range");
        IntGen { lo, hi }
    }
}

impl Default for IntGen {
    fn default() -> IntGen {
        IntGen { lo: -5, hi: 11 }
    }
}

impl ParamGen for IntGen {
    fn next(&self, rng: &mut StdRng) -> Value {
        Value::Int(rng.gen_range(self.lo, self.hi))
    }
}

/// Generates `true` or `false` with equal probability.
pub struct BoolGen;

impl ParamGen for BoolGen {
    fn next(&self, rng: &mut StdRng) -> Value {
        Value::Bool(rng.gen())
    }
}

/// Parameter slots of an operation, tagged by arity.
pub enum Params {
    Nullary,
    Unary(Arc<dyn ParamGen>),
    Binary(Arc<dyn ParamGen>, Arc<dyn ParamGen>),
}

impl Params {
    pub fn arity(&self) -> usize {
        match self {
            Params::Nullary => 0,
            Params::Unary(_) => 1,
            Params::Binary(_, _) => 2,
        }
    }

    pub(crate) fn generate(&self, rng: &mut StdRng) -> Vec<Value> {
        match self {
            Params::Nullary => Vec::new(),
            Params::Unary(a) => vec![a.next(rng)],
            Params::Binary(a, b) => vec![a.next(rng), b.next(rng)],
        }
    }
}

type ConcurrentFn<C> = Arc<dyn Fn(&C, &[Value]) -> Result<Value, String> + Send + Sync>;
type SequentialFn<S> = Arc<dyn Fn(&mut S, &[Value]) -> Result<Value, String> + Send + Sync>;

/// One operation of the object under test: a human-readable name, its
/// parameter generators, and a closure pair running the operation against
/// the concurrent object and against the sequential model.
///
/// An `Err` from either closure is recorded as a failure result, not a
/// harness error. Panics abort the run instead.
///
/// Operations are immutable once added to the registry.
pub struct Operation<C, S> {
    name: String,
    params: Params,
    concurrent: ConcurrentFn<C>,
    sequential: SequentialFn<S>,
    group: Option<String>,
    once: bool,
}

impl<C, S> Operation<C, S> {
    /// An operation taking no arguments.
    pub fn nullary<F, G>(name: &str, concurrent: F, sequential: G) -> Operation<C, S>
    where
        F: Fn(&C) -> Result<Value, String> + Send + Sync + 'static,
        G: Fn(&mut S) -> Result<Value, String> + Send + Sync + 'static,
    {
        Operation {
            name: name.to_owned(),
            params: Params::Nullary,
            concurrent: Arc::new(move |instance, _| concurrent(instance)),
            sequential: Arc::new(move |model, _| sequential(model)),
            group: None,
            once: false,
        }
    }

    /// An operation taking one generated argument.
    pub fn unary<P, F, G>(name: &str, param: P, concurrent: F, sequential: G) -> Operation<C, S>
    where
        P: ParamGen + 'static,
        F: Fn(&C, &Value) -> Result<Value, String> + Send + Sync + 'static,
        G: Fn(&mut S, &Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Operation {
            name: name.to_owned(),
            params: Params::Unary(Arc::new(param)),
            concurrent: Arc::new(move |instance, args| match args {
                [a] => concurrent(instance, a),
                _ => Err("arity mismatch".to_owned()),
            }),
            sequential: Arc::new(move |model, args| match args {
                [a] => sequential(model, a),
                _ => Err("arity mismatch".to_owned()),
            }),
            group: None,
            once: false,
        }
    }

    /// An operation taking two generated arguments.
    pub fn binary<P, Q, F, G>(
        name: &str,
        first: P,
        second: Q,
        concurrent: F,
        sequential: G,
    ) -> Operation<C, S>
    where
        P: ParamGen + 'static,
        Q: ParamGen + 'static,
        F: Fn(&C, &Value, &Value) -> Result<Value, String> + Send + Sync + 'static,
        G: Fn(&mut S, &Value, &Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Operation {
            name: name.to_owned(),
            params: Params::Binary(Arc::new(first), Arc::new(second)),
            concurrent: Arc::new(move |instance, args| match args {
                [a, b] => concurrent(instance, a, b),
                _ => Err("arity mismatch".to_owned()),
            }),
            sequential: Arc::new(move |model, args| match args {
                [a, b] => sequential(model, a, b),
                _ => Err("arity mismatch".to_owned()),
            }),
            group: None,
            once: false,
        }
    }

    /// Tag the operation with a non-parallel group. Operations sharing a
    /// tag are never scheduled into different parallel threads.
    pub fn non_parallel(mut self, group: &str) -> Operation<C, S> {
        self.group = Some(group.to_owned());
        self
    }

    /// Allow the operation at most once per scenario.
    pub fn use_once(mut self) -> Operation<C, S> {
        self.once = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.params.arity()
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_ref().map(|g| g.as_str())
    }

    pub fn is_once(&self) -> bool {
        self.once
    }

    pub(crate) fn generate_args(&self, rng: &mut StdRng) -> Vec<Value> {
        self.params.generate(rng)
    }

    pub(crate) fn invoke_concurrent(&self, instance: &C, args: &[Value]) -> Outcome {
        match (self.concurrent)(instance, args) {
            Ok(val) => Outcome::Returned(val),
            Err(message) => Outcome::Failed(message),
        }
    }

    pub(crate) fn invoke_sequential(&self, model: &mut S, args: &[Value]) -> Outcome {
        match (self.sequential)(model, args) {
            Ok(val) => Outcome::Returned(val),
            Err(message) => Outcome::Failed(message),
        }
    }
}

/// The set of operations available to the scenario generator.
pub struct OperationRegistry<C, S> {
    ops: Vec<Operation<C, S>>,
}

impl<C, S> OperationRegistry<C, S> {
    pub fn new() -> OperationRegistry<C, S> {
        OperationRegistry { ops: Vec::new() }
    }

    pub fn add(&mut self, op: Operation<C, S>) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Look up an operation by the index stored in an actor. Indices come
    /// from scenarios generated against this registry.
    pub fn op(&self, index: usize) -> &Operation<C, S> {
        &self.ops[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation<C, S>> {
        self.ops.iter()
    }
}

impl<C, S> Default for OperationRegistry<C, S> {
    fn default() -> OperationRegistry<C, S> {
        OperationRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::generator::rng_from_seed;
    use super::*;

    #[test]
    fn int_gen_stays_in_range() {
        let gen = IntGen::default();
        let mut rng = rng_from_seed(7);
        for _ in 0..1000 {
            match gen.next(&mut rng) {
                Value::Int(v) => assert!(v >= -5 && v < 11),
                other => panic!("unexpected value {:?}", other),
            }
        }
    }

    #[test]
    fn invoke_wrappers_map_errors_to_failures() {
        let op: Operation<i64, i64> = Operation::nullary(
            "boom",
            |_| Err("down".to_owned()),
            |model| Ok(Value::Int(*model)),
        );
        assert_eq!(op.invoke_concurrent(&0, &[]), Outcome::Failed(String::new()));
        assert_eq!(op.invoke_sequential(&mut 3, &[]), Outcome::Returned(Value::Int(3)));
    }

    #[test]
    fn arity_tags() {
        let op: Operation<i64, i64> = Operation::binary(
            "two",
            IntGen::default(),
            BoolGen,
            |_, a, b| {
                let a = a.as_int().ok_or("int expected")?;
                let b = b.as_bool().ok_or("bool expected")?;
                Ok(Value::Int(if b { a } else { -a }))
            },
            |_, _, _| Ok(Value::Unit),
        );
        assert_eq!(op.arity(), 2);
        let mut rng = rng_from_seed(1);
        assert_eq!(op.generate_args(&mut rng).len(), 2);
    }

    #[test]
    fn group_and_once_flags() {
        let op: Operation<i64, i64> = Operation::nullary(
            "close",
            |_| Ok(Value::Unit),
            |_| Ok(Value::Unit),
        )
        .non_parallel("lifecycle")
        .use_once();
        assert_eq!(op.group(), Some("lifecycle"));
        assert!(op.is_once());
    }
}
