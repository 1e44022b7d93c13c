//! Stress-based linearizability testing, after the strategy of Wing and
//! Gong as refined by Lowe in
//! [Testing for Linearizability](http://www.cs.ox.ac.uk/people/gavin.lowe/LinearizabiltyTesting/paper.pdf).
//! Entry point is the [`LinearizabilityTester`] struct: register the
//! operations of the object under test paired with their effect on a
//! sequential model, and run.
//!
//! Each iteration generates a random scenario (a single-threaded init
//! part, a parallel part partitioned over threads, and a single-threaded
//! post part) and executes it many times against fresh instances, with
//! randomized spin-waits perturbing the interleavings. Every recorded
//! history is handed to a verifier that searches for a sequential order
//! of the invocations which is consistent with their real-time bounds and
//! reproduces every recorded outcome. A history with no such order is a
//! linearizability violation; the offending scenario is shrunk to a local
//! minimum before it is reported.
//!
//! # Example
//! Testing an atomic counter against a plain sequential one:
//! ```
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use rustcheck::models::SeqCounter;
//! use rustcheck::testing::{LinearizabilityTester, Operation, Value};
//!
//! #[derive(Default)]
//! struct Counter {
//!     value: AtomicI64,
//! }
//!
//! let result = LinearizabilityTester::<Counter, SeqCounter>::new()
//!     .operation(Operation::nullary(
//!         "inc",
//!         |c: &Counter| Ok(Value::Int(c.value.fetch_add(1, Ordering::SeqCst) + 1)),
//!         |m: &mut SeqCounter| Ok(Value::Int(m.inc())),
//!     ))
//!     .operation(Operation::nullary(
//!         "read",
//!         |c: &Counter| Ok(Value::Int(c.value.load(Ordering::SeqCst))),
//!         |m: &mut SeqCounter| Ok(Value::Int(m.read())),
//!     ))
//!     .iterations(3)
//!     .invocations_per_iteration(100)
//!     .run();
//!
//! assert!(result.is_ok());
//! ```

pub use self::executor::{ExecutionError, StressExecutor, ThreadHook, ValidationFn};
pub use self::generator::{ConfigError, ScenarioGenerator, ScenarioShape};
pub use self::history::{History, Invocation};
pub use self::minimizer::ScenarioMinimizer;
pub use self::registry::{BoolGen, IntGen, Operation, OperationRegistry, ParamGen, Params};
pub use self::scenario::{Actor, Scenario};
pub use self::tester::{
    LinearizabilityTester, TestFailure, DEFAULT_INVOCATIONS, DEFAULT_ITERATIONS,
};
pub use self::value::{Outcome, Value};
pub use self::verifier::{
    Counterexample, EpsilonVerifier, LinearizabilityVerifier, SequentialSpec, Verdict,
    DEFAULT_SEARCH_BUDGET,
};

mod automaton;
mod executor;
mod generator;
mod history;
mod minimizer;
mod registry;
mod scenario;
mod tester;
mod value;
mod verifier;
