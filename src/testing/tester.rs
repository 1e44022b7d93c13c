use rand::rngs::StdRng;
use rand::{FromEntropy, Rng};
use thiserror::Error;

use super::executor::{ExecutionError, StressExecutor, ThreadHook, ValidationFn};
use super::generator::{rng_from_seed, ConfigError, ScenarioGenerator, ScenarioShape};
use super::history::History;
use super::minimizer::ScenarioMinimizer;
use super::registry::{Operation, OperationRegistry};
use super::scenario::Scenario;
use super::verifier::{
    Counterexample, LinearizabilityVerifier, SequentialSpec, Verdict, DEFAULT_SEARCH_BUDGET,
};

pub const DEFAULT_ITERATIONS: usize = 100;
pub const DEFAULT_INVOCATIONS: usize = 1000;

/// A finished run that found a problem. The report variants carry a
/// human-readable account of the failing scenario, its recorded results
/// and, for linearizability violations, where the search got stuck.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TestFailure {
    #[error("{0}")]
    Configuration(#[from] ConfigError),
    #[error("{report}")]
    LinearizabilityViolation { report: String },
    #[error("{report}")]
    InvariantViolation { report: String },
    #[error("unrecoverable execution fault: {message}")]
    UnrecoverableFault { message: String },
    #[error("{report}")]
    SearchBudgetExceeded { report: String },
}

enum ScenarioFailure {
    NotLinearizable {
        history: History,
        counterexample: Counterexample,
    },
    Invariant(String),
    Fault(String),
    Budget {
        history: History,
    },
}

/// The front door of the engine: owns the operation registry and the run
/// configuration, and wires the generator, the executor, the verifier and
/// the minimizer together.
///
/// A run generates `iterations` scenarios and stress-executes each of them
/// `invocations` times against a fresh object, verifying every recorded
/// history. The first failure stops the run; unless minimization is
/// disabled, the failing scenario is first shrunk to a local minimum that
/// still reproduces the same kind of failure.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicI64, Ordering};
/// use rustcheck::testing::{LinearizabilityTester, Operation, Value};
///
/// #[derive(Default)]
/// struct Counter {
///     value: AtomicI64,
/// }
///
/// let result = LinearizabilityTester::<Counter, i64>::new()
///     .operation(Operation::nullary(
///         "inc",
///         |c: &Counter| Ok(Value::Int(c.value.fetch_add(1, Ordering::SeqCst) + 1)),
///         |m: &mut i64| {
///             *m += 1;
///             Ok(Value::Int(*m))
///         },
///     ))
///     .iterations(2)
///     .invocations_per_iteration(50)
///     .run();
/// assert!(result.is_ok());
/// ```
pub struct LinearizabilityTester<C, S> {
    registry: OperationRegistry<C, S>,
    iterations: usize,
    invocations: usize,
    shape: ScenarioShape,
    minimize_failed_scenario: bool,
    verifier_enabled: bool,
    search_budget: u64,
    seed: Option<u64>,
    add_waits: bool,
    init_thread: Option<ThreadHook>,
    finish_thread: Option<ThreadHook>,
    validations: Vec<ValidationFn<C>>,
}

impl<C, S> LinearizabilityTester<C, S> {
    pub fn new() -> LinearizabilityTester<C, S> {
        LinearizabilityTester {
            registry: OperationRegistry::new(),
            iterations: DEFAULT_ITERATIONS,
            invocations: DEFAULT_INVOCATIONS,
            shape: ScenarioShape::default(),
            minimize_failed_scenario: true,
            verifier_enabled: true,
            search_budget: DEFAULT_SEARCH_BUDGET,
            seed: None,
            add_waits: true,
            init_thread: None,
            finish_thread: None,
            validations: Vec::new(),
        }
    }

    pub fn operation(mut self, op: Operation<C, S>) -> Self {
        self.registry.add(op);
        self
    }

    /// How many scenarios to generate. Defaults to 100.
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// How many times each scenario is stress-executed. Defaults to 1000.
    pub fn invocations_per_iteration(mut self, invocations: usize) -> Self {
        self.invocations = invocations;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.shape.threads = threads;
        self
    }

    pub fn actors_per_thread(mut self, actors: usize) -> Self {
        self.shape.actors_per_thread = actors;
        self
    }

    /// Actors executed single-threaded before the parallel part.
    pub fn actors_before(mut self, actors: usize) -> Self {
        self.shape.actors_before = actors;
        self
    }

    /// Actors executed single-threaded after the parallel part.
    pub fn actors_after(mut self, actors: usize) -> Self {
        self.shape.actors_after = actors;
        self
    }

    pub fn minimize_failed_scenario(mut self, minimize: bool) -> Self {
        self.minimize_failed_scenario = minimize;
        self
    }

    /// Skip verification entirely. Histories are still recorded and
    /// crashes and invariant violations still fail the run.
    pub fn disable_verifier(mut self) -> Self {
        self.verifier_enabled = false;
        self
    }

    /// Cap on configurations the verifier explores per history before
    /// giving up with a budget failure.
    pub fn search_budget(mut self, budget: u64) -> Self {
        self.search_budget = budget;
        self
    }

    /// Fix the generator seed. Scenario generation becomes reproducible;
    /// thread scheduling of course does not.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Toggle the randomized spin-waits inserted between parallel actors
    /// to perturb interleavings. On by default.
    pub fn add_waits(mut self, add_waits: bool) -> Self {
        self.add_waits = add_waits;
        self
    }

    /// Run once on every worker thread before it starts executing actors.
    pub fn init_thread_function(mut self, hook: ThreadHook) -> Self {
        self.init_thread = Some(hook);
        self
    }

    /// Run once on every worker thread after its last actor.
    pub fn finish_thread_function(mut self, hook: ThreadHook) -> Self {
        self.finish_thread = Some(hook);
        self
    }

    /// Check the final object state after every execution. An `Err` fails
    /// the run as an invariant violation.
    pub fn validation_function(mut self, validation: ValidationFn<C>) -> Self {
        self.validations.push(validation);
        self
    }
}

impl<C, S> LinearizabilityTester<C, S>
where
    C: Default + Sync,
    S: SequentialSpec,
{
    /// Run the whole test. `Ok(())` means no iteration found a problem.
    pub fn run(&self) -> Result<(), TestFailure> {
        let mut generator = ScenarioGenerator::new(&self.registry, self.shape, self.seed)?;
        let mut executor = StressExecutor::new(&self.registry);
        if let Some(hook) = &self.init_thread {
            executor = executor.init_thread(hook.clone());
        }
        if let Some(hook) = &self.finish_thread {
            executor = executor.finish_thread(hook.clone());
        }
        for validation in &self.validations {
            executor = executor.validation(validation.clone());
        }
        let mut wait_rng = match self.seed {
            Some(seed) => rng_from_seed(seed.wrapping_add(0x5157_5ca7)),
            None => StdRng::from_entropy(),
        };

        for iteration in 0..self.iterations {
            let scenario = generator.next_scenario();
            tracing::debug!(
                "iteration {} of {}: {} actors over {} threads",
                iteration + 1,
                self.iterations,
                scenario.total_actors(),
                scenario.threads()
            );
            let failure = match self.run_scenario(&executor, &scenario, &mut wait_rng) {
                Some(failure) => failure,
                None => continue,
            };
            let failure = match failure {
                ScenarioFailure::Fault(message) => {
                    return Err(TestFailure::UnrecoverableFault { message })
                }
                other => other,
            };
            let (scenario, failure) = self.shrink(&executor, scenario, failure, &mut wait_rng);
            let report = self.report(iteration, &scenario, &failure);
            return Err(match failure {
                ScenarioFailure::NotLinearizable { .. } => {
                    TestFailure::LinearizabilityViolation { report }
                }
                ScenarioFailure::Invariant(_) => TestFailure::InvariantViolation { report },
                ScenarioFailure::Budget { .. } => TestFailure::SearchBudgetExceeded { report },
                ScenarioFailure::Fault(message) => TestFailure::UnrecoverableFault { message },
            });
        }
        Ok(())
    }

    /// Like [`run`](Self::run), but renders success as an empty string and
    /// a failure as its report.
    pub fn run_to_string(&self) -> String {
        match self.run() {
            Ok(()) => String::new(),
            Err(failure) => failure.to_string(),
        }
    }

    fn run_scenario(
        &self,
        executor: &StressExecutor<C, S>,
        scenario: &Scenario,
        wait_rng: &mut StdRng,
    ) -> Option<ScenarioFailure> {
        let verifier = LinearizabilityVerifier::with_budget(&self.registry, self.search_budget);
        for invocation in 0..self.invocations {
            let instance = C::default();
            let waits = if self.add_waits {
                Some(self.waits_for(invocation, scenario, wait_rng))
            } else {
                None
            };
            let history = match executor.execute(scenario, &instance, waits.as_deref()) {
                Ok(history) => history,
                Err(ExecutionError::InvariantViolation(message)) => {
                    return Some(ScenarioFailure::Invariant(message))
                }
                Err(ExecutionError::UnrecoverableFault(message)) => {
                    return Some(ScenarioFailure::Fault(message))
                }
            };
            if !self.verifier_enabled {
                continue;
            }
            match verifier.verify(&history) {
                Verdict::Linearizable => {}
                Verdict::NonLinearizable(counterexample) => {
                    return Some(ScenarioFailure::NotLinearizable { history, counterexample })
                }
                Verdict::Inconclusive => return Some(ScenarioFailure::Budget { history }),
            }
        }
        None
    }

    /// Spin counts per parallel actor. The cap grows linearly over the
    /// invocation sequence, so early runs race tightly and later runs
    /// explore staggered interleavings.
    fn waits_for(
        &self,
        invocation: usize,
        scenario: &Scenario,
        wait_rng: &mut StdRng,
    ) -> Vec<Vec<u32>> {
        let cap = (invocation * 1000 / self.invocations.max(1) + 1) as u32;
        scenario
            .parallel
            .iter()
            .map(|actors| {
                actors
                    .iter()
                    .map(|_| wait_rng.gen_range(0, cap.max(1)))
                    .collect()
            })
            .collect()
    }

    fn shrink(
        &self,
        executor: &StressExecutor<C, S>,
        scenario: Scenario,
        failure: ScenarioFailure,
        wait_rng: &mut StdRng,
    ) -> (Scenario, ScenarioFailure) {
        let minimizable = matches!(
            failure,
            ScenarioFailure::NotLinearizable { .. } | ScenarioFailure::Invariant(_)
        );
        if !self.minimize_failed_scenario || !minimizable {
            return (scenario, failure);
        }
        let wanted = std::mem::discriminant(&failure);
        let mut minimizer = ScenarioMinimizer::new(|candidate: &Scenario| {
            match self.run_scenario(executor, candidate, wait_rng) {
                Some(found) if std::mem::discriminant(&found) == wanted => Some(found),
                _ => None,
            }
        });
        minimizer.minimize(scenario, failure)
    }

    fn report(&self, iteration: usize, scenario: &Scenario, failure: &ScenarioFailure) -> String {
        let mut out = format!("= Iteration {} / {} =\n", iteration + 1, self.iterations);
        out.push_str(&scenario.render(&self.registry));
        match failure {
            ScenarioFailure::NotLinearizable { history, counterexample } => {
                out.push_str("Invalid execution results:\n");
                out.push_str(&history.render(&self.registry));
                out.push_str(&self.render_counterexample(history, counterexample));
            }
            ScenarioFailure::Invariant(message) => {
                out.push_str("Invariant violation after execution: ");
                out.push_str(message);
                out.push('\n');
            }
            ScenarioFailure::Budget { history } => {
                out.push_str("Verification gave up before reaching a verdict:\n");
                out.push_str(&history.render(&self.registry));
                out.push_str(&format!(
                    "Search budget of {} configurations exhausted; raise it or shrink the scenario.\n",
                    self.search_budget
                ));
            }
            ScenarioFailure::Fault(message) => {
                out.push_str("Unrecoverable execution fault: ");
                out.push_str(message);
                out.push('\n');
            }
        }
        out
    }

    fn render_counterexample(&self, history: &History, counterexample: &Counterexample) -> String {
        match counterexample {
            Counterexample::InitDivergence { index } => format!(
                "Init part diverges from the sequential model at actor #{}\n",
                index
            ),
            Counterexample::PostDivergence { index } => format!(
                "Post part diverges from the sequential model at actor #{}\n",
                index
            ),
            Counterexample::Exhausted { linearized, frontier } => {
                let mut out = format!(
                    "No sequential interleaving explains these results ({} of {} parallel actors linearized):\n",
                    linearized,
                    history.parallel_len()
                );
                for (t, stuck) in frontier.iter().enumerate() {
                    match history.parallel[t].get(*stuck) {
                        Some(inv) => out.push_str(&format!(
                            "  thread {} stuck before: {}: {}\n",
                            t,
                            inv.actor.render(&self.registry),
                            inv.outcome
                        )),
                        None => out.push_str(&format!("  thread {} fully linearized\n", t)),
                    }
                }
                out
            }
        }
    }
}

impl<C, S> Default for LinearizabilityTester<C, S> {
    fn default() -> LinearizabilityTester<C, S> {
        LinearizabilityTester::new()
    }
}
