use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use thiserror::Error;

use super::history::{History, Invocation};
use super::registry::OperationRegistry;
use super::scenario::{Actor, Scenario};

/// Per-worker setup or teardown callback, run once per worker thread.
pub type ThreadHook = Arc<dyn Fn() + Send + Sync>;

/// Post-scenario validation callback. An `Err` is reported as an invariant
/// violation, distinct from a linearizability counterexample.
pub type ValidationFn<C> = Arc<dyn Fn(&C) -> Result<(), String> + Send + Sync>;

/// Execution failed outside the modeled failure set.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// A validation callback rejected the final state.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// A worker panicked. The run aborts; this is never folded into the
    /// history.
    #[error("unrecoverable execution fault: {0}")]
    UnrecoverableFault(String),
}

/// Runs scenarios against the concurrent object under real parallelism and
/// records histories.
///
/// The init and post parts run on the calling thread in strict actor
/// order. The parallel part spawns exactly one OS thread per scenario
/// partition; a barrier aligns their start, and every invocation takes a
/// start and an end token from a counter shared via atomic increment.
/// Those tokens are the only cross-thread ordering evidence handed to the
/// verifier.
///
/// The same scenario may be executed any number of times against fresh
/// instances; both the stress loop and the minimizer rely on that.
pub struct StressExecutor<'r, C, S> {
    registry: &'r OperationRegistry<C, S>,
    init_thread: Option<ThreadHook>,
    finish_thread: Option<ThreadHook>,
    validations: Vec<ValidationFn<C>>,
}

impl<'r, C: Sync, S> StressExecutor<'r, C, S> {
    pub fn new(registry: &'r OperationRegistry<C, S>) -> StressExecutor<'r, C, S> {
        StressExecutor {
            registry,
            init_thread: None,
            finish_thread: None,
            validations: Vec::new(),
        }
    }

    pub fn init_thread(mut self, hook: ThreadHook) -> Self {
        self.init_thread = Some(hook);
        self
    }

    pub fn finish_thread(mut self, hook: ThreadHook) -> Self {
        self.finish_thread = Some(hook);
        self
    }

    pub fn validation(mut self, validation: ValidationFn<C>) -> Self {
        self.validations.push(validation);
        self
    }

    /// Execute `scenario` against `instance`. `waits` optionally gives a
    /// spin count per parallel actor, used by the stress loop to perturb
    /// interleavings between invocations.
    pub fn execute(
        &self,
        scenario: &Scenario,
        instance: &C,
        waits: Option<&[Vec<u32>]>,
    ) -> Result<History, ExecutionError> {
        let run = panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute_inner(scenario, instance, waits)
        }));
        match run {
            Ok(history) => history,
            Err(payload) => Err(ExecutionError::UnrecoverableFault(panic_message(
                payload.as_ref(),
            ))),
        }
    }

    fn execute_inner(
        &self,
        scenario: &Scenario,
        instance: &C,
        waits: Option<&[Vec<u32>]>,
    ) -> Result<History, ExecutionError> {
        let clock = AtomicU64::new(0);
        let init = self.run_serial(&scenario.init, instance, &clock);
        let parallel = self.run_parallel(scenario, instance, &clock, waits)?;
        let post = self.run_serial(&scenario.post, instance, &clock);
        for validation in &self.validations {
            validation(instance).map_err(ExecutionError::InvariantViolation)?;
        }
        Ok(History { init, parallel, post })
    }

    fn run_serial(&self, actors: &[Actor], instance: &C, clock: &AtomicU64) -> Vec<Invocation> {
        actors
            .iter()
            .map(|actor| self.invoke(actor, instance, clock))
            .collect()
    }

    fn run_parallel(
        &self,
        scenario: &Scenario,
        instance: &C,
        clock: &AtomicU64,
        waits: Option<&[Vec<u32>]>,
    ) -> Result<Vec<Vec<Invocation>>, ExecutionError> {
        let threads = scenario.parallel.len();
        if threads == 0 {
            return Ok(Vec::new());
        }
        let barrier = Barrier::new(threads);
        let mut results: Vec<Vec<Invocation>> = vec![Vec::new(); threads];
        let mut fault: Option<String> = None;
        thread::scope(|s| {
            let mut workers = Vec::with_capacity(threads);
            for (t, (actors, slot)) in scenario
                .parallel
                .iter()
                .zip(results.iter_mut())
                .enumerate()
            {
                let barrier = &barrier;
                let thread_waits = waits.map(|w| w[t].as_slice());
                workers.push(s.spawn(move || {
                    // A panicking hook must still reach the rendezvous,
                    // or the remaining workers block on the barrier
                    // forever.
                    let setup = panic::catch_unwind(AssertUnwindSafe(|| {
                        if let Some(hook) = &self.init_thread {
                            hook();
                        }
                    }));
                    barrier.wait();
                    if let Err(payload) = setup {
                        panic::resume_unwind(payload);
                    }
                    for (at, actor) in actors.iter().enumerate() {
                        if let Some(w) = thread_waits {
                            spin(w[at]);
                        }
                        slot.push(self.invoke(actor, instance, clock));
                    }
                    if let Some(hook) = &self.finish_thread {
                        hook();
                    }
                }));
            }
            // Joining here keeps the panic payload; leaving it to the
            // scope would replace it with a generic message.
            for worker in workers {
                if let Err(payload) = worker.join() {
                    if fault.is_none() {
                        fault = Some(panic_message(payload.as_ref()));
                    }
                }
            }
        });
        match fault {
            Some(message) => Err(ExecutionError::UnrecoverableFault(message)),
            None => Ok(results),
        }
    }

    fn invoke(&self, actor: &Actor, instance: &C, clock: &AtomicU64) -> Invocation {
        let op = self.registry.op(actor.op);
        let start = clock.fetch_add(1, Ordering::SeqCst);
        let outcome = op.invoke_concurrent(instance, &actor.args);
        let end = clock.fetch_add(1, Ordering::SeqCst);
        Invocation {
            actor: actor.clone(),
            outcome,
            start,
            end,
        }
    }
}

fn spin(count: u32) {
    for _ in 0..count {
        std::hint::spin_loop();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::super::registry::{Operation, OperationRegistry};
    use super::super::value::{Outcome, Value};
    use super::*;
    use std::sync::atomic::AtomicI64;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counter {
        value: AtomicI64,
    }

    fn counter_registry() -> OperationRegistry<Counter, i64> {
        let mut registry = OperationRegistry::new();
        registry.add(Operation::nullary(
            "inc",
            |c: &Counter| Ok(Value::Int(c.value.fetch_add(1, Ordering::SeqCst) + 1)),
            |m: &mut i64| {
                *m += 1;
                Ok(Value::Int(*m))
            },
        ));
        registry
    }

    fn scenario(init: usize, threads: usize, per_thread: usize, post: usize) -> Scenario {
        let actor = Actor { op: 0, args: vec![] };
        Scenario {
            init: vec![actor.clone(); init],
            parallel: vec![vec![actor.clone(); per_thread]; threads],
            post: vec![actor; post],
        }
    }

    #[test]
    fn records_program_order_with_monotonic_tokens() {
        let registry = counter_registry();
        let executor = StressExecutor::new(&registry);
        let counter = Counter::default();
        let history = executor
            .execute(&scenario(2, 1, 3, 1), &counter, None)
            .unwrap();
        assert_eq!(history.init.len(), 2);
        assert_eq!(history.parallel.len(), 1);
        assert_eq!(history.parallel[0].len(), 3);
        assert_eq!(history.post.len(), 1);
        let mut last = 0;
        for inv in history
            .init
            .iter()
            .chain(history.parallel[0].iter())
            .chain(history.post.iter())
        {
            assert!(inv.start >= last);
            assert!(inv.end > inv.start);
            last = inv.end;
        }
        assert_eq!(counter.value.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn closure_errors_become_failure_outcomes() {
        let mut registry: OperationRegistry<Counter, i64> = OperationRegistry::new();
        registry.add(Operation::nullary(
            "brittle",
            |_: &Counter| Err("modeled failure".to_owned()),
            |_: &mut i64| Ok(Value::Unit),
        ));
        let executor = StressExecutor::new(&registry);
        let history = executor
            .execute(&scenario(0, 2, 1, 0), &Counter::default(), None)
            .unwrap();
        for thread in &history.parallel {
            assert_eq!(thread[0].outcome, Outcome::Failed(String::new()));
        }
    }

    #[test]
    fn worker_panic_is_an_unrecoverable_fault() {
        let mut registry: OperationRegistry<Counter, i64> = OperationRegistry::new();
        registry.add(Operation::nullary(
            "explode",
            |_: &Counter| panic!("object contract violated"),
            |_: &mut i64| Ok(Value::Unit),
        ));
        let executor = StressExecutor::new(&registry);
        let err = executor
            .execute(&scenario(0, 2, 1, 0), &Counter::default(), None)
            .unwrap_err();
        match err {
            ExecutionError::UnrecoverableFault(message) => {
                assert!(message.contains("object contract violated"))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn a_serial_part_panic_keeps_its_message() {
        let mut registry: OperationRegistry<Counter, i64> = OperationRegistry::new();
        registry.add(Operation::nullary(
            "explode",
            |_: &Counter| panic!("double free in init"),
            |_: &mut i64| Ok(Value::Unit),
        ));
        let executor = StressExecutor::new(&registry);
        let err = executor
            .execute(&scenario(1, 1, 1, 0), &Counter::default(), None)
            .unwrap_err();
        match err {
            ExecutionError::UnrecoverableFault(message) => {
                assert!(message.contains("double free in init"), "{}", message)
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn a_panicking_init_hook_aborts_instead_of_hanging() {
        let registry = counter_registry();
        let executor =
            StressExecutor::new(&registry).init_thread(Arc::new(|| panic!("setup failed")));
        let err = executor
            .execute(&scenario(0, 3, 1, 0), &Counter::default(), None)
            .unwrap_err();
        match err {
            ExecutionError::UnrecoverableFault(message) => {
                assert!(message.contains("setup failed"), "{}", message)
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn failed_validation_is_an_invariant_violation() {
        let registry = counter_registry();
        let executor = StressExecutor::new(&registry).validation(Arc::new(|c: &Counter| {
            let total = c.value.load(Ordering::SeqCst);
            if total % 2 == 0 {
                Ok(())
            } else {
                Err(format!("odd total {}", total))
            }
        }));
        let err = executor
            .execute(&scenario(1, 1, 1, 1), &Counter::default(), None)
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::InvariantViolation("odd total 3".to_owned())
        );
    }

    #[test]
    fn thread_hooks_run_once_per_worker() {
        let registry = counter_registry();
        let started = Arc::new(Mutex::new(0));
        let finished = Arc::new(Mutex::new(0));
        let started_hook = started.clone();
        let finished_hook = finished.clone();
        let executor = StressExecutor::new(&registry)
            .init_thread(Arc::new(move || *started_hook.lock().unwrap() += 1))
            .finish_thread(Arc::new(move || *finished_hook.lock().unwrap() += 1));
        executor
            .execute(&scenario(0, 3, 2, 0), &Counter::default(), None)
            .unwrap();
        assert_eq!(*started.lock().unwrap(), 3);
        assert_eq!(*finished.lock().unwrap(), 3);
    }
}
