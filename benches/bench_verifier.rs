#[macro_use]
extern crate criterion;
extern crate rustcheck;

use criterion::{Bencher, Criterion};
use rustcheck::models::SeqCounter;
use rustcheck::testing::{
    Actor, History, Invocation, LinearizabilityTester, LinearizabilityVerifier, Operation,
    OperationRegistry, Outcome, Value, Verdict,
};

use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Default)]
struct Counter {
    value: AtomicI64,
}

fn registry() -> OperationRegistry<Counter, SeqCounter> {
    let mut registry = OperationRegistry::new();
    registry.add(Operation::nullary(
        "inc",
        |c: &Counter| Ok(Value::Int(c.value.fetch_add(1, Ordering::SeqCst) + 1)),
        |m: &mut SeqCounter| Ok(Value::Int(m.inc())),
    ));
    registry
}

// A fully overlapping history of increments: every interleaving is open,
// which is the worst case for the search.
fn overlapping_history(threads: usize, per_thread: usize) -> History {
    let mut parallel = Vec::with_capacity(threads);
    let span = (threads * per_thread * 2) as u64;
    for t in 0..threads {
        let mut actors = Vec::with_capacity(per_thread);
        for at in 0..per_thread {
            actors.push(Invocation {
                actor: Actor { op: 0, args: vec![] },
                outcome: Outcome::Returned(Value::Int((t * per_thread + at + 1) as i64)),
                start: 0,
                end: span,
            });
        }
        parallel.push(actors);
    }
    History { init: vec![], parallel, post: vec![] }
}

fn bench_search(c: &mut Criterion) {
    c.bench_function_over_inputs(
        "verifier_overlapping",
        |b: &mut Bencher, per_thread: &usize| {
            let registry = registry();
            let verifier = LinearizabilityVerifier::new(&registry);
            let history = overlapping_history(2, *per_thread);
            b.iter(|| match verifier.verify(&history) {
                Verdict::Inconclusive => panic!("budget too small for this input"),
                verdict => verdict,
            })
        },
        vec![2, 4, 6, 8],
    );
}

fn tester(verify: bool) -> LinearizabilityTester<Counter, SeqCounter> {
    let tester = LinearizabilityTester::new()
        .operation(Operation::nullary(
            "inc",
            |c: &Counter| Ok(Value::Int(c.value.fetch_add(1, Ordering::SeqCst) + 1)),
            |m: &mut SeqCounter| Ok(Value::Int(m.inc())),
        ))
        .iterations(1)
        .invocations_per_iteration(20)
        .seed(1);
    if verify {
        tester
    } else {
        tester.disable_verifier()
    }
}

fn bench_run_verifier_enabled(c: &mut Criterion) {
    c.bench_function("run_verifier_enabled", |b: &mut Bencher| {
        let tester = tester(true);
        b.iter(|| tester.run().is_ok())
    });
}

fn bench_run_verifier_disabled(c: &mut Criterion) {
    c.bench_function("run_verifier_disabled", |b: &mut Bencher| {
        let tester = tester(false);
        b.iter(|| tester.run().is_ok())
    });
}

criterion_group!(
    benches,
    bench_search,
    bench_run_verifier_enabled,
    bench_run_verifier_disabled
);
criterion_main!(benches);
