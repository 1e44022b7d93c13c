use rand::rngs::StdRng;
use rand::{FromEntropy, Rng, SeedableRng};
use thiserror::Error;

use super::registry::OperationRegistry;
use super::scenario::{Actor, Scenario};

/// Shape of the scenarios to generate. The defaults are stable across
/// releases, so a seed plus the default shape always reproduces the same
/// scenarios.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScenarioShape {
    pub threads: usize,
    pub actors_per_thread: usize,
    pub actors_before: usize,
    pub actors_after: usize,
}

impl Default for ScenarioShape {
    fn default() -> ScenarioShape {
        ScenarioShape {
            threads: 2,
            actors_per_thread: 5,
            actors_before: 5,
            actors_after: 5,
        }
    }
}

/// The registry cannot satisfy the requested scenario shape. Raised before
/// any execution takes place.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no operations registered")]
    NoOperations,
    #[error("at least one parallel thread is required")]
    NoThreads,
    #[error("init and post parts draw from reusable operations, but every registered operation is invoke-once")]
    OnlyInvokeOnce,
    #[error("scenario asks for {requested} parallel actors but only {available} invoke-once placements exist")]
    NotEnoughActors { requested: usize, available: usize },
    #[error("a parallel thread is guaranteed at most {guaranteed} actors but {requested} are required; non-parallel group pinning can leave it unfillable")]
    UnfillableThread { guaranteed: usize, requested: usize },
}

/// Produces randomized scenarios from a registry.
///
/// Generation is deterministic for a given seed; without a seed the
/// generator draws its state from entropy. The placement strategy assigns
/// every non-parallel group to a single thread up front and then fills the
/// remaining slots from the unconstrained pool, so the grouping invariant
/// holds by construction rather than by rejection sampling. Invoke-once
/// operations leave their pool the first time they are picked.
pub struct ScenarioGenerator<'r, C, S> {
    registry: &'r OperationRegistry<C, S>,
    shape: ScenarioShape,
    rng: StdRng,
}

impl<'r, C, S> ScenarioGenerator<'r, C, S> {
    pub fn new(
        registry: &'r OperationRegistry<C, S>,
        shape: ScenarioShape,
        seed: Option<u64>,
    ) -> Result<ScenarioGenerator<'r, C, S>, ConfigError> {
        validate(registry, &shape)?;
        let rng = match seed {
            Some(seed) => rng_from_seed(seed),
            None => StdRng::from_entropy(),
        };
        Ok(ScenarioGenerator { registry, shape, rng })
    }

    pub fn next_scenario(&mut self) -> Scenario {
        let registry = self.registry;
        let shape = self.shape;

        // Init part: uniform picks from the reusable operations.
        let reusable: Vec<usize> = (0..registry.len())
            .filter(|&i| !registry.op(i).is_once())
            .collect();
        let mut init = Vec::with_capacity(shape.actors_before);
        for _ in 0..shape.actors_before {
            if reusable.is_empty() {
                break;
            }
            let pick = reusable[self.rng.gen_range(0, reusable.len())];
            init.push(self.make_actor(pick));
        }

        // Pin every non-parallel group to one thread, round-robin over the
        // shuffled group list; everything untagged goes to the free pool.
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        let mut free: Vec<usize> = Vec::new();
        for i in 0..registry.len() {
            match registry.op(i).group() {
                Some(tag) => match names.iter().position(|&n| n == tag) {
                    Some(at) => groups[at].push(i),
                    None => {
                        names.push(tag);
                        groups.push(vec![i]);
                    }
                },
                None => free.push(i),
            }
        }
        self.rng.shuffle(&mut groups);
        let mut pinned: Vec<Vec<usize>> = vec![Vec::new(); shape.threads];
        for (i, group) in groups.into_iter().enumerate() {
            pinned[i % shape.threads].extend(group);
        }

        let mut parallel: Vec<Vec<Actor>> = vec![Vec::new(); shape.threads];
        let mut left = vec![shape.actors_per_thread; shape.threads];
        let mut active: Vec<usize> = (0..shape.threads)
            .filter(|&t| left[t] > 0)
            .collect();
        while !active.is_empty() {
            let mut still = Vec::with_capacity(active.len());
            for &t in &active {
                let bound = pinned[t].len() + free.len();
                if bound == 0 {
                    continue;
                }
                let at = self.rng.gen_range(0, bound);
                let pick = if at < pinned[t].len() {
                    take(registry, &mut pinned[t], at)
                } else {
                    let offset = pinned[t].len();
                    take(registry, &mut free, at - offset)
                };
                parallel[t].push(self.make_actor(pick));
                left[t] -= 1;
                if left[t] > 0 {
                    still.push(t);
                }
            }
            active = still;
        }

        // Post part: leftover pinned operations rejoin the pool.
        let mut leftover = free;
        for pool in pinned {
            leftover.extend(pool);
        }
        let mut post = Vec::with_capacity(shape.actors_after);
        for _ in 0..shape.actors_after {
            if leftover.is_empty() {
                break;
            }
            let at = self.rng.gen_range(0, leftover.len());
            let pick = take(registry, &mut leftover, at);
            post.push(self.make_actor(pick));
        }

        Scenario { init, parallel, post }
    }

    fn make_actor(&mut self, op: usize) -> Actor {
        let registry = self.registry;
        let args = registry.op(op).generate_args(&mut self.rng);
        Actor { op, args }
    }
}

/// Pick the operation at `at`, removing it from the pool when it is
/// invoke-once.
fn take<C, S>(registry: &OperationRegistry<C, S>, pool: &mut Vec<usize>, at: usize) -> usize {
    let pick = pool[at];
    if registry.op(pick).is_once() {
        pool.remove(at);
    }
    pick
}

fn validate<C, S>(registry: &OperationRegistry<C, S>, shape: &ScenarioShape) -> Result<(), ConfigError> {
    if registry.is_empty() {
        return Err(ConfigError::NoOperations);
    }
    if shape.threads == 0 {
        return Err(ConfigError::NoThreads);
    }
    let reusable = registry.iter().filter(|op| !op.is_once()).count();
    if reusable == 0 {
        if shape.actors_before > 0 || shape.actors_after > 0 {
            return Err(ConfigError::OnlyInvokeOnce);
        }
        let requested = shape.threads * shape.actors_per_thread;
        let available = registry.len();
        if requested > available {
            return Err(ConfigError::NotEnoughActors { requested, available });
        }
    }

    // An ungrouped reusable operation can fill any slot on any thread, so
    // pinning never starves a thread. Without one, a thread's only
    // guaranteed supply is its own pinned groups: the shared free pool
    // may be drained by the others, and the shuffle may hand a thread the
    // smallest groups. Require that even the unluckiest thread can fill
    // its slots.
    if shape.actors_per_thread == 0 {
        return Ok(());
    }
    let free_reusable = registry
        .iter()
        .any(|op| op.group().is_none() && !op.is_once());
    let mut caps: Vec<Option<usize>> = Vec::new();
    let mut names: Vec<&str> = Vec::new();
    for op in registry.iter() {
        if let Some(tag) = op.group() {
            let at = match names.iter().position(|&n| n == tag) {
                Some(at) => at,
                None => {
                    names.push(tag);
                    caps.push(Some(0));
                    names.len() - 1
                }
            };
            caps[at] = match (caps[at], op.is_once()) {
                // A reusable member makes the group inexhaustible.
                (_, false) | (None, _) => None,
                (Some(size), true) => Some(size + 1),
            };
        }
    }
    if free_reusable || caps.is_empty() {
        return Ok(());
    }
    let min_groups = caps.len() / shape.threads;
    let mut finite: Vec<usize> = caps.iter().filter_map(|c| *c).collect();
    finite.sort_unstable();
    let guaranteed: usize = if finite.len() < min_groups {
        // Enough inexhaustible groups reach every thread.
        return Ok(());
    } else {
        finite[..min_groups].iter().sum()
    };
    if guaranteed < shape.actors_per_thread {
        return Err(ConfigError::UnfillableThread {
            guaranteed,
            requested: shape.actors_per_thread,
        });
    }
    Ok(())
}

/// Expand a 64-bit seed into `StdRng` key material with splitmix64.
pub(crate) fn rng_from_seed(seed: u64) -> StdRng {
    let mut state = seed;
    let mut key = [0u8; 32];
    for chunk in key.chunks_mut(8) {
        state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^= z >> 31;
        chunk.copy_from_slice(&z.to_le_bytes());
    }
    StdRng::from_seed(key)
}
