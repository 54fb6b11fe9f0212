use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

/// Acquire a cache mutex, recovering the guard if a previous holder panicked.
///
/// Both cache structures keep their invariants across every early return, so a
/// poisoned guard still protects a well-formed log or map.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| recover(poisoned, target, op))
}

fn recover<G>(poisoned: PoisonError<G>, target: &'static str, op: &'static str) -> G {
    warn!(
        op,
        target_module = target,
        lock_kind = "mutex.lock",
        result = "poisoned_recovered",
        hint = "a writer panicked while holding the lock",
        "Recovered from poisoned cache lock"
    );
    poisoned.into_inner()
}
