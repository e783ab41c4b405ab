//! Bounded retry with backoff, and per-call timeouts.

use std::fmt::Display;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::warn;

use platecalc_core::options::RetryPolicy;

use crate::interfaces::{Entity, ResolveError, Retryable};

/// Run `op` until it succeeds, fails permanently, or exhausts the policy.
///
/// `op` receives the 1-based attempt number. Only errors reporting
/// [`Retryable::is_transient`] are retried.
pub fn with_retry<T, E, F>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    operation = what,
                    attempt,
                    max_attempts,
                    delay = ?delay,
                    error = %err,
                    "Transient failure, retrying"
                );
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Run `call` on its own thread and give up after `timeout`.
///
/// A call that times out keeps running in the background; its result is
/// discarded.
pub fn call_with_timeout<T, F>(
    timeout: Duration,
    entity: Entity,
    id: &str,
    call: F,
) -> Result<T, ResolveError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ResolveError> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    let spawned = std::thread::Builder::new()
        .name(format!("platecalc-{entity}").replace(' ', "-"))
        .spawn(move || {
            let _ = tx.send(call());
        });
    if let Err(e) = spawned {
        return Err(ResolveError::unavailable(
            entity,
            id,
            format!("cannot spawn resolver thread: {e}"),
        ));
    }

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ResolveError::Timeout {
            entity,
            id: id.to_string(),
            after: timeout,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(ResolveError::unavailable(
            entity,
            id,
            "resolver call panicked",
        )),
    }
}
