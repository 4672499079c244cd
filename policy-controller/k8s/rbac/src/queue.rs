//! A single-worker queue for reconciliation passes.
//!
//! Triggers coalesce: any number of signals received while a pass is running result in exactly one
//! further pass. A failed pass is retried with exponential backoff up to a bounded number of times;
//! after that, the worker waits for the next trigger and starts counting afresh.

use athenz_policy_controller_k8s_index::Trigger;
use std::{fmt, future::Future, time::Duration};
use tokio::time;
use tracing::{debug, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

// === impl RetryPolicy ===

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// The delay before the retry that follows the `failures`th consecutive failure.
    fn backoff(&self, failures: u32) -> Duration {
        let factor = 1u32 << failures.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Runs `pass` every time `trigger` fires, until `shutdown` completes.
///
/// A pass that has started always runs to completion; shutdown is observed between passes and
/// while backing off.
pub async fn run<F, Fut, T, E>(
    trigger: Trigger,
    policy: RetryPolicy,
    shutdown: impl Future,
    mut pass: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!("Shutting down");
                return;
            }
            _ = trigger.triggered() => {}
        }

        let mut failures = 0;
        while let Err(error) = pass().await {
            failures += 1;
            if failures > policy.max_retries {
                warn!(%error, failures, "Pass failed; waiting for the next trigger");
                break;
            }
            let backoff = policy.backoff(failures);
            warn!(%error, failures, ?backoff, "Pass failed; retrying");
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!("Shutting down");
                    return;
                }
                _ = time::sleep(backoff) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tokio::sync::oneshot;

    fn counting(
        result: Result<(), &'static str>,
    ) -> (
        Arc<AtomicUsize>,
        impl FnMut() -> std::future::Ready<Result<(), &'static str>>,
    ) {
        let count = Arc::new(AtomicUsize::new(0));
        let pass = {
            let count = count.clone();
            move || {
                count.fetch_add(1, Ordering::SeqCst);
                std::future::ready(result)
            }
        };
        (count, pass)
    }

    #[test]
    fn backoff_grows_and_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(100), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn coalesces_triggers() {
        let trigger = Trigger::default();
        let (count, pass) = counting(Ok(()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let worker = tokio::spawn(run(trigger.clone(), RetryPolicy::default(), shutdown_rx, pass));

        trigger.trigger();
        trigger.trigger();
        trigger.trigger();
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        trigger.trigger();
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        drop(shutdown_tx);
        worker.await.expect("worker must not panic");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded_per_trigger() {
        let trigger = Trigger::default();
        let (count, pass) = counting(Err("boom"));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let worker = tokio::spawn(run(
            trigger.clone(),
            RetryPolicy::with_max_retries(3),
            shutdown_rx,
            pass,
        ));

        trigger.trigger();
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);

        // The next trigger starts with a fresh retry budget.
        trigger.trigger();
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 8);

        drop(shutdown_tx);
        worker.await.expect("worker must not panic");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_backoff() {
        let trigger = Trigger::default();
        let (count, pass) = counting(Err("boom"));
        let policy = RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_secs(3600),
            max_backoff: Duration::from_secs(3600),
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let worker = tokio::spawn(run(trigger.clone(), policy, shutdown_rx, pass));

        trigger.trigger();
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        shutdown_tx.send(()).expect("worker must be running");
        time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("worker must stop while backing off")
            .expect("worker must not panic");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
