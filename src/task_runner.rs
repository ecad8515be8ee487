//! Supervised background loops.
//!
//! The orchestrator's side tasks (feed pump, chain refresh) run under a
//! small circuit breaker: transient failures retry with exponential
//! backoff, and a run of consecutive failures gives the task up instead of
//! letting it degrade silently.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};

/// What a supervised iteration asks the runner to do next.
#[derive(Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Run another iteration.
    Continue,
    /// Clean end of the task (e.g. the feed reached EOF).
    Stop,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Consecutive failures after which the task is abandoned.
    pub max_consecutive_failures: u32,
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            max_consecutive_failures: 5,
            initial_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

/// Run `task_fn` until it stops cleanly or exhausts the failure budget.
/// Each success resets the backoff; each failure doubles it up to the cap.
pub async fn run_supervised<F, Fut>(task_name: &str, config: SupervisorConfig, mut task_fn: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<TaskOutcome, String>>,
{
    let mut consecutive_failures: u32 = 0;
    let mut retry_delay = config.initial_retry_delay;

    loop {
        match task_fn().await {
            Ok(TaskOutcome::Stop) => {
                warn!("Task '{}' finished", task_name);
                return;
            }
            Ok(TaskOutcome::Continue) => {
                if consecutive_failures > 0 {
                    warn!(
                        "Task '{}' recovered after {} failures",
                        task_name, consecutive_failures
                    );
                }
                consecutive_failures = 0;
                retry_delay = config.initial_retry_delay;
            }
            Err(e) => {
                consecutive_failures += 1;
                error!(
                    "Task '{}' failed (attempt {}/{}): {}",
                    task_name, consecutive_failures, config.max_consecutive_failures, e
                );

                if consecutive_failures >= config.max_consecutive_failures {
                    error!(
                        "Task '{}' exceeded {} consecutive failures; giving up",
                        task_name, config.max_consecutive_failures
                    );
                    return;
                }

                warn!("Task '{}' will retry in {:?}", task_name, retry_delay);
                sleep(retry_delay).await;
                retry_delay = std::cmp::min(retry_delay * 2, config.max_retry_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_config() -> SupervisorConfig {
        SupervisorConfig {
            max_consecutive_failures: 3,
            initial_retry_delay: Duration::from_millis(1),
            max_retry_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_stops_cleanly_on_stop_outcome() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_inner = runs.clone();

        run_supervised("stopper", fast_config(), || {
            let runs = runs_inner.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(TaskOutcome::Stop)
            }
        })
        .await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_then_recovers() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_inner = runs.clone();

        run_supervised("flaky", fast_config(), || {
            let runs = runs_inner.clone();
            async move {
                let n = runs.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(TaskOutcome::Stop)
                }
            }
        })
        .await;

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_consecutive_failures() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_inner = runs.clone();

        run_supervised("broken", fast_config(), || {
            let runs = runs_inner.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Err("permanent".to_string())
            }
        })
        .await;

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
