//! Fixed-interval polling with a timeout.

use std::future::Future;

use k8s_provider_shared::time::Duration;
use snafu::Snafu;
use tokio::time::Instant;

#[derive(Debug, Snafu)]
pub enum PollError<E: std::error::Error + 'static> {
    #[snafu(display("condition was not met within {timeout}"))]
    TimedOut { timeout: Duration },

    #[snafu(display("failed to evaluate condition"))]
    Check { source: E },
}

/// Calls `check` until it returns `true`, sleeping `poll_interval` in between.
///
/// Fails once `timeout` has elapsed without the condition being met. A zero `timeout` disables
/// waiting altogether and `check` is never called.
pub async fn poll<F, Fut, E>(
    timeout: Duration,
    poll_interval: Duration,
    mut check: F,
) -> Result<(), PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + 'static,
{
    if timeout.is_zero() {
        return Ok(());
    }

    let start = Instant::now();
    loop {
        if check().await.map_err(|source| PollError::Check { source })? {
            return Ok(());
        }

        if start.elapsed() >= *timeout {
            return Err(PollError::TimedOut { timeout });
        }

        tracing::trace!(%poll_interval, "condition not met yet, waiting");
        tokio::time::sleep(*poll_interval).await;
    }
}
