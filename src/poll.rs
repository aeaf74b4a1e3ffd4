use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of a bounded wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready { value: T, elapsed: Duration },
    TimedOut { elapsed: Duration, attempts: usize },
}

impl<T> PollOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Ready { value, .. } => Some(value),
            Self::TimedOut { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Evaluate `predicate` every `interval` until it yields a value or
/// `deadline` has elapsed. The predicate always runs at least once, and
/// never after the deadline has passed.
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    deadline: Duration,
    mut predicate: F,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    let mut attempts = 0usize;
    loop {
        attempts += 1;
        if let Some(value) = predicate().await {
            return PollOutcome::Ready {
                value,
                elapsed: start.elapsed(),
            };
        }

        let elapsed = start.elapsed();
        if elapsed >= deadline {
            return PollOutcome::TimedOut { elapsed, attempts };
        }
        // never oversleep the deadline; the last look happens right at it
        tokio::time::sleep(interval.min(deadline - elapsed)).await;
    }
}
