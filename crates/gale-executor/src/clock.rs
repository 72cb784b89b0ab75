//! Wall-clock abstraction.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::time::Instant;

/// Clock abstraction for testability.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}

/// Clock that starts at a fixed instant and advances with tokio time.
///
/// Under `start_paused` tests it moves only when the runtime auto-advances,
/// so wall-clock waits become deterministic.
#[derive(Debug, Clone)]
pub struct MockClock {
    start_utc: DateTime<Utc>,
    start: Instant,
}

impl MockClock {
    pub fn starting_at(start_utc: DateTime<Utc>) -> Self {
        Self {
            start_utc,
            start: Instant::now(),
        }
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        let elapsed = self.start.elapsed();
        let elapsed = ChronoDuration::from_std(elapsed).unwrap_or(ChronoDuration::zero());
        self.start_utc + elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_mock_clock_follows_tokio_time() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = MockClock::starting_at(start);
        assert_eq!(clock.now_utc(), start);

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(clock.now_utc(), start + ChronoDuration::seconds(90));
    }
}
