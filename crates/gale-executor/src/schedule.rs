//! Wall-clock waits for signal times.
//!
//! Signal times are "HH:MM" in the provider's timezone. A wait returns as soon
//! as the local time of day is at or past the target, checked on a fixed
//! poll interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use gale_core::ClockTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::ScheduleConfig;
use crate::error::{ExecutorError, ExecutorResult};

pub struct Scheduler {
    tz: Tz,
    poll_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(tz: Tz, poll_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            tz,
            poll_interval,
            clock,
        }
    }

    /// Build from config; an unknown timezone name is a config error.
    pub fn from_config(config: &ScheduleConfig, clock: Arc<dyn Clock>) -> ExecutorResult<Self> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|e| ExecutorError::Config(format!("timezone {}: {e}", config.timezone)))?;
        Ok(Self::new(
            tz,
            Duration::from_secs(config.poll_interval_secs.max(1)),
            clock,
        ))
    }

    /// Current local time of day.
    pub fn local_time(&self) -> NaiveTime {
        self.clock.now_utc().with_timezone(&self.tz).time()
    }

    pub fn is_due(&self, target: ClockTime) -> bool {
        self.local_time() >= target.as_naive()
    }

    /// Suspend until the local time reaches `target`.
    pub async fn wait_until(
        &self,
        target: ClockTime,
        cancel: &CancellationToken,
    ) -> ExecutorResult<()> {
        info!(%target, tz = %self.tz, "Waiting for scheduled time");
        loop {
            let now = self.local_time();
            if now >= target.as_naive() {
                info!(%target, now = %now.format("%H:%M:%S"), "Scheduled time reached");
                return Ok(());
            }
            debug!(%target, now = %now.format("%H:%M:%S"), "Not yet due");

            tokio::select! {
                () = tokio::time::sleep(self.poll_interval) => {}
                () = cancel.cancelled() => return Err(ExecutorError::Cancelled),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use chrono::{TimeZone, Utc};

    // 12:58:30 in Sao Paulo (UTC-3).
    fn scheduler() -> Scheduler {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 15, 58, 30).unwrap();
        Scheduler::from_config(
            &ScheduleConfig::default(),
            Arc::new(MockClock::starting_at(start)),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_time_returns_immediately() {
        let s = scheduler();
        let started = tokio::time::Instant::now();
        s.wait_until(ClockTime::new(12, 30).unwrap(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_due() {
        let s = scheduler();
        let target = ClockTime::new(13, 0).unwrap();
        assert!(!s.is_due(target));

        let started = tokio::time::Instant::now();
        s.wait_until(target, &CancellationToken::new()).await.unwrap();

        // 90s away, polled every 5s.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(90));
        assert!(waited < Duration::from_secs(96));
        assert!(s.is_due(target));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_cancellable() {
        let s = scheduler();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            trigger.cancel();
        });

        let err = s
            .wait_until(ClockTime::new(13, 0).unwrap(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Cancelled));
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let config = ScheduleConfig {
            timezone: "Mars/Olympus".to_string(),
            poll_interval_secs: 5,
        };
        let err = Scheduler::from_config(&config, Arc::new(crate::clock::SystemClock));
        assert!(matches!(err, Err(ExecutorError::Config(_))));
    }
}
