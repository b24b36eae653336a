//! Wall-clock sources for the scheduler.

use chrono::{Local, NaiveDateTime, TimeDelta};
use parking_lot::Mutex;

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// The host's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Wall clock that starts at a chosen instant and advances with tokio's clock.
///
/// Under a paused tokio runtime, sleeping advances this clock by exactly the
/// slept duration, so a whole day of scheduling runs instantly. [`jump`]
/// shifts it without any time passing, like an NTP correction or DST change.
///
/// [`jump`]: SimulatedClock::jump
#[derive(Debug)]
pub struct SimulatedClock {
    start: NaiveDateTime,
    origin: tokio::time::Instant,
    skew: Mutex<TimeDelta>,
}

impl SimulatedClock {
    pub fn starting_at(start: NaiveDateTime) -> Self {
        Self {
            start,
            origin: tokio::time::Instant::now(),
            skew: Mutex::new(TimeDelta::zero()),
        }
    }

    pub fn jump(&self, delta: TimeDelta) {
        let mut skew = self.skew.lock();
        *skew = *skew + delta;
    }

    /// Wall time this clock shows at `instant`, under its current skew
    pub fn wall_time_at(&self, instant: tokio::time::Instant) -> NaiveDateTime {
        let elapsed = TimeDelta::from_std(instant.saturating_duration_since(self.origin))
            .unwrap_or_else(|_| TimeDelta::zero());
        self.start + elapsed + *self.skew.lock()
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> NaiveDateTime {
        self.wall_time_at(tokio::time::Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_clock_follows_tokio_time() {
        let clock = SimulatedClock::starting_at(at(8, 0));
        assert_eq!(clock.now(), at(8, 0));

        tokio::time::sleep(Duration::from_secs(90 * 60)).await;
        assert_eq!(clock.now(), at(9, 30));
    }

    #[tokio::test(start_paused = true)]
    async fn jump_shifts_without_elapsed_time() {
        let clock = SimulatedClock::starting_at(at(8, 0));
        clock.jump(TimeDelta::hours(-1));
        assert_eq!(clock.now(), at(7, 0));
    }
}
