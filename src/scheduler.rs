/*!
 # Daily wake-up scheduling

 Two recurring events drive the lamp: a morning fade-in and an evening
 fade-out. Nothing is persisted; every iteration works out which event comes
 next from the wall clock alone, so a restart at any time picks up where it
 should.
*/

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::clock::Clock;
use crate::command::{Brightness, Command, ProtocolConfig, Zone};
use crate::fader::{fade, FadeSpec};
use crate::lamp::Lamp;
use crate::shutdown::{Shutdown, WaitOutcome};
use crate::transport::Transport;
use crate::{Error, Result};

/// A wall-clock time that recurs every day
///
/// Parsed from `HH:MM` or `HH:MM:SS`, displayed as `HH:MM` unless seconds
/// are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(|| {
                Error::InvalidConfig(format!("{hour:02}:{minute:02} is not a time of day"))
            })
    }

    pub fn time(self) -> NaiveTime {
        self.0
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(time: NaiveTime) -> Self {
        Self(time)
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(Self)
            .map_err(|_| {
                Error::InvalidConfig(format!("'{s}' is not a time of day (expected HH:MM)"))
            })
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(time: TimeOfDay) -> String {
        time.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.second() == 0 {
            write!(f, "{}", self.0.format("%H:%M"))
        } else {
            write!(f, "{}", self.0.format("%H:%M:%S"))
        }
    }
}

/// The next instant strictly after `now` that falls on `time`: today if
/// still ahead, otherwise tomorrow. Never more than 24 hours away.
pub fn next_occurrence(time: TimeOfDay, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(time.0);
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

/// Scheduled lamp action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Power on and fade in
    Morning,
    /// Fade out
    Evening,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Morning => write!(f, "morning"),
            Transition::Evening => write!(f, "evening"),
        }
    }
}

/// What the scheduler waits for next, and until when
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForMorning(NaiveDateTime),
    WaitingForEvening(NaiveDateTime),
}

impl Phase {
    pub fn at(self) -> NaiveDateTime {
        match self {
            Phase::WaitingForMorning(at) | Phase::WaitingForEvening(at) => at,
        }
    }

    pub fn transition(self) -> Transition {
        match self {
            Phase::WaitingForMorning(_) => Transition::Morning,
            Phase::WaitingForEvening(_) => Transition::Evening,
        }
    }
}

/// Picks whichever event occurs first after `now`.
///
/// Morning is chosen only when strictly earlier, so evening wins an exact tie.
pub fn plan(config: &ScheduleConfig, now: NaiveDateTime) -> Phase {
    let morning = next_occurrence(config.morning, now);
    let evening = next_occurrence(config.evening, now);
    if morning < evening {
        Phase::WaitingForMorning(morning)
    } else {
        Phase::WaitingForEvening(evening)
    }
}

/// Schedule and timing of the wake-up light
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Zone the schedule drives
    pub zone: Zone,
    pub morning: TimeOfDay,
    pub evening: TimeOfDay,
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
    /// Pause between powering on and starting the morning fade
    pub power_on_settle_ms: u64,
    /// A transition more than this late (clock jumped forward) is skipped
    pub stale_after_secs: u64,
    /// Longest single sleep before the wall clock is read again
    pub recheck_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            zone: Zone(3),
            morning: TimeOfDay(NaiveTime::from_hms_opt(7, 30, 0).expect("valid time")),
            evening: TimeOfDay(NaiveTime::from_hms_opt(20, 0, 0).expect("valid time")),
            fade_in_secs: 15.0 * 60.0,
            fade_out_secs: 5.0 * 60.0,
            power_on_settle_ms: 1000,
            stale_after_secs: 60 * 60,
            recheck_secs: 60,
        }
    }
}

impl ScheduleConfig {
    /// Testing mode: morning five seconds from `now` and a short fade-in
    pub fn for_testing(mut self, now: NaiveDateTime) -> Self {
        // Whole seconds, so the time survives printing and reparsing
        let morning = (now + TimeDelta::seconds(5)).time();
        self.morning = TimeOfDay(morning.with_nanosecond(0).unwrap_or(morning));
        self.fade_in_secs = 10.0;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.fade_in()?;
        self.fade_out()?;
        self.stale_after()?;
        if self.recheck_secs == 0 {
            return Err(Error::InvalidConfig("recheck_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn fade_in(&self) -> Result<FadeSpec> {
        seconds("fade_in_secs", self.fade_in_secs).map(FadeSpec::fade_in)
    }

    pub fn fade_out(&self) -> Result<FadeSpec> {
        seconds("fade_out_secs", self.fade_out_secs).map(FadeSpec::fade_out)
    }

    /// How late a transition may run before it is skipped, 1 s up to a day
    pub fn stale_after(&self) -> Result<TimeDelta> {
        let secs = self.stale_after_secs;
        if !(1..=MAX_STALE_AFTER_SECS).contains(&secs) {
            return Err(Error::InvalidConfig(format!(
                "stale_after_secs must be between 1 and {MAX_STALE_AFTER_SECS}, got {secs}"
            )));
        }
        i64::try_from(secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| Error::InvalidConfig(format!("stale_after_secs {secs} is too large")))
    }
}

/// Longer than this and a transition from yesterday could still fire
const MAX_STALE_AFTER_SECS: u64 = 24 * 60 * 60;

fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        Error::InvalidConfig(format!("{name} must be a non-negative number, got {value}"))
    })
}

/// Result of one scheduler iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Fired(Transition),
    /// The wall clock overshot the event by more than `stale_after_secs`
    Skipped(Transition),
    Cancelled,
}

enum Due {
    Now,
    Stale(TimeDelta),
    Cancelled,
}

/// Drives one lamp through the daily morning/evening cycle
pub struct Scheduler<T, C> {
    lamp: Lamp<T>,
    clock: C,
    config: ScheduleConfig,
    fade_in: FadeSpec,
    fade_out: FadeSpec,
    stale_after: TimeDelta,
    shutdown: Shutdown,
}

impl<T: Transport, C: Clock> Scheduler<T, C> {
    /// Builds a scheduler for `config.zone`, rejecting unusable timings
    pub fn new(
        transport: T,
        protocol: Arc<ProtocolConfig>,
        clock: C,
        config: ScheduleConfig,
        shutdown: Shutdown,
    ) -> Result<Self> {
        config.validate()?;
        // Every transition starts by powering the zone on
        protocol.encode(Command::On(config.zone))?;
        Ok(Self {
            fade_in: config.fade_in()?,
            fade_out: config.fade_out()?,
            stale_after: config.stale_after()?,
            lamp: Lamp::new(transport, protocol, config.zone),
            clock,
            config,
            shutdown,
        })
    }

    pub fn lamp(&self) -> &Lamp<T> {
        &self.lamp
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    fn settle(&self) -> Duration {
        Duration::from_millis(self.config.power_on_settle_ms)
    }

    /// Puts the zone in a known state: on, minimum brightness, then off
    #[instrument(skip(self), fields(zone = %self.lamp.zone()))]
    pub async fn initialize(&mut self) -> Result<()> {
        info!("On and set minimum brightness");
        self.lamp.power_on().await?;
        self.lamp.set_brightness(Brightness::MIN).await?;
        let settle = self.settle();
        if self.shutdown.sleep(settle).await == WaitOutcome::Cancelled {
            return Ok(());
        }
        self.lamp.power_off().await?;
        Ok(())
    }

    /// Runs until shutdown. Failed transitions are logged and the loop
    /// moves on to the next event.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Scheduling {}: morning at {}, evening at {}",
            self.lamp.zone(),
            self.config.morning,
            self.config.evening
        );
        loop {
            match self.step().await {
                Ok(StepOutcome::Cancelled) => {
                    info!("Scheduler stopped");
                    return Ok(());
                }
                Ok(StepOutcome::Fired(transition)) => debug!("{} transition done", transition),
                Ok(StepOutcome::Skipped(transition)) => debug!("{} transition skipped", transition),
                Err(e) => error!("Scheduled transition failed: {}", e),
            }
        }
    }

    /// One iteration: pick the nearer event, wait for it, run it
    pub async fn step(&mut self) -> Result<StepOutcome> {
        if self.shutdown.is_triggered() {
            return Ok(StepOutcome::Cancelled);
        }

        let phase = plan(&self.config, self.clock.now());
        let transition = phase.transition();
        match phase {
            Phase::WaitingForMorning(at) => info!("Waiting for morning at {}", at),
            Phase::WaitingForEvening(at) => {
                info!("Waiting for evening at {}", at);
                // The morning fade may never have run (fresh start), so make
                // sure the lamp is fully on before fading it out
                if let Err(e) = self.evening_baseline().await {
                    warn!("Could not set evening baseline: {}", e);
                }
            }
        }

        match self.wait_until(phase.at()).await {
            Due::Now => {}
            Due::Cancelled => return Ok(StepOutcome::Cancelled),
            Due::Stale(late) => {
                warn!(
                    "Clock is {} min past the {} transition at {}, skipping it",
                    late.num_minutes(),
                    transition,
                    phase.at()
                );
                return Ok(StepOutcome::Skipped(transition));
            }
        }

        let outcome = match transition {
            Transition::Morning => self.morning().await?,
            Transition::Evening => self.evening().await?,
        };
        Ok(match outcome {
            WaitOutcome::Elapsed => StepOutcome::Fired(transition),
            WaitOutcome::Cancelled => StepOutcome::Cancelled,
        })
    }

    async fn evening_baseline(&self) -> Result<()> {
        self.lamp.power_on().await?;
        self.lamp.set_brightness(Brightness::MAX).await
    }

    /// Sleeps in slices of at most `recheck_secs`, re-reading the wall
    /// clock each time so clock corrections are noticed.
    async fn wait_until(&mut self, target: NaiveDateTime) -> Due {
        let recheck = Duration::from_secs(self.config.recheck_secs);
        let mut announced = false;

        loop {
            let now = self.clock.now();
            if now >= target {
                let late = now - target;
                if late > self.stale_after {
                    return Due::Stale(late);
                }
                return Due::Now;
            }

            let remaining = (target - now).to_std().unwrap_or(Duration::ZERO);
            if !announced {
                debug!("Waiting until {}, {:?} from now", target, remaining);
                announced = true;
            } else {
                trace!("{:?} left until {}", remaining, target);
            }

            if self.shutdown.sleep(remaining.min(recheck)).await == WaitOutcome::Cancelled {
                return Due::Cancelled;
            }
        }
    }

    #[instrument(skip(self), fields(zone = %self.lamp.zone()))]
    async fn morning(&mut self) -> Result<WaitOutcome> {
        info!("Morning occurred, powering on before fade");
        self.lamp.power_on().await?;
        let settle = self.settle();
        if self.shutdown.sleep(settle).await == WaitOutcome::Cancelled {
            return Ok(WaitOutcome::Cancelled);
        }
        fade(&self.lamp, &self.fade_in, &mut self.shutdown).await
    }

    #[instrument(skip(self), fields(zone = %self.lamp.zone()))]
    async fn evening(&mut self) -> Result<WaitOutcome> {
        info!("Evening occurred, fading out");
        fade(&self.lamp, &self.fade_out, &mut self.shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn tod(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn schedule(morning: &str, evening: &str) -> ScheduleConfig {
        ScheduleConfig {
            morning: tod(morning),
            evening: tod(evening),
            ..ScheduleConfig::default()
        }
    }

    #[test]
    fn later_today_stays_today() {
        assert_eq!(next_occurrence(tod("18:00"), at(1, 8, 0)), at(1, 18, 0));
    }

    #[test]
    fn earlier_today_rolls_to_tomorrow() {
        assert_eq!(next_occurrence(tod("07:00"), at(1, 8, 0)), at(2, 7, 0));
    }

    #[test]
    fn exactly_now_rolls_to_tomorrow() {
        assert_eq!(next_occurrence(tod("08:00"), at(1, 8, 0)), at(2, 8, 0));
    }

    #[test]
    fn rolls_over_month_end() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(23, 59, 30)
            .unwrap();
        assert_eq!(next_occurrence(tod("00:00"), now), at(1, 0, 0) + TimeDelta::days(31));
    }

    #[test]
    fn next_occurrence_is_in_the_future_and_within_a_day() {
        let base = at(1, 0, 0);
        for now_minute in (0..24 * 60).step_by(7) {
            let now = base + TimeDelta::minutes(now_minute) + TimeDelta::seconds(13);
            for target_minute in (0..24 * 60).step_by(11) {
                let time = TimeOfDay::new(target_minute / 60, target_minute % 60).unwrap();
                let next = next_occurrence(time, now);
                assert!(next > now, "{time} at {now}");
                assert!(next - now <= TimeDelta::hours(24), "{time} at {now}");
                assert_eq!(next.time(), time.time());
            }
        }
    }

    #[test]
    fn morning_after_morning_time_waits_for_evening() {
        let phase = plan(&schedule("07:00", "18:00"), at(1, 8, 0));
        assert_eq!(phase, Phase::WaitingForEvening(at(1, 18, 0)));
    }

    #[test]
    fn after_evening_waits_for_next_morning() {
        let phase = plan(&schedule("07:00", "18:00"), at(1, 21, 0));
        assert_eq!(phase, Phase::WaitingForMorning(at(2, 7, 0)));
    }

    #[test]
    fn before_morning_waits_for_morning() {
        let phase = plan(&schedule("07:30", "20:00"), at(1, 3, 0));
        assert_eq!(phase, Phase::WaitingForMorning(at(1, 7, 30)));
        assert_eq!(phase.transition(), Transition::Morning);
    }

    #[test]
    fn evening_wins_an_exact_tie() {
        let phase = plan(&schedule("07:00", "07:00"), at(1, 6, 0));
        assert_eq!(phase, Phase::WaitingForEvening(at(1, 7, 0)));
    }

    #[test]
    fn time_of_day_parsing() {
        assert_eq!(tod("07:30").time(), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(tod(" 20:00 ").to_string(), "20:00");
        assert_eq!(tod("06:15:05").to_string(), "06:15:05");
        assert!("25:00".parse::<TimeOfDay>().is_err());
        assert!("morning".parse::<TimeOfDay>().is_err());
        assert!(TimeOfDay::new(7, 60).is_err());
    }

    #[test]
    fn testing_mode_moves_morning_close() {
        let now = at(1, 12, 0);
        let config = ScheduleConfig::default().for_testing(now);
        assert_eq!(config.morning.to_string(), "12:00:05");
        assert_eq!(config.fade_in().unwrap().duration, Duration::from_secs(10));
        assert_eq!(plan(&config, now), Phase::WaitingForMorning(now + TimeDelta::seconds(5)));
    }

    #[test]
    fn default_schedule() {
        let config = ScheduleConfig::default();
        assert_eq!(config.zone.number(), 3);
        assert_eq!(config.morning.to_string(), "07:30");
        assert_eq!(config.evening.to_string(), "20:00");
        assert_eq!(config.fade_in().unwrap().duration, Duration::from_secs(900));
        assert_eq!(config.fade_out().unwrap().duration, Duration::from_secs(300));
    }

    #[test]
    fn testing_mode_drops_sub_second_precision() {
        let now = at(1, 12, 0) + TimeDelta::milliseconds(1234);
        let config = ScheduleConfig::default().for_testing(now);
        assert_eq!(config.morning.time().nanosecond(), 0);
        assert_eq!(config.morning.to_string(), "12:00:06");
        assert_eq!(config.morning.to_string().parse::<TimeOfDay>().unwrap(), config.morning);
    }

    #[test]
    fn stale_after_must_be_positive_and_at_most_a_day() {
        for secs in [0, 24 * 60 * 60 + 1, 100_000_000_000_000_000, u64::MAX] {
            let config = ScheduleConfig {
                stale_after_secs: secs,
                ..ScheduleConfig::default()
            };
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))), "{secs}");
        }

        let config = ScheduleConfig {
            stale_after_secs: 24 * 60 * 60,
            ..ScheduleConfig::default()
        };
        assert_eq!(config.stale_after().unwrap(), TimeDelta::days(1));
        assert_eq!(ScheduleConfig::default().stale_after().unwrap(), TimeDelta::hours(1));
    }

    #[test]
    fn negative_fade_is_invalid() {
        let config = ScheduleConfig {
            fade_out_secs: -1.0,
            ..ScheduleConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
