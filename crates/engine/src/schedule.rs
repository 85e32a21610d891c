use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::{America::New_York, Tz};
use tracing::{debug, info, warn};

use common::{EngineCommand, EngineState};

use crate::lifecycle::EngineHandle;

/// Source of wall-clock time. Injected so session timing can be tested
/// without waiting on the real clock.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when slept on or advanced by hand.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Weekday market session: a pre-open notice, then trading between
/// `start` and `stop`, all in exchange-local time.
#[derive(Debug, Clone)]
pub struct SessionSchedule {
    pub tz: Tz,
    pub notice: NaiveTime,
    pub start: NaiveTime,
    pub stop: NaiveTime,
}

impl Default for SessionSchedule {
    fn default() -> Self {
        Self {
            tz: New_York,
            notice: hm(9, 30),
            start: hm(10, 0),
            stop: hm(16, 30),
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl SessionSchedule {
    fn is_trading_day(day: Weekday) -> bool {
        !matches!(day, Weekday::Sat | Weekday::Sun)
    }

    /// Engine state the schedule calls for at `now`.
    pub fn state_at(&self, now: DateTime<Utc>) -> EngineState {
        let local = now.with_timezone(&self.tz);
        if !Self::is_trading_day(local.weekday()) {
            return EngineState::Stopped;
        }
        let t = local.time();
        if t >= self.start && t < self.stop {
            EngineState::Running
        } else if t >= self.notice && t < self.start {
            EngineState::Waiting
        } else {
            EngineState::Stopped
        }
    }

    /// The first trigger strictly after `now`.
    pub fn next_trigger(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, EngineCommand)> {
        let today = now.with_timezone(&self.tz).date_naive();
        let triggers = [
            (self.notice, EngineCommand::PreOpen),
            (self.start, EngineCommand::Start),
            (self.stop, EngineCommand::Stop),
        ];

        // A full week always contains a trading day.
        today
            .iter_days()
            .take(8)
            .filter(|day| Self::is_trading_day(day.weekday()))
            .flat_map(|day| {
                triggers.into_iter().filter_map(move |(time, cmd)| {
                    self.tz
                        .from_local_datetime(&day.and_time(time))
                        .earliest()
                        .map(|at| (at.with_timezone(&Utc), cmd))
                })
            })
            .find(|(at, _)| *at > now)
    }
}

pub fn command_for(state: EngineState) -> EngineCommand {
    match state {
        EngineState::Stopped => EngineCommand::Stop,
        EngineState::Waiting => EngineCommand::PreOpen,
        EngineState::Running => EngineCommand::Start,
    }
}

/// Drives the engine from the session schedule.
pub struct SessionScheduler {
    schedule: SessionSchedule,
    clock: Arc<dyn Clock>,
    engine: EngineHandle,
}

impl SessionScheduler {
    pub fn new(schedule: SessionSchedule, clock: Arc<dyn Clock>, engine: EngineHandle) -> Self {
        Self {
            schedule,
            clock,
            engine,
        }
    }

    /// Bring the engine in line with the schedule at the current time, so a
    /// restart mid-session resumes trading instead of waiting a day.
    pub async fn align(&self) -> EngineCommand {
        let state = self.schedule.state_at(self.clock.now());
        let cmd = command_for(state);
        info!(%state, "Aligning engine with session schedule");
        self.engine.send(cmd).await;
        cmd
    }

    /// Sleep until the next trigger, then deliver it.
    pub async fn step(&self) -> Option<EngineCommand> {
        let now = self.clock.now();
        let (at, cmd) = self.schedule.next_trigger(now)?;
        let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
        debug!(at = %at, command = ?cmd, wait = ?wait, "Next session trigger");
        self.clock.sleep(wait).await;
        self.engine.send(cmd).await;
        Some(cmd)
    }

    /// Align, then follow the schedule forever. Call from `tokio::spawn`.
    pub async fn run(self) {
        self.align().await;
        while self.step().await.is_some() {}
        warn!("Session schedule produced no further triggers");
    }
}
