//! Hour-aligned recurring delivery scheduler.
//!
//! One timer task per subscriber. The first fire lands on the next top of the
//! hour in a fixed UTC offset; later fires repeat every interval from that
//! anchor. Ticks that run late push the following ticks back rather than
//! bursting, so fires can drift off `:00` over long uptimes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::delivery::DeliveryTarget;
use crate::{Result, SemangatError};

pub const HOUR_SECS: u64 = 3600;

/// Opaque chat handle of a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberId(pub i64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Schedule configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Fixed offset of the delivery clock, in hours east of UTC
    pub utc_offset_hours: i32,
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: std::env::var("SCHEDULE_UTC_OFFSET_HOURS")
                .ok()
                .and_then(|v| v.parse::<i32>().ok())
                .filter(|h| (-12..=14).contains(h))
                .unwrap_or(7),
            interval_secs: HOUR_SECS,
        }
    }
}

impl ScheduleConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            SemangatError::ConfigError(format!(
                "Invalid UTC offset: {} hours",
                self.utc_offset_hours
            ))
        })
    }
}

/// Wall-clock source, swappable in tests
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The next `:00:00` strictly after `now` in `now`'s offset.
///
/// Exactly on the boundary counts as a full hour ahead.
pub fn next_top_of_hour(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let into_hour = chrono::Duration::seconds(i64::from(now.minute() * 60 + now.second()))
        + chrono::Duration::nanoseconds(i64::from(now.nanosecond()));
    now - into_hour + chrono::Duration::hours(1)
}

/// Time from `now` until `next_top_of_hour(now)`; always in `(0, 3600]` seconds
pub fn delay_until_next_hour(now: DateTime<FixedOffset>) -> Duration {
    (next_top_of_hour(now) - now)
        .to_std()
        .unwrap_or(Duration::from_secs(HOUR_SECS))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleState {
    Scheduled,
    Cancelled,
}

/// Snapshot of one subscriber's recurring delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberSchedule {
    pub subscriber: SubscriberId,
    /// Upcoming fire, aligned to the top of the hour
    pub next_fire: DateTime<FixedOffset>,
    pub interval_secs: u64,
    pub state: ScheduleState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOutcome {
    pub schedule: SubscriberSchedule,
    /// An earlier active schedule for the same subscriber was cancelled
    pub replaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Cancelled(SubscriberSchedule),
    NothingToCancel,
}

struct ScheduleEntry {
    schedule: SubscriberSchedule,
    /// Timer instant of the first fire
    anchor: Instant,
    timer: JoinHandle<()>,
}

impl ScheduleEntry {
    /// Snapshot with `next_fire` advanced past every period already elapsed at `now`
    fn snapshot_at(&self, now: Instant, interval: Duration) -> SubscriberSchedule {
        let mut schedule = self.schedule.clone();
        if now >= self.anchor {
            let period = interval.as_secs().max(1);
            let fired = (now - self.anchor).as_secs() / period + 1;
            let ahead = i64::try_from(fired.saturating_mul(period)).unwrap_or(i64::MAX);
            if let Some(next) = chrono::Duration::try_seconds(ahead)
                .and_then(|d| schedule.next_fire.checked_add_signed(d))
            {
                schedule.next_fire = next;
            }
        }
        schedule
    }
}

/// Owns the per-subscriber timers and fires the delivery target on each tick
pub struct Scheduler {
    target: Arc<dyn DeliveryTarget>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    interval: Duration,
    entries: DashMap<SubscriberId, ScheduleEntry>,
}

impl Scheduler {
    pub fn new(target: Arc<dyn DeliveryTarget>, cfg: &ScheduleConfig) -> Result<Self> {
        Self::with_clock(target, cfg, Arc::new(SystemClock))
    }

    pub fn with_clock(
        target: Arc<dyn DeliveryTarget>,
        cfg: &ScheduleConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if cfg.interval_secs == 0 {
            return Err(SemangatError::ConfigError("Interval must be positive".into()));
        }
        Ok(Self {
            target,
            clock,
            offset: cfg.offset()?,
            interval: Duration::from_secs(cfg.interval_secs),
            entries: DashMap::new(),
        })
    }

    fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now_utc().with_timezone(&self.offset)
    }

    /// Arm (or re-arm) the hourly timer for `subscriber`.
    ///
    /// Any existing timer is aborted before the new one is stored, inside the
    /// same map entry lock, so at most one schedule per subscriber is live.
    pub fn subscribe(&self, subscriber: SubscriberId) -> SubscribeOutcome {
        let now = self.now();
        let next_fire = next_top_of_hour(now);
        let first_delay = delay_until_next_hour(now);
        let anchor = Instant::now() + first_delay;
        let schedule = SubscriberSchedule {
            subscriber,
            next_fire,
            interval_secs: self.interval.as_secs(),
            state: ScheduleState::Scheduled,
        };

        let replaced = match self.entries.entry(subscriber) {
            Entry::Occupied(mut occupied) => {
                occupied.get().timer.abort();
                let timer = self.arm(subscriber, anchor);
                occupied.insert(ScheduleEntry {
                    schedule: schedule.clone(),
                    anchor,
                    timer,
                });
                true
            }
            Entry::Vacant(vacant) => {
                let timer = self.arm(subscriber, anchor);
                vacant.insert(ScheduleEntry {
                    schedule: schedule.clone(),
                    anchor,
                    timer,
                });
                false
            }
        };

        info!(
            target = "scheduler",
            subscriber = %subscriber,
            next_fire = %next_fire,
            first_delay_secs = first_delay.as_secs(),
            replaced,
            "Subscriber scheduled"
        );
        SubscribeOutcome { schedule, replaced }
    }

    /// Cancel the subscriber's timer. A delivery already in flight finishes.
    pub fn unsubscribe(&self, subscriber: SubscriberId) -> UnsubscribeOutcome {
        match self.entries.remove(&subscriber) {
            Some((_, entry)) => {
                entry.timer.abort();
                let mut schedule = entry.snapshot_at(Instant::now(), self.interval);
                schedule.state = ScheduleState::Cancelled;
                info!(target = "scheduler", subscriber = %subscriber, "Subscriber cancelled");
                UnsubscribeOutcome::Cancelled(schedule)
            }
            None => {
                debug!(target = "scheduler", subscriber = %subscriber, "Nothing to cancel");
                UnsubscribeOutcome::NothingToCancel
            }
        }
    }

    /// Deliver to `subscriber` right away, leaving any recurring timer untouched
    pub fn trigger_now(&self, subscriber: SubscriberId) -> JoinHandle<()> {
        info!(target = "scheduler", subscriber = %subscriber, "Immediate delivery requested");
        let target = Arc::clone(&self.target);
        tokio::spawn(async move {
            target.deliver(subscriber).await;
        })
    }

    /// Current schedule; `next_fire` is the nominal upcoming fire, ignoring late ticks
    pub fn schedule(&self, subscriber: SubscriberId) -> Option<SubscriberSchedule> {
        let now = Instant::now();
        self.entries
            .get(&subscriber)
            .map(|e| e.snapshot_at(now, self.interval))
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    /// Abort every timer; used on process shutdown
    pub fn shutdown(&self) {
        let count = self.entries.len();
        self.entries.retain(|_, entry| {
            entry.timer.abort();
            false
        });
        if count > 0 {
            warn!(target = "scheduler", count, "Scheduler stopped with active subscribers");
        }
    }

    fn arm(&self, subscriber: SubscriberId, start: Instant) -> JoinHandle<()> {
        let target = Arc::clone(&self.target);
        let period = self.interval;
        tokio::spawn(async move {
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!(target = "scheduler", subscriber = %subscriber, "Timer fired");
                // run the delivery detached so aborting the timer never cuts it short
                let target = Arc::clone(&target);
                tokio::spawn(async move {
                    target.deliver(subscriber).await;
                });
            }
        })
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for entry in self.entries.iter() {
            entry.timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn wib() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).expect("valid offset")
    }

    #[test]
    fn quarter_past_waits_until_next_hour() {
        let now = wib().with_ymd_and_hms(2024, 5, 1, 7, 15, 0).unwrap();
        assert_eq!(
            next_top_of_hour(now),
            wib().with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
        );
        assert_eq!(delay_until_next_hour(now), Duration::from_secs(2700));
    }

    #[test]
    fn exact_boundary_waits_a_full_hour() {
        let now = wib().with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        assert_eq!(delay_until_next_hour(now), Duration::from_secs(HOUR_SECS));
    }

    #[test]
    fn sub_second_remainder_is_respected() {
        let now = wib().with_ymd_and_hms(2024, 5, 1, 23, 59, 59).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(delay_until_next_hour(now), Duration::from_millis(750));
        assert_eq!(
            next_top_of_hour(now),
            wib().with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn alignment_follows_fixed_offset_not_utc() {
        // 00:30 UTC is 07:30 WIB; next WIB top of hour is 08:00 WIB = 01:00 UTC
        let utc = Utc.with_ymd_and_hms(2024, 5, 1, 0, 30, 0).unwrap();
        let local = utc.with_timezone(&wib());
        assert_eq!(
            next_top_of_hour(local).with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap()
        );
    }

    #[test]
    fn half_hour_offsets_align_to_local_hour() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).expect("valid offset");
        let now = ist.with_ymd_and_hms(2024, 5, 1, 10, 45, 0).unwrap();
        assert_eq!(delay_until_next_hour(now), Duration::from_secs(900));
    }

    #[test]
    fn rejects_out_of_range_offset() {
        let cfg = ScheduleConfig {
            utc_offset_hours: 30,
            interval_secs: HOUR_SECS,
        };
        assert!(cfg.offset().is_err());
    }
}
