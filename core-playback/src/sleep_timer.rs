//! # Sleep Timer
//!
//! Stops playback once an absolute end time passes.
//!
//! The timer stores the end timestamp, not a countdown, and recomputes the
//! remaining time from the [`Clock`] on every tick, so a process that was
//! suspended catches up on its first tick after resuming. Hosts that know they
//! were just resumed can call [`SleepTimer::check_expiry`] directly.
//!
//! At most one timer is armed. Arming a new one replaces the old one, and each
//! armed timer fires at most once.

use async_trait::async_trait;
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use core_runtime::events::{CoreEvent, EventBus, SleepTimerEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::controller::PlaybackController;
use crate::error::{PlaybackError, Result};

/// What happens when the timer runs out.
#[async_trait]
pub trait SleepAction: Send + Sync {
    async fn on_sleep_timer_expired(&self);
}

#[async_trait]
impl SleepAction for PlaybackController {
    async fn on_sleep_timer_expired(&self) {
        self.stop().await;
    }
}

struct ArmedTimer {
    generation: u64,
    ends_at: DateTime<Utc>,
    task: JoinHandle<()>,
}

type Slot = Arc<Mutex<Option<ArmedTimer>>>;

pub struct SleepTimer {
    clock: Arc<dyn Clock>,
    action: Arc<dyn SleepAction>,
    events: EventBus,
    tick: Duration,
    armed: Slot,
    generation: AtomicU64,
}

impl SleepTimer {
    pub fn new(
        clock: Arc<dyn Clock>,
        action: Arc<dyn SleepAction>,
        events: EventBus,
        tick: Duration,
    ) -> Self {
        Self {
            clock,
            action,
            events,
            tick: tick.max(Duration::from_millis(1)),
            armed: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    /// Arm the timer for `minutes` from now, replacing any armed timer.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(self))]
    pub fn set(&self, minutes: i64) -> Result<DateTime<Utc>> {
        if minutes <= 0 {
            warn!("Rejected sleep timer of {} minutes", minutes);
            return Err(PlaybackError::InvalidSleepDuration(minutes));
        }
        let ends_at = chrono::Duration::try_minutes(minutes)
            .and_then(|span| self.clock.now().checked_add_signed(span))
            .ok_or(PlaybackError::InvalidSleepDuration(minutes))?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut armed = self.armed.lock();
            if let Some(previous) = armed.take() {
                previous.task.abort();
                debug!("Replaced previous sleep timer");
            }
            let task = tokio::spawn(Self::run(
                self.clock.clone(),
                self.action.clone(),
                self.events.clone(),
                self.armed.clone(),
                self.tick,
                generation,
                ends_at,
            ));
            *armed = Some(ArmedTimer {
                generation,
                ends_at,
                task,
            });
        }

        let _ = self.events.emit(CoreEvent::SleepTimer(SleepTimerEvent::Set {
            ends_at_ms: ends_at.timestamp_millis(),
        }));
        info!(%ends_at, "Sleep timer set");
        Ok(ends_at)
    }

    /// Disarm the timer. Returns whether one was armed.
    pub fn cancel(&self) -> bool {
        let previous = self.armed.lock().take();
        match previous {
            Some(timer) => {
                timer.task.abort();
                let _ = self
                    .events
                    .emit(CoreEvent::SleepTimer(SleepTimerEvent::Cancelled));
                info!("Sleep timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.armed.lock().is_some()
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.armed.lock().as_ref().map(|timer| timer.ends_at)
    }

    /// Time left, zero once the end time has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let ends_at = self.ends_at()?;
        Some((ends_at - self.clock.now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Whole seconds left, rounded down.
    pub fn remaining_secs(&self) -> Option<u64> {
        self.remaining().map(|left| left.as_secs())
    }

    /// Fire now if the end time has passed. Returns whether it fired.
    pub async fn check_expiry(&self) -> bool {
        let now = self.clock.now();
        let due = self
            .armed
            .lock()
            .as_ref()
            .filter(|timer| now >= timer.ends_at)
            .map(|timer| timer.generation);

        let Some(generation) = due else {
            return false;
        };
        match Self::claim(&self.armed, generation) {
            Some(timer) => {
                timer.task.abort();
                Self::expire(self.action.as_ref(), &self.events).await;
                true
            }
            None => false,
        }
    }

    async fn run(
        clock: Arc<dyn Clock>,
        action: Arc<dyn SleepAction>,
        events: EventBus,
        armed: Slot,
        tick: Duration,
        generation: u64,
        ends_at: DateTime<Utc>,
    ) {
        loop {
            let left = ends_at - clock.now();
            let Ok(left) = left.to_std() else { break };
            if left.is_zero() {
                break;
            }
            tokio::time::sleep(left.min(tick)).await;
        }

        if Self::claim(&armed, generation).is_some() {
            Self::expire(action.as_ref(), &events).await;
        }
    }

    /// Take the armed timer if it is still the one identified by `generation`.
    fn claim(armed: &Slot, generation: u64) -> Option<ArmedTimer> {
        let mut slot = armed.lock();
        match slot.as_ref() {
            Some(timer) if timer.generation == generation => slot.take(),
            _ => None,
        }
    }

    async fn expire(action: &dyn SleepAction, events: &EventBus) {
        info!("Sleep timer expired, stopping playback");
        action.on_sleep_timer_expired().await;
        let _ = events.emit(CoreEvent::SleepTimer(SleepTimerEvent::Expired));
    }
}

impl Drop for SleepTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.armed.lock().take() {
            timer.task.abort();
        }
    }
}

/// `m:ss` rendering of a countdown, e.g. `4:05`.
pub fn format_countdown(total_secs: u64) -> String {
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(0), "0:00");
        assert_eq!(format_countdown(9), "0:09");
        assert_eq!(format_countdown(245), "4:05");
        assert_eq!(format_countdown(3600), "60:00");
    }
}
