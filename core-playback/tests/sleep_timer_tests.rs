//! Sleep timer scheduling with paused tokio time.

mod common;

use async_trait::async_trait;
use bridge_traits::time::Clock;
use common::{ManualClock, TokioClock};
use core_playback::sleep_timer::{SleepAction, SleepTimer};
use core_playback::PlaybackError;
use core_runtime::events::{CoreEvent, EventBus, SleepTimerEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct CountingAction {
    fired: AtomicUsize,
}

impl CountingAction {
    fn count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SleepAction for CountingAction {
    async fn on_sleep_timer_expired(&self) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }
}

fn timer_with(clock: Arc<dyn Clock>, tick: Duration) -> (SleepTimer, Arc<CountingAction>, EventBus) {
    let action = Arc::new(CountingAction::default());
    let events = EventBus::new(32);
    let timer = SleepTimer::new(clock, action.clone(), events.clone(), tick);
    (timer, action, events)
}

#[tokio::test(start_paused = true)]
async fn test_resetting_replaces_the_previous_timer() {
    let (timer, action, _events) = timer_with(TokioClock::new(), Duration::from_secs(1));

    timer.set(5).unwrap();
    timer.set(10).unwrap();

    tokio::time::sleep(Duration::from_secs(6 * 60)).await;
    assert_eq!(action.count(), 0);
    assert!(timer.is_active());

    tokio::time::sleep(Duration::from_secs(4 * 60 + 2)).await;
    assert_eq!(action.count(), 1);
    assert!(!timer.is_active());

    tokio::time::sleep(Duration::from_secs(30 * 60)).await;
    assert_eq!(action.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_positive_durations_are_rejected() {
    let (timer, action, events) = timer_with(TokioClock::new(), Duration::from_secs(1));
    let mut rx = events.subscribe();

    assert_eq!(timer.set(0), Err(PlaybackError::InvalidSleepDuration(0)));
    assert_eq!(timer.set(-3), Err(PlaybackError::InvalidSleepDuration(-3)));
    assert!(!timer.is_active());
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(action.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ends_at_and_remaining_follow_the_clock() {
    let clock = TokioClock::new();
    let (timer, _action, _events) = timer_with(clock.clone(), Duration::from_secs(1));

    let started = clock.now();
    let ends_at = timer.set(5).unwrap();
    assert_eq!(ends_at, started + chrono::Duration::minutes(5));
    assert_eq!(timer.ends_at(), Some(ends_at));
    assert_eq!(timer.remaining_secs(), Some(300));

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(timer.remaining_secs(), Some(239));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_disarms_and_reports() {
    let (timer, action, events) = timer_with(TokioClock::new(), Duration::from_secs(1));
    let mut rx = events.subscribe();

    timer.set(1).unwrap();
    assert!(timer.cancel());
    assert!(!timer.cancel());
    assert_eq!(timer.remaining_secs(), None);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(action.count(), 0);

    assert!(matches!(
        rx.try_recv(),
        Ok(CoreEvent::SleepTimer(SleepTimerEvent::Set { .. }))
    ));
    assert!(matches!(
        rx.try_recv(),
        Ok(CoreEvent::SleepTimer(SleepTimerEvent::Cancelled))
    ));
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_expiry_emits_event() {
    let (timer, action, events) = timer_with(TokioClock::new(), Duration::from_secs(1));
    let mut rx = events.subscribe();

    timer.set(1).unwrap();
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(action.count(), 1);
    let _set = rx.try_recv().unwrap();
    assert!(matches!(
        rx.try_recv(),
        Ok(CoreEvent::SleepTimer(SleepTimerEvent::Expired))
    ));
}

#[tokio::test]
async fn test_check_expiry_catches_up_after_suspension() {
    let clock = ManualClock::new();
    let (timer, action, _events) = timer_with(clock.clone(), Duration::from_secs(3600));

    timer.set(15).unwrap();
    assert!(!timer.check_expiry().await);

    // Wall clock jumps while the process was suspended.
    clock.advance(chrono::Duration::minutes(20));
    assert_eq!(timer.remaining(), Some(Duration::ZERO));

    assert!(timer.check_expiry().await);
    assert!(!timer.check_expiry().await);
    assert_eq!(action.count(), 1);
    assert!(!timer.is_active());
}
