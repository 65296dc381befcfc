//! One-shot and repeating timers on the tokio runtime.
//!
//! [`DelayTimer`] runs a callback once after a delay unless stopped first.
//! Stop and fire race through a single atomic state, so exactly one of
//! them wins:
//!
//! ```text
//!            ┌──── fire ────▶ Fired
//! Pending ───┤
//!            └──── stop ────▶ Stopped
//! ```
//!
//! [`RepeatingTimer`] ticks at a fixed period and never bursts missed ticks.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const STOPPED: u8 = 2;

/// Shortest accepted repeating period.
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    cancel: CancellationToken,
}

impl Shared {
    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A cancellable one-shot delay.
///
/// Dropping the handle does not cancel the timer; call [`DelayTimer::stop`].
#[derive(Debug)]
pub struct DelayTimer {
    shared: Arc<Shared>,
}

impl DelayTimer {
    /// Spawns the timer. A zero delay fires on the next poll of the task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(delay: Duration, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(PENDING),
            cancel: CancellationToken::new(),
        });

        let task_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = task_shared.cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if task_shared.transition(FIRED) {
                trace!(?delay, "delay timer fired");
                callback();
            }
        });

        Self { shared }
    }

    /// Cancels the timer if it has not fired yet.
    ///
    /// Returns true if this call cancelled it. Stopping a fired or already
    /// stopped timer is a no-op.
    pub fn stop(&self) -> bool {
        let stopped = self.shared.transition(STOPPED);
        if stopped {
            self.shared.cancel.cancel();
        }
        stopped
    }

    /// True until the timer fires or is stopped.
    pub fn is_pending(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == PENDING
    }

    pub fn has_fired(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == FIRED
    }
}

/// Fixed-period ticker. The first tick is one period after creation.
#[derive(Debug)]
pub struct RepeatingTimer {
    interval: Interval,
}

impl RepeatingTimer {
    /// Creates the timer; periods below [`MIN_PERIOD`] are raised to it.
    pub fn new(period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Waits for the next tick. Cancel safe.
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }

    /// Awaits `callback` after every tick, one at a time, forever.
    pub async fn run<F, Fut>(mut self, mut callback: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            self.tick().await;
            callback().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&count);
        (count, move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let (count, callback) = counter();
        let timer = DelayTimer::start(Duration::from_secs(10), callback);

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(timer.has_fired());
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_fires_immediately() {
        let (count, callback) = counter();
        let timer = DelayTimer::start(Duration::ZERO, callback);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(timer.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_fire_prevents_callback() {
        let (count, callback) = counter();
        let timer = DelayTimer::start(Duration::from_secs(10), callback);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(timer.stop());
        assert!(!timer.is_pending());

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!timer.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_fire_is_noop() {
        let (count, callback) = counter();
        let timer = DelayTimer::start(Duration::from_secs(1), callback);

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert!(!timer.stop());
        assert!(timer.has_fired());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_stop_returns_false() {
        let (_, callback) = counter();
        let timer = DelayTimer::start(Duration::from_secs(1), callback);
        assert!(timer.stop());
        assert!(!timer.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_wins_on_zero_delay_before_task_runs() {
        let (count, callback) = counter();
        let timer = DelayTimer::start(Duration::ZERO, callback);
        assert!(timer.stop());
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_does_not_cancel() {
        let (count, callback) = counter();
        drop(DelayTimer::start(Duration::from_secs(1), callback));

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_first_tick_after_one_period() {
        let start = Instant::now();
        let mut timer = RepeatingTimer::new(Duration::from_secs(300));

        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(300));

        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_skips_missed_ticks() {
        let start = Instant::now();
        let mut timer = RepeatingTimer::new(Duration::from_secs(10));

        // A slow handler overruns several periods.
        tokio::time::sleep(Duration::from_secs(35)).await;
        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(35));

        // Next tick lands on the schedule, not immediately.
        timer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_clamps_short_period() {
        assert_eq!(RepeatingTimer::new(Duration::ZERO).period(), MIN_PERIOD);
        assert_eq!(
            RepeatingTimer::new(Duration::from_millis(10)).period(),
            MIN_PERIOD
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_awaits_callback_each_tick() {
        let count = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&count);
        let timer = RepeatingTimer::new(Duration::from_secs(60));

        let handle = tokio::spawn(timer.run(move || {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        }));

        tokio::time::sleep(Duration::from_secs(185)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        handle.abort();
    }
}
