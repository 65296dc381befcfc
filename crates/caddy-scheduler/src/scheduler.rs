//! Keeps exactly one alert armed for the next meeting.
//!
//! Every refresh hands the fresh event list to
//! [`NotificationScheduler::reschedule`], which throws away whatever was
//! armed and binds a new [`DelayTimer`] to the soonest event. The timer
//! fires [`LEAD_TIME_SECS`] seconds before the event starts, or right away
//! when that moment has already passed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use caddy_core::{Event, countdown, soonest};

use crate::notify::{Alert, Notifier};
use crate::timer::DelayTimer;

/// How long before the start of a meeting the alert fires.
pub const LEAD_TIME_SECS: i64 = 120;

/// Observable scheduler state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Armed { event_id: String },
}

#[derive(Debug)]
struct Armed {
    event_id: String,
    timer: DelayTimer,
}

/// Owns the single pending alert.
pub struct NotificationScheduler {
    notifier: Arc<dyn Notifier>,
    armed: Option<Armed>,
}

impl NotificationScheduler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            armed: None,
        }
    }

    /// Replaces the pending alert with one for the soonest of `events`.
    ///
    /// Whatever was armed is cancelled first, even if the same event comes
    /// back. An empty list leaves the scheduler idle.
    pub fn reschedule(&mut self, events: &[Event], now: DateTime<Utc>) {
        self.cancel();

        let Some(event) = soonest(events) else {
            debug!("no upcoming events, nothing to arm");
            return;
        };

        let delay = countdown(event.start, now, chrono::Duration::seconds(LEAD_TIME_SECS));
        let alert = Alert::for_event(event);
        let notifier = Arc::clone(&self.notifier);

        info!(
            event = %event.id,
            title = %event.title,
            link = event.join_link.as_ref().map_or("none", |l| l.kind.display_name()),
            delay_secs = delay.as_secs(),
            "armed meeting alert"
        );

        let timer = DelayTimer::start(delay, move || notifier.notify(alert));
        self.armed = Some(Armed {
            event_id: event.id.clone(),
            timer,
        });
    }

    /// Stops the pending alert, if any.
    pub fn cancel(&mut self) {
        if let Some(armed) = self.armed.take()
            && armed.timer.stop()
        {
            debug!(event = %armed.event_id, "cancelled meeting alert");
        }
    }

    /// `Armed` only while the bound timer has neither fired nor been stopped.
    pub fn state(&self) -> SchedulerState {
        match &self.armed {
            Some(armed) if armed.timer.is_pending() => SchedulerState::Armed {
                event_id: armed.event_id.clone(),
            },
            _ => SchedulerState::Idle,
        }
    }
}

impl std::fmt::Debug for NotificationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationScheduler")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
