//! Meeting alerts: timers, the notification scheduler and desktop notifier.
//!
//! - [`DelayTimer`] / [`RepeatingTimer`] - tokio-backed one-shot and periodic timers
//! - [`NotificationScheduler`] - keeps one alert armed for the next meeting
//! - [`DesktopNotifier`] - shows an [`Alert`] through the OS notification service
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use caddy_scheduler::{DesktopNotifier, NotificationScheduler, NotifyConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let notifier = Arc::new(DesktopNotifier::new(NotifyConfig::default()));
//!     let mut scheduler = NotificationScheduler::new(notifier);
//!     scheduler.reschedule(&[], chrono::Utc::now());
//! }
//! ```

mod notify;
mod scheduler;
mod timer;

pub use notify::{Alert, DesktopNotifier, JOIN_ACTION, Notifier, NotifyConfig};
pub use scheduler::{LEAD_TIME_SECS, NotificationScheduler, SchedulerState};
pub use timer::{DelayTimer, MIN_PERIOD, RepeatingTimer};
