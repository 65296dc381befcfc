//! Core types: events, join links, countdowns, tracing

pub mod event;
pub mod links;
pub mod time;
pub mod tracing;

pub use event::{Event, EventLink, LinkKind, soonest};
pub use links::{detect_link, find_join_link};
pub use time::{countdown, time_until};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
