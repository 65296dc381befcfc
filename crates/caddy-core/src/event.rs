//! Event types for calendar events.
//!
//! - [`Event`]: one upcoming meeting as fetched from the calendar
//! - [`EventLink`]: a join link with its detected service
//! - [`LinkKind`]: the video conferencing service behind a link

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of meeting link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    GoogleMeet,
    Zoom,
    Teams,
    Jitsi,
    Webex,
    /// Any other URL that might be a meeting link
    Other,
}

impl LinkKind {
    /// Returns a human-readable name for this link kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::GoogleMeet => "Google Meet",
            Self::Zoom => "Zoom",
            Self::Teams => "Microsoft Teams",
            Self::Jitsi => "Jitsi",
            Self::Webex => "Cisco Webex",
            Self::Other => "Link",
        }
    }

    /// Returns true if this is a video conferencing link.
    pub fn is_video_conference(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// A link that joins a meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLink {
    /// The kind of meeting link.
    pub kind: LinkKind,
    /// The URL to open.
    pub url: String,
}

impl EventLink {
    /// Creates a new EventLink with the given kind and URL.
    pub fn new(kind: LinkKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }
}

/// An upcoming calendar event.
///
/// Events are immutable once fetched. Each refresh replaces the whole list,
/// so there is no identity tracking across refreshes beyond `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Provider-specific identifier.
    pub id: String,
    /// The event title/summary.
    pub title: String,
    /// When the event starts.
    pub start: DateTime<Utc>,
    /// When the event ends.
    pub end: DateTime<Utc>,
    /// Link that joins the meeting, if one was found.
    pub join_link: Option<EventLink>,
    /// Link to the event page in the calendar web UI.
    pub web_link: Option<String>,
}

impl Event {
    /// Creates an event without links.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end,
            join_link: None,
            web_link: None,
        }
    }

    /// Builder method to set the join link.
    pub fn with_join_link(mut self, link: EventLink) -> Self {
        self.join_link = Some(link);
        self
    }

    /// Builder method to set the web link.
    pub fn with_web_link(mut self, url: impl Into<String>) -> Self {
        self.web_link = Some(url.into());
        self
    }

    /// Returns the join URL, if any.
    pub fn join_url(&self) -> Option<&str> {
        self.join_link.as_ref().map(|l| l.url.as_str())
    }

    /// Returns true if the event starts at or after `now`.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.start >= now
    }
}

/// Returns the event with the earliest start time.
///
/// Ties keep the first event in list order.
pub fn soonest(events: &[Event]) -> Option<&Event> {
    events.iter().min_by_key(|e| e.start)
}
