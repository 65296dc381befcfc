//! Presentation state owned by the app loop.

use caddy_core::Event;

use crate::menu::MenuModel;

/// Everything the presenter needs to draw the tray.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub authenticated: bool,
    /// Upcoming events from the last refresh, soonest first.
    pub events: Vec<Event>,
    /// Menu-bar title; `None` shows the bare icon.
    pub title: Option<String>,
    pub menu: MenuModel,
}

impl AppState {
    /// Drops everything derived from the previous refresh.
    ///
    /// The menu stays until a new one is rendered so late clicks still
    /// resolve against what the user saw.
    pub fn clear(&mut self) {
        self.events.clear();
        self.title = None;
    }
}
