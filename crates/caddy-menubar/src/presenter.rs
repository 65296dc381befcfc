//! Where the app state ends up on screen.

use tracing::info;

use caddy_providers::BoxFuture;

use crate::state::AppState;

/// Draws the menu and title.
///
/// Called after every refresh with the complete state; implementations
/// replace whatever they showed before.
pub trait Presenter: Send + Sync {
    fn render<'a>(&'a self, state: &'a AppState) -> BoxFuture<'a, ()>;
}

/// Writes the state to the log. Used when no tray host is available.
#[derive(Debug, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn render<'a>(&'a self, state: &'a AppState) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            info!(
                authenticated = state.authenticated,
                title = state.title.as_deref().unwrap_or(""),
                events = state.events.len(),
                "menu updated\n{}",
                state.menu.render_text()
            );
        })
    }
}
