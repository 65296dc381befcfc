//! Caddy menu-bar app.
//!
//! Shows the next Google Calendar meetings in the system tray and raises a
//! desktop notification two minutes before each one starts, with a button
//! that joins the call.

pub mod app;
pub mod config;
pub mod error;
pub mod menu;
pub mod presenter;
pub mod state;
#[cfg(not(target_os = "linux"))]
pub mod statusbar;
#[cfg(target_os = "linux")]
pub mod tray;
pub mod unconfigured;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};

use caddy_providers::google::{GoogleCalendar, GoogleCredentialStore};
use caddy_providers::{CalendarSource, CredentialSource};
use caddy_scheduler::{DesktopNotifier, NotificationScheduler};

pub use app::App;
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use menu::EntryId;
use presenter::Presenter;
use unconfigured::Unconfigured;

/// Runs the app until `Quit` or Ctrl-C.
///
/// Call from `main`: on macOS the status item has to live on the main
/// thread, so the async side moves to a worker there.
pub fn launch(config: AppConfig) -> AppResult<()> {
    #[cfg(target_os = "linux")]
    return block_on(tray::run(config))?;

    #[cfg(not(target_os = "linux"))]
    return statusbar::launch(config);
}

/// Drives `future` on a current-thread runtime shared by the app loop and
/// the alert timers.
pub(crate) fn block_on<F: Future>(future: F) -> AppResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

/// Builds the sources, the notifier and the scheduler around `presenter`,
/// then runs the app loop until it stops or Ctrl-C arrives.
pub async fn serve(
    config: AppConfig,
    presenter: Box<dyn Presenter>,
    clicks: UnboundedReceiver<EntryId>,
) -> AppResult<()> {
    let (credentials, calendar) = google_sources(&config);

    let notifier = Arc::new(DesktopNotifier::new(config.notifications.to_notify_config()));
    let scheduler = NotificationScheduler::new(notifier);

    let app = App::new(&config, credentials, calendar, scheduler, presenter);

    tokio::select! {
        _ = app.run(clicks) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("interrupted");
        }
    }
    Ok(())
}

/// Google sources, or stand-ins that keep the app signed out when the
/// client credentials are missing or invalid.
fn google_sources(config: &AppConfig) -> (Arc<dyn CredentialSource>, Arc<dyn CalendarSource>) {
    match connect_google(config) {
        Ok(sources) => sources,
        Err(e) => {
            error!(error = %e, "Google Calendar is not set up, sign-in disabled");
            let unconfigured = Arc::new(Unconfigured::new(e.to_string()));
            let credentials: Arc<dyn CredentialSource> = unconfigured.clone();
            let calendar: Arc<dyn CalendarSource> = unconfigured;
            (credentials, calendar)
        }
    }
}

fn connect_google(
    config: &AppConfig,
) -> AppResult<(Arc<dyn CredentialSource>, Arc<dyn CalendarSource>)> {
    let google = config.google.to_provider_config()?;
    let credentials = GoogleCredentialStore::new(&google)?;
    let calendar = GoogleCalendar::new(&google)?;
    info!(
        token = %credentials.token_path().display(),
        calendar = %google.calendar_id,
        "starting"
    );
    let credentials: Arc<dyn CredentialSource> = Arc::new(credentials);
    let calendar: Arc<dyn CalendarSource> = Arc::new(calendar);
    Ok((credentials, calendar))
}
