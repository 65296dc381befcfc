//! Desktop alerts for meetings that are about to start.

use std::thread;

use tracing::{debug, error, info};

use caddy_core::Event;

const ALERT_TITLE: &str = "Meeting starting soon";
const ALERT_MESSAGE: &str = "Click here to join";
const JOIN_LABEL: &str = "Join Meet";
const OPEN_LABEL: &str = "Open Event";

/// Identifier of the notification button that opens the payload.
pub const JOIN_ACTION: &str = "join";

/// What a fired notification shows, captured when it is scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    /// The event title.
    pub subtitle: String,
    pub message: String,
    pub action_label: String,
    /// URL opened when the action is clicked.
    pub payload: Option<String>,
}

impl Alert {
    /// Builds the alert for `event`.
    ///
    /// The payload is the join link; events without one fall back to their
    /// calendar page and get an "Open Event" button instead.
    pub fn for_event(event: &Event) -> Self {
        let (action_label, payload) = match event.join_url() {
            Some(url) => (JOIN_LABEL, Some(url.to_string())),
            None => (OPEN_LABEL, event.web_link.clone()),
        };

        Self {
            title: ALERT_TITLE.to_string(),
            subtitle: event.title.clone(),
            message: ALERT_MESSAGE.to_string(),
            action_label: action_label.to_string(),
            payload,
        }
    }
}

/// Something that can show an [`Alert`].
///
/// Implementations must not block the caller for long; the scheduler calls
/// this from its timer task.
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: Alert);
}

/// Desktop notification settings.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Application name shown by the notification daemon.
    pub app_name: String,
    pub timeout_secs: u32,
    /// Custom notification icon path.
    pub icon_path: Option<String>,
    /// When false, alerts are logged and dropped.
    pub enabled: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            app_name: "Caddy".to_string(),
            timeout_secs: 10,
            icon_path: None,
            enabled: true,
        }
    }
}

impl NotifyConfig {
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn with_timeout(mut self, secs: u32) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_icon_path(mut self, path: impl Into<String>) -> Self {
        self.icon_path = Some(path.into());
        self
    }
}

/// Shows alerts through the OS notification service.
///
/// Each alert gets its own thread, which stays around until the user acts
/// on the notification so the button can open the meeting.
#[derive(Debug, Clone, Default)]
pub struct DesktopNotifier {
    config: NotifyConfig,
}

impl DesktopNotifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, alert: Alert) {
        if !self.config.enabled {
            info!(event = %alert.subtitle, "notifications disabled, dropping alert");
            return;
        }

        let config = self.config.clone();
        let spawned = thread::Builder::new()
            .name("caddy-alert".to_string())
            .spawn(move || show(&config, alert));

        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn notification thread");
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn show(config: &NotifyConfig, alert: Alert) {
    use std::time::Duration;

    let mut notification = notify_rust::Notification::new();
    notification
        .appname(&config.app_name)
        .summary(&alert.title)
        .body(&format!("{}\n{}", alert.subtitle, alert.message))
        .timeout(Duration::from_secs(u64::from(config.timeout_secs)));
    if alert.payload.is_some() {
        notification.action(JOIN_ACTION, &alert.action_label);
    }
    if let Some(ref icon) = config.icon_path {
        notification.icon(icon);
    }

    match notification.show() {
        #[cfg(unix)]
        Ok(handle) => {
            info!(event = %alert.subtitle, "notification shown");
            handle.wait_for_action(|action| {
                if is_open_action(action) {
                    open_payload(alert.payload.as_deref());
                } else {
                    debug!(action, "notification dismissed");
                }
            });
        }
        // Toasts report no clicks here.
        #[cfg(not(unix))]
        Ok(_) => info!(event = %alert.subtitle, "notification shown"),
        Err(e) => error!(error = %e, event = %alert.subtitle, "failed to show notification"),
    }
}

/// Notification Center alert with the join button as its main action.
///
/// `send` blocks until the alert is clicked, its button pressed, or it is
/// dismissed.
#[cfg(target_os = "macos")]
fn show(config: &NotifyConfig, alert: Alert) {
    use mac_notification_sys::{MainButton, Notification, NotificationResponse};

    let bundle = mac_notification_sys::get_bundle_identifier_or_default(&config.app_name);
    if let Err(e) = mac_notification_sys::set_application(&bundle) {
        debug!(error = %e, bundle = %bundle, "notification application already set");
    }

    let mut notification = Notification::new();
    notification
        .title(&alert.title)
        .subtitle(&alert.subtitle)
        .message(&alert.message)
        .wait_for_click(true);
    if alert.payload.is_some() {
        notification.main_button(MainButton::SingleAction(&alert.action_label));
    }
    if let Some(ref icon) = config.icon_path {
        notification.app_icon(icon);
    }

    info!(event = %alert.subtitle, "notification shown");
    match notification.send() {
        Ok(NotificationResponse::ActionButton(_) | NotificationResponse::Click) => {
            open_payload(alert.payload.as_deref());
        }
        Ok(_) => debug!(event = %alert.subtitle, "notification dismissed"),
        Err(e) => error!(error = %e, event = %alert.subtitle, "failed to show notification"),
    }
}

#[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
fn is_open_action(action: &str) -> bool {
    matches!(action, JOIN_ACTION | "default")
}

#[cfg_attr(all(not(unix), not(target_os = "macos")), allow(dead_code))]
fn open_payload(payload: Option<&str>) {
    let Some(url) = payload else {
        debug!("alert has no link to open");
        return;
    };
    if let Err(e) = open::that(url) {
        error!(error = %e, url, "failed to open meeting link");
    }
}
