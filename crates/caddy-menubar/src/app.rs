//! The app loop: periodic refresh and menu clicks.
//!
//! One task owns [`AppState`]. It wakes on either a refresh tick or a menu
//! click, handles it to completion, then goes back to waiting, so refreshes
//! never overlap and state needs no locking.
//!
//! ```text
//!  RepeatingTimer ──tick──┐
//!                         ├──▶ App::run ──▶ refresh() / dispatch()
//!  tray clicks ──EntryId──┘                     │
//!                                               ▼
//!                          NotificationScheduler, Presenter
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use caddy_providers::{CalendarSource, CredentialSource};
use caddy_scheduler::{NotificationScheduler, RepeatingTimer};

use crate::config::AppConfig;
use crate::menu::{EntryId, MenuAction, MenuModel, title_for};
use crate::presenter::Presenter;
use crate::state::AppState;

type Opener = fn(&str) -> std::io::Result<()>;

fn open_in_browser(url: &str) -> std::io::Result<()> {
    open::that(url)
}

pub struct App {
    state: AppState,
    generation: u64,
    refresh_interval: Duration,
    max_events: usize,
    calendar_url: String,
    credentials: Arc<dyn CredentialSource>,
    calendar: Arc<dyn CalendarSource>,
    scheduler: NotificationScheduler,
    presenter: Box<dyn Presenter>,
    opener: Opener,
}

impl App {
    pub fn new(
        config: &AppConfig,
        credentials: Arc<dyn CredentialSource>,
        calendar: Arc<dyn CalendarSource>,
        scheduler: NotificationScheduler,
        presenter: Box<dyn Presenter>,
    ) -> Self {
        Self {
            state: AppState::default(),
            generation: 0,
            refresh_interval: config.refresh_interval(),
            max_events: config.max_events,
            calendar_url: config.calendar_url.clone(),
            credentials,
            calendar,
            scheduler,
            presenter,
            opener: open_in_browser,
        }
    }

    /// Replaces how URLs are opened.
    pub fn with_opener(mut self, opener: Opener) -> Self {
        self.opener = opener;
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    /// Refreshes now, then on every tick, and handles clicks in between.
    ///
    /// Returns on `Quit` or when the click channel closes. The pending alert
    /// is cancelled on the way out.
    pub async fn run(mut self, mut clicks: UnboundedReceiver<EntryId>) {
        let mut ticker = RepeatingTimer::new(self.refresh_interval);
        self.refresh().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh().await,
                click = clicks.recv() => match click {
                    Some(id) => {
                        if self.dispatch(id).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        debug!("menu channel closed");
                        break;
                    }
                },
            }
        }

        self.scheduler.cancel();
        info!("stopped");
    }

    /// One refresh cycle: credential, events, alert, menu.
    pub async fn refresh(&mut self) {
        self.state.clear();
        self.generation += 1;

        let Some(credential) = self.credentials.get().await else {
            info!("not signed in");
            self.show_signed_out().await;
            return;
        };

        let events = match self
            .calendar
            .list_upcoming(&credential, self.max_events)
            .await
        {
            Ok(events) => events,
            Err(e) if e.requires_login() => {
                warn!(error = %e, "calendar rejected the stored credential, signing out");
                if let Err(e) = self.credentials.invalidate() {
                    error!(error = %e, "failed to remove stored credential");
                }
                self.show_signed_out().await;
                return;
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "failed to fetch events");
                Vec::new()
            }
        };

        self.scheduler.reschedule(&events, Utc::now());

        self.state.authenticated = true;
        self.state.title = title_for(&events, &Local);
        self.state.menu =
            MenuModel::authenticated(self.generation, &events, &self.calendar_url, &Local);
        self.state.events = events;

        debug!(
            events = self.state.events.len(),
            title = self.state.title.as_deref().unwrap_or(""),
            "refreshed"
        );
        self.presenter.render(&self.state).await;
    }

    async fn show_signed_out(&mut self) {
        self.state.authenticated = false;
        self.scheduler.cancel();
        self.state.menu = MenuModel::unauthenticated(self.generation);
        self.presenter.render(&self.state).await;
    }

    /// Handles a menu click. Breaks on `Quit`.
    pub async fn dispatch(&mut self, id: EntryId) -> ControlFlow<()> {
        let Some(action) = self.state.menu.action(id).cloned() else {
            debug!(?id, generation = self.state.menu.generation, "ignoring stale menu click");
            return ControlFlow::Continue(());
        };

        match action {
            MenuAction::OpenUrl(url) => {
                if let Err(e) = (self.opener)(&url) {
                    error!(error = %e, url = %url, "failed to open URL");
                }
            }
            MenuAction::Login => {
                match self.credentials.login().await {
                    Ok(_) => info!("signed in to Google Calendar"),
                    Err(e) => warn!(error = %e, "sign-in failed"),
                }
                self.refresh().await;
            }
            MenuAction::Logout => {
                if let Err(e) = self.credentials.invalidate() {
                    error!(error = %e, "failed to remove stored credential");
                }
                self.state.title = None;
                self.refresh().await;
            }
            MenuAction::Quit => return ControlFlow::Break(()),
        }

        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use caddy_core::Event;
    use caddy_providers::{BoxFuture, ProviderError, ProviderResult, TokenInfo};
    use caddy_scheduler::{Alert, Notifier, SchedulerState};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct FakeCredentials {
        token: Mutex<Option<TokenInfo>>,
        login_fails: bool,
        invalidations: AtomicUsize,
    }

    impl FakeCredentials {
        fn signed_in() -> Self {
            Self {
                token: Mutex::new(Some(token())),
                ..Default::default()
            }
        }
    }

    impl CredentialSource for FakeCredentials {
        fn get(&self) -> BoxFuture<'_, Option<TokenInfo>> {
            Box::pin(async move { self.token.lock().unwrap().clone() })
        }

        fn login(&self) -> BoxFuture<'_, ProviderResult<TokenInfo>> {
            Box::pin(async move {
                if self.login_fails {
                    return Err(ProviderError::authentication("denied"));
                }
                *self.token.lock().unwrap() = Some(token());
                Ok(token())
            })
        }

        fn invalidate(&self) -> ProviderResult<()> {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
            *self.token.lock().unwrap() = None;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeCalendar {
        events: Mutex<Vec<Event>>,
        fail: bool,
        reject_token: bool,
        calls: AtomicUsize,
    }

    impl FakeCalendar {
        fn with(events: Vec<Event>) -> Self {
            Self {
                events: Mutex::new(events),
                ..Default::default()
            }
        }
    }

    impl CalendarSource for FakeCalendar {
        fn list_upcoming<'a>(
            &'a self,
            _credential: &'a TokenInfo,
            limit: usize,
        ) -> BoxFuture<'a, ProviderResult<Vec<Event>>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.fail {
                    return Err(ProviderError::network("offline"));
                }
                if self.reject_token {
                    return Err(ProviderError::authentication("token revoked"));
                }
                let mut events = self.events.lock().unwrap().clone();
                events.truncate(limit);
                Ok(events)
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        alerts: Mutex<Vec<Alert>>,
    }

    impl Notifier for Recorder {
        fn notify(&self, alert: Alert) {
            self.alerts.lock().unwrap().push(alert);
        }
    }

    #[derive(Clone, Default)]
    struct Screen {
        frames: Arc<Mutex<Vec<AppState>>>,
    }

    impl Screen {
        fn last(&self) -> AppState {
            self.frames.lock().unwrap().last().cloned().unwrap()
        }

        fn count(&self) -> usize {
            self.frames.lock().unwrap().len()
        }
    }

    impl Presenter for Screen {
        fn render<'a>(&'a self, state: &'a AppState) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                self.frames.lock().unwrap().push(state.clone());
            })
        }
    }

    static OPENED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn record_open(url: &str) -> std::io::Result<()> {
        OPENED.lock().unwrap().push(url.to_string());
        Ok(())
    }

    fn token() -> TokenInfo {
        TokenInfo::new("access", Some("refresh".to_string()), Some(3600), vec![])
    }

    fn event(id: &str, title: &str, starts_in_secs: i64) -> Event {
        let start = Utc::now() + chrono::Duration::seconds(starts_in_secs);
        Event::new(id, title, start, start + chrono::Duration::minutes(30))
            .with_web_link(format!("https://calendar.google.com/event?eid={id}"))
    }

    struct Harness {
        app: App,
        credentials: Arc<FakeCredentials>,
        calendar: Arc<FakeCalendar>,
        alerts: Arc<Recorder>,
        screen: Screen,
    }

    fn harness(credentials: FakeCredentials, calendar: FakeCalendar) -> Harness {
        let credentials = Arc::new(credentials);
        let calendar = Arc::new(calendar);
        let alerts = Arc::new(Recorder::default());
        let screen = Screen::default();
        let config = AppConfig {
            calendar_url: "https://calendar.example".to_string(),
            ..Default::default()
        };

        let app = App::new(
            &config,
            credentials.clone(),
            calendar.clone(),
            NotificationScheduler::new(alerts.clone()),
            Box::new(screen.clone()),
        )
        .with_opener(record_open);

        Harness {
            app,
            credentials,
            calendar,
            alerts,
            screen,
        }
    }

    fn entry(state: &AppState, wanted: &MenuAction) -> EntryId {
        (0..)
            .map(|index| EntryId {
                generation: state.menu.generation,
                index,
            })
            .take(64)
            .find(|id| state.menu.action(*id) == Some(wanted))
            .unwrap()
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn signed_out_shows_configure_menu() {
        let mut h = harness(FakeCredentials::default(), FakeCalendar::default());
        h.app.refresh().await;

        let state = h.screen.last();
        assert!(!state.authenticated);
        assert!(state.title.is_none());
        insta::assert_snapshot!(state.menu.render_text(), @r"
        Configure >
          Google Calendar
        ---
        Quit
        ");
        assert_eq!(h.app.scheduler().state(), SchedulerState::Idle);
        assert_eq!(h.calendar.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn signed_in_arms_alert_and_fires_before_start() {
        let mut h = harness(
            FakeCredentials::signed_in(),
            FakeCalendar::with(vec![event("e1", "Standup", 130)]),
        );
        h.app.refresh().await;

        let state = h.screen.last();
        assert!(state.authenticated);
        assert!(state.title.as_deref().unwrap().ends_with(" - Standup"));
        assert_eq!(
            h.app.scheduler().state(),
            SchedulerState::Armed {
                event_id: "e1".to_string()
            }
        );

        advance(9).await;
        assert!(h.alerts.alerts.lock().unwrap().is_empty());

        advance(2).await;
        let alerts = h.alerts.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subtitle, "Standup");
        assert_eq!(
            alerts[0].payload.as_deref(),
            Some("https://calendar.google.com/event?eid=e1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_shows_empty_signed_in_menu() {
        let mut h = harness(
            FakeCredentials::signed_in(),
            FakeCalendar {
                fail: true,
                ..Default::default()
            },
        );
        h.app.refresh().await;

        let state = h.screen.last();
        assert!(state.authenticated);
        assert!(state.events.is_empty());
        assert!(state.title.is_none());
        assert!(state.menu.render_text().contains("Logout"));
        assert_eq!(h.app.scheduler().state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn revoked_token_signs_out() {
        let mut h = harness(
            FakeCredentials::signed_in(),
            FakeCalendar {
                reject_token: true,
                ..Default::default()
            },
        );
        h.app.refresh().await;

        assert_eq!(h.credentials.invalidations.load(Ordering::SeqCst), 1);
        let state = h.screen.last();
        assert!(!state.authenticated);
        assert!(state.menu.render_text().starts_with("Configure >"));

        h.app.refresh().await;
        assert_eq!(h.calendar.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_respects_max_events() {
        let events = (0..15)
            .map(|i| event(&format!("e{i}"), "Sync", 600 + i * 60))
            .collect();
        let mut h = harness(FakeCredentials::signed_in(), FakeCalendar::with(events));
        h.app.refresh().await;

        assert_eq!(h.screen.last().events.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_cancels_alert_and_clears_title() {
        let mut h = harness(
            FakeCredentials::signed_in(),
            FakeCalendar::with(vec![event("e1", "Standup", 600)]),
        );
        h.app.refresh().await;
        let logout = entry(&h.screen.last(), &MenuAction::Logout);

        let flow = h.app.dispatch(logout).await;

        assert!(flow.is_continue());
        assert_eq!(h.credentials.invalidations.load(Ordering::SeqCst), 1);
        let state = h.screen.last();
        assert!(!state.authenticated);
        assert!(state.title.is_none());
        assert_eq!(h.app.scheduler().state(), SchedulerState::Idle);

        advance(3600).await;
        assert!(h.alerts.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn login_signs_in_and_refreshes() {
        let mut h = harness(
            FakeCredentials::default(),
            FakeCalendar::with(vec![event("e1", "Standup", 600)]),
        );
        h.app.refresh().await;
        let login = entry(&h.screen.last(), &MenuAction::Login);

        h.app.dispatch(login).await;

        let state = h.screen.last();
        assert!(state.authenticated);
        assert_eq!(state.events.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_login_stays_signed_out() {
        let mut h = harness(
            FakeCredentials {
                login_fails: true,
                ..Default::default()
            },
            FakeCalendar::default(),
        );
        h.app.refresh().await;
        let login = entry(&h.screen.last(), &MenuAction::Login);

        h.app.dispatch(login).await;

        assert!(!h.screen.last().authenticated);
        assert_eq!(h.screen.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_click_is_ignored() {
        let mut h = harness(FakeCredentials::signed_in(), FakeCalendar::default());
        h.app.refresh().await;
        let stale_logout = entry(&h.screen.last(), &MenuAction::Logout);
        h.app.refresh().await;

        let flow = h.app.dispatch(stale_logout).await;

        assert!(flow.is_continue());
        assert_eq!(h.credentials.invalidations.load(Ordering::SeqCst), 0);
        assert!(h.screen.last().authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn open_url_uses_opener() {
        let mut h = harness(
            FakeCredentials::signed_in(),
            FakeCalendar::with(vec![event("opened", "Review", 900)]),
        );
        h.app.refresh().await;
        let wanted = MenuAction::OpenUrl("https://calendar.google.com/event?eid=opened".to_string());
        let id = entry(&h.screen.last(), &wanted);

        h.app.dispatch(id).await;

        assert!(
            OPENED
                .lock()
                .unwrap()
                .contains(&"https://calendar.google.com/event?eid=opened".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn quit_breaks() {
        let mut h = harness(FakeCredentials::default(), FakeCalendar::default());
        h.app.refresh().await;
        let quit = entry(&h.screen.last(), &MenuAction::Quit);

        assert!(h.app.dispatch(quit).await.is_break());
    }

    #[tokio::test(start_paused = true)]
    async fn run_refreshes_on_each_tick_until_quit() {
        let h = harness(FakeCredentials::signed_in(), FakeCalendar::default());
        let screen = h.screen.clone();
        let calendar = h.calendar.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(h.app.run(rx));

        advance(0).await;
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 1);

        advance(300).await;
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 2);

        advance(300).await;
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 3);

        let quit = entry(&screen.last(), &MenuAction::Quit);
        tx.send(quit).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_channel_closes() {
        let h = harness(FakeCredentials::default(), FakeCalendar::default());
        let (tx, rx) = mpsc::unbounded_channel::<EntryId>();
        drop(tx);

        h.app.run(rx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_alert_across_refreshes() {
        let mut h = harness(
            FakeCredentials::signed_in(),
            FakeCalendar::with(vec![event("a", "A", 900)]),
        );
        h.app.refresh().await;

        *h.calendar.events.lock().unwrap() = vec![event("b", "B", 600)];
        h.app.refresh().await;

        advance(3600).await;
        let alerts = h.alerts.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subtitle, "B");
    }
}
