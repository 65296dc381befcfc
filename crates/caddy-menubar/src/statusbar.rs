//! Status-bar item for macOS and Windows.
//!
//! The tray toolkit needs the platform event loop on the main thread, so
//! [`launch`] keeps that thread for itself and runs the async app on a
//! worker. The two sides only talk through channels:
//!
//! ```text
//!  main thread (tao)                   worker thread (tokio)
//!  MenuEvent  ───── EntryId ───────▶   App::run
//!  TrayIcon   ◀──── UiEvent::Render ── StatusBarPresenter
//!  event loop ◀──── UiEvent::Exit ──── serve() returned
//! ```

use std::sync::{Mutex, PoisonError};
use std::thread;

use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use tao::platform::run_return::EventLoopExtRunReturn;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use tray_icon::menu::{IsMenuItem, Menu, MenuEvent, MenuItem, PredefinedMenuItem, Submenu};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

use caddy_providers::BoxFuture;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::menu::{EntryId, MenuModel, MenuNode};
use crate::presenter::Presenter;
use crate::state::AppState;

const ICON_SIZE: u32 = 18;
const DEFAULT_TOOLTIP: &str = "Caddy";

#[derive(Debug)]
enum UiEvent {
    Render {
        title: Option<String>,
        menu: MenuModel,
    },
    Exit,
}

/// Forwards each rendered state to the main thread.
pub struct StatusBarPresenter {
    proxy: Mutex<EventLoopProxy<UiEvent>>,
}

impl StatusBarPresenter {
    fn send(&self, event: UiEvent) {
        let proxy = self.proxy.lock().unwrap_or_else(PoisonError::into_inner);
        if proxy.send_event(event).is_err() {
            warn!("status bar is gone, menu not updated");
        }
    }
}

impl Presenter for StatusBarPresenter {
    fn render<'a>(&'a self, state: &'a AppState) -> BoxFuture<'a, ()> {
        self.send(UiEvent::Render {
            title: state.title.clone(),
            menu: state.menu.clone(),
        });
        Box::pin(async {})
    }
}

/// Runs the status item on this thread and the app on a worker until
/// `Quit` or Ctrl-C. Must be called from `main`.
pub fn launch(config: AppConfig) -> AppResult<()> {
    let mut event_loop = EventLoopBuilder::<UiEvent>::with_user_event().build();

    // Menu-bar only: no Dock icon, no app switcher entry.
    #[cfg(target_os = "macos")]
    {
        use tao::platform::macos::{ActivationPolicy, EventLoopExtMacOS};
        event_loop.set_activation_policy(ActivationPolicy::Accessory);
    }

    let (clicks_tx, clicks_rx) = mpsc::unbounded_channel::<EntryId>();
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        match event.id.0.parse::<EntryId>() {
            Ok(id) => {
                if clicks_tx.send(id).is_err() {
                    debug!(%id, "app loop gone, click dropped");
                }
            }
            Err(e) => debug!(error = %e, "ignoring menu event"),
        }
    }));

    let presenter = StatusBarPresenter {
        proxy: Mutex::new(event_loop.create_proxy()),
    };
    let exit = event_loop.create_proxy();
    let worker = thread::Builder::new()
        .name("caddy-app".to_string())
        .spawn(move || {
            let result = crate::block_on(crate::serve(config, Box::new(presenter), clicks_rx))
                .and_then(|served| served);
            if exit.send_event(UiEvent::Exit).is_err() {
                debug!("event loop already stopped");
            }
            result
        })?;

    let mut tray: Option<TrayIcon> = None;
    event_loop.run_return(|event, _, control_flow| {
        *control_flow = ControlFlow::Wait;
        match event {
            Event::NewEvents(StartCause::Init) => match build_tray() {
                Ok(icon) => tray = Some(icon),
                Err(e) => error!(error = %e, "no status bar item, logging only"),
            },
            Event::UserEvent(UiEvent::Render { title, menu }) => {
                if let Some(ref icon) = tray {
                    update_tray(icon, title.as_deref(), &menu);
                }
            }
            Event::UserEvent(UiEvent::Exit) => {
                tray = None;
                *control_flow = ControlFlow::Exit;
            }
            _ => {}
        }
    });

    worker
        .join()
        .map_err(|_| AppError::Tray("app thread panicked".to_string()))?
}

fn build_tray() -> AppResult<TrayIcon> {
    let icon = Icon::from_rgba(icon_rgba(), ICON_SIZE, ICON_SIZE)
        .map_err(|e| AppError::Tray(e.to_string()))?;
    TrayIconBuilder::new()
        .with_tooltip(DEFAULT_TOOLTIP)
        .with_icon(icon)
        .with_icon_as_template(true)
        .with_menu(Box::new(Menu::new()))
        .build()
        .map_err(|e| AppError::Tray(e.to_string()))
}

fn update_tray(tray: &TrayIcon, title: Option<&str>, menu: &MenuModel) {
    tray.set_title(title);
    if let Err(e) = tray.set_tooltip(Some(title.unwrap_or(DEFAULT_TOOLTIP))) {
        debug!(error = %e, "failed to set tooltip");
    }
    match to_menu(&menu.items) {
        Ok(built) => tray.set_menu(Some(Box::new(built))),
        Err(e) => error!(error = %e, "failed to build status bar menu"),
    }
}

fn to_menu(nodes: &[MenuNode]) -> tray_icon::menu::Result<Menu> {
    let menu = Menu::new();
    for item in to_items(nodes)? {
        menu.append(item.as_ref())?;
    }
    Ok(menu)
}

fn to_items(nodes: &[MenuNode]) -> tray_icon::menu::Result<Vec<Box<dyn IsMenuItem>>> {
    nodes.iter().map(to_item).collect()
}

/// Clickable entries carry their [`EntryId`] as the menu id.
fn to_item(node: &MenuNode) -> tray_icon::menu::Result<Box<dyn IsMenuItem>> {
    let item: Box<dyn IsMenuItem> = match node {
        MenuNode::Item {
            id: Some(id),
            label,
        } => Box::new(MenuItem::with_id(id.to_string(), label, true, None)),
        MenuNode::Item { id: None, label } => Box::new(MenuItem::new(label, false, None)),
        MenuNode::Submenu { label, items } => {
            let children = to_items(items)?;
            let refs: Vec<&dyn IsMenuItem> = children.iter().map(|child| child.as_ref()).collect();
            Box::new(Submenu::with_items(label, true, &refs)?)
        }
        MenuNode::Separator => Box::new(PredefinedMenuItem::separator()),
    };
    Ok(item)
}

/// A small calendar glyph, black on transparent so macOS can tint it.
fn icon_rgba() -> Vec<u8> {
    let last = ICON_SIZE - 1;
    let mut rgba = Vec::with_capacity((ICON_SIZE * ICON_SIZE * 4) as usize);
    for y in 0..ICON_SIZE {
        for x in 0..ICON_SIZE {
            let inside = (2..=last - 2).contains(&x) && (3..=last - 1).contains(&y);
            let frame = x == 2 || x == last - 2 || y == 3 || y == last - 1;
            let header = y < 7;
            let rings = (x == 6 || x == last - 6) && (1..3).contains(&y);
            let alpha = if (inside && (frame || header)) || rings {
                0xff
            } else {
                0
            };
            rgba.extend_from_slice(&[0, 0, 0, alpha]);
        }
    }
    rgba
}
