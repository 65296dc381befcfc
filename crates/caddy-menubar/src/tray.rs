//! StatusNotifierItem tray (KDE, GNOME with the AppIndicator extension,
//! most wlroots bars).

use ksni::{MenuItem, TrayMethods, menu};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::warn;

use caddy_providers::BoxFuture;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::menu::{EntryId, MenuModel, MenuNode};
use crate::presenter::{LogPresenter, Presenter};
use crate::state::AppState;

/// Runs the app behind the tray, or behind the log when no
/// StatusNotifier host is running.
pub async fn run(config: AppConfig) -> AppResult<()> {
    let (clicks_tx, clicks_rx) = mpsc::unbounded_channel();
    let presenter: Box<dyn Presenter> = match TrayPresenter::spawn(clicks_tx.clone()).await {
        Ok(tray) => Box::new(tray),
        Err(e) => {
            warn!(error = %e, "no tray available, logging the menu instead");
            Box::new(LogPresenter)
        }
    };

    // Held here so the loop keeps refreshing when there is no tray.
    let result = crate::serve(config, presenter, clicks_rx).await;
    drop(clicks_tx);
    result
}

#[derive(Debug)]
struct CaddyTray {
    title: Option<String>,
    menu: MenuModel,
    clicks: UnboundedSender<EntryId>,
}

impl ksni::Tray for CaddyTray {
    fn id(&self) -> String {
        "caddy".to_string()
    }

    fn icon_name(&self) -> String {
        "x-office-calendar".to_string()
    }

    fn title(&self) -> String {
        self.title.clone().unwrap_or_else(|| "Caddy".to_string())
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        self.menu.items.iter().map(to_ksni).collect()
    }
}

fn to_ksni(node: &MenuNode) -> MenuItem<CaddyTray> {
    match node {
        MenuNode::Item {
            id: Some(id),
            label,
        } => {
            let id = *id;
            menu::StandardItem {
                label: label.clone(),
                activate: Box::new(move |tray: &mut CaddyTray| {
                    let _ = tray.clicks.send(id);
                }),
                ..Default::default()
            }
            .into()
        }
        MenuNode::Item { id: None, label } => menu::StandardItem {
            label: label.clone(),
            enabled: false,
            ..Default::default()
        }
        .into(),
        MenuNode::Submenu { label, items } => menu::SubMenu {
            label: label.clone(),
            submenu: items.iter().map(to_ksni).collect(),
            ..Default::default()
        }
        .into(),
        MenuNode::Separator => MenuItem::Separator,
    }
}

/// Presents the app state as a tray icon with a menu.
///
/// Clicks are sent back to the app loop as [`EntryId`]s.
pub struct TrayPresenter {
    handle: ksni::Handle<CaddyTray>,
}

impl TrayPresenter {
    /// Registers the tray with the session bus.
    pub async fn spawn(clicks: UnboundedSender<EntryId>) -> AppResult<Self> {
        let tray = CaddyTray {
            title: None,
            menu: MenuModel::default(),
            clicks,
        };
        let handle = tray
            .spawn()
            .await
            .map_err(|e| AppError::Tray(e.to_string()))?;
        Ok(Self { handle })
    }
}

impl Presenter for TrayPresenter {
    fn render<'a>(&'a self, state: &'a AppState) -> BoxFuture<'a, ()> {
        let title = state.title.clone();
        let menu = state.menu.clone();
        Box::pin(async move {
            let updated = self
                .handle
                .update(move |tray: &mut CaddyTray| {
                    tray.title = title;
                    tray.menu = menu;
                })
                .await;
            if updated.is_none() {
                warn!("tray service is gone, menu not updated");
            }
        })
    }
}
