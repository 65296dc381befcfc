//! The static menu tree shown by the tray.
//!
//! A menu is rebuilt on every refresh. Clickable entries carry an
//! [`EntryId`] that maps to a [`MenuAction`]; the id includes the menu
//! generation, so a click that arrives after the menu was replaced resolves
//! to nothing instead of to whatever now sits at the same position.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::TimeZone;

use caddy_core::Event;
use caddy_core::time::{ENTRY_TIME_FORMAT, TITLE_TIME_FORMAT, format_in};

/// Identifies one clickable entry of one rendered menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId {
    pub generation: u64,
    pub index: usize,
}

/// `generation.index`, used where a toolkit wants string menu ids.
impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.generation, self.index)
    }
}

impl FromStr for EntryId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (generation, index) = s
            .split_once('.')
            .ok_or_else(|| format!("not a menu entry id: {s}"))?;
        Ok(Self {
            generation: generation
                .parse()
                .map_err(|_| format!("bad generation in menu entry id: {s}"))?,
            index: index
                .parse()
                .map_err(|_| format!("bad index in menu entry id: {s}"))?,
        })
    }
}

/// What a menu entry does when clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    OpenUrl(String),
    Login,
    Logout,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuNode {
    /// A leaf entry; `id` is `None` for disabled entries.
    Item { id: Option<EntryId>, label: String },
    Submenu { label: String, items: Vec<MenuNode> },
    Separator,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuModel {
    pub generation: u64,
    pub items: Vec<MenuNode>,
    actions: BTreeMap<EntryId, MenuAction>,
}

impl MenuModel {
    /// `Configure > Google Calendar`, then `Quit`.
    pub fn unauthenticated(generation: u64) -> Self {
        let mut builder = Builder::new(generation);
        let login = builder.item("Google Calendar", MenuAction::Login);
        let quit = builder.item("Quit", MenuAction::Quit);
        builder.finish(vec![
            MenuNode::Submenu {
                label: "Configure".to_string(),
                items: vec![login],
            },
            MenuNode::Separator,
            quit,
        ])
    }

    /// Calendar link, the upcoming events, `Logout` and `Quit`.
    ///
    /// Entry times are rendered in `tz`.
    pub fn authenticated<Tz>(generation: u64, events: &[Event], calendar_url: &str, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let mut builder = Builder::new(generation);
        let open_calendar = builder.item(
            "Open Calendar",
            MenuAction::OpenUrl(calendar_url.to_string()),
        );

        let upcoming = events
            .iter()
            .map(|event| {
                let label = format!(
                    "{} - {}",
                    format_in(event.start, tz, ENTRY_TIME_FORMAT),
                    event.title
                );
                match event.web_link {
                    Some(ref url) => builder.item(label, MenuAction::OpenUrl(url.clone())),
                    None => MenuNode::Item { id: None, label },
                }
            })
            .collect();

        let logout = builder.item("Logout", MenuAction::Logout);
        let quit = builder.item("Quit", MenuAction::Quit);

        builder.finish(vec![
            open_calendar,
            MenuNode::Submenu {
                label: "Upcoming Items".to_string(),
                items: upcoming,
            },
            MenuNode::Separator,
            logout,
            MenuNode::Separator,
            quit,
        ])
    }

    /// Resolves a click. Ids from another generation resolve to nothing.
    pub fn action(&self, id: EntryId) -> Option<&MenuAction> {
        if id.generation != self.generation {
            return None;
        }
        self.actions.get(&id)
    }

    /// Indented text form, one node per line.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        render_nodes(&self.items, 0, &mut out);
        out
    }
}

/// Menu-bar title for the soonest event, e.g. `Fri 09:30 - Standup`.
pub fn title_for<Tz>(events: &[Event], tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    caddy_core::soonest(events).map(|event| {
        format!(
            "{} - {}",
            format_in(event.start, tz, TITLE_TIME_FORMAT),
            event.title
        )
    })
}

struct Builder {
    generation: u64,
    actions: BTreeMap<EntryId, MenuAction>,
}

impl Builder {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            actions: BTreeMap::new(),
        }
    }

    fn item(&mut self, label: impl Into<String>, action: MenuAction) -> MenuNode {
        let id = EntryId {
            generation: self.generation,
            index: self.actions.len(),
        };
        self.actions.insert(id, action);
        MenuNode::Item {
            id: Some(id),
            label: label.into(),
        }
    }

    fn finish(self, items: Vec<MenuNode>) -> MenuModel {
        MenuModel {
            generation: self.generation,
            items,
            actions: self.actions,
        }
    }
}

fn render_nodes(nodes: &[MenuNode], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            MenuNode::Item { id: Some(_), label } => {
                let _ = writeln!(out, "{indent}{label}");
            }
            MenuNode::Item { id: None, label } => {
                let _ = writeln!(out, "{indent}{label} (disabled)");
            }
            MenuNode::Submenu { label, items } => {
                let _ = writeln!(out, "{indent}{label} >");
                render_nodes(items, depth + 1, out);
            }
            MenuNode::Separator => {
                let _ = writeln!(out, "{indent}---");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, FixedOffset, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    fn events() -> Vec<Event> {
        vec![
            Event::new("a", "Standup", at(9, 30), at(9, 45))
                .with_web_link("https://calendar.google.com/event?eid=a"),
            Event::new("b", "Planning", at(13, 0), at(14, 0)),
        ]
    }

    fn ids(menu: &MenuModel) -> Vec<EntryId> {
        menu.actions.keys().copied().collect()
    }

    #[test]
    fn unauthenticated_layout() {
        let menu = MenuModel::unauthenticated(1);
        insta::assert_snapshot!(menu.render_text(), @r"
        Configure >
          Google Calendar
        ---
        Quit
        ");
        assert_eq!(
            menu.action(EntryId { generation: 1, index: 0 }),
            Some(&MenuAction::Login)
        );
        assert_eq!(
            menu.action(EntryId { generation: 1, index: 1 }),
            Some(&MenuAction::Quit)
        );
    }

    #[test]
    fn authenticated_layout() {
        let menu = MenuModel::authenticated(7, &events(), "https://calendar.example", &Utc);
        insta::assert_snapshot!(menu.render_text(), @r"
        Open Calendar
        Upcoming Items >
          03-15 09:30 - Standup
          03-15 13:00 - Planning (disabled)
        ---
        Logout
        ---
        Quit
        ");
    }

    #[test]
    fn authenticated_actions() {
        let menu = MenuModel::authenticated(7, &events(), "https://calendar.example", &Utc);
        let actions: Vec<_> = ids(&menu)
            .into_iter()
            .filter_map(|id| menu.action(id).cloned())
            .collect();

        assert_eq!(
            actions,
            vec![
                MenuAction::OpenUrl("https://calendar.example".to_string()),
                MenuAction::OpenUrl("https://calendar.google.com/event?eid=a".to_string()),
                MenuAction::Logout,
                MenuAction::Quit,
            ]
        );
    }

    #[test]
    fn empty_upcoming_submenu() {
        let menu = MenuModel::authenticated(2, &[], "https://calendar.example", &Utc);
        assert_eq!(
            menu.items[1],
            MenuNode::Submenu {
                label: "Upcoming Items".to_string(),
                items: vec![],
            }
        );
    }

    #[test]
    fn stale_generation_resolves_to_nothing() {
        let old = MenuModel::unauthenticated(1);
        let current = MenuModel::unauthenticated(2);
        let stale = ids(&old)[0];

        assert!(current.action(stale).is_none());
        assert!(current.action(EntryId { generation: 2, index: 99 }).is_none());
    }

    #[test]
    fn entry_times_use_given_timezone() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let menu = MenuModel::authenticated(1, &events(), "https://calendar.example", &tz);
        assert!(menu.render_text().contains("03-15 11:30 - Standup"));
    }

    #[test]
    fn title_uses_soonest_event() {
        let mut list = events();
        list.push(Event::new("c", "Early", at(8, 0), at(8, 30) + Duration::minutes(5)));
        assert_eq!(title_for(&list, &Utc).as_deref(), Some("Fri 08:00 - Early"));
        assert_eq!(title_for(&[], &Utc), None);
    }

    #[test]
    fn entry_id_string_form() {
        let id = EntryId {
            generation: 12,
            index: 3,
        };
        assert_eq!(id.to_string(), "12.3");
        assert_eq!("12.3".parse::<EntryId>(), Ok(id));
        assert!("12".parse::<EntryId>().is_err());
        assert!("a.3".parse::<EntryId>().is_err());
        assert!("12.-1".parse::<EntryId>().is_err());
    }
}
