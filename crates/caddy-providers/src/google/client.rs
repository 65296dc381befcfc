//! Google Calendar API v3 events listing.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use caddy_core::{Event, EventLink, LinkKind, detect_link, find_join_link};

use crate::credential::TokenInfo;
use crate::error::{ProviderError, ProviderResult};
use crate::source::{BoxFuture, CalendarSource};

use super::config::GoogleConfig;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

const PAGE_HEADROOM: usize = 20;
const MAX_PAGE_SIZE: usize = 2500;
const MAX_PAGES: usize = 5;

/// Reads upcoming events from one Google calendar.
#[derive(Debug, Clone)]
pub struct GoogleCalendar {
    http_client: reqwest::Client,
    calendar_id: String,
}

impl GoogleCalendar {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            calendar_id: config.calendar_id.clone(),
        })
    }

    async fn fetch(&self, access_token: &str, limit: usize) -> ProviderResult<Vec<Event>> {
        let now = Utc::now();
        let events = collect_upcoming(limit, |page_token| {
            self.fetch_page(access_token, now, limit, page_token)
        })
        .await?;

        debug!(
            calendar = %self.calendar_id,
            count = events.len(),
            "fetched upcoming events"
        );
        Ok(events)
    }

    async fn fetch_page(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
        limit: usize,
        page_token: Option<String>,
    ) -> ProviderResult<Page> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(&self.calendar_id)
        );

        let mut query = vec![
            ("timeMin", now.to_rfc3339()),
            ("maxResults", page_size(limit).to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    format!("request failed: {}", e)
                };
                ProviderError::network(message).with_source(e)
            })?;

        let status = response.status();
        match status {
            reqwest::StatusCode::UNAUTHORIZED => {
                return Err(ProviderError::authentication(
                    "access token expired or invalid",
                ));
            }
            reqwest::StatusCode::FORBIDDEN => {
                return Err(ProviderError::authorization("access denied to calendar"));
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| format!(", retry after {}s", s))
                    .unwrap_or_default();
                return Err(ProviderError::rate_limited(format!(
                    "rate limit exceeded{}",
                    retry_after
                )));
            }
            _ if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::server(format!(
                    "calendar API returned {}: {}",
                    status, body
                )));
            }
            _ => {}
        }

        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e)).with_source(e)
        })?;

        parse_page(&body, now)
    }
}

impl CalendarSource for GoogleCalendar {
    fn list_upcoming<'a>(
        &'a self,
        credential: &'a TokenInfo,
        limit: usize,
    ) -> BoxFuture<'a, ProviderResult<Vec<Event>>> {
        Box::pin(self.fetch(&credential.access_token, limit))
    }
}

/// One events.list response, already filtered to upcoming timed events.
#[derive(Debug, Default)]
struct Page {
    events: Vec<Event>,
    next_page_token: Option<String>,
}

/// Rows requested per page. `timeMin` matches on end time, so meetings
/// already in progress and all-day events come back too and are dropped
/// locally.
fn page_size(limit: usize) -> usize {
    limit.saturating_add(PAGE_HEADROOM).clamp(1, MAX_PAGE_SIZE)
}

/// Pulls pages until `limit` upcoming events are in hand, the calendar runs
/// out, or [`MAX_PAGES`] pages were read.
async fn collect_upcoming<F, Fut>(limit: usize, mut next_page: F) -> ProviderResult<Vec<Event>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = ProviderResult<Page>>,
{
    let mut events = Vec::new();
    let mut page_token = None;

    for _ in 0..MAX_PAGES {
        let page = next_page(page_token.take()).await?;
        events.extend(page.events);
        page_token = page.next_page_token;
        if events.len() >= limit || page_token.is_none() {
            break;
        }
    }

    Ok(soonest_first(events, limit))
}

fn soonest_first(mut events: Vec<Event>, limit: usize) -> Vec<Event> {
    events.sort_by_key(|event| event.start);
    events.truncate(limit);
    events
}

/// Drops cancelled and all-day events and anything that started before
/// `now`. An event starting exactly at `now` is kept.
fn parse_page(body: &str, now: DateTime<Utc>) -> ProviderResult<Page> {
    let list: EventListResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse events: {}", e)).with_source(e)
    })?;

    let events = list
        .items
        .into_iter()
        .filter_map(convert_event)
        .filter(|event| event.is_upcoming(now))
        .collect();

    Ok(Page {
        events,
        next_page_token: list.next_page_token,
    })
}

fn convert_event(event: ApiEvent) -> Option<Event> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let id = event.id?;
    // All-day events only carry `date`.
    let start = parse_time(&id, event.start.date_time.as_deref()?)?;
    let end = parse_time(&id, event.end.date_time.as_deref()?)?;

    let join_link = event
        .hangout_link
        .as_deref()
        .map(|url| EventLink::new(LinkKind::GoogleMeet, url))
        .or_else(|| {
            event
                .conference_data
                .as_ref()
                .and_then(ApiConferenceData::video_uri)
                .map(detect_link)
        })
        .or_else(|| event.location.as_deref().and_then(find_join_link))
        .or_else(|| event.description.as_deref().and_then(find_join_link));

    let mut converted = Event::new(id, event.summary.unwrap_or_default(), start, end);
    converted.join_link = join_link;
    converted.web_link = event.html_link;
    Some(converted)
}

fn parse_time(id: &str, value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| warn!(event = id, error = %e, "skipping event with unparseable time"))
        .ok()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: ApiEventTime,
    end: ApiEventTime,
    html_link: Option<String>,
    hangout_link: Option<String>,
    status: Option<String>,
    conference_data: Option<ApiConferenceData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiConferenceData {
    #[serde(default)]
    entry_points: Vec<ApiEntryPoint>,
}

impl ApiConferenceData {
    fn video_uri(&self) -> Option<&str> {
        self.entry_points
            .iter()
            .find(|ep| ep.entry_point_type == "video")
            .and_then(|ep| ep.uri.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEntryPoint {
    entry_point_type: String,
    uri: Option<String>,
}
