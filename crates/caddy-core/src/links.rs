//! Join-link detection for meeting URLs.
//!
//! Calendar events do not always carry a structured conference link, so the
//! location and description are scanned for URLs of known video services.
//!
//! ```
//! use caddy_core::links::find_join_link;
//!
//! let link = find_join_link("Dial in at https://zoom.us/j/123456789?pwd=abc").unwrap();
//! assert!(link.kind.is_video_conference());
//! ```

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::event::{EventLink, LinkKind};

/// Regex for extracting URLs from text.
static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'\)\]]+"#).expect("Invalid URL regex"));

/// Microsoft Outlook SafeLinks carry the original URL in the `url` parameter.
static SAFELINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^/]*safelinks\.protection\.outlook\.com/?\?[^?]*url=([^&]+)")
        .expect("Invalid SafeLink regex")
});

static ZOOM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://([^/]*\.)?zoom(gov)?\.(us|com)/").expect("Invalid Zoom regex")
});

static MEET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://meet\.google\.com/").expect("Invalid Meet regex"));

static TEAMS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://teams\.(microsoft\.com|live\.com)/").expect("Invalid Teams regex")
});

static JITSI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://meet\.jit\.si/").expect("Invalid Jitsi regex"));

static WEBEX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://([^/]*\.)?webex\.com/").expect("Invalid Webex regex")
});

/// Extracts all URLs from the given text, in order of appearance.
pub fn extract_urls(text: &str) -> Vec<&str> {
    URL_REGEX.find_iter(text).map(|m| m.as_str()).collect()
}

/// Classifies a single URL, unwrapping SafeLinks first.
pub fn detect_link(url: &str) -> EventLink {
    let unwrapped = unwrap_safelink(url);

    if MEET_REGEX.is_match(&unwrapped) {
        normalize_meet(&unwrapped)
    } else if ZOOM_REGEX.is_match(&unwrapped) {
        EventLink::new(LinkKind::Zoom, unwrapped)
    } else if TEAMS_REGEX.is_match(&unwrapped) {
        EventLink::new(LinkKind::Teams, unwrapped.trim())
    } else if JITSI_REGEX.is_match(&unwrapped) {
        EventLink::new(LinkKind::Jitsi, unwrapped)
    } else if WEBEX_REGEX.is_match(&unwrapped) {
        EventLink::new(LinkKind::Webex, unwrapped)
    } else {
        EventLink::new(LinkKind::Other, unwrapped)
    }
}

/// Returns the first video-conference link found in `text`.
///
/// Plain links (documents, agendas) are ignored.
pub fn find_join_link(text: &str) -> Option<EventLink> {
    extract_urls(text)
        .into_iter()
        .map(detect_link)
        .find(|link| link.kind.is_video_conference())
}

/// Unwraps a Microsoft Outlook SafeLink; other URLs are returned unchanged.
fn unwrap_safelink(url: &str) -> String {
    SAFELINK_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|encoded| urlencoding::decode(encoded.as_str()).ok())
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|| url.to_string())
}

/// Drops query parameters (`authuser`, `hs`, ...) from a Meet URL.
fn normalize_meet(url: &str) -> EventLink {
    let code = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.find(|s| !s.is_empty()).map(str::to_string))
    });

    match code {
        Some(code) => EventLink::new(
            LinkKind::GoogleMeet,
            format!("https://meet.google.com/{}", code),
        ),
        None => EventLink::new(LinkKind::GoogleMeet, url),
    }
}
