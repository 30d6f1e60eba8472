//! Request interception and special-info headers
//!
//! Pages rendered for crawlers do not need stylesheets, fonts, images or
//! analytics. Stylesheets get an empty local response so layout code that
//! waits on them still proceeds; the rest are aborted.
//!
//! Callers can pass bot, device, locale and environment hints in the page
//! URL's query string. They are forwarded to the render engine as headers
//! and removed from the URL that is navigated.

use crate::engine::{InterceptDecision, InterceptPolicy, InterceptedRequest, ResourceType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

/// Header identifying renders made by this service
pub const SERVICE_HEADER: (&str, &str) = ("service", "isr-prerender");

const SPECIAL_INFO_KEYS: [&str; 4] = ["botInfo", "deviceInfo", "localeInfo", "environmentInfo"];

static TRACKING_OR_INLINE_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)google-analytics\.com|googletagmanager\.com|doubleclick\.net|connect\.facebook\.net|hotjar\.com|cdn\.segment\.com|^data:image/[a-z0-9.+-]+;base64,",
    )
    .expect("valid tracking regex")
});

static SPECIAL_INFO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"botInfo=(?P<botInfo>[^&#]*)&deviceInfo=(?P<deviceInfo>[^&#]*)&localeInfo=(?P<localeInfo>[^&#]*)&environmentInfo=(?P<environmentInfo>[^&#]*)",
    )
    .expect("valid special-info regex")
});

/// Decides what happens to one intercepted request
pub fn decide(request: &InterceptedRequest) -> InterceptDecision {
    match request.resource_type {
        ResourceType::Stylesheet => InterceptDecision::Respond {
            status: 200,
            content_type: "text/css",
            body: String::new(),
        },
        ResourceType::Font | ResourceType::Image | ResourceType::Media | ResourceType::ImageSet => {
            InterceptDecision::Abort
        }
        _ if TRACKING_OR_INLINE_IMAGE.is_match(&request.url) => InterceptDecision::Abort,
        _ => InterceptDecision::Continue,
    }
}

/// The interception policy installed on every rendered page
pub fn intercept_policy() -> InterceptPolicy {
    Arc::new(decide)
}

/// Rendering hints carried in the page URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialInfo {
    pub bot_info: String,
    pub device_info: String,
    pub locale_info: String,
    pub environment_info: String,
}

impl SpecialInfo {
    /// Extracts the four hints, which must appear together and in order
    pub fn parse(url: &str) -> Option<Self> {
        let caps = SPECIAL_INFO.captures(url)?;
        let group = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        Some(Self {
            bot_info: group("botInfo"),
            device_info: group("deviceInfo"),
            locale_info: group("localeInfo"),
            environment_info: group("environmentInfo"),
        })
    }

    pub fn headers(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("botinfo".to_string(), self.bot_info.clone()),
            ("deviceinfo".to_string(), self.device_info.clone()),
            ("localeinfo".to_string(), self.locale_info.clone()),
            ("environmentinfo".to_string(), self.environment_info.clone()),
        ])
    }

    /// Removes every special-info parameter from `url`
    ///
    /// The remaining query segments are kept byte-for-byte. URLs that do not
    /// parse, or carry none of the parameters, are returned unchanged.
    pub fn strip_from(url: &str) -> String {
        let Ok(mut parsed) = Url::parse(url) else {
            return url.to_string();
        };
        let Some(query) = parsed.query() else {
            return url.to_string();
        };

        let segments: Vec<&str> = query.split('&').collect();
        let kept: Vec<&str> = segments
            .iter()
            .copied()
            .filter(|segment| !is_special_info_segment(segment))
            .collect();
        if kept.len() == segments.len() {
            return url.to_string();
        }

        let kept = kept.join("&");
        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.set_query(Some(&kept));
        }
        parsed.to_string()
    }
}

fn is_special_info_segment(segment: &str) -> bool {
    let key = segment.split_once('=').map_or(segment, |(key, _)| key);
    SPECIAL_INFO_KEYS.contains(&key)
}

/// Headers sent with a navigation: the service marker plus any hints
pub fn navigation_headers(info: Option<&SpecialInfo>) -> BTreeMap<String, String> {
    let mut headers = info.map(SpecialInfo::headers).unwrap_or_default();
    headers.insert(SERVICE_HEADER.0.to_string(), SERVICE_HEADER.1.to_string());
    headers
}
