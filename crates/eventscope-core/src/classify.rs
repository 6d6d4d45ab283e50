//! Referrer and user-agent classification.
//!
//! Every classifier is a pure, total function over a raw header string.
//! Rules are evaluated top to bottom and the first match wins, so the order of
//! each rule table is part of the contract: Edge user agents also contain
//! "Chrome" and "Safari", and iPad user agents also contain "Mobile".

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Direct,
    Google,
    Facebook,
    Twitter,
    LinkedIn,
    Reddit,
    #[serde(rename = "Hacker News")]
    HackerNews,
    #[serde(rename = "Dev.to")]
    DevTo,
    Other,
}

impl Source {
    pub fn label(self) -> &'static str {
        match self {
            Source::Direct => "Direct",
            Source::Google => "Google",
            Source::Facebook => "Facebook",
            Source::Twitter => "Twitter",
            Source::LinkedIn => "LinkedIn",
            Source::Reddit => "Reddit",
            Source::HackerNews => "Hacker News",
            Source::DevTo => "Dev.to",
            Source::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceType {
    pub fn label(self) -> &'static str {
        match self {
            DeviceType::Mobile => "Mobile",
            DeviceType::Tablet => "Tablet",
            DeviceType::Desktop => "Desktop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
    Edge,
    Other,
}

impl Browser {
    pub fn label(self) -> &'static str {
        match self {
            Browser::Chrome => "Chrome",
            Browser::Firefox => "Firefox",
            Browser::Safari => "Safari",
            Browser::Edge => "Edge",
            Browser::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Os {
    Windows,
    #[serde(rename = "macOS")]
    MacOs,
    #[serde(rename = "iOS")]
    Ios,
    Android,
    Linux,
    Other,
}

impl Os {
    pub fn label(self) -> &'static str {
        match self {
            Os::Windows => "Windows",
            Os::MacOs => "macOS",
            Os::Ios => "iOS",
            Os::Android => "Android",
            Os::Linux => "Linux",
            Os::Other => "Other",
        }
    }
}

/// The three user-agent classifications bundled together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientInfo {
    pub device: DeviceType,
    pub browser: Browser,
    pub os: Os,
}

const SOURCE_RULES: &[(&str, Source)] = &[
    ("google", Source::Google),
    ("facebook", Source::Facebook),
    ("twitter", Source::Twitter),
    ("linkedin", Source::LinkedIn),
    ("reddit", Source::Reddit),
    ("ycombinator", Source::HackerNews),
    ("dev.to", Source::DevTo),
];

const OS_RULES: &[(&[&str], Os)] = &[
    (&["windows"], Os::Windows),
    (&["macintosh"], Os::MacOs),
    (&["iphone", "ipad"], Os::Ios),
    (&["android"], Os::Android),
    (&["linux"], Os::Linux),
];

/// Map a referrer URL to its traffic source. Absent or empty means `Direct`.
pub fn classify_source(referrer: Option<&str>) -> Source {
    let referrer = match referrer {
        Some(r) if !r.is_empty() => r.to_ascii_lowercase(),
        _ => return Source::Direct,
    };
    SOURCE_RULES
        .iter()
        .find(|(pattern, _)| referrer.contains(pattern))
        .map(|(_, source)| *source)
        .unwrap_or(Source::Other)
}

pub fn classify_device(user_agent: &str) -> DeviceType {
    let ua = user_agent.to_ascii_lowercase();
    if contains_any(&ua, &["mobile", "android", "iphone"]) {
        DeviceType::Mobile
    } else if contains_any(&ua, &["ipad", "tablet"]) {
        DeviceType::Tablet
    } else {
        DeviceType::Desktop
    }
}

pub fn classify_browser(user_agent: &str) -> Browser {
    let ua = user_agent.to_ascii_lowercase();
    let chrome = ua.contains("chrome");
    let edge = ua.contains("edg");
    if chrome && !edge {
        Browser::Chrome
    } else if ua.contains("firefox") {
        Browser::Firefox
    } else if ua.contains("safari") && !chrome {
        Browser::Safari
    } else if edge {
        Browser::Edge
    } else {
        Browser::Other
    }
}

pub fn classify_os(user_agent: &str) -> Os {
    let ua = user_agent.to_ascii_lowercase();
    OS_RULES
        .iter()
        .find(|(patterns, _)| contains_any(&ua, patterns))
        .map(|(_, os)| *os)
        .unwrap_or(Os::Other)
}

pub fn classify_user_agent(user_agent: &str) -> ClientInfo {
    ClientInfo {
        device: classify_device(user_agent),
        browser: classify_browser(user_agent),
        os: classify_os(user_agent),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
