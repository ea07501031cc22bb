use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::metadata::{ContentKind, ExternalId};

pub mod convert;
pub mod episode_filter;
pub mod invoke;
pub mod orchestrator;
pub mod probe;
pub mod query;
pub mod sorter;
pub mod title_match;

/// One incoming stream request, parsed at the http boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub id: ExternalId,
    pub kind: ContentKind,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl StreamRequest {
    pub fn movie(id: ExternalId) -> Self {
        Self {
            id,
            kind: ContentKind::Movie,
            season: None,
            episode: None,
        }
    }

    pub fn episode(id: ExternalId, season: u32, episode: u32) -> Self {
        Self {
            id,
            kind: ContentKind::Series,
            season: Some(season),
            episode: Some(episode),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamQuality {
    Unknown,
    Sd,
    Hd720p,
    Hd1080p,
    Uhd4k,
}

impl StreamQuality {
    /// Position in the quality ladder, multiplied into the stream score.
    pub fn ordinal(&self) -> i64 {
        match self {
            StreamQuality::Unknown => 0,
            StreamQuality::Sd => 1,
            StreamQuality::Hd720p => 2,
            StreamQuality::Hd1080p => 3,
            StreamQuality::Uhd4k => 4,
        }
    }

    /// Human label appended to stream names. Unknown quality renders nothing.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            StreamQuality::Unknown => None,
            StreamQuality::Sd => Some("SD"),
            StreamQuality::Hd720p => Some("HD 720P"),
            StreamQuality::Hd1080p => Some("HD 1080P"),
            StreamQuality::Uhd4k => Some("UHD 4K"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLanguage {
    pub code: String,
    pub label: String,
    pub is_dubbed: bool,
}

impl StreamLanguage {
    pub fn from_code(code: &str) -> Self {
        let code = code.trim().to_lowercase();
        let (label, is_dubbed) = match code.as_str() {
            "de" => ("German Dub".to_string(), true),
            "de-sub" => ("German Sub".to_string(), false),
            "en" => ("English".to_string(), false),
            "ja" => ("Japanese".to_string(), false),
            other => (other.to_uppercase(), false),
        };
        Self {
            code,
            label,
            is_dubbed,
        }
    }
}

/// Normalized stream candidate. `url` is still the hoster embed here, never a
/// cdn url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStream {
    pub url: String,
    /// Normalized hoster name, may be empty for anonymous mirrors
    pub hoster: String,
    pub quality: StreamQuality,
    pub language: Option<StreamLanguage>,
    pub size: Option<String>,
    pub size_bytes: Option<u64>,
    pub title: Option<String>,
    pub release_name: Option<String>,
    pub source_adapter: Option<String>,
    pub score: i64,
}

impl RankedStream {
    pub fn new(url: impl Into<String>, hoster: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            hoster: hoster.into(),
            quality: StreamQuality::Unknown,
            language: None,
            size: None,
            size_bytes: None,
            title: None,
            release_name: None,
            source_adapter: None,
            score: 0,
        }
    }
}

/// Playback headers the client must send. Stremio expects these under
/// `behaviorHints.proxyHeaders.request`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyHeaders {
    #[serde(default)]
    pub request: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorHints {
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub not_web_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_headers: Option<ProxyHeaders>,
}

/// Final client-facing stream entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientStream {
    pub name: String,
    pub description: String,
    pub url: String,
    #[serde(rename = "behaviorHints", skip_serializing_if = "Option::is_none")]
    pub behavior_hints: Option<BehaviorHints>,
}
