use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod request_client;
pub mod tmdb_api;

/// Content kind as requested by the client. Drives category selection,
/// episode filtering and year tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Series,
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Movie => write!(f, "movie"),
            ContentKind::Series => write!(f, "series"),
        }
    }
}

impl FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(Self::Movie),
            "series" => Ok(Self::Series),
            rest => Err(anyhow::anyhow!("{rest} is not a known content kind")),
        }
    }
}

/// External content identifier accepted at the api boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalId {
    Imdb(String),
    Tmdb(u64),
}

impl FromStr for ExternalId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(digits) = s.strip_prefix("tmdb:") {
            let id = digits
                .parse()
                .map_err(|_| anyhow::anyhow!("malformed tmdb id: {s}"))?;
            return Ok(Self::Tmdb(id));
        }
        if let Some(digits) = s.strip_prefix("tt") {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return Ok(Self::Imdb(s.to_string()));
            }
        }
        Err(anyhow::anyhow!("unrecognized external id: {s}"))
    }
}

impl Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExternalId::Imdb(id) => write!(f, "{id}"),
            ExternalId::Tmdb(id) => write!(f, "tmdb:{id}"),
        }
    }
}

/// Canonical title the whole pipeline filters against. A request without one
/// yields no streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTitle {
    pub title: String,
    pub year: Option<i32>,
    pub kind: ContentKind,
}

/// Metadata lookup port. The pipeline only ever needs a title and a year for
/// an external id; everything else about the provider is opaque.
#[async_trait::async_trait]
pub trait MetadataClient: Send + Sync {
    async fn get_title_and_year(&self, id: &ExternalId) -> Option<ReferenceTitle>;

    async fn get_title_by_tmdb_id(&self, tmdb_id: u64) -> Option<String>;

    /// Provider identifier
    fn provider_identifier(&self) -> &'static str;
}
