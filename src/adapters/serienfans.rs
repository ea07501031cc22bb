use std::time::Duration;

use reqwest::{header::{HeaderMap, HeaderValue, USER_AGENT}, Client, Url};
use serde::Deserialize;

use crate::app_state::AppError;
use crate::concurrency::AdapterKind;
use crate::metadata::request_client::RateLimitedClient;
use crate::resolver::xfs::DEFAULT_USER_AGENT;

use super::{categories, HosterLink, Provides, RawSearchResult, SiteAdapter};

/// Series site listing one release page per season with per-episode labeled
/// mirrors. Releases move fast there, so its cache ttl is short.
#[derive(Debug)]
pub struct SerienfansAdapter {
    client: RateLimitedClient,
    base_url: Url,
}

impl SerienfansAdapter {
    const BASE_URL: &'static str = "https://serienfans.org/api/v2/search";
    const RATE_LIMIT: usize = 2;
    const CACHE_TTL: Duration = Duration::from_secs(30 * 60);

    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .expect("client to build");
        let client =
            RateLimitedClient::new(client, Self::RATE_LIMIT, std::time::Duration::from_secs(1));
        let base_url = Url::parse(Self::BASE_URL).expect("url to parse");
        Self { client, base_url }
    }
}

impl Default for SerienfansAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SiteAdapter for SerienfansAdapter {
    fn name(&self) -> &'static str {
        "serienfans"
    }

    fn provides(&self) -> Provides {
        Provides::Both
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Cheap
    }

    fn cache_ttl(&self) -> Option<Duration> {
        Some(Self::CACHE_TTL)
    }

    async fn search(
        &self,
        query: &str,
        category: Option<u32>,
        season: Option<u32>,
        _episode: Option<u32>,
    ) -> Result<Vec<RawSearchResult>, AppError> {
        if category.is_some_and(|c| !categories::is_tv(c)) {
            return Ok(Vec::new());
        }
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("q", query);
        if let Some(season) = season {
            url.query_pairs_mut()
                .append_pair("season", &season.to_string());
        }
        let response: SerienfansSearch = self.client.get_json(url).await?;
        Ok(response
            .releases
            .into_iter()
            .filter_map(|release| release.into_search_result())
            .collect())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SerienfansSearch {
    #[serde(default)]
    releases: Vec<SerienfansRelease>,
}

#[derive(Debug, Clone, Deserialize)]
struct SerienfansRelease {
    name: String,
    size: Option<String>,
    #[serde(default)]
    entries: Vec<SerienfansEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct SerienfansEntry {
    hoster: String,
    url: String,
    /// Episode marker the site renders next to the mirror, e.g. "1x5"
    label: Option<String>,
}

impl SerienfansRelease {
    fn into_search_result(self) -> Option<RawSearchResult> {
        let links: Vec<HosterLink> = self
            .entries
            .into_iter()
            .filter(|entry| entry.url.starts_with("http"))
            .map(|entry| {
                let mut link = HosterLink::new(entry.hoster, entry.url);
                link.label = entry.label;
                link
            })
            .collect();
        let primary_link = links.first()?.url.clone();
        Some(RawSearchResult {
            title: self.name.clone(),
            category: categories::TV,
            primary_link,
            links,
            size: self.size,
            release_name: Some(self.name),
            metadata: Default::default(),
        })
    }
}
