use reqwest::{header::{HeaderMap, HeaderValue, USER_AGENT}, Client, Url};
use serde::Deserialize;

use crate::app_state::AppError;
use crate::concurrency::AdapterKind;
use crate::metadata::request_client::RateLimitedClient;
use crate::resolver::xfs::DEFAULT_USER_AGENT;

use super::{categories, HosterLink, Provides, RawSearchResult, SiteAdapter};

/// Movie streaming site with a json search api. Every hit carries a handful
/// of hoster embeds.
#[derive(Debug)]
pub struct HdfilmeAdapter {
    client: RateLimitedClient,
    base_url: Url,
}

impl HdfilmeAdapter {
    const BASE_URL: &'static str = "https://hdfilme.my/api/v1/search";
    const RATE_LIMIT: usize = 3;

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

impl Default for HdfilmeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SiteAdapter for HdfilmeAdapter {
    fn name(&self) -> &'static str {
        "hdfilme"
    }

    fn provides(&self) -> Provides {
        Provides::Stream
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Cheap
    }

    async fn search(
        &self,
        query: &str,
        category: Option<u32>,
        _season: Option<u32>,
        _episode: Option<u32>,
    ) -> Result<Vec<RawSearchResult>, AppError> {
        // Movies only, a tv category search has nothing to find here
        if category.is_some_and(|c| !categories::is_movie(c)) {
            return Ok(Vec::new());
        }
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("q", query);
        let response: HdfilmeSearch = self.client.get_json(url).await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.into_search_result())
            .collect())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct HdfilmeSearch {
    #[serde(default)]
    items: Vec<HdfilmeItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct HdfilmeItem {
    title: String,
    year: Option<u16>,
    quality: Option<String>,
    #[serde(default)]
    streams: Vec<HdfilmeStream>,
}

#[derive(Debug, Clone, Deserialize)]
struct HdfilmeStream {
    hoster: String,
    url: String,
    language: Option<String>,
}

impl HdfilmeItem {
    fn into_search_result(self) -> Option<RawSearchResult> {
        let links: Vec<HosterLink> = self
            .streams
            .into_iter()
            .filter(|stream| stream.url.starts_with("http"))
            .map(|stream| {
                let mut link = HosterLink::new(stream.hoster, stream.url);
                link.language = stream.language;
                link.quality = self.quality.clone();
                link
            })
            .collect();
        let primary_link = links.first()?.url.clone();
        let title = match self.year {
            Some(year) => format!("{} ({year})", self.title),
            None => self.title,
        };
        Some(RawSearchResult {
            title,
            category: categories::MOVIES,
            primary_link,
            links,
            size: None,
            release_name: None,
            metadata: Default::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_without_streams_are_skipped() {
        let item = HdfilmeItem {
            title: "Iron Man".to_string(),
            year: Some(2008),
            quality: Some("1080p".to_string()),
            streams: Vec::new(),
        };
        assert!(item.into_search_result().is_none());
    }

    #[test]
    fn item_maps_to_search_result() {
        let item = HdfilmeItem {
            title: "Iron Man".to_string(),
            year: Some(2008),
            quality: Some("1080p".to_string()),
            streams: vec![
                HdfilmeStream {
                    hoster: "VOE".to_string(),
                    url: "https://voe.sx/e/abc".to_string(),
                    language: Some("de".to_string()),
                },
                HdfilmeStream {
                    hoster: "Filemoon".to_string(),
                    url: "javascript:void(0)".to_string(),
                    language: None,
                },
            ],
        };
        let result = item.into_search_result().unwrap();
        assert_eq!(result.title, "Iron Man (2008)");
        assert_eq!(result.links.len(), 1);
        assert_eq!(result.primary_link, "https://voe.sx/e/abc");
        assert_eq!(result.links[0].quality.as_deref(), Some("1080p"));
        assert!(result.is_usable());
    }
}
