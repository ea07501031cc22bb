use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::app_state::AppError;
use crate::cache::{self, CacheBackend};

use super::{ContentKind, ExternalId, MetadataClient, ReferenceTitle};

use super::request_client::RateLimitedClient;

const TITLE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
pub struct TmdbApi {
    pub base_url: Url,
    client: RateLimitedClient,
    cache: &'static (dyn CacheBackend + 'static),
    language: String,
}

impl TmdbApi {
    const API_URL: &'static str = "https://api.themoviedb.org/3";
    const IMG_BASE_URL: &'static str = "https://image.tmdb.org/t/p/w342";
    // TMDB allows around 50 req/s per ip, stay under it
    const RATE_LIMIT: usize = 40;

    pub fn new(api_key: String, language: String, cache: &'static dyn CacheBackend) -> Self {
        let params = [("api_key", api_key)];
        let client =
            RateLimitedClient::new(Client::new(), Self::RATE_LIMIT, Duration::from_secs(1));
        let base_url = Url::parse_with_params(Self::API_URL, params).expect("url to parse");
        Self {
            base_url,
            client,
            cache,
            language,
        }
    }

    pub fn poster_url(poster_path: &str) -> String {
        format!("{}{}", Self::IMG_BASE_URL, poster_path)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("base url is not cannot-be-a-base")
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("language", &self.language);
        url
    }

    /// TMDB lookup by external imdb id. Returns the best movie or tv hit.
    pub async fn find_by_imdb_id(&self, imdb_id: &str) -> Result<Option<TmdbFindItem>, AppError> {
        let mut url = self.endpoint(&["find", imdb_id]);
        url.query_pairs_mut()
            .append_pair("external_source", "imdb_id");
        let response: TmdbFindResponse = self.client.get_json(url).await?;
        if let Some(movie) = response.movie_results.into_iter().next() {
            return Ok(Some(TmdbFindItem::Movie(movie)));
        }
        Ok(response.tv_results.into_iter().next().map(TmdbFindItem::Tv))
    }

    pub async fn movie_details(&self, tmdb_id: u64) -> Result<TmdbMovieResult, AppError> {
        let url = self.endpoint(&["movie", &tmdb_id.to_string()]);
        self.client.get_json(url).await
    }

    pub async fn tv_details(&self, tmdb_id: u64) -> Result<TmdbTvResult, AppError> {
        let url = self.endpoint(&["tv", &tmdb_id.to_string()]);
        self.client.get_json(url).await
    }

    pub async fn trending_movies(&self, page: usize) -> Result<Vec<TmdbMovieResult>, AppError> {
        let mut url = self.endpoint(&["trending", "movie", "week"]);
        url.query_pairs_mut().append_pair("page", &page.to_string());
        let search: TmdbSearch<TmdbMovieResult> = self.client.get_json(url).await?;
        Ok(search.results)
    }

    pub async fn trending_tv(&self, page: usize) -> Result<Vec<TmdbTvResult>, AppError> {
        let mut url = self.endpoint(&["trending", "tv", "week"]);
        url.query_pairs_mut().append_pair("page", &page.to_string());
        let search: TmdbSearch<TmdbTvResult> = self.client.get_json(url).await?;
        Ok(search.results)
    }

    async fn lookup(&self, id: &ExternalId) -> Option<ReferenceTitle> {
        match id {
            ExternalId::Imdb(imdb_id) => {
                let item = self
                    .find_by_imdb_id(imdb_id)
                    .await
                    .map_err(|e| tracing::warn!("Tmdb find failed for {imdb_id}: {e}"))
                    .ok()??;
                Some(item.into())
            }
            ExternalId::Tmdb(tmdb_id) => {
                if let Ok(movie) = self.movie_details(*tmdb_id).await {
                    return Some(TmdbFindItem::Movie(movie).into());
                }
                match self.tv_details(*tmdb_id).await {
                    Ok(tv) => Some(TmdbFindItem::Tv(tv).into()),
                    Err(e) => {
                        tracing::warn!("Tmdb details failed for tmdb:{tmdb_id}: {e}");
                        None
                    }
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl MetadataClient for TmdbApi {
    async fn get_title_and_year(&self, id: &ExternalId) -> Option<ReferenceTitle> {
        let cache_key = format!("tmdb:title:{id}");
        if let Some(cached) = cache::get_json(self.cache, &cache_key).await {
            tracing::trace!("Reference title cache hit for {id}");
            return Some(cached);
        }
        let reference = self.lookup(id).await?;
        if reference.title.is_empty() {
            return None;
        }
        cache::set_json(self.cache, &cache_key, &reference, TITLE_CACHE_TTL).await;
        Some(reference)
    }

    async fn get_title_by_tmdb_id(&self, tmdb_id: u64) -> Option<String> {
        self.get_title_and_year(&ExternalId::Tmdb(tmdb_id))
            .await
            .map(|reference| reference.title)
    }

    fn provider_identifier(&self) -> &'static str {
        "tmdb"
    }
}

fn parse_year(date: Option<&str>) -> Option<i32> {
    let date = date?;
    date.get(..4)?.parse().ok()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbFindResponse {
    #[serde(default)]
    pub movie_results: Vec<TmdbMovieResult>,
    #[serde(default)]
    pub tv_results: Vec<TmdbTvResult>,
}

#[derive(Debug, Clone)]
pub enum TmdbFindItem {
    Movie(TmdbMovieResult),
    Tv(TmdbTvResult),
}

impl From<TmdbFindItem> for ReferenceTitle {
    fn from(item: TmdbFindItem) -> Self {
        match item {
            TmdbFindItem::Movie(movie) => ReferenceTitle {
                year: parse_year(movie.release_date.as_deref()),
                title: movie.title.or(movie.original_title).unwrap_or_default(),
                kind: ContentKind::Movie,
            },
            TmdbFindItem::Tv(tv) => ReferenceTitle {
                year: parse_year(tv.first_air_date.as_deref()),
                title: tv.name.or(tv.original_name).unwrap_or_default(),
                kind: ContentKind::Series,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbMovieResult {
    pub id: u64,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub vote_average: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbTvResult {
    pub id: u64,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub first_air_date: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub vote_average: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearch<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}
