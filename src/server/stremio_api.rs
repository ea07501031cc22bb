use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::app_state::{AppError, AppState};
use crate::config;
use crate::metadata::{ContentKind, ExternalId};
use crate::resolver::is_direct_video_url;
use crate::stream::{ClientStream, StreamRequest};

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Manifest {
    pub id: &'static str,
    pub version: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub resources: Vec<&'static str>,
    pub types: Vec<&'static str>,
    pub catalogs: Vec<ManifestCatalog>,
    #[serde(rename = "idPrefixes")]
    pub id_prefixes: Vec<&'static str>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ManifestCatalog {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: &'static str,
    pub name: &'static str,
}

#[utoipa::path(
    get,
    path = "/api/v1/stremio/manifest.json",
    responses(
        (status = 200, description = "Stremio addon manifest", body = Manifest),
    ),
    tag = "Stremio",
)]
pub async fn manifest() -> Json<Manifest> {
    Json(Manifest {
        id: "org.scavengarr.streams",
        version: config::APP_RESOURCES.app_version,
        name: "Scavengarr",
        description: "German streaming sites aggregated into one addon",
        resources: vec!["catalog", "stream"],
        types: vec!["movie", "series"],
        catalogs: vec![
            ManifestCatalog {
                kind: "movie",
                id: "scavengarr-trending-movies",
                name: "Trending",
            },
            ManifestCatalog {
                kind: "series",
                id: "scavengarr-trending-series",
                name: "Trending",
            },
        ],
        id_prefixes: vec!["tt", "tmdb:"],
    })
}

#[derive(Debug, Serialize)]
pub struct MetaPreview {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "releaseInfo", skip_serializing_if = "Option::is_none")]
    pub release_info: Option<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct CatalogResponse {
    pub metas: Vec<MetaPreview>,
}

#[utoipa::path(
    get,
    path = "/api/v1/stremio/catalog/{type}/{id}",
    params(
        ("type", description = "Content type, movie or series"),
        ("id", description = "Catalog id"),
    ),
    responses(
        (status = 200, description = "Trending catalog previews"),
    ),
    tag = "Stremio",
)]
pub async fn catalog(
    Path((kind, _catalog_id)): Path<(String, String)>,
    State(app_state): State<AppState>,
) -> Json<CatalogResponse> {
    let Ok(kind) = kind.parse::<ContentKind>() else {
        return Json(CatalogResponse::default());
    };
    let metas = match kind {
        ContentKind::Movie => app_state
            .tmdb_api
            .trending_movies(1)
            .await
            .map(|movies| movies.into_iter().map(movie_preview).collect()),
        ContentKind::Series => app_state
            .tmdb_api
            .trending_tv(1)
            .await
            .map(|shows| shows.into_iter().map(tv_preview).collect()),
    };
    match metas {
        Ok(metas) => Json(CatalogResponse { metas }),
        Err(e) => {
            tracing::warn!("Trending catalog lookup failed: {e}");
            Json(CatalogResponse::default())
        }
    }
}

fn movie_preview(movie: crate::metadata::tmdb_api::TmdbMovieResult) -> MetaPreview {
    MetaPreview {
        id: format!("tmdb:{}", movie.id),
        kind: "movie".to_string(),
        name: movie.title.or(movie.original_title).unwrap_or_default(),
        poster: movie
            .poster_path
            .as_deref()
            .map(crate::metadata::tmdb_api::TmdbApi::poster_url),
        description: movie.overview,
        release_info: movie.release_date.and_then(|d| d.get(..4).map(String::from)),
    }
}

fn tv_preview(show: crate::metadata::tmdb_api::TmdbTvResult) -> MetaPreview {
    MetaPreview {
        id: format!("tmdb:{}", show.id),
        kind: "series".to_string(),
        name: show.name.or(show.original_name).unwrap_or_default(),
        poster: show
            .poster_path
            .as_deref()
            .map(crate::metadata::tmdb_api::TmdbApi::poster_url),
        description: show.overview,
        release_info: show.first_air_date.and_then(|d| d.get(..4).map(String::from)),
    }
}

#[derive(Debug, Serialize, Default)]
pub struct StreamsResponse {
    pub streams: Vec<ClientStream>,
}

/// `tt0371746.json`, `tmdb:1726.json` or `tt0903747:1:5.json`. Anything else
/// is not an error, the client just gets no streams.
pub fn parse_stream_path(kind: &str, raw_id: &str) -> Option<StreamRequest> {
    let kind: ContentKind = kind.parse().ok()?;
    let raw_id = raw_id.strip_suffix(".json").unwrap_or(raw_id);
    let mut parts = raw_id.split(':');
    let mut id = parts.next()?.to_string();
    // A tmdb id spends one colon on its own prefix
    if id == "tmdb" {
        id = format!("tmdb:{}", parts.next()?);
    }
    let id: ExternalId = id.parse().ok()?;
    let season = parts.next();
    let episode = parts.next();
    if parts.next().is_some() {
        return None;
    }
    match (season, episode) {
        (None, None) => Some(StreamRequest {
            id,
            kind,
            season: None,
            episode: None,
        }),
        (Some(season), Some(episode)) => {
            if kind != ContentKind::Series {
                return None;
            }
            let season = season.parse().ok()?;
            let episode = episode.parse().ok()?;
            Some(StreamRequest {
                id,
                kind,
                season: Some(season),
                episode: Some(episode),
            })
        }
        _ => None,
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/stremio/stream/{type}/{id}",
    params(
        ("type", description = "Content type, movie or series"),
        ("id", description = "External id, optionally with :season:episode"),
    ),
    responses(
        (status = 200, description = "Playable streams, possibly empty"),
    ),
    tag = "Stremio",
)]
pub async fn stream(
    Path((kind, id)): Path<(String, String)>,
    State(app_state): State<AppState>,
) -> Json<StreamsResponse> {
    let Some(request) = parse_stream_path(&kind, &id) else {
        tracing::debug!("Unparseable stream request {kind}/{id}");
        return Json(StreamsResponse::default());
    };
    let base_url = config::CONFIG.get_value::<config::BaseUrl>().0;
    let streams = app_state
        .pipeline
        .resolve_streams(
            &request,
            base_url.as_deref(),
            app_state.cancellation_token.child_token(),
        )
        .await;
    Json(StreamsResponse { streams })
}

#[utoipa::path(
    get,
    path = "/api/v1/stremio/play/{stream_id}",
    params(
        ("stream_id", description = "Opaque stream link id"),
    ),
    responses(
        (status = 302, description = "Redirect to a freshly resolved video url"),
        (status = 404, description = "Unknown or expired stream id", body = AppError),
        (status = 502, description = "Resolver failed", body = AppError),
        (status = 503, description = "No resolver configured", body = AppError),
    ),
    tag = "Stremio",
)]
pub async fn play(
    Path(stream_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    let Some(resolvers) = app_state.resolvers.filter(|r| !r.is_empty()) else {
        return Err(AppError::unavailable("No hoster resolver is configured"));
    };
    let link = app_state
        .stream_links
        .get(&stream_id)
        .await
        .ok_or_else(|| AppError::not_found("Unknown or expired stream id"))?;
    let resolved = resolvers
        .resolve(&link.hoster, &link.embed_url)
        .await
        .filter(|resolved| is_direct_video_url(resolved, &link.embed_url))
        .ok_or_else(|| {
            AppError::bad_gateway(format!("Could not resolve {} embed", link.hoster))
        })?;
    tracing::debug!(
        hoster = %link.hoster,
        "Proxy play redirecting to resolved video url"
    );
    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, resolved.video_url)],
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movie_ids_parse() {
        let request = parse_stream_path("movie", "tt0371746.json").unwrap();
        assert_eq!(request.id, ExternalId::Imdb("tt0371746".to_string()));
        assert_eq!(request.kind, ContentKind::Movie);
        assert_eq!(request.season, None);
    }

    #[test]
    fn tmdb_ids_parse() {
        let request = parse_stream_path("movie", "tmdb:1726.json").unwrap();
        assert_eq!(request.id, ExternalId::Tmdb(1726));
    }

    #[test]
    fn series_ids_carry_season_and_episode() {
        let request = parse_stream_path("series", "tt0903747:1:5.json").unwrap();
        assert_eq!(request.season, Some(1));
        assert_eq!(request.episode, Some(5));
    }

    #[test]
    fn tmdb_series_ids_parse() {
        let request = parse_stream_path("series", "tmdb:1396:2:3.json").unwrap();
        assert_eq!(request.id, ExternalId::Tmdb(1396));
        assert_eq!(request.season, Some(2));
        assert_eq!(request.episode, Some(3));
    }

    #[test]
    fn malformed_ids_yield_nothing() {
        assert!(parse_stream_path("movie", "garbage.json").is_none());
        assert!(parse_stream_path("movie", "tt0371746:1:5.json").is_none());
        assert!(parse_stream_path("series", "tt0903747:1.json").is_none());
        assert!(parse_stream_path("series", "tt0903747:1:5:9.json").is_none());
        assert!(parse_stream_path("music", "tt0371746.json").is_none());
        assert!(parse_stream_path("series", "tt0903747:one:five.json").is_none());
    }

    mod play_endpoint {
        use super::*;
        use crate::adapters::AdapterRegistry;
        use crate::app_state::AppErrorKind;
        use crate::cache::MemoryCache;
        use crate::circuit_breaker::CircuitBreakerRegistry;
        use crate::concurrency::ConcurrencyGovernor;
        use crate::metadata::tmdb_api::TmdbApi;
        use crate::resolver::{HosterResolver, ResolvedStream, ResolverRegistry};
        use crate::stream::orchestrator::{PipelineConfig, StreamPipeline};
        use crate::stream::probe::LivenessProbe;
        use crate::stream_link::StreamLinkCache;
        use std::time::Duration;
        use tokio_util::sync::CancellationToken;

        struct Mp4Resolver;

        #[async_trait::async_trait]
        impl HosterResolver for Mp4Resolver {
            fn hosters(&self) -> &[&'static str] {
                &["voe"]
            }

            async fn resolve(
                &self,
                _embed_url: &str,
            ) -> anyhow::Result<Option<ResolvedStream>> {
                Ok(Some(ResolvedStream {
                    video_url: "https://cdn.voe.sx/delivery/video.mp4".to_string(),
                    headers: Default::default(),
                    is_hls: false,
                }))
            }
        }

        struct DeadResolver;

        #[async_trait::async_trait]
        impl HosterResolver for DeadResolver {
            fn hosters(&self) -> &[&'static str] {
                &["voe"]
            }

            async fn resolve(
                &self,
                _embed_url: &str,
            ) -> anyhow::Result<Option<ResolvedStream>> {
                Ok(None)
            }
        }

        fn state(resolvers: Option<&'static ResolverRegistry>) -> AppState {
            let metadata_cache: &'static MemoryCache = Box::leak(Box::new(MemoryCache::default()));
            let link_cache: &'static MemoryCache = Box::leak(Box::new(MemoryCache::default()));
            let tmdb_api = Box::leak(Box::new(TmdbApi::new(
                "test-key".to_string(),
                "de-DE".to_string(),
                metadata_cache,
            )));
            let adapters: &'static AdapterRegistry =
                Box::leak(Box::new(AdapterRegistry::default()));
            let breakers = Box::leak(Box::new(CircuitBreakerRegistry::new(
                5,
                Duration::from_secs(300),
            )));
            let probe = Box::leak(Box::new(LivenessProbe::new(
                4,
                Duration::from_secs(2),
                10,
            )));
            let stream_links = Box::leak(Box::new(StreamLinkCache::new(
                link_cache,
                StreamLinkCache::DEFAULT_TTL,
            )));
            let pipeline = Box::leak(Box::new(StreamPipeline {
                metadata: tmdb_api,
                adapters,
                governor: Box::leak(Box::new(ConcurrencyGovernor::new(4, 2))),
                breakers,
                probe,
                stream_links,
                resolvers: None,
                config: PipelineConfig::default(),
            }));
            AppState {
                tmdb_api,
                adapters,
                breakers,
                search_cache: Box::leak(Box::new(MemoryCache::default())),
                stream_links,
                probe,
                resolvers,
                pipeline,
                cancellation_token: CancellationToken::new(),
            }
        }

        fn registry(resolver: &'static (dyn HosterResolver + Send + Sync)) -> &'static ResolverRegistry {
            let mut registry = ResolverRegistry::default();
            registry.add_resolver(resolver);
            Box::leak(Box::new(registry))
        }

        #[tokio::test]
        async fn redirects_to_freshly_resolved_video() {
            let state = state(Some(registry(Box::leak(Box::new(Mp4Resolver)))));
            let stream_id = state
                .stream_links
                .save("https://voe.sx/e/abc123", "Iron Man", "voe")
                .await;
            let response = play(Path(stream_id), State(state)).await.unwrap();
            assert_eq!(response.status(), StatusCode::FOUND);
            assert_eq!(
                response.headers().get(header::LOCATION).unwrap(),
                "https://cdn.voe.sx/delivery/video.mp4"
            );
        }

        #[tokio::test]
        async fn unknown_stream_id_is_not_found() {
            let state = state(Some(registry(Box::leak(Box::new(Mp4Resolver)))));
            let error = play(Path("deadbeefdeadbeef".to_string()), State(state))
                .await
                .unwrap_err();
            assert_eq!(error.kind, AppErrorKind::NotFound);
        }

        #[tokio::test]
        async fn resolver_failure_is_bad_gateway() {
            let state = state(Some(registry(Box::leak(Box::new(DeadResolver)))));
            let stream_id = state
                .stream_links
                .save("https://voe.sx/e/abc123", "Iron Man", "voe")
                .await;
            let error = play(Path(stream_id), State(state)).await.unwrap_err();
            assert_eq!(error.kind, AppErrorKind::BadGateway);
        }

        #[tokio::test]
        async fn missing_resolver_is_unavailable() {
            let state = state(None);
            let error = play(Path("deadbeefdeadbeef".to_string()), State(state))
                .await
                .unwrap_err();
            assert_eq!(error.kind, AppErrorKind::Unavailable);
        }
    }
}
