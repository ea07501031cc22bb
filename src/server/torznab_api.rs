use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Deserialize;
use serde::Serialize;
use tokio::time::Instant;

use crate::adapters::{categories, Provides, RawSearchResult, SiteAdapter};
use crate::app_state::{AppError, AppState};
use crate::cache::SearchCache;
use crate::config;
use crate::stream::convert::parse_size_bytes;

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct IndexerInfo {
    pub id: String,
    pub name: String,
    pub provides: Provides,
    pub kind: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/torznab/indexers",
    responses(
        (status = 200, description = "Registered site adapters", body = [IndexerInfo]),
    ),
    tag = "Torznab",
)]
pub async fn indexers(State(app_state): State<AppState>) -> Json<Vec<IndexerInfo>> {
    let indexers = app_state
        .adapters
        .all()
        .into_iter()
        .map(|adapter| IndexerInfo {
            id: adapter.name().to_string(),
            name: adapter.name().to_string(),
            provides: adapter.provides(),
            kind: adapter.kind().to_string(),
        })
        .collect();
    Json(indexers)
}

#[derive(Debug, Deserialize)]
pub struct TorznabParams {
    pub t: String,
    pub q: Option<String>,
    pub cat: Option<String>,
    pub season: Option<u32>,
    pub ep: Option<u32>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/v1/torznab/{adapter}/api",
    params(
        ("adapter", description = "Adapter name"),
        ("t" = String, Query, description = "Torznab action: caps, search, tvsearch or movie"),
        ("q" = Option<String>, Query, description = "Search query"),
        ("cat" = Option<String>, Query, description = "Comma separated category list"),
    ),
    responses(
        (status = 200, description = "Caps document or RSS search feed"),
        (status = 404, description = "Unknown adapter (dev mode)", body = AppError),
        (status = 422, description = "Unsupported action", body = AppError),
        (status = 502, description = "Upstream failure (dev mode)", body = AppError),
    ),
    tag = "Torznab",
)]
pub async fn api(
    Path(adapter_name): Path<String>,
    Query(params): Query<TorznabParams>,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    let dev = config::CONFIG.get_value::<config::DevMode>().0;
    match params.t.as_str() {
        "caps" => {
            let adapter = app_state
                .adapters
                .get(&adapter_name)
                .ok_or_else(|| AppError::not_found(format!("Unknown adapter {adapter_name}")))?;
            Ok(xml_response(caps_xml(adapter)?))
        }
        "search" | "tvsearch" | "movie" => search(app_state, adapter_name, params, dev).await,
        other => Err(AppError::unprocessable(format!(
            "Unsupported torznab action {other}"
        ))),
    }
}

async fn search(
    app_state: AppState,
    adapter_name: String,
    params: TorznabParams,
    dev: bool,
) -> Result<Response, AppError> {
    let Some(adapter) = app_state.adapters.get(&adapter_name) else {
        if dev {
            return Err(AppError::not_found(format!(
                "Unknown adapter {adapter_name}"
            )));
        }
        return Ok(xml_response(rss_xml(&adapter_name, &[], None)?));
    };

    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        let description = dev.then_some("Missing query parameter q");
        return Ok(xml_response(rss_xml(&adapter_name, &[], description)?));
    }

    let category = params
        .cat
        .as_deref()
        .and_then(|cat| cat.split(',').find_map(|c| c.trim().parse::<u32>().ok()))
        .or(match params.t.as_str() {
            "movie" => Some(categories::MOVIES),
            "tvsearch" => Some(categories::TV),
            _ => None,
        });

    let search_cache = SearchCache::new(app_state.search_cache);
    let ttl = adapter.cache_ttl().unwrap_or(Duration::from_secs(
        config::CONFIG.get_value::<config::SearchTtlSeconds>().0,
    ));
    let results = match search_cache.get(adapter.name(), query, category).await {
        Some(cached) if !ttl.is_zero() => {
            tracing::debug!(adapter = adapter.name(), query, "Search cache hit");
            cached
        }
        _ => {
            match run_adapter_search(&app_state, adapter, query, category, &params).await {
                Ok(results) => {
                    search_cache
                        .set(adapter.name(), query, category, &results, ttl)
                        .await;
                    results
                }
                Err(e) if dev => return Err(e),
                Err(e) => {
                    tracing::warn!("Hiding search failure behind an empty feed: {e}");
                    Vec::new()
                }
            }
        }
    };

    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let page: Vec<_> = results.into_iter().skip(offset).take(limit).collect();

    Ok(xml_response(rss_xml(&adapter_name, &page, None)?))
}

async fn run_adapter_search(
    app_state: &AppState,
    adapter: &'static (dyn SiteAdapter + Send + Sync),
    query: &str,
    category: Option<u32>,
    params: &TorznabParams,
) -> Result<Vec<RawSearchResult>, AppError> {
    let name = adapter.name();
    if !app_state.breakers.allows(name) {
        return Err(AppError::bad_gateway(format!("Circuit for {name} is open")));
    }
    let plugin_timeout = Duration::from_secs(
        config::CONFIG.get_value::<config::PluginTimeoutSeconds>().0,
    );
    let budget = app_state.pipeline.governor.acquire_request_budget(
        app_state.cancellation_token.child_token(),
        Instant::now() + plugin_timeout,
    );
    let _slot = budget
        .acquire_slot(adapter.kind())
        .await
        .map_err(|_| AppError::bad_gateway("Search cancelled"))?;
    match tokio::time::timeout(
        plugin_timeout,
        adapter.search(query, category, params.season, params.ep),
    )
    .await
    {
        Ok(Ok(mut results)) => {
            app_state.breakers.record_success(name);
            results.retain(RawSearchResult::is_usable);
            let max_results = config::CONFIG.get_value::<config::MaxResultsPerPlugin>().0;
            results.truncate(max_results);
            Ok(results)
        }
        Ok(Err(e)) => {
            app_state.breakers.record_failure(name);
            Err(AppError::bad_gateway(format!("{name} search failed: {e}")))
        }
        Err(_) => {
            app_state.breakers.record_failure(name);
            Err(AppError::bad_gateway(format!(
                "{name} search timed out after {plugin_timeout:?}"
            )))
        }
    }
}

fn xml_response(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        body,
    )
        .into_response()
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Torznab capabilities document for one adapter.
fn caps_xml(adapter: &'static (dyn SiteAdapter + Send + Sync)) -> Result<String, AppError> {
    let mut writer = Writer::new(Vec::new());
    let mut build = || -> quick_xml::Result<()> {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("caps")))?;

        let mut server = BytesStart::new("server");
        server.push_attribute(("title", "Scavengarr"));
        server.push_attribute(("version", config::APP_RESOURCES.app_version));
        server.push_attribute(("indexer", adapter.name()));
        writer.write_event(Event::Empty(server))?;

        let mut limits = BytesStart::new("limits");
        limits.push_attribute(("max", "100"));
        limits.push_attribute(("default", "100"));
        writer.write_event(Event::Empty(limits))?;

        writer.write_event(Event::Start(BytesStart::new("searching")))?;
        for name in ["search", "tv-search", "movie-search"] {
            let mut search = BytesStart::new(name);
            search.push_attribute(("available", "yes"));
            search.push_attribute(("supportedParams", "q,season,ep"));
            writer.write_event(Event::Empty(search))?;
        }
        writer.write_event(Event::End(BytesEnd::new("searching")))?;

        writer.write_event(Event::Start(BytesStart::new("categories")))?;
        let cats: &[(u32, &str)] = &[
            (categories::MOVIES, "Movies"),
            (categories::MOVIES_HD, "Movies/HD"),
            (categories::TV, "TV"),
            (categories::TV_HD, "TV/HD"),
            (categories::TV_ANIME, "TV/Anime"),
            (categories::TV_DOCUMENTARY, "TV/Documentary"),
        ];
        for (id, name) in cats {
            let mut category = BytesStart::new("category");
            let id = id.to_string();
            category.push_attribute(("id", id.as_str()));
            category.push_attribute(("name", *name));
            writer.write_event(Event::Empty(category))?;
        }
        writer.write_event(Event::End(BytesEnd::new("categories")))?;

        writer.write_event(Event::End(BytesEnd::new("caps")))?;
        Ok(())
    };
    build().map_err(|e| AppError::internal_error(format!("caps xml: {e}")))?;
    String::from_utf8(writer.into_inner())
        .map_err(|e| AppError::internal_error(format!("caps xml: {e}")))
}

/// Torznab RSS feed around the adapter's search results.
fn rss_xml(
    adapter_name: &str,
    results: &[RawSearchResult],
    description: Option<&str>,
) -> Result<String, AppError> {
    let mut writer = Writer::new(Vec::new());
    let mut build = || -> quick_xml::Result<()> {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        rss.push_attribute(("xmlns:torznab", "http://torznab.com/schemas/2015/feed"));
        writer.write_event(Event::Start(rss))?;
        writer.write_event(Event::Start(BytesStart::new("channel")))?;
        write_text_element(&mut writer, "title", &format!("Scavengarr - {adapter_name}"))?;
        write_text_element(
            &mut writer,
            "description",
            description.unwrap_or("Scavengarr torznab feed"),
        )?;

        let pub_date = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc2822)
            .unwrap_or_default();
        for result in results {
            writer.write_event(Event::Start(BytesStart::new("item")))?;
            write_text_element(&mut writer, "title", &result.title)?;
            write_text_element(&mut writer, "guid", &result.primary_link)?;
            write_text_element(&mut writer, "link", &result.primary_link)?;
            write_text_element(&mut writer, "pubDate", &pub_date)?;
            let size_bytes = result
                .size
                .as_deref()
                .and_then(parse_size_bytes)
                .unwrap_or(0);

            let mut enclosure = BytesStart::new("enclosure");
            enclosure.push_attribute(("url", result.primary_link.as_str()));
            let length = size_bytes.to_string();
            enclosure.push_attribute(("length", length.as_str()));
            enclosure.push_attribute(("type", "application/octet-stream"));
            writer.write_event(Event::Empty(enclosure))?;

            let category = result.category.to_string();
            for (name, value) in [("category", category.as_str()), ("size", length.as_str())] {
                let mut attr = BytesStart::new("torznab:attr");
                attr.push_attribute(("name", name));
                attr.push_attribute(("value", value));
                writer.write_event(Event::Empty(attr))?;
            }
            writer.write_event(Event::End(BytesEnd::new("item")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("channel")))?;
        writer.write_event(Event::End(BytesEnd::new("rss")))?;
        Ok(())
    };
    build().map_err(|e| AppError::internal_error(format!("rss xml: {e}")))?;
    String::from_utf8(writer.into_inner())
        .map_err(|e| AppError::internal_error(format!("rss xml: {e}")))
}
