use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::adapters::{categories, AdapterRegistry, RawSearchResult};
use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::concurrency::ConcurrencyGovernor;
use crate::config;
use crate::metadata::{ContentKind, MetadataClient, ReferenceTitle};
use crate::resolver::{is_direct_video_url, ResolvedStream, ResolverRegistry};
use crate::stream_link::StreamLinkCache;

use super::convert::convert_search_results;
use super::episode_filter::filter_by_episode;
use super::invoke::invoke_adapter;
use super::probe::LivenessProbe;
use super::query::build_search_queries;
use super::sorter::{sort_and_dedupe, ScoreTables};
use super::title_match::{filter_by_title_match, TitleMatchConfig};
use super::{BehaviorHints, ClientStream, ProxyHeaders, RankedStream, StreamRequest};

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);
const RESOLVE_CONCURRENCY: usize = 8;
const DEADLINE_MARGIN: Duration = Duration::from_secs(2);

/// Pipeline knobs, snapshotted once per process start. Handing the stages a
/// fixed struct keeps the output a pure function of request and config.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub plugin_timeout: Duration,
    pub probe_timeout: Duration,
    pub max_results_per_plugin: usize,
    pub probe_at_stream_time: bool,
    pub title_match: TitleMatchConfig,
    pub tables: ScoreTables,
}

impl PipelineConfig {
    pub fn from_config() -> Self {
        Self {
            plugin_timeout: Duration::from_secs(
                config::CONFIG.get_value::<config::PluginTimeoutSeconds>().0,
            ),
            probe_timeout: Duration::from_secs(
                config::CONFIG.get_value::<config::ProbeTimeoutSeconds>().0,
            ),
            max_results_per_plugin: config::CONFIG.get_value::<config::MaxResultsPerPlugin>().0,
            probe_at_stream_time: config::CONFIG.get_value::<config::ProbeAtStreamTime>().0,
            title_match: TitleMatchConfig::from_config(),
            tables: ScoreTables::from_config(),
        }
    }

    /// Soft deadline for the whole request. Bounded no matter how many
    /// adapters hang.
    pub fn request_deadline(&self) -> Duration {
        self.plugin_timeout + self.probe_timeout + RESOLVE_TIMEOUT + DEADLINE_MARGIN
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            plugin_timeout: Duration::from_secs(config::PluginTimeoutSeconds::default().0),
            probe_timeout: Duration::from_secs(config::ProbeTimeoutSeconds::default().0),
            max_results_per_plugin: config::MaxResultsPerPlugin::default().0,
            probe_at_stream_time: config::ProbeAtStreamTime::default().0,
            title_match: TitleMatchConfig::default(),
            tables: ScoreTables::default(),
        }
    }
}

/// The stream resolution pipeline. One instance per process, shared by the
/// stremio handlers.
pub struct StreamPipeline {
    pub metadata: &'static (dyn MetadataClient + 'static),
    pub adapters: &'static AdapterRegistry,
    pub governor: &'static ConcurrencyGovernor,
    pub breakers: &'static CircuitBreakerRegistry,
    pub probe: &'static LivenessProbe,
    pub stream_links: &'static StreamLinkCache,
    pub resolvers: Option<&'static ResolverRegistry>,
    pub config: PipelineConfig,
}

impl std::fmt::Debug for StreamPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPipeline")
            .field("metadata", &self.metadata.provider_identifier())
            .field("adapters", &self.adapters)
            .field("resolvers", &self.resolvers)
            .field("config", &self.config)
            .finish()
    }
}

impl StreamPipeline {
    /// Resolve one stream request into an ordered list of playable streams.
    ///
    /// Scrape trouble of any kind degrades to fewer (or zero) streams, never
    /// into an error. An empty list is the normal failure mode.
    pub async fn resolve_streams(
        &self,
        request: &StreamRequest,
        base_url: Option<&str>,
        cancellation: CancellationToken,
    ) -> Vec<ClientStream> {
        let deadline = Instant::now() + self.config.request_deadline();
        let budget = self.governor.acquire_request_budget(cancellation, deadline);

        let Some(reference) = self.metadata.get_title_and_year(&request.id).await else {
            tracing::debug!("No reference title for {}, answering empty", request.id);
            return Vec::new();
        };
        let queries = build_search_queries(&reference.title);
        if queries.is_empty() {
            return Vec::new();
        }

        let category = categories::for_kind(request.kind);
        let adapters = self.adapters.stream_providers();
        tracing::debug!(
            adapters = adapters.len(),
            query = %queries[0],
            "Fanning out stream search"
        );

        let mut searches: JoinSet<Vec<RawSearchResult>> = JoinSet::new();
        for adapter in adapters {
            let budget = budget.clone();
            let queries = queries.clone();
            let reference = reference.clone();
            let request = request.clone();
            let breakers = self.breakers;
            let title_match = self.config.title_match;
            let plugin_timeout = self.config.plugin_timeout;
            let max_results = self.config.max_results_per_plugin;
            searches.spawn(async move {
                let mut surviving = Vec::new();
                // The subtitle fallback query only runs when the primary
                // query left nothing after filtering
                for query in &queries {
                    let results = invoke_adapter(
                        adapter,
                        breakers,
                        &budget,
                        query,
                        Some(category),
                        request.season,
                        request.episode,
                        plugin_timeout,
                        max_results,
                    )
                    .await;
                    let results = filter_by_episode(results, request.season, request.episode);
                    surviving = filter_by_title_match(results, &reference, &title_match);
                    if !surviving.is_empty() {
                        break;
                    }
                }
                for result in &mut surviving {
                    result
                        .metadata
                        .insert("source_adapter".to_string(), adapter.name().to_string());
                    result
                        .metadata
                        .entry("default_language".to_string())
                        .or_insert_with(|| adapter.default_language().to_string());
                }
                surviving
            });
        }

        let mut combined = Vec::new();
        while let Some(joined) = searches.join_next().await {
            match joined {
                Ok(results) => combined.extend(results),
                Err(e) => tracing::error!("Adapter search task panicked: {e}"),
            }
        }

        if budget.is_cancelled() {
            return Vec::new();
        }

        let streams = convert_search_results(&combined);
        let mut streams = sort_and_dedupe(streams, &self.config.tables);
        tracing::debug!(streams = streams.len(), "Candidates after dedupe");

        if self.config.probe_at_stream_time {
            streams = self.probe.filter_alive(streams).await;
        }

        match self.resolvers.filter(|r| !r.is_empty()) {
            Some(resolvers) => self.resolve_directly(streams, resolvers, &reference, request).await,
            None => {
                self.proxy_or_passthrough(streams, &reference, request, base_url)
                    .await
            }
        }
    }

    /// Resolve every surviving embed to a direct video url. Streams whose
    /// resolver fails, or merely echoes the embed back, are dropped.
    async fn resolve_directly(
        &self,
        streams: Vec<RankedStream>,
        resolvers: &'static ResolverRegistry,
        reference: &ReferenceTitle,
        request: &StreamRequest,
    ) -> Vec<ClientStream> {
        let semaphore = Arc::new(Semaphore::new(RESOLVE_CONCURRENCY));
        let mut resolutions = JoinSet::new();
        for (index, stream) in streams.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            resolutions.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("resolver semaphore");
                let resolved =
                    tokio::time::timeout(RESOLVE_TIMEOUT, resolvers.resolve(&stream.hoster, &stream.url))
                        .await
                        .ok()
                        .flatten();
                (index, stream, resolved)
            });
        }

        let mut slots: Vec<Option<(RankedStream, ResolvedStream)>> = Vec::new();
        slots.resize_with(resolutions.len(), || None);
        while let Some(joined) = resolutions.join_next().await {
            match joined {
                Ok((index, stream, Some(resolved))) => {
                    if is_direct_video_url(&resolved, &stream.url) {
                        slots[index] = Some((stream, resolved));
                    } else {
                        tracing::debug!(
                            hoster = %stream.hoster,
                            "Resolver echoed the embed, dropping stream"
                        );
                    }
                }
                Ok((_, stream, None)) => {
                    tracing::debug!(hoster = %stream.hoster, "Resolver produced nothing");
                }
                Err(e) => tracing::error!("Resolver task panicked: {e}"),
            }
        }

        slots
            .into_iter()
            .flatten()
            .map(|(stream, resolved)| {
                let mut headers = resolved.headers;
                headers
                    .entry("User-Agent".to_string())
                    .or_insert_with(|| crate::resolver::xfs::DEFAULT_USER_AGENT.to_string());
                let hints = BehaviorHints {
                    not_web_ready: true,
                    proxy_headers: Some(ProxyHeaders { request: headers }),
                };
                format_stream(
                    &stream,
                    Some(reference),
                    request.season,
                    request.episode,
                    resolved.video_url,
                    Some(hints),
                )
            })
            .collect()
    }

    /// Without a resolver the embeds go out as they are, or behind the proxy
    /// play endpoint when a base url is configured.
    async fn proxy_or_passthrough(
        &self,
        streams: Vec<RankedStream>,
        reference: &ReferenceTitle,
        request: &StreamRequest,
        base_url: Option<&str>,
    ) -> Vec<ClientStream> {
        let mut out = Vec::with_capacity(streams.len());
        for stream in streams {
            let url = match base_url {
                Some(base) => {
                    let stream_id = self
                        .stream_links
                        .save(&stream.url, &reference.title, &stream.hoster)
                        .await;
                    format!(
                        "{}/api/v1/stremio/play/{stream_id}",
                        base.trim_end_matches('/')
                    )
                }
                None => stream.url.clone(),
            };
            out.push(format_stream(
                &stream,
                Some(reference),
                request.season,
                request.episode,
                url,
                None,
            ));
        }
        out
    }
}

/// Client facing name and description for one stream.
///
/// Name prefers the reference title with year (movies) or SxxEyy (episodes),
/// then falls back through release name, scraped title and adapter name.
/// Unknown quality appends nothing.
pub fn format_stream(
    stream: &RankedStream,
    reference: Option<&ReferenceTitle>,
    season: Option<u32>,
    episode: Option<u32>,
    url: String,
    behavior_hints: Option<BehaviorHints>,
) -> ClientStream {
    let base_name = match reference {
        Some(reference) => match (season, episode) {
            (Some(season), Some(episode)) => {
                format!("{} S{season:02}E{episode:02}", reference.title)
            }
            _ => match reference.year {
                Some(year) if reference.kind == ContentKind::Movie => {
                    format!("{} ({year})", reference.title)
                }
                _ => reference.title.clone(),
            },
        },
        None => stream
            .release_name
            .clone()
            .or_else(|| stream.title.clone())
            .or_else(|| stream.source_adapter.clone())
            .unwrap_or_default(),
    };
    let name = match stream.quality.label() {
        Some(label) if base_name.is_empty() => label.to_string(),
        Some(label) => format!("{base_name} {label}"),
        None => base_name,
    };

    let mut segments: Vec<String> = Vec::new();
    if let Some(source) = &stream.source_adapter {
        segments.push(source.clone());
    }
    if let Some(language) = &stream.language {
        segments.push(language.label.clone());
    }
    if !stream.hoster.is_empty() {
        segments.push(stream.hoster.to_uppercase());
    }
    if let Some(size) = &stream.size {
        segments.push(size.clone());
    }
    let description = segments.join(" | ");

    ClientStream {
        name,
        description,
        url,
        behavior_hints,
    }
}
