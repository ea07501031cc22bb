use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::routing::get;
use axum::Router;
use clap::Parser;
use dotenvy::dotenv;
use scavengarr::adapters::hdfilme::HdfilmeAdapter;
use scavengarr::adapters::serienfans::SerienfansAdapter;
use scavengarr::adapters::AdapterRegistry;
use scavengarr::app_state::AppState;
use scavengarr::cache::MemoryCache;
use scavengarr::circuit_breaker::CircuitBreakerRegistry;
use scavengarr::concurrency::ConcurrencyGovernor;
use scavengarr::config::{self, AppResources, Args, ConfigFile, ConfigValue};
use scavengarr::metadata::tmdb_api::TmdbApi;
use scavengarr::resolver::xfs::XfsResolver;
use scavengarr::resolver::ResolverRegistry;
use scavengarr::server::{health, stremio_api, torznab_api, OpenApiDoc};
use scavengarr::stream::orchestrator::{PipelineConfig, StreamPipeline};
use scavengarr::stream::probe::LivenessProbe;
use scavengarr::stream_link::StreamLinkCache;
use scavengarr::tracing::init_tracer;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() {
    Args::parse().apply_configuration();
    if let Err(err) = AppResources::initiate() {
        panic!("Could not initiate app resources: {err}");
    };
    init_tracer(tracing::Level::INFO);

    if let Ok(path) = dotenv() {
        tracing::info!("Loaded env variables from: {}", path.display());
    }

    match ConfigFile::open_and_read().await {
        Ok(toml) => config::CONFIG.apply_toml_settings(toml),
        Err(err) => tracing::error!("Error reading config file: {err}"),
    };
    config::auto_tune(config::detect_resources());

    let cancellation_token = CancellationToken::new();
    let tracker = TaskTracker::new();

    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let metadata_cache = Box::leak(Box::new(MemoryCache::default()));
    let search_cache = Box::leak(Box::new(MemoryCache::default()));
    let link_cache = Box::leak(Box::new(MemoryCache::default()));

    let Some(tmdb_key) = config::CONFIG.get_value::<config::TmdbKey>().0 else {
        panic!(
            "Missing tmdb api key, consider passing it in cli, configuration file or {} environment variable",
            config::TmdbKey::ENV_KEY.expect("tmdb key has an env key")
        );
    };
    let language = config::CONFIG.get_value::<config::MetadataLanguage>().0;
    let tmdb_api = Box::leak(Box::new(TmdbApi::new(tmdb_key, language, metadata_cache)));

    let adapters: &'static AdapterRegistry = Box::leak(Box::new(AdapterRegistry::default()));
    adapters.add_adapter(Box::leak(Box::new(HdfilmeAdapter::new())));
    adapters.add_adapter(Box::leak(Box::new(SerienfansAdapter::new())));
    tracing::info!("Registered adapters: {adapters:?}");

    let cheap_slots = config::CONFIG.get_value::<config::CheapSlots>().0;
    let expensive_slots = config::CONFIG.get_value::<config::ExpensiveSlots>().0;
    let governor = Box::leak(Box::new(ConcurrencyGovernor::new(
        cheap_slots,
        expensive_slots,
    )));

    let breakers = Box::leak(Box::new(CircuitBreakerRegistry::new(
        config::CONFIG
            .get_value::<config::CircuitFailureThreshold>()
            .0,
        std::time::Duration::from_secs(
            config::CONFIG
                .get_value::<config::CircuitCooldownSeconds>()
                .0,
        ),
    )));

    let pipeline_config = PipelineConfig::from_config();
    let probe = Box::leak(Box::new(LivenessProbe::new(
        config::CONFIG.get_value::<config::ProbeConcurrency>().0,
        pipeline_config.probe_timeout,
        config::CONFIG.get_value::<config::MaxProbeCount>().0,
    )));

    let stream_links = Box::leak(Box::new(StreamLinkCache::new(
        link_cache,
        StreamLinkCache::DEFAULT_TTL,
    )));

    // The stream endpoint hands out proxy play urls, resolution happens at
    // click time in the play endpoint. Wiring the registry into the pipeline
    // instead would resolve everything up front.
    let mut resolver_registry = ResolverRegistry::default();
    resolver_registry.set_fallback(Box::leak(Box::new(XfsResolver::default())));
    let resolvers = Box::leak(Box::new(resolver_registry));

    let pipeline = Box::leak(Box::new(StreamPipeline {
        metadata: tmdb_api,
        adapters,
        governor,
        breakers,
        probe,
        stream_links,
        resolvers: None,
        config: pipeline_config,
    }));

    let app_state = AppState {
        tmdb_api,
        adapters,
        breakers,
        search_cache,
        stream_links,
        probe,
        resolvers: Some(resolvers),
        pipeline,
        cancellation_token: cancellation_token.clone(),
    };

    let api = Router::new()
        .route("/health", get(health))
        .route("/stremio/manifest.json", get(stremio_api::manifest))
        .route("/stremio/catalog/{type}/{id}", get(stremio_api::catalog))
        .route("/stremio/stream/{type}/{id}", get(stremio_api::stream))
        .route("/stremio/play/{stream_id}", get(stremio_api::play))
        .route("/torznab/indexers", get(torznab_api::indexers))
        .route("/torznab/{adapter}/api", get(torznab_api::api));

    let app = Router::new()
        .nest("/api/v1", api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", OpenApiDoc::openapi()))
        .layer(cors)
        .with_state(app_state.clone());

    let port = config::CONFIG.get_value::<config::Port>().0;
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to start server on port {port}: {e}");
            return;
        }
    };
    tracing::info!("Starting server on port {port}");

    {
        let cancellation_token = cancellation_token.clone();
        tracker.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(cancellation_token.cancelled_owned())
                .await
                .unwrap();
        });
    }
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            cancellation_token.cancel();
        }
        _ = cancellation_token.cancelled() => {}
    }
    tracing::info!("Shutting down, cleaning up adapters");
    app_state.adapters.cleanup_all().await;
    tracing::trace!("Waiting for remaining tasks to finish");
    tracker.close();
    tracker.wait().await;
    tracing::info!("Gracefully shut down");
}
