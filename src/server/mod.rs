use axum::Json;
use serde::Serialize;
use utoipa::OpenApi;

use crate::adapters;
use crate::app_state;
use crate::config::APP_RESOURCES;

pub mod stremio_api;
pub mod torznab_api;

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        stremio_api::manifest,
        stremio_api::catalog,
        stremio_api::stream,
        stremio_api::play,
        torznab_api::indexers,
        torznab_api::api,
    ),
    components(schemas(
        app_state::AppError,
        app_state::AppErrorKind,
        adapters::Provides,
        HealthResponse,
        stremio_api::Manifest,
        stremio_api::ManifestCatalog,
        torznab_api::IndexerInfo,
    )),
    tags(
        (name = "Stremio", description = "Stremio addon endpoints"),
        (name = "Torznab", description = "Torznab indexer endpoints"),
    )
)]
pub struct OpenApiDoc;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Server is alive", body = HealthResponse),
    ),
    tag = "Torznab",
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: APP_RESOURCES.app_version,
    })
}
