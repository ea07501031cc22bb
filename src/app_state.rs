use std::{error::Error, fmt::Display};

use axum::{extract::FromRef, http::StatusCode, response::IntoResponse, Json};
use tokio_util::sync::CancellationToken;

use crate::{
    adapters::AdapterRegistry,
    cache::MemoryCache,
    circuit_breaker::CircuitBreakerRegistry,
    metadata::tmdb_api::TmdbApi,
    resolver::ResolverRegistry,
    stream::orchestrator::StreamPipeline,
    stream::probe::LivenessProbe,
    stream_link::StreamLinkCache,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub tmdb_api: &'static TmdbApi,
    pub adapters: &'static AdapterRegistry,
    pub breakers: &'static CircuitBreakerRegistry,
    pub search_cache: &'static MemoryCache,
    pub stream_links: &'static StreamLinkCache,
    pub probe: &'static LivenessProbe,
    pub resolvers: Option<&'static ResolverRegistry>,
    pub pipeline: &'static StreamPipeline,
    pub cancellation_token: CancellationToken,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct AppError {
    pub message: String,
    #[serde(skip)]
    pub kind: AppErrorKind,
}

#[derive(Debug, Clone, PartialEq, utoipa::ToSchema)]
pub enum AppErrorKind {
    InternalError,
    NotFound,
    BadRequest,
    UnprocessableEntity,
    BadGateway,
    Unavailable,
}

impl Error for AppError {}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            AppErrorKind::InternalError => write!(f, "Internal Error: {}", self.message),
            AppErrorKind::NotFound => write!(f, "Not Found Error: {}", self.message),
            AppErrorKind::BadRequest => write!(f, "Bad Request: {}", self.message),
            AppErrorKind::UnprocessableEntity => {
                write!(f, "Unprocessable Entity: {}", self.message)
            }
            AppErrorKind::BadGateway => write!(f, "Bad Gateway: {}", self.message),
            AppErrorKind::Unavailable => write!(f, "Unavailable: {}", self.message),
        }
    }
}

impl From<AppErrorKind> for StatusCode {
    fn from(val: AppErrorKind) -> Self {
        match val {
            AppErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            AppErrorKind::NotFound => StatusCode::NOT_FOUND,
            AppErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            AppErrorKind::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
            AppErrorKind::BadGateway => StatusCode::BAD_GATEWAY,
            AppErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            message: err.to_string(),
            kind: AppErrorKind::InternalError,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        Self {
            message: value.to_string(),
            kind: AppErrorKind::BadGateway,
        }
    }
}

impl AppError {
    pub fn new(message: impl AsRef<str>, kind: AppErrorKind) -> Self {
        Self {
            message: message.as_ref().into(),
            kind,
        }
    }

    pub fn not_found(msg: impl AsRef<str>) -> AppError {
        AppError {
            message: msg.as_ref().into(),
            kind: AppErrorKind::NotFound,
        }
    }

    pub fn bad_request(msg: impl AsRef<str>) -> AppError {
        AppError {
            message: msg.as_ref().into(),
            kind: AppErrorKind::BadRequest,
        }
    }

    pub fn unprocessable(msg: impl AsRef<str>) -> AppError {
        AppError {
            message: msg.as_ref().into(),
            kind: AppErrorKind::UnprocessableEntity,
        }
    }

    pub fn internal_error(msg: impl AsRef<str>) -> AppError {
        AppError {
            message: msg.as_ref().into(),
            kind: AppErrorKind::InternalError,
        }
    }

    pub fn bad_gateway(msg: impl AsRef<str>) -> AppError {
        AppError {
            message: msg.as_ref().into(),
            kind: AppErrorKind::BadGateway,
        }
    }

    pub fn unavailable(msg: impl AsRef<str>) -> AppError {
        AppError {
            message: msg.as_ref().into(),
            kind: AppErrorKind::Unavailable,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status: StatusCode = self.kind.clone().into();
        (status, Json(self)).into_response()
    }
}

impl FromRef<AppState> for &'static TmdbApi {
    fn from_ref(app_state: &AppState) -> &'static TmdbApi {
        app_state.tmdb_api
    }
}

impl FromRef<AppState> for &'static AdapterRegistry {
    fn from_ref(app_state: &AppState) -> &'static AdapterRegistry {
        app_state.adapters
    }
}

impl FromRef<AppState> for &'static StreamLinkCache {
    fn from_ref(app_state: &AppState) -> &'static StreamLinkCache {
        app_state.stream_links
    }
}

impl FromRef<AppState> for &'static CircuitBreakerRegistry {
    fn from_ref(app_state: &AppState) -> &'static CircuitBreakerRegistry {
        app_state.breakers
    }
}

impl FromRef<AppState> for &'static StreamPipeline {
    fn from_ref(app_state: &AppState) -> &'static StreamPipeline {
        app_state.pipeline
    }
}
