use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Request, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;

use crate::app_state::AppError;

/// HTTP client held to a provider's request budget.
///
/// Everything this crate fetches from a provider is a json GET: TMDB lookups
/// and the site adapters' search apis. So the surface is exactly that, one
/// `get_json` call that owns rate limiting and the provider status taxonomy.
///
/// The limit works on permits: a request takes one for the whole rate
/// window, not just for its own duration, which makes `limit` per `window` a
/// hard ceiling instead of a concurrency cap. Clones share the pool. A caller
/// that goes away while still waiting never consumes a permit, so abandoned
/// axum handlers do not eat into the budget.
#[derive(Debug, Clone)]
pub struct RateLimitedClient {
    client: Client,
    permits: Arc<Semaphore>,
    window: Duration,
}

impl RateLimitedClient {
    pub fn new(client: Client, limit: usize, window: Duration) -> Self {
        Self {
            client,
            permits: Arc::new(Semaphore::new(limit.max(1))),
            window,
        }
    }

    /// GET the url and parse the json body.
    ///
    /// Provider answers map onto the crate's error kinds: 404 stays a lookup
    /// miss (TMDB answers it for unknown ids, that is not a failure), auth
    /// rejections and throttling surface as upstream failures.
    pub async fn get_json<T>(&self, url: Url) -> Result<T, AppError>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(Request::new(Method::GET, url)).await?;
        let url = response.url().clone();
        tracing::trace!(status = response.status().as_u16(), %url, "Provider response");
        match response.status() {
            status if status.is_success() => response.json().await.map_err(|e| {
                tracing::error!("Undeserializable body from {url}: {e}");
                AppError::internal_error("failed to deserialize provider response")
            }),
            StatusCode::NOT_FOUND => Err(AppError::not_found("Provider responded with 404")),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::error!("Provider rejected our credentials at {url}");
                Err(AppError::bad_gateway("provider rejected credentials"))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!("Throttled by provider at {url}");
                Err(AppError::bad_gateway("throttled by provider"))
            }
            status => Err(AppError::bad_gateway(format!(
                "provider responded with status {status}"
            ))),
        }
    }

    async fn execute(&self, request: Request) -> Result<Response, AppError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");
        let url = request.url().to_string();
        tracing::trace!("Sending request: {url}");
        let result = self.client.execute(request).await;
        // The permit stays taken for the rest of the window, this is what
        // spreads a burst of lookups over time
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            drop(permit);
        });
        result.map_err(|e| {
            tracing::warn!("Request to {url} failed: {e}");
            AppError::bad_gateway(format!("request failed: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppErrorKind;
    use axum::routing::get;
    use axum::{Json, Router};

    async fn serve(app: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    #[tokio::test]
    async fn parses_json_bodies() {
        let app = Router::new().route("/", get(|| async { Json(vec![1, 2, 3]) }));
        let base = serve(app).await;
        let client = RateLimitedClient::new(Client::new(), 4, Duration::from_secs(1));
        let body: Vec<i32> = client.get_json(base).await.unwrap();
        assert_eq!(body, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn not_found_is_a_lookup_miss() {
        let app = Router::new().route(
            "/",
            get(|| async { axum::http::StatusCode::NOT_FOUND }),
        );
        let base = serve(app).await;
        let client = RateLimitedClient::new(Client::new(), 4, Duration::from_secs(1));
        let error = client.get_json::<serde_json::Value>(base).await.unwrap_err();
        assert_eq!(error.kind, AppErrorKind::NotFound);
    }

    #[tokio::test]
    async fn auth_rejection_is_an_upstream_failure() {
        let app = Router::new().route(
            "/",
            get(|| async { axum::http::StatusCode::UNAUTHORIZED }),
        );
        let base = serve(app).await;
        let client = RateLimitedClient::new(Client::new(), 4, Duration::from_secs(1));
        let error = client.get_json::<serde_json::Value>(base).await.unwrap_err();
        assert_eq!(error.kind, AppErrorKind::BadGateway);
    }

    #[tokio::test]
    async fn bursts_are_spread_over_rate_windows() {
        let app = Router::new().route("/", get(|| async { Json(1) }));
        let base = serve(app).await;
        let client = RateLimitedClient::new(Client::new(), 2, Duration::from_millis(100));
        let started = tokio::time::Instant::now();
        let mut requests = tokio::task::JoinSet::new();
        for _ in 0..6 {
            let client = client.clone();
            let url = base.clone();
            requests.spawn(async move { client.get_json::<i32>(url).await });
        }
        while let Some(result) = requests.join_next().await {
            assert!(result.unwrap().is_ok());
        }
        // 6 requests at 2 per 100ms need at least two extra windows
        assert!(started.elapsed() >= Duration::from_millis(150));
    }
}
