use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::RankedStream;

/// HEAD-sweeps the top streams of a response and drops the dead ones.
/// Gated behind `probe_at_stream_time`, most deployments answer faster
/// without it.
#[derive(Debug)]
pub struct LivenessProbe {
    client: Client,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    max_count: usize,
}

impl LivenessProbe {
    pub fn new(concurrency: usize, timeout: Duration, max_count: usize) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("probe client to build");
        Self {
            client,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            timeout,
            max_count,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check a single url. Some hosters reject HEAD with 405, those get one
    /// GET retry before counting as dead.
    pub async fn is_alive(&self, url: &str) -> bool {
        check(self.client.clone(), url.to_string()).await
    }

    /// Probe the first `max_count` streams concurrently, keep survivors and
    /// everything beyond the probe window, in the original order.
    pub async fn filter_alive(&self, streams: Vec<RankedStream>) -> Vec<RankedStream> {
        let probe_count = streams.len().min(self.max_count);
        if probe_count == 0 {
            return streams;
        }
        let mut alive = vec![true; streams.len()];
        let mut probes = JoinSet::new();
        for (index, stream) in streams.iter().take(probe_count).enumerate() {
            let url = stream.url.clone();
            let semaphore = self.semaphore.clone();
            let client = self.client.clone();
            probes.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("probe semaphore");
                (index, check(client, url).await)
            });
        }
        while let Some(result) = probes.join_next().await {
            match result {
                Ok((index, ok)) => alive[index] = ok,
                Err(e) => tracing::error!("Probe task panicked: {e}"),
            }
        }
        let dropped = alive.iter().filter(|ok| !**ok).count();
        if dropped > 0 {
            tracing::debug!(dropped, probed = probe_count, "Probe removed dead streams");
        }
        streams
            .into_iter()
            .zip(alive)
            .filter_map(|(stream, ok)| ok.then_some(stream))
            .collect()
    }
}

async fn check(client: Client, url: String) -> bool {
    let head = client.request(Method::HEAD, &url).send().await;
    match head {
        Ok(response) if response.status() != StatusCode::METHOD_NOT_ALLOWED => {
            response.status().is_success()
        }
        Ok(_) => match client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        },
        Err(e) => {
            tracing::debug!("Probe failed for {url}: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, head};
    use axum::Router;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn dead_streams_are_dropped_in_order() {
        let app = Router::new()
            .route("/alive", head(|| async { "" }))
            .route("/dead", head(|| async { axum::http::StatusCode::NOT_FOUND }));
        let base = serve(app).await;
        let probe = LivenessProbe::new(4, Duration::from_secs(2), 10);
        let streams = vec![
            RankedStream::new(format!("{base}/alive"), "voe"),
            RankedStream::new(format!("{base}/dead"), "filemoon"),
            RankedStream::new(format!("{base}/alive"), "streamtape"),
        ];
        let alive = probe.filter_alive(streams).await;
        let hosters: Vec<_> = alive.iter().map(|s| s.hoster.as_str()).collect();
        assert_eq!(hosters, vec!["voe", "streamtape"]);
    }

    #[tokio::test]
    async fn head_405_falls_back_to_get() {
        let app = Router::new().route(
            "/video",
            get(|| async { "ok" }).head(|| async { axum::http::StatusCode::METHOD_NOT_ALLOWED }),
        );
        let base = serve(app).await;
        let probe = LivenessProbe::new(4, Duration::from_secs(2), 10);
        assert!(probe.is_alive(&format!("{base}/video")).await);
    }

    #[tokio::test]
    async fn streams_beyond_probe_window_pass_unprobed() {
        let app = Router::new()
            .route("/dead", head(|| async { axum::http::StatusCode::NOT_FOUND }));
        let base = serve(app).await;
        let probe = LivenessProbe::new(4, Duration::from_secs(2), 1);
        let streams = vec![
            RankedStream::new(format!("{base}/dead"), "voe"),
            RankedStream::new(format!("{base}/dead"), "filemoon"),
        ];
        let alive = probe.filter_alive(streams).await;
        // Only the first stream is probed, the second passes untouched
        assert_eq!(alive.len(), 1);
        assert_eq!(alive[0].hoster, "filemoon");
    }
}
