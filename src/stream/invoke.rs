use std::time::Duration;

use crate::adapters::{RawSearchResult, SiteAdapter};
use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::concurrency::RequestBudget;

/// Run one adapter search under the request budget.
///
/// Failures never escape: timeouts, transport errors and panics all count
/// against the adapter's circuit and come back as an empty result list. An
/// adapter finding nothing is a success.
#[allow(clippy::too_many_arguments)]
pub async fn invoke_adapter(
    adapter: &'static (dyn SiteAdapter + Send + Sync),
    breakers: &CircuitBreakerRegistry,
    budget: &RequestBudget,
    query: &str,
    category: Option<u32>,
    season: Option<u32>,
    episode: Option<u32>,
    plugin_timeout: Duration,
    max_results: usize,
) -> Vec<RawSearchResult> {
    let name = adapter.name();
    if !breakers.allows(name) {
        tracing::debug!("Skipping {name}, circuit is open");
        return Vec::new();
    }
    let Ok(_slot) = budget.acquire_slot(adapter.kind()).await else {
        tracing::debug!("Request cancelled while waiting for a {} slot", adapter.kind());
        return Vec::new();
    };
    let timeout = plugin_timeout.min(budget.remaining());
    if timeout.is_zero() {
        // Deadline already spent, not the adapter's fault
        return Vec::new();
    }

    let owned_query = query.to_string();
    // Separate task so a panicking scraper cannot take the pipeline down
    let mut search = tokio::spawn(async move {
        adapter
            .search(&owned_query, category, season, episode)
            .await
    });

    let join_result = tokio::select! {
        _ = budget.cancellation.cancelled() => {
            search.abort();
            return Vec::new();
        }
        join_result = tokio::time::timeout(timeout, &mut search) => join_result,
    };

    match join_result {
        Ok(Ok(Ok(mut results))) => {
            breakers.record_success(name);
            results.retain(RawSearchResult::is_usable);
            if results.len() > max_results {
                tracing::debug!(
                    total = results.len(),
                    max_results,
                    "Truncating oversized result list from {name}"
                );
                results.truncate(max_results);
            }
            results
        }
        Ok(Ok(Err(e))) => {
            tracing::warn!("Adapter {name} failed: {e}");
            breakers.record_failure(name);
            Vec::new()
        }
        Ok(Err(join_error)) => {
            tracing::error!("Adapter {name} panicked: {join_error}");
            breakers.record_failure(name);
            Vec::new()
        }
        Err(_elapsed) => {
            tracing::warn!("Adapter {name} timed out after {timeout:?}");
            search.abort();
            breakers.record_failure(name);
            Vec::new()
        }
    }
}
