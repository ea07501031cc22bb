use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app_state::AppError;
use crate::concurrency::AdapterKind;

pub mod hdfilme;
pub mod serienfans;

/// Torznab category taxonomy. Sites report wildly different things, so only
/// the integer ranges carry meaning.
pub mod categories {
    use crate::metadata::ContentKind;

    pub const MOVIES: u32 = 2000;
    pub const MOVIES_HD: u32 = 2040;
    pub const TV: u32 = 5000;
    pub const TV_HD: u32 = 5040;
    pub const TV_ANIME: u32 = 5070;
    pub const TV_DOCUMENTARY: u32 = 5080;

    pub fn is_movie(category: u32) -> bool {
        (2000..3000).contains(&category)
    }

    pub fn is_tv(category: u32) -> bool {
        (5000..5100).contains(&category)
    }

    pub fn for_kind(kind: ContentKind) -> u32 {
        match kind {
            ContentKind::Movie => MOVIES,
            ContentKind::Series => TV,
        }
    }

    pub fn matches_kind(category: u32, kind: ContentKind) -> bool {
        match kind {
            ContentKind::Movie => is_movie(category),
            ContentKind::Series => is_tv(category),
        }
    }
}

/// What a site offers: watchable hoster embeds, ddl downloads, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provides {
    Stream,
    Download,
    Both,
}

impl Provides {
    pub fn streams(&self) -> bool {
        matches!(self, Provides::Stream | Provides::Both)
    }

    pub fn downloads(&self) -> bool {
        matches!(self, Provides::Download | Provides::Both)
    }
}

/// One hoster link inside a search result. `label` is whatever the site
/// renders next to the link and may carry episode hints like `1x5`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HosterLink {
    pub hoster: String,
    pub url: String,
    pub label: Option<String>,
    pub language: Option<String>,
    pub quality: Option<String>,
    pub size: Option<String>,
}

impl HosterLink {
    pub fn new(hoster: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            hoster: hoster.into(),
            url: url.into(),
            label: None,
            language: None,
            quality: None,
            size: None,
        }
    }
}

/// Scraped search hit, as close to what the site said as possible. Everything
/// downstream of the invoker works on this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSearchResult {
    pub title: String,
    pub category: u32,
    pub primary_link: String,
    pub links: Vec<HosterLink>,
    pub size: Option<String>,
    pub release_name: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RawSearchResult {
    /// Usable results carry at least one link.
    pub fn is_usable(&self) -> bool {
        !self.title.is_empty() && !self.links.is_empty()
    }
}

/// One scraped site. Implementations hold their own HTTP client and are
/// registered once at startup.
#[async_trait::async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Unique lowercase adapter name
    fn name(&self) -> &'static str;

    fn provides(&self) -> Provides;

    /// Cost class, decides which governor pool the invoker draws from
    fn kind(&self) -> AdapterKind;

    /// Language assumed for links that do not label one
    fn default_language(&self) -> &str {
        "de"
    }

    /// Overrides the global search result cache ttl
    fn cache_ttl(&self) -> Option<Duration> {
        None
    }

    async fn search(
        &self,
        query: &str,
        category: Option<u32>,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Vec<RawSearchResult>, AppError>;

    /// Resource release on shutdown
    async fn cleanup(&self) {}
}

/// Startup-time adapter registry keyed by adapter name.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters_stack: Mutex<Vec<&'static (dyn SiteAdapter + Send + Sync)>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.all().into_iter().map(|a| a.name()).collect();
        f.debug_struct("AdapterRegistry")
            .field("adapters", &names)
            .finish()
    }
}

impl AdapterRegistry {
    pub fn add_adapter(&self, adapter: &'static (dyn SiteAdapter + Send + Sync)) {
        let mut adapters = self.adapters_stack.lock().unwrap();
        if adapters.iter().any(|a| a.name() == adapter.name()) {
            tracing::warn!("Ignoring duplicate adapter registration: {}", adapter.name());
            return;
        }
        adapters.push(adapter);
    }

    pub fn all(&self) -> Vec<&'static (dyn SiteAdapter + Send + Sync)> {
        self.adapters_stack.lock().unwrap().clone()
    }

    pub fn get(&self, name: &str) -> Option<&'static (dyn SiteAdapter + Send + Sync)> {
        self.adapters_stack
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.name() == name)
            .copied()
    }

    /// Adapters that contribute watchable streams
    pub fn stream_providers(&self) -> Vec<&'static (dyn SiteAdapter + Send + Sync)> {
        self.adapters_stack
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.provides().streams())
            .copied()
            .collect()
    }

    pub async fn cleanup_all(&self) {
        for adapter in self.all() {
            adapter.cleanup().await;
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Scripted adapter for pipeline tests.
    pub struct FakeAdapter {
        pub name: &'static str,
        pub kind: AdapterKind,
        pub provides: Provides,
        pub results: Vec<RawSearchResult>,
        pub fail: bool,
        pub delay: Option<Duration>,
        pub calls: std::sync::atomic::AtomicUsize,
    }

    impl FakeAdapter {
        pub fn new(name: &'static str, results: Vec<RawSearchResult>) -> Self {
            Self {
                name,
                kind: AdapterKind::Cheap,
                provides: Provides::Stream,
                results,
                fail: false,
                delay: None,
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        pub fn failing(name: &'static str) -> Self {
            let mut adapter = Self::new(name, Vec::new());
            adapter.fail = true;
            adapter
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl SiteAdapter for FakeAdapter {
        fn name(&self) -> &'static str {
            self.name
        }

        fn provides(&self) -> Provides {
            self.provides
        }

        fn kind(&self) -> AdapterKind {
            self.kind
        }

        async fn search(
            &self,
            _query: &str,
            _category: Option<u32>,
            _season: Option<u32>,
            _episode: Option<u32>,
        ) -> Result<Vec<RawSearchResult>, AppError> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(AppError::bad_gateway("scripted failure"));
            }
            Ok(self.results.clone())
        }
    }

    pub fn movie_result(title: &str, hoster: &str, url: &str) -> RawSearchResult {
        RawSearchResult {
            title: title.to_string(),
            category: categories::MOVIES,
            primary_link: url.to_string(),
            links: vec![HosterLink::new(hoster, url)],
            size: None,
            release_name: None,
            metadata: HashMap::new(),
        }
    }
}
