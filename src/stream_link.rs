use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cache::{self, CacheBackend};

/// Embed link behind an opaque play id. Read back by the proxy play endpoint
/// which resolves it freshly on every hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedStreamLink {
    pub stream_id: String,
    pub embed_url: String,
    pub title: String,
    pub hoster: String,
}

/// Stable hash of the embed url, truncated. Saving the same link twice
/// yields the same id.
pub fn opaque_id(embed_url: &str) -> String {
    let digest = Sha256::digest(embed_url.as_bytes());
    let hex = format!("{digest:x}");
    hex[..16].to_string()
}

#[derive(Debug)]
pub struct StreamLinkCache {
    cache: &'static (dyn CacheBackend + 'static),
    ttl: Duration,
}

impl StreamLinkCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(12 * 60 * 60);

    pub fn new(cache: &'static dyn CacheBackend, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(stream_id: &str) -> String {
        format!("stream_link:{stream_id}")
    }

    /// Store the link and hand back its opaque id. Idempotent.
    pub async fn save(&self, embed_url: &str, title: &str, hoster: &str) -> String {
        let stream_id = opaque_id(embed_url);
        let link = CachedStreamLink {
            stream_id: stream_id.clone(),
            embed_url: embed_url.to_string(),
            title: title.to_string(),
            hoster: hoster.to_string(),
        };
        cache::set_json(self.cache, &Self::key(&stream_id), &link, self.ttl).await;
        stream_id
    }

    pub async fn get(&self, stream_id: &str) -> Option<CachedStreamLink> {
        cache::get_json(self.cache, &Self::key(stream_id)).await
    }
}
