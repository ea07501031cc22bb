use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub mod xfs;

/// What a hoster resolver extracted from an embed page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStream {
    pub video_url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub is_hls: bool,
}

/// Turns a hoster embed url into a directly playable video url.
#[async_trait::async_trait]
pub trait HosterResolver: Send + Sync {
    /// Normalized hoster names this resolver handles
    fn hosters(&self) -> &[&'static str];

    /// `Ok(None)` means the resolver understood the page but found nothing
    /// playable. Errors are treated the same way by the pipeline.
    async fn resolve(&self, embed_url: &str) -> anyhow::Result<Option<ResolvedStream>>;
}

/// Hoster name → resolver lookup.
#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<&'static str, &'static (dyn HosterResolver + Send + Sync)>,
    fallback: Option<&'static (dyn HosterResolver + Send + Sync)>,
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hosters: Vec<_> = self.resolvers.keys().collect();
        f.debug_struct("ResolverRegistry")
            .field("hosters", &hosters)
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

impl ResolverRegistry {
    pub fn add_resolver(&mut self, resolver: &'static (dyn HosterResolver + Send + Sync)) {
        for hoster in resolver.hosters() {
            if self.resolvers.insert(*hoster, resolver).is_some() {
                tracing::warn!("Replacing resolver registered for {hoster}");
            }
        }
    }

    /// Resolver tried for hosters without a dedicated entry.
    pub fn set_fallback(&mut self, resolver: &'static (dyn HosterResolver + Send + Sync)) {
        self.fallback = Some(resolver);
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty() && self.fallback.is_none()
    }

    pub async fn resolve(&self, hoster: &str, embed_url: &str) -> Option<ResolvedStream> {
        let resolver = self.resolvers.get(hoster).copied().or(self.fallback)?;
        match resolver.resolve(embed_url).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!("Resolver for {hoster} failed on {embed_url}: {e}");
                None
            }
        }
    }
}

const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".m3u8", ".mkv", ".ts", ".webm"];

fn path_has_video_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.to_lowercase();
    VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// The echo rule. XFS-family resolvers sometimes just validate the embed page
/// and hand the embed url back; a client pointed at that would buffer
/// forever. A resolved stream is playable iff it is declared hls, or the url
/// itself looks like video, or the resolver extracted a different url along
/// with the headers needed to fetch it.
pub fn is_direct_video_url(resolved: &ResolvedStream, embed_url: &str) -> bool {
    if resolved.is_hls {
        return true;
    }
    if path_has_video_extension(&resolved.video_url) {
        return true;
    }
    resolved.video_url != embed_url && !resolved.headers.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(video_url: &str) -> ResolvedStream {
        ResolvedStream {
            video_url: video_url.to_string(),
            headers: HashMap::new(),
            is_hls: false,
        }
    }

    fn with_referer(video_url: &str, referer: &str) -> ResolvedStream {
        let mut stream = resolved(video_url);
        stream
            .headers
            .insert("Referer".to_string(), referer.to_string());
        stream
    }

    #[test]
    fn hls_manifest_is_playable() {
        let mut stream = with_referer("https://cdn.voe.sx/hls/master.m3u8", "https://voe.sx/e/abc");
        stream.is_hls = true;
        assert!(is_direct_video_url(&stream, "https://voe.sx/e/abc"));
    }

    #[test]
    fn video_extensions_are_playable() {
        for url in [
            "https://cdn.example.com/video.mp4",
            "https://cdn.example.com/video.mkv",
            "https://cdn.example.com/clip.webm",
            "https://cdn.example.com/segment.ts",
        ] {
            assert!(is_direct_video_url(&resolved(url), "https://voe.sx/e/abc"));
        }
    }

    #[test]
    fn extension_check_ignores_query() {
        let stream = resolved("https://cdn.example.com/master.m3u8?token=abc");
        assert!(is_direct_video_url(&stream, "https://voe.sx/e/abc"));
    }

    #[test]
    fn echoed_embed_url_is_rejected() {
        let embed = "https://veev.to/e/2EwYsJS8frxAbWIzEhmWIJlqeGylzY9u";
        assert!(!is_direct_video_url(&resolved(embed), embed));
        let html_embed = "https://vidmoly.to/embed-bvhzy03fsrcx.html";
        assert!(!is_direct_video_url(&resolved(html_embed), html_embed));
        let ddl_page = "https://dropload.tv/n2sostug0kwa";
        assert!(!is_direct_video_url(&resolved(ddl_page), ddl_page));
    }

    #[test]
    fn changed_url_with_headers_is_playable() {
        let stream = with_referer("https://cdn.voe.sx/redirect/abc123", "https://voe.sx/e/abc");
        assert!(is_direct_video_url(&stream, "https://voe.sx/e/abc"));
        let streamtape = with_referer(
            "https://streamtape.com/get_video?id=abc&stream=1",
            "https://streamtape.com/",
        );
        assert!(is_direct_video_url(
            &streamtape,
            "https://streamtape.com/e/abc"
        ));
    }

    #[test]
    fn changed_url_without_headers_is_ambiguous() {
        let stream = resolved("https://ddownload.com/abc123");
        assert!(!is_direct_video_url(
            &stream,
            "https://ddownload.com/abc123/file"
        ));
    }

    #[test]
    fn hls_flag_wins_without_extension() {
        let mut stream = resolved("https://weird-url.com/no-extension");
        stream.is_hls = true;
        assert!(is_direct_video_url(&stream, "https://embed.com/e/abc"));
    }

    struct StaticResolver(Option<ResolvedStream>);

    #[async_trait::async_trait]
    impl HosterResolver for StaticResolver {
        fn hosters(&self) -> &[&'static str] {
            &["voe"]
        }

        async fn resolve(&self, _embed_url: &str) -> anyhow::Result<Option<ResolvedStream>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn registry_routes_by_hoster() {
        let mut registry = ResolverRegistry::default();
        let resolver = Box::leak(Box::new(StaticResolver(Some(resolved(
            "https://cdn.voe.sx/video.mp4",
        )))));
        registry.add_resolver(resolver);
        assert!(registry.resolve("voe", "https://voe.sx/e/abc").await.is_some());
        assert!(registry
            .resolve("filemoon", "https://fm.sx/e/abc")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn fallback_covers_unknown_hosters() {
        let mut registry = ResolverRegistry::default();
        let fallback = Box::leak(Box::new(StaticResolver(Some(resolved(
            "https://cdn.example.com/video.mp4",
        )))));
        registry.set_fallback(fallback);
        assert!(registry
            .resolve("filemoon", "https://fm.sx/e/abc")
            .await
            .is_some());
    }
}
