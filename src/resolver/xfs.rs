use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;

use super::{HosterResolver, ResolvedStream};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Source declarations XFS-family players embed in their setup script.
static FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:file|src)\s*:\s*["'](https?://[^"']+)["']"#).expect("static regex")
});
static SOURCE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<source[^>]+src=["'](https?://[^"']+)["']"#).expect("static regex")
});

/// Generic resolver for the XFS template family (VOE clones, filemoon
/// lookalikes, assorted one-off hosters). Fetches the embed page and lifts
/// the player source out of the markup. Obfuscated players yield nothing,
/// which drops the stream downstream.
#[derive(Debug)]
pub struct XfsResolver {
    client: Client,
    user_agent: String,
}

impl XfsResolver {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("resolver client to build");
        Self {
            client,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    fn extract_source(page: &str) -> Option<String> {
        FILE_RE
            .captures(page)
            .or_else(|| SOURCE_TAG_RE.captures(page))
            .map(|caps| caps[1].to_string())
    }

    fn referer_of(embed_url: &str) -> Option<String> {
        let url = reqwest::Url::parse(embed_url).ok()?;
        let origin = url.origin().ascii_serialization();
        Some(format!("{origin}/"))
    }
}

impl Default for XfsResolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait::async_trait]
impl HosterResolver for XfsResolver {
    fn hosters(&self) -> &[&'static str] {
        &[]
    }

    async fn resolve(&self, embed_url: &str) -> anyhow::Result<Option<ResolvedStream>> {
        let page = self
            .client
            .get(embed_url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let Some(video_url) = Self::extract_source(&page) else {
            tracing::debug!("No player source found in {embed_url}");
            return Ok(None);
        };
        let mut headers = std::collections::HashMap::new();
        headers.insert("User-Agent".to_string(), self.user_agent.clone());
        if let Some(referer) = Self::referer_of(embed_url) {
            headers.insert("Referer".to_string(), referer);
        }
        let is_hls = video_url.contains(".m3u8");
        Ok(Some(ResolvedStream {
            video_url,
            headers,
            is_hls,
        }))
    }
}
