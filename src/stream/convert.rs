use std::sync::LazyLock;

use regex::Regex;

use crate::adapters::{HosterLink, RawSearchResult};

use super::{RankedStream, StreamLanguage, StreamQuality};

static QUALITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(2160p|4k|uhd|1080p|720p|576p|480p|360p|sd|dvdrip)\b").expect("static regex")
});
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([\d]+(?:[.,]\d+)?)\s*(kb|mb|gb|tb|kib|mib|gib|tib)").expect("static regex")
});

/// Suffixes sites love to keep in hoster labels ("VOE.sx", "streamtape.com").
const HOSTER_SUFFIXES: &[&str] = &[
    ".com", ".net", ".org", ".to", ".sx", ".cc", ".tv", ".co", ".io", ".me",
];

/// Spelling variants of the same hoster across sites.
fn hoster_alias(name: &str) -> &str {
    match name {
        "stape" | "streamtape2" => "streamtape",
        "fmoon" | "moonf" => "filemoon",
        "dood" | "doodstream" => "dood",
        "vidoza" | "videzz" => "vidoza",
        other => other,
    }
}

/// Canonical lowercase hoster name used for scoring and deduplication.
pub fn normalize_hoster(raw: &str) -> String {
    let mut name = raw.trim().to_lowercase();
    // "VOE HD+" style labels, the first word is the hoster
    if let Some(first) = name.split_whitespace().next() {
        name = first.to_string();
    }
    for suffix in HOSTER_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.to_string();
            break;
        }
    }
    hoster_alias(&name).to_string()
}

/// Quality from the explicit field when the site reports one, otherwise
/// sniffed out of title and release name.
pub fn parse_quality(explicit: Option<&str>, texts: &[&str]) -> StreamQuality {
    let from_text = |text: &str| {
        let m = QUALITY_RE.find(text)?;
        Some(match m.as_str().to_lowercase().as_str() {
            "2160p" | "4k" | "uhd" => StreamQuality::Uhd4k,
            "1080p" => StreamQuality::Hd1080p,
            "720p" => StreamQuality::Hd720p,
            _ => StreamQuality::Sd,
        })
    };
    if let Some(quality) = explicit.and_then(from_text) {
        return quality;
    }
    texts
        .iter()
        .find_map(|text| from_text(text))
        .unwrap_or(StreamQuality::Unknown)
}

/// `"1.5 GB"` → bytes. Decimal comma accepted, sites are German.
pub fn parse_size_bytes(size: &str) -> Option<u64> {
    let caps = SIZE_RE.captures(size)?;
    let number: f64 = caps
        .get(1)?
        .as_str()
        .replace(',', ".")
        .parse()
        .ok()?;
    let unit = caps.get(2)?.as_str().to_lowercase();
    let factor: u64 = match unit.as_str() {
        "kb" | "kib" => 1024,
        "mb" | "mib" => 1024 * 1024,
        "gb" | "gib" => 1024 * 1024 * 1024,
        "tb" | "tib" => 1024u64.pow(4),
        _ => return None,
    };
    Some((number * factor as f64) as u64)
}

/// Flatten `(result, link)` pairs into normalized stream candidates. Scores
/// are assigned afterwards by the sorter.
pub fn convert_search_results(results: &[RawSearchResult]) -> Vec<RankedStream> {
    let mut streams = Vec::new();
    for result in results {
        for link in &result.links {
            streams.push(convert_link(result, link));
        }
    }
    streams
}

fn convert_link(result: &RawSearchResult, link: &HosterLink) -> RankedStream {
    let quality = parse_quality(
        link.quality.as_deref(),
        &[
            result.release_name.as_deref().unwrap_or_default(),
            &result.title,
        ],
    );
    let language = link
        .language
        .as_deref()
        .or_else(|| result.metadata.get("default_language").map(String::as_str))
        .map(StreamLanguage::from_code);
    let size = link.size.clone().or_else(|| result.size.clone());
    let size_bytes = size.as_deref().and_then(parse_size_bytes);
    RankedStream {
        url: link.url.clone(),
        hoster: normalize_hoster(&link.hoster),
        quality,
        language,
        size,
        size_bytes,
        title: Some(result.title.clone()),
        release_name: result.release_name.clone(),
        source_adapter: result.metadata.get("source_adapter").cloned(),
        score: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::categories;

    #[test]
    fn hoster_names_normalize() {
        assert_eq!(normalize_hoster("VOE.sx"), "voe");
        assert_eq!(normalize_hoster("Streamtape.com"), "streamtape");
        assert_eq!(normalize_hoster("VOE HD+"), "voe");
        assert_eq!(normalize_hoster("stape"), "streamtape");
        assert_eq!(normalize_hoster("Filemoon"), "filemoon");
        assert_eq!(normalize_hoster(""), "");
    }

    #[test]
    fn quality_prefers_explicit_field() {
        assert_eq!(
            parse_quality(Some("720p"), &["Some.Movie.1080p.WEB-DL"]),
            StreamQuality::Hd720p
        );
    }

    #[test]
    fn quality_sniffed_from_release_name() {
        assert_eq!(
            parse_quality(None, &["Iron.Man.2008.2160p.REMUX", "Iron Man"]),
            StreamQuality::Uhd4k
        );
        assert_eq!(
            parse_quality(None, &["Iron.Man.2008.German.DVDRip"]),
            StreamQuality::Sd
        );
        assert_eq!(parse_quality(None, &["Iron Man"]), StreamQuality::Unknown);
    }

    #[test]
    fn sizes_parse_to_bytes() {
        assert_eq!(parse_size_bytes("1.5 GB"), Some(1_610_612_736));
        assert_eq!(parse_size_bytes("700 MB"), Some(734_003_200));
        assert_eq!(parse_size_bytes("1,2 GB"), Some(1_288_490_188));
        assert_eq!(parse_size_bytes("no size"), None);
    }

    #[test]
    fn link_language_beats_adapter_default() {
        let mut link = HosterLink::new("VOE", "https://voe.sx/e/a");
        link.language = Some("en".to_string());
        let mut result = RawSearchResult {
            title: "Iron Man".to_string(),
            category: categories::MOVIES,
            primary_link: link.url.clone(),
            links: vec![link],
            size: None,
            release_name: None,
            metadata: Default::default(),
        };
        result
            .metadata
            .insert("default_language".to_string(), "de".to_string());
        let streams = convert_search_results(&[result]);
        assert_eq!(streams[0].language.as_ref().unwrap().code, "en");
    }

    #[test]
    fn adapter_default_fills_missing_language() {
        let link = HosterLink::new("VOE", "https://voe.sx/e/a");
        let mut result = RawSearchResult {
            title: "Iron Man".to_string(),
            category: categories::MOVIES,
            primary_link: link.url.clone(),
            links: vec![link],
            size: None,
            release_name: None,
            metadata: Default::default(),
        };
        result
            .metadata
            .insert("default_language".to_string(), "de".to_string());
        let streams = convert_search_results(&[result]);
        let language = streams[0].language.as_ref().unwrap();
        assert_eq!(language.code, "de");
        assert!(language.is_dubbed);
    }

    #[test]
    fn every_link_becomes_a_stream() {
        let result = RawSearchResult {
            title: "Iron Man".to_string(),
            category: categories::MOVIES,
            primary_link: "https://voe.sx/e/a".to_string(),
            links: vec![
                HosterLink::new("VOE", "https://voe.sx/e/a"),
                HosterLink::new("Filemoon", "https://fm.sx/e/b"),
            ],
            size: Some("1.5 GB".to_string()),
            release_name: Some("Iron.Man.2008.1080p.WEB-DL".to_string()),
            metadata: Default::default(),
        };
        let streams = convert_search_results(&[result]);
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].quality, StreamQuality::Hd1080p);
        assert_eq!(streams[0].size_bytes, Some(1_610_612_736));
        assert_eq!(streams[1].hoster, "filemoon");
    }
}
