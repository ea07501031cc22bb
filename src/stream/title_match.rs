use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::adapters::RawSearchResult;
use crate::config;
use crate::metadata::{ContentKind, ReferenceTitle};

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("static regex"));
static RESOLUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3,4}[pi]$").expect("static regex"));

/// Release junk that must not count against title similarity.
const NOISE_TOKENS: &[&str] = &[
    "german", "english", "multi", "ml", "dl", "dubbed", "subbed", "complete", "web", "webrip",
    "web-dl", "webdl", "bluray", "blu-ray", "bdrip", "brrip", "hdtv", "hdrip", "dvdrip", "x264",
    "x265", "h264", "h265", "hevc", "avc", "aac", "ac3", "dts", "uhd", "hdr", "remux", "proper",
    "repack", "internal", "uncut", "extended",
];

#[derive(Debug, Clone, Copy)]
pub struct TitleMatchConfig {
    pub threshold: f64,
    pub year_bonus: f64,
    pub year_penalty: f64,
    pub sequel_penalty: f64,
    pub year_tolerance_movie: i32,
    pub year_tolerance_series: i32,
}

impl TitleMatchConfig {
    pub fn from_config() -> Self {
        Self {
            threshold: config::CONFIG.get_value::<config::TitleMatchThreshold>().0,
            year_bonus: config::CONFIG.get_value::<config::TitleYearBonus>().0,
            year_penalty: config::CONFIG.get_value::<config::TitleYearPenalty>().0,
            sequel_penalty: config::CONFIG.get_value::<config::TitleSequelPenalty>().0,
            year_tolerance_movie: config::CONFIG
                .get_value::<config::TitleYearToleranceMovie>()
                .0,
            year_tolerance_series: config::CONFIG
                .get_value::<config::TitleYearToleranceSeries>()
                .0,
        }
    }
}

impl Default for TitleMatchConfig {
    fn default() -> Self {
        Self {
            threshold: config::TitleMatchThreshold::default().0,
            year_bonus: config::TitleYearBonus::default().0,
            year_penalty: config::TitleYearPenalty::default().0,
            sequel_penalty: config::TitleSequelPenalty::default().0,
            year_tolerance_movie: config::TitleYearToleranceMovie::default().0,
            year_tolerance_series: config::TitleYearToleranceSeries::default().0,
        }
    }
}

fn tokenize(title: &str) -> Vec<String> {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Candidate tokens with years, resolutions and release junk removed, so a
/// scraped "Iron.Man.2008.German.DL.1080p" compares as just "iron man".
fn candidate_tokens(title: &str) -> Vec<String> {
    tokenize(title)
        .into_iter()
        .filter(|t| !YEAR.is_match(t) && !RESOLUTION.is_match(t) && !NOISE_TOKENS.contains(&t.as_str()))
        .collect()
}

/// Token set ratio in [0, 1]. Order insensitive and monotonic in overlap.
fn token_set_similarity(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<_> = a.iter().collect();
    let b: HashSet<_> = b.iter().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    intersection as f64 / union as f64
}

fn is_numeral(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
        || matches!(
            token,
            "i" | "ii" | "iii" | "iv" | "v" | "vi" | "vii" | "viii" | "ix" | "x"
        )
}

/// `Iron Man 2` is a sequel of `Iron Man`: the reference extended by exactly
/// one trailing numeral the reference itself does not carry.
fn is_other_installment(candidate: &[String], reference: &[String]) -> bool {
    if reference.is_empty() || candidate.len() != reference.len() + 1 {
        return false;
    }
    let last = candidate.last().expect("candidate is longer than reference");
    candidate[..reference.len()] == *reference
        && is_numeral(last)
        && !reference.last().is_some_and(|t| is_numeral(t))
}

fn extract_year(result: &RawSearchResult) -> Option<i32> {
    let from = |text: &str| {
        YEAR.find(text)
            .and_then(|m| m.as_str().parse::<i32>().ok())
    };
    from(&result.title).or_else(|| result.release_name.as_deref().and_then(from))
}

/// Similarity score for one candidate against the reference title.
pub fn match_score(
    result: &RawSearchResult,
    reference: &ReferenceTitle,
    config: &TitleMatchConfig,
) -> f64 {
    let reference_tokens = tokenize(&reference.title);
    let tokens = candidate_tokens(&result.title);
    let mut score = token_set_similarity(&tokens, &reference_tokens);

    if let (Some(candidate_year), Some(reference_year)) = (extract_year(result), reference.year) {
        let tolerance = match reference.kind {
            ContentKind::Movie => config.year_tolerance_movie,
            ContentKind::Series => config.year_tolerance_series,
        };
        if (candidate_year - reference_year).abs() <= tolerance {
            score += config.year_bonus;
        } else {
            score -= config.year_penalty;
        }
    }

    if is_other_installment(&tokens, &reference_tokens) {
        score -= config.sequel_penalty;
    }

    score
}

/// Drop results that are not similar enough to the reference title.
/// Aggregator sites return loosely related hits for short queries, this is
/// the stage that keeps them out.
pub fn filter_by_title_match(
    results: Vec<RawSearchResult>,
    reference: &ReferenceTitle,
    config: &TitleMatchConfig,
) -> Vec<RawSearchResult> {
    results
        .into_iter()
        .filter(|result| {
            let score = match_score(result, reference, config);
            let keep = score >= config.threshold;
            if !keep {
                tracing::debug!(
                    score,
                    title = %result.title,
                    reference = %reference.title,
                    "Dropping result below title match threshold"
                );
            }
            keep
        })
        .collect()
}
