use std::collections::HashMap;
use std::collections::HashSet;

use crate::config;

use super::RankedStream;

/// Reported sizes in this band look like a real movie/episode encode. Far
/// smaller is a sample or a fake, far bigger rarely streams well.
const SIZE_BAND_MIN: u64 = 700 * 1024 * 1024;
const SIZE_BAND_MAX: u64 = 6 * 1024 * 1024 * 1024;

/// Scoring tables, snapshotted from config once per request so the ordering
/// is a pure function of inputs.
#[derive(Debug, Clone)]
pub struct ScoreTables {
    pub language_scores: HashMap<String, i64>,
    pub default_language_score: i64,
    pub quality_multiplier: i64,
    pub hoster_scores: HashMap<String, i64>,
    pub size_bonus: i64,
}

impl ScoreTables {
    pub fn from_config() -> Self {
        Self {
            language_scores: config::CONFIG.get_value::<config::LanguageScores>().0,
            default_language_score: config::CONFIG
                .get_value::<config::DefaultLanguageScore>()
                .0,
            quality_multiplier: config::CONFIG.get_value::<config::QualityMultiplier>().0,
            hoster_scores: config::CONFIG.get_value::<config::HosterScores>().0,
            size_bonus: config::CONFIG.get_value::<config::SizeBonus>().0,
        }
    }
}

impl Default for ScoreTables {
    fn default() -> Self {
        Self {
            language_scores: config::LanguageScores::default().0,
            default_language_score: config::DefaultLanguageScore::default().0,
            quality_multiplier: config::QualityMultiplier::default().0,
            hoster_scores: config::HosterScores::default().0,
            size_bonus: config::SizeBonus::default().0,
        }
    }
}

impl ScoreTables {
    pub fn score(&self, stream: &RankedStream) -> i64 {
        let language_score = stream
            .language
            .as_ref()
            .map(|language| {
                self.language_scores
                    .get(&language.code)
                    .copied()
                    .unwrap_or(self.default_language_score)
            })
            .unwrap_or(self.default_language_score);
        let quality_score = stream.quality.ordinal() * self.quality_multiplier;
        let hoster_score = self.hoster_scores.get(&stream.hoster).copied().unwrap_or(0);
        let size_score = match stream.size_bytes {
            Some(bytes) if (SIZE_BAND_MIN..=SIZE_BAND_MAX).contains(&bytes) => self.size_bonus,
            _ => 0,
        };
        language_score + quality_score + hoster_score + size_score
    }
}

/// Score, order and deduplicate stream candidates.
///
/// Output order is deterministic: descending score, ties broken by hoster
/// name then url. At most one stream per hoster survives, except anonymous
/// mirrors with an empty hoster which are all kept.
pub fn sort_and_dedupe(mut streams: Vec<RankedStream>, tables: &ScoreTables) -> Vec<RankedStream> {
    for stream in &mut streams {
        stream.score = tables.score(stream);
    }
    streams.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.hoster.cmp(&b.hoster))
            .then_with(|| a.url.cmp(&b.url))
    });
    let mut seen_hosters = HashSet::new();
    streams.retain(|stream| {
        if stream.hoster.is_empty() {
            return true;
        }
        seen_hosters.insert(stream.hoster.clone())
    });
    streams
}
