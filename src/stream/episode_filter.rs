use std::sync::LazyLock;

use regex::Regex;

use crate::adapters::{HosterLink, RawSearchResult};

static SXXEXX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,2})\s?e(\d{1,4})\b").expect("static regex"));
static SEASON_X_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bseason\s*(\d{1,2})\s*episode\s*(\d{1,4})\b").expect("static regex")
});
static NXM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^0-9])(\d{1,2})x(\d{1,4})(?:[^0-9]|$)").expect("static regex"));

/// Pull `(season, episode)` out of free text. Understands `S01E05`,
/// `season 1 episode 5` and the `1x5` shorthand sites label links with.
pub fn parse_episode(text: &str) -> Option<(u32, u32)> {
    for re in [&*SXXEXX, &*SEASON_X_EPISODE, &*NXM] {
        if let Some(caps) = re.captures(text) {
            let season = caps.get(1)?.as_str().parse().ok()?;
            let episode = caps.get(2)?.as_str().parse().ok()?;
            return Some((season, episode));
        }
    }
    None
}

fn matches_request(parsed: (u32, u32), season: Option<u32>, episode: Option<u32>) -> bool {
    // Season 0 and episode 0 are real values (specials, pilots), only None
    // means unconstrained
    season.is_none_or(|s| parsed.0 == s) && episode.is_none_or(|e| parsed.1 == e)
}

/// Narrow a result's links down to the requested episode.
///
/// Returns `None` when no link label carries episode info at all, links are
/// then plain mirrors and the caller keeps the result untouched. Otherwise
/// only the matching labeled links survive, which may be none.
pub fn filter_links_by_episode(
    links: &[HosterLink],
    season: Option<u32>,
    episode: Option<u32>,
) -> Option<Vec<HosterLink>> {
    let mut any_labeled = false;
    let mut matching = Vec::new();
    for link in links {
        let Some(parsed) = link.label.as_deref().and_then(parse_episode) else {
            continue;
        };
        any_labeled = true;
        if matches_request(parsed, season, episode) {
            matching.push(link.clone());
        }
    }
    any_labeled.then_some(matching)
}

/// Drop search results that clearly belong to another episode.
///
/// Sites title results in two shapes: one release per episode (episode in the
/// title) or one page per series with hundreds of labeled links. Both reduce
/// here. Results that carry no episode info anywhere pass through, benefit of
/// the doubt.
pub fn filter_by_episode(
    results: Vec<RawSearchResult>,
    season: Option<u32>,
    episode: Option<u32>,
) -> Vec<RawSearchResult> {
    if season.is_none() && episode.is_none() {
        return results;
    }
    let mut out = Vec::with_capacity(results.len());
    for mut result in results {
        let titled = parse_episode(&result.title)
            .or_else(|| result.release_name.as_deref().and_then(parse_episode));
        if let Some(parsed) = titled {
            if matches_request(parsed, season, episode) {
                out.push(result);
            }
            continue;
        }
        match filter_links_by_episode(&result.links, season, episode) {
            // No labels anywhere, keep as is
            None => out.push(result),
            Some(links) if links.is_empty() => {}
            Some(links) => {
                result.primary_link = links[0].url.clone();
                result.links = links;
                out.push(result);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::categories;

    fn result(title: &str) -> RawSearchResult {
        RawSearchResult {
            title: title.to_string(),
            category: categories::TV,
            primary_link: "https://voe.sx/e/abc".to_string(),
            links: vec![HosterLink::new("VOE", "https://voe.sx/e/abc")],
            size: None,
            release_name: None,
            metadata: Default::default(),
        }
    }

    fn labeled_link(hoster: &str, url: &str, label: &str) -> HosterLink {
        let mut link = HosterLink::new(hoster, url);
        link.label = Some(label.to_string());
        link
    }

    #[test]
    fn label_parsing_understands_both_shapes() {
        assert_eq!(parse_episode("1x5 Episode 5"), Some((1, 5)));
        assert_eq!(parse_episode("1x05 Episode 5"), Some((1, 5)));
        assert_eq!(parse_episode("21x1042"), Some((21, 1042)));
        assert_eq!(parse_episode("2X10 Title"), Some((2, 10)));
        assert_eq!(parse_episode("Season 3x12 - The Final"), Some((3, 12)));
        assert_eq!(parse_episode("S01E05 Episode 5"), Some((1, 5)));
        assert_eq!(parse_episode("S1E5"), Some((1, 5)));
        assert_eq!(parse_episode("s02e10 title"), Some((2, 10)));
        assert_eq!(parse_episode("S21E1042"), Some((21, 1042)));
        assert_eq!(parse_episode("Show S03E12 - The Final"), Some((3, 12)));
        assert_eq!(parse_episode("season 1 episode 5"), Some((1, 5)));
    }

    #[test]
    fn label_parsing_rejects_noise() {
        assert_eq!(parse_episode("Stream HD+"), None);
        assert_eq!(parse_episode(""), None);
        assert_eq!(parse_episode("streamtape"), None);
        assert_eq!(parse_episode("Movie 1080x720"), None);
    }

    #[test]
    fn unconstrained_request_returns_all() {
        let results = vec![result("Show S01E01"), result("Show S01E02")];
        assert_eq!(filter_by_episode(results.clone(), None, None), results);
    }

    #[test]
    fn filters_on_season_and_episode() {
        let results = vec![
            result("Show S01E01"),
            result("Show S01E02"),
            result("Show S02E01"),
        ];
        let filtered = filter_by_episode(results, Some(1), Some(2));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "Show S01E02");
    }

    #[test]
    fn season_only_keeps_the_whole_season() {
        let results = vec![
            result("Show S02E01"),
            result("Show S02E05"),
            result("Show S03E01"),
        ];
        let filtered = filter_by_episode(results, Some(2), None);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|r| r.title.contains("S02")));
    }

    #[test]
    fn release_name_style_titles_parse() {
        let results = vec![
            result("Breaking.Bad.S05E03.1080p.WEB-DL"),
            result("Breaking.Bad.S05E04.720p.BluRay"),
            result("Breaking.Bad.S04E01.HDTV"),
        ];
        let filtered = filter_by_episode(results, Some(5), Some(3));
        assert_eq!(filtered.len(), 1);
        assert!(filtered[0].title.contains("S05E03"));
    }

    #[test]
    fn unparseable_titles_pass_through() {
        let results = vec![result("Random Movie Title"), result("Show S01E03")];
        assert_eq!(filter_by_episode(results, Some(1), Some(3)).len(), 2);
    }

    #[test]
    fn season_zero_is_a_real_season() {
        let results = vec![
            result("Show S00E01"),
            result("Show S01E01"),
            result("Show S00E02"),
        ];
        let filtered = filter_by_episode(results, Some(0), Some(1));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "Show S00E01");
    }

    #[test]
    fn episode_zero_is_a_real_episode() {
        let results = vec![result("Show S01E00"), result("Show S01E01")];
        let filtered = filter_by_episode(results, Some(1), Some(0));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "Show S01E00");
    }

    #[test]
    fn labeled_links_narrow_unparseable_title() {
        let mut result = result("Naruto Shippuden");
        result.links = vec![
            labeled_link("VOE", "https://voe.sx/e/1x1", "1x1 Episode 1"),
            labeled_link("VOE", "https://voe.sx/e/1x5", "1x5 Episode 5"),
            labeled_link("Filemoon", "https://fm.sx/e/1x5", "1x5 Episode 5"),
        ];
        let filtered = filter_by_episode(vec![result], Some(1), Some(5));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].links.len(), 2);
        assert_eq!(filtered[0].primary_link, "https://voe.sx/e/1x5");
        assert!(filtered[0]
            .links
            .iter()
            .all(|l| l.label.as_deref().unwrap().contains("1x5")));
    }

    #[test]
    fn all_wrong_episode_labels_drop_the_result() {
        let mut result = result("Naruto Shippuden");
        result.links = vec![
            labeled_link("VOE", "https://voe.sx/e/1x1", "1x1 Episode 1"),
            labeled_link("VOE", "https://voe.sx/e/1x2", "1x2 Episode 2"),
        ];
        assert!(filter_by_episode(vec![result], Some(1), Some(5)).is_empty());
    }

    #[test]
    fn plain_mirror_labels_are_kept() {
        let mut result = result("Naruto Shippuden");
        result.links = vec![
            labeled_link("VOE", "https://voe.sx/e/abc", "Stream HD+"),
            labeled_link("Filemoon", "https://fm.sx/e/def", "Stream SD"),
        ];
        let filtered = filter_by_episode(vec![result], Some(1), Some(5));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].links.len(), 2);
    }

    #[test]
    fn massive_episode_list_reduces_to_requested_links() {
        let mut links = Vec::new();
        for s in 1..=5u32 {
            for e in 1..=20u32 {
                links.push(labeled_link(
                    "VOE",
                    &format!("https://voe.sx/e/{s}x{e}"),
                    &format!("{s}x{e} Episode {e}"),
                ));
                links.push(labeled_link(
                    "Filemoon",
                    &format!("https://fm.sx/e/{s}x{e}"),
                    &format!("{s}x{e} Episode {e}"),
                ));
            }
        }
        assert_eq!(links.len(), 200);
        let mut result = result("Breaking Bad");
        result.links = links;
        let filtered = filter_by_episode(vec![result], Some(2), Some(3));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].links.len(), 2);
        for link in &filtered[0].links {
            assert!(link.label.as_deref().unwrap().contains("2x3"));
        }
    }
}
