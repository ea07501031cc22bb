use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Characters NFKD cannot decompose get an explicit ascii spelling. Sites
/// index their catalogs in plain ascii, anything else finds nothing.
fn transliterate(c: char, out: &mut String) {
    match c {
        'ß' => out.push_str("ss"),
        'ẞ' => out.push_str("SS"),
        'æ' => out.push_str("ae"),
        'Æ' => out.push_str("AE"),
        'œ' => out.push_str("oe"),
        'Œ' => out.push_str("OE"),
        'ø' => out.push('o'),
        'Ø' => out.push('O'),
        'ł' => out.push('l'),
        'Ł' => out.push('L'),
        'đ' => out.push('d'),
        'Đ' => out.push('D'),
        // Anything else non-ascii is dropped
        _ => {}
    }
}

/// Turn a reference title into a plain text site search query.
///
/// NFKD decomposition strips diacritics, a small table covers the
/// non-decomposable letters, colons and other punctuation collapse into
/// spaces. Hyphens and apostrophes survive since sites index them.
pub fn build_search_query(title: &str) -> String {
    let mut folded = String::with_capacity(title.len());
    for c in title.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_ascii() {
            folded.push(c);
        } else {
            transliterate(c, &mut folded);
        }
    }
    let cleaned: String = folded
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Queries to try in order. A colon title like "Dune: Part One" gets the part
/// before the colon as a fallback, many sites only know the base title.
pub fn build_search_queries(title: &str) -> Vec<String> {
    let full = build_search_query(title);
    let mut queries = Vec::with_capacity(2);
    if !full.is_empty() {
        queries.push(full);
    }
    if let Some((base, _)) = title.split_once(':') {
        let base = build_search_query(base);
        if !base.is_empty() && !queries.contains(&base) {
            queries.push(base);
        }
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_title_passes_through() {
        assert_eq!(build_search_query("Iron Man"), "Iron Man");
    }

    #[test]
    fn colons_are_stripped() {
        assert_eq!(build_search_query("Naruto: Shippuden"), "Naruto Shippuden");
    }

    #[test]
    fn diacritics_fold_to_ascii() {
        assert_eq!(build_search_query("Naruto: Shippūden"), "Naruto Shippuden");
        assert_eq!(
            build_search_query("Türkisch für Anfänger"),
            "Turkisch fur Anfanger"
        );
    }

    #[test]
    fn eszett_becomes_ss() {
        assert_eq!(build_search_query("Die Straße"), "Die Strasse");
    }

    #[test]
    fn ligatures_and_strokes() {
        assert_eq!(build_search_query("Ælfred"), "AElfred");
        assert_eq!(build_search_query("Cœur"), "Coeur");
        assert_eq!(build_search_query("Ødegaard"), "Odegaard");
        assert_eq!(build_search_query("Łódź"), "Lodz");
    }

    #[test]
    fn hyphen_and_apostrophe_survive() {
        assert_eq!(build_search_query("Spider-Man"), "Spider-Man");
        assert_eq!(build_search_query("Ocean's Eleven"), "Ocean's Eleven");
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(build_search_query("  Breaking   Bad  "), "Breaking Bad");
    }

    #[test]
    fn ampersand_is_removed() {
        assert_eq!(build_search_query("Hänsel & Gretel"), "Hansel Gretel");
    }

    #[test]
    fn idempotent_over_ascii_projection() {
        for title in ["Naruto: Shippūden", "Die Straße", "Spider-Man: No Way Home"] {
            let once = build_search_query(title);
            assert_eq!(build_search_query(&once), once);
        }
    }

    #[test]
    fn no_colon_yields_single_query() {
        assert_eq!(build_search_queries("Iron Man"), vec!["Iron Man"]);
    }

    #[test]
    fn colon_adds_base_fallback() {
        assert_eq!(
            build_search_queries("Dune: Part One"),
            vec!["Dune Part One", "Dune"]
        );
        assert_eq!(
            build_search_queries("Spider-Man: No Way Home"),
            vec!["Spider-Man No Way Home", "Spider-Man"]
        );
    }

    #[test]
    fn trailing_colon_does_not_duplicate() {
        assert_eq!(build_search_queries("Dune:"), vec!["Dune"]);
    }

    #[test]
    fn first_colon_splits_multi_colon_titles() {
        let queries = build_search_queries("Star Wars: Episode IV: A New Hope");
        assert_eq!(queries[0], "Star Wars Episode IV A New Hope");
        assert_eq!(queries[1], "Star Wars");
    }
}
