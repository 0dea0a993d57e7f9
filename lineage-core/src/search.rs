//! Search Ranking Engine
//!
//! Relevance-ranked free-text matching over person names, tolerant of
//! diacritics and minor misspellings.
//!
//! Two-stage inclusion, recall-biased:
//! 1. prefix full-text match - every query term must be a prefix of some
//!    word of the name, and
//! 2. trigram similarity - names whose trigram similarity to the raw query
//!    exceeds [`TRIGRAM_THRESHOLD`] qualify even when the full-text
//!    expression misses (catches typos: "Smyth" vs "Smith").
//!
//! Ranking is precision-weighted: `2 * full_text_rank + similarity`,
//! descending, ties broken by name. Both names and queries are stripped of
//! combining diacritical marks first, so "Rene" matches "René".
//!
//! Because relevance order is not monotonic with record ids, callers must
//! materialize the full ranked list and slice it by cursor position;
//! keyset pagination does not apply here.

use crate::Person;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Minimum trigram similarity for the fuzzy inclusion path.
pub const TRIGRAM_THRESHOLD: f64 = 0.2;

/// Weight of the full-text rank relative to trigram similarity.
const FULL_TEXT_WEIGHT: f64 = 2.0;

/// A person together with its relevance score for one query.
#[derive(Debug, Clone)]
pub struct RankedPerson {
    pub person: Person,
    pub score: f64,
}

/// Strip combining diacritical marks and lowercase.
///
/// NFD decomposition separates base characters from their combining marks;
/// dropping the marks leaves the bare letters ("René" -> "rene").
pub fn fold_diacritics(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split a query into whitespace-delimited terms, diacritics folded.
pub fn query_terms(query: &str) -> Vec<String> {
    fold_diacritics(query)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Prefix full-text rank of `name` against the folded `terms`.
///
/// Returns the fraction of terms that prefix-match some word of the name:
/// 1.0 when every term matches (the full-text expression hits), between 0
/// and 1 on partial matches. Empty term lists rank 0.
pub fn full_text_rank(name: &str, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let folded = fold_diacritics(name);
    let words: Vec<&str> = folded.split_whitespace().collect();
    let hits = terms
        .iter()
        .filter(|term| words.iter().any(|w| w.starts_with(term.as_str())))
        .count();
    hits as f64 / terms.len() as f64
}

/// Trigram similarity between two strings, following pg_trgm semantics:
/// each word is padded with two leading and one trailing space, the
/// trigram sets are intersected, and the score is |A n B| / |A u B|.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let ta = trigrams(&fold_diacritics(a));
    let tb = trigrams(&fold_diacritics(b));
    if ta.is_empty() && tb.is_empty() {
        return 0.0;
    }
    let shared = ta.iter().filter(|t| tb.contains(*t)).count();
    let union = ta.len() + tb.len() - shared;
    if union == 0 {
        0.0
    } else {
        shared as f64 / union as f64
    }
}

/// Deduplicated trigram set of a folded string, word by word.
fn trigrams(folded: &str) -> Vec<[char; 3]> {
    let mut set: Vec<[char; 3]> = Vec::new();
    for word in folded.split_whitespace() {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars())
            .chain(" ".chars())
            .collect();
        for window in padded.windows(3) {
            let tri = [window[0], window[1], window[2]];
            if !set.contains(&tri) {
                set.push(tri);
            }
        }
    }
    set
}

/// Rank `persons` against a free-text `query`.
///
/// Empty or whitespace-only queries are "browse all": the full corpus is
/// returned sorted by name with zero scores. Otherwise a person qualifies
/// when the full-text expression matches OR trigram similarity exceeds the
/// threshold, and qualifying rows sort by combined score descending with
/// a name tiebreak.
pub fn rank_persons(query: &str, persons: Vec<Person>) -> Vec<RankedPerson> {
    let terms = query_terms(query);
    if terms.is_empty() {
        let mut all: Vec<RankedPerson> = persons
            .into_iter()
            .map(|person| RankedPerson { person, score: 0.0 })
            .collect();
        all.sort_by(|a, b| a.person.sort_name().cmp(&b.person.sort_name()));
        return all;
    }

    let mut ranked: Vec<RankedPerson> = persons
        .into_iter()
        .filter_map(|person| {
            let name = person.full_name();
            let ft = full_text_rank(&name, &terms);
            let sim = trigram_similarity(&name, query);
            let full_text_hit = (ft - 1.0).abs() < f64::EPSILON;
            if full_text_hit || sim > TRIGRAM_THRESHOLD {
                Some(RankedPerson {
                    person,
                    score: FULL_TEXT_WEIGHT * ft + sim,
                })
            } else {
                None
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.person.sort_name().cmp(&b.person.sort_name()))
    });
    ranked
}
