//! Merges candidates from the store's three lookup primitives, filters,
//! scores and ranks them.

use super::store::{GazetteerError, GazetteerStore};
use super::normalise_name;
use crate::model::{MatchType, PlaceClass, PlaceMatch, PlaceRecord};

const FTS_CANDIDATES: u32 = 20;

const EXACT_PRIMARY_BASE: f64 = 1.0;
const EXACT_ALT_BASE: f64 = 0.85;
const PREFIX_BASE: f64 = 0.70;
const FUZZY_BASE: f64 = 0.40;

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub limit: usize,
    pub preferred_place_classes: Vec<PlaceClass>,
    pub preferred_municipality_code: Option<String>,
}

impl ResolveOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self { limit, ..Self::default() }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    place: PlaceRecord,
    match_type: MatchType,
    relevance: f64,
}

#[derive(Debug, Clone)]
pub struct PlaceResolver {
    store: GazetteerStore,
}

impl PlaceResolver {
    pub fn new(store: GazetteerStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &GazetteerStore {
        &self.store
    }

    /// Ranked lookup. An empty result is a valid answer, not an error.
    pub async fn resolve(
        &self, query: &str, options: &ResolveOptions,
    ) -> Result<Vec<PlaceMatch>, GazetteerError> {
        let normalised = normalise_query(query);
        if normalised.is_empty() {
            return Ok(Vec::new());
        }
        let limit = if options.limit == 0 { 5 } else { options.limit };

        let mut candidates: Vec<Candidate> = Vec::new();
        for place in self.store.find_exact_primary(&normalised).await? {
            push_candidate(&mut candidates, place, MatchType::ExactPrimary, 0.0);
        }
        for place in self.store.find_exact_alt(&normalised).await? {
            push_candidate(&mut candidates, place, MatchType::ExactAlt, 0.0);
        }
        for (place, relevance) in self.store.find_full_text(&normalised, FTS_CANDIDATES).await? {
            let match_type = if normalise_name(&place.name).starts_with(&normalised) {
                MatchType::Prefix
            } else {
                MatchType::Fuzzy
            };
            push_candidate(&mut candidates, place, match_type, relevance);
        }

        apply_filters(&mut candidates, options);

        let mut matches: Vec<PlaceMatch> = candidates
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| {
                let confidence = confidence(&candidate, index);
                PlaceMatch { place: candidate.place, confidence, match_type: candidate.match_type }
            })
            .collect();

        // Stable sort keeps insertion order on equal confidence.
        matches.sort_by(|a, b| {
            b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }
}

/// Trim, collapse whitespace, lowercase and strip a trailing country name.
pub fn normalise_query(query: &str) -> String {
    let mut normalised = normalise_name(query);
    for suffix in [", norway", ", norge", ", noreg", " norway", " norge", " noreg"] {
        if let Some(stripped) = normalised.strip_suffix(suffix) {
            normalised = stripped.trim_end_matches([',', ' ']).to_string();
            break;
        }
    }
    normalised
}

/// Merge order is exact-primary, exact-alt, full-text; the first occurrence
/// of an id wins and keeps its match type.
fn push_candidate(
    candidates: &mut Vec<Candidate>, place: PlaceRecord, match_type: MatchType, relevance: f64,
) {
    if candidates.iter().any(|existing| existing.place.id == place.id) {
        return;
    }
    candidates.push(Candidate { place, match_type, relevance });
}

fn apply_filters(candidates: &mut Vec<Candidate>, options: &ResolveOptions) {
    if !options.preferred_place_classes.is_empty()
        && candidates
            .iter()
            .any(|candidate| options.preferred_place_classes.contains(&candidate.place.place_class))
    {
        candidates
            .retain(|candidate| options.preferred_place_classes.contains(&candidate.place.place_class));
    }

    if let Some(code) = &options.preferred_municipality_code {
        // Stable: matching municipality first, nobody dropped.
        candidates.sort_by_key(|candidate| {
            candidate.place.municipality_code.as_deref() != Some(code.as_str())
        });
    }
}

fn confidence(candidate: &Candidate, index: usize) -> f64 {
    let base = match candidate.match_type {
        MatchType::ExactPrimary => EXACT_PRIMARY_BASE,
        MatchType::ExactAlt => EXACT_ALT_BASE,
        MatchType::Prefix => PREFIX_BASE,
        MatchType::Fuzzy => FUZZY_BASE + (candidate.relevance / 100.0).clamp(0.0, 0.30),
    };
    let mut confidence = base;
    if candidate.place.county_seat {
        confidence += 0.05;
    }
    if candidate.place.municipality_seat {
        confidence += 0.03;
    }
    confidence += (candidate.place.importance / 10.0).clamp(0.0, 0.05);
    confidence -= 0.01 * index as f64;
    confidence.clamp(0.0, 1.0)
}
