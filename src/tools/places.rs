use super::respond;
use super::wrapper::{ToolPayload, ToolReply};
use crate::errors::ToolError;
use crate::gazetteer::{PlaceResolver, ResolveOptions};
use crate::model::{Lang, PlaceClass, PlaceMatch};
use rmcp::schemars;

pub const TOOL_NAME: &str = "places.resolve_name";

const RESOLVED_CONFIDENCE: f64 = 0.8;
const MAX_LIMIT: u32 = 20;
const DEFAULT_LIMIT: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveNameRequest {
    #[schemars(description = "Place name to resolve, e.g. \"Oslo\"")]
    pub query: String,

    #[schemars(description = "Maximum matches to return, 1..20 (default 5)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_place_classes: Option<Vec<PlaceClass>>,

    #[schemars(description = "Four-character municipality code to prefer")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_municipality_code: Option<String>,

    #[serde(default)]
    pub language: Lang,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GazetteerAttribution {
    pub provider: String,
    pub license_uri: String,
    pub credit_line: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveNamePayload {
    pub query: String,
    pub matches: Vec<PlaceMatch>,
    pub gazetteer: GazetteerAttribution,
}

impl ToolPayload for ResolveNamePayload {}

pub async fn run(
    resolver: Option<&PlaceResolver>, request: ResolveNameRequest,
) -> Result<ToolReply<ResolveNamePayload>, ToolError> {
    let Some(resolver) = resolver else {
        return Err(ToolError::internal(
            "place resolver is unavailable: no gazetteer loaded",
        ));
    };
    if request.query.trim().is_empty() {
        return Err(ToolError::invalid_input("query must be non-empty"));
    }
    let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ToolError::invalid_input(format!(
            "limit {limit} out of range 1..{MAX_LIMIT}"
        )));
    }

    let options = ResolveOptions {
        limit: limit as usize,
        preferred_place_classes: request.preferred_place_classes.clone().unwrap_or_default(),
        preferred_municipality_code: request.preferred_municipality_code.clone(),
    };
    let matches = resolver
        .resolve(&request.query, &options)
        .await
        .map_err(|err| ToolError::internal(format!("gazetteer lookup failed: {err}")))?;

    let summary = summarise(request.language, &request.query, &matches);
    Ok(ToolReply {
        payload: ResolveNamePayload {
            query: request.query,
            matches,
            gazetteer: GazetteerAttribution {
                provider: respond::GAZETTEER_PROVIDER.to_string(),
                license_uri: respond::GAZETTEER_LICENSE_URI.to_string(),
                credit_line: respond::GAZETTEER_CREDIT_LINE.to_string(),
            },
        },
        summary,
    })
}

/// One confident match presents as resolved; anything else becomes a short
/// disambiguation list with a request for clarification. No results is a
/// valid answer.
fn summarise(language: Lang, query: &str, matches: &[PlaceMatch]) -> String {
    let confident = matches.iter().filter(|m| m.confidence >= RESOLVED_CONFIDENCE).count();
    match matches.first() {
        None => match language {
            Lang::En => format!("No places matching \"{query}\"."),
            Lang::Nb => format!("Ingen steder samsvarer med \"{query}\"."),
        },
        Some(first) if confident == 1 && first.confidence >= RESOLVED_CONFIDENCE => {
            let region = first
                .place
                .municipality_name
                .as_deref()
                .or(first.place.county_name.as_deref())
                .unwrap_or("");
            match language {
                Lang::En => format!(
                    "Resolved \"{query}\" to {} ({}, {region}) at {:.4}, {:.4}.",
                    first.place.name, first.place.place_class, first.place.lat, first.place.lon
                ),
                Lang::Nb => format!(
                    "\"{query}\" tolket som {} ({}, {region}) ved {:.4}, {:.4}.",
                    first.place.name, first.place.place_class, first.place.lat, first.place.lon
                ),
            }
        },
        Some(_) => {
            let listed = matches
                .iter()
                .take(3)
                .map(|m| {
                    let region = m
                        .place
                        .municipality_name
                        .as_deref()
                        .or(m.place.county_name.as_deref())
                        .unwrap_or("?");
                    format!("{} ({region})", m.place.name)
                })
                .collect::<Vec<_>>()
                .join(", ");
            match language {
                Lang::En => {
                    format!("Several places match \"{query}\": {listed}. Which one did you mean?")
                },
                Lang::Nb => {
                    format!("Flere steder samsvarer med \"{query}\": {listed}. Hvilket mente du?")
                },
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MatchType, PlaceRecord};
    use pretty_assertions::assert_eq;

    fn candidate(name: &str, confidence: f64) -> PlaceMatch {
        PlaceMatch {
            place: PlaceRecord {
                id: name.to_lowercase(),
                name: name.to_string(),
                alt_names: Vec::new(),
                lat: 59.9139,
                lon: 10.7522,
                place_class: PlaceClass::City,
                municipality_code: Some("0301".to_string()),
                municipality_name: Some("Oslo".to_string()),
                county_name: Some("Oslo".to_string()),
                importance: 9.0,
                county_seat: true,
                municipality_seat: true,
            },
            confidence,
            match_type: MatchType::ExactPrimary,
        }
    }

    #[test]
    fn test_single_confident_match_presents_as_resolved() {
        let summary = summarise(Lang::En, "Oslo", &[candidate("Oslo", 1.0)]);
        assert!(summary.starts_with("Resolved \"Oslo\" to Oslo"), "{summary}");
    }

    #[test]
    fn test_ambiguous_matches_ask_for_clarification() {
        let matches = vec![candidate("Os", 0.9), candidate("Os i Østerdalen", 0.88)];
        let summary = summarise(Lang::En, "Os", &matches);
        assert!(summary.contains("Which one did you mean?"), "{summary}");

        let weak = vec![candidate("Oslomarka", 0.6)];
        let summary = summarise(Lang::En, "Oslomark", &weak);
        assert!(summary.contains("Which one did you mean?"), "{summary}");
    }

    #[test]
    fn test_no_results_is_not_an_error() {
        let summary = summarise(Lang::Nb, "Atlantis", &[]);
        assert!(summary.contains("Ingen steder"), "{summary}");
    }
}
