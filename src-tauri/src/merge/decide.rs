// The merge decision matrix: given two candidate entities' name and GPS,
// decide whether they are the same place. Grounded on spec.md 4.H.

use serde::Serialize;

use crate::constants::{
    MERGE_COMBINED_NAME_SIMILARITY_THRESHOLD, MERGE_COMBINED_RADIUS_METERS,
    MERGE_GENERIC_NAME_RADIUS_METERS, MERGE_GPS_RADIUS_METERS, MERGE_NAME_SIMILARITY_THRESHOLD,
    MERGE_TOKEN_OVERLAP_THRESHOLD,
};
use crate::geo::haversine_distance_meters;

use super::similarity::{is_generic_name, jaro_winkler, token_set_overlap};

#[derive(Debug, Clone, Serialize)]
pub struct MergeCandidate {
    pub name: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeDecision {
    pub is_match: bool,
    /// One of `gps`, `name`, `combined`, or `none`.
    pub match_type: String,
    pub distance_m: Option<f64>,
    pub name_similarity: f64,
    pub token_overlap: f64,
    pub auto_merge: bool,
}

pub fn decide(a: &MergeCandidate, b: &MergeCandidate) -> MergeDecision {
    let distance_m = match (a.lat, a.lng, b.lat, b.lng) {
        (Some(alat), Some(alng), Some(blat), Some(blng)) => {
            Some(haversine_distance_meters(alat, alng, blat, blng))
        }
        _ => None,
    };

    let name_similarity = jaro_winkler(&a.name.to_lowercase(), &b.name.to_lowercase());
    let token_overlap = token_set_overlap(&a.name, &b.name);

    let gps_match = distance_m.map(|d| d < MERGE_GPS_RADIUS_METERS).unwrap_or(false);
    if gps_match {
        return MergeDecision {
            is_match: true,
            match_type: "gps".to_string(),
            distance_m,
            name_similarity,
            token_overlap,
            auto_merge: true,
        };
    }

    let generic = is_generic_name(&a.name) || is_generic_name(&b.name);
    let name_match = name_similarity >= MERGE_NAME_SIMILARITY_THRESHOLD
        && token_overlap >= MERGE_TOKEN_OVERLAP_THRESHOLD;

    if name_match {
        if generic {
            // Downgrade: require a second signal (same state or GPS within 5km).
            let same_state = match (&a.state, &b.state) {
                (Some(sa), Some(sb)) => sa.eq_ignore_ascii_case(sb),
                _ => false,
            };
            let near = distance_m.map(|d| d < MERGE_GENERIC_NAME_RADIUS_METERS).unwrap_or(false);
            if same_state || near {
                return MergeDecision {
                    is_match: true,
                    match_type: "name".to_string(),
                    distance_m,
                    name_similarity,
                    token_overlap,
                    auto_merge: false,
                };
            }
        } else {
            return MergeDecision {
                is_match: true,
                match_type: "name".to_string(),
                distance_m,
                name_similarity,
                token_overlap,
                auto_merge: true,
            };
        }
    }

    let combined_match = distance_m.map(|d| d < MERGE_COMBINED_RADIUS_METERS).unwrap_or(false)
        && name_similarity >= MERGE_COMBINED_NAME_SIMILARITY_THRESHOLD;
    if combined_match && !generic {
        return MergeDecision {
            is_match: true,
            match_type: "combined".to_string(),
            distance_m,
            name_similarity,
            token_overlap,
            auto_merge: true,
        };
    }

    MergeDecision {
        is_match: false,
        match_type: "none".to_string(),
        distance_m,
        name_similarity,
        token_overlap,
        auto_merge: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, lat: Option<f64>, lng: Option<f64>, state: Option<&str>) -> MergeCandidate {
        MergeCandidate {
            name: name.to_string(),
            lat,
            lng,
            state: state.map(|s| s.to_string()),
        }
    }

    #[test]
    fn gps_proximity_alone_is_a_match() {
        let a = candidate("Totally Different Name", Some(42.36), Some(-71.05), None);
        let b = candidate("Another Name Entirely", Some(42.36001), Some(-71.05001), None);
        let decision = decide(&a, &b);
        assert!(decision.is_match);
        assert_eq!(decision.match_type, "gps");
        assert!(decision.auto_merge);
    }

    #[test]
    fn similar_distinguishing_names_match_without_gps() {
        let a = candidate("Danvers State Hospital", None, None, None);
        let b = candidate("Danvers State Hosptial", None, None, None);
        let decision = decide(&a, &b);
        assert!(decision.is_match);
        assert_eq!(decision.match_type, "name");
    }

    #[test]
    fn generic_name_alone_does_not_auto_merge() {
        let a = candidate("Hospital", None, None, Some("MA"));
        let b = candidate("Hospital", None, None, Some("NY"));
        let decision = decide(&a, &b);
        assert!(!decision.is_match);
    }

    #[test]
    fn generic_name_with_same_state_merges_but_not_automatically() {
        let a = candidate("Hospital", None, None, Some("MA"));
        let b = candidate("Hospital", None, None, Some("MA"));
        let decision = decide(&a, &b);
        assert!(decision.is_match);
        assert!(!decision.auto_merge);
    }

    #[test]
    fn unrelated_entities_do_not_match() {
        let a = candidate("Danvers State Hospital", Some(42.6), Some(-70.9), None);
        let b = candidate("Route 66 Gas Station", Some(35.2), Some(-97.4), None);
        let decision = decide(&a, &b);
        assert!(!decision.is_match);
    }
}
