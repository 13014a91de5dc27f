// Date-precision ordering for the timeline merger: spec.md 4.I orders
// precision `decade < approximate < year < month < exact`, higher being
// more specific and therefore preferred when merging two dated events.

pub fn precision_rank(precision: &str) -> u8 {
    match precision {
        "decade" => 0,
        "approximate" => 1,
        "year" => 2,
        "month" => 3,
        "exact" => 4,
        _ => 0,
    }
}

/// True if `candidate` is at least as precise as `existing`.
pub fn is_higher_or_equal_precision(candidate: &str, existing: &str) -> bool {
    precision_rank(candidate) >= precision_rank(existing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_outranks_decade() {
        assert!(precision_rank("exact") > precision_rank("decade"));
    }

    #[test]
    fn ordering_matches_spec_chain() {
        let chain = ["decade", "approximate", "year", "month", "exact"];
        for pair in chain.windows(2) {
            assert!(precision_rank(pair[1]) > precision_rank(pair[0]));
        }
    }

    #[test]
    fn unknown_precision_treated_as_lowest() {
        assert_eq!(precision_rank("bogus"), precision_rank("decade"));
    }
}
