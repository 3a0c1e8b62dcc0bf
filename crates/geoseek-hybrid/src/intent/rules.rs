//! Pattern-based place/theme split used when no language model is configured
//! or the model's answer cannot be used.

use regex::Regex;
use std::sync::LazyLock;

/// "<what> in|near|... <place>", splitting at the last preposition.
static TRAILING_PLACE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<what>.*\S)\s+(?:in|near|around|within|inside|across)\s+(?P<place>[^;]+?)[\s.!?]*$").ok()
});

/// "in|near|around <place>, <what>"
static LEADING_PLACE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:in|near|around)\s+(?P<place>[^,]+?)\s*,\s*(?P<what>.+?)[\s.!?]*$").ok()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSplit {
    pub what: String,
    pub place: Option<String>,
}

pub fn split(raw_text: &str) -> RuleSplit {
    let text = raw_text.trim();
    for re in [&LEADING_PLACE, &TRAILING_PLACE] {
        let Some(re) = re.as_ref() else { continue };
        if let Some(caps) = re.captures(text) {
            let place = caps.name("place").map(|m| clean(m.as_str())).unwrap_or_default();
            let what = caps.name("what").map(|m| clean(m.as_str())).unwrap_or_default();
            if !place.is_empty() {
                return RuleSplit { what, place: Some(place) };
            }
        }
    }
    RuleSplit { what: clean(text), place: None }
}

fn clean(s: &str) -> String {
    s.trim().trim_end_matches(['.', '!', '?', ',', ';']).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_place() {
        assert_eq!(split("parks near Berlin"), RuleSplit { what: "parks".into(), place: Some("Berlin".into()) });
        assert_eq!(split("Flood zones in the Rhine valley?").place.as_deref(), Some("the Rhine valley"));
    }

    #[test]
    fn last_preposition_wins() {
        let s = split("datasets in the city archive near Hamburg");
        assert_eq!(s.what, "datasets in the city archive");
        assert_eq!(s.place.as_deref(), Some("Hamburg"));
    }

    #[test]
    fn leading_place() {
        let s = split("In Munich, bike lanes");
        assert_eq!(s.what, "bike lanes");
        assert_eq!(s.place.as_deref(), Some("Munich"));
    }

    #[test]
    fn place_may_carry_a_country() {
        assert_eq!(split("parks in Berlin, Germany").place.as_deref(), Some("Berlin, Germany"));
    }

    #[test]
    fn no_place() {
        assert_eq!(split("global land cover.").place, None);
        assert_eq!(split("global land cover.").what, "global land cover");
    }
}
