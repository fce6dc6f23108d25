use chrono::{Duration, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Date sentinels the Planner/LLM may emit instead of a concrete timestamp
///, resolved at gate time so every driver sees a real
/// RFC3339 instant.
const SENTINELS: &[(&str, i64)] = &[("DATE_TODAY", 0), ("DATE_7_DAYS_AGO", 7), ("DATE_30_DAYS_AGO", 30)];

pub fn resolve_date_sentinel(text: &str) -> Option<String> {
    SENTINELS.iter().find(|(name, _)| *name == text).map(|(_, days_ago)| {
            let instant = Utc::now() - Duration::days(*days_ago);
            instant.to_rfc3339()
    })
}

fn object_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{24}$").unwrap())
}

/// Whether a string looks like a 24-hex-character document identifier, for
/// opportunistic promotion to the database's native identifier type.
pub fn looks_like_object_id(s: &str) -> bool {
    object_id_pattern().is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_sentinels() {
        assert!(resolve_date_sentinel("DATE_TODAY").is_some());
        assert!(resolve_date_sentinel("DATE_7_DAYS_AGO").is_some());
        assert!(resolve_date_sentinel("not a sentinel").is_none());
    }

    #[test]
    fn recognizes_object_id_shape() {
        assert!(looks_like_object_id("507f1f77bcf86cd799439011"));
        assert!(!looks_like_object_id("not-an-id"));
        assert!(!looks_like_object_id("507f1f77bcf86cd79943901")); // 23 chars
    }
}
