/// Conversational patterns that short-circuit the pipeline: the
/// planner emits a zero-step plan and the response is a polite reply with
/// no database access, instead of being misread as a query about a table
/// literally named "hi".
const GREETING_PATTERNS: &[&str] = &[
    "hi", "hello", "hey", "yo", "good morning", "good afternoon", "good evening",
    "thanks", "thank you", "thx", "how are you", "what's up", "whats up", "bye", "goodbye",
];

/// Whether the user's text is conversational rather than a database
/// request. Matches only short inputs so a longer sentence that happens to
/// start with "hi" (e.g. "hi, can you show me the top customers") is not
/// misclassified.
pub fn is_greeting(user_text: &str) -> bool {
    let normalized = user_text.trim().trim_end_matches(['.', '!', '?']).to_lowercase();
    if normalized.is_empty() || normalized.split_whitespace().count() > 4 {
        return false;
    }
    GREETING_PATTERNS.iter().any(|p| normalized == *p || normalized.starts_with(p))
}

/// Deterministic reply for a greeting short-circuit. Never calls the LLM —
/// the point of the short-circuit is to avoid the round-trip entirely.
pub fn greeting_reply(user_text: &str) -> String {
    let normalized = user_text.trim().trim_end_matches(['.', '!', '?']).to_lowercase();
    if normalized.contains("thank") || normalized == "thx" {
        "You're welcome! Let me know if you'd like to look at your data.".to_string()
    } else if normalized.contains("bye") {
        "Goodbye! Come back anytime you want to query your database.".to_string()
    } else if normalized.contains("how are you") {
        "I'm doing well, thanks for asking. What would you like to know about your data?".to_string()
    } else {
        "Hi there! Ask me anything about your connected database.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_short_greetings() {
        assert!(is_greeting("hi"));
        assert!(is_greeting("Hello!"));
        assert!(is_greeting("thanks a lot"));
    }

    #[test]
    fn does_not_misclassify_a_longer_query_containing_a_greeting_word() {
        assert!(!is_greeting("hi, can you show me the top 10 customers by revenue this month"));
    }

    #[test]
    fn does_not_misclassify_unrelated_queries() {
        assert!(!is_greeting("how many orders were placed today"));
    }
}
