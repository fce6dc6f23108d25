use std::sync::OnceLock;

use regex::Regex;

fn fence_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z]*\n(.*?)```").unwrap())
}

fn python_bool_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(True|False|None)\b").unwrap())
}

/// Strips a fenced code block wrapper if present, otherwise returns the
/// input unchanged.
fn strip_fences(raw: &str) -> String {
    if let Some(captures) = fence_pattern().captures(raw.trim()) {
        captures.get(1).map(|m| m.as_str().to_string()).unwrap_or_else(|| raw.to_string())
    } else {
        raw.to_string()
    }
}

/// Normalizes language-literal booleans/null that leak from models trained
/// mostly on Python-flavored JSON-ish output.
fn normalize_literals(text: &str) -> String {
    python_bool_pattern()
        .replace_all(text, |caps: &regex::Captures| match &caps[1] {
            "True" => "true",
            "False" => "false",
            _ => "null",
        })
        .into_owned()
}

/// Finds the first balanced `{...}` or `[...]` span in the text, preferring
/// whichever opens first. Used as a defense-in-depth fallback when the
/// sanitized text isn't parseable as-is (the strict JSON-only prompt is
/// authoritative; this only protects against stray prose around it).
fn extract_json_span(text: &str) -> Option<&str> {
    let first_brace = text.find('{');
    let first_bracket = text.find('[');
    let (start, open, close) = match (first_brace, first_bracket) {
        (Some(b), Some(k)) if k < b => (k, '[', ']'),
        (Some(b), _) => (b, '{', '}'),
        (None, Some(k)) => (k, '[', ']'),
        (None, None) => return None,
    };

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Sanitizes a raw LLM reply into parsed JSON: strip fenced
/// code blocks, normalize Python-literal booleans/null, then parse. Falls
/// back to extracting the first balanced JSON span if the whole sanitized
/// text doesn't parse outright.
pub fn sanitize_json(raw: &str) -> Result<serde_json::Value, String> {
    let stripped = strip_fences(raw);
    let normalized = normalize_literals(&stripped);

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(normalized.trim()) {
        return Ok(value);
    }

    let span = extract_json_span(&normalized).ok_or_else(|| "no JSON object or array found in LLM reply".to_string())?;
    serde_json::from_str(span).map_err(|e| format!("LLM reply JSON did not parse: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_code_block() {
        let raw = "```json\n{\"steps\": []}\n```";
        let value = sanitize_json(raw).unwrap();
        assert!(value.get("steps").is_some());
    }

    #[test]
    fn normalizes_python_literal_booleans() {
        let raw = "{\"ok\": True, \"bad\": False, \"missing\": None}";
        let value = sanitize_json(raw).unwrap();
        assert_eq!(value["ok"], serde_json::json!(true));
        assert_eq!(value["bad"], serde_json::json!(false));
        assert!(value["missing"].is_null());
    }

    #[test]
    fn extracts_json_object_surrounded_by_prose() {
        let raw = "Sure, here is the plan:\n{\"steps\": [{\"kind\": \"dbQuery\"}]}\nLet me know if you need changes.";
        let value = sanitize_json(raw).unwrap();
        assert_eq!(value["steps"].as_array().unwrap().len(), 1);
    }
}
