use std::time::Duration;

use nlq_core::{AgentError, ExecutedQuery, PlaceholderStyle, SqlDialect, Value};

use crate::sentinel::resolve_date_sentinel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    Normal,
    LineComment,
    BlockComment,
    SingleQuote,
    DoubleQuote,
}

const FORBIDDEN_VERBS: &[&str] = &["drop", "truncate", "alter"];

/// The statement-time budget attached to every gated relational query.
pub const DEFAULT_STATEMENT_BUDGET: Duration = Duration::from_secs(30);

/// Validates and rewrites a relational ExecutedQuery against the safety-gate
/// rules. Returns the gated query plus its attached statement-time budget.
///
/// `redact` mirrors the server's redaction setting: when true, the SQL text
/// carried forward for display purposes is replaced by `[redacted]` while the
/// query actually sent to the driver is unaffected.
pub fn gate_relational(
    query: ExecutedQuery,
    target_dialect: &dyn SqlDialect,
    redact: bool,
) -> Result<(ExecutedQuery, Duration, String), AgentError> {
    let ExecutedQuery::Relational { sql, parameters } = query else {
        return Err(AgentError::bad_input("gate_relational received a document query"));
    };

    let clean = strip_comments(&sql);
    let trimmed = clean.trim();

    if trimmed.is_empty() {
        return Err(AgentError::safety_rejected("EMPTY_STATEMENT"));
    }

    if has_embedded_comment(&sql) {
        return Err(AgentError::safety_rejected("EMBEDDED_COMMENT"));
    }

    if has_multiple_statements(trimmed) {
        return Err(AgentError::safety_rejected("MULTIPLE_STATEMENTS"));
    }

    let verb = first_keyword(trimmed).unwrap_or_default();
    if FORBIDDEN_VERBS.contains(&verb.to_lowercase().as_str()) {
        return Err(AgentError::safety_rejected("FORBIDDEN_VERB"));
    }

    let verb_upper = verb.to_uppercase();
    if (verb_upper == "DELETE" || verb_upper == "UPDATE") && !contains_where_clause(trimmed) {
        let rule = if verb_upper == "DELETE" {
            "DELETE_WITHOUT_WHERE"
        } else {
            "UPDATE_WITHOUT_WHERE"
        };
        return Err(AgentError::safety_rejected(rule));
    }

    let resolved_sql = resolve_sentinels_in_sql(trimmed);
    let normalized_sql = normalize_placeholders(&resolved_sql, target_dialect, parameters.len())?;

    let display_sql = if redact { "[redacted]".to_string() } else { normalized_sql.clone() };

    Ok((
        ExecutedQuery::Relational {
            sql: normalized_sql,
            parameters,
        },
        DEFAULT_STATEMENT_BUDGET,
        display_sql,
    ))
}

fn resolve_sentinels_in_sql(sql: &str) -> String {
    let mut out = sql.to_string();
    for sentinel in ["DATE_TODAY", "DATE_7_DAYS_AGO", "DATE_30_DAYS_AGO"] {
        if let Some(resolved) = resolve_date_sentinel(sentinel) {
            out = out.replace(sentinel, &format!("'{}'", resolved));
        }
    }
    out
}

/// Rewrites placeholders to `target_dialect`'s style, preserving the
/// parameter count. A caller may have generated `?` placeholders for a
/// sqlA target or vice versa; mismatched counts are fatal.
fn normalize_placeholders(
    sql: &str,
    target_dialect: &dyn SqlDialect,
    expected_params: usize,
) -> Result<String, AgentError> {
    let mut out = String::with_capacity(sql.len());
    let mut state = ScanState::Normal;
    let mut seen = 0usize;
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match state {
            ScanState::Normal => {
                if c == '\'' {
                    state = ScanState::SingleQuote;
                    out.push(c);
                } else if c == '"' {
                    state = ScanState::DoubleQuote;
                    out.push(c);
                } else if c == '?' {
                    seen += 1;
                    out.push_str(&target_dialect.placeholder(seen));
                } else if c == '$' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) {
                    let mut j = i + 1;
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                    seen += 1;
                    out.push_str(&target_dialect.placeholder(seen));
                    i = j;
                    continue;
                } else {
                    out.push(c);
                }
            }
            ScanState::SingleQuote => {
                out.push(c);
                if c == '\'' {
                    state = ScanState::Normal;
                }
            }
            ScanState::DoubleQuote => {
                out.push(c);
                if c == '"' {
                    state = ScanState::Normal;
                }
            }
            ScanState::LineComment | ScanState::BlockComment => unreachable!(),
        }
        i += 1;
    }

    if seen != expected_params {
        return Err(AgentError::safety_rejected("PLACEHOLDER_PARAM_MISMATCH"));
    }

    Ok(out)
}

fn strip_comments(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut result = String::with_capacity(sql.len());
    let mut index = 0;
    let mut state = ScanState::Normal;

    while index < chars.len() {
        let current = chars[index];
        let next = chars.get(index + 1).copied();

        match state {
            ScanState::Normal => {
                if current == '-' && next == Some('-') {
                    state = ScanState::LineComment;
                    index += 2;
                    continue;
                }
                if current == '/' && next == Some('*') {
                    state = ScanState::BlockComment;
                    index += 2;
                    continue;
                }
                if current == '\'' {
                    state = ScanState::SingleQuote;
                } else if current == '"' {
                    state = ScanState::DoubleQuote;
                }
                result.push(current);
                index += 1;
            }
            ScanState::LineComment => {
                if current == '\n' {
                    result.push('\n');
                    state = ScanState::Normal;
                }
                index += 1;
            }
            ScanState::BlockComment => {
                if current == '*' && next == Some('/') {
                    state = ScanState::Normal;
                    index += 2;
                } else {
                    index += 1;
                }
            }
            ScanState::SingleQuote => {
                result.push(current);
                if current == '\'' {
                    if next == Some('\'') {
                        result.push('\'');
                        index += 2;
                        continue;
                    }
                    state = ScanState::Normal;
                }
                index += 1;
            }
            ScanState::DoubleQuote => {
                result.push(current);
                if current == '"' {
                    if next == Some('"') {
                        result.push('"');
                        index += 2;
                        continue;
                    }
                    state = ScanState::Normal;
                }
                index += 1;
            }
        }
    }

    result
}

fn has_embedded_comment(sql: &str) -> bool {
    sql.contains("--") || sql.contains("/*")
}

fn has_multiple_statements(sql: &str) -> bool {
    let mut state = ScanState::Normal;
    let mut seen_semicolon = false;
    let chars: Vec<char> = sql.chars().collect();
    let mut index = 0;

    while index < chars.len() {
        let current = chars[index];
        let next = chars.get(index + 1).copied();

        match state {
            ScanState::Normal => {
                if current == '\'' {
                    state = ScanState::SingleQuote;
                } else if current == '"' {
                    state = ScanState::DoubleQuote;
                } else if current == ';' {
                    seen_semicolon = true;
                } else if seen_semicolon && !current.is_whitespace() {
                    return true;
                }
            }
            ScanState::SingleQuote => {
                if current == '\'' {
                    if next == Some('\'') {
                        index += 1;
                    } else {
                        state = ScanState::Normal;
                    }
                }
            }
            ScanState::DoubleQuote => {
                if current == '"' {
                    if next == Some('"') {
                        index += 1;
                    } else {
                        state = ScanState::Normal;
                    }
                }
            }
            ScanState::LineComment | ScanState::BlockComment => {}
        }
        index += 1;
    }

    false
}

fn first_keyword(sql: &str) -> Option<String> {
    sql.split_whitespace()
        .map(|part| part.trim_start_matches(|c: char| !c.is_ascii_alphabetic()))
        .find(|part| !part.is_empty())
        .map(|part| {
            part.chars()
                .take_while(|ch| ch.is_ascii_alphabetic())
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
}

fn contains_where_clause(sql: &str) -> bool {
    let lower = sql.to_lowercase();
    lower
        .split_whitespace()
        .any(|w| w.trim_matches(|c: char| !c.is_ascii_alphabetic()) == "where")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlq_core::PostgresDialect;

    fn q(sql: &str, n: usize) -> ExecutedQuery {
        ExecutedQuery::Relational {
            sql: sql.to_string(),
            parameters: vec![Value::Int(1); n],
        }
    }

    #[test]
    fn rejects_delete_without_where() {
        let err = gate_relational(q("DELETE FROM orders", 0), &PostgresDialect, false).unwrap_err();
        assert!(matches!(err, AgentError::SafetyRejected(r) if r == "DELETE_WITHOUT_WHERE"));
    }

    #[test]
    fn rejects_multiple_statements() {
        let err = gate_relational(q("SELECT 1; DROP TABLE users", 0), &PostgresDialect, false).unwrap_err();
        assert!(matches!(err, AgentError::SafetyRejected(_)));
    }

    #[test]
    fn allows_delete_with_where() {
        let result = gate_relational(q("DELETE FROM orders WHERE id = ?", 1), &PostgresDialect, false);
        assert!(result.is_ok());
    }

    #[test]
    fn normalizes_question_mark_to_dollar_number() {
        let (gated, _, _) =
            gate_relational(q("SELECT * FROM orders WHERE id = ? AND status = ?", 2), &PostgresDialect, false)
                .unwrap();
        match gated {
            ExecutedQuery::Relational { sql, .. } => {
                assert!(sql.contains("$1") && sql.contains("$2"));
            }
            _ => panic!("expected relational"),
        }
    }

    #[test]
    fn rejects_forbidden_verb() {
        let err = gate_relational(q("TRUNCATE orders", 0), &PostgresDialect, false).unwrap_err();
        assert!(matches!(err, AgentError::SafetyRejected(r) if r == "FORBIDDEN_VERB"));
    }
}
