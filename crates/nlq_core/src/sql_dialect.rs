use crate::Value;

/// Placeholder style for parameterized queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` placeholders (sqlB / MySQL-compatible).
    QuestionMark,
    /// `$1`, `$2`, etc. (sqlA / PostgreSQL-compatible).
    DollarNumber,
}

/// Database-specific SQL syntax (quoting, escaping, literals, placeholders).
///
/// The Safety Gate normalizes a generated query to the target dialect's
/// placeholder style while preserving parameter count — callers never
/// need to know which dialect backs a given `DatabaseEndpoint`.
pub trait SqlDialect: Send + Sync {
    /// Quote an identifier (table/column name).
    fn quote_identifier(&self, name: &str) -> String;

    /// Build a qualified table reference.
    fn qualified_table(&self, schema: Option<&str>, table: &str) -> String;

    /// Convert a Value to a SQL literal string (used only for display/trace, never for execution).
    fn value_to_literal(&self, value: &Value) -> String;

    /// Escape a string for use inside a single-quoted literal.
    fn escape_string(&self, s: &str) -> String;

    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Render the placeholder for 1-based parameter index `n`.
    fn placeholder(&self, n: usize) -> String {
        match self.placeholder_style() {
            PlaceholderStyle::QuestionMark => "?".to_string(),
            PlaceholderStyle::DollarNumber => format!("${}", n),
        }
    }
}

fn value_to_literal_shared(dialect: &dyn SqlDialect, value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => {
            if f.is_nan() {
                "'NaN'".to_string()
            } else if f.is_infinite() {
                if *f > 0.0 {
                    "'Infinity'".to_string()
                } else {
                    "'-Infinity'".to_string()
                }
            } else {
                f.to_string()
            }
        }
        Value::Text(s) | Value::ObjectId(s) => format!("'{}'", dialect.escape_string(s)),
        Value::Bytes(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
            format!("X'{}'", hex)
        }
        Value::Json(s) => format!("'{}'", dialect.escape_string(s)),
        Value::Decimal(s) => s.clone(),
        Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        Value::Time(t) => format!("'{}'", t.format("%H:%M:%S%.f")),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(|v| dialect.value_to_literal(v)).collect();
            format!("ARRAY[{}]", items.join(", "))
        }
        Value::Document(doc) => {
            let json = serde_json::to_string(doc).unwrap_or_else(|_| "{}".to_string());
            format!("'{}'", dialect.escape_string(&json))
        }
    }
}

/// Dialect for the sqlA (PostgreSQL-compatible) database kind.
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn qualified_table(&self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(s) => format!("{}.{}", self.quote_identifier(s), self.quote_identifier(table)),
            None => self.quote_identifier(table),
        }
    }

    fn value_to_literal(&self, value: &Value) -> String {
        value_to_literal_shared(self, value)
    }

    fn escape_string(&self, s: &str) -> String {
        s.replace('\'', "''")
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::DollarNumber
    }
}

/// Dialect for the sqlB (MySQL-compatible) database kind.
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn qualified_table(&self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(s) => format!("{}.{}", self.quote_identifier(s), self.quote_identifier(table)),
            None => self.quote_identifier(table),
        }
    }

    fn value_to_literal(&self, value: &Value) -> String {
        value_to_literal_shared(self, value)
    }

    fn escape_string(&self, s: &str) -> String {
        s.replace('\\', "\\\\").replace('\'', "\\'")
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::QuestionMark
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_quotes_with_double_quotes_and_dollar_placeholders() {
        let d = PostgresDialect;
        assert_eq!(d.quote_identifier("order"), "\"order\"");
        assert_eq!(d.placeholder(2), "$2");
    }

    #[test]
    fn mysql_quotes_with_backticks_and_question_placeholders() {
        let d = MySqlDialect;
        assert_eq!(d.quote_identifier("order"), "`order`");
        assert_eq!(d.placeholder(2), "?");
    }

    #[test]
    fn escape_string_handles_quotes_per_dialect() {
        assert_eq!(PostgresDialect.escape_string("O'Brien"), "O''Brien");
        assert_eq!(MySqlDialect.escape_string("O'Brien"), "O\\'Brien");
    }
}
