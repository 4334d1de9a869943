//! Log fields for statement execution.
//!
//! Statements are logged through `tracing` with the statement text
//! sanitized: string and numeric literals are replaced by a placeholder so
//! bound values never reach the logs. Parameter markers (`@1`, `@name`)
//! are kept.

/// Configuration for statement-text sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationConfig {
    /// Replace literals with the placeholder.
    pub enabled: bool,
    /// Maximum logged length in bytes.
    pub max_length: usize,
    /// Text substituted for each literal.
    pub placeholder: String,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: 2048,
            placeholder: "?".to_string(),
        }
    }
}

impl SanitizationConfig {
    /// Log statement text verbatim.
    #[must_use]
    pub fn no_sanitization() -> Self {
        Self {
            enabled: false,
            max_length: usize::MAX,
            placeholder: String::new(),
        }
    }

    /// Produce the loggable form of a statement.
    #[must_use]
    pub fn sanitize(&self, sql: &str) -> String {
        if !self.enabled {
            return truncate(sql, self.max_length);
        }
        truncate(&replace_literals(sql, &self.placeholder), self.max_length)
    }
}

fn replace_literals(sql: &str, placeholder: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                if chars.peek() == Some(&q) {
                    chars.next();
                    continue;
                }
                quote = None;
                result.push_str(placeholder);
            }
            continue;
        }

        if c == '\'' || c == '"' {
            quote = Some(c);
            continue;
        }

        let in_word = result.ends_with(|ch: char| ch.is_alphanumeric() || ch == '_' || ch == '@');
        if c.is_ascii_digit() && !in_word {
            while chars
                .peek()
                .is_some_and(|ch| ch.is_ascii_digit() || *ch == '.')
            {
                chars.next();
            }
            result.push_str(placeholder);
            continue;
        }

        result.push(c);
    }

    if quote.is_some() {
        result.push_str(placeholder);
    }

    result
}

/// Truncate on a character boundary, marking the cut with `...`.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

const OPERATIONS: &[(&str, &str)] = &[
    ("SELECT", "SELECT"),
    ("INSERT", "INSERT"),
    ("UPDATE", "UPDATE"),
    ("DELETE", "DELETE"),
    ("MERGE", "MERGE"),
    ("EXEC", "EXECUTE"),
    ("BEGIN TRAN", "BEGIN"),
    ("COMMIT", "COMMIT"),
    ("ROLLBACK", "ROLLBACK"),
    ("CREATE", "CREATE"),
    ("ALTER", "ALTER"),
    ("DROP", "DROP"),
    ("DECLARE", "DECLARE"),
];

/// Classify a statement by its leading keyword.
///
/// An RPC statement's text is usually a bare procedure name and classifies
/// as `OTHER`.
#[must_use]
pub fn extract_operation(sql: &str) -> &'static str {
    let head = sql.trim_start();
    OPERATIONS
        .iter()
        .find(|&&(prefix, _)| {
            head.get(..prefix.len())
                .is_some_and(|h| h.eq_ignore_ascii_case(prefix))
        })
        .map_or("OTHER", |&(_, operation)| operation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_operation() {
        assert_eq!(extract_operation("  select id from t"), "SELECT");
        assert_eq!(extract_operation("EXECUTE sp_help"), "EXECUTE");
        assert_eq!(extract_operation("exec sp_help"), "EXECUTE");
        assert_eq!(extract_operation("begin transaction"), "BEGIN");
        assert_eq!(extract_operation("dbo.get_orders"), "OTHER");
        assert_eq!(extract_operation("é"), "OTHER");
        assert_eq!(extract_operation(""), "OTHER");
    }

    #[test]
    fn test_literals_replaced() {
        assert_eq!(
            replace_literals("SELECT * FROM t WHERE name = 'O''Brien' AND id = 42", "?"),
            "SELECT * FROM t WHERE name = ? AND id = ?"
        );
        assert_eq!(replace_literals("SELECT 'open", "?"), "SELECT ?");
    }

    #[test]
    fn test_markers_kept() {
        assert_eq!(
            replace_literals("SELECT c1 FROM t WHERE a = @1 AND b = @p2 AND c = 7", "?"),
            "SELECT c1 FROM t WHERE a = @1 AND b = @p2 AND c = ?"
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("ééééé", 6), "é...");
    }

    #[test]
    fn test_no_sanitization() {
        let config = SanitizationConfig::no_sanitization();
        let sql = "SELECT * FROM t WHERE name = 'Alice'";
        assert_eq!(config.sanitize(sql), sql);
        assert_eq!(SanitizationConfig::default().sanitize(sql), "SELECT * FROM t WHERE name = ?");
    }
}
