//! Identifier quoting for dynamically named tables and columns.
//!
//! Table and column names arrive from callers at runtime and are spliced
//! into SQL text (identifiers cannot be bound as statement parameters), so
//! every splice goes through [`quote`]. The `{table}_id_seq` naming
//! convention for identity sequences also lives here, behind a single
//! function, so an engine without that convention needs one change.

/// Quote an identifier for use in SQL text.
///
/// Wraps the name in double quotes and doubles any embedded double quote,
/// which is sufficient to make any string a valid PostgreSQL identifier.
pub fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Name of the identity sequence backing a table's `id` column.
///
/// `BIGSERIAL` columns get a sequence named `{table}_id_seq`; the compactor
/// resets it through this mapping.
pub fn sequence_name(table: &str) -> String {
    format!("{}_id_seq", table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_quote_plain() {
        assert_eq!(quote("users"), r#""users""#);
    }

    #[rstest]
    fn test_quote_doubles_embedded_quotes() {
        assert_eq!(quote(r#"we"ird"#), r#""we""ird""#);
    }

    #[rstest]
    fn test_quote_keyword() {
        // Quoting makes reserved words usable as table names.
        assert_eq!(quote("table"), r#""table""#);
    }

    #[rstest]
    fn test_sequence_name() {
        assert_eq!(sequence_name("solutions"), "solutions_id_seq");
    }

    #[rstest]
    fn test_quoted_sequence_name() {
        assert_eq!(quote(&sequence_name("users")), r#""users_id_seq""#);
    }
}
