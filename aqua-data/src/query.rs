//! SQL generation for ad-hoc row queries.
//!
//! Turns a [`RowQuery`] into a `SELECT` statement for a given dialect,
//! renumbering `?` placeholders and validating identifiers in the ORDER BY
//! list. The WHERE fragment itself is passed through as the framework
//! received it.

use aqua_core::crud::RowQuery;
use serde_json::Value as Json;
use std::fmt;

#[derive(Debug, Clone, Copy)]
pub enum Dialect {
    /// Generic SQL using `?` placeholders (default).
    Generic,
    /// SQLite-style `?` placeholders.
    Sqlite,
    /// MySQL-style `?` placeholders.
    MySql,
    /// Postgres-style `$1, $2, ...` placeholders.
    Postgres,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Generic | Dialect::Sqlite | Dialect::MySql => "?".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    InvalidIdentifier { kind: &'static str, ident: String },
    ParamCountMismatch { placeholders: usize, params: usize },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidIdentifier { kind, ident } => {
                write!(f, "Invalid {kind} identifier: {ident}")
            }
            QueryError::ParamCountMismatch {
                placeholders,
                params,
            } => write!(
                f,
                "WHERE clause has {placeholders} placeholders but {params} params were supplied"
            ),
        }
    }
}

impl std::error::Error for QueryError {}

/// Build `(sql, bind_values)` for a row query against `table`.
///
/// The query's 1-based `offset` becomes `OFFSET offset-1`; `limit <= 0`
/// emits no LIMIT clause.
pub fn build_select(
    table: &str,
    query: &RowQuery,
    dialect: Dialect,
) -> Result<(String, Vec<Json>), QueryError> {
    if !is_valid_identifier(table) {
        return Err(QueryError::InvalidIdentifier {
            kind: "table",
            ident: table.to_string(),
        });
    }

    let mut sql = format!("SELECT * FROM {table}");

    let clause = query.where_clause.trim();
    if !clause.is_empty() {
        let (rewritten, placeholders) = renumber_placeholders(clause, dialect);
        if placeholders != query.params.len() {
            return Err(QueryError::ParamCountMismatch {
                placeholders,
                params: query.params.len(),
            });
        }
        sql.push_str(" WHERE ");
        sql.push_str(&rewritten);
    } else if !query.params.is_empty() {
        return Err(QueryError::ParamCountMismatch {
            placeholders: 0,
            params: query.params.len(),
        });
    }

    if !query.order.is_empty() {
        let mut clauses = Vec::with_capacity(query.order.len());
        for item in &query.order {
            clauses.push(order_clause(item)?);
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&clauses.join(", "));
    }

    if query.limit > 0 {
        sql.push_str(&format!(" LIMIT {}", query.limit));
    }
    if query.offset > 1 {
        sql.push_str(&format!(" OFFSET {}", query.offset - 1));
    }

    Ok((sql, query.params.clone()))
}

/// Rewrite `?` placeholders for the dialect, counting them. Quoted strings
/// are left untouched.
fn renumber_placeholders(clause: &str, dialect: Dialect) -> (String, usize) {
    let mut out = String::with_capacity(clause.len());
    let mut count = 0;
    let mut in_quote = false;
    for c in clause.chars() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                out.push(c);
            }
            '?' if !in_quote => {
                count += 1;
                out.push_str(&dialect.placeholder(count));
            }
            _ => out.push(c),
        }
    }
    (out, count)
}

/// Parse one order item: `col`, `col desc`, or `-col`.
fn order_clause(item: &str) -> Result<String, QueryError> {
    let item = item.trim();
    let (ident, descending) = if let Some(rest) = item.strip_prefix('-') {
        (rest.trim(), true)
    } else if let Some(rest) = item
        .to_ascii_lowercase()
        .strip_suffix(" desc")
        .map(|r| r.len())
    {
        (item[..rest].trim(), true)
    } else {
        (item, false)
    };
    if !is_valid_identifier(ident) {
        return Err(QueryError::InvalidIdentifier {
            kind: "order column",
            ident: ident.to_string(),
        });
    }
    Ok(if descending {
        format!("{ident} DESC")
    } else {
        format!("{ident} ASC")
    })
}

pub(crate) fn is_valid_identifier(ident: &str) -> bool {
    if ident.is_empty() {
        return false;
    }
    ident.split('.').all(is_valid_segment)
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
