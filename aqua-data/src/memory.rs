//! Reference relational driver, entirely in memory.
//!
//! Supports all six CRUD actions. The WHERE evaluator deliberately covers
//! only conjunctive equality (`col = ?`, `col = 'text'`, `col = 42`,
//! joined with `AND`); anything richer belongs to a real SQL backend and is
//! reported as unsupported.

use aqua_core::crud::{CrudDriver, DataError, ModelMeta, RowQuery};
use dashmap::DashMap;
use serde_json::Map as JsonMap;
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::sync::Arc;

/// In-memory tables keyed by table name; rows are JSON objects.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    tables: Arc<DashMap<String, Vec<Json>>>,
}

impl MemoryDriver {
    pub fn new() -> MemoryDriver {
        MemoryDriver::default()
    }

    /// Seed a table with rows, replacing its contents.
    pub fn seed(&self, table: &str, rows: Vec<Json>) {
        self.tables.insert(table.to_string(), rows);
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }
}

fn pkey_matches(row: &Json, pkey_col: &str, pkey: &str) -> bool {
    match row.get(pkey_col) {
        Some(Json::String(s)) => s == pkey,
        Some(Json::Number(n)) => n.to_string() == pkey,
        _ => false,
    }
}

fn next_pkey(rows: &[Json], pkey_col: &str) -> i64 {
    rows.iter()
        .filter_map(|row| row.get(pkey_col).and_then(Json::as_i64))
        .max()
        .unwrap_or(0)
        + 1
}

#[async_trait::async_trait]
impl CrudDriver for MemoryDriver {
    async fn read(&self, meta: &ModelMeta, pkey: &str) -> Result<Json, DataError> {
        let rows = self
            .tables
            .get(meta.table)
            .ok_or_else(|| DataError::NotFound(format!("{}/{pkey}", meta.table)))?;
        rows.iter()
            .find(|row| pkey_matches(row, meta.pkey, pkey))
            .cloned()
            .ok_or_else(|| DataError::NotFound(format!("{}/{pkey}", meta.table)))
    }

    async fn create(&self, meta: &ModelMeta, row: Json) -> Result<u64, DataError> {
        let Json::Object(mut obj) = row else {
            return Err(DataError::Backend("row must be an object".into()));
        };
        let mut rows = self.tables.entry(meta.table.to_string()).or_default();
        // Assign the primary key when the payload leaves it null or absent.
        let missing_pkey = matches!(obj.get(meta.pkey), None | Some(Json::Null))
            || obj.get(meta.pkey).and_then(Json::as_i64) == Some(0);
        if missing_pkey {
            obj.insert(meta.pkey.to_string(), Json::from(next_pkey(&rows, meta.pkey)));
        }
        rows.push(Json::Object(obj));
        Ok(1)
    }

    async fn update(
        &self,
        meta: &ModelMeta,
        pkey: &str,
        columns: JsonMap<String, Json>,
    ) -> Result<u64, DataError> {
        let mut affected = 0;
        if let Some(mut rows) = self.tables.get_mut(meta.table) {
            for row in rows.iter_mut() {
                if pkey_matches(row, meta.pkey, pkey) {
                    if let Json::Object(obj) = row {
                        for (col, val) in &columns {
                            obj.insert(col.clone(), val.clone());
                        }
                        affected += 1;
                    }
                }
            }
        }
        Ok(affected)
    }

    async fn delete(&self, meta: &ModelMeta, pkey: &str) -> Result<u64, DataError> {
        let mut affected = 0;
        if let Some(mut rows) = self.tables.get_mut(meta.table) {
            let before = rows.len();
            rows.retain(|row| !pkey_matches(row, meta.pkey, pkey));
            affected = (before - rows.len()) as u64;
        }
        Ok(affected)
    }

    async fn select(&self, meta: &ModelMeta, query: RowQuery) -> Result<Vec<Json>, DataError> {
        let rows = match self.tables.get(meta.table) {
            Some(rows) => rows.value().clone(),
            None => Vec::new(),
        };

        let conditions = parse_where(&query.where_clause, &query.params)?;
        let mut matched: Vec<Json> = rows
            .into_iter()
            .filter(|row| {
                conditions
                    .iter()
                    .all(|(col, expected)| json_eq(row.get(col), expected))
            })
            .collect();

        for item in query.order.iter().rev() {
            let (col, descending) = match item.strip_prefix('-') {
                Some(rest) => (rest.to_string(), true),
                None => match item.to_ascii_lowercase().strip_suffix(" desc") {
                    Some(_) => (item[..item.len() - 5].trim().to_string(), true),
                    None => (item.trim().to_string(), false),
                },
            };
            matched.sort_by(|a, b| {
                let ord = json_cmp(a.get(&col), b.get(&col));
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        let skip = if query.offset > 1 {
            (query.offset - 1) as usize
        } else {
            0
        };
        let take = if query.limit > 0 {
            query.limit as usize
        } else {
            usize::MAX
        };
        Ok(matched.into_iter().skip(skip).take(take).collect())
    }
}

// ── WHERE evaluation ────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum Token {
    Ident(String),
    Eq,
    And,
    Str(String),
    Num(f64),
    Placeholder,
}

fn tokenize(clause: &str) -> Result<Vec<Token>, DataError> {
    let mut tokens = Vec::new();
    let mut chars = clause.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '?' => {
                chars.next();
                tokens.push(Token::Placeholder);
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => text.push(ch),
                        None => {
                            return Err(DataError::Unsupported(
                                "unterminated string in WHERE clause".into(),
                            ))
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            _ if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if word.eq_ignore_ascii_case("and") {
                    tokens.push(Token::And);
                } else if let Ok(num) = word.parse::<f64>() {
                    tokens.push(Token::Num(num));
                } else {
                    tokens.push(Token::Ident(word));
                }
            }
            other => {
                return Err(DataError::Unsupported(format!(
                    "WHERE clause syntax not supported at '{other}'"
                )))
            }
        }
    }
    Ok(tokens)
}

/// Parse `col = <value> [AND col = <value> ...]` into `(column, expected)`
/// pairs, substituting `?` placeholders from `params` in order.
fn parse_where(clause: &str, params: &[Json]) -> Result<Vec<(String, Json)>, DataError> {
    if clause.trim().is_empty() {
        return Ok(Vec::new());
    }
    let tokens = tokenize(clause)?;
    let mut conditions = Vec::new();
    let mut param_idx = 0;
    let mut iter = tokens.into_iter().peekable();

    loop {
        let col = match iter.next() {
            Some(Token::Ident(name)) => name,
            other => {
                return Err(DataError::Unsupported(format!(
                    "expected column name in WHERE clause, got {other:?}"
                )))
            }
        };
        if iter.next() != Some(Token::Eq) {
            return Err(DataError::Unsupported(
                "only equality comparisons are supported".into(),
            ));
        }
        let expected = match iter.next() {
            Some(Token::Placeholder) => {
                let val = params.get(param_idx).cloned().ok_or_else(|| {
                    DataError::Unsupported("missing parameter for placeholder".into())
                })?;
                param_idx += 1;
                val
            }
            Some(Token::Str(s)) => Json::from(s),
            Some(Token::Num(n)) => Json::from(n),
            other => {
                return Err(DataError::Unsupported(format!(
                    "expected value in WHERE clause, got {other:?}"
                )))
            }
        };
        conditions.push((col, expected));

        match iter.next() {
            None => break,
            Some(Token::And) => continue,
            other => {
                return Err(DataError::Unsupported(format!(
                    "expected AND in WHERE clause, got {other:?}"
                )))
            }
        }
    }
    Ok(conditions)
}

fn json_eq(actual: Option<&Json>, expected: &Json) -> bool {
    let Some(actual) = actual else {
        return expected.is_null();
    };
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

fn json_cmp(a: Option<&Json>, b: Option<&Json>) -> Ordering {
    match (a, b) {
        (Some(Json::Number(x)), Some(Json::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Json::String(x)), Some(Json::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}
