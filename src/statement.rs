//! Statement formatting and classification
//!
//! Parameters are substituted client-side before a statement is hashed or
//! executed, following the MySQL client's rules: `?` takes the next value,
//! `??` takes the next value as an identifier. Placeholders inside quoted
//! text are left alone, as are placeholders with no value left to consume.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Write};

/// A bound parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// Expands to `a, b, c`; nested lists become `(a, b), (c, d)`
    List(Vec<SqlValue>),
    /// Expands to `` `k1` = v1, `k2` = v2 `` in insertion order
    Map(Vec<(String, SqlValue)>),
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Render as a SQL literal
    pub fn to_sql_literal(&self) -> String {
        let mut out = String::new();
        self.write_literal(&mut out);
        out
    }

    fn write_literal(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("NULL"),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Self::UInt(u) => {
                let _ = write!(out, "{u}");
            }
            Self::Float(f) if f.is_finite() => {
                let _ = write!(out, "{f}");
            }
            Self::Float(_) => out.push_str("NULL"),
            Self::Text(s) => escape_string_into(s, out),
            Self::Bytes(bytes) => {
                out.push_str("X'");
                out.push_str(&hex::encode(bytes));
                out.push('\'');
            }
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if let Self::List(_) = item {
                        out.push('(');
                        item.write_literal(out);
                        out.push(')');
                    } else {
                        item.write_literal(out);
                    }
                }
            }
            Self::Map(pairs) => {
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    escape_identifier_into(key, out);
                    out.push_str(" = ");
                    value.write_literal(out);
                }
            }
            Self::DateTime(dt) => {
                escape_string_into(&dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(), out)
            }
        }
    }

    /// Render as an identifier, for `??` placeholders
    fn write_identifier(&self, out: &mut String) {
        match self {
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_identifier(out);
                }
            }
            Self::Text(name) => escape_identifier_into(name, out),
            other => escape_identifier_into(&other.to_string(), out),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            other => f.write_str(&other.to_sql_literal()),
        }
    }
}

macro_rules! sql_value_from {
    ($variant:ident: $($ty:ty),+) => {
        $(impl From<$ty> for SqlValue {
            fn from(v: $ty) -> Self {
                SqlValue::$variant(v.into())
            }
        })+
    };
}

sql_value_from!(Int: i8, i16, i32, i64);
sql_value_from!(UInt: u8, u16, u32, u64);
sql_value_from!(Float: f32, f64);
sql_value_from!(Bool: bool);
sql_value_from!(Text: String, &str);
sql_value_from!(Bytes: &[u8]);
sql_value_from!(List: Vec<SqlValue>);
sql_value_from!(DateTime: NaiveDateTime);

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl From<Value> for SqlValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    SqlValue::UInt(u)
                } else {
                    SqlValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => SqlValue::Text(s),
            Value::Array(items) => SqlValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                SqlValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

fn escape_string_into(s: &str, out: &mut String) {
    out.reserve(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

fn escape_identifier_into(name: &str, out: &mut String) {
    for (i, part) in name.split('.').enumerate() {
        if i > 0 {
            out.push('.');
        }
        out.push('`');
        out.push_str(&part.replace('`', "``"));
        out.push('`');
    }
}

/// Quote a string literal with MySQL escaping
pub fn escape_string(s: &str) -> String {
    let mut out = String::new();
    escape_string_into(s, &mut out);
    out
}

/// Quote an identifier; dotted names are quoted per part
pub fn escape_identifier(name: &str) -> String {
    let mut out = String::new();
    escape_identifier_into(name, &mut out);
    out
}

/// Substitute `?` and `??` placeholders in `sql` with `params`
///
/// A `?` inside a quoted literal or identifier is left as is. The `sqlstring`
/// formatter substitutes there too, so statements relying on that render
/// differently here.
pub fn format_statement(sql: &str, params: &[SqlValue]) -> String {
    if params.is_empty() {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + params.len() * 8);
    let mut values = params.iter();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && q != '`' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '?' => {
                let mut run = 1;
                while chars.next_if_eq(&'?').is_some() {
                    run += 1;
                }
                let value = if run <= 2 { values.next() } else { None };
                match (run, value) {
                    (1, Some(value)) => value.write_literal(&mut out),
                    (2, Some(value)) => value.write_identifier(&mut out),
                    (n, _) => out.push_str(&"?".repeat(n)),
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Statement category, decided by the leading keyword alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Other => "other",
        }
    }

    /// Only plain selects are served from the cache
    pub const fn is_cacheable(&self) -> bool {
        matches!(self, Self::Select)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify by the first whitespace-delimited token, case-insensitively.
///
/// Anything that does not start with one of the four DML keywords
/// (comments, `WITH`, parenthesized selects, empty text) is `Other`.
pub fn classify(statement: &str) -> StatementKind {
    let Some(first) = statement.split_whitespace().next() else {
        return StatementKind::Other;
    };

    if first.eq_ignore_ascii_case("select") {
        StatementKind::Select
    } else if first.eq_ignore_ascii_case("insert") {
        StatementKind::Insert
    } else if first.eq_ignore_ascii_case("update") {
        StatementKind::Update
    } else if first.eq_ignore_ascii_case("delete") {
        StatementKind::Delete
    } else {
        StatementKind::Other
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// `Some(false)` bypasses the cache for this call. `Some(true)` cannot
    /// re-enable caching when it is globally off.
    pub cache: Option<bool>,
    /// TTL in seconds for the entry written on a miss
    pub ttl: Option<u64>,
}

impl QueryOptions {
    pub fn no_cache() -> Self {
        Self {
            cache: Some(false),
            ttl: None,
        }
    }

    pub fn with_ttl(ttl: u64) -> Self {
        Self {
            cache: None,
            ttl: Some(ttl),
        }
    }
}

/// A statement plus its bound parameters and overrides
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub statement: String,
    pub params: Vec<SqlValue>,
    pub options: QueryOptions,
}

impl QueryRequest {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            params: Vec::new(),
            options: QueryOptions::default(),
        }
    }

    pub fn with_params(mut self, params: Vec<SqlValue>) -> Self {
        self.params = params;
        self
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Statement with every placeholder substituted
    pub fn formatted(&self) -> String {
        format_statement(&self.statement, &self.params)
    }

    pub fn kind(&self) -> StatementKind {
        classify(&self.statement)
    }
}

impl From<&str> for QueryRequest {
    fn from(statement: &str) -> Self {
        Self::new(statement)
    }
}

impl From<String> for QueryRequest {
    fn from(statement: String) -> Self {
        Self::new(statement)
    }
}

impl<S: Into<String>> From<(S, Vec<SqlValue>)> for QueryRequest {
    fn from((statement, params): (S, Vec<SqlValue>)) -> Self {
        Self::new(statement).with_params(params)
    }
}

/// Statement descriptor object: `{"sql": "...", "params": [...]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatementDescriptor {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl From<StatementDescriptor> for QueryRequest {
    fn from(descriptor: StatementDescriptor) -> Self {
        Self::new(descriptor.sql)
            .with_params(descriptor.params.into_iter().map(SqlValue::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_scalars() {
        let sql = format_statement(
            "SELECT * FROM t WHERE a = ? AND b = ? AND c = ? AND d = ?",
            &[1.into(), "x".into(), SqlValue::Null, true.into()],
        );
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE a = 1 AND b = 'x' AND c = NULL AND d = true"
        );
    }

    #[test]
    fn test_format_escapes_strings() {
        let sql = format_statement("SELECT ?", &["it's a \"q\"\n\\".into()]);
        assert_eq!(sql, r#"SELECT 'it\'s a \"q\"\n\\'"#);

        assert_eq!(escape_string("\0\u{8}\t\r\u{1a}"), r"'\0\b\t\r\Z'");
    }

    #[test]
    fn test_format_identifiers() {
        let sql = format_statement(
            "SELECT ?? FROM ?? WHERE id = ?",
            &[
                SqlValue::List(vec!["a".into(), "b`c".into()]),
                "db.users".into(),
                7.into(),
            ],
        );
        assert_eq!(sql, "SELECT `a`, `b``c` FROM `db`.`users` WHERE id = 7");
    }

    #[test]
    fn test_format_lists_and_maps() {
        let sql = format_statement(
            "INSERT INTO t (a, b) VALUES ?",
            &[SqlValue::List(vec![
                SqlValue::List(vec![1.into(), "x".into()]),
                SqlValue::List(vec![2.into(), "y".into()]),
            ])],
        );
        assert_eq!(sql, "INSERT INTO t (a, b) VALUES (1, 'x'), (2, 'y')");

        let sql = format_statement(
            "UPDATE t SET ? WHERE id = ?",
            &[
                SqlValue::Map(vec![("name".into(), "n".into()), ("age".into(), 3.into())]),
                9.into(),
            ],
        );
        assert_eq!(sql, "UPDATE t SET `name` = 'n', `age` = 3 WHERE id = 9");

        assert_eq!(
            format_statement("SELECT ? IN (?)", &[1.into(), SqlValue::List(vec![1.into(), 5.into()])]),
            "SELECT 1 IN (1, 5)"
        );
    }

    #[test]
    fn test_placeholders_in_quotes_untouched() {
        let sql = format_statement("SELECT '?', \"a\\\"?\", ? ", &[42.into()]);
        assert_eq!(sql, "SELECT '?', \"a\\\"?\", 42 ");
    }

    #[test]
    fn test_surplus_placeholders_untouched() {
        assert_eq!(format_statement("SELECT ?, ?", &[1.into()]), "SELECT 1, ?");
        assert_eq!(format_statement("SELECT ?", &[]), "SELECT ?");
        assert_eq!(format_statement("SELECT ??? , ?", &[1.into()]), "SELECT ??? , 1");
    }

    #[test]
    fn test_format_bytes_floats_dates() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_milli_opt(13, 5, 9, 42)
            .unwrap();
        let sql = format_statement(
            "SELECT ?, ?, ?, ?",
            &[
                SqlValue::Bytes(vec![0xde, 0xad]),
                1.5.into(),
                f64::NAN.into(),
                dt.into(),
            ],
        );
        assert_eq!(sql, "SELECT X'dead', 1.5, NULL, '2024-02-29 13:05:09.042'");
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("SELECT 1"), StatementKind::Select);
        assert_eq!(classify("  select\n1"), StatementKind::Select);
        assert_eq!(classify("Insert INTO t VALUES (1)"), StatementKind::Insert);
        assert_eq!(classify("UPDATE t SET a = 1"), StatementKind::Update);
        assert_eq!(classify("delete from t"), StatementKind::Delete);
        assert_eq!(classify("WITH x AS (SELECT 1) SELECT * FROM x"), StatementKind::Other);
        assert_eq!(classify("(SELECT 1)"), StatementKind::Other);
        assert_eq!(classify("/* hint */ SELECT 1"), StatementKind::Other);
        assert_eq!(classify(""), StatementKind::Other);
        assert!(StatementKind::Select.is_cacheable());
        assert!(!StatementKind::Other.is_cacheable());
    }

    #[test]
    fn test_descriptor_request() {
        let descriptor: StatementDescriptor =
            serde_json::from_value(serde_json::json!({"sql": "SELECT ?", "params": [5]})).unwrap();
        let request = QueryRequest::from(descriptor);
        assert_eq!(request.formatted(), "SELECT 5");
        assert_eq!(request.kind(), StatementKind::Select);
    }

    #[test]
    fn test_request_builders() {
        let request = QueryRequest::new("SELECT ? + ?")
            .bind(1)
            .bind(2u8)
            .with_options(QueryOptions::with_ttl(10));
        assert_eq!(request.formatted(), "SELECT 1 + 2");
        assert_eq!(request.options.ttl, Some(10));
        assert_eq!(request.options.cache, None);
        assert_eq!(QueryOptions::no_cache().cache, Some(false));
    }
}
