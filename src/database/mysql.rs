//! MySQL driver on top of `sqlx`
//!
//! Statements arrive fully formatted, so they are sent over the text
//! protocol with `sqlx::raw_sql` rather than prepared.

use super::connection::{
    Connector, DatabaseError, DatabaseResult, DatabaseTarget, Driver, QueryOutput, Row, Session,
};
use crate::statement::{classify, StatementKind};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{Number, Value};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Either, Row as _, TypeInfo, ValueRef};
use std::sync::Arc;

/// Opens plain `MySqlConnection`s; pooling is done by [`ConnectionPool`](super::ConnectionPool)
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDriver;

impl Driver for MySqlDriver {
    fn connector(&self, target: &DatabaseTarget) -> DatabaseResult<Arc<dyn Connector>> {
        let mut options = MySqlConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(&target.user)
            .database(&target.database);
        if let Some(password) = &target.password {
            options = options.password(password);
        }

        Ok(Arc::new(MySqlConnector {
            target: target.clone(),
            options,
        }))
    }
}

#[derive(Debug)]
struct MySqlConnector {
    target: DatabaseTarget,
    options: MySqlConnectOptions,
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn open(&self) -> DatabaseResult<Box<dyn Session>> {
        let conn = MySqlConnection::connect_with(&self.options)
            .await
            .map_err(|e| DatabaseError::connect(&self.target, e))?;
        Ok(Box::new(MySqlSession { conn }))
    }

    fn target(&self) -> &DatabaseTarget {
        &self.target
    }
}

struct MySqlSession {
    conn: MySqlConnection,
}

#[async_trait]
impl Session for MySqlSession {
    async fn execute(&mut self, statement: &str) -> DatabaseResult<QueryOutput> {
        let mut rows = Vec::new();
        let mut rows_affected = 0;
        let mut last_insert_id = 0;

        let mut stream = sqlx::raw_sql(statement).fetch_many(&mut self.conn);
        while let Some(step) = stream.try_next().await.map_err(map_sqlx_error)? {
            match step {
                Either::Left(done) => {
                    rows_affected += done.rows_affected();
                    last_insert_id = done.last_insert_id();
                }
                Either::Right(row) => rows.push(decode_row(&row)?),
            }
        }

        let writes = matches!(
            classify(statement),
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete
        );
        if writes && rows.is_empty() {
            Ok(QueryOutput::Affected {
                rows_affected,
                last_insert_id,
            })
        } else {
            Ok(QueryOutput::Rows(rows))
        }
    }

    async fn ping(&mut self) -> DatabaseResult<()> {
        self.conn.ping().await.map_err(map_sqlx_error)
    }

    async fn close(self: Box<Self>) -> DatabaseResult<()> {
        self.conn.close().await.map_err(map_sqlx_error)
    }
}

fn map_sqlx_error(error: sqlx::Error) -> DatabaseError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => DatabaseError::ConnectionLost(error.to_string()),
        sqlx::Error::Database(db) => DatabaseError::Statement(db.message().to_string()),
        sqlx::Error::ColumnDecode { index, source } => DatabaseError::Decode {
            column: index,
            reason: source.to_string(),
        },
        other => DatabaseError::Statement(other.to_string()),
    }
}

fn decode_row(row: &MySqlRow) -> DatabaseResult<Row> {
    let mut out = Row::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), decode_column(row, index, column.name())?);
    }
    Ok(out)
}

fn decode_column(row: &MySqlRow, index: usize, name: &str) -> DatabaseResult<Value> {
    let decode_err = |e: sqlx::Error| DatabaseError::Decode {
        column: name.to_string(),
        reason: e.to_string(),
    };

    let raw = row.try_get_raw(index).map_err(decode_err)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();

    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(index).map_err(decode_err)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Value::from(row.try_get_unchecked::<i64, _>(index).map_err(decode_err)?)
        }
        t if t.ends_with("UNSIGNED") => {
            Value::from(row.try_get_unchecked::<u64, _>(index).map_err(decode_err)?)
        }
        "FLOAT" => float(row.try_get::<f32, _>(index).map_err(decode_err)? as f64),
        "DOUBLE" => float(row.try_get::<f64, _>(index).map_err(decode_err)?),
        "DATETIME" => Value::String(
            row.try_get::<chrono::NaiveDateTime, _>(index)
                .map_err(decode_err)?
                .format("%Y-%m-%d %H:%M:%S%.f")
                .to_string(),
        ),
        "TIMESTAMP" => Value::String(
            row.try_get::<chrono::DateTime<chrono::Utc>, _>(index)
                .map_err(decode_err)?
                .to_rfc3339(),
        ),
        "DATE" => Value::String(
            row.try_get::<chrono::NaiveDate, _>(index)
                .map_err(decode_err)?
                .to_string(),
        ),
        "JSON" => row.try_get::<Value, _>(index).map_err(decode_err)?,
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index).map_err(decode_err)?;
            Value::String(String::from_utf8(bytes).unwrap_or_else(|e| hex::encode(e.into_bytes())))
        }
        // DECIMAL, TIME, text types and anything exotic come back as their text form
        _ => Value::String(
            row.try_get_unchecked::<String, _>(index)
                .map_err(decode_err)?,
        ),
    };
    Ok(value)
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}
