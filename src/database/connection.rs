//! Driver seam
//!
//! The pool never talks to a database library directly. A [`Driver`] turns
//! a [`DatabaseTarget`] into a [`Connector`], and a connector opens
//! [`Session`]s that execute fully formatted statements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One result row, column name to JSON value
pub type Row = Map<String, Value>;

/// Where to connect
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
}

impl DatabaseTarget {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: None,
            database: database.into(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

// password stays out of logs
impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}

impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

/// What a statement produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutput {
    Rows(Vec<Row>),
    Affected {
        rows_affected: u64,
        last_insert_id: u64,
    },
}

impl QueryOutput {
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Affected { .. } => None,
        }
    }

    pub fn rows_affected(&self) -> u64 {
        match self {
            Self::Rows(_) => 0,
            Self::Affected { rows_affected, .. } => *rows_affected,
        }
    }

    /// Value of `column` in the first row
    pub fn first_value(&self, column: &str) -> Option<&Value> {
        self.rows()?.first()?.get(column)
    }
}

/// Database failures
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Could not reach or authenticate against the target
    #[error("Failed to connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    /// An established connection went away mid-use
    #[error("Database connection lost: {0}")]
    ConnectionLost(String),

    /// The server rejected the statement
    #[error("Statement failed: {0}")]
    Statement(String),

    /// A column could not be converted into a result value
    #[error("Failed to decode column `{column}`: {reason}")]
    Decode { column: String, reason: String },
}

impl DatabaseError {
    pub fn connect(target: &DatabaseTarget, reason: impl fmt::Display) -> Self {
        Self::Connect {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Errors after which the session must not be reused
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// A single open connection
#[async_trait]
pub trait Session: Send {
    /// Run a fully formatted statement
    async fn execute(&mut self, statement: &str) -> DatabaseResult<QueryOutput>;

    /// Cheap liveness check
    async fn ping(&mut self) -> DatabaseResult<()>;

    /// Graceful close
    async fn close(self: Box<Self>) -> DatabaseResult<()>;
}

/// Opens sessions against one fixed target
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn open(&self) -> DatabaseResult<Box<dyn Session>>;

    fn target(&self) -> &DatabaseTarget;
}

/// Builds connectors; swapped out in tests for an in-memory driver
pub trait Driver: Send + Sync + fmt::Debug {
    fn connector(&self, target: &DatabaseTarget) -> DatabaseResult<Arc<dyn Connector>>;
}
