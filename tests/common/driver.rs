//! In-memory stand-in for a MySQL server
//!
//! Understands just enough SQL for the test suites:
//!
//! - `SELECT <int> + <int> AS <name>` evaluates the sum
//! - any other `SELECT` returns one row with the statement text and a
//!   server-wide execution counter, so repeated executions are observable
//! - selects mentioning `fail_me` fail with a statement error,
//!   `lose_connection` fails with a lost connection
//! - selects mentioning `slow` take 200ms
//! - `INSERT`/`UPDATE`/`DELETE` report one affected row
//!
//! [`ScriptedDriver::restart`] simulates a server restart: every session
//! opened before it fails with a lost connection from then on.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use sqlcache::database::{
    Connector, DatabaseError, DatabaseResult, DatabaseTarget, Driver, QueryOutput, Row, Session,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DATABASE: &str = "sqlcache_test";

#[derive(Debug, Default)]
struct ServerState {
    executed: Mutex<Vec<(String, String)>>,
    refused: Mutex<HashSet<String>>,
    executions: AtomicUsize,
    epoch: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    state: Arc<ServerState>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse connections to `database` from now on
    pub fn refuse(&self, database: &str) {
        self.state.refused.lock().insert(database.to_string());
    }

    pub fn accept(&self, database: &str) {
        self.state.refused.lock().remove(database);
    }

    /// Drop every open session, as a restarting server would
    pub fn restart(&self) {
        self.state.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Statements that reached the server, in order
    pub fn executed(&self) -> Vec<String> {
        self.state
            .executed
            .lock()
            .iter()
            .map(|(_, statement)| statement.clone())
            .collect()
    }

    /// Statements that reached `database`
    pub fn executed_on(&self, database: &str) -> Vec<String> {
        self.state
            .executed
            .lock()
            .iter()
            .filter(|(db, _)| db == database)
            .map(|(_, statement)| statement.clone())
            .collect()
    }

    pub fn execution_count(&self) -> usize {
        self.state.executions.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }
}

impl Driver for ScriptedDriver {
    fn connector(&self, target: &DatabaseTarget) -> DatabaseResult<Arc<dyn Connector>> {
        Ok(Arc::new(ScriptedConnector {
            target: target.clone(),
            state: self.state.clone(),
        }))
    }
}

#[derive(Debug)]
struct ScriptedConnector {
    target: DatabaseTarget,
    state: Arc<ServerState>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self) -> DatabaseResult<Box<dyn Session>> {
        if self.state.refused.lock().contains(&self.target.database) {
            return Err(DatabaseError::connect(&self.target, "connection refused"));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            database: self.target.database.clone(),
            epoch: self.state.epoch.load(Ordering::SeqCst),
            state: self.state.clone(),
        }))
    }

    fn target(&self) -> &DatabaseTarget {
        &self.target
    }
}

struct ScriptedSession {
    database: String,
    epoch: usize,
    state: Arc<ServerState>,
}

impl ScriptedSession {
    fn check_alive(&self) -> DatabaseResult<()> {
        if self.epoch != self.state.epoch.load(Ordering::SeqCst) {
            return Err(DatabaseError::ConnectionLost("server restarted".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(&mut self, statement: &str) -> DatabaseResult<QueryOutput> {
        self.check_alive()?;
        let lowered = statement.trim().to_ascii_lowercase();
        if lowered.contains("slow") {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if lowered.contains("lose_connection") {
            return Err(DatabaseError::ConnectionLost("server went away".into()));
        }
        if lowered.contains("fail_me") {
            return Err(DatabaseError::Statement("simulated failure".into()));
        }

        let execution = self.state.executions.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .executed
            .lock()
            .push((self.database.clone(), statement.to_string()));

        if lowered.starts_with("select") {
            let row = evaluate_sum(&lowered).unwrap_or_else(|| {
                let mut row = Row::new();
                row.insert("statement".into(), Value::String(statement.to_string()));
                row.insert("execution".into(), json!(execution));
                row.insert("database".into(), Value::String(self.database.clone()));
                row
            });
            Ok(QueryOutput::Rows(vec![row]))
        } else {
            Ok(QueryOutput::Affected {
                rows_affected: 1,
                last_insert_id: execution as u64,
            })
        }
    }

    async fn ping(&mut self) -> DatabaseResult<()> {
        self.check_alive()
    }

    async fn close(self: Box<Self>) -> DatabaseResult<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// `select a + b as name`
fn evaluate_sum(lowered: &str) -> Option<Row> {
    let body = lowered.strip_prefix("select")?;
    let (expression, name) = body.split_once(" as ")?;
    let (a, b) = expression.split_once('+')?;
    let a: i64 = a.trim().parse().ok()?;
    let b: i64 = b.trim().parse().ok()?;

    let mut row = Row::new();
    row.insert(name.trim().to_string(), json!(a + b));
    Some(row)
}
