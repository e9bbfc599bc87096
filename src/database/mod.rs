//! # Database Access
//!
//! The driver seam ([`connection`]), the bounded pool in front of it
//! ([`pool`]) and the MySQL driver built on `sqlx` ([`mysql`]).

pub mod connection;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod pool;

pub use connection::{
    Connector, DatabaseError, DatabaseResult, DatabaseTarget, Driver, QueryOutput, Row, Session,
};
#[cfg(feature = "mysql")]
pub use mysql::MySqlDriver;
pub use pool::{ConnectionPool, PoolConfig, PoolError, PoolResult, PooledConnection};
