//! Adapter implementations
//!
//! Each adapter implements the DataSource port over one backend:
//! - DuckDB file for the embedded, writable store
//! - HTTP analytics API for the remote store
//! - PostgreSQL replica for the distributed store

pub mod duckdb;
pub mod postgres;
pub mod remote;

#[cfg(test)]
pub mod fake;
#[cfg(test)]
pub mod remote_mock;
