//! gridstore library - Cell-addressed table storage over PostgreSQL
//!
//! Lets callers treat an ordinary SQL relation like a spreadsheet: data is
//! addressed by `(row id, column index)` while the engine sees a normal table
//! with a `BIGSERIAL id` primary key. Provides the connection pool, schema
//! introspection, coordinate resolution, cell read/write paths, and the id
//! compaction repair operation.

pub mod cli;
pub mod config;
pub mod store;
