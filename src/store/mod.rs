//! Cell-addressed storage over a pooled PostgreSQL connection.
//!
//! This module is the storage abstraction layer of the crate:
//! - Connection pooling and transaction scoping (`pool`)
//! - Schema introspection and DDL (`schema`)
//! - Coordinate resolution for scalar/vector/grid payloads (`address`)
//! - The cell write and read paths (`writer`, `reader`)
//! - Deletion and id compaction (`compact`)
//!
//! # Addressing model
//!
//! Every table carries a synthetic `id BIGSERIAL PRIMARY KEY`. The data
//! columns, in declaration order, define the 1-based column index space used
//! by all coordinate operations; `id` is excluded from that space. A cell is
//! the pair `(row id, column index)`.
//!
//! # Type Decisions
//!
//! **Why `i64` for row ids?**
//! Tables are created with `BIGSERIAL`, so every id is an `int8` on the wire.
//! Using `i64` end to end avoids lossy conversions and keeps the
//! `{table}_id_seq` sequence semantics of the smaller serial types.
//!
//! **Why tagged unions for payload shape?**
//! The shape of the data (scalar vs vector vs grid) changes how coordinates
//! are resolved. An enum decided at the call site replaces runtime collection
//! sniffing and makes the resolution rules a pattern match.
//!
//! **Why no schema cache?**
//! Column names are re-read from the catalog on every call so behavior stays
//! correct if the schema changes between calls. Correctness over performance.

mod address;
mod compact;
pub mod config;
mod ident;
mod pool;
mod reader;
mod schema;
mod value;
mod writer;

pub use address::{Direction, Payload, RowStart};
pub use config::StoreConfig;
pub use pool::{Pool, PooledClient};
pub use reader::{TableRow, TableSlice};
pub use schema::ColumnSpec;
pub use value::CellValue;

use thiserror::Error;

/// Storage layer error types.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store is not connected; call connect() first")]
    NotConnected,

    #[error("start_col ({start_col}) is out of bounds; table has {columns} data column(s)")]
    Bounds { start_col: usize, columns: usize },

    #[error("invalid read rectangle: num_rows={num_rows}, num_cols={num_cols}")]
    InvalidRect { num_rows: i64, num_cols: usize },

    #[error("row range starting at {start_row} exceeds the id space")]
    RowOverflow { start_row: i64 },

    #[error("table '{table}' has no data columns")]
    NoDataColumns { table: String },

    #[error("must provide at least one column")]
    NoColumns,

    #[error("table '{table}' does not exist")]
    TableNotFound { table: String },

    #[error("column '{column}' has unsupported type '{ty}'")]
    UnsupportedColumnType { column: String, ty: String },

    #[error("connection pool is closed")]
    PoolClosed,

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),
}

/// Cell-addressed store over a pooled PostgreSQL connection.
///
/// Constructed once from a [`StoreConfig`] and passed by reference to
/// callers; holds the pool behind a lock so `connect`/`close` can run
/// against a shared handle. All operations fail with
/// [`StoreError::NotConnected`] until [`GridStore::connect`] succeeds.
///
/// # Example
/// ```no_run
/// # use gridstore::store::{GridStore, StoreConfig, Payload, RowStart, Direction, CellValue};
/// # async fn demo() -> Result<(), gridstore::store::StoreError> {
/// let store = GridStore::new(StoreConfig::from_url("postgres://localhost/grids"));
/// store.connect().await?;
/// store
///     .write(
///         "scores",
///         Payload::Cell(CellValue::Text("x".into())),
///         RowStart::At(5),
///         2,
///         Direction::Row,
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct GridStore {
    config: StoreConfig,
    pool: tokio::sync::Mutex<Option<Pool>>,
}

impl GridStore {
    /// Create an unconnected store from a configuration.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            pool: tokio::sync::Mutex::new(None),
        }
    }

    /// Establish the connection pool. A no-op if already connected.
    pub async fn connect(&self) -> Result<(), StoreError> {
        let mut slot = self.pool.lock().await;
        if slot.is_some() {
            return Ok(());
        }
        let conn_str = self.config.build_connection_string()?;
        let pool = Pool::connect(&conn_str, self.config.pool_size).await?;
        *slot = Some(pool);
        Ok(())
    }

    /// Tear down the connection pool. Outstanding calls fail with
    /// [`StoreError::PoolClosed`]; later calls fail with
    /// [`StoreError::NotConnected`].
    pub async fn close(&self) {
        if let Some(pool) = self.pool.lock().await.take() {
            pool.close();
        }
    }

    async fn pool(&self) -> Result<Pool, StoreError> {
        self.pool
            .lock()
            .await
            .clone()
            .ok_or(StoreError::NotConnected)
    }

    /// Create a table with an identity column plus the given data columns.
    ///
    /// # Errors
    /// Fails with [`StoreError::NoColumns`] if `columns` is empty, or with
    /// the engine error if the table exists and `if_not_exists` is false.
    pub async fn create_table(
        &self,
        table: &str,
        columns: &[ColumnSpec],
        if_not_exists: bool,
    ) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let conn = pool.acquire().await?;
        schema::create_table(&*conn, table, columns, if_not_exists).await
    }

    /// Drop a table (`DROP TABLE IF EXISTS`).
    pub async fn drop_table(&self, table: &str) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let conn = pool.acquire().await?;
        schema::drop_table(&*conn, table).await
    }

    /// List all user tables in the public schema, sorted by name.
    pub async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let pool = self.pool().await?;
        let conn = pool.acquire().await?;
        schema::list_tables(&*conn).await
    }

    /// Write a payload starting at `(start_row, start_col)`.
    ///
    /// Rows touched by the write are materialized as placeholders first,
    /// then updated with one `UPDATE` statement per row, all inside a single
    /// transaction. Values addressed past the last column are silently
    /// dropped.
    pub async fn write(
        &self,
        table: &str,
        data: Payload,
        start_row: RowStart,
        start_col: usize,
        direction: Direction,
    ) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await?;
        writer::write(
            &mut conn,
            table,
            data,
            start_row,
            start_col,
            direction,
            self.config.auto_provision,
        )
        .await
    }

    /// Read a bounded rectangle, collapsing the result shape by the
    /// requested dimensions (`1×1` → scalar, `1×N` → row, `N×1` → column,
    /// otherwise a row-major grid).
    pub async fn read(
        &self,
        table: &str,
        start_row: i64,
        start_col: usize,
        num_rows: i64,
        num_cols: usize,
    ) -> Result<TableSlice, StoreError> {
        let pool = self.pool().await?;
        let conn = pool.acquire().await?;
        reader::read(
            &*conn,
            table,
            start_row,
            start_col,
            num_rows,
            num_cols,
            self.config.auto_provision,
        )
        .await
    }

    /// Read the entire table ordered by id. No shape collapsing.
    pub async fn read_all(&self, table: &str) -> Result<Vec<TableRow>, StoreError> {
        let pool = self.pool().await?;
        let conn = pool.acquire().await?;
        reader::read_all(&*conn, table, self.config.auto_provision).await
    }

    /// Find all rows where `column` equals `value`, ordered by id.
    ///
    /// A nonexistent table yields an empty result rather than an error.
    pub async fn find_rows(
        &self,
        table: &str,
        column: &str,
        value: &CellValue,
    ) -> Result<Vec<TableRow>, StoreError> {
        let pool = self.pool().await?;
        let conn = pool.acquire().await?;
        reader::find_rows(&*conn, table, column, value).await
    }

    /// Delete rows by id, optionally compacting the table afterwards.
    pub async fn delete_by_ids(
        &self,
        table: &str,
        ids: &[i64],
        compact: bool,
    ) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await?;
        compact::delete_by_ids(&mut conn, table, ids, compact, self.config.auto_provision).await
    }

    /// Delete all rows where `column` equals `value`, returning the number
    /// of rows removed. Optionally compacts the table afterwards.
    pub async fn delete_where(
        &self,
        table: &str,
        column: &str,
        value: &CellValue,
        compact: bool,
    ) -> Result<u64, StoreError> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await?;
        compact::delete_where(&mut conn, table, column, value, compact, self.config.auto_provision)
            .await
    }

    /// Resequence row ids to `1..count`, preserving column values and order.
    ///
    /// Absolute ids are not preserved; any external reference to a
    /// pre-compaction id is invalidated. The identity generator continues
    /// from `count + 1`.
    pub async fn compact(&self, table: &str) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await?;
        compact::compact(&mut conn, table, self.config.auto_provision).await
    }
}
