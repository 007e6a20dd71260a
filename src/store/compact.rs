//! Deletion and id compaction.
//!
//! Deletes never cascade into compaction on their own; resequencing ids is
//! an explicit caller opt-in, because it invalidates every external
//! reference to a pre-compaction id.
//!
//! Compaction itself is fetch-everything, delete-everything, reset the
//! identity generator, re-insert in original id order. The generator then
//! assigns `1..count` and continues from `count + 1`. Column values and
//! relative order survive; absolute ids do not.

use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, GenericClient};

use super::value::{self, CellValue};
use super::{StoreError, ident, schema};

fn insert_sql(table: &str, columns: &[String]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| ident::quote(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        ident::quote(table),
        cols.join(", "),
        placeholders.join(", ")
    )
}

/// Delete rows by id. With `compact`, resequence ids in the same
/// transaction afterwards.
///
/// An empty id list is a no-op (and skips compaction). A nonexistent table
/// is auto-provisioned first, making the delete itself a no-op.
pub async fn delete_by_ids(
    client: &mut Client,
    table: &str,
    ids: &[i64],
    compact: bool,
    auto_provision: bool,
) -> Result<(), StoreError> {
    if ids.is_empty() {
        return Ok(());
    }
    schema::ensure_table(&*client, table, auto_provision).await?;

    let tx = client.transaction().await?;
    let deleted = tx
        .execute(
            format!("DELETE FROM {} WHERE id = ANY($1)", ident::quote(table)).as_str(),
            &[&ids],
        )
        .await?;
    if compact {
        compact_table(&tx, table).await?;
    }
    tx.commit().await?;

    tracing::debug!(table, deleted, "rows deleted by id");
    Ok(())
}

/// Delete all rows where `column` equals `value`, returning the count of
/// rows removed. With `compact`, resequence ids in the same transaction.
pub async fn delete_where(
    client: &mut Client,
    table: &str,
    column: &str,
    value: &CellValue,
    compact: bool,
    auto_provision: bool,
) -> Result<u64, StoreError> {
    schema::ensure_table(&*client, table, auto_provision).await?;

    let tx = client.transaction().await?;
    let params: [&(dyn ToSql + Sync); 1] = [value];
    let deleted = tx
        .execute(
            format!(
                "DELETE FROM {} WHERE {} = $1",
                ident::quote(table),
                ident::quote(column)
            )
            .as_str(),
            &params,
        )
        .await?;
    if compact {
        compact_table(&tx, table).await?;
    }
    tx.commit().await?;

    tracing::debug!(table, column, deleted, "rows deleted by predicate");
    Ok(deleted)
}

/// Resequence row ids to `1..count` inside a fresh transaction.
pub async fn compact(
    client: &mut Client,
    table: &str,
    auto_provision: bool,
) -> Result<(), StoreError> {
    schema::ensure_table(&*client, table, auto_provision).await?;
    let tx = client.transaction().await?;
    compact_table(&tx, table).await?;
    tx.commit().await?;
    Ok(())
}

/// The compaction body, run inside the caller's transaction.
pub async fn compact_table<C>(client: &C, table: &str) -> Result<(), StoreError>
where
    C: GenericClient + Sync,
{
    let columns = schema::column_names(client, table).await?;

    // Snapshot surviving rows in id order before wiping the table.
    let cols: Vec<String> = columns.iter().map(|c| ident::quote(c)).collect();
    let select = if columns.is_empty() {
        format!("SELECT id FROM {} ORDER BY id", ident::quote(table))
    } else {
        format!(
            "SELECT {} FROM {} ORDER BY id",
            cols.join(", "),
            ident::quote(table)
        )
    };
    let rows = client.query(select.as_str(), &[]).await?;

    if rows.is_empty() {
        schema::reset_identity(client, table).await?;
        tracing::info!(table, "table empty, identity generator reset");
        return Ok(());
    }

    let mut snapshot: Vec<Vec<CellValue>> = Vec::with_capacity(rows.len());
    if !columns.is_empty() {
        for row in &rows {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                values.push(value::decode(row, idx)?);
            }
            snapshot.push(values);
        }
    }

    client
        .execute(format!("DELETE FROM {}", ident::quote(table)).as_str(), &[])
        .await?;
    schema::reset_identity(client, table).await?;

    // Re-insert in original order; the generator assigns 1..count.
    if !columns.is_empty() {
        let stmt = client.prepare(insert_sql(table, &columns).as_str()).await?;
        for values in &snapshot {
            let params: Vec<&(dyn ToSql + Sync)> =
                values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            client.execute(&stmt, &params).await?;
        }
    }

    tracing::info!(table, rows = rows.len(), "table compacted");
    Ok(())
}
