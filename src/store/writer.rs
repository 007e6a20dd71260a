//! The cell write path.
//!
//! One call is one transaction: every touched row is materialized as a
//! placeholder if needed, then receives a single `UPDATE` carrying all of
//! its column assignments (one statement per touched row, not per cell).
//! Failure at any step rolls the whole call back, so a partial multi-cell
//! write is never observable. There is no atomicity across calls; two
//! independent writers racing on a row are last-writer-wins.
//!
//! The `Next` row sentinel is resolved to `max(id) + 1` before the
//! transaction opens, matching the observed behavior of the system this
//! was ported from.

use tokio_postgres::Client;
use tokio_postgres::types::ToSql;

use super::address::{self, Direction, Payload, RowStart, RowUpdate};
use super::value::CellValue;
use super::{StoreError, ident, schema};

fn update_sql(table: &str, sets: &[(String, CellValue)]) -> String {
    let assignments: Vec<String> = sets
        .iter()
        .enumerate()
        .map(|(i, (name, _))| format!("{} = ${}", ident::quote(name), i + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE id = ${}",
        ident::quote(table),
        assignments.join(", "),
        sets.len() + 1
    )
}

/// Write a payload starting at `(start_row, start_col)`.
pub async fn write(
    client: &mut Client,
    table: &str,
    data: Payload,
    start_row: RowStart,
    start_col: usize,
    direction: Direction,
    auto_provision: bool,
) -> Result<(), StoreError> {
    schema::ensure_table(&*client, table, auto_provision).await?;

    let columns = schema::column_names(&*client, table).await?;
    if columns.is_empty() {
        return Err(StoreError::NoDataColumns {
            table: table.to_string(),
        });
    }

    let first_row = match start_row {
        RowStart::At(id) => id,
        RowStart::Next => schema::next_row_id(&*client, table).await?,
    };

    let updates = address::resolve_write(&columns, &data, first_row, start_col, direction)?;

    let tx = client.transaction().await?;
    for update in &updates {
        apply_row(&tx, table, update).await?;
    }
    tx.commit().await?;

    tracing::debug!(
        table,
        start_row = first_row,
        start_col,
        rows = updates.len(),
        "cells written"
    );
    Ok(())
}

async fn apply_row<C>(client: &C, table: &str, update: &RowUpdate) -> Result<(), StoreError>
where
    C: tokio_postgres::GenericClient + Sync,
{
    schema::ensure_row(client, table, update.row_id).await?;
    if update.sets.is_empty() {
        // Fully truncated row: placeholder only.
        return Ok(());
    }

    let sql = update_sql(table, &update.sets);
    let mut params: Vec<&(dyn ToSql + Sync)> = update
        .sets
        .iter()
        .map(|(_, value)| value as &(dyn ToSql + Sync))
        .collect();
    params.push(&update.row_id);
    client.execute(sql.as_str(), &params).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_update_sql_single_cell() {
        let sql = update_sql("users", &[("name".to_string(), text("x"))]);
        assert_eq!(sql, r#"UPDATE "users" SET "name" = $1 WHERE id = $2"#);
    }

    #[test]
    fn test_update_sql_one_statement_per_row() {
        let sql = update_sql(
            "users",
            &[
                ("name".to_string(), text("x")),
                ("email".to_string(), text("y")),
                ("age".to_string(), CellValue::Int(3)),
            ],
        );
        assert_eq!(
            sql,
            r#"UPDATE "users" SET "name" = $1, "email" = $2, "age" = $3 WHERE id = $4"#
        );
    }

    #[test]
    fn test_update_sql_quotes_column_names() {
        let sql = update_sql("t", &[("odd name".to_string(), CellValue::Null)]);
        assert!(sql.contains(r#""odd name" = $1"#));
    }
}
