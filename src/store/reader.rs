//! The cell read path.
//!
//! Rectangle reads select the resolved column slice over an id *range*
//! (`id >= start AND id < start + num_rows`), not a result-set offset: ids
//! inside the range that have no row simply contribute nothing. The result
//! shape collapses by the requested dimensions, so asking for one cell
//! yields a scalar even when the row was missing (a null, not an error).

use tokio_postgres::GenericClient;
use tokio_postgres::types::ToSql;

use super::address::{self, ReadRect};
use super::value::{self, CellValue};
use super::{StoreError, ident, schema};

/// The shape-collapsed result of a rectangle read.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSlice {
    /// Requested 1×1. `CellValue::Null` when no row matched.
    Cell(CellValue),
    /// Requested 1×N: one row vector, nulls when the row was missing.
    Row(Vec<CellValue>),
    /// Requested N×1: one column vector, one entry per existing row.
    Column(Vec<CellValue>),
    /// Everything else: row-major grid, one entry per existing row.
    Grid(Vec<Vec<CellValue>>),
}

/// A full row as returned by [`read_all`] and [`find_rows`]: the id plus
/// data column values in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub id: i64,
    pub values: Vec<CellValue>,
}

/// Collapse a fetched matrix by the dimensions the caller asked for.
///
/// `width` is the clipped column count actually selected; `num_cols` is the
/// requested width, which is what decides the shape.
fn collapse(matrix: Vec<Vec<CellValue>>, num_rows: i64, num_cols: usize, width: usize) -> TableSlice {
    if num_rows == 1 && num_cols == 1 {
        let cell = matrix
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or(CellValue::Null);
        TableSlice::Cell(cell)
    } else if num_rows == 1 {
        let row = matrix
            .into_iter()
            .next()
            .unwrap_or_else(|| vec![CellValue::Null; width]);
        TableSlice::Row(row)
    } else if num_cols == 1 {
        TableSlice::Column(
            matrix
                .into_iter()
                .filter_map(|row| row.into_iter().next())
                .collect(),
        )
    } else {
        TableSlice::Grid(matrix)
    }
}

fn select_rect_sql(table: &str, rect: &ReadRect) -> String {
    let cols: Vec<String> = rect.columns.iter().map(|c| ident::quote(c)).collect();
    format!(
        "SELECT {} FROM {} WHERE id >= $1 AND id < $2 ORDER BY id",
        cols.join(", "),
        ident::quote(table)
    )
}

fn select_rows_sql(table: &str, columns: &[String], predicate: Option<&str>) -> String {
    let mut cols = vec!["id".to_string()];
    cols.extend(columns.iter().map(|c| ident::quote(c)));
    match predicate {
        Some(column) => format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY id",
            cols.join(", "),
            ident::quote(table),
            ident::quote(column)
        ),
        None => format!(
            "SELECT {} FROM {} ORDER BY id",
            cols.join(", "),
            ident::quote(table)
        ),
    }
}

/// Read a bounded rectangle and collapse its shape.
pub async fn read<C>(
    client: &C,
    table: &str,
    start_row: i64,
    start_col: usize,
    num_rows: i64,
    num_cols: usize,
    auto_provision: bool,
) -> Result<TableSlice, StoreError>
where
    C: GenericClient + Sync,
{
    schema::ensure_table(client, table, auto_provision).await?;

    let columns = schema::column_names(client, table).await?;
    if columns.is_empty() {
        return Err(StoreError::NoDataColumns {
            table: table.to_string(),
        });
    }

    let rect = address::resolve_read(&columns, start_row, start_col, num_rows, num_cols)?;
    let end_row = rect
        .start_row
        .checked_add(rect.num_rows)
        .ok_or(StoreError::RowOverflow {
            start_row: rect.start_row,
        })?;
    let rows = client
        .query(
            select_rect_sql(table, &rect).as_str(),
            &[&rect.start_row, &end_row],
        )
        .await?;

    let width = rect.columns.len();
    let mut matrix = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut cells = Vec::with_capacity(width);
        for idx in 0..width {
            cells.push(value::decode(row, idx)?);
        }
        matrix.push(cells);
    }

    tracing::debug!(table, start_row, start_col, rows = matrix.len(), "rectangle read");
    Ok(collapse(matrix, rect.num_rows, rect.num_cols, width))
}

/// Read the entire table ordered by id.
pub async fn read_all<C>(
    client: &C,
    table: &str,
    auto_provision: bool,
) -> Result<Vec<TableRow>, StoreError>
where
    C: GenericClient + Sync,
{
    schema::ensure_table(client, table, auto_provision).await?;
    let columns = schema::column_names(client, table).await?;
    let rows = client
        .query(select_rows_sql(table, &columns, None).as_str(), &[])
        .await?;
    decode_table_rows(&rows, columns.len())
}

/// Find all rows where `column` equals `value`, ordered by id.
///
/// A nonexistent table yields no rows; nothing is provisioned.
pub async fn find_rows<C>(
    client: &C,
    table: &str,
    column: &str,
    value: &CellValue,
) -> Result<Vec<TableRow>, StoreError>
where
    C: GenericClient + Sync,
{
    if !schema::table_exists(client, table).await? {
        return Ok(Vec::new());
    }
    let columns = schema::column_names(client, table).await?;
    let params: [&(dyn ToSql + Sync); 1] = [value];
    let rows = client
        .query(
            select_rows_sql(table, &columns, Some(column)).as_str(),
            &params,
        )
        .await?;
    decode_table_rows(&rows, columns.len())
}

fn decode_table_rows(
    rows: &[tokio_postgres::Row],
    width: usize,
) -> Result<Vec<TableRow>, StoreError> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.get(0);
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(value::decode(row, idx + 1)?);
        }
        out.push(TableRow { id, values });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_collapse_single_cell() {
        let slice = collapse(vec![vec![text("x")]], 1, 1, 1);
        assert_eq!(slice, TableSlice::Cell(text("x")));
    }

    #[test]
    fn test_collapse_single_cell_missing_row_is_null() {
        let slice = collapse(vec![], 1, 1, 1);
        assert_eq!(slice, TableSlice::Cell(CellValue::Null));
    }

    #[test]
    fn test_collapse_row_vector() {
        let slice = collapse(vec![vec![text("a"), text("b")]], 1, 2, 2);
        assert_eq!(slice, TableSlice::Row(vec![text("a"), text("b")]));
    }

    #[test]
    fn test_collapse_row_vector_missing_row_pads_nulls() {
        let slice = collapse(vec![], 1, 3, 2);
        // Padded to the clipped width, not the requested width.
        assert_eq!(slice, TableSlice::Row(vec![CellValue::Null, CellValue::Null]));
    }

    #[test]
    fn test_collapse_column_vector_skips_missing_rows() {
        let slice = collapse(vec![vec![text("a")], vec![text("b")]], 5, 1, 1);
        assert_eq!(slice, TableSlice::Column(vec![text("a"), text("b")]));
    }

    #[test]
    fn test_collapse_grid() {
        let matrix = vec![
            vec![text("a"), text("b")],
            vec![text("c"), text("d")],
        ];
        let slice = collapse(matrix.clone(), 2, 2, 2);
        assert_eq!(slice, TableSlice::Grid(matrix));
    }

    #[test]
    fn test_collapse_shape_follows_requested_width() {
        // Two columns requested but only one survived clipping: still a
        // grid, because the caller asked for a 2-D result.
        let slice = collapse(vec![vec![text("a")]], 2, 2, 1);
        assert_eq!(slice, TableSlice::Grid(vec![vec![text("a")]]));
    }

    #[test]
    fn test_select_rect_sql() {
        let rect = ReadRect {
            columns: vec!["a".to_string(), "b".to_string()],
            start_row: 3,
            num_rows: 2,
            num_cols: 2,
        };
        assert_eq!(
            select_rect_sql("t", &rect),
            r#"SELECT "a", "b" FROM "t" WHERE id >= $1 AND id < $2 ORDER BY id"#
        );
    }

    #[test]
    fn test_select_rows_sql_full_scan() {
        let sql = select_rows_sql("t", &["a".to_string()], None);
        assert_eq!(sql, r#"SELECT id, "a" FROM "t" ORDER BY id"#);
    }

    #[test]
    fn test_select_rows_sql_with_predicate() {
        let sql = select_rows_sql("t", &["a".to_string()], Some("a"));
        assert_eq!(sql, r#"SELECT id, "a" FROM "t" WHERE "a" = $1 ORDER BY id"#);
    }

    #[test]
    fn test_select_rows_sql_no_data_columns() {
        let sql = select_rows_sql("t", &[], None);
        assert_eq!(sql, r#"SELECT id FROM "t" ORDER BY id"#);
    }
}
