//! Coordinate resolution: payload shape + start cell → concrete addresses.
//!
//! Resolution is pure. Given the table's ordered data columns and a payload,
//! it produces either per-row update plans (write path) or a column slice
//! plus id range (read path). The database is never touched here.
//!
//! # Resolution rules
//!
//! - `start_col` must satisfy `1 <= start_col <= columns.len()`; anything
//!   else is a [`StoreError::Bounds`], never clamped.
//! - A vector written with [`Direction::Row`] maps values to columns
//!   `start_col, start_col + 1, ...`; values whose target index passes the
//!   last column are silently dropped. The same truncation applies to each
//!   row of a grid.
//! - A vector written with [`Direction::Column`] maps values to the same
//!   column at row ids `start_row, start_row + 1, ...`. Nothing truncates in
//!   that direction; rows are materialized on demand.
//! - A grid assigns the outer element at offset `r` to row `start_row + r`
//!   and resolves it by the row rule.

use std::str::FromStr;

use super::StoreError;
use super::value::CellValue;

/// The shape of data being written, decided by the caller at the call site.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A single cell value.
    Cell(CellValue),
    /// A 1-D vector; [`Direction`] chooses how it is laid out.
    Vector(Vec<CellValue>),
    /// A 2-D grid in row-major order.
    Grid(Vec<Vec<CellValue>>),
}

/// Layout of a 1-D vector. Meaningless for cells and grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Successive values go to successive columns of one row.
    Row,
    /// Successive values go to the same column of successive rows.
    Column,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "row" => Ok(Direction::Row),
            "column" => Ok(Direction::Column),
            other => Err(format!("direction must be 'row' or 'column', got '{}'", other)),
        }
    }
}

/// Starting row for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStart {
    /// The next-id sentinel: resolves to `max(id) + 1` (or 1 for an empty
    /// table) at the moment of the call. This is a read-then-write, not a
    /// reserved sequence value: two concurrent `Next` writers can compute
    /// the same id, in which case the placeholder insert no-ops for one of
    /// them and their writes merge into a single row. Callers needing strict
    /// uniqueness must serialize externally.
    Next,
    /// An explicit row id.
    At(i64),
}

impl FromStr for RowStart {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("next") {
            return Ok(RowStart::Next);
        }
        s.parse::<i64>()
            .map(RowStart::At)
            .map_err(|_| format!("start row must be an integer or 'next', got '{}'", s))
    }
}

/// All column assignments for one touched row.
///
/// `sets` may be empty (a fully truncated grid row); the row is still
/// materialized as a placeholder, but no UPDATE is issued for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub row_id: i64,
    pub sets: Vec<(String, CellValue)>,
}

/// A resolved read rectangle: the concrete columns to select and the id
/// range to scan. `num_cols` keeps the *requested* width, which drives
/// shape collapsing even when the column slice was clipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRect {
    pub columns: Vec<String>,
    pub start_row: i64,
    pub num_rows: i64,
    pub num_cols: usize,
}

fn check_col_bounds(columns: &[String], start_col: usize) -> Result<(), StoreError> {
    if start_col < 1 || start_col > columns.len() {
        return Err(StoreError::Bounds {
            start_col,
            columns: columns.len(),
        });
    }
    Ok(())
}

/// Row id at `offset` rows below `start_row`, or [`StoreError::RowOverflow`]
/// when the sum leaves the `i64` id space.
fn row_at(start_row: i64, offset: usize) -> Result<i64, StoreError> {
    i64::try_from(offset)
        .ok()
        .and_then(|offset| start_row.checked_add(offset))
        .ok_or(StoreError::RowOverflow { start_row })
}

/// Map one vector onto the columns of one row, truncating past the end.
fn row_sets(columns: &[String], start_col: usize, values: &[CellValue]) -> Vec<(String, CellValue)> {
    values
        .iter()
        .enumerate()
        .filter_map(|(offset, value)| {
            columns
                .get(start_col - 1 + offset)
                .map(|name| (name.clone(), value.clone()))
        })
        .collect()
}

/// Resolve a write into per-row update plans.
///
/// `start_row` must already be concrete; the `Next` sentinel is resolved by
/// the writer before calling here (it needs the database).
pub fn resolve_write(
    columns: &[String],
    data: &Payload,
    start_row: i64,
    start_col: usize,
    direction: Direction,
) -> Result<Vec<RowUpdate>, StoreError> {
    check_col_bounds(columns, start_col)?;

    let updates = match data {
        Payload::Cell(value) => vec![RowUpdate {
            row_id: start_row,
            sets: vec![(columns[start_col - 1].clone(), value.clone())],
        }],
        Payload::Vector(values) => match direction {
            Direction::Row => vec![RowUpdate {
                row_id: start_row,
                sets: row_sets(columns, start_col, values),
            }],
            Direction::Column => {
                let name = &columns[start_col - 1];
                let mut updates = Vec::with_capacity(values.len());
                for (offset, value) in values.iter().enumerate() {
                    updates.push(RowUpdate {
                        row_id: row_at(start_row, offset)?,
                        sets: vec![(name.clone(), value.clone())],
                    });
                }
                updates
            }
        },
        Payload::Grid(rows) => {
            let mut updates = Vec::with_capacity(rows.len());
            for (offset, row) in rows.iter().enumerate() {
                updates.push(RowUpdate {
                    row_id: row_at(start_row, offset)?,
                    sets: row_sets(columns, start_col, row),
                });
            }
            updates
        }
    };

    Ok(updates)
}

/// Resolve a read rectangle, clipping the column slice to the table width.
pub fn resolve_read(
    columns: &[String],
    start_row: i64,
    start_col: usize,
    num_rows: i64,
    num_cols: usize,
) -> Result<ReadRect, StoreError> {
    check_col_bounds(columns, start_col)?;
    if num_rows < 1 || num_cols < 1 {
        return Err(StoreError::InvalidRect { num_rows, num_cols });
    }
    if start_row.checked_add(num_rows).is_none() {
        return Err(StoreError::RowOverflow { start_row });
    }

    let end_col = (start_col + num_cols - 1).min(columns.len());
    let selected = columns[start_col - 1..end_col].to_vec();

    Ok(ReadRect {
        columns: selected,
        start_row,
        num_rows,
        num_cols,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cols(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("c{}", i)).collect()
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_scalar_resolves_to_one_cell() {
        let updates =
            resolve_write(&cols(3), &Payload::Cell(text("x")), 5, 2, Direction::Row).unwrap();
        assert_eq!(
            updates,
            vec![RowUpdate {
                row_id: 5,
                sets: vec![("c2".to_string(), text("x"))],
            }]
        );
    }

    #[test]
    fn test_row_vector_maps_successive_columns() {
        let data = Payload::Vector(vec![text("a"), text("b")]);
        let updates = resolve_write(&cols(3), &data, 1, 2, Direction::Row).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].row_id, 1);
        assert_eq!(
            updates[0].sets,
            vec![
                ("c2".to_string(), text("a")),
                ("c3".to_string(), text("b")),
            ]
        );
    }

    #[test]
    fn test_row_vector_truncates_past_last_column() {
        let data = Payload::Vector(vec![text("a"), text("b"), text("c"), text("d")]);
        let updates = resolve_write(&cols(3), &data, 1, 2, Direction::Row).unwrap();
        // c at index 4 fits nowhere; only columns 2 and 3 receive values.
        assert_eq!(updates[0].sets.len(), 2);
    }

    #[test]
    fn test_column_vector_maps_successive_rows() {
        let data = Payload::Vector(vec![CellValue::Int(1), CellValue::Int(2), CellValue::Int(3)]);
        let updates = resolve_write(&cols(2), &data, 10, 2, Direction::Column).unwrap();
        assert_eq!(updates.len(), 3);
        for (i, update) in updates.iter().enumerate() {
            assert_eq!(update.row_id, 10 + i as i64);
            assert_eq!(update.sets, vec![("c2".to_string(), CellValue::Int(1 + i as i64))]);
        }
    }

    #[test]
    fn test_grid_is_nested_row_rule() {
        let data = Payload::Grid(vec![
            vec![text("a"), text("b")],
            vec![text("c"), text("d")],
        ]);
        let updates = resolve_write(&cols(2), &data, 7, 1, Direction::Row).unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].row_id, 7);
        assert_eq!(updates[1].row_id, 8);
        assert_eq!(updates[1].sets[1], ("c2".to_string(), text("d")));
    }

    #[test]
    fn test_grid_rows_truncate_independently() {
        let data = Payload::Grid(vec![
            vec![text("a"), text("b"), text("x")],
            vec![text("c")],
        ]);
        let updates = resolve_write(&cols(2), &data, 1, 1, Direction::Row).unwrap();
        assert_eq!(updates[0].sets.len(), 2);
        assert_eq!(updates[1].sets.len(), 1);
    }

    #[test]
    fn test_fully_truncated_row_keeps_placeholder() {
        // Starting at the last column, the second and third values of each
        // row are dropped; an empty second row still materializes.
        let data = Payload::Grid(vec![vec![text("a"), text("b")], vec![]]);
        let updates = resolve_write(&cols(1), &data, 1, 1, Direction::Row).unwrap();
        assert_eq!(updates.len(), 2);
        assert!(updates[1].sets.is_empty());
    }

    #[rstest]
    #[case(0)]
    #[case(4)]
    fn test_write_col_out_of_bounds(#[case] start_col: usize) {
        let result = resolve_write(
            &cols(3),
            &Payload::Cell(text("x")),
            1,
            start_col,
            Direction::Row,
        );
        assert!(matches!(
            result,
            Err(StoreError::Bounds { start_col: s, columns: 3 }) if s == start_col
        ));
    }

    #[rstest]
    #[case(0)]
    #[case(4)]
    fn test_read_col_out_of_bounds(#[case] start_col: usize) {
        let result = resolve_read(&cols(3), 1, start_col, 1, 1);
        assert!(matches!(result, Err(StoreError::Bounds { .. })));
    }

    #[test]
    fn test_read_clips_column_slice() {
        let rect = resolve_read(&cols(3), 1, 2, 5, 10).unwrap();
        assert_eq!(rect.columns, vec!["c2".to_string(), "c3".to_string()]);
        // Requested width survives for shape collapsing.
        assert_eq!(rect.num_cols, 10);
    }

    #[test]
    fn test_column_vector_row_overflow() {
        let data = Payload::Vector(vec![CellValue::Int(1), CellValue::Int(2)]);
        let result = resolve_write(&cols(1), &data, i64::MAX, 1, Direction::Column);
        assert!(matches!(
            result,
            Err(StoreError::RowOverflow { start_row: i64::MAX })
        ));
    }

    #[test]
    fn test_grid_row_overflow() {
        let data = Payload::Grid(vec![vec![text("a")], vec![text("b")]]);
        let result = resolve_write(&cols(1), &data, i64::MAX, 1, Direction::Row);
        assert!(matches!(result, Err(StoreError::RowOverflow { .. })));
    }

    #[test]
    fn test_read_row_range_overflow() {
        let result = resolve_read(&cols(1), i64::MAX, 1, 2, 1);
        assert!(matches!(
            result,
            Err(StoreError::RowOverflow { start_row: i64::MAX })
        ));
    }

    #[test]
    fn test_read_zero_rows_is_invalid() {
        assert!(matches!(
            resolve_read(&cols(3), 1, 1, 0, 1),
            Err(StoreError::InvalidRect { .. })
        ));
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("row".parse::<Direction>().unwrap(), Direction::Row);
        assert_eq!("column".parse::<Direction>().unwrap(), Direction::Column);
        assert!("diagonal".parse::<Direction>().is_err());
    }

    #[test]
    fn test_row_start_from_str() {
        assert_eq!("next".parse::<RowStart>().unwrap(), RowStart::Next);
        assert_eq!("NEXT".parse::<RowStart>().unwrap(), RowStart::Next);
        assert_eq!("42".parse::<RowStart>().unwrap(), RowStart::At(42));
        assert!("soon".parse::<RowStart>().is_err());
    }
}
