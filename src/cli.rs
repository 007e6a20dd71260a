//! CLI argument definitions and command dispatch.
//!
//! Thin glue over the store: each subcommand maps 1:1 to a store operation,
//! values cross the boundary as JSON, and all semantics live in
//! [`crate::store`].

use clap::{Parser, Subcommand};
use serde_json::{Value as JsonValue, json};

use crate::store::{
    CellValue, ColumnSpec, Direction, GridStore, Payload, RowStart, TableRow, TableSlice,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Connection URL or key-value string (overrides .gridstore.json and env)
    #[arg(short, long, global = true)]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a table with an identity column plus the given data columns
    CreateTable {
        table: String,
        /// Column definitions as name:TYPE, e.g. name:TEXT age:INTEGER
        #[arg(required = true)]
        columns: Vec<String>,
    },
    /// Drop a table if it exists
    DropTable { table: String },
    /// List all tables
    ListTables,
    /// Write a JSON payload (scalar, array, or array of arrays) at a cell
    Write {
        table: String,
        /// JSON payload; a bare word is treated as a string
        data: String,
        /// Starting row id, or 'next' for max(id)+1
        #[arg(long, default_value = "next")]
        row: String,
        /// Starting column index (1-based, excluding id)
        #[arg(long, default_value_t = 1)]
        col: usize,
        /// Layout for 1-D payloads: 'row' or 'column'
        #[arg(long, default_value = "row")]
        direction: String,
    },
    /// Read a rectangle of cells
    Read {
        table: String,
        #[arg(long)]
        row: i64,
        #[arg(long, default_value_t = 1)]
        col: usize,
        #[arg(long, default_value_t = 1)]
        rows: i64,
        #[arg(long, default_value_t = 1)]
        cols: usize,
    },
    /// Read an entire table ordered by id
    ReadAll { table: String },
    /// Find rows where a column equals a value
    Find {
        table: String,
        column: String,
        /// JSON value; a bare word is treated as a string
        value: String,
    },
    /// Delete rows by id
    Delete {
        table: String,
        #[arg(required = true)]
        ids: Vec<i64>,
        /// Resequence ids afterwards
        #[arg(long)]
        compact: bool,
    },
    /// Delete rows where a column equals a value
    DeleteWhere {
        table: String,
        column: String,
        /// JSON value; a bare word is treated as a string
        value: String,
        /// Resequence ids afterwards
        #[arg(long)]
        compact: bool,
    },
    /// Resequence row ids to remove gaps
    Compact { table: String },
}

impl Command {
    /// Execute against a connected store, returning printable output.
    pub async fn run(self, store: &GridStore) -> Result<String, Box<dyn std::error::Error>> {
        match self {
            Command::CreateTable { table, columns } => {
                let specs = columns
                    .iter()
                    .map(|raw| parse_column_spec(raw))
                    .collect::<Result<Vec<_>, _>>()?;
                store.create_table(&table, &specs, true).await?;
                Ok(format!("created table '{}'", table))
            }
            Command::DropTable { table } => {
                store.drop_table(&table).await?;
                Ok(format!("dropped table '{}'", table))
            }
            Command::ListTables => {
                let tables = store.list_tables().await?;
                Ok(serde_json::to_string_pretty(&tables)?)
            }
            Command::Write {
                table,
                data,
                row,
                col,
                direction,
            } => {
                let payload = payload_from_json(&parse_json_arg(&data))?;
                let start_row: RowStart = row.parse()?;
                let direction: Direction = direction.parse()?;
                store.write(&table, payload, start_row, col, direction).await?;
                Ok(format!("wrote to '{}'", table))
            }
            Command::Read {
                table,
                row,
                col,
                rows,
                cols,
            } => {
                let slice = store.read(&table, row, col, rows, cols).await?;
                Ok(serde_json::to_string_pretty(&slice_to_json(&slice))?)
            }
            Command::ReadAll { table } => {
                let rows = store.read_all(&table).await?;
                Ok(serde_json::to_string_pretty(&rows_to_json(&rows))?)
            }
            Command::Find {
                table,
                column,
                value,
            } => {
                let needle = CellValue::from_json(&parse_json_arg(&value))?;
                let rows = store.find_rows(&table, &column, &needle).await?;
                Ok(serde_json::to_string_pretty(&rows_to_json(&rows))?)
            }
            Command::Delete {
                table,
                ids,
                compact,
            } => {
                store.delete_by_ids(&table, &ids, compact).await?;
                Ok(format!("deleted {} row(s) from '{}'", ids.len(), table))
            }
            Command::DeleteWhere {
                table,
                column,
                value,
                compact,
            } => {
                let needle = CellValue::from_json(&parse_json_arg(&value))?;
                let deleted = store
                    .delete_where(&table, &column, &needle, compact)
                    .await?;
                Ok(format!("deleted {} row(s) from '{}'", deleted, table))
            }
            Command::Compact { table } => {
                store.compact(&table).await?;
                Ok(format!("compacted '{}'", table))
            }
        }
    }
}

/// Parse a `name:TYPE` column definition.
fn parse_column_spec(raw: &str) -> Result<ColumnSpec, String> {
    match raw.split_once(':') {
        Some((name, ty)) if !name.is_empty() && !ty.is_empty() => {
            Ok(ColumnSpec::new(name, ty))
        }
        _ => Err(format!(
            "invalid column definition '{}'; expected name:TYPE",
            raw
        )),
    }
}

/// Parse a CLI value argument as JSON, falling back to a bare string.
fn parse_json_arg(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

/// Decide the payload shape from the JSON structure: nested arrays are a
/// grid, a flat array is a vector, anything else is a single cell.
fn payload_from_json(value: &JsonValue) -> Result<Payload, String> {
    match value {
        JsonValue::Array(items) if !items.is_empty() && items.iter().all(JsonValue::is_array) => {
            let mut grid = Vec::with_capacity(items.len());
            for item in items {
                let Some(cells) = item.as_array() else {
                    return Err(format!("not a grid row: {}", item));
                };
                let row = cells
                    .iter()
                    .map(CellValue::from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                grid.push(row);
            }
            Ok(Payload::Grid(grid))
        }
        JsonValue::Array(items) => {
            let values = items
                .iter()
                .map(CellValue::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Payload::Vector(values))
        }
        other => Ok(Payload::Cell(CellValue::from_json(other)?)),
    }
}

fn slice_to_json(slice: &TableSlice) -> JsonValue {
    match slice {
        TableSlice::Cell(value) => value.to_json(),
        TableSlice::Row(values) | TableSlice::Column(values) => {
            JsonValue::Array(values.iter().map(CellValue::to_json).collect())
        }
        TableSlice::Grid(rows) => JsonValue::Array(
            rows.iter()
                .map(|row| JsonValue::Array(row.iter().map(CellValue::to_json).collect()))
                .collect(),
        ),
    }
}

fn rows_to_json(rows: &[TableRow]) -> JsonValue {
    JsonValue::Array(
        rows.iter()
            .map(|row| {
                json!({
                    "id": row.id,
                    "values": row.values.iter().map(CellValue::to_json).collect::<Vec<_>>(),
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_column_spec() {
        assert_eq!(
            parse_column_spec("name:TEXT").unwrap(),
            ColumnSpec::new("name", "TEXT")
        );
    }

    #[test]
    fn test_parse_column_spec_keeps_type_spaces() {
        assert_eq!(
            parse_column_spec("price:DOUBLE PRECISION").unwrap(),
            ColumnSpec::new("price", "DOUBLE PRECISION")
        );
    }

    #[test]
    fn test_parse_column_spec_rejects_bare_name() {
        assert!(parse_column_spec("name").is_err());
        assert!(parse_column_spec("name:").is_err());
        assert!(parse_column_spec(":TEXT").is_err());
    }

    #[test]
    fn test_parse_json_arg_bare_word_is_string() {
        assert_eq!(parse_json_arg("hello"), json!("hello"));
    }

    #[test]
    fn test_parse_json_arg_number() {
        assert_eq!(parse_json_arg("42"), json!(42));
    }

    #[test]
    fn test_payload_scalar() {
        assert_eq!(
            payload_from_json(&json!("x")).unwrap(),
            Payload::Cell(CellValue::Text("x".to_string()))
        );
    }

    #[test]
    fn test_payload_vector() {
        assert_eq!(
            payload_from_json(&json!([1, 2])).unwrap(),
            Payload::Vector(vec![CellValue::Int(1), CellValue::Int(2)])
        );
    }

    #[test]
    fn test_payload_grid() {
        assert_eq!(
            payload_from_json(&json!([["a"], ["b"]])).unwrap(),
            Payload::Grid(vec![
                vec![CellValue::Text("a".to_string())],
                vec![CellValue::Text("b".to_string())],
            ])
        );
    }

    #[test]
    fn test_payload_rejects_mixed_nesting() {
        assert!(payload_from_json(&json!([1, [2]])).is_err());
    }

    #[test]
    fn test_payload_empty_array_is_empty_vector() {
        assert_eq!(payload_from_json(&json!([])).unwrap(), Payload::Vector(vec![]));
    }

    #[test]
    fn test_args_parse_write() {
        let args = Args::try_parse_from([
            "gridstore", "write", "users", "[1,2]", "--row", "5", "--col", "2",
            "--direction", "column",
        ])
        .unwrap();
        match args.command {
            Command::Write { table, row, col, direction, .. } => {
                assert_eq!(table, "users");
                assert_eq!(row, "5");
                assert_eq!(col, 2);
                assert_eq!(direction, "column");
            }
            other => panic!("expected write command, got {:?}", other),
        }
    }

    #[test]
    fn test_args_parse_write_defaults() {
        let args = Args::try_parse_from(["gridstore", "write", "users", "x"]).unwrap();
        match args.command {
            Command::Write { row, col, direction, .. } => {
                assert_eq!(row, "next");
                assert_eq!(col, 1);
                assert_eq!(direction, "row");
            }
            other => panic!("expected write command, got {:?}", other),
        }
    }

    #[test]
    fn test_args_parse_create_table_requires_columns() {
        assert!(Args::try_parse_from(["gridstore", "create-table", "users"]).is_err());
    }

    #[test]
    fn test_args_parse_delete_with_compact() {
        let args =
            Args::try_parse_from(["gridstore", "delete", "users", "1", "3", "--compact"]).unwrap();
        match args.command {
            Command::Delete { ids, compact, .. } => {
                assert_eq!(ids, vec![1, 3]);
                assert!(compact);
            }
            other => panic!("expected delete command, got {:?}", other),
        }
    }

    #[test]
    fn test_slice_to_json_shapes() {
        assert_eq!(slice_to_json(&TableSlice::Cell(CellValue::Null)), json!(null));
        assert_eq!(
            slice_to_json(&TableSlice::Row(vec![CellValue::Int(1), CellValue::Int(2)])),
            json!([1, 2])
        );
        assert_eq!(
            slice_to_json(&TableSlice::Grid(vec![vec![CellValue::Int(1)]])),
            json!([[1]])
        );
    }

    #[test]
    fn test_rows_to_json() {
        let rows = vec![TableRow {
            id: 3,
            values: vec![CellValue::Text("a".to_string()), CellValue::Null],
        }];
        assert_eq!(rows_to_json(&rows), json!([{"id": 3, "values": ["a", null]}]));
    }
}
