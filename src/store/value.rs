//! Cell value representation and wire conversion.
//!
//! Cells are dynamically typed: the column type is only known at runtime,
//! from the catalog. [`CellValue`] is the tagged union covering the column
//! types the store supports, with:
//! - type-directed parameter encoding (`ToSql`), so a `CellValue::Int` binds
//!   correctly whether the target column is `SMALLINT` or `BIGINT`; a value
//!   that does not fit the target column errors instead of wrapping
//! - row decoding keyed on the result column's declared type
//! - lossless JSON conversion for the CLI surface

use bytes::BytesMut;
use serde_json::Value as JsonValue;
use tokio_postgres::Row;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

use super::StoreError;

/// A single cell value.
///
/// `Null` is both "column is SQL NULL" and "no row matched" on reads; the
/// two are indistinguishable by design (row-range reads over nonexistent
/// ids return nulls rather than erroring).
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

fn is_int_target(ty: &Type) -> bool {
    *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8
}

fn is_float_target(ty: &Type) -> bool {
    *ty == Type::FLOAT4 || *ty == Type::FLOAT8
}

fn is_text_target(ty: &Type) -> bool {
    *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR
}

impl ToSql for CellValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            CellValue::Null => Ok(IsNull::Yes),
            CellValue::Bool(b) if *ty == Type::BOOL => b.to_sql(ty, out),
            CellValue::Int(i) if *ty == Type::INT2 => i16::try_from(*i)
                .map_err(|_| format!("value {} out of range for {}", i, ty))?
                .to_sql(ty, out),
            CellValue::Int(i) if *ty == Type::INT4 => i32::try_from(*i)
                .map_err(|_| format!("value {} out of range for {}", i, ty))?
                .to_sql(ty, out),
            CellValue::Int(i) if *ty == Type::INT8 => i.to_sql(ty, out),
            CellValue::Int(i) if *ty == Type::FLOAT4 => (*i as f32).to_sql(ty, out),
            CellValue::Int(i) if *ty == Type::FLOAT8 => (*i as f64).to_sql(ty, out),
            CellValue::Float(f) if *ty == Type::FLOAT4 => (*f as f32).to_sql(ty, out),
            CellValue::Float(f) if *ty == Type::FLOAT8 => f.to_sql(ty, out),
            CellValue::Text(s) if is_text_target(ty) => s.to_sql(ty, out),
            CellValue::Bytes(b) if *ty == Type::BYTEA => b.to_sql(ty, out),
            other => Err(format!("cannot encode {:?} as {}", other, ty).into()),
        }
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::BOOL
            || is_int_target(ty)
            || is_float_target(ty)
            || is_text_target(ty)
            || *ty == Type::BYTEA
    }

    to_sql_checked!();
}

/// Decode the value at `idx` of a result row by its declared column type.
///
/// SQL NULL of any supported type decodes to [`CellValue::Null`]. A column
/// whose type is outside the supported set fails with
/// [`StoreError::UnsupportedColumnType`].
pub fn decode(row: &Row, idx: usize) -> Result<CellValue, StoreError> {
    let column = &row.columns()[idx];
    let ty = column.type_();

    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(CellValue::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map(|v| CellValue::Int(v as i64))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?
            .map(|v| CellValue::Int(v as i64))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(CellValue::Int)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?
            .map(|v| CellValue::Float(v as f64))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(CellValue::Float)
    } else if is_text_target(ty) {
        row.try_get::<_, Option<String>>(idx)?.map(CellValue::Text)
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)?.map(CellValue::Bytes)
    } else {
        return Err(StoreError::UnsupportedColumnType {
            column: column.name().to_string(),
            ty: ty.to_string(),
        });
    };

    Ok(value.unwrap_or(CellValue::Null))
}

impl CellValue {
    /// Convert a JSON value into a cell value.
    ///
    /// Whole numbers become `Int`, other numbers `Float`. Arrays and objects
    /// are not cells (arrays are payload shapes, handled a level up).
    pub fn from_json(value: &JsonValue) -> Result<Self, String> {
        match value {
            JsonValue::Null => Ok(CellValue::Null),
            JsonValue::Bool(b) => Ok(CellValue::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(CellValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(CellValue::Float(f))
                } else {
                    Err(format!("number out of range: {}", n))
                }
            }
            JsonValue::String(s) => Ok(CellValue::Text(s.clone())),
            JsonValue::Array(_) | JsonValue::Object(_) => {
                Err(format!("not a cell value: {}", value))
            }
        }
    }

    /// Convert to JSON. Bytes become an array of numbers; a non-finite
    /// float becomes null (JSON has no representation for it).
    pub fn to_json(&self) -> JsonValue {
        match self {
            CellValue::Null => JsonValue::Null,
            CellValue::Bool(b) => JsonValue::Bool(*b),
            CellValue::Int(i) => JsonValue::from(*i),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            CellValue::Text(s) => JsonValue::String(s.clone()),
            CellValue::Bytes(b) => {
                JsonValue::Array(b.iter().map(|byte| JsonValue::from(*byte)).collect())
            }
        }
    }
}
