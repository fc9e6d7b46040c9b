//! Decoding of PostgreSQL rows into pipeline values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use profitlens_core::{RowSet, Value};
use profitlens_shared::{PipelineError, PipelineResult};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Column names of a result row, in select order.
pub(crate) fn column_names(row: &PgRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Builds a row set from fetched rows. `columns` is used as-is, so callers
/// can supply names for an empty result.
pub(crate) fn row_set(columns: Vec<String>, rows: &[PgRow]) -> PipelineResult<RowSet> {
    let width = columns.len();
    let mut out = RowSet::new(columns);
    for row in rows {
        let values = (0..width)
            .map(|idx| decode_cell(row, idx))
            .collect::<PipelineResult<Vec<_>>>()?;
        out.push(values)?;
    }
    Ok(out)
}

fn decode_cell(row: &PgRow, idx: usize) -> PipelineResult<Value> {
    let raw = row.try_get_raw(idx).map_err(decode_err)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let column = &row.columns()[idx];
    let value = match column.type_info().name() {
        "INT2" => Value::Int(i64::from(get::<i16>(row, idx)?)),
        "INT4" => Value::Int(i64::from(get::<i32>(row, idx)?)),
        "INT8" => Value::Int(get::<i64>(row, idx)?),
        "BOOL" => Value::Int(i64::from(get::<bool>(row, idx)?)),
        "NUMERIC" => Value::Decimal(get::<Decimal>(row, idx)?),
        "FLOAT4" => float(column.name(), Decimal::from_f32(get::<f32>(row, idx)?))?,
        "FLOAT8" => float(column.name(), Decimal::from_f64(get::<f64>(row, idx)?))?,
        "DATE" => Value::Date(get::<NaiveDate>(row, idx)?),
        "TIMESTAMP" => Value::Date(get::<NaiveDateTime>(row, idx)?.date()),
        "TIMESTAMPTZ" => Value::Date(get::<DateTime<Utc>>(row, idx)?.date_naive()),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::Text(get::<String>(row, idx)?),
        other => {
            return Err(PipelineError::Store(format!(
                "column `{}` has unsupported type {other}",
                column.name()
            )));
        }
    };
    Ok(value)
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> PipelineResult<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(idx).map_err(decode_err)
}

fn float(column: &str, value: Option<Decimal>) -> PipelineResult<Value> {
    value
        .map(Value::Decimal)
        .ok_or_else(|| PipelineError::Store(format!("column `{column}` holds a non-finite float")))
}

#[allow(clippy::needless_pass_by_value)]
fn decode_err(err: sqlx::Error) -> PipelineError {
    PipelineError::Store(format!("cannot decode row: {err}"))
}
