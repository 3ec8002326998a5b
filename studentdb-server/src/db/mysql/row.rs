//! Dynamic MySQL row to JSON conversion
//!
//! The raw-SQL endpoint returns whatever columns the caller selected, so
//! values are decoded by the column's reported type name rather than a
//! compile-time struct.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};
use serde_json::{Number, Value};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::db::JsonRow;

/// Convert one row into a JSON object keyed by column name.
pub fn row_to_json(row: &MySqlRow) -> Result<JsonRow, sqlx::Error> {
    let mut object = JsonRow::new();
    for column in row.columns() {
        let value = column_value(row, column.ordinal(), column.type_info().name())?;
        object.insert(column.name().to_string(), value);
    }
    Ok(object)
}

fn column_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    // Unchecked decodes: the type name already told us what the bytes are,
    // and integer decoding accepts every width.
    let value = match type_name {
        "BOOLEAN" => Value::Bool(row.try_get_unchecked::<bool, _>(index)?),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => Value::from(row.try_get_unchecked::<u64, _>(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Value::from(row.try_get_unchecked::<i64, _>(index)?)
        }
        "FLOAT" => float(f64::from(row.try_get_unchecked::<f32, _>(index)?)),
        "DOUBLE" => float(row.try_get_unchecked::<f64, _>(index)?),
        "DECIMAL" => Value::String(row.try_get_unchecked::<String, _>(index)?),
        "DATETIME" | "TIMESTAMP" => calendar(row.try_get_unchecked::<NaiveDateTime, _>(index), |at| {
            at.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true)
        })?,
        "DATE" => calendar(row.try_get_unchecked::<NaiveDate, _>(index), |date| date.to_string())?,
        "TIME" => Value::String(row.try_get_unchecked::<NaiveTime, _>(index)?.to_string()),
        "JSON" => {
            let text = row.try_get_unchecked::<String, _>(index)?;
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => bytes(&row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => text_or_bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
    };
    Ok(value)
}

/// Zero dates (`0000-00-00`) have no calendar value and read as null.
fn calendar<T>(
    decoded: Result<T, sqlx::Error>,
    render: impl FnOnce(T) -> String,
) -> Result<Value, sqlx::Error> {
    match decoded {
        Ok(value) => Ok(Value::String(render(value))),
        Err(sqlx::Error::ColumnDecode { .. }) => Ok(Value::Null),
        Err(err) => Err(err),
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

fn bytes(raw: &[u8]) -> Value {
    Value::String(BASE64.encode(raw))
}

fn text_or_bytes(raw: Vec<u8>) -> Value {
    match String::from_utf8(raw) {
        Ok(text) => Value::String(text),
        Err(err) => bytes(err.as_bytes()),
    }
}
