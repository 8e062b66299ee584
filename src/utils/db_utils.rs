use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use sqlx::types::Json;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum UpdateError {
    #[error("no fields provided for update")]
    Empty,
    #[error("column {0} may not be updated")]
    ColumnNotAllowed(String),
}

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Json(Value),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                SqlValue::Timestamp(dt.with_timezone(&Utc))
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::I64(i),
            None => SqlValue::F64(n.as_f64().unwrap_or_default()),
        },
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        // balances and date lists live in JSON columns
        Value::Array(_) | Value::Object(_) => SqlValue::Json(value.clone()),
    }
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Column names are interpolated, so every key must appear in `allowed`.
pub fn build_update_sql(
    table: &str,
    updates: &Map<String, Value>,
    allowed: &[&str],
    id_column: &str,
    id_value: &str,
) -> Result<SqlUpdate, UpdateError> {
    if updates.is_empty() {
        return Err(UpdateError::Empty);
    }

    if let Some(column) = updates.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(UpdateError::ColumnNotAllowed(column.clone()));
    }

    // Build SET clause
    let set_clause = updates
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values: Vec<SqlValue> = updates.values().map(to_sql_value).collect();

    // WHERE id = ?
    values.push(SqlValue::String(id_value.to_string()));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
            SqlValue::Json(v) => query.bind(Json(v)),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}
