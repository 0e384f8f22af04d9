use chrono::NaiveDate;
use serde_json::{Map, Value};
use sqlx::mysql::MySqlArguments;
use sqlx::query::QueryAs;
use sqlx::{Executor, MySql};

use crate::error::{AppError, AppResult};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build a partial UPDATE from a JSON object
/// ===============================
///
/// Only keys listed in `allowed` may appear; `null` and missing keys leave
/// the column untouched. Returns `None` when there is nothing to update.
pub fn build_update_sql(
    table: &str,
    payload: &Map<String, Value>,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> AppResult<Option<SqlUpdate>> {
    let mut columns = Vec::new();
    let mut values = Vec::with_capacity(payload.len() + 1);

    for (key, value) in payload {
        let column = allowed
            .iter()
            .find(|c| **c == key.as_str())
            .ok_or_else(|| AppError::bad_request(format!("Unknown field: {key}")))?;

        let bound = match value {
            Value::Null => continue,
            Value::String(s) => SqlValue::String(s.clone()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::I64(i)
                } else if let Some(u) = n.as_u64() {
                    SqlValue::U64(u)
                } else if let Some(f) = n.as_f64() {
                    SqlValue::F64(f)
                } else {
                    return Err(AppError::bad_request(format!("Invalid number for {key}")));
                }
            }
            Value::Bool(b) => SqlValue::Bool(*b),
            _ => return Err(AppError::bad_request("Unsupported JSON value type")),
        };

        columns.push(format!("{column} = ?"));
        values.push(bound);
    }

    if columns.is_empty() {
        return Ok(None);
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        columns.join(", "),
        id_column
    );
    values.push(SqlValue::U64(id_value));

    Ok(Some(SqlUpdate { sql, values }))
}

/// Typed bind value for dynamically built WHERE clauses
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    U64(u64),
    I64(i64),
    Str(String),
    Date(NaiveDate),
}

/// Binds every filter value in order.
pub fn bind_filters<'q, O>(
    mut query: QueryAs<'q, MySql, O, MySqlArguments>,
    args: &'q [FilterValue],
) -> QueryAs<'q, MySql, O, MySqlArguments> {
    for arg in args {
        query = match arg {
            FilterValue::U64(v) => query.bind(*v),
            FilterValue::I64(v) => query.bind(*v),
            FilterValue::Str(s) => query.bind(s.as_str()),
            FilterValue::Date(d) => query.bind(*d),
        };
    }
    query
}

/// `%term%` for a case-insensitive LIKE; wildcards in the term match literally.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// " WHERE a AND b", or an empty string without conditions.
pub fn where_clause(conditions: &[&str]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

/// Rejects anything that is not a JSON object.
pub fn as_object(payload: &Value) -> AppResult<&Map<String, Value>> {
    payload
        .as_object()
        .ok_or_else(|| AppError::bad_request("Payload must be a JSON object"))
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update<'e, E>(executor: E, update: SqlUpdate) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
        };
    }

    let result = query.execute(executor).await?;
    Ok(result.rows_affected())
}
