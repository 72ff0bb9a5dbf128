//! MySQL executor backed by a `sqlx` connection pool.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::future::BoxFuture;
use oxide_nest_core::SqlValue;
use serde_json::{Map, Value};
use sqlx::mysql::{MySqlArguments, MySqlDatabaseError, MySqlPool, MySqlRow};
use sqlx::{Column, MySql, Row as _, TypeInfo, ValueRef};

use crate::error::{NestError, Result};
use crate::executor::{Affected, Execute, Execution, Query, QueryKind, Row};

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// Runs statements on a MySQL pool.
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool.
    ///
    /// # Errors
    ///
    /// Returns a `Driver` error when the connection fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(url).await.map_err(driver_error)?;
        Ok(Self::new(pool))
    }

    /// Returns the pool.
    #[must_use]
    pub const fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

impl Execute for MySqlExecutor {
    fn execute<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Execution>> {
        Box::pin(async move {
            let statement = query
                .values
                .iter()
                .fold(sqlx::query(&query.sql), bind_value);

            if query.kind == QueryKind::Select {
                let rows = statement.fetch_all(&self.pool).await.map_err(driver_error)?;
                return rows
                    .iter()
                    .map(decode_row)
                    .collect::<Result<Vec<_>>>()
                    .map(Execution::Rows);
            }

            let done = statement.execute(&self.pool).await.map_err(driver_error)?;
            Ok(Execution::Affected(Affected {
                affected_rows: done.rows_affected(),
                insert_id: done.last_insert_id(),
            }))
        })
    }
}

fn bind_value<'q>(query: MySqlQuery<'q>, value: &SqlValue) -> MySqlQuery<'q> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::UInt(u) => query.bind(*u),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
    }
}

/// Decodes a row into a JSON object keyed by column label.
fn decode_row(row: &MySqlRow) -> Result<Row> {
    let mut out = Map::new();
    for column in row.columns() {
        let index = column.ordinal();
        let is_null = row.try_get_raw(index).map_err(driver_error)?.is_null();
        let value = if is_null {
            Value::Null
        } else {
            decode_column(row, index, column.type_info().name())?
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn decode_column(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value> {
    let value = match type_name {
        "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(index).map_err(driver_error)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Value::from(row.try_get::<i64, _>(index).map_err(driver_error)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "YEAR" => {
            Value::from(row.try_get::<u64, _>(index).map_err(driver_error)?)
        }
        "FLOAT" | "DOUBLE" => {
            let float = row.try_get::<f64, _>(index).map_err(driver_error)?;
            serde_json::Number::from_f64(float).map_or(Value::Null, Value::Number)
        }
        "DATETIME" => {
            let datetime = row.try_get::<NaiveDateTime, _>(index).map_err(driver_error)?;
            Value::String(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
        }
        "TIMESTAMP" => {
            let datetime = row.try_get::<DateTime<Utc>, _>(index).map_err(driver_error)?;
            Value::String(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
        }
        "DATE" => {
            let date = row.try_get::<NaiveDate, _>(index).map_err(driver_error)?;
            Value::String(date.to_string())
        }
        "TIME" => {
            let time = row.try_get::<NaiveTime, _>(index).map_err(driver_error)?;
            Value::String(time.to_string())
        }
        name if name.contains("BLOB") || name.contains("BINARY") => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index).map_err(driver_error)?;
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Value::String(row.try_get_unchecked::<String, _>(index).map_err(driver_error)?),
    };
    Ok(value)
}

/// Maps a driver error, naming the MySQL errors callers handle.
fn driver_error(error: sqlx::Error) -> NestError {
    let code = match &error {
        sqlx::Error::Database(db) => match db.try_downcast_ref::<MySqlDatabaseError>() {
            Some(mysql) => mysql_code(mysql.number()),
            None => db.code().map_or_else(|| String::from("ER_UNKNOWN"), |c| c.into_owned()),
        },
        _ => String::from("ER_DRIVER"),
    };
    NestError::Driver {
        code,
        message: error.to_string(),
    }
}

fn mysql_code(number: u16) -> String {
    match number {
        1062 => String::from("ER_DUP_ENTRY"),
        1364 => String::from("ER_NO_DEFAULT_FOR_FIELD"),
        other => format!("ER_{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_codes() {
        assert_eq!(mysql_code(1062), "ER_DUP_ENTRY");
        assert_eq!(mysql_code(1364), "ER_NO_DEFAULT_FOR_FIELD");
        assert_eq!(mysql_code(1213), "ER_1213");
    }

    #[test]
    fn test_non_database_errors() {
        let err = driver_error(sqlx::Error::PoolTimedOut);
        assert_eq!(err.code(), "ER_DRIVER");
        assert_eq!(err.status(), 500);
    }
}
