// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! SQLite table datasource.
//!
//! Payloads map column names to values:
//!
//! | operation | payload                                   | result            |
//! |-----------|-------------------------------------------|-------------------|
//! | create    | `{"col": value, ...}`                     | new row id        |
//! | read      | `null` or `{"col": value, ...}` (equality) | array of rows     |
//! | update    | `{"data": {...}, "where": {...}}`         | any row changed   |
//! | delete    | `{"col": value, ...}`                     | any row removed   |

use httpstack::datasource::{guard_writable, payload_object};
use httpstack::{Datasource, Error, Result};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use serde_json::{Map, Value};
use std::path::Path;

/// One table of a SQLite database.
pub struct SqliteTable {
    conn: Connection,
    table: String,
    read_only: bool,
}

fn db_error(e: rusqlite::Error) -> Error {
    Error::Datasource(e.to_string())
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*`.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn identifier(name: &str) -> Result<String> {
    if is_identifier(name) {
        Ok(format!("\"{}\"", name))
    } else {
        Err(Error::MalformedPayload(format!("'{}' is not a valid column name", name)))
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

/// Builds `"a" = ?n AND "b" = ?m` starting at parameter `first`.
fn where_clause(filter: &Map<String, Value>, first: usize) -> Result<(String, Vec<SqlValue>)> {
    let mut terms = Vec::with_capacity(filter.len());
    let mut params = Vec::with_capacity(filter.len());
    for (column, value) in filter {
        let column = identifier(column)?;
        if value.is_null() {
            terms.push(format!("{} IS NULL", column));
        } else {
            params.push(to_sql(value));
            terms.push(format!("{} = ?{}", column, first + params.len() - 1));
        }
    }
    Ok((terms.join(" AND "), params))
}

impl SqliteTable {
    /// Opens `table` in the database file at `path`.
    ///
    /// Fails with [`Error::NotFound`] when the file or the table is missing.
    pub fn open(path: impl AsRef<Path>, table: &str, read_only: bool) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::NotFound(format!("database {}", path.display())));
        }
        let flags = if read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        let conn = Connection::open_with_flags(path, flags).map_err(db_error)?;
        Self::from_connection(conn, table, read_only)
    }

    /// Wraps an open connection.
    pub fn from_connection(conn: Connection, table: &str, read_only: bool) -> Result<Self> {
        if !is_identifier(table) {
            return Err(Error::Datasource(format!("'{}' is not a valid table name", table)));
        }
        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .map_err(db_error)?;
        if exists == 0 {
            return Err(Error::NotFound(format!("table '{}'", table)));
        }
        Ok(Self {
            conn,
            table: table.to_string(),
            read_only,
        })
    }

    /// The table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn select(&self, filter: Option<&Map<String, Value>>) -> Result<Vec<Value>> {
        let (clause, params) = match filter {
            Some(filter) if !filter.is_empty() => {
                let (terms, params) = where_clause(filter, 1)?;
                (format!(" WHERE {}", terms), params)
            }
            _ => (String::new(), Vec::new()),
        };
        let sql = format!("SELECT * FROM \"{}\"{}", self.table, clause);
        tracing::debug!("{}", sql);

        let mut stmt = self.conn.prepare(&sql).map_err(db_error)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt.query(params_from_iter(params)).map_err(db_error)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(db_error)? {
            let mut record = Map::new();
            for (i, column) in columns.iter().enumerate() {
                record.insert(column.clone(), from_sql(row.get_ref(i).map_err(db_error)?));
            }
            out.push(Value::Object(record));
        }
        Ok(out)
    }
}

impl Datasource for SqliteTable {
    fn create(&mut self, payload: Value) -> Result<Value> {
        guard_writable(self, "create")?;
        let record = payload_object(payload, "row")?;
        let columns = record
            .keys()
            .map(|c| identifier(c))
            .collect::<Result<Vec<_>>>()?;
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders.join(", ")
        );
        tracing::debug!("{}", sql);
        self.conn
            .execute(&sql, params_from_iter(record.values().map(to_sql)))
            .map_err(db_error)?;
        Ok(Value::from(self.conn.last_insert_rowid()))
    }

    fn read(&mut self, query: &Value) -> Result<Value> {
        let rows = match query {
            Value::Null => self.select(None)?,
            Value::Object(filter) => self.select(Some(filter))?,
            other => {
                return Err(Error::MalformedPayload(format!(
                    "table query must be null or an object, got {}",
                    other
                )))
            }
        };
        Ok(Value::Array(rows))
    }

    fn update(&mut self, payload: Value) -> Result<bool> {
        guard_writable(self, "update")?;
        let mut payload = payload_object(payload, "update")?;
        let data = payload_object(payload.remove("data").unwrap_or(Value::Null), "update data")?;
        let filter = match payload.remove("where") {
            Some(Value::Object(filter)) => filter,
            None | Some(Value::Null) => Map::new(),
            Some(other) => {
                return Err(Error::MalformedPayload(format!(
                    "update 'where' must be an object, got {}",
                    other
                )))
            }
        };

        let mut assignments = Vec::with_capacity(data.len());
        for (i, column) in data.keys().enumerate() {
            assignments.push(format!("{} = ?{}", identifier(column)?, i + 1));
        }
        let mut params: Vec<SqlValue> = data.values().map(to_sql).collect();
        let mut sql = format!("UPDATE \"{}\" SET {}", self.table, assignments.join(", "));
        if !filter.is_empty() {
            let (terms, filter_params) = where_clause(&filter, params.len() + 1)?;
            sql.push_str(" WHERE ");
            sql.push_str(&terms);
            params.extend(filter_params);
        }
        tracing::debug!("{}", sql);
        let changed = self
            .conn
            .execute(&sql, params_from_iter(params))
            .map_err(db_error)?;
        Ok(changed > 0)
    }

    fn delete(&mut self, payload: Value) -> Result<bool> {
        guard_writable(self, "delete")?;
        let filter = payload_object(payload, "delete filter")?;
        let (terms, params) = where_clause(&filter, 1)?;
        let sql = format!("DELETE FROM \"{}\" WHERE {}", self.table, terms);
        tracing::debug!("{}", sql);
        let removed = self
            .conn
            .execute(&sql, params_from_iter(params))
            .map_err(db_error)?;
        Ok(removed > 0)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pages() -> SqliteTable {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE pages (id INTEGER PRIMARY KEY, slug TEXT, title TEXT, views INTEGER);
             INSERT INTO pages (slug, title, views) VALUES ('home', 'Home', 3), ('about', 'About', NULL);",
        )
        .unwrap();
        SqliteTable::from_connection(conn, "pages", false).unwrap()
    }

    #[test]
    fn test_read_all_and_filtered() {
        let mut table = pages();
        assert_eq!(table.read(&Value::Null).unwrap().as_array().unwrap().len(), 2);

        let rows = table.read(&json!({"slug": "home"})).unwrap();
        assert_eq!(rows, json!([{"id": 1, "slug": "home", "title": "Home", "views": 3}]));

        let rows = table.read(&json!({"views": null})).unwrap();
        assert_eq!(rows[0]["slug"], "about");
    }

    #[test]
    fn test_create_update_delete() {
        let mut table = pages();
        let id = table.create(json!({"slug": "blog", "title": "Blog"})).unwrap();
        assert_eq!(id, json!(3));

        assert!(table
            .update(json!({"data": {"title": "News"}, "where": {"slug": "blog"}}))
            .unwrap());
        assert_eq!(table.read(&json!({"id": 3})).unwrap()[0]["title"], "News");
        assert!(!table
            .update(json!({"data": {"title": "x"}, "where": {"slug": "none"}}))
            .unwrap());

        assert!(table.delete(json!({"slug": "blog"})).unwrap());
        assert!(!table.delete(json!({"slug": "blog"})).unwrap());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let mut table = pages();
        table.set_read_only(true);
        assert!(matches!(table.create(json!({"slug": "x"})), Err(Error::ReadOnlyViolation(_))));
        assert!(matches!(table.delete(json!({"slug": "home"})), Err(Error::ReadOnlyViolation(_))));
        assert_eq!(table.read(&Value::Null).unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_rejects_bad_identifiers_and_payloads() {
        let mut table = pages();
        assert!(matches!(
            table.read(&json!({"slug; DROP TABLE pages": "x"})),
            Err(Error::MalformedPayload(_))
        ));
        assert!(matches!(table.read(&json!("home")), Err(Error::MalformedPayload(_))));
        assert!(matches!(table.delete(json!({})), Err(Error::MalformedPayload(_))));
    }

    #[test]
    fn test_missing_table_is_not_found() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteTable::from_connection(conn, "nope", true).err().unwrap();
        assert!(err.is_not_found());
    }
}
