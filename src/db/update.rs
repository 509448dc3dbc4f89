//! Sparse update statements
//!
//! Builds an UPDATE that sets only the columns a caller actually
//! supplied, leaving every other stored column untouched, and always
//! stamps the revision-time column as part of the same statement.
//!
//! There is deliberately no way to clear a column to NULL: an absent
//! field and a field set to null are the same input. Callers that need
//! to clear a value must model it as a distinguished sentinel.

use rusqlite::{Connection, ToSql};

use crate::error::ServiceError;

/// Builder for a single sparse UPDATE scoped by row id.
pub struct UpdateBuilder {
    table: &'static str,
    id: i64,
    assignments: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl UpdateBuilder {
    pub fn new(table: &'static str, id: i64) -> Self {
        Self {
            table,
            id,
            assignments: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Add an assignment for `column` when a value is supplied; a `None`
    /// leaves the stored column untouched.
    pub fn set<T: ToSql + 'static>(mut self, column: &str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.assignments.push(format!("{} = ?", column));
            self.params.push(Box::new(value));
        }
        self
    }

    /// Number of assignments collected so far (excluding the revision stamp).
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Execute the update, stamping `revision_column` with `revision_time`
    /// in the same statement. A patch with zero supplied fields still
    /// advances the revision time.
    ///
    /// Exactly one row must be affected: zero rows is NotFound, more than
    /// one means the id scoping is broken and is reported as an internal
    /// invariant violation.
    pub fn execute(
        mut self,
        conn: &Connection,
        revision_column: &str,
        revision_time: i64,
    ) -> Result<(), ServiceError> {
        self.assignments.push(format!("{} = ?", revision_column));
        self.params.push(Box::new(revision_time));
        self.params.push(Box::new(self.id));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            self.table,
            self.assignments.join(", ")
        );

        let param_refs: Vec<&dyn ToSql> = self.params.iter().map(|p| p.as_ref()).collect();

        let changed = conn
            .execute(&sql, param_refs.as_slice())
            .map_err(|e| ServiceError::Internal(format!("Update failed: {}", e)))?;

        match changed {
            1 => Ok(()),
            0 => Err(ServiceError::NotFound(format!(
                "No row in {} with the id {}",
                self.table, self.id
            ))),
            n => Err(ServiceError::Internal(format!(
                "Update on {} id {} affected {} rows",
                self.table, self.id, n
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE things (
                id INTEGER PRIMARY KEY,
                name TEXT,
                color TEXT,
                updated_time INTEGER NOT NULL
            );
            INSERT INTO things (id, name, color, updated_time) VALUES (1, 'a', 'red', 10);",
        )
        .unwrap();
        conn
    }

    fn row(conn: &Connection) -> (Option<String>, Option<String>, i64) {
        conn.query_row(
            "SELECT name, color, updated_time FROM things WHERE id = 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap()
    }

    #[test]
    fn test_only_supplied_columns_change() {
        let conn = test_conn();
        UpdateBuilder::new("things", 1)
            .set("name", Some("b".to_string()))
            .set::<String>("color", None)
            .execute(&conn, "updated_time", 20)
            .unwrap();

        let (name, color, updated) = row(&conn);
        assert_eq!(name.as_deref(), Some("b"));
        assert_eq!(color.as_deref(), Some("red"));
        assert_eq!(updated, 20);
    }

    #[test]
    fn test_empty_patch_still_stamps_revision() {
        let conn = test_conn();
        let builder = UpdateBuilder::new("things", 1);
        assert!(builder.is_empty());
        builder.execute(&conn, "updated_time", 30).unwrap();

        let (name, color, updated) = row(&conn);
        assert_eq!(name.as_deref(), Some("a"));
        assert_eq!(color.as_deref(), Some("red"));
        assert_eq!(updated, 30);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let conn = test_conn();
        let result = UpdateBuilder::new("things", 99)
            .set("name", Some("x".to_string()))
            .execute(&conn, "updated_time", 40);
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
