//! Relational record table operations.
//!
//! One row per record, keyed by an autoincrement id. Each operation is a
//! single statement; there are no transactions or batches.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::RecordFields;

/// A row of the `records` table.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
    pub id: i64,
    pub user_id: String,
    pub age: u32,
    pub date: String,
    pub disease: String,
    pub hospital: String,
    pub doctor: String,
    pub file: Option<String>,
    pub created_at: String,
}

impl RecordRow {
    /// Record payload carried by this row.
    pub fn fields(&self) -> RecordFields {
        RecordFields {
            age: self.age,
            date: self.date.clone(),
            disease: self.disease.clone(),
            hospital: self.hospital.clone(),
            doctor: self.doctor.clone(),
            file_ref: self.file.clone(),
        }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, age, date, disease, hospital, doctor, file, created_at FROM records";

fn map_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        age: row.get(2)?,
        date: row.get(3)?,
        disease: row.get(4)?,
        hospital: row.get(5)?,
        doctor: row.get(6)?,
        file: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl Database {
    /// Insert a record row and return its assigned id.
    pub fn insert_record_row(&self, user_id: &str, fields: &RecordFields) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO records (user_id, age, date, disease, hospital, doctor, file)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                user_id,
                fields.age,
                fields.date,
                fields.disease,
                fields.hospital,
                fields.doctor,
                fields.file_ref,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a record row by id.
    pub fn get_record_row(&self, id: i64) -> DbResult<Option<RecordRow>> {
        self.conn
            .query_row(&format!("{} WHERE id = ?", SELECT_COLUMNS), [id], map_row)
            .optional()
            .map_err(Into::into)
    }

    /// List all record rows owned by a user, oldest first.
    pub fn list_record_rows(&self, user_id: &str) -> DbResult<Vec<RecordRow>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE user_id = ? ORDER BY id", SELECT_COLUMNS))?;

        let rows = stmt.query_map([user_id], map_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Replace every field of a record row.
    pub fn update_record_row(&self, id: i64, fields: &RecordFields) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE records SET
                age = ?2,
                date = ?3,
                disease = ?4,
                hospital = ?5,
                doctor = ?6,
                file = ?7
            WHERE id = ?1
            "#,
            params![
                id,
                fields.age,
                fields.date,
                fields.disease,
                fields.hospital,
                fields.doctor,
                fields.file_ref,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete a record row.
    pub fn delete_record_row(&self, id: i64) -> DbResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM records WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}
