//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{normalize_name, normalize_phone, Patient};

const PATIENT_COLUMNS: &str = r#"
    id, name, age, phone, occupation, address,
    branch_id, registered_at, created_by_id, created_by_name
"#;

impl Database {
    /// Insert a new patient. A duplicate (name, phone) pair is a conflict.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, name, name_key, age, phone, phone_key, occupation, address,
                branch_id, registered_at, created_by_id, created_by_name
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                patient.id,
                patient.name,
                patient.normalized_name(),
                patient.age,
                patient.phone,
                patient.normalized_phone(),
                patient.occupation,
                patient.address,
                patient.branch_id,
                patient.registered_at,
                patient.created_by_id,
                patient.created_by_name,
            ],
        )?;
        Ok(())
    }

    /// Update demographics of an existing patient.
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                name = ?2,
                name_key = ?3,
                age = ?4,
                phone = ?5,
                phone_key = ?6,
                occupation = ?7,
                address = ?8
            WHERE id = ?1
            "#,
            params![
                patient.id,
                patient.name,
                patient.normalized_name(),
                patient.age,
                patient.phone,
                patient.normalized_phone(),
                patient.occupation,
                patient.address,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS),
                [id],
                patient_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn patient_exists(&self, id: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM patients WHERE id = ?",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Case-insensitive substring search on name or phone, ordered by name.
    pub fn search_patients(&self, term: &str, branch_id: Option<&str>, limit: usize) -> DbResult<Vec<Patient>> {
        let name_term = normalize_name(term);
        let phone_term = normalize_phone(term);

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {}
            FROM patients
            WHERE (instr(name_key, ?1) > 0 OR instr(phone_key, ?2) > 0)
            AND (?3 IS NULL OR branch_id = ?3)
            ORDER BY name
            LIMIT ?4
            "#,
            PATIENT_COLUMNS
        ))?;

        let patients = stmt
            .query_map(
                params![name_term, phone_term, branch_id, limit as i64],
                patient_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(patients)
    }

    /// One page of patients matching an optional term, plus the total match count.
    pub fn page_patients(&self, term: Option<&str>, offset: u64, limit: u32) -> DbResult<(Vec<Patient>, u64)> {
        let name_term = term.map(normalize_name).filter(|t| !t.is_empty());
        let phone_term = term.map(normalize_phone).filter(|t| !t.is_empty());

        let total: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM patients
            WHERE ?1 IS NULL OR instr(name_key, ?1) > 0 OR instr(phone_key, ?2) > 0
            "#,
            params![name_term, phone_term],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {}
            FROM patients
            WHERE ?1 IS NULL OR instr(name_key, ?1) > 0 OR instr(phone_key, ?2) > 0
            ORDER BY name, id
            LIMIT ?3 OFFSET ?4
            "#,
            PATIENT_COLUMNS
        ))?;

        let patients = stmt
            .query_map(
                params![name_term, phone_term, limit, offset as i64],
                patient_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((patients, total.max(0) as u64))
    }
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        phone: row.get(3)?,
        occupation: row.get(4)?,
        address: row.get(5)?,
        branch_id: row.get(6)?,
        registered_at: row.get(7)?,
        created_by_id: row.get(8)?,
        created_by_name: row.get(9)?,
    })
}
