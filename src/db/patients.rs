//! Patient CRUD operations
//!
//! Patients are the only mutable record kind: `name` and the status
//! reference may be patched independently and sparsely, and every patch
//! stamps `updated_time` in the same statement.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::criteria;
use crate::db::update::UpdateBuilder;
use crate::error::ServiceError;
use crate::models::{MinPatient, MinPatientPage, Patient, StatusCriteria};

const TABLE: &str = "patients";

fn patient_from_row(row: &Row) -> Result<Patient, rusqlite::Error> {
    let criteria_json: Option<String> = row.get("criteria_json")?;
    let status = match criteria_json {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };
    Ok(Patient {
        id: row.get("id")?,
        name: row.get::<_, Option<String>>("name")?.unwrap_or_default(),
        updated_time: row.get("updated_time")?,
        status,
    })
}

/// Create a patient, resolving the optional status snapshot through the
/// dedup store in the same transaction.
pub fn create_patient(
    conn: &mut Connection,
    name: &str,
    status: Option<&StatusCriteria>,
    updated_time: i64,
) -> Result<Patient, ServiceError> {
    let tx = conn
        .transaction()
        .map_err(|e| ServiceError::Internal(format!("Transaction failed: {}", e)))?;

    let status_id = match status {
        Some(criteria) => Some(criteria::get_or_create(&tx, criteria)?),
        None => None,
    };

    tx.execute(
        "INSERT INTO patients (name, updated_time, status_id) VALUES (?, ?, ?)",
        params![name, updated_time, status_id],
    )
    .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;

    let id = tx.last_insert_rowid();
    let patient = get_patient(&tx, id)?;

    tx.commit()
        .map_err(|e| ServiceError::Internal(format!("Commit failed: {}", e)))?;

    Ok(patient)
}

/// Get a patient by id, with its status snapshot resolved.
pub fn get_patient(conn: &Connection, id: i64) -> Result<Patient, ServiceError> {
    conn.query_row(
        "SELECT p.id, p.name, p.updated_time, s.criteria_json
         FROM patients p
         LEFT JOIN status_criteria s ON p.status_id = s.id
         WHERE p.id = ?",
        params![id],
        patient_from_row,
    )
    .optional()
    .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?
    .ok_or_else(|| ServiceError::NotFound(format!("No patient with the id {}", id)))
}

/// Apply a sparse patch: only the supplied fields change, everything
/// else stays byte-for-byte as stored, and `updated_time` is stamped as
/// part of the same write. A newly supplied status is resolved through
/// the dedup store inside the same transaction.
pub fn patch_patient(
    conn: &mut Connection,
    id: i64,
    name: Option<&str>,
    status: Option<&StatusCriteria>,
    updated_time: i64,
) -> Result<Patient, ServiceError> {
    let tx = conn
        .transaction()
        .map_err(|e| ServiceError::Internal(format!("Transaction failed: {}", e)))?;

    let status_id = match status {
        Some(criteria) => Some(criteria::get_or_create(&tx, criteria)?),
        None => None,
    };

    UpdateBuilder::new(TABLE, id)
        .set("name", name.map(str::to_string))
        .set("status_id", status_id)
        .execute(&tx, "updated_time", updated_time)?;

    let patient = get_patient(&tx, id)?;

    tx.commit()
        .map_err(|e| ServiceError::Internal(format!("Commit failed: {}", e)))?;

    Ok(patient)
}

/// Delete a patient. Treatments and their feedback cascade.
pub fn delete_patient(conn: &Connection, id: i64) -> Result<(), ServiceError> {
    let changes = conn
        .execute("DELETE FROM patients WHERE id = ?", params![id])
        .map_err(|e| ServiceError::Internal(format!("Delete failed: {}", e)))?;

    if changes == 0 {
        Err(ServiceError::NotFound(format!("No patient with the id {}", id)))
    } else {
        Ok(())
    }
}

/// Get the minimal representation of a patient.
pub fn min_patient(conn: &Connection, id: i64) -> Result<MinPatient, ServiceError> {
    conn.query_row(
        "SELECT id, name FROM patients WHERE id = ?",
        params![id],
        |row| {
            Ok(MinPatient {
                id: row.get(0)?,
                name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            })
        },
    )
    .optional()
    .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?
    .ok_or_else(|| ServiceError::NotFound(format!("No patient with the id {}", id)))
}

/// List patients whose name matches a LIKE pattern, newest first.
pub fn list_patients(
    conn: &Connection,
    name_pattern: Option<&str>,
    limit: u32,
    offset: u32,
) -> Result<MinPatientPage, ServiceError> {
    let pattern = name_pattern.unwrap_or("%");

    let total: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM patients WHERE name LIKE ? COLLATE NOCASE",
            params![pattern],
            |row| row.get(0),
        )
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?;

    let mut stmt = conn
        .prepare(
            "SELECT id, name FROM patients WHERE name LIKE ? COLLATE NOCASE
             ORDER BY id DESC LIMIT ? OFFSET ?",
        )
        .map_err(|e| ServiceError::Internal(format!("Prepare failed: {}", e)))?;

    let patients: Vec<MinPatient> = stmt
        .query_map(params![pattern, limit as i64, offset as i64], |row| {
            Ok(MinPatient {
                id: row.get(0)?,
                name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            })
        })
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServiceError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(MinPatientPage {
        total: total as u64,
        patients,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgeRangeOption, DiscomfortDegree, YesNoUnknownOption};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    fn sample_status() -> StatusCriteria {
        StatusCriteria {
            age_range: Some(AgeRangeOption::AgeBetween60And69),
            is_coerced: Some(YesNoUnknownOption::No),
            discomfort_degree: Some(DiscomfortDegree::Medium),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_get() {
        let mut conn = test_conn();
        let created = create_patient(&mut conn, "Jane Doe", Some(&sample_status()), 100).unwrap();
        assert_eq!(created.name, "Jane Doe");
        assert_eq!(created.updated_time, 100);
        assert_eq!(created.status, Some(sample_status()));

        let fetched = get_patient(&conn, created.id).unwrap();
        assert_eq!(fetched.name, created.name);
        assert_eq!(fetched.status, created.status);
    }

    #[test]
    fn test_patch_name_only_keeps_status() {
        let mut conn = test_conn();
        let created = create_patient(&mut conn, "Jane Doe", Some(&sample_status()), 100).unwrap();

        let patched = patch_patient(&mut conn, created.id, Some("Joan Doe"), None, 200).unwrap();
        assert_eq!(patched.name, "Joan Doe");
        assert_eq!(patched.status, Some(sample_status()));
        assert_eq!(patched.updated_time, 200);
    }

    #[test]
    fn test_patch_status_only_keeps_name() {
        let mut conn = test_conn();
        let created = create_patient(&mut conn, "Jane Doe", Some(&sample_status()), 100).unwrap();

        let new_status = StatusCriteria {
            discomfort_degree: Some(DiscomfortDegree::High),
            ..sample_status()
        };
        let patched =
            patch_patient(&mut conn, created.id, None, Some(&new_status), 200).unwrap();
        assert_eq!(patched.name, "Jane Doe");
        assert_eq!(patched.status, Some(new_status));
    }

    #[test]
    fn test_patch_unknown_patient_is_not_found() {
        let mut conn = test_conn();
        let result = patch_patient(&mut conn, 42, Some("Nobody"), None, 100);
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_list_patients_page() {
        let mut conn = test_conn();
        for i in 0..5 {
            create_patient(&mut conn, &format!("Patient {}", i), None, 100 + i).unwrap();
        }

        let page = list_patients(&conn, None, 2, 0).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.patients.len(), 2);

        let filtered = list_patients(&conn, Some("%patient 3%"), 10, 0).unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.patients[0].name, "Patient 3");
    }

    #[test]
    fn test_delete_patient() {
        let mut conn = test_conn();
        let created = create_patient(&mut conn, "Jane Doe", None, 100).unwrap();
        delete_patient(&conn, created.id).unwrap();
        assert!(matches!(
            get_patient(&conn, created.id),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            delete_patient(&conn, created.id),
            Err(ServiceError::NotFound(_))
        ));
    }
}
