//! Treatment rows and their fixed action lists
//!
//! A treatment is immutable after creation: the patient reference, the
//! "before" and "expected" status snapshots, and the ordered action list
//! are captured once. Everything that changes afterwards lives in the
//! feedback ledger and is folded in at read time by the projector.

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::criteria;
use crate::error::ServiceError;
use crate::models::{MinPatient, MinTreatment, MinTreatmentPage, StatusCriteria, TreatmentAction};

/// A stored treatment with references still unresolved.
#[derive(Debug, Clone)]
pub struct TreatmentRecord {
    pub id: i64,
    pub patient_id: i64,
    pub before_status_id: i64,
    pub expected_status_id: i64,
    pub created_time: i64,
    pub actions: Vec<TreatmentAction>,
}

/// Create a treatment: resolve the patient, resolve both status
/// snapshots through the dedup store, and persist the fixed action list,
/// all in one transaction.
pub fn create_treatment(
    conn: &mut Connection,
    patient_id: i64,
    before: &StatusCriteria,
    actions: &[TreatmentAction],
    expected: &StatusCriteria,
    created_time: i64,
) -> Result<i64, ServiceError> {
    if actions.is_empty() {
        return Err(ServiceError::Validation(
            "A treatment needs at least one action".to_string(),
        ));
    }

    let tx = conn
        .transaction()
        .map_err(|e| ServiceError::Internal(format!("Transaction failed: {}", e)))?;

    let patient_exists: bool = tx
        .query_row("SELECT 1 FROM patients WHERE id = ?", params![patient_id], |_| Ok(true))
        .optional()
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?
        .unwrap_or(false);
    if !patient_exists {
        return Err(ServiceError::NotFound(format!(
            "No patient with the id {}",
            patient_id
        )));
    }

    let before_id = criteria::get_or_create(&tx, before)?;
    let expected_id = criteria::get_or_create(&tx, expected)?;

    tx.execute(
        "INSERT INTO treatments (patient_id, before_status_id, expected_status_id, created_time)
         VALUES (?, ?, ?, ?)",
        params![patient_id, before_id, expected_id, created_time],
    )
    .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;

    let treatment_id = tx.last_insert_rowid();

    for (position, action) in actions.iter().enumerate() {
        tx.execute(
            "INSERT INTO treatment_actions (treatment_id, position, action) VALUES (?, ?, ?)",
            params![treatment_id, position as i64, action.as_str()],
        )
        .map_err(|e| ServiceError::Internal(format!("Action insert failed: {}", e)))?;
    }

    tx.commit()
        .map_err(|e| ServiceError::Internal(format!("Commit failed: {}", e)))?;

    Ok(treatment_id)
}

/// Get a stored treatment with its fixed action list.
pub fn get_treatment(conn: &Connection, id: i64) -> Result<TreatmentRecord, ServiceError> {
    let record = conn
        .query_row(
            "SELECT id, patient_id, before_status_id, expected_status_id, created_time
             FROM treatments WHERE id = ?",
            params![id],
            |row| {
                Ok(TreatmentRecord {
                    id: row.get(0)?,
                    patient_id: row.get(1)?,
                    before_status_id: row.get(2)?,
                    expected_status_id: row.get(3)?,
                    created_time: row.get(4)?,
                    actions: vec![],
                })
            },
        )
        .optional()
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?;

    let mut record =
        record.ok_or_else(|| ServiceError::NotFound(format!("No treatment with the id {}", id)))?;
    record.actions = get_actions(conn, id)?;

    Ok(record)
}

/// The fixed action list of a treatment, in creation order.
pub fn get_actions(conn: &Connection, treatment_id: i64) -> Result<Vec<TreatmentAction>, ServiceError> {
    let mut stmt = conn
        .prepare("SELECT action FROM treatment_actions WHERE treatment_id = ? ORDER BY position")
        .map_err(|e| ServiceError::Internal(format!("Prepare failed: {}", e)))?;

    let names: Vec<String> = stmt
        .query_map(params![treatment_id], |row| row.get(0))
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServiceError::Internal(format!("Row parse failed: {}", e)))?;

    names
        .into_iter()
        .map(|name| {
            TreatmentAction::parse(&name).ok_or_else(|| {
                ServiceError::Internal(format!("Unknown stored treatment action {}", name))
            })
        })
        .collect()
}

/// Resolve the "before" and "expected" snapshots of a stored treatment.
pub fn resolve_statuses(
    conn: &Connection,
    record: &TreatmentRecord,
) -> Result<(StatusCriteria, StatusCriteria), ServiceError> {
    let before = criteria::retrieve(conn, record.before_status_id)?;
    let expected = criteria::retrieve(conn, record.expected_status_id)?;
    Ok((before, expected))
}

/// Delete a treatment. The action list and feedback entries cascade.
pub fn delete_treatment(conn: &Connection, id: i64) -> Result<(), ServiceError> {
    let changes = conn
        .execute("DELETE FROM treatments WHERE id = ?", params![id])
        .map_err(|e| ServiceError::Internal(format!("Delete failed: {}", e)))?;

    if changes == 0 {
        Err(ServiceError::NotFound(format!("No treatment with the id {}", id)))
    } else {
        Ok(())
    }
}

/// List treatments, optionally scoped to one patient, newest first.
pub fn list_treatments(
    conn: &Connection,
    patient_id: Option<i64>,
    limit: u32,
    offset: u32,
) -> Result<MinTreatmentPage, ServiceError> {
    let (count_sql, page_sql) = match patient_id {
        Some(_) => (
            "SELECT COUNT(*) FROM treatments WHERE patient_id = ?",
            "SELECT t.id, t.created_time, p.id, p.name
             FROM treatments t JOIN patients p ON t.patient_id = p.id
             WHERE t.patient_id = ?
             ORDER BY t.id DESC LIMIT ? OFFSET ?",
        ),
        None => (
            "SELECT COUNT(*) FROM treatments",
            "SELECT t.id, t.created_time, p.id, p.name
             FROM treatments t JOIN patients p ON t.patient_id = p.id
             ORDER BY t.id DESC LIMIT ? OFFSET ?",
        ),
    };

    let total: i64 = match patient_id {
        Some(pid) => conn.query_row(count_sql, params![pid], |row| row.get(0)),
        None => conn.query_row(count_sql, [], |row| row.get(0)),
    }
    .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?;

    let mut stmt = conn
        .prepare(page_sql)
        .map_err(|e| ServiceError::Internal(format!("Prepare failed: {}", e)))?;

    let map_row = |row: &rusqlite::Row| -> Result<MinTreatment, rusqlite::Error> {
        Ok(MinTreatment {
            id: row.get(0)?,
            created_time: row.get(1)?,
            patient: MinPatient {
                id: row.get(2)?,
                name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            },
        })
    };

    let rows = match patient_id {
        Some(pid) => stmt.query_map(params![pid, limit as i64, offset as i64], map_row),
        None => stmt.query_map(params![limit as i64, offset as i64], map_row),
    }
    .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?;

    let treatments = rows
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServiceError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(MinTreatmentPage {
        total: total as u64,
        treatments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::patients::create_patient;
    use crate::models::{AgeRangeOption, SurvivalOptions};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    fn before() -> StatusCriteria {
        StatusCriteria {
            age_range: Some(AgeRangeOption::AgeBetween80And89),
            expected_survival: Some(SurvivalOptions::LessThan12Months),
            ..Default::default()
        }
    }

    fn expected() -> StatusCriteria {
        StatusCriteria {
            expected_survival: Some(SurvivalOptions::MoreThan12Months),
            ..before()
        }
    }

    #[test]
    fn test_create_keeps_action_order() {
        let mut conn = test_conn();
        let patient = create_patient(&mut conn, "Jane Doe", None, 100).unwrap();

        let actions = vec![
            TreatmentAction::Icu,
            TreatmentAction::GiveAnalgesia,
            TreatmentAction::Cpr,
        ];
        let id =
            create_treatment(&mut conn, patient.id, &before(), &actions, &expected(), 150).unwrap();

        let record = get_treatment(&conn, id).unwrap();
        assert_eq!(record.actions, actions);
        assert_eq!(record.created_time, 150);

        let (stored_before, stored_expected) = resolve_statuses(&conn, &record).unwrap();
        assert_eq!(stored_before, before());
        assert_eq!(stored_expected, expected());
    }

    #[test]
    fn test_create_for_unknown_patient_is_not_found() {
        let mut conn = test_conn();
        let result = create_treatment(
            &mut conn,
            7,
            &before(),
            &[TreatmentAction::Cpr],
            &expected(),
            150,
        );
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_create_without_actions_is_invalid() {
        let mut conn = test_conn();
        let patient = create_patient(&mut conn, "Jane Doe", None, 100).unwrap();
        let result = create_treatment(&mut conn, patient.id, &before(), &[], &expected(), 150);
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_statuses_are_deduplicated_across_treatments() {
        let mut conn = test_conn();
        let patient = create_patient(&mut conn, "Jane Doe", None, 100).unwrap();

        let a = create_treatment(
            &mut conn,
            patient.id,
            &before(),
            &[TreatmentAction::Cpr],
            &expected(),
            150,
        )
        .unwrap();
        let b = create_treatment(
            &mut conn,
            patient.id,
            &before(),
            &[TreatmentAction::Icu],
            &expected(),
            160,
        )
        .unwrap();

        let ra = get_treatment(&conn, a).unwrap();
        let rb = get_treatment(&conn, b).unwrap();
        assert_eq!(ra.before_status_id, rb.before_status_id);
        assert_eq!(ra.expected_status_id, rb.expected_status_id);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM status_criteria", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_list_for_patient() {
        let mut conn = test_conn();
        let jane = create_patient(&mut conn, "Jane Doe", None, 100).unwrap();
        let john = create_patient(&mut conn, "John Doe", None, 100).unwrap();

        for patient_id in [jane.id, jane.id, john.id] {
            create_treatment(
                &mut conn,
                patient_id,
                &before(),
                &[TreatmentAction::Cpr],
                &expected(),
                150,
            )
            .unwrap();
        }

        let page = list_treatments(&conn, Some(jane.id), 10, 0).unwrap();
        assert_eq!(page.total, 2);
        assert!(page.treatments.iter().all(|t| t.patient.id == jane.id));

        let all = list_treatments(&conn, None, 10, 0).unwrap();
        assert_eq!(all.total, 3);
    }

    #[test]
    fn test_delete_cascades_actions() {
        let mut conn = test_conn();
        let patient = create_patient(&mut conn, "Jane Doe", None, 100).unwrap();
        let id = create_treatment(
            &mut conn,
            patient.id,
            &before(),
            &[TreatmentAction::Cpr],
            &expected(),
            150,
        )
        .unwrap();

        delete_treatment(&conn, id).unwrap();
        assert!(matches!(get_treatment(&conn, id), Err(ServiceError::NotFound(_))));

        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM treatment_actions WHERE treatment_id = ?",
                params![id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
