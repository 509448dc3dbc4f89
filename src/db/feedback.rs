//! Append-only feedback ledger
//!
//! Feedback never mutates a treatment row. Every report is appended as
//! a new ledger entry and the projector folds the ledger into the read
//! view, so the full history stays queryable.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::ServiceError;
use crate::models::{ActionFeedback, TreatmentAction};

/// Append feedback for one action of a treatment.
///
/// The action must be part of the treatment's fixed action list;
/// feedback for an action the treatment never proposed is rejected and
/// nothing is written.
pub fn append_action_feedback(
    conn: &Connection,
    treatment_id: i64,
    action: TreatmentAction,
    feedback: ActionFeedback,
    created_time: i64,
) -> Result<(), ServiceError> {
    require_treatment(conn, treatment_id)?;

    let is_member: bool = conn
        .query_row(
            "SELECT 1 FROM treatment_actions WHERE treatment_id = ? AND action = ?",
            params![treatment_id, action.as_str()],
            |_| Ok(true),
        )
        .optional()
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?
        .unwrap_or(false);

    if !is_member {
        return Err(ServiceError::Validation(format!(
            "The action {} is not part of the treatment {}",
            action.as_str(),
            treatment_id
        )));
    }

    conn.execute(
        "INSERT INTO action_feedback (treatment_id, action, feedback, created_time)
         VALUES (?, ?, ?, ?)",
        params![treatment_id, action.as_str(), feedback.as_str(), created_time],
    )
    .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;

    debug!(
        treatment_id,
        action = action.as_str(),
        feedback = feedback.as_str(),
        "Appended action feedback"
    );

    Ok(())
}

/// Append an alignment report for a named value of a treatment.
///
/// The alignment must lie in [-1.0, 1.0], both ends inclusive. The
/// value name is stored with its reported casing; grouping is
/// case-insensitive at projection time.
pub fn append_value_feedback(
    conn: &Connection,
    treatment_id: i64,
    value_name: &str,
    alignment: f64,
    created_time: i64,
) -> Result<(), ServiceError> {
    if !(-1.0..=1.0).contains(&alignment) {
        return Err(ServiceError::Validation(format!(
            "The alignment {} is out of the range [-1, 1]",
            alignment
        )));
    }
    if value_name.trim().is_empty() {
        return Err(ServiceError::Validation(
            "The value name must not be empty".to_string(),
        ));
    }

    require_treatment(conn, treatment_id)?;

    conn.execute(
        "INSERT INTO value_feedback (treatment_id, value_name, alignment, created_time)
         VALUES (?, ?, ?, ?)",
        params![treatment_id, value_name, alignment, created_time],
    )
    .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;

    debug!(treatment_id, value_name, alignment, "Appended value feedback");

    Ok(())
}

fn require_treatment(conn: &Connection, treatment_id: i64) -> Result<(), ServiceError> {
    let exists: bool = conn
        .query_row(
            "SELECT 1 FROM treatments WHERE id = ?",
            params![treatment_id],
            |_| Ok(true),
        )
        .optional()
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?
        .unwrap_or(false);

    if exists {
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!(
            "No treatment with the id {}",
            treatment_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::patients::create_patient;
    use crate::db::treatments::create_treatment;
    use crate::models::StatusCriteria;

    fn seeded_conn() -> (Connection, i64) {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        let patient = create_patient(&mut conn, "Jane Doe", None, 100).unwrap();
        let treatment_id = create_treatment(
            &mut conn,
            patient.id,
            &StatusCriteria::default(),
            &[TreatmentAction::GiveAnalgesia, TreatmentAction::Icu],
            &StatusCriteria::default(),
            100,
        )
        .unwrap();
        (conn, treatment_id)
    }

    fn ledger_len(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_action_feedback_appends_every_report() {
        let (conn, id) = seeded_conn();
        append_action_feedback(&conn, id, TreatmentAction::GiveAnalgesia, ActionFeedback::Allow, 110)
            .unwrap();
        append_action_feedback(&conn, id, TreatmentAction::GiveAnalgesia, ActionFeedback::Deny, 120)
            .unwrap();
        assert_eq!(ledger_len(&conn, "action_feedback"), 2);
    }

    #[test]
    fn test_feedback_for_unlisted_action_writes_nothing() {
        let (conn, id) = seeded_conn();
        let result =
            append_action_feedback(&conn, id, TreatmentAction::Cpr, ActionFeedback::Allow, 110);
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(ledger_len(&conn, "action_feedback"), 0);
    }

    #[test]
    fn test_feedback_for_unknown_treatment_is_not_found() {
        let (conn, id) = seeded_conn();
        let result = append_action_feedback(
            &conn,
            id + 99,
            TreatmentAction::Icu,
            ActionFeedback::Allow,
            110,
        );
        assert!(matches!(result, Err(ServiceError::NotFound(_))));

        let result = append_value_feedback(&conn, id + 99, "comfort", 0.5, 110);
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_alignment_bounds_are_inclusive() {
        let (conn, id) = seeded_conn();
        append_value_feedback(&conn, id, "beneficence", 1.0, 110).unwrap();
        append_value_feedback(&conn, id, "beneficence", -1.0, 120).unwrap();

        let over = append_value_feedback(&conn, id, "beneficence", 1.0000001, 130);
        assert!(matches!(over, Err(ServiceError::Validation(_))));
        let under = append_value_feedback(&conn, id, "beneficence", -1.0000001, 130);
        assert!(matches!(under, Err(ServiceError::Validation(_))));

        assert_eq!(ledger_len(&conn, "value_feedback"), 2);
    }

    #[test]
    fn test_empty_value_name_is_invalid() {
        let (conn, id) = seeded_conn();
        let result = append_value_feedback(&conn, id, "  ", 0.5, 110);
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
