//! Read-time projection of the feedback ledger
//!
//! Folds the append-only ledger into the current view of a treatment.
//! Entries are folded in ascending (created_time, id) order so the
//! newest report wins and ties on the same second are broken by
//! insertion order. The projection is pure: running it twice over the
//! same ledger yields the same view.

use std::collections::HashMap;

use rusqlite::{params, Connection};

use crate::db::{patients, treatments};
use crate::error::ServiceError;
use crate::models::{
    ActionFeedback, ActionWithFeedback, TreatmentView, ValueAlignment,
};

/// Project the current view of a treatment from its fixed record and
/// the feedback ledger.
pub fn project(conn: &Connection, treatment_id: i64) -> Result<TreatmentView, ServiceError> {
    let record = treatments::get_treatment(conn, treatment_id)?;
    let patient = patients::min_patient(conn, record.patient_id)?;
    let (before_status, expected_status) = treatments::resolve_statuses(conn, &record)?;

    let latest_action = fold_action_feedback(conn, treatment_id)?;
    let actions = record
        .actions
        .iter()
        .map(|action| {
            let latest = latest_action.get(action.as_str());
            ActionWithFeedback {
                action: *action,
                feedback: latest.map(|(feedback, _)| *feedback),
                updated_time: latest.map(|(_, time)| *time),
            }
        })
        .collect();

    let values = fold_value_feedback(conn, treatment_id)?;

    Ok(TreatmentView {
        id: record.id,
        created_time: record.created_time,
        patient,
        before_status,
        expected_status,
        actions,
        values,
    })
}

/// Latest feedback per action name, last write wins.
fn fold_action_feedback(
    conn: &Connection,
    treatment_id: i64,
) -> Result<HashMap<String, (ActionFeedback, i64)>, ServiceError> {
    let mut stmt = conn
        .prepare(
            "SELECT action, feedback, created_time FROM action_feedback
             WHERE treatment_id = ? ORDER BY created_time, id",
        )
        .map_err(|e| ServiceError::Internal(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![treatment_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?;

    let mut latest: HashMap<String, (ActionFeedback, i64)> = HashMap::new();
    for row in rows {
        let (action, feedback, created_time) =
            row.map_err(|e| ServiceError::Internal(format!("Row parse failed: {}", e)))?;
        let feedback = ActionFeedback::parse(&feedback).ok_or_else(|| {
            ServiceError::Internal(format!("Unknown stored action feedback {}", feedback))
        })?;
        latest.insert(action, (feedback, created_time));
    }

    Ok(latest)
}

/// Latest alignment per value name, grouped case-insensitively and
/// sorted by name for a stable view.
fn fold_value_feedback(
    conn: &Connection,
    treatment_id: i64,
) -> Result<Vec<ValueAlignment>, ServiceError> {
    let mut stmt = conn
        .prepare(
            "SELECT value_name, alignment, created_time FROM value_feedback
             WHERE treatment_id = ? ORDER BY created_time, id",
        )
        .map_err(|e| ServiceError::Internal(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![treatment_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?;

    let mut latest: HashMap<String, (f64, i64)> = HashMap::new();
    for row in rows {
        let (name, alignment, created_time) =
            row.map_err(|e| ServiceError::Internal(format!("Row parse failed: {}", e)))?;
        latest.insert(name.to_lowercase(), (alignment, created_time));
    }

    let mut values: Vec<ValueAlignment> = latest
        .into_iter()
        .map(|(name, (alignment, updated_time))| ValueAlignment {
            name,
            alignment,
            updated_time,
        })
        .collect();
    values.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::feedback::{append_action_feedback, append_value_feedback};
    use crate::db::patients::create_patient;
    use crate::db::treatments::create_treatment;
    use crate::models::{StatusCriteria, TreatmentAction};

    fn seeded_conn() -> (Connection, i64) {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        let patient = create_patient(&mut conn, "Jane Doe", None, 100).unwrap();
        let treatment_id = create_treatment(
            &mut conn,
            patient.id,
            &StatusCriteria::default(),
            &[TreatmentAction::GiveAnalgesia, TreatmentAction::IncreaseSedation],
            &StatusCriteria::default(),
            100,
        )
        .unwrap();
        (conn, treatment_id)
    }

    fn action_view(view: &TreatmentView, action: TreatmentAction) -> &ActionWithFeedback {
        view.actions.iter().find(|a| a.action == action).unwrap()
    }

    #[test]
    fn test_latest_feedback_wins_per_action() {
        let (conn, id) = seeded_conn();
        append_action_feedback(&conn, id, TreatmentAction::GiveAnalgesia, ActionFeedback::Allow, 100)
            .unwrap();
        append_action_feedback(&conn, id, TreatmentAction::GiveAnalgesia, ActionFeedback::Deny, 200)
            .unwrap();

        let view = project(&conn, id).unwrap();
        let analgesia = action_view(&view, TreatmentAction::GiveAnalgesia);
        assert_eq!(analgesia.feedback, Some(ActionFeedback::Deny));
        assert_eq!(analgesia.updated_time, Some(200));

        let sedation = action_view(&view, TreatmentAction::IncreaseSedation);
        assert_eq!(sedation.feedback, None);
        assert_eq!(sedation.updated_time, None);
    }

    #[test]
    fn test_same_second_ties_break_by_insertion_order() {
        let (conn, id) = seeded_conn();
        append_action_feedback(&conn, id, TreatmentAction::GiveAnalgesia, ActionFeedback::Allow, 150)
            .unwrap();
        append_action_feedback(&conn, id, TreatmentAction::GiveAnalgesia, ActionFeedback::Deny, 150)
            .unwrap();

        let view = project(&conn, id).unwrap();
        let analgesia = action_view(&view, TreatmentAction::GiveAnalgesia);
        assert_eq!(analgesia.feedback, Some(ActionFeedback::Deny));
    }

    #[test]
    fn test_values_group_case_insensitively() {
        let (conn, id) = seeded_conn();
        append_value_feedback(&conn, id, "Comfort", 0.5, 100).unwrap();
        append_value_feedback(&conn, id, "comfort", -0.2, 200).unwrap();
        append_value_feedback(&conn, id, "autonomy", 0.9, 150).unwrap();

        let view = project(&conn, id).unwrap();
        assert_eq!(view.values.len(), 2);
        assert_eq!(view.values[0].name, "autonomy");
        assert_eq!(view.values[0].alignment, 0.9);
        assert_eq!(view.values[1].name, "comfort");
        assert_eq!(view.values[1].alignment, -0.2);
        assert_eq!(view.values[1].updated_time, 200);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let (conn, id) = seeded_conn();
        append_action_feedback(&conn, id, TreatmentAction::GiveAnalgesia, ActionFeedback::Allow, 100)
            .unwrap();
        append_value_feedback(&conn, id, "comfort", 0.5, 100).unwrap();

        let first = project(&conn, id).unwrap();
        let second = project(&conn, id).unwrap();
        assert_eq!(first.actions, second.actions);
        assert_eq!(first.values.len(), second.values.len());
        assert_eq!(first.values[0].alignment, second.values[0].alignment);
    }

    #[test]
    fn test_unknown_treatment_is_not_found() {
        let (conn, id) = seeded_conn();
        assert!(matches!(
            project(&conn, id + 50),
            Err(ServiceError::NotFound(_))
        ));
    }
}
