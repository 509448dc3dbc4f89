//! Record service
//!
//! The orchestration layer over the store: stamps write times, runs
//! each write as one transaction through the database handle, and
//! announces new treatments to the rest of the system once they are
//! committed.

use std::sync::Arc;

use tracing::info;

use crate::db::{criteria, feedback, patients, projection, treatments, RecordDb};
use crate::error::ServiceError;
use crate::messages::publisher::TreatmentPublisher;
use crate::messages::{
    ActionFeedbackPayload, StatusCriteriaPayload, TreatmentPayload, ValueFeedbackPayload,
};
use crate::models::{
    now_epoch_seconds, MinPatientPage, MinTreatmentPage, Patient, StatusCriteria,
    TreatmentAction, TreatmentView,
};

/// Service over the patient and treatment store.
///
/// Runs without a publisher in HTTP-only mode; treatment creation then
/// skips the outbound notification.
#[derive(Clone)]
pub struct RecordService {
    db: Arc<RecordDb>,
    publisher: Option<TreatmentPublisher>,
}

impl RecordService {
    pub fn new(db: Arc<RecordDb>, publisher: Option<TreatmentPublisher>) -> Self {
        Self { db, publisher }
    }

    pub fn db(&self) -> &Arc<RecordDb> {
        &self.db
    }

    pub fn create_patient(
        &self,
        name: &str,
        status: Option<&StatusCriteria>,
    ) -> Result<Patient, ServiceError> {
        let now = now_epoch_seconds();
        let patient = self
            .db
            .with_conn_mut(|conn| patients::create_patient(conn, name, status, now))?;
        info!(patient_id = patient.id, "Created patient");
        Ok(patient)
    }

    pub fn get_patient(&self, id: i64) -> Result<Patient, ServiceError> {
        self.db.with_conn(|conn| patients::get_patient(conn, id))
    }

    /// Apply a sparse patch; omitted fields keep their stored values and
    /// the revision time is stamped either way.
    pub fn patch_patient(
        &self,
        id: i64,
        name: Option<&str>,
        status: Option<&StatusCriteria>,
    ) -> Result<Patient, ServiceError> {
        let now = now_epoch_seconds();
        self.db
            .with_conn_mut(|conn| patients::patch_patient(conn, id, name, status, now))
    }

    pub fn delete_patient(&self, id: i64) -> Result<(), ServiceError> {
        self.db.with_conn(|conn| patients::delete_patient(conn, id))?;
        info!(patient_id = id, "Deleted patient");
        Ok(())
    }

    pub fn list_patients(
        &self,
        name_pattern: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<MinPatientPage, ServiceError> {
        self.db
            .with_conn(|conn| patients::list_patients(conn, name_pattern, limit, offset))
    }

    /// Retrieve a status criteria snapshot by id.
    pub fn get_status_criteria(&self, id: i64) -> Result<StatusCriteria, ServiceError> {
        self.db.with_conn(|conn| criteria::retrieve(conn, id))
    }

    /// Create a treatment and, once committed, announce it.
    pub async fn create_treatment(
        &self,
        patient_id: i64,
        before: &StatusCriteria,
        actions: &[TreatmentAction],
        expected: &StatusCriteria,
    ) -> Result<TreatmentView, ServiceError> {
        let now = now_epoch_seconds();
        let treatment_id = self.db.with_conn_mut(|conn| {
            treatments::create_treatment(conn, patient_id, before, actions, expected, now)
        })?;
        info!(treatment_id, patient_id, "Created treatment");

        let view = self.get_treatment(treatment_id)?;

        if let Some(publisher) = &self.publisher {
            let payload = TreatmentPayload {
                id: treatment_id.to_string(),
                patient_id: patient_id.to_string(),
                created_time: view.created_time,
                before_status: StatusCriteriaPayload::from(before),
                actions: actions.to_vec(),
                expected_status: StatusCriteriaPayload::from(expected),
            };
            publisher.publish_created(&payload).await;
        }

        Ok(view)
    }

    /// The projected current view of a treatment.
    pub fn get_treatment(&self, id: i64) -> Result<TreatmentView, ServiceError> {
        self.db.with_conn(|conn| projection::project(conn, id))
    }

    pub fn delete_treatment(&self, id: i64) -> Result<(), ServiceError> {
        self.db
            .with_conn(|conn| treatments::delete_treatment(conn, id))?;
        info!(treatment_id = id, "Deleted treatment");
        Ok(())
    }

    pub fn list_treatments(
        &self,
        patient_id: Option<i64>,
        limit: u32,
        offset: u32,
    ) -> Result<MinTreatmentPage, ServiceError> {
        self.db
            .with_conn(|conn| treatments::list_treatments(conn, patient_id, limit, offset))
    }

    /// Record inbound action feedback. The transport-level treatment id
    /// is a string; a non-numeric id is a validation error.
    pub fn record_action_feedback(
        &self,
        payload: &ActionFeedbackPayload,
    ) -> Result<(), ServiceError> {
        let treatment_id = parse_treatment_id(&payload.treatment_id)?;
        let now = now_epoch_seconds();
        self.db.with_conn(|conn| {
            feedback::append_action_feedback(conn, treatment_id, payload.action, payload.feedback, now)
        })
    }

    /// Record inbound value alignment feedback.
    pub fn record_value_feedback(
        &self,
        payload: &ValueFeedbackPayload,
    ) -> Result<(), ServiceError> {
        let treatment_id = parse_treatment_id(&payload.treatment_id)?;
        let now = now_epoch_seconds();
        self.db.with_conn(|conn| {
            feedback::append_value_feedback(
                conn,
                treatment_id,
                &payload.value_name,
                payload.alignment,
                now,
            )
        })
    }
}

fn parse_treatment_id(raw: &str) -> Result<i64, ServiceError> {
    raw.parse().map_err(|_| {
        ServiceError::Validation(format!("The treatment id {:?} is not a number", raw))
    })
}
