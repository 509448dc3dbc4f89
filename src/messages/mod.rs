//! Message payloads exchanged over NATS
//!
//! Inbound feedback carries the treatment id as a string, as the
//! surrounding components do; a non-numeric id is a validation error at
//! the service layer, not a deserialization failure. Outbound payloads
//! flatten status snapshots: yes/no/unknown answers become optional
//! booleans and the Lawton index becomes its numeric score.

pub mod consumer;
pub mod publisher;

use serde::{Deserialize, Serialize};

use crate::models::{
    ActionFeedback, AgeRangeOption, BarthelIndex, ClinicalRiskGroupOption,
    CognitiveImpairmentLevel, DiscomfortDegree, NitLevel, SpictScale, StatusCriteria,
    SurvivalOptions, TreatmentAction, YesNoUnknownOption,
};

/// Subject for inbound action feedback
pub const ACTION_FEEDBACK_SUBJECT: &str = "treatment.action_feedback";

/// Subject for inbound value alignment feedback
pub const VALUE_FEEDBACK_SUBJECT: &str = "treatment.value_feedback";

/// Subject for the outbound treatment-created notification
pub const TREATMENT_CREATED_SUBJECT: &str = "treatment.created";

/// Inbound feedback for one action of a treatment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionFeedbackPayload {
    pub treatment_id: String,
    pub action: TreatmentAction,
    pub feedback: ActionFeedback,
}

impl ActionFeedbackPayload {
    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<bytes::Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Into::into)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// Inbound alignment report for a named value of a treatment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueFeedbackPayload {
    pub treatment_id: String,
    pub value_name: String,
    pub alignment: f64,
}

impl ValueFeedbackPayload {
    pub fn to_bytes(&self) -> Result<bytes::Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Into::into)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// Outbound notification published after a treatment is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentPayload {
    pub id: String,
    pub patient_id: String,
    /// Epoch seconds of creation
    pub created_time: i64,
    pub before_status: StatusCriteriaPayload,
    pub actions: Vec<TreatmentAction>,
    pub expected_status: StatusCriteriaPayload,
}

impl TreatmentPayload {
    pub fn to_bytes(&self) -> Result<bytes::Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Into::into)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// A status snapshot as published to other components, with yes/no/unknown
/// answers flattened to optional booleans and the Lawton index flattened
/// to its numeric score. UNKNOWN flattens to an absent field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCriteriaPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_range: Option<AgeRangeOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ccd: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maca: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_survival: Option<SurvivalOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frail_vig: Option<SpictScale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_risk_group: Option<ClinicalRiskGroupOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_social_support: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub independence_at_admission: Option<BarthelIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub independence_instrumental_activities: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_advance_directives: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_competent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_been_informed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_coerced: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_cognitive_impairment: Option<CognitiveImpairmentLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_emotional_pain: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discomfort_degree: Option<DiscomfortDegree>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nit_level: Option<NitLevel>,
}

fn flatten_yes_no(value: Option<YesNoUnknownOption>) -> Option<bool> {
    match value {
        Some(YesNoUnknownOption::Yes) => Some(true),
        Some(YesNoUnknownOption::No) => Some(false),
        Some(YesNoUnknownOption::Unknown) | None => None,
    }
}

impl From<&StatusCriteria> for StatusCriteriaPayload {
    fn from(criteria: &StatusCriteria) -> Self {
        Self {
            age_range: criteria.age_range,
            ccd: flatten_yes_no(criteria.ccd),
            maca: flatten_yes_no(criteria.maca),
            expected_survival: criteria.expected_survival,
            frail_vig: criteria.frail_vig,
            clinical_risk_group: criteria.clinical_risk_group,
            has_social_support: flatten_yes_no(criteria.has_social_support),
            independence_at_admission: criteria.independence_at_admission,
            independence_instrumental_activities: criteria
                .independence_instrumental_activities
                .and_then(|index| index.as_score()),
            has_advance_directives: flatten_yes_no(criteria.has_advance_directives),
            is_competent: flatten_yes_no(criteria.is_competent),
            has_been_informed: flatten_yes_no(criteria.has_been_informed),
            is_coerced: flatten_yes_no(criteria.is_coerced),
            has_cognitive_impairment: criteria.has_cognitive_impairment,
            has_emotional_pain: flatten_yes_no(criteria.has_emotional_pain),
            discomfort_degree: criteria.discomfort_degree,
            nit_level: criteria.nit_level,
        }
    }
}
