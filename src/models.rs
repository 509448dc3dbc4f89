//! Domain model: clinical enumerations, the status criteria value type,
//! and the read views served over HTTP.

use serde::{Deserialize, Serialize};

/// The range of age of a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgeRangeOption {
    AgeBetween0And19,
    AgeBetween20And29,
    AgeBetween30And39,
    AgeBetween40And49,
    AgeBetween50And59,
    AgeBetween60And69,
    AgeBetween70And79,
    AgeBetween80And89,
    AgeBetween90And99,
    AgeMoreThan99,
}

/// A yes/no answer that may also be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum YesNoUnknownOption {
    Yes,
    No,
    Unknown,
}

/// Expected survival time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurvivalOptions {
    LessThan12Months,
    MoreThan12Months,
    Unknown,
}

/// Frailty on the SPICT scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpictScale {
    Low,
    Moderate,
    High,
    Unknown,
}

/// Clinical risk group classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClinicalRiskGroupOption {
    PromotionAndPrevention,
    SelfManagementSupport,
    IllnessManagement,
    CaseManagement,
    Unknown,
}

/// Independence for basic activities of daily living (Barthel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarthelIndex {
    Total,
    Severe,
    Moderate,
    Mild,
    Independent,
    Unknown,
}

/// Independence for instrumental activities (Lawton).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LawtonIndex {
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Unknown,
}

impl LawtonIndex {
    /// The numeric value of the index, if it has one.
    pub fn as_score(&self) -> Option<u8> {
        match self {
            LawtonIndex::Zero => Some(0),
            LawtonIndex::One => Some(1),
            LawtonIndex::Two => Some(2),
            LawtonIndex::Three => Some(3),
            LawtonIndex::Four => Some(4),
            LawtonIndex::Five => Some(5),
            LawtonIndex::Six => Some(6),
            LawtonIndex::Seven => Some(7),
            LawtonIndex::Eight => Some(8),
            LawtonIndex::Unknown => None,
        }
    }
}

/// Cognitive impairment level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CognitiveImpairmentLevel {
    Absent,
    MildModerate,
    Severe,
    Unknown,
}

/// Degree of discomfort before any action is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscomfortDegree {
    Low,
    Medium,
    High,
    Unknown,
}

/// Therapeutic intensity (NIT) level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NitLevel {
    One,
    TwoA,
    TwoB,
    Three,
    Four,
    Five,
}

/// An action that can be applied as part of a treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreatmentAction {
    Cpr,
    Transplant,
    Icu,
    Nimv,
    VasoactiveDrugs,
    Dialysis,
    SimpleClinicalTrial,
    MediumClinicalTrial,
    AdvancedClinicalTrial,
    PalliativeSurgery,
    CureSurgery,
    GiveAnalgesia,
    IncreaseSedation,
}

impl TreatmentAction {
    /// Wire/database name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            TreatmentAction::Cpr => "CPR",
            TreatmentAction::Transplant => "TRANSPLANT",
            TreatmentAction::Icu => "ICU",
            TreatmentAction::Nimv => "NIMV",
            TreatmentAction::VasoactiveDrugs => "VASOACTIVE_DRUGS",
            TreatmentAction::Dialysis => "DIALYSIS",
            TreatmentAction::SimpleClinicalTrial => "SIMPLE_CLINICAL_TRIAL",
            TreatmentAction::MediumClinicalTrial => "MEDIUM_CLINICAL_TRIAL",
            TreatmentAction::AdvancedClinicalTrial => "ADVANCED_CLINICAL_TRIAL",
            TreatmentAction::PalliativeSurgery => "PALLIATIVE_SURGERY",
            TreatmentAction::CureSurgery => "CURE_SURGERY",
            TreatmentAction::GiveAnalgesia => "GIVE_ANALGESIA",
            TreatmentAction::IncreaseSedation => "INCREASE_SEDATION",
        }
    }

    /// Parse the wire/database name of the action.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "CPR" => Some(TreatmentAction::Cpr),
            "TRANSPLANT" => Some(TreatmentAction::Transplant),
            "ICU" => Some(TreatmentAction::Icu),
            "NIMV" => Some(TreatmentAction::Nimv),
            "VASOACTIVE_DRUGS" => Some(TreatmentAction::VasoactiveDrugs),
            "DIALYSIS" => Some(TreatmentAction::Dialysis),
            "SIMPLE_CLINICAL_TRIAL" => Some(TreatmentAction::SimpleClinicalTrial),
            "MEDIUM_CLINICAL_TRIAL" => Some(TreatmentAction::MediumClinicalTrial),
            "ADVANCED_CLINICAL_TRIAL" => Some(TreatmentAction::AdvancedClinicalTrial),
            "PALLIATIVE_SURGERY" => Some(TreatmentAction::PalliativeSurgery),
            "CURE_SURGERY" => Some(TreatmentAction::CureSurgery),
            "GIVE_ANALGESIA" => Some(TreatmentAction::GiveAnalgesia),
            "INCREASE_SEDATION" => Some(TreatmentAction::IncreaseSedation),
            _ => None,
        }
    }
}

/// Feedback reported for a single treatment action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionFeedback {
    Allow,
    Deny,
    Unknown,
}

impl ActionFeedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionFeedback::Allow => "ALLOW",
            ActionFeedback::Deny => "DENY",
            ActionFeedback::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ALLOW" => Some(ActionFeedback::Allow),
            "DENY" => Some(ActionFeedback::Deny),
            "UNKNOWN" => Some(ActionFeedback::Unknown),
            _ => None,
        }
    }
}

/// An immutable snapshot of the clinical assessment of a patient.
///
/// Pure value semantics: two snapshots with equal fields are the same
/// snapshot, and unset fields compare equal to each other. The dedup
/// store guarantees at most one persisted record per distinct value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCriteria {
    /// The range of age of the patient.
    pub age_range: Option<AgeRangeOption>,

    /// Whether the patient has a complex chronic disease (CCD).
    pub ccd: Option<YesNoUnknownOption>,

    /// MACA: answered no to "would you be surprised if this patient died
    /// in less than 12 months?".
    pub maca: Option<YesNoUnknownOption>,

    /// The expected survival time.
    pub expected_survival: Option<SurvivalOptions>,

    /// The frailty index (Frail-VIG).
    pub frail_vig: Option<SpictScale>,

    /// The clinical risk group.
    pub clinical_risk_group: Option<ClinicalRiskGroupOption>,

    /// Whether the patient has social support.
    pub has_social_support: Option<YesNoUnknownOption>,

    /// Independence for basic activities of daily living at admission.
    pub independence_at_admission: Option<BarthelIndex>,

    /// Independence for instrumental activities.
    pub independence_instrumental_activities: Option<LawtonIndex>,

    /// Whether the patient has advance directives.
    pub has_advance_directives: Option<YesNoUnknownOption>,

    /// Whether the patient is competent to understand instructions.
    pub is_competent: Option<YesNoUnknownOption>,

    /// Whether the patient or their referent has been informed of the
    /// possible treatments and their consequences.
    pub has_been_informed: Option<YesNoUnknownOption>,

    /// Whether coercion/pressure by third parties has been detected.
    pub is_coerced: Option<YesNoUnknownOption>,

    /// Cognitive impairment level.
    pub has_cognitive_impairment: Option<CognitiveImpairmentLevel>,

    /// Whether the patient has emotional pain.
    pub has_emotional_pain: Option<YesNoUnknownOption>,

    /// Degree of discomfort before applying any action.
    pub discomfort_degree: Option<DiscomfortDegree>,

    /// Therapeutic intensity level.
    pub nit_level: Option<NitLevel>,
}

/// A patient as served over the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    /// Epoch seconds of the last write to this patient.
    pub updated_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusCriteria>,
}

/// The minimal representation of a patient, embedded in treatment views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinPatient {
    pub id: i64,
    pub name: String,
}

/// One page of patients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinPatientPage {
    pub total: u64,
    pub patients: Vec<MinPatient>,
}

/// A treatment action together with the latest feedback reported for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionWithFeedback {
    pub action: TreatmentAction,
    /// Latest feedback, or none if no feedback has arrived yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<ActionFeedback>,
    /// Epoch seconds of the latest feedback, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_time: Option<i64>,
}

/// The latest alignment reported for a value name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueAlignment {
    /// Lower-cased value name; feedback is grouped case-insensitively.
    pub name: String,
    pub alignment: f64,
    /// Epoch seconds of the latest feedback for this value.
    pub updated_time: i64,
}

/// The projected read view of a treatment: the fixed action list with
/// latest-wins feedback, and the latest alignment per value name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentView {
    pub id: i64,
    pub created_time: i64,
    pub patient: MinPatient,
    pub before_status: StatusCriteria,
    pub expected_status: StatusCriteria,
    pub actions: Vec<ActionWithFeedback>,
    pub values: Vec<ValueAlignment>,
}

/// The minimal representation of a treatment, used in pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinTreatment {
    pub id: i64,
    pub created_time: i64,
    pub patient: MinPatient,
}

/// One page of treatments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinTreatmentPage {
    pub total: u64,
    pub treatments: Vec<MinTreatment>,
}

/// Current epoch time in seconds.
pub fn now_epoch_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}
