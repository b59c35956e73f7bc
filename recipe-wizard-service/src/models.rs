use recipe_flow::{AgeCategory, Gender, ProgressFrame, Step, WizardState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthConcernRequest {
    pub health_concern: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    /// Cause or symptom name, property id, or oil English name.
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeCategoryRequest {
    pub age_category: AgeCategory,
}

#[derive(Debug, Deserialize)]
pub struct GenderRequest {
    pub gender: Gender,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub state: WizardState,
}

#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub session_id: String,
    /// `advanced`, `loading`, `complete`, `halted` or `superseded`.
    pub outcome: &'static str,
    pub step: Option<Step>,
    #[serde(flatten)]
    pub state: WizardState,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub session_id: String,
    pub loading: bool,
    pub frame: Option<ProgressFrame>,
}
