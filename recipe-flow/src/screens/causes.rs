use async_trait::async_trait;
use std::sync::Arc;

use super::{
    Readiness, StepOutcome, StepScreen, clear_from, halt, request_next_step, require_base_data,
    toggle,
};
use crate::{
    client::{ApiStep, StepResult, WorkflowApi, WorkflowRequest},
    error::{Result, WizardError},
    models::FormDataPatch,
    step::Step,
    wizard::{LoadingFlag, Wizard, WizardState},
};

#[derive(Clone)]
pub struct CausesScreen {
    api: Arc<dyn WorkflowApi>,
}

impl CausesScreen {
    pub fn new(api: Arc<dyn WorkflowApi>) -> Self {
        Self { api }
    }

    /// Select or deselect one of the offered causes by name.
    pub async fn toggle_cause(&self, wizard: &Wizard, cause_name: &str) -> Result<()> {
        let form = wizard.form_data().await;
        let cause = form
            .potential_causes_result
            .as_ref()
            .and_then(|causes| causes.iter().find(|c| c.cause_name == cause_name))
            .cloned()
            .ok_or_else(|| WizardError::Validation(format!("Unknown cause: {cause_name}")))?;

        let mut selected = form.selected_causes.unwrap_or_default();
        toggle(&mut selected, cause, |c| c.cause_name == cause_name);
        let valid = !selected.is_empty();

        wizard
            .update_form_data(FormDataPatch::default().selected_causes(Some(selected)))
            .await;
        wizard.update_form_validity(valid).await;
        Ok(())
    }
}

#[async_trait]
impl StepScreen for CausesScreen {
    type Input = ();

    fn step(&self) -> Step {
        Step::Causes
    }

    fn readiness(&self, state: &WizardState) -> Readiness {
        if state.is_fetching_causes {
            Readiness::Loading
        } else if state.form_data.potential_causes_result.is_some() {
            Readiness::Ready
        } else {
            Readiness::Unavailable
        }
    }

    async fn submit(&self, wizard: &Wizard, _input: ()) -> StepOutcome {
        let form = wizard.form_data().await;
        if form.selected_causes.as_ref().is_none_or(Vec::is_empty) {
            return halt(
                wizard,
                WizardError::Validation("Please select at least one cause".to_string()),
            )
            .await;
        }
        if let Err(e) = require_base_data(&form) {
            return halt(wizard, e).await;
        }

        let request =
            WorkflowRequest::for_step(ApiStep::PotentialSymptoms, &form, self.api.user_language());
        request_next_step(
            wizard,
            self.api.as_ref(),
            LoadingFlag::Symptoms,
            request,
            Step::Symptoms,
            |result| match result {
                StepResult::PotentialSymptoms(symptoms) => {
                    Ok(clear_from(Step::Symptoms).potential_symptoms_result(Some(symptoms)))
                }
                _ => Err(WizardError::UnexpectedResponseFormat),
            },
        )
        .await
    }
}
