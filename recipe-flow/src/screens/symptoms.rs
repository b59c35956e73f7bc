use async_trait::async_trait;
use std::sync::Arc;

use super::{
    Readiness, StepOutcome, StepScreen, clear_from, halt, request_next_step, require_base_data,
    toggle,
};
use crate::{
    client::{ApiStep, StepResult, WorkflowApi, WorkflowRequest},
    error::{Result, WizardError},
    models::{FormDataPatch, SelectedSymptom},
    step::Step,
    wizard::{LoadingFlag, Wizard, WizardState},
};

#[derive(Clone)]
pub struct SymptomsScreen {
    api: Arc<dyn WorkflowApi>,
}

impl SymptomsScreen {
    pub fn new(api: Arc<dyn WorkflowApi>) -> Self {
        Self { api }
    }

    pub async fn toggle_symptom(&self, wizard: &Wizard, symptom_name: &str) -> Result<()> {
        let form = wizard.form_data().await;
        let offered = form
            .potential_symptoms_result
            .as_ref()
            .is_some_and(|symptoms| symptoms.iter().any(|s| s.symptom_name == symptom_name));
        if !offered {
            return Err(WizardError::Validation(format!(
                "Unknown symptom: {symptom_name}"
            )));
        }

        let mut selected = form.selected_symptoms.unwrap_or_default();
        toggle(
            &mut selected,
            SelectedSymptom {
                symptom_name: symptom_name.to_string(),
            },
            |s| s.symptom_name == symptom_name,
        );
        let valid = !selected.is_empty();

        wizard
            .update_form_data(FormDataPatch::default().selected_symptoms(Some(selected)))
            .await;
        wizard.update_form_validity(valid).await;
        Ok(())
    }
}

#[async_trait]
impl StepScreen for SymptomsScreen {
    type Input = ();

    fn step(&self) -> Step {
        Step::Symptoms
    }

    fn readiness(&self, state: &WizardState) -> Readiness {
        if state.is_fetching_symptoms {
            Readiness::Loading
        } else if state.form_data.potential_symptoms_result.is_some() {
            Readiness::Ready
        } else {
            Readiness::Unavailable
        }
    }

    async fn submit(&self, wizard: &Wizard, _input: ()) -> StepOutcome {
        let form = wizard.form_data().await;
        if form.selected_symptoms.as_ref().is_none_or(Vec::is_empty) {
            return halt(
                wizard,
                WizardError::Validation("Please select at least one symptom".to_string()),
            )
            .await;
        }
        if let Err(e) = require_base_data(&form) {
            return halt(wizard, e).await;
        }

        let request = WorkflowRequest::for_step(
            ApiStep::TherapeuticProperties,
            &form,
            self.api.user_language(),
        );
        request_next_step(
            wizard,
            self.api.as_ref(),
            LoadingFlag::Properties,
            request,
            Step::Properties,
            |result| match result {
                StepResult::TherapeuticProperties(properties) => {
                    Ok(clear_from(Step::Properties).medical_properties_result(Some(properties)))
                }
                _ => Err(WizardError::UnexpectedResponseFormat),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AgeCategory, Cause, Gender, MedicalPropertiesResult, Symptom, TherapeuticProperty,
    };
    use crate::screens::testing::ScriptedApi;

    async fn wizard_on_symptoms() -> Wizard {
        let wizard = Wizard::in_memory();
        wizard
            .update_form_data(
                FormDataPatch::default()
                    .health_concern(Some("Insomnia".to_string()))
                    .gender(Some(Gender::Male))
                    .age_category(Some(AgeCategory::Senior))
                    .age_specific(Some("70".to_string()))
                    .selected_causes(Some(vec![Cause {
                        cause_name: "Anxiety".to_string(),
                        cause_suggestion: String::new(),
                        explanation: String::new(),
                    }]))
                    .potential_symptoms_result(Some(vec![Symptom {
                        symptom_name: "Racing thoughts".to_string(),
                        symptom_suggestion: String::new(),
                        explanation: String::new(),
                    }])),
            )
            .await;
        wizard.set_current_step(Step::Symptoms).await;
        wizard
    }

    fn properties() -> MedicalPropertiesResult {
        MedicalPropertiesResult {
            health_concern_in_english: "Insomnia".to_string(),
            therapeutic_properties: vec![TherapeuticProperty {
                property_id: "calm".to_string(),
                property_name: "Calmante".to_string(),
                property_name_in_english: "Calming".to_string(),
                description: String::new(),
                causes_addressed: serde_json::Value::Null,
                symptoms_addressed: serde_json::Value::Null,
                relevancy: 5.0,
            }],
        }
    }

    #[tokio::test]
    async fn submit_fetches_properties() {
        let wizard = wizard_on_symptoms().await;
        let api = Arc::new(ScriptedApi::new(|_| {
            Ok(StepResult::TherapeuticProperties(properties()))
        }));
        let screen = SymptomsScreen::new(api.clone());
        screen.toggle_symptom(&wizard, "Racing thoughts").await.unwrap();

        let outcome = screen.submit(&wizard, ()).await;

        assert!(matches!(outcome, StepOutcome::Advanced(Step::Properties)));
        let state = wizard.state().await;
        assert_eq!(state.form_data.medical_properties_result, Some(properties()));
        assert_eq!(state.current_step, Some(Step::Properties));

        let request = api.last_request().unwrap();
        assert_eq!(request.step, ApiStep::TherapeuticProperties);
        assert_eq!(
            request.selected_symptoms.unwrap()[0].symptom_name,
            "Racing thoughts"
        );
        assert!(request.selected_causes.is_some());
    }

    #[tokio::test]
    async fn requires_a_selection() {
        let wizard = wizard_on_symptoms().await;
        let api = Arc::new(ScriptedApi::failing("unused"));
        let outcome = SymptomsScreen::new(api.clone()).submit(&wizard, ()).await;

        assert!(matches!(outcome, StepOutcome::Halted));
        assert_eq!(api.calls(), 0);
        assert_eq!(
            wizard.state().await.error.as_deref(),
            Some("Please select at least one symptom")
        );
    }

    #[tokio::test]
    async fn api_failure_keeps_step_and_surfaces_message() {
        let wizard = wizard_on_symptoms().await;
        let screen = SymptomsScreen::new(Arc::new(ScriptedApi::failing("network down")));
        screen.toggle_symptom(&wizard, "Racing thoughts").await.unwrap();

        let outcome = screen.submit(&wizard, ()).await;

        assert!(matches!(outcome, StepOutcome::Halted));
        let state = wizard.state().await;
        assert_eq!(state.current_step, Some(Step::Symptoms));
        assert_eq!(state.error.as_deref(), Some("network down"));
        assert!(!state.is_fetching_properties);
        assert_eq!(state.form_data.medical_properties_result, None);
    }

    #[tokio::test]
    async fn pending_fetch_hides_previous_symptoms() {
        let wizard = wizard_on_symptoms().await;
        wizard.set_current_step(Step::Causes).await;
        wizard.set_is_fetching_symptoms(true).await;
        let screen = SymptomsScreen::new(Arc::new(ScriptedApi::failing("unused")));

        assert_eq!(screen.enter(&wizard).await.unwrap(), Readiness::Loading);
        assert_eq!(wizard.current_step().await, Some(Step::Causes));
    }

    #[tokio::test]
    async fn wrong_result_kind_is_a_format_error() {
        let wizard = wizard_on_symptoms().await;
        let api = Arc::new(ScriptedApi::new(|_| Ok(StepResult::PotentialCauses(vec![]))));
        let screen = SymptomsScreen::new(api);
        screen.toggle_symptom(&wizard, "Racing thoughts").await.unwrap();

        assert!(matches!(screen.submit(&wizard, ()).await, StepOutcome::Halted));
        assert_eq!(
            wizard.state().await.error.as_deref(),
            Some("unexpected response format")
        );
    }
}
