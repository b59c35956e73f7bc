use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::{Readiness, StepOutcome, StepScreen, clear_from, finish_request, halt};
use crate::{
    client::{ApiStep, StepResult, WorkflowApi, WorkflowRequest},
    error::{Result, WizardError},
    models::{AgeCategory, FormDataPatch, Gender},
    step::Step,
    wizard::{LoadingFlag, Wizard, WizardState},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicsInput {
    pub gender: Gender,
    pub age_category: AgeCategory,
    pub age_specific: String,
}

impl DemographicsInput {
    fn validate(&self) -> Result<u32> {
        let range = self.age_category.range();
        self.age_specific
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|age| range.contains(age))
            .ok_or_else(|| {
                WizardError::Validation(format!(
                    "Age must be between {} and {} for category {}",
                    range.start(),
                    range.end(),
                    self.age_category
                ))
            })
    }
}

/// Gender and age. Submitting navigates to the causes screen right away; the
/// causes are fetched in the background.
#[derive(Clone)]
pub struct DemographicsScreen {
    api: Arc<dyn WorkflowApi>,
}

impl DemographicsScreen {
    pub fn new(api: Arc<dyn WorkflowApi>) -> Self {
        Self { api }
    }

    /// Pick an age category. The specific age is reset to the category's
    /// minimum when the current value does not fit the new range.
    pub async fn select_age_category(&self, wizard: &Wizard, category: AgeCategory) -> String {
        let form = wizard.form_data().await;
        let age = form
            .age_specific
            .filter(|age| category.accepts(age))
            .unwrap_or_else(|| category.min_age().to_string());

        wizard
            .update_form_data(
                FormDataPatch::default()
                    .age_category(Some(category))
                    .age_specific(Some(age.clone())),
            )
            .await;
        wizard.update_form_validity(form.gender.is_some()).await;
        age
    }

    pub async fn select_gender(&self, wizard: &Wizard, gender: Gender) {
        wizard
            .update_form_data(FormDataPatch::default().gender(Some(gender)))
            .await;
        let form = wizard.form_data().await;
        let valid = match (form.age_category, form.age_specific.as_deref()) {
            (Some(category), Some(age)) => category.accepts(age),
            _ => false,
        };
        wizard.update_form_validity(valid).await;
    }
}

#[async_trait]
impl StepScreen for DemographicsScreen {
    type Input = DemographicsInput;

    fn step(&self) -> Step {
        Step::Demographics
    }

    fn readiness(&self, state: &WizardState) -> Readiness {
        if state.form_data.health_concern.is_some() {
            Readiness::Ready
        } else {
            Readiness::Unavailable
        }
    }

    async fn submit(&self, wizard: &Wizard, input: DemographicsInput) -> StepOutcome {
        if wizard.form_data().await.health_concern.is_none() {
            return halt(
                wizard,
                WizardError::Validation("Missing required data: health concern".to_string()),
            )
            .await;
        }
        if let Err(e) = input.validate() {
            return halt(wizard, e).await;
        }

        // Causes from an earlier run no longer match these answers.
        wizard
            .update_form_data(
                clear_from(Step::Causes)
                    .potential_causes_result(None)
                    .gender(Some(input.gender))
                    .age_category(Some(input.age_category))
                    .age_specific(Some(input.age_specific.trim().to_string())),
            )
            .await;

        let form = wizard.form_data().await;
        let request =
            WorkflowRequest::for_step(ApiStep::PotentialCauses, &form, self.api.user_language());
        let ticket = wizard.begin_request(LoadingFlag::Causes).await;
        info!(generation = ticket.generation(), "Fetching potential causes in the background");

        let api = self.api.clone();
        let background = wizard.clone();
        let fetch = tokio::spawn(async move {
            finish_request(
                &background,
                api.as_ref(),
                ticket,
                request,
                Step::Causes,
                |result| match result {
                    StepResult::PotentialCauses(causes) => {
                        Ok(clear_from(Step::Causes).potential_causes_result(Some(causes)))
                    }
                    _ => Err(WizardError::UnexpectedResponseFormat),
                },
            )
            .await;
        });

        StepOutcome::Loading {
            step: Step::Causes,
            fetch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StepResult;
    use crate::models::Cause;
    use crate::screens::testing::ScriptedApi;

    fn stress() -> Cause {
        Cause {
            cause_name: "Stress".to_string(),
            cause_suggestion: "Take breaks".to_string(),
            explanation: "Sustained tension".to_string(),
        }
    }

    async fn wizard_with_concern() -> Wizard {
        let wizard = Wizard::in_memory();
        wizard
            .update_form_data(FormDataPatch::default().health_concern(Some("Headache".to_string())))
            .await;
        wizard.set_current_step(Step::Demographics).await;
        wizard
    }

    fn adult_female() -> DemographicsInput {
        DemographicsInput {
            gender: Gender::Female,
            age_category: AgeCategory::Adult,
            age_specific: "35".to_string(),
        }
    }

    #[tokio::test]
    async fn category_change_clamps_age_to_minimum() {
        let wizard = wizard_with_concern().await;
        let screen = DemographicsScreen::new(Arc::new(ScriptedApi::failing("unused")));
        wizard
            .update_form_data(FormDataPatch::default().age_specific(Some("65".to_string())))
            .await;

        let age = screen.select_age_category(&wizard, AgeCategory::Child).await;

        assert_eq!(age, "3");
        let form = wizard.form_data().await;
        assert_eq!(form.age_specific.as_deref(), Some("3"));
        assert_eq!(form.age_category, Some(AgeCategory::Child));
    }

    #[tokio::test]
    async fn category_change_keeps_fitting_age() {
        let wizard = wizard_with_concern().await;
        let screen = DemographicsScreen::new(Arc::new(ScriptedApi::failing("unused")));
        wizard
            .update_form_data(FormDataPatch::default().age_specific(Some("7".to_string())))
            .await;
        screen.select_gender(&wizard, Gender::Male).await;

        assert_eq!(screen.select_age_category(&wizard, AgeCategory::Child).await, "7");
        assert!(wizard.state().await.is_form_valid);
    }

    #[tokio::test]
    async fn happy_path_fetches_causes_and_advances() {
        let wizard = wizard_with_concern().await;
        let api = Arc::new(ScriptedApi::new(|_| {
            Ok(StepResult::PotentialCauses(vec![stress()]))
        }));
        let screen = DemographicsScreen::new(api.clone());

        let (step, fetch) = match screen.submit(&wizard, adult_female()).await {
            StepOutcome::Loading { step, fetch } => (step, fetch),
            other => panic!("expected optimistic navigation, got {other:?}"),
        };
        assert_eq!(step, Step::Causes);
        fetch.await.unwrap();

        let state = wizard.state().await;
        assert_eq!(state.form_data.potential_causes_result, Some(vec![stress()]));
        assert_eq!(state.current_step, Some(Step::Causes));
        assert!(!state.is_fetching_causes);
        assert_eq!(state.form_data.gender, Some(Gender::Female));
        assert_eq!(state.form_data.age_specific.as_deref(), Some("35"));

        let request = api.last_request().unwrap();
        assert_eq!(request.step, ApiStep::PotentialCauses);
        assert_eq!(request.health_concern.as_deref(), Some("Headache"));
        assert_eq!(request.user_language, "PT_BR");
    }

    #[tokio::test]
    async fn failed_fetch_keeps_step_and_sets_error() {
        let wizard = wizard_with_concern().await;
        let screen = DemographicsScreen::new(Arc::new(ScriptedApi::failing("network down")));

        if let StepOutcome::Loading { fetch, .. } = screen.submit(&wizard, adult_female()).await {
            fetch.await.unwrap();
        } else {
            panic!("expected a background fetch");
        }

        let state = wizard.state().await;
        assert_eq!(state.current_step, Some(Step::Demographics));
        assert_eq!(state.error.as_deref(), Some("network down"));
        assert!(!state.is_fetching_causes);
    }

    #[tokio::test]
    async fn resubmitting_drops_causes_of_the_previous_answers() {
        let wizard = wizard_with_concern().await;
        wizard
            .update_form_data(
                FormDataPatch::default()
                    .potential_causes_result(Some(vec![stress()]))
                    .selected_causes(Some(vec![stress()])),
            )
            .await;
        let screen = DemographicsScreen::new(Arc::new(ScriptedApi::failing("network down")));

        match screen.submit(&wizard, adult_female()).await {
            StepOutcome::Loading { fetch, .. } => fetch.await.unwrap(),
            other => panic!("expected a background fetch, got {other:?}"),
        }

        let form = wizard.form_data().await;
        assert_eq!(form.potential_causes_result, None);
        assert_eq!(form.selected_causes, None);
        assert_eq!(form.age_specific.as_deref(), Some("35"));
    }

    #[tokio::test]
    async fn out_of_range_age_is_rejected_without_call() {
        let wizard = wizard_with_concern().await;
        let api = Arc::new(ScriptedApi::failing("unused"));
        let screen = DemographicsScreen::new(api.clone());

        let outcome = screen
            .submit(
                &wizard,
                DemographicsInput {
                    gender: Gender::Male,
                    age_category: AgeCategory::Teen,
                    age_specific: "40".to_string(),
                },
            )
            .await;

        assert!(matches!(outcome, StepOutcome::Halted));
        assert_eq!(api.calls(), 0);
        let error = wizard.state().await.error.unwrap();
        assert!(error.contains("between 10 and 17"));
    }

    #[tokio::test]
    async fn unavailable_without_concern() {
        let wizard = Wizard::in_memory();
        let screen = DemographicsScreen::new(Arc::new(ScriptedApi::failing("unused")));
        assert!(matches!(
            screen.enter(&wizard).await,
            Err(WizardError::StepNotReady(Step::Demographics))
        ));
    }
}
