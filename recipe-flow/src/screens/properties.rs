use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::{Readiness, StepOutcome, StepScreen, clear_from, halt, require_base_data, settle, toggle};
use crate::{
    client::{StepResult, WorkflowApi, WorkflowRequest},
    error::{Result, WizardError},
    models::{FormDataPatch, PropertyOils, TherapeuticProperty, WizardFormData},
    step::Step,
    wizard::{LoadingFlag, Wizard, WizardState},
};

/// Therapeutic properties. Submitting fetches oil suggestions for every
/// selected property, one call per property.
#[derive(Clone)]
pub struct PropertiesScreen {
    api: Arc<dyn WorkflowApi>,
}

impl PropertiesScreen {
    pub fn new(api: Arc<dyn WorkflowApi>) -> Self {
        Self { api }
    }

    pub async fn toggle_property(&self, wizard: &Wizard, property_id: &str) -> Result<()> {
        let form = wizard.form_data().await;
        let property = form
            .medical_properties_result
            .as_ref()
            .and_then(|result| {
                result
                    .therapeutic_properties
                    .iter()
                    .find(|p| p.property_id == property_id)
            })
            .cloned()
            .ok_or_else(|| WizardError::Validation(format!("Unknown property: {property_id}")))?;

        let mut selected = form.selected_therapeutic_properties.unwrap_or_default();
        toggle(&mut selected, property, |p| p.property_id == property_id);
        let valid = !selected.is_empty();

        wizard
            .update_form_data(
                FormDataPatch::default().selected_therapeutic_properties(Some(selected)),
            )
            .await;
        wizard.update_form_validity(valid).await;
        Ok(())
    }

    async fn fetch_oils(
        &self,
        form: &WizardFormData,
        properties: &[TherapeuticProperty],
    ) -> Result<BTreeMap<String, PropertyOils>> {
        let mut by_property = BTreeMap::new();
        for property in properties {
            let request = WorkflowRequest::for_property(form, property, self.api.user_language());
            match self.api.call(&request).await? {
                StepResult::SuggestedOils(oils) => {
                    info!(
                        property_id = %property.property_id,
                        oils = oils.suggested_oils.len(),
                        "Oil suggestions received"
                    );
                    by_property.insert(property.property_id.clone(), oils);
                }
                _ => return Err(WizardError::UnexpectedResponseFormat),
            }
        }
        Ok(by_property)
    }
}

#[async_trait]
impl StepScreen for PropertiesScreen {
    type Input = ();

    fn step(&self) -> Step {
        Step::Properties
    }

    fn readiness(&self, state: &WizardState) -> Readiness {
        if state.is_fetching_properties {
            Readiness::Loading
        } else if state.form_data.medical_properties_result.is_some() {
            Readiness::Ready
        } else {
            Readiness::Unavailable
        }
    }

    async fn submit(&self, wizard: &Wizard, _input: ()) -> StepOutcome {
        let form = wizard.form_data().await;
        let properties = form
            .selected_therapeutic_properties
            .clone()
            .unwrap_or_default();
        if properties.is_empty() {
            return halt(
                wizard,
                WizardError::Validation("Please select at least one property".to_string()),
            )
            .await;
        }
        if let Err(e) = require_base_data(&form) {
            return halt(wizard, e).await;
        }

        let ticket = wizard.begin_request(LoadingFlag::Global).await;
        info!(
            properties = properties.len(),
            generation = ticket.generation(),
            "Fetching oil suggestions"
        );
        let result = self.fetch_oils(&form, &properties).await.map(|oils| {
            clear_from(Step::Oils).suggested_oils_by_property(Some(oils))
        });
        settle(wizard, ticket, result, Step::Oils).await
    }
}
