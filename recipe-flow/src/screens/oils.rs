use async_trait::async_trait;
use tracing::info;

use super::{Readiness, StepOutcome, StepScreen, halt, toggle};
use crate::{
    error::{Result, WizardError},
    models::FormDataPatch,
    step::Step,
    wizard::{Wizard, WizardState},
};

/// Final oil selection. Recipe generation from the chosen oils is not offered
/// yet, so submitting ends the wizard.
#[derive(Debug, Clone, Copy, Default)]
pub struct OilsScreen;

impl OilsScreen {
    pub async fn toggle_oil(&self, wizard: &Wizard, name_english: &str) -> Result<()> {
        let form = wizard.form_data().await;
        let oil = form
            .suggested_oils_by_property
            .as_ref()
            .and_then(|by_property| {
                by_property
                    .values()
                    .flat_map(|p| p.suggested_oils.iter())
                    .find(|oil| oil.name_english == name_english)
            })
            .cloned()
            .ok_or_else(|| WizardError::Validation(format!("Unknown oil: {name_english}")))?;

        let mut selected = form.final_selected_oils.unwrap_or_default();
        toggle(&mut selected, oil, |o| o.name_english == name_english);
        let valid = !selected.is_empty();

        wizard
            .update_form_data(FormDataPatch::default().final_selected_oils(Some(selected)))
            .await;
        wizard.update_form_validity(valid).await;
        Ok(())
    }
}

#[async_trait]
impl StepScreen for OilsScreen {
    type Input = ();

    fn step(&self) -> Step {
        Step::Oils
    }

    fn readiness(&self, state: &WizardState) -> Readiness {
        if state.is_loading {
            Readiness::Loading
        } else if state.form_data.suggested_oils_by_property.is_some() {
            Readiness::Ready
        } else {
            Readiness::Unavailable
        }
    }

    async fn submit(&self, wizard: &Wizard, _input: ()) -> StepOutcome {
        let form = wizard.form_data().await;
        let Some(oils) = form.final_selected_oils.filter(|oils| !oils.is_empty()) else {
            return halt(
                wizard,
                WizardError::Validation("Please select at least one oil".to_string()),
            )
            .await;
        };

        wizard.set_error(None).await;
        info!(oils = oils.len(), "Oil selection complete, recipe generation coming soon");
        StepOutcome::Complete
    }
}
