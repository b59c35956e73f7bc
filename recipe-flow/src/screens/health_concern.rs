use async_trait::async_trait;
use tracing::info;

use super::{Readiness, StepOutcome, StepScreen, halt};
use crate::{
    error::WizardError,
    models::FormDataPatch,
    step::Step,
    wizard::{Wizard, WizardState},
};

/// First step: free-text description of what the user wants help with.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthConcernScreen;

impl HealthConcernScreen {
    /// Report validity of the text typed so far.
    pub async fn edit(&self, wizard: &Wizard, draft: &str) {
        wizard.update_form_validity(!draft.trim().is_empty()).await;
    }
}

#[async_trait]
impl StepScreen for HealthConcernScreen {
    type Input = String;

    fn step(&self) -> Step {
        Step::HealthConcern
    }

    fn readiness(&self, _state: &WizardState) -> Readiness {
        Readiness::Ready
    }

    /// Starting over: the previous run is discarded before the new concern is
    /// stored.
    async fn submit(&self, wizard: &Wizard, concern: String) -> StepOutcome {
        let concern = concern.trim();
        if concern.is_empty() {
            return halt(
                wizard,
                WizardError::Validation("Please describe your health concern".to_string()),
            )
            .await;
        }

        wizard.reset_form_data().await;
        wizard
            .update_form_data(FormDataPatch::default().health_concern(Some(concern.to_string())))
            .await;
        wizard.set_current_step(Step::Demographics).await;

        info!(concern_length = concern.len(), "Health concern captured");
        StepOutcome::Advanced(Step::Demographics)
    }
}
