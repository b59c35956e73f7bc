//! Step screens: one per wizard step.
//!
//! A screen checks its entry precondition, performs local edits on the wizard
//! (selection toggles, age clamping) and submits the step. Submit handlers
//! never fail: every error ends up in the wizard's `error` string and the
//! screen reports [`StepOutcome::Halted`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    client::{StepResult, WorkflowApi, WorkflowRequest},
    error::{Result, WizardError},
    models::{FormDataPatch, WizardFormData},
    step::Step,
    wizard::{Commit, LoadingFlag, RequestTicket, Wizard, WizardState},
};

pub mod causes;
pub mod demographics;
pub mod health_concern;
pub mod oils;
pub mod properties;
pub mod symptoms;

pub use causes::CausesScreen;
pub use demographics::{DemographicsInput, DemographicsScreen};
pub use health_concern::HealthConcernScreen;
pub use oils::OilsScreen;
pub use properties::PropertiesScreen;
pub use symptoms::SymptomsScreen;

/// What happened when a step was submitted.
#[derive(Debug)]
pub enum StepOutcome {
    /// The wizard moved to the given step and its data is ready.
    Advanced(Step),
    /// The given step's screen is shown while its data is still being fetched
    /// in the background. The wizard only moves once the fetch succeeds.
    Loading { step: Step, fetch: JoinHandle<()> },
    /// The last step was submitted.
    Complete,
    /// Validation or the workflow call failed; see the wizard's `error`.
    Halted,
    /// The wizard moved on while the call was in flight; its result was dropped.
    Superseded,
}

/// Whether a screen can be shown for the current wizard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// The data this screen needs is still being fetched.
    Loading,
    Unavailable,
}

#[async_trait]
pub trait StepScreen: Send + Sync {
    type Input: Send + 'static;

    fn step(&self) -> Step;

    fn readiness(&self, state: &WizardState) -> Readiness;

    /// Show the screen. Entering a ready screen makes it the current step;
    /// a loading screen leaves the current step alone until its data arrives.
    async fn enter(&self, wizard: &Wizard) -> Result<Readiness> {
        let readiness = self.readiness(&wizard.state().await);
        match readiness {
            Readiness::Ready => wizard.set_current_step(self.step()).await,
            Readiness::Loading => {}
            Readiness::Unavailable => return Err(WizardError::StepNotReady(self.step())),
        }
        Ok(readiness)
    }

    async fn submit(&self, wizard: &Wizard, input: Self::Input) -> StepOutcome;
}

/// Every screen of the wizard, sharing one workflow client.
#[derive(Clone)]
pub struct WizardScreens {
    pub health_concern: HealthConcernScreen,
    pub demographics: DemographicsScreen,
    pub causes: CausesScreen,
    pub symptoms: SymptomsScreen,
    pub properties: PropertiesScreen,
    pub oils: OilsScreen,
}

impl WizardScreens {
    pub fn new(api: Arc<dyn WorkflowApi>) -> Self {
        Self {
            health_concern: HealthConcernScreen,
            demographics: DemographicsScreen::new(api.clone()),
            causes: CausesScreen::new(api.clone()),
            symptoms: SymptomsScreen::new(api.clone()),
            properties: PropertiesScreen::new(api),
            oils: OilsScreen,
        }
    }

    pub async fn enter(&self, step: Step, wizard: &Wizard) -> Result<Readiness> {
        match step {
            Step::HealthConcern => self.health_concern.enter(wizard).await,
            Step::Demographics => self.demographics.enter(wizard).await,
            Step::Causes => self.causes.enter(wizard).await,
            Step::Symptoms => self.symptoms.enter(wizard).await,
            Step::Properties => self.properties.enter(wizard).await,
            Step::Oils => self.oils.enter(wizard).await,
        }
    }
}

/// Surface a failure that happened before any request was dispatched.
pub(crate) async fn halt(wizard: &Wizard, err: WizardError) -> StepOutcome {
    warn!(error = %err, "Step submission rejected");
    wizard.set_error(Some(err.to_string())).await;
    StepOutcome::Halted
}

/// Fail fast when the demographic base of every payload is missing.
pub(crate) fn require_base_data(form: &WizardFormData) -> Result<()> {
    let missing = [
        ("health concern", form.health_concern.is_none()),
        ("gender", form.gender.is_none()),
        ("age category", form.age_category.is_none()),
        ("age", form.age_specific.is_none()),
    ]
    .into_iter()
    .filter_map(|(name, absent)| absent.then_some(name))
    .collect::<Vec<_>>();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(WizardError::Validation(format!(
            "Missing required data: {}",
            missing.join(", ")
        )))
    }
}

/// Await one workflow call and hand its outcome back to the wizard.
pub(crate) async fn finish_request<F>(
    wizard: &Wizard,
    api: &dyn WorkflowApi,
    ticket: RequestTicket,
    request: WorkflowRequest,
    advance_to: Step,
    into_patch: F,
) -> StepOutcome
where
    F: FnOnce(StepResult) -> Result<FormDataPatch> + Send,
{
    let result = api.call(&request).await.and_then(into_patch);
    settle(wizard, ticket, result, advance_to).await
}

pub(crate) async fn settle(
    wizard: &Wizard,
    ticket: RequestTicket,
    result: Result<FormDataPatch>,
    advance_to: Step,
) -> StepOutcome {
    match result {
        Ok(patch) => match wizard.commit(ticket, patch, Some(advance_to)).await {
            Commit::Stale => StepOutcome::Superseded,
            Commit::Applied(_) | Commit::Rejected => StepOutcome::Advanced(advance_to),
        },
        Err(e) => {
            warn!(step = %advance_to, error = %e, "Workflow call failed");
            match wizard.reject(ticket, e.to_string()).await {
                Commit::Stale => StepOutcome::Superseded,
                Commit::Applied(_) | Commit::Rejected => StepOutcome::Halted,
            }
        }
    }
}

/// Dispatch the call for the next step and wait for it.
pub(crate) async fn request_next_step<F>(
    wizard: &Wizard,
    api: &dyn WorkflowApi,
    flag: LoadingFlag,
    request: WorkflowRequest,
    advance_to: Step,
    into_patch: F,
) -> StepOutcome
where
    F: FnOnce(StepResult) -> Result<FormDataPatch> + Send,
{
    let ticket = wizard.begin_request(flag).await;
    info!(step = %request.step, generation = ticket.generation(), "Dispatching workflow call");
    finish_request(wizard, api, ticket, request, advance_to, into_patch).await
}

/// A patch that drops the selection made on `step` and everything produced by
/// later steps.
pub(crate) fn clear_from(step: Step) -> FormDataPatch {
    let mut patch = FormDataPatch::default();
    if step <= Step::Causes {
        patch = patch.selected_causes(None);
    }
    if step < Step::Symptoms {
        patch = patch.potential_symptoms_result(None);
    }
    if step <= Step::Symptoms {
        patch = patch.selected_symptoms(None);
    }
    if step < Step::Properties {
        patch = patch.medical_properties_result(None);
    }
    if step <= Step::Properties {
        patch = patch.selected_therapeutic_properties(None);
    }
    if step < Step::Oils {
        patch = patch.suggested_oils_by_property(None);
    }
    patch.final_selected_oils(None)
}

/// Remove the first element matching `is_match`, or append `item`.
pub(crate) fn toggle<T, F>(items: &mut Vec<T>, item: T, is_match: F)
where
    F: Fn(&T) -> bool,
{
    match items.iter().position(is_match) {
        Some(idx) => {
            items.remove(idx);
        }
        None => items.push(item),
    }
}
