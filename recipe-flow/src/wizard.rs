//! The recipe wizard state machine.
//!
//! A [`Wizard`] is a cheap, cloneable handle to the state of one wizard session.
//! Step screens receive the handle explicitly and mutate state only through the
//! operations below; every mutation is a last-write-wins update under a single
//! lock.
//!
//! Asynchronous calls are guarded by a request generation counter: a screen
//! takes a [`RequestTicket`] before dispatching a workflow call and hands it
//! back when the call resolves. If the wizard was reset, moved to another step,
//! or a newer request was dispatched in the meantime, the late result is dropped
//! instead of overwriting newer state.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    models::{FormDataPatch, WizardFormData},
    step::Step,
    storage::SessionPersistence,
};

/// Complete observable state of a wizard session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WizardState {
    pub form_data: WizardFormData,
    pub current_step: Option<Step>,
    pub is_loading: bool,
    pub is_fetching_causes: bool,
    pub is_fetching_symptoms: bool,
    pub is_fetching_properties: bool,
    pub error: Option<String>,
    pub is_form_valid: bool,
    /// Set when the last snapshot write or removal failed; progress may not
    /// survive a reload.
    pub persistence_degraded: bool,
    #[serde(skip)]
    generation: u64,
    /// Generation of the request that raised each loading flag.
    #[serde(skip)]
    in_flight: HashMap<LoadingFlag, u64>,
}

impl WizardState {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loading_flag(&self, flag: LoadingFlag) -> bool {
        match flag {
            LoadingFlag::Global => self.is_loading,
            LoadingFlag::Causes => self.is_fetching_causes,
            LoadingFlag::Symptoms => self.is_fetching_symptoms,
            LoadingFlag::Properties => self.is_fetching_properties,
        }
    }

    fn set_loading_flag(&mut self, flag: LoadingFlag, value: bool) {
        match flag {
            LoadingFlag::Global => {
                self.is_loading = value;
                self.form_data.is_loading = value;
            }
            LoadingFlag::Causes => self.is_fetching_causes = value,
            LoadingFlag::Symptoms => self.is_fetching_symptoms = value,
            LoadingFlag::Properties => self.is_fetching_properties = value,
        }
    }

    /// Lower `flag` if the request behind `ticket` still owns it.
    fn release_flag(&mut self, ticket: &RequestTicket) {
        if self.in_flight.get(&ticket.flag) == Some(&ticket.generation) {
            self.in_flight.remove(&ticket.flag);
            self.set_loading_flag(ticket.flag, false);
        }
    }

    pub fn any_loading(&self) -> bool {
        self.is_loading
            || self.is_fetching_causes
            || self.is_fetching_symptoms
            || self.is_fetching_properties
    }
}

/// Which loading indicator an in-flight request drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingFlag {
    Global,
    Causes,
    Symptoms,
    Properties,
}

/// Outcome of writing the snapshot after a form update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistStatus {
    Persisted,
    /// The update was applied in memory but the snapshot could not be written.
    InMemoryOnly(String),
}

/// Captured at dispatch time; see the module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    generation: u64,
    flag: LoadingFlag,
}

impl RequestTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of handing a ticket back to the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    Applied(PersistStatus),
    /// A failure was recorded in `error`; form data and snapshot are untouched.
    Rejected,
    /// The wizard moved on since the request was dispatched; nothing changed.
    Stale,
}

#[derive(Clone)]
pub struct Wizard {
    state: Arc<RwLock<WizardState>>,
    persistence: Option<SessionPersistence>,
}

impl Wizard {
    /// Restore a wizard from its session snapshot, or start from defaults.
    ///
    /// The handle is only returned once the snapshot has been read, so no
    /// screen ever observes a half-initialized wizard. A failing read is logged
    /// and the wizard starts empty.
    pub async fn initialize(persistence: SessionPersistence) -> Self {
        let mut state = WizardState::default();

        match persistence.read().await {
            Ok(Some(snapshot)) => {
                info!(key = %persistence.key(), "Restored wizard snapshot");
                state.form_data = snapshot;
            }
            Ok(None) => {
                debug!(key = %persistence.key(), "No wizard snapshot found, starting fresh");
            }
            Err(e) => {
                warn!(key = %persistence.key(), error = %e, "Failed to read wizard snapshot");
                state.persistence_degraded = true;
            }
        }

        Self::with_state(state, persistence)
    }

    /// Restore a wizard only if its session has a snapshot.
    pub async fn restore(persistence: SessionPersistence) -> Result<Option<Self>> {
        let Some(snapshot) = persistence.read().await? else {
            return Ok(None);
        };
        info!(key = %persistence.key(), "Restored wizard snapshot");

        let state = WizardState {
            form_data: snapshot,
            ..WizardState::default()
        };
        Ok(Some(Self::with_state(state, persistence)))
    }

    fn with_state(mut state: WizardState, persistence: SessionPersistence) -> Self {
        // Loading state is never trusted across a reload.
        state.form_data.is_loading = false;
        state.is_loading = false;

        Self {
            state: Arc::new(RwLock::new(state)),
            persistence: Some(persistence),
        }
    }

    /// A wizard that keeps its state in memory only.
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(RwLock::new(WizardState::default())),
            persistence: None,
        }
    }

    pub async fn state(&self) -> WizardState {
        self.state.read().await.clone()
    }

    pub async fn form_data(&self) -> WizardFormData {
        self.state.read().await.form_data.clone()
    }

    pub async fn current_step(&self) -> Option<Step> {
        self.state.read().await.current_step
    }

    /// Shallow-merge `patch` into the form data and persist the snapshot.
    ///
    /// No validation happens here. Persistence failures never fail the update.
    pub async fn update_form_data(&self, patch: FormDataPatch) -> PersistStatus {
        let mut state = self.state.write().await;
        patch.apply_to(&mut state.form_data);
        self.persist(&mut state).await
    }

    /// Back to defaults with the snapshot removed. Idempotent.
    pub async fn reset_form_data(&self) {
        let mut state = self.state.write().await;
        let generation = state.generation + 1;
        *state = WizardState {
            generation,
            ..WizardState::default()
        };

        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.clear().await {
                warn!(key = %persistence.key(), error = %e, "Failed to remove wizard snapshot");
                state.persistence_degraded = true;
            }
        }
        info!("Wizard reset");
    }

    /// Move to `step`. The incoming screen must re-establish form validity.
    ///
    /// Any actual change of step invalidates in-flight requests.
    pub async fn set_current_step(&self, step: Step) {
        let mut state = self.state.write().await;
        if state.current_step != Some(step) {
            state.generation += 1;
            debug!(from = ?state.current_step, to = %step, "Step change supersedes pending requests");
        }
        state.current_step = Some(step);
        state.is_form_valid = false;
        info!(step = %step, "Wizard step changed");
    }

    pub async fn set_is_loading(&self, value: bool) {
        self.state
            .write()
            .await
            .set_loading_flag(LoadingFlag::Global, value);
    }

    pub async fn set_is_fetching_causes(&self, value: bool) {
        self.state.write().await.is_fetching_causes = value;
    }

    pub async fn set_is_fetching_symptoms(&self, value: bool) {
        self.state.write().await.is_fetching_symptoms = value;
    }

    pub async fn set_is_fetching_properties(&self, value: bool) {
        self.state.write().await.is_fetching_properties = value;
    }

    pub async fn set_error(&self, message: Option<String>) {
        if let Some(message) = &message {
            debug!(error = %message, "Wizard error set");
        }
        self.state.write().await.error = message;
    }

    pub async fn update_form_validity(&self, valid: bool) {
        self.state.write().await.is_form_valid = valid;
    }

    /// Start an asynchronous request: raises `flag`, clears the error and
    /// returns a ticket bound to a fresh generation.
    pub async fn begin_request(&self, flag: LoadingFlag) -> RequestTicket {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.error = None;
        state.set_loading_flag(flag, true);
        let generation = state.generation;
        state.in_flight.insert(flag, generation);
        RequestTicket {
            generation,
            flag,
        }
    }

    pub async fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.state.read().await.generation == ticket.generation
    }

    /// Apply the result of a request if its ticket is still current, optionally
    /// advancing to `advance_to`.
    pub async fn commit(
        &self,
        ticket: RequestTicket,
        patch: FormDataPatch,
        advance_to: Option<Step>,
    ) -> Commit {
        let mut state = self.state.write().await;
        if state.generation != ticket.generation {
            warn!(
                ticket = ticket.generation,
                current = state.generation,
                "Discarding stale workflow result"
            );
            state.release_flag(&ticket);
            return Commit::Stale;
        }

        state.release_flag(&ticket);
        patch.apply_to(&mut state.form_data);
        if let Some(step) = advance_to {
            state.current_step = Some(step);
            state.is_form_valid = false;
            info!(step = %step, "Wizard advanced");
        }
        Commit::Applied(self.persist(&mut state).await)
    }

    /// Record the failure of a request if its ticket is still current.
    pub async fn reject(&self, ticket: RequestTicket, message: String) -> Commit {
        let mut state = self.state.write().await;
        if state.generation != ticket.generation {
            warn!(
                ticket = ticket.generation,
                error = %message,
                "Discarding failure of stale workflow request"
            );
            state.release_flag(&ticket);
            return Commit::Stale;
        }

        state.release_flag(&ticket);
        state.error = Some(message);
        Commit::Rejected
    }

    async fn persist(&self, state: &mut WizardState) -> PersistStatus {
        let Some(persistence) = &self.persistence else {
            return PersistStatus::Persisted;
        };

        match persistence.write(&state.form_data).await {
            Ok(()) => {
                state.persistence_degraded = false;
                PersistStatus::Persisted
            }
            Err(e) => {
                warn!(key = %persistence.key(), error = %e, "Continuing without persistence");
                state.persistence_degraded = true;
                PersistStatus::InMemoryOnly(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, WizardError};
    use crate::models::{AgeCategory, Cause, Gender};
    use crate::storage::{InMemorySnapshotStorage, SnapshotStorage};
    use async_trait::async_trait;

    struct BrokenStorage;

    #[async_trait]
    impl SnapshotStorage for BrokenStorage {
        async fn save(&self, _key: &str, _snapshot: &WizardFormData) -> Result<()> {
            Err(WizardError::Storage("quota exceeded".to_string()))
        }

        async fn load(&self, _key: &str) -> Result<Option<WizardFormData>> {
            Err(WizardError::Storage("unavailable".to_string()))
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(WizardError::Storage("unavailable".to_string()))
        }
    }

    fn stress() -> Cause {
        Cause {
            cause_name: "Stress".to_string(),
            cause_suggestion: "Rest more".to_string(),
            explanation: "Tension builds up".to_string(),
        }
    }

    fn persistence(storage: Arc<dyn SnapshotStorage>) -> SessionPersistence {
        SessionPersistence::new(storage, "session-1")
    }

    #[tokio::test]
    async fn update_is_a_shallow_merge() {
        let wizard = Wizard::in_memory();
        wizard
            .update_form_data(
                FormDataPatch::default()
                    .health_concern(Some("Headache".to_string()))
                    .gender(Some(Gender::Female)),
            )
            .await;

        let before = wizard.form_data().await;
        let patch = FormDataPatch::default().age_category(Some(AgeCategory::Adult));
        let mut expected = before.clone();
        patch.clone().apply_to(&mut expected);

        wizard.update_form_data(patch).await;
        let after = wizard.form_data().await;

        assert_eq!(after, expected);
        assert_eq!(after.health_concern.as_deref(), Some("Headache"));
        assert_eq!(after.gender, Some(Gender::Female));
        assert_eq!(after.age_category, Some(AgeCategory::Adult));
    }

    #[tokio::test]
    async fn reset_restores_defaults_and_removes_snapshot() {
        let storage = Arc::new(InMemorySnapshotStorage::new());
        let wizard = Wizard::initialize(persistence(storage.clone())).await;

        wizard
            .update_form_data(FormDataPatch::default().health_concern(Some("Acne".to_string())))
            .await;
        wizard.set_current_step(Step::Demographics).await;
        wizard.set_is_loading(true).await;
        wizard.set_is_fetching_causes(true).await;
        wizard.set_is_fetching_symptoms(true).await;
        wizard.set_is_fetching_properties(true).await;
        wizard.set_error(Some("boom".to_string())).await;
        wizard.update_form_validity(true).await;
        assert!(storage.contains("recipe-wizard-form-data:session-1"));

        for _ in 0..2 {
            wizard.reset_form_data().await;
            let state = wizard.state().await;
            assert_eq!(state.form_data, WizardFormData::default());
            assert_eq!(state.current_step, None);
            assert!(!state.any_loading());
            assert_eq!(state.error, None);
            assert!(!state.is_form_valid);
            assert!(storage.is_empty());
        }
    }

    #[tokio::test]
    async fn snapshot_survives_reload_without_loading_flag() {
        let storage = Arc::new(InMemorySnapshotStorage::new());
        let wizard = Wizard::initialize(persistence(storage.clone())).await;
        wizard.set_is_loading(true).await;
        wizard
            .update_form_data(
                FormDataPatch::default()
                    .health_concern(Some("Headache".to_string()))
                    .potential_causes_result(Some(vec![stress()]))
                    .selected_causes(Some(vec![stress()])),
            )
            .await;
        let original = wizard.form_data().await;
        assert!(original.is_loading);

        let reloaded = Wizard::initialize(persistence(storage)).await;
        let state = reloaded.state().await;
        assert!(!state.is_loading);
        assert!(!state.form_data.is_loading);
        assert_eq!(
            state.form_data,
            WizardFormData {
                is_loading: false,
                ..original
            }
        );
    }

    #[tokio::test]
    async fn changing_step_always_invalidates_form() {
        let wizard = Wizard::in_memory();
        for valid in [true, false] {
            wizard.update_form_validity(valid).await;
            wizard.set_current_step(Step::Causes).await;
            assert!(!wizard.state().await.is_form_valid);
        }
    }

    #[tokio::test]
    async fn persistence_failures_degrade_to_memory() {
        let wizard = Wizard::initialize(persistence(Arc::new(BrokenStorage))).await;
        assert!(wizard.state().await.persistence_degraded);

        let status = wizard
            .update_form_data(FormDataPatch::default().health_concern(Some("Cough".to_string())))
            .await;
        assert!(matches!(status, PersistStatus::InMemoryOnly(_)));
        assert_eq!(
            wizard.form_data().await.health_concern.as_deref(),
            Some("Cough")
        );

        wizard.reset_form_data().await;
        assert!(wizard.state().await.persistence_degraded);
    }

    #[tokio::test]
    async fn stale_results_are_discarded() {
        let wizard = Wizard::in_memory();
        let ticket = wizard.begin_request(LoadingFlag::Causes).await;
        assert!(wizard.state().await.is_fetching_causes);

        wizard.reset_form_data().await;
        let outcome = wizard
            .commit(
                ticket,
                FormDataPatch::default().potential_causes_result(Some(vec![stress()])),
                Some(Step::Causes),
            )
            .await;

        assert_eq!(outcome, Commit::Stale);
        let state = wizard.state().await;
        assert_eq!(state.form_data.potential_causes_result, None);
        assert_eq!(state.current_step, None);
        assert_eq!(
            wizard.reject(ticket, "late".to_string()).await,
            Commit::Stale
        );
        assert_eq!(wizard.state().await.error, None);
    }

    #[tokio::test]
    async fn newer_request_supersedes_older_one() {
        let wizard = Wizard::in_memory();
        wizard.set_current_step(Step::Symptoms).await;
        let first = wizard.begin_request(LoadingFlag::Properties).await;
        let second = wizard.begin_request(LoadingFlag::Properties).await;
        assert!(!wizard.is_current(&first).await);
        assert!(wizard.is_current(&second).await);

        assert_eq!(
            wizard
                .commit(first, FormDataPatch::default(), Some(Step::Properties))
                .await,
            Commit::Stale
        );
        assert!(wizard.state().await.is_fetching_properties);

        let applied = wizard
            .commit(second, FormDataPatch::default(), Some(Step::Properties))
            .await;
        assert_eq!(applied, Commit::Applied(PersistStatus::Persisted));
        let state = wizard.state().await;
        assert!(!state.is_fetching_properties);
        assert_eq!(state.current_step, Some(Step::Properties));
    }

    #[tokio::test]
    async fn step_changes_invalidate_in_flight_requests() {
        let wizard = Wizard::in_memory();
        wizard.set_current_step(Step::Causes).await;
        let ticket = wizard.begin_request(LoadingFlag::Symptoms).await;

        wizard.set_current_step(Step::Causes).await;
        assert!(wizard.is_current(&ticket).await);

        wizard.set_current_step(Step::Symptoms).await;
        assert!(!wizard.is_current(&ticket).await);

        let backward = wizard.begin_request(LoadingFlag::Properties).await;
        wizard.set_current_step(Step::Demographics).await;
        assert!(!wizard.is_current(&backward).await);
    }

    #[tokio::test]
    async fn superseded_request_lowers_its_own_flag() {
        let wizard = Wizard::in_memory();
        wizard.set_current_step(Step::Causes).await;
        let ticket = wizard.begin_request(LoadingFlag::Symptoms).await;
        wizard.set_current_step(Step::Symptoms).await;
        assert!(wizard.state().await.is_fetching_symptoms);

        let outcome = wizard
            .commit(ticket, FormDataPatch::default().selected_symptoms(None), None)
            .await;

        assert_eq!(outcome, Commit::Stale);
        let state = wizard.state().await;
        assert!(!state.is_fetching_symptoms);
        assert_eq!(state.current_step, Some(Step::Symptoms));
    }

    #[tokio::test]
    async fn rejection_records_error_without_writing() {
        let storage = Arc::new(InMemorySnapshotStorage::new());
        let wizard = Wizard::initialize(persistence(storage.clone())).await;
        let ticket = wizard.begin_request(LoadingFlag::Causes).await;

        assert_eq!(
            wizard.reject(ticket, "network down".to_string()).await,
            Commit::Rejected
        );
        let state = wizard.state().await;
        assert_eq!(state.error.as_deref(), Some("network down"));
        assert!(!state.is_fetching_causes);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn loading_flags_are_independent() {
        let wizard = Wizard::in_memory();
        wizard.set_is_fetching_causes(true).await;
        wizard.set_is_fetching_symptoms(true).await;
        wizard.set_is_loading(true).await;

        let state = wizard.state().await;
        assert!(state.is_fetching_causes && state.is_fetching_symptoms && state.is_loading);
        assert!(state.form_data.is_loading);
        assert!(!state.is_fetching_properties);

        wizard.set_error(Some("first".to_string())).await;
        wizard.set_error(Some("second".to_string())).await;
        assert_eq!(wizard.state().await.error.as_deref(), Some("second"));
    }
}
