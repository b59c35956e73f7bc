pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod models;
pub mod progress;
pub mod screens;
pub mod sessions;
pub mod step;
pub mod storage;
#[cfg(feature = "postgres")]
pub mod storage_postgres;
pub mod wizard;

// Re-export commonly used types
pub use client::{ApiStep, StepResult, WorkflowApi, WorkflowRequest, parse_step_result};
#[cfg(feature = "http")]
pub use client::HttpWorkflowClient;
pub use config::WorkflowConfig;
pub use error::{Result, WizardError};
pub use models::{
    AgeCategory, Cause, FormDataPatch, Gender, MedicalPropertiesResult, Oil, PropertyOils,
    SelectedSymptom, Symptom, TherapeuticProperty, WizardFormData,
};
pub use progress::{Phase, ProgressAnimator, ProgressFrame};
pub use screens::{
    CausesScreen, DemographicsInput, DemographicsScreen, HealthConcernScreen, OilsScreen,
    PropertiesScreen, Readiness, StepOutcome, StepScreen, SymptomsScreen, WizardScreens,
};
pub use sessions::WizardSessions;
pub use step::Step;
pub use storage::{InMemorySnapshotStorage, SessionPersistence, SnapshotStorage};
#[cfg(feature = "postgres")]
pub use storage_postgres::PostgresSnapshotStorage;
pub use wizard::{Commit, LoadingFlag, PersistStatus, RequestTicket, Wizard, WizardState};
