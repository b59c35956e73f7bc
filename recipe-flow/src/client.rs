use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::{
    envelope,
    error::{Result, WizardError},
    models::{
        AgeCategory, Cause, Gender, MedicalPropertiesResult, Oil, PropertyOils, SelectedSymptom,
        Symptom, TherapeuticProperty, WizardFormData,
    },
};

/// Step discriminator sent to the workflow webhook.
///
/// The same name is the key under which the webhook returns the step's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStep {
    PotentialCauses,
    PotentialSymptoms,
    TherapeuticProperties,
    SuggestedOils,
}

impl ApiStep {
    pub fn content_key(&self) -> &'static str {
        match self {
            ApiStep::PotentialCauses => "potential_causes",
            ApiStep::PotentialSymptoms => "potential_symptoms",
            ApiStep::TherapeuticProperties => "therapeutic_properties",
            ApiStep::SuggestedOils => "suggested_oils",
        }
    }
}

impl fmt::Display for ApiStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_key())
    }
}

/// Body of a webhook call.
///
/// Step specific fields accumulate: each later step also carries everything
/// the earlier steps sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowRequest {
    pub health_concern: Option<String>,
    pub gender: Option<Gender>,
    pub age_category: Option<AgeCategory>,
    pub age_specific: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_causes: Option<Vec<Cause>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_symptoms: Option<Vec<SelectedSymptom>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therapeutic_properties: Option<Vec<TherapeuticProperty>>,
    pub step: ApiStep,
    pub user_language: String,
}

impl WorkflowRequest {
    /// Build the payload for `step` from the accumulated form data. The form is
    /// sent as-is; callers validate before dispatching.
    pub fn for_step(step: ApiStep, form: &WizardFormData, user_language: &str) -> Self {
        let mut request = Self {
            health_concern: form.health_concern.clone(),
            gender: form.gender,
            age_category: form.age_category,
            age_specific: form.age_specific.clone(),
            selected_causes: None,
            selected_symptoms: None,
            therapeutic_properties: None,
            step,
            user_language: user_language.to_string(),
        };

        if step != ApiStep::PotentialCauses {
            request.selected_causes = Some(form.selected_causes.clone().unwrap_or_default());
        }
        if matches!(
            step,
            ApiStep::TherapeuticProperties | ApiStep::SuggestedOils
        ) {
            request.selected_symptoms = Some(form.selected_symptoms.clone().unwrap_or_default());
        }
        if step == ApiStep::SuggestedOils {
            request.therapeutic_properties = Some(
                form.selected_therapeutic_properties
                    .clone()
                    .unwrap_or_default(),
            );
        }
        request
    }

    /// Oil suggestions are requested one property at a time.
    pub fn for_property(
        form: &WizardFormData,
        property: &TherapeuticProperty,
        user_language: &str,
    ) -> Self {
        let mut request = Self::for_step(ApiStep::SuggestedOils, form, user_language);
        request.therapeutic_properties = Some(vec![property.clone()]);
        request
    }
}

/// Typed content of a successful webhook call.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    PotentialCauses(Vec<Cause>),
    PotentialSymptoms(Vec<Symptom>),
    TherapeuticProperties(MedicalPropertiesResult),
    SuggestedOils(PropertyOils),
}

impl StepResult {
    pub fn step(&self) -> ApiStep {
        match self {
            StepResult::PotentialCauses(_) => ApiStep::PotentialCauses,
            StepResult::PotentialSymptoms(_) => ApiStep::PotentialSymptoms,
            StepResult::TherapeuticProperties(_) => ApiStep::TherapeuticProperties,
            StepResult::SuggestedOils(_) => ApiStep::SuggestedOils,
        }
    }
}

fn typed<T: serde::de::DeserializeOwned>(step: ApiStep, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| WizardError::InvalidBody(format!("{step} content: {e}")))
}

/// Turn a raw webhook response body into the typed result for `request`.
pub fn parse_step_result(request: &WorkflowRequest, body: &str) -> Result<StepResult> {
    let step = request.step;
    match step {
        ApiStep::PotentialCauses => Ok(StepResult::PotentialCauses(typed(
            step,
            envelope::extract_content(body, step.content_key())?,
        )?)),
        ApiStep::PotentialSymptoms => Ok(StepResult::PotentialSymptoms(typed(
            step,
            envelope::extract_content(body, step.content_key())?,
        )?)),
        ApiStep::TherapeuticProperties => {
            let content = envelope::normalize(body)?;
            if content.get(step.content_key()).is_none() {
                return Err(WizardError::UnexpectedResponseFormat);
            }
            Ok(StepResult::TherapeuticProperties(typed(step, content)?))
        }
        ApiStep::SuggestedOils => {
            let oils = envelope::extract_content(body, step.content_key())?;
            if oils.is_object() {
                return Ok(StepResult::SuggestedOils(typed(step, oils)?));
            }

            let oils: Vec<Oil> = typed(step, oils)?;
            let property = request
                .therapeutic_properties
                .as_ref()
                .and_then(|props| props.first())
                .ok_or_else(|| {
                    WizardError::Validation("Missing required data: therapeutic property".into())
                })?;
            Ok(StepResult::SuggestedOils(PropertyOils {
                property_id: property.property_id.clone(),
                property_name: property.property_name.clone(),
                property_name_in_english: property.property_name_in_english.clone(),
                description: property.description.clone(),
                suggested_oils: oils,
            }))
        }
    }
}

/// The workflow webhook, one call per wizard transition.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    async fn call(&self, request: &WorkflowRequest) -> Result<StepResult>;

    /// Language tag sent as `user_language`.
    fn user_language(&self) -> &str {
        crate::config::DEFAULT_USER_LANGUAGE
    }
}

#[cfg(feature = "http")]
pub use http::HttpWorkflowClient;

#[cfg(feature = "http")]
mod http {
    use async_trait::async_trait;
    use tracing::{error, info};

    use super::{StepResult, WorkflowApi, WorkflowRequest, parse_step_result};
    use crate::{
        config::WorkflowConfig,
        error::{Result, WizardError},
    };

    /// reqwest-backed webhook client. No retries: a failed call is retried by
    /// the user submitting the step again.
    pub struct HttpWorkflowClient {
        client: reqwest::Client,
        config: WorkflowConfig,
    }

    impl HttpWorkflowClient {
        pub fn new(config: WorkflowConfig) -> Result<Self> {
            let mut builder = reqwest::Client::builder();
            if let Some(timeout) = config.timeout {
                builder = builder.timeout(timeout);
            }
            let client = builder
                .build()
                .map_err(|e| WizardError::Configuration(e.to_string()))?;
            Ok(Self { client, config })
        }
    }

    #[async_trait]
    impl WorkflowApi for HttpWorkflowClient {
        async fn call(&self, request: &WorkflowRequest) -> Result<StepResult> {
            info!(step = %request.step, endpoint = %self.config.endpoint, "Calling workflow webhook");

            let response = self
                .client
                .post(&self.config.endpoint)
                .bearer_auth(&self.config.api_key)
                .json(request)
                .send()
                .await
                .map_err(|e| {
                    error!(step = %request.step, error = %e, "Workflow request failed");
                    WizardError::Network(format!("Failed to reach workflow service: {e}"))
                })?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| WizardError::Network(format!("Failed to read workflow response: {e}")))?;

            if !status.is_success() {
                error!(step = %request.step, status = status.as_u16(), "Workflow returned an error status");
                return Err(WizardError::HttpStatus {
                    status: status.as_u16(),
                    body,
                });
            }

            let result = parse_step_result(request, &body)?;
            info!(step = %request.step, "Workflow response parsed");
            Ok(result)
        }

        fn user_language(&self) -> &str {
            &self.config.user_language
        }
    }
}
