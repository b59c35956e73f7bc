use std::time::Duration;

use crate::error::{Result, WizardError};

pub const DEFAULT_USER_LANGUAGE: &str = "PT_BR";

/// Connection settings for the workflow webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    pub endpoint: String,
    pub api_key: String,
    pub user_language: String,
    /// `None` waits for the webhook indefinitely.
    pub timeout: Option<Duration>,
}

impl WorkflowConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            user_language: DEFAULT_USER_LANGUAGE.to_string(),
            timeout: None,
        }
    }

    pub fn with_user_language(mut self, language: impl Into<String>) -> Self {
        self.user_language = language.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reads `RECIPE_WORKFLOW_URL`, `RECIPE_WORKFLOW_API_KEY`,
    /// `RECIPE_USER_LANGUAGE` and `RECIPE_WORKFLOW_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| WizardError::Configuration(format!("{name} not set")))
        };

        let mut config = Self::new(
            required("RECIPE_WORKFLOW_URL")?,
            required("RECIPE_WORKFLOW_API_KEY")?,
        );

        if let Some(language) = lookup("RECIPE_USER_LANGUAGE").filter(|v| !v.trim().is_empty()) {
            config.user_language = language;
        }

        if let Some(raw) = lookup("RECIPE_WORKFLOW_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                WizardError::Configuration(format!(
                    "RECIPE_WORKFLOW_TIMEOUT_SECS must be a number of seconds, got '{raw}'"
                ))
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}
