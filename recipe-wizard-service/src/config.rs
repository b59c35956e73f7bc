use anyhow::{Context, Result};
use recipe_flow::WorkflowConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub log_format: LogFormat,
    /// PostgreSQL snapshots when set, in-memory otherwise.
    pub database_url: Option<String>,
    /// Live sessions untouched this long are evicted; snapshots stay.
    pub session_idle: Duration,
    pub workflow: WorkflowConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got '{raw}'"))?,
            None => 3000,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        let session_idle = match lookup("SESSION_IDLE_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .with_context(|| format!("SESSION_IDLE_SECS must be a number of seconds, got '{raw}'"))?,
            None => Duration::from_secs(30 * 60),
        };

        let workflow = WorkflowConfig::from_lookup(&lookup)
            .context("Workflow webhook is not configured")?;

        Ok(Self {
            port,
            log_format,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            session_idle,
            workflow,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_to_port_3000_and_json_logs() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("RECIPE_WORKFLOW_URL", "http://hooks.local/recipe"),
            ("RECIPE_WORKFLOW_API_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.database_url.is_none());
        assert_eq!(config.session_idle, Duration::from_secs(1800));
        assert_eq!(config.workflow.endpoint, "http://hooks.local/recipe");
    }

    #[test]
    fn missing_webhook_key_is_an_error() {
        let err = ServiceConfig::from_lookup(lookup(&[(
            "RECIPE_WORKFLOW_URL",
            "http://hooks.local/recipe",
        )]))
        .unwrap_err();

        assert!(format!("{err:#}").contains("RECIPE_WORKFLOW_API_KEY not set"));
    }

    #[test]
    fn reads_port_format_and_database() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("RECIPE_WORKFLOW_URL", "http://hooks.local/recipe"),
            ("RECIPE_WORKFLOW_API_KEY", "secret"),
            ("PORT", "8080"),
            ("LOG_FORMAT", "pretty"),
            ("DATABASE_URL", "postgres://localhost/recipes"),
            ("SESSION_IDLE_SECS", "120"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/recipes")
        );
        assert_eq!(config.session_idle, Duration::from_secs(120));
    }

    #[test]
    fn rejects_bad_port() {
        let err = ServiceConfig::from_lookup(lookup(&[
            ("RECIPE_WORKFLOW_URL", "http://hooks.local/recipe"),
            ("RECIPE_WORKFLOW_API_KEY", "secret"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn rejects_bad_idle_timeout() {
        let err = ServiceConfig::from_lookup(lookup(&[
            ("RECIPE_WORKFLOW_URL", "http://hooks.local/recipe"),
            ("RECIPE_WORKFLOW_API_KEY", "secret"),
            ("SESSION_IDLE_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SESSION_IDLE_SECS"));
    }
}
