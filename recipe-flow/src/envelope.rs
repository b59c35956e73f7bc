//! Normalization of the workflow webhook's response envelope.
//!
//! The webhook wraps a step's result either as `[{"message": {"content": ...}}]`
//! or as `{"content": ...}` depending on endpoint version. Both shapes are
//! modelled as one untagged enum; the array form is listed first so it is
//! tried first. Only the first array element is read, so trailing elements may
//! have any shape. The bare form is kept as a raw object so that arrays can
//! never match it.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, WizardError};

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub content: Value,
}

#[derive(Debug, Deserialize)]
pub struct WrappedMessage {
    pub message: MessageBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Wrapped(Vec<Value>),
    Bare(Map<String, Value>),
}

impl Envelope {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|_| WizardError::UnexpectedResponseFormat)
    }

    /// The `content` payload, whichever shape carried it.
    pub fn into_content(self) -> Result<Value> {
        let content = match self {
            Envelope::Wrapped(messages) => {
                let first = messages
                    .into_iter()
                    .next()
                    .ok_or(WizardError::UnexpectedResponseFormat)?;
                serde_json::from_value::<WrappedMessage>(first)
                    .map_err(|_| WizardError::UnexpectedResponseFormat)?
                    .message
                    .content
            }
            Envelope::Bare(mut object) => object
                .remove("content")
                .ok_or(WizardError::UnexpectedResponseFormat)?,
        };

        match content {
            // Models sometimes answer with the JSON document as a string.
            Value::String(raw) => serde_json::from_str(strip_code_fence(&raw))
                .map_err(|_| WizardError::UnexpectedResponseFormat),
            other => Ok(other),
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Parse a raw response body and return the envelope's content.
pub fn normalize(body: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| WizardError::InvalidBody(e.to_string()))?;
    Envelope::from_value(value)?.into_content()
}

/// Like [`normalize`], but returns only the value stored under `key`.
pub fn extract_content(body: &str, key: &str) -> Result<Value> {
    let mut content = normalize(body)?;
    content
        .get_mut(key)
        .map(Value::take)
        .ok_or(WizardError::UnexpectedResponseFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn causes() -> Value {
        json!([{
            "cause_name": "Stress",
            "cause_suggestion": "Rest",
            "explanation": "Tension"
        }])
    }

    #[test]
    fn array_envelope_yields_content() {
        let body = json!([{ "message": { "content": { "potential_causes": causes() } } }]);
        let content = extract_content(&body.to_string(), "potential_causes").unwrap();
        assert_eq!(content, causes());
    }

    #[test]
    fn bare_envelope_yields_content() {
        let body = json!({ "content": { "potential_causes": causes() } });
        let content = extract_content(&body.to_string(), "potential_causes").unwrap();
        assert_eq!(content, causes());
    }

    #[test]
    fn only_the_first_message_is_read() {
        let body = json!([
            { "message": { "content": { "potential_causes": causes() } } },
            { "usage": { "tokens": 512 } },
            "trailing note"
        ]);
        let content = extract_content(&body.to_string(), "potential_causes").unwrap();
        assert_eq!(content, causes());
    }

    #[test]
    fn string_content_is_parsed() {
        let inner = json!({ "potential_causes": causes() }).to_string();
        let body = json!({ "content": format!("```json\n{inner}\n```") });
        let content = extract_content(&body.to_string(), "potential_causes").unwrap();
        assert_eq!(content, causes());
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        for body in [
            json!({ "result": { "potential_causes": causes() } }),
            json!([]),
            json!([{ "content": {} }]),
            json!("just text"),
            json!({ "content": { "something_else": [] } }),
        ] {
            let err = extract_content(&body.to_string(), "potential_causes").unwrap_err();
            assert!(matches!(err, WizardError::UnexpectedResponseFormat), "{body}");
            assert_eq!(err.to_string(), "unexpected response format");
        }
    }

    #[test]
    fn invalid_json_is_a_body_error() {
        let err = extract_content("<html>502</html>", "potential_causes").unwrap_err();
        assert!(matches!(err, WizardError::InvalidBody(_)));
    }
}
