//! Parsed `output -json` documents

use crate::error::{InfraError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single module output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputValue {
    #[serde(default)]
    pub sensitive: bool,
    #[serde(rename = "type", default)]
    pub value_type: Value,
    pub value: Value,
}

/// All outputs of one module state, keyed by output name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outputs(BTreeMap<String, OutputValue>);

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses captured tool output.
    ///
    /// The capture may carry warnings ahead of the JSON document, so parsing
    /// starts at the first `{` and stops after the first complete value.
    pub fn parse(component: &str, text: &str) -> Result<Self> {
        let start = text.find('{').ok_or_else(|| InfraError::Outputs {
            component: component.to_string(),
            reason: "no JSON document in tool output".into(),
        })?;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Outputs>();
        match stream.next() {
            Some(Ok(outputs)) => Ok(outputs),
            Some(Err(e)) => Err(InfraError::Outputs {
                component: component.to_string(),
                reason: e.to_string(),
            }),
            None => Err(InfraError::Outputs {
                component: component.to_string(),
                reason: "empty tool output".into(),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(
            key.into(),
            OutputValue {
                sensitive: false,
                value_type: Value::Null,
                value,
            },
        );
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).map(|o| &o.value)
    }

    /// String output, erroring when absent
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.value(key)
            .and_then(Value::as_str)
            .ok_or_else(|| InfraError::MissingOutput(key.to_string()))
    }

    /// List-of-strings output, erroring when absent
    pub fn require_strings(&self, key: &str) -> Result<Vec<String>> {
        let list = self
            .value(key)
            .and_then(Value::as_array)
            .ok_or_else(|| InfraError::MissingOutput(key.to_string()))?;
        list.iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| InfraError::MissingOutput(key.to_string()))
            })
            .collect()
    }

    /// First string in a list output containing `needle`
    pub fn find_in_list(&self, key: &str, needle: &str) -> Result<String> {
        self.require_strings(key)?
            .into_iter()
            .find(|entry| entry.contains(needle))
            .ok_or_else(|| InfraError::MissingOutput(format!("{} containing {:?}", key, needle)))
    }

    /// Flattens to `{name: value}`
    pub fn to_values(&self) -> BTreeMap<String, Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{
  "vpc_id": {"sensitive": false, "type": "string", "value": "vpc-123"},
  "repositories_urls": {
    "sensitive": false,
    "type": ["tuple", ["string", "string"]],
    "value": ["1.dkr.ecr/api/web", "1.dkr.ecr/api/worker"]
  }
}"#;

    #[test]
    fn test_parse_and_read() {
        let outputs = Outputs::parse("network", SAMPLE).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs.require_str("vpc_id").unwrap(), "vpc-123");
        assert_eq!(
            outputs
                .find_in_list("repositories_urls", "api/worker")
                .unwrap(),
            "1.dkr.ecr/api/worker"
        );
    }

    #[test]
    fn test_parse_skips_leading_noise() {
        let text = format!("Warning: something deprecated\n\n{}\n", SAMPLE);
        let outputs = Outputs::parse("network", &text).unwrap();
        assert_eq!(outputs.require_str("vpc_id").unwrap(), "vpc-123");
    }

    #[test]
    fn test_empty_state_parses_to_empty() {
        let outputs = Outputs::parse("network", "{}\n").unwrap();
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_missing_output_is_an_error() {
        let mut outputs = Outputs::new();
        outputs.insert("alb_name", json!("api-x"));
        assert!(matches!(
            outputs.require_str("cluster"),
            Err(InfraError::MissingOutput(_))
        ));
        assert!(Outputs::parse("alb", "Error: no state").is_err());
    }
}
