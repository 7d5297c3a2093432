//! Composition of tool input variables
//!
//! The tool reads its inputs from `TF_VAR_<name>` environment variables.
//! Scalars are passed verbatim, booleans as `true`/`false`, and lists or
//! maps as JSON documents, which the tool parses as HCL literals.

use crate::error::{InfraError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Provider credentials scoped to one environment
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    pub region: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .finish()
    }
}

/// Context shared by every module invocation of one workflow run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonContext {
    pub organization_id: String,
    pub env_id: String,
    pub env_name: String,
    pub env_slug: String,
    /// Empty for environment-level runs
    pub project_id: String,
    pub project_name: String,
    /// Execution log id of the run
    pub run_id: String,
    pub vpc_id: String,
}

/// Builds the complete child environment for one tool invocation.
///
/// `params` must serialize to a struct; `None` fields are left unset so the
/// module default applies.
pub fn compose_env<P>(
    creds: &Credentials,
    common: &CommonContext,
    params: Option<&P>,
) -> Result<BTreeMap<String, String>>
where
    P: Serialize + ?Sized,
{
    let mut env = BTreeMap::new();
    env.insert("AWS_ACCESS_KEY_ID".to_string(), creds.access_key.clone());
    env.insert("AWS_SECRET_ACCESS_KEY".to_string(), creds.secret_key.clone());
    if let Some(token) = &creds.session_token {
        env.insert("AWS_SESSION_TOKEN".to_string(), token.clone());
    }
    env.insert("AWS_DEFAULT_REGION".to_string(), creds.region.clone());
    env.insert("TF_IN_AUTOMATION".to_string(), "1".to_string());

    push_variables(&mut env, serde_json::to_value(common)?)?;
    if let Some(params) = params {
        push_variables(&mut env, serde_json::to_value(params)?)?;
    }
    Ok(env)
}

fn push_variables(env: &mut BTreeMap<String, String>, value: Value) -> Result<()> {
    let Value::Object(fields) = value else {
        return Err(InfraError::InvalidConfig(format!(
            "tool variables must be a struct, got {}",
            value
        )));
    };
    for (name, field) in fields {
        if let Some(rendered) = render_value(&field)? {
            env.insert(format!("TF_VAR_{}", name), rendered);
        }
    }
    Ok(())
}

/// Renders one value in the tool's variable syntax
pub fn render_value(value: &Value) -> Result<Option<String>> {
    Ok(match value {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(serde_json::to_string(value)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        name: String,
        size: u32,
        apply_immediately: bool,
        groups: Vec<String>,
        ports: Vec<Port>,
        optional: Option<String>,
    }

    #[derive(Serialize)]
    struct Port {
        name: String,
        container_port: u16,
    }

    fn creds() -> Credentials {
        Credentials {
            access_key: "AKIA123".into(),
            secret_key: "secret".into(),
            session_token: None,
            region: "us-east-1".into(),
        }
    }

    #[test]
    fn test_compose_env_renders_fields() {
        let common = CommonContext {
            env_name: "prod".into(),
            run_id: "42".into(),
            ..Default::default()
        };
        let sample = Sample {
            name: "db".into(),
            size: 100,
            apply_immediately: true,
            groups: vec!["sg-1".into(), "sg-2".into()],
            ports: vec![Port {
                name: "web".into(),
                container_port: 8000,
            }],
            optional: None,
        };

        let env = compose_env(&creds(), &common, Some(&sample)).unwrap();

        assert_eq!(env["AWS_ACCESS_KEY_ID"], "AKIA123");
        assert_eq!(env["AWS_DEFAULT_REGION"], "us-east-1");
        assert!(!env.contains_key("AWS_SESSION_TOKEN"));
        assert_eq!(env["TF_VAR_env_name"], "prod");
        assert_eq!(env["TF_VAR_run_id"], "42");
        assert_eq!(env["TF_VAR_name"], "db");
        assert_eq!(env["TF_VAR_size"], "100");
        assert_eq!(env["TF_VAR_apply_immediately"], "true");
        assert_eq!(env["TF_VAR_groups"], r#"["sg-1","sg-2"]"#);
        assert_eq!(
            env["TF_VAR_ports"],
            r#"[{"container_port":8000,"name":"web"}]"#
        );
        assert!(!env.contains_key("TF_VAR_optional"));
    }

    #[test]
    fn test_session_token_is_passed_when_present() {
        let mut creds = creds();
        creds.session_token = Some("token".into());
        let env = compose_env::<()>(&creds, &CommonContext::default(), None).unwrap();
        assert_eq!(env["AWS_SESSION_TOKEN"], "token");
    }

    #[test]
    fn test_non_struct_params_are_rejected() {
        let result = compose_env(&creds(), &CommonContext::default(), Some(&vec![1, 2]));
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let rendered = format!("{:?}", creds());
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("<redacted>"));
    }
}
