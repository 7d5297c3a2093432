//! Hierarchical state keys
//!
//! Every module invocation persists its view of reality under exactly one
//! key in the remote backend. Keys are derived only from stable names and
//! slugs, so re-running a workflow always targets the same state.
//!
//! ```text
//! environment  {tenant}//{env}/{component}.tfstate
//! project      {tenant}/{project}/{env}/{component}.tfstate
//! service      {tenant}/{project}/{env}/services/{slug}/{component}.tfstate
//! resource     {tenant}/{project}/{env}/resources/{slug}/{component}.tfstate
//! ```
//!
//! Environment-scoped state is shared by all projects of the environment,
//! hence the empty project segment.

use crate::error::{InfraError, Result};

/// Granularity of a state key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateScope {
    Environment,
    Project,
    /// Namespaced by the owning service slug
    Service(String),
    /// Namespaced by the owning resource slug
    Resource(String),
}

/// Derives state keys for one tenant/environment (and optionally project)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateKeyBuilder {
    tenant_slug: String,
    environment_name: String,
    project_name: Option<String>,
}

impl StateKeyBuilder {
    pub fn new(tenant_slug: impl Into<String>, environment_name: impl Into<String>) -> Self {
        Self {
            tenant_slug: tenant_slug.into(),
            environment_name: environment_name.into(),
            project_name: None,
        }
    }

    pub fn with_project(mut self, project_name: impl Into<String>) -> Self {
        self.project_name = Some(project_name.into());
        self
    }

    pub fn key(&self, scope: &StateScope, component: &str) -> Result<String> {
        let tenant = segment("tenant slug", &self.tenant_slug)?;
        let env = segment("environment name", &self.environment_name)?;
        let component = segment("component", component)?;

        let key = match scope {
            StateScope::Environment => format!("{}//{}/{}.tfstate", tenant, env, component),
            StateScope::Project => {
                let project = self.required_project()?;
                format!("{}/{}/{}/{}.tfstate", tenant, project, env, component)
            }
            StateScope::Service(slug) => {
                let project = self.required_project()?;
                let slug = segment("service slug", slug)?;
                format!(
                    "{}/{}/{}/services/{}/{}.tfstate",
                    tenant, project, env, slug, component
                )
            }
            StateScope::Resource(slug) => {
                let project = match &self.project_name {
                    Some(name) => segment("project name", name)?,
                    None => "",
                };
                let slug = segment("resource slug", slug)?;
                format!(
                    "{}/{}/{}/resources/{}/{}.tfstate",
                    tenant, project, env, slug, component
                )
            }
        };

        tracing::debug!(%key, "Derived state key");
        Ok(key)
    }

    fn required_project(&self) -> Result<&str> {
        match &self.project_name {
            Some(name) => segment("project name", name),
            None => Err(InfraError::InvalidConfig(
                "project-scoped state requires a project name".into(),
            )),
        }
    }
}

/// Validates a single key segment.
///
/// Segments end up inside a double-quoted shell argument, so quoting and
/// expansion characters are rejected along with the separator.
fn segment<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let bad = value
        .chars()
        .find(|c| matches!(c, '/' | '"' | '$' | '`' | '\\') || c.is_control());
    if value.is_empty() || bad.is_some() {
        return Err(InfraError::InvalidConfig(format!(
            "invalid {} for state key: {:?}",
            what, value
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ResourceKind;
    use std::collections::HashSet;

    fn builder() -> StateKeyBuilder {
        StateKeyBuilder::new("a1b2c3", "prod").with_project("api")
    }

    #[test]
    fn test_key_formats() {
        let b = builder();
        assert_eq!(
            b.key(&StateScope::Environment, "network").unwrap(),
            "a1b2c3//prod/network.tfstate"
        );
        assert_eq!(
            b.key(&StateScope::Project, "alb").unwrap(),
            "a1b2c3/api/prod/alb.tfstate"
        );
        assert_eq!(
            b.key(&StateScope::Service("s1".into()), "ecr").unwrap(),
            "a1b2c3/api/prod/services/s1/ecr.tfstate"
        );
        assert_eq!(
            b.key(&StateScope::Resource("r1".into()), "postgres").unwrap(),
            "a1b2c3/api/prod/resources/r1/postgres.tfstate"
        );
    }

    #[test]
    fn test_keys_are_deterministic() {
        let first = builder().key(&StateScope::Project, "ecs").unwrap();
        let second = builder().key(&StateScope::Project, "ecs").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_keys_are_injective_across_components() {
        let scopes = [
            StateScope::Environment,
            StateScope::Project,
            StateScope::Service("s1".into()),
            StateScope::Resource("r1".into()),
        ];
        for scope in &scopes {
            let keys: HashSet<_> = ResourceKind::ALL
                .iter()
                .map(|kind| builder().key(scope, kind.component()).unwrap())
                .collect();
            assert_eq!(keys.len(), ResourceKind::ALL.len(), "scope {:?}", scope);
        }
    }

    #[test]
    fn test_sibling_services_never_share_state() {
        let b = builder();
        let web = b.key(&StateScope::Service("web1".into()), "acm").unwrap();
        let worker = b.key(&StateScope::Service("wrk2".into()), "acm").unwrap();
        assert_ne!(web, worker);
    }

    #[test]
    fn test_environment_scope_ignores_project() {
        let with_project = builder().key(&StateScope::Environment, "route53").unwrap();
        let without = StateKeyBuilder::new("a1b2c3", "prod")
            .key(&StateScope::Environment, "route53")
            .unwrap();
        assert_eq!(with_project, without);
    }

    #[test]
    fn test_resource_scope_without_project() {
        let key = StateKeyBuilder::new("a1b2c3", "prod")
            .key(&StateScope::Resource("r9".into()), "s3_bucket")
            .unwrap();
        assert_eq!(key, "a1b2c3//prod/resources/r9/s3_bucket.tfstate");
    }

    #[test]
    fn test_project_scope_requires_project() {
        let result = StateKeyBuilder::new("a1b2c3", "prod").key(&StateScope::Project, "alb");
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unsafe_segments() {
        for bad in ["", "a/b", "a\"b", "$HOME", "a`b`"] {
            let result = StateKeyBuilder::new("t", bad).key(&StateScope::Environment, "network");
            assert!(result.is_err(), "accepted {:?}", bad);
        }
    }
}
