//! Checks run before any workflow is dispatched

use crate::error::{ControlPlaneError, Result};
use crate::model::{Provisioned, ResourceRequest, ResourceType, Service, ServiceRequest};
use uuid::Uuid;

pub const NAME_COLLISION: &str = "Service with this name/subdomain already exists.";
pub const PORT_COLLISION: &str = "Your other services for this project already took those ports.";

/// Parent must have reached `ready`
pub fn ensure_ready<E: Provisioned>(parent: &E, what: &'static str) -> Result<()> {
    if !parent.meta().is_live() || !parent.status().is_ready() {
        return Err(ControlPlaneError::NotReady { what });
    }
    Ok(())
}

/// Names end up in state keys, resource names and DNS labels
pub fn validate_name(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ControlPlaneError::Validation(format!("{} must not be empty", what)));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ControlPlaneError::Validation(format!(
            "{} may only contain letters, digits, '-' and '_': {:?}",
            what, value
        )));
    }
    Ok(())
}

pub fn validate_service_request(request: &ServiceRequest) -> Result<()> {
    validate_name("service name", &request.name)?;
    if request.has_web_interface {
        validate_name("subdomain", &request.subdomain)?;
        if request.alb_port_http == 0 || request.alb_port_https == 0 {
            return Err(ControlPlaneError::Validation(
                "web services need both load balancer ports".into(),
            ));
        }
    }
    if request.container_port == 0 {
        return Err(ControlPlaneError::Validation(
            "container port must be set".into(),
        ));
    }
    Ok(())
}

/// Rejects a request clashing with a live sibling.
///
/// Name and subdomain clashes are reported before port clashes. `exclude`
/// skips the service being replaced by an update.
pub fn check_service_collision(
    request: &ServiceRequest,
    siblings: &[Service],
    exclude: Option<Uuid>,
) -> Result<()> {
    let live = siblings
        .iter()
        .filter(|s| s.meta.is_live() && Some(s.meta.id) != exclude);

    let mut port_clash = false;
    for sibling in live {
        if sibling.name == request.name || sibling.subdomain == request.subdomain {
            return Err(ControlPlaneError::Collision(NAME_COLLISION.into()));
        }
        port_clash |= sibling.container_port == request.container_port
            || sibling.alb_port_http == request.alb_port_http
            || sibling.alb_port_https == request.alb_port_https;
    }

    if port_clash {
        return Err(ControlPlaneError::Collision(PORT_COLLISION.into()));
    }
    Ok(())
}

pub fn validate_resource_request(request: &ResourceRequest) -> Result<()> {
    validate_name("resource name", &request.name)?;
    let kind = request.engine.resource_type();
    if !request.preset.fits(kind) {
        return Err(ControlPlaneError::Validation(format!(
            "preset {:?} is not available for {}",
            request.preset, kind
        )));
    }
    if kind == ResourceType::Database {
        validate_name("database username", &request.username)?;
    }
    if request.service_id.is_some() && request.project_id.is_none() {
        return Err(ControlPlaneError::Validation(
            "a service-owned resource needs its project".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Engine, InfraStatus, Preset, Project};

    fn sibling(name: &str, subdomain: &str, port: u16) -> Service {
        Service::new(Uuid::nil(), ServiceRequest::web(name, subdomain, port))
    }

    #[test]
    fn test_ensure_ready() {
        let mut project = Project::new(Uuid::new_v4(), "api");
        assert!(matches!(
            ensure_ready(&project, "project"),
            Err(ControlPlaneError::NotReady { what: "project" })
        ));

        project.status.push(InfraStatus::Ready);
        assert!(ensure_ready(&project, "project").is_ok());

        project.status.push(InfraStatus::Error);
        assert!(ensure_ready(&project, "project").is_err());
    }

    #[test]
    fn test_name_or_subdomain_collision() {
        let siblings = vec![sibling("web", "app", 8000)];

        let same_subdomain = ServiceRequest::web("admin", "app", 9000).with_alb_ports(8080, 8443);
        let err = check_service_collision(&same_subdomain, &siblings, None).unwrap_err();
        assert_eq!(err.user_message(), NAME_COLLISION);

        let same_name = ServiceRequest::web("web", "www", 9000).with_alb_ports(8080, 8443);
        assert!(check_service_collision(&same_name, &siblings, None).is_err());
    }

    #[test]
    fn test_port_collision() {
        let siblings = vec![sibling("web", "app", 8000)];

        // default public ports 80/443 are already taken
        let request = ServiceRequest::web("admin", "admin", 9000);
        let err = check_service_collision(&request, &siblings, None).unwrap_err();
        assert_eq!(err.user_message(), PORT_COLLISION);

        let request = ServiceRequest::web("admin", "admin", 9000).with_alb_ports(8080, 8443);
        assert!(check_service_collision(&request, &siblings, None).is_ok());
    }

    #[test]
    fn test_deleted_and_excluded_siblings_are_ignored() {
        let mut deleted = sibling("web", "app", 8000);
        deleted.meta.soft_delete();
        let replaced = sibling("api", "api", 9000);
        let replaced_id = replaced.meta.id;
        let siblings = vec![deleted, replaced];

        let request = ServiceRequest::web("web", "app", 8000);
        assert!(check_service_collision(&request, &siblings, Some(replaced_id)).is_ok());
    }

    #[test]
    fn test_resource_request_validation() {
        let mut request = ResourceRequest {
            name: "main".into(),
            engine: Engine::Postgres,
            preset: Preset::Statics,
            project_id: None,
            service_id: None,
            username: "app".into(),
        };
        assert!(validate_resource_request(&request).is_err());

        request.preset = Preset::Dev;
        assert!(validate_resource_request(&request).is_ok());

        request.username.clear();
        assert!(validate_resource_request(&request).is_err());
    }

    #[test]
    fn test_service_request_validation() {
        assert!(validate_service_request(&ServiceRequest::web("web", "app", 8000)).is_ok());
        assert!(validate_service_request(&ServiceRequest::web("web/x", "app", 8000)).is_err());
        assert!(validate_service_request(&ServiceRequest::web("web", "app", 0)).is_err());
    }
}
