//! Databases, caches and buckets

use super::Workflows;
use crate::crypto::random_hex;
use crate::dispatch::Job;
use crate::error::{ControlPlaneError, Result};
use crate::model::{
    BucketConf, Environment, EnvironmentConf, Project, Resource, ResourceConf, ResourceType,
};
use crate::validation::ensure_ready;
use seedflow_infra::executors::bucket::{self, BucketConfigs};
use seedflow_infra::executors::cache::{self, CacheConfigs};
use seedflow_infra::executors::database::{self, DbConfigs};
use seedflow_infra::executors::ecs;
use seedflow_infra::{Outputs, Provisioner};

const CLUSTER_SECURITY_GROUP_OUTPUT: &str = "security_group_id";

/// Random bytes behind generated passwords (hex doubles the length)
const DB_PASSWORD_BYTES: usize = 20;
const CACHE_PASSWORD_BYTES: usize = 15;

async fn lineage(wf: &Workflows, resource: &Resource) -> Result<(Environment, Option<Project>)> {
    let env = wf.repo.get::<Environment>(resource.environment_id).await?;
    let project = match resource.project_id {
        Some(id) => Some(wf.repo.get::<Project>(id).await?),
        None => None,
    };
    Ok((env, project))
}

/// The project cluster's security group, when the resource belongs to a
/// project
async fn allowed_security_groups(p: &Provisioner, project: Option<&Project>) -> Result<Vec<String>> {
    if project.is_none() {
        return Ok(Vec::new());
    }
    let cluster = ecs::ecs_details(p).await?;
    Ok(vec![cluster.require_str(CLUSTER_SECURITY_GROUP_OUTPUT)?.to_string()])
}

fn db_configs(resource: &Resource, conf: &ResourceConf) -> DbConfigs {
    let mut configs = DbConfigs::new(
        &resource.identifier,
        &resource.name,
        &conf.username,
        &conf.password,
    );
    configs.instance_type = conf.instance_type.clone();
    configs.allocated_storage = conf.allocated_storage;
    configs.engine = conf.engine.clone();
    configs.engine_version = conf.engine_version.clone();
    configs.port = conf.port;
    configs
}

fn cache_configs(resource: &Resource, conf: &ResourceConf) -> CacheConfigs {
    let mut configs =
        CacheConfigs::new(&resource.identifier, &resource.name).with_instance_type(&conf.instance_type);
    configs.number_of_nodes = conf.number_of_nodes;
    configs.engine = conf.engine.clone();
    configs.engine_version = conf.engine_version.clone();
    configs.port = conf.port;
    configs
}

/// Fills preset, engine and password fields a fresh conf lacks. Values
/// from an earlier run are kept so re-runs converge on the same instance.
fn complete_conf(resource: &Resource, mut conf: ResourceConf) -> Result<ResourceConf> {
    let unavailable = || {
        ControlPlaneError::Validation(format!(
            "preset {:?} is not available for {}",
            resource.preset, resource.kind
        ))
    };
    if conf.instance_type.is_empty() {
        match resource.kind {
            ResourceType::Database => {
                let preset = resource.preset.database().ok_or_else(unavailable)?;
                conf.instance_type = preset.instance_type.into();
                conf.allocated_storage = preset.allocated_storage;
            }
            ResourceType::Cache => {
                let preset = resource.preset.cache().ok_or_else(unavailable)?;
                conf.instance_type = preset.instance_type.into();
                conf.number_of_nodes = preset.number_of_nodes;
            }
            ResourceType::Bucket => return Err(unavailable()),
        }
    }
    if conf.password.is_empty() {
        conf.password = random_hex(match resource.kind {
            ResourceType::Cache => CACHE_PASSWORD_BYTES,
            _ => DB_PASSWORD_BYTES,
        });
    }
    conf.engine = resource.engine.to_string();
    conf.engine_version = resource.engine.version().into();
    conf.port = resource.engine.port();
    Ok(conf)
}

fn bucket_conf(outputs: &Outputs) -> Result<BucketConf> {
    let field = |key: &str| -> Result<String> { Ok(outputs.require_str(key)?.to_string()) };
    Ok(BucketConf {
        bucket: field("bucket")?,
        arn: field("arn")?,
        bucket_domain_name: field("bucket_domain_name")?,
        bucket_regional_domain_name: field("bucket_regional_domain_name")?,
        r53_zone_id: field("r53_zone_id")?,
        region: field("region")?,
    })
}

pub(crate) async fn create(wf: &Workflows, job: &Job) -> Result<()> {
    let mut resource = wf.repo.get::<Resource>(job.entity_id).await?;
    let (env, project) = lineage(wf, &resource).await?;
    ensure_ready(&env, "environment")?;
    if let Some(project) = &project {
        ensure_ready(project, "project")?;
    }

    let env_conf: EnvironmentConf = wf.open(&env.conf)?;
    let p = wf.provisioner(&env, &env_conf, project.as_ref(), job.log_id).await?;
    let slug = resource.meta.slug.clone();

    resource.conf = match resource.kind {
        ResourceType::Database => {
            let mut conf = complete_conf(&resource, wf.open(&resource.conf)?)?;
            let mut configs = db_configs(&resource, &conf);
            configs.allowed_security_groups_ids =
                allowed_security_groups(&p, project.as_ref()).await?;
            let outputs = database::create_database(&p, &slug, &configs).await?;
            conf.address = database::endpoint_address(&outputs)?;
            wf.seal(&conf)?
        }
        ResourceType::Cache => {
            let mut conf = complete_conf(&resource, wf.open(&resource.conf)?)?;
            let mut configs = cache_configs(&resource, &conf);
            configs.allowed_security_groups_ids =
                allowed_security_groups(&p, project.as_ref()).await?;
            let outputs = cache::create_cache(&p, &slug, &configs).await?;
            conf.address = cache::primary_node_address(&outputs)?;
            wf.seal(&conf)?
        }
        ResourceType::Bucket => {
            let outputs = bucket::create_bucket(&p, &slug, &BucketConfigs::statics(&resource.identifier)).await?;
            wf.seal(&bucket_conf(&outputs)?)?
        }
    };

    tracing::info!(identifier = %resource.identifier, kind = %resource.kind, "Resource provisioned");
    wf.mark_ready(&mut resource).await
}

pub(crate) async fn remove(wf: &Workflows, job: &Job) -> Result<()> {
    let resource = wf.repo.get::<Resource>(job.entity_id).await?;
    let (env, project) = lineage(wf, &resource).await?;
    let env_conf: EnvironmentConf = wf.open(&env.conf)?;
    let p = wf.provisioner(&env, &env_conf, project.as_ref(), job.log_id).await?;
    let slug = &resource.meta.slug;

    match resource.kind {
        ResourceType::Database => {
            let conf: ResourceConf = wf.open(&resource.conf)?;
            database::destroy_database(&p, slug, &db_configs(&resource, &conf)).await?;
        }
        ResourceType::Cache => {
            let conf: ResourceConf = wf.open(&resource.conf)?;
            cache::destroy_cache(&p, slug, &cache_configs(&resource, &conf)).await?;
        }
        ResourceType::Bucket => {
            bucket::destroy_bucket(&p, slug, &BucketConfigs::statics(&resource.identifier)).await?;
        }
    }

    wf.repo.soft_delete::<Resource>(resource.meta.id).await?;
    tracing::info!(identifier = %resource.identifier, "Resource removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Engine, Preset, ResourceRequest};
    use uuid::Uuid;

    fn resource(engine: Engine, preset: Preset) -> Resource {
        Resource::new(
            Uuid::new_v4(),
            "prod",
            &ResourceRequest {
                name: "main".into(),
                engine,
                preset,
                project_id: None,
                service_id: None,
                username: "app".into(),
            },
        )
    }

    #[test]
    fn test_complete_conf_for_database() {
        let db = resource(Engine::Postgres, Preset::Prod);
        let conf = complete_conf(&db, ResourceConf::default()).unwrap();
        assert_eq!(conf.instance_type, "db.t2.large");
        assert_eq!(conf.allocated_storage, 100);
        assert_eq!(conf.password.len(), 40);
        assert_eq!(conf.port, 5432);
        assert_eq!(conf.engine_version, "11.5");
    }

    #[test]
    fn test_complete_conf_keeps_earlier_password() {
        let cache = resource(Engine::Redis, Preset::Dev);
        let first = complete_conf(&cache, ResourceConf::default()).unwrap();
        assert_eq!(first.password.len(), 30);
        assert_eq!(first.number_of_nodes, 1);

        let again = complete_conf(&cache, first.clone()).unwrap();
        assert_eq!(again.password, first.password);
    }

    #[test]
    fn test_cache_configs_follow_instance_type() {
        let cache = resource(Engine::Redis, Preset::Prod);
        let conf = complete_conf(&cache, ResourceConf::default()).unwrap();
        let configs = cache_configs(&cache, &conf);
        assert_eq!(configs.instance_type, "cache.m5.large");
        assert_eq!(configs.number_of_nodes, 2);
        assert_eq!(configs.snapshot_retention_limit_days, 1);
    }
}
