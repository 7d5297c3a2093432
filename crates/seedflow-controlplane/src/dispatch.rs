//! Job dispatch
//!
//! A job is `(workflow, entity_id, execution_log_id)`. Dispatch is
//! fire-and-forget: the caller learns the outcome only through the
//! execution log.

use crate::error::{ControlPlaneError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    CreateEnvironment,
    RemoveEnvironment,
    CreateProject,
    RemoveProject,
    CreateService,
    RemoveService,
    UpdateService,
    CreateResource,
    RemoveResource,
    LaunchBuildWorker,
    RemoveBuildWorker,
    DeployVersion,
}

impl Workflow {
    pub const ALL: [Workflow; 12] = [
        Workflow::CreateEnvironment,
        Workflow::RemoveEnvironment,
        Workflow::CreateProject,
        Workflow::RemoveProject,
        Workflow::CreateService,
        Workflow::RemoveService,
        Workflow::UpdateService,
        Workflow::CreateResource,
        Workflow::RemoveResource,
        Workflow::LaunchBuildWorker,
        Workflow::RemoveBuildWorker,
        Workflow::DeployVersion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Workflow::CreateEnvironment => "create_environment",
            Workflow::RemoveEnvironment => "remove_environment",
            Workflow::CreateProject => "create_project",
            Workflow::RemoveProject => "remove_project",
            Workflow::CreateService => "create_service",
            Workflow::RemoveService => "remove_service",
            Workflow::UpdateService => "update_service",
            Workflow::CreateResource => "create_resource",
            Workflow::RemoveResource => "remove_resource",
            Workflow::LaunchBuildWorker => "launch_build_worker",
            Workflow::RemoveBuildWorker => "remove_build_worker",
            Workflow::DeployVersion => "deploy_version",
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Workflow {
    type Err = ControlPlaneError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.replace('-', "_");
        Workflow::ALL
            .into_iter()
            .find(|w| w.name() == wanted)
            .ok_or_else(|| ControlPlaneError::Validation(format!("unknown workflow: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub workflow: Workflow,
    pub entity_id: Uuid,
    pub log_id: Uuid,
}

impl Job {
    pub fn new(workflow: Workflow, entity_id: Uuid, log_id: Uuid) -> Self {
        Self {
            workflow,
            entity_id,
            log_id,
        }
    }
}

/// Hands jobs to whatever executes them
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: Job) -> Result<()>;
}

/// Executes one job to completion, recording the outcome itself
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: Job);
}

/// In-process queue feeding a worker task.
///
/// Each job runs on its own task, so jobs for different entities proceed
/// concurrently. [`shutdown`](QueueDispatcher::shutdown) closes the queue
/// and waits for every accepted job to finish.
pub struct QueueDispatcher {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueueDispatcher {
    pub fn spawn(handler: Arc<dyn JobHandler>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(Self::work(handler, receiver));
        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    async fn work(handler: Arc<dyn JobHandler>, mut receiver: mpsc::UnboundedReceiver<Job>) {
        let mut running = JoinSet::new();
        loop {
            tokio::select! {
                next = receiver.recv() => match next {
                    Some(job) => {
                        tracing::debug!(workflow = %job.workflow, entity_id = %job.entity_id, log_id = %job.log_id, "Job accepted");
                        let handler = handler.clone();
                        running.spawn(async move { handler.handle(job).await });
                    }
                    None => break,
                },
                Some(done) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = done {
                        tracing::error!("Job task failed: {}", e);
                    }
                }
            }
        }

        while let Some(done) = running.join_next().await {
            if let Err(e) = done {
                tracing::error!("Job task failed: {}", e);
            }
        }
        tracing::debug!("Dispatcher drained");
    }

    /// Stops accepting jobs and waits for running ones
    pub async fn shutdown(&self) {
        self.sender.lock().await.take();
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                tracing::error!("Dispatcher worker failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl JobDispatcher for QueueDispatcher {
    async fn dispatch(&self, job: Job) -> Result<()> {
        let sender = self.sender.lock().await;
        let sender = sender.as_ref().ok_or(ControlPlaneError::DispatcherClosed)?;
        sender
            .send(job)
            .map_err(|_| ControlPlaneError::DispatcherClosed)?;
        tracing::info!(workflow = %job.workflow, entity_id = %job.entity_id, log_id = %job.log_id, "Dispatched job");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        jobs: StdMutex<Vec<Job>>,
    }

    #[async_trait]
    impl JobHandler for Recorder {
        async fn handle(&self, job: Job) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.jobs.lock().unwrap().push(job);
        }
    }

    #[test]
    fn test_workflow_names_roundtrip() {
        for workflow in Workflow::ALL {
            assert_eq!(workflow.name().parse::<Workflow>().unwrap(), workflow);
        }
        assert_eq!(
            "create-service".parse::<Workflow>().unwrap(),
            Workflow::CreateService
        );
        assert!("reboot".parse::<Workflow>().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_accepted_jobs() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = QueueDispatcher::spawn(recorder.clone());

        for _ in 0..3 {
            dispatcher
                .dispatch(Job::new(
                    Workflow::CreateEnvironment,
                    Uuid::new_v4(),
                    Uuid::new_v4(),
                ))
                .await
                .unwrap();
        }
        dispatcher.shutdown().await;

        assert_eq!(recorder.jobs.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_fails() {
        let dispatcher = QueueDispatcher::spawn(Arc::new(Recorder::default()));
        dispatcher.shutdown().await;

        let err = dispatcher
            .dispatch(Job::new(Workflow::DeployVersion, Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlPlaneError::DispatcherClosed));
    }
}
