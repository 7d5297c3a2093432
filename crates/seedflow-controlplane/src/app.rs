//! Control plane assembly

use crate::commands::Commands;
use crate::dispatch::{JobHandler, QueueDispatcher};
use crate::repository::Repository;
use crate::workflows::Workflows;
use std::sync::Arc;

/// Commands wired to an in-process dispatcher running the workflows.
///
/// Must be started inside a tokio runtime.
pub struct ControlPlane {
    commands: Commands,
    dispatcher: Arc<QueueDispatcher>,
}

impl ControlPlane {
    pub fn start(workflows: Workflows) -> Self {
        let repo = workflows.repository().clone();
        let cipher = workflows.cipher().clone();
        let clouds = workflows.clouds();

        let handler: Arc<dyn JobHandler> = Arc::new(workflows);
        let dispatcher = Arc::new(QueueDispatcher::spawn(handler));
        let commands = Commands::new(repo, cipher, dispatcher.clone(), clouds);

        tracing::info!("Control plane started");
        Self {
            commands,
            dispatcher,
        }
    }

    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    pub fn repository(&self) -> &Repository {
        self.commands.repository()
    }

    /// Stops accepting jobs and waits for running workflows to record
    /// their outcome
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
        tracing::info!("Control plane stopped");
    }
}
