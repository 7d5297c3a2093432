//! Declarative tool lifecycle driver
//!
//! One [`LifecycleExecutor`] drives one module against one state key:
//!
//! - apply: `init` → `plan` → (`apply` only if the plan has changes) → `output`
//! - destroy: `init` → `destroy`
//! - outputs: `init` → `output`
//!
//! Every step of an invocation appends to the same log file,
//! `{exec_logs_dir}/{component}_{action}_{run_id}.log`.

use crate::action::{Action, PlanOutcome, ResourceKind};
use crate::compose::{CommonContext, Credentials, compose_env};
use crate::error::{InfraError, Result};
use crate::outputs::Outputs;
use crate::runner::{CommandOutput, CommandRunner, ShellCommand};
use crate::state_key::{StateKeyBuilder, StateScope};
use rand::RngCore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// Placeholder for modules that take no inputs beyond the common context
pub const NO_PARAMS: Option<&()> = None;

/// Filesystem layout and binary used for tool invocations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub tool_binary: String,
    /// Root holding one directory per module (`network/`, `alb/`, ...)
    pub modules_dir: PathBuf,
    pub exec_logs_dir: PathBuf,
    pub plans_dir: PathBuf,
    /// Generated SSH keys (`{name}.pem`, `{name}_fingerprint.txt`)
    pub keys_dir: PathBuf,
    pub plugin_dir: Option<PathBuf>,
}

impl ExecutorSettings {
    /// Layout with every directory under `root`
    pub fn rooted(root: &Path) -> Self {
        Self {
            tool_binary: "terraform".into(),
            modules_dir: root.join("modules"),
            exec_logs_dir: root.join("logs"),
            plans_dir: root.join("plans"),
            keys_dir: root.join("ssh_keys"),
            plugin_dir: None,
        }
    }
}

/// Per-invocation executor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub kind: ResourceKind,
    pub action: Action,
    pub state_key: String,
    pub variables_file: Option<PathBuf>,
}

/// Runs the tool lifecycle for one module and one state key
pub struct LifecycleExecutor {
    runner: Arc<dyn CommandRunner>,
    settings: Arc<ExecutorSettings>,
    config: ExecutorConfig,
    env: BTreeMap<String, String>,
    run_id: String,
}

impl LifecycleExecutor {
    pub fn new<P>(
        runner: Arc<dyn CommandRunner>,
        settings: Arc<ExecutorSettings>,
        creds: &Credentials,
        common: &CommonContext,
        params: Option<&P>,
        config: ExecutorConfig,
    ) -> Result<Self>
    where
        P: Serialize + ?Sized,
    {
        let env = compose_env(creds, common, params)?;
        let run_id = if common.run_id.is_empty() {
            "adhoc".to_string()
        } else {
            common.run_id.clone()
        };
        Ok(Self {
            runner,
            settings,
            config,
            env,
            run_id,
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn component(&self) -> &'static str {
        self.config.kind.component()
    }

    fn working_dir(&self) -> PathBuf {
        self.settings.modules_dir.join(self.component())
    }

    pub fn log_file(&self) -> PathBuf {
        self.settings.exec_logs_dir.join(format!(
            "{}_{}_{}.log",
            self.component(),
            self.config.action,
            self.run_id
        ))
    }

    fn plan_file(&self) -> PathBuf {
        let mut suffix = [0u8; 2];
        rand::thread_rng().fill_bytes(&mut suffix);
        self.settings.plans_dir.join(format!(
            "{}_{}_{:02x}{:02x}.tfplan",
            self.component(),
            self.run_id,
            suffix[0],
            suffix[1]
        ))
    }

    fn var_file_arg(&self) -> String {
        match &self.config.variables_file {
            Some(file) => format!(" -var-file={}", file.display()),
            None => String::new(),
        }
    }

    async fn run(&self, line: String) -> Result<CommandOutput> {
        let command = ShellCommand {
            label: self.component().to_string(),
            line,
            working_dir: self.working_dir(),
            env: self.env.clone(),
            log_file: self.log_file(),
        };
        self.runner.run(&command).await
    }

    /// Points the module at its state key. Failure is fatal for the call.
    pub async fn init(&self) -> Result<()> {
        let mut line = format!(
            "{} init -backend-config=\"key={}\" -reconfigure -no-color",
            self.settings.tool_binary, self.config.state_key
        );
        if let Some(dir) = &self.settings.plugin_dir {
            line.push_str(&format!(" -plugin-dir={}", dir.display()));
        }
        tracing::info!(component = self.component(), state_key = %self.config.state_key, "Initializing");

        let out = self.run(line).await?;
        if !out.success() {
            tracing::error!(
                component = self.component(),
                exit_code = out.exit_code,
                "Init failed"
            );
            return Err(InfraError::ToolInit {
                component: self.component().to_string(),
                code: out.exit_code,
            });
        }
        Ok(())
    }

    pub async fn plan(&self, plan_file: &Path) -> Result<PlanOutcome> {
        if let Some(dir) = plan_file.parent() {
            fs::create_dir_all(dir).await?;
        }
        let line = format!(
            "{} plan -detailed-exitcode -no-color -out={}{}",
            self.settings.tool_binary,
            plan_file.display(),
            self.var_file_arg()
        );
        tracing::info!(component = self.component(), "Planning");

        let out = self.run(line).await?;
        match PlanOutcome::from_exit_code(out.exit_code) {
            Some(outcome) => {
                tracing::info!(component = self.component(), ?outcome, "Plan finished");
                Ok(outcome)
            }
            None => {
                tracing::error!(
                    component = self.component(),
                    exit_code = out.exit_code,
                    "Plan failed, nothing applied"
                );
                Err(InfraError::Plan {
                    component: self.component().to_string(),
                    code: out.exit_code,
                })
            }
        }
    }

    pub async fn apply_plan(&self, plan_file: &Path) -> Result<()> {
        let line = format!(
            "{} apply -auto-approve -no-color {}",
            self.settings.tool_binary,
            plan_file.display()
        );
        tracing::info!(component = self.component(), "Applying");

        let out = self.run(line).await?;
        if !out.success() {
            tracing::error!(
                component = self.component(),
                exit_code = out.exit_code,
                "Apply failed, state may be partially applied"
            );
            return Err(InfraError::Apply {
                component: self.component().to_string(),
                code: out.exit_code,
            });
        }
        Ok(())
    }

    /// Reads outputs from an initialized working directory
    pub async fn tool_outputs(&self) -> Result<Outputs> {
        let line = format!("{} output -json -no-color", self.settings.tool_binary);
        let out = self.run(line).await?;
        if !out.success() {
            return Err(InfraError::Outputs {
                component: self.component().to_string(),
                reason: format!("exit code {}", out.exit_code),
            });
        }
        Outputs::parse(self.component(), &out.output)
    }

    /// init → plan → apply-if-changed → outputs
    pub async fn apply(&self) -> Result<Outputs> {
        self.init().await?;

        let plan_file = self.plan_file();
        let applied = match self.plan(&plan_file).await {
            Ok(PlanOutcome::NoChanges) => {
                tracing::info!(component = self.component(), "No changes, skipping apply");
                Ok(())
            }
            Ok(PlanOutcome::ChangesPending) => self.apply_plan(&plan_file).await,
            Err(e) => Err(e),
        };
        remove_plan_file(&plan_file).await;
        applied?;

        self.tool_outputs().await
    }

    /// init → destroy
    pub async fn destroy(&self) -> Result<()> {
        self.init().await?;

        let line = format!(
            "{} destroy -auto-approve -no-color{}",
            self.settings.tool_binary,
            self.var_file_arg()
        );
        tracing::info!(component = self.component(), "Destroying");

        let out = self.run(line).await?;
        if !out.success() {
            tracing::error!(
                component = self.component(),
                exit_code = out.exit_code,
                "Destroy failed"
            );
            return Err(InfraError::Destroy {
                component: self.component().to_string(),
                code: out.exit_code,
            });
        }
        Ok(())
    }

    /// init → outputs. Unreadable outputs come back empty.
    pub async fn read_outputs(&self) -> Result<Outputs> {
        self.init().await?;
        match self.tool_outputs().await {
            Ok(outputs) => Ok(outputs),
            Err(e) => {
                tracing::warn!(component = self.component(), "Could not read outputs: {}", e);
                Ok(Outputs::new())
            }
        }
    }
}

async fn remove_plan_file(plan_file: &Path) {
    match fs::remove_file(plan_file).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!("Could not remove plan file {}: {}", plan_file.display(), e),
    }
}

/// Everything a resource executor needs to run modules for one workflow
#[derive(Clone)]
pub struct Provisioner {
    runner: Arc<dyn CommandRunner>,
    settings: Arc<ExecutorSettings>,
    creds: Credentials,
    common: CommonContext,
    keys: StateKeyBuilder,
}

impl Provisioner {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        settings: Arc<ExecutorSettings>,
        creds: Credentials,
        common: CommonContext,
        keys: StateKeyBuilder,
    ) -> Self {
        Self {
            runner,
            settings,
            creds,
            common,
            keys,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub fn credentials(&self) -> &Credentials {
        &self.creds
    }

    pub fn common(&self) -> &CommonContext {
        &self.common
    }

    pub fn executor<P>(
        &self,
        kind: ResourceKind,
        action: Action,
        scope: &StateScope,
        params: Option<&P>,
    ) -> Result<LifecycleExecutor>
    where
        P: Serialize + ?Sized,
    {
        let state_key = self.keys.key(scope, kind.component())?;
        LifecycleExecutor::new(
            self.runner.clone(),
            self.settings.clone(),
            &self.creds,
            &self.common,
            params,
            ExecutorConfig {
                kind,
                action,
                state_key,
                variables_file: None,
            },
        )
    }

    pub async fn apply<P>(
        &self,
        kind: ResourceKind,
        scope: &StateScope,
        params: Option<&P>,
    ) -> Result<Outputs>
    where
        P: Serialize + ?Sized,
    {
        self.executor(kind, Action::Create, scope, params)?
            .apply()
            .await
    }

    pub async fn destroy<P>(
        &self,
        kind: ResourceKind,
        scope: &StateScope,
        params: Option<&P>,
    ) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        self.executor(kind, Action::Destroy, scope, params)?
            .destroy()
            .await
    }

    pub async fn outputs(&self, kind: ResourceKind, scope: &StateScope) -> Result<Outputs> {
        self.executor(kind, Action::Outputs, scope, NO_PARAMS)?
            .read_outputs()
            .await
    }
}
