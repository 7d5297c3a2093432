use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use seedflow_cloud_aws::AwsCloudFactory;
use seedflow_config::Settings;
use seedflow_controlplane::model::{ExecutionLog, ExecutionState};
use seedflow_controlplane::{
    BuildWorkerDefaults, ConfCipher, ControlPlane, DeployOptions, Job, JsonFileStore, Repository,
    Workflow, Workflows,
};
use seedflow_infra::{ExecutorSettings, ShellRunner};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "seedflowd")]
#[command(about = "seedflow control plane daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (defaults to discovery, see SEEDFLOW_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one workflow for a recorded execution log and wait for it
    Run {
        /// Workflow name, e.g. create_environment or deploy-version
        workflow: String,
        /// Entity the workflow acts on
        entity_id: Uuid,
        /// Execution log recording the run
        log_id: Uuid,
        /// Service being replaced (update_service only)
        #[arg(long)]
        previous: Option<Uuid>,
    },
    /// Show the state of an execution log
    Status {
        /// Execution log slug
        log_slug: String,
    },
    /// Print a fresh base64 encryption key
    Keygen,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Keygen => {
            println!("{}", ConfCipher::generate_key());
            Ok(())
        }
        Commands::Status { log_slug } => {
            let (_, settings) = load_settings(cli.config.as_deref())?;
            let repo = Repository::new(Arc::new(JsonFileStore::new(&settings.paths.store_file)));
            let log = repo
                .log_by_slug(&log_slug)
                .await
                .with_context(|| format!("no execution log {}", log_slug))?;
            println!("{} {}", "Log:".bold(), log.meta.slug);
            println!("  component: {}", log.component);
            println!("  action:    {}", log.action);
            println!("  state:     {}", paint(log.state()));
            if let Some(ended_at) = log.ended_at {
                println!("  ended:     {}", ended_at.to_rfc3339());
            }
            Ok(())
        }
        Commands::Run {
            workflow,
            entity_id,
            log_id,
            previous,
        } => {
            let workflow: Workflow = workflow.parse()?;
            let (path, settings) = load_settings(cli.config.as_deref())?;
            tracing::info!(settings = %path.display(), "Loaded settings");

            let plane = ControlPlane::start(workflows(&settings)?);
            let job = Job::new(workflow, entity_id, log_id);
            println!("{} {} for {}", "▶".green(), workflow, entity_id);

            let outcome = plane.commands().redispatch(job, previous).await;
            plane.shutdown().await;
            outcome.context("failed to dispatch job")?;

            let log = plane
                .repository()
                .get::<ExecutionLog>(log_id)
                .await?;
            let state = log.state();
            println!("{} {}", "Result:".bold(), paint(state));
            if state != ExecutionState::Succeeded {
                anyhow::bail!("{} did not succeed", workflow);
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(explicit: Option<&std::path::Path>) -> anyhow::Result<(PathBuf, Settings)> {
    match explicit {
        Some(path) => {
            let settings = Settings::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            Ok((path.to_path_buf(), settings))
        }
        None => Settings::discover().context("no seedflow settings file found"),
    }
}

fn workflows(settings: &Settings) -> anyhow::Result<Workflows> {
    let key = settings
        .encryption_key()
        .context("encryption key missing; set SEEDFLOW_ENCRYPTION_KEY or run `seedflowd keygen`")?;
    let cipher = ConfCipher::from_base64(&key)?;
    let repo = Repository::new(Arc::new(JsonFileStore::new(&settings.paths.store_file)));

    let executor = ExecutorSettings {
        tool_binary: settings.tool.binary.clone(),
        modules_dir: settings.tool.modules_dir.clone(),
        exec_logs_dir: settings.paths.exec_logs_dir.clone(),
        plans_dir: settings.paths.plans_dir.clone(),
        keys_dir: settings.paths.ssh_keys_dir.clone(),
        plugin_dir: settings.tool.plugin_dir.clone(),
    };

    Ok(Workflows::new(
        repo,
        cipher,
        Arc::new(ShellRunner::new()),
        Arc::new(executor),
        Arc::new(AwsCloudFactory::new()),
    )
    .with_deploy_options(DeployOptions {
        poll_interval: settings.deploy.poll_interval(),
        timeout: settings.deploy.timeout(),
    })
    .with_build_worker_defaults(BuildWorkerDefaults {
        ami: settings.build_worker.ami.clone(),
        spot_max_price: settings.build_worker.spot_max_price.clone(),
        valid_for: chrono::Duration::minutes(settings.build_worker.valid_for_minutes),
    }))
}

fn paint(state: ExecutionState) -> colored::ColoredString {
    match state {
        ExecutionState::Pending => state.to_string().yellow(),
        ExecutionState::Succeeded => state.to_string().green(),
        ExecutionState::Failed => state.to_string().red(),
    }
}
