use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error};

use dealflow::config::{DealStrategy, WorkflowConfig};
use dealflow::poll::RetryPolicy;
use dealflow::subprocess::SubprocessManager;
use dealflow::workflow::{WorkflowOrchestrator, WorkflowReport};

/// Run a full demo workflow against a compute-marketplace CLI: ask plan,
/// bid order, deal, task start, task stop.
#[derive(Parser)]
#[command(name = "dealflow")]
#[command(about = "End-to-end demo workflow for a compute-marketplace CLI", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Marketplace CLI program name or path
    #[arg(long, default_value = "sonmcli")]
    cli: String,

    /// Node endpoint, host:port
    #[arg(long, default_value = "localhost:15030")]
    node: String,

    /// Deal formation strategy
    #[arg(long, value_enum, default_value = "open")]
    strategy: DealStrategy,

    /// Seconds between polls for asynchronous marketplace state
    #[arg(long, default_value = "1")]
    poll_interval_secs: u64,

    /// Maximum polls before the run fails with a timeout
    #[arg(long, default_value = "120")]
    poll_attempts: u32,

    /// Ask plan duration (e.g. 8h)
    #[arg(long, default_value = "8h")]
    ask_duration: String,

    /// Ask plan price
    #[arg(long, default_value = "0.01")]
    ask_price: String,

    /// Bid order duration
    #[arg(long, default_value = "8h")]
    bid_duration: String,

    /// Bid order price
    #[arg(long, default_value = "0.01")]
    bid_price: String,

    /// Container image for the task
    #[arg(long, default_value = "docker.io/library/nginx:latest")]
    task_image: String,

    /// YAML file with the task's container environment
    #[arg(long)]
    task_env_file: Option<PathBuf>,

    /// KEY=VALUE environment entries for the task container
    #[arg(long = "task-env", value_name = "KEY=VALUE")]
    task_env: Vec<String>,

    /// Commit the container image when the task stops
    #[arg(long)]
    commit_on_stop: bool,

    /// Finish all existing deals before starting the workflow
    #[arg(long)]
    close_active_deals: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<WorkflowConfig> {
        let mut env = BTreeMap::new();
        for entry in &self.task_env {
            let (key, value) = entry
                .split_once('=')
                .with_context(|| format!("invalid --task-env entry '{entry}', expected KEY=VALUE"))?;
            env.insert(key.to_string(), value.to_string());
        }

        let mut config = WorkflowConfig {
            cli_program: self.cli,
            node_endpoint: self.node,
            strategy: self.strategy,
            retry: RetryPolicy {
                interval: Duration::from_secs(self.poll_interval_secs),
                max_attempts: self.poll_attempts,
            },
            close_active_deals: self.close_active_deals,
            ..WorkflowConfig::default()
        };
        config.ask.duration = self.ask_duration;
        config.ask.price = self.ask_price;
        config.bid.duration = self.bid_duration;
        config.bid.price = self.bid_price;
        config.task.image = self.task_image;
        config.task.env = env;
        config.task.env_file = self.task_env_file;
        config.task.commit_on_stop = self.commit_on_stop;
        Ok(config)
    }
}

async fn run(cli: Cli) -> anyhow::Result<WorkflowReport> {
    let config = cli.into_config()?;
    debug!("workflow configuration: {config:?}");

    let subprocess = SubprocessManager::production();
    let orchestrator = WorkflowOrchestrator::new(subprocess, config);
    let report = orchestrator.run().await?;
    Ok(report)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    match run(cli).await {
        Ok(report) => {
            println!(
                "Workflow complete: plan {}, deal {}, task {}",
                report.plan_id, report.deal_id, report.task_id
            );
        }
        Err(err) => {
            error!("workflow aborted: {err:#}");
            eprintln!("workflow aborted: {err:#}");
            std::process::exit(1);
        }
    }
}
