use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::poll::RetryPolicy;

/// How the workflow turns its ask and bid orders into a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DealStrategy {
    /// Open the deal explicitly from the two discovered order ids.
    Open,
    /// Wait for the marketplace to match the orders on its own.
    Auto,
}

/// Everything the orchestrator needs for one run. Built once in `main` and
/// passed in explicitly; no step reads ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Marketplace CLI program name or path.
    pub cli_program: String,
    /// Node endpoint (`host:port`), appended to every CLI invocation.
    pub node_endpoint: String,
    pub strategy: DealStrategy,
    pub retry: RetryPolicy,
    pub ask: AskPlanSettings,
    pub bid: BidOrderSettings,
    pub task: TaskSettings,
    /// Close every existing deal before starting the workflow.
    pub close_active_deals: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            cli_program: "sonmcli".to_string(),
            node_endpoint: "localhost:15030".to_string(),
            strategy: DealStrategy::Open,
            retry: RetryPolicy::default(),
            ask: AskPlanSettings::default(),
            bid: BidOrderSettings::default(),
            task: TaskSettings::default(),
            close_active_deals: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskPlanSettings {
    pub duration: String,
    pub price: String,
    pub cpu_cores: u32,
    pub ram_size: String,
    pub throughput_in: String,
    pub throughput_out: String,
    pub overlay: bool,
    pub outbound: bool,
    pub incoming: bool,
}

impl Default for AskPlanSettings {
    fn default() -> Self {
        Self {
            duration: "8h".to_string(),
            price: "0.01".to_string(),
            cpu_cores: 1,
            ram_size: "256MB".to_string(),
            throughput_in: "10Mibit/s".to_string(),
            throughput_out: "10Mibit/s".to_string(),
            overlay: false,
            outbound: true,
            incoming: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidOrderSettings {
    pub duration: String,
    pub price: String,
    /// Bytes; must fit inside the ask plan's RAM allocation.
    pub ram_size: u64,
    pub cpu_cores: u64,
    pub overlay: bool,
    pub outbound: bool,
    pub incoming: bool,
}

impl Default for BidOrderSettings {
    fn default() -> Self {
        Self {
            duration: "8h".to_string(),
            price: "0.01".to_string(),
            ram_size: 256 * 1024 * 1024,
            cpu_cores: 1,
            overlay: false,
            outbound: true,
            incoming: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSettings {
    /// Container image reference to run inside the deal.
    pub image: String,
    pub commit_on_stop: bool,
    /// Inline environment for the container; entries loaded from `env_file`
    /// take precedence over these.
    pub env: BTreeMap<String, String>,
    /// Optional YAML file with a flat string-to-string environment mapping.
    pub env_file: Option<PathBuf>,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            image: "docker.io/library/nginx:latest".to_string(),
            commit_on_stop: false,
            env: BTreeMap::new(),
            env_file: None,
        }
    }
}
