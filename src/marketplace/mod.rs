//! Typed surface over the marketplace CLI.
//!
//! One method per external subcommand. Every invocation carries the node
//! endpoint, and any non-success exit becomes [`Error::ExternalTool`] with the
//! captured output preserved verbatim.

pub mod output;
pub mod payload;

use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::subprocess::{ProcessCommandBuilder, ProcessRunner};

pub struct MarketplaceClient {
    runner: Arc<dyn ProcessRunner>,
    program: String,
    node_endpoint: String,
}

impl MarketplaceClient {
    pub fn new(runner: Arc<dyn ProcessRunner>, program: &str, node_endpoint: &str) -> Self {
        Self {
            runner,
            program: program.to_string(),
            node_endpoint: node_endpoint.to_string(),
        }
    }

    /// Run one CLI invocation to completion, returning its combined output.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let command = ProcessCommandBuilder::new(&self.program)
            .args(args)
            .arg("--node")
            .arg(&self.node_endpoint)
            .build();

        let output = self.runner.run(command).await?;

        if !output.status.success() {
            return Err(Error::ExternalTool {
                exit_code: output.status.code().unwrap_or(-1),
                output: output.combined(),
            });
        }

        Ok(output.combined())
    }

    pub async fn worker_status(&self) -> Result<String> {
        self.run(&["worker", "status"]).await
    }

    pub async fn ask_plan_create(&self, spec_file: &Path) -> Result<String> {
        let path = spec_file.to_string_lossy();
        self.run(&["worker", "ask-plan", "create", &path]).await
    }

    pub async fn ask_plan_list(&self) -> Result<String> {
        self.run(&["worker", "ask-plan", "list"]).await
    }

    pub async fn market_create(&self, order_file: &Path) -> Result<String> {
        let path = order_file.to_string_lossy();
        self.run(&["market", "create", &path]).await
    }

    pub async fn deals_open(&self, ask_order_id: &str, bid_order_id: &str) -> Result<String> {
        self.run(&["deals", "open", ask_order_id, bid_order_id])
            .await
    }

    /// Deal status as JSON, used for the identity check after formation.
    pub async fn deals_status_json(&self, deal_id: &str) -> Result<String> {
        self.run(&["deals", "status", deal_id, "--out=json"]).await
    }

    /// Deal status in the default YAML rendering, used to read `Consumer ID`.
    pub async fn deals_status(&self, deal_id: &str) -> Result<String> {
        self.run(&["deals", "status", deal_id]).await
    }

    pub async fn deals_list_json(&self) -> Result<String> {
        self.run(&["deals", "list", "--out=json"]).await
    }

    pub async fn deals_finish(&self, deal_id: &str) -> Result<String> {
        self.run(&["deals", "finish", deal_id]).await
    }

    pub async fn tasks_start(&self, deal_id: &str, task_file: &Path) -> Result<String> {
        let path = task_file.to_string_lossy();
        self.run(&["tasks", "start", deal_id, &path, "--out=json"])
            .await
    }

    /// `address` is a deal id or a worker id depending on the deal strategy.
    pub async fn tasks_status(&self, address: &str, task_id: &str) -> Result<String> {
        self.run(&["tasks", "status", address, task_id]).await
    }

    pub async fn tasks_stop(&self, address: &str, task_id: &str) -> Result<String> {
        self.run(&["tasks", "stop", address, task_id]).await
    }
}
