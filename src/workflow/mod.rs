//! The sequential demo workflow: one linear pass from worker liveness check to
//! task teardown, fail-fast on every step. Identifiers obtained along the way
//! are immutable and threaded explicitly from step to step; all state
//! transitions happen inside the marketplace, the workflow only observes them.

use std::future::Future;

use crate::config::{DealStrategy, WorkflowConfig};
use crate::error::{Error, Result};
use crate::marketplace::output::{self, PlanListing};
use crate::marketplace::payload::{AskPlanSpec, BidOrderSpec, PayloadFile, TaskSpec};
use crate::marketplace::MarketplaceClient;
use crate::poll;
use crate::subprocess::SubprocessManager;

/// Identifiers collected over one successful run.
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub plan_id: String,
    pub ask_order_id: String,
    pub bid_order_id: String,
    pub deal_id: String,
    pub task_id: String,
}

pub struct WorkflowOrchestrator {
    client: MarketplaceClient,
    config: WorkflowConfig,
}

/// Print the in-progress marker, await the step, print its outcome line.
/// Errors pass through untouched; there is no retry and no rollback.
async fn step<T, Fut, S>(label: &str, fut: Fut, summary: S) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
    S: FnOnce(&T) -> String,
{
    println!("⏳ {label}...");
    match fut.await {
        Ok(value) => {
            println!("✅ {label}: {}", summary(&value));
            Ok(value)
        }
        Err(err) => {
            println!("❌ {label} failed: {err}");
            Err(err)
        }
    }
}

fn first_line(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("ok")
        .to_string()
}

impl WorkflowOrchestrator {
    pub fn new(subprocess: SubprocessManager, config: WorkflowConfig) -> Self {
        let client = MarketplaceClient::new(
            subprocess.runner(),
            &config.cli_program,
            &config.node_endpoint,
        );
        Self { client, config }
    }

    pub async fn run(&self) -> Result<WorkflowReport> {
        if self.config.close_active_deals {
            step("close active deals", self.close_active_deals(), |count| {
                format!("{count} deal(s) closed")
            })
            .await?;
        }

        step("check worker", self.check_worker(), |_| {
            "worker is alive".to_string()
        })
        .await?;

        let plan_id = step("submit ask plan", self.submit_ask_plan(), |id| {
            format!("plan {id}")
        })
        .await?;

        let ask_order_id = step("discover ask order", self.discover_order(&plan_id), |id| {
            format!("order {id}")
        })
        .await?;

        let bid_order_id = step("submit bid order", self.submit_bid(), |id| {
            format!("order {id}")
        })
        .await?;

        let deal_id = match self.config.strategy {
            DealStrategy::Open => {
                step(
                    "open deal",
                    self.open_deal(&ask_order_id, &bid_order_id),
                    |id| format!("deal {id}"),
                )
                .await?
            }
            DealStrategy::Auto => {
                step("await matched deal", self.await_matched_deal(&plan_id), |id| {
                    format!("deal {id}")
                })
                .await?
            }
        };

        step("verify deal", self.verify_deal(&deal_id), |_| {
            format!("deal {deal_id} confirmed")
        })
        .await?;

        let task_id = step("start task", self.start_task(&deal_id), |id| {
            format!("task {id}")
        })
        .await?;

        // Under auto-matching the task is addressed through the worker behind
        // the deal rather than the deal itself.
        let task_address = match self.config.strategy {
            DealStrategy::Open => deal_id.clone(),
            DealStrategy::Auto => {
                step("resolve worker id", self.worker_for_deal(&deal_id), |id| {
                    format!("worker {id}")
                })
                .await?
            }
        };

        step(
            "check task",
            self.check_task(&task_address, &task_id),
            |status| first_line(status),
        )
        .await?;

        step("stop task", self.stop_task(&task_address, &task_id), |_| {
            "task stopped".to_string()
        })
        .await?;

        Ok(WorkflowReport {
            plan_id,
            ask_order_id,
            bid_order_id,
            deal_id,
            task_id,
        })
    }

    /// Optional pre-step: finish every deal the node currently holds.
    async fn close_active_deals(&self) -> Result<usize> {
        let listing = self.client.deals_list_json().await?;
        let deal_ids = output::extract_deal_ids(&listing)?;
        for deal_id in &deal_ids {
            tracing::info!("closing deal {deal_id}");
            self.client.deals_finish(deal_id).await?;
        }
        Ok(deal_ids.len())
    }

    async fn check_worker(&self) -> Result<()> {
        self.client.worker_status().await?;
        Ok(())
    }

    async fn submit_ask_plan(&self) -> Result<String> {
        let spec = AskPlanSpec::from_settings(&self.config.ask);
        let payload = PayloadFile::write_yaml(&spec)?;
        let output = self.client.ask_plan_create(payload.path()).await?;
        output::extract_marker_id(&output)
    }

    async fn discover_order(&self, plan_id: &str) -> Result<String> {
        poll::poll_until_present(&self.config.retry, || {
            let client = &self.client;
            async move {
                let listing = client.ask_plan_list().await?;
                Ok(PlanListing::parse(&listing)?.order_id(plan_id))
            }
        })
        .await
    }

    async fn submit_bid(&self) -> Result<String> {
        let spec = BidOrderSpec::from_settings(&self.config.bid);
        let payload = PayloadFile::write_yaml(&spec)?;
        let output = self.client.market_create(payload.path()).await?;
        output::extract_marker_id(&output)
    }

    async fn open_deal(&self, ask_order_id: &str, bid_order_id: &str) -> Result<String> {
        let output = self.client.deals_open(ask_order_id, bid_order_id).await?;
        output::extract_marker_id(&output)
    }

    async fn await_matched_deal(&self, plan_id: &str) -> Result<String> {
        poll::poll_until_present(&self.config.retry, || {
            let client = &self.client;
            async move {
                let listing = client.ask_plan_list().await?;
                Ok(PlanListing::parse(&listing)?.deal_id(plan_id))
            }
        })
        .await
    }

    /// The queried deal must report the identity it was requested under.
    async fn verify_deal(&self, deal_id: &str) -> Result<()> {
        let status = self.client.deals_status_json(deal_id).await?;
        let reported = output::extract_json_id(&status)?;
        if reported != deal_id {
            return Err(Error::Consistency {
                expected: deal_id.to_string(),
                actual: reported,
            });
        }
        Ok(())
    }

    async fn start_task(&self, deal_id: &str) -> Result<String> {
        let spec = TaskSpec::from_settings(&self.config.task)?;
        let payload = PayloadFile::write_yaml(&spec)?;
        let output = self.client.tasks_start(deal_id, payload.path()).await?;
        output::extract_json_id(&output)
    }

    async fn worker_for_deal(&self, deal_id: &str) -> Result<String> {
        let status = self.client.deals_status(deal_id).await?;
        output::extract_worker_id(&status)
    }

    async fn check_task(&self, task_address: &str, task_id: &str) -> Result<String> {
        self.client.tasks_status(task_address, task_id).await
    }

    async fn stop_task(&self, task_address: &str, task_id: &str) -> Result<()> {
        self.client.tasks_stop(task_address, task_id).await?;
        Ok(())
    }
}
