//! Full workflow runs against the mock process runner: no real marketplace
//! binary is ever invoked.

use std::path::Path;
use std::time::Duration;

use dealflow::config::{DealStrategy, WorkflowConfig};
use dealflow::error::Error;
use dealflow::poll::RetryPolicy;
use dealflow::subprocess::{MockProcessRunner, ProcessCommand, SubprocessManager};
use dealflow::workflow::WorkflowOrchestrator;

const CLI: &str = "sonmcli";

fn test_config(strategy: DealStrategy) -> WorkflowConfig {
    WorkflowConfig {
        cli_program: CLI.to_string(),
        strategy,
        retry: RetryPolicy {
            interval: Duration::from_millis(1),
            max_attempts: 5,
        },
        ..WorkflowConfig::default()
    }
}

fn starts_with(args: &[String], prefix: &[&str]) -> bool {
    args.len() >= prefix.len() && args.iter().zip(prefix).all(|(a, b)| a == b)
}

/// Subcommand words of every invocation, without file paths and `--node`.
fn subcommands(history: &[ProcessCommand]) -> Vec<String> {
    history
        .iter()
        .map(|cmd| {
            cmd.args
                .iter()
                .take_while(|arg| !arg.starts_with("--node"))
                .filter(|arg| !arg.starts_with('/') && *arg != "--out=json")
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Expectations for a clean explicit-open run.
fn expect_open_happy_path(mock: &mut MockProcessRunner) {
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "status"]))
        .returns_stdout("Uptime: 3h\n")
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "ask-plan", "create"]))
        .returns_stdout("ID = plan-1\n")
        .finish();

    // Order id appears on the second listing.
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "ask-plan", "list"]))
        .returns_stdout("plan-1:\n  orderid: \"\"\n")
        .then()
        .returns_stdout("plan-1:\n  orderid: \"1001\"\n")
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["market", "create"]))
        .returns_stdout("ID = 2002\n")
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["deals", "open", "1001", "2002"]))
        .returns_stdout("ID = 555\n")
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| {
            starts_with(args, &["deals", "status", "555"])
                && args.contains(&"--out=json".to_string())
        })
        .returns_stdout(r#"{"id": "555", "status": "DEAL_ACCEPTED"}"#)
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["tasks", "start", "555"]))
        .returns_stdout(r#"{"id": "task-9"}"#)
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["tasks", "status", "555", "task-9"]))
        .returns_stdout("RUNNING\n")
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["tasks", "stop", "555", "task-9"]))
        .finish();
}

fn orchestrator(strategy: DealStrategy) -> (WorkflowOrchestrator, MockProcessRunner) {
    let (subprocess, mock) = SubprocessManager::mock();
    let orchestrator = WorkflowOrchestrator::new(subprocess, test_config(strategy));
    (orchestrator, mock)
}

fn orchestrator_with_failing_create() -> (WorkflowOrchestrator, MockProcessRunner) {
    let (orchestrator, mut mock) = orchestrator(DealStrategy::Open);
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "status"]))
        .finish();
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "ask-plan", "create"]))
        .returns_stderr("ask plan rejected")
        .returns_exit_code(1)
        .finish();
    (orchestrator, mock)
}

#[tokio::test]
async fn explicit_open_run_threads_ids_through_every_step() {
    let (orchestrator, mut mock) = orchestrator(DealStrategy::Open);
    expect_open_happy_path(&mut mock);

    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.plan_id, "plan-1");
    assert_eq!(report.ask_order_id, "1001");
    assert_eq!(report.bid_order_id, "2002");
    assert_eq!(report.deal_id, "555");
    assert_eq!(report.task_id, "task-9");

    let history = mock.call_history();
    assert_eq!(
        subcommands(&history),
        vec![
            "worker status",
            "worker ask-plan create",
            "worker ask-plan list",
            "worker ask-plan list",
            "market create",
            "deals open 1001 2002",
            "deals status 555",
            "tasks start 555",
            "tasks status 555 task-9",
            "tasks stop 555 task-9",
        ]
    );

    // Every invocation addresses the configured node.
    for cmd in &history {
        let node_at = cmd.args.iter().position(|a| a == "--node").unwrap();
        assert_eq!(cmd.args[node_at + 1], "localhost:15030");
    }
}

#[tokio::test]
async fn auto_match_run_polls_for_deal_and_addresses_tasks_by_worker() {
    let (orchestrator, mut mock) = orchestrator(DealStrategy::Auto);

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "status"]))
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "ask-plan", "create"]))
        .returns_stdout("ID = plan-1\n")
        .finish();

    // Calls 1-2 discover the order, calls 3-4 wait out the auto-match.
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "ask-plan", "list"]))
        .returns_stdout("plan-1:\n  orderid: \"\"\n  dealid: \"\"\n")
        .then()
        .returns_stdout("plan-1:\n  orderid: \"1001\"\n  dealid: \"\"\n")
        .then()
        .returns_stdout("plan-1:\n  orderid: \"1001\"\n  dealid: \"\"\n")
        .then()
        .returns_stdout("plan-1:\n  orderid: \"1001\"\n  dealid: \"555\"\n")
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["market", "create"]))
        .returns_stdout("ID = 2002\n")
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| {
            starts_with(args, &["deals", "status", "555"])
                && args.contains(&"--out=json".to_string())
        })
        .returns_stdout(r#"{"id": "555"}"#)
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["tasks", "start", "555"]))
        .returns_stdout(r#"{"id": "task-9"}"#)
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| {
            starts_with(args, &["deals", "status", "555"])
                && !args.contains(&"--out=json".to_string())
        })
        .returns_stdout("Consumer ID: \"0xAB12\"\nStatus: accepted\n")
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["tasks", "status", "0xab12", "task-9"]))
        .returns_stdout("RUNNING\n")
        .finish();

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["tasks", "stop", "0xab12", "task-9"]))
        .finish();

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.deal_id, "555");

    let listings = mock
        .call_history()
        .iter()
        .filter(|cmd| starts_with(&cmd.args, &["worker", "ask-plan", "list"]))
        .count();
    assert_eq!(listings, 4);
}

#[tokio::test]
async fn worker_check_failure_aborts_before_any_submission() {
    let (orchestrator, mut mock) = orchestrator(DealStrategy::Open);

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "status"]))
        .returns_stderr("rpc error: connection refused")
        .returns_exit_code(127)
        .finish();

    let err = orchestrator.run().await.unwrap_err();
    match err {
        Error::ExternalTool { exit_code, output } => {
            assert_eq!(exit_code, 127);
            assert_eq!(output, "rpc error: connection refused");
        }
        other => panic!("expected ExternalTool, got {other:?}"),
    }

    // Nothing ran after the failing step.
    assert_eq!(mock.call_history().len(), 1);
}

#[tokio::test]
async fn mid_workflow_failure_stops_the_run() {
    let (orchestrator, mut mock) = orchestrator(DealStrategy::Open);

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "status"]))
        .finish();
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "ask-plan", "create"]))
        .returns_stdout("ID = plan-1\n")
        .finish();
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "ask-plan", "list"]))
        .returns_stdout("plan-1:\n  orderid: \"1001\"\n")
        .finish();
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["market", "create"]))
        .returns_stdout("insufficient balance")
        .returns_exit_code(3)
        .finish();

    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, Error::ExternalTool { exit_code: 3, .. }));

    let history = mock.call_history();
    assert!(!history
        .iter()
        .any(|cmd| starts_with(&cmd.args, &["deals"]) || starts_with(&cmd.args, &["tasks"])));
}

#[tokio::test]
async fn deal_identity_mismatch_is_a_consistency_error() {
    let (orchestrator, mut mock) = orchestrator(DealStrategy::Open);

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "status"]))
        .finish();
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "ask-plan", "create"]))
        .returns_stdout("ID = plan-1\n")
        .finish();
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "ask-plan", "list"]))
        .returns_stdout("plan-1:\n  orderid: \"1001\"\n")
        .finish();
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["market", "create"]))
        .returns_stdout("ID = 2002\n")
        .finish();
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["deals", "open"]))
        .returns_stdout("ID = 555\n")
        .finish();
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["deals", "status", "555"]))
        .returns_stdout(r#"{"id": "666"}"#)
        .finish();

    let err = orchestrator.run().await.unwrap_err();
    match err {
        Error::Consistency { expected, actual } => {
            assert_eq!(expected, "555");
            assert_eq!(actual, "666");
        }
        other => panic!("expected Consistency, got {other:?}"),
    }

    assert!(!mock
        .call_history()
        .iter()
        .any(|cmd| starts_with(&cmd.args, &["tasks"])));
}

#[tokio::test]
async fn missing_marker_line_is_a_parse_error() {
    let (orchestrator, mut mock) = orchestrator(DealStrategy::Open);

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "status"]))
        .finish();
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "ask-plan", "create"]))
        .returns_stdout("plan accepted\n")
        .finish();

    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[tokio::test]
async fn payload_file_is_gone_after_success_and_after_failure() {
    // Success branch: capture the path handed to ask-plan create.
    let (orchestrator, mut mock) = orchestrator(DealStrategy::Open);
    expect_open_happy_path(&mut mock);
    orchestrator.run().await.unwrap();

    let create_call = mock
        .call_history()
        .into_iter()
        .find(|cmd| starts_with(&cmd.args, &["worker", "ask-plan", "create"]))
        .unwrap();
    assert!(!Path::new(&create_call.args[3]).exists());

    // Failure branch: the submission itself fails, the file still goes away.
    let (orchestrator, mock) = orchestrator_with_failing_create();
    orchestrator.run().await.unwrap_err();

    let create_call = mock
        .call_history()
        .into_iter()
        .find(|cmd| starts_with(&cmd.args, &["worker", "ask-plan", "create"]))
        .unwrap();
    assert!(!Path::new(&create_call.args[3]).exists());
}

#[tokio::test]
async fn close_active_deals_finishes_each_unique_deal_once() {
    let (subprocess, mut mock) = SubprocessManager::mock();
    let mut config = test_config(DealStrategy::Open);
    config.close_active_deals = true;
    let orchestrator = WorkflowOrchestrator::new(subprocess, config);

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["deals", "list"]))
        .returns_stdout(r#"{"deals": [{"id": "D1"}, {"id": "D2"}, {"id": "D1"}]}"#)
        .finish();
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["deals", "finish"]))
        .finish();
    expect_open_happy_path(&mut mock);

    orchestrator.run().await.unwrap();

    let finished: Vec<String> = mock
        .call_history()
        .iter()
        .filter(|cmd| starts_with(&cmd.args, &["deals", "finish"]))
        .map(|cmd| cmd.args[2].clone())
        .collect();
    assert_eq!(finished, vec!["D1", "D2"]);
}

#[tokio::test]
async fn polling_gives_up_with_a_timeout() {
    let (orchestrator, mut mock) = orchestrator(DealStrategy::Open);

    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "status"]))
        .finish();
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "ask-plan", "create"]))
        .returns_stdout("ID = plan-1\n")
        .finish();
    // The order never materializes.
    mock.expect_command(CLI)
        .with_args(|args| starts_with(args, &["worker", "ask-plan", "list"]))
        .returns_stdout("plan-1:\n  orderid: \"\"\n")
        .finish();

    let err = orchestrator.run().await.unwrap_err();
    match err {
        Error::Timeout { attempts, .. } => assert_eq!(attempts, 5),
        other => panic!("expected Timeout, got {other:?}"),
    }

    let listings = mock
        .call_history()
        .iter()
        .filter(|cmd| starts_with(&cmd.args, &["worker", "ask-plan", "list"]))
        .count();
    assert_eq!(listings, 5);
}
