//! Doctor plans run through real child processes.

#![cfg(unix)]

use collection_runner::doctor::{
    default_plan, run_plan, with_defaults, DoctorStep, StepStatus, TokioProcessRunner,
};
use tempfile::TempDir;

fn sh(name: &str, script: &str) -> DoctorStep {
    DoctorStep::new(name, ["sh", "-c", script])
}

#[tokio::test]
async fn test_plan_runs_in_order_and_keeps_going() {
    let dir = TempDir::new().unwrap();
    let steps = with_defaults(
        vec![
            sh("write", "echo checked > marker.txt"),
            sh("read", "cat marker.txt"),
            sh("migrations", "echo 'missing migration' >&2; exit 3"),
            sh("deploy", "exit 1").allow_failure(),
            sh("after", "echo still ran"),
        ],
        Some(dir.path()),
        Some(30),
    );

    let report = run_plan(&steps, &TokioProcessRunner::default()).await;

    let statuses: Vec<&StepStatus> = report.steps.iter().map(|s| &s.status).collect();
    assert_eq!(
        statuses,
        vec![
            &StepStatus::Passed,
            &StepStatus::Passed,
            &StepStatus::Failed { exit_code: Some(3) },
            &StepStatus::Failed { exit_code: Some(1) },
            &StepStatus::Passed,
        ]
    );
    assert_eq!(report.steps[1].stdout.trim(), "checked");
    assert_eq!(report.failed_count(), 2);
    assert!(!report.is_success());

    let text = report.render_text(false);
    assert!(text.contains("FAIL migrations"));
    assert!(text.contains("    missing migration"));
    assert!(text.contains("WARN deploy"));
    assert!(text.ends_with("5 steps, 2 failed: FAILED\n"));
}

#[tokio::test]
async fn test_allowed_failures_keep_plan_green() {
    let steps = vec![sh("ok", "true"), sh("optional", "false").allow_failure()];
    let report = run_plan(&steps, &TokioProcessRunner::default()).await;
    assert!(report.is_success());
    assert!(report.render_text(false).ends_with("2 steps, 1 failed: OK\n"));
}

#[tokio::test]
async fn test_timeout_and_missing_program() {
    let steps = with_defaults(
        vec![
            sh("slow", "sleep 5"),
            DoctorStep::new("missing", ["definitely-not-a-real-program-xyz"]),
        ],
        None,
        Some(1),
    );
    let report = run_plan(&steps, &TokioProcessRunner::default()).await;

    assert_eq!(report.steps[0].status, StepStatus::TimedOut);
    assert!(report.steps[0].duration.as_millis() < 4000);
    assert!(matches!(report.steps[1].status, StepStatus::SpawnError(_)));
    assert!(!report.is_success());
}

#[tokio::test]
async fn test_output_is_capped() {
    let steps = vec![sh("chatty", "printf '0123456789abcdef'")];
    let report = run_plan(&steps, &TokioProcessRunner::new(8)).await;
    assert_eq!(report.steps[0].stdout, "01234567");
}

#[test]
fn test_default_plan_targets_manage_py() {
    let plan = default_plan("python3", "backend/manage.py");
    assert!(plan
        .iter()
        .all(|step| step.argv[..2] == ["python3", "backend/manage.py"]));
    assert_eq!(plan.last().map(|s| s.allow_failure), Some(true));
}
