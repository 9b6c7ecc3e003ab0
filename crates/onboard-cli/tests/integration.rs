#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn onboard(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("onboard").unwrap();
    cmd.current_dir(dir.path()).env("ONBOARD_ROOT", dir.path());
    cmd
}

fn init_platform(dir: &TempDir) {
    onboard(dir).arg("init").assert().success();
}

fn json_output(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.arg("--json").assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

fn create(dir: &TempDir, id: &str, email: &str) {
    onboard(dir)
        .args([
            "application",
            "create",
            id,
            "--email",
            email,
            "--name",
            "Springfield College",
            "--type",
            "college",
            "--size",
            "medium",
        ])
        .assert()
        .success();
}

fn submit(dir: &TempDir, id: &str) {
    onboard(dir)
        .args([
            "application",
            "verify",
            id,
            "--phone",
            "555-010-0000",
            "--street",
            "1 Main St",
            "--city",
            "Springfield",
            "--country",
            "US",
        ])
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// onboard init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_and_database() {
    let dir = TempDir::new().unwrap();
    onboard(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .onboard/config.yaml"));

    assert!(dir.path().join(".onboard").is_dir());
    assert!(dir.path().join(".onboard/config.yaml").exists());
    assert!(dir.path().join(".onboard/onboard.db").exists());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    onboard(&dir).arg("init").assert().success();
    onboard(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  .onboard/config.yaml"));
}

#[test]
fn commands_before_init_fail() {
    let dir = TempDir::new().unwrap();
    onboard(&dir)
        .arg("metrics")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn config_validate_passes_on_defaults() {
    let dir = TempDir::new().unwrap();
    init_platform(&dir);
    onboard(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings"));
}

// ---------------------------------------------------------------------------
// onboard application
// ---------------------------------------------------------------------------

#[test]
fn create_and_show_application() {
    let dir = TempDir::new().unwrap();
    init_platform(&dir);
    create(&dir, "user_1", "jane@springfield.edu");

    let record = json_output(onboard(&dir).args(["application", "show", "user_1"]));
    assert_eq!(record["status"], "draft");
    assert_eq!(record["email_domain"], "springfield.edu");

    onboard(&dir)
        .args(["application", "show", "user_1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Springfield College"));
}

#[test]
fn duplicate_create_fails() {
    let dir = TempDir::new().unwrap();
    init_platform(&dir);
    create(&dir, "user_1", "jane@springfield.edu");
    onboard(&dir)
        .args([
            "application", "create", "user_1", "--email", "x@y.edu", "--name", "Other", "--type",
            "school", "--size", "small",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn show_missing_application_fails() {
    let dir = TempDir::new().unwrap();
    init_platform(&dir);
    onboard(&dir)
        .args(["application", "show", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no application"));
}

#[test]
fn lifecycle_through_binding_populates_cache() {
    let dir = TempDir::new().unwrap();
    init_platform(&dir);
    create(&dir, "user_x", "jane@springfield.edu");
    submit(&dir, "user_x");

    onboard(&dir)
        .args(["admin", "approve", "user_x", "--by", "admin_1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[approved]"));

    onboard(&dir)
        .args([
            "application", "bind", "user_x", "--org-id", "org_123", "--org-slug", "acme",
        ])
        .assert()
        .success();

    let check = json_output(onboard(&dir).args(["domain", "check", "springfield.edu"]));
    assert_eq!(check["found"], true);
    assert_eq!(check["entry"]["external_org_id"], "org_123");

    onboard(&dir)
        .args(["admin", "unapprove", "user_x", "--by", "admin_2"])
        .assert()
        .success();
    let check = json_output(onboard(&dir).args(["domain", "check", "springfield.edu"]));
    assert_eq!(check["found"], true);

    onboard(&dir)
        .args(["domain", "evict", "springfield.edu"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Evicted springfield.edu"));
    let check = json_output(onboard(&dir).args(["domain", "check", "springfield.edu"]));
    assert_eq!(check["found"], false);
}

#[test]
fn delete_draft_then_recreate_conflicts() {
    let dir = TempDir::new().unwrap();
    init_platform(&dir);
    create(&dir, "user_1", "jane@springfield.edu");
    onboard(&dir)
        .args(["application", "delete", "user_1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted application 'user_1'"));
    onboard(&dir)
        .args([
            "application", "create", "user_1", "--email", "jane@springfield.edu", "--name",
            "Springfield College", "--type", "college", "--size", "medium",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be recreated"));
}

// ---------------------------------------------------------------------------
// onboard admin / registry / metrics
// ---------------------------------------------------------------------------

#[test]
fn bulk_approve_reports_partial_failure() {
    let dir = TempDir::new().unwrap();
    init_platform(&dir);
    create(&dir, "a", "a@alpha.edu");
    submit(&dir, "a");
    create(&dir, "b", "b@beta.edu");
    create(&dir, "c", "c@gamma.edu");
    submit(&dir, "c");

    let result = json_output(onboard(&dir).args([
        "admin", "bulk", "--action", "approve", "--by", "admin_1", "a", "b", "c",
    ]));
    assert_eq!(result["processed"], 3);
    assert_eq!(result["successful"], 2);
    assert_eq!(result["failed"], 1);
    assert_eq!(result["errors"][0]["applicant_id"], "b");
}

#[test]
fn bulk_reject_without_reason_fails() {
    let dir = TempDir::new().unwrap();
    init_platform(&dir);
    create(&dir, "a", "a@alpha.edu");
    submit(&dir, "a");
    onboard(&dir)
        .args(["admin", "bulk", "--action", "reject", "--by", "admin_1", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("rejection reason"));
}

#[test]
fn registry_list_and_metrics() {
    let dir = TempDir::new().unwrap();
    init_platform(&dir);
    create(&dir, "a", "a@alpha.edu");
    submit(&dir, "a");
    create(&dir, "b", "b@beta.edu");

    let page = json_output(onboard(&dir).args([
        "registry",
        "list",
        "--status",
        "pending_verification",
    ]));
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["applicant_id"], "a");

    onboard(&dir)
        .args(["registry", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("INSTITUTION"))
        .stdout(predicate::str::contains("beta.edu"));

    let metrics = json_output(onboard(&dir).arg("metrics"));
    assert_eq!(metrics["total"], 2);
    assert_eq!(metrics["pending"], 1);
    assert_eq!(metrics["approval_rate"], "0.00");
}

#[test]
fn reconcile_reports_consistent_state() {
    let dir = TempDir::new().unwrap();
    init_platform(&dir);
    create(&dir, "a", "a@alpha.edu");
    onboard(&dir)
        .args(["reconcile", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("consistent"));
}
