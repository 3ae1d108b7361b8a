use predicates::str::contains;

mod support;

use support::{Workspace, read_json, svc};

const MANIFEST: &str = concat!(
    "service: checkout\n",
    "owner: team-payments\n",
    "environments:\n",
    "  qa:\n",
    "    defaults: {}\n",
    "components:\n",
    "  - name: user-api\n",
    "    type: lambda-api\n",
    "    binds:\n",
    "      - to: customer-db\n",
    "        capability: db:postgres\n",
    "        access: readwrite\n",
    "  - name: customer-db\n",
    "    type: rds-postgres\n",
);

#[test]
fn plan_output_is_byte_identical_across_runs() {
    let ws = Workspace::new("svc-determinism").unwrap();
    ws.manifest(MANIFEST).unwrap();
    let first = svc(&ws)
        .args(["plan", "--env", "qa"])
        .output()
        .unwrap();
    let second = svc(&ws)
        .args(["plan", "--env", "qa"])
        .output()
        .unwrap();
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn plan_out_writes_the_plan_to_a_file() {
    let ws = Workspace::new("svc-plan-out").unwrap();
    ws.manifest(MANIFEST).unwrap();
    svc(&ws)
        .args(["plan", "--env", "qa", "--out", "build/plan.json"])
        .assert()
        .success()
        .stdout(contains("sha256:"));
    let plan = read_json(&ws.path("build/plan.json"));
    assert_eq!(plan["service"], "checkout");
    assert_eq!(plan["environment"], "qa");
}

#[test]
fn up_records_a_deployment_and_diff_sees_no_change() {
    let ws = Workspace::new("svc-up-diff").unwrap();
    ws.manifest(MANIFEST).unwrap();
    svc(&ws)
        .args(["up", "--env", "qa"])
        .assert()
        .success()
        .stdout(contains("recorded"));
    assert!(ws.path(".svc/deployed/qa.json").is_file());
    svc(&ws).args(["diff", "--env", "qa"]).assert().code(0);
}

#[test]
fn diff_without_a_recorded_deployment_exits_three() {
    let ws = Workspace::new("svc-diff-new").unwrap();
    ws.manifest(MANIFEST).unwrap();
    svc(&ws)
        .args(["diff", "--env", "qa"])
        .assert()
        .code(3)
        .stdout(contains("everything is new"));
}

#[test]
fn manifest_changes_flip_diff_to_exit_three() {
    let ws = Workspace::new("svc-diff-drift").unwrap();
    ws.manifest(MANIFEST).unwrap();
    svc(&ws).args(["up", "--env", "qa"]).assert().success();

    let drifted = format!("{MANIFEST}    overrides:\n      storageGb: 200\n");
    ws.manifest(&drifted).unwrap();
    svc(&ws)
        .args(["diff", "--env", "qa"])
        .assert()
        .code(3)
        .stdout(contains("differs"));
}

#[test]
fn deploy_alias_matches_up() {
    let ws = Workspace::new("svc-deploy-alias").unwrap();
    ws.manifest(MANIFEST).unwrap();
    svc(&ws).args(["deploy", "--env", "qa"]).assert().success();
    assert!(ws.path(".svc/deployed/qa.json").is_file());
}

#[test]
fn destroy_removes_the_record() {
    let ws = Workspace::new("svc-destroy").unwrap();
    ws.manifest(MANIFEST).unwrap();
    svc(&ws).args(["up", "--env", "qa"]).assert().success();
    svc(&ws)
        .args(["destroy", "--env", "qa", "--yes", "--json"])
        .assert()
        .success()
        .stdout(contains("\"destroyed\":true"));
    assert!(!ws.path(".svc/deployed/qa.json").exists());
}

#[test]
fn init_scaffolds_a_manifest_that_validates() {
    let ws = Workspace::new("svc-init").unwrap();
    svc(&ws)
        .args([
            "init",
            "--name",
            "checkout",
            "--owner",
            "team-payments",
            "--framework",
            "fedramp-moderate",
            "--pattern",
            "lambda-api-with-db",
        ])
        .assert()
        .success()
        .stdout(contains("scaffolded"));
    svc(&ws).args(["validate"]).assert().success();
    svc(&ws).args(["plan", "--env", "dev"]).assert().success();
}

#[test]
fn init_refuses_to_overwrite_an_existing_manifest() {
    let ws = Workspace::new("svc-init-exists").unwrap();
    ws.manifest(MANIFEST).unwrap();
    svc(&ws)
        .args(["init", "--name", "checkout", "--owner", "team"])
        .assert()
        .failure()
        .stderr(contains("already exists"));
}
