use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

mod support;

use support::{Workspace, svc};

const VALID: &str = concat!(
    "service: checkout\n",
    "owner: team-payments\n",
    "environments:\n",
    "  qa:\n",
    "    defaults: {}\n",
    "components:\n",
    "  - name: primary-db\n",
    "    type: rds-postgres\n",
);

#[test]
fn validate_accepts_a_well_formed_manifest() {
    let ws = Workspace::new("svc-validate").unwrap();
    ws.manifest(VALID).unwrap();
    svc(&ws)
        .args(["validate"])
        .assert()
        .success()
        .stdout(contains("checkout"))
        .stdout(contains("1 component"));
}

#[test]
fn validate_honors_explicit_file_flag() {
    let ws = Workspace::new("svc-validate-file").unwrap();
    let path = ws.write("deploy/custom.yml", VALID).unwrap();
    svc(&ws)
        .args(["validate", "--file"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn missing_manifest_reports_the_discovery_message() {
    let ws = Workspace::new("svc-validate-missing").unwrap();
    svc(&ws)
        .args(["validate"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains(
            "No service.yml found in this directory or any parent directories.",
        ));
}

#[test]
fn manifest_is_discovered_from_a_subdirectory() {
    let ws = Workspace::new("svc-validate-walkup").unwrap();
    ws.manifest(VALID).unwrap();
    ws.write("deploy/nested/.keep", "").unwrap();
    let mut cmd = cargo_bin_cmd!("svc");
    cmd.current_dir(ws.path("deploy/nested"));
    cmd.env("NO_COLOR", "1");
    cmd.args(["validate"]).assert().success();
}

#[test]
fn unknown_component_type_exits_two() {
    let ws = Workspace::new("svc-validate-unknown").unwrap();
    ws.manifest(concat!(
        "service: checkout\n",
        "components:\n",
        "  - name: vm\n",
        "    type: ec2-instance\n",
    ))
    .unwrap();
    svc(&ws)
        .args(["validate"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("unknown-component-type"))
        .stderr(contains("ec2-instance"));
}

#[test]
fn schema_violations_exit_two_with_pointers() {
    let ws = Workspace::new("svc-validate-schema").unwrap();
    ws.manifest(concat!(
        "service: Checkout\n",
        "components:\n",
        "  - name: db\n",
    ))
    .unwrap();
    svc(&ws)
        .args(["validate"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("schema-violation"));
}

#[test]
fn yaml_syntax_errors_exit_two() {
    let ws = Workspace::new("svc-validate-yaml").unwrap();
    ws.manifest("service: [unclosed\n").unwrap();
    svc(&ws)
        .args(["validate"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("yaml-syntax"));
}

#[test]
fn ci_mode_emits_structured_error_lines() {
    let ws = Workspace::new("svc-validate-ci").unwrap();
    ws.manifest(concat!(
        "service: checkout\n",
        "components:\n",
        "  - name: vm\n",
        "    type: ec2-instance\n",
    ))
    .unwrap();
    svc(&ws)
        .args(["validate", "--ci"])
        .assert()
        .failure()
        .code(2)
        .stdout(contains("\"code\":\"unknown-component-type\""))
        .stdout(contains("\"hint\""))
        .stdout(contains("\"path\""));
}
