use serde_json::json;

mod support;

use support::{Workspace, plan_json, svc};

/// Layered manifest used across the precedence tests: platform defaults
/// for fedramp-moderate pin `instance.class` to db.r5.large, the qa
/// environment overrides it through interpolation, and a second replica
/// pins an explicit class.
const LAYERED: &str = concat!(
    "service: checkout\n",
    "owner: team-payments\n",
    "complianceFramework: fedramp-moderate\n",
    "environments:\n",
    "  qa:\n",
    "    defaults:\n",
    "      dbInstanceClass: db.r5.xlarge\n",
    "components:\n",
    "  - name: primary-db\n",
    "    type: rds-postgres\n",
    "    overrides:\n",
    "      instance:\n",
    "        class: ${env:dbInstanceClass}\n",
    "  - name: reporting-replica-db\n",
    "    type: rds-postgres\n",
    "    overrides:\n",
    "      instance:\n",
    "        class: db.r5.4xlarge\n",
);

#[test]
fn environment_interpolation_beats_platform_defaults() {
    let ws = Workspace::new("svc-precedence").unwrap();
    ws.manifest(LAYERED).unwrap();
    let plan = plan_json(&ws, "qa");
    assert_eq!(
        plan["resolvedComponents"]["primary-db"]["resolvedConfig"]["instance"]["class"],
        "db.r5.xlarge"
    );
}

#[test]
fn direct_component_override_wins() {
    let ws = Workspace::new("svc-precedence-direct").unwrap();
    ws.manifest(LAYERED).unwrap();
    let plan = plan_json(&ws, "qa");
    assert_eq!(
        plan["resolvedComponents"]["reporting-replica-db"]["resolvedConfig"]["instance"]["class"],
        "db.r5.4xlarge"
    );
}

#[test]
fn platform_layer_applies_where_nothing_overrides() {
    let ws = Workspace::new("svc-precedence-platform").unwrap();
    ws.manifest(concat!(
        "service: checkout\n",
        "complianceFramework: fedramp-moderate\n",
        "environments:\n",
        "  qa:\n",
        "    defaults: {}\n",
        "components:\n",
        "  - name: primary-db\n",
        "    type: rds-postgres\n",
    ))
    .unwrap();
    let plan = plan_json(&ws, "qa");
    let db = &plan["resolvedComponents"]["primary-db"];
    assert_eq!(db["resolvedConfig"]["instance"]["class"], "db.r5.large");
    // Fallback survives beneath the platform layer.
    assert_eq!(db["resolvedConfig"]["port"], 5432);
    assert_eq!(db["sourceLayers"], json!(["fallbacks", "platform"]));
}

#[test]
fn policy_overrides_sit_above_component_overrides() {
    let ws = Workspace::new("svc-precedence-policy").unwrap();
    ws.manifest(concat!(
        "service: checkout\n",
        "environments:\n",
        "  qa:\n",
        "    defaults: {}\n",
        "components:\n",
        "  - name: primary-db\n",
        "    type: rds-postgres\n",
        "    overrides:\n",
        "      storageGb: 100\n",
        "    policy:\n",
        "      justification: load test sizing\n",
        "      overrides:\n",
        "        storageGb: 500\n",
    ))
    .unwrap();
    let plan = plan_json(&ws, "qa");
    let db = &plan["resolvedComponents"]["primary-db"];
    assert_eq!(db["resolvedConfig"]["storageGb"], 500);
    assert_eq!(
        db["sourceLayers"],
        json!(["fallbacks", "platform", "overrides", "policy"])
    );
    // Accepted escape hatches land in the audit trail.
    assert_eq!(plan["suppressionAudit"][0]["kind"], "policy-override");
    assert_eq!(
        plan["suppressionAudit"][0]["component"],
        "primary-db"
    );
}

#[test]
fn null_override_deletes_the_key() {
    let ws = Workspace::new("svc-precedence-null").unwrap();
    ws.manifest(concat!(
        "service: checkout\n",
        "environments:\n",
        "  qa:\n",
        "    defaults: {}\n",
        "components:\n",
        "  - name: primary-db\n",
        "    type: rds-postgres\n",
        "    overrides:\n",
        "      backup: null\n",
    ))
    .unwrap();
    let plan = plan_json(&ws, "qa");
    // The commercial platform layer sets backup.retentionDays: 7; the
    // null override removes the whole mapping.
    assert!(
        plan["resolvedComponents"]["primary-db"]["resolvedConfig"]
            .get("backup")
            .is_none()
    );
}

#[test]
fn unresolved_env_lookup_exits_two() {
    let ws = Workspace::new("svc-precedence-unresolved").unwrap();
    ws.manifest(concat!(
        "service: checkout\n",
        "environments:\n",
        "  qa:\n",
        "    defaults: {}\n",
        "components:\n",
        "  - name: primary-db\n",
        "    type: rds-postgres\n",
        "    overrides:\n",
        "      instance:\n",
        "        class: ${env:dbInstanceClass}\n",
    ))
    .unwrap();
    svc(&ws)
        .args(["plan", "--env", "qa"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicates::str::contains("unresolved-env-var"))
        .stderr(predicates::str::contains("dbInstanceClass"));
}

#[test]
fn unknown_environment_exits_two_naming_it() {
    let ws = Workspace::new("svc-precedence-env").unwrap();
    ws.manifest(concat!(
        "service: checkout\n",
        "environments:\n",
        "  qa:\n",
        "    defaults: {}\n",
        "components: []\n",
    ))
    .unwrap();
    svc(&ws)
        .args(["plan", "--env", "staging"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicates::str::contains("staging"));
}

#[test]
fn resolved_config_must_satisfy_the_type_schema() {
    let ws = Workspace::new("svc-precedence-schema").unwrap();
    ws.manifest(concat!(
        "service: checkout\n",
        "environments:\n",
        "  qa:\n",
        "    defaults:\n",
        "      dbPort: not-a-port\n",
        "components:\n",
        "  - name: primary-db\n",
        "    type: rds-postgres\n",
        "    overrides:\n",
        "      port: ${env:dbPort}\n",
    ))
    .unwrap();
    svc(&ws)
        .args(["plan", "--env", "qa"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicates::str::contains("schema-violation"));
}
