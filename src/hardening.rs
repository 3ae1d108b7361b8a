use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{CompileError, ComplianceIssue};
use crate::ir::ResolvedComponentIr;
use crate::manifest::ComplianceFramework;

/// Phase A: the Layer-4 platform defaults selected by the manifest's
/// compliance framework. Only the declared framework's file is ever read.
#[derive(Debug)]
pub struct PlatformDefaults {
    pub framework: ComplianceFramework,
    pub defaults: BTreeMap<String, Value>,
    pub allowed_justifications: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PlatformFile {
    #[serde(default)]
    defaults: BTreeMap<String, Value>,
    #[serde(default)]
    policy: PolicySection,
}

#[derive(Debug, Default, Deserialize)]
struct PolicySection {
    #[serde(default, rename = "allowedJustifications")]
    allowed_justifications: Vec<String>,
}

/// Built-in framework files, compiled into the binary so a compilation
/// never depends on an external platform checkout.
fn embedded(framework: ComplianceFramework) -> &'static str {
    match framework {
        ComplianceFramework::Commercial => include_str!("../assets/config/commercial.yml"),
        ComplianceFramework::FedrampModerate => {
            include_str!("../assets/config/fedramp-moderate.yml")
        }
        ComplianceFramework::FedrampHigh => include_str!("../assets/config/fedramp-high.yml"),
    }
}

impl PlatformDefaults {
    /// Load the defaults for exactly one framework. A `config/<framework>.yml`
    /// next to the manifest overrides the embedded copy.
    pub fn load(
        framework: ComplianceFramework,
        manifest_root: Option<&Path>,
    ) -> Result<Self, CompileError> {
        let file_name = format!("{}.yml", framework.as_str());
        let on_disk = manifest_root.map(|root| root.join("config").join(&file_name));

        let raw: String = match on_disk {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "loading platform defaults from disk");
                std::fs::read_to_string(&path)
                    .map_err(|source| crate::error::io_error(path.display().to_string(), source))?
            }
            _ => embedded(framework).to_string(),
        };

        let parsed: PlatformFile =
            serde_yaml_bw::from_str(&raw).map_err(|source| CompileError::YamlSyntax {
                path: file_name,
                source,
            })?;

        Ok(Self {
            framework,
            defaults: parsed.defaults,
            allowed_justifications: parsed.policy.allowed_justifications,
        })
    }

    pub fn for_type(&self, type_tag: &str) -> Value {
        self.defaults
            .get(type_tag)
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
    }
}

/// One Phase-B auto-remediation recorded in the plan.
#[derive(Debug, Clone, Serialize)]
pub struct HardeningAction {
    pub component: String,
    pub control: String,
    pub rule: String,
    pub detail: String,
}

const STORAGE_TYPES: &[&str] = &["rds-postgres", "s3-bucket", "redis-cache", "sqs-queue"];

/// Phase B: assert framework invariants over the resolved plan. Keys the
/// user layers left unset are remediated in place and recorded; keys set
/// to a non-compliant value are violations.
pub fn enforce(
    components: &mut [(String, ResolvedComponentIr)],
    framework: ComplianceFramework,
    production: bool,
) -> Result<Vec<HardeningAction>, CompileError> {
    if !framework.is_fedramp() {
        return Ok(Vec::new());
    }

    let mut actions = Vec::new();
    let mut violations = Vec::new();

    for (name, component) in components.iter_mut() {
        let type_tag = component.type_tag.clone();
        let config = &mut component.resolved_config;

        if STORAGE_TYPES.contains(&type_tag.as_str()) {
            enforce_flag(
                config,
                "/encryption/atRest",
                name,
                framework,
                "sc-28",
                "encryption-at-rest",
                "storage must be encrypted at rest",
                &mut actions,
                &mut violations,
            );
        }

        if type_tag == "vpc-network" {
            enforce_flag(
                config,
                "/flowLogs/enabled",
                name,
                framework,
                "au-2",
                "flow-logs",
                "network flow logs must be enabled",
                &mut actions,
                &mut violations,
            );
        } else {
            enforce_flag(
                config,
                "/logging/audit",
                name,
                framework,
                "au-2",
                "audit-logging",
                "audit logging must be enabled",
                &mut actions,
                &mut violations,
            );
        }

        if type_tag == "rds-postgres" {
            let minimum = framework
                .min_backup_retention_days()
                .unwrap_or_default();
            match config.pointer("/backup/retentionDays").and_then(Value::as_u64) {
                None => {
                    set_config(config, "backup", "retentionDays", json!(minimum));
                    actions.push(HardeningAction {
                        component: name.clone(),
                        control: "cp-9".into(),
                        rule: "backup-retention".into(),
                        detail: format!("backup retention raised to the {minimum}-day minimum"),
                    });
                }
                Some(days) if days < minimum => violations.push(ComplianceIssue {
                    framework: framework.as_str().into(),
                    control: "cp-9".into(),
                    component: name.clone(),
                    message: format!(
                        "backup retention of {days}d is below the {minimum}d minimum"
                    ),
                    hint: format!("set backup.retentionDays to at least {minimum}"),
                }),
                Some(_) => {}
            }

            if production {
                enforce_flag(
                    config,
                    "/multiAz",
                    name,
                    framework,
                    "cp-10",
                    "multi-az",
                    "production databases must be multi-AZ",
                    &mut actions,
                    &mut violations,
                );
            }
        }

        if type_tag == "lambda-api" {
            match config.pointer("/tls/minimumVersion").and_then(Value::as_str) {
                None => {
                    set_config(config, "tls", "minimumVersion", json!("1.2"));
                    actions.push(HardeningAction {
                        component: name.clone(),
                        control: "sc-8".into(),
                        rule: "tls-minimum-version".into(),
                        detail: "minimum TLS version pinned to 1.2".into(),
                    });
                }
                Some(version) if matches!(version, "1.0" | "1.1") => {
                    violations.push(ComplianceIssue {
                        framework: framework.as_str().into(),
                        control: "sc-8".into(),
                        component: name.clone(),
                        message: format!("TLS {version} is below the 1.2 floor"),
                        hint: "set tls.minimumVersion to 1.2 or 1.3".into(),
                    });
                }
                Some(_) => {}
            }

            let origins = config
                .pointer("/cors/allowOrigins")
                .and_then(Value::as_array);
            if origins.is_some_and(|list| list.iter().any(|o| o.as_str() == Some("*"))) {
                violations.push(ComplianceIssue {
                    framework: framework.as_str().into(),
                    control: "ac-4".into(),
                    component: name.clone(),
                    message: "wildcard CORS origin is not permitted".into(),
                    hint: "enumerate the exact origins the API serves".into(),
                });
            }
        }
    }

    if violations.is_empty() {
        Ok(actions)
    } else {
        Err(CompileError::ComplianceViolation { violations })
    }
}

#[allow(clippy::too_many_arguments)]
fn enforce_flag(
    config: &mut Value,
    pointer: &str,
    component: &str,
    framework: ComplianceFramework,
    control: &str,
    rule: &str,
    requirement: &str,
    actions: &mut Vec<HardeningAction>,
    violations: &mut Vec<ComplianceIssue>,
) {
    match config.pointer(pointer).and_then(Value::as_bool) {
        Some(true) => {}
        Some(false) => violations.push(ComplianceIssue {
            framework: framework.as_str().into(),
            control: control.into(),
            component: component.into(),
            message: format!("{requirement} (explicitly disabled)"),
            hint: format!("remove the override or set {} to true", pointer.trim_start_matches('/').replace('/', ".")),
        }),
        None => {
            let mut segments = pointer.trim_start_matches('/').splitn(2, '/');
            match (segments.next(), segments.next()) {
                (Some(section), Some(key)) => set_config(config, section, key, json!(true)),
                (Some(key), None) => {
                    if let Some(map) = config.as_object_mut() {
                        map.insert(key.to_string(), json!(true));
                    }
                }
                _ => return,
            }
            actions.push(HardeningAction {
                component: component.into(),
                control: control.into(),
                rule: rule.into(),
                detail: format!("{requirement}; enabled automatically"),
            });
        }
    }
}

fn set_config(config: &mut Value, section: &str, key: &str, value: Value) {
    let Some(root) = config.as_object_mut() else {
        return;
    };
    let entry = root
        .entry(section.to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Some(map) = entry.as_object_mut() {
        map.insert(key.to_string(), value);
    }
}
