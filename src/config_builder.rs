use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::component::ComponentRegistry;
use crate::error::CompileError;
use crate::hardening::PlatformDefaults;
use crate::interpolate::{RefToken, interpolate};
use crate::ir::SuppressionAuditEntry;
use crate::manifest::{ComponentSpec, EnvironmentSpec, Manifest};
use crate::merge::merge_layers;
use crate::schema::SchemaRegistry;

/// Layer names recorded in the IR, lowest priority first.
const LAYER_NAMES: [&str; 6] = [
    "fallbacks",
    "platform",
    "environment",
    "config",
    "overrides",
    "policy",
];

/// Outcome of hydrating one component.
#[derive(Debug)]
pub struct HydratedConfig {
    pub value: Value,
    pub source_layers: Vec<&'static str>,
    pub refs: Vec<RefToken>,
    pub policy_audit: Option<SuppressionAuditEntry>,
}

/// Applies the five-layer precedence chain for every component of one
/// compilation. Owns no mutable state; all registries are shared
/// read-only.
pub struct ConfigBuilder<'a> {
    pub components: &'a ComponentRegistry,
    pub schemas: &'a SchemaRegistry,
    pub platform: &'a PlatformDefaults,
    pub manifest: &'a Manifest,
    pub environment_name: &'a str,
    pub environment: &'a EnvironmentSpec,
}

impl ConfigBuilder<'_> {
    pub fn build(&self, spec: &ComponentSpec) -> Result<HydratedConfig, CompileError> {
        let component_type = self.components.get(&spec.type_tag).ok_or_else(|| {
            CompileError::Internal(format!(
                "type `{}` survived schema validation but is not registered",
                spec.type_tag
            ))
        })?;

        let fallbacks = component_type.fallbacks();
        assert_security_floor(component_type.type_tag(), &fallbacks)?;

        // Environment defaults may address a component by name or, more
        // broadly, by type; the name-specific block wins.
        let environment_layer = self
            .environment
            .defaults
            .get(spec.name.as_str())
            .or_else(|| self.environment.defaults.get(&spec.type_tag))
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or(Value::Object(serde_json::Map::new()));

        let platform_layer = self.platform.for_type(&spec.type_tag);
        let (policy_layer, policy_audit) = self.accept_policy_layer(spec)?;

        let layers: [&Value; 6] = [
            &fallbacks,
            &platform_layer,
            &environment_layer,
            &spec.config,
            &spec.overrides,
            &policy_layer,
        ];
        let source_layers: Vec<&'static str> = layers
            .iter()
            .zip(LAYER_NAMES)
            .filter(|(layer, _)| layer.as_object().is_some_and(|map| !map.is_empty()))
            .map(|(_, name)| name)
            .collect();

        let merged = merge_layers(&layers, component_type.merge_append_paths());
        debug!(component = %spec.name, layers = ?source_layers, "merged config layers");

        let mut refs = Vec::new();
        let pointer = format!("/components/{}/config", spec.name);
        let interpolated = interpolate(
            &merged,
            self.environment_name,
            self.environment,
            &pointer,
            &mut refs,
        )?;

        self.schemas
            .validate_config(&spec.type_tag, spec.name.as_str(), &interpolated)?;

        Ok(HydratedConfig {
            value: interpolated,
            source_layers,
            refs,
            policy_audit,
        })
    }

    /// Layer-1 (highest priority) acceptance. Production environments
    /// under a fedramp framework only honor overrides whose justification
    /// is on the governance allowlist; every accepted override is
    /// recorded for the audit trail.
    fn accept_policy_layer(
        &self,
        spec: &ComponentSpec,
    ) -> Result<(Value, Option<SuppressionAuditEntry>), CompileError> {
        let empty = Value::Object(serde_json::Map::new());
        let Some(policy) = &spec.policy else {
            return Ok((empty, None));
        };
        if policy.overrides.as_object().is_none_or(|map| map.is_empty()) {
            return Ok((empty, None));
        }

        let production = self.environment.is_production(self.environment_name);
        if production && self.manifest.compliance_framework.is_fedramp() {
            let allowed = self
                .platform
                .allowed_justifications
                .iter()
                .any(|entry| entry == &policy.justification);
            if !allowed {
                return Err(CompileError::PolicyOverrideRejected {
                    component: spec.name.to_string(),
                    environment: self.environment_name.to_string(),
                    framework: self.manifest.compliance_framework.to_string(),
                    reason: format!(
                        "justification `{}` is not on the governance allowlist",
                        policy.justification
                    ),
                });
            }
        }

        let audit = SuppressionAuditEntry {
            kind: "policy-override".into(),
            id: format!("policy-override/{}", spec.name),
            component: Some(spec.name.to_string()),
            justification: policy.justification.clone(),
            owner: None,
            expires_on: None,
        };
        Ok((policy.overrides.clone(), Some(audit)))
    }
}

static SCHEME_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9+.-]*://").expect("url pattern compiles"));
static IPV4_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(\.\d{1,3}){3}(/\d{1,2})?$").expect("ip pattern compiles"));
static PUBLIC_HOSTNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9-]+(\.[a-z0-9-]+)*\.(com|net|org|io|dev|gov|cloud)$")
        .expect("hostname pattern compiles")
});

/// Instance classes a fallback table may carry: the smallest of each
/// service class, nothing bigger.
const MINIMAL_INSTANCE_CLASSES: &[&str] = &["db.t3.micro", "cache.t3.micro"];

const PUBLIC_FLAG_KEYS: &[&str] = &["publicAccess", "publiclyAccessible", "publicRead"];

/// Static safety check over a hardcoded fallback table. Fallbacks ship in
/// the binary for every environment, so anything environment-varying or
/// security-sensitive in them is a defect in the component type itself.
pub fn assert_security_floor(type_tag: &str, fallbacks: &Value) -> Result<(), CompileError> {
    let mut findings = Vec::new();
    walk_floor(fallbacks, "", &mut findings);
    if findings.is_empty() {
        Ok(())
    } else {
        Err(CompileError::Internal(format!(
            "fallbacks for `{type_tag}` violate the security floor: {}",
            findings.join("; ")
        )))
    }
}

fn walk_floor(value: &Value, path: &str, findings: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };

                if PUBLIC_FLAG_KEYS.contains(&key.as_str()) && entry.as_bool() == Some(true) {
                    findings.push(format!("`{child}` enables public access"));
                }
                if key == "allowCredentials" && entry.as_bool() == Some(true) {
                    findings.push(format!("`{child}` must not default to true"));
                }
                if key == "allowOrigins"
                    && entry.as_array().is_some_and(|list| !list.is_empty())
                {
                    findings.push(format!("`{child}` must default to an empty list"));
                }
                if matches!(key.as_str(), "allowMethods" | "allowHeaders")
                    && entry
                        .as_array()
                        .is_some_and(|list| list.iter().any(|v| v.as_str() == Some("*")))
                {
                    findings.push(format!("`{child}` must not default to a wildcard"));
                }
                if matches!(key.as_str(), "class" | "nodeType")
                    && entry
                        .as_str()
                        .is_some_and(|class| !MINIMAL_INSTANCE_CLASSES.contains(&class))
                {
                    findings.push(format!(
                        "`{child}` must be the minimum instance class for its service class"
                    ));
                }
                walk_floor(entry, &child, findings);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                walk_floor(item, &format!("{path}[{index}]"), findings);
            }
        }
        Value::String(text) => {
            if SCHEME_URL.is_match(text) {
                findings.push(format!("`{path}` hardcodes a URL"));
            } else if IPV4_LITERAL.is_match(text) {
                findings.push(format!("`{path}` hardcodes an IP literal"));
            } else if PUBLIC_HOSTNAME.is_match(text) {
                findings.push(format!("`{path}` hardcodes a domain name"));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_builtin_fallback_table_passes_the_floor() {
        let registry = ComponentRegistry::builtin();
        for component in registry.iter() {
            assert_security_floor(component.type_tag(), &component.fallbacks())
                .unwrap_or_else(|err| panic!("{err}"));
        }
    }

    #[test]
    fn floor_rejects_wildcard_cors_and_credentials() {
        let bad = json!({
            "cors": {
                "allowOrigins": ["https://app.example.com"],
                "allowMethods": ["*"],
                "allowCredentials": true
            }
        });
        let err = assert_security_floor("lambda-api", &bad).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("allowOrigins"));
        assert!(message.contains("allowMethods"));
        assert!(message.contains("allowCredentials"));
    }

    #[test]
    fn floor_rejects_hardcoded_endpoints() {
        for bad in [
            json!({"endpoint": "https://api.vendor.com/v1"}),
            json!({"host": "203.0.113.10"}),
            json!({"host": "db.vendor.com"}),
        ] {
            assert!(assert_security_floor("lambda-api", &bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn floor_allows_instance_classes_that_look_like_hostnames() {
        let ok = json!({
            "instance": {"class": "db.t3.micro"},
            "runtime": "nodejs20.x",
            "handler": "index.handler"
        });
        assert_security_floor("rds-postgres", &ok).unwrap();
    }

    #[test]
    fn floor_rejects_oversized_instance_classes() {
        let bad = json!({"instance": {"class": "db.r5.4xlarge"}});
        assert!(assert_security_floor("rds-postgres", &bad).is_err());
    }
}
