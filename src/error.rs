use serde::Serialize;
use thiserror::Error;

use crate::manifest::AccessLevel;

/// Every failure the compiler can produce. Variants carry enough context
/// to name the offender and point back into the manifest.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("YAML parse failed for {path}: {source}")]
    YamlSyntax {
        path: String,
        #[source]
        source: serde_yaml_bw::Error,
    },
    #[error("JSON parse failed for {path}: {source}")]
    JsonSyntax {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("$ref `{reference}` in {referrer} does not exist")]
    RefNotFound { reference: String, referrer: String },
    #[error("$ref `{reference}` forms an include cycle: {}", chain.join(" -> "))]
    RefCycle {
        reference: String,
        chain: Vec<String>,
    },
    #[error("$ref `{reference}` exceeds the maximum include depth of {limit}")]
    MaxDepth { reference: String, limit: usize },
    #[error("$ref `{reference}` escapes the manifest root {root}")]
    PathTraversal { reference: String, root: String },
    #[error("manifest schema validation failed ({} violation{})", violations.len(), if violations.len() == 1 { "" } else { "s" })]
    SchemaViolation { violations: Vec<SchemaIssue> },
    #[error("component `{component}` has unknown type `{type_tag}`")]
    UnknownComponentType {
        component: String,
        type_tag: String,
        pointer: String,
    },
    #[error("`${{env:{key}}}` is not defined under environments.{environment}.defaults")]
    UnresolvedEnvVar {
        key: String,
        environment: String,
        pointer: String,
    },
    #[error("failed to merge configuration for component `{component}`: {reason}")]
    ConfigMerge {
        component: String,
        reason: String,
        pointer: String,
    },
    #[error("invalid interpolation `{token}`: {reason}")]
    InvalidInterpolation {
        token: String,
        reason: String,
        pointer: String,
    },
    #[error("`{source_component}` references `{target}` but no such component is declared")]
    DanglingRef {
        source_component: String,
        target: String,
        pointer: String,
    },
    #[error("unknown capability `{capability}`: {reason}")]
    UnknownCapability {
        capability: String,
        reason: String,
        pointer: String,
    },
    #[error("capability `{capability}` on `{component}` has no field `{field}`")]
    CapabilityFieldMissing {
        component: String,
        capability: String,
        field: String,
    },
    #[error("binding cycle detected: {}", chain.join(" -> "))]
    BindingCycle { chain: Vec<String> },
    #[error("access level `{access}` is not supported for `{capability}` (supported: {})", supported.iter().map(|a| a.as_str()).collect::<Vec<_>>().join(", "))]
    UnsupportedAccess {
        source_component: String,
        capability: String,
        access: AccessLevel,
        supported: Vec<AccessLevel>,
    },
    #[error("capability `{capability}` exposed by `{component}` does not conform to its declared shape: {}", issues.join("; "))]
    CapabilityShapeMismatch {
        component: String,
        capability: String,
        issues: Vec<String>,
    },
    #[error("compliance check failed ({} violation{})", violations.len(), if violations.len() == 1 { "" } else { "s" })]
    ComplianceViolation { violations: Vec<ComplianceIssue> },
    #[error("suppression record is invalid: {reason}")]
    GovernanceRecordInvalid { reason: String, pointer: String },
    #[error("suppression `{id}` expired on {expires_on} (synthesis date {today})")]
    SuppressionExpired {
        id: String,
        expires_on: String,
        today: String,
    },
    #[error("suppression `{id}` applies to `{component}` but no such component is declared")]
    DanglingSuppression { id: String, component: String },
    #[error("policy override on `{component}` rejected: {reason}")]
    PolicyOverrideRejected {
        component: String,
        environment: String,
        framework: String,
        reason: String,
    },
    #[error("i/o failure on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

/// A single schema-stage finding, addressable by JSON pointer.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaIssue {
    pub pointer: String,
    pub message: String,
}

/// A single Phase-B hardening finding.
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceIssue {
    pub framework: String,
    pub control: String,
    pub component: String,
    pub message: String,
    pub hint: String,
}

/// Structured form of an error for CI-mode output.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub path: String,
    pub message: String,
    pub hint: String,
}

impl CompileError {
    /// Stable machine code, independent of message wording.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::YamlSyntax { .. } => "yaml-syntax",
            CompileError::JsonSyntax { .. } => "json-syntax",
            CompileError::RefNotFound { .. } => "ref-not-found",
            CompileError::RefCycle { .. } => "ref-cycle",
            CompileError::MaxDepth { .. } => "ref-max-depth",
            CompileError::PathTraversal { .. } => "path-traversal",
            CompileError::SchemaViolation { .. } => "schema-violation",
            CompileError::UnknownComponentType { .. } => "unknown-component-type",
            CompileError::UnresolvedEnvVar { .. } => "unresolved-env-var",
            CompileError::ConfigMerge { .. } => "config-merge",
            CompileError::InvalidInterpolation { .. } => "invalid-interpolation",
            CompileError::DanglingRef { .. } => "dangling-ref",
            CompileError::UnknownCapability { .. } => "unknown-capability",
            CompileError::CapabilityFieldMissing { .. } => "capability-field-missing",
            CompileError::BindingCycle { .. } => "binding-cycle",
            CompileError::UnsupportedAccess { .. } => "unsupported-access",
            CompileError::CapabilityShapeMismatch { .. } => "capability-shape-mismatch",
            CompileError::ComplianceViolation { .. } => "compliance-violation",
            CompileError::GovernanceRecordInvalid { .. } => "governance-record-invalid",
            CompileError::SuppressionExpired { .. } => "suppression-expired",
            CompileError::DanglingSuppression { .. } => "dangling-suppression",
            CompileError::PolicyOverrideRejected { .. } => "policy-override-rejected",
            CompileError::Io { .. } => "io-error",
            CompileError::Internal(_) => "internal-error",
        }
    }

    /// Process exit code: 2 for user-configuration errors, 1 for runtime.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Io { .. } | CompileError::Internal(_) => 1,
            _ => 2,
        }
    }

    /// JSON pointer into the manifest, where one applies.
    pub fn pointer(&self) -> Option<&str> {
        match self {
            CompileError::UnknownComponentType { pointer, .. }
            | CompileError::UnresolvedEnvVar { pointer, .. }
            | CompileError::ConfigMerge { pointer, .. }
            | CompileError::InvalidInterpolation { pointer, .. }
            | CompileError::DanglingRef { pointer, .. }
            | CompileError::UnknownCapability { pointer, .. }
            | CompileError::GovernanceRecordInvalid { pointer, .. } => Some(pointer),
            _ => None,
        }
    }

    /// Remediation hint shown alongside the message.
    pub fn hint(&self) -> String {
        match self {
            CompileError::YamlSyntax { .. } | CompileError::JsonSyntax { .. } => {
                "fix the syntax error at the reported location".into()
            }
            CompileError::RefNotFound { reference, .. } => {
                format!("create `{reference}` or correct the $ref path")
            }
            CompileError::RefCycle { .. } => {
                "break the include cycle by removing one of the $ref entries".into()
            }
            CompileError::MaxDepth { limit, .. } => {
                format!("flatten the include chain to at most {limit} levels")
            }
            CompileError::PathTraversal { .. } => {
                "use a relative path that stays inside the manifest directory".into()
            }
            CompileError::SchemaViolation { .. } => {
                "align the manifest with the component schemas (see violations)".into()
            }
            CompileError::UnknownComponentType { type_tag, .. } => {
                format!("`{type_tag}` is not a registered component type; check for a typo")
            }
            CompileError::UnresolvedEnvVar { key, environment, .. } => {
                format!("add `{key}` under environments.{environment}.defaults")
            }
            CompileError::ConfigMerge { .. } => {
                "check that override layers use compatible value types".into()
            }
            CompileError::InvalidInterpolation { .. } => {
                "interpolations must be ${env:key}, ${envIs:value} or ${ref:component.capability.field}"
                    .into()
            }
            CompileError::DanglingRef { target, .. } => {
                format!("declare a component named `{target}` or fix the reference")
            }
            CompileError::UnknownCapability { .. } => {
                "capability keys follow `<category>:<type>`, e.g. db:postgres".into()
            }
            CompileError::CapabilityFieldMissing {
                capability, field, ..
            } => format!("`{capability}` does not expose `{field}`; check the capability contract"),
            CompileError::BindingCycle { .. } => {
                "remove one binding from the cycle, or turn it into a read-only ${ref:...}".into()
            }
            CompileError::UnsupportedAccess { supported, .. } => format!(
                "use one of: {}",
                supported
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            CompileError::CapabilityShapeMismatch { .. } => {
                "the component must expose every required capability field with the declared type"
                    .into()
            }
            CompileError::ComplianceViolation { .. } => {
                "adjust the offending configuration or add a governed suppression".into()
            }
            CompileError::GovernanceRecordInvalid { .. } => {
                "suppressions require id, justification, owner, expiresOn and appliesTo".into()
            }
            CompileError::SuppressionExpired { id, .. } => {
                format!("renew or remove the expired suppression `{id}`")
            }
            CompileError::DanglingSuppression { component, .. } => {
                format!("point appliesTo at an existing component (no `{component}` declared)")
            }
            CompileError::PolicyOverrideRejected { .. } => {
                "production policy overrides under fedramp require an allowlisted justification"
                    .into()
            }
            CompileError::Io { .. } => "check file permissions and paths".into(),
            CompileError::Internal(_) => "this is a bug in svc; please report it".into(),
        }
    }

    /// Expand into CI-mode diagnostics. Batched variants (schema,
    /// compliance) yield one diagnostic per finding.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            CompileError::SchemaViolation { violations } => violations
                .iter()
                .map(|issue| Diagnostic {
                    code: self.code().to_string(),
                    path: issue.pointer.clone(),
                    message: issue.message.clone(),
                    hint: self.hint(),
                })
                .collect(),
            CompileError::ComplianceViolation { violations } => violations
                .iter()
                .map(|issue| Diagnostic {
                    code: self.code().to_string(),
                    path: format!("/components/{}", issue.component),
                    message: format!("[{}/{}] {}", issue.framework, issue.control, issue.message),
                    hint: issue.hint.clone(),
                })
                .collect(),
            other => vec![Diagnostic {
                code: other.code().to_string(),
                path: other.pointer().unwrap_or_default().to_string(),
                message: other.to_string(),
                hint: other.hint(),
            }],
        }
    }
}

impl From<std::io::Error> for CompileError {
    fn from(source: std::io::Error) -> Self {
        CompileError::Io {
            path: String::new(),
            source,
        }
    }
}

pub fn io_error(path: impl Into<String>, source: std::io::Error) -> CompileError {
    CompileError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_and_kebab_case() {
        let err = CompileError::DanglingRef {
            source_component: "user-api".into(),
            target: "orders-db".into(),
            pointer: "/components/0/binds/0/to".into(),
        };
        assert_eq!(err.code(), "dangling-ref");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.pointer(), Some("/components/0/binds/0/to"));
    }

    #[test]
    fn io_errors_map_to_runtime_exit_code() {
        let err = io_error(
            "service.yml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn schema_violations_expand_per_finding() {
        let err = CompileError::SchemaViolation {
            violations: vec![
                SchemaIssue {
                    pointer: "/components/0/config/port".into(),
                    message: "expected integer".into(),
                },
                SchemaIssue {
                    pointer: "/service".into(),
                    message: "does not match pattern".into(),
                },
            ],
        };
        let diags = err.diagnostics();
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.code == "schema-violation"));
    }
}
