use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::binder::{AccessGrant, NetworkRequirement, PostBindConstraint};
use crate::component::ResourceDeclaration;
use crate::error::CompileError;
use crate::hardening::HardeningAction;
use crate::manifest::AccessLevel;

/// The canonical, fully-resolved plan. This is the contract between the
/// compiler core and any deployment backend: given identical inputs the
/// serialized form is byte-identical.
///
/// Ordering discipline: `resolvedComponents` is an insertion-ordered map
/// carrying manifest declaration order; every other mapping (including
/// arbitrary `Value` configs) renders key-sorted because `serde_json`'s
/// default map is BTree-backed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanIr {
    pub service: String,
    pub environment: String,
    pub compliance_framework: String,
    pub resolved_components: IndexMap<String, ResolvedComponentIr>,
    pub bindings: Vec<ResolvedBinding>,
    pub warnings: Vec<String>,
    pub hardening_actions: Vec<HardeningAction>,
    pub suppression_audit: Vec<SuppressionAuditEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedComponentIr {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub resolved_config: Value,
    /// Capability key -> exposed data, key-sorted.
    pub capabilities: BTreeMap<String, Value>,
    pub bindings: Vec<BindingSummary>,
    pub source_layers: Vec<&'static str>,
    pub resources: Vec<ResourceDeclaration>,
}

/// Outgoing edge summary embedded in the source component's entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingSummary {
    pub to: String,
    pub capability: String,
    pub access: AccessLevel,
}

/// A fully-wired binding edge.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBinding {
    pub source: String,
    pub target: String,
    pub capability: String,
    pub access: AccessLevel,
    pub env_vars: BTreeMap<String, String>,
    pub grants: Vec<AccessGrant>,
    pub network: Vec<NetworkRequirement>,
    pub constraints: Vec<PostBindConstraint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuppressionAuditEntry {
    pub kind: String,
    pub id: String,
    pub component: Option<String>,
    pub justification: String,
    pub owner: Option<String>,
    pub expires_on: Option<String>,
}

impl PlanIr {
    /// Pretty rendering for humans and `--out` files.
    pub fn to_pretty_json(&self) -> Result<String, CompileError> {
        serde_json::to_string_pretty(self).map_err(|err| CompileError::Internal(err.to_string()))
    }

    /// Compact canonical rendering used for digests and diffing.
    pub fn to_canonical_json(&self) -> Result<String, CompileError> {
        serde_json::to_string(self).map_err(|err| CompileError::Internal(err.to_string()))
    }

    /// Content digest of the canonical form.
    pub fn digest(&self) -> Result<String, CompileError> {
        let canonical = self.to_canonical_json()?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(format!("sha256:{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> PlanIr {
        let mut components = IndexMap::new();
        components.insert(
            "zulu-db".to_string(),
            ResolvedComponentIr {
                type_tag: "rds-postgres".into(),
                resolved_config: json!({"zeta": 1, "alpha": 2}),
                capabilities: BTreeMap::new(),
                bindings: Vec::new(),
                source_layers: vec!["fallbacks", "platform"],
                resources: Vec::new(),
            },
        );
        components.insert(
            "alpha-api".to_string(),
            ResolvedComponentIr {
                type_tag: "lambda-api".into(),
                resolved_config: json!({}),
                capabilities: BTreeMap::new(),
                bindings: Vec::new(),
                source_layers: vec!["fallbacks"],
                resources: Vec::new(),
            },
        );
        PlanIr {
            service: "checkout".into(),
            environment: "qa".into(),
            compliance_framework: "commercial".into(),
            resolved_components: components,
            bindings: Vec::new(),
            warnings: Vec::new(),
            hardening_actions: Vec::new(),
            suppression_audit: Vec::new(),
        }
    }

    #[test]
    fn component_order_is_declaration_order_not_alphabetical() {
        let rendered = sample().to_pretty_json().unwrap();
        let zulu = rendered.find("zulu-db").unwrap();
        let alpha = rendered.find("alpha-api").unwrap();
        assert!(zulu < alpha, "declaration order must survive serialization");
    }

    #[test]
    fn inner_config_keys_are_sorted() {
        let rendered = sample().to_canonical_json().unwrap();
        let alpha = rendered.find("\"alpha\":2").unwrap();
        let zeta = rendered.find("\"zeta\":1").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn digest_is_stable_across_renderings() {
        let first = sample().digest().unwrap();
        let second = sample().digest().unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("sha256:"));
    }
}
