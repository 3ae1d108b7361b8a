use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::capability::CapabilityKey;
use crate::error::CompileError;
use crate::manifest::{AccessLevel, ComplianceFramework};

mod postgres;
mod redis;
mod rest_api;
mod s3;
mod sqs;

pub use postgres::PostgresBinder;
pub use redis::RedisBinder;
pub use rest_api::RestApiBinder;
pub use s3::S3Binder;
pub use sqs::SqsBinder;

/// Everything a strategy sees when wiring one binding edge.
pub struct BindingContext<'a> {
    pub source_component: &'a str,
    pub source_type: &'a str,
    pub target_component: &'a str,
    pub capability: &'a CapabilityKey,
    pub access: AccessLevel,
    pub capability_data: &'a Value,
    /// Caller-selected env var name -> capability field overrides.
    pub env_overrides: &'a BTreeMap<String, String>,
    pub options: &'a Value,
    pub framework: ComplianceFramework,
}

/// Least-privilege grant against the target, scoped to the requested
/// access level. Actions are abstract verbs the backend maps to the
/// provider's policy language.
#[derive(Debug, Clone, Serialize)]
pub struct AccessGrant {
    pub resource: String,
    pub access: AccessLevel,
    pub actions: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NetworkRequirement {
    #[serde(rename_all = "camelCase")]
    SharedSecurityGroup { security_group_id: String },
    #[serde(rename_all = "camelCase")]
    SubnetMembership { scope: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PostBindConstraint {
    pub rule: String,
    pub detail: String,
}

/// Declarative outcome of one bind: what to inject, grant and require.
#[derive(Debug, Default)]
pub struct BindingResult {
    pub env_vars: BTreeMap<String, String>,
    pub grants: Vec<AccessGrant>,
    pub network: Vec<NetworkRequirement>,
    pub constraints: Vec<PostBindConstraint>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompatibilityEntry {
    #[serde(rename = "sourceType")]
    pub source_type: &'static str,
    pub capability: &'static str,
    pub access: Vec<AccessLevel>,
}

pub trait BinderStrategy: Send + Sync {
    /// The capability key this strategy wires.
    fn capability(&self) -> &'static str;

    /// Source component types this strategy accepts.
    fn source_types(&self) -> &'static [&'static str];

    fn supported_access(&self) -> &'static [AccessLevel];

    fn can_handle(&self, source_type: &str, capability: &str, access: AccessLevel) -> bool {
        self.capability() == capability
            && self.source_types().contains(&source_type)
            && self.supported_access().contains(&access)
    }

    fn bind(&self, ctx: &BindingContext<'_>) -> Result<BindingResult, CompileError>;

    fn compatibility(&self) -> Vec<CompatibilityEntry> {
        self.source_types()
            .iter()
            .map(|&source_type| CompatibilityEntry {
                source_type,
                capability: self.capability(),
                access: self.supported_access().to_vec(),
            })
            .collect()
    }
}

/// Registry of binder strategies keyed `(sourceType, capabilityKey)`.
/// The nested map keeps lookup O(1); a linear scan over every strategy
/// would grow with the registry and regress synth times.
pub struct BinderMatrix {
    by_source: HashMap<&'static str, HashMap<&'static str, Arc<dyn BinderStrategy>>>,
    strategy_count: usize,
}

/// Lookup-cost diagnostic used by performance regression tests.
#[derive(Debug, Clone, Serialize)]
pub struct LookupProfile {
    /// Number of `(sourceType, capability)` pairs registered.
    pub registered_pairs: usize,
    /// Scan length a naive linear registry would pay per lookup.
    pub worst_case_scan: usize,
    /// Probes the nested-map lookup pays per lookup.
    pub probe_length: usize,
}

impl LookupProfile {
    pub fn optimization_ratio(&self) -> f64 {
        self.worst_case_scan as f64 / self.probe_length as f64
    }
}

impl BinderMatrix {
    pub fn builtin() -> Self {
        let strategies: Vec<Arc<dyn BinderStrategy>> = vec![
            Arc::new(PostgresBinder),
            Arc::new(SqsBinder),
            Arc::new(S3Binder),
            Arc::new(RedisBinder),
            Arc::new(RestApiBinder),
        ];

        let mut by_source: HashMap<&'static str, HashMap<&'static str, Arc<dyn BinderStrategy>>> =
            HashMap::new();
        let mut pairs = 0usize;
        for strategy in strategies {
            for &source_type in strategy.source_types() {
                let inner = by_source.entry(source_type).or_default();
                if inner.insert(strategy.capability(), strategy.clone()).is_some() {
                    panic!(
                        "duplicate binder for ({source_type}, {})",
                        strategy.capability()
                    );
                }
                pairs += 1;
            }
        }
        Self {
            by_source,
            strategy_count: pairs,
        }
    }

    pub fn lookup(
        &self,
        source_type: &str,
        capability: &CapabilityKey,
    ) -> Option<&Arc<dyn BinderStrategy>> {
        self.by_source
            .get(source_type)
            .and_then(|inner| inner.get(capability.as_str()))
    }

    pub fn profile(&self) -> LookupProfile {
        LookupProfile {
            registered_pairs: self.strategy_count,
            worst_case_scan: self.strategy_count,
            // Two hash probes: source type, then capability key.
            probe_length: 2,
        }
    }

    pub fn compatibility(&self) -> Vec<CompatibilityEntry> {
        let mut entries: Vec<CompatibilityEntry> = self
            .by_source
            .values()
            .flat_map(|inner| inner.values())
            .flat_map(|strategy| strategy.compatibility())
            .collect();
        entries.sort_by(|a, b| {
            (a.source_type, a.capability).cmp(&(b.source_type, b.capability))
        });
        entries.dedup_by(|a, b| a.source_type == b.source_type && a.capability == b.capability);
        entries
    }
}

/// Compute source types that can be the origin of a binding.
pub const COMPUTE_SOURCES: &[&str] = &["lambda-api", "lambda-worker"];

/// Inject the default environment variables for the given capability
/// fields, then apply the caller's `env:` selections on top.
pub fn inject_env(
    ctx: &BindingContext<'_>,
    default_fields: &[&str],
) -> Result<BTreeMap<String, String>, CompileError> {
    let mut env = BTreeMap::new();
    for field in default_fields {
        let value = capability_field(ctx, field)?;
        env.insert(
            format!("{}_{}", env_prefix(ctx.target_component), env_suffix(field)),
            value,
        );
    }
    for (var_name, field) in ctx.env_overrides {
        let value = capability_field(ctx, field)?;
        env.insert(var_name.clone(), value);
    }
    Ok(env)
}

fn capability_field(ctx: &BindingContext<'_>, field: &str) -> Result<String, CompileError> {
    let value =
        ctx.capability_data
            .get(field)
            .ok_or_else(|| CompileError::CapabilityFieldMissing {
                component: ctx.target_component.to_string(),
                capability: ctx.capability.to_string(),
                field: field.to_string(),
            })?;
    Ok(match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    })
}

/// `customer-db` -> `CUSTOMER_DB`
pub fn env_prefix(component: &str) -> String {
    component.to_ascii_uppercase().replace('-', "_")
}

/// `dbName` -> `DB_NAME`, `queueUrl` -> `QUEUE_URL`
pub fn env_suffix(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c);
        } else {
            out.push(c.to_ascii_uppercase());
        }
    }
    out
}
