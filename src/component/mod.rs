use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::capability::CapabilityKey;
use crate::error::CompileError;
use crate::manifest::ComplianceFramework;

mod lambda_api;
mod lambda_worker;
mod rds_postgres;
mod redis_cache;
mod s3_bucket;
mod sqs_queue;
mod vpc_network;

pub use lambda_api::LambdaApi;
pub use lambda_worker::LambdaWorker;
pub use rds_postgres::RdsPostgres;
pub use redis_cache::RedisCache;
pub use s3_bucket::S3Bucket;
pub use sqs_queue::SqsQueue;
pub use vpc_network::VpcNetwork;

/// A cloud-neutral resource the backend will materialize.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDeclaration {
    #[serde(rename = "logicalId")]
    pub logical_id: String,
    pub kind: String,
    pub properties: Value,
}

/// What one component contributes to the plan.
#[derive(Debug, Default)]
pub struct SynthOutput {
    pub capabilities: BTreeMap<CapabilityKey, Value>,
    pub resources: Vec<ResourceDeclaration>,
}

impl SynthOutput {
    pub fn capability(mut self, key: &str, data: Value) -> Self {
        let key = CapabilityKey::parse(key).expect("builtin capability keys are well-formed");
        self.capabilities.insert(key, data);
        self
    }

    pub fn resource(mut self, logical_id: impl Into<String>, kind: &str, properties: Value) -> Self {
        self.resources.push(ResourceDeclaration {
            logical_id: logical_id.into(),
            kind: kind.to_string(),
            properties,
        });
        self
    }
}

/// Everything a component type sees while synthesizing. Synthesis is
/// offline and deterministic: identifiers are derived from the
/// service/environment/component triple, never looked up.
pub struct SynthContext<'a> {
    pub service: &'a str,
    pub environment: &'a str,
    pub component: &'a str,
    pub config: &'a Value,
    pub framework: ComplianceFramework,
}

impl SynthContext<'_> {
    /// Stable `<service>-<environment>-<component>` prefix for derived ids.
    pub fn scoped_id(&self) -> String {
        format!("{}-{}-{}", self.service, self.environment, self.component)
    }

    pub fn config_str(&self, pointer: &str, fallback: &str) -> String {
        self.config
            .pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    }

    pub fn config_u64(&self, pointer: &str, fallback: u64) -> u64 {
        self.config
            .pointer(pointer)
            .and_then(Value::as_u64)
            .unwrap_or(fallback)
    }

    pub fn config_bool(&self, pointer: &str, fallback: bool) -> bool {
        self.config
            .pointer(pointer)
            .and_then(Value::as_bool)
            .unwrap_or(fallback)
    }
}

/// One registered component type. Shared behavior lives in free functions
/// and the synth context, not an inheritance chain.
pub trait ComponentType: Send + Sync {
    fn type_tag(&self) -> &'static str;

    /// JSON schema (draft-07) for this type's `config` object.
    fn config_schema(&self) -> &'static str;

    /// Hardcoded fallbacks: the lowest-priority layer. Must be safe,
    /// minimal and environment-invariant; enforced by the security floor.
    fn fallbacks(&self) -> Value;

    /// Dotted config paths where sequences append across layers instead
    /// of replacing.
    fn merge_append_paths(&self) -> &'static [&'static str] {
        &[]
    }

    /// Capability keys this type exposes after synthesis.
    fn provides(&self) -> &'static [&'static str];

    fn synth(&self, ctx: &SynthContext<'_>) -> Result<SynthOutput, CompileError>;
}

/// Registry of component types, built once at process start and treated
/// as immutable afterwards.
pub struct ComponentRegistry {
    types: HashMap<&'static str, Box<dyn ComponentType>>,
}

impl ComponentRegistry {
    pub fn builtin() -> Self {
        let mut registry = Self {
            types: HashMap::new(),
        };
        registry.register(Box::new(LambdaApi));
        registry.register(Box::new(LambdaWorker));
        registry.register(Box::new(RdsPostgres));
        registry.register(Box::new(SqsQueue));
        registry.register(Box::new(S3Bucket));
        registry.register(Box::new(RedisCache));
        registry.register(Box::new(VpcNetwork));
        registry
    }

    fn register(&mut self, component: Box<dyn ComponentType>) {
        let tag = component.type_tag();
        if self.types.insert(tag, component).is_some() {
            panic!("component type `{tag}` registered twice");
        }
    }

    pub fn get(&self, tag: &str) -> Option<&dyn ComponentType> {
        self.types.get(tag).map(Box::as_ref)
    }

    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<&'static str> = self.types.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ComponentType> + '_ {
        self.types.values().map(Box::as_ref)
    }
}
