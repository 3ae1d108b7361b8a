use serde_json::{Value, json};

use crate::error::CompileError;

use super::{ComponentType, SynthContext, SynthOutput};

/// In-memory cache cluster exposing `cache:redis`.
pub struct RedisCache;

const SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "type": "object",
  "additionalProperties": false,
  "properties": {
    "nodeType": { "type": "string" },
    "engineVersion": { "type": "string" },
    "port": { "type": "integer", "minimum": 1, "maximum": 65535 },
    "replicas": { "type": "integer", "minimum": 0, "maximum": 5 },
    "encryption": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "atRest": { "type": "boolean" },
        "inTransit": { "type": "boolean" }
      }
    },
    "logging": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "audit": { "type": "boolean" }
      }
    }
  }
}"##;

impl ComponentType for RedisCache {
    fn type_tag(&self) -> &'static str {
        "redis-cache"
    }

    fn config_schema(&self) -> &'static str {
        SCHEMA
    }

    fn fallbacks(&self) -> Value {
        json!({
            "nodeType": "cache.t3.micro",
            "engineVersion": "7",
            "port": 6379,
            "replicas": 0
        })
    }

    fn provides(&self) -> &'static [&'static str] {
        &["cache:redis"]
    }

    fn synth(&self, ctx: &SynthContext<'_>) -> Result<SynthOutput, CompileError> {
        let scoped = ctx.scoped_id();
        let port = ctx.config_u64("/port", 6379);
        let output = SynthOutput::default()
            .capability(
                "cache:redis",
                json!({
                    "host": format!("{scoped}.cache.internal"),
                    "port": port,
                    "securityGroupId": format!("sg-{scoped}-cache")
                }),
            )
            .resource(
                format!("{}-cluster", ctx.component),
                "elasticache:replication-group",
                json!({
                    "nodeType": ctx.config_str("/nodeType", "cache.t3.micro"),
                    "engineVersion": ctx.config_str("/engineVersion", "7"),
                    "port": port,
                    "replicas": ctx.config_u64("/replicas", 0)
                }),
            )
            .resource(
                format!("{}-sg", ctx.component),
                "ec2:security-group",
                json!({ "name": format!("sg-{scoped}-cache") }),
            );
        Ok(output)
    }
}
