use serde_json::{Value, json};

use crate::error::CompileError;

use super::{ComponentType, SynthContext, SynthOutput};

/// HTTP API served by a function behind a managed gateway. Exposes
/// `api:rest`; the usual source side of database/queue/bucket bindings.
pub struct LambdaApi;

const SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "type": "object",
  "additionalProperties": false,
  "properties": {
    "runtime": { "type": "string" },
    "handler": { "type": "string" },
    "memoryMb": { "type": "integer", "minimum": 128, "maximum": 10240 },
    "timeoutSeconds": { "type": "integer", "minimum": 1, "maximum": 900 },
    "environment": { "type": "object" },
    "cors": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "allowOrigins": { "type": "array", "items": { "type": "string" } },
        "allowMethods": { "type": "array", "items": { "type": "string" } },
        "allowHeaders": { "type": "array", "items": { "type": "string" } },
        "allowCredentials": { "type": "boolean" }
      }
    },
    "tls": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "minimumVersion": { "type": "string", "enum": ["1.0", "1.1", "1.2", "1.3"] }
      }
    },
    "logging": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "audit": { "type": "boolean" },
        "retentionDays": { "type": "integer", "minimum": 1 }
      }
    },
    "throttle": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "rateLimit": { "type": "integer", "minimum": 1 },
        "burstLimit": { "type": "integer", "minimum": 1 }
      }
    }
  }
}"##;

impl ComponentType for LambdaApi {
    fn type_tag(&self) -> &'static str {
        "lambda-api"
    }

    fn config_schema(&self) -> &'static str {
        SCHEMA
    }

    // CORS stays closed by default: empty origins, no credentials.
    fn fallbacks(&self) -> Value {
        json!({
            "runtime": "nodejs20.x",
            "handler": "index.handler",
            "memoryMb": 128,
            "timeoutSeconds": 3,
            "cors": {
                "allowOrigins": [],
                "allowMethods": [],
                "allowHeaders": [],
                "allowCredentials": false
            },
            "logging": { "retentionDays": 14 }
        })
    }

    fn merge_append_paths(&self) -> &'static [&'static str] {
        &["cors.allowOrigins"]
    }

    fn provides(&self) -> &'static [&'static str] {
        &["api:rest"]
    }

    fn synth(&self, ctx: &SynthContext<'_>) -> Result<SynthOutput, CompileError> {
        let scoped = ctx.scoped_id();
        let capability = json!({
            "url": format!("https://{scoped}.api.internal"),
            "arn": format!("arn:aws:execute-api:::{scoped}"),
            "stage": ctx.environment
        });

        let output = SynthOutput::default()
            .capability("api:rest", capability)
            .resource(
                format!("{}-fn", ctx.component),
                "lambda:function",
                json!({
                    "runtime": ctx.config_str("/runtime", "nodejs20.x"),
                    "handler": ctx.config_str("/handler", "index.handler"),
                    "memoryMb": ctx.config_u64("/memoryMb", 128),
                    "timeoutSeconds": ctx.config_u64("/timeoutSeconds", 3)
                }),
            )
            .resource(
                format!("{}-gateway", ctx.component),
                "apigateway:rest-api",
                json!({
                    "name": scoped,
                    "stage": ctx.environment,
                    "cors": ctx.config.pointer("/cors").cloned().unwrap_or_else(|| json!({})),
                    "tls": ctx.config.pointer("/tls").cloned().unwrap_or_else(|| json!({}))
                }),
            );
        Ok(output)
    }
}
