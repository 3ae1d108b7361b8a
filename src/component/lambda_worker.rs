use serde_json::{Value, json};

use crate::error::CompileError;

use super::{ComponentType, SynthContext, SynthOutput};

/// Background function, typically the consuming side of a queue binding.
pub struct LambdaWorker;

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
    "batchSize": { "type": "integer", "minimum": 1, "maximum": 10000 },
    "reservedConcurrency": { "type": "integer", "minimum": 0 },
    "logging": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "audit": { "type": "boolean" },
        "retentionDays": { "type": "integer", "minimum": 1 }
      }
    }
  }
}"##;

impl ComponentType for LambdaWorker {
    fn type_tag(&self) -> &'static str {
        "lambda-worker"
    }

    fn config_schema(&self) -> &'static str {
        SCHEMA
    }

    fn fallbacks(&self) -> Value {
        json!({
            "runtime": "nodejs20.x",
            "handler": "index.handler",
            "memoryMb": 128,
            "timeoutSeconds": 30,
            "batchSize": 10,
            "logging": { "retentionDays": 14 }
        })
    }

    fn provides(&self) -> &'static [&'static str] {
        &["worker:lambda"]
    }

    fn synth(&self, ctx: &SynthContext<'_>) -> Result<SynthOutput, CompileError> {
        let scoped = ctx.scoped_id();
        let output = SynthOutput::default()
            .capability(
                "worker:lambda",
                json!({ "functionArn": format!("arn:aws:lambda:::function/{scoped}") }),
            )
            .resource(
                format!("{}-fn", ctx.component),
                "lambda:function",
                json!({
                    "runtime": ctx.config_str("/runtime", "nodejs20.x"),
                    "handler": ctx.config_str("/handler", "index.handler"),
                    "memoryMb": ctx.config_u64("/memoryMb", 128),
                    "timeoutSeconds": ctx.config_u64("/timeoutSeconds", 30),
                    "batchSize": ctx.config_u64("/batchSize", 10)
                }),
            );
        Ok(output)
    }
}
