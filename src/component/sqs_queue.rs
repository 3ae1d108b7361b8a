use serde_json::{Value, json};

use crate::error::CompileError;

use super::{ComponentType, SynthContext, SynthOutput};

/// Managed message queue exposing `queue:sqs`.
pub struct SqsQueue;

const SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "type": "object",
  "additionalProperties": false,
  "properties": {
    "fifo": { "type": "boolean" },
    "visibilityTimeoutSeconds": { "type": "integer", "minimum": 0, "maximum": 43200 },
    "retentionDays": { "type": "integer", "minimum": 1, "maximum": 14 },
    "deadLetter": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "enabled": { "type": "boolean" },
        "maxReceiveCount": { "type": "integer", "minimum": 1 }
      }
    },
    "encryption": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "atRest": { "type": "boolean" },
        "kmsKeyAlias": { "type": "string" }
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

impl ComponentType for SqsQueue {
    fn type_tag(&self) -> &'static str {
        "sqs-queue"
    }

    fn config_schema(&self) -> &'static str {
        SCHEMA
    }

    fn fallbacks(&self) -> Value {
        json!({
            "fifo": false,
            "visibilityTimeoutSeconds": 30,
            "retentionDays": 4,
            "deadLetter": { "enabled": false }
        })
    }

    fn provides(&self) -> &'static [&'static str] {
        &["queue:sqs"]
    }

    fn synth(&self, ctx: &SynthContext<'_>) -> Result<SynthOutput, CompileError> {
        let scoped = ctx.scoped_id();
        let fifo = ctx.config_bool("/fifo", false);
        let queue_name = if fifo {
            format!("{scoped}.fifo")
        } else {
            scoped.clone()
        };

        let output = SynthOutput::default()
            .capability(
                "queue:sqs",
                json!({
                    "queueUrl": format!("https://sqs.internal/queues/{queue_name}"),
                    "queueArn": format!("arn:aws:sqs:::{queue_name}"),
                    "fifo": fifo
                }),
            )
            .resource(
                format!("{}-queue", ctx.component),
                "sqs:queue",
                json!({
                    "name": queue_name,
                    "fifo": fifo,
                    "visibilityTimeoutSeconds": ctx.config_u64("/visibilityTimeoutSeconds", 30),
                    "retentionDays": ctx.config_u64("/retentionDays", 4)
                }),
            );
        Ok(output)
    }
}
