use serde_json::{Value, json};

use crate::error::CompileError;

use super::{ComponentType, SynthContext, SynthOutput};

/// Object storage bucket exposing `bucket:s3`. Encryption is left to the
/// platform and hardening layers so the fallback stays minimal.
pub struct S3Bucket;

const SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "type": "object",
  "additionalProperties": false,
  "properties": {
    "versioning": { "type": "boolean" },
    "publicAccess": { "type": "boolean" },
    "lifecycle": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "expireDays": { "type": "integer", "minimum": 1 },
        "transitionToColdDays": { "type": "integer", "minimum": 1 }
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

impl ComponentType for S3Bucket {
    fn type_tag(&self) -> &'static str {
        "s3-bucket"
    }

    fn config_schema(&self) -> &'static str {
        SCHEMA
    }

    fn fallbacks(&self) -> Value {
        json!({
            "versioning": false,
            "publicAccess": false
        })
    }

    fn provides(&self) -> &'static [&'static str] {
        &["bucket:s3"]
    }

    fn synth(&self, ctx: &SynthContext<'_>) -> Result<SynthOutput, CompileError> {
        let scoped = ctx.scoped_id();
        let output = SynthOutput::default()
            .capability(
                "bucket:s3",
                json!({
                    "bucketName": scoped,
                    "bucketArn": format!("arn:aws:s3:::{scoped}")
                }),
            )
            .resource(
                format!("{}-bucket", ctx.component),
                "s3:bucket",
                json!({
                    "name": scoped,
                    "versioning": ctx.config_bool("/versioning", false),
                    "publicAccessBlocked": !ctx.config_bool("/publicAccess", false),
                    "encryption": ctx.config.pointer("/encryption").cloned().unwrap_or_else(|| json!({}))
                }),
            );
        Ok(output)
    }
}
