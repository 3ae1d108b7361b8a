use serde_json::{Value, json};

use crate::error::CompileError;

use super::{ComponentType, SynthContext, SynthOutput};

/// Private network exposing `net:vpc`. The CIDR comes from the platform
/// layer; the fallback carries only topology counts so it stays free of
/// address literals.
pub struct VpcNetwork;

const SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "type": "object",
  "additionalProperties": false,
  "properties": {
    "cidr": { "type": "string" },
    "maxAzs": { "type": "integer", "minimum": 1, "maximum": 6 },
    "natGateways": { "type": "integer", "minimum": 0, "maximum": 6 },
    "flowLogs": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "enabled": { "type": "boolean" }
      }
    }
  }
}"##;

impl ComponentType for VpcNetwork {
    fn type_tag(&self) -> &'static str {
        "vpc-network"
    }

    fn config_schema(&self) -> &'static str {
        SCHEMA
    }

    fn fallbacks(&self) -> Value {
        json!({
            "maxAzs": 2,
            "natGateways": 0
        })
    }

    fn provides(&self) -> &'static [&'static str] {
        &["net:vpc"]
    }

    fn synth(&self, ctx: &SynthContext<'_>) -> Result<SynthOutput, CompileError> {
        let scoped = ctx.scoped_id();
        let max_azs = ctx.config_u64("/maxAzs", 2);
        let subnets: Vec<String> = (0..max_azs)
            .map(|az| format!("subnet-{scoped}-private-{az}"))
            .collect();

        let output = SynthOutput::default()
            .capability(
                "net:vpc",
                json!({
                    "vpcId": format!("vpc-{scoped}"),
                    "privateSubnetIds": subnets
                }),
            )
            .resource(
                format!("{}-vpc", ctx.component),
                "ec2:vpc",
                json!({
                    "cidr": ctx.config_str("/cidr", ""),
                    "maxAzs": max_azs,
                    "natGateways": ctx.config_u64("/natGateways", 0)
                }),
            );
        Ok(output)
    }
}
