use serde_json::{Value, json};

use crate::error::CompileError;

use super::{ComponentType, SynthContext, SynthOutput};

/// Managed PostgreSQL instance exposing the `db:postgres` capability.
pub struct RdsPostgres;

const SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "type": "object",
  "additionalProperties": false,
  "properties": {
    "instance": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "class": { "type": "string" },
        "count": { "type": "integer", "minimum": 1 }
      }
    },
    "engineVersion": { "type": "string" },
    "dbName": { "type": "string" },
    "port": { "type": "integer", "minimum": 1, "maximum": 65535 },
    "storageGb": { "type": "integer", "minimum": 20 },
    "multiAz": { "type": "boolean" },
    "publicAccess": { "type": "boolean" },
    "backup": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "retentionDays": { "type": "integer", "minimum": 0 }
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
        "audit": { "type": "boolean" },
        "slowQuery": { "type": "boolean" }
      }
    },
    "parameters": { "type": "object" }
  }
}"##;

impl ComponentType for RdsPostgres {
    fn type_tag(&self) -> &'static str {
        "rds-postgres"
    }

    fn config_schema(&self) -> &'static str {
        SCHEMA
    }

    fn fallbacks(&self) -> Value {
        json!({
            "instance": { "class": "db.t3.micro", "count": 1 },
            "engineVersion": "15",
            "dbName": "app",
            "port": 5432,
            "storageGb": 20,
            "publicAccess": false
        })
    }

    fn provides(&self) -> &'static [&'static str] {
        &["db:postgres"]
    }

    fn synth(&self, ctx: &SynthContext<'_>) -> Result<SynthOutput, CompileError> {
        let scoped = ctx.scoped_id();
        let db_name = ctx.config_str("/dbName", "app");
        let port = ctx.config_u64("/port", 5432);

        let capability = json!({
            "host": format!("{scoped}.db.internal"),
            "port": port,
            "dbName": db_name,
            "secretArn": format!("arn:aws:secretsmanager:::secret/{scoped}-credentials"),
            "securityGroupId": format!("sg-{scoped}-db")
        });

        let output = SynthOutput::default()
            .capability("db:postgres", capability)
            .resource(
                format!("{}-instance", ctx.component),
                "rds:instance",
                json!({
                    "engine": "postgres",
                    "engineVersion": ctx.config_str("/engineVersion", "15"),
                    "instanceClass": ctx.config_str("/instance/class", "db.t3.micro"),
                    "allocatedStorageGb": ctx.config_u64("/storageGb", 20),
                    "dbName": db_name,
                    "port": port,
                    "multiAz": ctx.config_bool("/multiAz", false),
                    "publiclyAccessible": ctx.config_bool("/publicAccess", false)
                }),
            )
            .resource(
                format!("{}-credentials", ctx.component),
                "secretsmanager:secret",
                json!({ "name": format!("{scoped}-credentials") }),
            )
            .resource(
                format!("{}-sg", ctx.component),
                "ec2:security-group",
                json!({ "name": format!("sg-{scoped}-db") }),
            );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ComplianceFramework;

    #[test]
    fn synth_derives_deterministic_identifiers() {
        let config = RdsPostgres.fallbacks();
        let ctx = SynthContext {
            service: "checkout",
            environment: "qa",
            component: "primary-db",
            config: &config,
            framework: ComplianceFramework::Commercial,
        };
        let out = RdsPostgres.synth(&ctx).unwrap();
        let key = crate::capability::CapabilityKey::parse("db:postgres").unwrap();
        let data = out.capabilities.get(&key).unwrap();
        assert_eq!(data["host"], "checkout-qa-primary-db.db.internal");
        assert_eq!(data["port"], 5432);
        assert_eq!(out.resources.len(), 3);
    }
}
