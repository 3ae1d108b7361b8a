use std::collections::HashMap;

use jsonschema::{Draft, Validator};
use once_cell::sync::Lazy;
use serde_json::{Value, json};

use crate::component::ComponentRegistry;
use crate::error::{CompileError, SchemaIssue};

static BASE_SCHEMA: &str = include_str!("../assets/schemas/service.manifest.schema.json");

static BASE_VALUE: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(BASE_SCHEMA).expect("base manifest schema must be valid JSON")
});

/// Holds the compiled base validator plus one compiled validator per
/// registered component type's `config`. Built once at process start.
///
/// Deep validation of each component's `config` is deliberately deferred
/// to the hydration stage: raw configs may still contain interpolation
/// placeholders whose final type only exists after substitution.
pub struct SchemaRegistry {
    master: Validator,
    config_validators: HashMap<&'static str, Validator>,
    known_types: Vec<&'static str>,
}

impl SchemaRegistry {
    pub fn build(components: &ComponentRegistry) -> Result<Self, CompileError> {
        let master_schema = compose_master_schema(components);
        let master = compile(&master_schema)?;

        let mut config_validators = HashMap::new();
        for component in components.iter() {
            let schema: Value =
                serde_json::from_str(component.config_schema()).map_err(|err| {
                    CompileError::Internal(format!(
                        "config schema for `{}` is not valid JSON: {err}",
                        component.type_tag()
                    ))
                })?;
            config_validators.insert(component.type_tag(), compile(&schema)?);
        }

        Ok(Self {
            master,
            config_validators,
            known_types: components.tags(),
        })
    }

    /// Stage-2 validation: unknown component types first (they get a
    /// dedicated error), then the master schema over the whole document.
    pub fn validate_manifest(&self, document: &Value) -> Result<(), CompileError> {
        if let Some(components) = document.get("components").and_then(Value::as_array) {
            for (index, component) in components.iter().enumerate() {
                let Some(type_tag) = component.get("type").and_then(Value::as_str) else {
                    continue; // shape errors surface via the master schema
                };
                if !self.known_types.contains(&type_tag) {
                    let name = component
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("<unnamed>");
                    return Err(CompileError::UnknownComponentType {
                        component: name.to_string(),
                        type_tag: type_tag.to_string(),
                        pointer: format!("/components/{index}/type"),
                    });
                }
            }
        }

        let violations: Vec<SchemaIssue> = self
            .master
            .iter_errors(document)
            .map(|error| SchemaIssue {
                pointer: error.instance_path().to_string(),
                message: error.to_string(),
            })
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(CompileError::SchemaViolation { violations })
        }
    }

    /// Hydration-stage validation of one component's resolved config.
    pub fn validate_config(
        &self,
        type_tag: &str,
        component_name: &str,
        resolved: &Value,
    ) -> Result<(), CompileError> {
        let Some(validator) = self.config_validators.get(type_tag) else {
            return Err(CompileError::Internal(format!(
                "no config validator registered for `{type_tag}`"
            )));
        };
        let violations: Vec<SchemaIssue> = validator
            .iter_errors(resolved)
            .map(|error| SchemaIssue {
                pointer: format!(
                    "/components/{component_name}/resolvedConfig{}",
                    error.instance_path()
                ),
                message: error.to_string(),
            })
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(CompileError::SchemaViolation { violations })
        }
    }
}

/// Compose the base schema with every registered component type: the
/// `type` field narrows to an enum of known tags and each type's config
/// schema lands under `definitions.configs.<tag>`.
pub fn compose_master_schema(components: &ComponentRegistry) -> Value {
    let mut schema = BASE_VALUE.clone();
    let tags = components.tags();

    if let Some(type_slot) =
        schema.pointer_mut("/definitions/component/properties/type")
    {
        *type_slot = json!({ "enum": tags });
    }

    let configs: serde_json::Map<String, Value> = components
        .iter()
        .map(|component| {
            (
                component.type_tag().to_string(),
                serde_json::from_str(component.config_schema())
                    .expect("registered config schemas are valid JSON"),
            )
        })
        .collect();
    if let Some(definitions) = schema
        .pointer_mut("/definitions")
        .and_then(Value::as_object_mut)
    {
        definitions.insert("configs".to_string(), Value::Object(configs));
    }

    schema
}

fn compile(schema: &Value) -> Result<Validator, CompileError> {
    jsonschema::options()
        .with_draft(Draft::Draft7)
        .build(schema)
        .map_err(|error| CompileError::Internal(format!("failed to compile schema: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::build(&ComponentRegistry::builtin()).expect("builtin schemas compile")
    }

    #[test]
    fn master_schema_narrows_type_to_registered_tags() {
        let components = ComponentRegistry::builtin();
        let master = compose_master_schema(&components);
        let tags = master
            .pointer("/definitions/component/properties/type/enum")
            .and_then(Value::as_array)
            .unwrap();
        assert!(tags.iter().any(|t| t == "rds-postgres"));
        assert!(
            master
                .pointer("/definitions/configs/lambda-api")
                .is_some()
        );
    }

    #[test]
    fn valid_document_passes_stage_two() {
        let doc = json!({
            "service": "checkout",
            "owner": "team-payments",
            "components": [
                {"name": "primary-db", "type": "rds-postgres", "config": {}}
            ]
        });
        registry().validate_manifest(&doc).unwrap();
    }

    #[test]
    fn unknown_component_type_gets_dedicated_error() {
        let doc = json!({
            "service": "checkout",
            "components": [{"name": "vm", "type": "ec2-instance"}]
        });
        let err = registry().validate_manifest(&doc).unwrap_err();
        assert_eq!(err.code(), "unknown-component-type");
        assert_eq!(err.pointer(), Some("/components/0/type"));
    }

    #[test]
    fn structural_violations_are_batched() {
        let doc = json!({
            "service": "Checkout",
            "components": [{"name": "db"}],
            "unexpected": true
        });
        let err = registry().validate_manifest(&doc).unwrap_err();
        assert_eq!(err.code(), "schema-violation");
        assert!(err.diagnostics().len() >= 2);
    }

    #[test]
    fn resolved_config_violations_carry_component_pointers() {
        let err = registry()
            .validate_config("rds-postgres", "primary-db", &json!({"port": "not-a-port"}))
            .unwrap_err();
        let diags = err.diagnostics();
        assert!(diags[0].path.starts_with("/components/primary-db/resolvedConfig"));
    }
}
