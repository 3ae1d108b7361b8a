use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::capability::CapabilityKey;
use crate::error::CompileError;
use crate::manifest::EnvironmentSpec;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{(env|envIs|ref):([^}]+)\}").expect("interpolation pattern compiles")
});

/// A `${ref:component.capability.field}` occurrence found during hydration.
/// The placeholder stays in the config until the resolver substitutes it
/// with the target's capability data; the token itself records the
/// observation edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefToken {
    pub component: String,
    pub capability: CapabilityKey,
    pub field: String,
    pub raw: String,
}

impl RefToken {
    fn parse(body: &str, raw: &str, pointer: &str) -> Result<Self, CompileError> {
        // `component.capability.field` where the capability segment itself
        // contains a colon (`db:postgres`).
        let mut segments = body.splitn(3, '.');
        let (Some(component), Some(capability), Some(field)) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(CompileError::InvalidInterpolation {
                token: raw.to_string(),
                reason: "expected ${ref:component.capability.field}".into(),
                pointer: pointer.to_string(),
            });
        };
        let capability =
            CapabilityKey::parse(capability).map_err(|reason| CompileError::InvalidInterpolation {
                token: raw.to_string(),
                reason,
                pointer: pointer.to_string(),
            })?;
        if component.is_empty() || field.is_empty() {
            return Err(CompileError::InvalidInterpolation {
                token: raw.to_string(),
                reason: "component and field segments cannot be empty".into(),
                pointer: pointer.to_string(),
            });
        }
        Ok(Self {
            component: component.to_string(),
            capability,
            field: field.to_string(),
            raw: raw.to_string(),
        })
    }
}

/// Substitute `${env:...}` and `${envIs:...}` tokens throughout a config
/// value and collect every `${ref:...}` token for the resolver. A string
/// that consists of exactly one token may change type (boolean for
/// `envIs`, any scalar for `env`); embedded tokens stringify.
pub fn interpolate(
    config: &Value,
    environment_name: &str,
    environment: &EnvironmentSpec,
    pointer: &str,
    refs: &mut Vec<RefToken>,
) -> Result<Value, CompileError> {
    match config {
        Value::String(text) => interpolate_string(text, environment_name, environment, pointer, refs),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                out.push(interpolate(
                    item,
                    environment_name,
                    environment,
                    &format!("{pointer}/{index}"),
                    refs,
                )?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(
                    key.clone(),
                    interpolate(
                        value,
                        environment_name,
                        environment,
                        &format!("{pointer}/{key}"),
                        refs,
                    )?,
                );
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn interpolate_string(
    text: &str,
    environment_name: &str,
    environment: &EnvironmentSpec,
    pointer: &str,
    refs: &mut Vec<RefToken>,
) -> Result<Value, CompileError> {
    // Whole-string tokens keep the looked-up value's type.
    if let Some(caps) = TOKEN.captures(text)
        && caps.get(0).map(|m| m.as_str()) == Some(text)
    {
        let kind = &caps[1];
        let body = &caps[2];
        return match kind {
            "env" => lookup_env(body, environment_name, environment, pointer),
            "envIs" => Ok(Value::Bool(environment_name == body)),
            "ref" => {
                refs.push(RefToken::parse(body, text, pointer)?);
                Ok(Value::String(text.to_string()))
            }
            _ => unreachable!("pattern restricts kinds"),
        };
    }

    let mut failure: Option<CompileError> = None;
    let replaced = TOKEN.replace_all(text, |caps: &regex::Captures<'_>| {
        if failure.is_some() {
            return String::new();
        }
        let raw = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        match &caps[1] {
            "env" => match lookup_env(&caps[2], environment_name, environment, pointer) {
                Ok(value) => scalar_to_string(&value),
                Err(err) => {
                    failure = Some(err);
                    String::new()
                }
            },
            "envIs" => (environment_name == &caps[2]).to_string(),
            "ref" => match RefToken::parse(&caps[2], raw, pointer) {
                Ok(token) => {
                    refs.push(token);
                    raw.to_string()
                }
                Err(err) => {
                    failure = Some(err);
                    String::new()
                }
            },
            _ => unreachable!("pattern restricts kinds"),
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(Value::String(replaced.into_owned())),
    }
}

fn lookup_env(
    key: &str,
    environment_name: &str,
    environment: &EnvironmentSpec,
    pointer: &str,
) -> Result<Value, CompileError> {
    environment
        .defaults
        .get(key)
        .cloned()
        .ok_or_else(|| CompileError::UnresolvedEnvVar {
            key: key.to_string(),
            environment: environment_name.to_string(),
            pointer: pointer.to_string(),
        })
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Replace a resolved `${ref:...}` placeholder with the observed field
/// value, after the target component has been synthesized.
pub fn substitute_ref(config: &mut Value, token: &RefToken, observed: &Value) {
    match config {
        Value::String(text) => {
            if text == &token.raw {
                *config = observed.clone();
            } else if text.contains(&token.raw) {
                *config = Value::String(text.replace(&token.raw, &scalar_to_string(observed)));
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute_ref(item, token, observed);
            }
        }
        Value::Object(map) => {
            for value in map.values_mut() {
                substitute_ref(value, token, observed);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn qa_env() -> EnvironmentSpec {
        EnvironmentSpec {
            defaults: json!({"dbInstanceClass": "db.r5.xlarge", "replicas": 2})
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    #[test]
    fn whole_string_env_token_keeps_value_type() {
        let mut refs = Vec::new();
        let out = interpolate(
            &json!({"replicas": "${env:replicas}"}),
            "qa",
            &qa_env(),
            "",
            &mut refs,
        )
        .unwrap();
        assert_eq!(out["replicas"], 2);
    }

    #[test]
    fn embedded_env_token_stringifies() {
        let mut refs = Vec::new();
        let out = interpolate(
            &json!({"note": "class=${env:dbInstanceClass}"}),
            "qa",
            &qa_env(),
            "",
            &mut refs,
        )
        .unwrap();
        assert_eq!(out["note"], "class=db.r5.xlarge");
    }

    #[test]
    fn env_is_token_compares_environment() {
        let mut refs = Vec::new();
        let out = interpolate(
            &json!({"isProd": "${envIs:prod}", "isQa": "${envIs:qa}"}),
            "qa",
            &qa_env(),
            "",
            &mut refs,
        )
        .unwrap();
        assert_eq!(out["isProd"], false);
        assert_eq!(out["isQa"], true);
    }

    #[test]
    fn missing_env_key_is_an_error() {
        let mut refs = Vec::new();
        let err = interpolate(
            &json!({"size": "${env:missing}"}),
            "qa",
            &qa_env(),
            "/components/0/config",
            &mut refs,
        )
        .unwrap_err();
        assert_eq!(err.code(), "unresolved-env-var");
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn ref_tokens_are_collected_not_substituted() {
        let mut refs = Vec::new();
        let out = interpolate(
            &json!({"dbHost": "${ref:customer-db.db:postgres.host}"}),
            "qa",
            &qa_env(),
            "",
            &mut refs,
        )
        .unwrap();
        assert_eq!(out["dbHost"], "${ref:customer-db.db:postgres.host}");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].component, "customer-db");
        assert_eq!(refs[0].capability.as_str(), "db:postgres");
        assert_eq!(refs[0].field, "host");
    }

    #[test]
    fn malformed_ref_tokens_are_rejected() {
        let mut refs = Vec::new();
        let err = interpolate(
            &json!({"dbHost": "${ref:customer-db.host}"}),
            "qa",
            &qa_env(),
            "",
            &mut refs,
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid-interpolation");
    }

    #[test]
    fn substitution_replaces_whole_and_embedded_tokens() {
        let token = RefToken {
            component: "customer-db".into(),
            capability: CapabilityKey::parse("db:postgres").unwrap(),
            field: "port".into(),
            raw: "${ref:customer-db.db:postgres.port}".into(),
        };
        let mut whole = json!({"port": "${ref:customer-db.db:postgres.port}"});
        substitute_ref(&mut whole, &token, &json!(5432));
        assert_eq!(whole["port"], 5432);

        let mut embedded = json!({"dsn": "postgres://db:${ref:customer-db.db:postgres.port}/app"});
        substitute_ref(&mut embedded, &token, &json!(5432));
        assert_eq!(embedded["dsn"], "postgres://db:5432/app");
    }
}
