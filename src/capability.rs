use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Capability key following the `<category>:<type>` grammar, e.g. `db:postgres`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CapabilityKey(String);

impl CapabilityKey {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let Some((category, kind)) = raw.split_once(':') else {
            return Err(format!(
                "`{raw}` does not follow the `<category>:<type>` grammar"
            ));
        };
        if !is_segment(category) || !is_segment(kind) {
            return Err(format!(
                "`{raw}` segments must be lowercase alphanumeric (hyphens allowed)"
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn category(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "stringList")]
    StringList,
}

impl FieldType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::StringList => "string list",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub ty: FieldType,
    pub required: bool,
}

/// Strict data-shape contract for one capability.
#[derive(Debug, Clone, Serialize)]
pub struct DataShape {
    pub fields: BTreeMap<&'static str, FieldSpec>,
}

impl DataShape {
    fn new(fields: &[(&'static str, FieldType, bool)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(name, ty, required)| {
                    (
                        *name,
                        FieldSpec {
                            ty: *ty,
                            required: *required,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Check exposed capability data against this shape: every required
    /// field must be present and every declared field well-typed. The
    /// data keys may be a superset of the declared fields; extras pass
    /// through untouched. Returns one message per problem so callers can
    /// batch them.
    pub fn conformance_issues(&self, data: &Value) -> Vec<String> {
        let mut issues = Vec::new();
        let Some(object) = data.as_object() else {
            return vec!["capability data must be an object".into()];
        };
        for (field, spec) in &self.fields {
            match object.get(*field) {
                None if spec.required => {
                    issues.push(format!("required field `{field}` is missing"));
                }
                None => {}
                Some(value) if !spec.ty.matches(value) => {
                    issues.push(format!(
                        "field `{field}` must be a {}, got {}",
                        spec.ty.name(),
                        json_type_name(value)
                    ));
                }
                Some(_) => {}
            }
        }
        issues
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Registry of every capability shape the platform understands. Built once
/// at process start and shared read-only.
#[derive(Debug)]
pub struct CapabilityRegistry {
    shapes: HashMap<&'static str, DataShape>,
}

impl CapabilityRegistry {
    pub fn builtin() -> Self {
        let mut shapes = HashMap::new();
        shapes.insert(
            "db:postgres",
            DataShape::new(&[
                ("host", FieldType::String, true),
                ("port", FieldType::Number, true),
                ("dbName", FieldType::String, true),
                ("secretArn", FieldType::String, true),
                ("securityGroupId", FieldType::String, true),
            ]),
        );
        shapes.insert(
            "queue:sqs",
            DataShape::new(&[
                ("queueUrl", FieldType::String, true),
                ("queueArn", FieldType::String, true),
                ("fifo", FieldType::Boolean, false),
            ]),
        );
        shapes.insert(
            "bucket:s3",
            DataShape::new(&[
                ("bucketName", FieldType::String, true),
                ("bucketArn", FieldType::String, true),
            ]),
        );
        shapes.insert(
            "api:rest",
            DataShape::new(&[
                ("url", FieldType::String, true),
                ("arn", FieldType::String, true),
                ("stage", FieldType::String, true),
            ]),
        );
        shapes.insert(
            "cache:redis",
            DataShape::new(&[
                ("host", FieldType::String, true),
                ("port", FieldType::Number, true),
                ("securityGroupId", FieldType::String, true),
            ]),
        );
        shapes.insert(
            "net:vpc",
            DataShape::new(&[
                ("vpcId", FieldType::String, true),
                ("privateSubnetIds", FieldType::StringList, true),
            ]),
        );
        shapes.insert(
            "worker:lambda",
            DataShape::new(&[("functionArn", FieldType::String, true)]),
        );
        Self { shapes }
    }

    pub fn shape(&self, key: &CapabilityKey) -> Option<&DataShape> {
        self.shapes.get(key.as_str())
    }

    pub fn contains(&self, key: &CapabilityKey) -> bool {
        self.shapes.contains_key(key.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.shapes.keys().copied()
    }
}
