use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::CapabilityKey;
use crate::error::CompileError;

/// Typed form of `service.yml` after the schema stage. Construction goes
/// through `RawManifest` so every identifier is parse-validated exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub service: ServiceName,
    pub owner: String,
    pub compliance_framework: ComplianceFramework,
    pub environments: BTreeMap<String, EnvironmentSpec>,
    pub components: Vec<ComponentSpec>,
    pub governance: GovernanceSpec,
    pub labels: BTreeMap<String, String>,
}

impl Manifest {
    pub fn from_value(document: &Value) -> Result<Self, CompileError> {
        let raw: RawManifest = serde_json::from_value(document.clone()).map_err(|source| {
            CompileError::JsonSyntax {
                path: "service.yml".into(),
                source,
            }
        })?;
        raw.try_into()
    }

    pub fn component(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.name.as_str() == name)
    }

    pub fn environment(&self, name: &str) -> Option<&EnvironmentSpec> {
        self.environments.get(name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    #[serde(default)]
    pub defaults: serde_json::Map<String, Value>,
}

impl EnvironmentSpec {
    /// Whether this environment counts as production for policy purposes.
    pub fn is_production(&self, name: &str) -> bool {
        if matches!(name, "prod" | "production") {
            return true;
        }
        self.defaults
            .get("production")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentSpec {
    pub name: ComponentName,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub config: Value,
    pub binds: Vec<BindingRequest>,
    pub overrides: Value,
    pub policy: Option<PolicySpec>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicySpec {
    pub overrides: Value,
    pub justification: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BindingRequest {
    pub to: ComponentName,
    pub capability: CapabilityKey,
    pub access: AccessLevel,
    pub env: BTreeMap<String, String>,
    pub options: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceSpec {
    #[serde(default, rename = "cdkNag")]
    pub cdk_nag: CdkNagSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CdkNagSpec {
    #[serde(default)]
    pub suppress: Vec<SuppressionRecord>,
}

/// A governance waiver against a control finding, time-boxed by `expiresOn`.
/// All fields are optional at decode time so the evaluator can name exactly
/// which one is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default, rename = "expiresOn")]
    pub expires_on: Option<String>,
    #[serde(default, rename = "appliesTo")]
    pub applies_to: Vec<SuppressionTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionTarget {
    pub component: String,
}

/// Lowercase-hyphenated service identifier, 1..=63 characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn parse(name: String) -> Result<Self, CompileError> {
        if !is_identifier(&name) {
            return Err(CompileError::SchemaViolation {
                violations: vec![crate::error::SchemaIssue {
                    pointer: "/service".into(),
                    message: format!(
                        "`{name}` is not a valid service name (lowercase-hyphenated, 1..63 chars)"
                    ),
                }],
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Component identifier, unique within a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ComponentName(String);

impl ComponentName {
    pub fn parse(name: String, pointer: &str) -> Result<Self, CompileError> {
        if !is_identifier(&name) {
            return Err(CompileError::SchemaViolation {
                violations: vec![crate::error::SchemaIssue {
                    pointer: pointer.to_string(),
                    message: format!(
                        "`{name}` is not a valid component name (lowercase-hyphenated, 1..63 chars)"
                    ),
                }],
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && !name.ends_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceFramework {
    #[serde(rename = "commercial")]
    Commercial,
    #[serde(rename = "fedramp-moderate")]
    FedrampModerate,
    #[serde(rename = "fedramp-high")]
    FedrampHigh,
}

impl ComplianceFramework {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceFramework::Commercial => "commercial",
            ComplianceFramework::FedrampModerate => "fedramp-moderate",
            ComplianceFramework::FedrampHigh => "fedramp-high",
        }
    }

    pub fn is_fedramp(&self) -> bool {
        !matches!(self, ComplianceFramework::Commercial)
    }

    /// Minimum backup retention in days mandated for storage components.
    pub fn min_backup_retention_days(&self) -> Option<u64> {
        match self {
            ComplianceFramework::Commercial => None,
            ComplianceFramework::FedrampModerate => Some(30),
            ComplianceFramework::FedrampHigh => Some(35),
        }
    }
}

impl Default for ComplianceFramework {
    fn default() -> Self {
        ComplianceFramework::Commercial
    }
}

impl FromStr for ComplianceFramework {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "commercial" => Ok(ComplianceFramework::Commercial),
            "fedramp-moderate" => Ok(ComplianceFramework::FedrampModerate),
            "fedramp-high" => Ok(ComplianceFramework::FedrampHigh),
            other => Err(format!("unknown compliance framework `{other}`")),
        }
    }
}

impl fmt::Display for ComplianceFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "write")]
    Write,
    #[serde(rename = "readwrite")]
    ReadWrite,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "publish")]
    Publish,
    #[serde(rename = "consume")]
    Consume,
    #[serde(rename = "execute")]
    Execute,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::ReadWrite => "readwrite",
            AccessLevel::Admin => "admin",
            AccessLevel::Publish => "publish",
            AccessLevel::Consume => "consume",
            AccessLevel::Execute => "execute",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    service: String,
    #[serde(default)]
    owner: String,
    #[serde(default, rename = "complianceFramework")]
    compliance_framework: Option<String>,
    #[serde(default)]
    environments: BTreeMap<String, EnvironmentSpec>,
    #[serde(default)]
    components: Vec<RawComponent>,
    #[serde(default)]
    governance: GovernanceSpec,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawComponent {
    name: String,
    #[serde(rename = "type")]
    type_tag: String,
    #[serde(default)]
    config: Value,
    #[serde(default)]
    binds: Vec<RawBinding>,
    #[serde(default)]
    overrides: Value,
    #[serde(default)]
    policy: Option<RawPolicy>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawPolicy {
    #[serde(default)]
    overrides: Value,
    #[serde(default)]
    justification: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBinding {
    to: String,
    capability: String,
    access: AccessLevel,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    options: Value,
}

impl TryFrom<RawManifest> for Manifest {
    type Error = CompileError;

    fn try_from(raw: RawManifest) -> Result<Self, Self::Error> {
        let service = ServiceName::parse(raw.service)?;

        let compliance_framework = match raw.compliance_framework.as_deref() {
            None => ComplianceFramework::default(),
            Some(tag) => tag.parse().map_err(|message| CompileError::SchemaViolation {
                violations: vec![crate::error::SchemaIssue {
                    pointer: "/complianceFramework".into(),
                    message,
                }],
            })?,
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut components = Vec::with_capacity(raw.components.len());
        for (index, raw_component) in raw.components.into_iter().enumerate() {
            let pointer = format!("/components/{index}");
            let component = convert_component(raw_component, index)?;
            if !seen.insert(component.name.as_str().to_string()) {
                return Err(CompileError::SchemaViolation {
                    violations: vec![crate::error::SchemaIssue {
                        pointer: format!("{pointer}/name"),
                        message: format!(
                            "component name `{}` is declared more than once",
                            component.name
                        ),
                    }],
                });
            }
            components.push(component);
        }

        Ok(Manifest {
            service,
            owner: raw.owner,
            compliance_framework,
            environments: raw.environments,
            components,
            governance: raw.governance,
            labels: raw.labels,
        })
    }
}

fn convert_component(raw: RawComponent, index: usize) -> Result<ComponentSpec, CompileError> {
    let pointer = format!("/components/{index}/name");
    let name = ComponentName::parse(raw.name, &pointer)?;

    let mut binds = Vec::with_capacity(raw.binds.len());
    for (bind_index, raw_bind) in raw.binds.into_iter().enumerate() {
        let bind_pointer = format!("/components/{index}/binds/{bind_index}");
        let to = ComponentName::parse(raw_bind.to, &format!("{bind_pointer}/to"))?;
        let capability = CapabilityKey::parse(&raw_bind.capability).map_err(|reason| {
            CompileError::UnknownCapability {
                capability: raw_bind.capability.clone(),
                reason,
                pointer: format!("{bind_pointer}/capability"),
            }
        })?;
        binds.push(BindingRequest {
            to,
            capability,
            access: raw_bind.access,
            env: raw_bind.env,
            options: normalize_section(raw_bind.options),
        });
    }

    let policy = match raw.policy {
        None => None,
        Some(raw_policy) => {
            let justification = raw_policy
                .justification
                .filter(|text| !text.trim().is_empty())
                .ok_or_else(|| CompileError::SchemaViolation {
                    violations: vec![crate::error::SchemaIssue {
                        pointer: format!("/components/{index}/policy/justification"),
                        message: format!(
                            "policy overrides on `{name}` require a non-empty justification"
                        ),
                    }],
                })?;
            Some(PolicySpec {
                overrides: normalize_section(raw_policy.overrides),
                justification,
            })
        }
    };

    Ok(ComponentSpec {
        name,
        type_tag: raw.type_tag,
        config: normalize_section(raw.config),
        binds,
        overrides: normalize_section(raw.overrides),
        policy,
        labels: raw.labels,
    })
}

/// Absent mappings decode as `null`; treat them as empty objects so the
/// merge layers do not interpret absence as a delete marker.
fn normalize_section(value: Value) -> Value {
    match value {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    }
}
