use std::path::Path;

use time::Date;
use tracing::debug;

use crate::binder::BinderMatrix;
use crate::capability::CapabilityRegistry;
use crate::component::ComponentRegistry;
use crate::config_builder::{ConfigBuilder, HydratedConfig};
use crate::error::CompileError;
use crate::governance;
use crate::hardening::PlatformDefaults;
use crate::ir::PlanIr;
use crate::loader;
use crate::manifest::{EnvironmentSpec, Manifest};
use crate::resolver::Resolver;
use crate::schema::SchemaRegistry;

/// The compiler: registries built once, stages run fail-fast in order
/// (Parse, SchemaValidate, ContextHydrate, SemanticValidate, Resolve).
pub struct Compiler {
    components: ComponentRegistry,
    capabilities: CapabilityRegistry,
    binders: BinderMatrix,
    schemas: SchemaRegistry,
}

impl Compiler {
    pub fn new() -> Result<Self, CompileError> {
        let components = ComponentRegistry::builtin();
        let schemas = SchemaRegistry::build(&components)?;
        Ok(Self {
            components,
            capabilities: CapabilityRegistry::builtin(),
            binders: BinderMatrix::builtin(),
            schemas,
        })
    }

    /// Stages 1-2: parse (with `$ref` inclusion) and schema-validate.
    pub fn validate(&self, manifest_path: &Path) -> Result<Manifest, CompileError> {
        debug!(path = %manifest_path.display(), "stage 1: parse");
        let (document, _report) = loader::load(manifest_path)?;
        debug!("stage 2: schema validate");
        self.schemas.validate_manifest(&document)?;
        Manifest::from_value(&document)
    }

    /// All stages, producing the plan for one environment.
    pub fn compile(&self, manifest_path: &Path, environment: &str) -> Result<PlanIr, CompileError> {
        self.compile_at_date(manifest_path, environment, governance::synthesis_date())
    }

    /// Deterministic entry point: the synthesis date is the only ambient
    /// input, so tests pin it.
    pub fn compile_at_date(
        &self,
        manifest_path: &Path,
        environment_name: &str,
        today: Date,
    ) -> Result<PlanIr, CompileError> {
        let manifest = self.validate(manifest_path)?;

        let Some(environment) = manifest.environment(environment_name).cloned() else {
            return Err(CompileError::UnresolvedEnvVar {
                key: environment_name.to_string(),
                environment: environment_name.to_string(),
                pointer: "/environments".into(),
            });
        };

        debug!("stage 3: context hydrate");
        let manifest_root = manifest_path.parent();
        let platform =
            PlatformDefaults::load(manifest.compliance_framework, manifest_root)?;
        let (hydrated, mut suppression_audit) =
            self.hydrate(&manifest, environment_name, &environment, &platform)?;

        debug!("stage 4: semantic validate");
        suppression_audit.extend(governance::evaluate(&manifest, today)?);
        let resolver = Resolver {
            components: &self.components,
            capabilities: &self.capabilities,
            binders: &self.binders,
        };
        resolver.validate_semantics(&manifest, &hydrated)?;

        debug!("resolving and emitting plan");
        let resolution = resolver.resolve(&manifest, environment_name, &environment, hydrated)?;

        Ok(PlanIr {
            service: manifest.service.to_string(),
            environment: environment_name.to_string(),
            compliance_framework: manifest.compliance_framework.to_string(),
            resolved_components: resolution.components,
            bindings: resolution.bindings,
            warnings: resolution.warnings,
            hardening_actions: resolution.hardening_actions,
            suppression_audit,
        })
    }

    fn hydrate(
        &self,
        manifest: &Manifest,
        environment_name: &str,
        environment: &EnvironmentSpec,
        platform: &PlatformDefaults,
    ) -> Result<(Vec<HydratedConfig>, Vec<crate::ir::SuppressionAuditEntry>), CompileError> {
        let builder = ConfigBuilder {
            components: &self.components,
            schemas: &self.schemas,
            platform,
            manifest,
            environment_name,
            environment,
        };
        let mut hydrated = Vec::with_capacity(manifest.components.len());
        let mut audit = Vec::new();
        for spec in &manifest.components {
            let mut config = builder.build(spec)?;
            if let Some(entry) = config.policy_audit.take() {
                audit.push(entry);
            }
            hydrated.push(config);
        }
        Ok((hydrated, audit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use time::macros::date;

    fn write_manifest(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("service.yml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn empty_component_list_compiles_to_an_empty_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "service: checkout\nowner: team\nenvironments:\n  qa:\n    defaults: {}\ncomponents: []\n",
        );
        let compiler = Compiler::new().unwrap();
        let plan = compiler
            .compile_at_date(&path, "qa", date!(2025 - 06 - 15))
            .unwrap();
        assert!(plan.resolved_components.is_empty());
        assert!(plan.bindings.is_empty());
    }

    #[test]
    fn unknown_environment_is_an_unresolved_env_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            "service: checkout\nenvironments:\n  qa:\n    defaults: {}\ncomponents: []\n",
        );
        let compiler = Compiler::new().unwrap();
        let err = compiler
            .compile_at_date(&path, "staging", date!(2025 - 06 - 15))
            .unwrap_err();
        assert_eq!(err.code(), "unresolved-env-var");
        assert!(err.to_string().contains("staging"));
    }

    #[test]
    fn single_component_plan_equals_platform_plus_fallback_merge() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            concat!(
                "service: checkout\n",
                "environments:\n",
                "  qa:\n",
                "    defaults: {}\n",
                "components:\n",
                "  - name: primary-db\n",
                "    type: rds-postgres\n",
            ),
        );
        let compiler = Compiler::new().unwrap();
        let plan = compiler
            .compile_at_date(&path, "qa", date!(2025 - 06 - 15))
            .unwrap();
        let db = &plan.resolved_components["primary-db"];
        // Fallback value survives where the platform layer is silent...
        assert_eq!(db.resolved_config.pointer("/port"), Some(&serde_json::json!(5432)));
        // ...and the commercial platform layer wins where it speaks.
        assert_eq!(
            db.resolved_config.pointer("/instance/class"),
            Some(&serde_json::json!("db.t3.medium"))
        );
        assert_eq!(db.source_layers, vec!["fallbacks", "platform"]);
    }

    #[test]
    fn compilation_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            dir.path(),
            concat!(
                "service: checkout\n",
                "environments:\n",
                "  qa:\n",
                "    defaults: {}\n",
                "components:\n",
                "  - name: user-api\n",
                "    type: lambda-api\n",
                "    binds:\n",
                "      - to: customer-db\n",
                "        capability: db:postgres\n",
                "        access: readwrite\n",
                "  - name: customer-db\n",
                "    type: rds-postgres\n",
            ),
        );
        let compiler = Compiler::new().unwrap();
        let first = compiler
            .compile_at_date(&path, "qa", date!(2025 - 06 - 15))
            .unwrap()
            .to_canonical_json()
            .unwrap();
        let second = compiler
            .compile_at_date(&path, "qa", date!(2025 - 06 - 15))
            .unwrap()
            .to_canonical_json()
            .unwrap();
        assert_eq!(first, second);
    }
}
