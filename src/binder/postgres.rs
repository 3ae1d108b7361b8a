use crate::error::CompileError;
use crate::manifest::{AccessLevel, ComplianceFramework};

use super::{
    AccessGrant, BinderStrategy, BindingContext, BindingResult, COMPUTE_SOURCES,
    NetworkRequirement, PostBindConstraint, inject_env,
};

/// Wires a compute source to a `db:postgres` capability: connection env
/// vars, a credentials grant, and shared security-group reachability.
pub struct PostgresBinder;

impl BinderStrategy for PostgresBinder {
    fn capability(&self) -> &'static str {
        "db:postgres"
    }

    fn source_types(&self) -> &'static [&'static str] {
        COMPUTE_SOURCES
    }

    fn supported_access(&self) -> &'static [AccessLevel] {
        &[
            AccessLevel::Read,
            AccessLevel::Write,
            AccessLevel::ReadWrite,
            AccessLevel::Admin,
        ]
    }

    fn bind(&self, ctx: &BindingContext<'_>) -> Result<BindingResult, CompileError> {
        let env_vars = inject_env(ctx, &["host", "port", "dbName", "secretArn"])?;

        let actions: Vec<&'static str> = match ctx.access {
            AccessLevel::Read => vec!["db:connect", "db:select", "secret:read"],
            AccessLevel::Write => vec!["db:connect", "db:modify", "secret:read"],
            AccessLevel::ReadWrite => vec!["db:connect", "db:select", "db:modify", "secret:read"],
            AccessLevel::Admin => vec!["db:connect", "db:all", "secret:read"],
            _ => unreachable!("guarded by supported_access"),
        };

        let security_group_id = ctx
            .capability_data
            .get("securityGroupId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let mut constraints = Vec::new();
        if ctx.framework.is_fedramp() {
            constraints.push(PostBindConstraint {
                rule: "encryption-in-transit".into(),
                detail: "database connections must negotiate TLS under fedramp frameworks".into(),
            });
        }

        Ok(BindingResult {
            env_vars,
            grants: vec![AccessGrant {
                resource: format!("db/{}", ctx.target_component),
                access: ctx.access,
                actions,
            }],
            network: vec![NetworkRequirement::SharedSecurityGroup { security_group_id }],
            constraints,
            warnings: match ctx.access {
                AccessLevel::Admin if ctx.framework != ComplianceFramework::Commercial => vec![
                    format!(
                        "`{}` requests admin access to `{}`; prefer readwrite",
                        ctx.source_component, ctx.target_component
                    ),
                ],
                _ => Vec::new(),
            },
        })
    }
}
