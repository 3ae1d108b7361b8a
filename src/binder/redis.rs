use crate::error::CompileError;
use crate::manifest::AccessLevel;

use super::{
    AccessGrant, BinderStrategy, BindingContext, BindingResult, COMPUTE_SOURCES,
    NetworkRequirement, inject_env,
};

/// Wires a compute source to a `cache:redis` capability. Caches live
/// inside the service network, so reachability rides a shared security
/// group like databases do.
pub struct RedisBinder;

impl BinderStrategy for RedisBinder {
    fn capability(&self) -> &'static str {
        "cache:redis"
    }

    fn source_types(&self) -> &'static [&'static str] {
        COMPUTE_SOURCES
    }

    fn supported_access(&self) -> &'static [AccessLevel] {
        &[AccessLevel::Read, AccessLevel::ReadWrite]
    }

    fn bind(&self, ctx: &BindingContext<'_>) -> Result<BindingResult, CompileError> {
        let env_vars = inject_env(ctx, &["host", "port"])?;

        let actions: Vec<&'static str> = match ctx.access {
            AccessLevel::Read => vec!["cache:get"],
            AccessLevel::ReadWrite => vec!["cache:get", "cache:set", "cache:expire"],
            _ => unreachable!("guarded by supported_access"),
        };

        let security_group_id = ctx
            .capability_data
            .get("securityGroupId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(BindingResult {
            env_vars,
            grants: vec![AccessGrant {
                resource: format!("cache/{}", ctx.target_component),
                access: ctx.access,
                actions,
            }],
            network: vec![NetworkRequirement::SharedSecurityGroup { security_group_id }],
            ..BindingResult::default()
        })
    }
}
