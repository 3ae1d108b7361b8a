use crate::error::CompileError;
use crate::manifest::AccessLevel;

use super::{
    AccessGrant, BinderStrategy, BindingContext, BindingResult, COMPUTE_SOURCES, inject_env,
};

/// Wires a compute source to a sibling `api:rest` capability (service-to-
/// service invocation).
pub struct RestApiBinder;

impl BinderStrategy for RestApiBinder {
    fn capability(&self) -> &'static str {
        "api:rest"
    }

    fn source_types(&self) -> &'static [&'static str] {
        COMPUTE_SOURCES
    }

    fn supported_access(&self) -> &'static [AccessLevel] {
        &[AccessLevel::Execute]
    }

    fn bind(&self, ctx: &BindingContext<'_>) -> Result<BindingResult, CompileError> {
        let env_vars = inject_env(ctx, &["url"])?;

        Ok(BindingResult {
            env_vars,
            grants: vec![AccessGrant {
                resource: format!("api/{}", ctx.target_component),
                access: ctx.access,
                actions: vec!["api:invoke"],
            }],
            ..BindingResult::default()
        })
    }
}
