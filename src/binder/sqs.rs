use crate::error::CompileError;
use crate::manifest::AccessLevel;

use super::{
    AccessGrant, BinderStrategy, BindingContext, BindingResult, COMPUTE_SOURCES, inject_env,
};

/// Wires a compute source to a `queue:sqs` capability.
pub struct SqsBinder;

impl BinderStrategy for SqsBinder {
    fn capability(&self) -> &'static str {
        "queue:sqs"
    }

    fn source_types(&self) -> &'static [&'static str] {
        COMPUTE_SOURCES
    }

    fn supported_access(&self) -> &'static [AccessLevel] {
        &[
            AccessLevel::Publish,
            AccessLevel::Consume,
            AccessLevel::Read,
            AccessLevel::Write,
        ]
    }

    fn bind(&self, ctx: &BindingContext<'_>) -> Result<BindingResult, CompileError> {
        let env_vars = inject_env(ctx, &["queueUrl", "queueArn"])?;

        let actions: Vec<&'static str> = match ctx.access {
            AccessLevel::Publish | AccessLevel::Write => vec!["queue:send"],
            AccessLevel::Consume => vec!["queue:receive", "queue:delete", "queue:change-visibility"],
            AccessLevel::Read => vec!["queue:receive", "queue:attributes"],
            _ => unreachable!("guarded by supported_access"),
        };

        Ok(BindingResult {
            env_vars,
            grants: vec![AccessGrant {
                resource: format!("queue/{}", ctx.target_component),
                access: ctx.access,
                actions,
            }],
            ..BindingResult::default()
        })
    }
}
