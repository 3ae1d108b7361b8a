use crate::error::CompileError;
use crate::manifest::AccessLevel;

use super::{
    AccessGrant, BinderStrategy, BindingContext, BindingResult, COMPUTE_SOURCES,
    PostBindConstraint, inject_env,
};

/// Wires a compute source to a `bucket:s3` capability.
pub struct S3Binder;

impl BinderStrategy for S3Binder {
    fn capability(&self) -> &'static str {
        "bucket:s3"
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
        let env_vars = inject_env(ctx, &["bucketName", "bucketArn"])?;

        let actions: Vec<&'static str> = match ctx.access {
            AccessLevel::Read => vec!["object:get", "object:list"],
            AccessLevel::Write => vec!["object:put", "object:delete"],
            AccessLevel::ReadWrite => vec!["object:get", "object:list", "object:put", "object:delete"],
            AccessLevel::Admin => vec!["object:all", "bucket:configure"],
            _ => unreachable!("guarded by supported_access"),
        };

        let mut constraints = Vec::new();
        if ctx.framework.is_fedramp() {
            constraints.push(PostBindConstraint {
                rule: "encryption-at-rest".into(),
                detail: "bucket objects must be encrypted at rest under fedramp frameworks".into(),
            });
        }

        Ok(BindingResult {
            env_vars,
            grants: vec![AccessGrant {
                resource: format!("bucket/{}", ctx.target_component),
                access: ctx.access,
                actions,
            }],
            constraints,
            ..BindingResult::default()
        })
    }
}
