use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cli::{InitArgs, PatternArg};
use crate::discovery::MANIFEST_FILE;
use crate::manifest::{ComplianceFramework, ServiceName};
use crate::output::Printer;

/// `svc init`: write a starter manifest into the working directory.
pub fn run(args: &InitArgs, printer: &Printer) -> Result<i32> {
    ServiceName::parse(args.name.clone())
        .map_err(|err| anyhow::anyhow!("invalid --name: {err}"))?;

    let target = Path::new(MANIFEST_FILE);
    if target.exists() {
        bail!("{MANIFEST_FILE} already exists in this directory");
    }

    let framework: ComplianceFramework = args.framework.into();
    let contents = render(&args.name, &args.owner, framework, args.pattern);
    fs::write(target, contents).with_context(|| format!("failed to write {MANIFEST_FILE}"))?;

    printer.success(&format!(
        "scaffolded {MANIFEST_FILE} for `{}` ({})",
        args.name,
        framework.as_str()
    ));
    printer.info("next: svc validate, then svc plan --env dev");
    Ok(0)
}

fn render(name: &str, owner: &str, framework: ComplianceFramework, pattern: PatternArg) -> String {
    let mut out = String::new();
    out.push_str(&format!("service: {name}\n"));
    out.push_str(&format!("owner: {owner}\n"));
    out.push_str(&format!("complianceFramework: {}\n", framework.as_str()));
    out.push_str("environments:\n  dev:\n    defaults: {}\n  prod:\n    defaults: {}\n");
    match pattern {
        PatternArg::Empty => {
            out.push_str("components: []\n");
        }
        PatternArg::LambdaApiWithDb => {
            out.push_str(concat!(
                "components:\n",
                "  - name: api\n",
                "    type: lambda-api\n",
                "    binds:\n",
                "      - to: db\n",
                "        capability: db:postgres\n",
                "        access: readwrite\n",
                "  - name: db\n",
                "    type: rds-postgres\n",
            ));
        }
        PatternArg::WorkerWithQueue => {
            out.push_str(concat!(
                "components:\n",
                "  - name: worker\n",
                "    type: lambda-worker\n",
                "    binds:\n",
                "      - to: jobs\n",
                "        capability: queue:sqs\n",
                "        access: consume\n",
                "  - name: jobs\n",
                "    type: sqs-queue\n",
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_patterns_pass_validation() {
        let compiler = crate::pipeline::Compiler::new().unwrap();
        for pattern in [
            PatternArg::Empty,
            PatternArg::LambdaApiWithDb,
            PatternArg::WorkerWithQueue,
        ] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("service.yml");
            fs::write(
                &path,
                render(
                    "checkout",
                    "team-payments",
                    ComplianceFramework::Commercial,
                    pattern,
                ),
            )
            .unwrap();
            compiler
                .validate(&path)
                .unwrap_or_else(|err| panic!("{pattern:?}: {err}"));
        }
    }
}
