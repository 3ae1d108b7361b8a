use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::manifest::ComplianceFramework;

#[derive(Parser, Debug)]
#[command(name = "svc")]
#[command(version)]
#[command(about = "Declarative service platform compiler")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    /// Explicit manifest path (default: discover service.yml upward)
    #[arg(short = 'f', long = "file", global = true)]
    pub file: Option<PathBuf>,
    /// Structured JSON output, one object per line
    #[arg(long = "ci", global = true)]
    pub ci: bool,
    /// Debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scaffold a new service.yml
    Init(InitArgs),
    /// Parse and schema-validate the manifest
    Validate(ValidateArgs),
    /// Compile the full deployment plan for one environment
    Plan(PlanArgs),
    /// Compare the current plan with the recorded deployment
    Diff(DiffArgs),
    /// Compile and record the deployment (backend emission delegated)
    #[command(alias = "deploy")]
    Up(UpArgs),
    /// Remove the recorded deployment for an environment
    Destroy(DestroyArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Service identifier (lowercase-hyphenated)
    #[arg(long = "name")]
    pub name: String,
    /// Owning team
    #[arg(long = "owner")]
    pub owner: String,
    /// Compliance framework
    #[arg(long = "framework", default_value = "commercial", value_enum)]
    pub framework: FrameworkArg,
    /// Starter component layout
    #[arg(long = "pattern", default_value = "empty", value_enum)]
    pub pattern: PatternArg,
}

#[derive(Args, Debug, Default)]
pub struct ValidateArgs {}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Target environment name
    #[arg(long = "env", value_name = "NAME")]
    pub env: String,
    /// Write the plan to a file instead of stdout
    #[arg(long = "out", value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Target environment name
    #[arg(long = "env", value_name = "NAME")]
    pub env: String,
    /// Region the deployment record is scoped to
    #[arg(long = "region")]
    pub region: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpArgs {
    /// Target environment name
    #[arg(long = "env", value_name = "NAME")]
    pub env: String,
}

#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Target environment name
    #[arg(long = "env", value_name = "NAME")]
    pub env: String,
    /// Skip the confirmation prompt
    #[arg(long = "yes")]
    pub yes: bool,
    /// Emit the result as JSON
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum FrameworkArg {
    Commercial,
    FedrampModerate,
    FedrampHigh,
}

impl From<FrameworkArg> for ComplianceFramework {
    fn from(value: FrameworkArg) -> Self {
        match value {
            FrameworkArg::Commercial => ComplianceFramework::Commercial,
            FrameworkArg::FedrampModerate => ComplianceFramework::FedrampModerate,
            FrameworkArg::FedrampHigh => ComplianceFramework::FedrampHigh,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PatternArg {
    Empty,
    LambdaApiWithDb,
    WorkerWithQueue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_plan_with_global_flags() {
        let cli = Cli::parse_from([
            "svc", "plan", "--env", "qa", "--ci", "--file", "custom/service.yml",
        ]);
        let Command::Plan(args) = cli.command else {
            panic!("expected plan variant");
        };
        assert_eq!(args.env, "qa");
        assert!(cli.ci);
        assert_eq!(
            cli.file.as_ref().map(|p| p.display().to_string()),
            Some("custom/service.yml".into())
        );
    }

    #[test]
    fn deploy_is_an_alias_for_up() {
        let cli = Cli::parse_from(["svc", "deploy", "--env", "prod"]);
        let Command::Up(args) = cli.command else {
            panic!("expected up variant");
        };
        assert_eq!(args.env, "prod");
    }

    #[test]
    fn init_parses_framework_and_pattern() {
        let cli = Cli::parse_from([
            "svc",
            "init",
            "--name",
            "checkout",
            "--owner",
            "team-payments",
            "--framework",
            "fedramp-moderate",
            "--pattern",
            "lambda-api-with-db",
        ]);
        let Command::Init(args) = cli.command else {
            panic!("expected init variant");
        };
        assert!(matches!(args.framework, FrameworkArg::FedrampModerate));
        assert!(matches!(args.pattern, PatternArg::LambdaApiWithDb));
    }

    #[test]
    fn destroy_parses_confirmation_flags() {
        let cli = Cli::parse_from(["svc", "destroy", "--env", "qa", "--yes", "--json"]);
        let Command::Destroy(args) = cli.command else {
            panic!("expected destroy variant");
        };
        assert!(args.yes);
        assert!(args.json);
    }
}
