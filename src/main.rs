use std::process;

use clap::Parser;
use svc_dev::cli::{Cli, Command};
use svc_dev::error::CompileError;
use svc_dev::output::Printer;
use svc_dev::{
    deploy_cmd, destroy_cmd, diff_cmd, discovery, init_cmd, plan_cmd, validate_cmd,
};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let user_config = svc_dev::config::SvcConfig::load().unwrap_or_default();
    let color_never = user_config.output.color.as_deref() == Some("never");
    let printer = Printer::new(cli.ci, color_never);

    match dispatch(&cli, &printer) {
        Ok(code) => process::exit(code),
        Err(err) => {
            let code = match err.downcast_ref::<CompileError>() {
                Some(compile_err) => {
                    printer.compile_error(compile_err);
                    compile_err.exit_code()
                }
                None => {
                    printer.error(&format!("{err:#}"));
                    1
                }
            };
            process::exit(code)
        }
    }
}

fn dispatch(cli: &Cli, printer: &Printer) -> anyhow::Result<i32> {
    match &cli.command {
        Command::Init(args) => init_cmd::run(args, printer),
        Command::Validate(_) => {
            let manifest = discovery::find_manifest(cli.file.as_deref())?;
            validate_cmd::run(&manifest, printer)
        }
        Command::Plan(args) => {
            let manifest = discovery::find_manifest(cli.file.as_deref())?;
            plan_cmd::run(&manifest, &args.env, args.out.as_deref(), printer)
        }
        Command::Diff(args) => {
            let manifest = discovery::find_manifest(cli.file.as_deref())?;
            diff_cmd::run(&manifest, &args.env, args.region.as_deref(), printer)
        }
        Command::Up(args) => {
            let manifest = discovery::find_manifest(cli.file.as_deref())?;
            deploy_cmd::run(&manifest, &args.env, printer)
        }
        Command::Destroy(args) => {
            let manifest = discovery::find_manifest(cli.file.as_deref())?;
            destroy_cmd::run(&manifest, &args.env, args.yes, args.json, printer)
        }
    }
}

fn init_logging(verbose: bool) {
    let directive = if verbose {
        "debug".to_string()
    } else {
        std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".into())
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(directive))
        .with_writer(std::io::stderr)
        .try_init();
}
