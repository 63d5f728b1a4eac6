//! jvm-vendors - Java runtime buildpack
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use jvm_vendors::cli::{Cli, Commands, LogFormat};
use jvm_vendors::config::process_env;
use jvm_vendors::error::JvmResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> JvmResult<ExitCode> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("jvm_vendors=warn"),
        1 => EnvFilter::new("jvm_vendors=info"),
        _ => EnvFilter::new("jvm_vendors=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let env = process_env();

    match cli.command {
        Commands::Detect(args) => jvm_vendors::cli::commands::detect(args, &env),
        Commands::Build(args) => {
            jvm_vendors::cli::commands::build(args, &env).map(|()| ExitCode::SUCCESS)
        }
        Commands::HeapDump => {
            jvm_vendors::cli::commands::heap_dump(&env).map(|()| ExitCode::SUCCESS)
        }
    }
}
