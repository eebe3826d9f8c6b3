//! `shellward`: inspect the confinement profile and run commands through it.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use shellward::core::profile::compile_profile;
use shellward::exit_codes;
use shellward::fallback::FallbackNegotiator;
use shellward::hooks::{AllowFallback, DeclineFallback, FallbackApprover};
use shellward::io::config::{AgentConfig, DEFAULT_CONFIG_FILE, load_config};
use shellward::io::sandbox::{LAUNCHER, build_executor, confinement_available};
use shellward::logging;

#[derive(Parser)]
#[command(
    name = "shellward",
    version,
    about = "Run shell commands under a default-deny confinement profile"
)]
struct Cli {
    /// Config file. Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the compiled confinement profile.
    Profile,
    /// Show whether commands would run confined.
    Status,
    /// Run one command through the executor.
    Exec {
        /// Re-run unconfined if the profile denies the command.
        #[arg(long)]
        allow_fallback: bool,

        /// Command text, passed to `sh -c` as one string.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli.config)?;
    match cli.command {
        Command::Profile => cmd_profile(&config),
        Command::Status => cmd_status(&config, &cli.config),
        Command::Exec {
            allow_fallback,
            command,
        } => cmd_exec(&config, &command.join(" "), allow_fallback),
    }
}

fn cmd_profile(config: &AgentConfig) -> Result<i32> {
    print!("{}", compile_profile(&config.sandbox));
    Ok(exit_codes::OK)
}

fn cmd_status(config: &AgentConfig, path: &Path) -> Result<i32> {
    let executor = build_executor(&config.sandbox, config.output_limit_bytes);
    let source = if path.exists() {
        path.display().to_string()
    } else {
        "defaults".to_string()
    };
    println!("config: {source}");
    println!("confinement enabled: {}", config.sandbox.enabled);
    println!("{LAUNCHER} available: {}", confinement_available());
    println!(
        "executor: {}",
        if executor.is_confined() {
            "sandboxed"
        } else {
            "passthrough"
        }
    );
    println!("network allowed: {}", config.sandbox.allow_network);
    println!(
        "fallback outside sandbox: {}",
        config.sandbox.fallback_outside_sandbox
    );
    Ok(exit_codes::OK)
}

fn cmd_exec(config: &AgentConfig, command: &str, allow_fallback: bool) -> Result<i32> {
    let executor = build_executor(&config.sandbox, config.output_limit_bytes);
    let negotiator = FallbackNegotiator::new(
        executor,
        config.sandbox.fallback_outside_sandbox,
        config.output_limit_bytes,
    );
    let approver: &dyn FallbackApprover = if allow_fallback {
        &AllowFallback
    } else {
        &DeclineFallback
    };

    let result = negotiator.run(command, approver);
    print!("{}", result.output);
    if let Some(meta) = result.exec_meta.as_ref().filter(|meta| meta.sandbox_error) {
        eprintln!("blocked: {}", meta.sandbox_reason);
    }
    if result.output.is_empty() {
        if let Some(error) = result.error.as_deref() {
            eprintln!("error: {error}");
        }
    }
    eprintln!("{}", result.status);

    Ok(if result.success {
        exit_codes::OK
    } else if result.is_sandbox_denial() {
        exit_codes::BLOCKED
    } else {
        exit_codes::FAILED
    })
}
