//! Configuration store CLI.

use clap::{ColorChoice, Parser};
use satis_cli::cli::{Cli, Command, LogFormatArg};
use satis_cli::commands::{
    resolve_guard_config, run_backup, run_backups, run_show, run_write, suggestion_for,
};
use satis_cli::logging::{LogConfig, LogFormat, init_logging};
use satis_persistence::FilePersister;
use std::io::{self, IsTerminal};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }

    let exit_code = match run(&cli) {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error:#}");
            if let Some(hint) = suggestion_for(&error) {
                eprintln!("hint: {hint}");
            }
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let persister = FilePersister::new(resolve_guard_config(&cli.guard)?);
    let mut stdout = io::stdout().lock();
    match &cli.command {
        Command::Show => run_show(&persister, &mut stdout),
        Command::Write(args) => run_write(&persister, args),
        Command::Backup => run_backup(&persister, &mut stdout),
        Command::Backups(args) => run_backups(&persister, args, &mut stdout),
    }
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !cli.verbosity.is_present();
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
