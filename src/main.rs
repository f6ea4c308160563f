use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::Parser;

use localdeploy_cli::{cli, commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();
    let command = args.command.name();
    logging::init_subscriber(args.verbose, command);
    let log = logging::Logger::new(command);

    let cancel = log.cancel_flag();
    // First Ctrl-C stops the run after the current file; a second one exits.
    if let Err(e) = ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
    }) {
        log.warn(&format!("cannot install Ctrl-C handler: {e}"));
    }

    match args.command {
        cli::Command::Deploy(opts) => commands::deploy::run(&args.global, &opts, &log),
        cli::Command::Plan(opts) => commands::plan::run(&args.global, &opts, &log),
        cli::Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
