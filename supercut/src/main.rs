use std::{
    io,
    panic,
    process,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing::{debug, level_filters::LevelFilter, warn};

use crate::{
    commands::{
        check::check_handler,
        edit::edit_handler,
        export::export_handler,
        search::{list_handler, names_handler, preview_handler, render_handler},
        Commands,
        Session,
        SupercutCli,
    },
    configuration::Configuration,
    logging::init_logging,
};

mod commands;
mod configuration;
mod logging;

pub const DEFAULT_CONFIG_PATH: &str = "./supercut.json";

fn main() -> Result<()> {
    let orig_hook = panic::take_hook();
    // Catch panics in child threads
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(1);
    }));
    run()
}

fn run() -> Result<()> {
    let cli = SupercutCli::parse();

    if let Commands::Completions {
        shell,
    } = cli.command
    {
        clap_complete::generate(shell, &mut SupercutCli::command(), "supercut", &mut io::stdout());
        return Ok(());
    }

    let console_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let _guard = init_logging(console_level, cli.logs.as_deref(), LevelFilter::DEBUG)?;

    let configuration = Configuration::load(&cli.config_file)?.unwrap_or_default();
    debug!("configuration: {configuration:?}");

    let session = Session {
        configuration,
        cancelled: cancellation_flag(),
    };

    match &cli.command {
        Commands::Render {
            search,
            output,
        } => render_handler(&session, search, output),
        Commands::Preview {
            search,
        } => preview_handler(&session, search),
        Commands::List {
            search,
        } => list_handler(&session, search),
        Commands::Names {
            videos,
            query,
            library,
        } => names_handler(&session, videos, query, library),
        Commands::Edit {
            subcommand,
        } => edit_handler(&session, subcommand),
        Commands::Export {
            format,
            search,
            listfile,
            output,
            title,
        } => export_handler(&session, *format, search, listfile.as_deref(), output.as_deref(), title),
        Commands::Check => check_handler(&session),
        Commands::Completions {
            ..
        } => Ok(()),
    }
}

/// Set on the first Ctrl-C. A second one ends the process immediately.
fn cancellation_flag() -> Arc<AtomicBool> {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    let installed = ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            process::exit(130);
        }
        warn!("cancelling, press Ctrl-C again to exit immediately");
    });
    if let Err(e) = installed {
        warn!("failed to install Ctrl-C handler: {e}");
    }

    cancelled
}
