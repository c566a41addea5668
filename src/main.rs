mod cli;
mod config;
mod execution_mode;
mod folders;
mod form_state;
mod model;
mod sidebar;
mod source;
mod tui;

use clap::Parser;
use crossterm::tty::IsTty;
use std::fs::{File, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();

    // Bare invocation with a TTY → TUI
    // --interactive flag → TUI (even with other flags)
    // Otherwise → headless CLI
    let bare_tty = raw_args.len() == 1 && std::io::stdout().is_tty();
    let args = cli::Cli::parse();
    let interactive = bare_tty || args.interactive;

    if let Err(e) = launch(args, interactive) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn launch(args: cli::Cli, interactive: bool) -> anyhow::Result<()> {
    let workspace = cli::Workspace::open(args.workspace.as_deref())?;

    if interactive {
        init_tracing(&workspace, open_tui_log(&workspace));
        // the TUI restores its own saved route
        let route = args
            .current_flow
            .as_deref()
            .and_then(|arg| workspace.initial_route(Some(arg)));
        tui::run_tui(workspace.root, workspace.config, route)
    } else {
        init_tracing(&workspace, None);
        cli::run(args, &workspace)
    }
}

/// RUST_LOG wins over the `log` config key. The TUI logs to a file since it
/// owns the terminal.
fn init_tracing(workspace: &cli::Workspace, log_file: Option<File>) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| workspace.config.log.clone())
        .unwrap_or_else(|| "warn".into());
    let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match log_file {
        Some(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
}

fn open_tui_log(workspace: &cli::Workspace) -> Option<File> {
    let path = tui::state::log_path(&workspace.root);
    let dir = path.parent()?;
    std::fs::create_dir_all(dir).ok()?;
    OpenOptions::new().create(true).append(true).open(&path).ok()
}
