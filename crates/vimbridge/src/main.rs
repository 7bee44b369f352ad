mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use libvimbridge_core::BridgeError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run_command(&cli) {
        output::output_error(&cli, &e);
        std::process::exit(e.exit_code());
    }
}

fn run_command(cli: &Cli) -> Result<(), BridgeError> {
    match &cli.command {
        Command::Server { cmd } => commands::server::run(cli, cmd.clone()),
        Command::File { cmd } => commands::file::run(cli, cmd.clone()),
        Command::Edit { cmd } => commands::edit::run(cli, cmd.clone()),
        Command::Exec { command } => commands::exec::run(cli, command),
        Command::Changes {
            file,
            format,
            reset,
        } => commands::changes::run(cli, file.as_deref(), *format, *reset),
        Command::Resolve {
            name,
            class,
            method,
            file,
        } => commands::resolve::run(cli, name, *class, method.as_deref(), file.as_deref()),
    }
}
