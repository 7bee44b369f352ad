//! Editor server management commands

use chrono::{TimeZone, Utc};
use libvimbridge_core::BridgeError;
use libvimbridge_server::ServerLock;
use tracing::debug;

use crate::cli::{Cli, ServerCommand};
use crate::context::BridgeContext;
use crate::output::{output_success, print_human};

pub fn run(cli: &Cli, cmd: ServerCommand) -> Result<(), BridgeError> {
    let ctx = BridgeContext::resolve(cli)?;
    match cmd {
        ServerCommand::Start => start(cli, &ctx),
        ServerCommand::Stop => stop(cli, &ctx),
        ServerCommand::Status => status(cli, &ctx),
    }
}

fn start(cli: &Cli, ctx: &BridgeContext) -> Result<(), BridgeError> {
    let endpoint = ctx.endpoint();
    let mut supervisor = ctx.supervisor();

    let current = supervisor.status(&endpoint)?;
    if current.running && current.reachable {
        output_success(
            cli,
            serde_json::json!({
                "started": false,
                "reason": "Editor server already running",
                "pid": current.pid,
                "endpoint": current.endpoint.to_string(),
            }),
        );
        match current.pid {
            Some(pid) => print_human(cli, &format!("Editor server already running (PID {})", pid)),
            None => print_human(cli, "Editor server already running"),
        }
        return Ok(());
    }
    if current.pid.is_some() {
        debug!("Removing stale server lock");
        ServerLock::remove(&ctx.state_dir)?;
    }

    let binary = supervisor.ensure_available()?;
    let pid = supervisor.start(&endpoint)?;

    output_success(
        cli,
        serde_json::json!({
            "started": true,
            "pid": pid,
            "endpoint": endpoint.to_string(),
            "binary": binary.path,
            "kind": binary.kind,
        }),
    );
    print_human(cli, &format!("Editor server started (PID {})", pid));
    print_human(cli, &format!("  Endpoint: {}", endpoint));
    print_human(cli, &format!("  Binary: {}", binary.path.display()));
    Ok(())
}

fn stop(cli: &Cli, ctx: &BridgeContext) -> Result<(), BridgeError> {
    let stopped = ctx.supervisor().stop()?;
    output_success(cli, serde_json::json!({ "stopped": stopped }));
    if stopped {
        print_human(cli, "Editor server stopped");
    } else {
        print_human(cli, "Editor server was not running");
    }
    Ok(())
}

fn status(cli: &Cli, ctx: &BridgeContext) -> Result<(), BridgeError> {
    let status = ctx.supervisor().status(&ctx.endpoint())?;
    output_success(cli, &status);

    if status.running || status.reachable {
        print_human(cli, &format!("Editor server running on {}", status.endpoint));
        if let Some(pid) = status.pid {
            print_human(cli, &format!("  PID: {}", pid));
        }
        if let Some(binary) = &status.binary {
            print_human(cli, &format!("  Binary: {}", binary.display()));
        }
        if let Some(started) = status.started_ts.and_then(|ts| Utc.timestamp_millis_opt(ts).single()) {
            print_human(cli, &format!("  Started: {}", started.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if !status.reachable {
            print_human(cli, "  Endpoint is not accepting connections");
        }
    } else {
        print_human(cli, &format!("Editor server not running ({})", status.endpoint));
    }
    Ok(())
}
