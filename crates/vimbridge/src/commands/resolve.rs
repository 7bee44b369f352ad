//! Name resolution without touching the editor

use std::path::Path;

use libvimbridge_core::translate::Intent;
use libvimbridge_core::BridgeError;

use crate::cli::Cli;
use crate::context::BridgeContext;
use crate::output::{output_success, print_human};

pub fn run(
    cli: &Cli,
    name: &str,
    class: bool,
    method: Option<&str>,
    file: Option<&Path>,
) -> Result<(), BridgeError> {
    let ctx = BridgeContext::resolve(cli)?;
    let translator = ctx.translator()?;
    let file = file.map(|f| ctx.path(f));

    let intent = match (class, method) {
        (true, Some(method)) => Intent::method(name, method, file),
        (true, None) => Intent::class(name, file),
        (false, _) => Intent::function(name, file),
    };
    let location = translator.resolve(&intent)?;

    output_success(
        cli,
        serde_json::json!({
            "target": intent.target.to_string(),
            "kind": intent.target.kind(),
            "resolver": translator.resolver_name(),
            "path": location.path,
            "line": location.line,
            "patterns": location.patterns,
        }),
    );
    print_human(cli, &format!("{} {} -> {}", intent.target.kind(), intent.target, location));
    for pattern in &location.patterns {
        print_human(cli, &format!("  search: /{}", pattern));
    }
    Ok(())
}
