pub mod changes;
pub mod edit;
pub mod exec;
pub mod file;
pub mod resolve;
pub mod server;

use std::fs;

use libvimbridge_agent::{EditorAgent, OpOutcome};
use libvimbridge_core::BridgeError;
use libvimbridge_rpc::Session;
use tracing::debug;

use crate::cli::{Cli, ContentArgs};
use crate::context::BridgeContext;
use crate::output::output_outcome;

/// Run one editing operation in a fresh session.
///
/// Whatever the operation recorded is journaled, even when it fails part
/// way through.
pub fn with_agent<F>(cli: &Cli, op: F) -> Result<(), BridgeError>
where
    F: FnOnce(&BridgeContext, &mut EditorAgent<Session>) -> Result<OpOutcome, BridgeError>,
{
    let ctx = BridgeContext::resolve(cli)?;
    let mut agent = ctx.connect()?;
    let result = op(&ctx, &mut agent);

    let mut journal = ctx.journal()?;
    if journal.append(agent.get_changes(None)) > 0 {
        journal.save()?;
    }
    if let Err(e) = agent.close() {
        debug!(error = %e, "Session close failed");
    }

    let outcome = result?;
    output_outcome(cli, &outcome);
    Ok(())
}

/// Inline content, the named file's content, or nothing
pub fn read_content(ctx: &BridgeContext, args: &ContentArgs) -> Result<Option<String>, BridgeError> {
    match (&args.content, &args.content_file) {
        (Some(content), _) => Ok(Some(content.clone())),
        (None, Some(path)) => Ok(Some(fs::read_to_string(ctx.path(path))?)),
        (None, None) => Ok(None),
    }
}
