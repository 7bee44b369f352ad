//! File commands

use libvimbridge_core::BridgeError;

use crate::cli::{Cli, FileCommand};
use crate::commands::{read_content, with_agent};

pub fn run(cli: &Cli, cmd: FileCommand) -> Result<(), BridgeError> {
    match cmd {
        FileCommand::Open { path } => with_agent(cli, |_, agent| agent.open(&path)),
        FileCommand::Create { path, content } => with_agent(cli, |ctx, agent| {
            let content = read_content(ctx, &content)?.unwrap_or_default();
            agent.create_file(&path, &content)
        }),
    }
}
