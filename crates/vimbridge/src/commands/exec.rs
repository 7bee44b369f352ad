use libvimbridge_core::BridgeError;

use crate::cli::Cli;
use crate::commands::with_agent;

pub fn run(cli: &Cli, command: &str) -> Result<(), BridgeError> {
    if command.trim().is_empty() {
        return Err(BridgeError::InvalidArgs("command must not be empty".to_string()));
    }
    with_agent(cli, |_, agent| agent.execute(command))
}
