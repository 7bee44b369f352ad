//! Intent-level edit commands

use libvimbridge_core::BridgeError;

use crate::cli::{Cli, EditCommand};
use crate::commands::{read_content, with_agent};

pub fn run(cli: &Cli, cmd: EditCommand) -> Result<(), BridgeError> {
    match cmd {
        EditCommand::Function {
            name,
            file,
            content,
        } => with_agent(cli, |ctx, agent| {
            let content = read_content(ctx, &content)?;
            agent.edit_function(&name, file.as_deref(), content.as_deref())
        }),
        EditCommand::Class {
            name,
            method,
            file,
            content,
        } => with_agent(cli, |ctx, agent| {
            let content = read_content(ctx, &content)?;
            agent.edit_class(&name, method.as_deref(), file.as_deref(), content.as_deref())
        }),
        EditCommand::Import { path, statement } => {
            with_agent(cli, |_, agent| agent.add_import(&path, &statement))
        }
        EditCommand::InsertAfter {
            path,
            pattern,
            content,
        } => with_agent(cli, |ctx, agent| {
            let content = read_content(ctx, &content)?.ok_or_else(|| {
                BridgeError::InvalidArgs("insert-after needs --content or --content-file".to_string())
            })?;
            agent.insert_after_pattern(&path, &pattern, &content)
        }),
    }
}
