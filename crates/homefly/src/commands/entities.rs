//! Entity command handlers.

use homefly_core::Registry;

use crate::cli::{EntitiesArgs, EntitiesCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;

use super::util;

pub async fn handle(args: EntitiesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let core_config = config::build_core_config(global)?;
    let registry = Registry::new(core_config);
    registry.refresh("command").await;

    match args.command {
        EntitiesCommand::List { query } => {
            let entities = registry.list(query.as_deref());
            util::print_entities(&entities, global.output)
        }

        EntitiesCommand::Get { id } => {
            let id = util::parse_entity_id(&id)?;
            let entity = registry
                .get(&id)
                .ok_or_else(|| CliError::EntityNotFound { id: id.to_string() })?;
            if global.output == OutputFormat::Json {
                util::print_json(&entity)
            } else {
                util::print_entities(std::slice::from_ref(&entity), global.output)
            }
        }

        EntitiesCommand::Set {
            id,
            on,
            off,
            brightness,
        } => {
            let id = util::parse_entity_id(&id)?;
            let patch = util::patch_from_flags(on, off, brightness)?;
            let updated = registry.set(&id, patch).await?;
            util::print_entities(std::slice::from_ref(&updated), global.output)
        }
    }
}
