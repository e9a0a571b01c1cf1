use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::mutation::Mutation;
use crate::registry::{HandlerRegistry, TriggerKey};
use crate::types::{ChangeEvent, TableId, TableMapEvent, TableName};

/// Dispatches change events to the handler chains of a frozen [`HandlerRegistry`].
///
/// Row events that only carry a table id are resolved through the table map events seen so far.
#[derive(Debug)]
pub struct EventRouter {
    registry: Arc<HandlerRegistry>,
    table_map: HashMap<TableId, TableName>,
}

impl EventRouter {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            table_map: HashMap::new(),
        }
    }

    /// Records the table a table id refers to. A later mapping of the same id replaces it.
    pub fn handle_table_map(&mut self, event: &TableMapEvent) {
        self.table_map.insert(event.table_id, event.table.clone());
    }

    /// Returns the table `event` changed, if it can be resolved.
    pub fn resolve<'a>(&'a self, event: &'a ChangeEvent) -> Option<&'a TableName> {
        event
            .table
            .as_ref()
            .or_else(|| self.table_map.get(&event.table_id))
    }

    /// Runs every handler registered for the table and kind of `event`, in registration order,
    /// and returns the mutations they produced.
    ///
    /// Events on unknown or untracked tables produce no mutations.
    pub fn route(&self, event: &ChangeEvent) -> Vec<Mutation> {
        let Some(table) = self.resolve(event) else {
            debug!(
                table_id = event.table_id,
                "dropping {} event for unmapped table id", event.kind()
            );

            return vec![];
        };

        let key = TriggerKey::new(table.clone(), event.kind());
        let handlers = self.registry.handlers(&key);
        if handlers.is_empty() {
            debug!("dropping {} event for untracked table {}", event.kind(), table);

            return vec![];
        }

        handlers
            .iter()
            .flat_map(|handler| handler.handle(&event.rows))
            .collect()
    }
}
