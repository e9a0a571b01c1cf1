use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::mutation::Mutation;
use crate::types::{EventKind, RowChanges, TableName};
use crate::views::{CompiledView, Projection};

/// Source table and event kind a handler is triggered by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    pub table: TableName,
    pub kind: EventKind,
}

impl TriggerKey {
    pub fn new(table: TableName, kind: EventKind) -> Self {
        Self { table, kind }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.kind)
    }
}

/// Mutation generating function of one view for one source table.
#[derive(Debug, Clone)]
pub struct Handler {
    projection: Arc<Projection>,
}

impl Handler {
    pub fn new(projection: Arc<Projection>) -> Self {
        Self { projection }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Returns the mutations implied by `changes`, at most one per row image.
    pub fn handle(&self, changes: &RowChanges) -> Vec<Mutation> {
        self.projection.project(changes)
    }
}

/// Ordered handler chains keyed by [`TriggerKey`].
///
/// Chains are append-only. Every handler registered for a key runs on each matching event, in
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    chains: HashMap<TriggerKey, Vec<Handler>>,
    init_statements: Vec<String>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the chain of `key`.
    pub fn register(&mut self, key: TriggerKey, handler: Handler) {
        self.chains.entry(key).or_default().push(handler);
    }

    /// Appends all handlers and init statements of a compiled view.
    pub fn append(&mut self, view: CompiledView) {
        for (key, handler) in view.triggers {
            self.register(key, handler);
        }
        self.init_statements.extend(view.init_statements);
    }

    /// Appends every chain of `other` after the chains of `self`.
    pub fn merge(&mut self, other: HandlerRegistry) {
        let HandlerRegistry {
            chains,
            init_statements,
        } = other;

        for (key, handlers) in chains {
            self.chains.entry(key).or_default().extend(handlers);
        }
        self.init_statements.extend(init_statements);
    }

    /// Returns the handler chain of `key`, empty when nothing is registered.
    pub fn handlers(&self, key: &TriggerKey) -> &[Handler] {
        self.chains.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the init statements of all views, in registration order.
    pub fn init_statements(&self) -> &[String] {
        &self.init_statements
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cell, Row};
    use crate::views::{ViewDefinition, compile};

    fn orders() -> TableName {
        TableName::new("shop", "orders")
    }

    #[test]
    fn views_sharing_a_trigger_are_chained_in_registration_order() {
        let mut registry = HandlerRegistry::new();
        registry.append(
            compile(&ViewDefinition::direct("orders_summary", "order_id", orders(), ["status"]))
                .unwrap(),
        );
        registry.append(
            compile(&ViewDefinition::direct("orders_archive", "order_id", orders(), ["status"]))
                .unwrap(),
        );

        let chain = registry.handlers(&TriggerKey::new(orders(), EventKind::Write));
        assert_eq!(chain.len(), 2);

        let changes = RowChanges::Write(vec![Row::new().with("order_id", 1).with("status", "new")]);
        let tables: Vec<String> = chain
            .iter()
            .flat_map(|handler| handler.handle(&changes))
            .map(|mutation| mutation.table().to_string())
            .collect();
        assert_eq!(tables, vec!["orders_summary", "orders_archive"]);
    }

    #[test]
    fn merge_appends_chains_and_init_statements() {
        let mut first = HandlerRegistry::new();
        first.append(
            compile(
                &ViewDefinition::direct("a", "id", orders(), ["status"]).with_init_statement("A"),
            )
            .unwrap(),
        );
        let mut second = HandlerRegistry::new();
        second.append(
            compile(
                &ViewDefinition::direct("b", "id", orders(), ["status"]).with_init_statement("B"),
            )
            .unwrap(),
        );

        first.merge(second);

        let chain = first.handlers(&TriggerKey::new(orders(), EventKind::Delete));
        let mutations: Vec<Mutation> = chain
            .iter()
            .flat_map(|handler| handler.handle(&RowChanges::Delete(vec![Row::new().with("id", 1)])))
            .collect();
        assert_eq!(
            mutations,
            vec![
                Mutation::delete("a", "id", Cell::I64(1)),
                Mutation::delete("b", "id", Cell::I64(1)),
            ]
        );
        assert_eq!(first.init_statements(), ["A", "B"]);
    }

    #[test]
    fn unknown_triggers_have_empty_chains() {
        let registry = HandlerRegistry::new();

        assert!(registry.is_empty());
        assert!(
            registry
                .handlers(&TriggerKey::new(orders(), EventKind::Update))
                .is_empty()
        );
    }

    #[test]
    fn appended_views_trigger_on_every_event_kind_of_their_sources() {
        let mut registry = HandlerRegistry::new();
        registry.append(
            compile(&ViewDefinition::direct("orders_summary", "order_id", orders(), ["status"]))
                .unwrap(),
        );

        assert!(!registry.is_empty());
        for kind in EventKind::ALL {
            assert_eq!(registry.handlers(&TriggerKey::new(orders(), kind)).len(), 1);
        }
        assert!(
            registry
                .handlers(&TriggerKey::new(TableName::new("shop", "shipments"), EventKind::Write))
                .is_empty()
        );
    }
}
