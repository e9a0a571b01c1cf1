use std::collections::HashSet;
use std::sync::Arc;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::registry::{Handler, TriggerKey};
use crate::types::{EventKind, TableName};
use crate::views::definition::{SourceBinding, ViewDefinition};
use crate::views::strategy::{Projection, ViewStrategy};

/// A view turned into handlers, ready to be merged into a [`crate::registry::HandlerRegistry`].
#[derive(Debug, Clone)]
pub struct CompiledView {
    pub name: String,
    /// Handlers in source binding order, each registered for every event kind.
    pub triggers: Vec<(TriggerKey, Handler)>,
    pub init_statements: Vec<String>,
}

/// Compiles `view` into one handler per source binding and event kind.
///
/// Invalid bindings are rejected here so that no configuration error can surface while streaming.
pub fn compile(view: &ViewDefinition) -> SyncResult<CompiledView> {
    if view.name.trim().is_empty() {
        bail!(ErrorKind::ConfigError, "View name cannot be empty");
    }

    if view.key.trim().is_empty() {
        bail!(
            ErrorKind::ConfigError,
            "View key cannot be empty",
            format!("View '{}' has no key column", view.name)
        );
    }

    if view.sources.is_empty() {
        bail!(
            ErrorKind::ConfigError,
            "View has no sources",
            format!("View '{}' is not bound to any source table", view.name)
        );
    }

    let mut triggers = Vec::with_capacity(view.sources.len() * EventKind::ALL.len());
    for binding in &view.sources {
        let strategy = select_strategy(view, binding)?;
        let handler = Handler::new(Arc::new(Projection::new(
            view.name.clone(),
            view.key.clone(),
            strategy,
        )));

        for kind in EventKind::ALL {
            triggers.push((TriggerKey::new(binding.table.clone(), kind), handler.clone()));
        }
    }

    Ok(CompiledView {
        name: view.name.clone(),
        triggers,
        init_statements: view.init_statements.clone(),
    })
}

/// Picks the strategy of `binding` from the fields it sets.
fn select_strategy(view: &ViewDefinition, binding: &SourceBinding) -> SyncResult<ViewStrategy> {
    let SourceBinding {
        table,
        value_columns,
        foreign_key,
        compute,
        join_key,
        filter,
    } = binding;

    match (compute, foreign_key) {
        (Some(_), Some(_)) => invalid_binding(
            view,
            table,
            "a computed binding cannot also declare a foreign key",
        ),
        (Some(_), None) if !value_columns.is_empty() => invalid_binding(
            view,
            table,
            "a computed binding derives its columns and cannot declare value columns",
        ),
        (Some(_), None) if filter.is_some() => invalid_binding(
            view,
            table,
            "filters are only supported on joined bindings",
        ),
        (Some(compute), None) => Ok(ViewStrategy::Computed {
            join_key: join_key.clone().unwrap_or_else(|| view.key.clone()),
            compute: compute.clone(),
        }),
        (None, _) if join_key.is_some() => invalid_binding(
            view,
            table,
            "a join key is only supported on computed bindings",
        ),
        (None, Some(_)) if value_columns.is_empty() => invalid_binding(
            view,
            table,
            "a joined binding needs at least one value column",
        ),
        (None, Some(foreign_key)) => Ok(ViewStrategy::Joined {
            value_columns: distinct_value_columns(view, binding)?,
            foreign_key: foreign_key.clone(),
            filter: filter.clone(),
        }),
        (None, None) if filter.is_some() => invalid_binding(
            view,
            table,
            "filters are only supported on joined bindings",
        ),
        (None, None) => Ok(ViewStrategy::Direct {
            value_columns: distinct_value_columns(view, binding)?,
        }),
    }
}

/// Returns the value columns of `binding`, rejecting duplicates and the view key.
///
/// Every value column maps to exactly one statement parameter, and the key column is never
/// assigned by a value column.
fn distinct_value_columns(
    view: &ViewDefinition,
    binding: &SourceBinding,
) -> SyncResult<Vec<String>> {
    let mut seen = HashSet::with_capacity(binding.value_columns.len());

    for column in &binding.value_columns {
        if *column == view.key {
            return invalid_binding(
                view,
                &binding.table,
                &format!("the view key '{column}' cannot also be a value column"),
            );
        }

        if !seen.insert(column.as_str()) {
            return invalid_binding(
                view,
                &binding.table,
                &format!("value column '{column}' is listed more than once"),
            );
        }
    }

    Ok(binding.value_columns.clone())
}

fn invalid_binding<T>(view: &ViewDefinition, table: &TableName, reason: &str) -> SyncResult<T> {
    bail!(
        ErrorKind::ConfigError,
        "Invalid source binding",
        format!(
            "The binding of view '{}' to table {table} is invalid: {reason}",
            view.name
        )
    );
}
