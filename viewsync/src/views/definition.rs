use std::fmt;
use std::sync::Arc;

use crate::types::{Row, TableName};

/// Derives view columns from the before and after images of a source row.
///
/// Writes are called with `(None, Some(after))`, updates with `(Some(before), Some(after))` and
/// deletes with `(Some(row), None)`. Returning `None` (or an empty row) signals that the source row
/// contributes nothing to the view.
pub type ComputeFn = Arc<dyn Fn(Option<&Row>, Option<&Row>) -> Option<Row> + Send + Sync>;

/// Decides whether a source row contributes to a joined view.
pub type FilterFn = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

/// Declarative binding of a view to one source table.
///
/// The fields that are set decide how the source feeds the view:
///
/// - only `value_columns`: the source owns the view rows and its columns are copied verbatim;
/// - `foreign_key` and `value_columns`: the source only fills columns of view rows owned by
///   another source, located through the foreign key;
/// - `compute`: view columns are derived by a function, `join_key` locates the view row.
#[derive(Clone)]
pub struct SourceBinding {
    pub table: TableName,
    pub value_columns: Vec<String>,
    pub foreign_key: Option<String>,
    pub compute: Option<ComputeFn>,
    /// Source column matched against the view key by a computed binding. Defaults to the view
    /// key itself.
    pub join_key: Option<String>,
    pub filter: Option<FilterFn>,
}

impl SourceBinding {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            table: TableName::new(database, table),
            value_columns: Vec::new(),
            foreign_key: None,
            compute: None,
            join_key: None,
            filter: None,
        }
    }

    /// Binding copying `value_columns` from rows of `table`.
    pub fn direct<I, S>(table: TableName, value_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(table.database, table.table).with_columns(value_columns)
    }

    /// Binding filling `value_columns` of the view row whose key equals `foreign_key`.
    pub fn joined<I, S>(table: TableName, foreign_key: impl Into<String>, value_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(table.database, table.table)
            .with_columns(value_columns)
            .with_foreign_key(foreign_key)
    }

    /// Binding deriving view columns with `compute`.
    pub fn computed<F>(table: TableName, compute: F) -> Self
    where
        F: Fn(Option<&Row>, Option<&Row>) -> Option<Row> + Send + Sync + 'static,
    {
        Self::new(table.database, table.table).with_compute(compute)
    }

    pub fn with_columns<I, S>(mut self, value_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.value_columns = value_columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = Some(foreign_key.into());
        self
    }

    pub fn with_compute<F>(mut self, compute: F) -> Self
    where
        F: Fn(Option<&Row>, Option<&Row>) -> Option<Row> + Send + Sync + 'static,
    {
        self.compute = Some(Arc::new(compute));
        self
    }

    pub fn with_join_key(mut self, join_key: impl Into<String>) -> Self {
        self.join_key = Some(join_key.into());
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Row) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for SourceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBinding")
            .field("table", &self.table)
            .field("value_columns", &self.value_columns)
            .field("foreign_key", &self.foreign_key)
            .field("compute", &self.compute.is_some())
            .field("join_key", &self.join_key)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// A destination table kept in sync from one or more source tables.
#[derive(Debug, Clone)]
pub struct ViewDefinition {
    /// Destination table name, optionally qualified as `schema.table`.
    pub name: String,
    /// Column uniquely identifying a view row.
    pub key: String,
    pub sources: Vec<SourceBinding>,
    /// Statements populating the view from the current source data, run during bootstrap.
    pub init_statements: Vec<String>,
}

impl ViewDefinition {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            sources: Vec::new(),
            init_statements: Vec::new(),
        }
    }

    /// Single source view copying `value_columns` of `source`, keyed by `key`.
    pub fn direct<I, S>(
        name: impl Into<String>,
        key: impl Into<String>,
        source: TableName,
        value_columns: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, key).with_source(SourceBinding::direct(source, value_columns))
    }

    /// Single source view filling `value_columns` of existing rows through `foreign_key`.
    pub fn joined<I, S>(
        name: impl Into<String>,
        key: impl Into<String>,
        source: TableName,
        foreign_key: impl Into<String>,
        value_columns: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, key).with_source(SourceBinding::joined(source, foreign_key, value_columns))
    }

    /// Single source view computed from `source` rows and matched on `join_key`.
    pub fn computed<F>(
        name: impl Into<String>,
        key: impl Into<String>,
        source: TableName,
        join_key: impl Into<String>,
        compute: F,
    ) -> Self
    where
        F: Fn(Option<&Row>, Option<&Row>) -> Option<Row> + Send + Sync + 'static,
    {
        Self::new(name, key)
            .with_source(SourceBinding::computed(source, compute).with_join_key(join_key))
    }

    pub fn with_source(mut self, source: SourceBinding) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_init_statement(mut self, statement: impl Into<String>) -> Self {
        self.init_statements.push(statement.into());
        self
    }
}
