use std::fmt;

use crate::types::{ReplicationPosition, Row};

/// Numeric table identifier assigned by the source in table map events.
pub type TableId = u64;

/// Fully qualified name of a source table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub database: String,
    pub table: String,
}

impl TableName {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// Kind of row change carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Write,
    Update,
    Delete,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Write, EventKind::Update, EventKind::Delete];

    /// Returns the name of the replication log event carrying this kind of change.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Write => "writerows",
            EventKind::Update => "updaterows",
            EventKind::Delete => "deleterows",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Before and after images of an updated row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub before: Row,
    pub after: Row,
}

impl RowUpdate {
    pub fn new(before: Row, after: Row) -> Self {
        Self { before, after }
    }
}

/// Row images of a change event, one variant per [`EventKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowChanges {
    Write(Vec<Row>),
    Update(Vec<RowUpdate>),
    Delete(Vec<Row>),
}

impl RowChanges {
    pub fn kind(&self) -> EventKind {
        match self {
            RowChanges::Write(_) => EventKind::Write,
            RowChanges::Update(_) => EventKind::Update,
            RowChanges::Delete(_) => EventKind::Delete,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RowChanges::Write(rows) | RowChanges::Delete(rows) => rows.len(),
            RowChanges::Update(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Row-level change decoded from the replication log.
///
/// Readers that decode raw binlog events usually only know the numeric [`TableId`] and rely on a
/// preceding [`TableMapEvent`] to name the table. Readers that already resolved the name set
/// [`ChangeEvent::table`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table_id: TableId,
    pub table: Option<TableName>,
    pub rows: RowChanges,
    /// Offset of the next event in the current log file.
    pub next_offset: Option<u64>,
}

impl ChangeEvent {
    pub fn write(table: TableName, rows: Vec<Row>) -> Self {
        Self::named(table, RowChanges::Write(rows))
    }

    pub fn update(table: TableName, rows: Vec<RowUpdate>) -> Self {
        Self::named(table, RowChanges::Update(rows))
    }

    pub fn delete(table: TableName, rows: Vec<Row>) -> Self {
        Self::named(table, RowChanges::Delete(rows))
    }

    /// Creates an event identified only by its table id.
    pub fn for_table_id(table_id: TableId, rows: RowChanges) -> Self {
        Self {
            table_id,
            table: None,
            rows,
            next_offset: None,
        }
    }

    pub fn with_next_offset(mut self, next_offset: u64) -> Self {
        self.next_offset = Some(next_offset);
        self
    }

    pub fn kind(&self) -> EventKind {
        self.rows.kind()
    }

    fn named(table: TableName, rows: RowChanges) -> Self {
        Self {
            table_id: 0,
            table: Some(table),
            rows,
            next_offset: None,
        }
    }
}

/// Binds a table id to a table name for the row events that follow.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMapEvent {
    pub table_id: TableId,
    pub table: TableName,
}

/// Marks the switch to a new log file.
#[derive(Debug, Clone, PartialEq)]
pub struct RotateEvent {
    pub position: ReplicationPosition,
}

/// Event delivered by a log reader.
#[derive(Debug, Clone, PartialEq)]
pub enum BinlogEvent {
    Rotate(RotateEvent),
    TableMap(TableMapEvent),
    Rows(ChangeEvent),
    /// Any other log event, ignored by the engine.
    Unsupported,
}

impl From<ChangeEvent> for BinlogEvent {
    fn from(event: ChangeEvent) -> Self {
        BinlogEvent::Rows(event)
    }
}
