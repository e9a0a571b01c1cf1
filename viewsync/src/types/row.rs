use crate::types::Cell;

/// Column values of a row at one point in time, in column order.
///
/// Columns are looked up by name. Missing columns read as [`Cell::Null`], matching how an
/// absent value is written to the destination.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column` to `value` and returns the row, for building rows inline.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Cell>) -> Self {
        self.insert(column, value);
        self
    }

    /// Sets `column` to `value`, keeping the column position if it already exists.
    ///
    /// Returns the previous value of the column.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Cell>) -> Option<Cell> {
        let column = column.into();
        let value = value.into();

        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.columns.push((column, value));
                None
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Returns the value of `column`, or [`Cell::Null`] when the row does not have it.
    pub fn value(&self, column: &str) -> Cell {
        self.get(column).cloned().unwrap_or(Cell::Null)
    }

    /// Builds a row holding exactly `columns`, in that order.
    pub fn pick<S: AsRef<str>>(&self, columns: &[S]) -> Row {
        columns
            .iter()
            .map(|column| (column.as_ref().to_string(), self.value(column.as_ref())))
            .collect()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Splits the row into its column names and values.
    pub fn into_parts(self) -> (Vec<String>, Vec<Cell>) {
        self.columns.into_iter().unzip()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<Cell>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Cell);
    type IntoIter = std::vec::IntoIter<(String, Cell)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}
