//! Mutations derived from change events and the SQL they translate to.
//!
//! A [`Mutation`] is one of three statement shapes, written with `??` for identifiers and `?` for
//! values:
//!
//! - `INSERT INTO ?? (??) VALUES (?)`
//! - `UPDATE ?? SET ? WHERE ??=?`
//! - `DELETE FROM ?? WHERE ??=?`
//!
//! Destinations either bind the parameters ([`Mutation::to_prepared`]) or, for logs, render the
//! fully escaped statement through [`fmt::Display`].

use std::fmt;

use crate::types::{Cell, Row};

pub const INSERT_TEMPLATE: &str = "INSERT INTO ?? (??) VALUES (?)";
pub const UPDATE_TEMPLATE: &str = "UPDATE ?? SET ? WHERE ??=?";
pub const DELETE_TEMPLATE: &str = "DELETE FROM ?? WHERE ??=?";

/// A parameter substituted into a statement template.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// A table or column name (`??`).
    Identifier(String),
    /// A list of column names (`??`).
    Identifiers(Vec<String>),
    /// A single value (`?`).
    Value(Cell),
    /// A list of values (`?`).
    Values(Vec<Cell>),
    /// Column assignments of a `SET` clause (`?`).
    Assignments(Row),
}

/// A single write against a view table.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Cell>,
    },
    Update {
        table: String,
        assignments: Row,
        key_column: String,
        key_value: Cell,
    },
    Delete {
        table: String,
        key_column: String,
        key_value: Cell,
    },
}

impl Mutation {
    /// Inserts `row` into `table`, one column per row entry.
    pub fn insert(table: impl Into<String>, row: Row) -> Self {
        let (columns, values) = row.into_parts();
        Mutation::Insert {
            table: table.into(),
            columns,
            values,
        }
    }

    /// Sets the columns of `assignments` on the row of `table` where `key_column = key_value`.
    pub fn update(
        table: impl Into<String>,
        assignments: Row,
        key_column: impl Into<String>,
        key_value: Cell,
    ) -> Self {
        Mutation::Update {
            table: table.into(),
            assignments,
            key_column: key_column.into(),
            key_value,
        }
    }

    /// Deletes the row of `table` where `key_column = key_value`.
    pub fn delete(table: impl Into<String>, key_column: impl Into<String>, key_value: Cell) -> Self {
        Mutation::Delete {
            table: table.into(),
            key_column: key_column.into(),
            key_value,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Mutation::Insert { table, .. }
            | Mutation::Update { table, .. }
            | Mutation::Delete { table, .. } => table,
        }
    }

    pub fn statement_template(&self) -> &'static str {
        match self {
            Mutation::Insert { .. } => INSERT_TEMPLATE,
            Mutation::Update { .. } => UPDATE_TEMPLATE,
            Mutation::Delete { .. } => DELETE_TEMPLATE,
        }
    }

    /// Returns the parameters of [`Mutation::statement_template`], in placeholder order.
    pub fn parameters(&self) -> Vec<Parameter> {
        match self {
            Mutation::Insert {
                table,
                columns,
                values,
            } => vec![
                Parameter::Identifier(table.clone()),
                Parameter::Identifiers(columns.clone()),
                Parameter::Values(values.clone()),
            ],
            Mutation::Update {
                table,
                assignments,
                key_column,
                key_value,
            } => vec![
                Parameter::Identifier(table.clone()),
                Parameter::Assignments(assignments.clone()),
                Parameter::Identifier(key_column.clone()),
                Parameter::Value(key_value.clone()),
            ],
            Mutation::Delete {
                table,
                key_column,
                key_value,
            } => vec![
                Parameter::Identifier(table.clone()),
                Parameter::Identifier(key_column.clone()),
                Parameter::Value(key_value.clone()),
            ],
        }
    }

    /// Returns the statement with quoted identifiers and `?` value placeholders, along with the
    /// values to bind in order.
    pub fn to_prepared(&self) -> (String, Vec<Cell>) {
        match self {
            Mutation::Insert {
                table,
                columns,
                values,
            } => {
                let placeholders = vec!["?"; values.len()].join(", ");
                let statement = format!(
                    "INSERT INTO {} ({}) VALUES ({placeholders})",
                    quote_identifier(table),
                    quote_identifiers(columns),
                );
                (statement, values.clone())
            }
            Mutation::Update {
                table,
                assignments,
                key_column,
                key_value,
            } => {
                let set_clause = assignments
                    .column_names()
                    .map(|column| format!("{} = ?", quote_identifier(column)))
                    .collect::<Vec<_>>()
                    .join(", ");
                let statement = format!(
                    "UPDATE {} SET {set_clause} WHERE {} = ?",
                    quote_identifier(table),
                    quote_identifier(key_column),
                );
                let mut values: Vec<Cell> =
                    assignments.iter().map(|(_, value)| value.clone()).collect();
                values.push(key_value.clone());
                (statement, values)
            }
            Mutation::Delete {
                table,
                key_column,
                key_value,
            } => {
                let statement = format!(
                    "DELETE FROM {} WHERE {} = ?",
                    quote_identifier(table),
                    quote_identifier(key_column),
                );
                (statement, vec![key_value.clone()])
            }
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Insert {
                table,
                columns,
                values,
            } => {
                let values = values
                    .iter()
                    .map(Cell::to_sql_literal)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "INSERT INTO {} ({}) VALUES ({values})",
                    quote_identifier(table),
                    quote_identifiers(columns)
                )
            }
            Mutation::Update {
                table,
                assignments,
                key_column,
                key_value,
            } => {
                let set_clause = assignments
                    .iter()
                    .map(|(column, value)| {
                        format!("{} = {}", quote_identifier(column), value.to_sql_literal())
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "UPDATE {} SET {set_clause} WHERE {} = {}",
                    quote_identifier(table),
                    quote_identifier(key_column),
                    key_value.to_sql_literal()
                )
            }
            Mutation::Delete {
                table,
                key_column,
                key_value,
            } => write!(
                f,
                "DELETE FROM {} WHERE {} = {}",
                quote_identifier(table),
                quote_identifier(key_column),
                key_value.to_sql_literal()
            ),
        }
    }
}

/// Quotes an identifier with backticks. Dots separate qualified parts, each quoted on its own.
pub fn quote_identifier(identifier: &str) -> String {
    identifier
        .split('.')
        .map(|part| format!("`{}`", part.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(".")
}

fn quote_identifiers(identifiers: &[String]) -> String {
    identifiers
        .iter()
        .map(|identifier| quote_identifier(identifier))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_renders_columns_and_values_in_order() {
        let mutation = Mutation::insert(
            "orders_summary",
            Row::new().with("order_id", 5).with("status", "new"),
        );

        assert_eq!(mutation.statement_template(), INSERT_TEMPLATE);
        assert_eq!(
            mutation.to_string(),
            "INSERT INTO `orders_summary` (`order_id`, `status`) VALUES (5, 'new')"
        );

        let (statement, values) = mutation.to_prepared();
        assert_eq!(
            statement,
            "INSERT INTO `orders_summary` (`order_id`, `status`) VALUES (?, ?)"
        );
        assert_eq!(values, vec![Cell::I64(5), Cell::from("new")]);
    }

    #[test]
    fn update_binds_assignments_before_key() {
        let mutation = Mutation::update(
            "orders_summary",
            Row::new().with("status", "paid"),
            "order_id",
            Cell::I64(5),
        );

        assert_eq!(
            mutation.to_string(),
            "UPDATE `orders_summary` SET `status` = 'paid' WHERE `order_id` = 5"
        );
        let (statement, values) = mutation.to_prepared();
        assert_eq!(
            statement,
            "UPDATE `orders_summary` SET `status` = ? WHERE `order_id` = ?"
        );
        assert_eq!(values, vec![Cell::from("paid"), Cell::I64(5)]);
        assert_eq!(mutation.parameters().len(), 4);
    }

    #[test]
    fn delete_renders_key_predicate() {
        let mutation = Mutation::delete("orders_summary", "order_id", Cell::I64(5));

        assert_eq!(mutation.statement_template(), DELETE_TEMPLATE);
        assert_eq!(
            mutation.to_string(),
            "DELETE FROM `orders_summary` WHERE `order_id` = 5"
        );
    }

    #[test]
    fn qualified_identifiers_are_quoted_per_part() {
        assert_eq!(quote_identifier("analytics.orders"), "`analytics`.`orders`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }
}
