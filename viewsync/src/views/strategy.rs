use std::fmt;

use crate::mutation::Mutation;
use crate::types::{Cell, Row, RowChanges, RowUpdate};
use crate::views::definition::{ComputeFn, FilterFn};

/// How a source table feeds a view, selected once when the view is compiled.
#[derive(Clone)]
pub enum ViewStrategy {
    /// The source owns the view rows. Value columns are copied, the view key is read from the
    /// same-named source column.
    Direct { value_columns: Vec<String> },
    /// The source only owns `value_columns` of view rows created by another source. The view row
    /// is the one whose key equals the source row's `foreign_key`.
    Joined {
        foreign_key: String,
        value_columns: Vec<String>,
        filter: Option<FilterFn>,
    },
    /// View columns are derived with `compute`. When `join_key` equals the view key the source owns
    /// the view rows, otherwise it only updates rows owned by another source.
    Computed { join_key: String, compute: ComputeFn },
}

impl fmt::Debug for ViewStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewStrategy::Direct { value_columns } => f
                .debug_struct("Direct")
                .field("value_columns", value_columns)
                .finish(),
            ViewStrategy::Joined {
                foreign_key,
                value_columns,
                filter,
            } => f
                .debug_struct("Joined")
                .field("foreign_key", foreign_key)
                .field("value_columns", value_columns)
                .field("filter", &filter.is_some())
                .finish(),
            ViewStrategy::Computed { join_key, .. } => f
                .debug_struct("Computed")
                .field("join_key", join_key)
                .finish_non_exhaustive(),
        }
    }
}

/// Builds the mutations one source binding implies for a view.
///
/// Every builder returns at most one [`Mutation`] per row image, `None` meaning the row change
/// does not affect the view.
#[derive(Debug, Clone)]
pub struct Projection {
    view: String,
    key: String,
    strategy: ViewStrategy,
}

impl Projection {
    pub fn new(view: impl Into<String>, key: impl Into<String>, strategy: ViewStrategy) -> Self {
        Self {
            view: view.into(),
            key: key.into(),
            strategy,
        }
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn strategy(&self) -> &ViewStrategy {
        &self.strategy
    }

    /// Builds the mutations for every row image of `changes`, in row order.
    pub fn project(&self, changes: &RowChanges) -> Vec<Mutation> {
        match changes {
            RowChanges::Write(rows) => rows.iter().filter_map(|row| self.on_write(row)).collect(),
            RowChanges::Update(rows) => rows
                .iter()
                .filter_map(|update| self.on_update(update))
                .collect(),
            RowChanges::Delete(rows) => rows.iter().filter_map(|row| self.on_delete(row)).collect(),
        }
    }

    pub fn on_write(&self, row: &Row) -> Option<Mutation> {
        match &self.strategy {
            ViewStrategy::Direct { value_columns } => {
                let mut columns = Vec::with_capacity(value_columns.len() + 1);
                columns.push(self.key.as_str());
                columns.extend(value_columns.iter().map(String::as_str));

                Some(Mutation::insert(&self.view, row.pick(columns.as_slice())))
            }
            ViewStrategy::Joined {
                foreign_key,
                value_columns,
                filter,
            } => {
                if !accepts(filter, row) {
                    return None;
                }

                Some(Mutation::update(
                    &self.view,
                    row.pick(value_columns.as_slice()),
                    &self.key,
                    row.value(foreign_key),
                ))
            }
            ViewStrategy::Computed { join_key, compute } => {
                let view_row = computed_row(compute, None, Some(row))?;

                if self.owns_rows(join_key) {
                    Some(Mutation::insert(&self.view, view_row))
                } else {
                    Some(Mutation::update(
                        &self.view,
                        view_row,
                        &self.key,
                        row.value(join_key),
                    ))
                }
            }
        }
    }

    pub fn on_update(&self, update: &RowUpdate) -> Option<Mutation> {
        let RowUpdate { before, after } = update;

        match &self.strategy {
            ViewStrategy::Direct { value_columns } => {
                let changed = changed_columns(value_columns, before, after);
                if changed.is_empty() {
                    return None;
                }

                Some(Mutation::update(
                    &self.view,
                    after.pick(changed.as_slice()),
                    &self.key,
                    before.value(&self.key),
                ))
            }
            ViewStrategy::Joined {
                foreign_key,
                value_columns,
                filter,
            } => {
                if !accepts(filter, after) {
                    return None;
                }

                let changed = changed_columns(value_columns, before, after);
                if changed.is_empty() {
                    return None;
                }

                Some(Mutation::update(
                    &self.view,
                    after.pick(changed.as_slice()),
                    &self.key,
                    before.value(foreign_key),
                ))
            }
            ViewStrategy::Computed { join_key, compute } => {
                // An update yielding no view row leaves the view row in place.
                let view_row = computed_row(compute, Some(before), Some(after))?;

                Some(Mutation::update(
                    &self.view,
                    view_row,
                    &self.key,
                    before.value(join_key),
                ))
            }
        }
    }

    pub fn on_delete(&self, row: &Row) -> Option<Mutation> {
        match &self.strategy {
            ViewStrategy::Direct { .. } => Some(Mutation::delete(
                &self.view,
                &self.key,
                row.value(&self.key),
            )),
            ViewStrategy::Joined {
                foreign_key,
                value_columns,
                filter,
            } => {
                if !accepts(filter, row) {
                    return None;
                }

                // The view row belongs to another source, only the contributed columns go.
                let cleared: Row = value_columns
                    .iter()
                    .map(|column| (column.as_str(), Cell::Null))
                    .collect();

                Some(Mutation::update(
                    &self.view,
                    cleared,
                    &self.key,
                    row.value(foreign_key),
                ))
            }
            ViewStrategy::Computed { join_key, compute } => {
                match computed_row(compute, Some(row), None) {
                    Some(view_row) => Some(Mutation::update(
                        &self.view,
                        view_row,
                        &self.key,
                        row.value(join_key),
                    )),
                    None if self.owns_rows(join_key) => Some(Mutation::delete(
                        &self.view,
                        &self.key,
                        row.value(join_key),
                    )),
                    None => None,
                }
            }
        }
    }

    fn owns_rows(&self, join_key: &str) -> bool {
        self.key == join_key
    }
}

/// Returns the columns of `columns` whose value differs between `before` and `after`, in order.
///
/// Values are compared with [`Cell::same_value`], so temporal values denoting the same instant
/// are not reported as changed.
pub fn changed_columns<'a>(columns: &'a [String], before: &Row, after: &Row) -> Vec<&'a str> {
    columns
        .iter()
        .filter(|column| !before.value(column).same_value(&after.value(column)))
        .map(String::as_str)
        .collect()
}

fn accepts(filter: &Option<FilterFn>, row: &Row) -> bool {
    filter.as_ref().is_none_or(|filter| filter(row))
}

fn computed_row(compute: &ComputeFn, before: Option<&Row>, after: Option<&Row>) -> Option<Row> {
    compute(before, after).filter(|row| !row.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::Arc;

    fn direct() -> Projection {
        Projection::new(
            "orders_summary",
            "order_id",
            ViewStrategy::Direct {
                value_columns: vec!["status".to_string(), "placed_at".to_string()],
            },
        )
    }

    fn joined(filter: Option<FilterFn>) -> Projection {
        Projection::new(
            "orders_summary",
            "order_id",
            ViewStrategy::Joined {
                foreign_key: "order_id".to_string(),
                value_columns: vec!["carrier".to_string(), "shipped_at".to_string()],
                filter,
            },
        )
    }

    fn computed(join_key: &str, compute: ComputeFn) -> Projection {
        Projection::new(
            "order_totals",
            "order_id",
            ViewStrategy::Computed {
                join_key: join_key.to_string(),
                compute,
            },
        )
    }

    fn compute_fn<F>(compute: F) -> ComputeFn
    where
        F: Fn(Option<&Row>, Option<&Row>) -> Option<Row> + Send + Sync + 'static,
    {
        Arc::new(compute)
    }

    fn nothing() -> ComputeFn {
        compute_fn(|_, _| None)
    }

    fn total() -> ComputeFn {
        compute_fn(|_, after| {
            after.map(|row| {
                Row::new()
                    .with("order_id", row.value("order_id"))
                    .with("total", row.value("amount"))
            })
        })
    }

    #[test]
    fn direct_write_inserts_key_and_value_columns() {
        let row = Row::new()
            .with("status", "new")
            .with("order_id", 5)
            .with("ignored", true);

        let Some(Mutation::Insert {
            table,
            columns,
            values,
        }) = direct().on_write(&row)
        else {
            panic!("expected an insert");
        };

        assert_eq!(table, "orders_summary");
        assert_eq!(columns, vec!["order_id", "status", "placed_at"]);
        assert_eq!(values, vec![Cell::I64(5), Cell::from("new"), Cell::Null]);
    }

    #[test]
    fn direct_update_without_changes_is_skipped() {
        let placed = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let before = Row::new()
            .with("order_id", 5)
            .with("status", "new")
            .with("placed_at", placed);
        let after = Row::new()
            .with("order_id", 5)
            .with("status", "new")
            .with("placed_at", Utc.from_utc_datetime(&placed));

        assert_eq!(direct().on_update(&RowUpdate::new(before, after)), None);
    }

    #[test]
    fn direct_update_sets_only_changed_columns_by_old_key() {
        let before = Row::new().with("order_id", 5).with("status", "new");
        let after = Row::new().with("order_id", 6).with("status", "paid");

        assert_eq!(
            direct().on_update(&RowUpdate::new(before, after)),
            Some(Mutation::update(
                "orders_summary",
                Row::new().with("status", "paid"),
                "order_id",
                Cell::I64(5),
            ))
        );
    }

    #[test]
    fn direct_delete_removes_view_row() {
        let row = Row::new().with("order_id", 5);

        assert_eq!(
            direct().on_delete(&row),
            Some(Mutation::delete("orders_summary", "order_id", Cell::I64(5)))
        );
    }

    #[test]
    fn joined_write_updates_row_located_by_foreign_key() {
        let row = Row::new()
            .with("shipment_id", 9)
            .with("order_id", 5)
            .with("carrier", "dhl");

        assert_eq!(
            joined(None).on_write(&row),
            Some(Mutation::update(
                "orders_summary",
                Row::new().with("carrier", "dhl").with("shipped_at", Cell::Null),
                "order_id",
                Cell::I64(5),
            ))
        );
    }

    #[test]
    fn joined_delete_clears_columns_instead_of_deleting() {
        let row = Row::new().with("order_id", 5).with("carrier", "dhl");

        let Some(Mutation::Update {
            assignments,
            key_value,
            ..
        }) = joined(None).on_delete(&row)
        else {
            panic!("expected an update");
        };

        assert_eq!(
            assignments.column_names().collect::<Vec<_>>(),
            vec!["carrier", "shipped_at"]
        );
        assert!(assignments.iter().all(|(_, value)| value.is_null()));
        assert_eq!(key_value, Cell::I64(5));
    }

    #[test]
    fn joined_filter_gates_every_event_kind() {
        let filter: FilterFn =
            Arc::new(|row: &Row| row.value("carrier") != Cell::from("internal"));
        let projection = joined(Some(filter));
        let rejected = Row::new().with("order_id", 5).with("carrier", "internal");
        let accepted = Row::new().with("order_id", 5).with("carrier", "dhl");

        assert_eq!(projection.on_write(&rejected), None);
        assert_eq!(projection.on_delete(&rejected), None);
        assert_eq!(
            projection.on_update(&RowUpdate::new(accepted.clone(), rejected.clone())),
            None
        );
        assert!(
            projection
                .on_update(&RowUpdate::new(rejected, accepted))
                .is_some()
        );
    }

    #[test]
    fn computed_with_owned_rows_inserts_and_deletes() {
        let projection = computed("order_id", total());
        let row = Row::new().with("order_id", 5).with("amount", 10);

        assert_eq!(
            projection.on_write(&row),
            Some(Mutation::insert(
                "order_totals",
                Row::new().with("order_id", 5).with("total", 10),
            ))
        );
        // Deleting yields no computed row, so the owned view row is removed.
        assert_eq!(
            projection.on_delete(&row),
            Some(Mutation::delete("order_totals", "order_id", Cell::I64(5)))
        );
    }

    #[test]
    fn computed_without_row_is_a_noop_except_owned_delete() {
        let owned = computed("order_id", nothing());
        let joined = computed("customer_id", nothing());
        let row = Row::new().with("order_id", 5).with("customer_id", 3);
        let update = RowUpdate::new(row.clone(), row.clone());

        assert_eq!(owned.on_write(&row), None);
        assert_eq!(owned.on_update(&update), None);
        assert_eq!(
            owned.on_delete(&row),
            Some(Mutation::delete("order_totals", "order_id", Cell::I64(5)))
        );

        assert_eq!(joined.on_write(&row), None);
        assert_eq!(joined.on_update(&update), None);
        assert_eq!(joined.on_delete(&row), None);
    }

    #[test]
    fn computed_with_foreign_rows_updates_by_join_key() {
        let compute = compute_fn(|before, after| {
            let count = if after.is_some() { 1 } else { 0 };
            let source = after.or(before)?;
            Some(
                Row::new()
                    .with("last_order", source.value("order_id"))
                    .with("open", count),
            )
        });
        let projection = Projection::new(
            "customers_view",
            "customer_id",
            ViewStrategy::Computed {
                join_key: "cust".to_string(),
                compute,
            },
        );
        let before = Row::new().with("order_id", 5).with("cust", 3);
        let after = Row::new().with("order_id", 6).with("cust", 4);

        assert_eq!(
            projection.on_write(&before),
            Some(Mutation::update(
                "customers_view",
                Row::new().with("last_order", 5).with("open", 1),
                "customer_id",
                Cell::I64(3),
            ))
        );
        assert_eq!(
            projection.on_update(&RowUpdate::new(before.clone(), after)),
            Some(Mutation::update(
                "customers_view",
                Row::new().with("last_order", 6).with("open", 1),
                "customer_id",
                Cell::I64(3),
            ))
        );
        assert_eq!(
            projection.on_delete(&before),
            Some(Mutation::update(
                "customers_view",
                Row::new().with("last_order", 5).with("open", 0),
                "customer_id",
                Cell::I64(3),
            ))
        );
    }

    #[test]
    fn empty_computed_row_counts_as_absent() {
        let projection = computed("order_id", compute_fn(|_, _| Some(Row::new())));
        let row = Row::new().with("order_id", 5);

        assert_eq!(projection.on_write(&row), None);
        assert_eq!(
            projection.on_delete(&row),
            Some(Mutation::delete("order_totals", "order_id", Cell::I64(5)))
        );
    }

    #[test]
    fn project_keeps_row_order() {
        let changes = RowChanges::Delete(vec![
            Row::new().with("order_id", 1),
            Row::new().with("order_id", 2),
        ]);

        let mutations = direct().project(&changes);

        assert_eq!(
            mutations,
            vec![
                Mutation::delete("orders_summary", "order_id", Cell::I64(1)),
                Mutation::delete("orders_summary", "order_id", Cell::I64(2)),
            ]
        );
    }
}
