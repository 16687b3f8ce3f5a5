use std::collections::HashMap;

use tracing::debug;

use crate::notifetch::pipeline::flatten::FlattenedRecord;
use crate::notifetch::pipeline::model::{Column, ColumnType};

/// Merges the per-record column sets into one ordered schema.
///
/// Columns keep the order in which they first appear across `records`. A
/// column whose concrete types disagree anywhere widens to
/// [`ColumnType::Text`]; `unknown` observations never override a concrete
/// type. A column that never sees a concrete type stays `unknown`.
pub fn unify(records: &[FlattenedRecord]) -> Vec<Column> {
    let mut builder = SchemaBuilder::default();
    for record in records {
        builder.observe(record);
    }
    builder.finish()
}

/// Incremental form of [`unify`], for callers that flatten page by page.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    order: Vec<String>,
    types: HashMap<String, ColumnType>,
}

impl SchemaBuilder {
    pub fn observe(&mut self, record: &FlattenedRecord) {
        for (name, cell) in record.iter() {
            match self.types.get_mut(name) {
                None => {
                    self.order.push(name.to_string());
                    self.types.insert(name.to_string(), cell.column_type);
                }
                Some(current) => {
                    let widened = reconcile(*current, cell.column_type);
                    if widened != *current {
                        debug!(column = name, from = %current, to = %widened, "column type reconciled");
                        *current = widened;
                    }
                }
            }
        }
    }

    pub fn finish(self) -> Vec<Column> {
        let Self { order, types } = self;
        order
            .into_iter()
            .enumerate()
            .map(|(ordinal, name)| {
                let column_type = types.get(&name).copied().unwrap_or(ColumnType::Unknown);
                Column {
                    name,
                    column_type,
                    ordinal,
                }
            })
            .collect()
    }
}

/// Combines the type seen so far with a newly observed one. Any disagreement
/// between concrete types falls back to text, so three-way conflicts end in
/// the same place as two-way ones.
pub fn reconcile(current: ColumnType, observed: ColumnType) -> ColumnType {
    match (current, observed) {
        (current, ColumnType::Unknown) => current,
        (ColumnType::Unknown, observed) => observed,
        (current, observed) if current == observed => current,
        _ => ColumnType::Text,
    }
}
