use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::notifetch::pipeline::model::{
    CellValue, ColumnType, DateRange, RawPropertyValue, RecordId, RemoteRecord, RollupValue,
};
use crate::notifetch::pipeline::normalize::{Normalizer, render_block, render_blocks};

/// Column holding the record identifier.
pub const ID_COLUMN: &str = "id";
/// Column holding the creation timestamp.
pub const CREATED_TIME_COLUMN: &str = "created_time";
/// Column holding the last edit timestamp.
pub const LAST_EDITED_TIME_COLUMN: &str = "last_edited_time";
/// Column holding the record URL.
pub const URL_COLUMN: &str = "url";
/// Synthetic column holding the text of a record's child blocks.
pub const CONTENT_COLUMN: &str = "content";

/// How child blocks of a record end up in the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildBlockMode {
    /// All child blocks are joined into the single `content` column.
    #[default]
    Concatenate,
    /// Each top-level child block gets its own `content_<n>` column.
    Promote,
}

/// Flattening switches, usually read from the pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenOptions {
    /// Emit `id`, `created_time`, `last_edited_time`, and `url` ahead of the
    /// record's own properties.
    pub include_metadata: bool,
    pub child_blocks: ChildBlockMode,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            child_blocks: ChildBlockMode::Concatenate,
        }
    }
}

/// Something that degraded a cell without failing the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlattenWarning {
    UnsupportedPropertyType {
        record: RecordId,
        property: String,
        type_name: String,
    },
    /// A later cell replaced an earlier one under the same column name, e.g.
    /// a property called `url` replacing the metadata column.
    ColumnOverwritten { record: RecordId, column: String },
}

/// A normalized cell together with the type inferred for it.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatCell {
    pub value: CellValue,
    pub column_type: ColumnType,
}

/// One record flattened into named cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedRecord {
    pub id: RecordId,
    cells: HashMap<String, FlatCell>,
    order: Vec<String>,
    pub warnings: Vec<FlattenWarning>,
}

impl FlattenedRecord {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Inserts a cell. A name seen before keeps its original position and
    /// takes the newer value; that case returns `true`.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: CellValue,
        column_type: ColumnType,
    ) -> bool {
        let name = name.into();
        let cell = FlatCell { value, column_type };
        if self.cells.insert(name.clone(), cell).is_some() {
            true
        } else {
            self.order.push(name);
            false
        }
    }

    /// Like [`FlattenedRecord::insert`], but records a warning when an
    /// earlier cell is replaced.
    fn insert_checked(&mut self, name: String, value: CellValue, column_type: ColumnType) {
        if self.insert(name.clone(), value, column_type) {
            warn!(record = %self.id, column = %name, "column overwritten within record");
            self.warnings.push(FlattenWarning::ColumnOverwritten {
                record: self.id.clone(),
                column: name,
            });
        }
    }

    pub fn get(&self, name: &str) -> Option<&FlatCell> {
        self.cells.get(name)
    }

    /// Column names in the order this record first produced them.
    pub fn column_order(&self) -> &[String] {
        &self.order
    }

    /// Cells in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlatCell)> {
        self.order
            .iter()
            .filter_map(|name| self.cells.get(name).map(|cell| (name.as_str(), cell)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Converts records into flat name → cell mappings.
#[derive(Debug, Clone, Default)]
pub struct Flattener {
    options: FlattenOptions,
    normalizer: Normalizer,
}

impl Flattener {
    pub fn new(options: FlattenOptions, normalizer: Normalizer) -> Self {
        Self {
            options,
            normalizer,
        }
    }

    pub fn flatten(&self, record: &RemoteRecord) -> FlattenedRecord {
        let mut flat = FlattenedRecord::new(record.id.clone());

        if self.options.include_metadata {
            flat.insert(
                ID_COLUMN,
                CellValue::Text(record.id.clone()),
                ColumnType::Text,
            );
            let (created, created_type) = self.timestamp(record.created_time.as_deref());
            flat.insert(CREATED_TIME_COLUMN, created, created_type);
            let (edited, edited_type) = self.timestamp(record.last_edited_time.as_deref());
            flat.insert(LAST_EDITED_TIME_COLUMN, edited, edited_type);
            let (url, url_type) = self
                .normalizer
                .normalize(&RawPropertyValue::Url(record.url.clone()));
            flat.insert(URL_COLUMN, url, url_type);
        }

        for (name, value) in &record.properties {
            if let Some(type_name) = unsupported_type(value) {
                warn!(record = %record.id, property = %name, type_name, "unsupported property type");
                flat.warnings.push(FlattenWarning::UnsupportedPropertyType {
                    record: record.id.clone(),
                    property: name.clone(),
                    type_name: type_name.to_string(),
                });
            }
            let (cell, column_type) = self.normalizer.normalize(value);
            flat.insert_checked(name.clone(), cell, column_type);
        }

        if !record.children.is_empty() {
            match self.options.child_blocks {
                ChildBlockMode::Concatenate => {
                    let (cell, column_type) = content_cell(render_blocks(&record.children));
                    flat.insert_checked(CONTENT_COLUMN.to_string(), cell, column_type);
                }
                ChildBlockMode::Promote => {
                    for (index, block) in record.children.iter().enumerate() {
                        let (cell, column_type) = content_cell(render_block(block));
                        flat.insert_checked(
                            format!("{CONTENT_COLUMN}_{}", index + 1),
                            cell,
                            column_type,
                        );
                    }
                }
            }
        }

        flat
    }

    /// Flattens a batch, preserving input order.
    pub fn flatten_all(&self, records: &[RemoteRecord]) -> Vec<FlattenedRecord> {
        records.iter().map(|record| self.flatten(record)).collect()
    }

    fn timestamp(&self, value: Option<&str>) -> (CellValue, ColumnType) {
        let date = value.map(DateRange::starting);
        self.normalizer.normalize(&RawPropertyValue::Date(date))
    }
}

fn content_cell(text: String) -> (CellValue, ColumnType) {
    if text.is_empty() {
        (CellValue::Null, ColumnType::Unknown)
    } else {
        (CellValue::Text(text), ColumnType::Text)
    }
}

fn unsupported_type(value: &RawPropertyValue) -> Option<&str> {
    match value {
        RawPropertyValue::Unsupported { type_name, .. } => Some(type_name.as_str()),
        RawPropertyValue::Rollup(RollupValue::Unsupported(_)) => Some("rollup"),
        RawPropertyValue::Rollup(RollupValue::Array(items)) => {
            items.iter().find_map(unsupported_type)
        }
        _ => None,
    }
}
