use std::fmt;

use serde::{Deserialize, Serialize};

use crate::notifetch::pipeline::error::{Result, ToolError};

/// Identifier assigned to a record by the remote service. It is kept as the
/// plain string the service returned.
pub type RecordId = String;

/// Start/end pair of a date property. `end` is only present for ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: Option<String>,
    pub time_zone: Option<String>,
}

impl DateRange {
    /// Creates a single-day (or single-instant) date.
    pub fn starting(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: None,
            time_zone: None,
        }
    }
}

/// Resolved value of a formula property, tagged with the formula's declared
/// result type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FormulaValue {
    String(Option<String>),
    Number(Option<f64>),
    Boolean(Option<bool>),
    Date(Option<DateRange>),
}

/// Resolved value of a rollup property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RollupValue {
    Number(Option<f64>),
    Date(Option<DateRange>),
    /// Rollups over relations resolve to the rolled-up property values.
    Array(Vec<RawPropertyValue>),
    /// A rollup function the decoder does not know; carries the raw payload.
    Unsupported(String),
}

/// Kind of a content block inside a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading(u8),
    Paragraph,
    BulletedListItem,
    NumberedListItem,
    ToDo,
    Code,
    Quote,
    Callout,
    Toggle,
    TableRow,
    Other(String),
}

impl BlockKind {
    /// Name of the block type as the remote service spells it.
    pub fn type_name(&self) -> String {
        match self {
            BlockKind::Heading(level) => format!("heading_{level}"),
            BlockKind::Paragraph => "paragraph".to_string(),
            BlockKind::BulletedListItem => "bulleted_list_item".to_string(),
            BlockKind::NumberedListItem => "numbered_list_item".to_string(),
            BlockKind::ToDo => "to_do".to_string(),
            BlockKind::Code => "code".to_string(),
            BlockKind::Quote => "quote".to_string(),
            BlockKind::Callout => "callout".to_string(),
            BlockKind::Toggle => "toggle".to_string(),
            BlockKind::TableRow => "table_row".to_string(),
            BlockKind::Other(name) => name.clone(),
        }
    }

    /// List-like blocks are joined line by line when rendered.
    pub fn is_list_item(&self) -> bool {
        matches!(
            self,
            BlockKind::BulletedListItem | BlockKind::NumberedListItem | BlockKind::ToDo
        )
    }
}

/// One block of page content together with its nested children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockContent {
    pub id: RecordId,
    pub kind: BlockKind,
    /// Plain text of the block's rich text.
    pub text: String,
    /// Set for to-do blocks.
    pub checked: Option<bool>,
    /// Set for code blocks.
    pub language: Option<String>,
    /// Whether the service reported nested children for this block.
    pub has_children: bool,
    pub children: Vec<BlockContent>,
}

impl BlockContent {
    pub fn new(id: impl Into<RecordId>, kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            text: text.into(),
            checked: None,
            language: None,
            has_children: false,
            children: Vec::new(),
        }
    }

    /// Attaches nested children and marks the block as having them.
    pub fn with_children(mut self, children: Vec<BlockContent>) -> Self {
        self.has_children = !children.is_empty();
        self.children = children;
        self
    }
}

/// A property value exactly as the remote service typed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawPropertyValue {
    Title(String),
    RichText(String),
    Number(Option<f64>),
    Select(Option<String>),
    MultiSelect(Vec<String>),
    Date(Option<DateRange>),
    Checkbox(bool),
    Url(Option<String>),
    Email(Option<String>),
    Phone(Option<String>),
    People(Vec<String>),
    Relation(Vec<String>),
    Formula(FormulaValue),
    Rollup(RollupValue),
    Block(BlockContent),
    /// Explicitly absent value.
    Empty,
    /// A property type the decoder does not cover. `raw` is the JSON payload.
    Unsupported { type_name: String, raw: String },
}

impl RawPropertyValue {
    /// Renders the value as JSON text, used when nothing better is available.
    pub fn render_raw(&self) -> String {
        match self {
            RawPropertyValue::Unsupported { raw, .. } => raw.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

/// A fetched record: a database row or one block of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: RecordId,
    pub created_time: Option<String>,
    pub last_edited_time: Option<String>,
    pub url: Option<String>,
    /// Property name → value, in the order the service returned them.
    pub properties: Vec<(String, RawPropertyValue)>,
    /// Page content blocks, in document order.
    pub children: Vec<BlockContent>,
}

impl RemoteRecord {
    /// Creates a record with the provided identifier and no properties.
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            created_time: None,
            last_edited_time: None,
            url: None,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Appends a property value, replacing any earlier value under the same
    /// name without moving it.
    pub fn insert_property(&mut self, name: impl Into<String>, value: RawPropertyValue) {
        let name = name.into();
        match self.properties.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((name, value)),
        }
    }

    /// Builder-style variant of [`RemoteRecord::insert_property`].
    pub fn with_property(mut self, name: impl Into<String>, value: RawPropertyValue) -> Self {
        self.insert_property(name, value);
        self
    }

    pub fn property(&self, name: &str) -> Option<&RawPropertyValue> {
        self.properties
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }
}

/// A normalized table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// Value absent for this cell. Distinct from an empty string.
    Null,
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Text rendering used by text-based encoders. Null renders as `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Text(value) => Some(value.clone()),
            CellValue::Number(value) => Some(format_number(*value)),
            CellValue::Boolean(value) => Some(value.to_string()),
        }
    }

    /// Converts the cell into its JSON representation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Text(value) => serde_json::Value::String(value.clone()),
            CellValue::Number(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellValue::Boolean(value) => serde_json::Value::Bool(*value),
            CellValue::Null => serde_json::Value::Null,
        }
    }
}

/// Formats numbers without a trailing `.0` for integral values.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Inferred column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Number,
    Boolean,
    Date,
    List,
    Unknown,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::List => "list",
            ColumnType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A column of the final table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    /// Position reflecting first-seen order across the whole fetch.
    pub ordinal: usize,
}

/// Ordered cells, one per column.
pub type Row = Vec<CellValue>;

/// The assembled tabular artifact. Every row has exactly one cell per column
/// in column order; the fields are private so that cannot change after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Table {
    /// Builds a table, rejecting any row whose length differs from the column
    /// count.
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Result<Self> {
        let expected = columns.len();
        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != expected)
        {
            return Err(ToolError::SchemaViolation {
                row,
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
