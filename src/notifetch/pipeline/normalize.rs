//! Maps every [`RawPropertyValue`] variant onto a table cell and a column
//! type. This is the one place that knows how each remote property type
//! looks in tabular form; adding support for a new type means adding a
//! variant to the model and an arm here.

use tracing::debug;

use crate::notifetch::pipeline::model::{
    BlockContent, BlockKind, CellValue, ColumnType, DateRange, FormulaValue, RawPropertyValue,
    RollupValue,
};

/// Delimiter used for multi-valued properties unless configured otherwise.
pub const DEFAULT_LIST_DELIMITER: &str = ", ";

/// Normalizes a value with the default list delimiter.
pub fn normalize(value: &RawPropertyValue) -> (CellValue, ColumnType) {
    Normalizer::default().normalize(value)
}

/// Property normalizer. Total over its input: every value yields a cell.
#[derive(Debug, Clone)]
pub struct Normalizer {
    delimiter: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_LIST_DELIMITER)
    }
}

impl Normalizer {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    pub fn normalize(&self, value: &RawPropertyValue) -> (CellValue, ColumnType) {
        match value {
            RawPropertyValue::Title(text) | RawPropertyValue::RichText(text) => text_cell(text),
            RawPropertyValue::Number(number) => number_cell(*number),
            RawPropertyValue::Select(option) => optional_text(option.as_deref()),
            RawPropertyValue::MultiSelect(items)
            | RawPropertyValue::People(items)
            | RawPropertyValue::Relation(items) => self.list_cell(items.iter().cloned()),
            RawPropertyValue::Date(date) => date_cell(date.as_ref()),
            RawPropertyValue::Checkbox(checked) => {
                (CellValue::Boolean(*checked), ColumnType::Boolean)
            }
            RawPropertyValue::Url(text)
            | RawPropertyValue::Email(text)
            | RawPropertyValue::Phone(text) => optional_text(text.as_deref()),
            RawPropertyValue::Formula(formula) => formula_cell(formula),
            RawPropertyValue::Rollup(rollup) => self.rollup_cell(rollup),
            RawPropertyValue::Block(block) => text_cell(&render_block(block)),
            RawPropertyValue::Empty => null_cell(),
            RawPropertyValue::Unsupported { type_name, raw } => {
                debug!(type_name = %type_name, "unsupported property type rendered as raw text");
                text_cell(raw)
            }
        }
    }

    fn list_cell(&self, items: impl Iterator<Item = String>) -> (CellValue, ColumnType) {
        let items: Vec<String> = items.filter(|item| !item.is_empty()).collect();
        if items.is_empty() {
            return null_cell();
        }
        (CellValue::Text(items.join(&self.delimiter)), ColumnType::List)
    }

    fn rollup_cell(&self, rollup: &RollupValue) -> (CellValue, ColumnType) {
        match rollup {
            RollupValue::Number(number) => number_cell(*number),
            RollupValue::Date(date) => date_cell(date.as_ref()),
            RollupValue::Array(items) => {
                let rendered = items.iter().filter_map(|item| self.rollup_element(item));
                self.list_cell(rendered)
            }
            RollupValue::Unsupported(raw) => text_cell(raw),
        }
    }

    /// Rollup elements are resolved one level deep. Nested composites fall
    /// back to their raw rendering.
    fn rollup_element(&self, item: &RawPropertyValue) -> Option<String> {
        match item {
            RawPropertyValue::Rollup(_) => Some(item.render_raw()),
            other => self.normalize(other).0.as_text(),
        }
    }
}

fn null_cell() -> (CellValue, ColumnType) {
    (CellValue::Null, ColumnType::Unknown)
}

fn text_cell(text: &str) -> (CellValue, ColumnType) {
    if text.is_empty() {
        null_cell()
    } else {
        (CellValue::Text(text.to_string()), ColumnType::Text)
    }
}

fn optional_text(text: Option<&str>) -> (CellValue, ColumnType) {
    text.map(text_cell).unwrap_or_else(null_cell)
}

fn number_cell(number: Option<f64>) -> (CellValue, ColumnType) {
    match number {
        Some(value) => (CellValue::Number(value), ColumnType::Number),
        None => null_cell(),
    }
}

fn date_cell(date: Option<&DateRange>) -> (CellValue, ColumnType) {
    match date {
        Some(range) if !range.start.is_empty() => {
            (CellValue::Text(render_date(range)), ColumnType::Date)
        }
        _ => null_cell(),
    }
}

fn formula_cell(formula: &FormulaValue) -> (CellValue, ColumnType) {
    match formula {
        FormulaValue::String(text) => optional_text(text.as_deref()),
        FormulaValue::Number(number) => number_cell(*number),
        FormulaValue::Boolean(Some(value)) => (CellValue::Boolean(*value), ColumnType::Boolean),
        FormulaValue::Boolean(None) => null_cell(),
        FormulaValue::Date(date) => date_cell(date.as_ref()),
    }
}

/// Renders a date as ISO-8601: the start alone, or an interval `start/end`.
/// A named time zone is appended in brackets, e.g.
/// `2024-03-01T09:00:00+09:00[Asia/Tokyo]`.
pub fn render_date(range: &DateRange) -> String {
    let mut rendered = range.start.clone();
    if let Some(end) = range.end.as_deref().filter(|end| !end.is_empty()) {
        rendered.push('/');
        rendered.push_str(end);
    }
    if let Some(zone) = range.time_zone.as_deref().filter(|zone| !zone.is_empty()) {
        rendered.push('[');
        rendered.push_str(zone);
        rendered.push(']');
    }
    rendered
}

/// Plain-text rendering of a block and its descendants, depth first, one
/// line per non-empty block.
pub fn render_block(block: &BlockContent) -> String {
    let mut lines = Vec::new();
    collect_block_lines(block, &mut lines);
    lines.join("\n")
}

/// Plain-text rendering of a sequence of blocks in document order.
pub fn render_blocks(blocks: &[BlockContent]) -> String {
    let mut lines = Vec::new();
    for block in blocks {
        collect_block_lines(block, &mut lines);
    }
    lines.join("\n")
}

fn collect_block_lines(block: &BlockContent, lines: &mut Vec<String>) {
    let line = block_line(block);
    if !line.is_empty() {
        lines.push(line);
    }
    for child in &block.children {
        collect_block_lines(child, lines);
    }
}

fn block_line(block: &BlockContent) -> String {
    match &block.kind {
        BlockKind::ToDo => {
            let mark = if block.checked.unwrap_or(false) { 'x' } else { ' ' };
            format!("[{mark}] {}", block.text)
        }
        BlockKind::Code => {
            let language = block.language.as_deref().unwrap_or_default();
            format!("```{language}\n{}\n```", block.text)
        }
        _ => block.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_uses_interval_and_zone() {
        let range = DateRange {
            start: "2024-03-01".to_string(),
            end: Some("2024-03-05".to_string()),
            time_zone: Some("Asia/Tokyo".to_string()),
        };
        assert_eq!(render_date(&range), "2024-03-01/2024-03-05[Asia/Tokyo]");
        assert_eq!(render_date(&DateRange::starting("2024-03-01")), "2024-03-01");
    }

    #[test]
    fn todo_and_code_blocks_keep_their_markers() {
        let mut todo = BlockContent::new("b1", BlockKind::ToDo, "ship it");
        todo.checked = Some(true);
        let mut code = BlockContent::new("b2", BlockKind::Code, "fn main() {}");
        code.language = Some("rust".to_string());

        assert_eq!(render_block(&todo), "[x] ship it");
        assert_eq!(render_block(&code), "```rust\nfn main() {}\n```");
    }

    #[test]
    fn nested_blocks_render_depth_first() {
        let block = BlockContent::new("p", BlockKind::BulletedListItem, "one").with_children(vec![
            BlockContent::new("c1", BlockKind::BulletedListItem, "one.a").with_children(vec![
                BlockContent::new("g1", BlockKind::BulletedListItem, "one.a.i"),
            ]),
            BlockContent::new("c2", BlockKind::BulletedListItem, "one.b"),
        ]);
        assert_eq!(render_block(&block), "one\none.a\none.a.i\none.b");
    }
}
