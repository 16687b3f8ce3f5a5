//! Decoding of the remote service's JSON payloads into the typed model.
//!
//! Property decoding never fails: a shape we do not recognise becomes
//! [`RawPropertyValue::Unsupported`] carrying the raw JSON. Only structural
//! problems with whole records (a missing identifier) are reported as errors.

use serde::Deserialize;
use serde_json::Value;

use crate::notifetch::pipeline::error::{Result, ToolError};
use crate::notifetch::pipeline::model::{
    BlockContent, BlockKind, DateRange, FormulaValue, RawPropertyValue, RemoteRecord, RollupValue,
};

/// Property name under which a page block's type is stored.
pub const BLOCK_TYPE_PROPERTY: &str = "type";
/// Property name under which a page block's content is stored.
pub const BLOCK_TEXT_PROPERTY: &str = "text";

/// One page of results as the service returns it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawPage {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

impl RawPage {
    /// Continuation for the following page, `None` on the last page.
    pub fn continuation(&self) -> Option<String> {
        if self.has_more {
            self.next_cursor.clone()
        } else {
            None
        }
    }
}

/// Decodes a database row.
pub fn decode_record(value: &Value) -> Result<RemoteRecord> {
    let mut record = RemoteRecord::new(required_id(value)?);
    record.created_time = string_field(value, "created_time");
    record.last_edited_time = string_field(value, "last_edited_time");
    record.url = string_field(value, "url");

    if let Some(properties) = value.get("properties").and_then(Value::as_object) {
        for (name, property) in properties {
            record.insert_property(name.clone(), decode_property(property));
        }
    }

    Ok(record)
}

/// Decodes a single content block without its nested children.
pub fn decode_block(value: &Value) -> Result<BlockContent> {
    let id = required_id(value)?;
    let type_name = value.get("type").and_then(Value::as_str).unwrap_or_default();
    let payload = value.get(type_name).unwrap_or(&Value::Null);

    let kind = match type_name {
        "paragraph" => BlockKind::Paragraph,
        "heading_1" => BlockKind::Heading(1),
        "heading_2" => BlockKind::Heading(2),
        "heading_3" => BlockKind::Heading(3),
        "bulleted_list_item" => BlockKind::BulletedListItem,
        "numbered_list_item" => BlockKind::NumberedListItem,
        "to_do" => BlockKind::ToDo,
        "code" => BlockKind::Code,
        "quote" => BlockKind::Quote,
        "callout" => BlockKind::Callout,
        "toggle" => BlockKind::Toggle,
        "table_row" => BlockKind::TableRow,
        other => BlockKind::Other(other.to_string()),
    };

    let text = match kind {
        BlockKind::TableRow => payload
            .get("cells")
            .and_then(Value::as_array)
            .map(|cells| {
                cells
                    .iter()
                    .map(rich_text_plain)
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .unwrap_or_default(),
        BlockKind::Other(_) => String::new(),
        _ => payload.get("rich_text").map(rich_text_plain).unwrap_or_default(),
    };

    let mut block = BlockContent::new(id, kind, text);
    block.checked = payload.get("checked").and_then(Value::as_bool);
    block.language = string_field(payload, "language");
    block.has_children = value
        .get("has_children")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok(block)
}

/// Wraps a top-level page block as a record so page content flows through the
/// same table pipeline as database rows.
pub fn block_record(block: BlockContent, value: &Value) -> RemoteRecord {
    let mut record = RemoteRecord::new(block.id.clone());
    record.created_time = string_field(value, "created_time");
    record.last_edited_time = string_field(value, "last_edited_time");
    record.insert_property(
        BLOCK_TYPE_PROPERTY,
        RawPropertyValue::Select(Some(block.kind.type_name())),
    );
    record.insert_property(BLOCK_TEXT_PROPERTY, RawPropertyValue::Block(block));
    record
}

/// Decodes one property value. Unknown shapes are preserved as raw JSON.
pub fn decode_property(property: &Value) -> RawPropertyValue {
    let Some(type_name) = property.get("type").and_then(Value::as_str) else {
        return unsupported("missing", property);
    };
    let payload = property.get(type_name).unwrap_or(&Value::Null);

    match type_name {
        "title" => RawPropertyValue::Title(rich_text_plain(payload)),
        "rich_text" => RawPropertyValue::RichText(rich_text_plain(payload)),
        "number" => RawPropertyValue::Number(payload.as_f64()),
        "select" | "status" => RawPropertyValue::Select(string_field(payload, "name")),
        "multi_select" => RawPropertyValue::MultiSelect(names(payload)),
        "date" => RawPropertyValue::Date(decode_date(payload)),
        "checkbox" => RawPropertyValue::Checkbox(payload.as_bool().unwrap_or(false)),
        "url" => RawPropertyValue::Url(payload.as_str().map(str::to_string)),
        "email" => RawPropertyValue::Email(payload.as_str().map(str::to_string)),
        "phone_number" => RawPropertyValue::Phone(payload.as_str().map(str::to_string)),
        "people" => RawPropertyValue::People(people(payload)),
        "relation" => RawPropertyValue::Relation(
            payload
                .as_array()
                .map(|items| items.iter().filter_map(|item| string_field(item, "id")).collect())
                .unwrap_or_default(),
        ),
        "created_time" | "last_edited_time" => RawPropertyValue::Date(
            payload.as_str().map(DateRange::starting),
        ),
        "created_by" | "last_edited_by" => {
            RawPropertyValue::People(person_name(payload).into_iter().collect())
        }
        "formula" => decode_formula(payload).unwrap_or_else(|| unsupported("formula", property)),
        "rollup" => RawPropertyValue::Rollup(decode_rollup(payload)),
        other => unsupported(other, property),
    }
}

fn decode_formula(payload: &Value) -> Option<RawPropertyValue> {
    let result_type = payload.get("type").and_then(Value::as_str)?;
    let value = payload.get(result_type).unwrap_or(&Value::Null);
    let formula = match result_type {
        "string" => FormulaValue::String(value.as_str().map(str::to_string)),
        "number" => FormulaValue::Number(value.as_f64()),
        "boolean" => FormulaValue::Boolean(value.as_bool()),
        "date" => FormulaValue::Date(decode_date(value)),
        _ => return None,
    };
    Some(RawPropertyValue::Formula(formula))
}

fn decode_rollup(payload: &Value) -> RollupValue {
    let result_type = payload.get("type").and_then(Value::as_str).unwrap_or_default();
    let value = payload.get(result_type).unwrap_or(&Value::Null);
    match result_type {
        "number" => RollupValue::Number(value.as_f64()),
        "date" => RollupValue::Date(decode_date(value)),
        "array" => RollupValue::Array(
            value
                .as_array()
                .map(|items| items.iter().map(decode_property).collect())
                .unwrap_or_default(),
        ),
        _ => RollupValue::Unsupported(payload.to_string()),
    }
}

fn decode_date(payload: &Value) -> Option<DateRange> {
    let start = string_field(payload, "start")?;
    Some(DateRange {
        start,
        end: string_field(payload, "end"),
        time_zone: string_field(payload, "time_zone"),
    })
}

/// Concatenates the plain text of a rich-text array.
pub fn rich_text_plain(value: &Value) -> String {
    let Some(segments) = value.as_array() else {
        return String::new();
    };
    segments
        .iter()
        .filter_map(|segment| {
            segment
                .get("plain_text")
                .and_then(Value::as_str)
                .or_else(|| {
                    segment
                        .get("text")
                        .and_then(|text| text.get("content"))
                        .and_then(Value::as_str)
                })
        })
        .collect()
}

fn names(payload: &Value) -> Vec<String> {
    payload
        .as_array()
        .map(|items| items.iter().filter_map(|item| string_field(item, "name")).collect())
        .unwrap_or_default()
}

fn people(payload: &Value) -> Vec<String> {
    payload
        .as_array()
        .map(|items| items.iter().filter_map(person_name).collect())
        .unwrap_or_default()
}

/// A person's display name, falling back to the user id when the name is
/// not shared with the integration.
fn person_name(person: &Value) -> Option<String> {
    string_field(person, "name").or_else(|| string_field(person, "id"))
}

fn required_id(value: &Value) -> Result<String> {
    string_field(value, "id")
        .ok_or_else(|| ToolError::Decode(format!("object without an id: {value}")))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn unsupported(type_name: &str, raw: &Value) -> RawPropertyValue {
    RawPropertyValue::Unsupported {
        type_name: type_name.to_string(),
        raw: raw.to_string(),
    }
}
