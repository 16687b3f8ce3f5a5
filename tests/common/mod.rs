#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use notifetch::fetch::{
    Endpoint, PageRequest, RawPage, RemoteService, Sleeper, SourceId, SourceKind,
};
use notifetch::{Result, ToolError};
use serde_json::{Value, json};

pub const HEX: &str = "0123456789abcdef0123456789abcdef";

pub fn source() -> SourceId {
    SourceId::parse(HEX).expect("valid source id")
}

/// A request as the scripted service saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub endpoint: Endpoint,
    pub id: String,
    pub cursor: Option<String>,
    pub page_size: u32,
}

/// In-memory remote service that replays queued responses per object id.
#[derive(Default)]
pub struct ScriptedService {
    kinds: RefCell<VecDeque<Result<SourceKind>>>,
    pages: RefCell<HashMap<String, VecDeque<Result<RawPage>>>>,
    pub requests: RefCell<Vec<Seen>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identify_as(self, kind: Result<SourceKind>) -> Self {
        self.kinds.borrow_mut().push_back(kind);
        self
    }

    pub fn respond(self, id: impl Into<String>, response: Result<RawPage>) -> Self {
        self.pages
            .borrow_mut()
            .entry(id.into())
            .or_default()
            .push_back(response);
        self
    }

    /// Queues a chain of pages for `id`, linked by cursors `c1`, `c2`, ...
    pub fn paginate(mut self, id: &str, batches: Vec<Vec<Value>>) -> Self {
        let count = batches.len();
        for (index, results) in batches.into_iter().enumerate() {
            let next = (index + 1 < count).then(|| format!("c{}", index + 1));
            self = self.respond(id, Ok(page(results, next.as_deref())));
        }
        self
    }

    pub fn requests_for(&self, id: &str) -> Vec<Seen> {
        self.requests
            .borrow()
            .iter()
            .filter(|seen| seen.id == id)
            .cloned()
            .collect()
    }
}

impl RemoteService for ScriptedService {
    fn identify(&self, _id: &SourceId) -> Result<SourceKind> {
        self.kinds
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(SourceKind::Database))
    }

    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<RawPage> {
        self.requests.borrow_mut().push(Seen {
            endpoint: request.endpoint,
            id: request.id.to_string(),
            cursor: request.cursor.map(str::to_string),
            page_size: request.page_size,
        });
        self.pages
            .borrow_mut()
            .get_mut(request.id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(ToolError::NotFound(format!("nothing scripted for {}", request.id))))
    }
}

/// Records every pause instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper(pub RefCell<Vec<Duration>>);

impl RecordingSleeper {
    pub fn pauses(&self) -> Vec<Duration> {
        self.0.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.0.borrow_mut().push(duration);
    }
}

pub fn page(results: Vec<Value>, next: Option<&str>) -> RawPage {
    RawPage {
        results,
        next_cursor: next.map(str::to_string),
        has_more: next.is_some(),
    }
}

pub fn row(id: &str, properties: Value) -> Value {
    json!({
        "object": "page",
        "id": id,
        "created_time": "2024-01-01T00:00:00.000Z",
        "last_edited_time": "2024-01-02T00:00:00.000Z",
        "url": format!("https://www.notion.so/{id}"),
        "properties": properties
    })
}

/// Rows `r<from>..=r<to>` with a title and a number.
pub fn rows(from: usize, to: usize) -> Vec<Value> {
    (from..=to)
        .map(|n| {
            row(
                &format!("r{n}"),
                json!({"Name": title(&format!("Item {n}")), "Score": number(n as f64)}),
            )
        })
        .collect()
}

pub fn title(text: &str) -> Value {
    json!({"type": "title", "title": [{"plain_text": text}]})
}

pub fn rich_text(text: &str) -> Value {
    json!({"type": "rich_text", "rich_text": [{"plain_text": text}]})
}

pub fn number(value: f64) -> Value {
    json!({"type": "number", "number": value})
}

pub fn block(id: &str, text: &str, has_children: bool) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": "paragraph",
        "paragraph": {"rich_text": [{"plain_text": text}]},
        "has_children": has_children
    })
}

pub fn record_ids(records: &[notifetch::model::RemoteRecord]) -> Vec<String> {
    records.iter().map(|record| record.id.clone()).collect()
}
