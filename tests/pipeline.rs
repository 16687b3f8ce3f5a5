mod common;

use std::time::Duration;

use common::{RecordingSleeper, ScriptedService, number, page, rich_text, row, rows, source, title};
use notifetch::ToolError;
use notifetch::fetch::{FetchOptions, Fetcher, RetryPolicy, SourceKind};
use notifetch::flatten::{ChildBlockMode, FlattenOptions, FlattenWarning, Flattener};
use notifetch::model::{
    BlockContent, BlockKind, CellValue, ColumnType, DateRange, FormulaValue, RawPropertyValue,
    RemoteRecord, RollupValue,
};
use notifetch::normalize::{Normalizer, normalize};
use notifetch::summary::{SamplePolicy, TableSummary};
use notifetch::sync::{self, RunEnd};
use serde_json::json;

fn properties_only() -> Flattener {
    Flattener::new(
        FlattenOptions {
            include_metadata: false,
            ..FlattenOptions::default()
        },
        Normalizer::default(),
    )
}

fn text(value: &str) -> RawPropertyValue {
    RawPropertyValue::RichText(value.to_string())
}

#[test]
fn sparse_records_unify_into_first_seen_columns() {
    let records = vec![
        RemoteRecord::new("a")
            .with_property("Name", RawPropertyValue::Title("Alpha".to_string()))
            .with_property("Score", RawPropertyValue::Number(Some(5.0))),
        RemoteRecord::new("b")
            .with_property("Name", RawPropertyValue::Title("Beta".to_string()))
            .with_property("Score", RawPropertyValue::Number(Some(7.5)))
            .with_property("Notes", text("late")),
        RemoteRecord::new("c").with_property("Name", RawPropertyValue::Title("Gamma".to_string())),
    ];

    let (table, warnings) = sync::build_table(&records, &properties_only()).expect("table built");

    assert!(warnings.is_empty());
    assert_eq!(
        table.column_names().collect::<Vec<_>>(),
        vec!["Name", "Score", "Notes"]
    );
    let types: Vec<ColumnType> = table.columns().iter().map(|column| column.column_type).collect();
    assert_eq!(types, vec![ColumnType::Text, ColumnType::Number, ColumnType::Text]);
    let ordinals: Vec<usize> = table.columns().iter().map(|column| column.ordinal).collect();
    assert_eq!(ordinals, vec![0, 1, 2]);

    assert_eq!(table.rows().len(), 3);
    assert_eq!(table.rows()[0][2], CellValue::Null);
    assert_eq!(table.rows()[2][1], CellValue::Null);
    assert_eq!(table.rows()[2][2], CellValue::Null);
    assert!(table.rows().iter().all(|row| row.len() == 3));
}

#[test]
fn conflicting_observations_widen_the_column_to_text() {
    let records = vec![
        RemoteRecord::new("a").with_property("Score", RawPropertyValue::Number(Some(5.0))),
        RemoteRecord::new("b").with_property("Score", text("n/a")),
        RemoteRecord::new("c").with_property("Score", RawPropertyValue::Number(None)),
    ];

    let (table, _) = sync::build_table(&records, &properties_only()).expect("table built");

    assert_eq!(table.columns()[0].column_type, ColumnType::Text);
    assert_eq!(table.rows()[1][0], CellValue::Text("n/a".to_string()));
    assert_eq!(table.rows()[2][0], CellValue::Null);
}

#[test]
fn null_only_column_stays_unknown() {
    let records = vec![
        RemoteRecord::new("a").with_property("Due", RawPropertyValue::Date(None)),
        RemoteRecord::new("b").with_property("Due", RawPropertyValue::Empty),
    ];

    let (table, _) = sync::build_table(&records, &properties_only()).expect("table built");

    assert_eq!(table.columns()[0].column_type, ColumnType::Unknown);
}

#[test]
fn rebuilding_the_same_records_is_deterministic() {
    let records: Vec<RemoteRecord> = (0..20)
        .map(|n| {
            let mut record = RemoteRecord::new(format!("r{n}"))
                .with_property("Name", RawPropertyValue::Title(format!("Item {n}")));
            if n % 3 == 0 {
                record.insert_property("Tags", RawPropertyValue::MultiSelect(vec!["x".to_string()]));
            }
            if n % 5 == 0 {
                record.insert_property("Done", RawPropertyValue::Checkbox(n % 2 == 0));
            }
            record
        })
        .collect();
    let flattener = Flattener::default();

    let (first, _) = sync::build_table(&records, &flattener).expect("table built");
    let (second, _) = sync::build_table(&records, &flattener).expect("table built");

    assert_eq!(first, second);
    assert_eq!(
        first.column_names().collect::<Vec<_>>(),
        vec!["id", "created_time", "last_edited_time", "url", "Name", "Tags", "Done"]
    );
}

#[test]
fn metadata_columns_lead_the_table() {
    let mut record = RemoteRecord::new("r1").with_property("Name", RawPropertyValue::Title("A".to_string()));
    record.created_time = Some("2024-01-01T00:00:00.000Z".to_string());
    record.url = Some("https://www.notion.so/r1".to_string());

    let (table, _) = sync::build_table(&[record], &Flattener::default()).expect("table built");

    let row = &table.rows()[0];
    assert_eq!(row[0], CellValue::Text("r1".to_string()));
    assert_eq!(row[1], CellValue::Text("2024-01-01T00:00:00.000Z".to_string()));
    assert_eq!(row[2], CellValue::Null);
    assert_eq!(table.columns()[1].column_type, ColumnType::Date);
    assert_eq!(table.column_index("Name"), Some(4));
}

#[test]
fn unsupported_properties_become_raw_text_with_a_warning() {
    let record = RemoteRecord::new("r1").with_property(
        "Button",
        RawPropertyValue::Unsupported {
            type_name: "button".to_string(),
            raw: r#"{"type":"button"}"#.to_string(),
        },
    );

    let (table, warnings) = sync::build_table(&[record], &properties_only()).expect("table built");

    assert_eq!(
        warnings,
        vec![FlattenWarning::UnsupportedPropertyType {
            record: "r1".to_string(),
            property: "Button".to_string(),
            type_name: "button".to_string(),
        }]
    );
    assert_eq!(table.rows()[0][0], CellValue::Text(r#"{"type":"button"}"#.to_string()));
}

#[test]
fn child_blocks_concatenate_or_promote() {
    let mut todo = BlockContent::new("b2", BlockKind::ToDo, "Review");
    todo.checked = Some(false);
    let record = RemoteRecord {
        children: vec![
            BlockContent::new("b1", BlockKind::Heading(1), "Plan").with_children(vec![
                BlockContent::new("b1a", BlockKind::Paragraph, "Draft"),
            ]),
            todo,
        ],
        ..RemoteRecord::new("r1")
    };

    let concatenated = properties_only().flatten(&record);
    assert_eq!(
        concatenated.get("content").map(|cell| &cell.value),
        Some(&CellValue::Text("Plan\nDraft\n[ ] Review".to_string()))
    );

    let promoting = Flattener::new(
        FlattenOptions {
            include_metadata: false,
            child_blocks: ChildBlockMode::Promote,
        },
        Normalizer::default(),
    );
    let promoted = promoting.flatten(&record);
    assert_eq!(promoted.column_order(), ["content_1", "content_2"]);
    assert_eq!(
        promoted.get("content_1").map(|cell| &cell.value),
        Some(&CellValue::Text("Plan\nDraft".to_string()))
    );
}

#[test]
fn normalization_covers_every_property_kind() {
    let cases: Vec<(RawPropertyValue, CellValue, ColumnType)> = vec![
        (
            RawPropertyValue::Title("T".to_string()),
            CellValue::Text("T".to_string()),
            ColumnType::Text,
        ),
        (RawPropertyValue::RichText(String::new()), CellValue::Null, ColumnType::Unknown),
        (RawPropertyValue::Number(Some(3.0)), CellValue::Number(3.0), ColumnType::Number),
        (RawPropertyValue::Number(None), CellValue::Null, ColumnType::Unknown),
        (
            RawPropertyValue::Select(Some("Open".to_string())),
            CellValue::Text("Open".to_string()),
            ColumnType::Text,
        ),
        (RawPropertyValue::Select(None), CellValue::Null, ColumnType::Unknown),
        (
            RawPropertyValue::MultiSelect(vec!["a".to_string(), "b".to_string()]),
            CellValue::Text("a, b".to_string()),
            ColumnType::List,
        ),
        (RawPropertyValue::MultiSelect(Vec::new()), CellValue::Null, ColumnType::Unknown),
        (
            RawPropertyValue::Date(Some(DateRange::starting("2024-05-01"))),
            CellValue::Text("2024-05-01".to_string()),
            ColumnType::Date,
        ),
        (RawPropertyValue::Checkbox(false), CellValue::Boolean(false), ColumnType::Boolean),
        (
            RawPropertyValue::Url(Some("https://example.com".to_string())),
            CellValue::Text("https://example.com".to_string()),
            ColumnType::Text,
        ),
        (RawPropertyValue::Email(None), CellValue::Null, ColumnType::Unknown),
        (
            RawPropertyValue::Phone(Some("+1 555".to_string())),
            CellValue::Text("+1 555".to_string()),
            ColumnType::Text,
        ),
        (
            RawPropertyValue::People(vec!["Ada".to_string()]),
            CellValue::Text("Ada".to_string()),
            ColumnType::List,
        ),
        (
            RawPropertyValue::Relation(vec!["p1".to_string(), "p2".to_string()]),
            CellValue::Text("p1, p2".to_string()),
            ColumnType::List,
        ),
        (
            RawPropertyValue::Formula(FormulaValue::Number(Some(2.5))),
            CellValue::Number(2.5),
            ColumnType::Number,
        ),
        (
            RawPropertyValue::Formula(FormulaValue::Boolean(Some(true))),
            CellValue::Boolean(true),
            ColumnType::Boolean,
        ),
        (
            RawPropertyValue::Rollup(RollupValue::Number(Some(10.0))),
            CellValue::Number(10.0),
            ColumnType::Number,
        ),
        (
            RawPropertyValue::Rollup(RollupValue::Array(vec![
                RawPropertyValue::Number(Some(1.0)),
                RawPropertyValue::Title("two".to_string()),
                RawPropertyValue::Empty,
            ])),
            CellValue::Text("1, two".to_string()),
            ColumnType::List,
        ),
        (
            RawPropertyValue::Block(BlockContent::new("b", BlockKind::Quote, "Quoted")),
            CellValue::Text("Quoted".to_string()),
            ColumnType::Text,
        ),
        (RawPropertyValue::Empty, CellValue::Null, ColumnType::Unknown),
        (
            RawPropertyValue::Unsupported {
                type_name: "button".to_string(),
                raw: "{}".to_string(),
            },
            CellValue::Text("{}".to_string()),
            ColumnType::Text,
        ),
    ];

    for (raw, cell, column_type) in cases {
        assert_eq!(normalize(&raw), (cell, column_type), "normalizing {raw:?}");
    }
}

#[test]
fn list_delimiter_is_configurable() {
    let normalizer = Normalizer::new(" | ");
    let (cell, _) = normalizer.normalize(&RawPropertyValue::MultiSelect(vec![
        "red".to_string(),
        "blue".to_string(),
    ]));
    assert_eq!(cell, CellValue::Text("red | blue".to_string()));
}

#[test]
fn fetched_database_becomes_a_table() {
    let id = source().to_string();
    let service = ScriptedService::new()
        .respond(
            &id,
            Ok(page(
                vec![
                    row("r1", json!({"Name": title("Alpha"), "Score": number(5.0)})),
                    row(
                        "r2",
                        json!({"Name": title("Beta"), "Score": number(7.0), "Notes": rich_text("late")}),
                    ),
                ],
                Some("c1"),
            )),
        )
        .respond(&id, Ok(page(vec![row("r3", json!({"Name": title("Gamma")}))], None)));
    let sleeper = RecordingSleeper::default();
    let fetcher = Fetcher::new(
        &service,
        &sleeper,
        FetchOptions {
            page_pause: Duration::ZERO,
            ..FetchOptions::default()
        },
    );

    let run = sync::fetch_table(&fetcher, &properties_only(), &source(), None, None)
        .expect("run completes");

    assert_eq!(run.kind, SourceKind::Database);
    assert!(matches!(run.end, RunEnd::Complete));
    assert_eq!(run.cursor.retrieved(), 3);
    assert_eq!(
        run.table.column_names().collect::<Vec<_>>(),
        vec!["Name", "Score", "Notes"]
    );
    assert_eq!(run.table.rows()[1][1], CellValue::Number(7.0));
    assert_eq!(run.table.rows()[2][2], CellValue::Null);
}

#[test]
fn interrupted_run_keeps_the_partial_table() {
    let id = source().to_string();
    let service = ScriptedService::new()
        .respond(&id, Ok(page(rows(1, 3), Some("c1"))))
        .respond(&id, Err(ToolError::Permission("restricted".to_string())));
    let sleeper = RecordingSleeper::default();
    let fetcher = Fetcher::new(
        &service,
        &sleeper,
        FetchOptions {
            page_pause: Duration::ZERO,
            retry: RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
            ..FetchOptions::default()
        },
    );

    let run = sync::fetch_table(
        &fetcher,
        &properties_only(),
        &source(),
        Some(SourceKind::Database),
        None,
    )
    .expect("run returns partial results");

    assert_eq!(run.table.rows().len(), 3);
    assert_eq!(run.cursor.retrieved(), 3);
    assert_eq!(run.cursor.token(), Some("c1"));
    let RunEnd::Interrupted(error) = run.end else {
        panic!("run should be interrupted");
    };
    assert!(matches!(error.root_cause(), ToolError::Permission(_)));
}

#[test]
fn identification_failure_is_returned_directly() {
    let service = ScriptedService::new()
        .identify_as(Err(ToolError::NotFound("no such object".to_string())));
    let sleeper = RecordingSleeper::default();
    let fetcher = Fetcher::new(&service, &sleeper, FetchOptions::default());

    let error = sync::fetch_table(&fetcher, &properties_only(), &source(), None, None)
        .expect_err("unknown source");

    assert!(matches!(error, ToolError::NotFound(_)));
    assert!(service.requests.borrow().is_empty());
}

#[test]
fn summary_reports_types_statistics_and_a_sample() {
    let records: Vec<RemoteRecord> = (1..=4)
        .map(|n| {
            RemoteRecord::new(format!("r{n}"))
                .with_property("Name", RawPropertyValue::Title(format!("Item {}", n % 2)))
                .with_property("Score", RawPropertyValue::Number(Some(n as f64)))
        })
        .collect();
    let (table, _) = sync::build_table(&records, &properties_only()).expect("table built");

    let summary = TableSummary::build(&table, SamplePolicy { rows: 2 });

    assert_eq!(summary.row_count, 4);
    assert_eq!(summary.columns[0].unique, 2);
    let stats = summary.columns[1].numeric.as_ref().expect("numeric stats");
    assert_eq!((stats.min, stats.max, stats.mean), (1.0, 4.0, 2.5));
    assert_eq!(summary.sample.len(), 2);
    assert_eq!(summary.sample[0], vec![json!("Item 1"), json!(1.0)]);

    let text = summary.to_prompt_text();
    assert!(text.contains("- Score (number): 4/4 non-null, 4 unique, min=1, max=4, mean=2.50"));
    assert!(text.contains("Sample (2 rows):"));
}

#[test]
fn property_shadowing_a_metadata_column_is_reported() {
    let record = RemoteRecord::new("r1")
        .with_property("id", RawPropertyValue::Number(Some(7.0)))
        .with_property("Name", RawPropertyValue::Title("A".to_string()));

    let (table, warnings) = sync::build_table(&[record], &Flattener::default()).expect("table built");

    assert_eq!(table.column_index("id"), Some(0));
    assert_eq!(table.rows()[0][0], CellValue::Number(7.0));
    assert_eq!(
        warnings,
        vec![FlattenWarning::ColumnOverwritten {
            record: "r1".to_string(),
            column: "id".to_string(),
        }]
    );
}

#[test]
fn unknown_rollup_function_is_reported_as_unsupported() {
    let record = RemoteRecord::new("r1").with_property(
        "Spread",
        RawPropertyValue::Rollup(RollupValue::Unsupported(r#"{"type":"mystery"}"#.to_string())),
    );

    let (table, warnings) = sync::build_table(&[record], &properties_only()).expect("table built");

    assert_eq!(
        warnings,
        vec![FlattenWarning::UnsupportedPropertyType {
            record: "r1".to_string(),
            property: "Spread".to_string(),
            type_name: "rollup".to_string(),
        }]
    );
    assert_eq!(table.rows()[0][0], CellValue::Text(r#"{"type":"mystery"}"#.to_string()));
}
