use std::fmt::Write;

use crate::notifetch::pipeline::model::Table;

/// Renders the table as a standalone `<table>` element. Every header and cell
/// is escaped; null cells render empty.
pub fn encode_html(table: &Table) -> String {
    let mut html = String::from("<table>\n  <thead>\n    <tr>");
    for column in table.columns() {
        let _ = write!(
            html,
            "<th data-type=\"{}\">{}</th>",
            column.column_type,
            escape(&column.name)
        );
    }
    html.push_str("</tr>\n  </thead>\n  <tbody>\n");

    for row in table.rows() {
        html.push_str("    <tr>");
        for cell in row {
            let text = cell.as_text().unwrap_or_default();
            let _ = write!(html, "<td>{}</td>", escape(&text));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("  </tbody>\n</table>\n");
    html
}

/// Escapes the five HTML-significant characters.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
