//! Text rendering of query results.
//!
//! Two renderers exist. `markdown` produces a pipe-joined table; every other
//! format name, `json` included, produces one `key: value | key: value` line
//! per record. The `json` name does not emit real JSON: callers depend on the
//! line form, so it is kept as-is.
//!
//! The table takes its columns from the first record only. Keys that appear
//! only in later records are dropped. Flagged for product review; do not
//! change without sign-off.

use serde_json::Value;

/// Output format selected by name, case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
}

impl OutputFormat {
    /// Unknown names fall back to [`OutputFormat::Json`].
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("markdown") {
            OutputFormat::Markdown
        } else {
            OutputFormat::Json
        }
    }
}

pub fn format_results(results: &[Value], format_type: &str) -> String {
    match OutputFormat::from_name(format_type) {
        OutputFormat::Markdown => format_markdown(results),
        OutputFormat::Json => format_lines(results),
    }
}

/// Strings render raw, everything else as compact JSON.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_lines(results: &[Value]) -> String {
    results
        .iter()
        .map(|row| match row {
            Value::Object(record) => record
                .iter()
                .map(|(k, v)| format!("{}: {}", k, cell_text(v)))
                .collect::<Vec<_>>()
                .join(" | "),
            other => cell_text(other),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_markdown(results: &[Value]) -> String {
    let Some(first) = results.first() else {
        return "No results".to_string();
    };

    let Value::Object(first) = first else {
        return results.iter().map(cell_text).collect::<Vec<_>>().join("\n");
    };

    let headers: Vec<&String> = first.keys().collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    let records: Vec<_> = results.iter().filter_map(Value::as_object).collect();

    for record in &records {
        for (width, header) in widths.iter_mut().zip(&headers) {
            if let Some(value) = record.get(header.as_str()) {
                *width = (*width).max(cell_text(value).chars().count());
            }
        }
    }

    let join_row = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let header_line = join_row(headers.iter().map(|h| h.to_string()).collect());
    let separator = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join(" | ");
    let rows: Vec<String> = records
        .iter()
        .map(|record| {
            join_row(
                headers
                    .iter()
                    .map(|h| record.get(h.as_str()).map(cell_text).unwrap_or_default())
                    .collect(),
            )
        })
        .collect();

    format!("{}\n{}\n{}", header_line, separator, rows.join("\n"))
}

/// Left-justify `text` to `width` characters.
fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{}{}", text, " ".repeat(width.saturating_sub(len)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_results() {
        assert_eq!(format_results(&[], "markdown"), "No results");
        assert_eq!(format_results(&[], "json"), "");
        assert_eq!(format_results(&[], "MarkDown"), "No results");
    }

    #[test]
    fn test_markdown_widths() {
        let results = vec![json!({"a": 1, "bb": 22}), json!({"a": 333, "bb": 4})];
        let text = format_results(&results, "markdown");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "a   | bb");
        assert_eq!(lines[1], "--- | --");
        assert_eq!(lines[2], "1   | 22");
        assert_eq!(lines[3], "333 | 4 ");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_markdown_columns_come_from_first_record() {
        let results = vec![
            json!({"id": 1, "name": "x"}),
            json!({"id": 2, "extra": "dropped-value"}),
        ];
        let text = format_results(&results, "markdown");

        assert!(!text.contains("extra"));
        assert!(!text.contains("dropped-value"));
        assert_eq!(text.lines().nth(3).unwrap(), "2  |     ");
    }

    #[test]
    fn test_markdown_scalars() {
        let results = vec![json!("postgres"), json!("analytics")];
        assert_eq!(format_results(&results, "markdown"), "postgres\nanalytics");
    }

    #[test]
    fn test_lines_keep_key_order() {
        let results = vec![
            json!({"zeta": "z", "alpha": null, "n": 1.5}),
            json!("plain"),
        ];
        assert_eq!(
            format_results(&results, "json"),
            "zeta: z | alpha: null | n: 1.5\nplain"
        );
    }

    #[test]
    fn test_unknown_format_uses_lines() {
        let results = vec![json!({"count": 3})];
        assert_eq!(format_results(&results, "csv"), "count: 3");
        assert_eq!(OutputFormat::from_name("MARKDOWN"), OutputFormat::Markdown);
    }

    #[test]
    fn test_nested_values_render_as_json() {
        let results = vec![json!({"ids": ["a", "b"]})];
        assert_eq!(format_results(&results, "json"), r#"ids: ["a","b"]"#);
    }
}
