use std::io::{self, Write};

use presale_core::Envelope;
use serde_json::{Map, Value};

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(
    envelope: &Envelope<Value>,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json if pretty => {
            serde_json::to_writer_pretty(&mut out, envelope)?;
            writeln!(out)?;
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut out, envelope)?;
            writeln!(out)?;
        }
        OutputFormat::Table => write_table(&mut out, envelope)?,
    }
    Ok(())
}

fn write_table(out: &mut impl Write, envelope: &Envelope<Value>) -> Result<(), CliError> {
    match &envelope.data {
        Value::Object(fields) => write_object(out, fields, "")?,
        Value::Null => {}
        other => writeln!(out, "{}", cell(other))?,
    }

    for warning in &envelope.meta.warnings {
        writeln!(out, "warning: {warning}")?;
    }
    for error in &envelope.errors {
        match error.status {
            Some(status) => writeln!(out, "error: {} [{status}] {}", error.code, error.message)?,
            None => writeln!(out, "error: {} {}", error.code, error.message)?,
        }
    }

    writeln!(
        out,
        "({} in {} ms)",
        envelope.meta.request_id, envelope.meta.latency_ms
    )?;
    Ok(())
}

/// Scalars as `key: value` rows; nested objects are prefixed with their
/// parent key and arrays of records become column tables.
fn write_object(
    out: &mut impl Write,
    fields: &Map<String, Value>,
    prefix: &str,
) -> Result<(), CliError> {
    let width = fields
        .keys()
        .map(|key| prefix.len() + key.len())
        .max()
        .unwrap_or(0);

    for (key, value) in fields {
        let name = format!("{prefix}{key}");
        match value {
            Value::Object(nested) => write_object(out, nested, &format!("{name}."))?,
            Value::Array(rows) => {
                writeln!(out, "{name}:")?;
                write_rows(out, rows)?;
            }
            scalar => writeln!(out, "{name:<width$}  {}", cell(scalar))?,
        }
    }
    Ok(())
}

fn write_rows(out: &mut impl Write, rows: &[Value]) -> Result<(), CliError> {
    let Some(Value::Object(first)) = rows.first() else {
        for row in rows {
            writeln!(out, "  {}", cell(row))?;
        }
        return Ok(());
    };

    let columns: Vec<&String> = first.keys().collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(column.as_str()).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .map(|row| row[index].len())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(column, width)| format!("{column:<width$}"))
        .collect();
    writeln!(out, "  {}", header.join("  ").trim_end())?;
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .collect();
        writeln!(out, "  {}", line.join("  ").trim_end())?;
    }
    Ok(())
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use presale_core::{Envelope, EnvelopeMeta};
    use serde_json::json;

    use super::*;

    fn table(data: Value) -> String {
        let meta = EnvelopeMeta::new("req-00000001", "v1.0.0", 4).expect("meta");
        let envelope = Envelope::success(meta, data);
        let mut out = Vec::new();
        write_table(&mut out, &envelope).expect("table");
        String::from_utf8(out).expect("utf-8")
    }

    #[test]
    fn valuation_renders_as_aligned_rows() {
        let text = table(json!({
            "currency_ticker": "sol",
            "token_amount": 12,
            "total_token": 13,
        }));

        assert!(text.contains("currency_ticker  sol\n"));
        assert!(text.contains("token_amount     12\n"));
        assert!(text.ends_with("(req-00000001 in 4 ms)\n"));
    }

    #[test]
    fn record_lists_render_as_columns() {
        let text = table(json!({
            "purchases": [
                { "id": "p-1", "total_token": 1667 },
                { "id": "p-22", "total_token": 9 },
            ],
        }));

        assert!(text.contains("purchases:\n  id    total_token\n  p-1   1667\n  p-22  9\n"));
    }
}
