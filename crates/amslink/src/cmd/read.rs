use amslink_client::{ClientError, PlcValue, ValueKind};
use serde::Serialize;

use crate::cmd::{connect, runtime, ReadArgs, TargetArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS};
use crate::output::{print_json, print_raw, print_table, OutputFormat};

#[derive(Serialize)]
struct ReadRow {
    name: String,
    kind: ValueKind,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip)]
    data: Vec<u8>,
}

impl ReadRow {
    fn ok(name: String, kind: ValueKind, data: &[u8], value: &PlcValue) -> Self {
        let value = match value {
            // Hex reads better than a JSON array of numbers.
            PlcValue::Raw(_) => serde_json::Value::String(value.to_string()),
            other => serde_json::to_value(other).unwrap_or(serde_json::Value::Null),
        };
        Self {
            name,
            kind,
            size: data.len(),
            value: Some(value),
            error: None,
            data: data.to_vec(),
        }
    }

    fn failed(name: String, kind: ValueKind, err: &ClientError) -> Self {
        Self {
            name,
            kind,
            size: 0,
            value: None,
            error: Some(err.to_string()),
            data: Vec::new(),
        }
    }

    fn display_value(&self) -> String {
        match (&self.value, &self.error) {
            (Some(serde_json::Value::String(text)), _) => text.clone(),
            (Some(value), _) => value.to_string(),
            (None, Some(err)) => format!("error: {err}"),
            (None, None) => String::new(),
        }
    }
}

pub fn run(args: ReadArgs, target: &TargetArgs, format: OutputFormat) -> CliResult<i32> {
    let config = target.client_config()?;
    let results = runtime()?.block_on(async {
        let client = connect(config).await?;
        let results = client.read_many(&args.names).await;
        client.disconnect().await;
        Ok::<_, CliError>(results)
    })?;

    let mut rows = Vec::with_capacity(results.len());
    let mut first_error = None;
    for (name, result) in results {
        let decoded = result.and_then(|data| {
            let value = args.kind.decode(&data)?;
            Ok((data, value))
        });
        match decoded {
            Ok((data, value)) => rows.push(ReadRow::ok(name, args.kind, &data, &value)),
            Err(err) => {
                rows.push(ReadRow::failed(name.clone(), args.kind, &err));
                if first_error.is_none() {
                    first_error = Some(client_error(&format!("read {name} failed"), err));
                }
            }
        }
    }

    print_rows(&rows, format);
    match first_error {
        Some(err) => Err(err),
        None => Ok(SUCCESS),
    }
}

fn print_rows(rows: &[ReadRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => rows.iter().for_each(print_json),
        OutputFormat::Table => print_table(
            &["NAME", "KIND", "SIZE", "VALUE"],
            rows.iter()
                .map(|row| {
                    vec![
                        row.name.clone(),
                        row.kind.to_string(),
                        row.size.to_string(),
                        row.display_value(),
                    ]
                })
                .collect(),
        ),
        OutputFormat::Pretty => {
            for row in rows {
                println!("{} ({}) = {}", row.name, row.kind, row.display_value());
            }
        }
        OutputFormat::Raw => {
            for row in rows {
                print_raw(&row.data);
            }
        }
    }
}
