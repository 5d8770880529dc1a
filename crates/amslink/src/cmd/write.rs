use serde::Serialize;

use crate::cmd::{connect, runtime, TargetArgs, WriteArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct WriteOutput {
    name: String,
    kind: amslink_client::ValueKind,
    size: usize,
    value: String,
    written: bool,
}

pub fn run(args: WriteArgs, target: &TargetArgs, format: OutputFormat) -> CliResult<i32> {
    // Bad input is reported before touching the network.
    let value = args
        .kind
        .parse(&args.value)
        .map_err(|err| client_error("invalid value", err))?;
    let size = value
        .encode()
        .map_err(|err| client_error("invalid value", err))?
        .len();

    let config = target.client_config()?;
    runtime()?.block_on(async {
        let client = connect(config).await?;
        let written = client.write_by_name(&args.name, &value).await;
        client.disconnect().await;
        written.map_err(|err| client_error(&format!("write {} failed", args.name), err))?;
        Ok::<_, CliError>(())
    })?;

    let out = WriteOutput {
        name: args.name,
        kind: args.kind,
        size,
        value: value.to_string(),
        written: true,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["NAME", "KIND", "SIZE", "VALUE"],
            vec![vec![
                out.name.clone(),
                out.kind.to_string(),
                out.size.to_string(),
                out.value.clone(),
            ]],
        ),
        OutputFormat::Pretty => println!("{} ({}) <- {}", out.name, out.kind, out.value),
        OutputFormat::Raw => {}
    }
    Ok(SUCCESS)
}
