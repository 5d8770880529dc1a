use amslink_client::{AdsState, Simulator, ValueKind};
use serde::Serialize;
use tracing::info;

use crate::cmd::{runtime, SimulateArgs};
use crate::exit::{client_error, io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct ListeningOutput {
    listening: String,
    ads_state: u16,
    symbols: Vec<String>,
}

/// A parsed `--symbol NAME=KIND:VALUE` seed.
#[derive(Debug, PartialEq)]
struct Seed {
    name: String,
    bytes: Vec<u8>,
}

fn parse_seed(arg: &str) -> CliResult<Seed> {
    let usage = || {
        CliError::new(USAGE, format!("invalid --symbol '{arg}': expected NAME=KIND:VALUE"))
    };
    let (name, typed) = arg.split_once('=').ok_or_else(usage)?;
    let (kind, value) = typed.split_once(':').ok_or_else(usage)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(usage());
    }

    let kind: ValueKind = kind
        .parse()
        .map_err(|err| client_error(&format!("invalid --symbol '{arg}'"), err))?;
    let bytes = kind
        .parse(value)
        .and_then(|value| value.encode())
        .map_err(|err| client_error(&format!("invalid --symbol '{arg}'"), err))?;
    Ok(Seed {
        name: name.to_string(),
        bytes,
    })
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let seeds = args
        .symbols
        .iter()
        .map(|arg| parse_seed(arg))
        .collect::<CliResult<Vec<_>>>()?;

    runtime()?.block_on(async {
        let mut simulator = Simulator::bind(&args.bind)
            .await
            .map_err(|err| transport_error("bind failed", err))?
            .with_state(AdsState::from_u16(args.ads_state), args.device_state);
        for seed in seeds {
            simulator = simulator.with_symbol(seed.name, seed.bytes);
        }

        let handle = simulator.spawn();
        let out = ListeningOutput {
            listening: handle.local_addr().to_string(),
            ads_state: args.ads_state,
            symbols: handle.symbols().names(),
        };
        match format {
            OutputFormat::Json => print_json(&out),
            _ => println!("listening on {}", out.listening),
        }

        tokio::signal::ctrl_c()
            .await
            .map_err(|err| io_error("signal handler setup failed", err))?;
        info!("interrupted, shutting down");
        handle.shutdown().await;
        Ok::<_, CliError>(())
    })?;

    Ok(SUCCESS)
}
