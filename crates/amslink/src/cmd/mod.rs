use std::path::PathBuf;
use std::time::Duration;

use amslink_client::{Client, ClientConfig, ValueKind};
use amslink_frame::{AmsAddress, AmsNetId};
use clap::{Args, Subcommand};

use crate::exit::{client_error, io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod read;
pub mod simulate;
pub mod state;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read the controller's ADS state and device state.
    State,
    /// Read one or more variables by name.
    Read(ReadArgs),
    /// Write a variable by name.
    Write(WriteArgs),
    /// Serve a simulated device until interrupted.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, target: &TargetArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::State => state::run(target, format),
        Command::Read(args) => read::run(args, target, format),
        Command::Write(args) => write::run(args, target, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

/// Where the PLC is and how long to wait for it.
///
/// Precedence: flag, then environment variable, then `--config` file, then
/// built-in defaults.
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// AMS router host name or IP address.
    #[arg(long, env = "ADS_HOST", global = true)]
    pub host: Option<String>,
    /// AMS router TCP port.
    #[arg(long, env = "ADS_PORT", global = true)]
    pub port: Option<u16>,
    /// Target AMS net id (e.g. 192.168.1.100.1.1).
    #[arg(long, value_name = "NET_ID", env = "AMS_NET_ID", global = true)]
    pub net_id: Option<AmsNetId>,
    /// Target AMS port (851 is the first PLC runtime).
    #[arg(long, env = "AMS_PORT", global = true)]
    pub ams_port: Option<u16>,
    /// Our own AMS net id, as registered in the router's route table.
    #[arg(long, value_name = "NET_ID", env = "AMS_SOURCE_NET_ID", global = true)]
    pub source_net_id: Option<AmsNetId>,
    #[arg(long, env = "AMS_SOURCE_PORT", global = true)]
    pub source_port: Option<u16>,
    /// Connect and request timeout (e.g. 5s, 500ms).
    #[arg(long, global = true)]
    pub timeout: Option<String>,
    /// JSON client configuration file.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
}

impl TargetArgs {
    pub fn client_config(&self) -> CliResult<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)
                .map_err(|err| client_error(&format!("failed loading {}", path.display()), err))?,
            None => ClientConfig::default(),
        };

        if let Some(host) = &self.host {
            config.endpoint.host = host.clone();
        }
        if let Some(port) = self.port {
            config.endpoint.port = port;
        }
        config.endpoint.address = AmsAddress::new(
            self.net_id.unwrap_or(config.endpoint.address.net_id),
            self.ams_port.unwrap_or(config.endpoint.address.port),
        );
        config.source = AmsAddress::new(
            self.source_net_id.unwrap_or(config.source.net_id),
            self.source_port.unwrap_or(config.source.port),
        );
        if let Some(timeout) = &self.timeout {
            let timeout = parse_duration(timeout)?;
            config.request_timeout = timeout;
            config.connect_timeout = timeout;
        }

        config
            .validate()
            .map_err(|err| client_error("invalid configuration", err))?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Variable names (e.g. MAIN.Speed GVL.Counter).
    #[arg(required = true)]
    pub names: Vec<String>,
    /// Interpret values as KIND: bool, int16, uint16, int32, uint32, real32,
    /// real64, text or raw.
    #[arg(long = "as", value_name = "KIND", default_value = "raw")]
    pub kind: ValueKind,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Variable name.
    pub name: String,
    /// Value as text; raw values are hex.
    #[arg(allow_hyphen_values = true)]
    pub value: String,
    /// Encode the value as KIND.
    #[arg(long = "as", value_name = "KIND", default_value = "text")]
    pub kind: ValueKind,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:48898")]
    pub bind: String,
    /// Seed a variable (repeatable), e.g. MAIN.Speed=int16:1500.
    #[arg(long = "symbol", value_name = "NAME=KIND:VALUE")]
    pub symbols: Vec<String>,
    /// ADS state to report (5 = Run).
    #[arg(long, default_value_t = 5)]
    pub ads_state: u16,
    /// Device state word to report.
    #[arg(long, default_value_t = 0)]
    pub device_state: u16,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))
}

pub(crate) async fn connect(config: ClientConfig) -> CliResult<Client> {
    let client = Client::new(config);
    client
        .connect()
        .await
        .map_err(|err| client_error("connect failed", err))?;
    Ok(client)
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
