use amslink_client::DeviceStatus;
use serde::Serialize;

use crate::cmd::{connect, runtime, TargetArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct StateOutput {
    target: String,
    router: String,
    ads_state: u16,
    ads_state_name: &'static str,
    device_state: u16,
}

pub fn run(target: &TargetArgs, format: OutputFormat) -> CliResult<i32> {
    let config = target.client_config()?;
    let out = runtime()?.block_on(async {
        let client = connect(config).await?;
        let status = client.read_state().await;
        client.disconnect().await;
        let status = status.map_err(|err| client_error("read state failed", err))?;
        Ok::<_, CliError>(state_output(client.config(), status))
    })?;

    print_state(&out, format);
    Ok(SUCCESS)
}

fn state_output(config: &amslink_client::ClientConfig, status: DeviceStatus) -> StateOutput {
    StateOutput {
        target: config.endpoint.address.to_string(),
        router: config.endpoint.socket_target(),
        ads_state: status.ads_state.as_u16(),
        ads_state_name: status.ads_state.label(),
        device_state: status.device_state,
    }
}

fn print_state(out: &StateOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_table(
            &["TARGET", "ADS STATE", "DEVICE STATE"],
            vec![vec![
                out.target.clone(),
                format!("{} ({})", out.ads_state_name, out.ads_state),
                out.device_state.to_string(),
            ]],
        ),
        OutputFormat::Pretty => {
            println!("Device State:");
            println!("  Target:       {} via {}", out.target, out.router);
            println!("  ADS state:    {} ({})", out.ads_state_name, out.ads_state);
            println!("  Device state: {}", out.device_state);
        }
        OutputFormat::Raw => println!("{}", out.ads_state),
    }
}

#[cfg(test)]
mod tests {
    use amslink_client::{AdsState, ClientConfig};

    use super::*;

    #[test]
    fn output_carries_numeric_and_named_state() {
        let out = state_output(
            &ClientConfig::default(),
            DeviceStatus {
                ads_state: AdsState::Run,
                device_state: 0,
            },
        );
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["ads_state"], 5);
        assert_eq!(json["ads_state_name"], "Run");
        assert_eq!(json["target"], "192.168.1.100.1.1:851");
        assert_eq!(json["router"], "192.168.1.100:48898");
    }
}
