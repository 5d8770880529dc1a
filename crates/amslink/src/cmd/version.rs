use amslink_client::config::{DEFAULT_PLC_PORT, DEFAULT_SOURCE_PORT};
use amslink_transport::DEFAULT_ROUTER_PORT;
use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<BuildInfo>,
}

#[derive(Serialize)]
struct BuildInfo {
    target: &'static str,
    profile: &'static str,
    os: &'static str,
    arch: &'static str,
    default_router_port: u16,
    default_plc_port: u16,
    default_source_port: u16,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let out = VersionOutput {
        name: "amslink",
        version: env!("CARGO_PKG_VERSION"),
        build: args.extended.then(|| BuildInfo {
            target: option_env!("AMSLINK_BUILD_TARGET").unwrap_or("unknown"),
            profile: option_env!("AMSLINK_BUILD_PROFILE").unwrap_or("unknown"),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            default_router_port: DEFAULT_ROUTER_PORT,
            default_plc_port: DEFAULT_PLC_PORT,
            default_source_port: DEFAULT_SOURCE_PORT,
        }),
    };

    if let OutputFormat::Json = format {
        print_json(&out);
        return Ok(SUCCESS);
    }

    println!("{} {}", out.name, out.version);
    if let Some(build) = &out.build {
        println!("target: {}", build.target);
        println!("profile: {}", build.profile);
        println!("os: {}", build.os);
        println!("arch: {}", build.arch);
        println!(
            "defaults: router_port={}, plc_port={}, source_port={}",
            build.default_router_port, build.default_plc_port, build.default_source_port
        );
    }
    Ok(SUCCESS)
}
