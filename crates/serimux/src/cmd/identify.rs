use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serimux_proxy::Proxy;

use crate::cmd::IdentifyArgs;
use crate::exit::{proxy_error, CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct DeviceEntry {
    identity: u8,
    port: String,
}

#[derive(Serialize)]
struct IdentifyOutput {
    schema_id: &'static str,
    devices: Vec<DeviceEntry>,
    unidentified: Vec<String>,
    attempts: u32,
    complete: bool,
}

pub fn run(args: IdentifyArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.link.to_config()?;
    let proxy = Proxy::start(config).map_err(|err| proxy_error("start failed", err))?;

    let report = proxy.bootstrap_report();
    let output = IdentifyOutput {
        schema_id: "https://schemas.serimux.dev/cli/v1/device-table.schema.json",
        devices: report
            .identified
            .iter()
            .map(|(link, identity)| DeviceEntry {
                identity: identity.get(),
                port: link.to_string(),
            })
            .collect(),
        unidentified: report.unidentified.iter().map(|id| id.to_string()).collect(),
        attempts: report.attempts,
        complete: report.is_complete(),
    };
    print_identify(&output, format);

    let code = if output.complete {
        SUCCESS
    } else {
        HEALTH_CHECK_FAILED
    };
    proxy
        .shutdown()
        .map_err(|err| proxy_error("shutdown failed", err))?;
    Ok(code)
}

fn print_identify(output: &IdentifyOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "PORT"]);
            for device in &output.devices {
                table.add_row(vec![format!("{:#04x}", device.identity), device.port.clone()]);
            }
            for port in &output.unidentified {
                table.add_row(vec!["(unidentified)".to_string(), port.clone()]);
            }
            println!("{table}");
            if !output.complete {
                println!(
                    "{} port(s) never answered the identity request after {} attempts",
                    output.unidentified.len(),
                    output.attempts
                );
            }
        }
        OutputFormat::Pretty => {
            for device in &output.devices {
                println!("{:#04x} {}", device.identity, device.port);
            }
            for port in &output.unidentified {
                println!("(unidentified) {port}");
            }
        }
        OutputFormat::Raw => {
            for device in &output.devices {
                println!("{}", device.identity);
            }
        }
    }
}
