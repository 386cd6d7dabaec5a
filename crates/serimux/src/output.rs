use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serimux_proxy::{control, DeviceId};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    schema_id: &'a str,
    device: u8,
    function: Option<u8>,
    function_name: &'a str,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

pub fn print_packet(device: DeviceId, payload: &[u8], format: OutputFormat) {
    let function = payload.first().copied();
    let function_name = function.map_or("empty", control::function_name);
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                schema_id: "https://schemas.serimux.dev/cli/v1/packet-received.schema.json",
                device: device.get(),
                function,
                function_name,
                payload_size: payload.len(),
                payload: hex_string(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "FUNCTION", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    device.to_string(),
                    function_name.to_string(),
                    payload.len().to_string(),
                    hex_string(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "device={} function={} size={} payload={}",
                device,
                function_name,
                payload.len(),
                hex_string(payload)
            );
        }
        OutputFormat::Raw => {
            print_raw(payload);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
