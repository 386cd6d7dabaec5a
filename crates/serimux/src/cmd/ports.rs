use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serimux_transport::registry;

use crate::cmd::PortsArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct PortEntry {
    name: String,
    matched: bool,
}

#[derive(Serialize)]
struct PortsOutput {
    schema_id: &'static str,
    pattern: String,
    ports: Vec<PortEntry>,
}

pub fn run(args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let names = registry::enumerate().map_err(|err| transport_error("enumerate failed", err))?;
    let ports: Vec<PortEntry> = names
        .into_iter()
        .map(|name| PortEntry {
            matched: name.contains(&args.pattern),
            name,
        })
        .filter(|entry| args.all || entry.matched)
        .collect();

    let output = PortsOutput {
        schema_id: "https://schemas.serimux.dev/cli/v1/port-list.schema.json",
        pattern: args.pattern,
        ports,
    };
    print_ports(&output, format);
    Ok(SUCCESS)
}

fn print_ports(output: &PortsOutput, format: OutputFormat) {
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
                .set_header(vec!["PORT", "MATCH"]);
            for entry in &output.ports {
                table.add_row(vec![
                    entry.name.clone(),
                    if entry.matched { "yes" } else { "no" }.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for entry in &output.ports {
                println!(
                    "{} {}",
                    entry.name,
                    if entry.matched { "(match)" } else { "" }
                );
            }
        }
        OutputFormat::Raw => {
            for entry in &output.ports {
                println!("{}", entry.name);
            }
        }
    }
}
