use std::time::Duration;

use clap::{Args, Subcommand};
use serimux_proxy::{BootstrapConfig, DeviceId, ProxyConfig};
use serimux_transport::{LinkSettings, DEFAULT_BAUD, DEFAULT_PATTERN};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod identify;
pub mod ports;
pub mod send;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports matching the discovery pattern.
    Ports(PortsArgs),
    /// Run the identity handshake and print the device table.
    Identify(IdentifyArgs),
    /// Send one packet to a device, optionally waiting for a reply.
    Send(SendArgs),
    /// Print received packets until interrupted.
    Watch(WatchArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Identify(args) => identify::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Watch(args) => watch::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct PortsArgs {
    /// Substring a port name must contain to count as a match.
    #[arg(long, default_value = DEFAULT_PATTERN)]
    pub pattern: String,
    /// List every enumerated port, not only matches.
    #[arg(long)]
    pub all: bool,
}

/// Link and handshake options shared by every command that starts the proxy.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Substring a port name must contain to be opened.
    #[arg(long, default_value = DEFAULT_PATTERN)]
    pub pattern: String,
    /// Baud rate applied to every link.
    #[arg(long, default_value_t = DEFAULT_BAUD)]
    pub baud: u32,
    /// Identity handshake broadcast ceiling.
    #[arg(long, default_value_t = 20)]
    pub attempts: u32,
    /// Settle interval between handshake broadcasts (e.g. 500ms, 2s).
    #[arg(long, default_value = "500ms")]
    pub settle: String,
}

impl LinkArgs {
    pub fn to_config(&self) -> CliResult<ProxyConfig> {
        let settle = parse_duration(&self.settle)?;
        Ok(ProxyConfig {
            pattern: self.pattern.clone(),
            settings: LinkSettings {
                baud: self.baud,
                ..LinkSettings::default()
            },
            bootstrap: BootstrapConfig {
                attempts: self.attempts,
                settle,
            },
            ..ProxyConfig::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct IdentifyArgs {
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Target device identity (decimal or 0x-prefixed hex).
    #[arg(long, short = 'd')]
    pub device: String,
    /// Function code sent as the packet's first byte.
    #[arg(long, short = 'f', default_value = "0x02")]
    pub function: String,
    /// Argument bytes as hex after the function code (e.g. "01" or "0a ff").
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
    /// Argument bytes as a UTF-8 string after the function code.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Wait for one packet back from the device and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Only print packets from these device identities (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub device: Option<Vec<String>>,
    /// Exit after printing N packets.
    #[arg(long)]
    pub count: Option<usize>,
    #[command(flatten)]
    pub link: LinkArgs,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
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

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

pub fn parse_byte(input: &str) -> CliResult<u8> {
    let input = input.trim();
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| CliError::new(USAGE, format!("invalid byte value: {input}")))
}

pub fn parse_device(input: &str) -> CliResult<DeviceId> {
    DeviceId::new(parse_byte(input)?).ok_or_else(|| {
        CliError::new(
            USAGE,
            "device identity 0 is the unidentified marker, not an address",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_byte_accepts_decimal_and_hex() {
        assert_eq!(parse_byte("8").unwrap(), 8);
        assert_eq!(parse_byte("0x08").unwrap(), 8);
        assert_eq!(parse_byte("0xFF").unwrap(), 255);
        assert!(parse_byte("256").is_err());
        assert!(parse_byte("led").is_err());
    }

    #[test]
    fn parse_device_rejects_zero() {
        assert_eq!(parse_device("1").unwrap().get(), 1);
        let err = parse_device("0").expect_err("zero identity");
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn link_args_build_the_proxy_config() {
        let args = LinkArgs {
            pattern: "ttyUSB".to_string(),
            baud: 115_200,
            attempts: 5,
            settle: "100ms".to_string(),
        };
        let config = args.to_config().expect("valid args");
        assert_eq!(config.pattern, "ttyUSB");
        assert_eq!(config.settings.baud, 115_200);
        assert_eq!(config.bootstrap.attempts, 5);
        assert_eq!(config.bootstrap.settle, Duration::from_millis(100));
    }
}
