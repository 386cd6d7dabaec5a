use std::thread;
use std::time::{Duration, Instant};

use serimux_proxy::{DeviceId, Proxy};

use crate::cmd::{parse_byte, parse_device, parse_duration, SendArgs};
use crate::exit::{proxy_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_packet, OutputFormat};

const RECEIVE_POLL: Duration = Duration::from_millis(10);

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let device = parse_device(&args.device)?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;
    let config = args.link.to_config()?;

    let mut proxy = Proxy::start(config).map_err(|err| proxy_error("start failed", err))?;
    let outcome = exchange(&mut proxy, device, &payload, args.wait, wait_timeout, format);
    let shutdown = proxy.shutdown();

    let code = outcome?;
    shutdown.map_err(|err| proxy_error("shutdown failed", err))?;
    Ok(code)
}

fn exchange(
    proxy: &mut Proxy,
    device: DeviceId,
    payload: &[u8],
    wait: bool,
    wait_timeout: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    proxy
        .send(device, payload)
        .map_err(|err| proxy_error("send failed", err))?;

    if wait {
        let reply = wait_for_reply(&mut ProxySource(proxy), device, wait_timeout)?;
        print_packet(device, &reply, format);
    }
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    let mut payload = vec![parse_byte(&args.function)?];
    if let Some(hex) = &args.hex {
        payload.extend(parse_hex(hex)?);
    } else if let Some(data) = &args.data {
        payload.extend_from_slice(data.as_bytes());
    }
    Ok(payload)
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex payload needs an even digit count: {input}"),
        ));
    }
    (0..compact.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&compact[i..i + 2], 16).map_err(|_| {
                CliError::new(USAGE, format!("invalid hex byte: {}", &compact[i..i + 2]))
            })
        })
        .collect()
}

trait PacketSource {
    fn poll(&mut self) -> CliResult<Vec<(DeviceId, Vec<u8>)>>;
}

struct ProxySource<'a>(&'a mut Proxy);

impl PacketSource for ProxySource<'_> {
    fn poll(&mut self) -> CliResult<Vec<(DeviceId, Vec<u8>)>> {
        self.0
            .receive()
            .map_err(|err| proxy_error("receive failed", err))
    }
}

fn wait_for_reply<S: PacketSource>(
    source: &mut S,
    device: DeviceId,
    timeout: Duration,
) -> CliResult<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    loop {
        for (from, payload) in source.poll()? {
            if from == device {
                return Ok(payload);
            }
            tracing::debug!(%from, len = payload.len(), "ignoring packet from another device");
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("no reply from device {device} within {timeout:?}"),
            ));
        }
        thread::sleep(RECEIVE_POLL);
    }
}
