use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serimux_proxy::{DeviceId, Proxy};

use crate::cmd::{parse_device, WatchArgs};
use crate::exit::{proxy_error, CliError, CliResult, SUCCESS};
use crate::output::{print_packet, OutputFormat};

const RECEIVE_POLL: Duration = Duration::from_millis(10);

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let filter = parse_filter(args.device.as_deref())?;
    let config = args.link.to_config()?;

    let mut proxy = Proxy::start(config).map_err(|err| proxy_error("start failed", err))?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let outcome = watch_loop(&mut proxy, &filter, args.count, &running, format);
    let shutdown = proxy.shutdown();

    let code = outcome?;
    shutdown.map_err(|err| proxy_error("shutdown failed", err))?;
    Ok(code)
}

fn watch_loop(
    proxy: &mut Proxy,
    filter: &Option<Vec<DeviceId>>,
    count: Option<usize>,
    running: &AtomicBool,
    format: OutputFormat,
) -> CliResult<i32> {
    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let packets = proxy
            .receive()
            .map_err(|err| proxy_error("receive failed", err))?;
        for (device, payload) in packets {
            if let Some(devices) = filter {
                if !devices.contains(&device) {
                    continue;
                }
            }
            print_packet(device, &payload, format);
            printed = printed.saturating_add(1);

            if let Some(count) = count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }
        thread::sleep(RECEIVE_POLL);
    }
    Ok(SUCCESS)
}

fn parse_filter(inputs: Option<&[String]>) -> CliResult<Option<Vec<DeviceId>>> {
    inputs
        .map(|inputs| inputs.iter().map(|input| parse_device(input)).collect())
        .transpose()
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
