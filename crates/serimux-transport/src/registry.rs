//! Serial port discovery.
//!
//! Links are found by substring match on the system port name and opened
//! with one shared line configuration. Discovery is all-or-nothing: a port
//! that matches the pattern but cannot be opened aborts the whole sweep,
//! because an expected device that is present but unusable is a deployment
//! problem, not something to route around silently.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::{Result, TransportError};
use crate::link::{Link, LinkId, LinkStream};

/// Default substring matched against port names; Linux enumerates CDC-ACM
/// microcontrollers as `/dev/ttyACM*`.
pub const DEFAULT_PATTERN: &str = "ttyACM";

/// Default line rate shared by every link.
pub const DEFAULT_BAUD: u32 = 38_400;

/// Default read timeout: 1/512 s, the same interval the shared writer ticks
/// at, so one idle link holds its reader for at most one tick.
pub const READ_TIMEOUT: Duration = Duration::from_micros(1_953);

/// Line settings applied uniformly to every discovered link.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub baud: u32,
    pub read_timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD,
            read_timeout: READ_TIMEOUT,
        }
    }
}

/// Names of every serial port currently visible to the system, unopened and
/// unfiltered.
pub fn enumerate() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    Ok(ports.into_iter().map(|info| info.port_name).collect())
}

/// Open every serial port whose name contains `pattern`.
///
/// Returns the opened links in enumeration order. Matching no ports at all
/// is not an error; an open failure on any matching port is.
pub fn discover(pattern: &str, settings: &LinkSettings) -> Result<Vec<Link>> {
    let mut links = Vec::new();
    for name in enumerate()? {
        if !name.contains(pattern) {
            continue;
        }
        let stream = open(&name, settings)?;
        info!(port = %name, baud = settings.baud, "opened serial link");
        links.push(Link::new(LinkId::from(name), stream));
    }
    if links.is_empty() {
        warn!(pattern, "no serial ports matched");
    }
    Ok(links)
}

/// Open a single serial port with the shared line settings.
///
/// No flow control; the packet layer above provides its own integrity
/// checking and the attached firmware does not drive RTS/CTS.
pub fn open(port: &str, settings: &LinkSettings) -> Result<LinkStream> {
    let handle = serialport::new(port, settings.baud)
        .timeout(settings.read_timeout)
        .flow_control(serialport::FlowControl::None)
        .open()
        .map_err(|source| TransportError::Open {
            port: port.to_string(),
            source,
        })?;
    Ok(LinkStream::from_serial(handle))
}
