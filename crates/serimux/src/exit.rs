use std::fmt;
use std::io;

use serimux_frame::CodecError;
use serimux_proxy::ProxyError;
use serimux_pump::PumpError;
use serimux_transport::TransportError;

// Exit codes: 64 and 124/125 follow sysexits and coreutils convention;
// the small codes are domain outcomes scripts can branch on.
pub const SUCCESS: i32 = 0;
#[allow(dead_code)]
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Enumerate(_) => TRANSPORT_ERROR,
        TransportError::Open { source, .. } | TransportError::Clone { source, .. } => {
            serial_code(source)
        }
        TransportError::Io(source) => io_code(source.kind()),
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn pump_error(context: &str, err: PumpError) -> CliError {
    match err {
        PumpError::Transport(err) => transport_error(context, err),
        PumpError::Fault(_) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        PumpError::UnknownLink(_) => CliError::new(USAGE, format!("{context}: {err}")),
        PumpError::ShutDown => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn proxy_error(context: &str, err: ProxyError) -> CliError {
    match err {
        ProxyError::Transport(err) => transport_error(context, err),
        ProxyError::Pump(err) => pump_error(context, err),
        ProxyError::Codec(err) => codec_error(context, err),
        ProxyError::UnknownIdentity(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

fn serial_code(err: &serialport::Error) -> i32 {
    match err.kind() {
        serialport::ErrorKind::Io(kind) => io_code(kind),
        _ => TRANSPORT_ERROR,
    }
}

fn io_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => TRANSPORT_ERROR,
    }
}
