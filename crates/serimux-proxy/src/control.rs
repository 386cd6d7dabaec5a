//! Built-in protocol function codes.
//!
//! The first payload byte of every packet names the function it invokes.
//! Codes below [`USER_FUNCTION_START`] are reserved for the proxy protocol
//! itself; firmware dispatches everything from there up to application
//! handlers.

/// Firmware-side report that a packet it received failed validation.
pub const CORRUPT_REPORT: u8 = 0x00;

/// Identity request. The response payload's last byte carries the device's
/// one-byte identity, or zero while the firmware has none assigned yet.
pub const IDENTITY: u8 = 0x01;

/// First code available to application-defined functions.
pub const USER_FUNCTION_START: u8 = 0x02;

/// Human-readable name for a function code, for logs and CLI output.
pub fn function_name(code: u8) -> &'static str {
    match code {
        CORRUPT_REPORT => "corrupt-report",
        IDENTITY => "identity",
        _ => "user",
    }
}

/// True if the code is reserved for the proxy protocol.
pub fn is_reserved(code: u8) -> bool {
    code < USER_FUNCTION_START
}
