//! Serial link discovery and byte-stream transport.
//!
//! Provides a unified stream interface over the links serimux multiplexes:
//! - Real serial ports (CDC-ACM microcontrollers, USB-serial adapters)
//! - In-memory mock links for tests and hardware-free development
//!
//! This is the lowest layer of serimux. Everything else builds on the
//! [`LinkStream`] type provided here.

pub mod error;
pub mod link;
pub mod mock;
pub mod registry;

pub use error::{Result, TransportError};
pub use link::{Link, LinkId, LinkStream};
pub use registry::{LinkSettings, DEFAULT_BAUD, DEFAULT_PATTERN, READ_TIMEOUT};
