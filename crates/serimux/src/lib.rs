//! Identity-addressed packet multiplexing over serial links.
//!
//! serimux lets a controlling process exchange framed, checksummed packets
//! with a fleet of serial-attached microcontrollers, addressed by the
//! one-byte identity each device reports rather than by port name.
//!
//! # Crate Structure
//!
//! - [`transport`] — Serial link discovery, open, and mock endpoints
//! - [`frame`] — COBS-stuffed, checksummed packet framing
//! - [`pump`] — Per-link reader threads and the shared tick writer
//! - [`proxy`] — Device directory, identity handshake, and the [`proxy::Proxy`] surface

/// Re-export transport types.
pub mod transport {
    pub use serimux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serimux_frame::*;
}

/// Re-export pump types.
pub mod pump {
    pub use serimux_pump::*;
}

/// Re-export proxy types.
pub mod proxy {
    pub use serimux_proxy::*;
}
