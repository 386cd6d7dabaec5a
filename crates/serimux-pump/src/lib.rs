//! Concurrent byte pumping for a fleet of serial links.
//!
//! A [`LinkPump`] owns one reader thread per link and one shared writer
//! thread. Unbounded queues sit between the threads and the caller, so no
//! link's cadence ever blocks another link or the caller. Cancellation is
//! cooperative through a shared [`ShutdownToken`], and the first fatal
//! stream error stops the whole pump and is reported as a [`LinkFault`].

pub mod error;
pub mod pump;
pub mod shutdown;

pub use error::{LinkFault, PumpError, Result};
pub use pump::{LinkPump, PumpConfig, WRITE_TICK};
pub use shutdown::ShutdownToken;
