//! Identity-addressed multiplexing proxy for serial-attached devices.
//!
//! A machine whose actuators and sensors are spread across a handful of
//! microcontrollers wants to talk to *devices*, not to `/dev/ttyACM3`. This
//! crate discovers the attached links, pumps them concurrently, resolves
//! each device's one-byte identity with a startup handshake, and then
//! exchanges validated packets by [`DeviceId`]:
//!
//! ```no_run
//! use serimux_proxy::{DeviceId, Proxy, ProxyConfig};
//!
//! # fn main() -> serimux_proxy::Result<()> {
//! let mut proxy = Proxy::start(ProxyConfig::default())?;
//! if let Some(first) = proxy.identities().first().copied() {
//!     proxy.send(first, &[0x02, 90])?;
//! }
//! for (device, payload) in proxy.receive()? {
//!     println!("{device}: {payload:?}");
//! }
//! proxy.shutdown()
//! # }
//! ```

pub mod bootstrap;
pub mod control;
pub mod directory;
pub mod error;
pub mod proxy;

pub use bootstrap::{BootstrapConfig, BootstrapReport};
pub use directory::{DeviceDirectory, DeviceId};
pub use error::{DirectoryError, ProxyError, Result};
pub use proxy::{Proxy, ProxyConfig};
