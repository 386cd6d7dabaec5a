use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::{Result, TransportError};
use crate::mock::MockEndpoint;

/// Identifier of one serial link: its transport-level port name
/// (for example `/dev/ttyACM0`).
///
/// Cheap to clone and hash; every layer above the transport keys its
/// per-link state on this.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(Arc<str>);

impl LinkId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LinkId {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for LinkId {
    fn from(name: String) -> Self {
        Self(Arc::from(name.as_str()))
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A connected link stream — implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations.
/// It wraps either a real serial port or an in-memory mock endpoint;
/// reads observe the configured timeout and surface it as
/// [`std::io::ErrorKind::TimedOut`].
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    Serial(Box<dyn serialport::SerialPort>),
    Mock(MockEndpoint),
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => port.read(buf),
            LinkStreamInner::Mock(endpoint) => endpoint.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => port.write(buf),
            LinkStreamInner::Mock(endpoint) => endpoint.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => port.flush(),
            LinkStreamInner::Mock(endpoint) => endpoint.flush(),
        }
    }
}

impl LinkStream {
    /// Create a LinkStream from an opened serial port handle.
    pub(crate) fn from_serial(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: LinkStreamInner::Serial(port),
        }
    }

    /// Create a LinkStream from an in-memory mock endpoint.
    pub(crate) fn from_mock(endpoint: MockEndpoint) -> Self {
        Self {
            inner: LinkStreamInner::Mock(endpoint),
        }
    }

    /// Try to clone this stream (creates a new handle on the same port).
    ///
    /// Both handles share the device; one is used for reading, the other
    /// for writing, so the two directions never contend on a borrow.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            LinkStreamInner::Serial(port) => {
                let cloned = port.try_clone().map_err(|source| TransportError::Clone {
                    port: port.name().unwrap_or_default(),
                    source,
                })?;
                Ok(Self::from_serial(cloned))
            }
            LinkStreamInner::Mock(endpoint) => Ok(Self::from_mock(endpoint.clone())),
        }
    }
}

impl fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            LinkStreamInner::Serial(_) => f
                .debug_struct("LinkStream")
                .field("type", &"serial")
                .finish(),
            LinkStreamInner::Mock(_) => {
                f.debug_struct("LinkStream").field("type", &"mock").finish()
            }
        }
    }
}

/// One open serial link: its identifier plus the connected stream.
#[derive(Debug)]
pub struct Link {
    pub id: LinkId,
    pub stream: LinkStream,
}

impl Link {
    pub fn new(id: LinkId, stream: LinkStream) -> Self {
        Self { id, stream }
    }

    /// Split into independent read and write halves sharing the device.
    pub fn split(self) -> Result<(LinkId, LinkStream, LinkStream)> {
        let writer = self.stream.try_clone()?;
        Ok((self.id, self.stream, writer))
    }
}
