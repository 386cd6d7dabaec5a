/// Errors that can occur while discovering or opening serial links.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Enumerating the system's serial ports failed.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),

    /// Failed to open a port that matched the discovery pattern.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },

    /// Failed to clone a link's stream handle.
    #[error("failed to clone stream for {port}: {source}")]
    Clone {
        port: String,
        source: serialport::Error,
    },

    /// An I/O error occurred on the link's byte stream.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
