use serimux_transport::{LinkId, TransportError};

/// Description of the I/O failure that stopped the pump.
///
/// `std::io::Error` is not `Clone`, so the kind and rendered message are
/// captured once and handed back from every subsequent pump call.
#[derive(Debug, Clone)]
pub struct LinkFault {
    /// Link whose stream failed.
    pub link: LinkId,
    /// I/O error kind at the point of failure.
    pub kind: std::io::ErrorKind,
    /// Rendered error message.
    pub message: String,
}

impl LinkFault {
    pub(crate) fn new(link: &LinkId, err: &std::io::Error) -> Self {
        Self {
            link: link.clone(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Errors surfaced by the link pump.
#[derive(Debug, thiserror::Error)]
pub enum PumpError {
    /// Splitting a link into read and write halves failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A pump thread hit a non-timeout I/O failure and stopped the pump.
    #[error("link {} failed: {} ({:?})", .0.link, .0.message, .0.kind)]
    Fault(LinkFault),

    /// The link identifier is not one this pump manages.
    #[error("unknown link {0}")]
    UnknownLink(LinkId),

    /// The pump's threads have already stopped.
    #[error("link pump is shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, PumpError>;
