use serimux_frame::CodecError;
use serimux_pump::PumpError;
use serimux_transport::{LinkId, TransportError};

use crate::directory::DeviceId;

/// Errors surfaced by the proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Discovery or open failure. The proxy refuses to start when an
    /// expected link cannot be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Pump failure, including the fault that stopped it.
    #[error(transparent)]
    Pump(#[from] PumpError),

    /// Packing rejected the payload.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// No link resolved to this identity during the handshake.
    #[error("no device with identity {0}")]
    UnknownIdentity(DeviceId),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

/// Invariant violations in the link ↔ identity registry.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The link already resolved to a different identity.
    #[error("link {link} is already identified as {existing}")]
    LinkAlreadyIdentified { link: LinkId, existing: DeviceId },

    /// Another link already claimed this identity.
    #[error("identity {identity} is already bound to {existing}")]
    IdentityInUse {
        identity: DeviceId,
        existing: LinkId,
    },
}
