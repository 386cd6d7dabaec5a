//! Link ↔ identity bookkeeping.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU8;

use serimux_transport::LinkId;

use crate::error::DirectoryError;

/// One-byte logical address a device reports during the identity handshake.
///
/// Zero on the wire means "no identity assigned yet", so the type rules it
/// out entirely; a [`DeviceId`] in hand is always a real address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(NonZeroU8);

impl DeviceId {
    /// Interpret a wire byte. Zero is the unassigned marker, not an
    /// identity, and yields `None`.
    pub fn new(raw: u8) -> Option<Self> {
        NonZeroU8::new(raw).map(Self)
    }

    pub fn get(self) -> u8 {
        self.0.get()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0.get())
    }
}

/// Bidirectional registry of resolved links.
///
/// Keeps both directions of the mapping and enforces that it stays
/// one-to-one: a link carries at most one identity and an identity lives on
/// at most one link. Lookups in either direction are O(1).
#[derive(Debug, Default)]
pub struct DeviceDirectory {
    by_identity: HashMap<DeviceId, LinkId>,
    by_link: HashMap<LinkId, DeviceId>,
}

impl DeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolved binding. Re-inserting the same pair is a no-op;
    /// a binding that would break one-to-one is rejected and the existing
    /// binding stands.
    pub fn insert(
        &mut self,
        link: LinkId,
        identity: DeviceId,
    ) -> std::result::Result<(), DirectoryError> {
        match (self.by_link.get(&link), self.by_identity.get(&identity)) {
            (Some(&bound), _) if bound != identity => {
                Err(DirectoryError::LinkAlreadyIdentified {
                    link,
                    existing: bound,
                })
            }
            (_, Some(bound)) if *bound != link => Err(DirectoryError::IdentityInUse {
                identity,
                existing: bound.clone(),
            }),
            (Some(_), Some(_)) => Ok(()),
            _ => {
                self.by_identity.insert(identity, link.clone());
                self.by_link.insert(link, identity);
                Ok(())
            }
        }
    }

    /// The link carrying this identity, if it resolved.
    pub fn link_for(&self, identity: DeviceId) -> Option<&LinkId> {
        self.by_identity.get(&identity)
    }

    /// The identity this link resolved to, if any.
    pub fn identity_for(&self, link: &LinkId) -> Option<DeviceId> {
        self.by_link.get(link).copied()
    }

    /// True once the link has an identity bound.
    pub fn is_resolved(&self, link: &LinkId) -> bool {
        self.by_link.contains_key(link)
    }

    /// Every resolved identity, sorted.
    pub fn identities(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.by_identity.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.by_link.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_link.is_empty()
    }
}
