//! Startup identity handshake.
//!
//! The proxy does not know which device sits behind which port; firmware
//! does. Bootstrap broadcasts an identity request to every unresolved link,
//! waits for responses to settle, and records each claimed identity, until
//! every link is resolved or the attempt ceiling is reached. Links still
//! unresolved at the end are reported, not fatal — the fleet runs degraded
//! rather than not at all.

use std::collections::HashMap;

use serimux_frame::FrameBuffer;
use serimux_pump::{LinkPump, ShutdownToken};
use serimux_transport::LinkId;
use tracing::{debug, info, warn};

use crate::control;
use crate::directory::{DeviceDirectory, DeviceId};
use crate::error::Result;

/// Identity handshake tuning.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Broadcast-and-collect cycles before giving up on unresolved links.
    pub attempts: u32,
    /// Settle interval between a broadcast and collecting its responses.
    pub settle: std::time::Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            attempts: 20,
            settle: std::time::Duration::from_millis(500),
        }
    }
}

/// Outcome of the identity handshake.
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    /// Resolved bindings, in link discovery order.
    pub identified: Vec<(LinkId, DeviceId)>,
    /// Links that never produced a usable identity response.
    pub unidentified: Vec<LinkId>,
    /// Broadcast cycles actually used.
    pub attempts: u32,
}

impl BootstrapReport {
    /// True when every link resolved an identity.
    pub fn is_complete(&self) -> bool {
        self.unidentified.is_empty()
    }
}

/// Run the handshake over an already-started pump.
///
/// Identity responses carry the claimed identity in the final payload byte;
/// zero there means the firmware has none assigned yet, so the link is
/// asked again on the next cycle. A claim that would break the one-to-one
/// registry is logged and ignored — the first binding stands.
pub(crate) fn run(
    pump: &LinkPump,
    buffers: &mut HashMap<LinkId, FrameBuffer>,
    directory: &mut DeviceDirectory,
    token: &ShutdownToken,
    config: &BootstrapConfig,
) -> Result<BootstrapReport> {
    let request = serimux_frame::pack(&[control::IDENTITY])?;
    let mut attempts = 0;

    while attempts < config.attempts && !all_resolved(pump, directory) {
        attempts += 1;
        let pending: Vec<(LinkId, Vec<u8>)> = pump
            .ports()
            .iter()
            .filter(|id| !directory.is_resolved(id))
            .map(|id| (id.clone(), request.clone()))
            .collect();
        debug!(attempt = attempts, unresolved = pending.len(), "requesting identities");
        pump.enqueue_out(pending)?;

        if token.wait_timeout(config.settle) {
            debug!("cancelled during identity handshake");
            break;
        }
        collect(pump, buffers, directory)?;
    }

    let mut identified = Vec::new();
    let mut unidentified = Vec::new();
    for id in pump.ports() {
        match directory.identity_for(id) {
            Some(identity) => identified.push((id.clone(), identity)),
            None => unidentified.push(id.clone()),
        }
    }
    if unidentified.is_empty() {
        info!(devices = identified.len(), attempts, "identity handshake complete");
    } else {
        warn!(
            resolved = identified.len(),
            unresolved = unidentified.len(),
            attempts,
            "identity handshake incomplete; unresolved links stay unaddressable"
        );
    }
    Ok(BootstrapReport {
        identified,
        unidentified,
        attempts,
    })
}

fn all_resolved(pump: &LinkPump, directory: &DeviceDirectory) -> bool {
    pump.ports().iter().all(|id| directory.is_resolved(id))
}

fn collect(
    pump: &LinkPump,
    buffers: &mut HashMap<LinkId, FrameBuffer>,
    directory: &mut DeviceDirectory,
) -> Result<()> {
    for (id, bytes) in pump.drain_in()? {
        if let Some(buffer) = buffers.get_mut(&id) {
            buffer.extend(&bytes);
        }
    }
    for (id, buffer) in buffers.iter_mut() {
        while let Some(frame) = buffer.next_frame() {
            let Ok(payload) = serimux_frame::unpack(&frame) else {
                continue;
            };
            if directory.is_resolved(id) {
                debug!(link = %id, "dropping packet that arrived mid-handshake");
                continue;
            }
            let claimed = payload.last().copied().unwrap_or_default();
            match DeviceId::new(claimed) {
                Some(identity) => match directory.insert(id.clone(), identity) {
                    Ok(()) => info!(link = %id, %identity, "device identified"),
                    Err(err) => {
                        warn!(link = %id, %identity, error = %err, "conflicting identity claim ignored");
                    }
                },
                None => debug!(link = %id, "device reports no identity assigned yet"),
            }
        }
    }
    Ok(())
}
