//! The proxy itself: discovery, pumping, handshake, identity-addressed I/O.

use std::collections::HashMap;
use std::time::Duration;

use serimux_frame::FrameBuffer;
use serimux_pump::{LinkPump, PumpConfig, ShutdownToken, WRITE_TICK};
use serimux_transport::{registry, Link, LinkId, LinkSettings};
use tracing::{debug, info};

use crate::bootstrap::{self, BootstrapConfig, BootstrapReport};
use crate::directory::{DeviceDirectory, DeviceId};
use crate::error::{ProxyError, Result};

/// Everything [`Proxy::start`] needs. The defaults match the deployed
/// fleet: CDC-ACM devices at 38400 baud, 1/512 s timing, and a 20 × 500 ms
/// identity handshake.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Substring a port name must contain to be opened.
    pub pattern: String,
    /// Line settings applied to every link.
    pub settings: LinkSettings,
    /// Shared writer wake interval.
    pub write_tick: Duration,
    /// Identity handshake tuning.
    pub bootstrap: BootstrapConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            pattern: registry::DEFAULT_PATTERN.to_string(),
            settings: LinkSettings::default(),
            write_tick: WRITE_TICK,
            bootstrap: BootstrapConfig::default(),
        }
    }
}

/// Identity-addressed packet exchange with every attached device.
///
/// [`start`](Self::start) discovers links, spins up the pump, and runs the
/// identity handshake; from then on the caller sends and receives packets
/// by [`DeviceId`] and never touches a port name. Payloads are packed and
/// validated by the frame layer on the way through; corrupt inbound frames
/// are counted and dropped without surfacing to the caller.
pub struct Proxy {
    pump: LinkPump,
    directory: DeviceDirectory,
    buffers: HashMap<LinkId, FrameBuffer>,
    report: BootstrapReport,
}

impl Proxy {
    /// Discover matching serial ports and bring the proxy up.
    ///
    /// A port that matches the pattern but fails to open aborts the start:
    /// an expected device that cannot be used is a deployment problem, not
    /// a condition to run degraded around. A device that opens but never
    /// answers the handshake, by contrast, only degrades the fleet — see
    /// [`bootstrap_report`](Self::bootstrap_report).
    pub fn start(config: ProxyConfig) -> Result<Self> {
        let links = registry::discover(&config.pattern, &config.settings)?;
        Self::start_with_links(links, config)
    }

    /// Bring the proxy up over links opened by the caller — mock links in
    /// tests, or ports opened with non-uniform settings.
    pub fn start_with_links(links: Vec<Link>, config: ProxyConfig) -> Result<Self> {
        let token = ShutdownToken::new();
        let pump = LinkPump::start(
            links,
            token.clone(),
            PumpConfig {
                write_tick: config.write_tick,
            },
        )?;
        let mut buffers: HashMap<LinkId, FrameBuffer> = pump
            .ports()
            .iter()
            .map(|id| (id.clone(), FrameBuffer::new()))
            .collect();
        let mut directory = DeviceDirectory::new();
        let report = bootstrap::run(&pump, &mut buffers, &mut directory, &token, &config.bootstrap)?;
        info!(
            links = pump.ports().len(),
            devices = report.identified.len(),
            "proxy started"
        );
        Ok(Self {
            pump,
            directory,
            buffers,
            report,
        })
    }

    /// Pack one payload and queue it for the device with this identity.
    ///
    /// An identity nothing resolved to is an error, loudly: the packet
    /// cannot reach anything, and pretending otherwise hides dead devices.
    pub fn send(&self, identity: DeviceId, payload: &[u8]) -> Result<()> {
        let link = self.resolve(identity)?;
        let frame = serimux_frame::pack(payload)?;
        self.pump.enqueue_out([(link, frame)])?;
        Ok(())
    }

    /// Pack a batch of payloads and queue them together.
    ///
    /// Every identity is resolved and every payload packed before anything
    /// is queued; on any failure nothing at all is transmitted.
    pub fn send_many(&self, batch: &[(DeviceId, Vec<u8>)]) -> Result<()> {
        let mut outbound = Vec::with_capacity(batch.len());
        for (identity, payload) in batch {
            let link = self.resolve(*identity)?;
            outbound.push((link, serimux_frame::pack(payload)?));
        }
        self.pump.enqueue_out(outbound)?;
        Ok(())
    }

    /// Drain, reassemble, and validate everything the devices have sent,
    /// labeled by identity.
    ///
    /// Corrupt frames are counted and skipped. Frames from a link that
    /// never resolved an identity have no address to deliver under and are
    /// dropped with a log line; [`bootstrap_report`](Self::bootstrap_report)
    /// names those links up front.
    pub fn receive(&mut self) -> Result<Vec<(DeviceId, Vec<u8>)>> {
        for (id, bytes) in self.pump.drain_in()? {
            if let Some(buffer) = self.buffers.get_mut(&id) {
                buffer.extend(&bytes);
            }
        }
        let mut packets = Vec::new();
        for (id, buffer) in self.buffers.iter_mut() {
            while let Some(frame) = buffer.next_frame() {
                let Ok(payload) = serimux_frame::unpack(&frame) else {
                    continue;
                };
                match self.directory.identity_for(id) {
                    Some(identity) => packets.push((identity, payload)),
                    None => {
                        debug!(link = %id, len = payload.len(), "dropping packet from unidentified link");
                    }
                }
            }
        }
        Ok(packets)
    }

    /// Identities that resolved during the handshake, sorted.
    pub fn identities(&self) -> Vec<DeviceId> {
        self.directory.identities()
    }

    /// Open link identifiers, in discovery order.
    pub fn ports(&self) -> &[LinkId] {
        self.pump.ports()
    }

    /// Outcome of the startup handshake, including unresolved links.
    pub fn bootstrap_report(&self) -> &BootstrapReport {
        &self.report
    }

    /// Frames that failed validation since process start, across all links.
    pub fn corrupt_packets(&self) -> u64 {
        serimux_frame::corrupt_packet_count()
    }

    /// Stop the pump and release every link. Reports the fault if the pump
    /// stopped because of one.
    pub fn shutdown(self) -> Result<()> {
        info!("proxy shutting down");
        self.pump.shutdown()?;
        Ok(())
    }

    fn resolve(&self, identity: DeviceId) -> Result<LinkId> {
        self.directory
            .link_for(identity)
            .cloned()
            .ok_or(ProxyError::UnknownIdentity(identity))
    }
}
