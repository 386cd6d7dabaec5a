//! Byte pumping between link streams and per-link queues.

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serimux_transport::{Link, LinkId, LinkStream};
use tracing::{debug, warn};

use crate::error::{LinkFault, PumpError, Result};
use crate::shutdown::ShutdownToken;

/// Default writer wake interval: 1/512 s, matching the links' read timeout.
pub const WRITE_TICK: Duration = Duration::from_micros(1_953);

/// Per-read scratch size. Packets are tens of bytes; this absorbs a long
/// idle link's backlog in one read.
const READ_CHUNK: usize = 1024;

/// Pump tuning.
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// Interval between writer wakes. Each wake drains every link's
    /// outbound queue and issues at most one write per link.
    pub write_tick: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            write_tick: WRITE_TICK,
        }
    }
}

/// Moves raw bytes between link streams and per-link unbounded queues.
///
/// One reader thread per link plus a single shared writer thread keep every
/// stream serviced concurrently; a silent or slow device occupies only its
/// own reader. The caller's thread touches no I/O — it exchanges bytes
/// through [`enqueue_out`](Self::enqueue_out) and
/// [`drain_in`](Self::drain_in), which never block on the line.
///
/// The first non-recoverable stream error on any link records a
/// [`LinkFault`], cancels the token, and stops the whole pump: with a
/// device fleet acting as one machine, continuing half-connected would be
/// worse than stopping loudly.
pub struct LinkPump {
    ids: Vec<LinkId>,
    inbound: HashMap<LinkId, Receiver<Vec<u8>>>,
    outbound: HashMap<LinkId, Sender<Vec<u8>>>,
    readers: Vec<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    token: ShutdownToken,
    fault: Arc<OnceLock<LinkFault>>,
}

impl LinkPump {
    /// Split every link and spawn its reader plus the shared writer.
    pub fn start(links: Vec<Link>, token: ShutdownToken, config: PumpConfig) -> Result<Self> {
        let fault: Arc<OnceLock<LinkFault>> = Arc::new(OnceLock::new());
        let mut ids = Vec::with_capacity(links.len());
        let mut inbound = HashMap::new();
        let mut outbound = HashMap::new();
        let mut readers = Vec::with_capacity(links.len());
        let mut outputs = Vec::with_capacity(links.len());

        for link in links {
            let (id, read_half, write_half) = link.split()?;
            let (in_tx, in_rx) = mpsc::channel();
            let (out_tx, out_rx) = mpsc::channel();

            let reader = ReaderHalf {
                id: id.clone(),
                stream: read_half,
                delivery: in_tx,
                token: token.clone(),
                fault: Arc::clone(&fault),
                pace: config.write_tick,
            };
            readers.push(thread::spawn(move || reader.run()));

            outputs.push((id.clone(), write_half, out_rx));
            inbound.insert(id.clone(), in_rx);
            outbound.insert(id.clone(), out_tx);
            ids.push(id);
        }

        let writer = WriterHalf {
            outputs,
            token: token.clone(),
            fault: Arc::clone(&fault),
            tick: config.write_tick,
        };
        let writer = Some(thread::spawn(move || writer.run()));

        Ok(Self {
            ids,
            inbound,
            outbound,
            readers,
            writer,
            token,
            fault,
        })
    }

    /// Link identifiers, in the order the links were handed in.
    pub fn ports(&self) -> &[LinkId] {
        &self.ids
    }

    /// The token driving this pump. Cancel it to stop every thread.
    pub fn token(&self) -> &ShutdownToken {
        &self.token
    }

    /// The fault that stopped the pump, if one has been recorded.
    pub fn fault(&self) -> Option<LinkFault> {
        self.fault.get().cloned()
    }

    /// Queue outbound bytes for one or more links. Never blocks; the writer
    /// picks everything up on its next tick and batches each link's queue
    /// into a single write.
    pub fn enqueue_out<I>(&self, batch: I) -> Result<()>
    where
        I: IntoIterator<Item = (LinkId, Vec<u8>)>,
    {
        self.check_fault()?;
        for (id, bytes) in batch {
            if bytes.is_empty() {
                continue;
            }
            let Some(queue) = self.outbound.get(&id) else {
                return Err(PumpError::UnknownLink(id));
            };
            if queue.send(bytes).is_err() {
                return Err(self.stopped_error());
            }
        }
        Ok(())
    }

    /// Drain every link's inbound queue. Never blocks; links with nothing
    /// pending are omitted from the result.
    pub fn drain_in(&self) -> Result<HashMap<LinkId, Vec<u8>>> {
        self.check_fault()?;
        let mut drained = HashMap::new();
        for (id, queue) in &self.inbound {
            let mut bytes = Vec::new();
            for chunk in queue.try_iter() {
                bytes.extend_from_slice(&chunk);
            }
            if !bytes.is_empty() {
                drained.insert(id.clone(), bytes);
            }
        }
        Ok(drained)
    }

    /// Cancel the token, join every thread, and report any recorded fault.
    ///
    /// The join carries no timeout: every thread observes the token within
    /// one poll interval, so this returns promptly by construction.
    pub fn shutdown(mut self) -> Result<()> {
        self.token.cancel();
        for handle in self.readers.drain(..) {
            if handle.join().is_err() {
                warn!("reader thread panicked during shutdown");
            }
        }
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!("writer thread panicked during shutdown");
            }
        }
        match self.fault.get() {
            Some(fault) => Err(PumpError::Fault(fault.clone())),
            None => Ok(()),
        }
    }

    fn check_fault(&self) -> Result<()> {
        match self.fault.get() {
            Some(fault) => Err(PumpError::Fault(fault.clone())),
            None => Ok(()),
        }
    }

    fn stopped_error(&self) -> PumpError {
        match self.fault.get() {
            Some(fault) => PumpError::Fault(fault.clone()),
            None => PumpError::ShutDown,
        }
    }
}

/// True for error kinds a pump loop retries instead of treating as fatal.
/// Timed-out reads are the idle-link steady state, not a failure.
fn recoverable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

struct ReaderHalf {
    id: LinkId,
    stream: LinkStream,
    delivery: Sender<Vec<u8>>,
    token: ShutdownToken,
    fault: Arc<OnceLock<LinkFault>>,
    pace: Duration,
}

impl ReaderHalf {
    fn run(mut self) {
        debug!(link = %self.id, "reader running");
        let mut chunk = [0u8; READ_CHUNK];
        while !self.token.is_cancelled() {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    // No bytes and no timeout pacing from the transport;
                    // wait one tick so an EOF stream cannot spin.
                    self.token.wait_timeout(self.pace);
                }
                Ok(count) => {
                    if self.delivery.send(chunk[..count].to_vec()).is_err() {
                        break;
                    }
                }
                Err(err) if recoverable(err.kind()) => continue,
                Err(err) => {
                    warn!(link = %self.id, error = %err, "link read failed, stopping pump");
                    let _ = self.fault.set(LinkFault::new(&self.id, &err));
                    self.token.cancel();
                    break;
                }
            }
        }
        debug!(link = %self.id, "reader stopped");
    }
}

struct WriterHalf {
    outputs: Vec<(LinkId, LinkStream, Receiver<Vec<u8>>)>,
    token: ShutdownToken,
    fault: Arc<OnceLock<LinkFault>>,
    tick: Duration,
}

impl WriterHalf {
    /// Deadline-scheduled tick loop: park until the next tick (or
    /// cancellation), then drain and write every link's queue. After
    /// cancellation one final pass runs, so bytes enqueued before a clean
    /// shutdown still reach the wire.
    fn run(mut self) {
        debug!(links = self.outputs.len(), tick = ?self.tick, "writer running");
        let mut next = Instant::now() + self.tick;
        loop {
            let now = Instant::now();
            if now < next {
                self.token.wait_timeout(next - now);
            }
            next += self.tick;
            if next < Instant::now() {
                // Ticks are a pacing floor, not a schedule to catch up on;
                // skip missed ones instead of bursting.
                next = Instant::now() + self.tick;
            }

            for (id, stream, queue) in &mut self.outputs {
                let mut pending = Vec::new();
                for chunk in queue.try_iter() {
                    pending.extend_from_slice(&chunk);
                }
                if pending.is_empty() {
                    continue;
                }
                if let Err(err) = write_all_retrying(stream, &pending) {
                    warn!(link = %id, error = %err, "link write failed, stopping pump");
                    let _ = self.fault.set(LinkFault::new(id, &err));
                    self.token.cancel();
                    return;
                }
            }

            if self.token.is_cancelled() {
                break;
            }
        }
        debug!("writer stopped");
    }
}

/// Write the whole buffer, retrying recoverable kinds. No flush: on a
/// serial port flushing waits for the UART to drain, which would stall the
/// shared writer and every link behind it.
fn write_all_retrying(stream: &mut LinkStream, mut buf: &[u8]) -> std::io::Result<()> {
    while !buf.is_empty() {
        match stream.write(buf) {
            Ok(0) => return Err(ErrorKind::WriteZero.into()),
            Ok(count) => buf = &buf[count..],
            Err(err) if recoverable(err.kind()) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
