//! In-memory duplex links for tests and hardware-free development.
//!
//! A mock link behaves like an opened serial port: reads block for up to the
//! configured timeout and then fail with [`std::io::ErrorKind::TimedOut`],
//! and cloned handles share the underlying device state. The paired
//! [`MockRemote`] plays the device side of the wire.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::link::{Link, LinkId, LinkStream};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One direction of the wire: a byte queue with blocking-timed reads.
#[derive(Default)]
struct Channel {
    queue: Mutex<VecDeque<u8>>,
    ready: Condvar,
    severed: AtomicBool,
}

impl Channel {
    fn push(&self, bytes: &[u8]) {
        let mut queue = lock(&self.queue);
        queue.extend(bytes.iter().copied());
        self.ready.notify_all();
    }

    fn severed(&self) -> bool {
        self.severed.load(Ordering::SeqCst)
    }

    fn sever(&self) {
        self.severed.store(true, Ordering::SeqCst);
        let _queue = lock(&self.queue);
        self.ready.notify_all();
    }

    fn read_timed(&self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut queue = lock(&self.queue);
        loop {
            if self.severed() {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            if !queue.is_empty() {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(io::ErrorKind::TimedOut.into());
            }
            let (guard, _timed_out) = self
                .ready
                .wait_timeout(queue, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            queue = guard;
        }
        let count = buf.len().min(queue.len());
        for (slot, byte) in buf.iter_mut().zip(queue.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn drain(&self) -> Vec<u8> {
        let mut queue = lock(&self.queue);
        queue.drain(..).collect()
    }

    fn drain_within(&self, timeout: Duration) -> Vec<u8> {
        let deadline = Instant::now() + timeout;
        let mut queue = lock(&self.queue);
        while queue.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _timed_out) = self
                .ready
                .wait_timeout(queue, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            queue = guard;
        }
        queue.drain(..).collect()
    }
}

#[derive(Default)]
struct Shared {
    /// Device-to-host bytes: the link reads these.
    inbound: Channel,
    /// Host-to-device bytes: the link writes these.
    outbound: Channel,
}

/// Link-side endpoint wrapped by [`LinkStream`]. Clones share the device.
pub(crate) struct MockEndpoint {
    shared: Arc<Shared>,
    read_timeout: Duration,
}

impl Clone for MockEndpoint {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            read_timeout: self.read_timeout,
        }
    }
}

impl Read for MockEndpoint {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.shared.inbound.read_timed(buf, self.read_timeout)
    }
}

impl Write for MockEndpoint {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.shared.outbound.severed() {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        self.shared.outbound.push(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Device side of a mock link. Clones share the device state.
#[derive(Clone)]
pub struct MockRemote {
    shared: Arc<Shared>,
}

impl MockRemote {
    /// Queue bytes for the link to read, as if the device had sent them.
    pub fn push(&self, bytes: &[u8]) {
        self.shared.inbound.push(bytes);
    }

    /// Take every byte written to the link so far.
    pub fn take_written(&self) -> Vec<u8> {
        self.shared.outbound.drain()
    }

    /// Wait up to `timeout` for at least one written byte, then take
    /// everything available. Returns empty on timeout.
    pub fn written_within(&self, timeout: Duration) -> Vec<u8> {
        self.shared.outbound.drain_within(timeout)
    }

    /// Break the link: every subsequent read and write on the link side
    /// fails with [`std::io::ErrorKind::BrokenPipe`], like an unplugged
    /// device. Blocked reads wake immediately.
    pub fn sever(&self) {
        self.shared.inbound.sever();
        self.shared.outbound.sever();
    }
}

/// Create an in-memory link plus the remote handle that plays its device.
pub fn link(name: &str, read_timeout: Duration) -> (Link, MockRemote) {
    let shared = Arc::new(Shared::default());
    let endpoint = MockEndpoint {
        shared: Arc::clone(&shared),
        read_timeout,
    };
    let link = Link::new(LinkId::from(name), LinkStream::from_mock(endpoint));
    (link, MockRemote { shared })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    const TIMEOUT: Duration = Duration::from_millis(5);

    #[test]
    fn read_times_out_when_idle() {
        let (mut link, _remote) = link("mock0", TIMEOUT);
        let mut buf = [0u8; 16];
        let err = link.stream.read(&mut buf).expect_err("no data queued");
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn pushed_bytes_are_read_in_order() {
        let (mut link, remote) = link("mock0", TIMEOUT);
        remote.push(&[1, 2, 3]);
        remote.push(&[4, 5]);
        let mut buf = [0u8; 16];
        let n = link.stream.read(&mut buf).expect("data queued");
        assert_eq!(&buf[..n], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn short_read_leaves_remainder_queued() {
        let (mut link, remote) = link("mock0", TIMEOUT);
        remote.push(&[9, 8, 7, 6]);
        let mut buf = [0u8; 2];
        let n = link.stream.read(&mut buf).expect("data queued");
        assert_eq!(&buf[..n], &[9, 8]);
        let n = link.stream.read(&mut buf).expect("remainder queued");
        assert_eq!(&buf[..n], &[7, 6]);
    }

    #[test]
    fn writes_reach_the_remote() {
        let (mut link, remote) = link("mock0", TIMEOUT);
        link.stream.write_all(&[0x10, 0x20]).expect("write");
        link.stream.write_all(&[0x30]).expect("write");
        assert_eq!(remote.take_written(), vec![0x10, 0x20, 0x30]);
        assert!(remote.take_written().is_empty());
    }

    #[test]
    fn cloned_halves_share_the_device() {
        let (link, remote) = link("mock0", TIMEOUT);
        let (_id, mut reader, mut writer) = link.split().expect("split");
        remote.push(&[42]);
        let mut buf = [0u8; 4];
        let n = reader.read(&mut buf).expect("reader half sees pushes");
        assert_eq!(&buf[..n], &[42]);
        writer.write_all(&[7]).expect("writer half reaches remote");
        assert_eq!(remote.take_written(), vec![7]);
    }

    #[test]
    fn severed_link_fails_reads_and_writes() {
        let (mut link, remote) = link("mock0", Duration::from_secs(5));
        remote.push(&[1]);
        remote.sever();
        let mut buf = [0u8; 4];
        let err = link.stream.read(&mut buf).expect_err("severed");
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
        let err = link.stream.write(&[1]).expect_err("severed");
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn sever_wakes_a_blocked_reader() {
        let (mut link, remote) = link("mock0", Duration::from_secs(30));
        let waker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.sever();
        });
        let started = Instant::now();
        let mut buf = [0u8; 4];
        let err = link.stream.read(&mut buf).expect_err("severed mid-read");
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
        assert!(started.elapsed() < Duration::from_secs(5));
        waker.join().expect("waker thread");
    }
}
