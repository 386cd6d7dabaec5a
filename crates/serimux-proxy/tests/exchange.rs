//! Identity-addressed packet exchange over in-memory links.

use std::io::ErrorKind;
use std::thread;
use std::time::{Duration, Instant};

use serimux_frame::{pack, CodecError};
use serimux_proxy::{control, BootstrapConfig, DeviceId, Proxy, ProxyConfig, ProxyError};
use serimux_pump::PumpError;
use serimux_transport::mock::{self, MockRemote};
use serimux_transport::Link;

const READ_TIMEOUT: Duration = Duration::from_millis(2);
const PATIENCE: Duration = Duration::from_secs(5);

fn fast_config(attempts: u32) -> ProxyConfig {
    ProxyConfig {
        write_tick: Duration::from_millis(1),
        bootstrap: BootstrapConfig {
            attempts,
            settle: Duration::from_millis(50),
        },
        ..ProxyConfig::default()
    }
}

fn mock_links(names: &[&str]) -> (Vec<Link>, Vec<MockRemote>) {
    names
        .iter()
        .map(|name| mock::link(name, READ_TIMEOUT))
        .unzip()
}

fn identity_frame(identity: u8) -> Vec<u8> {
    pack(&[control::IDENTITY, identity]).expect("pack identity response")
}

fn id(raw: u8) -> DeviceId {
    DeviceId::new(raw).expect("nonzero")
}

/// Start a proxy over mock links where every remote claims the identity
/// paired with its name, then discard the handshake request bytes so tests
/// see only their own traffic.
fn identified_proxy(fleet: &[(&str, u8)]) -> (Proxy, Vec<MockRemote>) {
    let (links, remotes) = mock_links(&fleet.iter().map(|(name, _)| *name).collect::<Vec<_>>());
    for (remote, (_, identity)) in remotes.iter().zip(fleet) {
        remote.push(&identity_frame(*identity));
    }
    let proxy = Proxy::start_with_links(links, fast_config(5)).expect("start");
    for remote in &remotes {
        remote.take_written();
    }
    (proxy, remotes)
}

/// Poll `receive` until `want` packets have arrived.
fn receive_until(proxy: &mut Proxy, want: usize) -> Vec<(DeviceId, Vec<u8>)> {
    let deadline = Instant::now() + PATIENCE;
    let mut packets = Vec::new();
    while packets.len() < want {
        assert!(Instant::now() < deadline, "timed out waiting for packets");
        packets.extend(proxy.receive().expect("receive"));
        thread::sleep(Duration::from_millis(1));
    }
    packets
}

/// Poll the remote until `want` written bytes have accumulated.
fn written_until(remote: &MockRemote, want: usize) -> Vec<u8> {
    let deadline = Instant::now() + PATIENCE;
    let mut written = Vec::new();
    while written.len() < want {
        assert!(Instant::now() < deadline, "timed out waiting for writes");
        written.extend(remote.written_within(Duration::from_millis(20)));
    }
    written
}

#[test]
fn packets_route_by_identity_in_both_directions() {
    let (mut proxy, remotes) = identified_proxy(&[("acm0", 0x0A), ("acm1", 0x0B)]);

    // Outbound lands on the link that claimed the identity, framed.
    proxy.send(id(0x0B), &[0x08, 0x01]).expect("send");
    let frame = pack(&[0x08, 0x01]).expect("pack");
    assert_eq!(written_until(&remotes[1], frame.len()), frame);
    assert!(remotes[0].take_written().is_empty());

    // Inbound comes back labeled with the sender's identity.
    remotes[0].push(&pack(&[0x42, 1, 2, 3]).expect("pack"));
    let packets = receive_until(&mut proxy, 1);
    assert_eq!(packets, vec![(id(0x0A), vec![0x42, 1, 2, 3])]);

    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn send_many_preserves_submission_order_per_device() {
    let (proxy, remotes) = identified_proxy(&[("acm0", 1)]);

    proxy
        .send_many(&[(id(1), vec![0x08, 0x01]), (id(1), vec![0x08, 0x00])])
        .expect("send_many");

    let expected = [
        pack(&[0x08, 0x01]).expect("pack"),
        pack(&[0x08, 0x00]).expect("pack"),
    ]
    .concat();
    assert_eq!(written_until(&remotes[0], expected.len()), expected);

    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn sending_to_an_unknown_identity_fails_loudly() {
    let (proxy, _remotes) = identified_proxy(&[("acm0", 1)]);

    let err = proxy.send(id(9), &[1]).expect_err("nothing claimed 9");
    assert!(matches!(
        err,
        ProxyError::UnknownIdentity(identity) if identity.get() == 9
    ));

    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn a_batch_with_an_unknown_identity_transmits_nothing() {
    let (proxy, remotes) = identified_proxy(&[("acm0", 1)]);

    let err = proxy
        .send_many(&[(id(1), vec![2]), (id(9), vec![3])])
        .expect_err("one identity is unknown");
    assert!(matches!(err, ProxyError::UnknownIdentity(_)));

    // Give the writer ticks to flush anything wrongly queued.
    thread::sleep(Duration::from_millis(20));
    assert!(remotes[0].take_written().is_empty());

    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn oversized_payloads_are_rejected_before_transmission() {
    let (proxy, remotes) = identified_proxy(&[("acm0", 1)]);

    let err = proxy
        .send(id(1), &vec![0u8; 300])
        .expect_err("over the length field's range");
    assert!(matches!(
        err,
        ProxyError::Codec(CodecError::PayloadTooLarge { len: 300, .. })
    ));

    thread::sleep(Duration::from_millis(20));
    assert!(remotes[0].take_written().is_empty());

    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn corrupt_frames_are_skipped_and_counted() {
    let (mut proxy, remotes) = identified_proxy(&[("acm0", 1)]);

    let mut bad = pack(&[9, 9]).expect("pack");
    bad[1] ^= 0xFF;
    let before = proxy.corrupt_packets();
    remotes[0].push(&bad);
    remotes[0].push(&pack(&[0x07, 0x55]).expect("pack"));

    // Per-link ordering: once the good frame decodes, the bad one before it
    // has already been counted and dropped.
    let packets = receive_until(&mut proxy, 1);
    assert_eq!(packets, vec![(id(1), vec![0x07, 0x55])]);
    assert!(proxy.corrupt_packets() > before);

    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn partial_frames_reassemble_across_reads() {
    let (mut proxy, remotes) = identified_proxy(&[("acm0", 1)]);

    let frame = pack(&[0x33, 0xAA, 0xBB]).expect("pack");
    remotes[0].push(&frame[..3]);

    // A fragment alone never yields a packet.
    for _ in 0..5 {
        assert!(proxy.receive().expect("receive").is_empty());
        thread::sleep(Duration::from_millis(1));
    }

    remotes[0].push(&frame[3..]);
    let packets = receive_until(&mut proxy, 1);
    assert_eq!(packets, vec![(id(1), vec![0x33, 0xAA, 0xBB])]);

    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn packets_from_unidentified_links_are_dropped() {
    let (links, remotes) = mock_links(&["acm0", "acm1"]);
    remotes[0].push(&identity_frame(1));
    // acm1 never answers the handshake.
    let mut proxy = Proxy::start_with_links(links, fast_config(2)).expect("start");
    assert!(!proxy.bootstrap_report().is_complete());

    remotes[1].push(&pack(&[0x44]).expect("pack"));
    remotes[0].push(&pack(&[0x55]).expect("pack"));

    // Only the identified link's packet surfaces; the degraded fleet still
    // exchanges normally.
    let packets = receive_until(&mut proxy, 1);
    assert_eq!(packets, vec![(id(1), vec![0x55])]);
    for _ in 0..5 {
        assert!(proxy.receive().expect("receive").is_empty());
        thread::sleep(Duration::from_millis(1));
    }

    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn a_dead_link_faults_the_exchange() {
    let (mut proxy, remotes) = identified_proxy(&[("acm0", 1), ("acm1", 2)]);

    remotes[0].sever();

    let deadline = Instant::now() + PATIENCE;
    let fault = loop {
        assert!(Instant::now() < deadline, "fault never surfaced");
        match proxy.receive() {
            Ok(_) => thread::sleep(Duration::from_millis(1)),
            Err(ProxyError::Pump(PumpError::Fault(fault))) => break fault,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    };
    assert_eq!(fault.link.as_str(), "acm0");
    assert_eq!(fault.kind, ErrorKind::BrokenPipe);

    let err = proxy.shutdown().expect_err("fault is sticky");
    assert!(matches!(
        err,
        ProxyError::Pump(PumpError::Fault(fault)) if fault.link.as_str() == "acm0"
    ));
}
