//! Identity handshake scenarios over in-memory links.

use std::thread;
use std::time::{Duration, Instant};

use serimux_frame::pack;
use serimux_proxy::{control, BootstrapConfig, DeviceId, Proxy, ProxyConfig};
use serimux_transport::mock::{self, MockRemote};
use serimux_transport::{Link, LinkId};

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

/// The frame firmware answers an identity request with.
fn identity_frame(identity: u8) -> Vec<u8> {
    pack(&[control::IDENTITY, identity]).expect("pack identity response")
}

fn id(raw: u8) -> DeviceId {
    DeviceId::new(raw).expect("nonzero")
}

#[test]
fn responding_links_resolve_and_silent_links_stay_unaddressable() {
    let (links, remotes) = mock_links(&["acm0", "acm1", "acm2"]);
    remotes[0].push(&identity_frame(0x0A));
    remotes[1].push(&identity_frame(0x0B));
    // acm2 never answers.

    let proxy = Proxy::start_with_links(links, fast_config(3)).expect("start");

    assert_eq!(proxy.identities(), vec![id(0x0A), id(0x0B)]);
    let report = proxy.bootstrap_report();
    assert!(!report.is_complete());
    assert_eq!(report.attempts, 3);
    assert_eq!(report.identified.len(), 2);
    assert_eq!(report.unidentified, vec![LinkId::from("acm2")]);

    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn a_fully_responding_fleet_completes_on_the_first_attempt() {
    let (links, remotes) = mock_links(&["acm0", "acm1"]);
    remotes[0].push(&identity_frame(1));
    remotes[1].push(&identity_frame(2));

    let proxy = Proxy::start_with_links(links, fast_config(20)).expect("start");

    let report = proxy.bootstrap_report();
    assert!(report.is_complete());
    assert_eq!(report.attempts, 1);
    assert_eq!(proxy.identities(), vec![id(1), id(2)]);

    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn firmware_sees_the_identity_request_on_the_wire() {
    let (links, remotes) = mock_links(&["acm0"]);
    let firmware = remotes[0].clone();
    let responder = thread::spawn(move || {
        let request = pack(&[control::IDENTITY]).expect("pack identity request");
        let written = firmware.written_within(PATIENCE);
        assert!(
            written.starts_with(&request),
            "expected identity request, got {written:?}"
        );
        firmware.push(&identity_frame(0x11));
    });

    let proxy = Proxy::start_with_links(links, fast_config(10)).expect("start");
    responder.join().expect("responder thread");

    assert_eq!(proxy.identities(), vec![id(0x11)]);
    assert!(proxy.bootstrap_report().is_complete());
    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn duplicate_identity_claims_keep_exactly_one_binding() {
    let (links, remotes) = mock_links(&["acm0", "acm1"]);
    remotes[0].push(&identity_frame(7));
    remotes[1].push(&identity_frame(7));

    let proxy = Proxy::start_with_links(links, fast_config(2)).expect("start");

    // One of the two claims wins; the loser stays unidentified rather than
    // silently rebinding the identity.
    assert_eq!(proxy.identities(), vec![id(7)]);
    let report = proxy.bootstrap_report();
    assert_eq!(report.identified.len(), 1);
    assert_eq!(report.unidentified.len(), 1);
    assert!(!report.is_complete());

    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn a_zero_identity_response_is_not_a_binding() {
    let (links, remotes) = mock_links(&["acm0"]);
    remotes[0].push(&identity_frame(0x00));

    let proxy = Proxy::start_with_links(links, fast_config(2)).expect("start");

    assert!(proxy.identities().is_empty());
    assert!(!proxy.bootstrap_report().is_complete());
    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn identified_links_are_not_asked_again() {
    let (links, remotes) = mock_links(&["acm0", "acm1"]);
    remotes[0].push(&identity_frame(1));
    // acm1 never answers, so every cycle re-asks it.

    let proxy = Proxy::start_with_links(links, fast_config(3)).expect("start");
    proxy.shutdown().expect("clean shutdown");

    let request = pack(&[control::IDENTITY]).expect("pack identity request");
    assert_eq!(remotes[0].take_written(), request);
    assert_eq!(
        remotes[1].take_written(),
        [request.clone(), request.clone(), request].concat()
    );
}

#[test]
fn an_empty_fleet_is_usable_and_complete() {
    let mut proxy = Proxy::start_with_links(Vec::new(), fast_config(3)).expect("start");

    assert!(proxy.ports().is_empty());
    assert!(proxy.identities().is_empty());
    assert!(proxy.receive().expect("receive").is_empty());
    let report = proxy.bootstrap_report();
    assert!(report.is_complete());
    assert_eq!(report.attempts, 0);

    proxy.shutdown().expect("clean shutdown");
}

#[test]
fn shutdown_returns_promptly() {
    let (links, remotes) = mock_links(&["acm0", "acm1"]);
    remotes[0].push(&identity_frame(1));
    remotes[1].push(&identity_frame(2));
    let proxy = Proxy::start_with_links(links, fast_config(5)).expect("start");

    let started = Instant::now();
    proxy.shutdown().expect("clean shutdown");
    assert!(started.elapsed() < PATIENCE);
}
