//! Blink demo — toggles the debug LED on device 0x01 fifty times.
//!
//! Run with:
//!   cargo run --example blink
//!
//! Expects a CDC-ACM device whose firmware answers the identity handshake
//! as device 0x01 and drives its on-board LED on function 0x08.

use std::thread;
use std::time::Duration;

use serimux::proxy::{DeviceId, Proxy, ProxyConfig};

/// Firmware function that drives the on-board LED: one argument byte,
/// nonzero for on.
const DEBUG_LED: u8 = 0x08;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proxy = Proxy::start(ProxyConfig::default())?;
    eprintln!("Links: {:?}", proxy.ports());
    eprintln!("Devices: {:?}", proxy.identities());

    let target = DeviceId::new(0x01).expect("nonzero literal");
    if !proxy.identities().contains(&target) {
        eprintln!("No device identified itself as 0x01; check cabling and firmware.");
        proxy.shutdown()?;
        return Ok(());
    }

    for _ in 0..50 {
        proxy.send(target, &[DEBUG_LED, 0x01])?;
        thread::sleep(Duration::from_millis(100));
        proxy.send(target, &[DEBUG_LED, 0x00])?;
        thread::sleep(Duration::from_millis(100));
    }

    proxy.shutdown()?;
    Ok(())
}
