//! Live capture via a pnet datalink channel
//!
//! The channel is opened with a 1 ms read timeout; every tenth consecutive
//! quiet poll feeds the engine an idle tick so traffic rollups keep
//! advancing when the wire is silent.

use std::io::{ErrorKind, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use pnet::datalink::{self, Channel, Config as ChannelConfig};
use tracing::{error, info, warn};

use crate::config::CaptureConfig;
use crate::engine::Snoop;
use crate::types::MacAddr;

const READ_TIMEOUT: Duration = Duration::from_millis(1);
const IDLE_POLLS_PER_TICK: u32 = 10;

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Capture from a live interface until the shutdown flag drops.
pub fn run<W: Write>(
    interface_name: &str,
    capture: &CaptureConfig,
    snoop: &mut Snoop<W>,
    running: &AtomicBool,
) -> Result<()> {
    let interface = datalink::interfaces()
        .into_iter()
        .find(|i| i.name == interface_name)
        .with_context(|| format!("no such capture interface: {interface_name}"))?;

    if !interface.is_up() {
        bail!("capture interface {interface_name} is down");
    }
    if interface.is_loopback() {
        warn!("capturing on loopback interface {interface_name}");
    }

    let config = ChannelConfig {
        read_timeout: Some(READ_TIMEOUT),
        write_buffer_size: 0, // We don't write.
        read_buffer_size: 65536,
        promiscuous: capture.promiscuous,
        ..Default::default()
    };

    let (_, mut rx) = match datalink::channel(&interface, config) {
        Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
        Ok(_) => bail!("capture interface {interface_name} is not an Ethernet channel"),
        Err(e) => bail!("failed opening datalink channel on {interface_name}: {e}"),
    };

    match interface.mac {
        Some(mac) => info!(
            "capturing on {} ({}), promiscuous: {}",
            interface_name,
            MacAddr::new(mac.octets()),
            capture.promiscuous
        ),
        None => info!(
            "capturing on {}, promiscuous: {}",
            interface_name, capture.promiscuous
        ),
    }

    let snap_length = capture.snap_length;
    let mut idle_polls = 0u32;

    while running.load(Ordering::SeqCst) {
        match rx.next() {
            Ok(packet) => {
                idle_polls = 0;
                let frame = &packet[..packet.len().min(snap_length)];
                snoop.ingest(now_nanos(), Some(frame))?;
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                idle_polls += 1;
                if idle_polls >= IDLE_POLLS_PER_TICK {
                    idle_polls = 0;
                    snoop.ingest(now_nanos(), None)?;
                }
            }
            Err(e) => {
                error!("failed receiving packet on {interface_name}: {e}");
            }
        }
    }

    info!("capture on {interface_name} stopped");
    Ok(())
}
