//! Capture drivers
//!
//! Both drivers pull `(timestamp, frame)` tuples and feed them to the
//! engine on the calling thread; the live driver additionally injects idle
//! ticks so rollups advance on a quiet wire.

pub mod live;
pub mod file;

use pnet::datalink;

use crate::types::MacAddr;

fn interface_flags(is_up: bool, is_loopback: bool) -> String {
    let mut flags = vec![if is_up { "up" } else { "down" }];
    if is_loopback {
        flags.push("loopback");
    }
    flags.join(",")
}

/// Print one line per capturable interface, with its addresses indented
/// beneath it.
pub fn print_interfaces() {
    for iface in datalink::interfaces() {
        let mac = iface
            .mac
            .map(|m| MacAddr::new(m.octets()).to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<17} [{}]",
            iface.name,
            mac,
            interface_flags(iface.is_up(), iface.is_loopback())
        );
        for ip in &iface.ips {
            println!("             {}", ip);
        }
    }
}
