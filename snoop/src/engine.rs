//! The core engine
//!
//! `Snoop` owns the topology model, the UDP session table, and the
//! per-disposition counters, and drives the dissector chain for every
//! captured frame. All entry points run to completion on the caller's
//! thread; the only blocking point is the event sink inside the model.

use std::fmt;
use std::io::Write;
use std::net::Ipv4Addr;

use anyhow::Result;

use crate::decode::arp::{self, ArpOutcome};
use crate::decode::ethernet;
use crate::decode::ipv4::{self, Ipv4Outcome};
use crate::decode::udp;
use crate::decode::Disposition;
use crate::lookup::Tables;
use crate::model::{Model, ModelOptions};
use crate::session::{SessionTable, DEFAULT_SESSION_CAPACITY};
use crate::types::{MacAddr, SessionKey, SockAddr};

/// Frame-level counters, reported on exit.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Total frames observed.
    pub observed: u64,
    /// Frames per parse outcome.
    pub dispositions: [u64; Disposition::COUNT],
}

impl Stats {
    fn record(&mut self, disposition: Disposition) {
        self.dispositions[disposition.index()] += 1;
    }

    pub fn count(&self, disposition: Disposition) -> u64 {
        self.dispositions[disposition.index()]
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stats:")?;
        writeln!(f, "    {:>9} packets observed", self.observed)?;
        writeln!(f, "              packet dispositions")?;
        for disposition in Disposition::ALL {
            writeln!(
                f,
                "       {:>9} {}",
                self.dispositions[disposition.index()],
                disposition
            )?;
        }
        Ok(())
    }
}

pub struct Snoop<W: Write> {
    model: Model<W>,
    sessions: SessionTable,
    stats: Stats,
}

impl<W: Write> Snoop<W> {
    pub fn new(tables: Tables, options: ModelOptions, sink: W) -> Self {
        Self::with_session_capacity(tables, options, DEFAULT_SESSION_CAPACITY, sink)
    }

    pub fn with_session_capacity(
        tables: Tables,
        options: ModelOptions,
        session_capacity: usize,
        sink: W,
    ) -> Self {
        Self {
            model: Model::new(tables, options, sink),
            sessions: SessionTable::new(session_capacity),
            stats: Stats::default(),
        }
    }

    /// Ingest one captured frame, or an idle tick when `frame` is `None` or
    /// empty. `timestamp` is nanoseconds since the epoch.
    pub fn ingest(&mut self, timestamp: i64, frame: Option<&[u8]>) -> Result<()> {
        self.model.note_time(timestamp)?;
        if let Some(frame) = frame {
            if frame.is_empty() {
                return Ok(());
            }
            self.stats.observed += 1;
            self.model.note_packet_count(self.stats.observed as i64);
            let disposition = self.dissect_ethernet(frame)?;
            self.stats.record(disposition);
        }
        Ok(())
    }

    fn dissect_ethernet(&mut self, frame: &[u8]) -> Result<Disposition> {
        let (header, payload) = match ethernet::parse(frame) {
            Some(parsed) => parsed,
            None => return Ok(Disposition::Truncated),
        };

        self.model.note_l2_packet_traffic(header.src, header.dst)?;

        match header.ethertype {
            ethernet::ETHERTYPE_IPV4 => self.dissect_ipv4(header.src, header.dst, payload),
            ethernet::ETHERTYPE_ARP => self.dissect_arp(payload),
            _ => Ok(Disposition::EthertypeBad),
        }
    }

    fn dissect_arp(&mut self, packet: &[u8]) -> Result<Disposition> {
        match arp::parse(packet) {
            ArpOutcome::Reply(reply) => {
                self.model.note_arp(reply.sender_mac, reply.sender_ip)?;
                self.model.note_arp(reply.target_mac, reply.target_ip)?;
                Ok(Disposition::Arp)
            }
            ArpOutcome::Disinterest => Ok(Disposition::ArpDisinterest),
            ArpOutcome::Error => Ok(Disposition::ArpError),
            ArpOutcome::Truncated => Ok(Disposition::Truncated),
        }
    }

    fn dissect_ipv4(
        &mut self,
        src_mac: MacAddr,
        dst_mac: MacAddr,
        packet: &[u8],
    ) -> Result<Disposition> {
        let (header, payload) = match ipv4::parse(packet) {
            Ipv4Outcome::Datagram(header, payload) => (header, payload),
            Ipv4Outcome::Fragment => return Ok(Disposition::Ipv4Fragment),
            Ipv4Outcome::Bad => return Ok(Disposition::Ipv4Bad),
            Ipv4Outcome::Truncated => return Ok(Disposition::Truncated),
        };

        self.model.note_ip_through_interface(header.src, src_mac)?;
        self.model.note_ip_through_interface(header.dst, dst_mac)?;

        match header.protocol {
            ipv4::PROTO_UDP => self.dissect_udp(header.src, header.dst, payload),
            _ => Ok(Disposition::Ipv4Protocol),
        }
    }

    fn dissect_udp(
        &mut self,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        packet: &[u8],
    ) -> Result<Disposition> {
        let (header, payload) = match udp::parse(packet) {
            Some(parsed) => parsed,
            None => return Ok(Disposition::Truncated),
        };

        let source = SockAddr::new(src_ip, header.src_port);
        let destination = SockAddr::new(dst_ip, header.dst_port);
        let key = SessionKey::new(source, destination);
        let from_a = source == key.a;

        self.sessions.dispatch(key, from_a, payload, &mut self.model)
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn model(&self) -> &Model<W> {
        &self.model
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_display_lists_every_bucket() {
        let mut stats = Stats::default();
        stats.observed = 3;
        stats.record(Disposition::Udp);
        stats.record(Disposition::Udp);
        stats.record(Disposition::Truncated);

        let text = stats.to_string();
        assert!(text.contains("3 packets observed"));
        for disposition in Disposition::ALL {
            assert!(text.contains(disposition.name()));
        }
        assert_eq!(stats.count(Disposition::Udp), 2);
    }
}
