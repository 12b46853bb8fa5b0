//! UDP session table
//!
//! Groups datagrams into bidirectional flows keyed by the canonical
//! four-tuple. Each session owns one application-protocol handler, chosen
//! when the flow is first seen. The table is bounded: the least recently
//! used flow is evicted when the capacity is reached.

use std::io::Write;
use std::num::NonZeroUsize;

use anyhow::Result;
use lru::LruCache;

use crate::decode::dns::{self, DnsOutcome};
use crate::decode::Disposition;
use crate::model::{Model, NameType};
use crate::types::SessionKey;

pub const DEFAULT_SESSION_CAPACITY: usize = 4096;

const DNS_PORT: u16 = 53;

/// The application protocol spoken on a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppProtocol {
    Dns,
    Discard,
}

#[derive(Debug)]
pub struct UdpSession {
    protocol: AppProtocol,
    datagrams_a_to_b: u64,
    datagrams_b_to_a: u64,
}

impl UdpSession {
    fn new(key: SessionKey) -> Self {
        //  Just assume anything on UDP port 53 is DNS.
        let protocol = if key.a.port == DNS_PORT || key.b.port == DNS_PORT {
            AppProtocol::Dns
        } else {
            AppProtocol::Discard
        };
        Self {
            protocol,
            datagrams_a_to_b: 0,
            datagrams_b_to_a: 0,
        }
    }

    fn put<W: Write>(
        &mut self,
        model: &mut Model<W>,
        from_a: bool,
        payload: &[u8],
    ) -> Result<Disposition> {
        if from_a {
            self.datagrams_a_to_b += 1;
        } else {
            self.datagrams_b_to_a += 1;
        }

        match self.protocol {
            AppProtocol::Discard => Ok(Disposition::L4Protocol),
            AppProtocol::Dns => match dns::parse(payload) {
                DnsOutcome::Query => Ok(Disposition::Dns),
                DnsOutcome::Response(bindings) => {
                    for binding in bindings {
                        model.note_name(binding.address, &binding.name, NameType::Dns)?;
                    }
                    Ok(Disposition::Dns)
                }
                DnsOutcome::Error => Ok(Disposition::DnsError),
                DnsOutcome::Truncated => Ok(Disposition::Truncated),
            },
        }
    }

    pub fn datagram_count(&self) -> u64 {
        self.datagrams_a_to_b + self.datagrams_b_to_a
    }
}

pub struct SessionTable {
    sessions: LruCache<SessionKey, UdpSession>,
}

impl SessionTable {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: LruCache::new(capacity),
        }
    }

    /// Route one datagram through its session's protocol handler.
    /// `from_a` is set when the datagram's source is the canonical low side.
    pub fn dispatch<W: Write>(
        &mut self,
        key: SessionKey,
        from_a: bool,
        payload: &[u8],
        model: &mut Model<W>,
    ) -> Result<Disposition> {
        let session = self
            .sessions
            .get_or_insert_mut(key, || UdpSession::new(key));
        session.put(model, from_a, payload)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
