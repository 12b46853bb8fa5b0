//! Model entities
//!
//! All cross-entity references are numeric ids into the model's maps, never
//! shared handles, so the graph cannot form ownership cycles.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};

use crate::events::{
    Attachment, CloudEvent, EventBody, InterfaceEvent, IpAddressEvent, NetworkEvent,
};
use crate::types::MacAddr;

/// An inferred Ethernet broadcast domain.
#[derive(Debug, Clone)]
pub struct Network {
    pub id: i64,
    /// Ids of the interfaces on this network.
    pub members: BTreeSet<i64>,
}

impl Network {
    pub(crate) fn to_event(&self, fini: bool) -> EventBody {
        EventBody::Network(NetworkEvent { id: self.id, fini })
    }
}

/// A MAC endpoint observed as a frame source or destination.
#[derive(Debug, Clone)]
pub struct Interface {
    pub id: i64,
    pub address: MacAddr,
    /// Every interface belongs to exactly one network.
    pub network_id: i64,
    /// Vendor name from the OUI registry, possibly empty.
    pub maker: String,
    /// Number of Ethernet frames addressed to or from this interface.
    pub packet_count: i64,
}

impl Interface {
    pub(crate) fn to_event(&self, fini: bool) -> EventBody {
        EventBody::Interface(InterfaceEvent {
            id: self.id,
            fini,
            network_id: self.network_id,
            address: self.address,
            maker: self.maker.clone(),
        })
    }
}

/// An observed IPv4 address.
#[derive(Debug, Clone)]
pub struct IpAddressInfo {
    pub id: i64,
    pub address: Ipv4Addr,
    pub attached_to: Attachment,
    /// Number of packets addressed to or from this IP address.
    pub packet_count: i64,
    /// Name service name assigned to this address, empty if unknown.
    pub ns_name: String,
    pub asn: Option<u32>,
    pub as_name: Option<String>,
}

impl IpAddressInfo {
    pub(crate) fn to_event(&self, fini: bool) -> EventBody {
        EventBody::IpAddress(IpAddressEvent {
            id: self.id,
            fini,
            address: IpAddr::V4(self.address),
            ns_name: self.ns_name.clone(),
            attached_to: self.attached_to,
            asn: self.asn,
            as_name: self.as_name.clone(),
        })
    }
}

/// Off-LAN address space reached through one interface, optionally
/// subdivided into per-AS child clouds.
#[derive(Debug, Clone)]
pub struct Cloud {
    pub id: i64,
    pub description: String,
    pub attached_to: Attachment,
    /// Clouds inside this cloud.
    pub children: BTreeSet<i64>,
    /// Number of packets addressed to or from IP addresses in this cloud.
    pub packet_count: i64,
}

impl Cloud {
    pub(crate) fn to_event(&self, fini: bool) -> EventBody {
        EventBody::Cloud(CloudEvent {
            id: self.id,
            fini,
            description: self.description.clone(),
            attached_to: self.attached_to,
        })
    }
}

/// Where a name assignment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NameType {
    Dns,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NameEntry {
    pub name: String,
    pub name_type: NameType,
}
