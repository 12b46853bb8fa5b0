//! The topology model
//!
//! Owns every Network/Interface/IPAddress/Cloud entity and turns dissector
//! observations into a consistent, monotonically-identified graph of the
//! observed LAN. Every externally visible mutation is published on the event
//! sink before the observation call returns.

pub mod entities;

pub use entities::{Cloud, Interface, IpAddressInfo, NameEntry, NameType, Network};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{self, Write};
use std::net::Ipv4Addr;

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use crate::events::{Attachment, Event, EventBody, EventWriter, TrafficEvent};
use crate::lookup::Tables;
use crate::types::MacAddr;

/// Default interval between traffic-counter rollups.
pub const TRAFFIC_INTERVAL_NS: i64 = 10_000_000;

const ROOT_CLOUD_DESCRIPTION: &str = "IP cloud";

#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Attach newly discovered orphan MACs to the first existing network
    /// instead of opening a network per MAC.
    pub assume_one_lan: bool,
    /// Nanoseconds between traffic rollups.
    pub traffic_interval_ns: i64,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            assume_one_lan: true,
            traffic_interval_ns: TRAFFIC_INTERVAL_NS,
        }
    }
}

pub struct Model<W: Write> {
    /// Nanoseconds since the epoch.
    now: i64,
    packet_count: i64,

    /// Unique ID generator. The first ID is 1 because 0 means "none".
    next_id: i64,

    assume_one_lan: bool,
    traffic_interval_ns: i64,

    networks: BTreeMap<i64, Network>,
    interfaces_by_address: HashMap<MacAddr, Interface>,
    addresses_by_id: HashMap<i64, MacAddr>,
    ip_addresses: HashMap<Ipv4Addr, IpAddressInfo>,
    clouds: BTreeMap<i64, Cloud>,
    /// Root cloud attached to each interface, keyed by the interface MAC.
    root_clouds: HashMap<MacAddr, i64>,

    /// Names learned for addresses, whether or not an endpoint exists yet.
    names: HashMap<Ipv4Addr, BTreeSet<NameEntry>>,

    /// Entities with packet traffic since the last rollup.
    recent_interface_traffic: BTreeSet<MacAddr>,
    recent_cloud_traffic: BTreeSet<i64>,
    recent_ip_traffic: BTreeSet<Ipv4Addr>,
    last_traffic_update: i64,

    /// ARP bindings skipped because the MAC had no interface yet.
    arp_unknown_mac: u64,

    tables: Tables,
    writer: EventWriter<W>,
}

impl<W: Write> Model<W> {
    pub fn new(tables: Tables, options: ModelOptions, sink: W) -> Self {
        Self {
            now: 0,
            packet_count: 0,
            next_id: 1,
            assume_one_lan: options.assume_one_lan,
            traffic_interval_ns: options.traffic_interval_ns,
            networks: BTreeMap::new(),
            interfaces_by_address: HashMap::new(),
            addresses_by_id: HashMap::new(),
            ip_addresses: HashMap::new(),
            clouds: BTreeMap::new(),
            root_clouds: HashMap::new(),
            names: HashMap::new(),
            recent_interface_traffic: BTreeSet::new(),
            recent_cloud_traffic: BTreeSet::new(),
            recent_ip_traffic: BTreeSet::new(),
            last_traffic_update: 0,
            arp_unknown_mac: 0,
            tables,
            writer: EventWriter::new(sink),
        }
    }

    /// Advance the model clock. Emits a traffic rollup when the interval has
    /// elapsed and anything has been active since the last one.
    pub fn note_time(&mut self, now: i64) -> Result<()> {
        self.now = now;
        if self.last_traffic_update == 0 {
            //  First clock observation starts the first rollup interval.
            self.last_traffic_update = now;
        }

        let any_recent = !self.recent_interface_traffic.is_empty()
            || !self.recent_cloud_traffic.is_empty()
            || !self.recent_ip_traffic.is_empty();
        if any_recent && now >= self.last_traffic_update + self.traffic_interval_ns {
            self.emit_traffic_update()?;
            self.recent_interface_traffic.clear();
            self.recent_cloud_traffic.clear();
            self.recent_ip_traffic.clear();
            self.last_traffic_update = now;
        }
        Ok(())
    }

    pub fn note_packet_count(&mut self, count: i64) {
        self.packet_count = count;
    }

    /// Note one Ethernet frame traversing between two interfaces.
    pub fn note_l2_packet_traffic(&mut self, source: MacAddr, destination: MacAddr) -> Result<()> {
        let multicast = destination.is_multicast();
        let source_known = self.interfaces_by_address.contains_key(&source);
        let destination_known = self.interfaces_by_address.contains_key(&destination);

        if multicast {
            //  In a multicast broadcast, only the source interface is real.
            if !source_known {
                let network_id = self.network_for_orphan()?;
                self.new_interface(source, network_id)?;
            }
        } else {
            match (source_known, destination_known) {
                //  Both interfaces are known to us.
                (true, true) => {
                    let source_network = self.interfaces_by_address[&source].network_id;
                    let destination_network =
                        self.interfaces_by_address[&destination].network_id;
                    if source_network != destination_network {
                        self.merge_networks(source_network, destination_network)?;
                    }
                }
                //  Both interfaces are new to us.
                (false, false) => {
                    let network_id = self.network_for_orphan()?;
                    self.new_interface(source, network_id)?;
                    self.new_interface(destination, network_id)?;
                }
                //  Only the source interface is new.
                (false, true) => {
                    let network_id = self.interfaces_by_address[&destination].network_id;
                    self.new_interface(source, network_id)?;
                }
                //  Only the destination interface is new.
                (true, false) => {
                    let network_id = self.interfaces_by_address[&source].network_id;
                    self.new_interface(destination, network_id)?;
                }
            }
        }

        //  Count the frame against both ends; a multicast destination has no
        //  interface and goes uncounted.
        if let Some(interface) = self.interfaces_by_address.get_mut(&source) {
            interface.packet_count += 1;
            self.recent_interface_traffic.insert(source);
        }
        if let Some(interface) = self.interfaces_by_address.get_mut(&destination) {
            interface.packet_count += 1;
            self.recent_interface_traffic.insert(destination);
        }

        Ok(())
    }

    /// Note a MAC/IP binding learned from ARP.
    pub fn note_arp(&mut self, mac: MacAddr, ip: Ipv4Addr) -> Result<()> {
        let interface_id = match self.interfaces_by_address.get(&mac) {
            Some(interface) => interface.id,
            None => {
                //  The L2 pass should already have created this interface.
                self.arp_unknown_mac += 1;
                debug!(%mac, %ip, "ARP binding for a MAC with no interface, skipped");
                return Ok(());
            }
        };

        if let Some(info) = self.ip_addresses.get_mut(&ip) {
            if info.attached_to != Attachment::Interface(interface_id) {
                info.attached_to = Attachment::Interface(interface_id);
                let body = info.to_event(false);
                self.emit(body)?;
            }
        } else {
            self.new_ip_address_on_interface(ip, interface_id)?;
        }
        Ok(())
    }

    /// Note an IP address being routed through an Ethernet interface.
    pub fn note_ip_through_interface(&mut self, ip: Ipv4Addr, mac: MacAddr) -> Result<()> {
        if mac.is_multicast() {
            return Ok(());
        }

        if let Some(info) = self.ip_addresses.get_mut(&ip) {
            info.packet_count += 1;
            let mut next = match info.attached_to {
                Attachment::Cloud(id) => Some(id),
                Attachment::Interface(_) => None,
            };
            self.recent_ip_traffic.insert(ip);

            //  Propagate the count up the cloud chain.
            while let Some(cloud_id) = next {
                let cloud = self.clouds.get_mut(&cloud_id).with_context(|| {
                    format!("IP address {ip} references missing cloud {cloud_id}")
                })?;
                cloud.packet_count += 1;
                self.recent_cloud_traffic.insert(cloud_id);
                next = match cloud.attached_to {
                    Attachment::Cloud(parent) => Some(parent),
                    Attachment::Interface(_) => None,
                };
            }
            return Ok(());
        }

        let interface_id = self
            .interfaces_by_address
            .get(&mac)
            .map(|interface| interface.id)
            .ok_or_else(|| anyhow!("IP address {ip} routed through unknown interface {mac}"))?;

        //  An address the prefix table can route is off-LAN: aggregate it
        //  under the interface's cloud, grouped by AS when the tables name
        //  one. Anything else is treated as on-link and attached directly.
        let prefix = self.tables.prefixes.look_up_addr(ip).copied();
        match prefix {
            None => {
                self.new_ip_address_on_interface(ip, interface_id)?;
            }
            Some(prefix) => {
                let root_id = match self.root_clouds.get(&mac) {
                    Some(&id) => id,
                    None => {
                        let id =
                            self.new_cloud_on_interface(interface_id, ROOT_CLOUD_DESCRIPTION)?;
                        self.root_clouds.insert(mac, id);
                        id
                    }
                };

                let as_name = self.tables.asns.name(prefix.asn).map(str::to_string);
                let parent_id = match &as_name {
                    Some(name) => self.find_or_create_subcloud(root_id, name)?,
                    None => root_id,
                };

                self.new_ip_address_in_cloud(ip, parent_id, Some(prefix.asn), as_name)?;
            }
        }
        Ok(())
    }

    /// Note a name assigned to an IP address.
    pub fn note_name(&mut self, address: Ipv4Addr, name: &str, name_type: NameType) -> Result<()> {
        self.names.entry(address).or_default().insert(NameEntry {
            name: name.to_string(),
            name_type,
        });

        if let Some(info) = self.ip_addresses.get_mut(&address) {
            if info.ns_name != name {
                info.ns_name = name.to_string();
                let body = info.to_event(false);
                self.emit(body)?;
            }
        }
        Ok(())
    }

    //
    //  Entity creation. Each constructor assigns the next id, links the
    //  entity into the graph, and emits its creation event.
    //

    fn take_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The network a newly discovered orphan MAC lands on.
    fn network_for_orphan(&mut self) -> Result<i64> {
        if self.assume_one_lan {
            if let Some(&id) = self.networks.keys().next() {
                return Ok(id);
            }
        }
        self.new_network()
    }

    fn new_network(&mut self) -> Result<i64> {
        let id = self.take_id();
        let network = Network {
            id,
            members: BTreeSet::new(),
        };
        let body = network.to_event(false);
        self.networks.insert(id, network);
        self.emit(body)?;
        Ok(id)
    }

    fn new_interface(&mut self, address: MacAddr, network_id: i64) -> Result<i64> {
        let id = self.take_id();
        let maker = self
            .tables
            .oui
            .vendor(&address)
            .unwrap_or_default()
            .to_string();
        let interface = Interface {
            id,
            address,
            network_id,
            maker,
            packet_count: 0,
        };
        let body = interface.to_event(false);

        self.interfaces_by_address.insert(address, interface);
        self.addresses_by_id.insert(id, address);
        self.networks
            .get_mut(&network_id)
            .with_context(|| format!("interface {address} created on missing network {network_id}"))?
            .members
            .insert(id);

        self.emit(body)?;
        Ok(id)
    }

    fn new_ip_address_on_interface(&mut self, address: Ipv4Addr, interface_id: i64) -> Result<()> {
        if !self.addresses_by_id.contains_key(&interface_id) {
            return Err(anyhow!(
                "IP address {address} attached to missing interface {interface_id}"
            ));
        }
        let info = IpAddressInfo {
            id: self.take_id(),
            address,
            attached_to: Attachment::Interface(interface_id),
            packet_count: 0,
            ns_name: self.learned_name(&address),
            asn: None,
            as_name: None,
        };
        let body = info.to_event(false);
        self.ip_addresses.insert(address, info);
        self.emit(body)
    }

    fn new_ip_address_in_cloud(
        &mut self,
        address: Ipv4Addr,
        cloud_id: i64,
        asn: Option<u32>,
        as_name: Option<String>,
    ) -> Result<()> {
        if !self.clouds.contains_key(&cloud_id) {
            return Err(anyhow!(
                "IP address {address} attached to missing cloud {cloud_id}"
            ));
        }
        let info = IpAddressInfo {
            id: self.take_id(),
            address,
            attached_to: Attachment::Cloud(cloud_id),
            packet_count: 0,
            ns_name: self.learned_name(&address),
            asn,
            as_name,
        };
        let body = info.to_event(false);
        self.ip_addresses.insert(address, info);
        self.emit(body)
    }

    fn new_cloud_on_interface(&mut self, interface_id: i64, description: &str) -> Result<i64> {
        if !self.addresses_by_id.contains_key(&interface_id) {
            return Err(anyhow!(
                "cloud attached to missing interface {interface_id}"
            ));
        }
        let id = self.take_id();
        let cloud = Cloud {
            id,
            description: description.to_string(),
            attached_to: Attachment::Interface(interface_id),
            children: BTreeSet::new(),
            packet_count: 0,
        };
        let body = cloud.to_event(false);
        self.clouds.insert(id, cloud);
        self.emit(body)?;
        Ok(id)
    }

    fn new_cloud_in_cloud(&mut self, parent_id: i64, description: &str) -> Result<i64> {
        let id = self.take_id();
        let cloud = Cloud {
            id,
            description: description.to_string(),
            attached_to: Attachment::Cloud(parent_id),
            children: BTreeSet::new(),
            packet_count: 0,
        };
        let body = cloud.to_event(false);
        self.clouds.insert(id, cloud);
        self.clouds
            .get_mut(&parent_id)
            .with_context(|| format!("cloud created in missing parent cloud {parent_id}"))?
            .children
            .insert(id);
        self.emit(body)?;
        Ok(id)
    }

    fn find_or_create_subcloud(&mut self, root_id: i64, description: &str) -> Result<i64> {
        let root = self
            .clouds
            .get(&root_id)
            .with_context(|| format!("missing root cloud {root_id}"))?;
        let existing = root.children.iter().copied().find(|child_id| {
            self.clouds
                .get(child_id)
                .is_some_and(|child| child.description == description)
        });
        match existing {
            Some(id) => Ok(id),
            None => self.new_cloud_in_cloud(root_id, description),
        }
    }

    /// The first learned name for an address, or empty.
    fn learned_name(&self, address: &Ipv4Addr) -> String {
        self.names
            .get(address)
            .and_then(|entries| entries.first())
            .map(|entry| entry.name.clone())
            .unwrap_or_default()
    }

    /// Reassign all interfaces connected on network B to network A, then
    /// delete network B.
    fn merge_networks(&mut self, a_id: i64, b_id: i64) -> Result<()> {
        let members: Vec<i64> = self
            .networks
            .get(&b_id)
            .with_context(|| format!("merging missing network {b_id}"))?
            .members
            .iter()
            .copied()
            .collect();

        for interface_id in members {
            let address = *self
                .addresses_by_id
                .get(&interface_id)
                .with_context(|| format!("network {b_id} lists missing interface {interface_id}"))?;
            let interface = self
                .interfaces_by_address
                .get_mut(&address)
                .with_context(|| format!("no interface for address {address}"))?;
            interface.network_id = a_id;
            let body = interface.to_event(false);
            self.networks
                .get_mut(&a_id)
                .with_context(|| format!("merging into missing network {a_id}"))?
                .members
                .insert(interface_id);
            self.emit(body)?;
        }

        let b_network = self
            .networks
            .get_mut(&b_id)
            .with_context(|| format!("merging missing network {b_id}"))?;
        b_network.members.clear();
        let body = b_network.to_event(true);
        self.emit(body)?;
        self.networks.remove(&b_id);

        Ok(())
    }

    //
    //  Emission.
    //

    fn emit(&mut self, body: EventBody) -> Result<()> {
        let event = Event {
            timestamp: self.now,
            packet: self.packet_count,
            body,
        };
        self.writer
            .write(&event)
            .context("failed writing event stream")?;
        Ok(())
    }

    fn emit_traffic_update(&mut self) -> Result<()> {
        let mut traffic = TrafficEvent::default();
        for mac in &self.recent_interface_traffic {
            if let Some(interface) = self.interfaces_by_address.get(mac) {
                traffic
                    .interface_packet_counts
                    .insert(interface.id, interface.packet_count);
            }
        }
        for cloud_id in &self.recent_cloud_traffic {
            if let Some(cloud) = self.clouds.get(cloud_id) {
                traffic.cloud_packet_counts.insert(cloud.id, cloud.packet_count);
            }
        }
        for address in &self.recent_ip_traffic {
            if let Some(info) = self.ip_addresses.get(address) {
                traffic.ipaddress_packet_counts.insert(info.id, info.packet_count);
            }
        }
        self.emit(EventBody::Traffic(traffic))
    }

    //
    //  Inspection.
    //

    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces_by_address.len()
    }

    pub fn ip_address_count(&self) -> usize {
        self.ip_addresses.len()
    }

    pub fn cloud_count(&self) -> usize {
        self.clouds.len()
    }

    pub fn arp_unknown_mac(&self) -> u64 {
        self.arp_unknown_mac
    }

    pub fn network(&self, id: i64) -> Option<&Network> {
        self.networks.get(&id)
    }

    pub fn interface(&self, address: &MacAddr) -> Option<&Interface> {
        self.interfaces_by_address.get(address)
    }

    pub fn ip_address(&self, address: &Ipv4Addr) -> Option<&IpAddressInfo> {
        self.ip_addresses.get(address)
    }

    pub fn cloud(&self, id: i64) -> Option<&Cloud> {
        self.clouds.get(&id)
    }

    pub fn sink(&self) -> &W {
        self.writer.sink()
    }

    /// Generate a topology report.
    pub fn report(&self, out: &mut dyn io::Write) -> io::Result<()> {
        for network in self.networks.values() {
            writeln!(out, "Network {}", network.id)?;
            for interface_id in &network.members {
                let Some(address) = self.addresses_by_id.get(interface_id) else {
                    continue;
                };
                let Some(interface) = self.interfaces_by_address.get(address) else {
                    continue;
                };
                writeln!(out, "    Interface {}", interface.id)?;
                writeln!(out, "        address:    {}", interface.address)?;
                if !interface.maker.is_empty() {
                    writeln!(out, "        maker:      {}", interface.maker)?;
                }
                writeln!(out, "        packets:    {}", interface.packet_count)?;
            }
        }
        for cloud in self.clouds.values() {
            writeln!(out, "Cloud {} ({})", cloud.id, cloud.description)?;
            match cloud.attached_to {
                Attachment::Interface(id) => writeln!(out, "    interface:  {id}")?,
                Attachment::Cloud(id) => writeln!(out, "    cloud:      {id}")?,
            }
            writeln!(out, "    packets:    {}", cloud.packet_count)?;
        }
        writeln!(out, "{} IP addresses", self.ip_addresses.len())?;
        Ok(())
    }

    /// Verify the model's structural invariants. Used by tests; a failure
    /// here means a dissector or model bug.
    pub fn check_invariants(&self) -> Result<()> {
        for (address, interface) in &self.interfaces_by_address {
            let network = self
                .networks
                .get(&interface.network_id)
                .ok_or_else(|| anyhow!("interface {address} on missing network"))?;
            if !network.members.contains(&interface.id) {
                return Err(anyhow!(
                    "network {} does not list its interface {}",
                    network.id,
                    interface.id
                ));
            }
            if self.addresses_by_id.get(&interface.id) != Some(address) {
                return Err(anyhow!("interface {address} id map out of sync"));
            }
        }

        for network in self.networks.values() {
            for member in &network.members {
                let address = self
                    .addresses_by_id
                    .get(member)
                    .ok_or_else(|| anyhow!("network {} lists unknown member {member}", network.id))?;
                let interface = self
                    .interfaces_by_address
                    .get(address)
                    .ok_or_else(|| anyhow!("member {member} has no interface"))?;
                if interface.network_id != network.id {
                    return Err(anyhow!(
                        "interface {member} claims network {} but is listed by {}",
                        interface.network_id,
                        network.id
                    ));
                }
            }
        }

        for (address, info) in &self.ip_addresses {
            match info.attached_to {
                Attachment::Interface(id) => {
                    if !self.addresses_by_id.contains_key(&id) {
                        return Err(anyhow!("IP {address} attached to missing interface {id}"));
                    }
                }
                Attachment::Cloud(id) => {
                    if !self.clouds.contains_key(&id) {
                        return Err(anyhow!("IP {address} attached to missing cloud {id}"));
                    }
                }
            }
        }

        for cloud in self.clouds.values() {
            //  The ancestor chain must reach an interface without revisiting
            //  a cloud.
            let mut hops = 0;
            let mut current = cloud;
            loop {
                match current.attached_to {
                    Attachment::Interface(id) => {
                        if !self.addresses_by_id.contains_key(&id) {
                            return Err(anyhow!(
                                "cloud {} attached to missing interface {id}",
                                cloud.id
                            ));
                        }
                        break;
                    }
                    Attachment::Cloud(parent_id) => {
                        hops += 1;
                        if hops > self.clouds.len() {
                            return Err(anyhow!("cloud {} ancestor chain cycles", cloud.id));
                        }
                        current = self
                            .clouds
                            .get(&parent_id)
                            .ok_or_else(|| anyhow!("cloud {} has missing parent", cloud.id))?;
                    }
                }
            }
        }

        Ok(())
    }
}
