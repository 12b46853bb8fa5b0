//! Frame dissection module
//!
//! Pure parsers for the protocol chain Ethernet -> ARP / IPv4 -> UDP -> DNS.
//! Parsers never retain their input and never index out of bounds; anything
//! short lands in the `Truncated` bucket.

pub mod ethernet;
pub mod arp;
pub mod ipv4;
pub mod udp;
pub mod dns;

use std::fmt;

/// Per-frame parse outcome, used as a statistics bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    Truncated,
    Error,
    Disinterest,
    EthertypeBad,
    Arp,
    ArpDisinterest,
    ArpError,
    Ipv4Fragment,
    Ipv4Bad,
    Ipv4Protocol,
    L4Protocol,
    Udp,
    Dns,
    DnsError,
}

impl Disposition {
    pub const COUNT: usize = 14;

    pub const ALL: [Disposition; Self::COUNT] = [
        Disposition::Truncated,
        Disposition::Error,
        Disposition::Disinterest,
        Disposition::EthertypeBad,
        Disposition::Arp,
        Disposition::ArpDisinterest,
        Disposition::ArpError,
        Disposition::Ipv4Fragment,
        Disposition::Ipv4Bad,
        Disposition::Ipv4Protocol,
        Disposition::L4Protocol,
        Disposition::Udp,
        Disposition::Dns,
        Disposition::DnsError,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Disposition::Truncated => "TRUNCATED",
            Disposition::Error => "ERROR",
            Disposition::Disinterest => "DISINTEREST",
            Disposition::EthertypeBad => "ETHERTYPE_BAD",
            Disposition::Arp => "ARP",
            Disposition::ArpDisinterest => "ARP_DISINTEREST",
            Disposition::ArpError => "ARP_ERROR",
            Disposition::Ipv4Fragment => "IPv4_FRAGMENT",
            Disposition::Ipv4Bad => "IPv4_BAD",
            Disposition::Ipv4Protocol => "IPv4_PROTOCOL",
            Disposition::L4Protocol => "L4_PROTOCOL",
            Disposition::Udp => "UDP",
            Disposition::Dns => "DNS",
            Disposition::DnsError => "DNS_ERROR",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_indexes_are_dense() {
        for (i, d) in Disposition::ALL.iter().enumerate() {
            assert_eq!(d.index(), i);
        }
    }

    #[test]
    fn test_disposition_names() {
        assert_eq!(Disposition::Truncated.to_string(), "TRUNCATED");
        assert_eq!(Disposition::Ipv4Fragment.to_string(), "IPv4_FRAGMENT");
        assert_eq!(Disposition::DnsError.to_string(), "DNS_ERROR");
    }
}
