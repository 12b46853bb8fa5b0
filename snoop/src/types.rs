//! Address types shared across the dissectors, session table, and model.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// MAC address (6 bytes, network byte order)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Create from a slice of exactly 6 bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        slice.try_into().ok().map(Self)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Check if this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    /// Group bit: the low bit of the first octet marks multicast (and
    /// therefore broadcast) addresses.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// The registry prefix (top 24 bits), the key into the OUI table.
    pub fn oui_bytes(&self) -> [u8; 3] {
        let [a, b, c, ..] = self.0;
        [a, b, c]
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MacAddr").field(&self.to_string()).finish()
    }
}

/// Error parsing a textual MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddrParseError;

impl fmt::Display for MacAddrParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected six colon-separated hex octets")
    }
}

impl std::error::Error for MacAddrParseError {}

impl FromStr for MacAddr {
    type Err = MacAddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut fields = s.split(':');
        for octet in &mut octets {
            let field = fields.next().ok_or(MacAddrParseError)?;
            if field.len() != 2 {
                return Err(MacAddrParseError);
            }
            *octet = u8::from_str_radix(field, 16).map_err(|_| MacAddrParseError)?;
        }
        if fields.next().is_some() {
            return Err(MacAddrParseError);
        }
        Ok(Self(octets))
    }
}

//  On the wire events carry the textual form, so serde rides on
//  Display/FromStr.

impl Serialize for MacAddr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One side of a UDP flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SockAddr {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl SockAddr {
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }
}

impl fmt::Display for SockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Direction-agnostic four-tuple. By construction `a <= b`, so both
/// directions of a flow hash to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionKey {
    pub a: SockAddr,
    pub b: SockAddr,
}

impl SessionKey {
    pub fn new(x: SockAddr, y: SockAddr) -> Self {
        if x < y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_addr() {
        let mac = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(mac.to_string(), "00:11:22:33:44:55");
        assert_eq!(mac.oui_bytes(), [0x00, 0x11, 0x22]);
        assert!(!mac.is_broadcast());
        assert!(!mac.is_multicast());

        let broadcast = MacAddr::new([0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
        assert!(broadcast.is_broadcast());
        assert!(broadcast.is_multicast());

        let multicast = MacAddr::new([0x01, 0x00, 0x5e, 0x00, 0x00, 0x01]);
        assert!(!multicast.is_broadcast());
        assert!(multicast.is_multicast());
    }

    #[test]
    fn test_mac_addr_from_slice() {
        assert!(MacAddr::from_slice(&[1, 2, 3, 4, 5]).is_none());
        assert!(MacAddr::from_slice(&[1, 2, 3, 4, 5, 6, 7]).is_none());
        let mac = MacAddr::from_slice(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(mac.octets(), [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_mac_addr_round_trips_through_text() {
        let mac = MacAddr::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x2a]);
        let parsed: MacAddr = mac.to_string().parse().unwrap();
        assert_eq!(parsed, mac);

        assert!("de:ad:be:ef:00".parse::<MacAddr>().is_err());
        assert!("de:ad:be:ef:00:2a:ff".parse::<MacAddr>().is_err());
        assert!("de:ad:be:ef:00:2".parse::<MacAddr>().is_err());
        assert!("de:ad:be:ef:00:zz".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_mac_addr_serialization() {
        let mac = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"00:11:22:33:44:55\"");

        let parsed: MacAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, mac);
    }

    #[test]
    fn test_session_key_canonical() {
        let low = SockAddr::new(Ipv4Addr::new(10, 0, 0, 1), 40000);
        let high = SockAddr::new(Ipv4Addr::new(10, 0, 0, 2), 53);

        let forward = SessionKey::new(low, high);
        let reverse = SessionKey::new(high, low);
        assert_eq!(forward, reverse);
        assert_eq!(forward.a, low);
        assert_eq!(forward.b, high);
    }

    #[test]
    fn test_session_key_port_ordering() {
        // Same address, ports decide the ordering.
        let x = SockAddr::new(Ipv4Addr::new(10, 0, 0, 1), 53);
        let y = SockAddr::new(Ipv4Addr::new(10, 0, 0, 1), 40000);

        let key = SessionKey::new(y, x);
        assert_eq!(key.a.port, 53);
        assert_eq!(key.b.port, 40000);
    }
}
