//! Ethernet frame parsing

use crate::types::MacAddr;

// EtherType constants
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// Minimum Ethernet frame size (without preamble/FCS)
pub const HEADER_LEN: usize = 14;

/// Parsed Ethernet header
#[derive(Debug, Clone, Copy)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

/// Parse an Ethernet header, returning the header and the payload slice.
/// Returns `None` when the frame is shorter than 14 bytes.
pub fn parse(data: &[u8]) -> Option<(EthernetHeader, &[u8])> {
    if data.len() < HEADER_LEN {
        return None;
    }

    let dst = MacAddr::from_slice(&data[0..6])?;
    let src = MacAddr::from_slice(&data[6..12])?;
    let ethertype = u16::from_be_bytes([data[12], data[13]]);

    Some((EthernetHeader { dst, src, ethertype }, &data[HEADER_LEN..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ethernet_header() {
        // dst=ff:ff:ff:ff:ff:ff, src=00:11:22:33:44:55, ethertype=0x0800 (IPv4)
        let data = vec![
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // dst MAC (broadcast)
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src MAC
            0x08, 0x00,                         // EtherType (IPv4)
            0xde, 0xad,                         // payload
        ];

        let (header, payload) = parse(&data).unwrap();

        assert!(header.dst.is_broadcast());
        assert_eq!(header.src.to_string(), "00:11:22:33:44:55");
        assert_eq!(header.ethertype, ETHERTYPE_IPV4);
        assert_eq!(payload, &[0xde, 0xad]);
    }

    #[test]
    fn test_parse_arp_ethertype() {
        let mut data = vec![0u8; 14];
        data[12] = 0x08;
        data[13] = 0x06;

        let (header, payload) = parse(&data).unwrap();
        assert_eq!(header.ethertype, ETHERTYPE_ARP);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_frame_too_short() {
        let data = vec![0xff, 0xff, 0xff]; // Only 3 bytes
        assert!(parse(&data).is_none());
        assert!(parse(&[0u8; 13]).is_none());
    }
}
