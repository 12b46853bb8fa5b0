//! IPv4 header parsing

use std::net::Ipv4Addr;

pub const MIN_HEADER_LEN: usize = 20;

/// IP protocol numbers we dispatch on
pub const PROTO_UDP: u8 = 17;

/// Parsed IPv4 header
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Header {
    pub header_length: usize,
    pub total_length: u16,
    pub protocol: u8,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

#[derive(Debug)]
pub enum Ipv4Outcome<'a> {
    /// A whole, unfragmented datagram: header plus its L4 payload, already
    /// trimmed to `total_length` (capture padding removed).
    Datagram(Ipv4Header, &'a [u8]),
    Fragment,
    Bad,
    Truncated,
}

/// Parse an IPv4 header.
///
/// `total_length` is IP header + IP payload. It may be less than the captured
/// length due to link padding, or more than it due to capture truncation.
pub fn parse(data: &[u8]) -> Ipv4Outcome<'_> {
    if data.len() < MIN_HEADER_LEN {
        return Ipv4Outcome::Truncated;
    }

    let flags_fragment = u16::from_be_bytes([data[6], data[7]]);
    let more_fragments = flags_fragment & 0x2000 != 0;
    let fragment_offset = flags_fragment & 0x1fff;
    if fragment_offset != 0 || more_fragments {
        return Ipv4Outcome::Fragment;
    }

    let version = data[0] >> 4;
    if version != 4 {
        return Ipv4Outcome::Bad;
    }

    let total_length = u16::from_be_bytes([data[2], data[3]]);
    let adjusted_length = if (total_length as usize) < data.len() {
        total_length as usize
    } else if (total_length as usize) > data.len() {
        return Ipv4Outcome::Truncated;
    } else {
        data.len()
    };

    let header_length = 4 * (data[0] & 0x0f) as usize;
    if header_length < MIN_HEADER_LEN || header_length > adjusted_length {
        return Ipv4Outcome::Truncated;
    }

    let protocol = data[9];
    let src = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
    let dst = Ipv4Addr::new(data[16], data[17], data[18], data[19]);

    let header = Ipv4Header {
        header_length,
        total_length,
        protocol,
        src,
        dst,
    };
    Ipv4Outcome::Datagram(header, &data[header_length..adjusted_length])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(total_length: u16, protocol: u8) -> Vec<u8> {
        let mut data = vec![
            0x45, 0x00, // Version + IHL, DSCP + ECN
            0x00, 0x00, // Total length (patched below)
            0x00, 0x01, // Identification
            0x00, 0x00, // Flags + Fragment offset
            0x40, 0x00, // TTL (64) + Protocol (patched below)
            0x00, 0x00, // Header checksum
            0x0a, 0x00, 0x00, 0x01, // Source: 10.0.0.1
            0x0a, 0x00, 0x00, 0x02, // Destination: 10.0.0.2
        ];
        data[2..4].copy_from_slice(&total_length.to_be_bytes());
        data[9] = protocol;
        data
    }

    #[test]
    fn test_parse_ipv4_header() {
        let mut data = header(24, PROTO_UDP);
        data.extend_from_slice(&[1, 2, 3, 4]);

        let (hdr, payload) = match parse(&data) {
            Ipv4Outcome::Datagram(h, p) => (h, p),
            other => panic!("expected Datagram, got {:?}", other),
        };
        assert_eq!(hdr.header_length, 20);
        assert_eq!(hdr.protocol, PROTO_UDP);
        assert_eq!(hdr.src.to_string(), "10.0.0.1");
        assert_eq!(hdr.dst.to_string(), "10.0.0.2");
        assert_eq!(payload, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_padding_is_trimmed() {
        // 24-byte datagram inside a 60-byte captured frame.
        let mut data = header(24, PROTO_UDP);
        data.extend_from_slice(&[1, 2, 3, 4]);
        data.resize(60, 0);

        match parse(&data) {
            Ipv4Outcome::Datagram(_, payload) => assert_eq!(payload, &[1, 2, 3, 4]),
            other => panic!("expected Datagram, got {:?}", other),
        }
    }

    #[test]
    fn test_total_length_beyond_capture_is_truncated() {
        let data = header(200, PROTO_UDP);
        assert!(matches!(parse(&data), Ipv4Outcome::Truncated));
    }

    #[test]
    fn test_short_header_is_truncated() {
        let data = header(20, PROTO_UDP);
        assert!(matches!(parse(&data[..19]), Ipv4Outcome::Truncated));
    }

    #[test]
    fn test_fragments_are_skipped() {
        // MF set
        let mut data = header(20, PROTO_UDP);
        data[6] = 0x20;
        assert!(matches!(parse(&data), Ipv4Outcome::Fragment));

        // Nonzero fragment offset
        let mut data = header(20, PROTO_UDP);
        data[7] = 0x10;
        assert!(matches!(parse(&data), Ipv4Outcome::Fragment));
    }

    #[test]
    fn test_invalid_version() {
        let mut data = header(20, PROTO_UDP);
        data[0] = 0x65; // Version 6
        assert!(matches!(parse(&data), Ipv4Outcome::Bad));
    }

    #[test]
    fn test_bad_ihl_is_truncated() {
        let mut data = header(20, PROTO_UDP);
        data[0] = 0x4f; // IHL = 15 -> 60-byte header inside a 20-byte capture
        assert!(matches!(parse(&data), Ipv4Outcome::Truncated));
    }
}
