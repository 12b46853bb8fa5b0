//! ASN -> organization name table
//!
//! Loaded from a file of lines like `   13335 CLOUDFLARENET, US`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AsnError {
    #[error("unable to read ASN file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected '<ASN> <organization name>'")]
    Parse { line: usize },
    #[error("line {line}: reserved ASN {asn}")]
    ReservedAsn { line: usize, asn: u32 },
}

#[derive(Debug, Default)]
pub struct AsnTable {
    names: HashMap<u32, String>,
}

impl AsnTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AsnError> {
        let file = File::open(path.as_ref())?;
        Self::parse(BufReader::new(file))
    }

    pub fn parse<R: BufRead>(reader: R) -> Result<Self, AsnError> {
        let mut names = HashMap::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let lineno = index + 1;
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                continue;
            }

            let (asn_s, name) = trimmed
                .split_once(char::is_whitespace)
                .ok_or(AsnError::Parse { line: lineno })?;
            let asn: u32 = asn_s
                .parse()
                .map_err(|_| AsnError::Parse { line: lineno })?;
            if asn == 0 || asn == 65535 {
                return Err(AsnError::ReservedAsn { line: lineno, asn });
            }

            names.insert(asn, name.trim().to_string());
        }

        Ok(Self { names })
    }

    pub fn name(&self, asn: u32) -> Option<&str> {
        self.names.get(&asn).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
