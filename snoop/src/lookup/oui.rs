//! OUI (MAC prefix -> vendor) table
//!
//! Loaded from the IEEE registry CSV (http://standards-oui.ieee.org/oui/oui.csv).
//! Column layout: registry, 6-hex-digit assignment, organization name
//! (optionally double-quoted, with `""` for an embedded quote), then columns
//! we discard.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use crate::types::MacAddr;

#[derive(Debug, Error)]
pub enum OuiError {
    #[error("unable to read OUI file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected a comma after the {field} field")]
    MissingDelimiter { line: usize, field: &'static str },
    #[error("line {line}: expected a 6-hex-digit OUI assignment")]
    BadAssignment { line: usize },
    #[error("line {line}: unterminated quote in organization name")]
    UnterminatedQuote { line: usize },
}

/// Maps 24-bit MAC prefixes to organization names.
#[derive(Debug, Default)]
pub struct OuiTable {
    vendors: HashMap<[u8; 3], String>,
}

impl OuiTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, OuiError> {
        let file = File::open(path.as_ref())?;
        Self::parse(BufReader::new(file))
    }

    /// Parse the CSV from any buffered reader. The first line is a header
    /// row and is discarded.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, OuiError> {
        let mut vendors = HashMap::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let lineno = index + 1;
            if lineno == 1 || line.is_empty() {
                continue;
            }

            // Column 1: registry kind, discarded.
            let (_, rest) = line
                .split_once(',')
                .ok_or(OuiError::MissingDelimiter { line: lineno, field: "registry" })?;

            // Column 2: the OUI assignment.
            let (assignment, rest) = rest
                .split_once(',')
                .ok_or(OuiError::MissingDelimiter { line: lineno, field: "assignment" })?;
            let oui = parse_assignment(assignment)
                .ok_or(OuiError::BadAssignment { line: lineno })?;

            // Column 3: the organization name, optionally quoted.
            let name = parse_name(rest).ok_or(OuiError::UnterminatedQuote { line: lineno })?;

            vendors.insert(oui, name);
        }

        Ok(Self { vendors })
    }

    pub fn vendor(&self, mac: &MacAddr) -> Option<&str> {
        self.vendors.get(&mac.oui_bytes()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}

fn parse_assignment(field: &str) -> Option<[u8; 3]> {
    if field.len() != 6 {
        return None;
    }
    let mut oui = [0u8; 3];
    for (i, byte) in oui.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&field[2 * i..2 * i + 2], 16).ok()?;
    }
    Some(oui)
}

/// Extract the organization-name column. Returns `None` on an unterminated
/// quoted name.
fn parse_name(rest: &str) -> Option<String> {
    if let Some(quoted) = rest.strip_prefix('"') {
        let mut name = String::new();
        let mut chars = quoted.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    name.push('"');
                } else {
                    return Some(name);
                }
            } else {
                name.push(c);
            }
        }
        None
    } else {
        let name = match rest.split_once(',') {
            Some((name, _)) => name,
            None => rest,
        };
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
Registry,Assignment,Organization Name,Organization Address
MA-L,AAAAAA,Example Corp,1 Example Way
MA-L,286ED4,\"HUAWEI TECHNOLOGIES CO.,LTD\",D1 Huawei Base
MA-L,00005E,\"Quotes \"\"R\"\" Us\",Somewhere
";

    #[test]
    fn test_parse_table() {
        let table = OuiTable::parse(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(table.len(), 3);

        let mac = MacAddr::new([0xaa, 0xaa, 0xaa, 0x00, 0x00, 0x01]);
        assert_eq!(table.vendor(&mac), Some("Example Corp"));

        let mac = MacAddr::new([0x28, 0x6e, 0xd4, 0x12, 0x34, 0x56]);
        assert_eq!(table.vendor(&mac), Some("HUAWEI TECHNOLOGIES CO.,LTD"));

        let mac = MacAddr::new([0x00, 0x00, 0x5e, 0x00, 0x00, 0x01]);
        assert_eq!(table.vendor(&mac), Some("Quotes \"R\" Us"));
    }

    #[test]
    fn test_unknown_prefix() {
        let table = OuiTable::parse(Cursor::new(SAMPLE)).unwrap();
        let mac = MacAddr::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x00]);
        assert_eq!(table.vendor(&mac), None);
    }

    #[test]
    fn test_missing_delimiter() {
        let err = OuiTable::parse(Cursor::new("header\nMA-L AAAAAA nope")).unwrap_err();
        assert!(matches!(err, OuiError::MissingDelimiter { line: 2, field: "registry" }));
    }

    #[test]
    fn test_bad_assignment() {
        let err = OuiTable::parse(Cursor::new("header\nMA-L,XYZ,Example")).unwrap_err();
        assert!(matches!(err, OuiError::BadAssignment { line: 2 }));
    }

    #[test]
    fn test_unterminated_quote() {
        let err = OuiTable::parse(Cursor::new("header\nMA-L,AAAAAA,\"Example")).unwrap_err();
        assert!(matches!(err, OuiError::UnterminatedQuote { line: 2 }));
    }

    #[test]
    fn test_header_only() {
        let table = OuiTable::parse(Cursor::new("Registry,Assignment,Name\n")).unwrap();
        assert!(table.is_empty());
    }
}
