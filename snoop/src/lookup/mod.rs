//! Startup-loaded lookup tables
//!
//! All three tables are loaded once before capture starts and are immutable
//! afterwards.

pub mod oui;
pub mod prefixes;
pub mod asns;

pub use oui::OuiTable;
pub use prefixes::PrefixTable;
pub use asns::AsnTable;

/// The full set of lookup tables the model consults.
#[derive(Debug, Default)]
pub struct Tables {
    pub oui: OuiTable,
    pub prefixes: PrefixTable,
    pub asns: AsnTable,
}
