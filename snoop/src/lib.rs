//! Lanscope passive LAN topology observer
//!
//! Ingests captured Ethernet frames, infers the topology of the observed
//! network (segments, interfaces, IP endpoints, and AS-grouped clouds of
//! off-LAN address space), and publishes every model mutation as a
//! length-framed event on a byte sink.

pub mod capture;
pub mod config;
pub mod decode;
pub mod engine;
pub mod events;
pub mod lookup;
pub mod model;
pub mod session;
pub mod types;

pub use config::Config;
pub use engine::{Snoop, Stats};
