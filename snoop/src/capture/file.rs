//! Offline capture from a legacy pcap savefile

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, bail, Context, Result};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, Linktype, PcapBlockOwned, PcapError};
use tracing::info;

use crate::engine::Snoop;

const BUFFER_CAPACITY: usize = 65536;

/// Replay a savefile through the engine with the file's own timestamps.
pub fn run<W: Write>(path: &Path, snoop: &mut Snoop<W>, running: &AtomicBool) -> Result<()> {
    let file = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;
    let mut reader = LegacyPcapReader::new(BUFFER_CAPACITY, file)
        .map_err(|e| anyhow!("{} is not a pcap savefile: {:?}", path.display(), e))?;

    info!("Replaying pcap savefile {}", path.display());

    let mut frames = 0u64;
    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match reader.next() {
            Ok((offset, block)) => {
                match block {
                    PcapBlockOwned::LegacyHeader(header) => {
                        //  Only Ethernet captures are understood.
                        if header.network != Linktype::ETHERNET {
                            bail!("unexpected link type {:?}", header.network);
                        }
                    }
                    PcapBlockOwned::Legacy(record) => {
                        let timestamp = record.ts_sec as i64 * 1_000_000_000
                            + record.ts_usec as i64 * 1_000;
                        snoop.ingest(timestamp, Some(record.data))?;
                        frames += 1;
                    }
                    PcapBlockOwned::NG(_) => bail!("pcapng input is not supported"),
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| anyhow!("failed refilling pcap buffer: {:?}", e))?;
            }
            Err(e) => bail!("failed reading pcap savefile: {:?}", e),
        }
    }

    info!("Replayed {} frames from {}", frames, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::Tables;
    use crate::model::ModelOptions;

    /// Minimal legacy pcap bytes: global header plus one Ethernet frame.
    fn savefile(linktype: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes()); // magic
        out.extend_from_slice(&2u16.to_le_bytes()); // major
        out.extend_from_slice(&4u16.to_le_bytes()); // minor
        out.extend_from_slice(&0i32.to_le_bytes()); // thiszone
        out.extend_from_slice(&0u32.to_le_bytes()); // sigfigs
        out.extend_from_slice(&65535u32.to_le_bytes()); // snaplen
        out.extend_from_slice(&linktype.to_le_bytes());

        let mut frame = Vec::new();
        frame.extend_from_slice(&[0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x02]); // dst
        frame.extend_from_slice(&[0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x01]); // src
        frame.extend_from_slice(&[0x08, 0x06]); // ARP, goes no further

        out.extend_from_slice(&1u32.to_le_bytes()); // ts_sec
        out.extend_from_slice(&0u32.to_le_bytes()); // ts_usec
        out.extend_from_slice(&(frame.len() as u32).to_le_bytes()); // caplen
        out.extend_from_slice(&(frame.len() as u32).to_le_bytes()); // origlen
        out.extend_from_slice(&frame);
        out
    }

    fn write_temp(bytes: &[u8], name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_replay_counts_frames() {
        let path = write_temp(&savefile(1), "lanscope-replay-test.pcap");
        let mut snoop = Snoop::new(Tables::default(), ModelOptions::default(), Vec::new());
        let running = AtomicBool::new(true);

        run(&path, &mut snoop, &running).unwrap();
        assert_eq!(snoop.stats().observed, 1);
        assert_eq!(snoop.model().interface_count(), 2);
    }

    #[test]
    fn test_non_ethernet_link_type_fails() {
        let path = write_temp(&savefile(101), "lanscope-linktype-test.pcap");
        let mut snoop = Snoop::new(Tables::default(), ModelOptions::default(), Vec::new());
        let running = AtomicBool::new(true);

        assert!(run(&path, &mut snoop, &running).is_err());
    }
}
