//! Event stream wire format
//!
//! Every model mutation is published as one `Event` on a byte sink. The
//! stream is a concatenation of frames, each a 4-byte big-endian length
//! followed by that many bytes of JSON payload. Traffic events carry
//! cumulative counters, so a late-joining consumer still receives correct
//! totals.

use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Read, Write};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::MacAddr;

/// Upper bound on a single frame; anything larger is a corrupt stream.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error on event stream: {0}")]
    Io(#[from] io::Error),
    #[error("event stream ends mid-frame")]
    TruncatedFrame,
    #[error("frame length {0} exceeds the {MAX_FRAME_LEN}-byte limit")]
    FrameTooLong(u32),
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Nanoseconds since the epoch, snapshot of the model clock at emission.
    pub timestamp: i64,
    /// Cumulative observed frame count at emission.
    pub packet: i64,
    #[serde(flatten)]
    pub body: EventBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventBody {
    Network(NetworkEvent),
    Interface(InterfaceEvent),
    IpAddress(IpAddressEvent),
    Cloud(CloudEvent),
    Traffic(TrafficEvent),
}

/// The entity an IP address or cloud hangs off. Exactly one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attachment {
    #[serde(rename = "interface_id")]
    Interface(i64),
    #[serde(rename = "cloud_id")]
    Cloud(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEvent {
    pub id: i64,
    pub fini: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceEvent {
    pub id: i64,
    pub fini: bool,
    pub network_id: i64,
    pub address: MacAddr,
    pub maker: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpAddressEvent {
    pub id: i64,
    pub fini: bool,
    pub address: IpAddr,
    pub ns_name: String,
    #[serde(flatten)]
    pub attached_to: Attachment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudEvent {
    pub id: i64,
    pub fini: bool,
    pub description: String,
    #[serde(flatten)]
    pub attached_to: Attachment,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrafficEvent {
    pub interface_packet_counts: BTreeMap<i64, i64>,
    pub cloud_packet_counts: BTreeMap<i64, i64>,
    pub ipaddress_packet_counts: BTreeMap<i64, i64>,
}

/// Serialize one event onto the sink: length prefix, then payload.
pub fn write_event<W: Write>(sink: &mut W, event: &Event) -> Result<(), CodecError> {
    let payload = serde_json::to_vec(event)?;
    let length = payload.len() as u32;
    sink.write_all(&length.to_be_bytes())?;
    sink.write_all(&payload)?;
    Ok(())
}

/// Read one event from the stream. Returns `Ok(None)` on a clean EOF at a
/// frame boundary; a stream ending inside a frame is an error.
pub fn read_event<R: Read>(source: &mut R) -> Result<Option<Event>, CodecError> {
    let mut length_buf = [0u8; 4];
    if !fill_or_eof(source, &mut length_buf)? {
        return Ok(None);
    }

    let length = u32::from_be_bytes(length_buf);
    if length > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLong(length));
    }

    let mut payload = vec![0u8; length as usize];
    source.read_exact(&mut payload).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            CodecError::TruncatedFrame
        } else {
            CodecError::Io(e)
        }
    })?;

    Ok(Some(serde_json::from_slice(&payload)?))
}

/// Fill `buf` completely. Returns false when the stream was already at EOF.
fn fill_or_eof<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<bool, CodecError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(CodecError::TruncatedFrame);
        }
        filled += n;
    }
    Ok(true)
}

/// The single event sink. Writes are sequential and flushed per event so
/// each length prefix and payload reach the reader as one unit.
#[derive(Debug)]
pub struct EventWriter<W: Write> {
    sink: W,
}

impl<W: Write> EventWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn write(&mut self, event: &Event) -> Result<(), CodecError> {
        write_event(&mut self.sink, event)?;
        self.sink.flush()?;
        Ok(())
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
