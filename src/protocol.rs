/// Wire formats: the binary window frame and NDJSON report messages.
///
/// The frame is what goes out over the report UART once per window:
///
/// ```text
/// WindowHeader (9 bytes)
///   0..4   sync             0x55 0x55 0x55 0x55
///   4      sequence         u8, wraps
///   5..7   raw_event_count  u16 LE
///   7..9   unique_count     u16 LE
/// ObservationRecord × unique_count (42 bytes each)
///   0..6   id
///   6      id_kind
///   7      event_kind
///   8      rssi             i8
///   9      payload_len      0..=31
///   10..41 payload          zero-padded
///   41     count
/// ```
///
/// No checksum and no length prefix on the record section; receivers use
/// `unique_count`. Encoding goes through explicit byte offsets so the
/// in-memory layout of [`ObservationRecord`] never leaks onto the wire.
///
/// NDJSON messages use `heapless` types for no_std/no-alloc operation.
use heapless::{String, Vec};
use serde::Serialize;

use crate::comm::ByteSink;
use crate::config::{IDENTIFIER_LEN, PAYLOAD_LEN, SYNC_BYTE, SYNC_LEN};
use crate::record::ObservationRecord;

// ── Binary frame ──────────────────────────────────────────────────────

/// Encoded size of a [`WindowHeader`]
pub const HEADER_LEN: usize = 9;

/// Encoded size of an [`ObservationRecord`]
pub const RECORD_LEN: usize = 42;

/// Frame boundary marker
pub const SYNC_PATTERN: [u8; SYNC_LEN] = [SYNC_BYTE; SYNC_LEN];

const SEQ_OFFSET: usize = 4;
const RAW_OFFSET: usize = 5;
const UNIQUE_OFFSET: usize = 7;

const ID_KIND_OFFSET: usize = 6;
const EVENT_KIND_OFFSET: usize = 7;
const RSSI_OFFSET: usize = 8;
const PAYLOAD_LEN_OFFSET: usize = 9;
const PAYLOAD_OFFSET: usize = 10;
const COUNT_OFFSET: usize = 41;

/// Per-window frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowHeader {
    pub sequence: u8,
    /// Every observation received while the window was active,
    /// duplicates and table-full drops included
    pub raw_event_count: u16,
    /// Records that follow the header
    pub unique_count: u16,
}

impl WindowHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[..SYNC_LEN].copy_from_slice(&SYNC_PATTERN);
        buf[SEQ_OFFSET] = self.sequence;
        buf[RAW_OFFSET..RAW_OFFSET + 2].copy_from_slice(&self.raw_event_count.to_le_bytes());
        buf[UNIQUE_OFFSET..UNIQUE_OFFSET + 2].copy_from_slice(&self.unique_count.to_le_bytes());
        buf
    }

    /// Decode a header. Returns `None` if `bytes` is short or the sync
    /// pattern is missing.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..HEADER_LEN)?;
        if bytes[..SYNC_LEN] != SYNC_PATTERN {
            return None;
        }
        Some(Self {
            sequence: bytes[SEQ_OFFSET],
            raw_event_count: u16::from_le_bytes([bytes[RAW_OFFSET], bytes[RAW_OFFSET + 1]]),
            unique_count: u16::from_le_bytes([bytes[UNIQUE_OFFSET], bytes[UNIQUE_OFFSET + 1]]),
        })
    }
}

pub fn encode_record(rec: &ObservationRecord) -> [u8; RECORD_LEN] {
    let mut buf = [0u8; RECORD_LEN];
    buf[..IDENTIFIER_LEN].copy_from_slice(&rec.id);
    buf[ID_KIND_OFFSET] = rec.id_kind;
    buf[EVENT_KIND_OFFSET] = rec.event_kind;
    buf[RSSI_OFFSET] = rec.rssi as u8;
    buf[PAYLOAD_LEN_OFFSET] = rec.payload_len;
    buf[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN].copy_from_slice(&rec.payload);
    buf[COUNT_OFFSET] = rec.count;
    buf
}

/// Decode one record. Returns `None` if `bytes` is short or
/// `payload_len` is out of range.
pub fn decode_record(bytes: &[u8]) -> Option<ObservationRecord> {
    let bytes = bytes.get(..RECORD_LEN)?;
    let payload_len = bytes[PAYLOAD_LEN_OFFSET];
    if payload_len as usize > PAYLOAD_LEN {
        return None;
    }

    let mut rec = ObservationRecord::new(bytes[..IDENTIFIER_LEN].try_into().ok()?);
    rec.id_kind = bytes[ID_KIND_OFFSET];
    rec.event_kind = bytes[EVENT_KIND_OFFSET];
    rec.rssi = bytes[RSSI_OFFSET] as i8;
    rec.payload_len = payload_len;
    rec.payload
        .copy_from_slice(&bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN]);
    rec.count = bytes[COUNT_OFFSET];
    Some(rec)
}

/// Serializes window frames onto a [`ByteSink`].
pub struct FrameEncoder;

impl FrameEncoder {
    pub fn write_header<S: ByteSink + ?Sized>(header: &WindowHeader, sink: &mut S) {
        sink.write(&header.encode());
    }

    pub fn write_record<S: ByteSink + ?Sized>(rec: &ObservationRecord, sink: &mut S) {
        sink.write(&encode_record(rec));
    }

    /// Header followed by every record, in iteration order.
    pub fn write_frame<'r, S, I>(header: &WindowHeader, records: I, sink: &mut S)
    where
        S: ByteSink + ?Sized,
        I: IntoIterator<Item = &'r ObservationRecord>,
    {
        Self::write_header(header, sink);
        for rec in records {
            Self::write_record(rec, sink);
        }
    }
}

// ── NDJSON messages ───────────────────────────────────────────────────

/// Maximum length for MAC address strings ("AA:BB:CC:DD:EE:FF")
pub type MacString = String<18>;

/// Hex rendering of a full payload buffer
pub type HexString = String<{ PAYLOAD_LEN * 2 }>;

/// Messages emitted as newline-delimited JSON, either by the device
/// (window status) or by a receiver re-publishing decoded records.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ReportMessage<'a> {
    /// One line per drained window
    #[serde(rename = "window")]
    Window {
        seq: u8,
        raw: u16,
        unique: u16,
        /// Observations dropped on a full table
        dropped: u16,
        /// Uptime in seconds
        uptime: u32,
        board: &'static str,
        version: &'static str,
    },
    /// A decoded observation record
    #[serde(rename = "adv")]
    Record {
        /// Window sequence the record arrived in
        seq: u8,
        /// Identifier bytes in wire order, see [`format_mac`]
        mac: &'a MacString,
        addr_type: u8,
        adv_type: u8,
        rssi: i8,
        /// Observation count within the window
        n: u8,
        data: &'a HexString,
    },
}

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 256;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

/// Format a 6-byte address as "AA:BB:CC:DD:EE:FF" in wire order.
///
/// Bytes are printed as they appear in the record (the radio's
/// little-endian order), the same strings existing collectors store.
pub fn format_mac(id: &[u8; IDENTIFIER_LEN], buf: &mut MacString) {
    use core::fmt::Write;
    let _ = write!(
        buf,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        id[0], id[1], id[2], id[3], id[4], id[5]
    );
}

/// Lowercase hex of the valid payload bytes.
pub fn format_payload(rec: &ObservationRecord, buf: &mut HexString) {
    use core::fmt::Write;
    for b in rec.payload() {
        let _ = write!(buf, "{:02x}", b);
    }
}
