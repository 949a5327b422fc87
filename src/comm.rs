/// Communication layer — outbound byte sink and inbound frame reader.
///
/// The device writes one binary frame per window to a byte sink (the
/// report UART on hardware). A receiver on the other end of the link
/// feeds the byte stream through [`FrameReader`] to recover headers and
/// records without buffering whole frames.

use heapless::Vec;

use crate::board;
use crate::config::{SYNC_BYTE, SYNC_LEN};
use crate::protocol::{
    decode_record, MsgBuffer, ReportMessage, WindowHeader, HEADER_LEN, MAX_MSG_LEN, RECORD_LEN,
    VERSION,
};
use crate::record::ObservationRecord;
use crate::window::WindowSummary;

/// Destination for encoded frames.
///
/// Fire-and-forget: no acknowledgement and no retry. Implementations may
/// block until the bytes are handed to the hardware.
pub trait ByteSink {
    /// Whether the transport is usable. Checked once at startup.
    fn is_ready(&self) -> bool {
        true
    }

    fn write(&mut self, bytes: &[u8]);
}

/// In-memory sink. Bytes past capacity are dropped.
impl<const N: usize> ByteSink for Vec<u8, N> {
    fn write(&mut self, bytes: &[u8]) {
        let room = N - self.len();
        let _ = self.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }
}

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize a ReportMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &ReportMessage<'_>, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

/// NDJSON status line for a drained window, newline included.
pub fn window_status(summary: &WindowSummary, uptime: u32) -> Option<MsgBuffer> {
    let msg = ReportMessage::Window {
        seq: summary.header.sequence,
        raw: summary.header.raw_event_count,
        unique: summary.header.unique_count,
        dropped: summary.dropped,
        uptime,
        board: board::BOARD_NAME,
        version: VERSION,
    };

    let mut buf = MsgBuffer::new();
    buf.resize_default(MAX_MSG_LEN).ok()?;
    let len = serialize_message(&msg, &mut buf)?;
    buf.truncate(len);
    Some(buf)
}

// ── Frame reader ───────────────────────────────────────────────────────

/// Output of [`FrameReader::feed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// A frame header. Exactly `header.unique_count` records follow.
    Header {
        header: WindowHeader,
        /// Windows skipped since the previous header (sequence gap)
        lost: u8,
    },
    Record(ObservationRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    /// Counting consecutive sync bytes
    Sync(usize),
    Header,
    Records { remaining: u16 },
}

/// Byte-at-a-time frame parser.
///
/// Hunts for the four-byte sync pattern, decodes the header, then yields
/// the announced number of records before hunting again. A record with an
/// impossible payload length is treated as corruption and forces a resync.
pub struct FrameReader {
    buf: [u8; RECORD_LEN],
    pos: usize,
    state: ReadState,
    expected_seq: Option<u8>,
}

impl FrameReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; RECORD_LEN],
            pos: 0,
            state: ReadState::Sync(0),
            expected_seq: None,
        }
    }

    /// Feed a byte into the reader. Returns an event when a header or a
    /// record completes.
    pub fn feed(&mut self, byte: u8) -> Option<FrameEvent> {
        match self.state {
            ReadState::Sync(matched) => {
                if byte != SYNC_BYTE {
                    self.state = ReadState::Sync(0);
                    return None;
                }
                self.buf[matched] = byte;
                if matched + 1 == SYNC_LEN {
                    self.pos = matched + 1;
                    self.state = ReadState::Header;
                } else {
                    self.state = ReadState::Sync(matched + 1);
                }
                None
            }
            ReadState::Header => {
                self.buf[self.pos] = byte;
                self.pos += 1;
                if self.pos < HEADER_LEN {
                    return None;
                }
                self.pos = 0;
                let Some(header) = WindowHeader::decode(&self.buf[..HEADER_LEN]) else {
                    self.state = ReadState::Sync(0);
                    return None;
                };
                self.state = if header.unique_count == 0 {
                    ReadState::Sync(0)
                } else {
                    ReadState::Records {
                        remaining: header.unique_count,
                    }
                };
                let lost = self.track_sequence(header.sequence);
                Some(FrameEvent::Header { header, lost })
            }
            ReadState::Records { remaining } => {
                self.buf[self.pos] = byte;
                self.pos += 1;
                if self.pos < RECORD_LEN {
                    return None;
                }
                self.pos = 0;
                match decode_record(&self.buf) {
                    Some(rec) => {
                        self.state = if remaining > 1 {
                            ReadState::Records {
                                remaining: remaining - 1,
                            }
                        } else {
                            ReadState::Sync(0)
                        };
                        Some(FrameEvent::Record(rec))
                    }
                    None => {
                        log::warn!("Corrupt record ({} left in frame), resyncing", remaining);
                        self.state = ReadState::Sync(0);
                        None
                    }
                }
            }
        }
    }

    /// Whether the reader is between frames.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, ReadState::Sync(_))
    }

    fn track_sequence(&mut self, seq: u8) -> u8 {
        let lost = match self.expected_seq {
            Some(expected) => seq.wrapping_sub(expected),
            None => 0,
        };
        if lost > 0 {
            log::warn!("Frame sequence gap: expected {:?}, received {}", self.expected_seq, seq);
        }
        self.expected_seq = Some(seq.wrapping_add(1));
        lost
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        encode_record, format_mac, format_payload, FrameEncoder, HexString, MacString,
    };
    use crate::record::Observation;

    fn record(last: u8, rssi: i8) -> ObservationRecord {
        let mut rec = ObservationRecord::new([0xC4, 0, 0, 0, 0, last]);
        rec.merge(&Observation {
            id: rec.id,
            id_kind: 0,
            event_kind: 0,
            rssi,
            payload: &[0x02, 0x01, 0x06],
        });
        rec
    }

    fn frame(seq: u8, records: &[ObservationRecord]) -> Vec<u8, 512> {
        let header = WindowHeader {
            sequence: seq,
            raw_event_count: records.len() as u16 * 2,
            unique_count: records.len() as u16,
        };
        let mut out = Vec::new();
        FrameEncoder::write_frame(&header, records, &mut out);
        out
    }

    fn feed_all(reader: &mut FrameReader, bytes: &[u8]) -> std::vec::Vec<FrameEvent> {
        bytes.iter().filter_map(|&b| reader.feed(b)).collect()
    }

    // ── ByteSink ────────────────────────────────────────────────────

    #[test]
    fn vec_sink_drops_overflow() {
        let mut sink = Vec::<u8, 4>::new();
        sink.write(&[1, 2, 3]);
        sink.write(&[4, 5, 6]);
        assert_eq!(&sink[..], &[1, 2, 3, 4]);
        assert!(sink.is_ready());
    }

    // ── FrameReader ─────────────────────────────────────────────────

    #[test]
    fn reads_header_then_records() {
        let records = [record(1, -40), record(2, -60)];
        let mut reader = FrameReader::new();
        let events = feed_all(&mut reader, &frame(0, &records));

        assert_eq!(events.len(), 3);
        match events[0] {
            FrameEvent::Header { header, lost } => {
                assert_eq!(header.unique_count, 2);
                assert_eq!(header.raw_event_count, 4);
                assert_eq!(lost, 0);
            }
            _ => panic!("expected header first"),
        }
        assert_eq!(events[1], FrameEvent::Record(records[0]));
        assert_eq!(events[2], FrameEvent::Record(records[1]));
        assert!(reader.is_idle());
    }

    #[test]
    fn skips_leading_noise() {
        let mut stream = Vec::<u8, 600>::new();
        let _ = stream.extend_from_slice(&[0x00, 0x55, 0x55, 0x13, 0xFF]);
        let _ = stream.extend_from_slice(&frame(4, &[record(9, -70)]));

        let mut reader = FrameReader::new();
        let events = feed_all(&mut reader, &stream);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], FrameEvent::Record(r) if r.id[5] == 9));
    }

    #[test]
    fn sequence_byte_equal_to_sync_is_not_confused() {
        let mut reader = FrameReader::new();
        let events = feed_all(&mut reader, &frame(0x55, &[record(1, -50)]));
        match events[0] {
            FrameEvent::Header { header, .. } => assert_eq!(header.sequence, 0x55),
            _ => panic!("expected header"),
        }
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn empty_frame_yields_header_only() {
        let mut reader = FrameReader::new();
        let mut stream = Vec::<u8, 600>::new();
        let _ = stream.extend_from_slice(&frame(0, &[]));
        let _ = stream.extend_from_slice(&frame(1, &[record(3, -30)]));

        let events = feed_all(&mut reader, &stream);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[2], FrameEvent::Record(_)));
    }

    #[test]
    fn detects_lost_windows() {
        let mut reader = FrameReader::new();
        let mut stream = Vec::<u8, 600>::new();
        for seq in [254u8, 255, 2] {
            let _ = stream.extend_from_slice(&frame(seq, &[]));
        }
        let lost: std::vec::Vec<u8> = feed_all(&mut reader, &stream)
            .into_iter()
            .filter_map(|e| match e {
                FrameEvent::Header { lost, .. } => Some(lost),
                _ => None,
            })
            .collect();
        // 254 → 255 consecutive, 255 → 2 skips 0 and 1
        assert_eq!(lost, [0, 0, 2]);
    }

    #[test]
    fn corrupt_record_forces_resync() {
        let rec = record(1, -40);
        let mut bad = encode_record(&rec);
        bad[9] = 200; // impossible payload length

        let header = WindowHeader {
            sequence: 0,
            raw_event_count: 2,
            unique_count: 2,
        };
        let mut stream = Vec::<u8, 600>::new();
        let _ = stream.extend_from_slice(&header.encode());
        let _ = stream.extend_from_slice(&bad);
        let _ = stream.extend_from_slice(&frame(1, &[rec]));

        let mut reader = FrameReader::new();
        let events = feed_all(&mut reader, &stream);
        // header(0), [bad dropped → resync], header(1), record
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], FrameEvent::Header { header, .. } if header.sequence == 1));
        assert_eq!(events[2], FrameEvent::Record(rec));
    }

    // ── NDJSON ──────────────────────────────────────────────────────

    #[test]
    fn serialize_message_appends_newline() {
        let rec = record(1, -40);
        let mut mac = MacString::new();
        format_mac(&rec.id, &mut mac);
        let mut data = HexString::new();
        format_payload(&rec, &mut data);
        let msg = ReportMessage::Record {
            seq: 0,
            mac: &mac,
            addr_type: 0,
            adv_type: 0,
            rssi: -40,
            n: 1,
            data: &data,
        };

        let mut buf = [0u8; 256];
        let len = serialize_message(&msg, &mut buf).unwrap();
        assert_eq!(buf[len - 1], b'\n');
        assert_eq!(buf[0], b'{');
    }

    #[test]
    fn window_status_line() {
        let summary = WindowSummary {
            header: WindowHeader {
                sequence: 12,
                raw_event_count: 5,
                unique_count: 3,
            },
            dropped: 1,
        };
        let line = window_status(&summary, 84).unwrap();
        let json = core::str::from_utf8(&line).unwrap();
        assert!(json.starts_with(r#"{"type":"window""#));
        assert!(json.contains(r#""seq":12"#));
        assert!(json.contains(r#""raw":5"#));
        assert!(json.contains(r#""unique":3"#));
        assert!(json.contains(r#""dropped":1"#));
        assert!(json.contains(r#""uptime":84"#));
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn serialize_message_fails_on_tiny_buffer() {
        let msg = ReportMessage::Window {
            seq: 0,
            raw: 0,
            unique: 0,
            dropped: 0,
            uptime: 0,
            board: "unknown",
            version: "0.1.0",
        };
        let mut buf = [0u8; 8];
        assert!(serialize_message(&msg, &mut buf).is_none());
    }
}
