/// In-memory observation types.
///
/// [`Observation`] is what the scanning stack hands to the capture path;
/// [`ObservationRecord`] is the per-identifier aggregate held in the table.
/// Neither type is the wire format; see `protocol` for that.
use crate::config::{IDENTIFIER_LEN, PAYLOAD_LEN};

/// One advertisement report as delivered by the scanner.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    /// Advertiser address, in the byte order the radio stack reports it
    pub id: [u8; IDENTIFIER_LEN],
    /// Address type (public, random, ...)
    pub id_kind: u8,
    /// Advertising PDU / event type
    pub event_kind: u8,
    pub rssi: i8,
    /// Raw AD structures. Anything beyond [`PAYLOAD_LEN`] is truncated.
    pub payload: &'a [u8],
}

/// Freshest state for one identifier within the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationRecord {
    pub id: [u8; IDENTIFIER_LEN],
    pub id_kind: u8,
    pub event_kind: u8,
    pub rssi: i8,
    /// Valid bytes in `payload` (0..=31)
    pub payload_len: u8,
    /// Zero beyond `payload_len`
    pub payload: [u8; PAYLOAD_LEN],
    /// Observations merged this window. Saturates at 255.
    pub count: u8,
}

impl ObservationRecord {
    /// A zeroed record, used to fill unoccupied slots.
    pub const EMPTY: Self = Self::new([0; IDENTIFIER_LEN]);

    /// Fresh record for `id` with no observations merged yet.
    pub const fn new(id: [u8; IDENTIFIER_LEN]) -> Self {
        Self {
            id,
            id_kind: 0,
            event_kind: 0,
            rssi: 0,
            payload_len: 0,
            payload: [0; PAYLOAD_LEN],
            count: 0,
        }
    }

    /// Merge the latest observation: scalar fields and payload are
    /// overwritten, the counter is bumped.
    pub fn merge(&mut self, obs: &Observation<'_>) {
        self.id_kind = obs.id_kind;
        self.event_kind = obs.event_kind;
        self.rssi = obs.rssi;

        let len = obs.payload.len().min(PAYLOAD_LEN);
        self.payload = [0; PAYLOAD_LEN];
        self.payload[..len].copy_from_slice(&obs.payload[..len]);
        self.payload_len = len as u8;

        self.count = self.count.saturating_add(1);
    }

    /// The valid portion of the payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..(self.payload_len as usize).min(PAYLOAD_LEN)]
    }
}
