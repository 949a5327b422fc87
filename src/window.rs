/// One reporting window: the dedup table plus the header counters.
///
/// `Window` is single-context. It carries no synchronization of its own;
/// `controller::WindowController` is what shares it between the capture
/// path and the periodic drain.
use crate::comm::ByteSink;
use crate::error::Result;
use crate::protocol::{FrameEncoder, WindowHeader};
use crate::record::{Observation, ObservationRecord};
use crate::table::DedupTable;

/// What a drained window looked like, for logging and status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSummary {
    pub header: WindowHeader,
    /// Observations discarded because the table was full
    pub dropped: u16,
}

pub struct Window<const N: usize> {
    table: DedupTable<N>,
    sequence: u8,
    next_sequence: u8,
    raw_events: u16,
    dropped: u16,
}

impl<const N: usize> Window<N> {
    /// A window that has not been reset yet. The first [`reset`](Self::reset)
    /// assigns sequence 0.
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Like [`new`](Self::new), but the first reset assigns `sequence`.
    pub const fn starting_at(sequence: u8) -> Self {
        Self {
            table: DedupTable::new(),
            sequence,
            next_sequence: sequence,
            raw_events: 0,
            dropped: 0,
        }
    }

    /// Start the next window: new sequence number, zero counters, empty table.
    pub fn reset(&mut self) {
        self.sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.raw_events = 0;
        self.dropped = 0;
        self.table.clear();
    }

    /// Merge one observation into the table.
    ///
    /// The raw event counter is bumped before the lookup, so observations
    /// rejected with `TableFull` are still counted.
    pub fn record(&mut self, obs: &Observation<'_>) -> Result<()> {
        self.raw_events = self.raw_events.saturating_add(1);
        match self.table.find_or_create(&obs.id) {
            Ok(rec) => {
                rec.merge(obs);
                Ok(())
            }
            Err(e) => {
                self.dropped = self.dropped.saturating_add(1);
                Err(e)
            }
        }
    }

    pub fn header(&self) -> WindowHeader {
        WindowHeader {
            sequence: self.sequence,
            raw_event_count: self.raw_events,
            unique_count: self.table.len() as u16,
        }
    }

    pub fn summary(&self) -> WindowSummary {
        WindowSummary {
            header: self.header(),
            dropped: self.dropped,
        }
    }

    pub fn dropped(&self) -> u16 {
        self.dropped
    }

    pub fn table(&self) -> &DedupTable<N> {
        &self.table
    }

    pub fn records(&self) -> impl Iterator<Item = &ObservationRecord> + '_ {
        self.table.occupied_entries()
    }

    /// Write this window's frame to `sink`, then reset.
    ///
    /// Single-context counterpart of `WindowController::drain`.
    pub fn drain<S: ByteSink + ?Sized>(&mut self, sink: &mut S) -> WindowSummary {
        let summary = self.summary();
        FrameEncoder::write_frame(&summary.header, self.records(), sink);
        self.reset();
        summary
    }
}

impl<const N: usize> Default for Window<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::{decode_record, HEADER_LEN, RECORD_LEN};

    fn obs(id: u8, rssi: i8) -> Observation<'static> {
        Observation {
            id: [0xA0, 0, 0, 0, 0, id],
            id_kind: 1,
            event_kind: 0,
            rssi,
            payload: &[0x02, 0x01, 0x06],
        }
    }

    // ── Recording ───────────────────────────────────────────────────

    #[test]
    fn duplicates_collapse_into_one_record() {
        let mut window = Window::<8>::new();
        window.reset();
        for rssi in [-40, -50, -60] {
            window.record(&obs(1, rssi)).unwrap();
        }

        let header = window.header();
        assert_eq!(header.unique_count, 1);
        assert_eq!(header.raw_event_count, 3);

        let rec = window.records().next().unwrap();
        assert_eq!(rec.count, 3);
        assert_eq!(rec.rssi, -60);
    }

    #[test]
    fn abaca_end_to_end_counts() {
        let mut window = Window::<8>::new();
        window.reset();
        for id in [b'A', b'B', b'A', b'C', b'A'] {
            window.record(&obs(id, -50)).unwrap();
        }

        let header = window.header();
        assert_eq!(header.unique_count, 3);
        assert_eq!(header.raw_event_count, 5);

        let a = window.records().find(|r| r.id[5] == b'A').unwrap();
        assert_eq!(a.count, 3);
    }

    #[test]
    fn full_table_drops_but_counts_raw() {
        let mut window = Window::<8>::new();
        window.reset();
        for id in 0..8 {
            window.record(&obs(id, -50)).unwrap();
        }
        assert_eq!(window.record(&obs(100, -50)), Err(Error::TableFull));
        assert_eq!(window.record(&obs(101, -50)), Err(Error::TableFull));
        // Known identifier still merges
        window.record(&obs(3, -20)).unwrap();

        let header = window.header();
        assert_eq!(header.unique_count, 8);
        assert_eq!(header.raw_event_count, 11);
        assert_eq!(window.dropped(), 2);
    }

    #[test]
    fn raw_count_saturates_at_u16_max() {
        let mut window = Window::<8>::new();
        window.reset();
        for i in 0..70_000u32 {
            window.record(&obs((i % 2) as u8, -50)).unwrap();
        }

        let header = window.header();
        assert_eq!(header.raw_event_count, u16::MAX);
        assert_eq!(header.unique_count, 2);
        assert!(window.records().all(|r| r.count == u8::MAX));
    }

    // ── Reset / sequence ────────────────────────────────────────────

    #[test]
    fn reset_advances_sequence_and_clears() {
        let mut window = Window::<8>::new();
        window.reset();
        assert_eq!(window.header().sequence, 0);
        window.record(&obs(1, -50)).unwrap();

        window.reset();
        let header = window.header();
        assert_eq!(header.sequence, 1);
        assert_eq!(header.raw_event_count, 0);
        assert_eq!(header.unique_count, 0);
        assert_eq!(window.dropped(), 0);
        assert_eq!(window.records().count(), 0);
    }

    #[test]
    fn sequence_wraps_modulo_256() {
        let mut window = Window::<8>::starting_at(254);
        let seqs: heapless::Vec<u8, 4> = (0..4)
            .map(|_| {
                window.reset();
                window.header().sequence
            })
            .collect();
        assert_eq!(&seqs[..], &[254, 255, 0, 1]);
    }

    // ── Drain ───────────────────────────────────────────────────────

    #[test]
    fn drain_emits_frame_and_resets() {
        let mut window = Window::<8>::new();
        window.reset();
        window.record(&obs(1, -50)).unwrap();
        window.record(&obs(2, -51)).unwrap();
        window.record(&obs(1, -52)).unwrap();

        let mut out = heapless::Vec::<u8, 256>::new();
        let summary = window.drain(&mut out);

        assert_eq!(summary.header.unique_count, 2);
        assert_eq!(summary.header.raw_event_count, 3);
        assert_eq!(out.len(), HEADER_LEN + 2 * RECORD_LEN);
        assert_eq!(&out[..4], &[0x55; 4]);

        let first = decode_record(&out[HEADER_LEN..HEADER_LEN + RECORD_LEN]).unwrap();
        assert_eq!(first.id[5], 1);
        assert_eq!(first.count, 2);
        assert_eq!(first.rssi, -52);

        assert_eq!(window.header().sequence, 1);
        assert_eq!(window.header().unique_count, 0);
    }

    #[test]
    fn empty_window_drains_header_only() {
        let mut window = Window::<8>::new();
        window.reset();
        let mut out = heapless::Vec::<u8, 64>::new();
        window.drain(&mut out);
        assert_eq!(&out[..], &[0x55, 0x55, 0x55, 0x55, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn slot_reused_next_window_never_leaks_payload() {
        let mut window = Window::<8>::new();
        window.reset();
        window
            .record(&Observation {
                payload: &[0xFF; 31],
                ..obs(1, -50)
            })
            .unwrap();
        let mut out = heapless::Vec::<u8, 256>::new();
        window.drain(&mut out);

        // Same home slot, different identifier, short payload
        window
            .record(&Observation {
                id: [0xA0, 0, 0, 0, 8, 1],
                payload: &[0x01],
                ..obs(0, -50)
            })
            .unwrap();
        let rec = window.records().next().unwrap();
        assert_eq!(rec.payload_len, 1);
        assert!(rec.payload[1..].iter().all(|&b| b == 0));
    }
}
