/// Fixed-capacity open-addressing table, one record per identifier.
///
/// Linear probing from the identifier's home slot, first fit, no
/// displacement. Storage is a plain array sized at compile time; nothing
/// here allocates. The table lives for one window and is wiped wholesale
/// by [`DedupTable::clear`].
use crate::config::IDENTIFIER_LEN;
use crate::error::{Error, Result};
use crate::hash::home_slot;
use crate::record::ObservationRecord;

/// Occupancy tag for a slot.
///
/// `Deleted` is a tombstone: probing continues past it (the identifier
/// may live further along the chain) but it can be reused for an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Occupied,
    Deleted,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: SlotState,
    record: ObservationRecord,
}

impl Slot {
    const EMPTY: Self = Self {
        state: SlotState::Empty,
        record: ObservationRecord::EMPTY,
    };
}

pub struct DedupTable<const N: usize> {
    slots: [Slot; N],
    len: usize,
}

impl<const N: usize> DedupTable<N> {
    /// Rejects capacities the probe mask and the 2-byte unique count can't express.
    const VALID_CAPACITY: () = assert!(
        N.is_power_of_two() && N <= u16::MAX as usize,
        "table capacity must be a power of two that fits in u16"
    );

    pub const fn new() -> Self {
        let () = Self::VALID_CAPACITY;
        Self {
            slots: [Slot::EMPTY; N],
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Look up the record for `id`, claiming a slot for it if absent.
    ///
    /// A newly claimed record has a zero counter and zeroed payload.
    /// Fails with [`Error::TableFull`] when no slot can be claimed.
    pub fn find_or_create(&mut self, id: &[u8; IDENTIFIER_LEN]) -> Result<&mut ObservationRecord> {
        let home = home_slot(id, N);
        let mut idx = home;
        let mut reuse: Option<usize> = None;

        loop {
            match self.slots[idx].state {
                SlotState::Occupied => {
                    if self.slots[idx].record.id == *id {
                        return Ok(&mut self.slots[idx].record);
                    }
                }
                SlotState::Deleted => {
                    if reuse.is_none() {
                        reuse = Some(idx);
                    }
                }
                SlotState::Empty => {
                    // End of chain: `id` is not present
                    return self.claim(reuse.unwrap_or(idx), id);
                }
            }

            idx = (idx + 1) & (N - 1);
            if idx == home {
                break;
            }
        }

        match reuse {
            Some(slot) => self.claim(slot, id),
            None => Err(Error::TableFull),
        }
    }

    fn claim(&mut self, idx: usize, id: &[u8; IDENTIFIER_LEN]) -> Result<&mut ObservationRecord> {
        if self.len >= N {
            return Err(Error::TableFull);
        }
        let slot = &mut self.slots[idx];
        slot.state = SlotState::Occupied;
        slot.record = ObservationRecord::new(*id);
        self.len += 1;
        Ok(&mut slot.record)
    }

    /// Remove the record for `id`, leaving a tombstone. Returns whether it existed.
    pub fn remove(&mut self, id: &[u8; IDENTIFIER_LEN]) -> bool {
        let home = home_slot(id, N);
        let mut idx = home;

        loop {
            let slot = &mut self.slots[idx];
            match slot.state {
                SlotState::Occupied if slot.record.id == *id => {
                    slot.state = SlotState::Deleted;
                    self.len -= 1;
                    return true;
                }
                SlotState::Empty => return false,
                _ => {}
            }

            idx = (idx + 1) & (N - 1);
            if idx == home {
                return false;
            }
        }
    }

    /// Reset every slot to `Empty`.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.state = SlotState::Empty;
        }
        self.len = 0;
    }

    /// State of the slot at `idx`.
    pub fn slot_state(&self, idx: usize) -> Option<SlotState> {
        self.slots.get(idx).map(|s| s.state)
    }

    /// The record at slot `idx`, if that slot is occupied.
    pub fn record_at(&self, idx: usize) -> Option<&ObservationRecord> {
        self.slots
            .get(idx)
            .filter(|s| s.state == SlotState::Occupied)
            .map(|s| &s.record)
    }

    /// Occupied records in slot order. Call again to restart.
    pub fn occupied_entries(&self) -> impl Iterator<Item = &ObservationRecord> + '_ {
        self.slots
            .iter()
            .filter(|s| s.state == SlotState::Occupied)
            .map(|s| &s.record)
    }
}

impl<const N: usize> Default for DedupTable<N> {
    fn default() -> Self {
        Self::new()
    }
}
