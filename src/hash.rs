/// Identifier hasher — maps a 6-byte device address to a home slot.
use crate::config::IDENTIFIER_LEN;

/// Home slot for `id` in a table of `capacity` slots.
///
/// Base-33 multiplicative hash (`h = h * 33 + byte`) over the six
/// address bytes, masked to the table size. `capacity` must be a power
/// of two. Not collision-resistant; the table resolves collisions by
/// linear probing.
#[inline]
pub fn home_slot(id: &[u8; IDENTIFIER_LEN], capacity: usize) -> usize {
    debug_assert!(capacity.is_power_of_two());
    let hash = id
        .iter()
        .fold(0u32, |h, &b| (h << 5).wrapping_add(h).wrapping_add(b as u32));
    hash as usize & (capacity - 1)
}
