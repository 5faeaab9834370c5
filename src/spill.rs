//! Stage 3: spill-slot assigner.
//!
//! First-fit assignment of byte offsets in the spill area, one per live
//! vreg, re-using a slot once its previous occupant's range has ended (spec
//! §4.3). Slots are `slot_size_bytes` wide; a vreg whose `spill_size` is
//! larger than one slot claims that many *contiguous* slots (spec §9 Open
//! Question 1) so 128-bit values get a home without changing the slot unit.

use crate::liveness::VRegInfo;
use crate::reg::{Reg, VReg};
use crate::result::AllocError;
use cranelift_entity::SecondaryMap;

/// Assign `spill_offset` for every used vreg in `table`, in vreg index
/// order (spec's traversal order, which is sufficient because producers
/// assign vreg indices densely with no required relationship to liveness).
///
/// `max_slots` bounds the slot table; exceeding it is `OutOfSpillSlots`.
/// Returns the number of slots actually used, which callers typically want
/// in order to size their spill area.
pub fn assign_spill_slots<R: Reg>(
    table: &mut SecondaryMap<VReg, VRegInfo<R>>,
    num_vregs: usize,
    slot_size_bytes: u32,
    max_slots: usize,
) -> Result<usize, AllocError> {
    // `busy_until_before[j]` is the instruction index before which slot `j`
    // becomes free again; `0` means never occupied.
    let mut busy_until_before: Vec<u32> = Vec::new();
    let mut high_water = 0usize;

    for v in 0..num_vregs {
        let vreg = VReg::new(v);
        let (live_after, dead_before, spill_size) = {
            let info = &table[vreg];
            match (info.live_after, info.dead_before) {
                (Some(la), Some(db)) => (la, db, info.spill_size.max(slot_size_bytes)),
                _ => continue,
            }
        };

        let slots_needed = ((spill_size + slot_size_bytes - 1) / slot_size_bytes).max(1) as usize;

        let mut start = 0usize;
        'search: loop {
            if start + slots_needed > max_slots {
                return Err(AllocError::OutOfSpillSlots {
                    inst: live_after as usize,
                });
            }
            if start + slots_needed > busy_until_before.len() {
                busy_until_before.resize(start + slots_needed, 0);
            }
            for j in start..start + slots_needed {
                if busy_until_before[j] > live_after {
                    start = j + 1;
                    continue 'search;
                }
            }
            break;
        }

        for j in start..start + slots_needed {
            busy_until_before[j] = dead_before;
        }
        high_water = high_water.max(start + slots_needed);

        table[vreg].spill_offset = (start as u32) * slot_size_bytes;
    }

    Ok(high_water)
}
