//! Stage 5: the instruction rewriter.
//!
//! The core of the allocator (spec §4.5). Walks the instruction vector a
//! second time, maintaining the register-state table of spec §3, evicting
//! dead bindings, protecting hard ranges, allocating real registers for
//! every vreg operand, and emitting the rewritten instruction stream along
//! with whatever spills and restores were required to make it correct.

use crate::hardranges::RRegInterval;
use crate::hooks::{Hooks, RegMapping};
use crate::liveness::VRegInfo;
use crate::reg::{Reg, RegUse, VReg};
use crate::result::{AllocError, AllocResult};
use crate::state::{Disposition, RegFile};
use cranelift_entity::SecondaryMap;
use log::trace;
use smallvec::SmallVec;

/// Run Stage 5 over `insns`, returning the rewritten instruction stream.
///
/// `table` must already have `spill_offset`, `dead_before`, `class`, and
/// (optionally) `preferred` filled in by Stages 1/3/4. `hard_ranges` is
/// Stage 2's output. `allocatable` is the caller's `R[0..K)` array.
pub fn rewrite_instructions<I, R>(
    insns: &[I],
    table: &SecondaryMap<VReg, VRegInfo<R>>,
    hard_ranges: &[RRegInterval<R>],
    allocatable: &[R],
    hooks: &mut Hooks<'_, I, R>,
) -> AllocResult<Vec<I>>
where
    I: Clone,
    R: Reg,
{
    let mut regs = RegFile::new(allocatable);
    let n_slots = regs.len();
    let n = insns.len();

    // Bucket the hard-range transitions by the instruction index at which
    // they fire, and keep the raw (la, db) pairs per slot for the sanity
    // check. A reservation covers the half-open span `[la, db)`: `la` is
    // the index of the instruction that hardcodes the register (the write
    // that opened the interval, per Stage 2's construction), so the
    // register must already be clear of any vreg binding *by* that
    // instruction, not one instruction later. See DESIGN.md for the worked
    // trace that rules out the off-by-one alternative.
    let mut opens: Vec<SmallVec<[usize; 2]>> = vec![SmallVec::new(); n + 1];
    let mut closes: Vec<SmallVec<[usize; 2]>> = vec![SmallVec::new(); n + 1];
    let mut ranges_by_slot: Vec<Vec<(u32, u32)>> = vec![Vec::new(); n_slots];

    for iv in hard_ranges {
        let idx = regs.index_of(iv.rreg).ok_or_else(|| AllocError::InternalInvariant {
            inst: iv.live_after as usize,
            detail: "RRegInterval names a register outside the allocatable set".to_string(),
        })?;
        ranges_by_slot[idx].push((iv.live_after, iv.dead_before));
        let open_at = iv.live_after as usize;
        if open_at <= n {
            opens[open_at].push(idx);
        }
        if (iv.dead_before as usize) <= n {
            closes[iv.dead_before as usize].push(idx);
        }
    }

    let mut out: Vec<I> = Vec::with_capacity(n + n / 4 + 1);
    let mut mapping: RegMapping<R> = RegMapping::default();
    let mut uses: SmallVec<[RegUse<R>; 4]> = SmallVec::new();

    for ii in 0..n {
        let ii_u32 = ii as u32;

        // (a) Sanity checks, before any mutation.
        check_invariants(&regs, &ranges_by_slot, table, ii_u32)?;

        // (b) Expire dead bindings.
        for idx in 0..n_slots {
            if let Disposition::Bound(v) = regs.get(idx).disp {
                if table[v].dead_before == Some(ii_u32) {
                    trace!("inst {}: slot {} expires vreg {}", ii, idx, v.index());
                    regs.get_mut(idx).disp = Disposition::Free;
                }
            }
        }

        // (c) Leaving then entering hard ranges. Closes must run first: a
        // register can close one interval and open another at the very same
        // instruction (back-to-back fixed writes with no gap between them),
        // and nothing may observe it as transiently `Free` in between.
        for &idx in &closes[ii] {
            trace!("inst {}: slot {} leaves hard range", ii, idx);
            regs.get_mut(idx).disp = Disposition::Free;
        }
        for &idx in &opens[ii] {
            if let Disposition::Bound(v) = regs.get(idx).disp {
                let rreg = regs.get(idx).rreg;
                let off = table[v].spill_offset;
                trace!(
                    "inst {}: slot {} spills vreg {} to enter a hard range",
                    ii,
                    idx,
                    v.index()
                );
                out.push((hooks.gen_spill)(rreg, off));
            }
            regs.get_mut(idx).disp = Disposition::Unavail;
        }

        uses.clear();
        (hooks.reg_usage)(&insns[ii], &mut uses);
        mapping.clear();

        // (d) Ensure every read/modified vreg operand is resident.
        for u in &uses {
            if !u.reg.is_virtual() || !u.mode.reads() {
                continue;
            }
            let v = u.reg.vreg();
            if regs.binding_of(v).is_none() {
                let idx = select_register(&mut regs, table, &mut out, v, u.reg.class(), hooks, ii_u32)?;
                let rreg = regs.get(idx).rreg;
                let off = table[v].spill_offset;
                trace!("inst {}: slot {} restores vreg {}", ii, idx, v.index());
                out.push((hooks.gen_restore)(rreg, off));
                regs.get_mut(idx).disp = Disposition::Bound(v);
            }
            let idx = regs.binding_of(v).expect("just ensured resident");
            mapping.insert(v, regs.get(idx).rreg);
        }

        // (e) Ensure write-only vreg operands have a home (no reload).
        for u in &uses {
            if !u.reg.is_virtual() || u.mode.reads() {
                continue;
            }
            let v = u.reg.vreg();
            if regs.binding_of(v).is_none() {
                let idx = select_register(&mut regs, table, &mut out, v, u.reg.class(), hooks, ii_u32)?;
                regs.get_mut(idx).disp = Disposition::Bound(v);
            }
            let idx = regs.binding_of(v).expect("just ensured a home");
            mapping.insert(v, regs.get(idx).rreg);
        }

        // (g) Rewrite and emit the instruction itself.
        let mut rewritten = insns[ii].clone();
        (hooks.map_regs)(&mut rewritten, &mapping);
        out.push(rewritten);

        // (h) Eager reclaim of bindings dying exactly at ii+1 is left to
        // step (b) at the top of the next iteration; both placements
        // satisfy the §3 invariants at check time.
    }

    Ok(out)
}

/// Real-register selection (spec §4.5 step (f)).
///
/// Tries the vreg's preference first, then any free candidate of the right
/// class (lowest index), then evicts the farthest-future-use `Bound`
/// candidate of that class (ties broken by lowest index), spilling it via
/// `gen_spill`. Returns the chosen slot's index; the caller marks it
/// `Bound` once it knows whether a restore is also needed.
fn select_register<I, R>(
    regs: &mut RegFile<R>,
    table: &SecondaryMap<VReg, VRegInfo<R>>,
    out: &mut Vec<I>,
    v: VReg,
    class: R::Class,
    hooks: &mut Hooks<'_, I, R>,
    ii: u32,
) -> AllocResult<usize>
where
    R: Reg,
{
    if let Some(pref) = table[v].preferred {
        if pref.class() == class {
            if let Some(idx) = regs.index_of(pref) {
                if regs.get(idx).disp == Disposition::Free {
                    return Ok(idx);
                }
            }
        }
    }

    if let Some(idx) = regs
        .iter()
        .find(|(_, s)| s.disp == Disposition::Free && s.rreg.class() == class)
        .map(|(idx, _)| idx)
    {
        return Ok(idx);
    }

    let mut victim: Option<(usize, VReg, u32)> = None;
    for (idx, s) in regs.iter() {
        if s.rreg.class() != class {
            continue;
        }
        if let Disposition::Bound(vv) = s.disp {
            if let Some(db) = table[vv].dead_before {
                let replace = match victim {
                    None => true,
                    Some((_, _, best_db)) => db > best_db,
                };
                if replace {
                    victim = Some((idx, vv, db));
                }
            }
        }
    }

    match victim {
        Some((idx, vv, db)) => {
            let rreg = regs.get(idx).rreg;
            let off = table[vv].spill_offset;
            trace!(
                "inst {}: evicting vreg {} from slot {} (dead_before {}) for vreg {}",
                ii,
                vv.index(),
                idx,
                db,
                v.index()
            );
            out.push((hooks.gen_spill)(rreg, off));
            regs.get_mut(idx).disp = Disposition::Free;
            Ok(idx)
        }
        None => Err(AllocError::NoRegForClass { inst: ii as usize }),
    }
}

/// §3 sanity checks, run at the top of every Stage 5 iteration.
fn check_invariants<R: Reg>(
    regs: &RegFile<R>,
    ranges_by_slot: &[Vec<(u32, u32)>],
    table: &SecondaryMap<VReg, VRegInfo<R>>,
    ii: u32,
) -> AllocResult<()> {
    for (idx, slot) in regs.iter() {
        let reserved = ranges_by_slot[idx].iter().any(|&(la, db)| la <= ii && ii < db);
        match (reserved, slot.disp) {
            (true, Disposition::Unavail) => {}
            (true, _) => {
                return Err(AllocError::InternalInvariant {
                    inst: ii as usize,
                    detail: format!(
                        "register at slot {} is inside a hard range but not marked Unavail",
                        idx
                    ),
                })
            }
            (false, Disposition::Unavail) => {
                return Err(AllocError::InternalInvariant {
                    inst: ii as usize,
                    detail: format!("register at slot {} marked Unavail outside any hard range", idx),
                })
            }
            (false, _) => {}
        }

        if let Disposition::Bound(v) = slot.disp {
            if let Some(class) = table[v].class {
                if class != slot.rreg.class() {
                    return Err(AllocError::InternalInvariant {
                        inst: ii as usize,
                        detail: format!("slot {} bound to vreg {} of a different class", idx, v.index()),
                    });
                }
            }
        }
    }

    for (i, (_, a)) in regs.iter().enumerate() {
        if let Disposition::Bound(va) = a.disp {
            for (j, (_, b)) in regs.iter().enumerate().skip(i + 1) {
                if let Disposition::Bound(vb) = b.disp {
                    if va == vb {
                        return Err(AllocError::InternalInvariant {
                            inst: ii as usize,
                            detail: format!("vreg {} bound to two real registers at once", va.index()),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}
