//! Register allocator context.
//!
//! `Context` holds the data structures Stages 1-4 build, so that compiling a
//! whole program's worth of instruction streams reuses one set of buffers
//! instead of allocating a fresh `VRegInfo` table and hard-range vector for
//! every call. This doesn't preserve anything *between* streams; it just
//! avoids the allocator churn of doing so independently each time.

use crate::alloc::rewrite_instructions;
use crate::hardranges::{collect_hard_ranges, RRegInterval};
use crate::hooks::{AllocatorConfig, Hooks};
use crate::liveness::{compute_vreg_liveness, VRegInfo};
use crate::preference::compute_preferences;
use crate::reg::{Reg, VReg};
use crate::result::AllocResult;
use crate::spill::assign_spill_slots;
use cranelift_entity::SecondaryMap;

/// Persistent memory allocations for register allocation.
///
/// One `Context` is built per real-register universe (`R`); its `table` and
/// `hard_ranges` buffers are cleared and rebuilt by every call to
/// [`Context::run`], not carried across calls.
pub struct Context<R: Reg> {
    config: AllocatorConfig,
    table: SecondaryMap<VReg, VRegInfo<R>>,
    hard_ranges: Vec<RRegInterval<R>>,
}

impl<R: Reg> Context<R> {
    /// Create a new context for register allocation, reused across however
    /// many instruction streams the caller compiles.
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            config,
            table: SecondaryMap::new(),
            hard_ranges: Vec::new(),
        }
    }

    /// Clear the buffers this context owns, releasing their contents but
    /// not their capacity.
    pub fn clear(&mut self) {
        self.table.clear();
        self.hard_ranges.clear();
    }

    /// The vreg liveness table built by the most recent [`Context::run`].
    /// Empty before the first call.
    pub fn vreg_table(&self) -> &SecondaryMap<VReg, VRegInfo<R>> {
        &self.table
    }

    /// The hard ranges collected by the most recent [`Context::run`].
    pub fn hard_ranges(&self) -> &[RRegInterval<R>] {
        &self.hard_ranges
    }

    /// Run all five stages over `insns`, returning the rewritten stream.
    ///
    /// `num_vregs` is the number of virtual registers the producer of
    /// `insns` used (vreg indices run densely over `[0, num_vregs)`).
    /// `vreg_sizes[v]` gives the byte width of vreg `v`'s value, used by
    /// Stage 3 to size multi-slot homes for wide values; vregs beyond
    /// `vreg_sizes.len()` default to `default_size`. `allocatable` is the
    /// target's `R[0..K)` array.
    pub fn run<I>(
        &mut self,
        insns: &[I],
        num_vregs: usize,
        vreg_sizes: &[u32],
        default_size: u32,
        allocatable: &[R],
        hooks: &mut Hooks<'_, I, R>,
    ) -> AllocResult<Vec<I>>
    where
        I: Clone,
    {
        self.clear();

        self.table = compute_vreg_liveness(insns, num_vregs, vreg_sizes, default_size, |insn, out| {
            (hooks.reg_usage)(insn, out)
        })?;

        self.hard_ranges = collect_hard_ranges(insns, allocatable, |insn, out| (hooks.reg_usage)(insn, out))?;

        compute_preferences(insns, &mut self.table, |insn| (hooks.is_move)(insn))?;

        assign_spill_slots(
            &mut self.table,
            num_vregs,
            self.config.slot_size_bytes,
            self.config.max_spill_slots,
        )?;

        rewrite_instructions(insns, &self.table, &self.hard_ranges, allocatable, hooks)
    }
}

/// One-shot convenience wrapper around [`Context::run`] for callers that
/// don't need to reuse buffers across multiple instruction streams.
pub fn allocate<I, R>(
    insns: &[I],
    num_vregs: usize,
    vreg_sizes: &[u32],
    default_size: u32,
    allocatable: &[R],
    config: AllocatorConfig,
    hooks: &mut Hooks<'_, I, R>,
) -> AllocResult<Vec<I>>
where
    I: Clone,
    R: Reg,
{
    Context::new(config).run(insns, num_vregs, vreg_sizes, default_size, allocatable, hooks)
}
