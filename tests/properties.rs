//! Property tests for spec §8's invariants, run against the `testing_hooks`
//! harness. Style follows the teacher's `proptest!` usage in its own
//! integration tests: a small `Strategy` builder feeding a `proptest!`
//! block per property.

#![cfg(feature = "testing_hooks")]

use cranelift_entity::SecondaryMap;
use linear_regalloc::liveness::VRegInfo;
use linear_regalloc::reg::VReg;
use linear_regalloc::spill::assign_spill_slots;
use linear_regalloc::testing::{self, TestClass, TestInsn, TestReg};
use linear_regalloc::{allocate, AllocatorConfig, Hooks};
use proptest::prelude::*;
use std::collections::HashMap;

fn run(insns: &[TestInsn], num_vregs: usize, allocatable: &[TestReg]) -> linear_regalloc::AllocResult<Vec<TestInsn>> {
    let _ = env_logger::try_init();

    let mut reg_usage = testing::reg_usage;
    let mut is_move = testing::is_move;
    let mut map_regs = testing::map_regs;
    let mut gen_spill = testing::gen_spill;
    let mut gen_restore = testing::gen_restore;
    let mut hooks = Hooks {
        is_move: &mut is_move,
        reg_usage: &mut reg_usage,
        map_regs: &mut map_regs,
        gen_spill: &mut gen_spill,
        gen_restore: &mut gen_restore,
    };
    allocate(
        insns,
        num_vregs,
        &[],
        8,
        allocatable,
        AllocatorConfig::default(),
        &mut hooks,
    )
}

/// Build a well-formed straight-line vreg program from a raw op list:
/// `(raw_vreg_index, want_read)`. A vreg is only ever read after it has
/// first been written, so every generated program satisfies the
/// liveness-summariser's preconditions by construction (no `MalformedInput`
/// is possible from this generator).
fn build_program(ops: &[(usize, bool)], num_vregs: usize) -> Vec<TestInsn> {
    let c = TestClass::Int;
    let filler = TestReg::r(99, c);
    let mut written = vec![false; num_vregs];
    let mut insns = Vec::with_capacity(ops.len());
    for &(raw_idx, want_read) in ops {
        let idx = raw_idx % num_vregs;
        let v = TestReg::v(idx as u32, c);
        if want_read && written[idx] {
            insns.push(TestInsn::Move { dst: filler, src: v });
        } else {
            insns.push(TestInsn::Move { dst: v, src: filler });
            written[idx] = true;
        }
    }
    insns
}

fn allocatable_set(n: usize) -> Vec<TestReg> {
    (0..n as u8).map(|i| TestReg::r(i, TestClass::Int)).collect()
}

fn ops_strategy() -> impl Strategy<Value = Vec<(usize, bool)>> {
    proptest::collection::vec((0usize..8, any::<bool>()), 1..40)
}

/// The value space used by [`build_checked_program`]/[`replay_and_check`]:
/// real register indices `>= VALUE_BASE` never name an allocatable register,
/// so the allocator never touches them; they're read-only "immediates" that
/// carry a value identity through the instruction stream.
const VALUE_BASE: u8 = 50;
/// A second reserved real register whose value is deliberately *not*
/// tracked: a fixed-register write from this source models an opaque
/// clobber, the kind of instruction that forces a hard range.
const CLOBBER_SRC_IDX: u8 = 240;

fn literal(id: u8, class: TestClass) -> TestReg {
    TestReg::r(VALUE_BASE + id, class)
}

fn clobber_src(class: TestClass) -> TestReg {
    TestReg::r(CLOBBER_SRC_IDX, class)
}

fn is_literal(reg: TestReg) -> bool {
    match reg {
        TestReg::Real(idx, _) => idx >= VALUE_BASE,
        TestReg::Virtual(..) => false,
    }
}

/// The value a literal/clobber register carries, independent of any
/// allocator state: `None` for the clobber source (its value is
/// deliberately unknown), `Some(id)` for every other literal.
fn const_value(reg: TestReg) -> Option<u8> {
    match reg {
        TestReg::Real(idx, _) if idx == CLOBBER_SRC_IDX => None,
        TestReg::Real(idx, _) if idx >= VALUE_BASE => Some(idx - VALUE_BASE),
        _ => None,
    }
}

/// Build a straight-line program that writes and reads vregs through
/// distinct value identities (rather than an indistinguishable filler
/// register) and occasionally clobbers a fixed real register, so
/// [`replay_and_check`] can simulate the output and confirm the value each
/// read observes is exactly the value most recently written to that vreg.
///
/// `kind % 3 == 1` reads (only once the vreg has been written at least
/// once), `kind % 3 == 2` emits a hard-range clobber of `clobber_reg`, and
/// everything else writes a fresh value to the vreg.
fn build_checked_program(
    ops: &[(usize, u8)],
    num_vregs: usize,
    class: TestClass,
    clobber_reg: TestReg,
) -> Vec<TestInsn> {
    let mut written = vec![false; num_vregs];
    let mut current_value = vec![0u8; num_vregs];
    let mut next_value: u8 = 0;
    let mut insns = Vec::with_capacity(ops.len());

    for &(raw_idx, kind) in ops {
        let idx = raw_idx % num_vregs;
        let v = TestReg::v(idx as u32, class);
        match kind % 3 {
            1 if written[idx] => {
                insns.push(TestInsn::Move { dst: literal(current_value[idx], class), src: v });
            }
            2 => {
                insns.push(TestInsn::Move { dst: clobber_reg, src: clobber_src(class) });
            }
            _ => {
                let val = next_value;
                next_value = next_value.wrapping_add(1);
                current_value[idx] = val;
                written[idx] = true;
                insns.push(TestInsn::Move { dst: v, src: literal(val, class) });
            }
        }
    }
    insns
}

/// Resolve the value a register operand carries at the current point of
/// [`replay_and_check`]'s simulated walk: a constant for literal/clobber
/// registers, or whatever was last written into a real allocatable one.
fn value_of(reg: TestReg, reg_val: &HashMap<TestReg, Option<u8>>) -> Option<u8> {
    if is_literal(reg) {
        const_value(reg)
    } else {
        reg_val.get(&reg).copied().flatten()
    }
}

/// Replay an allocated instruction stream as straight-line register-transfer
/// semantics and check that every read observes exactly the value most
/// recently written to that location.
///
/// This single walk is what directly exercises spec §8's invariants 1-3 and
/// the Round-trip property together: a missing dominating write or restore
/// (invariant 1) leaves a register's simulated value at `None`, a vreg
/// losing its binding to another vreg or to a hard-range clobber
/// (invariants 2 and 3) overwrites that value with something else, and a
/// spill/restore pair that doesn't round-trip the value it stored
/// (Round-trip) does too — all three failure modes surface as the same
/// "observed != expected" mismatch at the read that notices.
fn replay_and_check(insns: &[TestInsn]) {
    let mut reg_val: HashMap<TestReg, Option<u8>> = HashMap::new();
    let mut spill_val: HashMap<u32, Option<u8>> = HashMap::new();

    for insn in insns {
        match insn {
            TestInsn::Move { dst, src } if is_literal(*dst) => {
                let expected = const_value(*dst);
                let observed = value_of(*src, &reg_val);
                assert_eq!(
                    observed, expected,
                    "read of {:?} expected value {:?} but found {:?} in {:?}",
                    src, expected, observed, insns
                );
            }
            TestInsn::Move { dst, src } => {
                let val = value_of(*src, &reg_val);
                reg_val.insert(*dst, val);
            }
            TestInsn::Spill { rreg, offset } => {
                let val = reg_val.get(rreg).copied().flatten();
                spill_val.insert(*offset, val);
            }
            TestInsn::Restore { rreg, offset } => {
                let val = spill_val.get(offset).copied().flatten();
                reg_val.insert(*rreg, val);
            }
            TestInsn::Binary { .. } | TestInsn::Modify { .. } => {
                unreachable!("build_checked_program only emits Move instructions")
            }
        }
    }
}

proptest! {
    /// Determinism (spec §8 property 6): identical input and callback
    /// behavior must produce identical output on repeated runs.
    #[test]
    fn determinism(
        ops in ops_strategy(),
        num_vregs in 1usize..4,
        num_rregs in 1usize..3,
    ) {
        let insns = build_program(&ops, num_vregs);
        let allocatable = allocatable_set(num_rregs);

        let first = run(&insns, num_vregs, &allocatable);
        let second = run(&insns, num_vregs, &allocatable);

        // A well-formed program over >=1 allocatable register of the right
        // class can never hit NoRegForClass/OutOfSpillSlots, and a passing
        // run never fails its own §3 sanity checks (InternalInvariant) --
        // so both calls must succeed, with byte-for-byte identical output.
        let first = first.expect("well-formed program must allocate");
        let second = second.expect("well-formed program must allocate");
        prop_assert_eq!(first, second);
    }

    /// Idempotence (spec §8 property 5): an instruction stream with no
    /// virtual registers at all passes through unchanged.
    #[test]
    fn idempotence_on_vreg_free_input(
        width in 1usize..6,
        count in 1usize..20,
    ) {
        let c = TestClass::Int;
        // None of these handles are in the allocatable set below, so the
        // hard-range collector ignores them entirely and Stage 5 has
        // nothing to rewrite.
        let regs: Vec<TestReg> = (0..width as u8).map(|i| TestReg::r(i, c)).collect();
        let insns: Vec<TestInsn> = (0..count)
            .map(|i| TestInsn::Binary {
                dst: regs[i % width],
                src1: regs[(i + 1) % width],
                src2: regs[(i + 2) % width],
            })
            .collect();

        let out = run(&insns, 0, &[]).expect("vreg-free input must allocate trivially");
        prop_assert_eq!(out, insns);
    }

    /// Spill-slot disjointness (spec §8 property 4): any two vregs sharing
    /// a spill offset must have disjoint `[live_after, dead_before)`
    /// ranges. Exercised directly against Stage 3, generating random
    /// non-overlapping-by-construction-or-not ranges and checking the
    /// invariant holds for whatever assignment results.
    #[test]
    fn spill_slots_disjoint_when_shared(
        ranges in proptest::collection::vec((0u32..50, 1u32..10), 2..10),
    ) {
        let mut table: SecondaryMap<VReg, VRegInfo<TestReg>> = SecondaryMap::new();
        table.resize(ranges.len());
        for (i, &(la, span)) in ranges.iter().enumerate() {
            table[VReg::new(i)].live_after = Some(la);
            table[VReg::new(i)].dead_before = Some(la + span);
        }

        let max_slots = ranges.len() * 2 + 1;
        assign_spill_slots(&mut table, ranges.len(), 8, max_slots)
            .expect("generous slot budget must never saturate");

        for i in 0..ranges.len() {
            for j in (i + 1)..ranges.len() {
                let a = &table[VReg::new(i)];
                let b = &table[VReg::new(j)];
                if a.spill_offset == b.spill_offset {
                    let (a_la, a_db) = (a.live_after.unwrap(), a.dead_before.unwrap());
                    let (b_la, b_db) = (b.live_after.unwrap(), b.dead_before.unwrap());
                    let disjoint = a_db <= b_la || b_db <= a_la;
                    prop_assert!(
                        disjoint,
                        "vregs {} [{}, {}) and {} [{}, {}) share slot {} but overlap",
                        i, a_la, a_db, j, b_la, b_db, a.spill_offset
                    );
                }
            }
        }
    }

    /// Invariants 1-3 and the Round-trip property (spec §8), exercised
    /// directly against `allocate`'s output: every vreg read must observe
    /// the value most recently written to that vreg, whether it travels
    /// through a real register the whole time, through a spill/restore
    /// pair, or survives a hard-range clobber landing on a different
    /// register in between. See [`replay_and_check`] for how a single
    /// mismatch pins down which of these failed.
    #[test]
    fn round_trip_and_binding_invariants(
        ops in proptest::collection::vec((0usize..6, 0u8..3), 1..60),
        num_vregs in 1usize..4,
        num_rregs in 1usize..3,
    ) {
        let c = TestClass::Int;
        let allocatable = allocatable_set(num_rregs);
        let clobber_reg = allocatable[0];

        let insns = build_checked_program(&ops, num_vregs, c, clobber_reg);
        let out = run(&insns, num_vregs, &allocatable)
            .expect("well-formed program with hard ranges must allocate");

        replay_and_check(&out);
    }
}
