//! A target-independent linear-scan register allocator for straight-line
//! machine code.
//!
//! The allocator makes a single forward pass over an already-scheduled
//! instruction stream (no control flow, no SSA) and rewrites every virtual
//! register operand to a real one, inserting spills and restores where the
//! `K` real registers of a class run out. It never decides instruction
//! order and never invents a CFG; callers that need those are expected to
//! have already linearized their code before calling in here.
//!
//! The five stages run in order:
//!
//! 1. [`liveness::compute_vreg_liveness`] — one scan building each vreg's
//!    `[live_after, dead_before)` range.
//! 2. [`hardranges::collect_hard_ranges`] — one scan collecting the spans
//!    during which a real register is pinned down by instruction semantics
//!    rather than by vreg allocation.
//! 3. [`spill::assign_spill_slots`] — first-fit spill-slot assignment.
//! 4. [`preference::compute_preferences`] — optional, best-effort hinting.
//! 5. [`alloc::rewrite_instructions`] — the actual rewrite.
//!
//! [`context::Context`] drives all five; [`context::allocate`] is a
//! one-shot convenience wrapper for callers that don't need to reuse
//! buffers across multiple instruction streams.

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

pub mod alloc;
pub mod context;
pub mod hardranges;
pub mod hooks;
pub mod liveness;
pub mod preference;
pub mod reg;
pub mod result;
pub mod spill;
pub mod state;

#[cfg(feature = "testing_hooks")]
pub mod testing;

pub use crate::context::{allocate, Context};
pub use crate::hooks::{AllocatorConfig, Hooks, RegMapping};
pub use crate::reg::{OpMode, Reg, RegClass, RegUse, VReg};
pub use crate::result::{AllocError, AllocResult};
pub use crate::state::{Disposition, RegFile};

pub use cranelift_entity as entity;

/// The crate version, as recorded in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
