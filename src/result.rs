//! Define the `AllocError` and `AllocResult` types.
//!
//! Modeled on the reader crate's hand-rolled `ParseError` rather than on a
//! derive-macro error crate: there are only four fatal, non-recoverable
//! kinds (spec §7), and each one already knows the instruction index it
//! happened at, so a manual `Display` impl is both the simplest and the most
//! informative option.

use core::fmt;

/// Why a register-allocation call failed.
///
/// Every call that returns one of these has discarded its partially built
/// output (spec §7); none of these are recoverable in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The input violated a precondition the allocator requires to make
    /// sense of liveness: a read/modify of a register with no prior
    /// liveness event, a vreg index outside `[0, V)`, or a class mismatch
    /// on a flagged move.
    MalformedInput {
        /// Index of the offending instruction.
        inst: usize,
        /// Human-readable detail.
        reason: String,
    },
    /// Stage 3 could not find enough contiguous free spill slots for a
    /// vreg within the configured slot-table bound.
    OutOfSpillSlots {
        /// Index of the instruction whose operand forced the spill.
        inst: usize,
    },
    /// Stage 5 could not find or evict a real register of the class a
    /// vreg or hard-range entry required.
    NoRegForClass {
        /// Index of the instruction that needed the register.
        inst: usize,
    },
    /// A §3 sanity check failed at the top of an instruction iteration.
    /// This is a bug in the allocator, not in the caller's input.
    InternalInvariant {
        /// Index of the instruction at which the check failed.
        inst: usize,
        /// Which invariant, and what was observed.
        detail: String,
    },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::MalformedInput { inst, reason } => {
                write!(f, "instruction {}: malformed input: {}", inst, reason)
            }
            AllocError::OutOfSpillSlots { inst } => {
                write!(f, "instruction {}: out of spill slots", inst)
            }
            AllocError::NoRegForClass { inst } => write!(
                f,
                "instruction {}: no register available for the required class",
                inst
            ),
            AllocError::InternalInvariant { inst, detail } => write!(
                f,
                "instruction {}: internal invariant violated: {}",
                inst, detail
            ),
        }
    }
}

impl std::error::Error for AllocError {}

/// Result of a register-allocation call.
pub type AllocResult<T> = Result<T, AllocError>;
