//! Error taxonomy.
//!
//! `InstructionFailure` is per-instruction and never system-fatal: an
//! instruction that fails sets the organism's failure flag and reason and
//! execution continues, an explicit, non-unwinding `Result` rather than a
//! thrown exception. `RuntimeError` is system-fatal and aborts the tick it
//! occurs in.

use thiserror::Error;

/// Per-instruction failure. Stored on the organism as `failure_reason`;
/// never propagated as a Rust error out of `Vm::execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InstructionFailure {
    #[error("operand count does not match the declared operand sources")]
    InvalidOperandCount,
    #[error("operand type is not valid for this instruction")]
    InvalidOperandType,
    #[error("coordinate is out of bounds")]
    OutOfBounds,
    #[error("division by zero")]
    DivideByZero,
    #[error("data stack underflow")]
    StackUnderflow,
    #[error("data stack overflow")]
    StackOverflow,
    #[error("types must match under strict typing")]
    TypeMismatchStrict,
    #[error("a unit vector operand is required")]
    UnitVectorRequired,
    #[error("target cell is already occupied")]
    CellOccupied,
    #[error("no matching label within tolerance")]
    InvalidLabelHash,
    #[error("axis index is out of bounds")]
    AxisOutOfBounds,
    #[error("axes must be distinct")]
    AxesNotDistinct,
    #[error("direction vector is degenerate (zero or non-unit)")]
    DegenerateDirectionVector,
    #[error("location register index is invalid")]
    InvalidLR,
    #[error("unknown opcode")]
    UnknownOpcode,
    #[error("maximum nop-skip bound exceeded")]
    MaxSkipsExceeded,
}

/// System-fatal error. Aborts the tick in progress; the environment may be
/// left in an inconsistent state and the caller is expected to discard the
/// simulation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("coordinate {0:?} is out of bounds for shape {1:?}")]
    OutOfBounds(Vec<i64>, Vec<usize>),

    #[error("ownership invariant violated: {0}")]
    OwnershipInvariant(String),

    #[error("empty molecule written with a nonzero owner")]
    EmptyCellOwned,

    #[error("worker pool thread panicked: {0}")]
    WorkerPanic(String),

    #[error("scratch buffer allocation failed in birth handler: {0}")]
    PooledBufferExhausted(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
