//! Data/call/location stacks.
//!
//! The data stack holds either a scalar molecule or a coordinate; these are
//! never overloaded onto a single integer representation, so `StackValue`
//! is a genuine sum type.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::coord::Coord;
use crate::error::InstructionFailure;
use crate::molecule::Molecule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StackValue {
    Scalar(Molecule),
    Vector(Coord),
}

impl StackValue {
    pub fn as_scalar(&self) -> Option<Molecule> {
        match self {
            StackValue::Scalar(m) => Some(*m),
            StackValue::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&Coord> {
        match self {
            StackValue::Vector(c) => Some(c),
            StackValue::Scalar(_) => None,
        }
    }
}

/// General LIFO data stack with a configured maximum depth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataStack {
    values: Vec<StackValue>,
    max_depth: usize,
}

impl DataStack {
    pub fn new(max_depth: usize) -> Self {
        DataStack {
            values: Vec::new(),
            max_depth,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: StackValue) -> Result<(), InstructionFailure> {
        if self.values.len() >= self.max_depth {
            return Err(InstructionFailure::StackOverflow);
        }
        self.values.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<StackValue, InstructionFailure> {
        self.values.pop().ok_or(InstructionFailure::StackUnderflow)
    }

    pub fn peek(&self) -> Result<&StackValue, InstructionFailure> {
        self.values.last().ok_or(InstructionFailure::StackUnderflow)
    }

    /// `DUP`: duplicates the top value.
    pub fn dup(&mut self) -> Result<(), InstructionFailure> {
        let top = self.peek()?.clone();
        self.push(top)
    }

    /// `SWAP`: exchanges the top two values.
    pub fn swap(&mut self) -> Result<(), InstructionFailure> {
        let len = self.values.len();
        if len < 2 {
            return Err(InstructionFailure::StackUnderflow);
        }
        self.values.swap(len - 1, len - 2);
        Ok(())
    }

    /// `DROP`: discards the top value.
    pub fn drop_top(&mut self) -> Result<(), InstructionFailure> {
        self.pop().map(|_| ())
    }

    /// `ROT`: `[A, B, C] -> [B, C, A]` where `C` is the top of stack.
    pub fn rot(&mut self) -> Result<(), InstructionFailure> {
        let len = self.values.len();
        if len < 3 {
            return Err(InstructionFailure::StackUnderflow);
        }
        self.values[len - 3..].rotate_left(1);
        Ok(())
    }

    /// Pops `dims` scalars for `VBLD`/`VBLS`; index 0 is the first value
    /// popped (i.e. what was on top of the stack).
    pub fn pop_scalars(&mut self, dims: usize) -> Result<SmallVec<[i64; 4]>, InstructionFailure> {
        let mut out = SmallVec::with_capacity(dims);
        for _ in 0..dims {
            let v = self.pop()?;
            let scalar = v.as_scalar().ok_or(InstructionFailure::InvalidOperandType)?;
            out.push(scalar.value as i64);
        }
        Ok(out)
    }
}

/// One activation record pushed by `CALL`, popped by `RET` or by stall
/// recovery in `skip_nop_cells`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFrame {
    pub proc_label_hash: u32,
    pub return_ip: Coord,
    pub call_ip: Coord,
    pub saved_pr: Vec<Molecule>,
    pub saved_fpr: Vec<Molecule>,
    pub saved_locals: Vec<StackValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallStack(Vec<CallFrame>);

impl CallStack {
    pub fn push(&mut self, frame: CallFrame) {
        self.0.push(frame);
    }

    pub fn pop(&mut self) -> Option<CallFrame> {
        self.0.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationStack(Vec<Coord>);

impl LocationStack {
    pub fn push(&mut self, coord: Coord) {
        self.0.push(coord);
    }

    pub fn pop(&mut self) -> Result<Coord, InstructionFailure> {
        self.0.pop().ok_or(InstructionFailure::StackUnderflow)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
