//! Operand sources and resolved operand values.

use smallvec::SmallVec;

use crate::coord::Coord;
use crate::molecule::Molecule;
use crate::organism::StackValue;

/// The kind of source an instruction's declared operand is drawn from.
/// `Stack` operands are never encoded in the instruction stream; `Vector`
/// operands occupy `dims` grid slots; `Label` occupies exactly one slot (a
/// single packed hash, not one slot per dimension); every other kind
/// occupies exactly one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSource {
    Register,
    Immediate,
    Vector,
    Stack,
    Label,
    LocationRegister,
}

impl OperandSource {
    pub fn slot_count(self, dims: usize) -> usize {
        match self {
            OperandSource::Stack => 0,
            OperandSource::Vector => dims,
            OperandSource::Label
            | OperandSource::Register
            | OperandSource::Immediate
            | OperandSource::LocationRegister => 1,
        }
    }
}

/// A resolved operand value as seen by interceptors, the conflict resolver,
/// and the executing instruction: carries both the raw source id (which
/// register, -1 if not register-addressed) and the value read at Plan time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOperand {
    pub source: OperandSource,
    pub raw_id: i64,
    pub value: OperandValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperandValue {
    Scalar(Molecule),
    Vector(Coord),
    Stack(StackValue),
}

impl ResolvedOperand {
    pub fn scalar(&self) -> Option<Molecule> {
        match &self.value {
            OperandValue::Scalar(m) => Some(*m),
            OperandValue::Stack(StackValue::Scalar(m)) => Some(*m),
            _ => None,
        }
    }

    pub fn vector(&self) -> Option<&Coord> {
        match &self.value {
            OperandValue::Vector(c) => Some(c),
            OperandValue::Stack(StackValue::Vector(c)) => Some(c),
            _ => None,
        }
    }
}

pub type OperandList = SmallVec<[ResolvedOperand; 4]>;
