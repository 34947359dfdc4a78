//! Instruction set: decoding, operand resolution, execution of ~90 opcodes
//! across 9 family groups (NOP; Data+Stack sharing a family id; Arithmetic;
//! Bitwise; Conditional; Vector; Environment-interaction; Control-flow;
//! Location).
//!
//! Opcodes are modeled as a tagged variant (family + operand-source vector)
//! with a per-family execute function table, not as a class hierarchy. The
//! registry is an immutable, process-wide table built once by a builder and
//! shared by reference thereafter.

pub mod operand;

pub mod arithmetic;
pub mod bitwise;
pub mod conditional;
pub mod control_flow;
pub mod data;
pub mod env_interaction;
pub mod location;
pub mod nop;
pub mod stack_ops;
pub mod vector;

use std::collections::HashMap;

use lazy_static::lazy_static;
use smallvec::SmallVec;

use crate::config::Config;
use crate::coord::Coord;
use crate::environment::Environment;
use crate::error::InstructionFailure;
use crate::organism::Organism;

pub use operand::{OperandList, OperandSource, OperandValue, ResolvedOperand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Nop,
    Data,
    Arithmetic,
    Bitwise,
    Conditional,
    Vector,
    EnvInteraction,
    ControlFlow,
    Location,
}

/// Outcome of `resolve_conflicts` as seen by the executing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStatus {
    NotApplicable,
    WonExecution,
    LostConflict,
    LostTargetOccupied,
}

/// Mutable execution context passed to every family's exec function.
pub struct ExecContext<'a> {
    pub organism: &'a mut Organism,
    pub env: &'a mut Environment,
    pub operands: &'a OperandList,
    pub config: &'a Config,
    pub status: ConflictStatus,
    pub registry: &'a InstructionRegistry,
}

impl<'a> ExecContext<'a> {
    pub fn operand(&self, i: usize) -> &ResolvedOperand {
        &self.operands[i]
    }
}

/// Whether a declared target cell must be empty before this tick's write is
/// legal. `Write` targets (e.g. POKE's destination) are checked against the
/// environment's pre-tick occupancy by the conflict resolver, which assigns
/// every claim on an already-occupied `Write` target `LostTargetOccupied`
/// regardless of contention. `Clear` targets (e.g. PEEK's source, which is
/// read and then emptied) carry no such requirement — an owned, non-empty
/// cell is their ordinary case, not a failure — so they only ever compete
/// for the normal same-tick-contention outcome (`WonExecution`/
/// `LostConflict`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Write,
    Clear,
}

pub type ExecFn = fn(&mut ExecContext) -> Result<(), InstructionFailure>;
pub type TargetFn = fn(&Organism, &Environment, &OperandList) -> SmallVec<[(Coord, TargetKind); 2]>;

fn no_targets(_o: &Organism, _e: &Environment, _ops: &OperandList) -> SmallVec<[(Coord, TargetKind); 2]> {
    SmallVec::new()
}

pub struct InstructionDef {
    pub id: i32,
    pub mnemonic: &'static str,
    pub family: Family,
    pub variant: &'static str,
    pub operands: Vec<OperandSource>,
    pub is_nop: bool,
    pub exec: ExecFn,
    pub targets: TargetFn,
}

impl InstructionDef {
    pub fn is_nop(&self) -> bool {
        self.is_nop
    }

    /// The authoritative length rule: `1 + Σ slot_count(operand_i)`.
    pub fn grid_length(&self, dims: usize) -> usize {
        1 + self
            .operands
            .iter()
            .map(|o| o.slot_count(dims))
            .sum::<usize>()
    }
}

pub struct InstructionRegistryBuilder {
    pub(crate) defs: Vec<InstructionDef>,
}

impl InstructionRegistryBuilder {
    pub(crate) fn new() -> Self {
        InstructionRegistryBuilder { defs: Vec::new() }
    }

    pub fn push(
        &mut self,
        mnemonic: &'static str,
        family: Family,
        variant: &'static str,
        operands: Vec<OperandSource>,
        is_nop: bool,
        exec: ExecFn,
    ) {
        self.push_with_targets(mnemonic, family, variant, operands, is_nop, exec, no_targets);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push_with_targets(
        &mut self,
        mnemonic: &'static str,
        family: Family,
        variant: &'static str,
        operands: Vec<OperandSource>,
        is_nop: bool,
        exec: ExecFn,
        targets: TargetFn,
    ) {
        let id = (self.defs.len() + 1) as i32;
        self.defs.push(InstructionDef {
            id,
            mnemonic,
            family,
            variant,
            operands,
            is_nop,
            exec,
            targets,
        });
    }
}

pub struct InstructionRegistry {
    by_id: HashMap<i32, InstructionDef>,
    by_name: HashMap<(&'static str, &'static str), i32>,
}

impl InstructionRegistry {
    pub fn lookup(&self, opcode_id: i32) -> Option<&InstructionDef> {
        self.by_id.get(&opcode_id)
    }

    pub fn id_of(&self, mnemonic: &'static str, variant: &'static str) -> Option<i32> {
        self.by_name.get(&(mnemonic, variant)).copied()
    }

    /// Total number of registered opcodes. IDs are assigned contiguously
    /// starting at 1, so `1..=len()` enumerates every valid opcode id.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn build() -> Self {
        let mut b = InstructionRegistryBuilder::new();
        nop::register(&mut b);
        data::register(&mut b);
        stack_ops::register(&mut b);
        arithmetic::register(&mut b);
        bitwise::register(&mut b);
        conditional::register(&mut b);
        vector::register(&mut b);
        env_interaction::register(&mut b);
        control_flow::register(&mut b);
        location::register(&mut b);

        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for def in b.defs {
            by_name.insert((def.mnemonic, def.variant), def.id);
            by_id.insert(def.id, def);
        }
        InstructionRegistry { by_id, by_name }
    }
}

lazy_static! {
    /// Process-wide, read-only instruction registry, built once at first
    /// use.
    pub static ref REGISTRY: InstructionRegistry = InstructionRegistry::build();
}
