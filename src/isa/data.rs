//! Data family: SET (R←R, R←IMM, R←VECTOR), PUSH (R, IMM, VECTOR), POP (R).

use crate::error::InstructionFailure;
use crate::molecule::{Molecule, MoleculeType};
use crate::organism::StackValue;

use super::{ExecContext, Family, InstructionRegistryBuilder, OperandSource, OperandValue};

fn dest_raw_id(ctx: &ExecContext) -> u32 {
    ctx.operand(0).raw_id as u32
}

fn exec_set_r(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let src = ctx.operand(1).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let dest = dest_raw_id(ctx);
    ctx.organism.registers.write_scalar(&ctx.config.registers, dest, src)
}

fn exec_set_i(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    exec_set_r(ctx)
}

fn exec_set_v(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let src = ctx.operand(1).vector().ok_or(InstructionFailure::InvalidOperandType)?.clone();
    let dest = dest_raw_id(ctx);
    ctx.organism
        .registers
        .write_location(&ctx.config.registers, dest, src)
}

fn exec_push_r(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let v = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    if v.is_empty() {
        return Err(InstructionFailure::InvalidOperandType);
    }
    ctx.organism.data_stack.push(StackValue::Scalar(v))
}

fn exec_push_i(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    exec_push_r(ctx)
}

fn exec_push_v(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let v = ctx.operand(0).vector().ok_or(InstructionFailure::InvalidOperandType)?.clone();
    ctx.organism.data_stack.push(StackValue::Vector(v))
}

fn exec_pop(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let value = ctx.organism.data_stack.pop()?;
    let dest = dest_raw_id(ctx);
    match value {
        StackValue::Scalar(m) => ctx.organism.registers.write_scalar(&ctx.config.registers, dest, m),
        StackValue::Vector(c) => ctx
            .organism
            .registers
            .write_location(&ctx.config.registers, dest, c),
    }
}

pub fn register(b: &mut InstructionRegistryBuilder) {
    b.push(
        "SET",
        Family::Data,
        "R",
        vec![OperandSource::Register, OperandSource::Register],
        false,
        exec_set_r,
    );
    b.push(
        "SET",
        Family::Data,
        "I",
        vec![OperandSource::Register, OperandSource::Immediate],
        false,
        exec_set_i,
    );
    b.push(
        "SET",
        Family::Data,
        "V",
        vec![OperandSource::LocationRegister, OperandSource::Vector],
        false,
        exec_set_v,
    );
    b.push(
        "PUSH",
        Family::Data,
        "R",
        vec![OperandSource::Register],
        false,
        exec_push_r,
    );
    b.push(
        "PUSH",
        Family::Data,
        "I",
        vec![OperandSource::Immediate],
        false,
        exec_push_i,
    );
    b.push(
        "PUSH",
        Family::Data,
        "V",
        vec![OperandSource::Vector],
        false,
        exec_push_v,
    );
    b.push(
        "POP",
        Family::Data,
        "R",
        vec![OperandSource::Register],
        false,
        exec_pop,
    );
}

/// Helper reused by other families: reads an operand as a scalar molecule
/// regardless of whether it came from a register, immediate, or the stack.
pub(crate) fn scalar_of(op: &super::ResolvedOperand) -> Option<Molecule> {
    match &op.value {
        OperandValue::Scalar(m) => Some(*m),
        OperandValue::Stack(StackValue::Scalar(m)) => Some(*m),
        _ => None,
    }
}

pub(crate) const fn is_data_type(ty: MoleculeType) -> bool {
    matches!(ty, MoleculeType::Data)
}
