//! Location family: the location stack (`LPUSH`/`LPOP`), loading a location
//! register from the location stack's top (`LLOAD`), switching the active
//! data pointer (`DPSET`) and reading it back (`DPGET`), and a label-presence
//! skip (`SKJ`) — grouped here per this family's generic "addressing and
//! control" remit.

use crate::error::InstructionFailure;
use crate::label::resolve_label;
use crate::molecule::{Molecule, MoleculeType};

use super::{ExecContext, Family, InstructionRegistryBuilder, OperandSource};

fn exec_lpush(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let v = ctx.operand(0).vector().ok_or(InstructionFailure::InvalidOperandType)?.clone();
    ctx.organism.location_stack.push(v);
    Ok(())
}

fn exec_lpop(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let v = ctx.organism.location_stack.pop()?;
    ctx.organism.registers.write_location(&ctx.config.registers, dest_raw, v)
}

fn exec_lload(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let v = ctx.organism.location_stack.pop()?;
    ctx.organism.location_stack.push(v.clone());
    ctx.organism.registers.write_location(&ctx.config.registers, dest_raw, v)
}

fn exec_dpset(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let idx = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?.value as usize;
    if idx >= ctx.organism.registers.dp.len() {
        return Err(InstructionFailure::InvalidOperandType);
    }
    ctx.organism.registers.active_dp = idx;
    Ok(())
}

fn exec_dpget(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let idx = ctx.organism.registers.active_dp as i32;
    let m = Molecule::new(MoleculeType::Data, idx, 0);
    ctx.organism.registers.write_scalar(&ctx.config.registers, dest_raw, m)
}

/// Moves the active DP to a fuzzy-matched label position, rejecting any
/// match owned by a different, non-zero organism; skips the following
/// instruction when no eligible match exists.
fn exec_skj(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let hash = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?.value as u32;
    let target = resolve_label(ctx.env, &ctx.config.labels, &ctx.organism.ip, ctx.organism.id, hash)
        .filter(|coord| {
            let owner = ctx.env.get_owner(coord).unwrap_or(0);
            owner == 0 || owner == ctx.organism.id
        });
    match target {
        Some(coord) => *ctx.organism.registers.active_dp_mut() = coord,
        None => ctx.organism.skip_next_instruction(ctx.env, ctx.registry),
    }
    Ok(())
}

pub fn register(b: &mut InstructionRegistryBuilder) {
    b.push("LPUSH", Family::Location, "V", vec![OperandSource::Vector], false, exec_lpush);
    b.push("LPOP", Family::Location, "R", vec![OperandSource::Register], false, exec_lpop);
    b.push("LLOAD", Family::Location, "R", vec![OperandSource::Register], false, exec_lload);
    b.push(
        "DPSET",
        Family::Location,
        "R",
        vec![OperandSource::Register],
        false,
        exec_dpset,
    );
    b.push(
        "DPGET",
        Family::Location,
        "R",
        vec![OperandSource::Register],
        false,
        exec_dpget,
    );
    b.push("SKJ", Family::Location, "L", vec![OperandSource::Label], false, exec_skj);
}
