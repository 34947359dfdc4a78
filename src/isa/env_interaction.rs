//! Environment-interaction family: the only instructions that may mutate a
//! cell other than the one IP currently occupies. Targets are always
//! `active_dp + unit_vector_operand`, wrapped toroidally — the same rule
//! `Environment::next_position` applies to IP advancement. `PEEK`, `POKE`,
//! and `PPK` each declare their write targets so the conflict resolver can
//! arbitrate contested cells before `execute` runs.

use smallvec::SmallVec;

use crate::coord::Coord;
use crate::environment::{Environment, EnvironmentError};
use crate::error::InstructionFailure;
use crate::molecule::Molecule;
use crate::organism::Organism;

use super::{ExecContext, Family, InstructionRegistryBuilder, OperandList, OperandSource, TargetKind};

fn to_failure(e: EnvironmentError) -> InstructionFailure {
    match e {
        EnvironmentError::OutOfBounds => InstructionFailure::OutOfBounds,
        EnvironmentError::EmptyCellMustBeUnowned => InstructionFailure::InvalidOperandType,
    }
}

fn require_unit_vector(c: &Coord) -> Result<(), InstructionFailure> {
    if c.as_unit().is_none() {
        return Err(InstructionFailure::UnitVectorRequired);
    }
    Ok(())
}

fn peek_target(organism: &Organism, env: &Environment, offset: &Coord) -> Coord {
    organism.registers.active_dp().wrapping_add(offset, env.shape())
}

/// Reads the cell at `active_dp + offset` into the destination register,
/// then clears both the molecule and its owner.
fn exec_peek(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let offset = ctx.operand(1).vector().ok_or(InstructionFailure::UnitVectorRequired)?.clone();
    require_unit_vector(&offset)?;
    let target = peek_target(ctx.organism, ctx.env, &offset);
    let m = ctx.env.get(&target).map_err(to_failure)?;
    ctx.env.set(&target, Molecule::empty(), 0).map_err(to_failure)?;
    ctx.organism.registers.write_scalar(&ctx.config.registers, dest_raw, m)
}

fn peek_targets(organism: &Organism, env: &Environment, operands: &OperandList) -> SmallVec<[(Coord, TargetKind); 2]> {
    match operands.get(1).and_then(|o| o.vector()) {
        Some(offset) if offset.as_unit().is_some() => {
            SmallVec::from_slice(&[(peek_target(organism, env, offset), TargetKind::Clear)])
        }
        _ => SmallVec::new(),
    }
}

/// Writes the source register's value into `active_dp + offset`; fails if
/// that cell is already non-empty, and never accepts a vector-valued source.
fn exec_poke(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let offset = ctx.operand(0).vector().ok_or(InstructionFailure::UnitVectorRequired)?.clone();
    require_unit_vector(&offset)?;
    let src = ctx.operand(1).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let target = peek_target(ctx.organism, ctx.env, &offset);
    let existing = ctx.env.get(&target).map_err(to_failure)?;
    if !existing.is_empty() {
        return Err(InstructionFailure::CellOccupied);
    }
    let owner = if src.is_empty() { 0 } else { ctx.organism.id };
    let written = if src.is_empty() {
        Molecule::empty()
    } else {
        Molecule::new(src.ty, src.value, ctx.organism.mr)
    };
    ctx.env.set(&target, written, owner).map_err(to_failure)
}

fn poke_targets(organism: &Organism, env: &Environment, operands: &OperandList) -> SmallVec<[(Coord, TargetKind); 2]> {
    match operands.first().and_then(|o| o.vector()) {
        Some(offset) if offset.as_unit().is_some() => {
            SmallVec::from_slice(&[(peek_target(organism, env, offset), TargetKind::Write)])
        }
        _ => SmallVec::new(),
    }
}

/// Combined PEEK+POKE in a single tick: reads `active_dp + peek_offset`
/// into the destination register (clearing it and its owner),
/// then writes the source register's value into `active_dp + poke_offset`.
/// The two target cells are independent; the conflict resolver arbitrates
/// each separately.
fn exec_ppk(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let peek_offset = ctx.operand(1).vector().ok_or(InstructionFailure::UnitVectorRequired)?.clone();
    let poke_offset = ctx.operand(2).vector().ok_or(InstructionFailure::UnitVectorRequired)?.clone();
    require_unit_vector(&peek_offset)?;
    require_unit_vector(&poke_offset)?;

    let peek_at = peek_target(ctx.organism, ctx.env, &peek_offset);
    let poke_at = peek_target(ctx.organism, ctx.env, &poke_offset);

    let peeked = ctx.env.get(&peek_at).map_err(to_failure)?;
    let src = ctx.operand(3).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let existing_at_poke = ctx.env.get(&poke_at).map_err(to_failure)?;
    if !existing_at_poke.is_empty() {
        return Err(InstructionFailure::CellOccupied);
    }

    ctx.env.set(&peek_at, Molecule::empty(), 0).map_err(to_failure)?;
    let owner = if src.is_empty() { 0 } else { ctx.organism.id };
    let written = if src.is_empty() {
        Molecule::empty()
    } else {
        Molecule::new(src.ty, src.value, ctx.organism.mr)
    };
    ctx.env.set(&poke_at, written, owner).map_err(to_failure)?;
    ctx.organism.registers.write_scalar(&ctx.config.registers, dest_raw, peeked)
}

fn ppk_targets(organism: &Organism, env: &Environment, operands: &OperandList) -> SmallVec<[(Coord, TargetKind); 2]> {
    let mut out = SmallVec::new();
    if let Some(offset) = operands.get(1).and_then(|o| o.vector()) {
        if offset.as_unit().is_some() {
            out.push((peek_target(organism, env, offset), TargetKind::Clear));
        }
    }
    if let Some(offset) = operands.get(2).and_then(|o| o.vector()) {
        if offset.as_unit().is_some() {
            out.push((peek_target(organism, env, offset), TargetKind::Write));
        }
    }
    out
}

pub fn register(b: &mut InstructionRegistryBuilder) {
    b.push_with_targets(
        "PEEK",
        Family::EnvInteraction,
        "R",
        vec![OperandSource::Register, OperandSource::Vector],
        false,
        exec_peek,
        peek_targets,
    );
    b.push_with_targets(
        "POKE",
        Family::EnvInteraction,
        "R",
        vec![OperandSource::Vector, OperandSource::Register],
        false,
        exec_poke,
        poke_targets,
    );
    b.push_with_targets(
        "PPK",
        Family::EnvInteraction,
        "R",
        vec![
            OperandSource::Register,
            OperandSource::Vector,
            OperandSource::Vector,
            OperandSource::Register,
        ],
        false,
        exec_ppk,
        ppk_targets,
    );
}
