//! Vector family: component access on location registers, construction
//! to/from the data stack, and conversion between a unit vector and its
//! single-bit direction-mask encoding. Vectors here are free-standing
//! coordinate registers, not absolute grid positions, so component writes
//! and rotation do not wrap (wrapping is applied only when a vector is
//! later used to address the grid).

use crate::coord::Coord;
use crate::error::InstructionFailure;
use crate::molecule::{Molecule, MoleculeType};
use crate::organism::StackValue;

use super::{ExecContext, Family, InstructionRegistryBuilder, OperandSource};

fn axis_of(m: Molecule) -> i64 {
    m.value as i64
}

/// `VGT`: reads component `axis` of location register `src` into a data
/// register.
fn exec_vgt(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let src = ctx.operand(1).vector().ok_or(InstructionFailure::InvalidOperandType)?.clone();
    let axis = axis_of(ctx.operand(2).scalar().ok_or(InstructionFailure::InvalidOperandType)?);
    if axis < 0 || axis as usize >= src.dims() {
        return Err(InstructionFailure::AxisOutOfBounds);
    }
    let value = Molecule::new(MoleculeType::Data, src[axis as usize] as i32, 0);
    ctx.organism.registers.write_scalar(&ctx.config.registers, dest_raw, value)
}

/// `VST`: overwrites component `axis` of location register `dest` with a
/// scalar value, leaving the other components untouched.
fn exec_vst(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let mut dest = ctx.operand(0).vector().ok_or(InstructionFailure::InvalidOperandType)?.clone();
    let axis = axis_of(ctx.operand(1).scalar().ok_or(InstructionFailure::InvalidOperandType)?);
    let value = ctx.operand(2).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    if axis < 0 || axis as usize >= dest.dims() {
        return Err(InstructionFailure::AxisOutOfBounds);
    }
    dest[axis as usize] = value.value as i64;
    ctx.organism.registers.write_location(&ctx.config.registers, dest_raw, dest)
}

/// Pops `dims` scalars off the data stack (top-first) and assembles them,
/// in pop order, into the destination location register.
fn exec_vbld(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let dims = ctx.organism.ip.dims();
    let values = ctx.organism.data_stack.pop_scalars(dims)?;
    let result = Coord::from_slice(&values);
    ctx.organism.registers.write_location(&ctx.config.registers, dest_raw, result)
}

/// Pushes a location register's components onto the data stack so that a
/// following `VBLD` reconstructs the same vector (last axis pushed first,
/// so axis 0 ends up on top and is popped first).
fn exec_vbls(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let v = ctx.operand(0).vector().ok_or(InstructionFailure::InvalidOperandType)?.clone();
    for axis in (0..v.dims()).rev() {
        ctx.organism
            .data_stack
            .push(StackValue::Scalar(Molecule::new(MoleculeType::Data, v[axis] as i32, 0)))?;
    }
    Ok(())
}

/// `B2V`: decodes a single-bit direction mask into a unit vector. Bit
/// `2*axis` encodes the positive direction along `axis`, bit `2*axis + 1`
/// the negative direction; exactly one bit must be set.
fn exec_b2v(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let mask = ctx.operand(1).scalar().ok_or(InstructionFailure::InvalidOperandType)?.value as u32;
    let dims = ctx.organism.dv.dims();
    if mask == 0 || (mask & (mask - 1)) != 0 {
        return Err(InstructionFailure::DegenerateDirectionVector);
    }
    let bit = mask.trailing_zeros() as usize;
    let axis = bit / 2;
    let positive = bit % 2 == 0;
    let unit = Coord::unit(dims, axis, positive).ok_or(InstructionFailure::AxisOutOfBounds)?;
    ctx.organism.registers.write_location(&ctx.config.registers, dest_raw, unit)
}

/// `V2B`: the inverse of `B2V`. Only accepts a genuine unit vector (exactly
/// one component, magnitude 1).
fn exec_v2b(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let v = ctx.operand(1).vector().ok_or(InstructionFailure::InvalidOperandType)?.clone();
    let (axis, positive) = v.as_unit().ok_or(InstructionFailure::UnitVectorRequired)?;
    let bit = axis * 2 + if positive { 0 } else { 1 };
    let mask = Molecule::new(MoleculeType::Data, (1u32 << bit) as i32, 0);
    ctx.organism.registers.write_scalar(&ctx.config.registers, dest_raw, mask)
}

/// `RTR`: rotates a vector 90 degrees in the plane of two given axes,
/// `(v_i, v_j) <- (v_j, -v_i)`. Axes must be distinct and within the
/// vector's own dimensionality.
fn exec_rtr(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let mut v = ctx.operand(0).vector().ok_or(InstructionFailure::InvalidOperandType)?.clone();
    let axis_i = axis_of(ctx.operand(1).scalar().ok_or(InstructionFailure::InvalidOperandType)?);
    let axis_j = axis_of(ctx.operand(2).scalar().ok_or(InstructionFailure::InvalidOperandType)?);
    if axis_i < 0 || axis_j < 0 || axis_i as usize >= v.dims() || axis_j as usize >= v.dims() {
        return Err(InstructionFailure::AxisOutOfBounds);
    }
    if axis_i == axis_j {
        return Err(InstructionFailure::AxesNotDistinct);
    }
    let (i, j) = (axis_i as usize, axis_j as usize);
    let (vi, vj) = (v[i], v[j]);
    v[i] = vj;
    v[j] = -vi;
    ctx.organism.registers.write_location(&ctx.config.registers, dest_raw, v)
}

pub fn register(b: &mut InstructionRegistryBuilder) {
    b.push(
        "VGT",
        Family::Vector,
        "RI",
        vec![OperandSource::Register, OperandSource::LocationRegister, OperandSource::Immediate],
        false,
        exec_vgt,
    );
    b.push(
        "VGT",
        Family::Vector,
        "RR",
        vec![OperandSource::Register, OperandSource::LocationRegister, OperandSource::Register],
        false,
        exec_vgt,
    );
    b.push(
        "VST",
        Family::Vector,
        "RI",
        vec![OperandSource::LocationRegister, OperandSource::Immediate, OperandSource::Register],
        false,
        exec_vst,
    );
    b.push(
        "VST",
        Family::Vector,
        "RR",
        vec![OperandSource::LocationRegister, OperandSource::Register, OperandSource::Register],
        false,
        exec_vst,
    );
    b.push(
        "VBLD",
        Family::Vector,
        "R",
        vec![OperandSource::LocationRegister],
        false,
        exec_vbld,
    );
    b.push(
        "VBLS",
        Family::Vector,
        "R",
        vec![OperandSource::LocationRegister],
        false,
        exec_vbls,
    );
    b.push(
        "B2V",
        Family::Vector,
        "RI",
        vec![OperandSource::LocationRegister, OperandSource::Immediate],
        false,
        exec_b2v,
    );
    b.push(
        "B2V",
        Family::Vector,
        "RR",
        vec![OperandSource::LocationRegister, OperandSource::Register],
        false,
        exec_b2v,
    );
    b.push(
        "V2B",
        Family::Vector,
        "R",
        vec![OperandSource::Register, OperandSource::LocationRegister],
        false,
        exec_v2b,
    );
    b.push(
        "RTR",
        Family::Vector,
        "RI",
        vec![OperandSource::LocationRegister, OperandSource::Immediate, OperandSource::Immediate],
        false,
        exec_rtr,
    );
    b.push(
        "RTR",
        Family::Vector,
        "RR",
        vec![OperandSource::LocationRegister, OperandSource::Register, OperandSource::Register],
        false,
        exec_rtr,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::coord::Coord;
    use crate::environment::Environment;
    use crate::isa::REGISTRY;
    use crate::molecule::MoleculeLayout;
    use crate::organism::Organism;
    use crate::program::ProgramArtifact;
    use crate::vm::{execute_one, plan_one};

    fn setup(opcode_mnemonic: &str, variant: &str, extra_words: &[u32]) -> (Organism, Environment, Config) {
        let mut env = Environment::from_config(&crate::config::MoleculeConfig::default(), vec![32, 32], crate::config::Topology::Torus);
        let layout = MoleculeLayout::default();
        let op_id = REGISTRY.id_of(opcode_mnemonic, variant).unwrap();
        let mut program = ProgramArtifact::new("p").with_code(Coord::from_slice(&[0, 0]), layout.pack(crate::molecule::MoleculeType::Code, op_id, 0));
        for (i, &w) in extra_words.iter().enumerate() {
            program = program.with_code(Coord::from_slice(&[(i + 1) as i64, 0]), w);
        }
        let organism = Organism::new(
            1,
            &program,
            Coord::from_slice(&[0, 0]),
            Coord::from_slice(&[1, 0]),
            &crate::config::RegisterConfig::default(),
            &crate::config::LimitsConfig::default(),
            0,
            &mut env,
        )
        .unwrap();
        let config = Config { shape: vec![32, 32], ..Config::default() };
        (organism, env, config)
    }

    #[test]
    fn b2v_then_v2b_round_trips_a_unit_vector() {
        let layout = MoleculeLayout::default();
        // bit 2 = axis 1, positive.
        let mask_word = layout.pack(crate::molecule::MoleculeType::Data, 0b0100, 0);
        let (mut organism, mut env, config) = setup("B2V", "RI", &[mask_word]);
        let policy = crate::thermodynamics::ThermodynamicPolicy::default();
        let planned = plan_one(&mut organism, &env, &config, &REGISTRY).unwrap();
        execute_one(&mut organism, &mut env, &config, &REGISTRY, &policy, &planned, crate::isa::ConflictStatus::NotApplicable);
        assert!(!organism.failed);
        assert_eq!(organism.registers.lr[0], Coord::unit(2, 1, true).unwrap());
    }

    #[test]
    fn rtr_rejects_non_distinct_axes() {
        let layout = MoleculeLayout::default();
        let axis_i = layout.pack(crate::molecule::MoleculeType::Data, 0, 0);
        let axis_j = layout.pack(crate::molecule::MoleculeType::Data, 0, 0);
        let (mut organism, mut env, config) = setup("RTR", "RI", &[axis_i, axis_j]);
        organism.registers.lr[0] = Coord::from_slice(&[3, 4]);
        let policy = crate::thermodynamics::ThermodynamicPolicy::default();
        let planned = plan_one(&mut organism, &env, &config, &REGISTRY).unwrap();
        execute_one(&mut organism, &mut env, &config, &REGISTRY, &policy, &planned, crate::isa::ConflictStatus::NotApplicable);
        assert_eq!(organism.failure_reason, Some(InstructionFailure::AxesNotDistinct));
    }

    #[test]
    fn rtr_rotates_the_named_plane() {
        let layout = MoleculeLayout::default();
        let axis_i = layout.pack(crate::molecule::MoleculeType::Data, 0, 0);
        let axis_j = layout.pack(crate::molecule::MoleculeType::Data, 1, 0);
        let (mut organism, mut env, config) = setup("RTR", "RI", &[axis_i, axis_j]);
        organism.registers.lr[0] = Coord::from_slice(&[3, 4]);
        let policy = crate::thermodynamics::ThermodynamicPolicy::default();
        let planned = plan_one(&mut organism, &env, &config, &REGISTRY).unwrap();
        execute_one(&mut organism, &mut env, &config, &REGISTRY, &policy, &planned, crate::isa::ConflictStatus::NotApplicable);
        assert!(!organism.failed);
        assert_eq!(organism.registers.lr[0], Coord::from_slice(&[4, -3]));
    }
}
