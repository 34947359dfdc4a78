//! Conditional family: every variant evaluates a predicate and,
//! on `false`, calls `skip_next_instruction` — the following instruction is
//! skipped outright, not executed-with-no-effect. Each condition has an
//! `IFx`/`INx` pair where `INx` is the logical negation of `IFx`, sharing one
//! predicate function.
//!
//! - `IF`/`IN`, `LT`, `GT`, `LE`, `GE`: scalar value compare (RR).
//! - `IFT`/`INT`: molecule type compare (RR).
//! - `IFM`/`INM`, `IFP`/`INP`, `IFF`/`INF`, `IFV`/`INV`: cell-ownership
//!   predicates through a unit-vector operand applied to the active DP.
//! - `IFER`/`INER`: whether the *previous* instruction failed.

use crate::error::InstructionFailure;
use crate::molecule::Molecule;

use super::{ExecContext, Family, InstructionRegistryBuilder, OperandSource};

type ValuePredicate = fn(a: &Molecule, b: &Molecule) -> bool;

fn eq(a: &Molecule, b: &Molecule) -> bool {
    a.value == b.value
}
fn ne(a: &Molecule, b: &Molecule) -> bool {
    a.value != b.value
}
fn gt(a: &Molecule, b: &Molecule) -> bool {
    a.value > b.value
}
fn lt(a: &Molecule, b: &Molecule) -> bool {
    a.value < b.value
}
fn le(a: &Molecule, b: &Molecule) -> bool {
    a.value <= b.value
}
fn ge(a: &Molecule, b: &Molecule) -> bool {
    a.value >= b.value
}
fn same_type(a: &Molecule, b: &Molecule) -> bool {
    a.ty == b.ty
}
fn diff_type(a: &Molecule, b: &Molecule) -> bool {
    a.ty != b.ty
}

fn exec_value(ctx: &mut ExecContext, predicate: ValuePredicate) -> Result<(), InstructionFailure> {
    let a = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let b = ctx.operand(1).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    if !predicate(&a, &b) {
        ctx.organism.skip_next_instruction(ctx.env, ctx.registry);
    }
    Ok(())
}

macro_rules! value_compare {
    ($name:ident, $pred:expr) => {
        fn $name(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
            exec_value(ctx, $pred)
        }
    };
}

value_compare!(exec_if, eq);
value_compare!(exec_in, ne);
value_compare!(exec_lt, lt);
value_compare!(exec_gt, gt);
value_compare!(exec_le, le);
value_compare!(exec_ge, ge);
value_compare!(exec_ift, same_type);
value_compare!(exec_int, diff_type);

/// Shared by the `IFM/INM/IFP/INP/IFF/INF/IFV/INV` family: resolves the
/// target cell as `active_dp + unit_vector_operand` and classifies its
/// owner relative to `self_id`.
fn target_owner(ctx: &ExecContext) -> Result<(u32, crate::organism::OrganismId), InstructionFailure> {
    let delta = ctx.operand(0).vector().ok_or(InstructionFailure::UnitVectorRequired)?;
    if delta.as_unit().is_none() {
        return Err(InstructionFailure::UnitVectorRequired);
    }
    let target = ctx.organism.registers.active_dp().wrapping_add(delta, ctx.env.shape());
    let owner = ctx
        .env
        .get_owner(&target)
        .map_err(|_| InstructionFailure::OutOfBounds)?;
    Ok((0, owner))
}

fn exec_cell_predicate(
    ctx: &mut ExecContext,
    predicate: fn(owner: crate::organism::OrganismId, self_id: crate::organism::OrganismId) -> bool,
) -> Result<(), InstructionFailure> {
    let (_, owner) = target_owner(ctx)?;
    if !predicate(owner, ctx.organism.id) {
        ctx.organism.skip_next_instruction(ctx.env, ctx.registry);
    }
    Ok(())
}

fn owned_by_self(owner: crate::organism::OrganismId, self_id: crate::organism::OrganismId) -> bool {
    owner == self_id
}
fn not_owned_by_self(owner: crate::organism::OrganismId, self_id: crate::organism::OrganismId) -> bool {
    owner != self_id
}
fn passable(owner: crate::organism::OrganismId, self_id: crate::organism::OrganismId) -> bool {
    owner == 0 || owner == self_id
}
fn not_passable(owner: crate::organism::OrganismId, self_id: crate::organism::OrganismId) -> bool {
    !(owner == 0 || owner == self_id)
}
fn foreign(owner: crate::organism::OrganismId, self_id: crate::organism::OrganismId) -> bool {
    owner != 0 && owner != self_id
}
fn not_foreign(owner: crate::organism::OrganismId, self_id: crate::organism::OrganismId) -> bool {
    !(owner != 0 && owner != self_id)
}
fn vacant(owner: crate::organism::OrganismId, _self_id: crate::organism::OrganismId) -> bool {
    owner == 0
}
fn not_vacant(owner: crate::organism::OrganismId, _self_id: crate::organism::OrganismId) -> bool {
    owner != 0
}

fn exec_ifm(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    exec_cell_predicate(ctx, owned_by_self)
}
fn exec_inm(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    exec_cell_predicate(ctx, not_owned_by_self)
}
fn exec_ifp(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    exec_cell_predicate(ctx, passable)
}
fn exec_inp(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    exec_cell_predicate(ctx, not_passable)
}
fn exec_iff(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    exec_cell_predicate(ctx, foreign)
}
fn exec_inf(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    exec_cell_predicate(ctx, not_foreign)
}
fn exec_ifv(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    exec_cell_predicate(ctx, vacant)
}
fn exec_inv(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    exec_cell_predicate(ctx, not_vacant)
}

fn exec_ifer(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    if !ctx.organism.previous_instruction_failed {
        ctx.organism.skip_next_instruction(ctx.env, ctx.registry);
    }
    Ok(())
}

fn exec_iner(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    if ctx.organism.previous_instruction_failed {
        ctx.organism.skip_next_instruction(ctx.env, ctx.registry);
    }
    Ok(())
}

pub fn register(b: &mut InstructionRegistryBuilder) {
    let rr = vec![OperandSource::Register, OperandSource::Register];
    b.push("IF", Family::Conditional, "RR", rr.clone(), false, exec_if);
    b.push("IN", Family::Conditional, "RR", rr.clone(), false, exec_in);
    b.push("LT", Family::Conditional, "RR", rr.clone(), false, exec_lt);
    b.push("GT", Family::Conditional, "RR", rr.clone(), false, exec_gt);
    b.push("LE", Family::Conditional, "RR", rr.clone(), false, exec_le);
    b.push("GE", Family::Conditional, "RR", rr.clone(), false, exec_ge);
    b.push("IFT", Family::Conditional, "RR", rr.clone(), false, exec_ift);
    b.push("INT", Family::Conditional, "RR", rr, false, exec_int);

    let v = vec![OperandSource::Vector];
    b.push("IFM", Family::Conditional, "V", v.clone(), false, exec_ifm);
    b.push("INM", Family::Conditional, "V", v.clone(), false, exec_inm);
    b.push("IFP", Family::Conditional, "V", v.clone(), false, exec_ifp);
    b.push("INP", Family::Conditional, "V", v.clone(), false, exec_inp);
    b.push("IFF", Family::Conditional, "V", v.clone(), false, exec_iff);
    b.push("INF", Family::Conditional, "V", v.clone(), false, exec_inf);
    b.push("IFV", Family::Conditional, "V", v.clone(), false, exec_ifv);
    b.push("INV", Family::Conditional, "V", v, false, exec_inv);

    b.push("IFER", Family::Conditional, "-", vec![], false, exec_ifer);
    b.push("INER", Family::Conditional, "-", vec![], false, exec_iner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::coord::Coord;
    use crate::environment::Environment;
    use crate::isa::{ConflictStatus, InstructionRegistry, OperandList, OperandValue, ResolvedOperand};
    use crate::molecule::MoleculeType;
    use crate::organism::Organism;
    use crate::program::ProgramArtifact;

    fn setup() -> (Organism, Environment, Config) {
        let config = Config { shape: vec![8, 8], ..Config::default() };
        let mut env = Environment::from_config(&config.molecule, config.shape.clone(), config.topology);
        let program = ProgramArtifact::new("t");
        let organism = Organism::new(
            1,
            &program,
            Coord::from_slice(&[0, 0]),
            Coord::from_slice(&[1, 0]),
            &config.registers,
            &config.limits,
            0,
            &mut env,
        )
        .unwrap();
        (organism, env, config)
    }

    #[test]
    fn ifer_skips_when_previous_instruction_succeeded() {
        let (mut organism, mut env, config) = setup();
        organism.previous_instruction_failed = false;
        let registry = InstructionRegistry::build();
        let operands: OperandList = Default::default();
        let before_ip = organism.ip.clone();
        let mut ctx = ExecContext {
            organism: &mut organism,
            env: &mut env,
            operands: &operands,
            config: &config,
            status: ConflictStatus::NotApplicable,
            registry: &registry,
        };
        exec_ifer(&mut ctx).unwrap();
        // Skip moved IP further than a single plain advance would.
        assert_ne!(ctx.organism.ip, before_ip);
        assert!(ctx.organism.skip_ip_advance);
    }

    #[test]
    fn value_compare_skips_next_on_false_condition() {
        let (mut organism, mut env, config) = setup();
        let operands: OperandList = vec![
            ResolvedOperand {
                source: OperandSource::Register,
                raw_id: 0,
                value: OperandValue::Scalar(Molecule::new(MoleculeType::Data, 1, 0)),
            },
            ResolvedOperand {
                source: OperandSource::Register,
                raw_id: 1,
                value: OperandValue::Scalar(Molecule::new(MoleculeType::Data, 2, 0)),
            },
        ]
        .into();
        let registry = InstructionRegistry::build();
        let mut ctx = ExecContext {
            organism: &mut organism,
            env: &mut env,
            operands: &operands,
            config: &config,
            status: ConflictStatus::NotApplicable,
            registry: &registry,
        };
        exec_if(&mut ctx).unwrap();
        assert!(ctx.organism.skip_ip_advance);
    }
}
