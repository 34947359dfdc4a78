//! Arithmetic family: ADD/SUB/MUL/DIV/MOD, each with RR (register-register),
//! RI (register-immediate), and SS (stack-stack) variants. All arithmetic
//! operates on the VALUE_BITS signed-scalar view of a molecule.

use crate::error::InstructionFailure;
use crate::molecule::Molecule;
use crate::organism::StackValue;

use super::{ExecContext, Family, InstructionRegistryBuilder, OperandSource};

type Combine = fn(i64, i64) -> Result<i64, InstructionFailure>;

fn add(a: i64, b: i64) -> Result<i64, InstructionFailure> {
    Ok(a + b)
}
fn sub(a: i64, b: i64) -> Result<i64, InstructionFailure> {
    Ok(a - b)
}
fn mul(a: i64, b: i64) -> Result<i64, InstructionFailure> {
    Ok(a * b)
}
fn div(a: i64, b: i64) -> Result<i64, InstructionFailure> {
    if b == 0 {
        return Err(InstructionFailure::DivideByZero);
    }
    Ok(a / b)
}
fn rem(a: i64, b: i64) -> Result<i64, InstructionFailure> {
    if b == 0 {
        return Err(InstructionFailure::DivideByZero);
    }
    Ok(a % b)
}

/// Combines two scalar molecules honoring `STRICT_TYPING`: a type mismatch
/// fails outright under strict typing; otherwise the result inherits the
/// type of the first operand (`a`).
fn combine(
    strict_typing: bool,
    a: Molecule,
    b: Molecule,
    op: Combine,
) -> Result<Molecule, InstructionFailure> {
    if strict_typing && a.ty != b.ty {
        return Err(InstructionFailure::TypeMismatchStrict);
    }
    let result = op(a.value as i64, b.value as i64)?;
    Ok(Molecule::new(a.ty, result as i32, a.marker))
}

fn exec_rr(ctx: &mut ExecContext, op: Combine) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let a = ctx
        .operand(0)
        .scalar()
        .ok_or(InstructionFailure::InvalidOperandType)?;
    let b = ctx
        .operand(1)
        .scalar()
        .ok_or(InstructionFailure::InvalidOperandType)?;
    let result = combine(ctx.config.molecule.strict_typing, a, b, op)?;
    ctx.organism
        .registers
        .write_scalar(&ctx.config.registers, dest_raw, result)
}

fn exec_ri(ctx: &mut ExecContext, op: Combine) -> Result<(), InstructionFailure> {
    exec_rr(ctx, op)
}

fn exec_ss(ctx: &mut ExecContext, op: Combine) -> Result<(), InstructionFailure> {
    // operand(0) is the first value popped (top of stack, "b"); operand(1)
    // is the second popped ("a", pushed earlier). Result = a OP b.
    let b = ctx
        .operand(0)
        .scalar()
        .ok_or(InstructionFailure::InvalidOperandType)?;
    let a = ctx
        .operand(1)
        .scalar()
        .ok_or(InstructionFailure::InvalidOperandType)?;
    let result = combine(ctx.config.molecule.strict_typing, a, b, op)?;
    ctx.organism.data_stack.push(StackValue::Scalar(result))
}

macro_rules! arith_family {
    ($mnemonic:literal, $op:expr, $rr:ident, $ri:ident, $ss:ident) => {
        fn $rr(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
            exec_rr(ctx, $op)
        }
        fn $ri(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
            exec_ri(ctx, $op)
        }
        fn $ss(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
            exec_ss(ctx, $op)
        }
    };
}

arith_family!("ADD", add, add_rr, add_ri, add_ss);
arith_family!("SUB", sub, sub_rr, sub_ri, sub_ss);
arith_family!("MUL", mul, mul_rr, mul_ri, mul_ss);
arith_family!("DIV", div, div_rr, div_ri, div_ss);
arith_family!("MOD", rem, mod_rr, mod_ri, mod_ss);

fn push_variants(
    b: &mut InstructionRegistryBuilder,
    mnemonic: &'static str,
    rr: super::ExecFn,
    ri: super::ExecFn,
    ss: super::ExecFn,
) {
    b.push(
        mnemonic,
        Family::Arithmetic,
        "RR",
        vec![OperandSource::Register, OperandSource::Register],
        false,
        rr,
    );
    b.push(
        mnemonic,
        Family::Arithmetic,
        "RI",
        vec![OperandSource::Register, OperandSource::Immediate],
        false,
        ri,
    );
    b.push(
        mnemonic,
        Family::Arithmetic,
        "SS",
        vec![OperandSource::Stack, OperandSource::Stack],
        false,
        ss,
    );
}

pub fn register(b: &mut InstructionRegistryBuilder) {
    push_variants(b, "ADD", add_rr, add_ri, add_ss);
    push_variants(b, "SUB", sub_rr, sub_ri, sub_ss);
    push_variants(b, "MUL", mul_rr, mul_ri, mul_ss);
    push_variants(b, "DIV", div_rr, div_ri, div_ss);
    push_variants(b, "MOD", mod_rr, mod_ri, mod_ss);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::coord::Coord;
    use crate::environment::Environment;
    use crate::isa::{ExecContext, InstructionRegistry, OperandValue, ResolvedOperand};
    use crate::molecule::MoleculeType;
    use crate::organism::Organism;
    use crate::program::ProgramArtifact;

    fn setup() -> (Organism, Environment, Config) {
        let config = Config {
            shape: vec![8, 8],
            ..Config::default()
        };
        let env = Environment::from_config(&config.molecule, config.shape.clone(), config.topology);
        let program = ProgramArtifact::new("t");
        let mut env2 = env;
        let organism = Organism::new(
            1,
            &program,
            Coord::from_slice(&[0, 0]),
            Coord::from_slice(&[1, 0]),
            &config.registers,
            &config.limits,
            0,
            &mut env2,
        )
        .unwrap();
        (organism, env2, config)
    }

    #[test]
    fn strict_typing_rejects_mismatched_scalar_types() {
        let (mut organism, mut env, mut config) = setup();
        config.molecule.strict_typing = true;
        organism.registers.dr[0] = Molecule::new(MoleculeType::Data, 10, 0);
        organism.registers.dr[1] = Molecule::new(MoleculeType::Energy, 5, 0);
        let operands: crate::isa::OperandList = vec![
            ResolvedOperand {
                source: OperandSource::Register,
                raw_id: 0,
                value: OperandValue::Scalar(organism.registers.dr[0]),
            },
            ResolvedOperand {
                source: OperandSource::Register,
                raw_id: 1,
                value: OperandValue::Scalar(organism.registers.dr[1]),
            },
        ]
        .into();
        let registry = InstructionRegistry::build();
        let mut ctx = ExecContext {
            organism: &mut organism,
            env: &mut env,
            operands: &operands,
            config: &config,
            status: crate::isa::ConflictStatus::NotApplicable,
            registry: &registry,
        };
        let err = add_rr(&mut ctx).unwrap_err();
        assert_eq!(err, InstructionFailure::TypeMismatchStrict);
        assert_eq!(ctx.organism.registers.dr[0].value, 10); // unchanged
    }

    #[test]
    fn divide_by_zero_fails() {
        let (mut organism, mut env, config) = setup();
        organism.registers.dr[0] = Molecule::new(MoleculeType::Data, 10, 0);
        organism.registers.dr[1] = Molecule::new(MoleculeType::Data, 0, 0);
        let operands: crate::isa::OperandList = vec![
            ResolvedOperand {
                source: OperandSource::Register,
                raw_id: 0,
                value: OperandValue::Scalar(organism.registers.dr[0]),
            },
            ResolvedOperand {
                source: OperandSource::Register,
                raw_id: 1,
                value: OperandValue::Scalar(organism.registers.dr[1]),
            },
        ]
        .into();
        let registry = InstructionRegistry::build();
        let mut ctx = ExecContext {
            organism: &mut organism,
            env: &mut env,
            operands: &operands,
            config: &config,
            status: crate::isa::ConflictStatus::NotApplicable,
            registry: &registry,
        };
        assert_eq!(div_rr(&mut ctx).unwrap_err(), InstructionFailure::DivideByZero);
    }
}
