//! Control-flow family: fuzzy label-resolved jumps (`JMPI` from an immediate
//! hash, `JMPR` from a register, `JMPS` from the data stack), procedure
//! call/return, and a label-presence skip (`SKJ`, in the location family).
//! All jumps set `skip_ip_advance` since they place the IP directly rather
//! than offsetting it by `dv` — the post-execute IP-advance step must not
//! double-move a jump target.

use crate::error::InstructionFailure;
use crate::label::resolve_label;
use crate::organism::CallFrame;

use super::{ExecContext, Family, InstructionRegistryBuilder, OperandSource};

fn jump_to_label(ctx: &mut ExecContext, hash: u32) -> Result<(), InstructionFailure> {
    let target = resolve_label(ctx.env, &ctx.config.labels, &ctx.organism.ip, ctx.organism.id, hash)
        .ok_or(InstructionFailure::InvalidLabelHash)?;
    ctx.organism.ip = target;
    ctx.organism.skip_ip_advance = true;
    Ok(())
}

fn exec_jmpi(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let hash = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?.value as u32;
    jump_to_label(ctx, hash)
}

fn exec_jmpr(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let hash = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?.value as u32;
    jump_to_label(ctx, hash)
}

fn exec_jmps(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let hash = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?.value as u32;
    jump_to_label(ctx, hash)
}

fn exec_call(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let hash = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?.value as u32;
    let target = resolve_label(ctx.env, &ctx.config.labels, &ctx.organism.ip, ctx.organism.id, hash)
        .ok_or(InstructionFailure::InvalidLabelHash)?;
    let return_ip = ctx.env.next_position(&ctx.organism.ip, &ctx.organism.dv);
    let frame = CallFrame {
        proc_label_hash: hash,
        return_ip,
        call_ip: ctx.organism.ip.clone(),
        saved_pr: ctx.organism.registers.pr.clone(),
        saved_fpr: ctx.organism.registers.fpr.clone(),
        saved_locals: Vec::new(),
    };
    ctx.organism.call_stack.push(frame);
    ctx.organism.ip = target;
    ctx.organism.skip_ip_advance = true;
    Ok(())
}

fn exec_ret(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let frame = ctx.organism.call_stack.pop().ok_or(InstructionFailure::StackUnderflow)?;
    ctx.organism.ip = frame.return_ip;
    for (i, v) in frame.saved_pr.into_iter().enumerate() {
        if i < ctx.organism.registers.pr.len() {
            ctx.organism.registers.pr[i] = v;
        }
    }
    for (i, v) in frame.saved_fpr.into_iter().enumerate() {
        if i < ctx.organism.registers.fpr.len() {
            ctx.organism.registers.fpr[i] = v;
        }
    }
    ctx.organism.skip_ip_advance = true;
    Ok(())
}

pub fn register(b: &mut InstructionRegistryBuilder) {
    b.push("JMPI", Family::ControlFlow, "L", vec![OperandSource::Label], false, exec_jmpi);
    b.push("JMPR", Family::ControlFlow, "R", vec![OperandSource::Register], false, exec_jmpr);
    b.push("JMPS", Family::ControlFlow, "S", vec![OperandSource::Stack], false, exec_jmps);
    b.push("CALL", Family::ControlFlow, "L", vec![OperandSource::Label], false, exec_call);
    b.push("RET", Family::ControlFlow, "-", vec![], false, exec_ret);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::coord::Coord;
    use crate::environment::Environment;
    use crate::isa::REGISTRY;
    use crate::molecule::{Molecule, MoleculeLayout, MoleculeType};
    use crate::organism::Organism;
    use crate::program::ProgramArtifact;
    use crate::vm::{execute_one, plan_one};

    /// Spec §8 scenario 2: a LABEL molecule at [50] with hash 12345, a
    /// JMPI targeting that exact hash, and a NOP at [51] the jump should
    /// land on, followed by a single IP advance.
    #[test]
    fn jmpi_with_exact_hash_match_lands_after_the_label() {
        let mut env = Environment::from_config(&crate::config::MoleculeConfig::default(), vec![64], crate::config::Topology::Torus);
        let layout = MoleculeLayout::default();
        let jmpi_id = REGISTRY.id_of("JMPI", "L").unwrap();
        let program = ProgramArtifact::new("p")
            .with_code(Coord::from_slice(&[0]), layout.pack(MoleculeType::Code, jmpi_id, 0))
            .with_code(Coord::from_slice(&[1]), layout.pack(MoleculeType::LabelRef, 12345, 0));
        let mut organism = Organism::new(
            1,
            &program,
            Coord::from_slice(&[0]),
            Coord::from_slice(&[1]),
            &crate::config::RegisterConfig::default(),
            &crate::config::LimitsConfig::default(),
            0,
            &mut env,
        )
        .unwrap();
        env.set(&Coord::from_slice(&[50]), Molecule::new(MoleculeType::Label, 12345, 0), 1).unwrap();
        env.set(&Coord::from_slice(&[51]), Molecule::empty(), 0).unwrap();

        let config = Config { shape: vec![64], ..Config::default() };
        let policy = crate::thermodynamics::ThermodynamicPolicy::default();
        let planned = plan_one(&mut organism, &env, &config, &REGISTRY).unwrap();
        execute_one(&mut organism, &mut env, &config, &REGISTRY, &policy, &planned, crate::isa::ConflictStatus::NotApplicable);

        assert!(!organism.failed);
        assert_eq!(organism.ip, Coord::from_slice(&[51]));
    }

    #[test]
    fn jmpi_beyond_tolerance_fails_with_invalid_label_hash() {
        let mut env = Environment::from_config(&crate::config::MoleculeConfig::default(), vec![64], crate::config::Topology::Torus);
        let layout = MoleculeLayout::default();
        let jmpi_id = REGISTRY.id_of("JMPI", "L").unwrap();
        // operand = hash XOR 0b111 (distance 3) against a tolerance of 2.
        let program = ProgramArtifact::new("p")
            .with_code(Coord::from_slice(&[0]), layout.pack(MoleculeType::Code, jmpi_id, 0))
            .with_code(
                Coord::from_slice(&[1]),
                layout.pack(MoleculeType::LabelRef, 0b10101010101010101010 ^ 0b111, 0),
            );
        let mut organism = Organism::new(
            1,
            &program,
            Coord::from_slice(&[0]),
            Coord::from_slice(&[1]),
            &crate::config::RegisterConfig::default(),
            &crate::config::LimitsConfig::default(),
            0,
            &mut env,
        )
        .unwrap();
        env.set(
            &Coord::from_slice(&[50]),
            Molecule::new(MoleculeType::Label, 0b10101010101010101010, 0),
            1,
        )
        .unwrap();

        let config = Config { shape: vec![64], ..Config::default() };
        let policy = crate::thermodynamics::ThermodynamicPolicy::default();
        let planned = plan_one(&mut organism, &env, &config, &REGISTRY).unwrap();
        execute_one(&mut organism, &mut env, &config, &REGISTRY, &policy, &planned, crate::isa::ConflictStatus::NotApplicable);

        assert!(organism.failed);
        assert_eq!(organism.failure_reason, Some(InstructionFailure::InvalidLabelHash));
    }
}

