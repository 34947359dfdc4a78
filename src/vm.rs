//! Per-organism instruction cycle: decode operands from the grid (Plan),
//! let registered interceptors observe the decoded instruction (Intercept),
//! then apply its effects once conflicts are resolved (Execute). The
//! scheduler drives these across the whole population each tick; this
//! module only knows about one organism at a time.

use smallvec::SmallVec;

use crate::config::Config;
use crate::coord::Coord;
use crate::environment::Environment;
use crate::error::InstructionFailure;
use crate::isa::{ConflictStatus, ExecContext, InstructionRegistry, OperandList, OperandValue, ResolvedOperand, TargetKind};
use crate::isa::OperandSource;
use crate::molecule::MoleculeType;
use crate::organism::Organism;
use crate::thermodynamics::{ThermoCost, ThermodynamicPolicy};

/// A fully decoded, not-yet-executed instruction. Operand resolution
/// (including any stack pops) has already happened by the time this is
/// built — Execute never re-reads the grid or the stack for its operands,
/// so re-running Execute against the same `PlannedInstruction` is
/// idempotent from the grid/stack's point of view.
#[derive(Debug, Clone)]
pub struct PlannedInstruction {
    pub def_id: i32,
    pub operands: OperandList,
    pub targets: SmallVec<[(Coord, TargetKind); 2]>,
    pub next_ip: Coord,
    /// Set when Plan substituted a NOP placeholder for a genuinely
    /// unrecognized opcode id (as opposed to an empty/non-CODE cell, which
    /// is ordinary terrain and carries no failure). Execute still runs the
    /// placeholder NOP but additionally charges the failure penalty and
    /// marks the organism failed, mirroring any other failed instruction.
    pub unknown_opcode: bool,
}

/// A hook that observes a decoded instruction before it is executed. The
/// default pipeline runs none; a host may register interceptors (e.g. to
/// log specific opcodes, or to veto an instruction under an extended rule
/// set) without changing the VM itself.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, organism: &Organism, env: &Environment, planned: &PlannedInstruction) -> InterceptOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptOutcome {
    Continue,
    Veto(InstructionFailure),
}

/// Decodes the instruction at `organism.ip`: looks up its definition, reads
/// each declared operand from the grid (or the organism's own data stack
/// for `Stack` operands), and computes its target cells. Never mutates
/// `env`; may mutate `organism`'s own stacks and registers are left
/// untouched (reads only) until Execute.
///
/// A non-CODE or empty IP cell is ordinary terrain, not a failure: Plan
/// substitutes a harmless NOP placeholder and the organism simply drifts
/// over it. A CODE cell whose value doesn't resolve to any registered
/// opcode is different — Plan still substitutes a NOP placeholder so the
/// tick can proceed, but flags it so Execute charges the failure penalty.
pub fn plan_one(
    organism: &mut Organism,
    env: &Environment,
    config: &Config,
    registry: &InstructionRegistry,
) -> Result<PlannedInstruction, InstructionFailure> {
    let opcode_molecule = env.get(&organism.ip).map_err(|_| InstructionFailure::OutOfBounds)?;
    if opcode_molecule.ty != MoleculeType::Code || opcode_molecule.value == 0 {
        return Ok(nop_placeholder(organism, env, registry, false));
    }
    let def = match registry.lookup(opcode_molecule.value) {
        Some(def) => def,
        None => return Ok(nop_placeholder(organism, env, registry, true)),
    };

    let mut cursor = env.next_position(&organism.ip, &organism.dv);
    let mut operands = OperandList::new();
    for source in &def.operands {
        let (resolved, advanced) = resolve_operand(*source, organism, env, config, &cursor)?;
        operands.push(resolved);
        cursor = advanced;
    }

    let targets = (def.targets)(organism, env, &operands);

    Ok(PlannedInstruction {
        def_id: def.id,
        operands,
        targets,
        next_ip: cursor,
        unknown_opcode: false,
    })
}

fn nop_placeholder(
    organism: &Organism,
    env: &Environment,
    registry: &InstructionRegistry,
    unknown_opcode: bool,
) -> PlannedInstruction {
    let nop_id = registry.id_of("NOP", "-").expect("NOP is always registered");
    PlannedInstruction {
        def_id: nop_id,
        operands: OperandList::new(),
        targets: SmallVec::new(),
        next_ip: env.next_position(&organism.ip, &organism.dv),
        unknown_opcode,
    }
}

fn resolve_operand(
    source: OperandSource,
    organism: &mut Organism,
    env: &Environment,
    config: &Config,
    cursor: &Coord,
) -> Result<(ResolvedOperand, Coord), InstructionFailure> {
    match source {
        OperandSource::Stack => {
            let value = organism.data_stack.pop()?;
            Ok((
                ResolvedOperand { source, raw_id: -1, value: OperandValue::Stack(value) },
                cursor.clone(),
            ))
        }
        OperandSource::Immediate => {
            let m = env.get(cursor).map_err(|_| InstructionFailure::OutOfBounds)?;
            let next = env.next_position(cursor, &organism.dv);
            Ok((ResolvedOperand { source, raw_id: -1, value: OperandValue::Scalar(m) }, next))
        }
        OperandSource::Label => {
            let m = env.get(cursor).map_err(|_| InstructionFailure::OutOfBounds)?;
            let next = env.next_position(cursor, &organism.dv);
            Ok((
                ResolvedOperand { source, raw_id: m.value as i64, value: OperandValue::Scalar(m) },
                next,
            ))
        }
        OperandSource::Register => {
            let m = env.get(cursor).map_err(|_| InstructionFailure::OutOfBounds)?;
            let next = env.next_position(cursor, &organism.dv);
            let raw_id = m.value as i64;
            let content = organism.registers.read_scalar(&config.registers, raw_id as u32)?;
            Ok((
                ResolvedOperand { source, raw_id, value: OperandValue::Scalar(content) },
                next,
            ))
        }
        OperandSource::LocationRegister => {
            let m = env.get(cursor).map_err(|_| InstructionFailure::OutOfBounds)?;
            let next = env.next_position(cursor, &organism.dv);
            let raw_id = m.value as i64;
            let coord = organism.registers.read_location(&config.registers, raw_id as u32)?.clone();
            Ok((
                ResolvedOperand { source, raw_id, value: OperandValue::Vector(coord) },
                next,
            ))
        }
        OperandSource::Vector => {
            let dims = organism.ip.dims();
            let mut comps = smallvec::SmallVec::<[i64; 4]>::with_capacity(dims);
            let mut pos = cursor.clone();
            for _ in 0..dims {
                let m = env.get(&pos).map_err(|_| InstructionFailure::OutOfBounds)?;
                comps.push(m.value as i64);
                pos = env.next_position(&pos, &organism.dv);
            }
            Ok((
                ResolvedOperand { source, raw_id: -1, value: OperandValue::Vector(Coord::from_slice(&comps)) },
                pos,
            ))
        }
    }
}

/// Applies a planned instruction's effects, charges its thermodynamic cost,
/// and advances the instruction pointer. A `LostConflict`/`LostTargetOccupied`
/// status short-circuits execution (the instruction never ran) but still
/// charges the failure-penalty cost, mirroring an ordinary instruction
/// failure.
pub fn execute_one(
    organism: &mut Organism,
    env: &mut Environment,
    config: &Config,
    registry: &InstructionRegistry,
    policy: &ThermodynamicPolicy,
    planned: &PlannedInstruction,
    status: ConflictStatus,
) {
    let def = match registry.lookup(planned.def_id) {
        Some(def) => def,
        None => {
            apply_cost(organism, policy.failure_cost(&config.limits));
            organism.set_failure(InstructionFailure::UnknownOpcode);
            return;
        }
    };

    if matches!(status, ConflictStatus::LostConflict | ConflictStatus::LostTargetOccupied) {
        // A conflict loser still attempted the instruction, so it is charged
        // the instruction's own base cost, not the stall/error penalty.
        apply_cost(organism, policy.cost_of(def));
        let reason = if status == ConflictStatus::LostTargetOccupied {
            InstructionFailure::CellOccupied
        } else {
            InstructionFailure::InvalidOperandType
        };
        organism.set_failure(reason);
        organism.ip = planned.next_ip.clone();
        return;
    }

    let mut ctx = ExecContext {
        organism,
        env,
        operands: &planned.operands,
        config,
        status,
        registry,
    };
    let result = (def.exec)(&mut ctx);

    match result {
        Ok(()) if planned.unknown_opcode => {
            apply_cost(ctx.organism, policy.failure_cost(&config.limits));
            ctx.organism.set_failure(InstructionFailure::UnknownOpcode);
        }
        Ok(()) => {
            ctx.organism.clear_failure();
            apply_cost(ctx.organism, policy.cost_of(def));
        }
        Err(reason) => {
            // An ordinary instruction failure still charges the attempted
            // instruction's own base cost; `error-penalty-cost` is reserved
            // for stall recovery (see Scheduler::tick phase 1), not this.
            apply_cost(ctx.organism, policy.cost_of(def));
            ctx.organism.set_failure(reason);
        }
    }

    if ctx.organism.skip_ip_advance {
        ctx.organism.skip_ip_advance = false;
    } else {
        ctx.organism.ip = planned.next_ip.clone();
    }
}

pub(crate) fn apply_cost(organism: &mut Organism, cost: ThermoCost) {
    organism.debit_energy(cost.energy);
    organism.add_entropy(cost.entropy);
}
