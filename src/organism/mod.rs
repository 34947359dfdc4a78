//! §4.3 Organism: register file, stacks, IP/DV/DP/LR state, lifecycle flags.

pub mod registers;
pub mod stacks;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::{LimitsConfig, RegisterConfig};
use crate::coord::Coord;
use crate::environment::Environment;
use crate::error::InstructionFailure;
use crate::isa::{InstructionDef, InstructionRegistry};
use crate::molecule::{Molecule, MoleculeType};
use crate::program::ProgramArtifact;

pub use registers::RegisterFile;
pub use stacks::{CallFrame, CallStack, DataStack, LocationStack, StackValue};

pub type OrganismId = u32;

/// Tick-output projection. Constructed on demand by the host via
/// `Organism::summarize`; not retained by the runtime itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: OrganismId,
    pub genome_hash: u64,
    pub ip: Vec<i64>,
    pub dv: Vec<i64>,
    pub dps: Vec<Vec<i64>>,
    pub energy: i64,
    pub entropy: i64,
    pub is_dead: bool,
    pub birth_tick: u64,
    pub death_tick: Option<u64>,
    pub lineage: Vec<OrganismId>,
}

#[derive(Debug, Clone)]
pub struct Organism {
    pub id: OrganismId,
    pub program_id: String,

    pub ip: Coord,
    pub dv: Coord,
    pub initial_position: Coord,

    pub failed: bool,
    pub failure_reason: Option<InstructionFailure>,
    pub previous_instruction_failed: bool,
    pub skip_ip_advance: bool,

    pub registers: RegisterFile,
    pub data_stack: DataStack,
    pub call_stack: CallStack,
    pub location_stack: LocationStack,

    pub er: i64,
    pub entropy: i64,
    pub mr: u32,

    pub is_dead: bool,
    pub birth_tick: u64,
    pub death_tick: Option<u64>,
    lineage: VecDeque<OrganismId>,
    lineage_depth: usize,

    max_energy: i64,
    max_entropy: i64,
}

impl Organism {
    /// Places the artifact's full genome into `env`, translating every
    /// offset coordinate by `initial_position` (toroidal wrap) and claiming
    /// ownership of every placed cell for `id`. The instruction pointer
    /// starts at `initial_position`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrganismId,
        program: &ProgramArtifact,
        initial_position: Coord,
        dv: Coord,
        reg_cfg: &RegisterConfig,
        limits: &LimitsConfig,
        birth_tick: u64,
        env: &mut Environment,
    ) -> Result<Self, crate::environment::EnvironmentError> {
        let dims = initial_position.dims();
        for (offset, &word) in program.iter_code() {
            let abs = initial_position.wrapping_add(offset, env.shape());
            let molecule = Molecule::unpack(word, env.layout());
            if !molecule.is_empty() {
                env.set(&abs, molecule, id)?;
            }
        }

        Ok(Organism {
            id,
            program_id: program.program_id.clone(),
            ip: initial_position.clone(),
            dv,
            initial_position,
            failed: false,
            failure_reason: None,
            previous_instruction_failed: false,
            skip_ip_advance: false,
            registers: RegisterFile::new(reg_cfg, dims),
            data_stack: DataStack::new(limits.data_stack_max_depth),
            call_stack: CallStack::default(),
            location_stack: LocationStack::default(),
            er: limits.max_energy,
            entropy: 0,
            mr: 0,
            is_dead: false,
            birth_tick,
            death_tick: None,
            lineage: VecDeque::new(),
            lineage_depth: limits.lineage_depth,
            max_energy: limits.max_energy,
            max_entropy: limits.max_entropy,
        })
    }

    /// Restores an organism from checkpointed state. Bypasses the
    /// genome-placement side effect of `new`, since the environment already
    /// reflects the checkpointed cells.
    #[allow(clippy::too_many_arguments)]
    pub fn from_checkpoint(
        id: OrganismId,
        program_id: String,
        ip: Coord,
        dv: Coord,
        initial_position: Coord,
        registers: RegisterFile,
        data_stack: DataStack,
        call_stack: CallStack,
        location_stack: LocationStack,
        er: i64,
        entropy: i64,
        mr: u32,
        birth_tick: u64,
        limits: &LimitsConfig,
    ) -> Self {
        Organism {
            id,
            program_id,
            ip,
            dv,
            initial_position,
            failed: false,
            failure_reason: None,
            previous_instruction_failed: false,
            skip_ip_advance: false,
            registers,
            data_stack,
            call_stack,
            location_stack,
            er,
            entropy,
            mr,
            is_dead: false,
            birth_tick,
            death_tick: None,
            lineage: VecDeque::new(),
            lineage_depth: limits.lineage_depth,
            max_energy: limits.max_energy,
            max_entropy: limits.max_entropy,
        }
    }

    pub fn push_lineage(&mut self, parent: OrganismId) {
        self.lineage.push_back(parent);
        while self.lineage.len() > self.lineage_depth {
            self.lineage.pop_front();
        }
    }

    pub fn lineage(&self) -> &VecDeque<OrganismId> {
        &self.lineage
    }

    /// Parent cells are explicitly NOT accessible: ownership is strictly
    /// per-organism, with no inherited visibility between parent and child.
    pub fn is_cell_accessible(&self, owner_id: OrganismId) -> bool {
        owner_id == self.id
    }

    pub fn credit_energy(&mut self, amount: i64) {
        self.er = (self.er + amount).min(self.max_energy);
    }

    pub fn debit_energy(&mut self, amount: i64) {
        self.er -= amount;
    }

    pub fn add_entropy(&mut self, amount: i64) {
        self.entropy = (self.entropy + amount).min(self.max_entropy);
    }

    pub fn set_failure(&mut self, reason: InstructionFailure) {
        self.failed = true;
        self.failure_reason = Some(reason);
    }

    pub fn clear_failure(&mut self) {
        self.failed = false;
        self.failure_reason = None;
    }

    /// Reads the signed scalar value of the code-adjacent slot at `coord`,
    /// interpreted within the environment's configured `VALUE_BITS`.
    pub fn fetch_signed_argument(&self, env: &Environment, coord: &Coord) -> i32 {
        let m = env.get(coord).unwrap_or_else(|_| Molecule::empty());
        m.value
    }

    /// Advances the IP one slot along DV, unless `skip_ip_advance` is set
    /// (cleared as a side effect).
    pub fn advance_ip(&mut self, env: &Environment) {
        if self.skip_ip_advance {
            self.skip_ip_advance = false;
            return;
        }
        self.ip = env.next_position(&self.ip, &self.dv);
    }

    /// Walks past the instruction immediately after the current IP,
    /// including all of its operand slots, using the per-opcode length
    /// table.
    pub fn skip_next_instruction(&mut self, env: &Environment, registry: &InstructionRegistry) {
        let next = env.next_position(&self.ip, &self.dv);
        let len = instruction_grid_length(env, registry, &next);
        let mut cursor = next;
        for _ in 0..len {
            cursor = env.next_position(&cursor, &self.dv);
        }
        self.ip = cursor;
        self.skip_ip_advance = true;
    }

    /// Repeatedly advances IP past non-CODE molecules and zero-cost NOP
    /// opcodes, bounded by `max_skips`. On exceeding the bound, the organism
    /// stalls: pop a call frame and restore IP/PR/FPR from it, or reset IP
    /// to the initial position if the call stack is empty. Returns `true`
    /// iff a stall occurred (the scheduler charges `error-penalty-cost` in
    /// that case).
    pub fn skip_nop_cells(
        &mut self,
        env: &Environment,
        registry: &InstructionRegistry,
        max_skips: u32,
    ) -> bool {
        let mut skips = 0u32;
        loop {
            let m = match env.get(&self.ip) {
                Ok(m) => m,
                Err(_) => break,
            };
            let is_nop = match m.ty {
                MoleculeType::Code if m.value != 0 => registry
                    .lookup(m.value)
                    .map(|inst| inst.is_nop())
                    .unwrap_or(false),
                MoleculeType::Code => true, // empty cell: CODE:0
                _ => true,
            };
            if !is_nop {
                return false;
            }
            if skips >= max_skips {
                self.stall(env);
                return true;
            }
            self.ip = env.next_position(&self.ip, &self.dv);
            skips += 1;
        }
        false
    }

    fn stall(&mut self, env: &Environment) {
        if let Some(frame) = self.call_stack.pop() {
            self.ip = frame.return_ip;
            for (i, v) in frame.saved_pr.into_iter().enumerate() {
                if i < self.registers.pr.len() {
                    self.registers.pr[i] = v;
                }
            }
            for (i, v) in frame.saved_fpr.into_iter().enumerate() {
                if i < self.registers.fpr.len() {
                    self.registers.fpr[i] = v;
                }
            }
        } else {
            self.ip = self.initial_position.clone();
        }
        let _ = env; // shape already baked into stored coordinates
        self.set_failure(InstructionFailure::MaxSkipsExceeded);
    }

    pub fn summarize(&self, env: &Environment) -> Summary {
        Summary {
            id: self.id,
            genome_hash: genome_hash(self.id, env),
            ip: self.ip.as_slice().to_vec(),
            dv: self.dv.as_slice().to_vec(),
            dps: self
                .registers
                .dp
                .iter()
                .map(|c| c.as_slice().to_vec())
                .collect(),
            energy: self.er,
            entropy: self.entropy,
            is_dead: self.is_dead,
            birth_tick: self.birth_tick,
            death_tick: self.death_tick,
            lineage: self.lineage.iter().copied().collect(),
        }
    }
}

/// SHA-256 over an organism's owned CODE-type cells in flat-index order,
/// rendered as the first 8 bytes interpreted as a `u64` (see DESIGN.md for
/// the choice of hash).
fn genome_hash(id: OrganismId, env: &Environment) -> u64 {
    use sha2::{Digest, Sha256};
    let mut indices: Vec<_> = env.cells_owned_by(id).into_iter().collect();
    indices.sort_unstable();
    let mut hasher = Sha256::new();
    for idx in indices {
        let m = env.get_flat(idx);
        if m.ty == MoleculeType::Code {
            hasher.update(m.value.to_le_bytes());
        }
    }
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[0..8].try_into().unwrap())
}

fn instruction_grid_length(
    env: &Environment,
    registry: &InstructionRegistry,
    coord: &Coord,
) -> usize {
    let dims = coord.dims();
    match env.get(coord) {
        Ok(m) if m.ty == MoleculeType::Code && m.value != 0 => registry
            .lookup(m.value)
            .map(|def: &InstructionDef| def.grid_length(dims))
            .unwrap_or(1),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MoleculeConfig, Topology};
    use crate::molecule::MoleculeLayout;

    fn env2d() -> Environment {
        Environment::from_config(&MoleculeConfig::default(), vec![16, 16], Topology::Torus)
    }

    #[test]
    fn is_cell_accessible_owned_by_parent_returns_false() {
        let mut env = env2d();
        let program = ProgramArtifact::new("p");
        let o = Organism::new(
            1,
            &program,
            crate::coord::Coord::from_slice(&[0, 0]),
            crate::coord::Coord::from_slice(&[1, 0]),
            &RegisterConfig::default(),
            &LimitsConfig::default(),
            0,
            &mut env,
        )
        .unwrap();
        // A parent organism (id 0, not this organism's own id) must not be
        // treated as accessible, even conceptually as "parent".
        assert!(!o.is_cell_accessible(0));
        assert!(o.is_cell_accessible(1));
    }

    #[test]
    fn new_places_genome_and_claims_ownership() {
        let mut env = env2d();
        let program = ProgramArtifact::new("p").with_code(
            crate::coord::Coord::from_slice(&[0, 0]),
            MoleculeLayout::default().pack(MoleculeType::Code, 5, 0),
        );
        let o = Organism::new(
            2,
            &program,
            crate::coord::Coord::from_slice(&[3, 3]),
            crate::coord::Coord::from_slice(&[1, 0]),
            &RegisterConfig::default(),
            &LimitsConfig::default(),
            0,
            &mut env,
        )
        .unwrap();
        assert_eq!(env.get_owner(&o.ip).unwrap(), 2);
        assert_eq!(env.get(&o.ip).unwrap().value, 5);
    }
}
