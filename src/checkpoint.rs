//! §6 Checkpoint/restore: a serializable snapshot of everything needed to
//! resume a simulation bit-for-bit except its RNG stream.
//!
//! `rand`'s `StdRng` does not expose serializable internal state without an
//! extra feature this crate does not otherwise need, so a restored scheduler
//! reseeds from a caller-supplied seed rather than replaying the exact birth
//! RNG sequence the checkpoint was taken from (DESIGN.md: Open Question
//! resolution). Everything else — environment contents, every organism's
//! full register/stack/lineage state, and the tick/id counters — round-trips
//! exactly.

use serde::{Deserialize, Serialize};

use crate::config::{Config, LimitsConfig, Topology};
use crate::coord::Coord;
use crate::environment::Environment;
use crate::molecule::{Molecule, MoleculeLayout};
use crate::organism::{CallStack, DataStack, LocationStack, Organism, OrganismId, RegisterFile};
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvSnapshot {
    pub shape: Vec<usize>,
    pub topology: Topology,
    pub layout: MoleculeLayout,
    pub cells: Vec<Molecule>,
    pub owners: Vec<OrganismId>,
}

impl EnvSnapshot {
    fn capture(env: &Environment) -> Self {
        let total = env.total_cells();
        let mut cells = Vec::with_capacity(total);
        let mut owners = Vec::with_capacity(total);
        for (_, molecule, owner) in env.iter_cells() {
            cells.push(molecule);
            owners.push(owner);
        }
        EnvSnapshot {
            shape: env.shape().to_vec(),
            topology: env.topology(),
            layout: *env.layout(),
            cells,
            owners,
        }
    }

    /// Overwrites every cell of `env` with this snapshot's contents, in
    /// flat-index order. `env` must already have this snapshot's shape
    /// (the caller builds it from the same `Config` the checkpoint was
    /// taken under).
    fn restore_into(&self, env: &mut Environment) {
        for (idx, (&molecule, &owner)) in self.cells.iter().zip(self.owners.iter()).enumerate() {
            let _ = env.set_flat(idx, molecule, owner);
        }
    }
}

/// Full state of one organism, independent of any `ProgramArtifact` (the
/// genome itself is already captured as owned cells in `EnvSnapshot`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganismSnapshot {
    pub id: OrganismId,
    pub program_id: String,
    pub ip: Coord,
    pub dv: Coord,
    pub initial_position: Coord,
    pub registers: RegisterFile,
    pub data_stack: DataStack,
    pub call_stack: CallStack,
    pub location_stack: LocationStack,
    pub er: i64,
    pub entropy: i64,
    pub mr: u32,
    pub birth_tick: u64,
    pub death_tick: Option<u64>,
    pub is_dead: bool,
    pub lineage: Vec<OrganismId>,
}

impl OrganismSnapshot {
    fn capture(organism: &Organism) -> Self {
        OrganismSnapshot {
            id: organism.id,
            program_id: organism.program_id.clone(),
            ip: organism.ip.clone(),
            dv: organism.dv.clone(),
            initial_position: organism.initial_position.clone(),
            registers: organism.registers.clone(),
            data_stack: organism.data_stack.clone(),
            call_stack: organism.call_stack.clone(),
            location_stack: organism.location_stack.clone(),
            er: organism.er,
            entropy: organism.entropy,
            mr: organism.mr,
            birth_tick: organism.birth_tick,
            death_tick: organism.death_tick,
            is_dead: organism.is_dead,
            lineage: organism.lineage().iter().copied().collect(),
        }
    }

    fn into_organism(self, limits: &LimitsConfig) -> Organism {
        let mut organism = Organism::from_checkpoint(
            self.id,
            self.program_id,
            self.ip,
            self.dv,
            self.initial_position,
            self.registers,
            self.data_stack,
            self.call_stack,
            self.location_stack,
            self.er,
            self.entropy,
            self.mr,
            self.birth_tick,
            limits,
        );
        for parent in self.lineage {
            organism.push_lineage(parent);
        }
        organism.is_dead = self.is_dead;
        organism.death_tick = self.death_tick;
        organism
    }
}

/// A point-in-time snapshot of a `Scheduler`'s persistent state:
/// `next_organism_id` is carried so a restored run never reissues
/// an id that existed before the checkpoint, regardless of how many of those
/// organisms are included in `organisms` (dead organisms are snapshotted
/// too, so their lineage/summary data survives restore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub tick: u64,
    pub next_organism_id: OrganismId,
    pub env: EnvSnapshot,
    pub organisms: Vec<OrganismSnapshot>,
}

impl Checkpoint {
    pub fn capture(scheduler: &Scheduler) -> Self {
        Checkpoint {
            tick: scheduler.tick_count(),
            next_organism_id: scheduler.next_organism_id(),
            env: EnvSnapshot::capture(scheduler.env()),
            organisms: scheduler.organisms().iter().map(OrganismSnapshot::capture).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Builds a fresh `Scheduler` from `config` and replays this checkpoint
    /// into it: environment contents, every organism (living or dead), and
    /// the tick/id counters. `config` must describe the same grid shape and
    /// molecule layout the checkpoint was captured under; a mismatch is not
    /// checked here and will produce an inconsistent environment.
    pub fn restore(&self, config: Config, seed: u64) -> Scheduler {
        let mut scheduler = Scheduler::with_seed(config, seed);
        self.env.restore_into(scheduler.env_mut());

        let limits = scheduler.config().limits;
        for snapshot in self.organisms.clone() {
            scheduler.add_organism(snapshot.into_organism(&limits));
        }
        scheduler.set_next_organism_id(self.next_organism_id);
        scheduler.set_tick(self.tick);
        scheduler
    }
}
