//! §4.8 Scheduler: drives every living organism through one tick's
//! Plan → Intercept → Resolve-conflicts → Execute → Births/Deaths pipeline.
//!
//! Plan and Intercept only read the environment (each organism decodes and
//! is observed independently of every other), so both run data-parallel
//! over the population via a dedicated `rayon` thread pool. Resolve runs
//! sequentially once all claims are in hand — it is the one place a single
//! global ordering decision gets made. Execute then applies each organism's
//! effects in ascending-id order: conflict resolution already guarantees at
//! most one organism holds each contested cell, so sequential application
//! is just as correct as a parallel one would be and needs no interior
//! mutability to get there (DESIGN.md). Births/deaths are
//! inherently sequential — they share one RNG stream.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::birth::{self, BirthReport};
use crate::config::Config;
use crate::conflict::{self, Claim};
use crate::environment::Environment;
use crate::error::InstructionFailure;
use crate::isa::{ConflictStatus, InstructionRegistry, REGISTRY};
use crate::organism::{Organism, OrganismId};
use crate::program::ProgramArtifact;
use crate::thermodynamics::ThermodynamicPolicy;
use crate::vm::{self, InterceptOutcome, Interceptor, PlannedInstruction};

/// What happened in one tick, surfaced to the host for tick-output/telemetry
/// Dead organisms stay in `Scheduler::organisms` after the tick
/// they died in; the host decides when (if ever) to prune them.
#[derive(Debug, Default)]
pub struct TickReport {
    pub tick: u64,
    pub newborn_ids: Vec<OrganismId>,
    pub died_ids: Vec<OrganismId>,
    pub birth_reports: HashMap<OrganismId, BirthReport>,
}

/// Owns the environment and population and runs the tick loop against them.
/// Construction seeds its own RNG; pass a fixed seed for deterministic
/// replay, or `Scheduler::new` for a
/// process-entropy seed.
pub struct Scheduler {
    config: Config,
    env: Environment,
    registry: &'static InstructionRegistry,
    policy: ThermodynamicPolicy,
    interceptors: Vec<Box<dyn Interceptor>>,
    pool: rayon::ThreadPool,
    organisms: Vec<Organism>,
    next_organism_id: OrganismId,
    tick: u64,
    rng: StdRng,
}

impl Scheduler {
    pub fn new(config: Config) -> Self {
        Self::with_seed(config, rand::random())
    }

    pub fn with_seed(config: Config, seed: u64) -> Self {
        let env = Environment::from_config(&config.molecule, config.shape.clone(), config.topology);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallelism.worker_count)
            .build()
            .expect("thread pool configuration is always valid");
        Scheduler {
            config,
            env,
            registry: &REGISTRY,
            policy: ThermodynamicPolicy::default(),
            interceptors: Vec::new(),
            pool,
            organisms: Vec::new(),
            next_organism_id: 1,
            tick: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn organisms(&self) -> &[Organism] {
        &self.organisms
    }

    pub fn organisms_mut(&mut self) -> &mut [Organism] {
        &mut self.organisms
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn next_organism_id(&self) -> OrganismId {
        self.next_organism_id
    }

    pub fn register_interceptor(&mut self, interceptor: Box<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Places `program`'s genome at `position` and adds it to the
    /// population, claiming the next sequential organism id.
    pub fn spawn_organism(
        &mut self,
        program: &ProgramArtifact,
        position: crate::coord::Coord,
        dv: crate::coord::Coord,
    ) -> Result<OrganismId, crate::environment::EnvironmentError> {
        let id = self.next_organism_id;
        let organism = Organism::new(
            id,
            program,
            position,
            dv,
            &self.config.registers,
            &self.config.limits,
            self.tick,
            &mut self.env,
        )?;
        self.organisms.push(organism);
        self.next_organism_id += 1;
        Ok(id)
    }

    /// Re-adds an already-constructed organism (e.g. one rebuilt from
    /// checkpointed state) without touching the environment, and advances
    /// `next_organism_id` past it if necessary so future spawns never
    /// collide with a restored id.
    pub fn add_organism(&mut self, organism: Organism) {
        self.next_organism_id = self.next_organism_id.max(organism.id + 1);
        self.organisms.push(organism);
    }

    /// Sets `next_organism_id` directly. A restored checkpoint must
    /// resume numbering from `total_created + 1`, independent of how many
    /// organisms the host has re-added by the time this is called).
    pub fn set_next_organism_id(&mut self, next: OrganismId) {
        self.next_organism_id = next;
    }

    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Runs one full tick of the population against the environment.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let tick_number = self.tick;

        let pool = &self.pool;
        let env = &self.env;
        let config = &self.config;
        let registry = self.registry;
        let policy = &self.policy;
        let organisms = &mut self.organisms;

        // Phase 1: Plan. A stalled organism (skip_nop_cells hit max_skips)
        // produces no plan this tick; its failure penalty is charged here
        // since that cost is not attached to any instruction definition.
        let outcomes: Vec<Option<PlannedInstruction>> = pool.install(|| {
            organisms
                .par_iter_mut()
                .map(|organism| {
                    if organism.is_dead {
                        return None;
                    }
                    // Captured before anything below can overwrite `failed`
                    // with this tick's own outcome (spec: IFER/INER read the
                    // *previous* tick's result, not this one's).
                    organism.previous_instruction_failed = organism.failed;
                    if organism.skip_nop_cells(env, registry, config.limits.max_skips) {
                        vm::apply_cost(organism, policy.failure_cost(&config.limits));
                        return None;
                    }
                    match vm::plan_one(organism, env, config, registry) {
                        Ok(planned) => Some(planned),
                        Err(reason) => {
                            vm::apply_cost(organism, policy.failure_cost(&config.limits));
                            organism.set_failure(reason);
                            organism.ip = env.next_position(&organism.ip, &organism.dv);
                            None
                        }
                    }
                })
                .collect()
        });

        // Phase 2: Intercept. A veto is recorded but not yet applied; it is
        // folded into Execute's handling alongside ordinary conflict losses.
        let interceptors = &self.interceptors;
        let vetoes: Vec<Option<InstructionFailure>> = pool.install(|| {
            organisms
                .par_iter()
                .zip(outcomes.par_iter())
                .map(|(organism, planned)| {
                    let planned = planned.as_ref()?;
                    for interceptor in interceptors.iter() {
                        if let InterceptOutcome::Veto(reason) = interceptor.intercept(organism, env, planned) {
                            return Some(reason);
                        }
                    }
                    None
                })
                .collect()
        });

        // Phase 3: Resolve conflicts. Only non-vetoed plans contribute
        // claims; a vetoed instruction never competes for a cell it would
        // otherwise have targeted.
        let mut claims = Vec::new();
        for (i, organism) in organisms.iter().enumerate() {
            if vetoes[i].is_some() {
                continue;
            }
            if let Some(planned) = &outcomes[i] {
                for (registration_index, (target, kind)) in planned.targets.iter().enumerate() {
                    claims.push(Claim {
                        organism_id: organism.id,
                        registration_index,
                        target: target.clone(),
                        kind: *kind,
                    });
                }
            }
        }
        let statuses = conflict::resolve(env, &claims);

        // Phase 4: Execute, in ascending organism-id order for determinism.
        // `organisms`/`outcomes`/`vetoes` all share the same index space.
        let mut order: Vec<usize> = (0..organisms.len()).collect();
        order.sort_unstable_by_key(|&i| organisms[i].id);

        let mut newly_dead = Vec::new();
        {
            let env = &mut self.env;
            for i in order {
                let organism = &mut organisms[i];
                if organism.is_dead {
                    continue;
                }

                if let Some(reason) = vetoes[i] {
                    vm::apply_cost(organism, policy.failure_cost(&config.limits));
                    organism.set_failure(reason);
                    if let Some(planned) = &outcomes[i] {
                        organism.ip = planned.next_ip.clone();
                    }
                } else if let Some(planned) = &outcomes[i] {
                    let status = overall_status(organism.id, planned.targets.len(), &statuses);
                    vm::execute_one(organism, env, config, registry, policy, planned, status);
                }

                if organism.er <= 0 && !organism.is_dead {
                    organism.is_dead = true;
                    organism.death_tick = Some(tick_number);
                    newly_dead.push(organism.id);
                }
            }
        }

        // Phase 5: Births, then deaths. Both sequential; births share one
        // RNG stream so a seeded scheduler replays identically.
        let mut birth_reports = HashMap::new();
        for organism in organisms.iter_mut() {
            if organism.is_dead {
                continue;
            }
            let report = birth::run_birth_events(organism, &mut self.env, config, registry, &mut self.rng);
            if report.duplicated || report.deleted || report.inserted || report.label_rewritten {
                birth_reports.insert(organism.id, report);
            }
        }

        for &id in &newly_dead {
            crate::birth::decay::on_death(id, &mut self.env);
            self.env.clear_ownership_of(id);
        }

        TickReport {
            tick: tick_number,
            newborn_ids: Vec::new(),
            died_ids: newly_dead,
            birth_reports,
        }
    }
}

/// Folds the per-target conflict statuses of one organism's planned
/// instruction into the single status `execute_one` expects: any lost claim
/// on an already-occupied cell dominates (the instruction cannot have run as
/// planned at all), otherwise any ordinary lost claim dominates, otherwise
/// the instruction is clear to run. An instruction with no targets was never
/// a candidate for conflict in the first place.
fn overall_status(
    organism_id: OrganismId,
    target_count: usize,
    statuses: &HashMap<(OrganismId, usize), ConflictStatus>,
) -> ConflictStatus {
    if target_count == 0 {
        return ConflictStatus::NotApplicable;
    }
    let mut lost_conflict = false;
    for registration_index in 0..target_count {
        match statuses.get(&(organism_id, registration_index)) {
            Some(ConflictStatus::LostTargetOccupied) => return ConflictStatus::LostTargetOccupied,
            Some(ConflictStatus::LostConflict) => lost_conflict = true,
            _ => {}
        }
    }
    if lost_conflict {
        ConflictStatus::LostConflict
    } else {
        ConflictStatus::WonExecution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::coord::Coord;
    use crate::molecule::{MoleculeLayout, MoleculeType};

    fn config(shape: Vec<usize>) -> Config {
        Config { shape, ..Config::default() }
    }

    #[test]
    fn tick_advances_a_lone_organism_through_one_instruction_without_failure() {
        let mut scheduler = Scheduler::with_seed(config(vec![16, 16]), 1);
        let layout = MoleculeLayout::default();
        let push_i_id = REGISTRY.id_of("PUSH", "I").unwrap();
        let program = ProgramArtifact::new("p")
            .with_code(Coord::from_slice(&[0, 0]), layout.pack(MoleculeType::Code, push_i_id, 0))
            .with_code(Coord::from_slice(&[1, 0]), layout.pack(MoleculeType::Data, 7, 0));
        let id = scheduler
            .spawn_organism(&program, Coord::from_slice(&[0, 0]), Coord::from_slice(&[1, 0]))
            .unwrap();

        let report = scheduler.tick();
        assert_eq!(report.tick, 1);
        assert!(report.died_ids.is_empty());
        let organism = scheduler.organisms().iter().find(|o| o.id == id).unwrap();
        assert!(!organism.failed);
        assert_eq!(organism.ip, Coord::from_slice(&[2, 0]));
    }

    #[test]
    fn two_organisms_racing_for_the_same_cell_only_one_wins() {
        let mut scheduler = Scheduler::with_seed(config(vec![16, 16]), 7);
        let layout = MoleculeLayout::default();
        let poke_id = REGISTRY.id_of("POKE", "R").unwrap();

        // Every organism's active DP starts at the environment's absolute
        // origin, so an identical offset operand of (5,5) makes both
        // organisms' POKE target the same cell regardless of where their
        // own genomes sit.
        let genome = |id_tag: &str| {
            ProgramArtifact::new(id_tag)
                .with_code(Coord::from_slice(&[0, 0]), layout.pack(MoleculeType::Code, poke_id, 0))
                .with_code(Coord::from_slice(&[1, 0]), layout.pack(MoleculeType::Data, 5, 0))
                .with_code(Coord::from_slice(&[2, 0]), layout.pack(MoleculeType::Data, 5, 0))
                .with_code(Coord::from_slice(&[3, 0]), layout.pack(MoleculeType::Register, 0, 0))
        };

        let id_a = scheduler
            .spawn_organism(&genome("a"), Coord::from_slice(&[0, 0]), Coord::from_slice(&[1, 0]))
            .unwrap();
        let id_b = scheduler
            .spawn_organism(&genome("b"), Coord::from_slice(&[0, 8]), Coord::from_slice(&[1, 0]))
            .unwrap();
        for organism in scheduler.organisms.iter_mut() {
            organism.registers.dr[0] = crate::molecule::Molecule::new(MoleculeType::Data, 9, 0);
        }

        scheduler.tick();

        let organism_a = scheduler.organisms().iter().find(|o| o.id == id_a).unwrap();
        let organism_b = scheduler.organisms().iter().find(|o| o.id == id_b).unwrap();
        // Exactly one of the two should have failed (the conflict loser)
        // while the other succeeded, since both targeted [5,5].
        let failures = [organism_a.failed, organism_b.failed].iter().filter(|&&f| f).count();
        assert_eq!(failures, 1);
        assert_eq!(scheduler.env().get(&Coord::from_slice(&[5, 5])).unwrap().value, 9);
    }
}
