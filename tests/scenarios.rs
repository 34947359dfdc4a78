//! End-to-end tick-scheduler scenarios that exercise the full Plan →
//! Intercept → Resolve → Execute → Births/Deaths pipeline through the
//! public API, rather than a single instruction's `exec` function.

use evochora_runtime::config::Config;
use evochora_runtime::coord::Coord;
use evochora_runtime::isa::REGISTRY;
use evochora_runtime::molecule::{MoleculeLayout, MoleculeType};
use evochora_runtime::{InstructionFailure, ProgramArtifact, Scheduler};

fn small_config(shape: Vec<usize>) -> Config {
    Config { shape, ..Config::default() }
}

#[test]
fn racing_poke_leaves_exactly_one_winner_and_charges_both() {
    let mut scheduler = Scheduler::with_seed(small_config(vec![16, 16]), 42);
    let layout = MoleculeLayout::default();
    let poke_id = REGISTRY.id_of("POKE", "R").unwrap();

    let genome = || {
        ProgramArtifact::new("racer")
            .with_code(Coord::from_slice(&[0, 0]), layout.pack(MoleculeType::Code, poke_id, 0))
            .with_code(Coord::from_slice(&[1, 0]), layout.pack(MoleculeType::Data, 3, 0))
            .with_code(Coord::from_slice(&[2, 0]), layout.pack(MoleculeType::Data, 3, 0))
            .with_code(Coord::from_slice(&[3, 0]), layout.pack(MoleculeType::Register, 0, 0))
    };

    let id_a = scheduler
        .spawn_organism(&genome(), Coord::from_slice(&[0, 0]), Coord::from_slice(&[1, 0]))
        .unwrap();
    let id_b = scheduler
        .spawn_organism(&genome(), Coord::from_slice(&[0, 10]), Coord::from_slice(&[1, 0]))
        .unwrap();

    let energy_before = scheduler
        .organisms()
        .iter()
        .map(|o| (o.id, o.er))
        .collect::<std::collections::HashMap<_, _>>();

    scheduler.tick();

    let a = scheduler.organisms().iter().find(|o| o.id == id_a).unwrap();
    let b = scheduler.organisms().iter().find(|o| o.id == id_b).unwrap();
    let failures = [a.failed, b.failed].iter().filter(|&&f| f).count();
    assert_eq!(failures, 1, "exactly one racer must lose the conflict");
    assert!(a.er < energy_before[&id_a]);
    assert!(b.er < energy_before[&id_b]);
}

#[test]
fn stalling_past_max_skips_resets_ip_and_charges_the_error_penalty() {
    let mut config = small_config(vec![32, 32]);
    config.limits.max_skips = 4;
    let mut scheduler = Scheduler::with_seed(config, 11);

    // An empty genome: the organism's start cell is never written, so every
    // step along its direction vector lands on an empty (implicit NOP) cell
    // and it stalls on the first tick.
    let program = ProgramArtifact::new("drifter");
    let start = Coord::from_slice(&[5, 5]);
    let id = scheduler.spawn_organism(&program, start.clone(), Coord::from_slice(&[1, 0])).unwrap();

    let energy_before = scheduler.organisms().iter().find(|o| o.id == id).unwrap().er;
    scheduler.tick();

    let organism = scheduler.organisms().iter().find(|o| o.id == id).unwrap();
    assert!(organism.failed);
    assert_eq!(organism.failure_reason, Some(InstructionFailure::MaxSkipsExceeded));
    // No call frame to pop, so the stall resets IP to the organism's origin.
    assert_eq!(organism.ip, start);
    assert!(organism.er < energy_before);
}

#[test]
fn addr_under_strict_typing_fails_without_mutating_the_destination() {
    let mut config = small_config(vec![8, 8]);
    config.molecule.strict_typing = true;
    let mut scheduler = Scheduler::with_seed(config, 3);
    let layout = MoleculeLayout::default();
    let add_rr_id = REGISTRY.id_of("ADD", "RR").unwrap();

    let program = ProgramArtifact::new("mismatched")
        .with_code(Coord::from_slice(&[0, 0]), layout.pack(MoleculeType::Code, add_rr_id, 0))
        .with_code(Coord::from_slice(&[1, 0]), layout.pack(MoleculeType::Register, 0, 0))
        .with_code(Coord::from_slice(&[2, 0]), layout.pack(MoleculeType::Register, 1, 0));
    let id = scheduler
        .spawn_organism(&program, Coord::from_slice(&[0, 0]), Coord::from_slice(&[1, 0]))
        .unwrap();
    {
        let organism = scheduler.organisms_mut().iter_mut().find(|o| o.id == id).unwrap();
        organism.registers.dr[0] = evochora_runtime::molecule::Molecule::new(MoleculeType::Data, 10, 0);
        organism.registers.dr[1] = evochora_runtime::molecule::Molecule::new(MoleculeType::Energy, 5, 0);
    }

    scheduler.tick();

    let organism = scheduler.organisms().iter().find(|o| o.id == id).unwrap();
    assert!(organism.failed);
    assert_eq!(organism.failure_reason, Some(InstructionFailure::TypeMismatchStrict));
    assert_eq!(organism.registers.dr[0].value, 10);
}

#[test]
fn peek_through_the_full_pipeline_reads_a_foreign_owned_nonempty_cell() {
    // PEEK's ordinary target is occupied (that's the whole point of reading
    // it); only POKE-style targets are gated on pre-tick occupancy by the
    // conflict resolver. A foreign, non-empty cell with no other claimant
    // this tick must resolve as WonExecution for a PEEK, not
    // LostTargetOccupied.
    let mut scheduler = Scheduler::with_seed(small_config(vec![16, 16]), 5);
    let layout = MoleculeLayout::default();
    let peek_id = REGISTRY.id_of("PEEK", "R").unwrap();

    // Code occupies [0,0]..[3,0]; the PEEK target (active DP [0,0] + offset
    // (10,0) = [10,0]) is placed well clear of the organism's own genome.
    let program = ProgramArtifact::new("reader")
        .with_code(Coord::from_slice(&[0, 0]), layout.pack(MoleculeType::Code, peek_id, 0))
        .with_code(Coord::from_slice(&[1, 0]), layout.pack(MoleculeType::Register, 0, 0))
        .with_code(Coord::from_slice(&[2, 0]), layout.pack(MoleculeType::Data, 10, 0))
        .with_code(Coord::from_slice(&[3, 0]), layout.pack(MoleculeType::Data, 0, 0));
    let id = scheduler
        .spawn_organism(&program, Coord::from_slice(&[0, 0]), Coord::from_slice(&[1, 0]))
        .unwrap();

    // A foreign molecule at the PEEK target, owned by a different organism id.
    scheduler
        .env_mut()
        .set(
            &Coord::from_slice(&[10, 0]),
            evochora_runtime::molecule::Molecule::new(MoleculeType::Energy, 9, 0),
            999,
        )
        .unwrap();

    scheduler.tick();

    let organism = scheduler.organisms().iter().find(|o| o.id == id).unwrap();
    assert!(!organism.failed, "{:?}", organism.failure_reason);
    assert_eq!(organism.registers.dr[0].value, 9);
    let cell = scheduler.env().get(&Coord::from_slice(&[10, 0])).unwrap();
    assert!(cell.is_empty());
    assert_eq!(scheduler.env().get_owner(&Coord::from_slice(&[10, 0])).unwrap(), 0);
}
