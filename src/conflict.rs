//! Conflict resolution: when more than one organism's planned action
//! targets the same grid cell in a single tick, exactly one wins. Ties are
//! broken deterministically, lowest organism id then lowest registration
//! index, so a tick's outcome never depends on thread-scheduling order
//! even though planning itself runs in parallel.

use std::collections::HashMap;

use crate::coord::Coord;
use crate::environment::Environment;
use crate::isa::{ConflictStatus, TargetKind};
use crate::organism::OrganismId;

/// One organism's claim on a target cell for this tick — a move, a birth
/// placement, or any other action gated by cell ownership. `registration_index`
/// is the position this claim was registered in during the Plan phase, used
/// only to break ties between two claims from the same organism. `kind`
/// distinguishes a `Write` claim (must land on a pre-tick-empty cell, e.g.
/// POKE) from a `Clear` claim (reads then empties a cell that is ordinarily
/// non-empty, e.g. PEEK); only `Write` claims are checked against pre-tick
/// occupancy.
#[derive(Debug, Clone)]
pub struct Claim {
    pub organism_id: OrganismId,
    pub registration_index: usize,
    pub target: Coord,
    pub kind: TargetKind,
}

/// Resolves every claim against `env`'s current occupancy and against each
/// other. A `Write` claim on a cell that is already non-empty before this
/// tick loses outright as `LostTargetOccupied`, independent of contention —
/// that check never applies to `Clear` claims, whose ordinary target is a
/// non-empty, owned cell. Among the remaining (non-occupied-out) claims on a
/// given cell, the lowest `(organism_id, registration_index)` wins.
pub fn resolve(env: &Environment, claims: &[Claim]) -> HashMap<(OrganismId, usize), ConflictStatus> {
    let mut by_target: HashMap<Coord, Vec<&Claim>> = HashMap::new();
    for claim in claims {
        by_target.entry(claim.target.clone()).or_default().push(claim);
    }

    let mut statuses = HashMap::with_capacity(claims.len());
    for (target, group) in by_target {
        let occupied = env.get_owner(&target).map(|o| o != 0).unwrap_or(true);

        let mut contenders = Vec::with_capacity(group.len());
        for claim in group {
            if claim.kind == TargetKind::Write && occupied {
                statuses.insert((claim.organism_id, claim.registration_index), ConflictStatus::LostTargetOccupied);
            } else {
                contenders.push(claim);
            }
        }
        if contenders.is_empty() {
            continue;
        }

        let winner = contenders
            .iter()
            .min_by_key(|c| (c.organism_id, c.registration_index))
            .expect("contenders is never empty here");
        let winner_key = (winner.organism_id, winner.registration_index);
        for claim in &contenders {
            let key = (claim.organism_id, claim.registration_index);
            let status = if key == winner_key {
                ConflictStatus::WonExecution
            } else {
                ConflictStatus::LostConflict
            };
            statuses.insert(key, status);
        }
    }
    statuses
}
