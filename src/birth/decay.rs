//! Death decay: when an organism dies its owned CODE cells are recycled
//! into Energy molecules rather than simply vanishing, so the population's
//! total recoverable energy is conserved across a lifetime rather than lost
//! to it. Non-code cells (data, labels, structure) are cleared outright.

use crate::environment::Environment;
use crate::molecule::{Molecule, MoleculeType};
use crate::organism::OrganismId;

/// Runs once, when `organism.is_dead` transitions to true. Every owned
/// CODE cell becomes an Energy molecule carrying the
/// opcode id's magnitude as its recoverable value; everything else owned is
/// cleared to empty. Ownership of every formerly-owned cell is released.
pub fn on_death(id: OrganismId, env: &mut Environment) {
    let mut indices: Vec<_> = env.cells_owned_by(id).into_iter().collect();
    indices.sort_unstable();
    for idx in indices {
        let m = env.get_flat(idx);
        let replacement = if m.ty == MoleculeType::Code && m.value != 0 {
            Molecule::new(MoleculeType::Energy, m.value.abs(), 0)
        } else {
            Molecule::empty()
        };
        let _ = env.set_flat(idx, replacement, 0);
    }
}
