//! §4.9 Fuzzy label resolution: a label reference rarely matches a LABEL
//! molecule's hash exactly (mutation drifts labels over generations), so
//! resolution accepts the closest candidate within a configured Hamming
//! tolerance rather than requiring an exact match.

use crate::config::LabelConfig;
use crate::coord::Coord;
use crate::environment::Environment;
use crate::molecule::MoleculeType;
use crate::organism::OrganismId;

fn hamming_distance(a: u32, b: u32, bits: u32) -> u32 {
    let mask = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };
    ((a ^ b) & mask).count_ones()
}

/// Finds the best-matching `LABEL` cell for `target_hash`, scanning every
/// cell in the environment. Candidates within `tolerance` Hamming distance
/// are ranked by: (1) smallest Hamming distance, (2) owned by `from_owner`
/// over not, (3) smallest toroidal distance from `from`. Returns `None` if
/// no cell is within tolerance.
pub fn resolve_label(
    env: &Environment,
    cfg: &LabelConfig,
    from: &Coord,
    from_owner: OrganismId,
    target_hash: u32,
) -> Option<Coord> {
    let mut best: Option<(u32, bool, i64, Coord)> = None;
    for (idx, molecule, owner) in env.iter_cells() {
        if molecule.ty != MoleculeType::Label {
            continue;
        }
        let candidate_hash = (molecule.value as u32) & hash_mask(cfg.hash_bits);
        let distance = hamming_distance(candidate_hash, target_hash, cfg.hash_bits);
        if distance > cfg.tolerance {
            continue;
        }
        let coord = env.coord_from_flat(idx);
        let owned_by_self = owner == from_owner;
        let toroidal = from.toroidal_manhattan(&coord, env.shape());
        let candidate = (distance, owned_by_self, toroidal, coord);
        best = Some(match best {
            None => candidate,
            Some(current) => pick_better(current, candidate),
        });
    }
    best.map(|(_, _, _, coord)| coord)
}

fn hash_mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

/// Lower distance wins; ties broken by self-ownership, then nearer coord.
fn pick_better(
    current: (u32, bool, i64, Coord),
    candidate: (u32, bool, i64, Coord),
) -> (u32, bool, i64, Coord) {
    if candidate.0 != current.0 {
        return if candidate.0 < current.0 { candidate } else { current };
    }
    if candidate.1 != current.1 {
        return if candidate.1 { candidate } else { current };
    }
    if candidate.2 < current.2 {
        candidate
    } else {
        current
    }
}

/// Hashes a label name into the configured bit-width domain. Used by the
/// birth label-rewrite handler and by any host code minting new labels; the
/// ISA itself never hashes strings; it only compares already-hashed values
/// stored in `LABEL`/`LABEL_REF` molecules.
pub fn hash_label_name(name: &str, bits: u32) -> u32 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    (hasher.finish() as u32) & hash_mask(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MoleculeConfig, Topology};
    use crate::molecule::Molecule;

    fn env_with_label(value: i32, owner: OrganismId) -> (Environment, Coord) {
        let mut env = Environment::from_config(&MoleculeConfig::default(), vec![8, 8], Topology::Torus);
        let coord = Coord::from_slice(&[4, 4]);
        env.set(&coord, Molecule::new(MoleculeType::Label, value, 0), owner)
            .unwrap();
        (env, coord)
    }

    #[test]
    fn exact_hash_match_resolves() {
        let (env, coord) = env_with_label(42, 7);
        let cfg = LabelConfig { hash_bits: 19, tolerance: 2 };
        let from = Coord::from_slice(&[0, 0]);
        let found = resolve_label(&env, &cfg, &from, 7, 42).unwrap();
        assert_eq!(found, coord);
    }

    #[test]
    fn distance_beyond_tolerance_does_not_match() {
        let (env, _coord) = env_with_label(0b0000, 7);
        let cfg = LabelConfig { hash_bits: 19, tolerance: 1 };
        let from = Coord::from_slice(&[0, 0]);
        // 0b0111 differs from 0b0000 by 3 bits, exceeding tolerance 1.
        assert!(resolve_label(&env, &cfg, &from, 7, 0b0111).is_none());
    }

    #[test]
    fn self_ownership_breaks_distance_ties() {
        let mut env = Environment::from_config(&MoleculeConfig::default(), vec![8, 8], Topology::Torus);
        let a = Coord::from_slice(&[1, 1]);
        let b = Coord::from_slice(&[6, 6]);
        env.set(&a, Molecule::new(MoleculeType::Label, 10, 0), 1).unwrap();
        env.set(&b, Molecule::new(MoleculeType::Label, 10, 0), 2).unwrap();
        let cfg = LabelConfig { hash_bits: 19, tolerance: 0 };
        let from = Coord::from_slice(&[0, 0]);
        let found = resolve_label(&env, &cfg, &from, 2, 10).unwrap();
        assert_eq!(found, b);
    }
}
