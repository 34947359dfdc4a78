//! Gene deletion: picks one of the organism's own LABEL cells, weighted
//! toward labels sharing a hash with other owned labels (modeling quadratic
//! tandem-repeat instability — `count(hash)^exponent`), and clears every
//! molecule from it in the DV direction until the next LABEL, any
//! STRUCTURE, or a foreign owner brings the deletion to a stop.

use std::collections::HashMap;

use rand::Rng;

use crate::config::BirthConfig;
use crate::environment::Environment;
use crate::environment::FlatIndex;
use crate::molecule::{Molecule, MoleculeType};
use crate::organism::Organism;

use super::{dv_axis_and_sign, owned_sorted};

pub fn maybe_delete(organism: &mut Organism, env: &mut Environment, cfg: &BirthConfig, rng: &mut impl Rng) -> bool {
    if !rng.gen_bool(cfg.deletion_rate.clamp(0.0, 1.0)) {
        return false;
    }
    let labels: Vec<(FlatIndex, i32)> = owned_sorted(env, organism.id)
        .into_iter()
        .filter_map(|idx| {
            let m = env.get_flat(idx);
            (m.ty == MoleculeType::Label).then_some((idx, m.value))
        })
        .collect();
    if labels.is_empty() {
        return false;
    }

    let mut counts: HashMap<i32, usize> = HashMap::new();
    for &(_, hash) in &labels {
        *counts.entry(hash).or_insert(0) += 1;
    }
    let weights: Vec<f64> = labels.iter().map(|&(_, hash)| (counts[&hash] as f64).powf(cfg.deletion_count_exponent)).collect();
    let Some(anchor_idx) = weighted_choice(&labels, &weights, rng) else {
        return false;
    };

    let Some((dv_axis, sign)) = dv_axis_and_sign(organism) else {
        return false;
    };
    let axis_len = env.shape()[dv_axis] as i64;

    let anchor_coord = env.coord_from_flat(anchor_idx);
    let mut pos = anchor_coord[dv_axis];
    let mut cleared_any = false;
    for step in 0..axis_len {
        let mut c = anchor_coord.clone();
        c[dv_axis] = pos;
        let Ok(m) = env.get(&c) else { break };
        if step > 0 {
            if m.ty == MoleculeType::Label || m.ty == MoleculeType::Structure {
                break;
            }
            let owner = env.get_owner(&c).unwrap_or(0);
            if owner != 0 && owner != organism.id {
                break;
            }
        }
        if !m.is_empty() {
            let _ = env.set(&c, Molecule::empty(), 0);
            cleared_any = true;
        }
        pos = ((pos + sign) % axis_len + axis_len) % axis_len;
    }
    cleared_any
}

/// Picks one of `items` (paired with a pre-computed weight) via weighted
/// random sampling. Falls back to the first item if every weight is
/// non-positive.
fn weighted_choice<T>(items: &[(FlatIndex, T)], weights: &[f64], rng: &mut impl Rng) -> Option<FlatIndex> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return items.first().map(|&(idx, _)| idx);
    }
    let mut roll = rng.gen::<f64>() * total;
    for (&(idx, _), &w) in items.iter().zip(weights.iter()) {
        roll -= w;
        if roll <= 0.0 {
            return Some(idx);
        }
    }
    items.last().map(|&(idx, _)| idx)
}
