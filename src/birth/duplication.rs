//! Gene duplication: copies a contiguous stretch of the newborn's own
//! genome, starting at one of its own labels, into the largest NOP region
//! found on an independently chosen scan line perpendicular to DV.

use rand::Rng;

use crate::config::BirthConfig;
use crate::environment::Environment;
use crate::molecule::MoleculeType;
use crate::organism::Organism;

use super::{dv_axis_and_sign, largest_gap, owned_sorted, pick_scan_line, reservoir_sample};

/// Reservoir-samples one of the organism's own owned LABEL cells to anchor
/// the copy, then counts how far the contiguous run of cells it owns
/// extends from that anchor in the copy direction — this is the "available
/// source" half of the `min(source, NOP)` copy-length rule.
fn pick_source(organism: &Organism, env: &Environment, dv_axis: usize, sign: i64, rng: &mut impl Rng) -> Option<(crate::coord::Coord, usize)> {
    let owned = owned_sorted(env, organism.id);
    let label_indices: Vec<_> = owned.into_iter().filter(|&idx| env.get_flat(idx).ty == MoleculeType::Label).collect();
    let anchor_idx = *reservoir_sample(&label_indices, 1, rng).first()?;
    let anchor = env.coord_from_flat(anchor_idx);
    let axis_len = env.shape()[dv_axis] as i64;

    let mut run = 0usize;
    let mut pos = anchor[dv_axis];
    loop {
        let mut c = anchor.clone();
        c[dv_axis] = pos;
        if env.get_owner(&c).ok()? != organism.id {
            break;
        }
        run += 1;
        if run as i64 >= axis_len {
            break;
        }
        pos = ((pos + sign) % axis_len + axis_len) % axis_len;
    }
    Some((anchor, run))
}

pub fn maybe_duplicate(organism: &mut Organism, env: &mut Environment, cfg: &BirthConfig, rng: &mut impl Rng) -> bool {
    if !rng.gen_bool(cfg.duplication_rate.clamp(0.0, 1.0)) {
        return false;
    }
    let Some((dv_axis, sign)) = dv_axis_and_sign(organism) else {
        return false;
    };
    let axis_len = env.shape()[dv_axis] as i64;

    let Some((source_base, source_len)) = pick_source(organism, env, dv_axis, sign, rng) else {
        return false;
    };
    if source_len == 0 {
        return false;
    }

    let Some(dest_base) = pick_scan_line(env.shape(), dv_axis, rng) else {
        return false;
    };
    let occupied: Vec<i64> = (0..axis_len)
        .filter(|&pos| {
            let mut c = dest_base.clone();
            c[dv_axis] = pos;
            env.get_owner(&c).map(|o| o != 0).unwrap_or(true)
        })
        .collect();
    let (dest_start, nop_len) = largest_gap(occupied, axis_len);
    if nop_len < cfg.min_nop_size as i64 {
        return false;
    }

    let copy_len = source_len.min(nop_len as usize);
    let anchor_pos = source_base[dv_axis];
    for step in 0..copy_len {
        let src_pos = ((anchor_pos + sign * step as i64) % axis_len + axis_len) % axis_len;
        let dst_pos = ((dest_start + sign * step as i64) % axis_len + axis_len) % axis_len;
        let mut src_coord = source_base.clone();
        src_coord[dv_axis] = src_pos;
        let mut dst_coord = dest_base.clone();
        dst_coord[dv_axis] = dst_pos;
        let molecule = env.get(&src_coord).expect("coordinate within shape");
        let _ = env.set(&dst_coord, molecule, organism.id);
    }
    true
}
