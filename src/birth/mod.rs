//! §4.10 Birth/death handlers: the stochastic genome-mutation events that
//! run against a living organism every tick (duplication, deletion,
//! insertion, label rewrite), plus the cleanup applied when an organism
//! dies (decay). These are population-level mutation pressure, not
//! something an organism's own code triggers directly.

pub mod decay;
pub mod deletion;
pub mod duplication;
pub mod insertion;
pub mod label_rewrite;

use rand::Rng;

use crate::config::Config;
use crate::coord::Coord;
use crate::environment::Environment;
use crate::environment::FlatIndex;
use crate::isa::InstructionRegistry;
use crate::organism::Organism;

/// Which mutation events fired for one organism in one tick, surfaced for
/// tick-output/telemetry purposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BirthReport {
    pub duplicated: bool,
    pub deleted: bool,
    pub inserted: bool,
    pub label_rewritten: bool,
}

/// Runs every birth-handler event for one organism, in a fixed order
/// (duplication, deletion, insertion, label rewrite) so that a given RNG
/// stream always produces the same outcome for the same organism state.
pub fn run_birth_events(
    organism: &mut Organism,
    env: &mut Environment,
    config: &Config,
    registry: &InstructionRegistry,
    rng: &mut impl Rng,
) -> BirthReport {
    BirthReport {
        duplicated: duplication::maybe_duplicate(organism, env, &config.birth, rng),
        deleted: deletion::maybe_delete(organism, env, &config.birth, rng),
        inserted: insertion::maybe_insert(organism, env, config, registry, rng),
        label_rewritten: label_rewrite::maybe_rewrite(organism, env, &config.birth, &config.labels, rng),
    }
}

/// Classic reservoir sampling (Algorithm R): picks `k` items from `items`
/// uniformly at random without replacement, in a single pass, using only
/// `O(k)` extra space. Used by the duplication and deletion handlers to
/// pick genome windows/cells fairly regardless of genome size.
pub(crate) fn reservoir_sample<T: Clone>(items: &[T], k: usize, rng: &mut impl Rng) -> Vec<T> {
    let k = k.min(items.len());
    let mut reservoir: Vec<T> = items[..k].to_vec();
    for (i, item) in items.iter().enumerate().skip(k) {
        let j = rng.gen_range(0..=i);
        if j < k {
            reservoir[j] = item.clone();
        }
    }
    reservoir
}

pub(crate) fn owned_sorted(env: &Environment, id: crate::organism::OrganismId) -> Vec<FlatIndex> {
    let mut indices: Vec<FlatIndex> = env.cells_owned_by(id).into_iter().collect();
    indices.sort_unstable();
    indices
}

/// An organism's DV axis and the step direction along it (`+1`/`-1`),
/// shared by every handler that walks or copies along the direction vector.
pub(crate) fn dv_axis_and_sign(organism: &Organism) -> Option<(usize, i64)> {
    let (axis, positive) = organism.dv.as_unit()?;
    Some((axis, if positive { 1 } else { -1 }))
}

/// Number of distinct scan lines perpendicular to `dv_axis` — the product of
/// every other axis's length.
pub(crate) fn line_count(shape: &[usize], dv_axis: usize) -> usize {
    shape.iter().enumerate().filter(|&(axis, _)| axis != dv_axis).map(|(_, &len)| len).product()
}

/// Maps a line index back to a base coordinate (the `dv_axis` component left
/// at 0) via a mixed-radix decomposition over every other axis. The mapping
/// is an arbitrary bijection, not a geometric one — it only needs to let
/// `reservoir_sample` treat every scan line as an equally likely candidate.
pub(crate) fn line_base_from_index(shape: &[usize], dv_axis: usize, mut idx: usize) -> Coord {
    let mut out = vec![0i64; shape.len()];
    for (axis, &len) in shape.iter().enumerate() {
        if axis == dv_axis {
            continue;
        }
        out[axis] = (idx % len) as i64;
        idx /= len;
    }
    Coord::from_slice(&out)
}

/// Reservoir-samples one scan line perpendicular to `dv_axis`, uniform over
/// every line regardless of how densely any of them is populated, and
/// returns its base coordinate (`dv_axis` component 0).
pub(crate) fn pick_scan_line(shape: &[usize], dv_axis: usize, rng: &mut impl Rng) -> Option<Coord> {
    let n = line_count(shape, dv_axis);
    if n == 0 {
        return None;
    }
    let candidates: Vec<usize> = (0..n).collect();
    let chosen = *reservoir_sample(&candidates, 1, rng).first()?;
    Some(line_base_from_index(shape, dv_axis, chosen))
}

/// Finds the single largest gap among `marked` positions on a torus of
/// `axis_len`, by sorting them and treating the widest circular gap between
/// consecutive marks as the "outside" of the arc they otherwise trace out.
/// Returns `(gap_start, gap_len)`; with nothing marked the whole line is one
/// gap, `(0, axis_len)`.
pub(crate) fn largest_gap(mut marked: Vec<i64>, axis_len: i64) -> (i64, i64) {
    marked.sort_unstable();
    marked.dedup();
    if marked.is_empty() {
        return (0, axis_len);
    }
    let mut best_start = 0i64;
    let mut best_len = -1i64;
    for (i, &cur) in marked.iter().enumerate() {
        let next = if i + 1 < marked.len() { marked[i + 1] } else { marked[0] + axis_len };
        let gap = next - cur - 1;
        if gap > best_len {
            best_len = gap;
            best_start = (cur + 1) % axis_len;
        }
    }
    (best_start, best_len.max(0))
}
