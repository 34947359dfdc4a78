//! Environment: the packed, toroidal N-dimensional world.
//!
//! Storage is a row-major array of packed molecule words plus a parallel
//! ownership array, with a secondary owner-id → owned-cell-set index
//! maintained on every write. The owner-index uses a sparse per-owner
//! `HashSet<usize>` rather than a dense bitset per organism, since organisms
//! typically own a small, contiguous fraction of a large world.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::config::{MoleculeConfig, Topology};
use crate::coord::Coord;
use crate::molecule::{Molecule, MoleculeLayout};
use crate::organism::OrganismId;

/// Flat index into the row-major cell/owner arrays.
pub type FlatIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentError {
    #[error("coordinate is out of bounds for a bounded (non-toroidal) axis")]
    OutOfBounds,
    #[error("empty molecule must be written with owner = 0")]
    EmptyCellMustBeUnowned,
}

pub struct Environment {
    shape: Vec<usize>,
    strides: Vec<usize>,
    topology: Topology,
    layout: MoleculeLayout,
    cells: Vec<u32>,
    owners: Vec<u32>,
    owner_index: HashMap<OrganismId, HashSet<FlatIndex>>,
}

impl Environment {
    pub fn new(shape: Vec<usize>, topology: Topology, layout: MoleculeLayout) -> Self {
        assert!(!shape.is_empty(), "shape must have at least one axis");
        assert!(shape.iter().all(|&d| d > 0), "axis lengths must be positive");
        let total: usize = shape.iter().product();
        let strides = Self::compute_strides(&shape);
        let empty = layout.empty_word();
        Environment {
            shape,
            strides,
            topology,
            layout,
            cells: vec![empty; total],
            owners: vec![0; total],
            owner_index: HashMap::new(),
        }
    }

    pub fn from_config(cfg: &MoleculeConfig, shape: Vec<usize>, topology: Topology) -> Self {
        let layout = MoleculeLayout {
            value_bits: cfg.value_bits,
            marker_bits: cfg.marker_bits,
        };
        Self::new(shape, topology, layout)
    }

    fn compute_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![1usize; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn layout(&self) -> &MoleculeLayout {
        &self.layout
    }

    pub fn total_cells(&self) -> usize {
        self.cells.len()
    }

    /// Resolves a coordinate to a flat index, applying toroidal wrap or
    /// rejecting out-of-bounds coordinates per the configured topology.
    pub fn flat_index(&self, coord: &Coord) -> Result<FlatIndex, EnvironmentError> {
        debug_assert_eq!(coord.dims(), self.shape.len());
        let mut idx = 0usize;
        for (i, &v) in coord.as_slice().iter().enumerate() {
            let len = self.shape[i] as i64;
            let wrapped = match self.topology {
                Topology::Torus => {
                    let mut w = v % len;
                    if w < 0 {
                        w += len;
                    }
                    w
                }
                Topology::Bounded => {
                    if v < 0 || v >= len {
                        return Err(EnvironmentError::OutOfBounds);
                    }
                    v
                }
            };
            idx += wrapped as usize * self.strides[i];
        }
        Ok(idx)
    }

    pub fn coord_from_flat(&self, flat: FlatIndex) -> Coord {
        let mut rem = flat;
        let mut out = vec![0i64; self.shape.len()];
        for i in 0..self.shape.len() {
            out[i] = (rem / self.strides[i]) as i64;
            rem %= self.strides[i];
        }
        Coord::from_slice(&out)
    }

    /// Adds `dv` to `coord` componentwise with per-axis wrap, regardless of
    /// the configured topology (used for IP advancement, which always walks
    /// the torus even in a bounded world — bounded mode only restricts
    /// explicit addressed reads/writes).
    pub fn next_position(&self, coord: &Coord, dv: &Coord) -> Coord {
        coord.wrapping_add(dv, &self.shape)
    }

    pub fn get(&self, coord: &Coord) -> Result<Molecule, EnvironmentError> {
        let idx = self.flat_index(coord)?;
        Ok(Molecule::unpack(self.cells[idx], &self.layout))
    }

    pub fn get_owner(&self, coord: &Coord) -> Result<OrganismId, EnvironmentError> {
        let idx = self.flat_index(coord)?;
        Ok(self.owners[idx])
    }

    pub fn get_flat(&self, idx: FlatIndex) -> Molecule {
        Molecule::unpack(self.cells[idx], &self.layout)
    }

    pub fn owner_flat(&self, idx: FlatIndex) -> OrganismId {
        self.owners[idx]
    }

    /// Writes a molecule and updates ownership bookkeeping. Enforces the
    /// invariant that an empty molecule is always unowned.
    pub fn set(
        &mut self,
        coord: &Coord,
        molecule: Molecule,
        owner: OrganismId,
    ) -> Result<(), EnvironmentError> {
        let idx = self.flat_index(coord)?;
        self.set_flat(idx, molecule, owner)
    }

    pub fn set_flat(
        &mut self,
        idx: FlatIndex,
        molecule: Molecule,
        owner: OrganismId,
    ) -> Result<(), EnvironmentError> {
        if molecule.is_empty() && owner != 0 {
            return Err(EnvironmentError::EmptyCellMustBeUnowned);
        }
        let previous_owner = self.owners[idx];
        if previous_owner != owner {
            if previous_owner != 0 {
                if let Some(set) = self.owner_index.get_mut(&previous_owner) {
                    set.remove(&idx);
                }
            }
            if owner != 0 {
                self.owner_index.entry(owner).or_default().insert(idx);
            }
            self.owners[idx] = owner;
        }
        self.cells[idx] = molecule.pack(&self.layout);
        trace!(idx, owner, ?molecule, "environment cell written");
        Ok(())
    }

    /// Sets owner to 0 without touching the molecule. Used by PEEK, which
    /// clears ownership but the cell it clears is always emptied by the
    /// caller first (an owned, non-empty cell with owner 0 would violate
    /// the empty-cell invariant only if the cell were also empty; PEEK
    /// always pairs this with writing `Molecule::empty()`).
    pub fn clear_owner(&mut self, coord: &Coord) -> Result<(), EnvironmentError> {
        let idx = self.flat_index(coord)?;
        self.clear_owner_flat(idx);
        Ok(())
    }

    pub fn clear_owner_flat(&mut self, idx: FlatIndex) {
        let previous_owner = self.owners[idx];
        if previous_owner != 0 {
            if let Some(set) = self.owner_index.get_mut(&previous_owner) {
                set.remove(&idx);
            }
            self.owners[idx] = 0;
        }
    }

    /// Removes every cell owned by `owner_id` from the ownership array and
    /// index, clearing marker bits but preserving molecule type/value. Used
    /// by the scheduler after death handlers run.
    pub fn clear_ownership_of(&mut self, owner_id: OrganismId) {
        let Some(indices) = self.owner_index.remove(&owner_id) else {
            return;
        };
        for idx in indices {
            self.owners[idx] = 0;
            let m = Molecule::unpack(self.cells[idx], &self.layout);
            let cleared = Molecule::new(m.ty, m.value, 0);
            self.cells[idx] = cleared.pack(&self.layout);
        }
    }

    pub fn cells_owned_by(&self, id: OrganismId) -> HashSet<FlatIndex> {
        self.owner_index.get(&id).cloned().unwrap_or_default()
    }

    pub fn owned_count(&self, id: OrganismId) -> usize {
        self.owner_index.get(&id).map_or(0, HashSet::len)
    }

    /// Zero-copy iteration of `(flat_index, molecule, owner)` for every cell,
    /// consumed by the host for tick-output snapshots. This crate does not
    /// buffer or persist the snapshot itself.
    pub fn iter_cells(&self) -> impl Iterator<Item = (FlatIndex, Molecule, OrganismId)> + '_ {
        self.cells
            .iter()
            .zip(self.owners.iter())
            .enumerate()
            .map(move |(idx, (&word, &owner))| (idx, Molecule::unpack(word, &self.layout), owner))
    }

    /// Checks the two cross-cutting invariants: owner array/index
    /// agreement, and the empty-cell invariant. Intended for tests and
    /// debug assertions, not the hot path.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (owner, set) in &self.owner_index {
            for &idx in set {
                if self.owners[idx] != *owner {
                    return Err(format!(
                        "owner index claims {owner} owns {idx} but owners[{idx}] = {}",
                        self.owners[idx]
                    ));
                }
            }
        }
        for idx in 0..self.cells.len() {
            let m = Molecule::unpack(self.cells[idx], &self.layout);
            if m.is_empty() && (self.owners[idx] != 0 || m.marker != 0) {
                return Err(format!("empty cell {idx} has nonzero owner or marker"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::MoleculeType;

    fn env() -> Environment {
        Environment::new(vec![4, 4], Topology::Torus, MoleculeLayout::default())
    }

    #[test]
    fn flat_index_round_trips_with_coord_from_flat() {
        let e = env();
        let c = Coord::from_slice(&[2, 3]);
        let idx = e.flat_index(&c).unwrap();
        assert_eq!(e.coord_from_flat(idx), c);
    }

    #[test]
    fn torus_wraps_out_of_range_coordinates() {
        let e = env();
        let c = Coord::from_slice(&[-1, 5]);
        let idx = e.flat_index(&c).unwrap();
        assert_eq!(e.coord_from_flat(idx), Coord::from_slice(&[3, 1]));
    }

    #[test]
    fn bounded_rejects_out_of_range() {
        let e = Environment::new(vec![4, 4], Topology::Bounded, MoleculeLayout::default());
        let c = Coord::from_slice(&[-1, 0]);
        assert_eq!(e.flat_index(&c), Err(EnvironmentError::OutOfBounds));
    }

    #[test]
    fn set_maintains_owner_index() {
        let mut e = env();
        let c = Coord::from_slice(&[1, 1]);
        e.set(&c, Molecule::new(MoleculeType::Data, 7, 1), 5).unwrap();
        assert_eq!(e.get_owner(&c).unwrap(), 5);
        assert!(e.cells_owned_by(5).contains(&e.flat_index(&c).unwrap()));

        // Reassigning ownership removes the old entry and adds the new one.
        e.set(&c, Molecule::new(MoleculeType::Data, 7, 1), 9).unwrap();
        assert!(!e.cells_owned_by(5).contains(&e.flat_index(&c).unwrap()));
        assert!(e.cells_owned_by(9).contains(&e.flat_index(&c).unwrap()));
        e.check_invariants().unwrap();
    }

    #[test]
    fn empty_write_with_nonzero_owner_is_rejected() {
        let mut e = env();
        let c = Coord::from_slice(&[0, 0]);
        let err = e.set(&c, Molecule::empty(), 3).unwrap_err();
        assert_eq!(err, EnvironmentError::EmptyCellMustBeUnowned);
    }

    #[test]
    fn clear_ownership_of_preserves_values_but_clears_marker() {
        let mut e = env();
        let c = Coord::from_slice(&[2, 2]);
        e.set(&c, Molecule::new(MoleculeType::Label, 42, 3), 1).unwrap();
        e.clear_ownership_of(1);
        let m = e.get(&c).unwrap();
        assert_eq!(m.value, 42);
        assert_eq!(m.marker, 0);
        assert_eq!(e.get_owner(&c).unwrap(), 0);
        assert_eq!(e.owned_count(1), 0);
    }
}
