//! Fixed-small-dimension coordinate tuples shared across the environment,
//! organisms, and the ISA.
//!
//! Coordinates never exceed a handful of axes in practice, so we back them
//! with `SmallVec` to keep per-instruction operand resolution off the heap.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::ops::{Index, IndexMut};

/// Inline capacity before a coordinate spills to the heap. Covers the
/// overwhelming majority of simulated worlds (2D/3D/4D) without allocating.
pub const INLINE_DIMS: usize = 4;

/// A point (or direction vector, or delta) in the N-dimensional grid.
pub type CoordBuf = SmallVec<[i64; INLINE_DIMS]>;

/// A coordinate with exactly `dims` components, each interpreted modulo the
/// corresponding axis length when used as a position (toroidal wrap) or as a
/// raw signed delta when used as a direction vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Coord(pub CoordBuf);

impl Coord {
    pub fn zeros(dims: usize) -> Self {
        Coord(CoordBuf::from_elem(0, dims))
    }

    pub fn from_slice(values: &[i64]) -> Self {
        Coord(CoordBuf::from_slice(values))
    }

    pub fn dims(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// A unit vector of `dims` axes, +1 or -1 along `axis`.
    pub fn unit(dims: usize, axis: usize, positive: bool) -> Option<Self> {
        if axis >= dims {
            return None;
        }
        let mut c = Coord::zeros(dims);
        c.0[axis] = if positive { 1 } else { -1 };
        Some(c)
    }

    /// `Some((axis, positive))` iff this is a unit vector (exactly one
    /// nonzero component, magnitude 1).
    pub fn as_unit(&self) -> Option<(usize, bool)> {
        let mut found = None;
        for (axis, &v) in self.0.iter().enumerate() {
            if v == 0 {
                continue;
            }
            if v.abs() != 1 || found.is_some() {
                return None;
            }
            found = Some((axis, v > 0));
        }
        found
    }

    /// Componentwise add, wrapping each axis into `[0, shape[i])`.
    pub fn wrapping_add(&self, delta: &Coord, shape: &[usize]) -> Coord {
        debug_assert_eq!(self.0.len(), shape.len());
        debug_assert_eq!(delta.0.len(), shape.len());
        let mut out = CoordBuf::with_capacity(self.0.len());
        for i in 0..self.0.len() {
            let len = shape[i] as i64;
            let mut v = (self.0[i] + delta.0[i]) % len;
            if v < 0 {
                v += len;
            }
            out.push(v);
        }
        Coord(out)
    }

    /// Toroidal Manhattan distance between two coordinates under `shape`.
    pub fn toroidal_manhattan(&self, other: &Coord, shape: &[usize]) -> i64 {
        let mut total = 0i64;
        for i in 0..self.0.len() {
            let len = shape[i] as i64;
            let raw = (self.0[i] - other.0[i]).abs();
            total += raw.min(len - raw);
        }
        total
    }
}

impl Index<usize> for Coord {
    type Output = i64;
    fn index(&self, idx: usize) -> &i64 {
        &self.0[idx]
    }
}

impl IndexMut<usize> for Coord {
    fn index_mut(&mut self, idx: usize) -> &mut i64 {
        &mut self.0[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_vector_round_trips() {
        let u = Coord::unit(3, 1, false).unwrap();
        assert_eq!(u.as_unit(), Some((1, false)));
    }

    #[test]
    fn non_unit_is_rejected() {
        let c = Coord::from_slice(&[1, 1, 0]);
        assert_eq!(c.as_unit(), None);
        let c = Coord::from_slice(&[2, 0, 0]);
        assert_eq!(c.as_unit(), None);
    }

    #[test]
    fn wrapping_add_wraps_negative_and_overflow() {
        let shape = [4usize, 4];
        let p = Coord::from_slice(&[0, 3]);
        let d = Coord::from_slice(&[-1, 2]);
        assert_eq!(p.wrapping_add(&d, &shape), Coord::from_slice(&[3, 1]));
    }

    #[test]
    fn toroidal_manhattan_takes_shortest_arc() {
        let shape = [10usize];
        let a = Coord::from_slice(&[1]);
        let b = Coord::from_slice(&[9]);
        assert_eq!(a.toroidal_manhattan(&b, &shape), 2);
    }
}
