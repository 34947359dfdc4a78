//! Program artifact: a read-only, shared-immutable description of a
//! compiled genome. Compilation itself is out of scope for this crate —
//! this type is the passive hand-off format the runtime consumes.
//!
//! Code and label coordinates are stored relative to the artifact's own
//! origin; placing an organism at a given grid position translates every
//! offset by that position (with toroidal wrap), so one artifact can seed
//! any number of organisms at different locations.

use std::collections::HashMap;

use crate::coord::Coord;

#[derive(Debug, Clone)]
pub struct LabelEntry {
    pub hash: u32,
    pub canonical_coord: Coord,
}

#[derive(Debug, Clone)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

/// A compiled genome: program id, code words keyed by offset coordinate, a
/// label table for fuzzy-jump bookkeeping at compile time, and an optional
/// source map for observability. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct ProgramArtifact {
    pub program_id: String,
    code: HashMap<Coord, u32>,
    pub labels: HashMap<String, LabelEntry>,
    pub source_map: HashMap<Coord, SourceLocation>,
}

impl ProgramArtifact {
    pub fn new(program_id: impl Into<String>) -> Self {
        ProgramArtifact {
            program_id: program_id.into(),
            code: HashMap::new(),
            labels: HashMap::new(),
            source_map: HashMap::new(),
        }
    }

    pub fn with_code(mut self, offset: Coord, word: u32) -> Self {
        self.code.insert(offset, word);
        self
    }

    pub fn code_at(&self, offset: &Coord) -> Option<u32> {
        self.code.get(offset).copied()
    }

    pub fn iter_code(&self) -> impl Iterator<Item = (&Coord, &u32)> {
        self.code.iter()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}
