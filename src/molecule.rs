//! §4.1 Molecule codec: packs `(type, value, marker)` into a single 32-bit
//! word. The layout is total — every 32-bit pattern decodes to a valid
//! molecule — so unpacking never fails.

use serde::{Deserialize, Serialize};

/// Molecule type tag. The seven named tags are the only ones the ISA
/// interprets; any other bit pattern in the type field is preserved
/// losslessly as `Unknown` so that `pack(unpack(w)) == w` holds for every
/// 32-bit `w`, per the codec's totality contract. `Unknown` cells behave as
/// non-CODE, non-executable molecules wherever the ISA inspects type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoleculeType {
    Code,
    Data,
    Energy,
    Structure,
    Label,
    LabelRef,
    Register,
    Unknown(u32),
}

impl MoleculeType {
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            0 => MoleculeType::Code,
            1 => MoleculeType::Data,
            2 => MoleculeType::Energy,
            3 => MoleculeType::Structure,
            4 => MoleculeType::Label,
            5 => MoleculeType::LabelRef,
            6 => MoleculeType::Register,
            other => MoleculeType::Unknown(other),
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            MoleculeType::Code => 0,
            MoleculeType::Data => 1,
            MoleculeType::Energy => 2,
            MoleculeType::Structure => 3,
            MoleculeType::Label => 4,
            MoleculeType::LabelRef => 5,
            MoleculeType::Register => 6,
            MoleculeType::Unknown(tag) => tag,
        }
    }
}

/// Bit-layout parameters for the codec. The reference layout is
/// VALUE_BITS=20, MARKER_BITS=4, leaving 8 bits for the type tag (3 of which
/// are used, 5 reserved/always-zero) in a 32-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoleculeLayout {
    pub value_bits: u32,
    pub marker_bits: u32,
}

impl Default for MoleculeLayout {
    fn default() -> Self {
        MoleculeLayout {
            value_bits: 20,
            marker_bits: 4,
        }
    }
}

impl MoleculeLayout {
    fn value_mask(&self) -> u32 {
        (1u32 << self.value_bits) - 1
    }

    fn marker_mask(&self) -> u32 {
        (1u32 << self.marker_bits) - 1
    }

    fn marker_shift(&self) -> u32 {
        self.value_bits
    }

    fn type_shift(&self) -> u32 {
        self.value_bits + self.marker_bits
    }

    /// Packs a signed value (truncated to `value_bits`), a 4-bit marker
    /// (truncated to `marker_bits`), and a type tag into one word.
    pub fn pack(&self, ty: MoleculeType, value: i32, marker: u32) -> u32 {
        let value_bits = (value as u32) & self.value_mask();
        let marker_bits = marker & self.marker_mask();
        (ty.tag() << self.type_shift()) | (marker_bits << self.marker_shift()) | value_bits
    }

    /// Unpacks a word into its constituent fields. Always succeeds.
    pub fn unpack(&self, word: u32) -> (MoleculeType, i32, u32) {
        let value_bits = word & self.value_mask();
        let marker = (word >> self.marker_shift()) & self.marker_mask();
        let tag = word >> self.type_shift();
        (MoleculeType::from_tag(tag), value_bits as i32, marker)
    }

    /// Sign-extends the value field of a raw word using this layout's
    /// `value_bits` width.
    pub fn scalar(&self, word: u32) -> i32 {
        let value_bits = word & self.value_mask();
        let sign_bit = 1u32 << (self.value_bits - 1);
        if value_bits & sign_bit != 0 {
            (value_bits | !self.value_mask()) as i32
        } else {
            value_bits as i32
        }
    }

    pub fn empty_word(&self) -> u32 {
        self.pack(MoleculeType::Code, 0, 0)
    }
}

/// A decoded, owned view of a cell's contents. Immutable once constructed;
/// cells are overwritten as whole molecules, never field-by-field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Molecule {
    pub ty: MoleculeType,
    pub value: i32,
    pub marker: u32,
}

impl Molecule {
    pub fn new(ty: MoleculeType, value: i32, marker: u32) -> Self {
        Molecule { ty, value, marker }
    }

    pub fn empty() -> Self {
        Molecule {
            ty: MoleculeType::Code,
            value: 0,
            marker: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ty == MoleculeType::Code && self.value == 0
    }

    pub fn pack(&self, layout: &MoleculeLayout) -> u32 {
        layout.pack(self.ty, self.value, self.marker)
    }

    pub fn unpack(word: u32, layout: &MoleculeLayout) -> Self {
        let (ty, value, marker) = layout.unpack(word);
        Molecule { ty, value, marker }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_is_code_zero() {
        let m = Molecule::empty();
        assert!(m.is_empty());
        assert_eq!(m.marker, 0);
    }

    #[test]
    fn scalar_sign_extends() {
        let layout = MoleculeLayout::default();
        let word = layout.pack(MoleculeType::Data, -5, 0);
        assert_eq!(layout.scalar(word), -5);
    }

    proptest! {
        #[test]
        fn pack_unpack_round_trips(word in any::<u32>()) {
            let layout = MoleculeLayout::default();
            let (ty, value, marker) = layout.unpack(word);
            let repacked = layout.pack(ty, value, marker);
            // Only the bits within (type_tag|marker|value) are defined by the
            // layout; for the default layout (20+4+8) that is the full word,
            // so the round trip must be exact.
            prop_assert_eq!(repacked, word);
        }

        #[test]
        fn molecule_pack_unpack_round_trips(value in -(1i32 << 19)..(1i32 << 19), marker in 0u32..16) {
            let layout = MoleculeLayout::default();
            let m = Molecule::new(MoleculeType::Label, value, marker);
            let word = m.pack(&layout);
            let back = Molecule::unpack(word, &layout);
            prop_assert_eq!(back, m);
        }
    }
}
