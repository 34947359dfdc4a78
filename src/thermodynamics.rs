//! Thermodynamics: every executed instruction costs energy and generates
//! entropy. The mapping from instruction to cost is a pluggable policy
//! rather than a hardcoded table, so a host can swap in a different cost
//! model without touching the VM: built once, shared by reference.

use std::collections::HashMap;

use crate::config::LimitsConfig;
use crate::isa::{Family, InstructionDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThermoCost {
    pub energy: i64,
    pub entropy: i64,
}

impl ThermoCost {
    pub fn new(energy: i64, entropy: i64) -> Self {
        ThermoCost { energy, entropy }
    }
}

/// Base energy cost per family, used when an instruction has no specific
/// per-mnemonic override. Entropy generated per instruction is a fixed
/// fraction of its energy cost, rounded up, reflecting that more costly
/// operations dissipate proportionally more disorder.
#[derive(Debug, Clone)]
pub struct ThermodynamicPolicy {
    family_base: HashMap<FamilyKey, i64>,
    mnemonic_overrides: HashMap<&'static str, i64>,
    entropy_per_energy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FamilyKey {
    Nop,
    Data,
    Arithmetic,
    Bitwise,
    Conditional,
    Vector,
    EnvInteraction,
    ControlFlow,
    Location,
}

fn family_key(f: Family) -> FamilyKey {
    match f {
        Family::Nop => FamilyKey::Nop,
        Family::Data => FamilyKey::Data,
        Family::Arithmetic => FamilyKey::Arithmetic,
        Family::Bitwise => FamilyKey::Bitwise,
        Family::Conditional => FamilyKey::Conditional,
        Family::Vector => FamilyKey::Vector,
        Family::EnvInteraction => FamilyKey::EnvInteraction,
        Family::ControlFlow => FamilyKey::ControlFlow,
        Family::Location => FamilyKey::Location,
    }
}

impl Default for ThermodynamicPolicy {
    fn default() -> Self {
        let mut family_base = HashMap::new();
        family_base.insert(FamilyKey::Nop, 0);
        family_base.insert(FamilyKey::Data, 1);
        family_base.insert(FamilyKey::Arithmetic, 2);
        family_base.insert(FamilyKey::Bitwise, 2);
        family_base.insert(FamilyKey::Conditional, 1);
        family_base.insert(FamilyKey::Vector, 3);
        family_base.insert(FamilyKey::EnvInteraction, 5);
        family_base.insert(FamilyKey::ControlFlow, 2);
        family_base.insert(FamilyKey::Location, 2);

        let mut mnemonic_overrides = HashMap::new();
        // Reading a cell is cheaper than the combined read+write instructions
        // sharing its family base.
        mnemonic_overrides.insert("PEEK", 3);

        ThermodynamicPolicy {
            family_base,
            mnemonic_overrides,
            entropy_per_energy: 0.25,
        }
    }
}

impl ThermodynamicPolicy {
    pub fn cost_of(&self, def: &InstructionDef) -> ThermoCost {
        let energy = self
            .mnemonic_overrides
            .get(def.mnemonic)
            .copied()
            .unwrap_or_else(|| *self.family_base.get(&family_key(def.family)).unwrap_or(&1));
        let entropy = (energy as f64 * self.entropy_per_energy).ceil() as i64;
        ThermoCost::new(energy, entropy)
    }

    /// Cost charged when an instruction fails outright or an organism stalls
    /// on `skip_nop_cells`.
    pub fn failure_cost(&self, limits: &LimitsConfig) -> ThermoCost {
        ThermoCost::new(limits.error_penalty_cost, limits.error_penalty_cost / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::REGISTRY;

    #[test]
    fn nop_is_free() {
        let policy = ThermodynamicPolicy::default();
        let def = REGISTRY.lookup(REGISTRY.id_of("NOP", "-").unwrap()).unwrap();
        assert_eq!(policy.cost_of(def), ThermoCost::new(0, 0));
    }

    #[test]
    fn mnemonic_override_wins_over_family_base() {
        let policy = ThermodynamicPolicy::default();
        let def = REGISTRY.lookup(REGISTRY.id_of("PEEK", "R").unwrap()).unwrap();
        assert_eq!(policy.cost_of(def).energy, 3);
    }
}
