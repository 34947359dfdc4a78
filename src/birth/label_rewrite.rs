//! Label rewrite: XORs every one of an organism's owned LABEL and LABELREF
//! cells with the same random mask, so a label and any labelref meant to
//! match it via the fuzzy resolver drift together rather than
//! independently — the Hamming distance between any two of an organism's
//! own labels/labelrefs is preserved even as their absolute hash values
//! wander.

use rand::Rng;

use crate::config::{BirthConfig, LabelConfig};
use crate::environment::Environment;
use crate::molecule::MoleculeType;
use crate::organism::Organism;

/// `BirthConfig` carries no explicit rewrite-rate field (DESIGN.md: Open
/// Question resolution). Label rewrite is the rarest of the four handlers —
/// a whole-genome label mutation is a bigger event than flipping one cell —
/// so it runs at a tenth of the insertion rate whenever enabled.
const REWRITE_RATE_FRACTION_OF_INSERTION: f64 = 0.1;

pub fn maybe_rewrite(
    organism: &mut Organism,
    env: &mut Environment,
    cfg: &BirthConfig,
    labels: &LabelConfig,
    rng: &mut impl Rng,
) -> bool {
    if !cfg.label_rewrite_enabled {
        return false;
    }
    let rate = (cfg.insertion_rate * REWRITE_RATE_FRACTION_OF_INSERTION).clamp(0.0, 1.0);
    if !rng.gen_bool(rate) {
        return false;
    }

    let mask = rng.gen_range(0..(1u32 << labels.hash_bits));
    if mask == 0 {
        return false;
    }

    let mut indices: Vec<_> = env.cells_owned_by(organism.id).into_iter().collect();
    indices.sort_unstable();
    let mut rewrote_any = false;
    for idx in indices {
        let m = env.get_flat(idx);
        if m.ty != MoleculeType::Label && m.ty != MoleculeType::LabelRef {
            continue;
        }
        let rewritten = (m.value as u32) ^ mask;
        let _ = env.set_flat(idx, crate::molecule::Molecule::new(m.ty, rewritten as i32, m.marker), organism.id);
        rewrote_any = true;
    }
    rewrote_any
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LimitsConfig, RegisterConfig, Topology};
    use crate::coord::Coord;
    use crate::molecule::MoleculeLayout;
    use crate::program::ProgramArtifact;
    use rand::SeedableRng;

    #[test]
    fn rewrite_preserves_relative_hamming_distance_between_two_labels() {
        let mut env = Environment::from_config(&crate::config::MoleculeConfig::default(), vec![8, 8], Topology::Torus);
        let layout = MoleculeLayout::default();
        let program = ProgramArtifact::new("p")
            .with_code(Coord::from_slice(&[0, 0]), layout.pack(MoleculeType::Label, 0b1010, 0))
            .with_code(Coord::from_slice(&[1, 0]), layout.pack(MoleculeType::Label, 0b1100, 0));
        let mut organism = Organism::new(
            1,
            &program,
            Coord::from_slice(&[0, 0]),
            Coord::from_slice(&[1, 0]),
            &RegisterConfig::default(),
            &LimitsConfig::default(),
            0,
            &mut env,
        )
        .unwrap();
        let cfg = BirthConfig { label_rewrite_enabled: true, insertion_rate: 1.0, ..BirthConfig::default() };
        let labels = LabelConfig::default();
        let before_a = env.get(&Coord::from_slice(&[0, 0])).unwrap().value;
        let before_b = env.get(&Coord::from_slice(&[1, 0])).unwrap().value;
        let before_distance = (before_a ^ before_b).count_ones();

        let mut rng = rand::rngs::StdRng::seed_from_u64(99);
        // Force the rate roll by retrying a few seeds deterministically isn't
        // possible here, so drive the rate to its max via REWRITE_RATE_FRACTION.
        let mut rewrote = false;
        for _ in 0..100 {
            if maybe_rewrite(&mut organism, &mut env, &cfg, &labels, &mut rng) {
                rewrote = true;
                break;
            }
        }
        assert!(rewrote);
        let after_a = env.get(&Coord::from_slice(&[0, 0])).unwrap().value;
        let after_b = env.get(&Coord::from_slice(&[1, 0])).unwrap().value;
        assert_ne!(after_a, before_a);
        assert_eq!((after_a ^ after_b).count_ones(), before_distance);
    }

    #[test]
    fn rewrite_carries_a_labelref_by_the_same_mask_as_its_label() {
        // A labelref sharing its label's hash (distance 0, as a matching
        // internal jump target would) must still match after rewrite — both
        // are XORed with the same mask, so an internal JMPI from the ref to
        // the label keeps resolving.
        let mut env = Environment::from_config(&crate::config::MoleculeConfig::default(), vec![8, 8], Topology::Torus);
        let layout = MoleculeLayout::default();
        let program = ProgramArtifact::new("p")
            .with_code(Coord::from_slice(&[0, 0]), layout.pack(MoleculeType::Label, 0b1010, 0))
            .with_code(Coord::from_slice(&[1, 0]), layout.pack(MoleculeType::LabelRef, 0b1010, 0));
        let mut organism = Organism::new(
            1,
            &program,
            Coord::from_slice(&[0, 0]),
            Coord::from_slice(&[1, 0]),
            &RegisterConfig::default(),
            &LimitsConfig::default(),
            0,
            &mut env,
        )
        .unwrap();
        let cfg = BirthConfig { label_rewrite_enabled: true, insertion_rate: 1.0, ..BirthConfig::default() };
        let labels = LabelConfig::default();

        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let mut rewrote = false;
        for _ in 0..100 {
            if maybe_rewrite(&mut organism, &mut env, &cfg, &labels, &mut rng) {
                rewrote = true;
                break;
            }
        }
        assert!(rewrote);
        let label = env.get(&Coord::from_slice(&[0, 0])).unwrap();
        let labelref = env.get(&Coord::from_slice(&[1, 0])).unwrap();
        assert_eq!(label.ty, MoleculeType::Label);
        assert_eq!(labelref.ty, MoleculeType::LabelRef);
        assert_eq!(label.value, labelref.value, "ref must still match its label after rewrite");
        assert_ne!(label.value, 0b1010, "rewrite must actually have changed the hash");
    }

    #[test]
    fn disabled_never_rewrites() {
        let mut env = Environment::from_config(&crate::config::MoleculeConfig::default(), vec![8, 8], Topology::Torus);
        let layout = MoleculeLayout::default();
        let program = ProgramArtifact::new("p")
            .with_code(Coord::from_slice(&[0, 0]), layout.pack(MoleculeType::Label, 5, 0));
        let mut organism = Organism::new(
            1,
            &program,
            Coord::from_slice(&[0, 0]),
            Coord::from_slice(&[1, 0]),
            &RegisterConfig::default(),
            &LimitsConfig::default(),
            0,
            &mut env,
        )
        .unwrap();
        let cfg = BirthConfig { label_rewrite_enabled: false, ..BirthConfig::default() };
        let labels = LabelConfig::default();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        assert!(!maybe_rewrite(&mut organism, &mut env, &cfg, &labels, &mut rng));
    }
}
