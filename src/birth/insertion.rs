//! Gene insertion: grows an organism's genome by one syntactically
//! well-typed chain — an opcode plus one molecule per non-STACK operand,
//! each drawn from a distribution fitting that operand's kind — written into
//! the largest contiguous NOP region on a reservoir-sampled candidate scan
//! line. The rarer "label" entry instead derives a new label hash from one
//! of the organism's own existing labels, XORed with a small random mask, so
//! a newly inserted label starts out close (in Hamming distance) to a label
//! the organism already resolves by.

use rand::Rng;

use crate::config::{Config, RegisterConfig};
use crate::environment::Environment;
use crate::isa::{InstructionDef, InstructionRegistry, OperandSource};
use crate::molecule::{Molecule, MoleculeType};
use crate::organism::Organism;

use super::{dv_axis_and_sign, largest_gap, owned_sorted, pick_scan_line};

pub fn maybe_insert(
    organism: &mut Organism,
    env: &mut Environment,
    config: &Config,
    registry: &InstructionRegistry,
    rng: &mut impl Rng,
) -> bool {
    if !rng.gen_bool(config.birth.insertion_rate.clamp(0.0, 1.0)) {
        return false;
    }
    if registry.is_empty() {
        return false;
    }
    let Some((dv_axis, sign)) = dv_axis_and_sign(organism) else {
        return false;
    };

    let owned_label_hashes: Vec<i32> = owned_sorted(env, organism.id)
        .into_iter()
        .filter_map(|idx| {
            let m = env.get_flat(idx);
            (m.ty == MoleculeType::Label).then_some(m.value)
        })
        .collect();

    let chain = if rng.gen_bool(config.birth.insertion_label_weight.clamp(0.0, 1.0)) {
        // No owned label to derive a new one from yet: nothing to insert.
        let Some(&anchor) = pick_uniform(&owned_label_hashes, rng) else {
            return false;
        };
        let mask = random_mask(config.labels.hash_bits, config.birth.insertion_bitflips, rng);
        vec![Molecule::new(MoleculeType::Label, (anchor as u32 ^ mask) as i32, 0)]
    } else {
        let opcode_id = rng.gen_range(1..=registry.len() as i32);
        let def = registry.lookup(opcode_id).expect("opcode id within registry range");
        build_instruction_chain(def, &config.registers, &owned_label_hashes, config.labels.hash_bits, env.shape().len(), config.birth.insertion_data_min, config.birth.insertion_data_max, rng)
    };
    if chain.is_empty() {
        return false;
    }

    let Some(dest_base) = pick_scan_line(env.shape(), dv_axis, rng) else {
        return false;
    };
    let axis_len = env.shape()[dv_axis] as i64;
    let occupied: Vec<i64> = (0..axis_len)
        .filter(|&pos| {
            let mut c = dest_base.clone();
            c[dv_axis] = pos;
            env.get_owner(&c).map(|o| o != 0).unwrap_or(true)
        })
        .collect();
    let (start, nop_len) = largest_gap(occupied, axis_len);
    if chain.len() as i64 > nop_len {
        return false;
    }

    for (step, molecule) in chain.into_iter().enumerate() {
        let pos = ((start + sign * step as i64) % axis_len + axis_len) % axis_len;
        let mut c = dest_base.clone();
        c[dv_axis] = pos;
        let _ = env.set(&c, molecule, organism.id);
    }
    true
}

fn pick_uniform<'a, T>(items: &'a [T], rng: &mut impl Rng) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(rng.gen_range(0..items.len()))
}

/// A mask with up to `bitflips` bits set, confined to the low `width` bits —
/// the spec's "random bitmask of `bitflips` bits" applied only to the field
/// it is meant to perturb (a label's hash, or a value field), never spilling
/// into the marker/type bits of the eventual packed word.
fn random_mask(width: u32, bitflips: u32, rng: &mut impl Rng) -> u32 {
    if width == 0 {
        return 0;
    }
    let mut mask = 0u32;
    for _ in 0..bitflips {
        let bit = rng.gen_range(0..width);
        mask ^= 1 << bit;
    }
    mask
}

/// One register raw id drawn uniformly from the DR/PR/FPR scalar banks.
fn random_scalar_register_raw_id(cfg: &RegisterConfig, rng: &mut impl Rng) -> u32 {
    match rng.gen_range(0..3) {
        0 if cfg.num_data_registers > 0 => rng.gen_range(0..cfg.num_data_registers) as u32,
        1 if cfg.num_pointer_registers > 0 => cfg.pr_base + rng.gen_range(0..cfg.num_pointer_registers) as u32,
        2 if cfg.num_formal_param_registers > 0 => cfg.fpr_base + rng.gen_range(0..cfg.num_formal_param_registers) as u32,
        _ => 0,
    }
}

fn random_location_register_raw_id(cfg: &RegisterConfig, rng: &mut impl Rng) -> u32 {
    if cfg.num_location_registers == 0 {
        return cfg.lr_base;
    }
    cfg.lr_base + rng.gen_range(0..cfg.num_location_registers) as u32
}

/// A label operand's hash: half the time reuses one of the organism's own
/// existing labels (so the generated instruction can plausibly address
/// somewhere in its own genome), otherwise a fresh hash anywhere in the
/// configured hash space.
fn random_label_operand_hash(existing: &[i32], hash_bits: u32, rng: &mut impl Rng) -> i32 {
    if !existing.is_empty() && rng.gen_bool(0.5) {
        *pick_uniform(existing, rng).unwrap()
    } else {
        rng.gen_range(0..(1i64 << hash_bits)) as i32
    }
}

/// Builds the opcode molecule followed by one molecule per non-STACK
/// operand `def` declares, each drawn from a distribution fitting its kind.
#[allow(clippy::too_many_arguments)]
fn build_instruction_chain(
    def: &InstructionDef,
    registers: &RegisterConfig,
    existing_labels: &[i32],
    hash_bits: u32,
    dims: usize,
    data_min: i32,
    data_max: i32,
    rng: &mut impl Rng,
) -> Vec<Molecule> {
    let mut chain = vec![Molecule::new(MoleculeType::Code, def.id, 0)];
    for operand in &def.operands {
        match operand {
            OperandSource::Stack => {}
            OperandSource::Register => {
                chain.push(Molecule::new(MoleculeType::Register, random_scalar_register_raw_id(registers, rng) as i32, 0));
            }
            OperandSource::LocationRegister => {
                chain.push(Molecule::new(MoleculeType::Register, random_location_register_raw_id(registers, rng) as i32, 0));
            }
            OperandSource::Immediate => {
                let value = if data_max > data_min { rng.gen_range(data_min..=data_max) } else { data_min };
                chain.push(Molecule::new(MoleculeType::Data, value, 0));
            }
            OperandSource::Label => {
                chain.push(Molecule::new(MoleculeType::Label, random_label_operand_hash(existing_labels, hash_bits, rng), 0));
            }
            OperandSource::Vector => {
                let axis = if dims > 0 { rng.gen_range(0..dims) } else { 0 };
                let positive = rng.gen_bool(0.5);
                for d in 0..dims {
                    let component = if d == axis { if positive { 1 } else { -1 } } else { 0 };
                    chain.push(Molecule::new(MoleculeType::Data, component, 0));
                }
            }
        }
    }
    chain
}
