//! Plain, serde-serializable configuration structs for every tunable knob
//! this runtime exposes. This module defines the contract only: reading a
//! config from a file, environment, or CLI surface is a host concern and
//! out of scope for this crate.

use serde::{Deserialize, Serialize};

/// Grid topology. `Torus` wraps every axis; `Bounded` fails `OutOfBounds`
/// for any coordinate outside `[0, shape[i])`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    Torus,
    Bounded,
}

impl Default for Topology {
    fn default() -> Self {
        Topology::Torus
    }
}

/// Molecule bit layout and ISA-wide behavior toggles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoleculeConfig {
    pub value_bits: u32,
    pub marker_bits: u32,
    pub strict_typing: bool,
}

impl Default for MoleculeConfig {
    fn default() -> Self {
        MoleculeConfig {
            value_bits: 20,
            marker_bits: 4,
            strict_typing: false,
        }
    }
}

/// Register-bank base offsets and counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterConfig {
    pub num_data_registers: usize,
    pub num_pointer_registers: usize,
    pub num_formal_param_registers: usize,
    pub num_location_registers: usize,
    pub num_data_pointers: usize,
    pub pr_base: u32,
    pub fpr_base: u32,
    pub lr_base: u32,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        RegisterConfig {
            num_data_registers: 8,
            num_pointer_registers: 4,
            num_formal_param_registers: 4,
            num_location_registers: 4,
            num_data_pointers: 2,
            pr_base: 100,
            fpr_base: 200,
            lr_base: 300,
        }
    }
}

/// Organism resource limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_energy: i64,
    pub max_entropy: i64,
    pub error_penalty_cost: i64,
    pub data_stack_max_depth: usize,
    pub max_skips: u32,
    pub lineage_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_energy: 100_000,
            max_entropy: 100_000,
            error_penalty_cost: 50,
            data_stack_max_depth: 256,
            max_skips: 4096,
            lineage_depth: 64,
        }
    }
}

/// Fuzzy label-resolution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelConfig {
    pub hash_bits: u32,
    pub tolerance: u32,
}

impl Default for LabelConfig {
    fn default() -> Self {
        LabelConfig {
            hash_bits: 19,
            tolerance: 2,
        }
    }
}

/// Birth-handler pipeline probabilities and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthConfig {
    pub duplication_rate: f64,
    pub min_nop_size: usize,
    pub deletion_rate: f64,
    pub deletion_count_exponent: f64,
    pub insertion_rate: f64,
    pub insertion_bitflips: u32,
    /// Argument range for a generated Immediate/DATA operand.
    pub insertion_data_min: i32,
    pub insertion_data_max: i32,
    /// Weight of a "label" insertion entry against an "instruction" entry;
    /// the instruction entry takes the remainder, `1.0 - insertion_label_weight`.
    pub insertion_label_weight: f64,
    pub label_rewrite_enabled: bool,
}

impl Default for BirthConfig {
    fn default() -> Self {
        BirthConfig {
            duplication_rate: 0.05,
            min_nop_size: 4,
            deletion_rate: 0.02,
            deletion_count_exponent: 2.0,
            insertion_rate: 0.02,
            insertion_bitflips: 2,
            insertion_data_min: -100,
            insertion_data_max: 100,
            insertion_label_weight: 0.2,
            label_rewrite_enabled: true,
        }
    }
}

/// Worker-pool sizing for the tick scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelismConfig {
    pub worker_count: usize,
}

impl Default for ParallelismConfig {
    fn default() -> Self {
        ParallelismConfig {
            worker_count: (num_cpus::get()).max(2),
        }
    }
}

/// Top-level configuration aggregate. Construct with `Config::default()` and
/// override fields as needed; there is deliberately no `Config::load_*`
/// method here (configuration loading is an out-of-scope host concern).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub shape: Vec<usize>,
    pub topology: Topology,
    pub molecule: MoleculeConfig,
    pub registers: RegisterConfig,
    pub limits: LimitsConfig,
    pub labels: LabelConfig,
    pub birth: BirthConfig,
    pub parallelism: ParallelismConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            shape: vec![1000, 1000],
            topology: Topology::default(),
            molecule: MoleculeConfig::default(),
            registers: RegisterConfig::default(),
            limits: LimitsConfig::default(),
            labels: LabelConfig::default(),
            birth: BirthConfig::default(),
            parallelism: ParallelismConfig::default(),
        }
    }
}
