//! Register-bank resolution and storage.
//!
//! Bank ids are encoded directly in the operand's raw register id: DR base
//! 0, PR base `PR_BASE`, FPR base `FPR_BASE`, LR base `LR_BASE`. Resolution
//! is `index = raw_id - base`, picking the highest base that the raw id is
//! still above (banks never overlap when bases are configured sensibly).

use serde::{Deserialize, Serialize};

use crate::config::RegisterConfig;
use crate::coord::Coord;
use crate::error::InstructionFailure;
use crate::molecule::Molecule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterBank {
    Dr,
    Pr,
    Fpr,
    Lr,
}

/// Resolves a raw register id (as encoded in an instruction's REGISTER
/// operand) to a bank and a zero-based index within it.
pub fn resolve(cfg: &RegisterConfig, raw_id: u32) -> Result<(RegisterBank, usize), InstructionFailure> {
    if raw_id >= cfg.lr_base {
        return index_in(cfg.lr_base, cfg.num_location_registers, raw_id, RegisterBank::Lr);
    }
    if raw_id >= cfg.fpr_base {
        return index_in(cfg.fpr_base, cfg.num_formal_param_registers, raw_id, RegisterBank::Fpr);
    }
    if raw_id >= cfg.pr_base {
        return index_in(cfg.pr_base, cfg.num_pointer_registers, raw_id, RegisterBank::Pr);
    }
    index_in(0, cfg.num_data_registers, raw_id, RegisterBank::Dr)
}

fn index_in(
    base: u32,
    count: usize,
    raw_id: u32,
    bank: RegisterBank,
) -> Result<(RegisterBank, usize), InstructionFailure> {
    let idx = (raw_id - base) as usize;
    if idx >= count {
        return Err(if bank == RegisterBank::Lr {
            InstructionFailure::InvalidLR
        } else {
            InstructionFailure::InvalidOperandType
        });
    }
    Ok((bank, idx))
}

/// Scalar register banks (DR/PR/FPR) plus the coordinate-valued LR bank and
/// the data-pointer bank (addressed separately via `active_dp`, not through
/// `resolve`, since DPs are not register-operand-addressable in the ISA).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterFile {
    pub dr: Vec<Molecule>,
    pub pr: Vec<Molecule>,
    pub fpr: Vec<Molecule>,
    pub lr: Vec<Coord>,
    pub dp: Vec<Coord>,
    pub active_dp: usize,
}

impl RegisterFile {
    pub fn new(cfg: &RegisterConfig, dims: usize) -> Self {
        RegisterFile {
            dr: vec![Molecule::empty(); cfg.num_data_registers],
            pr: vec![Molecule::empty(); cfg.num_pointer_registers],
            fpr: vec![Molecule::empty(); cfg.num_formal_param_registers],
            lr: vec![Coord::zeros(dims); cfg.num_location_registers],
            dp: vec![Coord::zeros(dims); cfg.num_data_pointers],
            active_dp: 0,
        }
    }

    pub fn active_dp(&self) -> &Coord {
        &self.dp[self.active_dp]
    }

    pub fn active_dp_mut(&mut self) -> &mut Coord {
        &mut self.dp[self.active_dp]
    }

    pub fn read_scalar(
        &self,
        cfg: &RegisterConfig,
        raw_id: u32,
    ) -> Result<Molecule, InstructionFailure> {
        match resolve(cfg, raw_id)? {
            (RegisterBank::Dr, i) => Ok(self.dr[i]),
            (RegisterBank::Pr, i) => Ok(self.pr[i]),
            (RegisterBank::Fpr, i) => Ok(self.fpr[i]),
            (RegisterBank::Lr, _) => Err(InstructionFailure::InvalidOperandType),
        }
    }

    pub fn write_scalar(
        &mut self,
        cfg: &RegisterConfig,
        raw_id: u32,
        value: Molecule,
    ) -> Result<(), InstructionFailure> {
        match resolve(cfg, raw_id)? {
            (RegisterBank::Dr, i) => self.dr[i] = value,
            (RegisterBank::Pr, i) => self.pr[i] = value,
            (RegisterBank::Fpr, i) => self.fpr[i] = value,
            (RegisterBank::Lr, _) => return Err(InstructionFailure::InvalidOperandType),
        }
        Ok(())
    }

    pub fn read_location(
        &self,
        cfg: &RegisterConfig,
        raw_id: u32,
    ) -> Result<&Coord, InstructionFailure> {
        match resolve(cfg, raw_id)? {
            (RegisterBank::Lr, i) => Ok(&self.lr[i]),
            _ => Err(InstructionFailure::InvalidLR),
        }
    }

    pub fn write_location(
        &mut self,
        cfg: &RegisterConfig,
        raw_id: u32,
        value: Coord,
    ) -> Result<(), InstructionFailure> {
        match resolve(cfg, raw_id)? {
            (RegisterBank::Lr, i) => {
                self.lr[i] = value;
                Ok(())
            }
            _ => Err(InstructionFailure::InvalidLR),
        }
    }
}
