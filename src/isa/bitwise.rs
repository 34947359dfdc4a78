//! Bitwise family: AND/OR/XOR/NAND/NOR/XNOR/ADN/ORN/ROT (RR/RI/SS variants),
//! SHL/SHR (requiring a DATA-typed shift-amount operand), the unary NOT and
//! population count (R/S variants), and BSN (nth set bit from either end).
//! Shift and rotate amounts are taken modulo `VALUE_BITS` rather than
//! failing on out-of-range amounts, an explicit simplification over a
//! hardware-style undefined-behavior shift.

use crate::error::InstructionFailure;
use crate::molecule::{Molecule, MoleculeType};
use crate::organism::StackValue;

use super::{ExecContext, Family, InstructionRegistryBuilder, OperandSource};

fn bit_and(a: i64, b: i64, _bits: u32) -> i64 {
    a & b
}
fn bit_or(a: i64, b: i64, _bits: u32) -> i64 {
    a | b
}
fn bit_xor(a: i64, b: i64, _bits: u32) -> i64 {
    a ^ b
}
fn bit_nand(a: i64, b: i64, bits: u32) -> i64 {
    let mask = (1i64 << bits.max(1)) - 1;
    !(a & b) & mask
}
fn bit_nor(a: i64, b: i64, bits: u32) -> i64 {
    let mask = (1i64 << bits.max(1)) - 1;
    !(a | b) & mask
}
fn bit_xnor(a: i64, b: i64, bits: u32) -> i64 {
    let mask = (1i64 << bits.max(1)) - 1;
    !(a ^ b) & mask
}
fn bit_adn(a: i64, b: i64, bits: u32) -> i64 {
    let mask = (1i64 << bits.max(1)) - 1;
    a & (!b & mask)
}
fn bit_orn(a: i64, b: i64, bits: u32) -> i64 {
    let mask = (1i64 << bits.max(1)) - 1;
    a | (!b & mask)
}
fn shl(a: i64, amount: i64, bits: u32) -> i64 {
    let amt = (amount as u32) % bits.max(1);
    a << amt
}
fn shr(a: i64, amount: i64, bits: u32) -> i64 {
    let amt = (amount as u32) % bits.max(1);
    a >> amt
}
fn rotl(a: i64, amount: i64, bits: u32) -> i64 {
    let bits = bits.max(1);
    let amt = (amount as u32) % bits;
    let mask = (1i64 << bits) - 1;
    let v = a & mask;
    (((v << amt) | (v >> (bits - amt).max(0).min(bits))) & mask) | (a & !mask)
}

fn combine_binary(
    ctx: &ExecContext,
    a: Molecule,
    b: Molecule,
    op: fn(i64, i64, u32) -> i64,
) -> Result<Molecule, InstructionFailure> {
    if ctx.config.molecule.strict_typing && a.ty != b.ty {
        return Err(InstructionFailure::TypeMismatchStrict);
    }
    let bits = ctx.config.molecule.value_bits;
    let result = op(a.value as i64, b.value as i64, bits);
    Ok(Molecule::new(a.ty, result as i32, a.marker))
}

fn exec_rr(ctx: &mut ExecContext, op: fn(i64, i64, u32) -> i64) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let a = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let b = ctx.operand(1).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let result = combine_binary(ctx, a, b, op)?;
    ctx.organism.registers.write_scalar(&ctx.config.registers, dest_raw, result)
}

fn exec_ri(ctx: &mut ExecContext, op: fn(i64, i64, u32) -> i64) -> Result<(), InstructionFailure> {
    exec_rr(ctx, op)
}

fn exec_ss(ctx: &mut ExecContext, op: fn(i64, i64, u32) -> i64) -> Result<(), InstructionFailure> {
    let b = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let a = ctx.operand(1).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let result = combine_binary(ctx, a, b, op)?;
    ctx.organism.data_stack.push(StackValue::Scalar(result))
}

/// SHL/SHR require the shift-amount operand to carry type DATA, independent
/// of the strict-typing flag (it governs a applying to b's type, not the
/// shift amount's own type).
fn combine_shift(
    ctx: &ExecContext,
    a: Molecule,
    amount: Molecule,
    op: fn(i64, i64, u32) -> i64,
) -> Result<Molecule, InstructionFailure> {
    if amount.ty != MoleculeType::Data {
        return Err(InstructionFailure::InvalidOperandType);
    }
    let bits = ctx.config.molecule.value_bits;
    let result = op(a.value as i64, amount.value as i64, bits);
    Ok(Molecule::new(a.ty, result as i32, a.marker))
}

fn exec_shift_rr(ctx: &mut ExecContext, op: fn(i64, i64, u32) -> i64) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let a = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let amount = ctx.operand(1).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let result = combine_shift(ctx, a, amount, op)?;
    ctx.organism.registers.write_scalar(&ctx.config.registers, dest_raw, result)
}

fn exec_shift_ri(ctx: &mut ExecContext, op: fn(i64, i64, u32) -> i64) -> Result<(), InstructionFailure> {
    exec_shift_rr(ctx, op)
}

fn exec_shift_ss(ctx: &mut ExecContext, op: fn(i64, i64, u32) -> i64) -> Result<(), InstructionFailure> {
    let amount = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let a = ctx.operand(1).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let result = combine_shift(ctx, a, amount, op)?;
    ctx.organism.data_stack.push(StackValue::Scalar(result))
}

/// Unary ops read a single scalar and write the transformed result back.
fn exec_unary_r(ctx: &mut ExecContext, op: fn(i64, u32) -> i64) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let a = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let bits = ctx.config.molecule.value_bits;
    let result = Molecule::new(a.ty, op(a.value as i64, bits) as i32, a.marker);
    ctx.organism.registers.write_scalar(&ctx.config.registers, dest_raw, result)
}

fn exec_unary_s(ctx: &mut ExecContext, op: fn(i64, u32) -> i64) -> Result<(), InstructionFailure> {
    let a = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let bits = ctx.config.molecule.value_bits;
    let result = Molecule::new(a.ty, op(a.value as i64, bits) as i32, a.marker);
    ctx.organism.data_stack.push(StackValue::Scalar(result))
}

fn popcount(a: i64, bits: u32) -> i64 {
    let mask = (1i64 << bits.max(1)) - 1;
    (a & mask).count_ones() as i64
}

/// BSN: returns a one-hot mask of the `n`-th set bit of `a` within the low
/// `VALUE_BITS`. `n > 0` counts from the LSB (1-indexed), `n < 0` counts
/// from the MSB; `n == 0` is invalid. Fails (returns 0, caller maps to
/// failure) when `n` is out of range or `a` has fewer than `|n|` set bits.
fn bsn(a: i64, n: i64, bits: u32) -> Option<i64> {
    if n == 0 {
        return None;
    }
    let bits = bits.max(1);
    let mask = (1i64 << bits) - 1;
    let v = a & mask;
    let ordinal = if n > 0 {
        n as u32
    } else {
        (-n) as u32
    };
    let mut seen = 0u32;
    for bit in 0..bits {
        let pos = if n > 0 { bit } else { bits - 1 - bit };
        if (v >> pos) & 1 == 1 {
            seen += 1;
            if seen == ordinal {
                return Some(1i64 << pos);
            }
        }
    }
    None
}

fn exec_bsn_rr(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let a = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let n = ctx.operand(1).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let bits = ctx.config.molecule.value_bits;
    let result = bsn(a.value as i64, n.value as i64, bits).ok_or(InstructionFailure::InvalidOperandType)?;
    let out = Molecule::new(a.ty, result as i32, a.marker);
    ctx.organism.registers.write_scalar(&ctx.config.registers, dest_raw, out)
}

fn exec_bsn_ri(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    exec_bsn_rr(ctx)
}

fn exec_bsn_ss(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let n = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let a = ctx.operand(1).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let bits = ctx.config.molecule.value_bits;
    let result = bsn(a.value as i64, n.value as i64, bits).ok_or(InstructionFailure::InvalidOperandType)?;
    let out = Molecule::new(a.ty, result as i32, a.marker);
    ctx.organism.data_stack.push(StackValue::Scalar(out))
}

/// Shift/rotate families read the amount from operand(1) and the value from
/// operand(0), matching AND/OR/XOR's operand order.
macro_rules! bitwise_family {
    ($op:expr, $rr:ident, $ri:ident, $ss:ident) => {
        fn $rr(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
            exec_rr(ctx, $op)
        }
        fn $ri(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
            exec_ri(ctx, $op)
        }
        fn $ss(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
            exec_ss(ctx, $op)
        }
    };
}

macro_rules! shift_family {
    ($op:expr, $rr:ident, $ri:ident, $ss:ident) => {
        fn $rr(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
            exec_shift_rr(ctx, $op)
        }
        fn $ri(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
            exec_shift_ri(ctx, $op)
        }
        fn $ss(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
            exec_shift_ss(ctx, $op)
        }
    };
}

macro_rules! unary_family {
    ($op:expr, $r:ident, $s:ident) => {
        fn $r(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
            exec_unary_r(ctx, $op)
        }
        fn $s(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
            exec_unary_s(ctx, $op)
        }
    };
}

bitwise_family!(bit_and, and_rr, and_ri, and_ss);
bitwise_family!(bit_or, or_rr, or_ri, or_ss);
bitwise_family!(bit_xor, xor_rr, xor_ri, xor_ss);
bitwise_family!(bit_nand, nad_rr, nad_ri, nad_ss);
bitwise_family!(bit_nor, nor_rr, nor_ri, nor_ss);
bitwise_family!(bit_xnor, equ_rr, equ_ri, equ_ss);
bitwise_family!(bit_adn, adn_rr, adn_ri, adn_ss);
bitwise_family!(bit_orn, orn_rr, orn_ri, orn_ss);
shift_family!(shl, shl_rr, shl_ri, shl_ss);
shift_family!(shr, shr_rr, shr_ri, shr_ss);
bitwise_family!(rotl, rot_rr, rot_ri, rot_ss);
unary_family!(popcount, pcn_r, pcn_s);

fn exec_not_r(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let dest_raw = ctx.operand(0).raw_id as u32;
    let a = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let bits = ctx.config.molecule.value_bits;
    let mask = (1i64 << bits) - 1;
    let result = Molecule::new(a.ty, ((!(a.value as i64)) & mask) as i32, a.marker);
    ctx.organism.registers.write_scalar(&ctx.config.registers, dest_raw, result)
}

fn exec_not_s(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    let a = ctx.operand(0).scalar().ok_or(InstructionFailure::InvalidOperandType)?;
    let bits = ctx.config.molecule.value_bits;
    let mask = (1i64 << bits) - 1;
    let result = Molecule::new(a.ty, ((!(a.value as i64)) & mask) as i32, a.marker);
    ctx.organism.data_stack.push(StackValue::Scalar(result))
}

fn push_binary(
    b: &mut InstructionRegistryBuilder,
    mnemonic: &'static str,
    rr: super::ExecFn,
    ri: super::ExecFn,
    ss: super::ExecFn,
) {
    b.push(
        mnemonic,
        Family::Bitwise,
        "RR",
        vec![OperandSource::Register, OperandSource::Register],
        false,
        rr,
    );
    b.push(
        mnemonic,
        Family::Bitwise,
        "RI",
        vec![OperandSource::Register, OperandSource::Immediate],
        false,
        ri,
    );
    b.push(
        mnemonic,
        Family::Bitwise,
        "SS",
        vec![OperandSource::Stack, OperandSource::Stack],
        false,
        ss,
    );
}

fn push_unary(b: &mut InstructionRegistryBuilder, mnemonic: &'static str, r: super::ExecFn, s: super::ExecFn) {
    b.push(mnemonic, Family::Bitwise, "R", vec![OperandSource::Register], false, r);
    b.push(mnemonic, Family::Bitwise, "S", vec![OperandSource::Stack], false, s);
}

pub fn register(b: &mut InstructionRegistryBuilder) {
    push_binary(b, "AND", and_rr, and_ri, and_ss);
    push_binary(b, "OR", or_rr, or_ri, or_ss);
    push_binary(b, "XOR", xor_rr, xor_ri, xor_ss);
    push_binary(b, "NAD", nad_rr, nad_ri, nad_ss);
    push_binary(b, "NOR", nor_rr, nor_ri, nor_ss);
    push_binary(b, "EQU", equ_rr, equ_ri, equ_ss);
    push_binary(b, "ADN", adn_rr, adn_ri, adn_ss);
    push_binary(b, "ORN", orn_rr, orn_ri, orn_ss);
    push_binary(b, "SHL", shl_rr, shl_ri, shl_ss);
    push_binary(b, "SHR", shr_rr, shr_ri, shr_ss);
    push_binary(b, "ROT", rot_rr, rot_ri, rot_ss);
    push_binary(b, "BSN", exec_bsn_rr, exec_bsn_ri, exec_bsn_ss);
    b.push("NOT", Family::Bitwise, "R", vec![OperandSource::Register], false, exec_not_r);
    b.push("NOT", Family::Bitwise, "S", vec![OperandSource::Stack], false, exec_not_s);
    push_unary(b, "PCN", pcn_r, pcn_s);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_amount_wraps_modulo_value_bits() {
        // value_bits = 4 for this check: shifting by 4 is a no-op (4 % 4 == 0).
        assert_eq!(shl(1, 4, 4), 1);
        assert_eq!(shl(1, 1, 4), 2);
    }

    #[test]
    fn rotl_preserves_bit_population() {
        let bits = 8u32;
        let v = 0b0000_1011i64;
        let rotated = rotl(v, 2, bits);
        assert_eq!((rotated & 0xff).count_ones(), v.count_ones());
    }

    #[test]
    fn nand_nor_xnor_are_the_negated_forms() {
        assert_eq!(bit_nand(0b110, 0b011, 4), !(0b110 & 0b011) & 0xf);
        assert_eq!(bit_nor(0b110, 0b011, 4), !(0b110 | 0b011) & 0xf);
        assert_eq!(bit_xnor(0b110, 0b011, 4), !(0b110 ^ 0b011) & 0xf);
    }

    #[test]
    fn popcount_counts_only_low_value_bits() {
        assert_eq!(popcount(0b1011, 4), 3);
        assert_eq!(popcount(-1, 4), 4);
    }

    #[test]
    fn bsn_counts_from_lsb_for_positive_n_and_msb_for_negative_n() {
        let v = 0b0000_1010i64;
        assert_eq!(bsn(v, 1, 8), Some(0b0010));
        assert_eq!(bsn(v, 2, 8), Some(0b1000));
        assert_eq!(bsn(v, -1, 8), Some(0b1000));
        assert_eq!(bsn(v, 3, 8), None);
        assert_eq!(bsn(v, 0, 8), None);
    }
}
