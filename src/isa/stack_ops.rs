//! Stack family (shares the Data family id): DUP, SWAP, DROP, ROT, pure
//! data-stack manipulation with no encoded operands.

use crate::error::InstructionFailure;

use super::{ExecContext, Family, InstructionRegistryBuilder};

fn exec_dup(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    ctx.organism.data_stack.dup()
}

fn exec_swap(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    ctx.organism.data_stack.swap()
}

fn exec_drop(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    ctx.organism.data_stack.drop_top()
}

fn exec_rot(ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    ctx.organism.data_stack.rot()
}

pub fn register(b: &mut InstructionRegistryBuilder) {
    b.push("DUP", Family::Data, "-", vec![], false, exec_dup);
    b.push("SWAP", Family::Data, "-", vec![], false, exec_swap);
    b.push("DROP", Family::Data, "-", vec![], false, exec_drop);
    b.push("ROT", Family::Data, "-", vec![], false, exec_rot);
}
