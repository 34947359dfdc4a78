//! NOP family: one opcode, zero operands, zero cost, skippable.

use crate::error::InstructionFailure;

use super::{ExecContext, Family, InstructionRegistryBuilder, OperandSource};

fn exec_nop(_ctx: &mut ExecContext) -> Result<(), InstructionFailure> {
    Ok(())
}

pub fn register(b: &mut InstructionRegistryBuilder) {
    b.push("NOP", Family::Nop, "-", vec![], true, exec_nop);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::InstructionRegistry;

    #[test]
    fn nop_occupies_one_slot_and_is_marked_nop() {
        let mut b = InstructionRegistryBuilder::new();
        register(&mut b);
        let def = &b.defs[0];
        assert_eq!(def.grid_length(3), 1);
        assert!(def.is_nop());
    }

    #[test]
    fn global_registry_contains_nop() {
        assert!(InstructionRegistry::build().lookup(1).is_some());
    }
}
