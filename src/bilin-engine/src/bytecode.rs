// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::builtins::Func;

pub type LiteralId = u32;
pub type InputOffset = u32;
pub type OutputSlot = u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Op2 {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Opcodes for the expression VM.  Every expression compiles to a
/// sequence that leaves its value on the operand stack, followed by a
/// `Store` into its output slot.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Opcode {
    Op2 { op: Op2 },
    Neg {},
    Powi { exp: i32 },
    Apply { func: Func },

    LoadConstant { id: LiteralId },
    LoadInput { off: InputOffset },

    Store { slot: OutputSlot },
}

#[derive(Clone, Debug, Default)]
pub struct ByteCode {
    pub(crate) literals: Vec<f64>,
    pub(crate) code: Vec<Opcode>,
    /// deepest the operand stack gets while running `code`
    pub(crate) max_stack: usize,
}

impl ByteCode {
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ByteCodeBuilder {
    bytecode: ByteCode,
    interned_literals: HashMap<OrderedFloat<f64>, LiteralId>,
    depth: usize,
}

impl ByteCodeBuilder {
    pub(crate) fn intern_literal(&mut self, lit: f64) -> LiteralId {
        let key: OrderedFloat<f64> = lit.into();
        if let Some(id) = self.interned_literals.get(&key) {
            return *id;
        }
        self.bytecode.literals.push(lit);
        let literal_id = (self.bytecode.literals.len() - 1) as LiteralId;
        self.interned_literals.insert(key, literal_id);
        literal_id
    }

    pub(crate) fn push_opcode(&mut self, op: Opcode) {
        match op {
            Opcode::LoadConstant { .. } | Opcode::LoadInput { .. } => {
                self.depth += 1;
                self.bytecode.max_stack = self.bytecode.max_stack.max(self.depth);
            }
            Opcode::Op2 { .. } | Opcode::Store { .. } => self.depth -= 1,
            Opcode::Neg {} | Opcode::Powi { .. } | Opcode::Apply { .. } => {}
        }
        self.bytecode.code.push(op)
    }

    pub(crate) fn finish(self) -> ByteCode {
        debug_assert_eq!(0, self.depth);
        self.bytecode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memoizing_interning() {
        let mut bytecode = ByteCodeBuilder::default();
        let a1 = bytecode.intern_literal(1.0);
        let b1 = bytecode.intern_literal(1.01);
        let b2 = bytecode.intern_literal(1.01);
        let a2 = bytecode.intern_literal(1.0);

        assert_eq!(a1, a2);
        assert_eq!(b1, b2);
        assert_ne!(a1, b1);

        let bytecode = bytecode.finish();
        assert_eq!(2, bytecode.literals.len());
    }

    #[test]
    fn test_stack_depth_tracking() {
        let mut builder = ByteCodeBuilder::default();
        let one = builder.intern_literal(1.0);
        builder.push_opcode(Opcode::LoadInput { off: 0 });
        builder.push_opcode(Opcode::LoadConstant { id: one });
        builder.push_opcode(Opcode::LoadInput { off: 1 });
        builder.push_opcode(Opcode::Op2 { op: Op2::Mul });
        builder.push_opcode(Opcode::Op2 { op: Op2::Add });
        builder.push_opcode(Opcode::Store { slot: 0 });
        let bytecode = builder.finish();
        assert_eq!(3, bytecode.max_stack);
        assert_eq!(6, bytecode.len());
    }

    #[test]
    fn test_opcode_size() {
        use std::mem::size_of;
        let size = size_of::<Opcode>();
        assert!(size <= 8, "Opcode size {} exceeds 8 bytes", size);
    }
}
