// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use smallvec::SmallVec;

use crate::bytecode::{ByteCode, Op2, Opcode};
use crate::common::Result;
use crate::gen_err;

struct Stack {
    stack: SmallVec<[f64; 32]>,
}

impl Stack {
    fn with_capacity(capacity: usize) -> Self {
        Stack {
            stack: SmallVec::with_capacity(capacity),
        }
    }

    #[inline(always)]
    fn push(&mut self, value: f64) {
        self.stack.push(value)
    }

    #[inline(always)]
    fn pop(&mut self) -> f64 {
        self.stack.pop().unwrap()
    }
}

/// A compiled list of expressions.  Running it evaluates expression `i`
/// against a numeric input vector and writes the result to `out[i]`.
///
/// Programs hold no mutable state: every `run` gets its own operand
/// stack, so one program can be shared by any number of threads as long
/// as each supplies its own output buffer.
#[cfg_attr(feature = "debug-derive", derive(Debug))]
#[derive(Clone)]
pub struct Program {
    bytecode: ByteCode,
    n_inputs: usize,
    n_outputs: usize,
}

impl Program {
    pub(crate) fn new(bytecode: ByteCode, n_inputs: usize, n_outputs: usize) -> Self {
        Program {
            bytecode,
            n_inputs,
            n_outputs,
        }
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    pub fn bytecode(&self) -> &ByteCode {
        &self.bytecode
    }

    pub fn run(&self, input: &[f64], out: &mut [f64]) -> Result<()> {
        if input.len() != self.n_inputs {
            return gen_err!(
                DimensionMismatch,
                format!("expected {} inputs, got {}", self.n_inputs, input.len())
            );
        }
        if out.len() != self.n_outputs {
            return gen_err!(
                DimensionMismatch,
                format!("expected {} outputs, got {}", self.n_outputs, out.len())
            );
        }
        let mut stack = Stack::with_capacity(self.bytecode.max_stack);
        self.eval(input, out, &mut stack);
        Ok(())
    }

    fn eval(&self, input: &[f64], out: &mut [f64], stack: &mut Stack) {
        let bytecode = &self.bytecode;
        for op in bytecode.code.iter() {
            match *op {
                Opcode::Op2 { op } => {
                    let r = stack.pop();
                    let l = stack.pop();
                    let result = match op {
                        Op2::Add => l + r,
                        Op2::Sub => l - r,
                        Op2::Mul => l * r,
                        Op2::Div => l / r,
                        Op2::Pow => l.powf(r),
                    };
                    stack.push(result);
                }
                Opcode::Neg {} => {
                    let r = stack.pop();
                    stack.push(-r);
                }
                Opcode::Powi { exp } => {
                    let base = stack.pop();
                    stack.push(base.powi(exp));
                }
                Opcode::Apply { func } => {
                    let a = stack.pop();
                    stack.push(func.eval(&[a]));
                }
                Opcode::LoadConstant { id } => {
                    stack.push(bytecode.literals[id as usize]);
                }
                Opcode::LoadInput { off } => {
                    stack.push(input[off as usize]);
                }
                Opcode::Store { slot } => {
                    out[slot as usize] = stack.pop();
                }
            }
        }
    }
}
