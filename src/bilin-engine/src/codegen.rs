// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Compiles symbolic bilinear dynamics into numeric evaluators.
//!
//! Instead of generating source text, each family of expressions (the
//! lifted state, or the nonzero entries of one matrix) is compiled into a
//! [`Program`]: a flat list of stack-machine opcodes over a literal pool.
//! The sparsity pattern of every matrix is fixed when the program is
//! built, and updating a matrix only overwrites its `nzval` array.

use std::collections::HashMap;

use tracing::debug;

use crate::bilinearize::SymbolicBilinearDynamics;
use crate::bytecode::{ByteCodeBuilder, InputOffset, Op2, Opcode, OutputSlot};
use crate::common::Result;
use crate::expr::Expr;
use crate::gen_err;
use crate::sparse::SparseMatrix;
use crate::symbol::Symbol;
use crate::vm::Program;

#[cfg_attr(feature = "debug-derive", derive(Debug))]
#[derive(Clone, Default)]
pub struct CodegenOptions {
    /// Values baked into generated programs for symbols that aren't
    /// inputs, such as model constants or a fixed control value.
    pub bindings: HashMap<Symbol, f64>,
}

struct Compiler<'a> {
    inputs: HashMap<Symbol, InputOffset>,
    bindings: &'a HashMap<Symbol, f64>,
    builder: ByteCodeBuilder,
}

impl Compiler<'_> {
    fn constant(&mut self, value: f64) {
        let id = self.builder.intern_literal(value);
        self.builder.push_opcode(Opcode::LoadConstant { id });
    }

    fn op2(&mut self, op: Op2) {
        self.builder.push_opcode(Opcode::Op2 { op });
    }

    fn walk(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Const(n) => self.constant(n.0),
            Expr::Var(sym) => {
                if let Some(off) = self.inputs.get(sym) {
                    self.builder.push_opcode(Opcode::LoadInput { off: *off });
                } else if let Some(value) = self.bindings.get(sym) {
                    self.constant(*value);
                } else {
                    return gen_err!(
                        UnknownSymbol,
                        format!("symbol #{} is neither an input nor bound", sym.id())
                    );
                }
            }
            Expr::Add(terms) => {
                self.walk(&terms[0])?;
                for term in terms[1..].iter() {
                    let (coeff, body) = term.clone().split_coefficient();
                    if coeff < 0.0 {
                        self.walk(&Expr::mul(vec![Expr::constant(-coeff), body]))?;
                        self.op2(Op2::Sub);
                    } else {
                        self.walk(term)?;
                        self.op2(Op2::Add);
                    }
                }
            }
            Expr::Mul(factors) => {
                let (negate, factors) = match factors[0].as_const() {
                    Some(n) if n == -1.0 => (true, &factors[1..]),
                    _ => (false, &factors[..]),
                };
                self.walk(&factors[0])?;
                for factor in factors[1..].iter() {
                    self.walk(factor)?;
                    self.op2(Op2::Mul);
                }
                if negate {
                    self.builder.push_opcode(Opcode::Neg {});
                }
            }
            Expr::Pow(base, exp) => {
                self.walk(base)?;
                match exp.as_integer() {
                    Some(n) if (i32::MIN as i64..=i32::MAX as i64).contains(&n) => {
                        self.builder.push_opcode(Opcode::Powi { exp: n as i32 });
                    }
                    _ => {
                        self.walk(exp)?;
                        self.op2(Op2::Pow);
                    }
                }
            }
            Expr::Div(num, den) => {
                self.walk(num)?;
                self.walk(den)?;
                self.op2(Op2::Div);
            }
            Expr::App(func, args) => {
                if args.len() != func.arity() {
                    return gen_err!(
                        BadBuiltinArgs,
                        format!("{}() takes {} argument(s)", func.name(), func.arity())
                    );
                }
                for arg in args {
                    self.walk(arg)?;
                }
                self.builder.push_opcode(Opcode::Apply { func: *func });
            }
        }
        Ok(())
    }
}

impl Program {
    /// Compiles `exprs` into a program writing expression `i` to output
    /// slot `i`.  `inputs[j]` is read from input `j`; any other symbol
    /// must have a value in `bindings`.
    pub fn compile(
        exprs: &[Expr],
        inputs: &[Symbol],
        bindings: &HashMap<Symbol, f64>,
    ) -> Result<Program> {
        let mut compiler = Compiler {
            inputs: inputs
                .iter()
                .enumerate()
                .map(|(i, sym)| (*sym, i as InputOffset))
                .collect(),
            bindings,
            builder: ByteCodeBuilder::default(),
        };
        for (slot, expr) in exprs.iter().enumerate() {
            compiler.walk(expr)?;
            compiler.builder.push_opcode(Opcode::Store {
                slot: slot as OutputSlot,
            });
        }
        Ok(Program::new(
            compiler.builder.finish(),
            inputs.len(),
            exprs.len(),
        ))
    }
}

/// Maps an original state vector to the lifted state.
#[cfg_attr(feature = "debug-derive", derive(Debug))]
#[derive(Clone)]
pub struct StateExpander {
    program: Program,
}

impl StateExpander {
    pub fn new(dynamics: &SymbolicBilinearDynamics, options: &CodegenOptions) -> Result<Self> {
        let program = Program::compile(&dynamics.lifted, &dynamics.states, &options.bindings)?;
        Ok(StateExpander { program })
    }

    pub fn n0(&self) -> usize {
        self.program.n_inputs()
    }

    pub fn n(&self) -> usize {
        self.program.n_outputs()
    }

    /// Writes the lifted state for `x` into `y`.
    pub fn expand(&self, x: &[f64], y: &mut [f64]) -> Result<()> {
        self.program.run(x, y)
    }
}

/// A compiled matrix: the derivation-time pattern plus a program
/// producing its nonzero values.
#[cfg_attr(feature = "debug-derive", derive(Debug))]
#[derive(Clone)]
struct MatrixProgram {
    pattern: SparseMatrix<()>,
    program: Program,
}

impl MatrixProgram {
    fn new(m: &SparseMatrix<Expr>, x0: &[Symbol], options: &CodegenOptions) -> Result<Self> {
        Ok(MatrixProgram {
            pattern: m.map(|_| ()),
            program: Program::compile(&m.nzval, x0, &options.bindings)?,
        })
    }

    fn zeros(&self) -> SparseMatrix<f64> {
        self.pattern.zeros_like()
    }

    fn update(&self, x0: &[f64], target: &mut SparseMatrix<f64>) -> Result<()> {
        if !target.pattern_eq(&self.pattern) {
            return gen_err!(
                PatternMismatch,
                "matrix was not allocated with this sparsity pattern".to_owned()
            );
        }
        self.program.run(x0, &mut target.nzval)
    }
}

/// Numeric A, B, C and D with the sparsity patterns of a derivation.
#[cfg_attr(feature = "debug-derive", derive(Debug))]
#[derive(Clone, PartialEq)]
pub struct BilinearMatrices {
    pub a: SparseMatrix<f64>,
    pub b: SparseMatrix<f64>,
    pub c: Vec<SparseMatrix<f64>>,
    pub d: SparseMatrix<f64>,
}

impl BilinearMatrices {
    /// Allocates zero-valued matrices with the derivation's sparsity
    /// patterns, ready to be filled by a [`MatrixUpdater`].
    pub fn zeros(dynamics: &SymbolicBilinearDynamics) -> Self {
        BilinearMatrices {
            a: dynamics.a.zeros_like(),
            b: dynamics.b.zeros_like(),
            c: dynamics.c.iter().map(|c| c.zeros_like()).collect(),
            d: dynamics.d.zeros_like(),
        }
    }
}

/// Re-evaluates the nonzero entries of A, B, C and D at a new
/// linearization point.
#[cfg_attr(feature = "debug-derive", derive(Debug))]
#[derive(Clone)]
pub struct MatrixUpdater {
    a: MatrixProgram,
    b: MatrixProgram,
    c: Vec<MatrixProgram>,
    d: MatrixProgram,
}

impl MatrixUpdater {
    pub fn new(dynamics: &SymbolicBilinearDynamics, options: &CodegenOptions) -> Result<Self> {
        let x0 = &dynamics.x0;
        let mut c = Vec::with_capacity(dynamics.c.len());
        for ck in dynamics.c.iter() {
            c.push(MatrixProgram::new(ck, x0, options)?);
        }
        let updater = MatrixUpdater {
            a: MatrixProgram::new(&dynamics.a, x0, options)?,
            b: MatrixProgram::new(&dynamics.b, x0, options)?,
            c,
            d: MatrixProgram::new(&dynamics.d, x0, options)?,
        };
        debug!(
            ops = updater.a.program.bytecode().len()
                + updater.b.program.bytecode().len()
                + updater.c.iter().map(|c| c.program.bytecode().len()).sum::<usize>()
                + updater.d.program.bytecode().len(),
            "matrix update programs compiled"
        );
        Ok(updater)
    }

    pub fn zeros(&self) -> BilinearMatrices {
        BilinearMatrices {
            a: self.a.zeros(),
            b: self.b.zeros(),
            c: self.c.iter().map(|c| c.zeros()).collect(),
            d: self.d.zeros(),
        }
    }

    pub fn update_a(&self, x0: &[f64], a: &mut SparseMatrix<f64>) -> Result<()> {
        self.a.update(x0, a)
    }

    pub fn update_b(&self, x0: &[f64], b: &mut SparseMatrix<f64>) -> Result<()> {
        self.b.update(x0, b)
    }

    pub fn update_c(&self, x0: &[f64], c: &mut [SparseMatrix<f64>]) -> Result<()> {
        if c.len() != self.c.len() {
            return gen_err!(
                DimensionMismatch,
                format!("expected {} C matrices, got {}", self.c.len(), c.len())
            );
        }
        for (program, ck) in self.c.iter().zip(c.iter_mut()) {
            program.update(x0, ck)?;
        }
        Ok(())
    }

    pub fn update_d(&self, x0: &[f64], d: &mut SparseMatrix<f64>) -> Result<()> {
        self.d.update(x0, d)
    }

    pub fn update_all(&self, x0: &[f64], matrices: &mut BilinearMatrices) -> Result<()> {
        self.update_a(x0, &mut matrices.a)?;
        self.update_b(x0, &mut matrices.b)?;
        self.update_c(x0, &mut matrices.c)?;
        self.update_d(x0, &mut matrices.d)
    }
}
