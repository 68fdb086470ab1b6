// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Symbolic bilinearization of nonlinear dynamics.
//!
//! Given `xdot = f(x, u)`, [`bilinearize`] derives sparse symbolic
//! matrices such that the lifted state `y` (monomials of `x` up to a chosen
//! order) approximately follows
//!
//! ```text
//! ydot = A y + B u + sum_k u_k C_k y + D
//! ```
//!
//! with entries depending only on a symbolic linearization point.  The
//! [`codegen`] module compiles those entries into bytecode programs that
//! refill numeric matrices at any new linearization point without
//! repeating the symbolic work.

#![forbid(unsafe_code)]

pub mod algebra;
pub mod bilinearize;
mod builtins;
mod bytecode;
pub mod codegen;
pub mod common;
mod diff;
mod expand;
pub mod expr;
pub mod lifting;
pub mod model;
mod parser;
pub mod sparse;
pub mod symbol;
pub mod taylor;
mod token;
mod vm;

#[cfg(test)]
mod algebra_proptest;

pub use self::algebra::{Differential, constant_part, degree};
pub use self::bilinearize::{
    BilinearizeOptions, Dynamics, ExprDynamics, SymbolicBilinearDynamics, bilinearize,
};
pub use self::builtins::Func;
pub use self::bytecode::ByteCode;
pub use self::codegen::{BilinearMatrices, CodegenOptions, MatrixUpdater, StateExpander};
pub use self::common::{EquationError, Error, ErrorCode, ErrorKind, Result};
pub use self::expr::Expr;
pub use self::lifting::build_state_vector;
pub use self::model::{BilinearModel, DiscreteBilinearModel};
pub use self::parser::parse_equation;
pub use self::sparse::{SparseMatrix, build_sparse_matrix, extract_coefficients};
pub use self::symbol::{Symbol, SymbolTable};
pub use self::taylor::{TaylorSeries, taylor_expand, taylor_series, truncate_order};
pub use self::vm::Program;
