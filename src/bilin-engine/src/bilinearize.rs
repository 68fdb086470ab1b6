// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Symbolic bilinearization of `xdot = f(x, u)`.
//!
//! The dynamics are Taylor-expanded about a symbolic linearization point
//! `x0`, the state is lifted into a basis of monomials `y`, and the lifted
//! derivative is split into
//!
//! ```text
//! ydot ~= A y + B u + sum_k u_k C_k y + D
//! ```
//!
//! where every entry of `A`, `B`, `C_k` and `D` is an expression in `x0`
//! and declared constants only.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, instrument};

use crate::algebra::degree;
use crate::common::Result;
use crate::expr::Expr;
use crate::lifting::build_state_vector;
use crate::sparse::{SparseMatrix, build_sparse_matrix, extract_coefficients};
use crate::sym_err;
use crate::symbol::{Symbol, SymbolTable};
use crate::taylor::{taylor_expand, truncate_order};

/// Something that produces the symbolic state derivative for given state
/// and control expressions.
pub trait Dynamics {
    fn eval(&self, x: &[Expr], u: &[Expr]) -> Vec<Expr>;
}

impl<F> Dynamics for F
where
    F: Fn(&[Expr], &[Expr]) -> Vec<Expr>,
{
    fn eval(&self, x: &[Expr], u: &[Expr]) -> Vec<Expr> {
        self(x, u)
    }
}

/// Dynamics given as one expression per state, written in terms of the
/// state and control symbols.
#[cfg_attr(feature = "debug-derive", derive(Debug))]
#[derive(Clone)]
pub struct ExprDynamics {
    states: Vec<Symbol>,
    controls: Vec<Symbol>,
    equations: Vec<Expr>,
}

impl ExprDynamics {
    pub fn new(states: &[Symbol], controls: &[Symbol], equations: Vec<Expr>) -> Self {
        ExprDynamics {
            states: states.to_vec(),
            controls: controls.to_vec(),
            equations,
        }
    }
}

impl Dynamics for ExprDynamics {
    fn eval(&self, x: &[Expr], u: &[Expr]) -> Vec<Expr> {
        let map = self
            .states
            .iter()
            .zip(x.iter())
            .chain(self.controls.iter().zip(u.iter()))
            .map(|(sym, e)| (*sym, e.clone()))
            .collect();
        self.equations.iter().map(|eq| eq.subs(&map)).collect()
    }
}

#[cfg_attr(feature = "debug-derive", derive(Debug))]
#[derive(Clone, PartialEq, Eq)]
pub struct BilinearizeOptions {
    /// Taylor expansion order and maximum degree of the lifted state.
    pub order: u32,
    /// Symbols held fixed.  Coefficients may depend on these.
    pub constants: Vec<Symbol>,
}

impl Default for BilinearizeOptions {
    fn default() -> Self {
        BilinearizeOptions {
            order: 2,
            constants: vec![],
        }
    }
}

/// The result of a bilinearization.  `A` is `n x n`, `B` is `n x m`, each
/// `C_k` is `n x n` and `D` is `n x 1`.
#[cfg_attr(feature = "debug-derive", derive(Debug))]
#[derive(Clone, PartialEq)]
pub struct SymbolicBilinearDynamics {
    pub n0: usize,
    pub n: usize,
    pub m: usize,
    pub order: u32,
    pub a: SparseMatrix<Expr>,
    pub b: SparseMatrix<Expr>,
    pub c: Vec<SparseMatrix<Expr>>,
    pub d: SparseMatrix<Expr>,
    /// Monomials of the lifted state; the first `n0` are the states.
    pub lifted: Vec<Expr>,
    /// The unapproximated state derivative, `f(x, u)`.
    pub xdot: Vec<Expr>,
    pub states: Vec<Symbol>,
    pub controls: Vec<Symbol>,
    pub time: Symbol,
    /// Linearization point, one symbol per state.
    pub x0: Vec<Symbol>,
    pub constants: Vec<Symbol>,
}

impl SymbolicBilinearDynamics {
    /// Every symbolic matrix entry, for walking all coefficients at once.
    pub fn coefficients(&self) -> impl Iterator<Item = &Expr> + '_ {
        self.a
            .nzval
            .iter()
            .chain(self.b.nzval.iter())
            .chain(self.c.iter().flat_map(|c| c.nzval.iter()))
            .chain(self.d.nzval.iter())
    }
}

fn check_disjoint(groups: &[(&str, &[Symbol])]) -> Result<()> {
    let mut seen: HashSet<Symbol> = HashSet::new();
    for (what, syms) in groups {
        for sym in syms.iter() {
            if !seen.insert(*sym) {
                return sym_err!(
                    DuplicateSymbol,
                    format!("symbol #{} reused as a {what}", sym.id())
                );
            }
        }
    }
    Ok(())
}

// Every term of ydot must be a monomial in the states and controls (with
// coefficients free of both) and at most linear in the controls.
fn check_bilinear_form(table: &SymbolTable, ydot: &[Expr], states: &[Symbol], controls: &[Symbol]) -> Result<()> {
    let mut vars = states.to_vec();
    vars.extend_from_slice(controls);
    for e in ydot {
        for term in e.terms() {
            let mut control_degree = 0;
            for factor in term.factors() {
                if !factor.depends_on(&vars) {
                    continue;
                }
                let deg = degree(factor).map_err(|mut err| {
                    err.details = Some(format!("cannot bilinearize {}", factor.display(table)));
                    err
                })?;
                if factor.depends_on(controls) {
                    control_degree += deg;
                }
            }
            if control_degree > 1 {
                return sym_err!(
                    UnsupportedExpression,
                    format!("{} is not linear in the controls", term.display(table))
                );
            }
        }
    }
    Ok(())
}

/// Derives the symbolic bilinear approximation of `dynamics`.
#[instrument(level = "debug", skip_all, name = "bilinearize", fields(n0 = states.len(), order = options.order))]
pub fn bilinearize<D: Dynamics + ?Sized>(
    table: &mut SymbolTable,
    dynamics: &D,
    states: &[Symbol],
    controls: &[Symbol],
    time: &Expr,
    options: &BilinearizeOptions,
) -> Result<SymbolicBilinearDynamics> {
    let time = match time {
        Expr::Var(t) => *t,
        _ => {
            return sym_err!(
                CompoundIndependentVariable,
                format!("{}", time.display(table))
            );
        }
    };
    if states.is_empty() {
        return sym_err!(EmptyState);
    }
    let order = options.order;
    if order < 1 {
        return sym_err!(BadOrder, format!("expansion order must be at least 1, got {order}"));
    }
    check_disjoint(&[
        ("state", states),
        ("control", controls),
        ("constant", &options.constants),
        ("time variable", &[time]),
    ])?;

    let n0 = states.len();
    let m = controls.len();
    let x0 = table.unique_vector("x0", n0);

    let xdot = dynamics.eval(&Expr::vars(states), &Expr::vars(controls));
    if xdot.len() != n0 {
        return sym_err!(
            DimensionMismatch,
            format!("dynamics returned {} derivatives for {} states", xdot.len(), n0)
        );
    }

    let mut expanded = Vec::with_capacity(n0);
    for f in xdot.iter() {
        expanded.push(taylor_expand(table, f, states, &x0, order)?);
    }
    // polynomial terms above the order have no column in the lifted basis
    let approx = truncate_order(table, &expanded, states, &x0, order)?;
    debug!("state derivatives expanded to order {order}");

    let lifted = build_state_vector(states, order)?;
    let n = lifted.len();
    debug!(n, "lifted state built");

    // chain rule: d/dt y_j = sum_i dy_j/dx_i * dx_i/dt
    let ydot: Vec<Expr> = lifted
        .iter()
        .map(|y| {
            let terms = states
                .iter()
                .zip(approx.iter())
                .map(|(x, xdot)| Expr::mul(vec![y.diff(*x), xdot.clone()]))
                .collect();
            Expr::add(terms).expand()
        })
        .collect();
    check_bilinear_form(table, &ydot, states, controls)?;

    let mut base = states.to_vec();
    base.extend_from_slice(controls);

    let a = build_sparse_matrix(table, &ydot, &lifted, &base)?;
    let b = build_sparse_matrix(table, &ydot, &Expr::vars(controls), &base)?;
    let mut c = Vec::with_capacity(m);
    for u in controls {
        let dydu: Vec<Expr> = ydot.iter().map(|e| e.diff(*u)).collect();
        c.push(build_sparse_matrix(table, &dydu, &lifted, &base)?);
    }
    let (values, rows) = extract_coefficients(table, &ydot, None, &base)?;
    let d = SparseMatrix::from_columns(n, vec![rows.into_iter().zip(values).collect()]);

    let result = SymbolicBilinearDynamics {
        n0,
        n,
        m,
        order,
        a,
        b,
        c,
        d,
        lifted,
        xdot,
        states: states.to_vec(),
        controls: controls.to_vec(),
        time,
        x0,
        constants: options.constants.clone(),
    };

    let allowed: BTreeSet<Symbol> = result.x0.iter().chain(result.constants.iter()).copied().collect();
    for coeff in result.coefficients() {
        if let Some(sym) = coeff.free_symbols().difference(&allowed).next() {
            return sym_err!(
                UnsupportedExpression,
                format!(
                    "coefficient {} depends on {}",
                    coeff.display(table),
                    table.label(*sym)
                )
            );
        }
    }

    debug!(
        nnz_a = result.a.nnz(),
        nnz_b = result.b.nnz(),
        nnz_c = result.c.iter().map(|c| c.nnz()).sum::<usize>(),
        nnz_d = result.d.nnz(),
        "coefficients extracted"
    );

    Ok(result)
}
