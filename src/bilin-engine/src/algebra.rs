// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Polynomial inspection helpers used by lifting and coefficient
//! extraction.

use crate::common::Result;
use crate::expr::Expr;
use crate::sym_err;
use crate::symbol::{Symbol, SymbolTable};

/// Total polynomial degree of `expr`.
///
/// Constants have degree 0 and bare variables degree 1.  A product sums
/// the degrees of its factors, while a sum takes the degree of its
/// highest term, so mixed-degree polynomials are allowed.  Powers must
/// have a non-negative integer exponent.  Quotients and function calls
/// have no polynomial degree.
pub fn degree(expr: &Expr) -> Result<u32> {
    match expr {
        Expr::Const(_) => Ok(0),
        Expr::Var(_) => Ok(1),
        Expr::Add(terms) => {
            let mut max = 0;
            for term in terms {
                max = max.max(degree(term)?);
            }
            Ok(max)
        }
        Expr::Mul(factors) => {
            let mut sum = 0;
            for factor in factors {
                sum += degree(factor)?;
            }
            Ok(sum)
        }
        Expr::Pow(base, exp) => match exp.as_integer() {
            Some(n) if (0..=u32::MAX as i64).contains(&n) => Ok(degree(base)? * n as u32),
            _ => sym_err!(
                UnsupportedExpression,
                "power without a non-negative integer exponent".to_owned()
            ),
        },
        Expr::Div(_, _) => sym_err!(
            UnsupportedExpression,
            "quotient has no polynomial degree".to_owned()
        ),
        Expr::App(func, _) => sym_err!(
            UnsupportedExpression,
            format!("{}() has no polynomial degree", func.name())
        ),
    }
}

/// The part of `expr` that is constant with respect to every symbol in
/// `vars`: the expanded additive terms mentioning none of them.
pub fn constant_part(expr: &Expr, vars: &[Symbol]) -> Expr {
    let expanded = expr.expand();
    let terms = expanded
        .terms()
        .iter()
        .filter(|t| !t.depends_on(vars))
        .cloned()
        .collect();
    Expr::add(terms)
}

/// One step of a composed differential operator.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Atom {
    Symbol(Symbol),
    /// Differentiation with respect to `base^exp` as if it were an
    /// independent symbol.  `dummy` stands in for the power while
    /// differentiating.
    Power { base: Symbol, exp: i64, dummy: Symbol },
}

/// The joint differential operator for a monomial: `d/dx` for `x` or
/// `x^k`, and the composition `d/dx d/dy ...` for a product of distinct
/// bases.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Differential {
    atoms: Vec<Atom>,
}

impl Differential {
    pub fn for_term(table: &mut SymbolTable, term: &Expr) -> Result<Differential> {
        let mut atoms = Vec::with_capacity(term.factors().len());
        for factor in term.factors() {
            atoms.push(Differential::atom(table, factor)?);
        }
        Ok(Differential { atoms })
    }

    fn atom(table: &mut SymbolTable, factor: &Expr) -> Result<Atom> {
        match factor {
            Expr::Var(s) => Ok(Atom::Symbol(*s)),
            Expr::Pow(base, exp) => match (base.as_symbol(), exp.as_integer()) {
                (Some(base), Some(exp)) if exp >= 2 => Ok(Atom::Power {
                    base,
                    exp,
                    dummy: table.scratch(),
                }),
                _ => sym_err!(
                    UnsupportedExpression,
                    "differential target must be a monomial".to_owned()
                ),
            },
            _ => sym_err!(
                UnsupportedExpression,
                "differential target must be a monomial".to_owned()
            ),
        }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Differentiates `expr` with respect to each atom in turn.
    pub fn apply(&self, expr: &Expr) -> Expr {
        let mut result = expr.expand();
        for atom in self.atoms.iter() {
            result = match atom {
                Atom::Symbol(s) => result.diff(*s),
                Atom::Power { base, exp, dummy } => {
                    let power = Expr::powi(Expr::var(*base), *exp);
                    let dummy = *dummy;
                    result
                        .replace(&power, &Expr::var(dummy))
                        .diff(dummy)
                        .subs_one(dummy, &power)
                }
            }
            .expand();
        }
        result
    }
}
