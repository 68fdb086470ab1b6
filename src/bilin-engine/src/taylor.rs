// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Multivariate Taylor expansion.
//!
//! [`taylor_series`] expands a generic function of `arity` arguments about
//! a base point by repeated differentiation.  [`taylor_expand`] walks an
//! expression and replaces every nonlinear call (and every quotient) that
//! depends on the expansion variables with such a series, so that the
//! result is a polynomial in those variables whose coefficients are
//! expressions in the base point.  [`truncate_order`] then cuts such a
//! polynomial back to the expansion order.

use std::collections::HashMap;

use crate::algebra::degree;
use crate::common::Result;
use crate::expr::Expr;
use crate::sym_err;
use crate::symbol::{Symbol, SymbolTable};

/// A Taylor series of a generic function in the dummy variables `x`
/// about the dummy base point `x0`.
#[cfg_attr(feature = "debug-derive", derive(Debug))]
#[derive(Clone, PartialEq)]
pub struct TaylorSeries {
    pub expr: Expr,
    pub x: Vec<Symbol>,
    pub x0: Vec<Symbol>,
}

impl TaylorSeries {
    /// Substitutes concrete expressions for the dummy variables and base
    /// point.
    pub fn instantiate(&self, x: &[Expr], x0: &[Expr]) -> Expr {
        let mut map: HashMap<Symbol, Expr> = HashMap::with_capacity(x.len() + x0.len());
        for (sym, e) in self.x.iter().zip(x.iter()) {
            map.insert(*sym, e.clone());
        }
        for (sym, e) in self.x0.iter().zip(x0.iter()) {
            map.insert(*sym, e.clone());
        }
        self.expr.subs(&map)
    }
}

// a partially accumulated term of order k: d^k f / dx0_i.. times the
// matching product of (x_i - x0_i) offsets
struct Term {
    derivative: Expr,
    offsets: Vec<Expr>,
}

/// Builds `f(x0) + sum_k 1/k! sum_{i1..ik} d^k f(x0) / dx_i1..dx_ik *
/// (x_i1 - x0_i1)..(x_ik - x0_ik)` up to and including `order`.
pub fn taylor_series<F>(table: &mut SymbolTable, f: F, arity: usize, order: u32) -> TaylorSeries
where
    F: Fn(&[Expr]) -> Expr,
{
    let x = table.fresh_vector("x", arity);
    let x0 = table.fresh_vector("x0", arity);
    let at_base = f(&Expr::vars(&x0));

    let deltas: Vec<Expr> = x
        .iter()
        .zip(x0.iter())
        .map(|(xi, x0i)| Expr::var(*xi) - Expr::var(*x0i))
        .collect();

    let mut sum = vec![at_base.clone()];
    let mut level = vec![Term {
        derivative: at_base,
        offsets: vec![],
    }];
    let mut factorial = 1.0;
    for k in 1..=order {
        factorial *= k as f64;
        let mut next = Vec::with_capacity(level.len() * arity);
        for term in level.iter() {
            for i in 0..arity {
                let derivative = term.derivative.diff(x0[i]);
                if derivative.is_zero() {
                    continue;
                }
                let mut offsets = term.offsets.clone();
                offsets.push(deltas[i].clone());
                next.push(Term {
                    derivative,
                    offsets,
                });
            }
        }
        let scale = Expr::constant(1.0 / factorial);
        for term in next.iter() {
            let mut factors = Vec::with_capacity(term.offsets.len() + 2);
            factors.push(scale.clone());
            factors.push(term.derivative.clone());
            factors.extend(term.offsets.iter().cloned());
            sum.push(Expr::mul(factors));
        }
        if next.is_empty() {
            break;
        }
        level = next;
    }

    TaylorSeries {
        expr: Expr::add(sum),
        x,
        x0,
    }
}

/// Replaces every nonlinear sub-expression of `expr` that depends on
/// `vars` with its Taylor series about `vars0`.
pub fn taylor_expand(
    table: &mut SymbolTable,
    expr: &Expr,
    vars: &[Symbol],
    vars0: &[Symbol],
    order: u32,
) -> Result<Expr> {
    if vars.len() != vars0.len() {
        return sym_err!(
            DimensionMismatch,
            format!("{} variables but {} base point symbols", vars.len(), vars0.len())
        );
    }
    let base_point: HashMap<Symbol, Expr> = vars
        .iter()
        .zip(vars0.iter())
        .map(|(v, v0)| (*v, Expr::var(*v0)))
        .collect();
    let mut expander = Expander {
        table,
        vars,
        base_point: &base_point,
        order,
    };
    expander.expand(expr)
}

/// Drops every term of the polynomials `exprs` whose total degree in the
/// offsets `vars - vars0` exceeds `order`.
///
/// Each result is the Taylor polynomial of its input about `vars0`, so it
/// still agrees with the input at `vars = vars0`.  Inputs that aren't
/// polynomial in `vars` are rejected with `UnsupportedExpression`.
pub fn truncate_order(
    table: &mut SymbolTable,
    exprs: &[Expr],
    vars: &[Symbol],
    vars0: &[Symbol],
    order: u32,
) -> Result<Vec<Expr>> {
    if vars.len() != vars0.len() {
        return sym_err!(
            DimensionMismatch,
            format!("{} variables but {} base point symbols", vars.len(), vars0.len())
        );
    }
    let offsets = table.fresh_vector("dx", vars.len());
    let recenter: HashMap<Symbol, Expr> = vars
        .iter()
        .zip(vars0.iter().zip(offsets.iter()))
        .map(|(v, (v0, d))| (*v, Expr::var(*v0) + Expr::var(*d)))
        .collect();
    let restore: HashMap<Symbol, Expr> = offsets
        .iter()
        .zip(vars.iter().zip(vars0.iter()))
        .map(|(d, (v, v0))| (*d, Expr::var(*v) - Expr::var(*v0)))
        .collect();

    let mut truncated = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let centered = expr.subs(&recenter).expand();
        let mut kept = Vec::with_capacity(centered.terms().len());
        for term in centered.terms() {
            let mut total = 0;
            for factor in term.factors() {
                if !factor.depends_on(&offsets) {
                    continue;
                }
                total += degree(factor).map_err(|mut err| {
                    err.details = Some(format!("{} is not a polynomial", expr.display(table)));
                    err
                })?;
            }
            if total <= order {
                kept.push(term.clone());
            }
        }
        truncated.push(Expr::add(kept).subs(&restore).expand());
    }
    Ok(truncated)
}

struct Expander<'a> {
    table: &'a mut SymbolTable,
    vars: &'a [Symbol],
    base_point: &'a HashMap<Symbol, Expr>,
    order: u32,
}

impl Expander<'_> {
    fn expand(&mut self, expr: &Expr) -> Result<Expr> {
        if !expr.depends_on(self.vars) {
            return Ok(expr.clone());
        }
        let expanded = match expr {
            Expr::Const(_) | Expr::Var(_) => expr.clone(),
            Expr::Add(terms) => Expr::add(self.expand_all(terms)?),
            Expr::Mul(factors) => Expr::mul(self.expand_all(factors)?),
            Expr::Pow(base, exp) if exp.as_const().is_some() => {
                Expr::pow(self.expand(base)?, (**exp).clone())
            }
            Expr::Pow(base, _) if base.depends_on(self.vars) => {
                return sym_err!(
                    UnsupportedExpression,
                    "power with a symbolic exponent".to_owned()
                );
            }
            // b^g(x) with b free of the variables is a call of g
            Expr::Pow(base, exp) => {
                let base = (**base).clone();
                self.expand_call(
                    move |a: &[Expr]| Expr::pow(base.clone(), a[0].clone()),
                    std::slice::from_ref(&**exp),
                )?
            }
            Expr::Div(num, den) => {
                let args = [(**num).clone(), (**den).clone()];
                self.expand_call(|a: &[Expr]| Expr::div(a[0].clone(), a[1].clone()), &args)?
            }
            Expr::App(func, args) => {
                let func = *func;
                self.expand_call(|a: &[Expr]| Expr::app(func, a.to_vec()), args)?
            }
        };
        Ok(expanded)
    }

    fn expand_all(&mut self, exprs: &[Expr]) -> Result<Vec<Expr>> {
        exprs.iter().map(|e| self.expand(e)).collect()
    }

    // f(g_1(x), .., g_n(x)) becomes the series of f about the exact
    // arguments at the base point, g_i(x0), evaluated at the expanded
    // arguments
    fn expand_call<F>(&mut self, f: F, args: &[Expr]) -> Result<Expr>
    where
        F: Fn(&[Expr]) -> Expr,
    {
        let series = taylor_series(self.table, f, args.len(), self.order);
        let expanded = self.expand_all(args)?;
        let exact: Vec<Expr> = args.iter().map(|a| a.subs(self.base_point)).collect();
        Ok(series.instantiate(&expanded, &exact))
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;
    use crate::builtins::Func;
    use crate::common::ErrorCode;

    fn env(pairs: &[(Symbol, f64)]) -> HashMap<Symbol, f64> {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn test_order_zero_is_exact_at_base_point() {
        let mut table = SymbolTable::new();
        let f = |a: &[Expr]| Expr::app(Func::Sin, vec![a[0].clone() * a[1].clone()]);
        let series = taylor_series(&mut table, f, 2, 0);

        let at = series.instantiate(
            &[Expr::constant(0.3), Expr::constant(1.7)],
            &[Expr::constant(0.3), Expr::constant(1.7)],
        );
        assert_eq!(Some((0.3f64 * 1.7).sin()), at.as_const());
    }

    #[test]
    fn test_square_recovers_polynomial() {
        let mut table = SymbolTable::new();
        let series = taylor_series(&mut table, |a: &[Expr]| Expr::powi(a[0].clone(), 2), 1, 2);

        let x = Expr::var(series.x[0]);
        let x0 = Expr::var(series.x0[0]);
        let expected = Expr::powi(x0.clone(), 2)
            + Expr::constant(2.0) * x0.clone() * (x.clone() - x0.clone())
            + Expr::powi(x.clone() - x0, 2);
        assert_eq!(expected.expand(), series.expr.expand());
        assert_eq!(Expr::powi(x, 2), series.expr.expand());
    }

    #[test]
    fn test_mixed_partials() {
        let mut table = SymbolTable::new();
        // x*y is degree 2, so an order 2 series is exact
        let series = taylor_series(&mut table, |a: &[Expr]| a[0].clone() * a[1].clone(), 2, 2);
        let expected = Expr::var(series.x[0]) * Expr::var(series.x[1]);
        assert_eq!(expected, series.expr.expand());
    }

    #[test]
    fn test_expand_exp_matches_truncated_series() {
        let mut table = SymbolTable::new();
        let xs = table.scalar("x");
        let x0s = table.scalar("x0");
        let e = Expr::app(Func::Exp, vec![Expr::var(xs)]);

        let approx = taylor_expand(&mut table, &e, &[xs], &[x0s], 2).unwrap();
        let d: f64 = 0.1;
        let at = env(&[(xs, 0.5 + d), (x0s, 0.5)]);
        let expected = 0.5f64.exp() * (1.0 + d + d * d / 2.0);
        assert!(approx_eq!(f64, expected, approx.eval(&at).unwrap(), epsilon = 1e-12));

        // the expansion is a polynomial in x
        assert!(crate::algebra::degree(&approx.subs_one(x0s, &Expr::one()).expand()).is_ok());
    }

    #[test]
    fn test_nested_calls_and_quotients() {
        let mut table = SymbolTable::new();
        let xs = table.scalar("x");
        let ys = table.scalar("y");
        let x0s = table.scalar("x0");
        let y0s = table.scalar("y0");
        let (x, y) = (Expr::var(xs), Expr::var(ys));

        let e = Expr::div(Expr::app(Func::Sin, vec![x.clone() * y.clone()]), Expr::one() + x);
        let approx = taylor_expand(&mut table, &e, &[xs, ys], &[x0s, y0s], 3).unwrap();

        let exact = |at: &HashMap<Symbol, f64>| e.eval(at).unwrap();
        let base = env(&[(xs, 0.4), (ys, -0.2), (x0s, 0.4), (y0s, -0.2)]);
        assert!(approx_eq!(f64, exact(&base), approx.eval(&base).unwrap(), epsilon = 1e-12));

        let near = env(&[(xs, 0.41), (ys, -0.19), (x0s, 0.4), (y0s, -0.2)]);
        let err = (exact(&near) - approx.eval(&near).unwrap()).abs();
        assert!(err < 1e-6, "truncation error {err}");
    }

    #[test]
    fn test_unrelated_subexpressions_pass_through() {
        let mut table = SymbolTable::new();
        let xs = table.scalar("x");
        let x0s = table.scalar("x0");
        let g = Expr::var(table.scalar("g"));
        let e = Expr::app(Func::Cos, vec![g.clone()]) * Expr::var(xs) + g;
        assert_eq!(e, taylor_expand(&mut table, &e, &[xs], &[x0s], 2).unwrap());
    }

    #[test]
    fn test_constant_base_with_varying_exponent() {
        let mut table = SymbolTable::new();
        let xs = table.scalar("x");
        let x0s = table.scalar("x0");
        let e = Expr::pow(Expr::constant(2.0), Expr::var(xs));

        let approx = taylor_expand(&mut table, &e, &[xs], &[x0s], 2).unwrap();
        let at = env(&[(xs, 0.7), (x0s, 0.7)]);
        assert!(approx_eq!(f64, 2f64.powf(0.7), approx.eval(&at).unwrap(), epsilon = 1e-12));

        let d: f64 = 0.05;
        let ln2 = 2f64.ln();
        let near = env(&[(xs, 0.7 + d), (x0s, 0.7)]);
        let expected = 2f64.powf(0.7) * (1.0 + ln2 * d + ln2 * ln2 * d * d / 2.0);
        assert!(approx_eq!(f64, expected, approx.eval(&near).unwrap(), epsilon = 1e-12));

        let poly = approx.subs_one(x0s, &Expr::constant(0.7)).expand();
        assert_eq!(2, crate::algebra::degree(&poly).unwrap());
    }

    #[test]
    fn test_truncate_order() {
        let mut table = SymbolTable::new();
        let xs = table.scalar("x");
        let x0s = table.scalar("x0");
        let (x, x0) = (Expr::var(xs), Expr::var(x0s));

        // x^3 about x0, cut at degree 2
        let cubic = Expr::powi(x.clone(), 3);
        let got = truncate_order(&mut table, &[cubic.clone()], &[xs], &[x0s], 2).unwrap();
        let expected = Expr::powi(x0.clone(), 3)
            + Expr::constant(3.0) * Expr::powi(x0.clone(), 2) * (x.clone() - x0.clone())
            + Expr::constant(3.0) * x0.clone() * Expr::powi(x.clone() - x0.clone(), 2);
        assert_eq!(expected.expand(), got[0]);

        for (xv, x0v) in [(1.0, 1.0), (2.0, 2.0), (-0.5, -0.5)] {
            let at = env(&[(xs, xv), (x0s, x0v)]);
            assert!(approx_eq!(f64, cubic.eval(&at).unwrap(), got[0].eval(&at).unwrap(), ulps = 2));
        }

        // within the order nothing changes
        let g = Expr::var(table.scalar("g"));
        let quad = g * Expr::powi(x.clone(), 2) + x;
        let got = truncate_order(&mut table, &[quad.clone()], &[xs], &[x0s], 2).unwrap();
        assert_eq!(quad.expand(), got[0]);
    }

    #[test]
    fn test_truncate_order_errors() {
        let mut table = SymbolTable::new();
        let xs = table.scalar("x");
        let x0s = table.scalar("x0");

        let root = Expr::pow(Expr::var(xs), Expr::constant(0.5));
        let err = truncate_order(&mut table, &[root], &[xs], &[x0s], 2).unwrap_err();
        assert_eq!(ErrorCode::UnsupportedExpression, err.code);

        let err = truncate_order(&mut table, &[Expr::var(xs)], &[xs], &[], 2).unwrap_err();
        assert_eq!(ErrorCode::DimensionMismatch, err.code);
    }

    #[test]
    fn test_errors() {
        let mut table = SymbolTable::new();
        let xs = table.scalar("x");
        let x0s = table.scalar("x0");
        let g = Expr::var(table.scalar("g"));

        let e = Expr::pow(Expr::var(xs), g);
        let err = taylor_expand(&mut table, &e, &[xs], &[x0s], 2).unwrap_err();
        assert_eq!(ErrorCode::UnsupportedExpression, err.code);

        let err = taylor_expand(&mut table, &e, &[xs], &[], 2).unwrap_err();
        assert_eq!(ErrorCode::DimensionMismatch, err.code);
    }
}
