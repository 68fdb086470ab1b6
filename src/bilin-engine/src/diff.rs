// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use crate::builtins::Func;
use crate::expr::Expr;
use crate::symbol::Symbol;

impl Expr {
    /// Symbolic derivative with respect to `x`.  The result is canonical but
    /// not expanded.
    pub fn diff(&self, x: Symbol) -> Expr {
        if !self.contains_symbol(x) {
            return Expr::zero();
        }
        match self {
            Expr::Const(_) => Expr::zero(),
            Expr::Var(s) => {
                if *s == x {
                    Expr::one()
                } else {
                    Expr::zero()
                }
            }
            Expr::Add(terms) => Expr::add(terms.iter().map(|t| t.diff(x)).collect()),
            Expr::Mul(factors) => {
                let mut terms = Vec::with_capacity(factors.len());
                for (i, factor) in factors.iter().enumerate() {
                    let d = factor.diff(x);
                    if d.is_zero() {
                        continue;
                    }
                    let mut product: Vec<Expr> = Vec::with_capacity(factors.len());
                    product.push(d);
                    product.extend(
                        factors
                            .iter()
                            .enumerate()
                            .filter(|(j, _)| *j != i)
                            .map(|(_, f)| f.clone()),
                    );
                    terms.push(Expr::mul(product));
                }
                Expr::add(terms)
            }
            Expr::Pow(base, exp) => {
                let base = (**base).clone();
                let exp = (**exp).clone();
                if !exp.contains_symbol(x) {
                    // d(b^n) = n * b^(n-1) * db
                    let reduced = Expr::pow(base.clone(), Expr::sub(exp.clone(), Expr::one()));
                    Expr::mul(vec![exp, reduced, base.diff(x)])
                } else {
                    // d(b^e) = b^e * (de * ln(b) + e * db / b)
                    let ln_base = Expr::app(Func::Ln, vec![base.clone()]);
                    let inner = Expr::add(vec![
                        Expr::mul(vec![exp.diff(x), ln_base]),
                        Expr::mul(vec![exp.clone(), Expr::div(base.diff(x), base.clone())]),
                    ]);
                    Expr::mul(vec![Expr::pow(base, exp), inner])
                }
            }
            Expr::Div(num, den) => {
                // (dn * d - n * dd) / d^2
                let numerator = Expr::sub(
                    Expr::mul(vec![num.diff(x), (**den).clone()]),
                    Expr::mul(vec![(**num).clone(), den.diff(x)]),
                );
                Expr::div(numerator, Expr::powi((**den).clone(), 2))
            }
            Expr::App(func, args) => {
                let mut terms = Vec::with_capacity(args.len());
                for (i, arg) in args.iter().enumerate() {
                    let d = arg.diff(x);
                    if d.is_zero() {
                        continue;
                    }
                    terms.push(Expr::mul(vec![func.partial(i, args), d]));
                }
                Expr::add(terms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use float_cmp::approx_eq;

    use super::*;
    use crate::symbol::SymbolTable;

    #[test]
    fn test_polynomial_derivative() {
        let mut table = SymbolTable::new();
        let xs = table.scalar("x");
        let ys = table.scalar("y");
        let (x, y) = (Expr::var(xs), Expr::var(ys));

        // d/dx (3*x^2*y + x) = 6*x*y + 1
        let e = Expr::mul(vec![Expr::constant(3.0), Expr::powi(x.clone(), 2), y.clone()]) + x.clone();
        let expected = Expr::mul(vec![Expr::constant(6.0), x.clone(), y.clone()]) + Expr::one();
        assert_eq!(expected, e.diff(xs).expand());
        assert_eq!(Expr::mul(vec![Expr::constant(3.0), Expr::powi(x, 2)]), e.diff(ys).expand());
    }

    #[test]
    fn test_unrelated_symbol_is_zero() {
        let mut table = SymbolTable::new();
        let xs = table.scalar("x");
        let ys = table.scalar("y");
        let e = Expr::app(Func::Sin, vec![Expr::var(xs)]);
        assert_eq!(Expr::zero(), e.diff(ys));
    }

    #[test]
    fn test_chain_and_quotient_rules_numerically() {
        let mut table = SymbolTable::new();
        let xs = table.scalar("x");
        let x = Expr::var(xs);

        // f(x) = sin(x^2) / (1 + x) + x^x
        let f = Expr::div(
            Expr::app(Func::Sin, vec![Expr::powi(x.clone(), 2)]),
            Expr::one() + x.clone(),
        ) + Expr::pow(x.clone(), x.clone());
        let df = f.diff(xs);

        let at = 1.3;
        let h = 1e-6;
        let eval = |e: &Expr, v: f64| {
            let env: HashMap<_, _> = [(xs, v)].into_iter().collect();
            e.eval(&env).unwrap()
        };
        let numeric = (eval(&f, at + h) - eval(&f, at - h)) / (2.0 * h);
        assert!(approx_eq!(f64, numeric, eval(&df, at), epsilon = 1e-5));
    }
}
