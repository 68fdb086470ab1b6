// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use crate::expr::Expr;

// (a + b)^n is only multiplied out up to this exponent
const MAX_EXPANDED_POWER: i64 = 64;

impl Expr {
    /// Expands into canonical sum-of-products form: products distribute
    /// over sums, positive integer powers of sums are multiplied out and
    /// integer powers of products are distributed over their factors.
    /// Quotients become products with a reciprocal factor so that their
    /// numerators expand too.  Function arguments are expanded in place.
    pub fn expand(&self) -> Expr {
        match self {
            Expr::Const(_) | Expr::Var(_) => self.clone(),
            Expr::Add(terms) => Expr::add(terms.iter().map(|t| t.expand()).collect()),
            Expr::Mul(factors) => {
                let factors: Vec<Expr> = factors.iter().map(|f| f.expand()).collect();
                distribute(&factors)
            }
            Expr::Pow(base, exp) => {
                let base = base.expand();
                let exp = exp.expand();
                match (&base, exp.as_integer()) {
                    (Expr::Add(_), Some(n)) if (2..=MAX_EXPANDED_POWER).contains(&n) => {
                        let factors = vec![base.clone(); n as usize];
                        distribute(&factors)
                    }
                    (Expr::Mul(factors), Some(_)) => Expr::mul(
                        factors
                            .iter()
                            .map(|f| Expr::pow(f.clone(), exp.clone()))
                            .collect(),
                    )
                    .expand(),
                    _ => Expr::pow(base, exp),
                }
            }
            Expr::Div(num, den) => {
                let num = num.expand();
                let den = den.expand();
                let reciprocal = Expr::div(Expr::one(), den);
                if reciprocal.is_one() {
                    return num;
                }
                distribute(&[num, reciprocal])
            }
            Expr::App(func, args) => Expr::app(*func, args.iter().map(|a| a.expand()).collect()),
        }
    }
}

/// Multiplies already-expanded factors together, distributing over sums.
fn distribute(factors: &[Expr]) -> Expr {
    let mut terms: Vec<Expr> = vec![Expr::one()];
    for factor in factors {
        let factor_terms = factor.terms();
        let mut next = Vec::with_capacity(terms.len() * factor_terms.len());
        for t in terms.iter() {
            for f in factor_terms {
                next.push(Expr::mul(vec![t.clone(), f.clone()]));
            }
        }
        // combine like terms as we go to keep intermediate sums small
        terms = Expr::add(next).terms().to_vec();
    }
    Expr::add(terms)
}
