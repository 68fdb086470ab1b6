// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Property-based tests for polynomial degree and state lifting.

use std::collections::HashSet;

use proptest::prelude::*;

use crate::algebra::degree;
use crate::expr::Expr;
use crate::lifting::build_state_vector;
use crate::symbol::SymbolTable;

fn binomial(n: u64, k: u64) -> u64 {
    (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn monomial_degree_is_sum_of_exponents(
        exps in prop::collection::vec(0i64..6, 1..5),
        coeff in prop_oneof![Just(1.0), -10.0f64..10.0],
    ) {
        let mut table = SymbolTable::new();
        let xs = table.vector("x", exps.len());
        let mut factors = vec![Expr::constant(coeff)];
        for (x, k) in xs.iter().zip(exps.iter()) {
            factors.push(Expr::powi(Expr::var(*x), *k));
        }
        let monomial = Expr::mul(factors);
        let expected: i64 = if coeff == 0.0 { 0 } else { exps.iter().sum() };
        prop_assert_eq!(expected as u32, degree(&monomial).unwrap());
    }

    #[test]
    fn constant_degree_is_zero(c in -1e6f64..1e6) {
        prop_assert_eq!(0, degree(&Expr::constant(c)).unwrap());
    }

    #[test]
    fn lifting_is_bounded_and_monotonic(n0 in 1usize..4, order in 1u32..5) {
        let mut table = SymbolTable::new();
        let xs = table.vector("x", n0);

        let lower = build_state_vector(&xs, order).unwrap();
        let upper = build_state_vector(&xs, order + 1).unwrap();

        prop_assert_eq!(Expr::vars(&xs), lower[..n0].to_vec());
        for term in lower.iter() {
            prop_assert!(degree(term).unwrap() <= order);
        }
        let unique: HashSet<&Expr> = lower.iter().collect();
        prop_assert_eq!(unique.len(), lower.len());
        // all monomials of degree 1..=order in n0 variables
        let expected = binomial(n0 as u64 + order as u64, order as u64) - 1;
        prop_assert_eq!(expected as usize, lower.len());

        let upper: HashSet<&Expr> = upper.iter().collect();
        prop_assert!(lower.iter().all(|t| upper.contains(t)));
    }
}
