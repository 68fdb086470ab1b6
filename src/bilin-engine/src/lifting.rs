// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use indexmap::IndexSet;

use crate::algebra::degree;
use crate::common::Result;
use crate::expr::Expr;
use crate::sym_err;
use crate::symbol::Symbol;

/// Builds the lifted state: the original states followed by every
/// monomial in them of total degree at most `order`, without duplicates.
///
/// Each round appends the lower triangle (column-major) of the outer
/// product `y * y^T` to `y`, doubling the largest degree present, and the
/// overshoot from the last round is filtered out at the end.
pub fn build_state_vector(states: &[Symbol], order: u32) -> Result<Vec<Expr>> {
    if order < 1 {
        return sym_err!(BadOrder, format!("expansion order must be at least 1, got {order}"));
    }
    if states.is_empty() {
        return sym_err!(EmptyState);
    }

    let mut lifted: IndexSet<Expr> = states.iter().map(|s| Expr::var(*s)).collect();
    for _ in 0..rounds(order) {
        let current: Vec<Expr> = lifted.iter().cloned().collect();
        for (j, col) in current.iter().enumerate() {
            for row in current[j..].iter() {
                lifted.insert(Expr::mul(vec![row.clone(), col.clone()]));
            }
        }
    }

    let mut result = Vec::with_capacity(lifted.len());
    for term in lifted {
        if degree(&term)? <= order {
            result.push(term);
        }
    }
    Ok(result)
}

// ceil(log2(order))
fn rounds(order: u32) -> u32 {
    u32::BITS - (order - 1).leading_zeros()
}
