// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Compressed sparse column matrices and symbolic coefficient extraction.

use serde::Serialize;

use crate::algebra::{Differential, constant_part};
use crate::common::Result;
use crate::expr::Expr;
use crate::symbol::{Symbol, SymbolTable};
use crate::{model_err, sym_err};

/// A compressed sparse column matrix.  Column `j` holds the entries
/// `rowval[colptr[j]..colptr[j + 1]]` / `nzval[..]`, with row indices
/// strictly increasing inside a column.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct SparseMatrix<T> {
    pub nrows: usize,
    pub ncols: usize,
    pub colptr: Vec<usize>,
    pub rowval: Vec<usize>,
    pub nzval: Vec<T>,
}

impl<T> SparseMatrix<T> {
    pub fn new(
        nrows: usize,
        ncols: usize,
        colptr: Vec<usize>,
        rowval: Vec<usize>,
        nzval: Vec<T>,
    ) -> Result<Self> {
        if colptr.len() != ncols + 1 || colptr[0] != 0 {
            return model_err!(
                DimensionMismatch,
                format!("{ncols} columns need {} column pointers", ncols + 1)
            );
        }
        if colptr[ncols] != rowval.len() || rowval.len() != nzval.len() {
            return model_err!(
                DimensionMismatch,
                "column pointers disagree with the number of stored values".to_owned()
            );
        }
        for j in 0..ncols {
            if colptr[j] > colptr[j + 1] {
                return model_err!(DimensionMismatch, format!("column {j} has negative length"));
            }
            let rows = &rowval[colptr[j]..colptr[j + 1]];
            if rows.iter().any(|r| *r >= nrows) || rows.windows(2).any(|w| w[0] >= w[1]) {
                return model_err!(
                    DimensionMismatch,
                    format!("column {j} has out-of-range or unsorted rows")
                );
            }
        }
        Ok(SparseMatrix {
            nrows,
            ncols,
            colptr,
            rowval,
            nzval,
        })
    }

    /// Assembles a matrix from per-column `(row, value)` lists, which must
    /// already be sorted by row.
    pub(crate) fn from_columns(nrows: usize, columns: Vec<Vec<(usize, T)>>) -> Self {
        let ncols = columns.len();
        let nnz = columns.iter().map(|c| c.len()).sum();
        let mut colptr = Vec::with_capacity(ncols + 1);
        let mut rowval = Vec::with_capacity(nnz);
        let mut nzval = Vec::with_capacity(nnz);
        colptr.push(0);
        for column in columns {
            for (row, value) in column {
                rowval.push(row);
                nzval.push(value);
            }
            colptr.push(rowval.len());
        }
        SparseMatrix {
            nrows,
            ncols,
            colptr,
            rowval,
            nzval,
        }
    }

    pub fn nnz(&self) -> usize {
        self.nzval.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// True if both matrices have the same shape and store entries in the
    /// same positions.
    pub fn pattern_eq<U>(&self, other: &SparseMatrix<U>) -> bool {
        self.nrows == other.nrows
            && self.ncols == other.ncols
            && self.colptr == other.colptr
            && self.rowval == other.rowval
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if col >= self.ncols {
            return None;
        }
        let range = self.colptr[col]..self.colptr[col + 1];
        let rows = &self.rowval[range.clone()];
        rows.binary_search(&row)
            .ok()
            .map(|i| &self.nzval[range.start + i])
    }

    /// `(row, col, value)` for each stored entry, column by column.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        (0..self.ncols).flat_map(move |col| {
            (self.colptr[col]..self.colptr[col + 1])
                .map(move |k| (self.rowval[k], col, &self.nzval[k]))
        })
    }

    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> SparseMatrix<U> {
        SparseMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            colptr: self.colptr.clone(),
            rowval: self.rowval.clone(),
            nzval: self.nzval.iter().map(f).collect(),
        }
    }

    /// A numeric matrix with this pattern and every stored value zero.
    pub fn zeros_like(&self) -> SparseMatrix<f64> {
        self.map(|_| 0.0)
    }
}

impl SparseMatrix<f64> {
    pub fn identity(n: usize) -> Self {
        SparseMatrix {
            nrows: n,
            ncols: n,
            colptr: (0..=n).collect(),
            rowval: (0..n).collect(),
            nzval: vec![1.0; n],
        }
    }

    /// Builds a matrix from dense rows, storing only nonzero entries.
    pub fn from_dense(rows: &[Vec<f64>]) -> Result<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != ncols) {
            return model_err!(DimensionMismatch, "ragged dense matrix".to_owned());
        }
        let columns = (0..ncols)
            .map(|j| {
                (0..nrows)
                    .filter(|i| rows[*i][j] != 0.0)
                    .map(|i| (i, rows[i][j]))
                    .collect()
            })
            .collect();
        Ok(SparseMatrix::from_columns(nrows, columns))
    }

    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        let mut dense = vec![vec![0.0; self.ncols]; self.nrows];
        for (row, col, value) in self.iter() {
            dense[row][col] = *value;
        }
        dense
    }

    /// `y += alpha * self * x`
    #[inline]
    pub fn mul_vec_add(&self, alpha: f64, x: &[f64], y: &mut [f64]) {
        debug_assert_eq!(self.ncols, x.len());
        debug_assert_eq!(self.nrows, y.len());
        for col in 0..self.ncols {
            let scaled = alpha * x[col];
            if scaled == 0.0 {
                continue;
            }
            for k in self.colptr[col]..self.colptr[col + 1] {
                y[self.rowval[k]] += self.nzval[k] * scaled;
            }
        }
    }

    /// `self + alpha * other`, over the union of both patterns.
    pub fn add_scaled(&self, alpha: f64, other: &SparseMatrix<f64>) -> Result<Self> {
        if self.shape() != other.shape() {
            return model_err!(
                DimensionMismatch,
                format!("cannot add {:?} and {:?} matrices", self.shape(), other.shape())
            );
        }
        let mut columns = Vec::with_capacity(self.ncols);
        for col in 0..self.ncols {
            let mut lhs = (self.colptr[col]..self.colptr[col + 1]).peekable();
            let mut rhs = (other.colptr[col]..other.colptr[col + 1]).peekable();
            let mut column = Vec::new();
            loop {
                let entry = match (lhs.peek(), rhs.peek()) {
                    (Some(&i), Some(&j)) if self.rowval[i] == other.rowval[j] => {
                        lhs.next();
                        rhs.next();
                        (self.rowval[i], self.nzval[i] + alpha * other.nzval[j])
                    }
                    (Some(&i), Some(&j)) if self.rowval[i] < other.rowval[j] => {
                        lhs.next();
                        (self.rowval[i], self.nzval[i])
                    }
                    (Some(&i), None) => {
                        lhs.next();
                        (self.rowval[i], self.nzval[i])
                    }
                    (_, Some(&j)) => {
                        rhs.next();
                        (other.rowval[j], alpha * other.nzval[j])
                    }
                    (None, None) => break,
                };
                column.push(entry);
            }
            columns.push(column);
        }
        Ok(SparseMatrix::from_columns(self.nrows, columns))
    }

    pub fn scale(&self, alpha: f64) -> Self {
        self.map(|v| alpha * v)
    }
}

/// Extracts, for each expression (one per row), the coefficient of
/// `target` after treating every symbol in `base` as a variable: the
/// expression is differentiated with the joint differential operator for
/// `target`, and the part constant in `base` is kept.  `None` selects the
/// constant offset itself.  Returns the nonzero coefficients and their
/// row indices.
pub fn extract_coefficients(
    table: &mut SymbolTable,
    exprs: &[Expr],
    target: Option<&Expr>,
    base: &[Symbol],
) -> Result<(Vec<Expr>, Vec<usize>)> {
    let expanded: Vec<Expr> = exprs.iter().map(|e| e.expand()).collect();
    let column = extract_column(table, &expanded, target, base)?;
    Ok(column.into_iter().map(|(row, e)| (e, row)).unzip())
}

// exprs must already be expanded
fn extract_column(
    table: &mut SymbolTable,
    exprs: &[Expr],
    target: Option<&Expr>,
    base: &[Symbol],
) -> Result<Vec<(usize, Expr)>> {
    let differential = match target {
        None => None,
        Some(t) if t.is_zero() => None,
        Some(t) if t.as_const().is_some() => {
            return sym_err!(
                UnsupportedExpression,
                "coefficient target must be a monomial or zero".to_owned()
            );
        }
        Some(t) => Some(Differential::for_term(table, t)?),
    };

    let mut column = Vec::new();
    for (row, e) in exprs.iter().enumerate() {
        let derivative = match differential {
            Some(ref d) => d.apply(e),
            None => e.clone(),
        };
        let coeff = constant_part(&derivative, base);
        if !coeff.is_zero() {
            column.push((row, coeff));
        }
    }
    Ok(column)
}

/// Assembles the sparse matrix whose column `j` holds the coefficients
/// of `vars[j]` in `exprs`.
pub fn build_sparse_matrix(
    table: &mut SymbolTable,
    exprs: &[Expr],
    vars: &[Expr],
    base: &[Symbol],
) -> Result<SparseMatrix<Expr>> {
    let expanded: Vec<Expr> = exprs.iter().map(|e| e.expand()).collect();
    let mut columns = Vec::with_capacity(vars.len());
    for var in vars {
        columns.push(extract_column(table, &expanded, Some(var), base)?);
    }
    Ok(SparseMatrix::from_columns(exprs.len(), columns))
}
