// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use float_cmp::approx_eq;

use crate::codegen::BilinearMatrices;
use crate::common::Result;
use crate::model_err;
use crate::sparse::SparseMatrix;

/// Continuous-time bilinear dynamics `ydot = A y + B u + sum_k u_k C_k y + D`.
#[cfg_attr(feature = "debug-derive", derive(Debug))]
#[derive(Clone, PartialEq)]
pub struct BilinearModel {
    a: SparseMatrix<f64>,
    b: SparseMatrix<f64>,
    c: Vec<SparseMatrix<f64>>,
    d: SparseMatrix<f64>,
}

impl BilinearModel {
    pub fn new(
        a: SparseMatrix<f64>,
        b: SparseMatrix<f64>,
        c: Vec<SparseMatrix<f64>>,
        d: SparseMatrix<f64>,
    ) -> Result<Self> {
        let n = a.nrows;
        if a.ncols != n {
            return model_err!(DimensionMismatch, format!("A is {:?}, not square", a.shape()));
        }
        if b.nrows != n {
            return model_err!(
                DimensionMismatch,
                format!("B has {} rows but A has {}", b.nrows, n)
            );
        }
        if c.len() != b.ncols {
            return model_err!(
                DimensionMismatch,
                format!("{} C matrices for {} controls", c.len(), b.ncols)
            );
        }
        for (k, ck) in c.iter().enumerate() {
            if ck.shape() != a.shape() {
                return model_err!(
                    DimensionMismatch,
                    format!("C[{k}] is {:?} but A is {:?}", ck.shape(), a.shape())
                );
            }
        }
        if d.shape() != (n, 1) {
            return model_err!(
                DimensionMismatch,
                format!("D is {:?}, expected ({n}, 1)", d.shape())
            );
        }
        Ok(BilinearModel { a, b, c, d })
    }

    pub fn from_matrices(matrices: BilinearMatrices) -> Result<Self> {
        BilinearModel::new(matrices.a, matrices.b, matrices.c, matrices.d)
    }

    /// Lifted state dimension.
    pub fn n(&self) -> usize {
        self.a.nrows
    }

    /// Number of controls.
    pub fn m(&self) -> usize {
        self.b.ncols
    }

    fn check_lengths(&self, y: &[f64], u: &[f64], out: &[f64]) -> Result<()> {
        if y.len() != self.n() || out.len() != self.n() || u.len() != self.m() {
            return model_err!(
                DimensionMismatch,
                format!(
                    "expected state and output of length {} and {} controls",
                    self.n(),
                    self.m()
                )
            );
        }
        Ok(())
    }

    /// Writes `A y + B u + sum_k u_k C_k y + D` into `ydot`.
    pub fn dynamics(&self, y: &[f64], u: &[f64], ydot: &mut [f64]) -> Result<()> {
        self.check_lengths(y, u, ydot)?;
        ydot.fill(0.0);
        for (row, _, value) in self.d.iter() {
            ydot[row] = *value;
        }
        self.a.mul_vec_add(1.0, y, ydot);
        self.b.mul_vec_add(1.0, u, ydot);
        for (ck, uk) in self.c.iter().zip(u.iter()) {
            ck.mul_vec_add(*uk, y, ydot);
        }
        Ok(())
    }

    /// Explicit Euler discretization with step `dt`.
    pub fn discretize(&self, dt: f64) -> Result<DiscreteBilinearModel> {
        if !(dt > 0.0 && dt.is_finite()) {
            return model_err!(Generic, format!("time step must be positive, got {dt}"));
        }
        let a = SparseMatrix::identity(self.n()).add_scaled(dt, &self.a)?;
        let model = BilinearModel {
            a,
            b: self.b.scale(dt),
            c: self.c.iter().map(|c| c.scale(dt)).collect(),
            d: self.d.scale(dt),
        };
        Ok(DiscreteBilinearModel { model, dt })
    }
}

/// Discrete-time bilinear dynamics
/// `y[k+1] = A_d y + B_d u + sum_k u_k C_d,k y + D_d` for a fixed step.
#[cfg_attr(feature = "debug-derive", derive(Debug))]
#[derive(Clone, PartialEq)]
pub struct DiscreteBilinearModel {
    model: BilinearModel,
    dt: f64,
}

impl DiscreteBilinearModel {
    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn n(&self) -> usize {
        self.model.n()
    }

    pub fn m(&self) -> usize {
        self.model.m()
    }

    pub fn step(&self, y: &[f64], u: &[f64], dt: f64, next: &mut [f64]) -> Result<()> {
        if !approx_eq!(f64, dt, self.dt) {
            return model_err!(
                TimestepMismatch,
                format!("model was discretized with dt={} but called with dt={}", self.dt, dt)
            );
        }
        self.model.dynamics(y, u, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;

    fn sparse(rows: &[&[f64]]) -> SparseMatrix<f64> {
        let rows: Vec<Vec<f64>> = rows.iter().map(|r| r.to_vec()).collect();
        SparseMatrix::from_dense(&rows).unwrap()
    }

    fn model() -> BilinearModel {
        BilinearModel::new(
            sparse(&[&[0.0, 1.0], &[-2.0, 0.0]]),
            sparse(&[&[0.0], &[1.0]]),
            vec![sparse(&[&[0.0, 0.0], &[0.0, -0.5]])],
            sparse(&[&[0.0], &[3.0]]),
        )
        .unwrap()
    }

    #[test]
    fn test_dynamics() {
        let m = model();
        let mut ydot = [0.0; 2];
        m.dynamics(&[1.0, 2.0], &[4.0], &mut ydot).unwrap();
        // [2, -2 + 4 - 0.5*4*2 + 3]
        assert_eq!([2.0, 1.0], ydot);
    }

    #[test]
    fn test_shape_checks() {
        let a = sparse(&[&[0.0, 1.0], &[-2.0, 0.0]]);
        let d = sparse(&[&[0.0], &[3.0]]);
        let err = BilinearModel::new(a.clone(), sparse(&[&[1.0]]), vec![a.clone()], d.clone())
            .unwrap_err();
        assert_eq!(ErrorCode::DimensionMismatch, err.code);

        let b = sparse(&[&[0.0], &[1.0]]);
        let err = BilinearModel::new(a.clone(), b.clone(), vec![], d.clone()).unwrap_err();
        assert_eq!(ErrorCode::DimensionMismatch, err.code);

        let err = BilinearModel::new(a.clone(), b.clone(), vec![sparse(&[&[1.0]])], d).unwrap_err();
        assert_eq!(ErrorCode::DimensionMismatch, err.code);

        let err = BilinearModel::new(a.clone(), b, vec![a.clone()], a).unwrap_err();
        assert_eq!(ErrorCode::DimensionMismatch, err.code);

        let mut out = [0.0; 2];
        let err = model().dynamics(&[1.0], &[0.0], &mut out).unwrap_err();
        assert_eq!(ErrorCode::DimensionMismatch, err.code);
    }

    #[test]
    fn test_euler_step() {
        let m = model();
        let dt = 0.1;
        let discrete = m.discretize(dt).unwrap();
        let (y, u) = ([1.0, 2.0], [4.0]);

        let mut ydot = [0.0; 2];
        m.dynamics(&y, &u, &mut ydot).unwrap();
        let mut next = [0.0; 2];
        discrete.step(&y, &u, dt, &mut next).unwrap();
        for i in 0..2 {
            assert!(approx_eq!(f64, y[i] + dt * ydot[i], next[i], epsilon = 1e-12));
        }

        let err = discrete.step(&y, &u, 0.2, &mut next).unwrap_err();
        assert_eq!(ErrorCode::TimestepMismatch, err.code);
        assert_eq!(ErrorCode::Generic, m.discretize(0.0).unwrap_err().code);
    }
}
