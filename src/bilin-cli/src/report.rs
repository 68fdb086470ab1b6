// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use bilin_engine::{CodegenOptions, Expr, MatrixUpdater, SparseMatrix, StateExpander, SymbolTable};

use crate::model::Derived;

/// Numeric matrices at a single linearization point.
#[derive(Debug, Serialize)]
pub struct NumericReport {
    pub at: Vec<f64>,
    /// Lifted state evaluated at `at`.
    pub lifted: Vec<f64>,
    pub a: SparseMatrix<f64>,
    pub b: SparseMatrix<f64>,
    pub c: Vec<SparseMatrix<f64>>,
    pub d: SparseMatrix<f64>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub n0: usize,
    pub n: usize,
    pub m: usize,
    pub order: u32,
    pub states: Vec<String>,
    pub controls: Vec<String>,
    pub linearization_point: Vec<String>,
    pub lifted: Vec<String>,
    pub a: SparseMatrix<String>,
    pub b: SparseMatrix<String>,
    pub c: Vec<SparseMatrix<String>>,
    pub d: SparseMatrix<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericReport>,
}

fn symbolic(table: &SymbolTable, m: &SparseMatrix<Expr>) -> SparseMatrix<String> {
    m.map(|e| e.display(table).to_string())
}

impl Report {
    pub fn symbolic(derived: &Derived) -> Report {
        let table = &derived.table;
        let bl = &derived.dynamics;
        let labels = |syms: &[bilin_engine::Symbol]| {
            syms.iter()
                .map(|s| table.label(*s).to_string())
                .collect::<Vec<_>>()
        };
        Report {
            n0: bl.n0,
            n: bl.n,
            m: bl.m,
            order: bl.order,
            states: labels(&bl.states),
            controls: labels(&bl.controls),
            linearization_point: labels(&bl.x0),
            lifted: bl
                .lifted
                .iter()
                .map(|e| e.display(table).to_string())
                .collect(),
            a: symbolic(table, &bl.a),
            b: symbolic(table, &bl.b),
            c: bl.c.iter().map(|c| symbolic(table, c)).collect(),
            d: symbolic(table, &bl.d),
            numeric: None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing report")
    }
}

impl NumericReport {
    /// Compiles the derivation's evaluators and fills every matrix at `at`.
    pub fn at(derived: &Derived, at: &[f64]) -> Result<NumericReport> {
        let bl = &derived.dynamics;
        if at.len() != bl.n0 {
            bail!(
                "linearization point has {} values but the model has {} states",
                at.len(),
                bl.n0
            );
        }
        let options = CodegenOptions {
            bindings: derived.bindings.clone(),
        };
        let updater = MatrixUpdater::new(bl, &options)?;
        let expander = StateExpander::new(bl, &options)?;

        let mut matrices = updater.zeros();
        updater.update_all(at, &mut matrices)?;
        let mut lifted = vec![0.0; expander.n()];
        expander.expand(at, &mut lifted)?;

        Ok(NumericReport {
            at: at.to_vec(),
            lifted,
            a: matrices.a,
            b: matrices.b,
            c: matrices.c,
            d: matrices.d,
        })
    }
}

/// Writes `report` to `output`, or to stdout when no path is given.
pub fn write_report(report: &Report, output: Option<&Path>) -> Result<()> {
    let json = report.to_json()?;
    match output {
        Some(path) => fs::write(path, json + "\n")
            .with_context(|| format!("writing report to '{}'", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}
