// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! JSON model files and the derivation driven from them.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::info;

use bilin_engine::{
    BilinearizeOptions, Expr, ExprDynamics, Symbol, SymbolTable, SymbolicBilinearDynamics,
    bilinearize, parse_equation,
};

fn default_time() -> String {
    "t".to_owned()
}

/// A dynamics model as written on disk:
///
/// ```json
/// {
///   "states": ["theta", "omega"],
///   "controls": ["torque"],
///   "time": "t",
///   "order": 3,
///   "constants": {"g": 9.81},
///   "equations": ["omega", "-g*sin(theta) + torque"]
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelFile {
    pub states: Vec<String>,
    #[serde(default)]
    pub controls: Vec<String>,
    #[serde(default = "default_time")]
    pub time: String,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub constants: BTreeMap<String, f64>,
    pub equations: Vec<String>,
}

impl ModelFile {
    pub fn open(path: &Path) -> Result<ModelFile> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading model '{}'", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing model '{}'", path.display()))
    }
}

/// The output of a derivation plus what's needed to print and evaluate it.
#[derive(Debug)]
pub struct Derived {
    pub table: SymbolTable,
    pub dynamics: SymbolicBilinearDynamics,
    pub bindings: HashMap<Symbol, f64>,
}

fn declare_all(table: &mut SymbolTable, names: &[String], what: &str) -> Result<Vec<Symbol>> {
    names
        .iter()
        .map(|name| {
            table
                .declare(name)
                .with_context(|| format!("declaring {what} '{name}'"))
        })
        .collect()
}

/// Declares every symbol in the model, parses its equations and
/// bilinearizes them.  `order` overrides the order in the file.
pub fn derive(model: &ModelFile, order: Option<u32>) -> Result<Derived> {
    if model.equations.len() != model.states.len() {
        bail!(
            "{} equations given for {} states",
            model.equations.len(),
            model.states.len()
        );
    }

    let mut table = SymbolTable::new();
    let states = declare_all(&mut table, &model.states, "state")?;
    let controls = declare_all(&mut table, &model.controls, "control")?;
    let time = declare_all(&mut table, std::slice::from_ref(&model.time), "time variable")?;
    let mut bindings = HashMap::new();
    let mut constants = Vec::with_capacity(model.constants.len());
    for (name, value) in model.constants.iter() {
        let sym = table
            .declare(name)
            .with_context(|| format!("declaring constant '{name}'"))?;
        bindings.insert(sym, *value);
        constants.push(sym);
    }

    let equations = model
        .equations
        .iter()
        .zip(model.states.iter())
        .map(|(text, state)| {
            parse_equation(text, &table)
                .with_context(|| format!("equation for '{state}': `{text}`"))
        })
        .collect::<Result<Vec<Expr>>>()?;

    let options = BilinearizeOptions {
        order: order.or(model.order).unwrap_or(BilinearizeOptions::default().order),
        constants,
    };
    info!(
        states = states.len(),
        controls = controls.len(),
        order = options.order,
        "deriving bilinear form"
    );

    let dynamics = ExprDynamics::new(&states, &controls, equations);
    let dynamics = bilinearize(
        &mut table,
        &dynamics,
        &states,
        &controls,
        &Expr::var(time[0]),
        &options,
    )?;

    Ok(Derived {
        table,
        dynamics,
        bindings,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use bilin_engine::ErrorCode;

    use super::*;

    pub(crate) const PENDULUM: &str = r#"{
        "states": ["theta", "omega"],
        "controls": ["torque"],
        "order": 2,
        "constants": {"g": 9.81},
        "equations": ["omega", "-g*sin(theta) + torque"]
    }"#;

    pub(crate) fn pendulum() -> ModelFile {
        serde_json::from_str(PENDULUM).unwrap()
    }

    #[test]
    fn test_open() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PENDULUM.as_bytes()).unwrap();
        let model = ModelFile::open(file.path()).unwrap();
        assert_eq!(pendulum(), model);
        assert_eq!("t", model.time);
        assert_eq!(Some(2), model.order);
    }

    #[test]
    fn test_open_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = ModelFile::open(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("reading model"));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#"{"states": ["x"], "equations": ["x"], "extra": 1}"#).unwrap();
        let err = ModelFile::open(&bad).unwrap_err();
        assert!(format!("{err:#}").contains("parsing model"));
    }

    #[test]
    fn test_derive() {
        let derived = derive(&pendulum(), None).unwrap();
        let bl = &derived.dynamics;
        assert_eq!((2, 5, 1), (bl.n0, bl.n, bl.m));
        assert_eq!(2, bl.order);
        assert_eq!(1, derived.bindings.len());

        let derived = derive(&pendulum(), Some(1)).unwrap();
        assert_eq!(2, derived.dynamics.n);
    }

    #[test]
    fn test_derive_errors() {
        let mut model = pendulum();
        model.equations[1] = "-g*sin(theta) + tourque".to_owned();
        let err = derive(&model, None).unwrap_err();
        assert!(format!("{err:#}").contains("equation for 'omega'"));

        let mut model = pendulum();
        model.controls = vec!["omega".to_owned()];
        let err = derive(&model, None).unwrap_err();
        let code = err.downcast_ref::<bilin_engine::Error>().map(|e| e.code);
        assert_eq!(Some(ErrorCode::DuplicateSymbol), code);

        let mut model = pendulum();
        model.equations.pop();
        assert!(derive(&model, None).is_err());

        let err = derive(&pendulum(), Some(0)).unwrap_err();
        let code = err.downcast_ref::<bilin_engine::Error>().map(|e| e.code);
        assert_eq!(Some(ErrorCode::BadOrder), code);
    }
}
