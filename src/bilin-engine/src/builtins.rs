// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use crate::expr::Expr;

/// Named scalar functions that may appear in dynamics equations.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Func {
    Abs,
    Atan,
    Cos,
    Cosh,
    Exp,
    Ln,
    Sign,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
}

const FUNC_NAMES: &[(&str, Func)] = &[
    ("abs", Func::Abs),
    ("arctan", Func::Atan),
    ("atan", Func::Atan),
    ("cos", Func::Cos),
    ("cosh", Func::Cosh),
    ("exp", Func::Exp),
    ("ln", Func::Ln),
    ("log", Func::Ln),
    ("sign", Func::Sign),
    ("sin", Func::Sin),
    ("sinh", Func::Sinh),
    ("sqrt", Func::Sqrt),
    ("tan", Func::Tan),
    ("tanh", Func::Tanh),
];

impl Func {
    pub fn from_name(name: &str) -> Option<Func> {
        let name = name.to_lowercase();
        FUNC_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, func)| *func)
    }

    pub fn name(self) -> &'static str {
        match self {
            Func::Abs => "abs",
            Func::Atan => "atan",
            Func::Cos => "cos",
            Func::Cosh => "cosh",
            Func::Exp => "exp",
            Func::Ln => "ln",
            Func::Sign => "sign",
            Func::Sin => "sin",
            Func::Sinh => "sinh",
            Func::Sqrt => "sqrt",
            Func::Tan => "tan",
            Func::Tanh => "tanh",
        }
    }

    pub fn arity(self) -> usize {
        1
    }

    #[inline(always)]
    pub fn eval(self, args: &[f64]) -> f64 {
        let a = args[0];
        match self {
            Func::Abs => a.abs(),
            Func::Atan => a.atan(),
            Func::Cos => a.cos(),
            Func::Cosh => a.cosh(),
            Func::Exp => a.exp(),
            Func::Ln => a.ln(),
            Func::Sign => {
                if a > 0.0 {
                    1.0
                } else if a < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Func::Sin => a.sin(),
            Func::Sinh => a.sinh(),
            Func::Sqrt => a.sqrt(),
            Func::Tan => a.tan(),
            Func::Tanh => a.tanh(),
        }
    }

    /// Partial derivative with respect to the `i`th argument, evaluated at
    /// `args`.
    pub fn partial(self, i: usize, args: &[Expr]) -> Expr {
        debug_assert_eq!(0, i);
        let a = args[0].clone();
        let app = |func: Func, arg: Expr| Expr::app(func, vec![arg]);
        match self {
            Func::Abs => app(Func::Sign, a),
            Func::Atan => Expr::div(Expr::one(), Expr::one() + Expr::powi(a, 2)),
            Func::Cos => Expr::neg(app(Func::Sin, a)),
            Func::Cosh => app(Func::Sinh, a),
            Func::Exp => app(Func::Exp, a),
            Func::Ln => Expr::div(Expr::one(), a),
            // piecewise constant
            Func::Sign => Expr::zero(),
            Func::Sin => app(Func::Cos, a),
            Func::Sinh => app(Func::Cosh, a),
            Func::Sqrt => Expr::div(Expr::constant(0.5), app(Func::Sqrt, a)),
            Func::Tan => Expr::one() + Expr::powi(app(Func::Tan, a), 2),
            Func::Tanh => Expr::one() - Expr::powi(app(Func::Tanh, a), 2),
        }
    }
}
