// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use super::*;
use crate::common::{EquationError, ErrorCode};
use crate::symbol::Symbol;

struct Fixture {
    table: SymbolTable,
    x: Vec<Symbol>,
    u: Symbol,
    g: Symbol,
}

fn fixture() -> Fixture {
    let mut table = SymbolTable::new();
    let x = table.vector("x", 2);
    let u = table.scalar("u");
    let g = table.scalar("g");
    Fixture { table, x, u, g }
}

fn parse(f: &Fixture, text: &str) -> Expr {
    parse_equation(text, &f.table).unwrap()
}

fn parse_err(f: &Fixture, text: &str) -> EquationError {
    parse_equation(text, &f.table).unwrap_err()
}

#[test]
fn test_pendulum() {
    let f = fixture();
    let (x1, x2) = (Expr::var(f.x[0]), Expr::var(f.x[1]));
    let expected = Expr::neg(Expr::var(f.g) * Expr::app(Func::Sin, vec![x1]))
        + Expr::var(f.u) * x2;
    assert_eq!(expected, parse(&f, "-g*sin(x[1]) + u*x[2]"));
}

#[test]
fn test_precedence() {
    let f = fixture();
    let u = Expr::var(f.u);
    let g = Expr::var(f.g);

    // unary minus binds looser than ^
    assert_eq!(Expr::neg(Expr::powi(u.clone(), 2)), parse(&f, "-u^2"));
    // ^ is right associative
    assert_eq!(
        Expr::pow(g.clone(), Expr::pow(u.clone(), Expr::constant(2.0))),
        parse(&f, "g^u^2")
    );
    assert_eq!(Expr::powi(g.clone(), -1), parse(&f, "g^-1"));
    assert_eq!(Expr::powi(g.clone(), 3), parse(&f, "g**3"));
    // * and / are left associative
    assert_eq!(
        Expr::div(g.clone() * u.clone(), Expr::constant(2.0)),
        parse(&f, "g*u/2")
    );
    assert_eq!(
        (g.clone() + u.clone()) * g.clone(),
        parse(&f, "(g + u) * g")
    );
    assert_eq!(g.clone() - u.clone() - g.clone(), parse(&f, "g - u - g"));
}

#[test]
fn test_numbers() {
    let f = fixture();
    assert_eq!(Expr::constant(0.0015), parse(&f, "1.5e-3"));
    assert_eq!(Expr::constant(0.5), parse(&f, "1/2"));
}

#[test]
fn test_errors() {
    let f = fixture();
    let cases: &[(&str, ErrorCode, u16, u16)] = &[
        ("", ErrorCode::UnrecognizedEof, 0, 1),
        ("g +", ErrorCode::UnrecognizedEof, 3, 4),
        ("g g", ErrorCode::ExtraToken, 2, 3),
        ("q * g", ErrorCode::UnknownSymbol, 0, 1),
        ("x[3]", ErrorCode::UnknownSymbol, 0, 4),
        ("x[0]", ErrorCode::BadIndex, 2, 3),
        ("x[1.5]", ErrorCode::BadIndex, 2, 5),
        ("frob(g)", ErrorCode::UnknownBuiltin, 0, 4),
        ("sin(g, u)", ErrorCode::BadBuiltinArgs, 0, 9),
        ("(g", ErrorCode::UnrecognizedEof, 2, 3),
        (")", ErrorCode::UnrecognizedToken, 0, 1),
        ("e.", ErrorCode::UnknownSymbol, 0, 1),
        ("g ? u", ErrorCode::InvalidToken, 2, 3),
    ];
    for (text, code, start, end) in cases.iter().cloned() {
        let err = parse_err(&f, text);
        assert_eq!(EquationError { start, end, code }, err, "{text}");
    }
}

#[test]
fn test_dummies_are_not_addressable() {
    let mut f = fixture();
    let dummy = f.table.fresh("x");
    let label = f.table.label(dummy).to_string();
    let err = parse_err(&f, &label);
    assert_eq!(ErrorCode::UnknownSymbol, err.code);
}
