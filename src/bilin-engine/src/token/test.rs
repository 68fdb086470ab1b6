// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use super::ErrorCode::*;
use super::Token::*;
use super::{EquationError, ErrorCode, Lexer, Token};

// straight from LALRPOP
fn test(input: &str, expected: Vec<(&str, Token)>) {
    let tokenizer = Lexer::new(input);
    let len = expected.len();
    for (token, (expected_span, expected_tok)) in tokenizer.zip(expected.into_iter()) {
        let expected_start = expected_span.find('~').unwrap();
        let expected_end = expected_span.rfind('~').unwrap() + 1;
        assert_eq!(Ok((expected_start, expected_tok, expected_end)), token);
    }

    let tokenizer = Lexer::new(input);
    assert_eq!(None, tokenizer.skip(len).next());
}

fn test_err(input: &str, expected: (&str, ErrorCode)) {
    let tokenizer = Lexer::new(input);
    let token = tokenizer.into_iter().last().unwrap();
    let (expected_span, expected_code) = expected;
    let expected_start = expected_span.find('~').unwrap();
    let expected_end = expected_span.rfind('~').unwrap() + 1;
    let expected_err = EquationError {
        start: expected_start as u16,
        end: expected_end as u16,
        code: expected_code,
    };
    assert_eq!(Err(expected_err), token);
}

#[test]
fn negative_num() {
    test("-3", vec![("~ ", Minus), (" ~", Num("3"))]);
}

#[test]
fn pendulum() {
    test(
        "-g*sin(x[1]) + u[1]",
        vec![
            ("~                  ", Minus),
            (" ~                 ", Ident("g")),
            ("  ~                ", Mul),
            ("   ~~~             ", Ident("sin")),
            ("      ~            ", LParen),
            ("       ~           ", Ident("x")),
            ("        ~          ", LBracket),
            ("         ~         ", Num("1")),
            ("          ~        ", RBracket),
            ("           ~       ", RParen),
            ("             ~     ", Plus),
            ("               ~   ", Ident("u")),
            ("                ~  ", LBracket),
            ("                 ~ ", Num("1")),
            ("                  ~", RBracket),
        ],
    );
}

#[test]
fn powers() {
    test(
        "x^2 / y**0.5",
        vec![
            ("~           ", Ident("x")),
            (" ~          ", Exp),
            ("  ~         ", Num("2")),
            ("    ~       ", Div),
            ("      ~     ", Ident("y")),
            ("       ~~   ", Exp),
            ("         ~~~", Num("0.5")),
        ],
    );
}

#[test]
fn numbers() {
    test("1.5e-3", vec![("~~~~~~", Num("1.5e-3"))]);
    test(".25", vec![("~~~", Num(".25"))]);
    test("3E2", vec![("~~~", Num("3E2"))]);
}

#[test]
fn identifiers() {
    test("_omega2", vec![("~~~~~~~", Ident("_omega2"))]);
    test("θ", vec![("~~", Ident("θ"))]);
    test("a,b", vec![("~  ", Ident("a")), (" ~ ", Comma), ("  ~", Ident("b"))]);
}

#[test]
fn invalid() {
    test_err("x ?", ("  ~", InvalidToken));
    test_err("x $", ("  ~", InvalidToken));
}

#[test]
fn non_ascii_digits() {
    // U+0663 is a decimal digit outside ASCII and two bytes long
    let tokens: Vec<_> = Lexer::new("1\u{663}").collect();
    assert_eq!(
        vec![
            Ok((0, Num("1"), 1)),
            Err(EquationError {
                start: 1,
                end: 3,
                code: InvalidToken,
            }),
        ],
        tokens
    );
    test_err("x \u{663}", ("  ~~", InvalidToken));
}
