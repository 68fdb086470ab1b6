// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError, // will never be produced
    Generic,
    // symbolic derivation
    UnsupportedExpression,
    DimensionMismatch,
    CompoundIndependentVariable,
    BadOrder,
    EmptyState,
    DuplicateSymbol,
    UnknownSymbol,
    // code generation and numeric evaluation
    PatternMismatch,
    TimestepMismatch,
    // equation parsing
    InvalidToken,
    UnrecognizedEof,
    UnrecognizedToken,
    ExtraToken,
    ExpectedNumber,
    UnknownBuiltin,
    BadBuiltinArgs,
    BadIndex,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            Generic => "generic",
            UnsupportedExpression => "unsupported_expression",
            DimensionMismatch => "dimension_mismatch",
            CompoundIndependentVariable => "compound_independent_variable",
            BadOrder => "bad_order",
            EmptyState => "empty_state",
            DuplicateSymbol => "duplicate_symbol",
            UnknownSymbol => "unknown_symbol",
            PatternMismatch => "pattern_mismatch",
            TimestepMismatch => "timestep_mismatch",
            InvalidToken => "invalid_token",
            UnrecognizedEof => "unrecognized_eof",
            UnrecognizedToken => "unrecognized_token",
            ExtraToken => "extra_token",
            ExpectedNumber => "expected_number",
            UnknownBuiltin => "unknown_builtin",
            BadBuiltinArgs => "bad_builtin_args",
            BadIndex => "bad_index",
        };

        write!(f, "{name}")
    }
}

/// A syntax error in an equation, with the byte span it covers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EquationError {
    pub start: u16,
    pub end: u16,
    pub code: ErrorCode,
}

impl fmt::Display for EquationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.end, self.code)
    }
}

impl error::Error for EquationError {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Import,
    Model,
    Symbolic,
    Codegen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl From<EquationError> for Error {
    fn from(err: EquationError) -> Self {
        Error {
            kind: ErrorKind::Import,
            code: err.code,
            details: Some(format!("at {}..{}", err.start, err.end)),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Import => "ImportError",
            ErrorKind::Model => "ModelError",
            ErrorKind::Symbolic => "SymbolicError",
            ErrorKind::Codegen => "CodegenError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;
pub type EquationResult<T> = result::Result<T, EquationError>;

#[macro_export]
macro_rules! sym_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Symbolic, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Symbolic, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! gen_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Codegen, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Codegen, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! model_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Model,
            ErrorCode::$code,
            Some($str),
        ))
    }}
);

#[macro_export]
macro_rules! eqn_err(
    ($code:tt, $start:expr, $end:expr) => {{
        use $crate::common::{EquationError, ErrorCode};
        Err(EquationError{ start: $start as u16, end: $end as u16, code: ErrorCode::$code})
    }}
);

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Symbolic,
        ErrorCode::UnsupportedExpression,
        Some("x^0.5".to_string()),
    );
    assert_eq!("SymbolicError{unsupported_expression: x^0.5}", format!("{err}"));

    let err = Error::new(ErrorKind::Codegen, ErrorCode::PatternMismatch, None);
    assert_eq!("CodegenError{pattern_mismatch}", format!("{err}"));
}

#[test]
fn test_equation_error_conversion() {
    let err: Error = EquationError {
        start: 3,
        end: 5,
        code: ErrorCode::UnknownBuiltin,
    }
    .into();
    assert_eq!(ErrorKind::Import, err.kind);
    assert_eq!(ErrorCode::UnknownBuiltin, err.code);
    assert_eq!(Some("at 3..5".to_string()), err.get_details());
}
