// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Hand-written recursive descent parser for dynamics equations.
//!
//! Identifiers are resolved against a [`SymbolTable`] while parsing, so the
//! result is a canonical [`Expr`] rather than an intermediate AST.

use crate::builtins::Func;
use crate::common::EquationResult;
use crate::eqn_err;
use crate::expr::Expr;
use crate::symbol::SymbolTable;
use crate::token::{Lexer, Spanned, Token};

#[cfg(test)]
mod tests;

/// TokenKind discriminant for efficient peek comparisons without payload matching
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    Exp,
    Plus,
    Minus,
    Mul,
    Div,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Ident,
    Num,
}

impl<'a> From<&Token<'a>> for TokenKind {
    fn from(token: &Token<'a>) -> Self {
        match token {
            Token::Exp => TokenKind::Exp,
            Token::Plus => TokenKind::Plus,
            Token::Minus => TokenKind::Minus,
            Token::Mul => TokenKind::Mul,
            Token::Div => TokenKind::Div,
            Token::LParen => TokenKind::LParen,
            Token::RParen => TokenKind::RParen,
            Token::LBracket => TokenKind::LBracket,
            Token::RBracket => TokenKind::RBracket,
            Token::Comma => TokenKind::Comma,
            Token::Ident(_) => TokenKind::Ident,
            Token::Num(_) => TokenKind::Num,
        }
    }
}

struct Parser<'input, 'table> {
    tokens: Vec<Spanned<Token<'input>>>,
    pos: usize,
    table: &'table SymbolTable,
}

impl<'input, 'table> Parser<'input, 'table> {
    fn new(lexer: Lexer<'input>, table: &'table SymbolTable) -> EquationResult<Self> {
        let mut tokens = Vec::new();
        for result in lexer {
            tokens.push(result?);
        }
        Ok(Parser {
            tokens,
            pos: 0,
            table,
        })
    }

    fn peek(&self) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|(_, tok, _)| TokenKind::from(tok))
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens
            .get(self.pos + offset)
            .map(|(_, tok, _)| TokenKind::from(tok))
    }

    /// Advance to the next token and return the consumed token
    fn advance(&mut self) -> Option<Spanned<Token<'input>>> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eof_position(&self) -> usize {
        if let Some((_, _, end)) = self.tokens.last() {
            *end
        } else {
            0
        }
    }

    /// An error for the current token, or for end of input if there are
    /// no tokens left.
    fn unexpected<T>(&self) -> EquationResult<T> {
        match self.peek() {
            Some((start, _, end)) => eqn_err!(UnrecognizedToken, *start, *end),
            None => {
                let pos = self.eof_position();
                eqn_err!(UnrecognizedEof, pos, pos + 1)
            }
        }
    }

    /// Expect the current token to match the expected kind, returning an error if not
    fn expect(&mut self, expected: TokenKind) -> EquationResult<Spanned<Token<'input>>> {
        if self.peek_kind() == Some(expected) {
            match self.advance() {
                Some(tok) => Ok(tok),
                None => self.unexpected(),
            }
        } else {
            self.unexpected()
        }
    }

    fn parse_equation(&mut self) -> EquationResult<Expr> {
        let (expr, _) = self.parse_additive()?;
        if let Some((start, _, end)) = self.peek() {
            return eqn_err!(ExtraToken, *start, *end);
        }
        Ok(expr)
    }

    // each parse_* returns the expression and the end of its span

    /// Parse additive operators (+, -)
    fn parse_additive(&mut self) -> EquationResult<(Expr, usize)> {
        let (mut left, mut end) = self.parse_multiplicative()?;
        loop {
            let negate = match self.peek_kind() {
                Some(TokenKind::Plus) => false,
                Some(TokenKind::Minus) => true,
                _ => break,
            };
            self.advance();
            let (right, rpos) = self.parse_multiplicative()?;
            left = if negate {
                Expr::sub(left, right)
            } else {
                Expr::add(vec![left, right])
            };
            end = rpos;
        }
        Ok((left, end))
    }

    /// Parse multiplicative operators (*, /)
    fn parse_multiplicative(&mut self) -> EquationResult<(Expr, usize)> {
        let (mut left, mut end) = self.parse_unary()?;
        loop {
            let divide = match self.peek_kind() {
                Some(TokenKind::Mul) => false,
                Some(TokenKind::Div) => true,
                _ => break,
            };
            self.advance();
            let (right, rpos) = self.parse_unary()?;
            left = if divide {
                Expr::div(left, right)
            } else {
                Expr::mul(vec![left, right])
            };
            end = rpos;
        }
        Ok((left, end))
    }

    /// Parse unary operators (+, -)
    fn parse_unary(&mut self) -> EquationResult<(Expr, usize)> {
        match self.peek_kind() {
            Some(TokenKind::Plus) => {
                self.advance();
                self.parse_exponentiation()
            }
            Some(TokenKind::Minus) => {
                self.advance();
                let (operand, end) = self.parse_exponentiation()?;
                Ok((Expr::neg(operand), end))
            }
            _ => self.parse_exponentiation(),
        }
    }

    /// Parse exponentiation (^, **), which is right associative and binds
    /// tighter than unary minus: `-x^2` is `-(x^2)`, `2^-1` is `2^(-1)`
    fn parse_exponentiation(&mut self) -> EquationResult<(Expr, usize)> {
        let (base, end) = self.parse_app()?;
        if self.peek_kind() != Some(TokenKind::Exp) {
            return Ok((base, end));
        }
        self.advance();
        let (exp, end) = self.parse_unary()?;
        Ok((Expr::pow(base, exp), end))
    }

    /// Parse function application: id(args)
    fn parse_app(&mut self) -> EquationResult<(Expr, usize)> {
        if self.peek_kind() != Some(TokenKind::Ident) || self.peek_kind_at(1) != Some(TokenKind::LParen) {
            return self.parse_atom();
        }
        let (lpos, name, name_end) = match self.advance() {
            Some((lpos, Token::Ident(name), end)) => (lpos, name, end),
            _ => return self.unexpected(),
        };
        self.advance(); // consume '('
        let args = self.parse_args()?;
        let (_, _, rpos) = self.expect(TokenKind::RParen)?;

        let func = match Func::from_name(name) {
            Some(func) => func,
            None => return eqn_err!(UnknownBuiltin, lpos, name_end),
        };
        if args.len() != func.arity() {
            return eqn_err!(BadBuiltinArgs, lpos, rpos);
        }
        Ok((Expr::app(func, args), rpos))
    }

    fn parse_args(&mut self) -> EquationResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek_kind() == Some(TokenKind::RParen) {
            return Ok(args);
        }
        args.push(self.parse_additive()?.0);
        while self.peek_kind() == Some(TokenKind::Comma) {
            self.advance(); // consume ','
            args.push(self.parse_additive()?.0);
        }
        Ok(args)
    }

    /// Parse an atomic expression (number, identifier, element reference,
    /// parenthesized expression)
    fn parse_atom(&mut self) -> EquationResult<(Expr, usize)> {
        match self.peek() {
            Some(&(lpos, Token::Num(s), rpos)) => {
                self.advance();
                match s.parse::<f64>() {
                    Ok(n) => Ok((Expr::constant(n), rpos)),
                    Err(_) => eqn_err!(ExpectedNumber, lpos, rpos),
                }
            }
            Some(&(lpos, Token::Ident(name), rpos)) => {
                self.advance();
                if self.peek_kind() == Some(TokenKind::LBracket) {
                    return self.parse_element(name, lpos);
                }
                match self.table.lookup(name) {
                    Some(sym) => Ok((Expr::var(sym), rpos)),
                    None => eqn_err!(UnknownSymbol, lpos, rpos),
                }
            }
            Some(&(_, Token::LParen, _)) => {
                self.advance(); // consume '('
                let (expr, _) = self.parse_additive()?;
                let (_, _, rpos) = self.expect(TokenKind::RParen)?;
                Ok((expr, rpos))
            }
            _ => self.unexpected(),
        }
    }

    /// Parse an array element reference: `name[i]` with a literal 1-based
    /// index.
    fn parse_element(&mut self, name: &str, lpos: usize) -> EquationResult<(Expr, usize)> {
        self.advance(); // consume '['
        let (ipos, index, iend) = self.expect(TokenKind::Num)?;
        let (_, _, rpos) = self.expect(TokenKind::RBracket)?;

        let index = match index {
            Token::Num(s) => s.parse::<u32>().ok().filter(|i| *i >= 1),
            _ => None,
        };
        let Some(index) = index else {
            return eqn_err!(BadIndex, ipos, iend);
        };
        match self.table.lookup_indexed(name, index) {
            Some(sym) => Ok((Expr::var(sym), rpos)),
            None => eqn_err!(UnknownSymbol, lpos, rpos),
        }
    }
}

/// Parses `text` into an expression whose identifiers all name symbols
/// already present in `table`.
pub fn parse_equation(text: &str, table: &SymbolTable) -> EquationResult<Expr> {
    let lexer = Lexer::new(text);
    let mut parser = Parser::new(lexer, table)?;
    parser.parse_equation()
}
