// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Symbolic expression trees.
//!
//! `Expr` values are immutable and kept in an automatically simplified
//! canonical form by the smart constructors ([`Expr::add`], [`Expr::mul`],
//! [`Expr::pow`], [`Expr::div`], [`Expr::app`]):
//!
//! - nested sums and products are flattened,
//! - numeric operands are folded, and like terms / like bases combined,
//! - operands are sorted, so structurally equal formulas compare equal.
//!
//! Constructing variants directly bypasses this and should be avoided
//! outside of this module.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops;

use ordered_float::OrderedFloat;

use crate::builtins::Func;
use crate::common::Result;
use crate::sym_err;
use crate::symbol::{Symbol, SymbolTable};

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Expr {
    Const(OrderedFloat<f64>),
    Var(Symbol),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    App(Func, Vec<Expr>),
}

impl Expr {
    pub fn constant(value: f64) -> Expr {
        // normalize -0.0 so it compares equal to 0.0
        let value = if value == 0.0 { 0.0 } else { value };
        Expr::Const(OrderedFloat(value))
    }

    pub fn zero() -> Expr {
        Expr::constant(0.0)
    }

    pub fn one() -> Expr {
        Expr::constant(1.0)
    }

    pub fn var(sym: Symbol) -> Expr {
        Expr::Var(sym)
    }

    pub fn vars(syms: &[Symbol]) -> Vec<Expr> {
        syms.iter().map(|s| Expr::Var(*s)).collect()
    }

    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(n) => Some(n.0),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Expr::Var(s) => Some(*s),
            _ => None,
        }
    }

    /// Returns the exponent if this is a whole-number constant.
    pub fn as_integer(&self) -> Option<i64> {
        match self.as_const() {
            Some(n) if n.fract() == 0.0 && n.abs() < (1u64 << 53) as f64 => Some(n as i64),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_const() == Some(0.0)
    }

    pub fn is_one(&self) -> bool {
        self.as_const() == Some(1.0)
    }

    pub fn add(terms: Vec<Expr>) -> Expr {
        let mut flat: Vec<Expr> = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Expr::Add(inner) => flat.extend(inner),
                term => flat.push(term),
            }
        }

        let mut constant = 0.0;
        let mut like_terms: BTreeMap<Expr, f64> = BTreeMap::new();
        for term in flat {
            if let Some(n) = term.as_const() {
                constant += n;
                continue;
            }
            let (coeff, body) = term.split_coefficient();
            *like_terms.entry(body).or_insert(0.0) += coeff;
        }

        let mut result: Vec<Expr> = Vec::with_capacity(like_terms.len() + 1);
        if constant != 0.0 {
            result.push(Expr::constant(constant));
        }
        for (body, coeff) in like_terms {
            if coeff == 0.0 {
                continue;
            }
            result.push(Expr::scale(coeff, body));
        }

        match result.len() {
            0 => Expr::zero(),
            1 => result.pop().unwrap(),
            _ => Expr::Add(result),
        }
    }

    pub fn mul(factors: Vec<Expr>) -> Expr {
        let mut flat: Vec<Expr> = Vec::with_capacity(factors.len());
        for factor in factors {
            match factor {
                Expr::Mul(inner) => flat.extend(inner),
                factor => flat.push(factor),
            }
        }

        let mut coeff = 1.0;
        let mut bases: BTreeMap<Expr, Vec<Expr>> = BTreeMap::new();
        for factor in flat {
            if let Some(n) = factor.as_const() {
                coeff *= n;
                continue;
            }
            let (base, exp) = match factor {
                Expr::Pow(base, exp) => (*base, *exp),
                factor => (factor, Expr::one()),
            };
            bases.entry(base).or_default().push(exp);
        }
        if coeff == 0.0 {
            return Expr::zero();
        }

        let mut result: Vec<Expr> = Vec::with_capacity(bases.len() + 1);
        let mut refold = false;
        for (base, exps) in bases {
            let exp = if exps.len() == 1 {
                exps.into_iter().next().unwrap()
            } else {
                Expr::add(exps)
            };
            match Expr::pow(base, exp) {
                Expr::Const(n) => coeff *= n.0,
                factor => {
                    // (x*y)^a * (x*y)^(1-a) collapses back to a product
                    // whose factors may combine with their neighbors
                    refold |= matches!(factor, Expr::Mul(_));
                    result.push(factor);
                }
            }
        }
        if coeff == 0.0 {
            return Expr::zero();
        }
        if refold {
            result.push(Expr::constant(coeff));
            return Expr::mul(result);
        }
        result.sort();

        if coeff != 1.0 || result.is_empty() {
            result.insert(0, Expr::constant(coeff));
        }
        match result.len() {
            1 => result.pop().unwrap(),
            _ => Expr::Mul(result),
        }
    }

    pub fn pow(base: Expr, exp: Expr) -> Expr {
        if exp.is_zero() {
            return Expr::one();
        }
        if exp.is_one() {
            return base;
        }
        if base.is_one() {
            return Expr::one();
        }
        if let (Some(b), Some(e)) = (base.as_const(), exp.as_const()) {
            let folded = b.powf(e);
            if folded.is_finite() {
                return Expr::constant(folded);
            }
        }
        if let (Expr::Pow(inner_base, inner_exp), Some(outer)) = (&base, exp.as_integer())
            && inner_exp.as_integer().is_some()
        {
            let combined = Expr::mul(vec![(**inner_exp).clone(), Expr::constant(outer as f64)]);
            return Expr::pow((**inner_base).clone(), combined);
        }
        Expr::Pow(Box::new(base), Box::new(exp))
    }

    pub fn powi(base: Expr, exp: i64) -> Expr {
        Expr::pow(base, Expr::constant(exp as f64))
    }

    pub fn div(num: Expr, den: Expr) -> Expr {
        if num.is_zero() && !den.is_zero() {
            return Expr::zero();
        }
        if den.is_one() {
            return num;
        }
        if let Some(d) = den.as_const()
            && d != 0.0
        {
            return Expr::mul(vec![Expr::constant(1.0 / d), num]);
        }
        if num == den && !den.is_zero() {
            return Expr::one();
        }
        Expr::Div(Box::new(num), Box::new(den))
    }

    pub fn app(func: Func, args: Vec<Expr>) -> Expr {
        if args.len() == func.arity() {
            let consts: Option<Vec<f64>> = args.iter().map(|a| a.as_const()).collect();
            if let Some(consts) = consts {
                let folded = func.eval(&consts);
                if folded.is_finite() {
                    return Expr::constant(folded);
                }
            }
        }
        Expr::App(func, args)
    }

    pub fn neg(expr: Expr) -> Expr {
        Expr::mul(vec![Expr::constant(-1.0), expr])
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
        Expr::add(vec![lhs, Expr::neg(rhs)])
    }

    fn scale(coeff: f64, body: Expr) -> Expr {
        if coeff == 1.0 {
            return body;
        }
        match body {
            Expr::Mul(mut factors) => {
                factors.insert(0, Expr::constant(coeff));
                Expr::Mul(factors)
            }
            body => Expr::Mul(vec![Expr::constant(coeff), body]),
        }
    }

    /// Splits a canonical term into its numeric coefficient and the rest.
    pub(crate) fn split_coefficient(self) -> (f64, Expr) {
        match self {
            Expr::Const(n) => (n.0, Expr::one()),
            Expr::Mul(mut factors) => match factors[0].as_const() {
                Some(n) => {
                    factors.remove(0);
                    let body = if factors.len() == 1 {
                        factors.pop().unwrap()
                    } else {
                        Expr::Mul(factors)
                    };
                    (n, body)
                }
                None => (1.0, Expr::Mul(factors)),
            },
            term => (1.0, term),
        }
    }

    /// The immediate operands of this node.
    pub fn operands(&self) -> Vec<&Expr> {
        match self {
            Expr::Const(_) | Expr::Var(_) => vec![],
            Expr::Add(terms) => terms.iter().collect(),
            Expr::Mul(factors) => factors.iter().collect(),
            Expr::Pow(base, exp) => vec![base, exp],
            Expr::Div(num, den) => vec![num, den],
            Expr::App(_, args) => args.iter().collect(),
        }
    }

    /// The additive terms of this expression (itself, if it isn't a sum).
    pub fn terms(&self) -> &[Expr] {
        match self {
            Expr::Add(terms) => terms,
            _ => std::slice::from_ref(self),
        }
    }

    /// The multiplicative factors of this expression (itself, if it isn't
    /// a product).
    pub fn factors(&self) -> &[Expr] {
        match self {
            Expr::Mul(factors) => factors,
            _ => std::slice::from_ref(self),
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut syms = BTreeSet::new();
        self.collect_symbols(&mut syms);
        syms
    }

    fn collect_symbols(&self, syms: &mut BTreeSet<Symbol>) {
        if let Expr::Var(s) = self {
            syms.insert(*s);
            return;
        }
        for operand in self.operands() {
            operand.collect_symbols(syms);
        }
    }

    pub fn contains_symbol(&self, sym: Symbol) -> bool {
        match self {
            Expr::Var(s) => *s == sym,
            _ => self.operands().iter().any(|e| e.contains_symbol(sym)),
        }
    }

    pub fn depends_on(&self, syms: &[Symbol]) -> bool {
        match self {
            Expr::Var(s) => syms.contains(s),
            _ => self.operands().iter().any(|e| e.depends_on(syms)),
        }
    }

    pub fn contains(&self, needle: &Expr) -> bool {
        self == needle || self.operands().iter().any(|e| e.contains(needle))
    }

    /// Rebuilds this node from new operands using the canonicalizing
    /// constructors.
    fn rebuild(&self, mut operands: Vec<Expr>) -> Expr {
        match self {
            Expr::Const(_) | Expr::Var(_) => self.clone(),
            Expr::Add(_) => Expr::add(operands),
            Expr::Mul(_) => Expr::mul(operands),
            Expr::Pow(_, _) => {
                let exp = operands.pop().unwrap();
                let base = operands.pop().unwrap();
                Expr::pow(base, exp)
            }
            Expr::Div(_, _) => {
                let den = operands.pop().unwrap();
                let num = operands.pop().unwrap();
                Expr::div(num, den)
            }
            Expr::App(func, _) => Expr::app(*func, operands),
        }
    }

    /// Substitutes every occurrence of the mapped symbols.
    pub fn subs(&self, map: &HashMap<Symbol, Expr>) -> Expr {
        match self {
            Expr::Var(s) => map.get(s).cloned().unwrap_or_else(|| self.clone()),
            Expr::Const(_) => self.clone(),
            _ => self.rebuild(self.operands().into_iter().map(|e| e.subs(map)).collect()),
        }
    }

    pub fn subs_one(&self, sym: Symbol, with: &Expr) -> Expr {
        let map: HashMap<Symbol, Expr> = [(sym, with.clone())].into_iter().collect();
        self.subs(&map)
    }

    /// Replaces structurally-equal occurrences of `from` with `to`.
    pub fn replace(&self, from: &Expr, to: &Expr) -> Expr {
        if self == from {
            return to.clone();
        }
        match self {
            Expr::Const(_) | Expr::Var(_) => self.clone(),
            _ => self.rebuild(
                self.operands()
                    .into_iter()
                    .map(|e| e.replace(from, to))
                    .collect(),
            ),
        }
    }

    /// Numerically evaluates the expression; every free symbol must be bound.
    pub fn eval(&self, env: &HashMap<Symbol, f64>) -> Result<f64> {
        let value = match self {
            Expr::Const(n) => n.0,
            Expr::Var(s) => match env.get(s) {
                Some(v) => *v,
                None => return sym_err!(UnknownSymbol, format!("unbound symbol #{}", s.id())),
            },
            Expr::Add(terms) => {
                let mut sum = 0.0;
                for t in terms {
                    sum += t.eval(env)?;
                }
                sum
            }
            Expr::Mul(factors) => {
                let mut prod = 1.0;
                for f in factors {
                    prod *= f.eval(env)?;
                }
                prod
            }
            Expr::Pow(base, exp) => {
                let b = base.eval(env)?;
                match exp.as_integer() {
                    Some(n) if n.abs() <= i32::MAX as i64 => b.powi(n as i32),
                    _ => b.powf(exp.eval(env)?),
                }
            }
            Expr::Div(num, den) => num.eval(env)? / den.eval(env)?,
            Expr::App(func, args) => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(a.eval(env)?);
                }
                func.eval(&values)
            }
        };
        Ok(value)
    }

    pub fn display<'a>(&'a self, table: &'a SymbolTable) -> ExprDisplay<'a> {
        ExprDisplay { expr: self, table }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(value)
    }
}

impl From<Symbol> for Expr {
    fn from(sym: Symbol) -> Self {
        Expr::Var(sym)
    }
}

impl ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::add(vec![self, rhs])
    }
}

impl ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::sub(self, rhs)
    }
}

impl ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::mul(vec![self, rhs])
    }
}

impl ops::Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        Expr::div(self, rhs)
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::neg(self)
    }
}

pub struct ExprDisplay<'a> {
    expr: &'a Expr,
    table: &'a SymbolTable,
}

// binding strength, used to decide where parentheses are needed
fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Add(_) => 1,
        Expr::Mul(_) | Expr::Div(_, _) => 2,
        Expr::Const(n) if n.0 < 0.0 => 2,
        Expr::Pow(_, _) => 3,
        Expr::Const(_) | Expr::Var(_) | Expr::App(_, _) => 4,
    }
}

impl ExprDisplay<'_> {
    fn child<'b>(&'b self, expr: &'b Expr) -> ExprDisplay<'b> {
        ExprDisplay {
            expr,
            table: self.table,
        }
    }

    fn write_operand(&self, f: &mut fmt::Formatter, expr: &Expr, min_prec: u8) -> fmt::Result {
        if precedence(expr) < min_prec {
            write!(f, "({})", self.child(expr))
        } else {
            write!(f, "{}", self.child(expr))
        }
    }
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.expr {
            Expr::Const(n) => write!(f, "{}", n.0),
            Expr::Var(s) => write!(f, "{}", self.table.label(*s)),
            Expr::Add(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    let (coeff, body) = term.clone().split_coefficient();
                    if i == 0 {
                        self.write_operand(f, term, 1)?;
                    } else if coeff < 0.0 {
                        f.write_str(" - ")?;
                        let positive = Expr::scale(-coeff, body);
                        self.write_operand(f, &positive, 2)?;
                    } else {
                        f.write_str(" + ")?;
                        self.write_operand(f, term, 1)?;
                    }
                }
                Ok(())
            }
            Expr::Mul(factors) => {
                if factors.len() == 2 && factors[0].as_const() == Some(-1.0) {
                    f.write_str("-")?;
                    return self.write_operand(f, &factors[1], 3);
                }
                for (i, factor) in factors.iter().enumerate() {
                    if i > 0 {
                        f.write_str("*")?;
                    }
                    let min_prec = if i == 0 { 2 } else { 3 };
                    self.write_operand(f, factor, min_prec)?;
                }
                Ok(())
            }
            Expr::Pow(base, exp) => {
                self.write_operand(f, base, 4)?;
                f.write_str("^")?;
                self.write_operand(f, exp, 4)
            }
            Expr::Div(num, den) => {
                self.write_operand(f, num, 2)?;
                f.write_str("/")?;
                self.write_operand(f, den, 3)
            }
            Expr::App(func, args) => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", self.child(arg))?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy() -> (SymbolTable, Expr, Expr) {
        let mut table = SymbolTable::new();
        let x = Expr::var(table.scalar("x"));
        let y = Expr::var(table.scalar("y"));
        (table, x, y)
    }

    #[test]
    fn test_like_terms_combine() {
        let (_, x, y) = xy();
        let e = x.clone() * y.clone() + y.clone() * x.clone();
        assert_eq!(Expr::mul(vec![Expr::constant(2.0), x.clone(), y.clone()]), e);
        assert_eq!(Expr::zero(), x.clone() - x.clone());
        assert_eq!(Expr::constant(5.0), Expr::constant(2.0) + Expr::constant(3.0));
    }

    #[test]
    fn test_powers_combine() {
        let (_, x, _) = xy();
        let e = x.clone() * x.clone() * x.clone();
        assert_eq!(Expr::powi(x.clone(), 3), e);
        assert_eq!(Expr::one(), Expr::powi(x.clone(), 2) * Expr::powi(x.clone(), -2));
        assert_eq!(x.clone(), Expr::pow(x.clone(), Expr::one()));
        assert_eq!(Expr::powi(x.clone(), 6), Expr::powi(Expr::powi(x, 2), 3));
    }

    #[test]
    fn test_operand_order_is_canonical() {
        let (_, x, y) = xy();
        assert_eq!(x.clone() * y.clone(), y.clone() * x.clone());
        assert_eq!(x.clone() + y.clone(), y + x);
    }

    #[test]
    fn test_division_by_constant() {
        let (_, x, _) = xy();
        let e = x.clone() / Expr::constant(4.0);
        assert_eq!(Expr::mul(vec![Expr::constant(0.25), x.clone()]), e);
        assert_eq!(Expr::one(), x.clone() / x.clone());
        assert!(matches!(Expr::one() / x, Expr::Div(_, _)));
    }

    #[test]
    fn test_constant_folding_in_apps() {
        let e = Expr::app(Func::Cos, vec![Expr::zero()]);
        assert_eq!(Expr::one(), e);
        let (_, x, _) = xy();
        assert!(matches!(Expr::app(Func::Sin, vec![x]), Expr::App(Func::Sin, _)));
    }

    #[test]
    fn test_subs_and_eval() {
        let (table, x, y) = xy();
        let xs = x.as_symbol().unwrap();
        let ys = y.as_symbol().unwrap();
        let e = Expr::powi(x.clone(), 2) + Expr::constant(3.0) * y.clone();
        let e = e.subs_one(ys, &(x.clone() + Expr::one()));
        assert!(!e.contains_symbol(ys));
        assert!(e.contains_symbol(xs));

        let env: HashMap<Symbol, f64> = [(xs, 2.0)].into_iter().collect();
        assert_eq!(13.0, e.eval(&env).unwrap());
        let err = y.eval(&env).unwrap_err();
        assert_eq!(crate::ErrorCode::UnknownSymbol, err.code);
        let _ = table;
    }

    #[test]
    fn test_replace_subexpression() {
        let (_, x, y) = xy();
        let x2 = Expr::powi(x.clone(), 2);
        let e = Expr::mul(vec![Expr::constant(3.0), x2.clone(), y.clone()]) + x.clone();
        let replaced = e.replace(&x2, &Expr::constant(2.0));
        assert_eq!(Expr::constant(6.0) * y + x, replaced);
    }

    #[test]
    fn test_free_symbols() {
        let (_, x, y) = xy();
        let e = Expr::app(Func::Sin, vec![x.clone() * y.clone()]) + Expr::one();
        let syms: Vec<Symbol> = e.free_symbols().into_iter().collect();
        assert_eq!(vec![x.as_symbol().unwrap(), y.as_symbol().unwrap()], syms);
        assert!(e.depends_on(&[y.as_symbol().unwrap()]));
        assert!(!Expr::one().depends_on(&[y.as_symbol().unwrap()]));
    }

    #[test]
    fn test_display() {
        let (table, x, y) = xy();
        let e = Expr::constant(2.0) * x.clone() * y.clone() - Expr::powi(x.clone(), 2)
            + Expr::app(Func::Sin, vec![y.clone()]);
        assert_eq!("2*x*y - x^2 + sin(y)", format!("{}", e.display(&table)));

        let e = Expr::powi(x.clone() + y.clone(), 2);
        assert_eq!("(x + y)^2", format!("{}", e.display(&table)));

        let e = Expr::one() / (x + y);
        assert_eq!("1/(x + y)", format!("{}", e.display(&table)));
    }
}
