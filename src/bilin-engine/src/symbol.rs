// Copyright 2026 The Bilin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Symbol handles and the table that owns their names.
//!
//! Expressions never store names directly: a [`Symbol`] is a small integer
//! handle compared by value, and all naming lives in a [`SymbolTable`].  Each
//! derivation owns its table, so dummy symbols created while expanding one
//! model can never alias symbols of another, even when derivations run on
//! different threads.

use std::collections::HashMap;
use std::fmt;

use crate::common::Result;
use crate::sym_err;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Symbol(u32);

impl Symbol {
    pub fn id(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct SymbolEntry {
    name: String,
    /// 1-based element index for array-element symbols like `x[2]`
    index: Option<u32>,
    is_dummy: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    by_label: HashMap<String, Symbol>,
    fresh_count: u32,
    scratch: Option<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    fn push(&mut self, name: &str, index: Option<u32>, is_dummy: bool) -> Symbol {
        let sym = Symbol(self.entries.len() as u32);
        self.entries.push(SymbolEntry {
            name: name.to_owned(),
            index,
            is_dummy,
        });
        sym
    }

    /// Returns the symbol labeled `name`, creating it if this is the
    /// first time the name has been seen.
    pub fn scalar(&mut self, name: &str) -> Symbol {
        if let Some(sym) = self.by_label.get(name) {
            return *sym;
        }
        let sym = self.push(name, None, false);
        self.by_label.insert(name.to_owned(), sym);
        sym
    }

    /// Declares a new scalar symbol, failing if the label is already taken.
    pub fn declare(&mut self, name: &str) -> Result<Symbol> {
        if self.by_label.contains_key(name) {
            return sym_err!(DuplicateSymbol, name.to_owned());
        }
        Ok(self.scalar(name))
    }

    /// Returns the indexed symbols `name[1]..name[len]`, creating any
    /// that don't exist yet.
    pub fn vector(&mut self, name: &str, len: usize) -> Vec<Symbol> {
        (1..=len as u32)
            .map(|i| {
                let label = format!("{name}[{i}]");
                if let Some(sym) = self.by_label.get(&label) {
                    return *sym;
                }
                let sym = self.push(name, Some(i), false);
                self.by_label.insert(label, sym);
                sym
            })
            .collect()
    }

    /// Like [`vector`](Self::vector), but picks a base name no existing
    /// symbol uses (`name`, then `name_2`, `name_3`, ...).
    pub fn unique_vector(&mut self, name: &str, len: usize) -> Vec<Symbol> {
        let mut base = name.to_owned();
        let mut suffix = 1;
        while self.by_label.contains_key(&base) || self.by_label.contains_key(&format!("{base}[1]"))
        {
            suffix += 1;
            base = format!("{name}_{suffix}");
        }
        self.vector(&base, len)
    }

    /// Creates a call-scoped dummy symbol.  Dummies are underscore-prefixed,
    /// numbered per table, and never registered for lookup, so equations
    /// can't refer to them.
    pub fn fresh(&mut self, hint: &str) -> Symbol {
        self.fresh_count += 1;
        let name = format!("_{hint}_{}", self.fresh_count);
        self.push(&name, None, true)
    }

    /// A single dummy shared by short-lived rewrites that substitute it
    /// away again before returning.
    pub(crate) fn scratch(&mut self) -> Symbol {
        match self.scratch {
            Some(sym) => sym,
            None => {
                let sym = self.push("_d", None, true);
                self.scratch = Some(sym);
                sym
            }
        }
    }

    pub fn fresh_vector(&mut self, hint: &str, len: usize) -> Vec<Symbol> {
        self.fresh_count += 1;
        let name = format!("_{hint}_{}", self.fresh_count);
        (1..=len as u32)
            .map(|i| self.push(&name, Some(i), true))
            .collect()
    }

    pub fn lookup(&self, label: &str) -> Option<Symbol> {
        self.by_label.get(label).copied()
    }

    pub fn lookup_indexed(&self, name: &str, index: u32) -> Option<Symbol> {
        self.by_label.get(&format!("{name}[{index}]")).copied()
    }

    pub fn is_dummy(&self, sym: Symbol) -> bool {
        self.entries[sym.0 as usize].is_dummy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Human-readable label: `name` or `name[i]`.
    pub fn label(&self, sym: Symbol) -> Label<'_> {
        let entry = &self.entries[sym.0 as usize];
        Label {
            name: &entry.name,
            index: entry.index,
        }
    }
}

pub struct Label<'a> {
    name: &'a str,
    index: Option<u32>,
}

impl fmt::Display for Label<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}[{}]", self.name, i),
            None => write!(f, "{}", self.name),
        }
    }
}
