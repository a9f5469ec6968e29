//! Symbol table management for labels and constants

use std::collections::BTreeMap;

/// What a symbol was defined by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// `name:`, bound to the location counter
    Label,
    /// `.define`, `.equ` or `name = expr`
    Constant,
}

/// A symbol table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Symbol name (case-sensitive)
    pub name: String,

    pub value: i32,

    pub kind: SymbolKind,

    /// File and line where the symbol was defined
    pub file: String,
    pub line: usize,
}

/// Labels and constants share one namespace, ordered by name so that two
/// assemblies of the same source iterate identically.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol to the table
    ///
    /// Returns Ok(()) on success, Err with the existing symbol if the name is
    /// already taken.
    pub fn add_symbol(&mut self, symbol: Symbol) -> Result<(), &Symbol> {
        if self.symbols.contains_key(&symbol.name) {
            return Err(&self.symbols[&symbol.name]);
        }
        self.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Look up a symbol by name
    pub fn lookup_symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Value of a symbol, for expression evaluation
    pub fn value(&self, name: &str) -> Option<i32> {
        self.symbols.get(name).map(|symbol| symbol.value)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Label name to address
    pub fn labels(&self) -> BTreeMap<String, u16> {
        self.of_kind(SymbolKind::Label)
            .map(|symbol| (symbol.name.clone(), symbol.value as u16))
            .collect()
    }

    /// Constant name to value
    pub fn constants(&self) -> BTreeMap<String, i32> {
        self.of_kind(SymbolKind::Constant)
            .map(|symbol| (symbol.name.clone(), symbol.value))
            .collect()
    }

    fn of_kind(&self, kind: SymbolKind) -> impl Iterator<Item = &Symbol> {
        self.symbols.values().filter(move |symbol| symbol.kind == kind)
    }
}
