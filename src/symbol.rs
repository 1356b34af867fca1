use hashbrown::HashMap;
use lasso::{Spur, ThreadedRodeo};
use smallvec::SmallVec;

use crate::object::TypeIdx;

/// Interned name of a symbol.
pub type NameId = Spur;

/// Dense index of a declared function or predicate symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolIdx(u32);

impl SymbolIdx {
    pub const fn new(raw: u32) -> Self {
        SymbolIdx(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a symbol is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Interpretation fixed by the problem (extensional data or native fn).
    Static,
    /// Interpretation varies with the state; ground instances are state
    /// variables.
    Fluent,
    /// Interpreted through the external predicate/function registry.
    External,
}

/// A declared symbol: name, signature and interpretation kind.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub name: NameId,
    pub kind: SymbolKind,
    /// Argument types, in declared order.
    pub signature: SmallVec<[TypeIdx; 4]>,
    pub return_type: TypeIdx,
}

impl SymbolInfo {
    pub fn arity(&self) -> usize {
        self.signature.len()
    }
}

/// Symbol table: interned names plus per-symbol signature records.
///
/// Guarantees:
/// - Same name always maps to the same `SymbolIdx`
/// - `SymbolIdx` resolves back to its `SymbolInfo` and name
#[derive(Debug)]
pub struct SymbolTable {
    rodeo: ThreadedRodeo,
    infos: Vec<SymbolInfo>,
    by_name: HashMap<NameId, SymbolIdx>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
            infos: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Declare a symbol, returning its dense index. Redeclaring an existing
    /// name returns the original index and ignores the new record.
    pub fn declare(
        &mut self,
        name: &str,
        kind: SymbolKind,
        signature: SmallVec<[TypeIdx; 4]>,
        return_type: TypeIdx,
    ) -> SymbolIdx {
        let interned = self.rodeo.get_or_intern(name);
        if let Some(&idx) = self.by_name.get(&interned) {
            return idx;
        }
        let idx = SymbolIdx(self.infos.len() as u32);
        self.infos.push(SymbolInfo {
            name: interned,
            kind,
            signature,
            return_type,
        });
        self.by_name.insert(interned, idx);
        idx
    }

    /// Look up a symbol by name without declaring it.
    pub fn get(&self, name: &str) -> Option<SymbolIdx> {
        let interned = self.rodeo.get(name)?;
        self.by_name.get(&interned).copied()
    }

    pub fn info(&self, idx: SymbolIdx) -> &SymbolInfo {
        &self.infos[idx.index()]
    }

    pub fn name(&self, idx: SymbolIdx) -> &str {
        self.rodeo.resolve(&self.infos[idx.index()].name)
    }

    pub fn is_fluent(&self, idx: SymbolIdx) -> bool {
        self.infos[idx.index()].kind == SymbolKind::Fluent
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Iterator over all declared symbols in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolIdx, &SymbolInfo)> {
        self.infos
            .iter()
            .enumerate()
            .map(|(i, info)| (SymbolIdx(i as u32), info))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
