//! Problem-wide static data: the typed object universe, the symbol table
//! and the bijective state-variable index.
//!
//! Everything here is built once at load time and read-only during search.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::error::LangError;
use crate::object::{Object, TypeIdx, VariableIdx};
use crate::symbol::{SymbolIdx, SymbolKind, SymbolTable};

/// Shape of a declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Bool,
    /// Bounded integer interval, inclusive.
    Int { lb: i32, ub: i32 },
    Float,
    /// Opaque object type with a finite, ordered set of inhabitants.
    Object,
}

/// A declared type and its (finite, ordered) universe.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: String,
    pub kind: TypeKind,
    /// The inhabitants, in declared order. For `Bool` this is
    /// `[false, true]`; for bounded ints, the materialised interval.
    pub objects: Vec<Object>,
}

impl TypeInfo {
    /// Sound integer bounds for values of this type. Opaque objects carry
    /// globally-dense ids, so the bounds span the inhabitants' actual ids,
    /// not the universe size.
    pub fn bounds(&self) -> (i64, i64) {
        match self.kind {
            TypeKind::Bool => (0, 1),
            TypeKind::Int { lb, ub } => (lb as i64, ub as i64),
            TypeKind::Float => (i64::MIN, i64::MAX),
            TypeKind::Object => {
                let ids = self.objects.iter().map(|o| o.feature_value() as i64);
                (
                    ids.clone().min().unwrap_or(0),
                    ids.max().unwrap_or(0),
                )
            }
        }
    }
}

/// Identity of a state variable: a fluent symbol applied to a ground
/// argument tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableData {
    pub symbol: SymbolIdx,
    pub args: SmallVec<[Object; 4]>,
}

/// The typed object universe and the state-variable index.
#[derive(Debug)]
pub struct ProblemInfo {
    symbols: SymbolTable,
    types: Vec<TypeInfo>,
    /// Declared type of each opaque object id.
    object_types: Vec<TypeIdx>,
    /// Printable name of each opaque object id.
    object_names: Vec<String>,
    variables: Vec<VariableData>,
    variable_index: HashMap<VariableData, VariableIdx>,
    /// Extensional data for static symbols: argument tuple -> value.
    static_data: Vec<Option<HashMap<SmallVec<[Object; 4]>, Object>>>,
}

impl ProblemInfo {
    pub fn new(symbols: SymbolTable, types: Vec<TypeInfo>, object_types: Vec<TypeIdx>, object_names: Vec<String>) -> Self {
        let num_symbols = symbols.len();
        Self {
            symbols,
            types,
            object_types,
            object_names,
            variables: Vec::new(),
            variable_index: HashMap::new(),
            static_data: vec![None; num_symbols],
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn num_types(&self) -> usize {
        self.types.len()
    }

    pub fn type_info(&self, idx: TypeIdx) -> &TypeInfo {
        &self.types[idx.index()]
    }

    /// The ordered universe of a type.
    pub fn objects_of(&self, idx: TypeIdx) -> &[Object] {
        &self.types[idx.index()].objects
    }

    /// The declared type of a value.
    pub fn type_of(&self, object: &Object) -> Option<TypeIdx> {
        match object {
            Object::Obj(id) => self.object_types.get(*id as usize).copied(),
            _ => None,
        }
    }

    /// Register a state variable for a ground fluent tuple. Idempotent.
    pub fn add_variable(&mut self, symbol: SymbolIdx, args: SmallVec<[Object; 4]>) -> VariableIdx {
        debug_assert_eq!(self.symbols.info(symbol).kind, SymbolKind::Fluent);
        let data = VariableData { symbol, args };
        if let Some(&idx) = self.variable_index.get(&data) {
            return idx;
        }
        let idx = VariableIdx::new(self.variables.len() as u32);
        self.variables.push(data.clone());
        self.variable_index.insert(data, idx);
        idx
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Resolve a (fluent symbol, ground argument tuple) pair to its dense
    /// state-variable index.
    pub fn resolve_variable(
        &self,
        symbol: SymbolIdx,
        args: &[Object],
    ) -> Result<VariableIdx, LangError> {
        let data = VariableData {
            symbol,
            args: SmallVec::from_slice(args),
        };
        self.variable_index.get(&data).copied().ok_or_else(|| {
            LangError::UnregisteredStateVariable(self.format_application(symbol, args))
        })
    }

    /// Reverse of `resolve_variable`.
    pub fn decode_variable(&self, var: VariableIdx) -> &VariableData {
        &self.variables[var.index()]
    }

    /// Declared return type of a state variable.
    pub fn variable_type(&self, var: VariableIdx) -> TypeIdx {
        self.symbols
            .info(self.variables[var.index()].symbol)
            .return_type
    }

    /// Variables of a given fluent symbol, in registration order.
    pub fn variables_of_symbol(
        &self,
        symbol: SymbolIdx,
    ) -> impl Iterator<Item = (VariableIdx, &VariableData)> {
        self.variables
            .iter()
            .enumerate()
            .filter(move |(_, data)| data.symbol == symbol)
            .map(|(i, data)| (VariableIdx::new(i as u32), data))
    }

    /// Install extensional data for a static symbol.
    pub fn set_static_data(
        &mut self,
        symbol: SymbolIdx,
        data: HashMap<SmallVec<[Object; 4]>, Object>,
    ) {
        self.static_data[symbol.index()] = Some(data);
    }

    /// Evaluate a static symbol on a ground argument tuple.
    pub fn static_value(&self, symbol: SymbolIdx, args: &[Object]) -> Result<Object, LangError> {
        let table = self.static_data[symbol.index()]
            .as_ref()
            .ok_or_else(|| LangError::UndefinedSymbol(self.symbols.name(symbol).to_string()))?;
        table
            .get(args)
            .copied()
            .ok_or_else(|| LangError::UndefinedSymbol(self.format_application(symbol, args)))
    }

    // Boundary-only string renderers.

    pub fn format_object(&self, object: &Object) -> String {
        match object {
            Object::Obj(id) => self
                .object_names
                .get(*id as usize)
                .cloned()
                .unwrap_or_else(|| format!("#{}", id)),
            other => other.to_string(),
        }
    }

    pub fn format_application(&self, symbol: SymbolIdx, args: &[Object]) -> String {
        let mut out = String::from(self.symbols.name(symbol));
        out.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&self.format_object(arg));
        }
        out.push(')');
        out
    }

    pub fn format_variable(&self, var: VariableIdx) -> String {
        let data = self.decode_variable(var);
        self.format_application(data.symbol, &data.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn bool_type() -> TypeInfo {
        TypeInfo {
            name: "bool".to_string(),
            kind: TypeKind::Bool,
            objects: vec![Object::Bool(false), Object::Bool(true)],
        }
    }

    fn block_type(n: u32) -> TypeInfo {
        TypeInfo {
            name: "block".to_string(),
            kind: TypeKind::Object,
            objects: (0..n).map(Object::Obj).collect(),
        }
    }

    fn small_info() -> ProblemInfo {
        let mut symbols = SymbolTable::new();
        symbols.declare(
            "clear",
            SymbolKind::Fluent,
            smallvec![TypeIdx::new(1)],
            TypeIdx::new(0),
        );
        let object_types = vec![TypeIdx::new(1); 3];
        let object_names = (0..3).map(|i| format!("b{}", i)).collect();
        ProblemInfo::new(
            symbols,
            vec![bool_type(), block_type(3)],
            object_types,
            object_names,
        )
    }

    #[test]
    fn variable_index_is_bijective() {
        let mut info = small_info();
        let clear = info.symbols().get("clear").unwrap();
        let v0 = info.add_variable(clear, smallvec![Object::Obj(0)]);
        let v1 = info.add_variable(clear, smallvec![Object::Obj(1)]);
        assert_ne!(v0, v1);

        assert_eq!(info.resolve_variable(clear, &[Object::Obj(0)]).unwrap(), v0);
        let data = info.decode_variable(v1);
        assert_eq!(data.symbol, clear);
        assert_eq!(data.args.as_slice(), &[Object::Obj(1)]);
    }

    #[test]
    fn registering_twice_is_idempotent() {
        let mut info = small_info();
        let clear = info.symbols().get("clear").unwrap();
        let a = info.add_variable(clear, smallvec![Object::Obj(2)]);
        let b = info.add_variable(clear, smallvec![Object::Obj(2)]);
        assert_eq!(a, b);
        assert_eq!(info.num_variables(), 1);
    }

    #[test]
    fn unregistered_variable_is_an_error() {
        let info = small_info();
        let clear = info.symbols().get("clear").unwrap();
        let err = info.resolve_variable(clear, &[Object::Obj(0)]);
        assert!(matches!(
            err,
            Err(LangError::UnregisteredStateVariable(_))
        ));
    }

    #[test]
    fn renderers_use_object_names() {
        let mut info = small_info();
        let clear = info.symbols().get("clear").unwrap();
        let v = info.add_variable(clear, smallvec![Object::Obj(1)]);
        assert_eq!(info.format_variable(v), "clear(b1)");
    }

    #[test]
    fn type_bounds_are_sound() {
        assert_eq!(bool_type().bounds(), (0, 1));
        assert_eq!(block_type(4).bounds(), (0, 3));
        let ints = TypeInfo {
            name: "count".to_string(),
            kind: TypeKind::Int { lb: -2, ub: 7 },
            objects: (-2..=7).map(Object::Int).collect(),
        };
        assert_eq!(ints.bounds(), (-2, 7));
    }
}
