//! Externally-defined predicates and functions.
//!
//! The registry is the engine's only process-wide structure. The host
//! populates it before the search begins; `freeze` makes it read-only, and
//! interpretation of external atoms only ever reads it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::error::LangError;
use crate::object::Object;
use crate::state::Valuation;

/// A native predicate over the current valuation and an argument tuple.
pub type NativePredicate =
    Arc<dyn Fn(&dyn Valuation, &[Object]) -> Result<bool, LangError> + Send + Sync>;

/// A native static function from an argument tuple to a value.
pub type NativeFunction = Arc<dyn Fn(&[Object]) -> Result<Object, LangError> + Send + Sync>;

pub struct ExternalRegistry {
    predicates: RwLock<HashMap<String, NativePredicate>>,
    functions: RwLock<HashMap<String, NativeFunction>>,
    frozen: AtomicBool,
}

impl ExternalRegistry {
    fn new() -> Self {
        Self {
            predicates: RwLock::new(HashMap::new()),
            functions: RwLock::new(HashMap::new()),
            frozen: AtomicBool::new(false),
        }
    }

    /// Register a native predicate. Returns false if the registry has
    /// already been frozen.
    pub fn register_predicate(&self, name: &str, pred: NativePredicate) -> bool {
        if self.frozen.load(Ordering::Acquire) {
            return false;
        }
        self.predicates.write().insert(name.to_string(), pred);
        true
    }

    /// Register a native static function. Returns false if frozen.
    pub fn register_function(&self, name: &str, func: NativeFunction) -> bool {
        if self.frozen.load(Ordering::Acquire) {
            return false;
        }
        self.functions.write().insert(name.to_string(), func);
        true
    }

    /// Make the registry read-only. Idempotent.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub fn predicate(&self, name: &str) -> Option<NativePredicate> {
        self.predicates.read().get(name).cloned()
    }

    pub fn function(&self, name: &str) -> Option<NativeFunction> {
        self.functions.read().get(name).cloned()
    }

    pub fn eval_predicate(
        &self,
        name: &str,
        valuation: &dyn Valuation,
        args: &[Object],
    ) -> Result<bool, LangError> {
        let pred = self
            .predicate(name)
            .ok_or_else(|| LangError::UndefinedSymbol(name.to_string()))?;
        pred(valuation, args)
    }

    pub fn eval_function(&self, name: &str, args: &[Object]) -> Result<Object, LangError> {
        let func = self
            .function(name)
            .ok_or_else(|| LangError::UndefinedSymbol(name.to_string()))?;
        func(args)
    }
}

/// The process-wide registry instance.
pub fn registry() -> &'static ExternalRegistry {
    static REGISTRY: OnceLock<ExternalRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ExternalRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::VariableIdx;
    use crate::state::State;

    #[test]
    fn registered_function_is_callable() {
        let reg = ExternalRegistry::new();
        reg.register_function(
            "double",
            Arc::new(|args| Ok(Object::Int(args[0].as_int()? * 2))),
        );
        let out = reg.eval_function("double", &[Object::Int(21)]).unwrap();
        assert_eq!(out, Object::Int(42));
    }

    #[test]
    fn registered_predicate_reads_the_valuation() {
        let reg = ExternalRegistry::new();
        reg.register_predicate(
            "var0_true",
            Arc::new(|val, _args| val.read(VariableIdx::new(0))?.as_bool()),
        );
        let state = State::new(vec![Object::Bool(true)]);
        assert!(reg.eval_predicate("var0_true", &state, &[]).unwrap());
    }

    #[test]
    fn unknown_symbol_is_an_error() {
        let reg = ExternalRegistry::new();
        assert!(matches!(
            reg.eval_function("missing", &[]),
            Err(LangError::UndefinedSymbol(_))
        ));
    }

    #[test]
    fn freeze_rejects_further_registration() {
        let reg = ExternalRegistry::new();
        reg.freeze();
        let accepted = reg.register_function("late", Arc::new(|_| Ok(Object::Int(0))));
        assert!(!accepted);
    }
}
