//! Problem ingestion from a JSON document.
//!
//! This is a boundary module: it parses a self-contained JSON description
//! (types, objects, symbols, schemas, init, goal) and produces the
//! in-memory [`Problem`] the core consumes. The core itself never parses
//! anything.
//!
//! Symbols, objects and types are referenced by name throughout the
//! document; bound variables are referenced by name and scoped to their
//! enclosing schema or quantifier.

use hashbrown::HashMap;
use serde::Deserialize;
use smallvec::SmallVec;

use crate::action::{ActionSchema, Effect, EffectKind};
use crate::error::LoadError;
use crate::formula::{BoundVarDecl, Comparator, Formula};
use crate::info::{ProblemInfo, TypeInfo, TypeKind};
use crate::object::{Object, TypeIdx};
use crate::problem::Problem;
use crate::state::State;
use crate::symbol::{SymbolIdx, SymbolKind, SymbolTable};
use crate::term::{StaticOp, Term};
use crate::trace::info;

#[derive(Debug, Deserialize)]
struct JsonProblem {
    #[serde(default)]
    types: Vec<JsonType>,
    #[serde(default)]
    objects: Vec<JsonObject>,
    #[serde(default)]
    symbols: Vec<JsonSymbol>,
    #[serde(default)]
    init: Vec<JsonInit>,
    #[serde(default)]
    schemas: Vec<JsonSchema>,
    goal: JsonFormula,
    #[serde(default)]
    constraints: Option<JsonFormula>,
}

#[derive(Debug, Deserialize)]
struct JsonType {
    name: String,
    #[serde(default = "default_type_kind")]
    kind: String,
    #[serde(default)]
    lb: i32,
    #[serde(default)]
    ub: i32,
}

fn default_type_kind() -> String {
    "object".to_string()
}

#[derive(Debug, Deserialize)]
struct JsonObject {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Debug, Deserialize)]
struct JsonSymbol {
    name: String,
    /// "fluent", "static" or "external".
    kind: String,
    #[serde(default)]
    signature: Vec<String>,
    #[serde(rename = "return")]
    return_type: String,
    /// Extensional rows for static symbols.
    #[serde(default)]
    data: Vec<JsonStaticRow>,
}

#[derive(Debug, Deserialize)]
struct JsonStaticRow {
    args: Vec<JsonScalar>,
    value: JsonScalar,
}

#[derive(Debug, Deserialize)]
struct JsonInit {
    symbol: String,
    #[serde(default)]
    args: Vec<JsonScalar>,
    value: JsonScalar,
}

#[derive(Debug, Deserialize)]
struct JsonSchema {
    name: String,
    #[serde(default)]
    parameters: Vec<JsonParam>,
    precondition: JsonFormula,
    effects: Vec<JsonEffect>,
}

#[derive(Debug, Deserialize)]
struct JsonParam {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Debug, Deserialize)]
struct JsonEffect {
    #[serde(default)]
    condition: Option<JsonFormula>,
    /// "assign", "add" or "delete".
    kind: String,
    lhs: JsonTerm,
    #[serde(default)]
    rhs: Option<JsonTerm>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Name(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonTerm {
    Constant { value: JsonScalar },
    Variable { name: String },
    Apply { symbol: String, args: Vec<JsonTerm> },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonFormula {
    Tautology,
    Contradiction,
    Atom {
        cmp: String,
        lhs: JsonTerm,
        rhs: JsonTerm,
    },
    External {
        symbol: String,
        args: Vec<JsonTerm>,
    },
    Not {
        body: Box<JsonFormula>,
    },
    And {
        items: Vec<JsonFormula>,
    },
    Or {
        items: Vec<JsonFormula>,
    },
    Exists {
        vars: Vec<JsonParam>,
        body: Box<JsonFormula>,
    },
    Forall {
        vars: Vec<JsonParam>,
        body: Box<JsonFormula>,
    },
}

/// Parse a JSON document into a [`Problem`].
pub fn load_problem(document: &str) -> Result<Problem, LoadError> {
    let raw: JsonProblem = serde_json::from_str(document)
        .map_err(|err| LoadError::new(format!("malformed document: {}", err)))?;
    Loader::new().build(raw)
}

/// Load a problem from a file path.
pub fn load_problem_file(path: &std::path::Path) -> Result<Problem, LoadError> {
    let document = std::fs::read_to_string(path)
        .map_err(|err| LoadError::new(format!("cannot read {}: {}", path.display(), err)))?;
    load_problem(&document)
}

struct Loader {
    type_index: HashMap<String, TypeIdx>,
    object_index: HashMap<String, u32>,
}

impl Loader {
    fn new() -> Self {
        Self {
            type_index: HashMap::new(),
            object_index: HashMap::new(),
        }
    }

    fn build(mut self, raw: JsonProblem) -> Result<Problem, LoadError> {
        // Types. "bool" is always declared, first.
        let mut types: Vec<TypeInfo> = Vec::new();
        self.type_index
            .insert("bool".to_string(), TypeIdx::new(0));
        types.push(TypeInfo {
            name: "bool".to_string(),
            kind: TypeKind::Bool,
            objects: vec![Object::Bool(false), Object::Bool(true)],
        });
        for decl in &raw.types {
            if decl.name == "bool" {
                continue;
            }
            let idx = TypeIdx::new(types.len() as u32);
            let kind = match decl.kind.as_str() {
                "object" => TypeKind::Object,
                "int" => TypeKind::Int {
                    lb: decl.lb,
                    ub: decl.ub,
                },
                "float" => TypeKind::Float,
                other => {
                    return Err(LoadError::new(format!(
                        "type '{}' has unknown kind '{}'",
                        decl.name, other
                    )))
                }
            };
            let objects = match kind {
                TypeKind::Int { lb, ub } => (lb..=ub).map(Object::Int).collect(),
                _ => Vec::new(),
            };
            self.type_index.insert(decl.name.clone(), idx);
            types.push(TypeInfo {
                name: decl.name.clone(),
                kind,
                objects,
            });
        }

        // Objects: global dense ids in listing order, appended to their
        // type's universe.
        let mut object_types = Vec::with_capacity(raw.objects.len());
        let mut object_names = Vec::with_capacity(raw.objects.len());
        for decl in &raw.objects {
            let ty = self.lookup_type(&decl.ty)?;
            if types[ty.index()].kind != TypeKind::Object {
                return Err(LoadError::new(format!(
                    "object '{}' declared with non-object type '{}'",
                    decl.name, decl.ty
                )));
            }
            let id = object_types.len() as u32;
            self.object_index.insert(decl.name.clone(), id);
            object_names.push(decl.name.clone());
            object_types.push(ty);
            types[ty.index()].objects.push(Object::Obj(id));
        }

        // Symbols.
        let mut symbols = SymbolTable::new();
        for decl in &raw.symbols {
            let kind = match decl.kind.as_str() {
                "fluent" => SymbolKind::Fluent,
                "static" => SymbolKind::Static,
                "external" => SymbolKind::External,
                other => {
                    return Err(LoadError::new(format!(
                        "symbol '{}' has unknown kind '{}'",
                        decl.name, other
                    )))
                }
            };
            let signature = decl
                .signature
                .iter()
                .map(|name| self.lookup_type(name))
                .collect::<Result<SmallVec<[TypeIdx; 4]>, _>>()?;
            let return_type = self.lookup_type(&decl.return_type)?;
            symbols.declare(&decl.name, kind, signature, return_type);
        }

        let mut info = ProblemInfo::new(symbols, types, object_types, object_names);

        // State variables: every ground tuple of every fluent symbol.
        let fluents: Vec<SymbolIdx> = info
            .symbols()
            .iter()
            .filter(|(_, sym)| sym.kind == SymbolKind::Fluent)
            .map(|(idx, _)| idx)
            .collect();
        for symbol in fluents {
            let signature = info.symbols().info(symbol).signature.clone();
            let mut tuple: SmallVec<[Object; 4]> = SmallVec::new();
            register_ground_tuples(&mut info, symbol, &signature, &mut tuple);
        }

        // Static extension data.
        for decl in &raw.symbols {
            if decl.data.is_empty() {
                continue;
            }
            let symbol = info
                .symbols()
                .get(&decl.name)
                .expect("declared a moment ago");
            let signature = info.symbols().info(symbol).signature.clone();
            let return_type = info.symbols().info(symbol).return_type;
            let mut data = HashMap::new();
            for row in &decl.data {
                if row.args.len() != signature.len() {
                    return Err(LoadError::new(format!(
                        "static row of '{}' has wrong arity",
                        decl.name
                    )));
                }
                let args = row
                    .args
                    .iter()
                    .zip(signature.iter())
                    .map(|(scalar, ty)| self.scalar(scalar, *ty, &info))
                    .collect::<Result<SmallVec<[Object; 4]>, _>>()?;
                data.insert(args, self.scalar(&row.value, return_type, &info)?);
            }
            info.set_static_data(symbol, data);
        }

        // Initial state: type-appropriate defaults, overridden by entries.
        let mut values = Vec::with_capacity(info.num_variables());
        for i in 0..info.num_variables() {
            let var = crate::object::VariableIdx::new(i as u32);
            let ty = info.variable_type(var);
            values.push(default_value(&info.type_info(ty).kind, info.objects_of(ty)));
        }
        let mut init = State::new(values);
        for entry in &raw.init {
            let symbol = info
                .symbols()
                .get(&entry.symbol)
                .ok_or_else(|| LoadError::new(format!("unknown symbol '{}'", entry.symbol)))?;
            let signature = info.symbols().info(symbol).signature.clone();
            let return_type = info.symbols().info(symbol).return_type;
            if entry.args.len() != signature.len() {
                return Err(LoadError::new(format!(
                    "init entry for '{}' has wrong arity",
                    entry.symbol
                )));
            }
            let args = entry
                .args
                .iter()
                .zip(signature.iter())
                .map(|(scalar, ty)| self.scalar(scalar, *ty, &info))
                .collect::<Result<SmallVec<[Object; 4]>, _>>()?;
            let var = info
                .resolve_variable(symbol, &args)
                .map_err(LoadError::from)?;
            init.set(var, self.scalar(&entry.value, return_type, &info)?);
        }

        // Schemas, goal and constraints.
        let mut schemas = Vec::with_capacity(raw.schemas.len());
        for decl in &raw.schemas {
            schemas.push(self.schema(decl, &info)?);
        }
        let mut scope = Scope::new();
        let goal = self.formula(&raw.goal, &mut scope, &info)?;
        let constraints = match &raw.constraints {
            Some(formula) => {
                let mut scope = Scope::new();
                Some(self.formula(formula, &mut scope, &info)?)
            }
            None => None,
        };

        info!(
            variables = info.num_variables(),
            schemas = schemas.len(),
            "problem loaded"
        );
        Ok(Problem::new(info, init, schemas, goal, constraints))
    }

    fn schema(&self, decl: &JsonSchema, info: &ProblemInfo) -> Result<ActionSchema, LoadError> {
        let mut scope = Scope::new();
        let mut signature: SmallVec<[TypeIdx; 4]> = SmallVec::new();
        let mut param_names = Vec::with_capacity(decl.parameters.len());
        for param in &decl.parameters {
            let ty = self.lookup_type(&param.ty)?;
            scope.push(&param.name, ty);
            signature.push(ty);
            param_names.push(param.name.clone());
        }

        let precondition = self.formula(&decl.precondition, &mut scope, info)?;
        let mut effects = Vec::with_capacity(decl.effects.len());
        for effect in &decl.effects {
            let condition = match &effect.condition {
                Some(formula) => Some(self.formula(formula, &mut scope, info)?),
                None => None,
            };
            let lhs = self.term(&effect.lhs, &mut scope, info)?;
            let kind = match effect.kind.as_str() {
                "assign" => {
                    let rhs = effect.rhs.as_ref().ok_or_else(|| {
                        LoadError::new(format!("assign effect in '{}' lacks rhs", decl.name))
                    })?;
                    EffectKind::Functional {
                        lhs,
                        rhs: self.term(rhs, &mut scope, info)?,
                    }
                }
                "add" => EffectKind::Add { lhs },
                "delete" => EffectKind::Delete { lhs },
                other => {
                    return Err(LoadError::new(format!(
                        "effect in '{}' has unknown kind '{}'",
                        decl.name, other
                    )))
                }
            };
            effects.push(Effect { condition, kind });
        }

        Ok(ActionSchema {
            name: decl.name.clone(),
            signature,
            param_names,
            precondition,
            effects,
        })
    }

    fn formula(
        &self,
        raw: &JsonFormula,
        scope: &mut Scope,
        info: &ProblemInfo,
    ) -> Result<Formula, LoadError> {
        match raw {
            JsonFormula::Tautology => Ok(Formula::Tautology),
            JsonFormula::Contradiction => Ok(Formula::Contradiction),
            JsonFormula::Atom { cmp, lhs, rhs } => Ok(Formula::Relation {
                cmp: parse_comparator(cmp)?,
                lhs: Box::new(self.term(lhs, scope, info)?),
                rhs: Box::new(self.term(rhs, scope, info)?),
            }),
            JsonFormula::External { symbol, args } => {
                let idx = info
                    .symbols()
                    .get(symbol)
                    .ok_or_else(|| LoadError::new(format!("unknown symbol '{}'", symbol)))?;
                let subterms = args
                    .iter()
                    .map(|t| self.term(t, scope, info))
                    .collect::<Result<_, _>>()?;
                Ok(Formula::External {
                    symbol: idx,
                    subterms,
                })
            }
            JsonFormula::Not { body } => Ok(Formula::Not(Box::new(
                self.formula(body, scope, info)?,
            ))),
            JsonFormula::And { items } => Ok(Formula::And(
                items
                    .iter()
                    .map(|f| self.formula(f, scope, info))
                    .collect::<Result<_, _>>()?,
            )),
            JsonFormula::Or { items } => Ok(Formula::Or(
                items
                    .iter()
                    .map(|f| self.formula(f, scope, info))
                    .collect::<Result<_, _>>()?,
            )),
            JsonFormula::Exists { vars, body } => {
                let decls = self.quantify(vars, scope)?;
                let body = self.formula(body, scope, info)?;
                scope.pop(vars.len());
                Ok(Formula::Exists {
                    vars: decls,
                    body: Box::new(body),
                })
            }
            JsonFormula::Forall { vars, body } => {
                let decls = self.quantify(vars, scope)?;
                let body = self.formula(body, scope, info)?;
                scope.pop(vars.len());
                Ok(Formula::Forall {
                    vars: decls,
                    body: Box::new(body),
                })
            }
        }
    }

    fn quantify(
        &self,
        vars: &[JsonParam],
        scope: &mut Scope,
    ) -> Result<Vec<BoundVarDecl>, LoadError> {
        let mut decls = Vec::with_capacity(vars.len());
        for var in vars {
            let ty = self.lookup_type(&var.ty)?;
            let id = scope.push(&var.name, ty);
            decls.push(BoundVarDecl { id, ty });
        }
        Ok(decls)
    }

    fn term(&self, raw: &JsonTerm, scope: &mut Scope, info: &ProblemInfo) -> Result<Term, LoadError> {
        match raw {
            JsonTerm::Constant { value } => {
                let object = match value {
                    JsonScalar::Bool(b) => Object::Bool(*b),
                    JsonScalar::Int(v) => Object::Int(*v as i32),
                    JsonScalar::Float(v) => Object::Float(*v as f32),
                    JsonScalar::Name(name) => self.lookup_object(name)?,
                };
                Ok(Term::Constant(object))
            }
            JsonTerm::Variable { name } => {
                let (id, ty) = scope
                    .lookup(name)
                    .ok_or_else(|| LoadError::new(format!("unbound variable '{}'", name)))?;
                Ok(Term::BoundVariable { id, ty })
            }
            JsonTerm::Apply { symbol, args } => {
                let subterms: Vec<Term> = args
                    .iter()
                    .map(|t| self.term(t, scope, info))
                    .collect::<Result<_, _>>()?;
                if let Some(op) = arithmetic_op(symbol) {
                    return Ok(Term::Static { op, subterms });
                }
                let idx = info
                    .symbols()
                    .get(symbol)
                    .ok_or_else(|| LoadError::new(format!("unknown symbol '{}'", symbol)))?;
                match info.symbols().info(idx).kind {
                    SymbolKind::Fluent => Ok(Term::Fluent {
                        symbol: idx,
                        subterms,
                    }),
                    SymbolKind::Static | SymbolKind::External => Ok(Term::Static {
                        op: StaticOp::Symbol(idx),
                        subterms,
                    }),
                }
            }
        }
    }

    fn scalar(
        &self,
        raw: &JsonScalar,
        expected: TypeIdx,
        info: &ProblemInfo,
    ) -> Result<Object, LoadError> {
        let object = match raw {
            JsonScalar::Bool(b) => Object::Bool(*b),
            JsonScalar::Int(v) => Object::Int(*v as i32),
            JsonScalar::Float(v) => Object::Float(*v as f32),
            JsonScalar::Name(name) => self.lookup_object(name)?,
        };
        // Opaque objects must inhabit the expected type.
        if let Object::Obj(_) = object {
            if info.type_of(&object) != Some(expected)
                && info.type_info(expected).kind == TypeKind::Object
            {
                return Err(LoadError::new(format!(
                    "value {} does not inhabit type '{}'",
                    info.format_object(&object),
                    info.type_info(expected).name
                )));
            }
        }
        Ok(object)
    }

    fn lookup_type(&self, name: &str) -> Result<TypeIdx, LoadError> {
        self.type_index
            .get(name)
            .copied()
            .ok_or_else(|| LoadError::new(format!("unknown type '{}'", name)))
    }

    fn lookup_object(&self, name: &str) -> Result<Object, LoadError> {
        self.object_index
            .get(name)
            .map(|id| Object::Obj(*id))
            .ok_or_else(|| LoadError::new(format!("unknown object '{}'", name)))
    }
}

/// Lexical scope of bound-variable names, with ids unique per unit.
struct Scope {
    entries: Vec<(String, u32, TypeIdx)>,
    next_id: u32,
}

impl Scope {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    fn push(&mut self, name: &str, ty: TypeIdx) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((name.to_string(), id, ty));
        id
    }

    fn pop(&mut self, n: usize) {
        for _ in 0..n {
            self.entries.pop();
        }
    }

    fn lookup(&self, name: &str) -> Option<(u32, TypeIdx)> {
        self.entries
            .iter()
            .rev()
            .find(|(entry, _, _)| entry == name)
            .map(|(_, id, ty)| (*id, *ty))
    }
}

fn register_ground_tuples(
    info: &mut ProblemInfo,
    symbol: SymbolIdx,
    signature: &[TypeIdx],
    tuple: &mut SmallVec<[Object; 4]>,
) {
    if tuple.len() == signature.len() {
        info.add_variable(symbol, tuple.clone());
        return;
    }
    let ty = signature[tuple.len()];
    let objects: Vec<Object> = info.objects_of(ty).to_vec();
    for object in objects {
        tuple.push(object);
        register_ground_tuples(info, symbol, signature, tuple);
        tuple.pop();
    }
}

fn default_value(kind: &TypeKind, universe: &[Object]) -> Object {
    match kind {
        TypeKind::Bool => Object::Bool(false),
        TypeKind::Int { lb, .. } => Object::Int(*lb),
        TypeKind::Float => Object::Float(0.0),
        TypeKind::Object => universe.first().copied().unwrap_or(Object::Obj(0)),
    }
}

fn parse_comparator(raw: &str) -> Result<Comparator, LoadError> {
    match raw {
        "=" | "==" => Ok(Comparator::Eq),
        "!=" => Ok(Comparator::Neq),
        "<" => Ok(Comparator::Lt),
        "<=" => Ok(Comparator::Leq),
        ">" => Ok(Comparator::Gt),
        ">=" => Ok(Comparator::Geq),
        other => Err(LoadError::new(format!("unknown comparator '{}'", other))),
    }
}

fn arithmetic_op(symbol: &str) -> Option<StaticOp> {
    match symbol {
        "+" => Some(StaticOp::Add),
        "-" => Some(StaticOp::Sub),
        "*" => Some(StaticOp::Mul),
        "/" => Some(StaticOp::Div),
        "min" => Some(StaticOp::Min),
        "max" => Some(StaticOp::Max),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/loader.rs"]
mod tests;
