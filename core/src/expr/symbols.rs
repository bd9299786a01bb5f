//! Per-request symbol table.
use super::{ast::Chunk, position::Span};
use std::{collections::HashMap, f64::consts};

/// Native implementation of a builtin function.
#[derive(Debug, Clone, Copy)]
pub enum Native {
    /// Computes a number from the arguments.
    /// Always receives exactly as many arguments as the builtin declares.
    Number(fn(&[f64]) -> f64),
    /// Produces a structured payload for the host to handle.
    Payload,
}

#[derive(Debug, Clone)]
pub struct BuiltinFunction {
    pub name: String,
    pub params: Vec<String>,
    pub native: Native,
}

/// User defined function.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Chunk>,
    /// Span of the definition.
    pub span: Span,
}

#[derive(Debug, Clone, derive_more::From)]
pub enum Symbol {
    Constant(f64),
    Function(Function),
    Builtin(BuiltinFunction),
}

impl Symbol {
    /// Parameters of a callable symbol.
    /// `None` if the symbol is a constant.
    pub fn params(&self) -> Option<&[String]> {
        match self {
            Self::Constant(_) => None,
            Self::Function(function) => Some(&function.params),
            Self::Builtin(builtin) => Some(&builtin.params),
        }
    }
}

/// Maps names to constants and functions.
/// A fresh table is created for every request, seeded with the builtins,
/// and only mutated by function definitions within that request.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    /// Table seeded with the builtin functions and constants.
    pub fn new() -> Self {
        const NUM: &[&str] = &["num"];
        const NUM2: &[&str] = &["num", "num2"];

        Self::empty()
            .with_builtin("rad", NUM, |args| args[0].to_radians())
            .with_builtin("sin", NUM, |args| args[0].sin())
            .with_builtin("cos", NUM, |args| args[0].cos())
            .with_builtin("tan", NUM, |args| args[0].tan())
            .with_builtin("asin", NUM2, |args| (args[0] / args[1]).asin())
            .with_builtin("acos", NUM2, |args| (args[0] / args[1]).acos())
            .with_builtin("atan", NUM2, |args| (args[0] / args[1]).atan())
            .with_builtin("log", NUM2, |args| args[0].log(args[1]))
            .with_constant("π", consts::PI)
            .with_constant("pi", consts::PI)
            .with_constant("E", consts::E)
            .with_constant("e", consts::E)
    }

    /// Table without any symbols.
    pub fn empty() -> Self {
        Self {
            symbols: HashMap::new(),
        }
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: f64) -> Self {
        self.symbols.insert(name.into(), Symbol::Constant(value));
        self
    }

    pub fn with_builtin(
        mut self,
        name: impl Into<String>,
        params: &[&str],
        native: fn(&[f64]) -> f64,
    ) -> Self {
        self.insert_builtin(name.into(), params, Native::Number(native));
        self
    }

    /// Register a builtin whose result is a [`Payload`](super::eval::Payload)
    /// carrying its name and evaluated arguments.
    pub fn with_payload(mut self, name: impl Into<String>, params: &[&str]) -> Self {
        self.insert_builtin(name.into(), params, Native::Payload);
        self
    }

    fn insert_builtin(&mut self, name: String, params: &[&str], native: Native) {
        let builtin = BuiltinFunction {
            name: name.clone(),
            params: params.iter().map(|param| param.to_string()).collect(),
            native,
        };
        self.symbols.insert(name, builtin.into());
    }

    /// Bind a user function, replacing any symbol of the same name.
    pub fn define(&mut self, function: Function) {
        #[cfg(feature = "tracing")]
        tracing::debug!(name = %function.name, params = ?function.params, "define function");

        self.symbols.insert(function.name.clone(), function.into());
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Value of a constant.
    /// `None` if the name is not bound or is bound to a function.
    pub fn constant(&self, name: &str) -> Option<f64> {
        match self.symbols.get(name) {
            Some(Symbol::Constant(value)) => Some(*value),
            _ => None,
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
