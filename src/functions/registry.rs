use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use super::{Function, definitions};
use crate::Expr;
use crate::core::number::Number;
use crate::error::ExprError;

/// Definition of a built-in function: numeric evaluation and partial derivatives.
pub(crate) struct FunctionDefinition {
    /// Canonical name (e.g. "sin", "pow")
    pub name: &'static str,

    pub arity: usize,

    /// Numeric evaluation over the call arguments
    pub eval: fn(&[Number]) -> Number,

    /// `∂f/∂args[k]`, as an expression of the call arguments
    pub partial: fn(usize, &[Expr]) -> Result<Expr, ExprError>,
}

pub(crate) struct Builtins {
    pub log: Function,
    pub exp: Function,
    pub pow: Function,
    pub sin: Function,
    pub cos: Function,
    by_name: FxHashMap<&'static str, Function>,
}

/// Static registry of the built-in functions, created on first use
static REGISTRY: OnceLock<Builtins> = OnceLock::new();

fn init_registry() -> Builtins {
    let entry = |def: &'static FunctionDefinition| (def.name, Function::builtin(def));
    let entries = [
        entry(&definitions::LOG),
        entry(&definitions::EXP),
        entry(&definitions::POW),
        entry(&definitions::SIN),
        entry(&definitions::COS),
    ];
    let by_name = entries.iter().cloned().collect();
    let [(_, log), (_, exp), (_, pow), (_, sin), (_, cos)] = entries;
    Builtins {
        log,
        exp,
        pow,
        sin,
        cos,
        by_name,
    }
}

/// Central registry for getting built-in functions
pub(crate) struct Registry;

impl Registry {
    pub(crate) fn builtins() -> &'static Builtins {
        REGISTRY.get_or_init(init_registry)
    }

    /// Look a built-in up by name - O(1) `HashMap` lookup
    pub(crate) fn get(name: &str) -> Option<&'static Function> {
        Self::builtins().by_name.get(name)
    }
}
