//! Language-neutral statement lists handed to a [`Toolchain`](super::Toolchain).
//!
//! A [`SourceUnit`] holds one [`FunctionSource`] per compilation job plus the
//! host constants the functions capture. Each function is a list of hoisted
//! local bindings followed by its return value and outputs; loops carry their
//! own nested [`Block`]. The unit also renders itself as readable text, which
//! is what gets logged and what a source-level toolchain would compile.

use std::fmt;

use crate::core::host::{HostType, Value};
use crate::Number;

/// Index of a hoisted local within one function.
pub type LocalId = usize;

/// Index of a loop variable within one function.
pub type VarId = usize;

/// One computation in a statement list.
#[derive(Debug, Clone, PartialEq)]
pub enum Code {
    Param(usize),
    Local(LocalId),
    /// Loop variable of an enclosing summation or generator.
    Bound(VarId),
    /// Captured host constant, by position in [`SourceUnit::data`].
    Data(usize),
    Number(Number),
    /// A symbol that is neither a parameter nor bound by a loop.
    Unbound(String),
    Tuple(Vec<Code>),
    Apply(Box<Code>, Box<Code>),
    Sum(Vec<Code>),
    Multiply(Vec<Code>),
    Inverse(Box<Code>),
    Transpose(Box<Code>),
    /// `rows × cols` matrix, element evaluated with `row`/`col` bound.
    Generate {
        rows: usize,
        cols: usize,
        row: VarId,
        col: VarId,
        element: Box<Block>,
    },
    /// Sum of `body` for `var` from `lower` to `upper` inclusive.
    Range {
        var: VarId,
        lower: Box<Code>,
        upper: Box<Code>,
        body: Box<Block>,
    },
    /// Sum of `body` for `var` over the elements of `collection`.
    Each {
        var: VarId,
        collection: Box<Code>,
        body: Box<Block>,
    },
}

/// Hoisted bindings followed by a result, evaluated in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub locals: Vec<(LocalId, Code)>,
    pub value: Code,
}

/// Declared parameter of a generated function.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: HostType,
}

/// One generated function: parameters, hoisted locals, and results.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSource {
    pub name: String,
    pub params: Vec<Parameter>,
    pub locals: Vec<(LocalId, Code)>,
    pub value: Code,
    /// Auxiliary outputs, written to `out` parameters.
    pub outputs: Vec<Code>,
    /// Output arrays, allocated and filled element by element.
    pub arrays: Vec<Vec<Code>>,
}

/// A compilation batch.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    functions: Vec<FunctionSource>,
    data: Vec<Value>,
    text: String,
}

impl SourceUnit {
    pub(crate) fn new(functions: Vec<FunctionSource>, data: Vec<Value>) -> Self {
        let text = functions.iter().map(ToString::to_string).collect();
        Self {
            functions,
            data,
            text,
        }
    }

    #[must_use]
    pub fn functions(&self) -> &[FunctionSource] {
        &self.functions
    }

    /// Host constants captured by the functions, for the module's
    /// data-initialization hook.
    #[must_use]
    pub fn data(&self) -> &[Value] {
        &self.data
    }

    /// Rendered source of every function in the unit.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

// =============================================================================
// RENDERING
// =============================================================================

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Code], sep: &str) -> fmt::Result {
    for (k, item) in items.iter().enumerate() {
        if k > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &Block) -> fmt::Result {
    f.write_str("{ ")?;
    for (local, code) in &block.locals {
        write!(f, "let t{local} = {code}; ")?;
    }
    write!(f, "{} }}", block.value)
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(k) => write!(f, "p{k}"),
            Self::Local(k) => write!(f, "t{k}"),
            Self::Bound(k) => write!(f, "v{k}"),
            Self::Data(k) => write!(f, "data[{k}]"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Unbound(name) => f.write_str(name),
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_list(f, items, ", ")?;
                f.write_str(")")
            }
            Self::Apply(target, argument) => write!(f, "apply({target}, {argument})"),
            Self::Sum(terms) => {
                f.write_str("(")?;
                write_list(f, terms, " + ")?;
                f.write_str(")")
            }
            Self::Multiply(factors) => {
                f.write_str("matmul(")?;
                write_list(f, factors, ", ")?;
                f.write_str(")")
            }
            Self::Inverse(inner) => write!(f, "inv({inner})"),
            Self::Transpose(inner) => write!(f, "transpose({inner})"),
            Self::Generate {
                rows,
                cols,
                row,
                col,
                element,
            } => {
                write!(f, "generate({rows}, {cols}, |v{row}, v{col}| ")?;
                write_block(f, element)?;
                f.write_str(")")
            }
            Self::Range {
                var,
                lower,
                upper,
                body,
            } => {
                write!(f, "sum(v{var} in {lower}..={upper}, ")?;
                write_block(f, body)?;
                f.write_str(")")
            }
            Self::Each {
                var,
                collection,
                body,
            } => {
                write!(f, "sum(v{var} in {collection}, ")?;
                write_block(f, body)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for FunctionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (k, param) in self.params.iter().enumerate() {
            if k > 0 {
                f.write_str(", ")?;
            }
            write!(f, "p{k}: {} /* {} */", param.ty, param.name)?;
        }
        for k in 0..self.outputs.len() {
            write!(f, ", out o{k}")?;
        }
        for k in 0..self.arrays.len() {
            write!(f, ", out a{k}")?;
        }
        f.write_str(") {\n")?;
        for (local, code) in &self.locals {
            writeln!(f, "    let t{local} = {code};")?;
        }
        for (k, output) in self.outputs.iter().enumerate() {
            writeln!(f, "    o{k} = {output};")?;
        }
        for (k, array) in self.arrays.iter().enumerate() {
            writeln!(f, "    a{k} = Vec::with_capacity({});", array.len())?;
            for item in array {
                writeln!(f, "    a{k}.push({item});")?;
            }
        }
        writeln!(f, "    return {};", self.value)?;
        f.write_str("}\n")
    }
}
