//! Typed Symbolic Expression DAG
//!
//! A library for building, normalizing, differentiating and compiling typed
//! symbolic expressions over host data.
//!
//! # Features
//! - Hash-consed expression DAG: structurally equal expressions are the same node
//! - Domain lattice deciding typing, commutativity and derivative rules
//! - Generic `Apply` node for calls, products, member access and indexing
//! - Reverse-chain differentiation with per-call memoization
//! - Fixed-point normalization with constant folding through a member resolver
//! - Symbolic matrices and indexed / collection summations
//! - Batch compilation with common-subexpression elimination behind a
//!   pluggable [`Toolchain`]
//!
//! # Usage Examples
//!
//! ```
//! use symdag::{Domain, Expr, Value};
//!
//! let x = Expr::symbol("x", Domain::Reals);
//! let e = 3 * (2 * &x).sin();
//!
//! let d = e.derive(&x).unwrap();
//! assert_eq!(d.to_string(), "6*cos(2*x)");
//!
//! let f = d.compile(&[x]).unwrap();
//! assert_eq!(f.evaluate(&[Value::Int(0)]).unwrap().as_f64(), Some(6.0));
//! ```
//!
//! # Host Data
//!
//! Host values enter expressions through [`Expr::constant`] and symbols whose
//! domain wraps a [`HostType`]. Field access and indexing are resolved by a
//! [`MemberResolver`]; [`ReflectResolver`] handles arrays and
//! [`HostObject`] records.

mod core;
mod diff;
mod error;
mod evaluator;
pub mod functions;
pub mod matrix;
mod simplification;

#[cfg(test)]
mod tests;

// Re-export key types for easier usage
pub use crate::core::visitor::{self, ExprVisitor, NodeCounter, SymbolCollector, walk_expr};
pub use crate::core::{
    Domain, DomainRules, Environment, Expr, ExprKind, HostArray, HostDomain, HostObject, HostType,
    MemberResolver, Number, RecordType, ReflectResolver, Value, WeakExpr, comes_before, live_nodes,
};
pub use diff::DeriveCache;
pub use error::{Diagnostic, ErrorKind, ExprError, ResolveError, Severity};
pub use evaluator::{
    BytecodeToolchain, CompiledFunction, EntryPoint, Evaluation, ExpressionCompiler, Job, JobKey,
    MAX_REGISTERS, Module, Parameter, SourceUnit, Toolchain, source,
};
pub use functions::{Function, NativeEval, NativePartial};
pub use matrix::{DenseArithmetic, Matrix, MatrixArithmetic};
pub use simplification::{DEFAULT_MAX_UNROLL, Normalizer};
