//! Core types for symbolic expressions
//!
//! This module contains the fundamental types:
//! - `Expr` / `ExprKind` - hash-consed expression DAG
//! - `Domain` / `DomainRules` - the domain lattice deciding typing and algebra
//! - `Number` - numeric literal type
//! - `Value` / `HostType` / `MemberResolver` - host data bound into expressions
//! - `Environment` - concrete evaluation shared by folding and compiled code
//! - Display formatting and the visitor pattern

mod display;
pub(crate) mod domain;
pub(crate) mod environment;
pub(crate) mod expr;
pub(crate) mod host;
pub(crate) mod number;
pub(crate) mod store;
mod substitution;
mod summation;
pub mod visitor;

pub use domain::{Domain, DomainRules, HostDomain};
pub use environment::Environment;
pub use expr::{Expr, ExprKind, WeakExpr, comes_before};
pub use host::{HostArray, HostObject, HostType, MemberResolver, RecordType, ReflectResolver, Value};
pub use number::Number;
pub use store::live_nodes;
