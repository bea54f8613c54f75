//! Toolchain collaborator boundary.
//!
//! A [`Toolchain`] turns a [`SourceUnit`] into a loadable [`Module`] or a list
//! of diagnostics. The module receives the unit's captured host constants
//! through [`Module::initialize`] and hands out one [`EntryPoint`] per
//! generated function. [`BytecodeToolchain`](super::BytecodeToolchain) is the
//! bundled implementation; a transpiling or JIT backend plugs in here.

use std::sync::Arc;

use super::Evaluation;
use super::source::SourceUnit;
use crate::core::host::Value;
use crate::error::{Diagnostic, ExprError};

/// Compiles a whole batch at once.
pub trait Toolchain: Send + Sync {
    /// # Errors
    /// Every diagnostic found in the unit; one error fails the batch.
    fn build(&self, unit: &SourceUnit) -> Result<Box<dyn Module>, Vec<Diagnostic>>;
}

/// A loaded compilation result.
pub trait Module: Send + Sync {
    /// Data-initialization hook, called once with [`SourceUnit::data`] before
    /// any entry point is requested.
    ///
    /// # Errors
    /// Captured constants the module cannot hold.
    fn initialize(&mut self, data: &[Value]) -> Result<(), ExprError>;

    /// Entry point of the generated function called `name`.
    fn entry(&self, name: &str) -> Option<Arc<dyn EntryPoint>>;
}

/// A callable generated function.
pub trait EntryPoint: Send + Sync {
    /// Runs the function. Arguments have already been checked against the
    /// declared parameter types.
    ///
    /// # Errors
    /// Failures of the operations the function performs.
    fn invoke(&self, args: &[Value]) -> Result<Evaluation, ExprError>;
}
