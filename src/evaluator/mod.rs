//! Compilation of expressions into callable functions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌─────────────┐    ┌────────────┐    ┌──────────────────┐
//! │  Job(Expr)   │ -> │ linearize + │ -> │ SourceUnit │ -> │    Toolchain     │
//! │ + outputs    │    │     CSE     │    │ (stmt list)│    │ build/initialize │
//! └──────────────┘    └─────────────┘    └────────────┘    └──────────────────┘
//!                                                                   │
//!                                                                   ▼
//!                                                         ┌──────────────────┐
//!                                                         │ CompiledFunction │
//!                                                         └──────────────────┘
//! ```
//!
//! Jobs are queued on an [`ExpressionCompiler`] and compiled as one batch: a
//! diagnostic in any job fails the whole batch with
//! [`ExprError::Compilation`]. Each job's forest (return value, auxiliary
//! outputs, output arrays) is linearized with common-subexpression
//! elimination, so a DAG with heavy sharing compiles to code linear in its
//! number of distinct nodes.
//!
//! # Example
//!
//! ```
//! use symdag::{Domain, Expr, Value};
//!
//! let x = Expr::symbol("x", Domain::Reals);
//! let y = Expr::symbol("y", Domain::Reals);
//! let e = x.powi(3) / &x * &y;
//!
//! let f = e.compile(&[x, y]).unwrap();
//! assert_eq!(f.evaluate(&[Value::Int(3), Value::Int(2)]).unwrap(), Value::Int(18));
//! ```
//!
//! # Modules
//!
//! - [`source`]: language-neutral statement lists and their rendering
//! - `linearize`: counting pass and hoisting of shared sub-expressions
//! - [`toolchain`]: the collaborator boundary
//! - `compiler`, `execution`: the bundled register bytecode toolchain

mod compiler;
mod execution;
mod instruction;
mod linearize;
pub mod source;
pub mod toolchain;

use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use slotmap::{SecondaryMap, SlotMap};

pub use compiler::MAX_REGISTERS;
pub use execution::BytecodeToolchain;
pub use source::{Parameter, SourceUnit};
pub use toolchain::{EntryPoint, Module, Toolchain};

use crate::core::environment::Environment;
use crate::core::expr::Expr;
use crate::core::host::{MemberResolver, Value};
use crate::error::{Diagnostic, ExprError};
use crate::matrix::MatrixArithmetic;
use linearize::{DataPool, Linearizer};

slotmap::new_key_type! {
    /// Handle of a job queued on an [`ExpressionCompiler`].
    pub struct JobKey;
}

/// One function to generate: a return value over typed parameters, plus
/// optional auxiliary outputs and output arrays.
#[derive(Debug, Clone)]
pub struct Job {
    value: Expr,
    params: Vec<Expr>,
    outputs: Vec<Expr>,
    arrays: Vec<Vec<Expr>>,
}

impl Job {
    /// Parameters are symbols; their declared types come from their domains.
    pub fn new(value: Expr, params: impl IntoIterator<Item = Expr>) -> Self {
        Self {
            value,
            params: params.into_iter().collect(),
            outputs: Vec::new(),
            arrays: Vec::new(),
        }
    }

    /// Adds an auxiliary output, returned in [`Evaluation::outputs`].
    #[must_use]
    pub fn output(mut self, e: Expr) -> Self {
        self.outputs.push(e);
        self
    }

    /// Adds an output array, returned in [`Evaluation::arrays`].
    #[must_use]
    pub fn output_array(mut self, items: impl IntoIterator<Item = Expr>) -> Self {
        self.arrays.push(items.into_iter().collect());
        self
    }

    fn validate(&self) -> Result<(), ExprError> {
        for (k, param) in self.params.iter().enumerate() {
            if !param.is_symbol() {
                return Err(ExprError::NotASymbol(param.to_string()));
            }
            if self.params[..k].contains(param) {
                return Err(ExprError::evaluation(format!("parameter `{param}` is listed twice")));
            }
        }
        Ok(())
    }
}

/// Results of one call of a [`CompiledFunction`].
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Value,
    pub outputs: Vec<Value>,
    pub arrays: Vec<Vec<Value>>,
}

/// A generated function bound to its entry point.
#[derive(Clone)]
pub struct CompiledFunction {
    name: String,
    params: Vec<Parameter>,
    entry: Arc<dyn EntryPoint>,
}

impl CompiledFunction {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Calls the function with one value per parameter.
    ///
    /// # Errors
    /// [`ExprError::ArgumentCount`] or [`ExprError::ArgumentType`] when the
    /// arguments do not match the signature, and evaluation failures.
    pub fn call(&self, args: &[Value]) -> Result<Evaluation, ExprError> {
        if args.len() != self.params.len() {
            return Err(ExprError::ArgumentCount {
                expected: self.params.len(),
                got: args.len(),
            });
        }
        for (index, (param, arg)) in self.params.iter().zip(args).enumerate() {
            if !param.ty.accepts(arg) {
                return Err(ExprError::ArgumentType {
                    index,
                    expected: param.ty.to_string(),
                    got: arg.host_type().to_string(),
                });
            }
        }
        self.entry.invoke(args)
    }

    /// Return value only.
    ///
    /// # Errors
    /// See [`CompiledFunction::call`].
    pub fn evaluate(&self, args: &[Value]) -> Result<Value, ExprError> {
        self.call(args).map(|evaluation| evaluation.value)
    }
}

impl fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Batch compiler.
///
/// # Example
/// ```
/// use symdag::{Domain, Expr, ExpressionCompiler, Job, Value};
///
/// let x = Expr::symbol("x", Domain::Reals);
/// let mut compiler = ExpressionCompiler::new();
/// let square = compiler.add(Job::new(&x * &x, [x.clone()])).unwrap();
/// let both = compiler
///     .add(Job::new(&x + 1, [x.clone()]).output(x.sin()))
///     .unwrap();
///
/// let functions = compiler.compile_all().unwrap();
/// assert_eq!(functions[square].evaluate(&[Value::Int(3)]).unwrap(), Value::Int(9));
/// assert_eq!(functions[both].call(&[Value::Int(0)]).unwrap().outputs.len(), 1);
/// ```
pub struct ExpressionCompiler {
    env: Environment,
    toolchain: Option<Arc<dyn Toolchain>>,
    jobs: SlotMap<JobKey, Job>,
}

impl Default for ExpressionCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionCompiler {
    /// Bundled bytecode toolchain, reflective resolver, dense matrices.
    #[must_use]
    pub fn new() -> Self {
        Self {
            env: Environment::default(),
            toolchain: None,
            jobs: SlotMap::with_key(),
        }
    }

    /// Replaces the bundled toolchain.
    #[must_use]
    pub fn toolchain(mut self, toolchain: Arc<dyn Toolchain>) -> Self {
        self.toolchain = Some(toolchain);
        self
    }

    /// Member resolver of the bundled toolchain.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn MemberResolver>) -> Self {
        self.env.resolver = resolver;
        self
    }

    /// Matrix arithmetic of the bundled toolchain.
    #[must_use]
    pub fn matrices(mut self, matrices: Arc<dyn MatrixArithmetic>) -> Self {
        self.env.matrices = matrices;
        self
    }

    /// Queues a job for the next [`compile_all`](Self::compile_all).
    ///
    /// # Errors
    /// [`ExprError::NotASymbol`] if a parameter is not a symbol.
    pub fn add(&mut self, job: Job) -> Result<JobKey, ExprError> {
        job.validate()?;
        Ok(self.jobs.insert(job))
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Compiles every queued job as one batch and empties the queue.
    ///
    /// # Errors
    /// [`ExprError::Compilation`] with every diagnostic of the batch, or a
    /// failure of the module's data-initialization hook.
    pub fn compile_all(&mut self) -> Result<SecondaryMap<JobKey, CompiledFunction>, ExprError> {
        let jobs: Vec<(JobKey, Job)> = self.jobs.drain().collect();
        debug!("compiling {} job(s)", jobs.len());

        let mut data = DataPool::default();
        let mut names = Vec::with_capacity(jobs.len());
        let mut functions = Vec::with_capacity(jobs.len());
        for (k, (key, job)) in jobs.iter().enumerate() {
            let name = format!("f{k}");
            let function = Linearizer::new(&job.params, &mut data).function(
                name.clone(),
                &job.value,
                &job.outputs,
                &job.arrays,
            );
            names.push((*key, name, function.params.clone()));
            functions.push(function);
        }
        let unit = SourceUnit::new(functions, data.into_values());
        trace!("generated source:\n{}", unit.text());

        let toolchain: Arc<dyn Toolchain> = match &self.toolchain {
            Some(toolchain) => Arc::clone(toolchain),
            None => Arc::new(BytecodeToolchain::new(self.env.clone())),
        };
        let mut module = toolchain
            .build(&unit)
            .map_err(|diagnostics| ExprError::Compilation { diagnostics })?;
        module.initialize(unit.data())?;

        let mut compiled = SecondaryMap::with_capacity(names.len());
        for (key, name, params) in names {
            let entry = module.entry(&name).ok_or_else(|| ExprError::Compilation {
                diagnostics: vec![Diagnostic::error(
                    Some(name.as_str()),
                    "toolchain produced no entry point",
                )],
            })?;
            compiled.insert(key, CompiledFunction { name, params, entry });
        }
        Ok(compiled)
    }
}

impl Expr {
    /// Compiles this expression as a function of `params` with the bundled
    /// toolchain.
    ///
    /// # Errors
    /// [`ExprError::NotASymbol`] for a non-symbol parameter,
    /// [`ExprError::Compilation`] when the expression has free symbols that
    /// are not parameters.
    pub fn compile(&self, params: &[Expr]) -> Result<CompiledFunction, ExprError> {
        let mut compiler = ExpressionCompiler::new();
        let key = compiler.add(Job::new(self.clone(), params.iter().cloned()))?;
        compiler
            .compile_all()?
            .remove(key)
            .ok_or_else(|| ExprError::evaluation("compiled batch lost its only job"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;
    use crate::core::host::HostType;
    use crate::error::ErrorKind;
    use crate::{Domain, matrix};

    #[test]
    fn test_unbound_symbol_fails_whole_batch() {
        let x = Expr::symbol("x", Domain::Reals);
        let y = Expr::symbol("y", Domain::Reals);
        let mut compiler = ExpressionCompiler::new();
        compiler.add(Job::new(&x + 1, [x.clone()])).unwrap();
        compiler.add(Job::new(&x * &y, [x.clone()])).unwrap();
        let err = compiler.compile_all().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compilation);
        let ExprError::Compilation { diagnostics } = err else {
            unreachable!();
        };
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].function.as_deref(), Some("f1"));
        assert!(compiler.is_empty());
    }

    #[test]
    fn test_parameters_must_be_symbols() {
        let x = Expr::symbol("x", Domain::Reals);
        let err = (&x + 1).compile(&[&x + 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_signature_is_checked() {
        let n = Expr::symbol("n", Domain::Integers);
        let f = (&n * 2).compile(&[n]).unwrap();
        assert_eq!(f.params()[0].ty, HostType::Integer);
        assert_eq!(f.evaluate(&[Value::Int(4)]).unwrap(), Value::Int(8));
        assert!(matches!(
            f.evaluate(&[Value::Float(0.5)]),
            Err(ExprError::ArgumentType { index: 0, .. })
        ));
        assert!(matches!(
            f.evaluate(&[]),
            Err(ExprError::ArgumentCount { expected: 1, got: 0 })
        ));
    }

    #[test]
    fn test_outputs_and_arrays() {
        let x = Expr::symbol("x", Domain::Reals);
        let job = Job::new(x.exp(), [x.clone()])
            .output(&x * 3)
            .output_array([x.clone(), &x + 1, &x * &x]);
        let mut compiler = ExpressionCompiler::new();
        let key = compiler.add(job).unwrap();
        let f = compiler.compile_all().unwrap().remove(key).unwrap();
        let result = f.call(&[Value::Int(2)]).unwrap();
        assert_eq!(result.outputs, vec![Value::Int(6)]);
        assert_eq!(
            result.arrays,
            vec![vec![Value::Int(2), Value::Int(3), Value::Int(4)]]
        );
        assert!((result.value.as_f64().unwrap() - 2.0_f64.exp()).abs() < 1e-12);
    }

    #[test]
    fn test_summation_and_matrix_code() {
        let n = Expr::symbol("n", Domain::Integers);
        let s = Expr::indexed_sum(1, &n, |i| Ok(i * i)).unwrap();
        let f = s.compile(&[n]).unwrap();
        assert_eq!(f.evaluate(&[Value::Int(3)]).unwrap(), Value::Int(14));
        assert_eq!(f.evaluate(&[Value::Int(0)]).unwrap(), Value::Int(0));

        let a = Expr::symbol("A", Domain::Matrices);
        let e = matrix::multiply(vec![matrix::transpose(a.clone()).unwrap(), a.clone()]).unwrap();
        let g = e.compile(&[a]).unwrap();
        let m = matrix::Matrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let Value::Matrix(product) = g.evaluate(&[Value::from(m.clone())]).unwrap() else {
            unreachable!();
        };
        assert_eq!(*product, m.transpose() * &m);
    }

    #[test]
    fn test_captured_constants_reach_the_module() {
        let k = Expr::symbol("k", Domain::Integers);
        let table = Expr::constant(Value::reals([0.5, 1.5, 2.5]));
        let e = table.at([k.clone()]).unwrap() * 2;
        let f = e.compile(&[k]).unwrap();
        assert_eq!(f.evaluate(&[Value::Int(1)]).unwrap(), Value::Float(3.0));
    }
}
