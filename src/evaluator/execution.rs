//! The bundled toolchain: compiles statement lists to register bytecode and
//! interprets it.
//!
//! Operations on values go through the same [`Environment`] normalization
//! folds constants with, so compiled and interpreted results agree.

use std::sync::Arc;

use log::debug;
use rustc_hash::FxHashMap;

use super::compiler::{Compiler, Program};
use super::instruction::{Instruction, LoopKind, Reg};
use super::source::SourceUnit;
use super::toolchain::{EntryPoint, Module, Toolchain};
use super::Evaluation;
use crate::core::environment::Environment;
use crate::core::host::Value;
use crate::error::{Diagnostic, ExprError};
use crate::matrix::Matrix;
use crate::Number;

/// Register bytecode toolchain.
#[derive(Clone, Default)]
pub struct BytecodeToolchain {
    env: Environment,
}

impl BytecodeToolchain {
    #[must_use]
    pub fn new(env: Environment) -> Self {
        Self { env }
    }
}

impl Toolchain for BytecodeToolchain {
    fn build(&self, unit: &SourceUnit) -> Result<Box<dyn Module>, Vec<Diagnostic>> {
        let mut programs = FxHashMap::default();
        let mut diagnostics = Vec::new();
        for function in unit.functions() {
            match Compiler::new(&function.name).compile(function) {
                Ok(program) => {
                    debug!(
                        "{}: {} instruction(s), {} register(s)",
                        function.name,
                        program.instructions.len(),
                        program.registers
                    );
                    programs.insert(function.name.clone(), Arc::new(program));
                }
                Err(found) => diagnostics.extend(found),
            }
        }
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        Ok(Box::new(BytecodeModule {
            env: self.env.clone(),
            programs,
            data: Arc::from(Vec::new()),
        }))
    }
}

struct BytecodeModule {
    env: Environment,
    programs: FxHashMap<String, Arc<Program>>,
    data: Arc<[Value]>,
}

impl Module for BytecodeModule {
    fn initialize(&mut self, data: &[Value]) -> Result<(), ExprError> {
        self.data = Arc::from(data);
        Ok(())
    }

    fn entry(&self, name: &str) -> Option<Arc<dyn EntryPoint>> {
        let program = self.programs.get(name)?;
        Some(Arc::new(BytecodeEntry {
            program: Arc::clone(program),
            data: Arc::clone(&self.data),
            env: self.env.clone(),
        }))
    }
}

struct BytecodeEntry {
    program: Arc<Program>,
    data: Arc<[Value]>,
    env: Environment,
}

impl EntryPoint for BytecodeEntry {
    fn invoke(&self, args: &[Value]) -> Result<Evaluation, ExprError> {
        let program = &*self.program;
        if args.len() != program.params {
            return Err(ExprError::ArgumentCount {
                expected: program.params,
                got: args.len(),
            });
        }
        let mut frame = Frame {
            registers: vec![Value::Int(0); program.registers],
            data: &self.data,
            env: &self.env,
        };
        frame.registers[..args.len()].clone_from_slice(args);
        frame.run(&program.instructions)?;

        let read = |r: &Reg| frame.get(*r).clone();
        Ok(Evaluation {
            value: read(&program.value),
            outputs: program.outputs.iter().map(read).collect(),
            arrays: program
                .arrays
                .iter()
                .map(|array| array.iter().map(read).collect())
                .collect(),
        })
    }
}

struct Frame<'a> {
    registers: Vec<Value>,
    data: &'a [Value],
    env: &'a Environment,
}

impl Frame<'_> {
    #[inline]
    fn get(&self, r: Reg) -> &Value {
        &self.registers[r as usize]
    }

    #[inline]
    fn set(&mut self, r: Reg, value: Value) {
        self.registers[r as usize] = value;
    }

    fn run(&mut self, instructions: &[Instruction]) -> Result<(), ExprError> {
        for instruction in instructions {
            match instruction {
                Instruction::LoadData { dst, slot } => {
                    let value = self.data.get(*slot as usize).cloned().ok_or_else(|| {
                        ExprError::evaluation(format!("captured constant {slot} was never initialized"))
                    })?;
                    self.set(*dst, value);
                }
                Instruction::LoadNumber { dst, value } => self.set(*dst, Value::from(*value)),
                Instruction::Tuple { dst, items } => {
                    let items: Arc<[Value]> = items.iter().map(|r| self.get(*r).clone()).collect();
                    self.set(*dst, Value::Tuple(items));
                }
                Instruction::Apply {
                    dst,
                    target,
                    argument,
                }
                | Instruction::Multiply {
                    dst,
                    left: target,
                    right: argument,
                } => {
                    let value = self.env.apply(self.get(*target), self.get(*argument))?;
                    self.set(*dst, value);
                }
                Instruction::Add { dst, left, right } => {
                    let value = self.env.add(self.get(*left), self.get(*right))?;
                    self.set(*dst, value);
                }
                Instruction::Inverse { dst, src } => {
                    let value = self.env.inverse(self.get(*src))?;
                    self.set(*dst, value);
                }
                Instruction::Transpose { dst, src } => {
                    let value = self.env.transpose(self.get(*src))?;
                    self.set(*dst, value);
                }
                Instruction::Loop {
                    dst,
                    kind,
                    body,
                    result,
                } => {
                    let value = self.run_loop(kind, body, *result)?;
                    self.set(*dst, value);
                }
            }
        }
        Ok(())
    }

    fn run_loop(
        &mut self,
        kind: &LoopKind,
        body: &[Instruction],
        result: Reg,
    ) -> Result<Value, ExprError> {
        match *kind {
            LoopKind::Range { var, lower, upper } => {
                let bound = |v: &Value| match v.as_number() {
                    Some(Number::Int(n)) => Ok(n),
                    _ => Err(ExprError::evaluation(format!("summation bound {v} is not an integer"))),
                };
                let (lower, upper) = (bound(self.get(lower))?, bound(self.get(upper))?);
                let mut acc = Value::Int(0);
                for k in lower..=upper {
                    self.set(var, Value::Int(k));
                    self.run(body)?;
                    acc = self.env.add(&acc, self.get(result))?;
                }
                Ok(acc)
            }
            LoopKind::Each { var, collection } => {
                let Value::Array(array) = self.get(collection).clone() else {
                    return Err(ExprError::evaluation(format!(
                        "cannot iterate over {}",
                        self.get(collection)
                    )));
                };
                let mut acc = Value::Int(0);
                for item in array.items() {
                    self.set(var, item.clone());
                    self.run(body)?;
                    acc = self.env.add(&acc, self.get(result))?;
                }
                Ok(acc)
            }
            LoopKind::Grid {
                row,
                col,
                rows,
                cols,
            } => {
                let mut values = Vec::with_capacity(rows * cols);
                for j in 0..cols {
                    for i in 0..rows {
                        self.set(row, Value::Int(i64::try_from(i).unwrap_or(i64::MAX)));
                        self.set(col, Value::Int(i64::try_from(j).unwrap_or(i64::MAX)));
                        self.run(body)?;
                        let element = self.get(result);
                        values.push(element.as_f64().ok_or_else(|| {
                            ExprError::evaluation(format!("matrix element {element} is not a number"))
                        })?);
                    }
                }
                Ok(Value::from(Matrix::from_vec(rows, cols, values)))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;
    use crate::core::host::HostType;
    use crate::evaluator::source::{Block, Code, FunctionSource, Parameter};

    fn unit(value: Code, data: Vec<Value>) -> SourceUnit {
        let function = FunctionSource {
            name: "f".into(),
            params: vec![Parameter {
                name: "n".into(),
                ty: HostType::Integer,
            }],
            locals: Vec::new(),
            value,
            outputs: vec![Code::Param(0)],
            arrays: Vec::new(),
        };
        SourceUnit::new(vec![function], data)
    }

    fn invoke(unit: &SourceUnit, args: &[Value]) -> Result<Evaluation, ExprError> {
        let mut module = BytecodeToolchain::default().build(unit).unwrap();
        module.initialize(unit.data()).unwrap();
        module.entry("f").unwrap().invoke(args)
    }

    #[test]
    fn test_range_loop_sums() {
        // sum(v0 in 1..=n, v0 * v0)
        let body = Block {
            locals: Vec::new(),
            value: Code::Apply(Box::new(Code::Bound(0)), Box::new(Code::Bound(0))),
        };
        let code = Code::Range {
            var: 0,
            lower: Box::new(Code::Number(Number::Int(1))),
            upper: Box::new(Code::Param(0)),
            body: Box::new(body),
        };
        let result = invoke(&unit(code, Vec::new()), &[Value::Int(4)]).unwrap();
        assert_eq!(result.value, Value::Int(30));
        assert_eq!(result.outputs, vec![Value::Int(4)]);
    }

    #[test]
    fn test_each_loop_over_captured_array() {
        let body = Block {
            locals: Vec::new(),
            value: Code::Bound(0),
        };
        let code = Code::Each {
            var: 0,
            collection: Box::new(Code::Data(0)),
            body: Box::new(body),
        };
        let data = vec![Value::ints([3, 4, 5])];
        let result = invoke(&unit(code, data), &[Value::Int(0)]).unwrap();
        assert_eq!(result.value, Value::Int(12));
    }

    #[test]
    fn test_grid_builds_matrix() {
        let element = Block {
            locals: Vec::new(),
            value: Code::Sum(vec![Code::Bound(0), Code::Bound(1)]),
        };
        let code = Code::Generate {
            rows: 2,
            cols: 2,
            row: 0,
            col: 1,
            element: Box::new(element),
        };
        let result = invoke(&unit(code, Vec::new()), &[Value::Int(0)]).unwrap();
        let Value::Matrix(m) = result.value else {
            unreachable!("expected a matrix");
        };
        assert_eq!(*m, Matrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 2.0]));
    }

    #[test]
    fn test_wrong_argument_count() {
        let err = invoke(&unit(Code::Param(0), Vec::new()), &[]).unwrap_err();
        assert_eq!(err, ExprError::ArgumentCount { expected: 1, got: 0 });
    }
}
