//! Statement list to register bytecode.
//!
//! # Compilation Process
//!
//! 1. Arguments are placed in registers `0..params`
//! 2. Each hoisted local is compiled once; later references reuse its register
//! 3. Sums and matrix chains are folded pairwise, left to right
//! 4. Loop bodies are compiled into nested instruction lists
//!
//! Problems are collected as [`Diagnostic`]s rather than returned on the
//! first hit, so one build reports everything wrong with a function.
//!
//! # Register Limit
//!
//! Registers are never reused. A function needing more than
//! [`MAX_REGISTERS`] is rejected.

use rustc_hash::{FxHashMap, FxHashSet};

use super::instruction::{Instruction, LoopKind, Reg};
use super::source::{Block, Code, FunctionSource, LocalId, VarId};
use crate::error::Diagnostic;
use crate::Number;

/// Maximum number of registers one generated function may use.
pub const MAX_REGISTERS: usize = 1 << 16;

/// Compiled form of one generated function.
#[derive(Debug)]
pub(crate) struct Program {
    pub(crate) instructions: Box<[Instruction]>,
    pub(crate) registers: usize,
    pub(crate) params: usize,
    pub(crate) value: Reg,
    pub(crate) outputs: Box<[Reg]>,
    pub(crate) arrays: Box<[Box<[Reg]>]>,
}

pub(crate) struct Compiler<'a> {
    function: &'a str,
    /// Innermost emission target last.
    buffers: Vec<Vec<Instruction>>,
    registers: usize,
    locals: FxHashMap<LocalId, Reg>,
    vars: FxHashMap<VarId, Reg>,
    unbound: FxHashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

fn reg(n: usize) -> Reg {
    Reg::try_from(n).unwrap_or(Reg::MAX)
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(function: &'a str) -> Self {
        Self {
            function,
            buffers: vec![Vec::with_capacity(64)],
            registers: 0,
            locals: FxHashMap::default(),
            vars: FxHashMap::default(),
            unbound: FxHashSet::default(),
            diagnostics: Vec::new(),
        }
    }

    /// # Errors
    /// Every diagnostic found in the function.
    pub(crate) fn compile(mut self, source: &FunctionSource) -> Result<Program, Vec<Diagnostic>> {
        self.registers = source.params.len();
        for (id, code) in &source.locals {
            let r = self.lower(code);
            self.locals.insert(*id, r);
        }
        let value = self.lower(&source.value);
        let outputs = source.outputs.iter().map(|o| self.lower(o)).collect();
        let arrays = source
            .arrays
            .iter()
            .map(|array| array.iter().map(|item| self.lower(item)).collect())
            .collect();

        if self.registers > MAX_REGISTERS {
            let message = format!(
                "register limit exceeded: {} needed, {MAX_REGISTERS} available",
                self.registers
            );
            self.diagnostics.push(Diagnostic::error(Some(self.function), message));
        }
        if !self.diagnostics.is_empty() {
            return Err(self.diagnostics);
        }
        Ok(Program {
            instructions: self.buffers.pop().unwrap_or_default().into_boxed_slice(),
            registers: self.registers,
            params: source.params.len(),
            value,
            outputs,
            arrays,
        })
    }

    fn alloc(&mut self) -> Reg {
        let r = reg(self.registers);
        self.registers += 1;
        r
    }

    fn emit(&mut self, instruction: Instruction) {
        if let Some(buffer) = self.buffers.last_mut() {
            buffer.push(instruction);
        }
    }

    fn error(&mut self, message: String) {
        self.diagnostics.push(Diagnostic::error(Some(self.function), message));
    }

    fn number(&mut self, value: Number) -> Reg {
        let dst = self.alloc();
        self.emit(Instruction::LoadNumber { dst, value });
        dst
    }

    /// Folds `items` left to right with a binary instruction.
    fn fold(&mut self, items: &[Code], op: fn(Reg, Reg, Reg) -> Instruction) -> Reg {
        let Some((first, rest)) = items.split_first() else {
            return self.number(Number::Int(0));
        };
        let mut acc = self.lower(first);
        for item in rest {
            let right = self.lower(item);
            let dst = self.alloc();
            self.emit(op(dst, acc, right));
            acc = dst;
        }
        acc
    }

    /// Compiles `block` into a fresh instruction list.
    fn nested(&mut self, block: &Block) -> (Box<[Instruction]>, Reg) {
        self.buffers.push(Vec::new());
        for (id, code) in &block.locals {
            let r = self.lower(code);
            self.locals.insert(*id, r);
        }
        let result = self.lower(&block.value);
        let body = self.buffers.pop().unwrap_or_default();
        (body.into_boxed_slice(), result)
    }

    fn lower(&mut self, code: &Code) -> Reg {
        match code {
            Code::Param(k) => reg(*k),
            Code::Local(id) => match self.locals.get(id) {
                Some(&r) => r,
                None => {
                    self.error(format!("local t{id} used before its binding"));
                    self.number(Number::Int(0))
                }
            },
            Code::Bound(var) => match self.vars.get(var) {
                Some(&r) => r,
                None => {
                    self.error(format!("loop variable v{var} used outside its loop"));
                    self.number(Number::Int(0))
                }
            },
            Code::Data(slot) => {
                let dst = self.alloc();
                self.emit(Instruction::LoadData {
                    dst,
                    slot: reg(*slot),
                });
                dst
            }
            Code::Number(n) => self.number(*n),
            Code::Unbound(name) => {
                if self.unbound.insert(name.clone()) {
                    self.error(format!("unbound symbol `{name}` is not a parameter"));
                }
                self.number(Number::Int(0))
            }
            Code::Tuple(items) => {
                let items = items.iter().map(|item| self.lower(item)).collect();
                let dst = self.alloc();
                self.emit(Instruction::Tuple { dst, items });
                dst
            }
            Code::Apply(target, argument) => {
                let target = self.lower(target);
                let argument = self.lower(argument);
                let dst = self.alloc();
                self.emit(Instruction::Apply {
                    dst,
                    target,
                    argument,
                });
                dst
            }
            Code::Sum(terms) => self.fold(terms, |dst, left, right| Instruction::Add {
                dst,
                left,
                right,
            }),
            Code::Multiply(factors) => {
                self.fold(factors, |dst, left, right| Instruction::Multiply {
                    dst,
                    left,
                    right,
                })
            }
            Code::Inverse(inner) => {
                let src = self.lower(inner);
                let dst = self.alloc();
                self.emit(Instruction::Inverse { dst, src });
                dst
            }
            Code::Transpose(inner) => {
                let src = self.lower(inner);
                let dst = self.alloc();
                self.emit(Instruction::Transpose { dst, src });
                dst
            }
            Code::Generate {
                rows,
                cols,
                row,
                col,
                element,
            } => {
                let (row_reg, col_reg) = (self.alloc(), self.alloc());
                self.vars.insert(*row, row_reg);
                self.vars.insert(*col, col_reg);
                let (body, result) = self.nested(element);
                let dst = self.alloc();
                self.emit(Instruction::Loop {
                    dst,
                    kind: LoopKind::Grid {
                        row: row_reg,
                        col: col_reg,
                        rows: *rows,
                        cols: *cols,
                    },
                    body,
                    result,
                });
                dst
            }
            Code::Range {
                var,
                lower,
                upper,
                body,
            } => {
                let lower = self.lower(lower);
                let upper = self.lower(upper);
                let var_reg = self.alloc();
                self.vars.insert(*var, var_reg);
                let (body, result) = self.nested(body);
                let dst = self.alloc();
                self.emit(Instruction::Loop {
                    dst,
                    kind: LoopKind::Range {
                        var: var_reg,
                        lower,
                        upper,
                    },
                    body,
                    result,
                });
                dst
            }
            Code::Each {
                var,
                collection,
                body,
            } => {
                let collection = self.lower(collection);
                let var_reg = self.alloc();
                self.vars.insert(*var, var_reg);
                let (body, result) = self.nested(body);
                let dst = self.alloc();
                self.emit(Instruction::Loop {
                    dst,
                    kind: LoopKind::Each {
                        var: var_reg,
                        collection,
                    },
                    body,
                    result,
                });
                dst
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;
    use crate::core::host::HostType;
    use crate::evaluator::source::Parameter;

    fn function(value: Code, locals: Vec<(LocalId, Code)>) -> FunctionSource {
        FunctionSource {
            name: "f".into(),
            params: vec![Parameter {
                name: "x".into(),
                ty: HostType::Real,
            }],
            locals,
            value,
            outputs: Vec::new(),
            arrays: Vec::new(),
        }
    }

    #[test]
    fn test_sum_folds_pairwise() {
        let code = Code::Sum(vec![Code::Number(Number::Int(1)), Code::Param(0), Code::Param(0)]);
        let program = Compiler::new("f").compile(&function(code, Vec::new())).unwrap();
        let adds = program
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Add { .. }))
            .count();
        assert_eq!(adds, 2);
        assert_eq!(program.params, 1);
    }

    #[test]
    fn test_locals_are_compiled_once() {
        let shared = Code::Apply(Box::new(Code::Param(0)), Box::new(Code::Param(0)));
        let code = Code::Sum(vec![Code::Local(0), Code::Local(0)]);
        let program = Compiler::new("f")
            .compile(&function(code, vec![(0, shared)]))
            .unwrap();
        let applies = program
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Apply { .. }))
            .count();
        assert_eq!(applies, 1);
    }

    #[test]
    fn test_unbound_symbols_are_diagnosed_once() {
        let code = Code::Sum(vec![
            Code::Unbound("y".into()),
            Code::Unbound("y".into()),
            Code::Unbound("z".into()),
        ]);
        let diagnostics = Compiler::new("f")
            .compile(&function(code, Vec::new()))
            .unwrap_err();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].function.as_deref(), Some("f"));
        assert!(diagnostics[0].message.contains("`y`"));
    }
}
