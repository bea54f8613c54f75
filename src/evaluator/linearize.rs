//! Linearization of an expression forest into statement lists.
//!
//! # Common-subexpression elimination
//!
//! A counting pass visits the roots of a block (return value, outputs, array
//! elements). The first visit of a node records its height and recurses; later
//! visits only bump its occurrence count, so a shared sub-DAG is walked once.
//! Every composite node seen more than once is hoisted into a local binding.
//! Bindings are emitted by ascending height, so a hoisted node only refers to
//! locals emitted before it.
//!
//! Summation bodies and generator elements are separate blocks with their own
//! counting pass: they run once per loop iteration and may refer to the loop
//! variable. A node already bound in an enclosing block is reused as is.

use rustc_hash::FxHashMap;

use super::source::{Block, Code, FunctionSource, LocalId, Parameter, VarId};
use crate::core::expr::{Expr, ExprKind};
use crate::core::host::{HostType, Value};
use crate::matrix;

/// Captured host constants shared by every function of a unit.
#[derive(Default)]
pub(crate) struct DataPool {
    values: Vec<Value>,
    slots: FxHashMap<Expr, usize>,
}

impl DataPool {
    fn slot(&mut self, constant: &Expr, value: Value) -> usize {
        *self.slots.entry(constant.clone()).or_insert_with(|| {
            self.values.push(value);
            self.values.len() - 1
        })
    }

    pub(crate) fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[derive(Clone, Copy)]
struct Occurrence {
    count: usize,
    height: usize,
    first_seen: usize,
}

/// Occurrence counts of the nodes of one block.
#[derive(Default)]
struct Census {
    seen: FxHashMap<Expr, Occurrence>,
}

impl Census {
    fn visit(&mut self, e: &Expr) -> usize {
        if let Some(occurrence) = self.seen.get_mut(e) {
            occurrence.count += 1;
            return occurrence.height;
        }
        let height = scoped_children(e)
            .into_iter()
            .map(|c| self.visit(c) + 1)
            .max()
            .unwrap_or(0);
        let first_seen = self.seen.len();
        self.seen.insert(
            e.clone(),
            Occurrence {
                count: 1,
                height,
                first_seen,
            },
        );
        height
    }

    /// Nodes worth a local binding, in emission order.
    fn shared(&self) -> Vec<Expr> {
        let mut shared: Vec<(&Expr, Occurrence)> = self
            .seen
            .iter()
            .filter(|(e, o)| o.count > 1 && is_composite(e))
            .map(|(e, o)| (e, *o))
            .collect();
        shared.sort_by_key(|(_, o)| (o.height, o.first_seen));
        shared.into_iter().map(|(e, _)| e.clone()).collect()
    }
}

/// Children evaluated in the same block as `e`; loop bodies are excluded.
fn scoped_children(e: &Expr) -> Vec<&Expr> {
    match e.kind() {
        ExprKind::IndexedSum { lower, upper, .. } => vec![lower, upper],
        ExprKind::CollectionSum { collection, .. } => vec![collection],
        ExprKind::MatrixGenerator { .. } => Vec::new(),
        _ => e.children(),
    }
}

fn is_composite(e: &Expr) -> bool {
    !e.children().is_empty() && !e.is_constant()
}

/// Builds the statement list of one generated function.
pub(crate) struct Linearizer<'a> {
    params: &'a [Expr],
    data: &'a mut DataPool,
    /// Innermost scope last.
    scopes: Vec<FxHashMap<Expr, LocalId>>,
    /// Loop variables currently in scope, innermost last.
    bound: Vec<(Expr, VarId)>,
    next_local: LocalId,
    next_var: VarId,
}

impl<'a> Linearizer<'a> {
    pub(crate) fn new(params: &'a [Expr], data: &'a mut DataPool) -> Self {
        Self {
            params,
            data,
            scopes: Vec::new(),
            bound: Vec::new(),
            next_local: 0,
            next_var: 0,
        }
    }

    pub(crate) fn function(
        mut self,
        name: String,
        value: &Expr,
        outputs: &[Expr],
        arrays: &[Vec<Expr>],
    ) -> FunctionSource {
        let roots = std::iter::once(value)
            .chain(outputs)
            .chain(arrays.iter().flatten());
        let locals = self.open_scope(roots);
        let value = self.lower(value);
        let outputs = outputs.iter().map(|o| self.lower(o)).collect();
        let arrays = arrays
            .iter()
            .map(|array| array.iter().map(|item| self.lower(item)).collect())
            .collect();
        self.scopes.pop();
        let params = self
            .params
            .iter()
            .map(|p| Parameter {
                name: p.to_string(),
                ty: p.domain().native_type().unwrap_or(HostType::Any),
            })
            .collect();
        FunctionSource {
            name,
            params,
            locals,
            value,
            outputs,
            arrays,
        }
    }

    /// Counts `roots`, pushes a scope and emits its hoisted bindings.
    fn open_scope<'e>(&mut self, roots: impl IntoIterator<Item = &'e Expr>) -> Vec<(LocalId, Code)> {
        let mut census = Census::default();
        for root in roots {
            census.visit(root);
        }
        self.scopes.push(FxHashMap::default());
        let mut locals = Vec::new();
        for e in census.shared() {
            if self.lookup(&e).is_some() {
                continue;
            }
            let code = self.lower(&e);
            let id = self.next_local;
            self.next_local += 1;
            if let Some(scope) = self.scopes.last_mut() {
                scope.insert(e, id);
            }
            locals.push((id, code));
        }
        locals
    }

    fn lookup(&self, e: &Expr) -> Option<LocalId> {
        self.scopes.iter().rev().find_map(|scope| scope.get(e).copied())
    }

    fn bind(&mut self, index: &Expr) -> VarId {
        let var = self.next_var;
        self.next_var += 1;
        self.bound.push((index.clone(), var));
        var
    }

    /// Block evaluated with the given loop variables bound.
    fn block(&mut self, body: &Expr) -> Block {
        let locals = self.open_scope([body]);
        let value = self.lower(body);
        self.scopes.pop();
        Block { locals, value }
    }

    fn lower_all(&mut self, items: &[Expr]) -> Vec<Code> {
        items.iter().map(|e| self.lower(e)).collect()
    }

    fn lower(&mut self, e: &Expr) -> Code {
        if let Some(local) = self.lookup(e) {
            return Code::Local(local);
        }
        match e.kind() {
            ExprKind::Symbol(name) => {
                if let Some(k) = self.params.iter().position(|p| p == e) {
                    Code::Param(k)
                } else if let Some((_, var)) = self.bound.iter().rev().find(|(b, _)| b == e) {
                    Code::Bound(*var)
                } else {
                    Code::Unbound(name.to_string())
                }
            }
            ExprKind::Number(n) => Code::Number(*n),
            ExprKind::Object(_) | ExprKind::Field(_) | ExprKind::Function(_) => {
                match e.value() {
                    Some(value) => Code::Data(self.data.slot(e, value)),
                    None => Code::Unbound(e.to_string()),
                }
            }
            ExprKind::Tuple(items) => Code::Tuple(self.lower_all(items)),
            ExprKind::Apply { target, argument } => {
                Code::Apply(Box::new(self.lower(target)), Box::new(self.lower(argument)))
            }
            ExprKind::Sum(terms) => Code::Sum(self.lower_all(terms)),
            ExprKind::MatrixMultiply(factors) => Code::Multiply(self.lower_all(factors)),
            ExprKind::MatrixInverse(inner) => Code::Inverse(Box::new(self.lower(inner))),
            ExprKind::MatrixTranspose(inner) => Code::Transpose(Box::new(self.lower(inner))),
            ExprKind::MatrixGenerator {
                rows,
                cols,
                element,
            } => {
                let row = self.bind(matrix::row_index());
                let col = self.bind(matrix::col_index());
                let element = self.block(element);
                self.bound.truncate(self.bound.len() - 2);
                Code::Generate {
                    rows: *rows,
                    cols: *cols,
                    row,
                    col,
                    element: Box::new(element),
                }
            }
            ExprKind::IndexedSum {
                index,
                lower,
                upper,
                body,
            } => {
                let lower = Box::new(self.lower(lower));
                let upper = Box::new(self.lower(upper));
                let var = self.bind(index);
                let body = Box::new(self.block(body));
                self.bound.pop();
                Code::Range {
                    var,
                    lower,
                    upper,
                    body,
                }
            }
            ExprKind::CollectionSum {
                index,
                collection,
                body,
            } => {
                let collection = Box::new(self.lower(collection));
                let var = self.bind(index);
                let body = Box::new(self.block(body));
                self.bound.pop();
                Code::Each {
                    var,
                    collection,
                    body,
                }
            }
        }
    }
}
