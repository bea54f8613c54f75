//! Register bytecode of the bundled toolchain.
//!
//! Every instruction writes one destination register. Registers `0..params`
//! hold the arguments; the rest are assigned once by the compiler, except loop
//! variables, which each iteration overwrites.

use crate::Number;

/// Register index.
pub(crate) type Reg = u32;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Instruction {
    /// Captured host constant.
    LoadData { dst: Reg, slot: u32 },
    LoadNumber { dst: Reg, value: Number },
    Tuple { dst: Reg, items: Box<[Reg]> },
    /// Call, scalar product, member access or indexing, by operand values.
    Apply { dst: Reg, target: Reg, argument: Reg },
    Add { dst: Reg, left: Reg, right: Reg },
    /// Matrix product.
    Multiply { dst: Reg, left: Reg, right: Reg },
    Inverse { dst: Reg, src: Reg },
    Transpose { dst: Reg, src: Reg },
    /// Runs `body` once per iteration and combines `result` into `dst`.
    Loop {
        dst: Reg,
        kind: LoopKind,
        body: Box<[Instruction]>,
        result: Reg,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LoopKind {
    /// Sums `result` for `var` from `lower` to `upper` inclusive.
    Range { var: Reg, lower: Reg, upper: Reg },
    /// Sums `result` for `var` over the elements of `collection`.
    Each { var: Reg, collection: Reg },
    /// Collects `result` at every `(row, col)` into a matrix.
    Grid {
        row: Reg,
        col: Reg,
        rows: usize,
        cols: usize,
    },
}
