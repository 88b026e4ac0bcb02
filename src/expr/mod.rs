//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

//! Expression algebra.
//!
//! Expressions are nodes of an append-only arena owned by a
//! [`Context`](crate::Context) and addressed by [`ExprId`]. Children are
//! handles, so a node may be shared by several parents; rewriting a shared
//! node is visible through all of them.
//!
//! Every method that walks a tree takes the depth of the node it starts from
//! internally and fails with [`Error::TooComplex`](crate::Error::TooComplex)
//! once [`Config::max_depth`](crate::Config::max_depth) is exceeded.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::{self, ObjectId, Table};
use crate::rel::RelId;
use crate::types::{SqlType, Value};

mod bind;
mod build;
mod copy;
mod matching;
mod props;
mod retype;

/// Handle of an expression node within its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub(crate) u32);

/// Cardinality class: how many values an expression yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Card {
    /// A single value.
    #[default]
    Atom,
    /// One value per group.
    Aggr,
    /// One value per row.
    Multi,
}

/// Simple comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CmpOp {
    /// The operator that holds after exchanging both operands.
    pub fn swap(self) -> CmpOp {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Lte => CmpOp::Gte,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Gte => CmpOp::Lte,
            op => op,
        }
    }

    /// Whether `a op b` and `b op a` are equivalent.
    pub fn is_reflexive(self) -> bool {
        matches!(self, CmpOp::Eq | CmpOp::NotEq)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::NotEq => "<>",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
        }
    }
}

/// Operator name of a comparison, inverted when `anti` is set.
pub fn compare_func(op: CmpOp, anti: bool) -> &'static str {
    if !anti {
        return op.symbol();
    }
    match op {
        CmpOp::Eq => "<>",
        CmpOp::NotEq => "=",
        CmpOp::Lt => ">",
        CmpOp::Lte => ">=",
        CmpOp::Gt => "<",
        CmpOp::Gte => "<=",
    }
}

/// Inclusiveness of both ends of a range predicate `low op x op high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeOps {
    pub low_inclusive: bool,
    pub high_inclusive: bool,
}

impl RangeOps {
    /// Combine a lower (`>`/`>=`) and an upper (`<`/`<=`) comparison.
    pub fn from_compares(low: CmpOp, high: CmpOp) -> Option<RangeOps> {
        let low_inclusive = match low {
            CmpOp::Gt => false,
            CmpOp::Gte => true,
            _ => return None,
        };
        let high_inclusive = match high {
            CmpOp::Lt => false,
            CmpOp::Lte => true,
            _ => return None,
        };
        Some(RangeOps {
            low_inclusive,
            high_inclusive,
        })
    }

    /// Comparison against the lower bound.
    pub fn lower(self) -> CmpOp {
        if self.low_inclusive {
            CmpOp::Gte
        } else {
            CmpOp::Gt
        }
    }

    /// Comparison against the upper bound.
    pub fn upper(self) -> CmpOp {
        if self.high_inclusive {
            CmpOp::Lte
        } else {
            CmpOp::Lt
        }
    }

    /// Two-bit code: bit 0 for an inclusive low end, bit 1 for the high end.
    pub fn bits(self) -> u8 {
        self.low_inclusive as u8 | (self.high_inclusive as u8) << 1
    }

    pub fn from_bits(bits: u8) -> RangeOps {
        RangeOps {
            low_inclusive: bits & 1 != 0,
            high_inclusive: bits & 2 != 0,
        }
    }
}

/// Relation and column alias of an expression. A non-zero `label` marks a
/// generated name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alias {
    pub label: u32,
    pub rname: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExprFlags {
    pub distinct: bool,
    pub anti: bool,
    pub intern: bool,
    pub no_nil: bool,
    pub has_no_nil: bool,
    pub basecol: bool,
    pub freevar: bool,
}

/// Physical planning hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prop {
    /// Column is hashable on its own; carries the primary key's table when
    /// the column leads it.
    HashCol(Option<ObjectId>),
    HashIdx(ObjectId),
    JoinIdx(ObjectId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    /// A literal; its SQL type is the node's `ty`.
    Value(Value),
    /// Positional statement argument.
    Ref(usize),
    /// Named parameter of a procedural frame.
    Param { name: String, frame: u32 },
    /// A list of rows, as produced by `VALUES`.
    Values(ExpList),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cmp {
    Simple {
        op: CmpOp,
        l: ExprId,
        r: ExprId,
    },
    /// `low < l < high` with the inclusiveness of `ops`.
    Range {
        l: ExprId,
        low: ExprId,
        high: ExprId,
        ops: RangeOps,
    },
    /// Disjunction of two conjunctions.
    Or { l: ExpList, r: ExpList },
    In {
        l: ExprId,
        values: ExpList,
        negated: bool,
    },
    Filter {
        func: Arc<catalog::Func>,
        l: ExpList,
        r: ExpList,
    },
}

impl Cmp {
    /// Simple and range comparisons, as opposed to list-valued ones.
    pub fn is_simple(&self) -> bool {
        matches!(self, Cmp::Simple { .. } | Cmp::Range { .. })
    }
}

/// Procedural statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Psm {
    Set {
        name: String,
        value: ExprId,
        level: u32,
    },
    Var {
        name: String,
        level: u32,
    },
    Table {
        name: String,
        table: Arc<Table>,
        level: u32,
    },
    Return {
        value: ExprId,
        level: u32,
    },
    While {
        cond: ExprId,
        body: ExpList,
    },
    If {
        cond: ExprId,
        then: ExpList,
        otherwise: Option<ExpList>,
    },
    Rel(RelId),
    Exception {
        cond: ExprId,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Atom(Atom),
    /// Reference to column `name` of relation `rname` as it was produced.
    Column {
        rname: Option<String>,
        name: String,
    },
    /// Conversion of `expr` from `from` to the node's `ty`.
    Convert {
        expr: ExprId,
        from: SqlType,
    },
    Cmp(Cmp),
    Func {
        func: Arc<catalog::Func>,
        args: ExpList,
        order_by: Option<ExpList>,
    },
    Aggr {
        func: Arc<catalog::Func>,
        args: ExpList,
    },
    Psm(Psm),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub alias: Alias,
    pub card: Card,
    pub flags: ExprFlags,
    pub ty: Option<SqlType>,
    pub props: Vec<Prop>,
}

impl Expr {
    pub fn new(kind: ExprKind, card: Card, ty: Option<SqlType>) -> Self {
        Expr {
            kind,
            alias: Alias::default(),
            card,
            flags: ExprFlags::default(),
            ty,
            props: Vec::new(),
        }
    }

    pub fn has_nil(&self) -> bool {
        !self.flags.has_no_nil
    }

    pub fn is_intern(&self) -> bool {
        self.flags.intern
    }

    pub fn has_label(&self) -> bool {
        self.alias.label != 0
    }

    pub fn is_cmp(&self) -> bool {
        matches!(self.kind, ExprKind::Cmp(_))
    }

    /// Anything that yields a value, i.e. not a comparison.
    pub fn is_column_like(&self) -> bool {
        !self.is_cmp()
    }
}

/// Generated name of label `n`: `L` followed by the octal digits of `n`.
pub fn number2name(n: u32) -> String {
    if n == 0 {
        return "L".to_string();
    }
    format!("L{n:o}")
}

// ---------------------------------------------------------------------------
// Expression lists
// ---------------------------------------------------------------------------

/// Alias name to list entries, in list order.
#[derive(Debug, Default)]
pub(crate) struct NameIndex {
    pub(crate) epoch: u64,
    pub(crate) map: HashMap<String, Vec<ExprId>>,
}

/// An ordered list of expression handles with a lazily built name index.
///
/// The index is built by the first name lookup on a list longer than
/// [`Config::hash_index_threshold`](crate::Config::hash_index_threshold).
/// Building happens under the list's own lock; lookups then work on a shared
/// snapshot. Any mutation through `&mut self` drops the index.
#[derive(Default)]
pub struct ExpList {
    items: Vec<ExprId>,
    index: Mutex<Option<Arc<NameIndex>>>,
}

impl ExpList {
    pub fn new() -> Self {
        ExpList::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ExprId> + '_ {
        self.items.iter().copied()
    }

    pub fn as_slice(&self) -> &[ExprId] {
        &self.items
    }

    pub fn to_vec(&self) -> Vec<ExprId> {
        self.items.clone()
    }

    pub fn get(&self, i: usize) -> Option<ExprId> {
        self.items.get(i).copied()
    }

    pub fn first(&self) -> Option<ExprId> {
        self.items.first().copied()
    }

    pub fn last(&self) -> Option<ExprId> {
        self.items.last().copied()
    }

    pub fn contains(&self, id: ExprId) -> bool {
        self.items.contains(&id)
    }

    pub fn push(&mut self, id: ExprId) {
        self.invalidate();
        self.items.push(id);
    }

    pub fn insert(&mut self, i: usize, id: ExprId) {
        self.invalidate();
        self.items.insert(i, id);
    }

    pub fn set(&mut self, i: usize, id: ExprId) {
        self.invalidate();
        self.items[i] = id;
    }

    pub fn remove(&mut self, i: usize) -> ExprId {
        self.invalidate();
        self.items.remove(i)
    }

    pub fn extend(&mut self, ids: impl IntoIterator<Item = ExprId>) {
        self.invalidate();
        self.items.extend(ids);
    }

    pub fn has_index(&self) -> bool {
        self.index.lock().is_some()
    }

    fn invalidate(&mut self) {
        *self.index.get_mut() = None;
    }

    pub(crate) fn index_slot(&self) -> &Mutex<Option<Arc<NameIndex>>> {
        &self.index
    }
}

impl Clone for ExpList {
    fn clone(&self) -> Self {
        ExpList::from(self.items.clone())
    }
}

impl PartialEq for ExpList {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl std::fmt::Debug for ExpList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl From<Vec<ExprId>> for ExpList {
    fn from(items: Vec<ExprId>) -> Self {
        ExpList {
            items,
            index: Mutex::new(None),
        }
    }
}

impl FromIterator<ExprId> for ExpList {
    fn from_iter<I: IntoIterator<Item = ExprId>>(iter: I) -> Self {
        ExpList::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a ExpList {
    type Item = ExprId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, ExprId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_octal() {
        assert_eq!(number2name(1), "L1");
        assert_eq!(number2name(8), "L10");
        assert_eq!(number2name(64), "L100");
    }

    #[test]
    fn range_codes() {
        let ops = RangeOps::from_compares(CmpOp::Gte, CmpOp::Lt).unwrap();
        assert_eq!(ops.bits(), 1);
        assert_eq!(ops.lower(), CmpOp::Gte);
        assert_eq!(ops.upper(), CmpOp::Lt);
        assert_eq!(RangeOps::from_bits(3).upper(), CmpOp::Lte);
        assert!(RangeOps::from_compares(CmpOp::Lt, CmpOp::Lt).is_none());
    }

    #[test]
    fn anti_compare_names() {
        assert_eq!(compare_func(CmpOp::Lt, false), "<");
        assert_eq!(compare_func(CmpOp::Lt, true), ">");
        assert_eq!(compare_func(CmpOp::Eq, true), "<>");
    }
}
