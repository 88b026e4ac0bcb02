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

//! Relational plan algebra.
//!
//! Plan nodes live in the relation arena of a [`Context`](crate::Context)
//! and are addressed by [`RelId`] handles that carry the slot generation, so
//! a handle to a destroyed node is detected instead of aliasing whatever was
//! allocated into the slot afterwards.
//!
//! Every node starts with one reference. A node placed as a child of another
//! hands that reference to its parent; [`Context::rel_dup`] adds one when a
//! node is shared by several parents. [`Context::rel_destroy`] drops one and
//! releases the children once the last reference is gone.

use std::sync::Arc;

use crate::catalog::Table;
use crate::context::Context;
use crate::expr::{Card, ExpList, ExprId};

mod bind;
mod build;
mod deps;
mod or;
mod push;
mod updates;

pub use bind::Clause;
pub use build::TID;
pub use updates::{table_column_names_and_defaults, table_column_types};

/// Generation-checked handle of a plan node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
}

impl JoinKind {
    pub fn is_outer(self) -> bool {
        matches!(self, JoinKind::Left | JoinKind::Right | JoinKind::Full)
    }

    pub fn is_semi(self) -> bool {
        matches!(self, JoinKind::Semi | JoinKind::Anti)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOp {
    Union,
    Except,
    Inter,
}

/// Where the rows of a table node come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableSource {
    /// A table-producing function call, evaluated over the optional input.
    Func,
    /// The input relation itself, wrapped as a table.
    Relation,
    /// Rows handed to a trigger.
    Trigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifyOp {
    Insert,
    Update,
    Delete,
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DdlOp {
    CreateTable,
    CreateView,
    AlterTable,
    CreateSeq,
    AlterSeq,
    Output,
    List,
    Psm,
    Exception,
}

impl DdlOp {
    /// Statements that carry the table they define.
    pub fn defines_table(self) -> bool {
        matches!(self, DdlOp::CreateTable | DdlOp::CreateView | DdlOp::AlterTable)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelKind {
    BaseTable(Arc<Table>),
    Table {
        input: Option<RelId>,
        func: Option<ExprId>,
        source: TableSource,
    },
    Join {
        kind: JoinKind,
        left: RelId,
        right: RelId,
    },
    Select {
        input: Option<RelId>,
    },
    Project {
        input: Option<RelId>,
        order_by: Option<ExpList>,
    },
    GroupBy {
        input: RelId,
        groups: Option<ExpList>,
    },
    SetOp {
        op: SetOp,
        left: RelId,
        right: RelId,
    },
    TopN {
        input: RelId,
    },
    Sample {
        input: RelId,
    },
    /// `left` is the target (or, for a composite statement, the original
    /// row source); `right` produces the rows.
    Modify {
        op: ModifyOp,
        left: RelId,
        right: Option<RelId>,
        composite: bool,
    },
    Ddl {
        op: DdlOp,
        left: Option<RelId>,
        right: Option<RelId>,
        table: Option<Arc<Table>>,
    },
}

impl RelKind {
    pub fn left(&self) -> Option<RelId> {
        match self {
            RelKind::BaseTable(_) => None,
            RelKind::Table { input, .. }
            | RelKind::Select { input }
            | RelKind::Project { input, .. } => *input,
            RelKind::GroupBy { input, .. } | RelKind::TopN { input } | RelKind::Sample { input } => {
                Some(*input)
            }
            RelKind::Join { left, .. } | RelKind::SetOp { left, .. } | RelKind::Modify { left, .. } => {
                Some(*left)
            }
            RelKind::Ddl { left, .. } => *left,
        }
    }

    pub fn right(&self) -> Option<RelId> {
        match self {
            RelKind::Join { right, .. } | RelKind::SetOp { right, .. } => Some(*right),
            RelKind::Modify { right, .. } | RelKind::Ddl { right, .. } => *right,
            _ => None,
        }
    }

    /// Replace the left child. Returns `false` for kinds without one.
    pub(crate) fn set_left(&mut self, id: RelId) -> bool {
        match self {
            RelKind::Table { input, .. }
            | RelKind::Select { input }
            | RelKind::Project { input, .. }
            | RelKind::Ddl { left: input, .. } => *input = Some(id),
            RelKind::GroupBy { input, .. }
            | RelKind::TopN { input }
            | RelKind::Sample { input }
            | RelKind::Join { left: input, .. }
            | RelKind::SetOp { left: input, .. }
            | RelKind::Modify { left: input, .. } => *input = id,
            RelKind::BaseTable(_) => return false,
        }
        true
    }

    /// Replace the right child. Returns `false` for kinds without one.
    pub(crate) fn set_right(&mut self, id: RelId) -> bool {
        match self {
            RelKind::Join { right, .. } | RelKind::SetOp { right, .. } => *right = id,
            RelKind::Modify { right, .. } | RelKind::Ddl { right, .. } => *right = Some(id),
            _ => return false,
        }
        true
    }

    /// Inner, outer, semi and anti joins.
    pub fn join_kind(&self) -> Option<JoinKind> {
        match self {
            RelKind::Join { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Inner and outer joins, not semi or anti joins.
    pub fn is_join(&self) -> bool {
        self.join_kind().is_some_and(|k| !k.is_semi())
    }

    pub fn is_semi(&self) -> bool {
        self.join_kind().is_some_and(JoinKind::is_semi)
    }

    pub fn is_outer_join(&self) -> bool {
        self.join_kind().is_some_and(JoinKind::is_outer)
    }

    pub fn is_select(&self) -> bool {
        matches!(self, RelKind::Select { .. })
    }

    pub fn is_simple_project(&self) -> bool {
        matches!(self, RelKind::Project { .. })
    }

    pub fn is_groupby(&self) -> bool {
        matches!(self, RelKind::GroupBy { .. })
    }

    pub fn is_set(&self) -> bool {
        matches!(self, RelKind::SetOp { .. })
    }

    /// Nodes that define their own output list: projections, groupings and
    /// set operations.
    pub fn is_project(&self) -> bool {
        self.is_simple_project() || self.is_groupby() || self.is_set()
    }

    /// Base tables and table functions.
    pub fn is_base(&self) -> bool {
        matches!(self, RelKind::BaseTable(_) | RelKind::Table { .. })
    }

    /// A projection with an order-by list.
    pub fn is_sort(&self) -> bool {
        matches!(self, RelKind::Project { order_by: Some(_), .. })
    }

    pub fn is_modify(&self) -> bool {
        matches!(self, RelKind::Modify { .. })
    }
}

/// A plan node.
#[derive(Debug, Clone, PartialEq)]
pub struct Rel {
    pub kind: RelKind,
    pub exps: Option<ExpList>,
    pub card: Card,
    pub nrcols: usize,
    /// The output list is final; column lookups stop here.
    pub processed: bool,
    pub distinct: bool,
    pub single: bool,
    pub dependent: bool,
    pub subquery: bool,
    refcount: u32,
}

impl Rel {
    pub fn new(kind: RelKind, card: Card) -> Self {
        Rel {
            kind,
            exps: None,
            card,
            nrcols: 0,
            processed: false,
            distinct: false,
            single: false,
            dependent: false,
            subquery: false,
            refcount: 1,
        }
    }

    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    /// Entries of the output list, or nothing.
    pub fn exps_or_empty(&self) -> &[ExprId] {
        match &self.exps {
            Some(list) => list.as_slice(),
            None => &[],
        }
    }
}

impl Context {
    /// Add a reference to a shared node.
    pub fn rel_dup(&mut self, id: RelId) -> RelId {
        self.rel_mut(id).refcount += 1;
        id
    }

    /// Whether `id` is referenced from more than one place.
    pub fn rel_is_ref(&self, id: RelId) -> bool {
        self.rel(id).refcount > 1
    }

    /// Drop one reference to `id`; the last one frees the node and releases
    /// its children. Stale handles are ignored.
    pub fn rel_destroy(&mut self, id: RelId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(rel) = self.try_rel(id) else { continue };
            if rel.refcount > 1 {
                self.rel_mut(id).refcount -= 1;
                continue;
            }
            if let Some(rel) = self.free_rel(id) {
                pending.extend(rel.kind.left());
                pending.extend(rel.kind.right());
            }
        }
    }

    /// Release the children of `id` that `keep` does not take over.
    pub(crate) fn release_children(&mut self, id: RelId, keep: &[RelId]) {
        let kind = &self.rel(id).kind;
        let old = [kind.left(), kind.right()];
        for child in old.into_iter().flatten() {
            if !keep.contains(&child) {
                self.rel_destroy(child);
            }
        }
    }
}
