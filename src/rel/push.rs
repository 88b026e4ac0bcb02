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

//! Predicate placement.
//!
//! A predicate is pushed down the path from the root to the node that
//! produces its column as long as every node on the way passes rows through
//! unchanged: selects, inner joins, semi joins over unshared input and the
//! preserved side of a left join. Shared nodes stop the descent.

use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::expr::{ExprId, ExprKind};

use super::{JoinKind, RelId, RelKind};

impl Context {
    /// Nodes from `rel` down to the one producing column `e`, root first.
    /// Expressions other than columns bind to `rel` itself; `None` means
    /// the column is not produced anywhere below.
    pub fn rel_bind_path(&self, rel: RelId, e: ExprId) -> Result<Option<Vec<RelId>>> {
        let mut e = e;
        if let ExprKind::Convert { expr, .. } = self.expr(e).kind {
            e = expr;
        }
        let ExprKind::Column { rname, name } = &self.expr(e).kind else {
            return Ok(Some(vec![rel]));
        };
        let mut path = Vec::new();
        if !self.bind_path_at(rel, rname.as_deref(), name, &mut path, 0)? {
            return Ok(None);
        }
        path.reverse();
        Ok(Some(path))
    }

    fn bind_path_at(
        &self,
        rel: RelId,
        rname: Option<&str>,
        name: &str,
        path: &mut Vec<RelId>,
        depth: usize,
    ) -> Result<bool> {
        self.check_depth(depth)?;
        let x = self.rel(rel);
        let found = match x.kind {
            RelKind::Join { kind, left, right } if !kind.is_semi() => {
                self.bind_path_at(right, rname, name, path, depth + 1)?
                    || self.bind_path_at(left, rname, name, path, depth + 1)?
            }
            RelKind::Join { left, .. }
            | RelKind::Select { input: Some(left) }
            | RelKind::TopN { input: left }
            | RelKind::Sample { input: left } => self.bind_path_at(left, rname, name, path, depth + 1)?,
            RelKind::SetOp { left, .. } if x.exps.is_none() => {
                self.bind_path_at(left, rname, name, path, depth + 1)?
            }
            RelKind::SetOp { .. }
            | RelKind::GroupBy { .. }
            | RelKind::Project { .. }
            | RelKind::Table { .. }
            | RelKind::BaseTable(_) => match (&x.exps, rname) {
                (Some(list), Some(rname)) => self.exps_bind_column2(list, rname, name).is_some(),
                (Some(list), None) => self.exps_bind_column(list, name)?.is_some(),
                (None, _) => false,
            },
            RelKind::Select { input: None } | RelKind::Modify { .. } | RelKind::Ddl { .. } => false,
        };
        if found {
            path.push(rel);
        }
        Ok(found)
    }

    /// Whether a predicate may be pushed through `rel`.
    fn passes_rows(&self, rel: RelId) -> bool {
        match self.rel(rel).kind {
            RelKind::Select { .. } => true,
            RelKind::Join {
                kind: JoinKind::Inner | JoinKind::Left,
                ..
            } => true,
            RelKind::Join {
                kind: JoinKind::Semi | JoinKind::Anti,
                left,
                ..
            } => !self.rel_is_ref(left),
            _ => false,
        }
    }

    /// Whether `rel` is a left join whose preserved side is not `next`.
    fn leaves_left_head(&self, rel: RelId, next: Option<&RelId>) -> bool {
        match self.rel(rel).kind {
            RelKind::Join {
                kind: JoinKind::Left,
                left,
                ..
            } => next != Some(&left),
            _ => false,
        }
    }

    /// Place the filter `e` on column `ls` as deep below `rel` as possible.
    /// Returns the new root.
    pub fn rel_push_select(&mut self, rel: RelId, ls: ExprId, e: ExprId) -> Result<RelId> {
        let path = match self.rel_bind_path(rel, ls)? {
            Some(path) if self.config().pushdown && !path.is_empty() => path,
            _ => return self.rel_select(Some(rel), Some(e)),
        };
        let mut lrel = path[0];
        let mut p = None;
        for (i, &cur) in path.iter().enumerate() {
            lrel = cur;
            if self.rel_is_ref(cur) || !self.passes_rows(cur) {
                break;
            }
            if self.leaves_left_head(cur, path.get(i + 1)) {
                break;
            }
            p = Some(cur);
        }
        if let Some(p) = p.filter(|&p| self.rel(p).kind.is_select() && !self.rel_is_ref(p)) {
            debug!(depth = path.len(), "refined select");
            self.rel_select_add_exp(p, e)?;
            return Ok(rel);
        }
        let n = self.rel_select(Some(lrel), Some(e))?;
        debug!(depth = path.len(), "placed select");
        match p.filter(|&p| p != lrel) {
            Some(p) => {
                self.replace_child(p, lrel, n);
                Ok(rel)
            }
            None => Ok(n),
        }
    }

    fn replace_child(&mut self, parent: RelId, old: RelId, new: RelId) {
        let kind = &mut self.rel_mut(parent).kind;
        if kind.left() == Some(old) {
            kind.set_left(new);
        } else {
            kind.set_right(new);
        }
    }

    /// Place join predicate `e` between `ls` and `rs` (and `rs2` for range
    /// predicates) on the lowest node covering all of them. A predicate on
    /// columns of a single input becomes a filter on it. Returns the new
    /// root.
    pub fn rel_push_join(
        &mut self,
        rel: RelId,
        ls: ExprId,
        rs: ExprId,
        rs2: Option<ExprId>,
        e: ExprId,
    ) -> Result<RelId> {
        let l = self.rel_bind_path(rel, ls)?;
        let r = self.rel_bind_path(rel, rs)?;
        let r2 = rs2.map(|rs2| self.rel_bind_path(rel, rs2)).transpose()?;
        let (Some(l), Some(r)) = (l, r) else {
            return Err(self.unbound_join(e));
        };
        let r2 = match r2 {
            Some(None) => return Err(self.unbound_join(e)),
            Some(Some(path)) => Some(path),
            None => None,
        };
        if !self.config().pushdown {
            return self.rel_push_select(rel, ls, e);
        }

        let mut p = rel;
        let (mut lrel, mut rrel, mut rrel2) = (None, None, None);
        let steps = match &r2 {
            Some(r2) => l.len().min(r.len()).min(r2.len()),
            None => l.len().min(r.len()),
        };
        for i in 0..steps {
            let (lr, rr) = (l[i], r[i]);
            let rr2 = r2.as_ref().map(|r2| r2[i]);
            (lrel, rrel, rrel2) = (Some(lr), Some(rr), rr2);
            let x = self.rel(lr);
            if self.rel_is_ref(lr)
                || self.rel_is_ref(rr)
                || rr2.is_some_and(|rr2| self.rel_is_ref(rr2))
                || x.processed
                || self.rel(rr).processed
            {
                break;
            }
            if lr != rr || rr2.is_some_and(|rr2| rr2 != lr) || !self.passes_rows(lr) {
                break;
            }
            if self.leaves_left_head(lr, l.get(i + 1)) {
                break;
            }
            p = lr;
        }
        let (Some(lrel), Some(rrel)) = (lrel, rrel) else {
            return Err(self.unbound_join(e));
        };
        if r2.is_some() && rrel2.is_none() {
            return Err(self.unbound_join(e));
        }

        let inner_join = matches!(
            self.rel(lrel).kind,
            RelKind::Join {
                kind: JoinKind::Inner,
                ..
            }
        );
        let same = lrel == rrel && rrel2.map_or(true, |rr2| rr2 == lrel);
        if (same && !inner_join) || self.rel_is_ref(p) {
            debug!("join predicate on a single input");
            if self.rel(lrel).kind.is_select() && !self.rel_is_ref(lrel) {
                self.rel_select_add_exp(lrel, e)?;
            } else if self.rel(p).kind.is_select() && !self.rel_is_ref(p) {
                self.rel_select_add_exp(p, e)?;
            } else {
                let n = self.rel_select(Some(lrel), Some(e))?;
                if p != lrel {
                    self.replace_child(p, lrel, n);
                } else {
                    return Ok(n);
                }
            }
            return Ok(rel);
        }
        debug!("join predicate added");
        self.rel_join_add_exp(p, e);
        Ok(rel)
    }

    fn unbound_join(&self, e: ExprId) -> Error {
        let name = self.exp_name(e).unwrap_or("?");
        self.error(Error::not_found("JOIN", "column", name))
    }
}
