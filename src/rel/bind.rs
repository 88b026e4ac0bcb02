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

//! Column resolution against plan trees.
//!
//! Unqualified names search the tree for the node that exposes them,
//! preferring the right side of a join and reporting a name visible on both
//! sides as ambiguous. Qualified names are matched against relation aliases.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::expr::{Cmp, ExprId, ExprKind};

use super::{RelId, RelKind};

/// Clause a column reference appears in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clause {
    /// The select list: an open projection on top is skipped.
    pub select: bool,
    /// The order-by list: columns found below an open projection are added
    /// to it.
    pub order_by: bool,
}

impl Clause {
    pub const NONE: Clause = Clause {
        select: false,
        order_by: false,
    };
    pub const SELECT: Clause = Clause {
        select: true,
        order_by: false,
    };
    pub const ORDER_BY: Clause = Clause {
        select: false,
        order_by: true,
    };
}

impl Context {
    /// Whether `rel`, or the input of a chain of selects on top of it, is a
    /// subquery.
    pub fn rel_issubquery(&self, rel: RelId) -> bool {
        let mut r = rel;
        loop {
            let x = self.rel(r);
            if x.subquery {
                return true;
            }
            match x.kind {
                RelKind::Select { input: Some(l) } => r = l,
                _ => return false,
            }
        }
    }

    /// Whether an expression of `rel` or of a node below it refers to an
    /// outer query.
    pub fn rel_has_freevar(&self, rel: RelId) -> Result<bool> {
        self.rel_freevar_at(rel, 0)
    }

    fn rel_freevar_at(&self, rel: RelId, depth: usize) -> Result<bool> {
        self.check_depth(depth)?;
        let x = self.rel(rel);
        for &e in x.exps_or_empty() {
            if self.exp_has_freevar(e)? {
                return Ok(true);
            }
        }
        if x.kind.is_base() {
            return Ok(false);
        }
        for child in [x.kind.left(), x.kind.right()].into_iter().flatten() {
            if self.rel_freevar_at(child, depth + 1)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Resolve the unqualified column `cname` against the tree under `rel`.
    pub fn rel_bind_column(&mut self, rel: RelId, cname: &str, clause: Clause) -> Result<Option<ExprId>> {
        let orel = rel;
        let mut rel = rel;
        if clause.select {
            let x = self.rel(rel);
            if x.kind.is_simple_project() && !x.processed {
                match x.kind.left() {
                    Some(l) => rel = l,
                    None => return Ok(None),
                }
            }
        }
        let mut parent = None;
        let Some(found) = self.bind_column_at(&mut parent, rel, cname, 0)? else {
            return Ok(None);
        };
        let x = self.rel(found);
        if !(x.kind.is_project() || x.kind.is_base()) {
            return Ok(None);
        }
        let Some(list) = x.exps.clone() else { return Ok(None) };
        let Some(e) = self.exps_bind_column(&list, cname)? else {
            return Ok(None);
        };
        let rname = self.exp_relname(e).map(str::to_string);
        let mut e = self.exp_alias_or_copy(rname.as_deref(), Some(cname), Some(found), e);
        if let Some(p) = parent {
            let px = self.rel(p);
            if clause.order_by && px.kind.is_simple_project() && !px.processed && orel != found {
                e = self.rel_project_add_exp(p, e)?;
            }
        }
        Ok(Some(e))
    }

    /// The node under `rel` exposing `cname`. `parent` tracks the last node
    /// passed on the way down.
    fn bind_column_at(
        &self,
        parent: &mut Option<RelId>,
        rel: RelId,
        cname: &str,
        depth: usize,
    ) -> Result<Option<RelId>> {
        self.check_depth(depth)?;
        let x = self.rel(rel);
        match x.kind {
            RelKind::Join { kind, left, right } if !kind.is_semi() => {
                *parent = Some(rel);
                let r = self.bind_column_at(parent, right, cname, depth + 1)?;
                let mut l = None;
                if r.is_none() || !self.rel_issubquery(right) {
                    let e = match r.and_then(|r| self.rel(r).exps.as_ref()) {
                        Some(list) => self.exps_bind_column(list, cname)?,
                        None => None,
                    };
                    if r.is_none() || !e.is_some_and(|e| self.expr(e).flags.freevar) {
                        *parent = Some(rel);
                        l = self.bind_column_at(parent, left, cname, depth + 1)?;
                        if let (Some(_), Some(r)) = (l, r) {
                            if !self.rel_issubquery(r) && !x.dependent {
                                return Err(self.error(Error::Ambiguous(cname.to_string())));
                            }
                        }
                    }
                }
                Ok(r.or(l))
            }
            RelKind::Join { left, .. }
            | RelKind::Select { input: Some(left) }
            | RelKind::TopN { input: left }
            | RelKind::Sample { input: left } => {
                *parent = Some(rel);
                self.bind_column_at(parent, left, cname, depth + 1)
            }
            _ if x.kind.is_project() || x.kind.is_base() => {
                if let Some(list) = &x.exps {
                    if self.exps_bind_column(list, cname)?.is_some() {
                        return Ok(Some(rel));
                    }
                }
                *parent = Some(rel);
                if x.processed || x.kind.is_base() {
                    return Ok(None);
                }
                match x.kind.left() {
                    Some(l) => self.bind_column_at(parent, l, cname, depth + 1),
                    None => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    /// Resolve `tname.cname` against the tree under `rel`.
    ///
    /// In an order-by clause a grouping that does not expose the column
    /// itself is searched for a group expression reading it.
    pub fn rel_bind_column2(
        &mut self,
        rel: RelId,
        tname: &str,
        cname: &str,
        clause: Clause,
    ) -> Result<Option<ExprId>> {
        self.bind_column2_at(rel, tname, cname, clause, 0)
    }

    fn bind_column2_at(
        &mut self,
        rel: RelId,
        tname: &str,
        cname: &str,
        clause: Clause,
        depth: usize,
    ) -> Result<Option<ExprId>> {
        self.check_depth(depth)?;
        let x = self.rel(rel);
        let kind = x.kind.clone();
        let processed = x.processed;
        if kind.is_project() || kind.is_base() {
            if let Some(list) = x.exps.clone() {
                let e = self.exps_bind_column2(&list, tname, cname);
                if e.is_none() && clause.order_by {
                    if let RelKind::GroupBy { groups: Some(groups), .. } = &kind {
                        if let Some(g) = self.exps_bind_alias(groups, Some(tname), cname) {
                            let name = self.exp_name(g).unwrap_or_default();
                            let found = match self.exp_relname(g) {
                                Some(rname) => self.exps_bind_column2(&list, rname, name),
                                None => self.exps_bind_column(&list, name)?,
                            };
                            if found.is_some() {
                                return Ok(found);
                            }
                        }
                    }
                }
                if let Some(e) = e {
                    return Ok(Some(self.exp_alias_or_copy(Some(tname), Some(cname), Some(rel), e)));
                }
            }
        }
        match kind {
            RelKind::Project { input: Some(l), .. } => {
                if processed {
                    return Ok(None);
                }
                self.bind_column2_at(l, tname, cname, clause, depth + 1)
            }
            RelKind::Join { kind: jk, left, right } if !jk.is_semi() => {
                match self.bind_column2_at(left, tname, cname, clause, depth + 1)? {
                    Some(e) => Ok(Some(e)),
                    None => self.bind_column2_at(right, tname, cname, clause, depth + 1),
                }
            }
            RelKind::SetOp { left, .. }
            | RelKind::Join { left, .. }
            | RelKind::Select { input: Some(left) }
            | RelKind::TopN { input: left } => self.bind_column2_at(left, tname, cname, clause, depth + 1),
            _ => Ok(None),
        }
    }

    /// A fresh reference to column `tname.cname` as exposed by the tree under
    /// `rel`. Hidden columns (names starting with `%`) may be found by name
    /// alone.
    pub fn rel_find_column(&mut self, rel: RelId, tname: &str, cname: &str) -> Result<Option<ExprId>> {
        self.find_column_at(rel, tname, cname, 0)
    }

    fn find_column_at(&mut self, rel: RelId, tname: &str, cname: &str, depth: usize) -> Result<Option<ExprId>> {
        self.check_depth(depth)?;
        let x = self.rel(rel);
        let kind = x.kind.clone();
        let processed = x.processed;
        if kind.is_project() || kind.is_base() {
            if let Some(list) = x.exps.clone() {
                let mut e = self.exps_bind_column2(&list, tname, cname);
                if e.is_none() && cname.starts_with('%') {
                    e = self.exps_bind_column(&list, cname)?;
                }
                if let Some(e) = e {
                    let rname = self.exp_relname(e).map(str::to_string);
                    let name = self.exp_name(e).unwrap_or_default().to_string();
                    let ty = self.exp_subtype(e);
                    let x = self.expr(e);
                    let (card, has_nil, intern) = (x.card, x.has_nil(), x.is_intern());
                    let ne = self.exp_alias(
                        rname.as_deref(),
                        &name,
                        rname.as_deref(),
                        cname,
                        ty,
                        card,
                        has_nil,
                        intern,
                    );
                    return Ok(Some(ne));
                }
            }
        }
        if kind.is_project() && !processed {
            if let Some(l) = kind.left() {
                return self.find_column_at(l, tname, cname, depth + 1);
            }
        }
        match kind {
            RelKind::Join { kind: jk, left, right } if !jk.is_semi() => {
                match self.find_column_at(left, tname, cname, depth + 1)? {
                    Some(e) => Ok(Some(e)),
                    None => self.find_column_at(right, tname, cname, depth + 1),
                }
            }
            RelKind::SetOp { left, .. }
            | RelKind::Join { left, .. }
            | RelKind::Select { input: Some(left) }
            | RelKind::Project { input: Some(left), order_by: Some(_) } => {
                self.find_column_at(left, tname, cname, depth + 1)
            }
            _ => Ok(None),
        }
    }

    /// Locate `e` in the output of `rel`, looking through nodes that pass
    /// their input on. Literals are always found; calls are found when all
    /// of their arguments are.
    pub fn rel_find_exp(&self, rel: RelId, e: ExprId) -> Result<Option<ExprId>> {
        self.find_exp_at(rel, e, 0)
    }

    fn find_exp_at(&self, rel: RelId, e: ExprId, depth: usize) -> Result<Option<ExprId>> {
        self.check_depth(depth)?;
        if let Some(ne) = self.find_exp_local(rel, e, depth)? {
            return Ok(Some(ne));
        }
        let x = self.rel(rel);
        let column = match &self.expr(e).kind {
            ExprKind::Column { rname: Some(rname), name } => Some((rname.as_str(), name.as_str())),
            _ => None,
        };
        match &x.kind {
            RelKind::Join { kind, left, right } if !kind.is_semi() => {
                match self.find_exp_at(*left, e, depth + 1)? {
                    Some(ne) => Ok(Some(ne)),
                    None => self.find_exp_at(*right, e, depth + 1),
                }
            }
            RelKind::Table { .. } => {
                let found = match (&x.exps, column) {
                    (Some(list), Some((rname, name))) => self.exps_bind_column2(list, rname, name).is_some(),
                    _ => false,
                };
                Ok(found.then_some(e))
            }
            RelKind::SetOp { left, .. } => self.find_exp_at(*left, e, depth + 1),
            RelKind::BaseTable(_) => Ok(match (&x.exps, column) {
                (Some(list), Some((rname, name))) => self.exps_bind_column2(list, rname, name),
                _ => None,
            }),
            kind if !kind.is_project() => match kind.left() {
                Some(l) => self.find_exp_at(l, e, depth + 1),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn find_exp_local(&self, rel: RelId, e: ExprId, depth: usize) -> Result<Option<ExprId>> {
        self.check_depth(depth)?;
        match &self.expr(e).kind {
            ExprKind::Column { rname, name } => {
                let x = self.rel(rel);
                match &x.exps {
                    Some(list) if x.kind.is_project() || x.kind.is_base() => match rname {
                        Some(rname) => Ok(self.exps_bind_column2(list, rname, name)),
                        None => self.exps_bind_column(list, name),
                    },
                    _ => Ok(None),
                }
            }
            ExprKind::Convert { expr, .. } => self.find_exp_local(rel, *expr, depth + 1),
            ExprKind::Func { args, .. } | ExprKind::Aggr { args, .. } => {
                let mut ne = None;
                for a in args {
                    ne = self.find_exp_local(rel, a, depth + 1)?;
                    if ne.is_none() {
                        return Ok(None);
                    }
                }
                Ok(ne)
            }
            ExprKind::Cmp(_) | ExprKind::Psm(_) => Ok(None),
            ExprKind::Atom(_) => Ok(Some(e)),
        }
    }

    /// Whether simple comparison `e` relates the two sides of join `rel`.
    /// A comparison written the other way round is swapped in place.
    pub fn exp_is_correlation(&mut self, e: ExprId, rel: RelId) -> Result<bool> {
        let ExprKind::Cmp(Cmp::Simple { l, r, .. }) = self.expr(e).kind else {
            return Ok(false);
        };
        let kind = &self.rel(rel).kind;
        let (Some(jl), Some(jr)) = (kind.left(), kind.right()) else {
            return Ok(false);
        };
        if self.rel_find_exp(jl, l)?.is_some() && self.rel_find_exp(jr, r)?.is_some() {
            return Ok(true);
        }
        if self.rel_find_exp(jr, l)?.is_some() && self.rel_find_exp(jl, r)?.is_some() {
            self.exp_swap(e);
            return Ok(true);
        }
        Ok(false)
    }
}
