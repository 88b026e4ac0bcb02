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

//! Plan node constructors and in-place rewrites.

use std::sync::Arc;

use crate::catalog::{IndexKind, Table};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::expr::{number2name, Card, CmpOp, ExpList, ExprId, ExprKind, Prop};
use crate::types::{SqlType, TypeId};

use super::{DdlOp, JoinKind, Rel, RelId, RelKind, SetOp, TableSource};

/// Name of the hidden row-id column of a base table.
pub const TID: &str = "%TID%";

impl Context {
    fn new_rel(&mut self, kind: RelKind, card: Card, nrcols: usize, exps: Option<ExpList>) -> RelId {
        let mut rel = Rel::new(kind, card);
        rel.nrcols = nrcols;
        rel.exps = exps;
        self.alloc_rel(rel)
    }

    pub(crate) fn rel_push_exp(&mut self, rel: RelId, e: ExprId) {
        self.rel_mut(rel).exps.get_or_insert_with(ExpList::new).push(e);
    }

    /// Relation name of the first output column, looking through
    /// operators that do not define their own output.
    pub fn rel_name(&self, rel: RelId) -> Option<&str> {
        let mut r = rel;
        loop {
            let x = self.rel(r);
            if !x.kind.is_project() && !x.kind.is_base() {
                if let Some(l) = x.kind.left() {
                    r = l;
                    continue;
                }
            }
            let e = x.exps.as_ref()?.first()?;
            if let Some(name) = self.exp_relname(e) {
                return Some(name);
            }
            return match &self.expr(e).kind {
                ExprKind::Column { rname, .. } => rname.as_deref(),
                _ => None,
            };
        }
    }

    /// Mark `rel` as producing distinct rows; atom-cardinality results are
    /// left alone.
    pub fn rel_distinct(&mut self, rel: RelId) -> RelId {
        let r = self.rel_mut(rel);
        if r.card >= Card::Aggr {
            r.distinct = true;
        }
        rel
    }

    /// Copy the tree under `rel`. A deep copy also copies the expression
    /// lists; a shallow one shares their entries.
    pub fn rel_copy(&mut self, rel: RelId, deep: bool) -> Result<RelId> {
        self.copy_rel_at(rel, deep, 0)
    }

    fn copy_rel_at(&mut self, rel: RelId, deep: bool, depth: usize) -> Result<RelId> {
        self.check_depth(depth)?;
        let src = self.rel(rel).clone();
        let mut kind = src.kind.clone();
        match &mut kind {
            RelKind::BaseTable(_) => {}
            RelKind::Table { input, .. } => {
                if let Some(l) = *input {
                    self.rel_dup(l);
                }
            }
            RelKind::GroupBy { groups, .. } if deep => {
                if let Some(g) = groups {
                    *g = self.exps_copy(g)?;
                }
            }
            _ => {}
        }
        if !matches!(kind, RelKind::BaseTable(_) | RelKind::Table { .. }) {
            if let Some(l) = src.kind.left() {
                let nl = self.copy_rel_at(l, deep, depth + 1)?;
                kind.set_left(nl);
            }
            if let Some(r) = src.kind.right() {
                let nr = self.copy_rel_at(r, deep, depth + 1)?;
                kind.set_right(nr);
            }
        }
        let exps = match &src.exps {
            Some(list) if deep => Some(self.exps_copy(list)?),
            other => other.clone(),
        };
        let mut copy = Rel::new(kind, src.card);
        copy.exps = exps;
        copy.nrcols = src.nrcols;
        copy.processed = src.processed;
        copy.distinct = src.distinct;
        copy.single = src.single;
        copy.dependent = src.dependent;
        copy.subquery = src.subquery;
        Ok(self.alloc_rel(copy))
    }

    /// A select over `l` holding a copy of `exps`.
    pub fn rel_select_copy(&mut self, l: Option<RelId>, exps: Option<&ExpList>) -> RelId {
        let (card, nrcols) = l.map_or((Card::Atom, 0), |l| {
            let l = self.rel(l);
            (l.card, l.nrcols)
        });
        self.new_rel(RelKind::Select { input: l }, card, nrcols, exps.cloned())
    }

    // -----------------------------------------------------------------------
    // Base tables and table functions
    // -----------------------------------------------------------------------

    /// Scan of `table` under alias `atname`: one column per catalog column,
    /// the hidden row id and one hidden column per non-trivial index.
    pub fn rel_basetable(&mut self, table: &Arc<Table>, atname: &str) -> RelId {
        let tname = table.name.as_str();
        let mut exps = ExpList::new();
        for c in &table.columns {
            let e = self.exp_alias(
                Some(atname),
                &c.name,
                Some(tname),
                &c.name,
                Some(c.ty.clone()),
                Card::Multi,
                c.nullable,
                false,
            );
            let x = self.expr_mut(e);
            if table.pkey.first() == Some(&c.colnr) {
                x.props.push(Prop::HashCol(Some(table.id)));
            } else if c.unique {
                x.props.push(Prop::HashCol(None));
            }
            x.flags.basecol = true;
            exps.push(e);
        }
        let oid = SqlType::local(TypeId::Oid);
        let tid = self.exp_alias(Some(atname), TID, Some(tname), TID, Some(oid.clone()), Card::Multi, false, true);
        exps.push(tid);

        for i in &table.indexes {
            if i.kind.is_hash() && i.columns.len() <= 1 {
                continue;
            }
            let ty = match i.kind {
                IndexKind::Join => oid.clone(),
                _ => SqlType::local(TypeId::Lng),
            };
            let iname = format!("%{}", i.name);
            let e = self.exp_alias(Some(atname), &iname, Some(tname), &iname, Some(ty), Card::Multi, false, true);
            let x = self.expr_mut(e);
            if i.kind.is_hash() {
                x.props.push(Prop::HashIdx(i.id));
            }
            if i.kind == IndexKind::Join {
                x.props.push(Prop::JoinIdx(i.id));
            }
            exps.push(e);
        }
        let kind = RelKind::BaseTable(Arc::clone(table));
        self.new_rel(kind, Card::Multi, table.columns.len(), Some(exps))
    }

    /// Call of table function `func` over the optional input `l`.
    pub fn rel_table_func(&mut self, l: Option<RelId>, func: ExprId, exps: ExpList, source: TableSource) -> RelId {
        let n = exps.len();
        let kind = RelKind::Table {
            input: l,
            func: Some(func),
            source,
        };
        self.new_rel(kind, Card::Multi, n, Some(exps))
    }

    /// `l` wrapped as a table with output list `exps`.
    pub fn rel_relational_func(&mut self, l: Option<RelId>, exps: ExpList) -> RelId {
        let n = exps.len();
        let kind = RelKind::Table {
            input: l,
            func: None,
            source: TableSource::Relation,
        };
        self.new_rel(kind, Card::Multi, n, Some(exps))
    }

    // -----------------------------------------------------------------------
    // Projections
    // -----------------------------------------------------------------------

    /// Projection of `exps` over `l`; final once `exps` is non-empty.
    pub fn rel_project(&mut self, l: Option<RelId>, exps: ExpList) -> RelId {
        let mut card = self.exps_card(&exps);
        let mut nrcols = 0;
        if let Some(l) = l {
            let l = self.rel(l);
            card = l.card;
            nrcols = l.nrcols;
        }
        let processed = !exps.is_empty();
        let kind = RelKind::Project {
            input: l,
            order_by: None,
        };
        let id = self.new_rel(kind, card, nrcols, Some(exps));
        self.rel_mut(id).processed = processed;
        id
    }

    /// Projection of a single expression without input.
    pub fn rel_project_exp(&mut self, e: ExprId) -> RelId {
        self.rel_project(None, ExpList::from(vec![e]))
    }

    /// Add `e` to the output of projection or grouping `rel` and return the
    /// expression to refer to it by.
    pub fn rel_project_add_exp(&mut self, rel: RelId, e: ExprId) -> Result<ExprId> {
        if self.exp_relname(e).is_none() {
            let nr = self.next_label();
            if self.exp_name(e).is_some() {
                self.exp_setrelname(e, nr);
            } else {
                self.exp_label(e, nr);
            }
        }
        match self.rel(rel).kind.clone() {
            RelKind::Project { input, .. } => {
                let mut e = e;
                if let Some(l) = input {
                    let lr = self.rel(l);
                    let empty = lr.exps.as_ref().map_or(true, ExpList::is_empty);
                    if lr.kind.is_groupby() && self.expr(e).card <= Card::Atom && empty {
                        e = self.rel_project_add_exp(l, e)?;
                    }
                }
                let card = self.expr(e).card;
                self.rel_push_exp(rel, e);
                let r = self.rel_mut(rel);
                r.card = r.card.max(card);
                r.nrcols += 1;
                Ok(e)
            }
            RelKind::GroupBy { .. } => self.rel_groupby_add_aggr(rel, e),
            _ => Ok(e),
        }
    }

    /// Rename the output of `r` under a fresh relation label, projecting
    /// first when `r` does not define its own output. With `all` every
    /// column also gets a fresh label.
    pub fn rel_label(&mut self, r: RelId, all: bool) -> Result<RelId> {
        let tname = number2name(self.next_label());
        let mut r = r;
        if !self.rel(r).kind.is_project() {
            let exps = self.rel_projections(r, None, true, true)?;
            r = self.rel_project(Some(r), exps);
            self.rel_mut(r).processed = true;
        }
        if let Some(exps) = self.rel(r).exps.clone() {
            for e in &exps {
                if self.expr(e).flags.freevar {
                    continue;
                }
                let cname = all.then(|| number2name(self.next_label()));
                self.exp_setname(e, Some(&tname), cname.as_deref());
            }
        }
        if let RelKind::Project { order_by: Some(order_by), .. } = self.rel(r).kind.clone() {
            for e in &order_by {
                let cname = all.then(|| number2name(self.next_label()));
                self.exp_setname(e, Some(&tname), cname.as_deref());
            }
        }
        Ok(r)
    }

    // -----------------------------------------------------------------------
    // Selections and joins
    // -----------------------------------------------------------------------

    /// Filter `l` by `e`. An unprocessed outer join takes `e` as a join
    /// condition and a select that is not shared is refined in place.
    pub fn rel_select(&mut self, l: Option<RelId>, e: Option<ExprId>) -> Result<RelId> {
        if let Some(l) = l {
            let lr = self.rel(l);
            if lr.kind.is_outer_join() && !lr.processed {
                if let Some(e) = e {
                    self.rel_push_exp(l, e);
                }
                return Ok(l);
            }
            if lr.kind.is_select() && !self.rel_is_ref(l) {
                if let Some(e) = e {
                    self.rel_select_add_exp(l, e)?;
                }
                return Ok(l);
            }
        }
        let (card, nrcols) = l.map_or((Card::Atom, 0), |l| {
            let l = self.rel(l);
            (l.card, l.nrcols)
        });
        let rel = self.new_rel(RelKind::Select { input: l }, card, nrcols, Some(ExpList::new()));
        if let Some(e) = e {
            self.rel_select_add_exp(rel, e)?;
        }
        Ok(rel)
    }

    /// Append predicate `e` to a select or outer join. Values that are not
    /// comparisons become `e = true`.
    pub fn rel_select_add_exp(&mut self, rel: RelId, e: ExprId) -> Result<()> {
        let x = self.expr(e);
        let e = if !x.is_cmp() && x.card > Card::Atom {
            let t = self.exp_atom_bool(true);
            self.exp_compare(e, t, CmpOp::Eq)?
        } else {
            e
        };
        self.rel_push_exp(rel, e);
        Ok(())
    }

    /// Append join condition `e`, raising the node's cardinality to it.
    pub fn rel_join_add_exp(&mut self, rel: RelId, e: ExprId) {
        let card = self.expr(e).card;
        self.rel_push_exp(rel, e);
        let r = self.rel_mut(rel);
        r.card = r.card.max(card);
    }

    /// Join of `l` and `r` without conditions.
    pub fn rel_crossproduct(&mut self, l: RelId, r: RelId, kind: JoinKind) -> RelId {
        let nrcols = self.rel(l).nrcols + self.rel(r).nrcols;
        let kind = RelKind::Join { kind, left: l, right: r };
        self.new_rel(kind, Card::Multi, nrcols, None)
    }

    // -----------------------------------------------------------------------
    // Set operations
    // -----------------------------------------------------------------------

    pub fn rel_setop(&mut self, l: RelId, r: RelId, op: SetOp) -> RelId {
        let nrcols = self.rel(l).nrcols + self.rel(r).nrcols;
        let kind = RelKind::SetOp { op, left: l, right: r };
        self.new_rel(kind, Card::Multi, nrcols, None)
    }

    /// Set operation over projections of `ls` and `rs`, with both sides
    /// converted to their common supertype column by column.
    pub fn rel_setop_check_types(
        &mut self,
        l: RelId,
        r: RelId,
        ls: &ExpList,
        rs: &ExpList,
        op: SetOp,
    ) -> Result<RelId> {
        let mut nls = ExpList::new();
        let mut nrs = ExpList::new();
        for (le, re) in ls.iter().zip(rs.iter()) {
            let (le, re) = self.convert_to_supertype(le, re)?;
            nls.push(le);
            nrs.push(re);
        }
        let l = self.rel_project(Some(l), nls);
        let r = self.rel_project(Some(r), nrs);
        self.rel_mut(l).processed = true;
        self.rel_mut(r).processed = true;
        Ok(self.rel_setop(l, r, op))
    }

    fn convert_to_supertype(&mut self, le: ExprId, re: ExprId) -> Result<(ExprId, ExprId)> {
        match (self.exp_subtype(le), self.exp_subtype(re)) {
            (Some(lt), Some(rt)) => {
                if lt == rt {
                    return Ok((le, re));
                }
                let st = SqlType::supertype(&lt, &rt).map_err(|e| self.error(e))?;
                let le = if lt == st { le } else { self.exp_convert(le, lt, st.clone()) };
                let re = if rt == st { re } else { self.exp_convert(re, rt, st) };
                Ok((le, re))
            }
            (None, Some(rt)) => {
                self.expr_mut(le).ty = Some(rt);
                Ok((le, re))
            }
            (Some(lt), None) => {
                self.expr_mut(re).ty = Some(lt);
                Ok((le, re))
            }
            (None, None) => Err(self.error(Error::InvalidArgument(
                "cannot have a parameter (?) on both sides of an expression".to_string(),
            ))),
        }
    }

    /// Turn `rel` into set operation `op` over `l` and `r`.
    pub fn rel_inplace_setop(&mut self, rel: RelId, l: RelId, r: RelId, op: SetOp, exps: Option<ExpList>) -> RelId {
        self.release_children(rel, &[l, r]);
        let nrcols = self.rel(l).nrcols + self.rel(r).nrcols;
        let x = self.rel_mut(rel);
        x.kind = RelKind::SetOp { op, left: l, right: r };
        x.card = Card::Multi;
        x.nrcols = nrcols;
        x.exps = exps;
        x.processed = true;
        rel
    }

    /// Turn `rel` into a projection of `exps` over `l`. Without `l` the
    /// projection goes over a copy of the node `rel` was.
    pub fn rel_inplace_project(&mut self, rel: RelId, l: Option<RelId>, exps: ExpList) -> RelId {
        let l = match l {
            Some(l) => {
                self.release_children(rel, &[l]);
                l
            }
            None => {
                let x = self.rel_mut(rel);
                let mut inner = Rel::new(x.kind.clone(), x.card);
                inner.exps = x.exps.take();
                inner.nrcols = x.nrcols;
                self.alloc_rel(inner)
            }
        };
        let nrcols = self.rel(l).nrcols;
        let x = self.rel_mut(rel);
        x.kind = RelKind::Project {
            input: Some(l),
            order_by: None,
        };
        x.processed = true;
        x.exps = Some(exps);
        x.card = Card::Multi;
        x.nrcols = nrcols;
        rel
    }

    /// Turn `rel` into a grouping of `l`.
    pub fn rel_inplace_groupby(&mut self, rel: RelId, l: RelId, groups: Option<ExpList>, exps: ExpList) -> RelId {
        self.release_children(rel, &[l]);
        let nrcols = self.rel(l).nrcols;
        let x = self.rel_mut(rel);
        x.card = if groups.is_some() { Card::Aggr } else { Card::Atom };
        x.kind = RelKind::GroupBy { input: l, groups };
        x.exps = Some(exps);
        x.nrcols = nrcols;
        rel
    }

    // -----------------------------------------------------------------------
    // Grouping
    // -----------------------------------------------------------------------

    /// Grouping of `l` by `groups`. Duplicate group expressions are dropped,
    /// unnamed ones labelled, and the output exposes a reference to each.
    pub fn rel_groupby(&mut self, l: RelId, groups: Option<ExpList>) -> Result<RelId> {
        let groups = match groups {
            Some(list) if list.len() > 1 => {
                let mut dedup = ExpList::new();
                for e in &list {
                    let keep = match self.exps_find_exp(&dedup, e)? {
                        None => true,
                        Some(ne) => {
                            self.exp_relname(e) != self.exp_relname(ne) || self.exp_name(e) != self.exp_name(ne)
                        }
                    };
                    if keep {
                        dedup.push(e);
                    }
                }
                Some(dedup)
            }
            other => other,
        };
        let mut card = Card::Atom;
        let mut aggrs = ExpList::new();
        if let Some(groups) = &groups {
            card = Card::Aggr;
            for e in groups {
                self.expr_mut(e).card = card;
                if self.exp_name(e).is_none() {
                    let nr = self.next_label();
                    self.exp_label(e, nr);
                }
                let ne = self.exp_ref(e);
                aggrs.push(ne);
            }
        }
        let nrcols = self.rel(l).nrcols;
        let kind = RelKind::GroupBy { input: l, groups };
        Ok(self.new_rel(kind, card, nrcols, Some(aggrs)))
    }

    /// Add column or aggregate `e` to grouping `rel` unless an equal one is
    /// already there, and return a reference to it.
    pub fn rel_groupby_add_aggr(&mut self, rel: RelId, e: ExprId) -> Result<ExprId> {
        let mut found = None;
        for m in self.rel(rel).exps_or_empty() {
            if self.groupby_match(*m, e, 0)? {
                found = Some(*m);
                break;
            }
        }
        let m = match found {
            Some(m) => m,
            None => {
                if self.exp_name(e).is_none() {
                    let nme = number2name(self.next_label());
                    self.exp_setname(e, Some(&nme), Some(&nme));
                }
                self.rel_push_exp(rel, e);
                self.rel_mut(rel).nrcols += 1;
                e
            }
        };
        let rname = self.exp_relname(m).map(str::to_string);
        let name = self.exp_name(m).unwrap_or_default().to_string();
        let ty = self.exp_subtype(m);
        let x = self.expr(m);
        let (has_nil, intern) = (x.has_nil(), x.is_intern());
        let card = self.rel(rel).card;
        Ok(self.exp_column(rname.as_deref(), &name, ty, card, has_nil, intern))
    }

    /// Columns with the same reference, or aggregates of the same function
    /// over matching arguments.
    fn groupby_match(&self, m: ExprId, e: ExprId, depth: usize) -> Result<bool> {
        self.check_depth(depth)?;
        match (&self.expr(m).kind, &self.expr(e).kind) {
            (ExprKind::Column { rname: r1, name: n1 }, ExprKind::Column { rname: r2, name: n2 }) => {
                Ok(n1 == n2 && r1 == r2)
            }
            (ExprKind::Aggr { func: f1, args: a1 }, ExprKind::Aggr { func: f2, args: a2 }) => {
                if f1.id != f2.id || a1.len() != a2.len() {
                    return Ok(false);
                }
                for (x, y) in a1.iter().zip(a2.iter()) {
                    if !self.groupby_match(x, y, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Other operators
    // -----------------------------------------------------------------------

    pub fn rel_topn(&mut self, l: RelId, exps: Option<ExpList>) -> RelId {
        let (card, nrcols) = (self.rel(l).card, self.rel(l).nrcols);
        self.new_rel(RelKind::TopN { input: l }, card, nrcols, exps)
    }

    pub fn rel_sample(&mut self, l: RelId, exps: Option<ExpList>) -> RelId {
        let (card, nrcols) = (self.rel(l).card, self.rel(l).nrcols);
        self.new_rel(RelKind::Sample { input: l }, card, nrcols, exps)
    }

    /// Statement raising an exception when one of `exps` holds.
    pub fn rel_exception(&mut self, l: Option<RelId>, r: Option<RelId>, exps: ExpList) -> RelId {
        let kind = RelKind::Ddl {
            op: DdlOp::Exception,
            left: l,
            right: r,
            table: None,
        };
        self.new_rel(kind, Card::Atom, 0, Some(exps))
    }

    /// Replace column `e` by the single expression of a constant projection,
    /// dropping that projection.
    pub fn rel_is_constant(&mut self, rel: &mut Option<RelId>, e: ExprId) -> Result<ExprId> {
        let Some(r) = *rel else { return Ok(e) };
        let x = self.rel(r);
        let constant = matches!(x.kind, RelKind::Project { input: None, .. })
            && x.exps.as_ref().is_some_and(|l| l.len() == 1)
            && x.refcount() <= 1
            && matches!(self.expr(e).kind, ExprKind::Column { .. });
        if constant {
            if let Some(ne) = self.rel_find_exp(r, e)? {
                self.rel_destroy(r);
                *rel = None;
                return Ok(ne);
            }
        }
        Ok(e)
    }

    /// Whether `sub` occurs in the tree under `sup`.
    pub fn rel_in_rel(&self, sup: Option<RelId>, sub: RelId) -> bool {
        let mut pending: Vec<RelId> = sup.into_iter().collect();
        while let Some(r) = pending.pop() {
            if r == sub {
                return true;
            }
            let kind = &self.rel(r).kind;
            match kind {
                RelKind::Join { .. } | RelKind::SetOp { .. } | RelKind::Modify { .. } | RelKind::Ddl { .. } => {
                    pending.extend(kind.left());
                    pending.extend(kind.right());
                }
                RelKind::Select { .. }
                | RelKind::Project { .. }
                | RelKind::GroupBy { .. }
                | RelKind::TopN { .. }
                | RelKind::Sample { .. } => pending.extend(kind.left()),
                RelKind::BaseTable(_) | RelKind::Table { .. } => {}
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Output lists
    // -----------------------------------------------------------------------

    /// References to the output columns of `rel`, named after `tname` when
    /// given. Without `settname` they get a fresh relation label; hidden
    /// columns are only included with `intern`.
    pub fn rel_projections(
        &mut self,
        rel: RelId,
        tname: Option<&str>,
        settname: bool,
        intern: bool,
    ) -> Result<ExpList> {
        let opts = Projections {
            tname,
            settname,
            intern,
            include_subquery: false,
            basecol: false,
        };
        self.projections_at(Some(rel), &opts, 0)
    }

    /// Like [`rel_projections`](Self::rel_projections), limited to columns
    /// read directly from base tables.
    pub fn rel_basecol_projections(&mut self, rel: RelId, tname: Option<&str>, settname: bool) -> Result<ExpList> {
        let opts = Projections {
            tname,
            settname,
            intern: true,
            include_subquery: false,
            basecol: true,
        };
        self.projections_at(Some(rel), &opts, 0)
    }

    fn projections_at(&mut self, rel: Option<RelId>, opts: &Projections<'_>, depth: usize) -> Result<ExpList> {
        self.check_depth(depth)?;
        let Some(rel) = rel else { return Ok(ExpList::new()) };
        let x = self.rel(rel);
        if !opts.include_subquery && x.subquery && x.kind.is_simple_project() {
            return Ok(ExpList::new());
        }
        let kind = x.kind.clone();
        let own = x.exps.clone();
        let card = x.card;
        match kind {
            RelKind::Join { kind: jk, left, right } if !jk.is_semi() => {
                let mut exps = self.projections_at(Some(left), opts, depth + 1)?;
                if matches!(jk, JoinKind::Full | JoinKind::Right) {
                    self.set_has_nil(&exps);
                }
                let rexps = self.projections_at(Some(right), opts, depth + 1)?;
                if matches!(jk, JoinKind::Full | JoinKind::Left) {
                    self.set_has_nil(&rexps);
                }
                exps.extend(rexps.iter());
                Ok(exps)
            }
            RelKind::Join { left, .. }
            | RelKind::Select { input: Some(left) }
            | RelKind::TopN { input: left }
            | RelKind::Sample { input: left }
            | RelKind::Ddl { left: Some(left), .. } => self.projections_at(Some(left), opts, depth + 1),
            RelKind::Project { .. } | RelKind::GroupBy { .. } | RelKind::BaseTable(_) | RelKind::Table { .. } | RelKind::SetOp { .. }
                if own.is_some() =>
            {
                let label = self.next_label();
                let mut exps = ExpList::new();
                for e in own.iter().flatten() {
                    let x = self.expr(e);
                    if opts.basecol && !x.flags.basecol {
                        continue;
                    }
                    if opts.intern || !x.is_intern() {
                        let name = self.exp_name(e).map(str::to_string);
                        let ne = self.exp_alias_or_copy(opts.tname, name.as_deref(), Some(rel), e);
                        if !opts.settname {
                            self.exp_setrelname(ne, label);
                        }
                        exps.push(ne);
                    }
                }
                Ok(exps)
            }
            RelKind::SetOp { left, right, .. } => {
                let lexps = self.projections_at(Some(left), opts, depth + 1)?;
                let rexps = self.projections_at(Some(right), opts, depth + 1)?;
                let label = self.next_label();
                let mut exps = ExpList::new();
                for (e, _) in lexps.iter().zip(rexps.iter()) {
                    self.expr_mut(e).card = card;
                    if !opts.settname {
                        self.exp_setrelname(e, label);
                    }
                    exps.push(e);
                }
                Ok(exps)
            }
            _ => Ok(ExpList::new()),
        }
    }

    fn set_has_nil(&mut self, list: &ExpList) {
        for e in list {
            self.expr_mut(e).flags.has_no_nil = false;
        }
    }

    // -----------------------------------------------------------------------
    // Row identity
    // -----------------------------------------------------------------------

    /// Make sure `rel` exposes a row identity and return it. A projection
    /// that already computes one is reused.
    pub fn rel_add_identity(&mut self, rel: RelId) -> Result<(RelId, Option<ExprId>)> {
        if let Some(id) = self.find_identity(rel)? {
            return Ok((rel, Some(id)));
        }
        self.add_identity(rel)
    }

    /// Like [`rel_add_identity`](Self::rel_add_identity), but computes the
    /// identity below the operators that refer to outer queries and passes
    /// it up through every projection on the way.
    pub fn rel_add_identity2(&mut self, rel: RelId) -> Result<(RelId, Option<ExprId>)> {
        if let Some(id) = self.find_identity(rel)? {
            return Ok((rel, Some(id)));
        }
        let (mut l, mut p) = (rel, rel);
        while !self.rel(l).kind.is_set() && self.rel_has_freevar(l)? {
            let Some(next) = self.rel(l).kind.left() else { break };
            p = l;
            l = next;
        }
        if l == p {
            return self.add_identity(rel);
        }
        let (nl, id) = self.add_identity(l)?;
        self.rel_mut(p).kind.set_left(nl);
        let Some(id) = id else { return Ok((rel, None)) };
        let id = self.exp_ref(id);
        let mut o = Some(rel);
        while let Some(cur) = o.filter(|&c| c != nl) {
            if self.rel(cur).kind.is_project() {
                self.rel_project_add_exp(cur, id)?;
            }
            o = self.rel(cur).kind.left();
        }
        Ok((rel, Some(id)))
    }

    fn find_identity(&self, rel: RelId) -> Result<Option<ExprId>> {
        let x = self.rel(rel);
        if !x.kind.is_project() {
            return Ok(None);
        }
        for &e in x.exps_or_empty() {
            if self.is_identity(e, x.kind.left())? {
                return Ok(Some(e));
            }
        }
        Ok(None)
    }

    fn add_identity(&mut self, rel: RelId) -> Result<(RelId, Option<ExprId>)> {
        let opts = Projections {
            tname: None,
            settname: true,
            intern: true,
            include_subquery: true,
            basecol: false,
        };
        let exps = self.projections_at(Some(rel), &opts, 0)?;
        let Some(first) = exps.first() else {
            return Ok((rel, None));
        };
        let rel = self.rel_project(Some(rel), exps);
        let rname = self.exp_relname(first).map(str::to_string);
        let name = self.exp_name(first).unwrap_or_default().to_string();
        let ty = self.exp_subtype(first);
        let x = self.expr(first);
        let (has_nil, intern) = (x.has_nil(), x.is_intern());
        let card = self.rel(rel).card;
        let col = self.exp_column(rname.as_deref(), &name, ty, card, has_nil, intern);
        let func = self.bind_builtin("identity")?;
        let e = self.exp_unop(col, func);
        let x = self.expr_mut(e);
        x.flags.intern = true;
        x.props.push(Prop::HashCol(None));
        let nr = self.next_label();
        let e = self.exp_label(e, nr);
        self.rel_project_add_exp(rel, e)?;
        Ok((rel, Some(e)))
    }
}

struct Projections<'a> {
    tname: Option<&'a str>,
    settname: bool,
    intern: bool,
    include_subquery: bool,
    basecol: bool,
}
