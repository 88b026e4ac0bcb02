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

//! Identity, alias equality and structural matching of expressions, plus the
//! join-shape predicates built on them.

use crate::context::Context;
use crate::error::Result;
use crate::rel::RelId;

use super::{Atom, Card, Cmp, CmpOp, ExpList, ExprId, ExprKind};

impl Context {
    /// Slot identity.
    pub fn exp_cmp(&self, a: ExprId, b: ExprId) -> bool {
        a == b
    }

    /// Same node, or both carry the same relation and column alias.
    pub fn exp_equal(&self, a: ExprId, b: ExprId) -> bool {
        if a == b {
            return true;
        }
        let (x, y) = (&self.expr(a).alias, &self.expr(b).alias);
        x.rname.is_some() && x.rname == y.rname && x.name == y.name
    }

    /// Same node, column references to the same `(rname, name)`, or row
    /// identities over matching arguments.
    pub fn exp_match(&self, a: ExprId, b: ExprId) -> Result<bool> {
        self.match_at(a, b, 0)
    }

    fn match_at(&self, a: ExprId, b: ExprId, depth: usize) -> Result<bool> {
        self.check_depth(depth)?;
        if a == b {
            return Ok(true);
        }
        match (&self.expr(a).kind, &self.expr(b).kind) {
            (
                ExprKind::Column { rname: r1, name: n1 },
                ExprKind::Column { rname: r2, name: n2 },
            ) => Ok(r1 == r2 && n1 == n2),
            (ExprKind::Func { func: f1, args: a1, .. }, ExprKind::Func { func: f2, args: a2, .. })
                if f1.name == "identity" && f2.name == "identity" =>
            {
                match (a1.as_slice(), a2.as_slice()) {
                    ([x], [y]) => self.match_at(*x, *y, depth + 1),
                    _ => Ok(false),
                }
            }
            _ => Ok(false),
        }
    }

    /// First entry of `list` matching `e` or referred to by it.
    pub fn exps_find_exp(&self, list: &ExpList, e: ExprId) -> Result<Option<ExprId>> {
        for x in list {
            if self.exp_match(x, e)? || self.exp_refers(x, e) {
                return Ok(Some(x));
            }
        }
        Ok(None)
    }

    /// Whether column reference `c` names the output of `p`.
    pub fn exp_refers(&self, p: ExprId, c: ExprId) -> bool {
        let ExprKind::Column { rname, name } = &self.expr(c).kind else {
            return false;
        };
        let p = self.expr(p);
        if p.alias.name.as_deref() != Some(name.as_str()) {
            return false;
        }
        match rname {
            None => true,
            Some(rname) => match (&p.alias.rname, &p.kind) {
                (Some(prname), _) => prname == rname,
                (None, ExprKind::Column { rname: Some(own), .. }) => own == rname,
                (None, _) => false,
            },
        }
    }

    // -----------------------------------------------------------------------
    // Structural match
    // -----------------------------------------------------------------------

    /// Structural equality: `=` and `<>` match with swapped operands, or-lists
    /// and in-lists match as unordered sets.
    pub fn exp_match_exp(&self, a: ExprId, b: ExprId) -> Result<bool> {
        self.match_exp_at(a, b, 0)
    }

    fn match_exp_at(&self, a: ExprId, b: ExprId, depth: usize) -> Result<bool> {
        self.check_depth(depth)?;
        if self.match_at(a, b, depth)? {
            return Ok(true);
        }
        let (x, y) = (self.expr(a), self.expr(b));
        let d = depth + 1;
        match (&x.kind, &y.kind) {
            (ExprKind::Cmp(c1), ExprKind::Cmp(c2)) => match (c1, c2) {
                (
                    Cmp::Simple { op: o1, l: l1, r: r1 },
                    Cmp::Simple { op: o2, l: l2, r: r2 },
                ) if o1 == o2 && x.flags.anti == y.flags.anti => {
                    if self.match_exp_at(*l1, *l2, d)? && self.match_exp_at(*r1, *r2, d)? {
                        return Ok(true);
                    }
                    Ok(o1.is_reflexive()
                        && self.match_exp_at(*l1, *r2, d)?
                        && self.match_exp_at(*r1, *l2, d)?)
                }
                (
                    Cmp::Range { l: l1, low: lo1, high: hi1, ops: p1 },
                    Cmp::Range { l: l2, low: lo2, high: hi2, ops: p2 },
                ) => Ok(p1 == p2
                    && x.flags.anti == y.flags.anti
                    && self.match_exp_at(*l1, *l2, d)?
                    && self.match_exp_at(*lo1, *lo2, d)?
                    && self.match_exp_at(*hi1, *hi2, d)?),
                (Cmp::Or { l: l1, r: r1 }, Cmp::Or { l: l2, r: r2 }) => {
                    Ok(self.match_list_at(l1, l2, d)? && self.match_list_at(r1, r2, d)?)
                }
                (
                    Cmp::In { l: l1, values: v1, negated: n1 },
                    Cmp::In { l: l2, values: v2, negated: n2 },
                ) => Ok(n1 == n2
                    && x.flags.anti == y.flags.anti
                    && self.match_exp_at(*l1, *l2, d)?
                    && self.match_list_at(v1, v2, d)?),
                _ => Ok(false),
            },
            (ExprKind::Convert { expr: e1, from: f1 }, ExprKind::Convert { expr: e2, from: f2 }) => {
                Ok(x.ty == y.ty && f1 == f2 && self.match_exp_at(*e1, *e2, d)?)
            }
            (ExprKind::Aggr { func: f1, args: a1 }, ExprKind::Aggr { func: f2, args: a2 }) => {
                Ok(f1.id == f2.id
                    && x.flags.distinct == y.flags.distinct
                    && x.flags.no_nil == y.flags.no_nil
                    && self.equal_at(a1, a2, d)?)
            }
            (
                ExprKind::Func { func: f1, args: a1, order_by: o1 },
                ExprKind::Func { func: f2, args: a2, order_by: o2 },
            ) => {
                if f1.id != f2.id || f1.side_effect || !self.equal_at(a1, a2, d)? {
                    return Ok(false);
                }
                match (o1, o2) {
                    (None, None) => Ok(true),
                    (Some(o1), Some(o2)) => self.equal_at(o1, o2, d),
                    _ => Ok(false),
                }
            }
            (ExprKind::Atom(Atom::Value(v1)), ExprKind::Atom(Atom::Value(v2))) => {
                Ok(v1.same(v2) && x.ty == y.ty)
            }
            _ => Ok(false),
        }
    }

    /// Unordered list match: every entry of `l` pairs with a distinct entry
    /// of `r`.
    pub fn exp_match_list(&self, l: &ExpList, r: &ExpList) -> Result<bool> {
        self.match_list_at(l, r, 0)
    }

    fn match_list_at(&self, l: &ExpList, r: &ExpList, depth: usize) -> Result<bool> {
        if l.len() != r.len() {
            return Ok(false);
        }
        let mut used = vec![false; r.len()];
        'outer: for le in l {
            for (i, re) in r.iter().enumerate() {
                if !used[i] && self.match_exp_at(le, re, depth)? {
                    used[i] = true;
                    continue 'outer;
                }
            }
            return Ok(false);
        }
        Ok(true)
    }

    /// Pairwise structural match in list order.
    pub fn exps_equal(&self, l: &ExpList, r: &ExpList) -> Result<bool> {
        self.equal_at(l, r, 0)
    }

    fn equal_at(&self, l: &ExpList, r: &ExpList, depth: usize) -> Result<bool> {
        if l.len() != r.len() {
            return Ok(false);
        }
        for (a, b) in l.iter().zip(r.iter()) {
            if !self.match_exp_at(a, b, depth)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Column predicates
    // -----------------------------------------------------------------------

    /// Whether every predicate of `list` compares `e` against an atom;
    /// or-predicates must do so on both sides.
    pub fn exp_match_col_exps(&self, e: ExprId, list: &ExpList) -> Result<bool> {
        for p in list {
            match &self.expr(p).kind {
                ExprKind::Cmp(Cmp::Or { l, r }) => {
                    return Ok(self.exp_match_col_exps(e, l)? && self.exp_match_col_exps(e, r)?);
                }
                ExprKind::Cmp(Cmp::Simple { l, r, .. }) => {
                    if self.expr(*r).card != Card::Atom || !self.exp_match_exp(e, *l)? {
                        return Ok(false);
                    }
                }
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Whether two predicates restrict the same column against constants.
    pub fn exps_match_col_exps(&self, a: ExprId, b: ExprId) -> Result<bool> {
        let (ExprKind::Cmp(c1), ExprKind::Cmp(c2)) = (&self.expr(a).kind, &self.expr(b).kind) else {
            return Ok(false);
        };
        let atom_cmp = |c: &Cmp| match c {
            Cmp::Simple { l, r, .. } if self.expr(*r).card == Card::Atom => Some(*l),
            _ => None,
        };
        let in_cmp = |c: &Cmp| match c {
            Cmp::In { l, .. } => Some(*l),
            _ => None,
        };
        let col = |c: &Cmp| atom_cmp(c).or_else(|| in_cmp(c));
        if let (Some(l1), Some(l2)) = (col(c1), col(c2)) {
            return self.exp_match_exp(l1, l2);
        }
        if let (Some(l1), Cmp::Or { l, r }) = (atom_cmp(c1), c2) {
            return Ok(self.exp_match_col_exps(l1, l)? && self.exp_match_col_exps(l1, r)?);
        }
        if let (Cmp::Or { l, r }, Some(l2)) = (c1, atom_cmp(c2)) {
            return Ok(self.exp_match_col_exps(l2, l)? && self.exp_match_col_exps(l2, r)?);
        }
        if let (Cmp::Or { l, r }, Cmp::Or { .. }) = (c1, c2) {
            if let ([el], [er]) = (l.as_slice(), r.as_slice()) {
                return Ok(self.exps_match_col_exps(*el, b)? && self.exps_match_col_exps(*er, b)?);
            }
        }
        Ok(false)
    }

    // -----------------------------------------------------------------------
    // Join shapes
    // -----------------------------------------------------------------------

    /// A join predicate, including or-predicates with a join on either side.
    pub fn exp_is_join_exp(&self, e: ExprId) -> Result<bool> {
        if self.exp_is_join(e, &[])? {
            return Ok(true);
        }
        let x = self.expr(e);
        if let ExprKind::Cmp(Cmp::Or { l, r }) = &x.kind {
            if x.card >= Card::Aggr {
                for p in l.iter().chain(r.iter()) {
                    if self.exp_is_join_exp(p)? {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Whether `e` compares values from more than one row source. A range
    /// predicate is a join when its bounds come from different relations;
    /// `rels` may name the candidate inputs to decide that.
    pub fn exp_is_join(&self, e: ExprId, rels: &[RelId]) -> Result<bool> {
        let x = self.expr(e);
        if x.card < Card::Aggr {
            return Ok(false);
        }
        match &x.kind {
            ExprKind::Cmp(Cmp::Simple { l, r, .. }) => {
                Ok(!self.is_complex_select(*l)? && !self.is_complex_select(*r)?)
            }
            ExprKind::Cmp(Cmp::Filter { l, r, .. }) => Ok(!l.is_empty() && !r.is_empty()),
            ExprKind::Cmp(Cmp::Range { l, low, high, .. }) => {
                if self.is_complex_select(*l)? || self.is_complex_select(*low)? || self.is_complex_select(*high)? {
                    return Ok(false);
                }
                self.is_rangejoin(*low, *high, rels)
            }
            _ => Ok(false),
        }
    }

    /// An equality between two plain operands.
    pub fn exp_is_eqjoin(&self, e: ExprId) -> bool {
        match &self.expr(e).kind {
            ExprKind::Cmp(Cmp::Simple { op: CmpOp::Eq, l, r }) => {
                let call = |id: ExprId| matches!(self.expr(id).kind, ExprKind::Func { .. } | ExprKind::Aggr { .. });
                !call(*l) && !call(*r)
            }
            _ => false,
        }
    }

    fn is_complex_select(&self, e: ExprId) -> Result<bool> {
        let mut e = e;
        for depth in 0.. {
            self.check_depth(depth)?;
            let x = self.expr(e);
            match &x.kind {
                ExprKind::Convert { expr, .. } => e = *expr,
                ExprKind::Func { .. } | ExprKind::Aggr { .. } => return Ok(x.card == Card::Atom),
                ExprKind::Psm(_) => return Ok(true),
                _ => return Ok(false),
            }
        }
        Ok(false)
    }

    fn is_rangejoin(&self, low: ExprId, high: ExprId, rels: &[RelId]) -> Result<bool> {
        let mut rname = None;
        if self.distinct_rel(low, &mut rname, 0)? && self.distinct_rel(high, &mut rname, 0)? {
            return Ok(false);
        }
        if !rels.is_empty() {
            let r = self.find_rel(rels, low)?;
            let f = self.find_rel(rels, high)?;
            if r.is_some() && r == f {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// First relation of `rels` that can produce `e`.
    pub fn find_rel(&self, rels: &[RelId], e: ExprId) -> Result<Option<RelId>> {
        for &rel in rels {
            if self.rel_find_exp(rel, e)?.is_some() {
                return Ok(Some(rel));
            }
        }
        Ok(None)
    }

    /// Whether all column references under `e` come from a single relation,
    /// recorded in `rname`.
    fn distinct_rel<'a>(&'a self, e: ExprId, rname: &mut Option<&'a str>, depth: usize) -> Result<bool> {
        self.check_depth(depth)?;
        match &self.expr(e).kind {
            ExprKind::Column { .. } => {
                let own = self.exp_relname(e);
                match (*rname, own) {
                    (Some(have), Some(own)) if have == own => Ok(true),
                    (None, _) => {
                        *rname = own;
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
            ExprKind::Func { args, .. } | ExprKind::Aggr { args, .. } => {
                if args.is_empty() {
                    return Ok(false);
                }
                for a in args {
                    if !self.distinct_rel(a, rname, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ExprKind::Atom(_) => Ok(true),
            ExprKind::Convert { expr, .. } => self.distinct_rel(*expr, rname, depth + 1),
            _ => Ok(false),
        }
    }
}
