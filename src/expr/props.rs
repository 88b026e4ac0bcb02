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

// Queries over expressions: types, cardinality, atomicity, literal folding.

use crate::catalog::FuncKind;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::rel::RelId;
use crate::types::{SqlType, TypeId, Value};

use super::{Atom, Card, Cmp, ExpList, ExprId, ExprKind};

impl Context {
    /// Scalar type of `e`. Comparisons have none.
    pub fn exp_subtype(&self, e: ExprId) -> Option<SqlType> {
        let x = self.expr(e);
        match &x.kind {
            ExprKind::Cmp(_) => None,
            _ => x.ty.clone(),
        }
    }

    /// Types of all entries of `list`.
    pub fn exp_types(&self, list: &ExpList) -> Vec<Option<SqlType>> {
        list.iter().map(|e| self.exp_subtype(e)).collect()
    }

    /// Whether any entry of `list` may produce NULL.
    pub fn have_nil(&self, list: &ExpList) -> bool {
        list.iter().any(|e| self.expr(e).has_nil())
    }

    // -----------------------------------------------------------------------
    // Cardinality
    // -----------------------------------------------------------------------

    pub fn exps_card(&self, list: &ExpList) -> Card {
        list.iter()
            .map(|e| self.expr(e).card)
            .max()
            .unwrap_or(Card::Atom)
    }

    /// Cap the cardinality of every entry at `card`.
    pub fn exps_fix_card(&mut self, list: &ExpList, card: Card) {
        for e in list {
            let x = self.expr_mut(e);
            x.card = x.card.min(card);
        }
    }

    /// Set the cardinality of every non-atomic entry.
    pub fn exps_setcard(&mut self, list: &ExpList, card: Card) {
        for e in list {
            let x = self.expr_mut(e);
            if x.card != Card::Atom {
                x.card = card;
            }
        }
    }

    pub fn exps_intern(&self, list: &ExpList) -> bool {
        list.iter().any(|e| self.expr(e).is_intern())
    }

    // -----------------------------------------------------------------------
    // Structural predicates
    // -----------------------------------------------------------------------

    /// Whether `e` computes a single constant value.
    pub fn exp_is_atom(&self, e: ExprId) -> Result<bool> {
        self.is_atom_at(e, 0)
    }

    fn is_atom_at(&self, e: ExprId, depth: usize) -> Result<bool> {
        self.check_depth(depth)?;
        let x = self.expr(e);
        Ok(match &x.kind {
            ExprKind::Atom(Atom::Values(_)) => false,
            ExprKind::Atom(_) => true,
            ExprKind::Convert { expr, .. } => self.is_atom_at(*expr, depth + 1)?,
            ExprKind::Func { args, .. } | ExprKind::Aggr { args, .. } => {
                if x.card != Card::Atom {
                    return Ok(false);
                }
                for a in args {
                    if !self.is_atom_at(a, depth + 1)? {
                        return Ok(false);
                    }
                }
                true
            }
            ExprKind::Column { .. } | ExprKind::Cmp(_) | ExprKind::Psm(_) => false,
        })
    }

    pub fn exps_are_atoms(&self, list: &ExpList) -> Result<bool> {
        for e in list {
            if !self.is_atom_at(e, 0)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether `e` contains a scalar function call.
    pub fn exp_has_func(&self, e: ExprId) -> Result<bool> {
        self.has_func_at(e, 0)
    }

    fn has_func_at(&self, e: ExprId, depth: usize) -> Result<bool> {
        self.check_depth(depth)?;
        let any = |list: &ExpList| -> Result<bool> {
            for a in list {
                if self.has_func_at(a, depth + 1)? {
                    return Ok(true);
                }
            }
            Ok(false)
        };
        match &self.expr(e).kind {
            ExprKind::Func { .. } => Ok(true),
            ExprKind::Convert { expr, .. } => self.has_func_at(*expr, depth + 1),
            ExprKind::Aggr { args, .. } => any(args),
            ExprKind::Cmp(Cmp::Or { l, r }) | ExprKind::Cmp(Cmp::Filter { l, r, .. }) => {
                Ok(any(l)? || any(r)?)
            }
            ExprKind::Cmp(Cmp::In { l, values, .. }) => {
                Ok(self.has_func_at(*l, depth + 1)? || any(values)?)
            }
            ExprKind::Cmp(Cmp::Simple { l, r, .. }) => {
                Ok(self.has_func_at(*l, depth + 1)? || self.has_func_at(*r, depth + 1)?)
            }
            ExprKind::Cmp(Cmp::Range { l, low, high, .. }) => Ok(self.has_func_at(*l, depth + 1)?
                || self.has_func_at(*low, depth + 1)?
                || self.has_func_at(*high, depth + 1)?),
            ExprKind::Atom(_) | ExprKind::Column { .. } | ExprKind::Psm(_) => Ok(false),
        }
    }

    /// Whether evaluating `e` calls a function with side effects.
    pub fn exp_has_sideeffect(&self, e: ExprId) -> Result<bool> {
        self.has_sideeffect_at(e, 0)
    }

    fn has_sideeffect_at(&self, e: ExprId, depth: usize) -> Result<bool> {
        self.check_depth(depth)?;
        match &self.expr(e).kind {
            ExprKind::Convert { expr, .. } => self.has_sideeffect_at(*expr, depth + 1),
            ExprKind::Func { func, args, .. } => {
                if func.side_effect {
                    return Ok(true);
                }
                for a in args {
                    if self.has_sideeffect_at(a, depth + 1)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// Whether `e` must not be moved or duplicated: analytic functions and,
    /// unless allowed, row identities.
    pub fn exp_unsafe(&self, e: ExprId, allow_identity: bool) -> Result<bool> {
        self.unsafe_at(e, allow_identity, 0)
    }

    fn unsafe_at(&self, e: ExprId, allow_identity: bool, depth: usize) -> Result<bool> {
        self.check_depth(depth)?;
        match &self.expr(e).kind {
            ExprKind::Convert { expr, .. } => self.unsafe_at(*expr, allow_identity, depth + 1),
            ExprKind::Func { func, args, .. } if !args.is_empty() => {
                if func.kind == FuncKind::Analytic || (!allow_identity && func.name == "identity") {
                    return Ok(true);
                }
                for a in args {
                    if self.unsafe_at(a, allow_identity, depth + 1)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// Whether `e` is certainly NULL. Two-argument calls are NULL when an
    /// argument is.
    pub fn exp_is_null(&self, e: ExprId) -> Result<bool> {
        self.is_null_at(e, 0)
    }

    fn is_null_at(&self, e: ExprId, depth: usize) -> Result<bool> {
        self.check_depth(depth)?;
        match &self.expr(e).kind {
            ExprKind::Atom(Atom::Values(_)) => Ok(false),
            ExprKind::Atom(a) => Ok(self.atom_value(a).is_some_and(Value::is_nil)),
            ExprKind::Convert { expr, .. } => self.is_null_at(*expr, depth + 1),
            ExprKind::Func { args, .. } | ExprKind::Aggr { args, .. } if args.len() == 2 => {
                for a in args {
                    if self.is_null_at(a, depth + 1)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// A boolean literal `true`.
    pub fn exp_is_true(&self, e: ExprId) -> bool {
        self.bound_atom(e, |ty| ty == TypeId::Bit)
            .is_some_and(|v| v.is_true())
    }

    /// A numeric literal zero.
    pub fn exp_is_zero(&self, e: ExprId) -> bool {
        self.bound_atom(e, TypeId::is_numeric)
            .is_some_and(|v| v.is_zero())
    }

    /// A non-NULL literal.
    pub fn exp_is_not_null(&self, e: ExprId) -> bool {
        self.bound_atom(e, TypeId::is_numeric)
            .is_some_and(|v| !v.is_nil())
    }

    /// Literal value of an atom; argument references resolve only when
    /// their declared type passes `accept`.
    fn bound_atom(&self, e: ExprId, accept: impl Fn(TypeId) -> bool) -> Option<&Value> {
        let x = self.expr(e);
        match &x.kind {
            ExprKind::Atom(Atom::Value(v)) => Some(v),
            ExprKind::Atom(Atom::Ref(nr)) if x.ty.as_ref().is_some_and(|t| accept(t.local)) => {
                self.arg(*nr)
            }
            _ => None,
        }
    }

    fn atom_value<'a>(&'a self, a: &'a Atom) -> Option<&'a Value> {
        match a {
            Atom::Value(v) => Some(v),
            Atom::Ref(nr) => self.arg(*nr),
            _ => None,
        }
    }

    pub fn exp_aggr_is_count(&self, e: ExprId) -> bool {
        matches!(&self.expr(e).kind, ExprKind::Aggr { func, .. } if func.name == "count")
    }

    /// Whether `e` is, or refers through `rel`'s projections to, a row
    /// identity.
    pub fn is_identity(&self, e: ExprId, rel: Option<RelId>) -> Result<bool> {
        self.is_identity_at(e, rel, 0)
    }

    fn is_identity_at(&self, e: ExprId, rel: Option<RelId>, depth: usize) -> Result<bool> {
        self.check_depth(depth)?;
        let x = self.expr(e);
        match &x.kind {
            ExprKind::Func { func, .. } => Ok(func.name == "identity"),
            ExprKind::Column { rname, name } => {
                let Some(r) = rel else { return Ok(false) };
                let r = self.rel(r);
                let Some(exps) = r.exps.as_ref().filter(|_| r.kind.is_project()) else {
                    return Ok(false);
                };
                let mut re = match rname {
                    Some(rname) => self.exps_bind_column2(exps, rname, name),
                    None => None,
                };
                if re.is_none() && x.has_label() {
                    re = self.exps_bind_column(exps, name)?;
                }
                match re {
                    Some(re) => self.is_identity_at(re, r.kind.left(), depth + 1),
                    None => Ok(false),
                }
            }
            _ => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Free variables
    // -----------------------------------------------------------------------

    /// Whether `e` refers to an outer query, looking through conversions and
    /// operands.
    pub fn exp_has_freevar(&self, e: ExprId) -> Result<bool> {
        self.has_freevar_at(e, 0)
    }

    fn has_freevar_at(&self, e: ExprId, depth: usize) -> Result<bool> {
        self.check_depth(depth)?;
        let x = self.expr(e);
        if x.flags.freevar {
            return Ok(true);
        }
        let any = |list: &ExpList| -> Result<bool> {
            for a in list {
                if self.has_freevar_at(a, depth + 1)? {
                    return Ok(true);
                }
            }
            Ok(false)
        };
        match &x.kind {
            ExprKind::Convert { expr, .. } => self.has_freevar_at(*expr, depth + 1),
            ExprKind::Func { args, .. } | ExprKind::Aggr { args, .. } => any(args),
            ExprKind::Cmp(Cmp::Simple { l, r, .. }) => {
                Ok(self.has_freevar_at(*l, depth + 1)? || self.has_freevar_at(*r, depth + 1)?)
            }
            ExprKind::Cmp(Cmp::Range { l, low, high, .. }) => Ok(self.has_freevar_at(*l, depth + 1)?
                || self.has_freevar_at(*low, depth + 1)?
                || self.has_freevar_at(*high, depth + 1)?),
            ExprKind::Cmp(Cmp::In { l, values, .. }) => {
                Ok(self.has_freevar_at(*l, depth + 1)? || any(values)?)
            }
            ExprKind::Cmp(Cmp::Or { l, r }) | ExprKind::Cmp(Cmp::Filter { l, r, .. }) => {
                Ok(any(l)? || any(r)?)
            }
            ExprKind::Atom(_) | ExprKind::Column { .. } | ExprKind::Psm(_) => Ok(false),
        }
    }

    pub fn exps_reset_freevar(&mut self, list: &ExpList) {
        for e in list {
            self.expr_mut(e).flags.freevar = false;
        }
    }

    // -----------------------------------------------------------------------
    // References and folding
    // -----------------------------------------------------------------------

    /// A column reference to every entry of `list`.
    pub fn exps_alias(&mut self, list: &ExpList) -> ExpList {
        list.iter().map(|e| self.exp_ref(e)).collect()
    }

    /// Constant value of `e` when it consists of literals, conversions and
    /// numeric `sql_add`/`sql_sub` calls only.
    pub fn exp_flatten(&self, e: ExprId) -> Result<Option<Value>> {
        self.flatten_at(e, 0)
    }

    fn flatten_at(&self, e: ExprId, depth: usize) -> Result<Option<Value>> {
        self.check_depth(depth)?;
        let x = self.expr(e);
        match &x.kind {
            ExprKind::Atom(a) => Ok(self.atom_value(a).cloned()),
            ExprKind::Convert { expr, .. } => {
                let (Some(v), Some(to)) = (self.flatten_at(*expr, depth + 1)?, x.ty.as_ref()) else {
                    return Ok(None);
                };
                Ok(v.cast(to.local).ok())
            }
            ExprKind::Func { func, args, .. } if args.len() == 2 => {
                let add = match func.name.as_str() {
                    "sql_add" => true,
                    "sql_sub" => false,
                    _ => return Ok(None),
                };
                let Some(res) = x.ty.as_ref().filter(|t| t.local.is_numeric()) else {
                    return Ok(None);
                };
                let (Some(a), Some(b)) = (
                    self.flatten_at(args.as_slice()[0], depth + 1)?,
                    self.flatten_at(args.as_slice()[1], depth + 1)?,
                ) else {
                    return Ok(None);
                };
                arith(&a, &b, res.local, add).map(Some)
            }
            _ => Ok(None),
        }
    }
}

/// `a + b` or `a - b` in type `ty`; NIL operands give NIL.
fn arith(a: &Value, b: &Value, ty: TypeId, add: bool) -> Result<Value> {
    let op = if add { "sql_add" } else { "sql_sub" };
    if a.is_nil() || b.is_nil() {
        return Ok(Value::nil(ty));
    }
    if ty.is_float() {
        let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
            return Err(Error::unsupported(op, ty));
        };
        let r = if add { x + y } else { x - y };
        return Value::Dbl(r).cast(ty);
    }
    let (Some(x), Some(y)) = (a.as_i128(), b.as_i128()) else {
        return Err(Error::unsupported(op, ty));
    };
    let r = if add { x.checked_add(y) } else { x.checked_sub(y) };
    r.and_then(|r| Value::from_i128(ty, r))
        .ok_or(Error::Overflow { op })
}
