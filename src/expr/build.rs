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

// Expression constructors and naming.

use std::sync::Arc;

use crate::catalog::{Func, Table};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::rel::RelId;
use crate::types::{SqlType, TypeId, Value};

use super::{number2name, Atom, Card, Cmp, CmpOp, ExpList, Expr, ExprId, ExprKind, Psm, RangeOps};

impl Context {
    // -----------------------------------------------------------------------
    // Comparisons
    // -----------------------------------------------------------------------

    /// `l op r`. Comparing a non-atomic left side against atoms yields a
    /// per-group value.
    pub fn exp_compare(&mut self, l: ExprId, r: ExprId, op: CmpOp) -> Result<ExprId> {
        let mut card = self.expr(l).card.max(self.expr(r).card);
        if card == Card::Atom && !self.exp_is_atom(l)? {
            card = Card::Aggr;
        }
        let kind = ExprKind::Cmp(Cmp::Simple { op, l, r });
        Ok(self.add_expr(Expr::new(kind, card, None)))
    }

    /// Range predicate `low (<|<=) l (<|<=) high`.
    pub fn exp_range(&mut self, l: ExprId, low: ExprId, high: ExprId, ops: RangeOps) -> Result<ExprId> {
        let mut card = self.expr(l).card;
        if card == Card::Atom && !self.exp_is_atom(l)? {
            card = Card::Aggr;
        }
        let kind = ExprKind::Cmp(Cmp::Range { l, low, high, ops });
        Ok(self.add_expr(Expr::new(kind, card, None)))
    }

    /// Predicate computed by a boolean filter function over `l` and `r`.
    pub fn exp_filter(&mut self, l: ExpList, r: ExpList, func: Arc<Func>, anti: bool) -> ExprId {
        let card = self.exps_card(&l);
        let mut e = Expr::new(ExprKind::Cmp(Cmp::Filter { func, l, r }), card, None);
        e.flags.anti = anti;
        self.add_expr(e)
    }

    /// Disjunction of the conjunctions `l` and `r`.
    pub fn exp_or(&mut self, l: ExpList, r: ExpList, anti: bool) -> ExprId {
        let card = if l.is_empty() {
            self.exps_card(&r)
        } else {
            self.exps_card(&l)
        };
        let mut e = Expr::new(ExprKind::Cmp(Cmp::Or { l, r }), card, None);
        e.flags.anti = anti;
        self.add_expr(e)
    }

    pub fn exp_in(&mut self, l: ExprId, values: ExpList, negated: bool) -> ExprId {
        let card = self.expr(l).card;
        let kind = ExprKind::Cmp(Cmp::In { l, values, negated });
        self.add_expr(Expr::new(kind, card, None))
    }

    // -----------------------------------------------------------------------
    // Conversions, functions, aggregates
    // -----------------------------------------------------------------------

    /// Convert `expr` from `from` to `to`. The conversion keeps the alias of
    /// its operand so it can stand in for it.
    pub fn exp_convert(&mut self, expr: ExprId, from: SqlType, to: SqlType) -> ExprId {
        let (card, alias) = {
            let inner = self.expr(expr);
            (inner.card, inner.alias.clone())
        };
        let mut e = Expr::new(ExprKind::Convert { expr, from }, card, Some(to));
        e.alias = alias;
        self.add_expr(e)
    }

    /// Call of a scalar function.
    pub fn exp_op(&mut self, args: ExpList, func: Arc<Func>) -> ExprId {
        let mut card = if args.is_empty() {
            Card::Atom
        } else {
            self.exps_card(&args)
        };
        if func.side_effect {
            card = Card::Multi;
        }
        let ty = self.result_type(&func, &args);
        let kind = ExprKind::Func {
            func,
            args,
            order_by: None,
        };
        self.add_expr(Expr::new(kind, card, ty))
    }

    pub fn exp_unop(&mut self, arg: ExprId, func: Arc<Func>) -> ExprId {
        self.exp_op(ExpList::from(vec![arg]), func)
    }

    pub fn exp_binop(&mut self, l: ExprId, r: ExprId, func: Arc<Func>) -> ExprId {
        self.exp_op(ExpList::from(vec![l, r]), func)
    }

    pub fn exp_op3(&mut self, a: ExprId, b: ExprId, c: ExprId, func: Arc<Func>) -> ExprId {
        self.exp_op(ExpList::from(vec![a, b, c]), func)
    }

    /// Call of an aggregate; `card` is the cardinality of the result.
    pub fn exp_aggr(
        &mut self,
        args: ExpList,
        func: Arc<Func>,
        distinct: bool,
        no_nil: bool,
        card: Card,
        has_nil: bool,
    ) -> ExprId {
        let ty = self.result_type(&func, &args);
        let mut e = Expr::new(ExprKind::Aggr { func, args }, card, ty);
        e.flags.distinct = distinct;
        e.flags.no_nil = no_nil;
        e.flags.has_no_nil = !has_nil;
        self.add_expr(e)
    }

    fn result_type(&self, func: &Func, args: &ExpList) -> Option<SqlType> {
        match func.res.first() {
            Some(t) => Some(t.clone()),
            None => args.first().and_then(|a| self.exp_subtype(a)),
        }
    }

    // -----------------------------------------------------------------------
    // Atoms
    // -----------------------------------------------------------------------

    pub fn exp_atom(&mut self, value: Value, ty: SqlType) -> ExprId {
        let mut e = Expr::new(ExprKind::Atom(Atom::Value(value)), Card::Atom, Some(ty));
        if let ExprKind::Atom(Atom::Value(v)) = &e.kind {
            e.flags.has_no_nil = !v.is_nil();
        }
        self.add_expr(e)
    }

    pub fn exp_atom_bool(&mut self, b: bool) -> ExprId {
        self.exp_atom(Value::bool(b), SqlType::boolean())
    }

    pub fn exp_atom_bte(&mut self, v: i8) -> ExprId {
        self.exp_atom(Value::Bte(v), SqlType::local(TypeId::Bte))
    }

    pub fn exp_atom_sht(&mut self, v: i16) -> ExprId {
        self.exp_atom(Value::Sht(v), SqlType::local(TypeId::Sht))
    }

    pub fn exp_atom_int(&mut self, v: i32) -> ExprId {
        self.exp_atom(Value::Int(v), SqlType::local(TypeId::Int))
    }

    /// A `bigint` literal; 18 digits when `hugeint` is available.
    pub fn exp_atom_lng(&mut self, v: i64) -> ExprId {
        let mut ty = SqlType::local(TypeId::Lng);
        if self.config().have_hge {
            ty.digits = 18;
        }
        self.exp_atom(Value::Lng(v), ty)
    }

    pub fn exp_atom_hge(&mut self, v: i128) -> ExprId {
        self.exp_atom(Value::Hge(v), SqlType::local(TypeId::Hge))
    }

    pub fn exp_atom_flt(&mut self, v: f32) -> ExprId {
        self.exp_atom(Value::Flt(v), SqlType::local(TypeId::Flt))
    }

    pub fn exp_atom_dbl(&mut self, v: f64) -> ExprId {
        self.exp_atom(Value::Dbl(v), SqlType::local(TypeId::Dbl))
    }

    pub fn exp_atom_str(&mut self, s: &str, ty: SqlType) -> ExprId {
        self.exp_atom(Value::str(s), ty)
    }

    pub fn exp_atom_clob(&mut self, s: &str) -> ExprId {
        self.exp_atom(Value::str(s), SqlType::local(TypeId::Str))
    }

    /// The largest value of an integer type.
    pub fn exp_atom_max(&mut self, ty: SqlType) -> Result<ExprId> {
        let v = match ty.local {
            TypeId::Bte => Value::Bte(i8::MAX),
            TypeId::Sht => Value::Sht(i16::MAX),
            TypeId::Int => Value::Int(i32::MAX),
            TypeId::Lng => Value::Lng(i64::MAX),
            TypeId::Hge if self.config().have_hge => Value::Hge(i128::MAX),
            _ => return Err(self.error(Error::unsupported("max", &ty))),
        };
        Ok(self.exp_atom(v, ty))
    }

    /// NULL of the given type.
    pub fn exp_null(&mut self, ty: SqlType) -> ExprId {
        self.exp_atom(Value::nil(ty.local), ty)
    }

    /// Reference to positional argument `nr`.
    pub fn exp_atom_ref(&mut self, nr: usize, ty: Option<SqlType>) -> ExprId {
        self.add_expr(Expr::new(ExprKind::Atom(Atom::Ref(nr)), Card::Atom, ty))
    }

    pub fn exp_param(&mut self, name: &str, ty: Option<SqlType>, frame: u32) -> ExprId {
        let kind = ExprKind::Atom(Atom::Param {
            name: name.to_string(),
            frame,
        });
        self.add_expr(Expr::new(kind, Card::Atom, ty))
    }

    /// A list of values; unlike other atoms it yields one row per entry.
    pub fn exp_values(&mut self, values: ExpList) -> ExprId {
        let ty = values.first().and_then(|v| self.exp_subtype(v));
        self.add_expr(Expr::new(ExprKind::Atom(Atom::Values(values)), Card::Multi, ty))
    }

    // -----------------------------------------------------------------------
    // Columns and aliases
    // -----------------------------------------------------------------------

    pub fn exp_column(
        &mut self,
        rname: Option<&str>,
        name: &str,
        ty: Option<SqlType>,
        card: Card,
        has_nil: bool,
        intern: bool,
    ) -> ExprId {
        let kind = ExprKind::Column {
            rname: rname.map(str::to_string),
            name: name.to_string(),
        };
        let mut e = Expr::new(kind, card, ty);
        e.alias.rname = rname.map(str::to_string);
        e.alias.name = Some(name.to_string());
        e.flags.has_no_nil = !has_nil;
        e.flags.intern = intern;
        self.add_expr(e)
    }

    /// Column `org_rname.org_cname` exposed as `arname.acname`; a missing
    /// `arname` keeps the original relation name.
    #[allow(clippy::too_many_arguments)]
    pub fn exp_alias(
        &mut self,
        arname: Option<&str>,
        acname: &str,
        org_rname: Option<&str>,
        org_cname: &str,
        ty: Option<SqlType>,
        card: Card,
        has_nil: bool,
        intern: bool,
    ) -> ExprId {
        let e = self.exp_column(org_rname, org_cname, ty, card, has_nil, intern);
        self.exp_setname(e, arname.or(org_rname), Some(acname));
        e
    }

    /// A column reference to `old` as seen from relation `orel`, named
    /// `tname.cname`. An unnamed `old` gets `cname` or a generated label.
    pub fn exp_alias_or_copy(
        &mut self,
        tname: Option<&str>,
        cname: Option<&str>,
        orel: Option<RelId>,
        old: ExprId,
    ) -> ExprId {
        let o = self.expr(old);
        let tname: Option<String> = tname.map(str::to_string).or_else(|| {
            o.alias.rname.clone().or_else(|| match &o.kind {
                ExprKind::Column { rname, .. } => rname.clone(),
                _ => None,
            })
        });
        let card = orel.map_or(Card::Atom, |r| self.rel(r).card);
        let ty = self.exp_subtype(old);
        let (has_nil, intern) = (o.has_nil(), o.is_intern());

        let ne = match cname {
            None => {
                if self.exp_name(old).is_none() || !o.has_label() {
                    let nr = self.next_label();
                    let nme = number2name(nr);
                    self.exp_setname(old, Some(&nme), Some(&nme));
                }
                let rname = self.exp_relname(old).map(str::to_string);
                let name = self.exp_name(old).unwrap_or_default().to_string();
                self.exp_column(rname.as_deref(), &name, ty, card, has_nil, intern)
            }
            Some(cname) => {
                if self.expr(old).alias.name.is_none() {
                    self.exp_setname(old, tname.as_deref(), Some(cname));
                }
                self.exp_column(tname.as_deref(), cname, ty, card, has_nil, intern)
            }
        };
        self.exp_propagate(ne, old)
    }

    /// A column reference to the (named) result of `e`. Unnamed
    /// expressions are labelled first.
    pub fn exp_ref(&mut self, e: ExprId) -> ExprId {
        if self.exp_name(e).is_none() {
            let nr = self.next_label();
            self.exp_label(e, nr);
        }
        let rname = self.exp_relname(e).map(str::to_string);
        let name = self.exp_name(e).unwrap_or_default().to_string();
        let ty = self.exp_subtype(e);
        let o = self.expr(e);
        let (card, has_nil, intern) = (o.card, o.has_nil(), o.is_intern());
        let ne = self.exp_column(rname.as_deref(), &name, ty, card, has_nil, intern);
        self.exp_propagate(ne, e)
    }

    /// Transfer the intern, anti and basecol flags and the properties of
    /// `oe` to `ne`.
    pub fn exp_propagate(&mut self, ne: ExprId, oe: ExprId) -> ExprId {
        let o = self.expr(oe);
        let (flags, props) = (o.flags, o.props.clone());
        let n = self.expr_mut(ne);
        n.flags.intern |= flags.intern;
        n.flags.anti |= flags.anti;
        n.flags.basecol |= flags.basecol;
        n.props = props;
        ne
    }

    // -----------------------------------------------------------------------
    // Procedural statements
    // -----------------------------------------------------------------------

    pub fn exp_set(&mut self, name: &str, value: ExprId, level: u32) -> ExprId {
        let kind = ExprKind::Psm(Psm::Set {
            name: name.to_string(),
            value,
            level,
        });
        self.add_named_psm(kind, name, None)
    }

    pub fn exp_var(&mut self, name: &str, ty: SqlType, level: u32) -> ExprId {
        let kind = ExprKind::Psm(Psm::Var {
            name: name.to_string(),
            level,
        });
        self.add_named_psm(kind, name, Some(ty))
    }

    pub fn exp_table(&mut self, name: &str, table: Arc<Table>, level: u32) -> ExprId {
        let kind = ExprKind::Psm(Psm::Table {
            name: name.to_string(),
            table,
            level,
        });
        self.add_named_psm(kind, name, None)
    }

    fn add_named_psm(&mut self, kind: ExprKind, name: &str, ty: Option<SqlType>) -> ExprId {
        let mut e = Expr::new(kind, Card::Atom, ty);
        e.alias.name = Some(name.to_string());
        self.add_expr(e)
    }

    pub fn exp_return(&mut self, value: ExprId, level: u32) -> ExprId {
        let kind = ExprKind::Psm(Psm::Return { value, level });
        self.add_expr(Expr::new(kind, Card::Atom, None))
    }

    pub fn exp_while(&mut self, cond: ExprId, body: ExpList) -> ExprId {
        let kind = ExprKind::Psm(Psm::While { cond, body });
        self.add_expr(Expr::new(kind, Card::Atom, None))
    }

    pub fn exp_if(&mut self, cond: ExprId, then: ExpList, otherwise: Option<ExpList>) -> ExprId {
        let kind = ExprKind::Psm(Psm::If {
            cond,
            then,
            otherwise,
        });
        self.add_expr(Expr::new(kind, Card::Atom, None))
    }

    /// Wrap a relational plan as a statement; takes over the caller's
    /// reference to `rel`.
    pub fn exp_rel(&mut self, rel: RelId) -> ExprId {
        let card = self.rel(rel).card;
        self.add_expr(Expr::new(ExprKind::Psm(Psm::Rel(rel)), card, None))
    }

    pub fn exp_exception(&mut self, cond: ExprId, message: &str) -> ExprId {
        let kind = ExprKind::Psm(Psm::Exception {
            cond,
            message: message.to_string(),
        });
        self.add_expr(Expr::new(kind, Card::Atom, None))
    }

    // -----------------------------------------------------------------------
    // Naming
    // -----------------------------------------------------------------------

    /// Set the relation name and, when given, the column name of `e`. Clears
    /// any generated label.
    pub fn exp_setname(&mut self, e: ExprId, rname: Option<&str>, name: Option<&str>) {
        let alias = &mut self.expr_mut(e).alias;
        alias.label = 0;
        if let Some(name) = name {
            alias.name = Some(name.to_string());
        }
        alias.rname = rname.map(str::to_string);
        self.renamed();
    }

    /// Replace both alias parts of `e`.
    pub fn exp_setalias(&mut self, e: ExprId, rname: Option<String>, name: Option<String>) {
        let alias = &mut self.expr_mut(e).alias;
        alias.label = 0;
        alias.rname = rname;
        alias.name = name;
        self.renamed();
    }

    /// Copy the alias of `oe` onto `e`.
    pub fn exp_prop_alias(&mut self, e: ExprId, oe: ExprId) {
        let alias = self.expr(oe).alias.clone();
        self.expr_mut(e).alias = alias;
        self.renamed();
    }

    pub fn exp_setrelname(&mut self, e: ExprId, nr: u32) {
        let alias = &mut self.expr_mut(e).alias;
        alias.label = 0;
        alias.rname = Some(number2name(nr));
        self.renamed();
    }

    /// Name `e` after label `nr`, both as relation and as column.
    pub fn exp_label(&mut self, e: ExprId, nr: u32) -> ExprId {
        let name = number2name(nr);
        let alias = &mut self.expr_mut(e).alias;
        alias.label = nr;
        alias.rname = Some(name.clone());
        alias.name = Some(name);
        self.renamed();
        e
    }

    /// Label the entries of `list` with `nr`, `nr + 1`, ...
    pub fn exps_label(&mut self, list: &ExpList, nr: u32) {
        for (i, e) in list.iter().enumerate() {
            self.exp_label(e, nr + i as u32);
        }
    }

    /// Column name of `e`, looking through conversions.
    pub fn exp_name(&self, mut e: ExprId) -> Option<&str> {
        loop {
            let x = self.expr(e);
            if let Some(name) = &x.alias.name {
                return Some(name);
            }
            match x.kind {
                ExprKind::Convert { expr, .. } => e = expr,
                _ => return None,
            }
        }
    }

    pub fn exp_relname(&self, e: ExprId) -> Option<&str> {
        self.expr(e).alias.rname.as_deref()
    }

    /// Relation name of `e`, falling back to the relation a column was
    /// produced by.
    pub fn exp_find_rel_name(&self, mut e: ExprId) -> Option<&str> {
        loop {
            let x = self.expr(e);
            if let Some(rname) = &x.alias.rname {
                return Some(rname);
            }
            match &x.kind {
                ExprKind::Column { rname, .. } => return rname.as_deref(),
                ExprKind::Convert { expr, .. } => e = *expr,
                _ => return None,
            }
        }
    }

    /// Function name of a call, otherwise the expression's name.
    pub fn exp_func_name(&self, e: ExprId) -> Option<&str> {
        let x = self.expr(e);
        match &x.kind {
            ExprKind::Func { func, .. } => Some(&func.name),
            ExprKind::Convert { expr, .. } if x.alias.name.is_none() => self.exp_name(*expr),
            _ => x.alias.name.as_deref(),
        }
    }

    /// Exchange the operands of a simple comparison.
    pub fn exp_swap(&mut self, e: ExprId) {
        if let ExprKind::Cmp(Cmp::Simple { op, l, r }) = &mut self.expr_mut(e).kind {
            std::mem::swap(l, r);
            *op = op.swap();
        }
    }
}
