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

use crate::context::Context;
use crate::error::Result;

use super::{Atom, Cmp, ExpList, Expr, ExprId, ExprKind, Psm};

impl Context {
    /// Copy every entry of `list`.
    pub fn exps_copy(&mut self, list: &ExpList) -> Result<ExpList> {
        self.copy_list_at(list, 0)
    }

    /// A new node with the shape of `e`. Argument lists are copied element
    /// by element; literals are copied by value and parameters re-created.
    /// Calls without arguments are returned as they are.
    pub fn exp_copy(&mut self, e: ExprId) -> Result<ExprId> {
        self.copy_at(e, 0)
    }

    fn copy_list_at(&mut self, list: &ExpList, depth: usize) -> Result<ExpList> {
        let mut out = ExpList::new();
        for e in list {
            out.push(self.copy_at(e, depth)?);
        }
        Ok(out)
    }

    fn copy_at(&mut self, e: ExprId, depth: usize) -> Result<ExprId> {
        self.check_depth(depth)?;
        let d = depth + 1;
        let x = self.expr(e);
        let (card, ty, flags, aliased) = (x.card, x.ty.clone(), x.flags, x.alias.name.is_some());
        let ne = match x.kind.clone() {
            ExprKind::Column { rname, name } => {
                self.exp_column(rname.as_deref(), &name, ty, card, !flags.has_no_nil, flags.intern)
            }
            ExprKind::Cmp(Cmp::Or { l, r }) => {
                let (l, r) = (self.copy_list_at(&l, d)?, self.copy_list_at(&r, d)?);
                self.exp_or(l, r, flags.anti)
            }
            ExprKind::Cmp(Cmp::Filter { func, l, r }) => {
                let (l, r) = (self.copy_list_at(&l, d)?, self.copy_list_at(&r, d)?);
                self.exp_filter(l, r, func, flags.anti)
            }
            ExprKind::Cmp(Cmp::In { l, values, negated }) => {
                let l = self.copy_at(l, d)?;
                let values = self.copy_list_at(&values, d)?;
                self.exp_in(l, values, negated)
            }
            ExprKind::Cmp(Cmp::Simple { op, l, r }) => {
                let (l, r) = (self.copy_at(l, d)?, self.copy_at(r, d)?);
                self.exp_compare(l, r, op)?
            }
            ExprKind::Cmp(Cmp::Range { l, low, high, ops }) => {
                let l = self.copy_at(l, d)?;
                let low = self.copy_at(low, d)?;
                let high = self.copy_at(high, d)?;
                self.exp_range(l, low, high, ops)?
            }
            ExprKind::Convert { expr, from } => {
                let inner = self.copy_at(expr, d)?;
                let to = ty.unwrap_or_else(|| from.clone());
                self.exp_convert(inner, from, to)
            }
            ExprKind::Func { args, .. } | ExprKind::Aggr { args, .. } if args.is_empty() => {
                return Ok(e);
            }
            ExprKind::Func { func, args, order_by } => {
                let args = self.copy_list_at(&args, d)?;
                let ne = self.exp_op(args, func);
                if let Some(order_by) = order_by {
                    let order_by = self.copy_list_at(&order_by, d)?;
                    if let ExprKind::Func { order_by: slot, .. } = &mut self.expr_mut(ne).kind {
                        *slot = Some(order_by);
                    }
                }
                ne
            }
            ExprKind::Aggr { func, args } => {
                let args = self.copy_list_at(&args, d)?;
                self.exp_aggr(args, func, flags.distinct, flags.no_nil, card, !flags.has_no_nil)
            }
            ExprKind::Atom(Atom::Value(v)) => {
                let mut ne = Expr::new(ExprKind::Atom(Atom::Value(v)), card, ty);
                ne.flags.has_no_nil = flags.has_no_nil;
                self.add_expr(ne)
            }
            ExprKind::Atom(Atom::Ref(nr)) => self.exp_atom_ref(nr, ty),
            ExprKind::Atom(Atom::Param { name, frame }) => self.exp_param(&name, ty, frame),
            ExprKind::Atom(Atom::Values(values)) => {
                let values = self.copy_list_at(&values, d)?;
                self.exp_values(values)
            }
            ExprKind::Psm(Psm::Set { name, value, level }) => {
                let value = self.copy_at(value, d)?;
                self.exp_set(&name, value, level)
            }
            kind @ ExprKind::Psm(_) => self.add_expr(Expr::new(kind, card, ty)),
        };
        if aliased {
            self.exp_prop_alias(ne, e);
        }
        let ne = self.exp_propagate(ne, e);
        if flags.freevar {
            self.expr_mut(ne).flags.freevar = true;
        }
        Ok(ne)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::catalog::Catalog;
    use crate::config::Config;
    use crate::expr::CmpOp;
    use crate::types::SqlType;

    use super::*;

    #[test]
    fn copy_is_a_fresh_matching_tree() {
        let mut ctx = Context::new(Arc::new(Catalog::with_builtins()), Config::default());
        let ty = SqlType::local(crate::types::TypeId::Int);
        let c = ctx.exp_column(Some("t"), "a", Some(ty), crate::expr::Card::Multi, true, false);
        let one = ctx.exp_atom_int(1);
        let cmp = ctx.exp_compare(c, one, CmpOp::Lt).unwrap();
        ctx.expr_mut(c).flags.freevar = true;

        let copy = ctx.exp_copy(cmp).unwrap();
        assert_ne!(copy, cmp);
        assert!(ctx.exp_match_exp(copy, cmp).unwrap());
        let ExprKind::Cmp(Cmp::Simple { l, .. }) = &ctx.expr(copy).kind else {
            panic!("expected a comparison");
        };
        assert_ne!(*l, c);
        assert!(ctx.expr(*l).flags.freevar);
    }
}
