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

//! Typing of untyped parameters once the column they feed is known.
//!
//! The walk follows one output column down a plan: each column reference or
//! conversion exposed under the current `rname.name` moves the target to the
//! name it reads from, and untyped parameters met on the way take the type.

use crate::context::Context;
use crate::error::Result;
use crate::rel::{RelId, RelKind};
use crate::types::SqlType;

use super::{Atom, Cmp, ExprId, ExprKind, Psm};

/// Column currently followed.
struct Target {
    rname: String,
    name: String,
}

impl Context {
    /// Give `ty` to the untyped parameters feeding column `rname.name` of
    /// expression `e`.
    pub fn exp_set_type_recurse(&mut self, ty: &SqlType, e: ExprId, rname: &str, name: &str) -> Result<()> {
        let mut target = Target {
            rname: rname.to_string(),
            name: name.to_string(),
        };
        self.retype_exp_at(ty, e, &mut target, 0)
    }

    /// Give `ty` to the untyped parameters feeding column `rname.name` of
    /// plan `rel`.
    pub fn rel_set_type_recurse(&mut self, ty: &SqlType, rel: RelId, rname: &str, name: &str) -> Result<()> {
        let mut target = Target {
            rname: rname.to_string(),
            name: name.to_string(),
        };
        self.retype_rel_at(ty, rel, &mut target, 0)
    }

    fn retype_rel_at(&mut self, ty: &SqlType, rel: RelId, target: &mut Target, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        let x = self.rel(rel);
        let exps = x.exps.clone();
        let kind = x.kind.clone();
        for e in exps.iter().flatten() {
            self.retype_exp_at(ty, e, target, depth + 1)?;
        }
        let children = match &kind {
            RelKind::BaseTable(_) | RelKind::Table { .. } | RelKind::Ddl { .. } => [None, None],
            RelKind::Join { left, right, .. } | RelKind::SetOp { left, right, .. } => [Some(*left), Some(*right)],
            RelKind::GroupBy { .. }
            | RelKind::Project { .. }
            | RelKind::Select { .. }
            | RelKind::TopN { .. }
            | RelKind::Sample { .. } => [kind.left(), None],
            RelKind::Modify { right, .. } => [*right, None],
        };
        for child in children.into_iter().flatten() {
            self.retype_rel_at(ty, child, target, depth + 1)?;
        }
        Ok(())
    }

    fn follows(&self, e: ExprId, target: &Target) -> (bool, bool) {
        let on_rel = self.exp_relname(e) == Some(target.rname.as_str());
        (on_rel, on_rel && self.exp_name(e) == Some(target.name.as_str()))
    }

    fn retype_exp_at(&mut self, ty: &SqlType, e: ExprId, target: &mut Target, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        let kind = self.expr(e).kind.clone();
        match kind {
            ExprKind::Atom(atom) => self.retype_atom_at(ty, e, atom, target, depth),
            ExprKind::Column { rname, name } => {
                let (on_rel, on_name) = self.follows(e, target);
                if on_rel {
                    if let Some(rname) = rname {
                        target.rname = rname;
                    }
                    if on_name {
                        target.name = name;
                        let x = self.expr_mut(e);
                        if x.ty.is_none() {
                            x.ty = Some(ty.clone());
                        }
                    }
                }
                Ok(())
            }
            ExprKind::Convert { expr, .. } => {
                let (on_rel, on_name) = self.follows(e, target);
                if on_rel {
                    target.rname = self.exp_relname(e).unwrap_or_default().to_string();
                    if on_name {
                        target.name = self.exp_name(e).unwrap_or_default().to_string();
                    }
                }
                self.retype_exp_at(ty, expr, target, depth + 1)
            }
            ExprKind::Psm(psm) => match psm {
                Psm::Return { value, .. } => self.retype_exp_at(ty, value, target, depth + 1),
                Psm::While { cond, body } => {
                    self.retype_exp_at(ty, cond, target, depth + 1)?;
                    for b in &body {
                        self.retype_exp_at(ty, b, target, depth + 1)?;
                    }
                    Ok(())
                }
                Psm::If { cond, then, otherwise } => {
                    self.retype_exp_at(ty, cond, target, depth + 1)?;
                    for b in then.iter().chain(otherwise.iter().flatten()) {
                        self.retype_exp_at(ty, b, target, depth + 1)?;
                    }
                    Ok(())
                }
                Psm::Rel(rel) => self.retype_rel_at(ty, rel, target, depth + 1),
                Psm::Exception { cond, .. } => self.retype_exp_at(ty, cond, target, depth + 1),
                Psm::Set { .. } | Psm::Var { .. } | Psm::Table { .. } => Ok(()),
            },
            ExprKind::Func { args, order_by, .. } => {
                for a in args.iter().chain(order_by.iter().flatten()) {
                    self.retype_exp_at(ty, a, target, depth + 1)?;
                }
                Ok(())
            }
            ExprKind::Aggr { args, .. } => {
                for a in &args {
                    self.retype_exp_at(ty, a, target, depth + 1)?;
                }
                Ok(())
            }
            ExprKind::Cmp(cmp) => {
                let operands: Vec<ExprId> = match cmp {
                    Cmp::In { l, values, .. } => std::iter::once(l).chain(values.iter()).collect(),
                    Cmp::Or { l, r } | Cmp::Filter { l, r, .. } => l.iter().chain(r.iter()).collect(),
                    Cmp::Simple { l, r, .. } => vec![l, r],
                    Cmp::Range { l, low, high, .. } => vec![l, low, high],
                };
                for o in operands {
                    self.retype_exp_at(ty, o, target, depth + 1)?;
                }
                Ok(())
            }
        }
    }

    fn retype_atom_at(&mut self, ty: &SqlType, e: ExprId, atom: Atom, target: &mut Target, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        let untyped = match atom {
            Atom::Values(values) => {
                if self.follows(e, target).1 {
                    for v in &values {
                        if let ExprKind::Atom(inner) = self.expr(v).kind.clone() {
                            self.retype_atom_at(ty, v, inner, target, depth + 1)?;
                        }
                    }
                }
                true
            }
            Atom::Ref(_) | Atom::Param { .. } => true,
            Atom::Value(_) => false,
        };
        let x = self.expr_mut(e);
        if untyped && x.ty.is_none() {
            x.ty = Some(ty.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::catalog::Catalog;
    use crate::config::Config;
    use crate::expr::{Card, ExpList};
    use crate::types::TypeId;

    use super::*;

    #[test]
    fn parameter_under_renamed_column_takes_type() {
        let mut ctx = Context::new(Arc::new(Catalog::with_builtins()), Config::default());
        let p = ctx.exp_param("p1", None, 0);
        ctx.exp_setname(p, Some("v"), Some("x"));
        let inner = ctx.rel_project(None, ExpList::from(vec![p]));
        let col = ctx.exp_column(Some("v"), "x", None, Card::Multi, true, false);
        ctx.exp_setname(col, Some("w"), Some("y"));
        let outer = ctx.rel_project(Some(inner), ExpList::from(vec![col]));

        let int = SqlType::local(TypeId::Int);
        ctx.rel_set_type_recurse(&int, outer, "w", "y").unwrap();
        assert_eq!(ctx.expr(p).ty, Some(int.clone()));
        assert_eq!(ctx.expr(col).ty, Some(int));
    }
}
