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

//! Catalog objects a plan depends on.

use std::collections::HashSet;

use crate::catalog::{ObjectId, SYSTEM_OBJECT_LIMIT};
use crate::context::Context;
use crate::error::Result;
use crate::expr::{Atom, Cmp, ExprId, ExprKind, Psm};
use crate::types::Value;

use super::build::TID;
use super::{RelId, RelKind};

/// Ids collected so far, in first-seen order.
#[derive(Default)]
struct Deps {
    ids: Vec<ObjectId>,
    seen: HashSet<ObjectId>,
    visited: HashSet<RelId>,
}

impl Deps {
    fn add(&mut self, id: ObjectId) {
        if id >= SYSTEM_OBJECT_LIMIT && self.seen.insert(id) {
            self.ids.push(id);
        }
    }
}

impl Context {
    /// Tables, columns, indexes, functions and sequences referenced by
    /// `rel`, without duplicates and without system objects.
    pub fn rel_dependencies(&self, rel: RelId) -> Result<Vec<ObjectId>> {
        let mut deps = Deps::default();
        self.rel_deps_at(rel, &mut deps, 0)?;
        Ok(deps.ids)
    }

    fn rel_deps_at(&self, rel: RelId, deps: &mut Deps, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        let x = self.rel(rel);
        if self.rel_is_ref(rel) && !deps.visited.insert(rel) {
            return Ok(());
        }
        match &x.kind {
            RelKind::BaseTable(table) => {
                deps.add(table.id);
                for e in x.exps_or_empty() {
                    let Some(name) = self.expr(*e).alias.name.as_deref() else { continue };
                    if name == TID {
                        continue;
                    }
                    if let Some(iname) = name.strip_prefix('%') {
                        if let Some(i) = table.index(iname) {
                            deps.add(i.id);
                        }
                    } else if let Some(c) = table.column(name) {
                        deps.add(c.id);
                    }
                }
                return Ok(());
            }
            RelKind::Table { func: Some(f), .. } => self.exp_deps_at(*f, deps, depth + 1)?,
            RelKind::GroupBy {
                groups: Some(groups), ..
            } => {
                for g in groups {
                    self.exp_deps_at(g, deps, depth + 1)?;
                }
            }
            RelKind::Project {
                order_by: Some(order_by),
                ..
            } => {
                for o in order_by {
                    self.exp_deps_at(o, deps, depth + 1)?;
                }
            }
            RelKind::Ddl { table: Some(t), .. } => deps.add(t.id),
            _ => {}
        }
        for &e in x.exps_or_empty() {
            self.exp_deps_at(e, deps, depth + 1)?;
        }
        for child in [x.kind.left(), x.kind.right()].into_iter().flatten() {
            self.rel_deps_at(child, deps, depth + 1)?;
        }
        Ok(())
    }

    fn exp_deps_at(&self, e: ExprId, deps: &mut Deps, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        match &self.expr(e).kind {
            ExprKind::Atom(Atom::Values(values)) => {
                for v in values {
                    self.exp_deps_at(v, deps, depth + 1)?;
                }
            }
            ExprKind::Atom(_) | ExprKind::Column { .. } => {}
            ExprKind::Convert { expr, .. } => self.exp_deps_at(*expr, deps, depth + 1)?,
            ExprKind::Func { func, args, order_by } => {
                if func.name == "next_value_for" {
                    if let Some(id) = self.sequence_of(args.as_slice()) {
                        deps.add(id);
                    }
                }
                deps.add(func.id);
                for a in args.iter().chain(order_by.iter().flatten()) {
                    self.exp_deps_at(a, deps, depth + 1)?;
                }
            }
            ExprKind::Aggr { func, args } => {
                deps.add(func.id);
                for a in args {
                    self.exp_deps_at(a, deps, depth + 1)?;
                }
            }
            ExprKind::Cmp(cmp) => match cmp {
                Cmp::Simple { l, r, .. } => {
                    self.exp_deps_at(*l, deps, depth + 1)?;
                    self.exp_deps_at(*r, deps, depth + 1)?;
                }
                Cmp::Range { l, low, high, .. } => {
                    for o in [*l, *low, *high] {
                        self.exp_deps_at(o, deps, depth + 1)?;
                    }
                }
                Cmp::Or { l, r } => {
                    for o in l.iter().chain(r.iter()) {
                        self.exp_deps_at(o, deps, depth + 1)?;
                    }
                }
                Cmp::In { l, values, .. } => {
                    self.exp_deps_at(*l, deps, depth + 1)?;
                    for v in values {
                        self.exp_deps_at(v, deps, depth + 1)?;
                    }
                }
                Cmp::Filter { func, l, r } => {
                    deps.add(func.id);
                    for o in l.iter().chain(r.iter()) {
                        self.exp_deps_at(o, deps, depth + 1)?;
                    }
                }
            },
            ExprKind::Psm(psm) => match psm {
                Psm::Set { value, .. } | Psm::Return { value, .. } => self.exp_deps_at(*value, deps, depth + 1)?,
                Psm::While { cond, body } => {
                    self.exp_deps_at(*cond, deps, depth + 1)?;
                    for b in body {
                        self.exp_deps_at(b, deps, depth + 1)?;
                    }
                }
                Psm::If { cond, then, otherwise } => {
                    self.exp_deps_at(*cond, deps, depth + 1)?;
                    for b in then.iter().chain(otherwise.iter().flatten()) {
                        self.exp_deps_at(b, deps, depth + 1)?;
                    }
                }
                Psm::Rel(rel) => self.rel_deps_at(*rel, deps, depth + 1)?,
                Psm::Exception { cond, .. } => self.exp_deps_at(*cond, deps, depth + 1)?,
                Psm::Table { table, .. } => deps.add(table.id),
                Psm::Var { .. } => {}
            },
        }
        Ok(())
    }

    /// Sequence named by the `(schema, name)` string arguments of
    /// `next_value_for`.
    fn sequence_of(&self, args: &[ExprId]) -> Option<ObjectId> {
        let text = |e: ExprId| match &self.expr(e).kind {
            ExprKind::Atom(Atom::Value(Value::Str(Some(s)))) => Some(s.as_str()),
            _ => None,
        };
        let [schema, name] = args else { return None };
        let seq = self.catalog().sequence(text(*schema)?, text(*name)?)?;
        Some(seq.id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::catalog::{Catalog, IndexKind, TableBuilder};
    use crate::config::Config;
    use crate::expr::{Card, ExpList};
    use crate::types::{SqlType, TypeId};

    use super::*;

    #[test]
    fn base_table_reports_used_columns_and_indexes() {
        let mut cat = Catalog::with_builtins();
        let int = SqlType::local(TypeId::Int);
        let t = TableBuilder::new("sys", "t")
            .column("a", int.clone())
            .column("b", int.clone())
            .column("c", int)
            .index("t_ab", IndexKind::Hash, &["a", "b"])
            .build(&mut cat)
            .unwrap();
        let mut ctx = Context::new(Arc::new(cat), Config::default());
        let base = ctx.rel_basetable(&t, "t");
        let a = ctx.exp_column(Some("t"), "a", None, Card::Multi, true, false);
        let p = ctx.rel_project(Some(base), ExpList::from(vec![a]));

        let deps = ctx.rel_dependencies(p).unwrap();
        assert_eq!(deps[0], t.id);
        assert!(deps.contains(&t.columns[0].id));
        assert!(deps.contains(&t.indexes[0].id));
        assert!(deps.iter().all(|&id| id >= SYSTEM_OBJECT_LIMIT));
    }

    #[test]
    fn shared_subplan_counted_once() {
        let mut cat = Catalog::with_builtins();
        let t = TableBuilder::new("sys", "t")
            .column("a", SqlType::local(TypeId::Int))
            .build(&mut cat)
            .unwrap();
        let mut ctx = Context::new(Arc::new(cat), Config::default());
        let base = ctx.rel_basetable(&t, "t");
        ctx.rel_dup(base);
        let j = ctx.rel_crossproduct(base, base, crate::rel::JoinKind::Inner);
        let deps = ctx.rel_dependencies(j).unwrap();
        let mut sorted = deps.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), deps.len());
    }
}
