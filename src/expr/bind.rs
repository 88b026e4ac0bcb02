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

//! Name lookup in expression lists.
//!
//! Lists longer than [`Config::hash_index_threshold`](crate::Config) get a
//! name index on first lookup. The index is built while holding the list's
//! lock and is tagged with the context's rename epoch, so an alias change
//! anywhere makes the next lookup rebuild it. Lookups against a current
//! index only clone an `Arc` under the lock.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::context::Context;
use crate::error::{Error, Result};

use super::{ExpList, ExprId, ExprKind, NameIndex};

impl Context {
    fn name_index(&self, list: &ExpList) -> Option<Arc<NameIndex>> {
        if list.len() <= self.config().hash_index_threshold {
            return None;
        }
        let epoch = self.epoch();
        let mut slot = list.index_slot().lock();
        if let Some(index) = slot.as_ref().filter(|ix| ix.epoch == epoch) {
            return Some(Arc::clone(index));
        }
        let mut map: HashMap<String, Vec<ExprId>> = HashMap::with_capacity(list.len());
        for e in list {
            if let Some(name) = &self.expr(e).alias.name {
                map.entry(name.clone()).or_default().push(e);
            }
        }
        trace!(entries = list.len(), names = map.len(), "built name index");
        let index = Arc::new(NameIndex { epoch, map });
        *slot = Some(Arc::clone(&index));
        Some(index)
    }

    /// Entries of `list` whose alias name is `name`, in list order.
    fn named(&self, list: &ExpList, name: &str) -> Vec<ExprId> {
        match self.name_index(list) {
            Some(index) => index.map.get(name).cloned().unwrap_or_default(),
            None => list
                .iter()
                .filter(|&e| self.expr(e).alias.name.as_deref() == Some(name))
                .collect(),
        }
    }

    /// The entry of `list` named `name`.
    ///
    /// Returns `Ok(None)` when nothing matches and `Err(Ambiguous)` when two
    /// entries carry the name under different relation aliases. Otherwise
    /// the first match wins.
    ///
    /// Short lists scanned linearly follow the same rule as indexed ones: a
    /// repeated name under one relation alias, or with either alias missing,
    /// is not ambiguous. `SELECT a, a FROM t` binds `a` to its first entry.
    pub fn exps_bind_column(&self, list: &ExpList, name: &str) -> Result<Option<ExprId>> {
        let mut found: Option<ExprId> = None;
        for ce in self.named(list, name) {
            let Some(e) = found else {
                found = Some(ce);
                continue;
            };
            if e == ce {
                continue;
            }
            let (a, b) = (&self.expr(e).alias.rname, &self.expr(ce).alias.rname);
            if a.is_some() && b.is_some() && a != b {
                return Err(self.error(Error::Ambiguous(name.to_string())));
            }
        }
        Ok(found)
    }

    /// The entry of `list` exposed as `rname.name`, or a column reference
    /// without relation alias that reads `rname.name`.
    pub fn exps_bind_column2(&self, list: &ExpList, rname: &str, name: &str) -> Option<ExprId> {
        self.named(list, name).into_iter().find(|&e| {
            let x = self.expr(e);
            match (&x.alias.rname, &x.kind) {
                (Some(own), _) => !x.is_cmp() && own == rname,
                (None, ExprKind::Column { rname: Some(col), .. }) => col == rname,
                (None, _) => false,
            }
        })
    }

    /// The column reference of `list` that reads `rname.name`, matching the
    /// original column rather than the alias it was given.
    pub fn exps_bind_alias(&self, list: &ExpList, rname: Option<&str>, name: &str) -> Option<ExprId> {
        list.iter().find(|&e| match &self.expr(e).kind {
            ExprKind::Column { rname: col, name: cname } => {
                cname == name && (rname.is_none() || col.as_deref() == rname)
            }
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::catalog::Catalog;
    use crate::config::Config;
    use crate::expr::Card;
    use crate::types::{SqlType, TypeId};

    use super::*;

    fn list_of(ctx: &mut Context, cols: &[(&str, &str)]) -> ExpList {
        let ty = SqlType::local(TypeId::Int);
        cols.iter()
            .map(|&(r, n)| ctx.exp_column(Some(r), n, Some(ty.clone()), Card::Multi, true, false))
            .collect()
    }

    #[test]
    fn index_follows_renames() {
        let mut ctx = Context::new(Arc::new(Catalog::new()), Config::default());
        let list = list_of(&mut ctx, &[("t", "a"), ("t", "b"), ("t", "c"), ("t", "d"), ("t", "e")]);
        assert_eq!(ctx.exps_bind_column(&list, "c").unwrap(), list.get(2));
        assert!(list.has_index());

        let e = list.get(4).unwrap();
        ctx.exp_setname(e, Some("t"), Some("z"));
        assert_eq!(ctx.exps_bind_column(&list, "z").unwrap(), Some(e));
        assert_eq!(ctx.exps_bind_column(&list, "e").unwrap(), None);
    }

    #[test]
    fn duplicate_names_are_ambiguous_only_across_relations() {
        let mut ctx = Context::new(Arc::new(Catalog::new()), Config::default());
        let same = list_of(&mut ctx, &[("t", "a"), ("t", "a")]);
        assert!(!same.has_index());
        assert_eq!(ctx.exps_bind_column(&same, "a").unwrap(), same.get(0));

        let across = list_of(&mut ctx, &[("t", "a"), ("u", "a")]);
        assert_eq!(ctx.exps_bind_column(&across, "a"), Err(Error::Ambiguous("a".into())));

        let long = list_of(&mut ctx, &[("t", "a"), ("t", "b"), ("t", "c"), ("t", "d"), ("t", "a")]);
        assert_eq!(ctx.exps_bind_column(&long, "a").unwrap(), long.get(0));
        assert!(long.has_index());
    }

    #[test]
    fn bind2_falls_back_to_column_relation() {
        let mut ctx = Context::new(Arc::new(Catalog::new()), Config::default());
        let list = list_of(&mut ctx, &[("t", "a"), ("u", "a")]);
        let e = list.get(1).unwrap();
        ctx.exp_setalias(e, None, Some("a".into()));
        assert_eq!(ctx.exps_bind_column2(&list, "u", "a"), Some(e));
        assert_eq!(ctx.exps_bind_column2(&list, "t", "a"), list.get(0));
        assert_eq!(ctx.exps_bind_column2(&list, "v", "a"), None);
    }
}
