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

//! Plans for data-modifying statements.
//!
//! Inserts and updates also maintain the hidden index columns of their
//! target: every multi-column hash index gets a hash expression over the new
//! values, named `<alias>.%<index>` so the executor can find it next to the
//! column values.

use std::sync::Arc;

use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::analytic::window::literal;
use crate::catalog::{Access, ColumnDef, Func, Index, IndexKind, Table, TableKind};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::expr::{Card, ExpList, ExprId};
use crate::types::{SqlType, TypeId, Value};

use super::{DdlOp, ModifyOp, Rel, RelId, RelKind};

/// Types of the visible columns of `table`, in column order.
pub fn table_column_types(table: &Table) -> Vec<SqlType> {
    table
        .columns
        .iter()
        .filter(|c| !c.name.starts_with('%'))
        .map(|c| c.ty.clone())
        .collect()
}

/// Name and default text of every column of `table`.
pub fn table_column_names_and_defaults(table: &Table) -> Vec<(String, Option<String>)> {
    table
        .columns
        .iter()
        .map(|c| (c.name.clone(), c.default.clone()))
        .collect()
}

impl Context {
    pub(crate) fn bind_builtin(&self, name: &str) -> Result<Arc<Func>> {
        self.catalog().bind_func(name).map_err(|e| self.error(e))
    }

    fn new_modify(&mut self, op: ModifyOp, t: RelId, right: Option<RelId>, composite: bool) -> RelId {
        let kind = RelKind::Modify {
            op,
            left: t,
            right,
            composite,
        };
        self.alloc_rel(Rel::new(kind, Card::Atom))
    }

    /// DDL statement node.
    pub fn rel_ddl(
        &mut self,
        op: DdlOp,
        l: Option<RelId>,
        r: Option<RelId>,
        exps: Option<ExpList>,
        table: Option<Arc<Table>>,
    ) -> RelId {
        let kind = RelKind::Ddl {
            op,
            left: l,
            right: r,
            table,
        };
        let mut rel = Rel::new(kind, Card::Atom);
        rel.exps = exps;
        self.alloc_rel(rel)
    }

    /// Table defined by a create or alter statement.
    pub fn rel_ddl_table_get(&self, rel: RelId) -> Option<Arc<Table>> {
        match &self.rel(rel).kind {
            RelKind::Ddl {
                op,
                table: Some(table),
                ..
            } if op.defines_table() => Some(Arc::clone(table)),
            _ => None,
        }
    }

    fn modify_target(&self, t: RelId) -> Option<Arc<Table>> {
        match &self.rel(t).kind {
            RelKind::BaseTable(table) => Some(Arc::clone(table)),
            RelKind::Ddl { .. } => self.rel_ddl_table_get(t),
            _ => None,
        }
    }

    fn modify_rows(&self, r: RelId) -> Option<RelId> {
        match self.rel(r).kind {
            RelKind::Modify { right, .. } => right,
            _ => None,
        }
    }

    fn set_modify_rows(&mut self, r: RelId, rows: RelId) {
        self.rel_mut(r).kind.set_right(rows);
    }

    // -----------------------------------------------------------------------
    // Permission checks
    // -----------------------------------------------------------------------

    /// Check that rows may be inserted into `table` (looked up as `tname`).
    pub fn insert_allowed(
        &self,
        table: Option<&Arc<Table>>,
        tname: &str,
        op: &'static str,
        opname: &str,
    ) -> Result<Arc<Table>> {
        let Some(t) = table else {
            return Err(self.error(Error::not_found(op, "table", tname)));
        };
        let msg = match t.kind {
            TableKind::View => Some(format!("{op}: cannot {opname} view '{tname}'")),
            TableKind::Merge => Some(format!("{op}: cannot {opname} merge table '{tname}'")),
            _ => self.common_denial(t, tname, op, opname),
        };
        let msg = msg.or_else(|| {
            (t.access == Access::ReadOnly).then(|| format!("{op}: cannot {opname} read only table '{tname}'"))
        });
        self.finish_check(t, msg, tname, op, opname)
    }

    /// Check that rows of `table` may be updated, deleted or truncated, as
    /// given by `kind`.
    pub fn update_allowed(
        &self,
        table: Option<&Arc<Table>>,
        tname: &str,
        op: &'static str,
        opname: &str,
        kind: ModifyOp,
    ) -> Result<Arc<Table>> {
        let Some(t) = table else {
            return Err(self.error(Error::not_found(op, "table", tname)));
        };
        let msg = match t.kind {
            TableKind::View => Some(format!("{op}: cannot {opname} view '{tname}'")),
            TableKind::Merge if kind == ModifyOp::Update => {
                Some(format!("{op}: cannot {opname} merge table '{tname}'"))
            }
            TableKind::Merge if t.members == 0 => Some(format!(
                "{op}: cannot {opname} merge table '{tname}' has no partitions set"
            )),
            _ => self.common_denial(t, tname, op, opname),
        };
        let msg = msg.or_else(|| {
            matches!(t.access, Access::ReadOnly | Access::AppendOnly)
                .then(|| format!("{op}: cannot {opname} read or append only table '{tname}'"))
        });
        self.finish_check(t, msg, tname, op, opname)
    }

    fn common_denial(&self, t: &Table, tname: &str, op: &str, opname: &str) -> Option<String> {
        match t.kind {
            TableKind::RangePartition | TableKind::ListPartition if t.members == 0 => {
                let scheme = if t.kind == TableKind::ListPartition { "list" } else { "range" };
                Some(format!("{op}: {scheme} partitioned table '{tname}' has no partitions set"))
            }
            TableKind::Remote => Some(format!(
                "{op}: cannot {opname} remote table '{tname}' from this server at the moment"
            )),
            TableKind::Replica => Some(format!("{op}: cannot {opname} replica table '{tname}'")),
            TableKind::Stream => Some(format!("{op}: cannot {opname} stream '{tname}'")),
            _ => None,
        }
    }

    fn finish_check(
        &self,
        t: &Arc<Table>,
        msg: Option<String>,
        tname: &str,
        op: &str,
        opname: &str,
    ) -> Result<Arc<Table>> {
        let msg = msg.or_else(|| {
            (!t.temp && self.config().read_only)
                .then(|| format!("{op}: {opname} table '{tname}' not allowed in readonly mode"))
        });
        match msg {
            Some(msg) => Err(self.error(Error::NotAllowed(msg))),
            None => Ok(Arc::clone(t)),
        }
    }

    // -----------------------------------------------------------------------
    // Index maintenance
    // -----------------------------------------------------------------------

    /// Hash expression of index `i` over the values in `vals`, where the
    /// value of column `n` sits at position `n + offset`.
    fn index_hash(&mut self, i: &Index, vals: &ExpList, offset: usize) -> Result<ExprId> {
        if i.columns.len() <= 1 || i.kind == IndexKind::NoIdx {
            let zero = self.exp_atom_lng(0);
            let nr = self.next_label();
            return Ok(self.exp_label(zero, nr));
        }
        let value = |ctx: &Self, colnr: usize| {
            vals.get(colnr + offset)
                .ok_or_else(|| ctx.error(Error::not_found("INDEX", "column", &i.name)))
        };
        let hash = self.bind_builtin("hash")?;
        let first = value(self, i.columns[0])?;
        let mut h = self.exp_unop(first, hash);
        if i.kind == IndexKind::OrderedHash {
            return Ok(h);
        }
        let bits = 1 + 63 / (i.columns.len() as i32 + 1);
        let xor = self.bind_builtin("rotate_xor_hash")?;
        for &colnr in &i.columns[1..] {
            let e = value(self, colnr)?;
            let b = self.exp_atom_int(bits);
            h = self.exp_op(ExpList::from(vec![h, b, e]), Arc::clone(&xor));
        }
        Ok(h)
    }

    /// Value for the join index column: the row id of the referenced row.
    // TODO: join against the referenced key once `Index` records the
    // referenced table; until then the column is NULL.
    fn join_index_placeholder(&mut self) -> ExprId {
        self.exp_null(SqlType::local(TypeId::Oid))
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    /// Insert the rows of `inserts` into `t`. When `t` is a known table the
    /// row source is labelled and extended with its index columns; if that
    /// required a new row source the result is a composite insert over the
    /// original one.
    pub fn rel_insert(&mut self, t: RelId, inserts: RelId) -> Result<RelId> {
        let r = self.new_modify(ModifyOp::Insert, t, Some(inserts), false);
        let Some(table) = self.modify_target(t) else {
            return Ok(r);
        };
        if table.indexes.is_empty() {
            return Ok(r);
        }
        let alias = self.rel_name(t).unwrap_or(&table.name).to_string();
        let labelled = self.rel_label(inserts, true)?;
        self.set_modify_rows(r, labelled);
        for i in &table.indexes {
            let Some(ins) = self.modify_rows(r) else { break };
            let ins = if self.rel(ins).kind.is_set() {
                let exps = self.rel_projections(ins, None, false, true)?;
                let p = self.rel_project(Some(ins), exps);
                self.set_modify_rows(r, p);
                p
            } else {
                ins
            };
            let iname = format!("%{}", i.name);
            let h = match i.kind {
                IndexKind::Join => self.join_index_placeholder(),
                _ => {
                    let vals = self.rel(ins).exps.clone().unwrap_or_default();
                    self.index_hash(i, &vals, 0)?
                }
            };
            self.rel_push_exp(ins, h);
            self.exp_setname(h, Some(&alias), Some(&iname));
        }
        if self.modify_rows(r) != Some(inserts) {
            debug!(table = %table.name, "composite insert");
            self.rel_dup(inserts);
            return Ok(self.new_modify(ModifyOp::Insert, inserts, Some(r), true));
        }
        Ok(r)
    }

    /// Values to insert into `table`, one per column in column order.
    ///
    /// `r` supplies the values for `columns` (all columns when `None`), by
    /// position or, for a copy, by name. Missing columns take their default,
    /// or NULL; with several rows the default becomes a values list.
    pub fn rel_inserts(
        &mut self,
        table: &Table,
        r: RelId,
        columns: Option<&[&str]>,
        rowcount: usize,
        copy: bool,
        action: &'static str,
    ) -> Result<ExpList> {
        let collist: Vec<&ColumnDef> = match columns {
            Some(names) => names
                .iter()
                .map(|&n| {
                    table.column(n).ok_or_else(|| {
                        self.error(Error::not_found(action, "column", &format!("{}.{n}", table.name)))
                    })
                })
                .collect::<Result<_>>()?,
            None => table.columns.iter().collect(),
        };
        let mut inserts: Vec<Option<ExprId>> = vec![None; table.columns.len()];
        if let Some(exps) = self.rel(r).exps.clone() {
            if copy {
                for c in &collist {
                    if let Some(e) = self.exps_bind_column2(&exps, &table.name, &c.name) {
                        inserts[c.colnr] = Some(self.exp_ref(e));
                    }
                }
            } else {
                for (e, c) in exps.iter().zip(collist.iter()) {
                    inserts[c.colnr] = Some(self.check_type(&c.ty, e));
                }
            }
        }
        let mut out = ExpList::new();
        for (colnr, slot) in inserts.into_iter().enumerate() {
            let e = match slot {
                Some(e) => e,
                None => {
                    let c = table
                        .column_by_nr(colnr)
                        .ok_or_else(|| self.error(Error::not_found(action, "column", &colnr.to_string())))?;
                    self.column_default_rows(c, rowcount, action)?
                }
            };
            out.push(e);
        }
        Ok(out)
    }

    fn column_default_rows(&mut self, c: &ColumnDef, rowcount: usize, action: &'static str) -> Result<ExprId> {
        if rowcount <= 1 {
            return self.column_default(c, action);
        }
        let mut vals = ExpList::new();
        for _ in 0..rowcount {
            vals.push(self.column_default(c, action)?);
        }
        let v = self.exp_values(vals);
        self.expr_mut(v).ty = Some(c.ty.clone());
        let nr = self.next_label();
        Ok(self.exp_label(v, nr))
    }

    /// Default of `c` as an atom; columns without a default get NULL.
    fn column_default(&mut self, c: &ColumnDef, action: &'static str) -> Result<ExprId> {
        let Some(text) = &c.default else {
            return Ok(self.exp_null(c.ty.clone()));
        };
        let value = Parser::new(&GenericDialect {})
            .try_with_sql(text)
            .and_then(|mut p| p.parse_expr())
            .map_err(Error::from)
            .and_then(|expr| literal(&expr))
            .and_then(|v| match v {
                Some(v) => v.cast(c.ty.local),
                None => Ok(Value::nil(c.ty.local)),
            })
            .map_err(|_| {
                self.error(Error::InvalidArgument(format!(
                    "{action}: default expression could not be evaluated"
                )))
            })?;
        Ok(self.exp_atom(value, c.ty.clone()))
    }

    /// `e` as a value of type `ty`. Untyped parameters take the type.
    fn check_type(&mut self, ty: &SqlType, e: ExprId) -> ExprId {
        match self.exp_subtype(e) {
            None => {
                self.expr_mut(e).ty = Some(ty.clone());
                e
            }
            Some(t) if t == *ty => e,
            Some(t) => self.exp_convert(e, t, ty.clone()),
        }
    }

    /// Update `t` from the projection `uprel`. `updates` holds the new value
    /// per column number and `exps` the assignment list. Tables with
    /// indexes get every column passed through, plus the hashes of each
    /// index with an assigned column.
    pub fn rel_update(
        &mut self,
        t: RelId,
        uprel: RelId,
        updates: &[Option<ExprId>],
        exps: Option<ExpList>,
    ) -> Result<RelId> {
        let table = self.modify_target(t);
        let alias = self.rel_name(t).map(str::to_string);
        if let Some(table) = &table {
            if !updates.is_empty() {
                for c in &table.columns {
                    let mut v = updates.get(c.colnr).copied().flatten();
                    if v.is_none() && !table.indexes.is_empty() {
                        let ty = Some(c.ty.clone());
                        v = Some(self.exp_column(alias.as_deref(), &c.name, ty, Card::Multi, c.nullable, false));
                    }
                    if let Some(v) = v {
                        self.rel_project_add_exp(uprel, v)?;
                    }
                }
            }
        }
        let r = self.new_modify(ModifyOp::Update, t, Some(uprel), false);
        self.rel_mut(r).exps = exps;
        let Some(table) = table else { return Ok(r) };
        let alias = alias.unwrap_or_else(|| table.name.clone());

        for i in &table.indexes {
            let assigned = self.rel(r).exps.clone();
            if let Some(assigned) = &assigned {
                if !self.index_updated(&table, i, assigned) {
                    continue;
                }
            }
            let iname = format!("%{}", i.name);
            let (h, ty) = match i.kind {
                IndexKind::Join => (self.join_index_placeholder(), SqlType::local(TypeId::Oid)),
                _ => {
                    let vals = self.rel(uprel).exps.clone().unwrap_or_default();
                    (self.index_hash(i, &vals, 1)?, SqlType::local(TypeId::Lng))
                }
            };
            self.rel_push_exp(uprel, h);
            self.exp_setname(h, Some(&alias), Some(&iname));
            let col = self.exp_column(Some(&alias), &iname, Some(ty), Card::Multi, false, false);
            self.rel_push_exp(r, col);
            debug!(index = %i.name, "index recomputed by update");
        }
        Ok(r)
    }

    /// Whether an assignment in `exps` targets a column of index `i`.
    fn index_updated(&self, table: &Table, i: &Index, exps: &ExpList) -> bool {
        exps.iter().any(|e| {
            self.exp_name(e)
                .and_then(|n| table.column(n))
                .is_some_and(|c| i.columns.contains(&c.colnr))
        })
    }

    /// Delete the rows of `deletes` from `t`, or all rows without it.
    pub fn rel_delete(&mut self, t: RelId, deletes: Option<RelId>) -> RelId {
        self.new_modify(ModifyOp::Delete, t, deletes, false)
    }

    /// Remove all rows of `t`. Both options are carried as int atoms.
    pub fn rel_truncate(&mut self, t: RelId, restart_sequences: bool, drop_action: i32) -> RelId {
        let restart = self.exp_atom_int(i32::from(restart_sequences));
        let drop = self.exp_atom_int(drop_action);
        let r = self.new_modify(ModifyOp::Truncate, t, None, false);
        self.rel_mut(r).exps = Some(ExpList::from(vec![restart, drop]));
        r
    }
}
