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

//! Integration tests for modification plans: index maintenance on insert and
//! update, default values, permission checks and DDL nodes.

use std::sync::Arc;

use relcore::catalog::{Access, Catalog, IndexKind, Table, TableBuilder, TableKind};
use relcore::expr::Atom;
use relcore::rel::{table_column_names_and_defaults, table_column_types};
use relcore::{
    Card, Config, Context, DdlOp, Error, ExpList, ExprId, ExprKind, ModifyOp, RelId, RelKind, SetOp, SqlType, TypeId,
    Value,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn int() -> SqlType {
    SqlType::local(TypeId::Int)
}

/// `t(a int, b int default 42, c int)` with index `t_ab` of the given kind.
fn table(cat: &mut Catalog, kind: IndexKind) -> Arc<Table> {
    TableBuilder::new("sys", "t")
        .column("a", int())
        .column("b", int())
        .default("42")
        .column("c", int())
        .index("t_ab", kind, &["a", "b"])
        .build(cat)
        .unwrap()
}

fn setup(kind: IndexKind) -> (Context, Arc<Table>) {
    let mut cat = Catalog::with_builtins();
    let t = table(&mut cat, kind);
    (Context::new(Arc::new(cat), Config::default()), t)
}

fn row(ctx: &mut Context, vals: &[i32]) -> RelId {
    let exps: ExpList = vals.iter().map(|&v| ctx.exp_atom_int(v)).collect();
    ctx.rel_project(None, exps)
}

fn func_name(ctx: &Context, e: ExprId) -> Option<String> {
    match &ctx.expr(e).kind {
        ExprKind::Func { func, .. } => Some(func.name.clone()),
        _ => None,
    }
}

fn atom(ctx: &Context, e: ExprId) -> Option<Value> {
    match &ctx.expr(e).kind {
        ExprKind::Atom(Atom::Value(v)) => Some(v.clone()),
        _ => None,
    }
}

fn last_exp(ctx: &Context, rel: RelId) -> ExprId {
    *ctx.rel(rel).exps_or_empty().last().unwrap()
}

// ---------------------------------------------------------------------------
// Insert
// ---------------------------------------------------------------------------

#[test]
fn insert_appends_hash_of_index_columns() {
    let (mut ctx, t) = setup(IndexKind::Hash);
    let target = ctx.rel_basetable(&t, "t");
    let rows = row(&mut ctx, &[1, 2, 3]);

    let ins = ctx.rel_insert(target, rows).unwrap();
    assert_eq!(
        ctx.rel(ins).kind,
        RelKind::Modify {
            op: ModifyOp::Insert,
            left: target,
            right: Some(rows),
            composite: false,
        }
    );
    assert_eq!(ctx.rel(rows).exps_or_empty().len(), 4);
    let h = last_exp(&ctx, rows);
    assert_eq!(ctx.exp_name(h), Some("%t_ab"));
    assert_eq!(ctx.exp_relname(h), Some("t"));
    assert_eq!(func_name(&ctx, h).as_deref(), Some("rotate_xor_hash"));
}

#[test]
fn ordered_hash_covers_the_leading_column() {
    let (mut ctx, t) = setup(IndexKind::OrderedHash);
    let target = ctx.rel_basetable(&t, "t");
    let rows = row(&mut ctx, &[1, 2, 3]);
    ctx.rel_insert(target, rows).unwrap();
    let h = last_exp(&ctx, rows);
    assert_eq!(func_name(&ctx, h).as_deref(), Some("hash"));
}

#[test]
fn insert_from_set_operation_is_composite() {
    let (mut ctx, t) = setup(IndexKind::Hash);
    let target = ctx.rel_basetable(&t, "t");
    let l = row(&mut ctx, &[1, 2, 3]);
    let r = row(&mut ctx, &[4, 5, 6]);
    let rows = ctx.rel_setop(l, r, SetOp::Union);

    let ins = ctx.rel_insert(target, rows).unwrap();
    let RelKind::Modify {
        op,
        left,
        right: Some(inner),
        composite,
    } = ctx.rel(ins).kind.clone()
    else {
        panic!("expected a modify node");
    };
    assert_eq!(op, ModifyOp::Insert);
    assert!(composite);
    assert_eq!(left, rows);
    assert!(ctx.rel_is_ref(rows));

    let RelKind::Modify { right: Some(p), .. } = ctx.rel(inner).kind else {
        panic!("expected the inner insert");
    };
    assert!(ctx.rel(p).kind.is_project());
    assert_eq!(ctx.rel(p).kind.left(), Some(rows));
    let h = last_exp(&ctx, p);
    assert_eq!(ctx.exp_name(h), Some("%t_ab"));
}

#[test]
fn insert_into_created_table_uses_its_name() {
    let (mut ctx, t) = setup(IndexKind::Hash);
    let ddl = ctx.rel_ddl(DdlOp::CreateTable, None, None, None, Some(Arc::clone(&t)));
    let rows = row(&mut ctx, &[1, 2, 3]);
    ctx.rel_insert(ddl, rows).unwrap();
    let h = last_exp(&ctx, rows);
    assert_eq!(ctx.exp_relname(h), Some("t"));
}

// ---------------------------------------------------------------------------
// Insert values and defaults
// ---------------------------------------------------------------------------

#[test]
fn missing_columns_take_default_or_null() {
    let (mut ctx, t) = setup(IndexKind::Hash);
    let rows = row(&mut ctx, &[7]);
    let seven = ctx.rel(rows).exps_or_empty()[0];

    let vals = ctx.rel_inserts(&t, rows, Some(&["a"]), 1, false, "INSERT INTO").unwrap();
    assert_eq!(vals.len(), 3);
    assert_eq!(vals.get(0), Some(seven));
    assert_eq!(atom(&ctx, vals.get(1).unwrap()), Some(Value::Int(42)));
    assert!(ctx.exp_is_null(vals.get(2).unwrap()).unwrap());
}

#[test]
fn values_are_converted_to_column_types() {
    let (mut ctx, t) = setup(IndexKind::Hash);
    let big = ctx.exp_atom_lng(5);
    let rows = ctx.rel_project(None, ExpList::from(vec![big]));
    let vals = ctx.rel_inserts(&t, rows, Some(&["c"]), 1, false, "INSERT INTO").unwrap();
    let c = vals.get(2).unwrap();
    assert!(matches!(ctx.expr(c).kind, ExprKind::Convert { .. }));
    assert_eq!(ctx.exp_subtype(c), Some(int()));
}

#[test]
fn multi_row_default_is_a_values_list() {
    let (mut ctx, t) = setup(IndexKind::Hash);
    let rows = row(&mut ctx, &[1]);
    let vals = ctx.rel_inserts(&t, rows, Some(&["a"]), 3, false, "INSERT INTO").unwrap();
    let b = vals.get(1).unwrap();
    let ExprKind::Atom(Atom::Values(list)) = &ctx.expr(b).kind else {
        panic!("expected a values list");
    };
    assert_eq!(list.len(), 3);
    assert_eq!(ctx.expr(b).card, Card::Multi);
    assert_eq!(ctx.exp_subtype(b), Some(int()));
    assert!(ctx.expr(b).has_label());
}

#[test]
fn unknown_insert_column_is_not_found() {
    let (mut ctx, t) = setup(IndexKind::Hash);
    let rows = row(&mut ctx, &[1]);
    let err = ctx.rel_inserts(&t, rows, Some(&["zz"]), 1, false, "INSERT INTO").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(err.to_string().contains("t.zz"));
}

#[test]
fn unevaluable_default_is_rejected() {
    let mut cat = Catalog::with_builtins();
    let t = TableBuilder::new("sys", "d")
        .column("a", int())
        .column("b", int())
        .default("a + 1")
        .build(&mut cat)
        .unwrap();
    let mut ctx = Context::new(Arc::new(cat), Config::default());
    let rows = row(&mut ctx, &[1]);
    let err = ctx.rel_inserts(&t, rows, Some(&["a"]), 1, false, "INSERT INTO").unwrap_err();
    assert_eq!(
        err,
        Error::InvalidArgument("INSERT INTO: default expression could not be evaluated".into())
    );
}

// ---------------------------------------------------------------------------
// Update, delete and truncate
// ---------------------------------------------------------------------------

fn update_of(ctx: &mut Context, t: &Arc<Table>, assigned: &str, colnr: usize) -> (RelId, RelId) {
    let target = ctx.rel_basetable(t, "t");
    let uprel = ctx.rel_project(Some(target), ExpList::new());
    let mut updates = vec![None; t.columns.len()];
    updates[colnr] = Some(ctx.exp_atom_int(5));
    let assignment = ctx.exp_column(Some("t"), assigned, Some(int()), Card::Multi, true, false);
    let upd = ctx
        .rel_update(target, uprel, &updates, Some(ExpList::from(vec![assignment])))
        .unwrap();
    (upd, uprel)
}

#[test]
fn update_of_unindexed_column_keeps_index() {
    let (mut ctx, t) = setup(IndexKind::Hash);
    let (upd, uprel) = update_of(&mut ctx, &t, "c", 2);
    assert_eq!(ctx.rel(uprel).exps_or_empty().len(), 3);
    assert_eq!(ctx.rel(upd).exps_or_empty().len(), 1);
}

#[test]
fn update_of_indexed_column_recomputes_hash() {
    let (mut ctx, t) = setup(IndexKind::Hash);
    let (upd, uprel) = update_of(&mut ctx, &t, "a", 0);
    assert_eq!(ctx.rel(uprel).exps_or_empty().len(), 4);
    let h = last_exp(&ctx, uprel);
    assert_eq!(ctx.exp_name(h), Some("%t_ab"));

    let exps = ctx.rel(upd).exps_or_empty();
    assert_eq!(exps.len(), 2);
    assert_eq!(ctx.exp_name(exps[1]), Some("%t_ab"));
    assert_eq!(ctx.exp_subtype(exps[1]), Some(SqlType::local(TypeId::Lng)));
}

#[test]
fn delete_and_truncate_nodes() {
    let (mut ctx, t) = setup(IndexKind::Hash);
    let target = ctx.rel_basetable(&t, "t");
    let del = ctx.rel_delete(target, None);
    assert!(matches!(
        ctx.rel(del).kind,
        RelKind::Modify {
            op: ModifyOp::Delete,
            right: None,
            ..
        }
    ));

    ctx.rel_dup(target);
    let tr = ctx.rel_truncate(target, true, 0);
    let exps = ctx.rel(tr).exps_or_empty().to_vec();
    assert_eq!(atom(&ctx, exps[0]), Some(Value::Int(1)));
    assert_eq!(atom(&ctx, exps[1]), Some(Value::Int(0)));
    assert_eq!(ctx.rel(tr).card, Card::Atom);
}

// ---------------------------------------------------------------------------
// Permission checks
// ---------------------------------------------------------------------------

fn denied(result: relcore::Result<Arc<Table>>) -> String {
    match result.unwrap_err() {
        Error::NotAllowed(msg) => msg,
        other => panic!("expected a denial, got {other:?}"),
    }
}

#[test]
fn views_and_read_only_tables_refuse_writes() {
    let mut cat = Catalog::with_builtins();
    let v = TableBuilder::new("sys", "v")
        .column("a", int())
        .kind(TableKind::View)
        .build(&mut cat)
        .unwrap();
    let ro = TableBuilder::new("sys", "ro")
        .column("a", int())
        .access(Access::ReadOnly)
        .build(&mut cat)
        .unwrap();
    let ap = TableBuilder::new("sys", "ap")
        .column("a", int())
        .access(Access::AppendOnly)
        .build(&mut cat)
        .unwrap();
    let ctx = Context::new(Arc::new(cat), Config::default());

    assert_eq!(
        denied(ctx.insert_allowed(Some(&v), "v", "INSERT INTO", "insert into")),
        "INSERT INTO: cannot insert into view 'v'"
    );
    assert_eq!(
        denied(ctx.insert_allowed(Some(&ro), "ro", "INSERT INTO", "insert into")),
        "INSERT INTO: cannot insert into read only table 'ro'"
    );
    assert!(ctx.insert_allowed(Some(&ap), "ap", "INSERT INTO", "insert into").is_ok());
    assert_eq!(
        denied(ctx.update_allowed(Some(&ap), "ap", "UPDATE", "update", ModifyOp::Update)),
        "UPDATE: cannot update read or append only table 'ap'"
    );
}

#[test]
fn merge_tables_need_members_to_delete() {
    let mut cat = Catalog::with_builtins();
    let m = TableBuilder::new("sys", "m")
        .column("a", int())
        .kind(TableKind::Merge)
        .build(&mut cat)
        .unwrap();
    let ctx = Context::new(Arc::new(cat), Config::default());
    assert_eq!(
        denied(ctx.update_allowed(Some(&m), "m", "DELETE FROM", "delete from", ModifyOp::Delete)),
        "DELETE FROM: cannot delete from merge table 'm' has no partitions set"
    );
    assert_eq!(
        denied(ctx.update_allowed(Some(&m), "m", "UPDATE", "update", ModifyOp::Update)),
        "UPDATE: cannot update merge table 'm'"
    );
}

#[test]
fn read_only_mode_spares_temporary_tables() {
    let mut cat = Catalog::with_builtins();
    let t = TableBuilder::new("sys", "t").column("a", int()).build(&mut cat).unwrap();
    let tmp = TableBuilder::new("tmp", "scratch")
        .column("a", int())
        .temp()
        .build(&mut cat)
        .unwrap();
    let cfg = Config {
        read_only: true,
        ..Config::default()
    };
    let ctx = Context::new(Arc::new(cat), cfg);
    assert_eq!(
        denied(ctx.update_allowed(Some(&t), "t", "UPDATE", "update", ModifyOp::Update)),
        "UPDATE: update table 't' not allowed in readonly mode"
    );
    assert!(ctx
        .update_allowed(Some(&tmp), "scratch", "UPDATE", "update", ModifyOp::Update)
        .is_ok());
    assert_eq!(ctx.take_diagnostics().len(), 1);
}

#[test]
fn missing_table_is_not_found() {
    let ctx = Context::new(Arc::new(Catalog::with_builtins()), Config::default());
    let err = ctx.insert_allowed(None, "nope", "INSERT INTO", "insert into").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.sqlstate(), "42S02");
}

// ---------------------------------------------------------------------------
// DDL and table metadata
// ---------------------------------------------------------------------------

#[test]
fn ddl_nodes_carry_defined_tables_only() {
    let (mut ctx, t) = setup(IndexKind::Hash);
    let create = ctx.rel_ddl(DdlOp::CreateTable, None, None, None, Some(Arc::clone(&t)));
    assert_eq!(ctx.rel_ddl_table_get(create).map(|x| x.id), Some(t.id));
    let out = ctx.rel_ddl(DdlOp::Output, None, None, None, Some(Arc::clone(&t)));
    assert!(ctx.rel_ddl_table_get(out).is_none());
}

#[test]
fn column_metadata_in_column_order() {
    let (_, t) = setup(IndexKind::Hash);
    assert_eq!(table_column_types(&t), vec![int(), int(), int()]);
    let defaults = table_column_names_and_defaults(&t);
    assert_eq!(
        defaults,
        vec![
            ("a".to_string(), None),
            ("b".to_string(), Some("42".to_string())),
            ("c".to_string(), None),
        ]
    );
}
