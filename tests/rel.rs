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

//! Integration tests for relational plans: base table scans, reference
//! counting, predicate placement, disjunction merging, set operation typing,
//! grouping and column binding through joins.

use std::sync::Arc;

use relcore::catalog::{Catalog, IndexKind, Table, TableBuilder};
use relcore::expr::Cmp;
use relcore::{
    Card, Clause, CmpOp, Config, Context, Error, ExpList, ExprId, ExprKind, JoinKind, RelId, RelKind, SetOp, SqlType,
    TypeId,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn int() -> SqlType {
    SqlType::local(TypeId::Int)
}

/// `t(a int, b int)` with a two-column hash index and `u(b bigint, c int)`.
fn setup(config: Config) -> (Context, Arc<Table>, Arc<Table>) {
    let mut cat = Catalog::with_builtins();
    let t = TableBuilder::new("sys", "t")
        .column("a", int())
        .column("b", int())
        .index("t_ab", IndexKind::Hash, &["a", "b"])
        .build(&mut cat)
        .unwrap();
    let u = TableBuilder::new("sys", "u")
        .column("b", SqlType::local(TypeId::Lng))
        .column("c", int())
        .build(&mut cat)
        .unwrap();
    (Context::new(Arc::new(cat), config), t, u)
}

fn col(ctx: &mut Context, rname: &str, name: &str, ty: SqlType) -> ExprId {
    ctx.exp_column(Some(rname), name, Some(ty), Card::Multi, true, false)
}

fn eq_const(ctx: &mut Context, c: ExprId, v: i32) -> ExprId {
    let k = ctx.exp_atom_int(v);
    ctx.exp_compare(c, k, CmpOp::Eq).unwrap()
}

fn names(ctx: &Context, rel: RelId) -> Vec<String> {
    ctx.rel(rel)
        .exps_or_empty()
        .iter()
        .map(|&e| ctx.exp_name(e).unwrap_or_default().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Scans and reference counts
// ---------------------------------------------------------------------------

#[test]
fn base_table_exposes_columns_row_id_and_index() {
    let (mut ctx, t, _) = setup(Config::default());
    let base = ctx.rel_basetable(&t, "t");
    assert_eq!(names(&ctx, base), ["a", "b", "%TID%", "%t_ab"]);
    let x = ctx.rel(base);
    assert_eq!(x.nrcols, 2);
    assert_eq!(x.card, Card::Multi);
    assert!(x.kind.is_base());
    assert_eq!(ctx.rel_name(base), Some("t"));
}

#[test]
fn destroying_a_shared_node_drops_one_reference() {
    let (mut ctx, t, _) = setup(Config::default());
    let base = ctx.rel_basetable(&t, "t");
    ctx.rel_dup(base);
    assert!(ctx.rel_is_ref(base));

    ctx.rel_destroy(base);
    assert!(ctx.is_live(base));
    assert!(!ctx.rel_is_ref(base));

    ctx.rel_destroy(base);
    assert!(!ctx.is_live(base));
    assert!(ctx.try_rel(base).is_none());
    // stale handles are ignored
    ctx.rel_destroy(base);
}

#[test]
fn destroying_a_join_frees_both_inputs() {
    let (mut ctx, t, u) = setup(Config::default());
    let before = ctx.live_rels();
    let l = ctx.rel_basetable(&t, "t");
    let r = ctx.rel_basetable(&u, "u");
    let j = ctx.rel_crossproduct(l, r, JoinKind::Inner);
    assert_eq!(ctx.live_rels(), before + 3);
    ctx.rel_destroy(j);
    assert_eq!(ctx.live_rels(), before);
}

#[test]
fn deep_copy_builds_new_nodes() {
    let (mut ctx, t, _) = setup(Config::default());
    let base = ctx.rel_basetable(&t, "t");
    let a = col(&mut ctx, "t", "a", int());
    let p = ctx.rel_project(Some(base), ExpList::from(vec![a]));
    let c = ctx.rel_copy(p, true).unwrap();
    assert_ne!(c, p);
    let (orig_in, copy_in) = (ctx.rel(p).kind.left(), ctx.rel(c).kind.left());
    assert_ne!(orig_in, copy_in);
    assert_eq!(names(&ctx, c), ["a"]);
    assert_ne!(ctx.rel(c).exps_or_empty()[0], a);
}

#[test]
fn containment_follows_inputs() {
    let (mut ctx, t, u) = setup(Config::default());
    let l = ctx.rel_basetable(&t, "t");
    let r = ctx.rel_basetable(&u, "u");
    let j = ctx.rel_crossproduct(l, r, JoinKind::Left);
    assert!(ctx.rel_in_rel(Some(j), r));
    assert!(!ctx.rel_in_rel(Some(l), j));
    assert!(!ctx.rel_in_rel(None, l));
}

// ---------------------------------------------------------------------------
// Predicate placement
// ---------------------------------------------------------------------------

#[test]
fn filter_lands_on_its_join_input() {
    let (mut ctx, t, u) = setup(Config::default());
    let l = ctx.rel_basetable(&t, "t");
    let r = ctx.rel_basetable(&u, "u");
    let j = ctx.rel_crossproduct(l, r, JoinKind::Inner);
    let a = col(&mut ctx, "t", "a", int());
    let e = eq_const(&mut ctx, a, 1);

    let root = ctx.rel_push_select(j, a, e).unwrap();
    assert_eq!(root, j);
    let sel = ctx.rel(j).kind.left().unwrap();
    assert_eq!(ctx.rel(sel).kind, RelKind::Select { input: Some(l) });
    assert_eq!(ctx.rel(sel).exps_or_empty(), &[e]);
    assert_eq!(ctx.rel(j).kind.right(), Some(r));
}

#[test]
fn disabled_pushdown_filters_at_the_root() {
    let cfg = Config {
        pushdown: false,
        ..Config::default()
    };
    let (mut ctx, t, u) = setup(cfg);
    let l = ctx.rel_basetable(&t, "t");
    let r = ctx.rel_basetable(&u, "u");
    let j = ctx.rel_crossproduct(l, r, JoinKind::Inner);
    let a = col(&mut ctx, "t", "a", int());
    let e = eq_const(&mut ctx, a, 1);

    let root = ctx.rel_push_select(j, a, e).unwrap();
    assert_eq!(ctx.rel(root).kind, RelKind::Select { input: Some(j) });
    assert_eq!(ctx.rel(j).kind.left(), Some(l));
}

#[test]
fn join_predicate_goes_to_the_covering_join() {
    let (mut ctx, t, u) = setup(Config::default());
    let l = ctx.rel_basetable(&t, "t");
    let r = ctx.rel_basetable(&u, "u");
    let j = ctx.rel_crossproduct(l, r, JoinKind::Inner);
    let a = col(&mut ctx, "t", "a", int());
    let c = col(&mut ctx, "u", "c", int());
    let e = ctx.exp_compare(a, c, CmpOp::Eq).unwrap();

    let root = ctx.rel_push_join(j, a, c, None, e).unwrap();
    assert_eq!(root, j);
    assert_eq!(ctx.rel(j).exps_or_empty(), &[e]);
}

#[test]
fn join_predicate_on_unknown_column_is_an_error() {
    let (mut ctx, t, u) = setup(Config::default());
    let l = ctx.rel_basetable(&t, "t");
    let r = ctx.rel_basetable(&u, "u");
    let j = ctx.rel_crossproduct(l, r, JoinKind::Inner);
    let a = col(&mut ctx, "t", "a", int());
    let z = col(&mut ctx, "v", "z", int());
    let e = ctx.exp_compare(a, z, CmpOp::Eq).unwrap();
    let err = ctx.rel_push_join(j, a, z, None, e).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[test]
fn sibling_selects_merge_into_one_disjunction() {
    let (mut ctx, t, _) = setup(Config::default());
    let base = ctx.rel_basetable(&t, "t");
    ctx.rel_dup(base);
    ctx.rel_dup(base);
    let a = col(&mut ctx, "t", "a", int());
    let b = col(&mut ctx, "t", "b", int());
    let (ea, eb) = (eq_const(&mut ctx, a, 1), eq_const(&mut ctx, b, 2));
    let sl = ctx.rel_select(Some(base), Some(ea)).unwrap();
    let sr = ctx.rel_select(Some(base), Some(eb)).unwrap();

    let out = ctx.rel_or(Some(base), sl, sr, None, None, None).unwrap();
    assert_eq!(out, sl);
    assert!(!ctx.is_live(sr));
    let exps = ctx.rel(out).exps_or_empty();
    assert_eq!(exps.len(), 1);
    assert!(matches!(ctx.expr(exps[0]).kind, ExprKind::Cmp(Cmp::Or { .. })));
    assert_eq!(ctx.rel(out).kind.left(), Some(base));
}

#[test]
fn non_comparison_filter_becomes_equality_with_true() {
    let (mut ctx, t, _) = setup(Config::default());
    let base = ctx.rel_basetable(&t, "t");
    let flag = ctx.exp_column(Some("t"), "a", Some(SqlType::boolean()), Card::Multi, true, false);
    let sel = ctx.rel_select(Some(base), Some(flag)).unwrap();
    let e = ctx.rel(sel).exps_or_empty()[0];
    assert!(ctx.expr(e).is_cmp());
    assert_ne!(e, flag);
}

// ---------------------------------------------------------------------------
// Set operations and grouping
// ---------------------------------------------------------------------------

#[test]
fn union_converts_the_narrower_side() {
    let (mut ctx, t, u) = setup(Config::default());
    let l = ctx.rel_basetable(&t, "t");
    let r = ctx.rel_basetable(&u, "u");
    let a = col(&mut ctx, "t", "a", int());
    let b = col(&mut ctx, "u", "b", SqlType::local(TypeId::Lng));
    let ls = ExpList::from(vec![a]);
    let rs = ExpList::from(vec![b]);

    let s = ctx.rel_setop_check_types(l, r, &ls, &rs, SetOp::Union).unwrap();
    let RelKind::SetOp { op, left, right } = ctx.rel(s).kind.clone() else {
        panic!("expected a set operation");
    };
    assert_eq!(op, SetOp::Union);
    let le = ctx.rel(left).exps_or_empty()[0];
    assert!(matches!(ctx.expr(le).kind, ExprKind::Convert { .. }));
    assert_eq!(ctx.exp_subtype(le).map(|t| t.local), Some(TypeId::Lng));
    assert_eq!(ctx.rel(right).exps_or_empty(), &[b]);
    assert!(ctx.rel(left).processed && ctx.rel(right).processed);
}

#[test]
fn grouping_drops_repeated_keys() {
    let (mut ctx, t, _) = setup(Config::default());
    let base = ctx.rel_basetable(&t, "t");
    let a1 = col(&mut ctx, "t", "a", int());
    let a2 = col(&mut ctx, "t", "a", int());
    let b = col(&mut ctx, "t", "b", int());
    let g = ctx.rel_groupby(base, Some(ExpList::from(vec![a1, a2, b]))).unwrap();
    let x = ctx.rel(g);
    assert_eq!(x.card, Card::Aggr);
    let RelKind::GroupBy { groups: Some(groups), .. } = &x.kind else {
        panic!("expected a grouping");
    };
    assert_eq!(groups.to_vec(), vec![a1, b]);
    assert_eq!(names(&ctx, g), ["a", "b"]);
}

#[test]
fn repeated_aggregate_is_added_once() {
    let (mut ctx, t, _) = setup(Config::default());
    let base = ctx.rel_basetable(&t, "t");
    let g = ctx.rel_groupby(base, None).unwrap();
    assert_eq!(ctx.rel(g).card, Card::Atom);
    let count = ctx.catalog().bind_func("count").unwrap();

    let a = col(&mut ctx, "t", "a", int());
    let x = ctx.exp_aggr(ExpList::from(vec![a]), count.clone(), false, false, Card::Atom, true);
    let first = ctx.rel_groupby_add_aggr(g, x).unwrap();
    let a = col(&mut ctx, "t", "a", int());
    let y = ctx.exp_aggr(ExpList::from(vec![a]), count, false, false, Card::Atom, true);
    let second = ctx.rel_groupby_add_aggr(g, y).unwrap();

    assert_eq!(ctx.rel(g).exps_or_empty().len(), 1);
    assert_eq!(ctx.exp_name(first), ctx.exp_name(second));
    assert_eq!(ctx.exp_relname(first), ctx.exp_relname(second));
}

// ---------------------------------------------------------------------------
// Binding and labels
// ---------------------------------------------------------------------------

#[test]
fn column_on_both_join_sides_is_ambiguous() {
    let (mut ctx, t, u) = setup(Config::default());
    let l = ctx.rel_basetable(&t, "t");
    let r = ctx.rel_basetable(&u, "u");
    let j = ctx.rel_crossproduct(l, r, JoinKind::Inner);
    let err = ctx.rel_bind_column(j, "b", Clause::NONE).unwrap_err();
    assert_eq!(err, Error::Ambiguous("b".into()));
    assert_eq!(ctx.take_diagnostics().len(), 1);
}

#[test]
fn column_on_one_join_side_binds() {
    let (mut ctx, t, u) = setup(Config::default());
    let l = ctx.rel_basetable(&t, "t");
    let r = ctx.rel_basetable(&u, "u");
    let j = ctx.rel_crossproduct(l, r, JoinKind::Inner);

    let c = ctx.rel_bind_column(j, "c", Clause::NONE).unwrap().unwrap();
    assert_eq!(ctx.exp_name(c), Some("c"));
    assert_eq!(ctx.exp_relname(c), Some("u"));

    let tb = ctx.rel_bind_column2(j, "t", "b", Clause::NONE).unwrap().unwrap();
    assert_eq!(ctx.exp_relname(tb), Some("t"));
    assert_eq!(ctx.rel_bind_column(j, "zz", Clause::NONE).unwrap(), None);
}

#[test]
fn hidden_columns_are_found_by_name_alone() {
    let (mut ctx, t, _) = setup(Config::default());
    let base = ctx.rel_basetable(&t, "t");
    let tid = ctx.rel_find_column(base, "other", "%TID%").unwrap().unwrap();
    assert_eq!(ctx.exp_name(tid), Some("%TID%"));
    assert_eq!(ctx.rel_find_column(base, "other", "a").unwrap(), None);
}

#[test]
fn label_projects_and_renames() {
    let (mut ctx, t, _) = setup(Config::default());
    let base = ctx.rel_basetable(&t, "t");
    let p = ctx.rel_label(base, false).unwrap();
    assert_ne!(p, base);
    assert!(ctx.rel(p).kind.is_project());
    assert_eq!(ctx.rel(p).kind.left(), Some(base));

    let exps = ctx.rel(p).exps_or_empty().to_vec();
    let rname = ctx.exp_relname(exps[0]).map(str::to_string);
    assert_ne!(rname.as_deref(), Some("t"));
    assert!(exps.iter().all(|&e| ctx.exp_relname(e).map(str::to_string) == rname));
    assert_eq!(ctx.exp_name(exps[0]), Some("a"));
}

#[test]
fn projections_hide_internal_columns_unless_asked() {
    let (mut ctx, t, _) = setup(Config::default());
    let base = ctx.rel_basetable(&t, "t");
    let public = ctx.rel_projections(base, None, true, false).unwrap();
    assert_eq!(public.len(), 2);
    let all = ctx.rel_projections(base, None, true, true).unwrap();
    assert_eq!(all.len(), 4);
}

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

#[test]
fn dependencies_skip_system_functions() {
    let (mut ctx, t, _) = setup(Config::default());
    let base = ctx.rel_basetable(&t, "t");
    let add = ctx.catalog().bind_func("sql_add").unwrap();
    let a = col(&mut ctx, "t", "a", int());
    let one = ctx.exp_atom_int(1);
    let e = ctx.exp_binop(a, one, add.clone());
    let p = ctx.rel_project(Some(base), ExpList::from(vec![e]));

    let deps = ctx.rel_dependencies(p).unwrap();
    assert!(deps.contains(&t.id));
    assert!(deps.contains(&t.columns[0].id));
    assert!(!deps.contains(&add.id));
}
