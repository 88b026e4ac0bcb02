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

//! Integration tests for the window-function kernels.
//!
//! Small hand-checked columns cover partitioning, frame bounds, NIL handling
//! and the overflow rules of the accumulators; property tests cross-check
//! the string `count` fast path and the frame bounds against naive
//! re-computation, and check `lag`/`lead` and `ntile` bucket shapes.

use proptest::prelude::*;

use relcore::analytic::{
    self, FrameBound, FrameSpec, FrameType, Frames, NthBound, WindowFunc,
};
use relcore::{Column, Error, TypeId, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ints(values: &[Option<i128>]) -> Column {
    Column::from_i128s(TypeId::Int, values).unwrap()
}

fn as_i128s(col: &Column) -> Vec<Option<i128>> {
    col.values().iter().map(Value::as_i128).collect()
}

fn as_f64s(col: &Column) -> Vec<Option<f64>> {
    col.values().iter().map(Value::as_f64).collect()
}

/// Whole-column frame for every row.
fn whole(n: usize) -> (Vec<i64>, Vec<i64>) {
    (vec![0; n], vec![n as i64; n])
}

/// `ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`.
fn running(n: usize) -> (Vec<i64>, Vec<i64>) {
    (vec![0; n], (1..=n as i64).collect())
}

// ---------------------------------------------------------------------------
// Row-oriented kernels
// ---------------------------------------------------------------------------

#[test]
fn diff_marks_changes_and_partition_starts() {
    let col = ints(&[Some(1), Some(1), Some(2), Some(2), Some(2)]);
    let markers = [true, false, false, true, false];
    let out = analytic::diff(&col, Some(&markers[..])).unwrap();
    assert_eq!(out.type_id(), TypeId::Bit);
    assert!(out.nonil());
    let flags: Vec<bool> = out.values().iter().map(Value::is_true).collect();
    assert_eq!(flags, vec![true, false, true, true, false]);
}

#[test]
fn diff_treats_nil_as_equal_to_nil() {
    let col = Column::from_f64s(TypeId::Dbl, &[None, None, Some(1.0)]).unwrap();
    let out = analytic::diff(&col, None).unwrap();
    let flags: Vec<bool> = out.values().iter().map(Value::is_true).collect();
    assert_eq!(flags, vec![true, false, true]);
}

#[test]
fn ntile_spreads_remainder_over_leading_buckets() {
    let col = ints(&[Some(0); 7]);
    let out = analytic::ntile(&col, None, &Value::Int(3)).unwrap();
    assert_eq!(out.type_id(), TypeId::Int);
    let labels: Vec<_> = as_i128s(&out).into_iter().flatten().collect();
    assert_eq!(labels, vec![1, 1, 1, 2, 2, 3, 3]);
}

#[test]
fn ntile_restarts_per_partition() {
    let col = ints(&[Some(0); 5]);
    let markers = [true, false, false, true, false];
    let out = analytic::ntile(&col, Some(&markers[..]), &Value::Lng(5)).unwrap();
    assert_eq!(out.type_id(), TypeId::Lng);
    let labels: Vec<_> = as_i128s(&out).into_iter().flatten().collect();
    assert_eq!(labels, vec![1, 2, 3, 1, 2]);
}

#[test]
fn ntile_nil_bucket_count_gives_nil_rows() {
    let col = ints(&[Some(1), Some(2)]);
    let out = analytic::ntile(&col, None, &Value::nil(TypeId::Int)).unwrap();
    assert_eq!(as_i128s(&out), vec![None, None]);
}

#[test]
fn ntile_rejects_non_positive_bucket_count() {
    let col = ints(&[Some(1)]);
    let err = analytic::ntile(&col, None, &Value::Int(0)).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn lag_fills_head_of_each_partition() {
    let col = ints(&[Some(1), Some(2), Some(3), Some(4)]);
    let markers = [true, false, true, false];
    let out = analytic::lag(&col, Some(&markers[..]), Some(1), &Value::Int(-1)).unwrap();
    assert_eq!(as_i128s(&out), vec![Some(-1), Some(1), Some(-1), Some(3)]);
}

#[test]
fn lead_fills_tail_and_none_offset_is_all_nil() {
    let col = ints(&[Some(1), Some(2), Some(3)]);
    let nil = Value::nil(TypeId::Int);
    let out = analytic::lead(&col, None, Some(2), &nil).unwrap();
    assert_eq!(as_i128s(&out), vec![Some(3), None, None]);

    let out = analytic::lead(&col, None, None, &Value::Int(0)).unwrap();
    assert_eq!(as_i128s(&out), vec![None, None, None]);
}

#[test]
fn lag_default_of_other_type_is_rejected() {
    let col = ints(&[Some(1), Some(2)]);
    let err = analytic::lag(&col, None, Some(1), &Value::str("x")).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[test]
fn partition_markers_of_wrong_length_are_rejected() {
    let col = ints(&[Some(1), Some(2), Some(3)]);
    let err = analytic::diff(&col, Some(&[true, false][..])).unwrap_err();
    assert_eq!(err, Error::Length { expected: 3, got: 2 });
}

// ---------------------------------------------------------------------------
// Frame kernels
// ---------------------------------------------------------------------------

#[test]
fn first_last_and_nth_over_sliding_frames() {
    let col = ints(&[Some(10), Some(20), Some(30)]);
    // ROWS BETWEEN 1 PRECEDING AND CURRENT ROW
    let start = [0, 0, 1];
    let end = [1, 2, 3];
    let frames = Frames::new(&start, &end).unwrap();
    assert_eq!(
        as_i128s(&analytic::first(&col, frames).unwrap()),
        vec![Some(10), Some(10), Some(20)]
    );
    assert_eq!(
        as_i128s(&analytic::last(&col, frames).unwrap()),
        vec![Some(10), Some(20), Some(30)]
    );
    assert_eq!(
        as_i128s(&analytic::nth_value(&col, frames, NthBound::Const(Some(2))).unwrap()),
        vec![None, Some(20), Some(30)]
    );
    assert_eq!(
        as_i128s(&analytic::nth_value(&col, frames, NthBound::Const(None)).unwrap()),
        vec![None, None, None]
    );
}

#[test]
fn nth_value_with_per_row_bound() {
    let col = ints(&[Some(10), Some(20), Some(30)]);
    let bounds = Column::from_i128s(TypeId::Lng, &[Some(1), Some(0), None]).unwrap();
    let (start, end) = whole(3);
    let frames = Frames::new(&start, &end).unwrap();
    let out = analytic::nth_value(&col, frames, NthBound::PerRow(&bounds)).unwrap();
    assert_eq!(as_i128s(&out), vec![Some(10), None, None]);
}

#[test]
fn empty_and_out_of_range_frames_are_nil() {
    let col = ints(&[Some(5), Some(6)]);
    let start = [1, -10];
    let end = [1, 100];
    let frames = Frames::new(&start, &end).unwrap();
    assert_eq!(as_i128s(&analytic::first(&col, frames).unwrap()), vec![None, Some(5)]);
    assert_eq!(as_i128s(&analytic::max(&col, frames).unwrap()), vec![None, Some(6)]);
}

#[test]
fn min_max_skip_nil() {
    let col = ints(&[None, Some(4), None, Some(-2)]);
    let (start, end) = running(4);
    let frames = Frames::new(&start, &end).unwrap();
    assert_eq!(
        as_i128s(&analytic::min(&col, frames).unwrap()),
        vec![None, Some(4), Some(4), Some(-2)]
    );
    assert_eq!(
        as_i128s(&analytic::max(&col, frames).unwrap()),
        vec![None, Some(4), Some(4), Some(4)]
    );
}

#[test]
fn count_with_and_without_nils() {
    let col = Column::strs([Some("a"), None, Some(""), None]).unwrap();
    let (start, end) = running(4);
    let frames = Frames::new(&start, &end).unwrap();
    let all = analytic::count(&col, frames, false).unwrap();
    assert_eq!(as_i128s(&all), vec![Some(1), Some(2), Some(3), Some(4)]);
    let live = analytic::count(&col, frames, true).unwrap();
    assert_eq!(as_i128s(&live), vec![Some(1), Some(1), Some(2), Some(2)]);
}

#[test]
fn sum_widens_and_reports_overflow() {
    let col = ints(&[Some(i32::MAX as i128), Some(i32::MAX as i128)]);
    let (start, end) = whole(2);
    let frames = Frames::new(&start, &end).unwrap();
    let out = analytic::sum(&col, frames, TypeId::Lng, true).unwrap();
    assert_eq!(out.type_id(), TypeId::Lng);
    assert_eq!(as_i128s(&out), vec![Some(2 * i32::MAX as i128); 2]);

    let err = analytic::sum(&col, frames, TypeId::Int, true).unwrap_err();
    assert!(matches!(err, Error::Overflow { .. }));
    assert_eq!(err.sqlstate(), "22003");
}

#[test]
fn sum_of_small_ints_into_int() {
    let col = Column::from_i128s(TypeId::Bte, &[Some(1), Some(2), Some(3)]).unwrap();
    let (start, end) = whole(3);
    let frames = Frames::new(&start, &end).unwrap();
    let out = analytic::sum(&col, frames, TypeId::Int, true).unwrap();
    assert_eq!(out.type_id(), TypeId::Int);
    assert_eq!(as_i128s(&out), vec![Some(6); 3]);
}

#[test]
fn sum_rejects_narrowing_target() {
    let col = ints(&[Some(1)]);
    let (start, end) = whole(1);
    let frames = Frames::new(&start, &end).unwrap();
    let err = analytic::sum(&col, frames, TypeId::Sht, true).unwrap_err();
    assert!(matches!(err, Error::UnsupportedType { .. }));
}

#[test]
fn float_sum_is_exact() {
    let col = Column::from_f64s(TypeId::Dbl, &[Some(1e16), Some(1.0), Some(-1e16)]).unwrap();
    let (start, end) = whole(3);
    let frames = Frames::new(&start, &end).unwrap();
    let out = analytic::sum(&col, frames, TypeId::Dbl, true).unwrap();
    assert_eq!(as_f64s(&out)[0], Some(1.0));
}

#[test]
fn prod_of_nil_only_frame_is_nil() {
    let col = ints(&[None, Some(3), Some(4)]);
    let start = [0, 0, 0];
    let end = [1, 2, 3];
    let frames = Frames::new(&start, &end).unwrap();
    let out = analytic::prod(&col, frames, TypeId::Lng, true).unwrap();
    assert_eq!(as_i128s(&out), vec![None, Some(3), Some(12)]);
}

#[test]
fn avg_survives_i128_overflow() {
    let big = i128::MAX - 1;
    let col = Column::from_i128s(TypeId::Hge, &[Some(big), Some(big), Some(big)]).unwrap();
    let (start, end) = whole(3);
    let frames = Frames::new(&start, &end).unwrap();
    let out = analytic::avg(&col, frames).unwrap();
    assert_eq!(out.type_id(), TypeId::Dbl);
    assert_eq!(as_f64s(&out), vec![Some(big as f64); 3]);
}

#[test]
fn avg_of_ints_is_exact() {
    let col = ints(&[Some(1), Some(2), Some(3)]);
    let (start, end) = whole(3);
    let frames = Frames::new(&start, &end).unwrap();
    let out = analytic::avg(&col, frames).unwrap();
    assert_eq!(as_f64s(&out), vec![Some(2.0); 3]);
}

#[test]
fn avg_of_empty_frame_is_nil() {
    let col = ints(&[None, Some(2), Some(4)]);
    let (start, end) = running(3);
    let frames = Frames::new(&start, &end).unwrap();
    let out = analytic::avg(&col, frames).unwrap();
    assert_eq!(as_f64s(&out), vec![None, Some(2.0), Some(3.0)]);
}

// ---------------------------------------------------------------------------
// Frame specs and window functions
// ---------------------------------------------------------------------------

#[test]
fn rows_frame_bounds_stay_inside_partition() {
    let spec = FrameSpec::rows(FrameBound::Preceding(1), FrameBound::Following(1)).unwrap();
    let markers = [true, false, false, true, false];
    let (start, end) = spec.bounds(5, Some(&markers[..]), None).unwrap();
    assert_eq!(start, vec![0, 0, 1, 3, 3]);
    assert_eq!(end, vec![2, 3, 3, 5, 5]);
}

#[test]
fn range_frame_uses_peer_groups() {
    let spec = FrameSpec::new(
        FrameType::Range,
        FrameBound::UnboundedPreceding,
        FrameBound::CurrentRow,
    )
    .unwrap();
    let peers = [true, false, true, false];
    let (start, end) = spec.bounds(4, None, Some(&peers[..])).unwrap();
    assert_eq!(start, vec![0, 0, 0, 0]);
    assert_eq!(end, vec![2, 2, 4, 4]);
}

#[test]
fn frame_start_after_end_is_rejected() {
    let err = FrameSpec::rows(FrameBound::CurrentRow, FrameBound::Preceding(1)).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    let err = FrameSpec::new(FrameType::Range, FrameBound::Preceding(2), FrameBound::CurrentRow)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedType { .. }));
}

#[test]
fn window_sum_widens_by_default() {
    let col = ints(&[Some(1), Some(2), Some(3), Some(4)]);
    let markers = [true, false, true, false];
    let spec = FrameSpec::rows(FrameBound::UnboundedPreceding, FrameBound::CurrentRow).unwrap();
    let out = WindowFunc::Sum(None)
        .evaluate(&col, Some(&markers[..]), None, &spec, true)
        .unwrap();
    assert_eq!(out.type_id(), TypeId::Lng);
    assert_eq!(as_i128s(&out), vec![Some(1), Some(3), Some(3), Some(7)]);
}

#[test]
fn window_lag_ignores_frame() {
    let col = ints(&[Some(1), Some(2), Some(3)]);
    let spec = FrameSpec::whole_partition();
    let f = WindowFunc::Lag {
        offset: Some(1),
        default: None,
    };
    let out = f.evaluate(&col, None, None, &spec, true).unwrap();
    assert_eq!(as_i128s(&out), vec![None, Some(1), Some(2)]);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn strings() -> impl Strategy<Value = Vec<Option<String>>> {
    prop::collection::vec(prop::option::of("[a-z]{0,3}"), 0..40)
}

proptest! {
    #[test]
    fn string_count_paths_agree(items in strings(), width in 1i64..6) {
        let col = Column::strs(items.iter().map(|s| s.as_deref())).unwrap();
        let n = items.len() as i64;
        let start: Vec<i64> = (0..n).map(|i| i - width).collect();
        let end: Vec<i64> = (0..n).map(|i| i + 1).collect();
        let frames = Frames::new(&start, &end).unwrap();
        let fast = analytic::count(&col, frames, true).unwrap();
        let slow = analytic::count_by_value(&col, frames).unwrap();
        prop_assert_eq!(fast.values(), slow.values());
    }

    #[test]
    fn running_int_sum_matches_naive(values in prop::collection::vec(prop::option::of(-1000i128..1000), 1..50)) {
        let col = ints(&values);
        let (start, end) = running(values.len());
        let frames = Frames::new(&start, &end).unwrap();
        let out = analytic::sum(&col, frames, TypeId::Lng, true).unwrap();
        let mut acc: Option<i128> = None;
        for (i, v) in values.iter().enumerate() {
            if let Some(v) = v {
                acc = Some(acc.unwrap_or(0) + v);
            }
            prop_assert_eq!(out.get(i).as_i128(), acc);
        }
    }

    #[test]
    fn lead_undoes_lag_inside_partitions(
        values in prop::collection::vec(prop::option::of(-1000i128..1000), 1..40),
        cuts in prop::collection::vec(any::<bool>(), 40),
        k in 0usize..5,
    ) {
        let n = values.len();
        let col = ints(&values);
        let markers: Vec<bool> = (0..n).map(|i| i == 0 || cuts[i]).collect();
        let nil = Value::nil(TypeId::Int);
        let lagged = analytic::lag(&col, Some(&markers[..]), Some(k), &nil).unwrap();
        let back = analytic::lead(&lagged, Some(&markers[..]), Some(k), &nil).unwrap();
        let back = as_i128s(&back);

        let mut end = n;
        for i in (0..n).rev() {
            if i + k < end {
                prop_assert_eq!(back[i], values[i]);
            }
            if markers[i] {
                end = i;
            }
        }
    }

    #[test]
    fn ntile_buckets_are_balanced(
        sizes in prop::collection::vec(1usize..20, 1..5),
        buckets in 1i32..8,
    ) {
        let n: usize = sizes.iter().sum();
        let mut markers = Vec::new();
        for s in &sizes {
            markers.push(true);
            markers.extend(std::iter::repeat(false).take(s - 1));
        }
        let col = ints(&vec![Some(0); n]);
        let out = analytic::ntile(&col, Some(&markers[..]), &Value::Int(buckets)).unwrap();
        let labels: Vec<i128> = as_i128s(&out).into_iter().flatten().collect();
        prop_assert_eq!(labels.len(), n);

        let mut base = 0;
        for s in sizes {
            let part = &labels[base..base + s];
            let top = s.min(buckets as usize) as i128;
            prop_assert!(part.iter().all(|&l| (1..=top).contains(&l)));
            prop_assert!(part.windows(2).all(|w| w[0] <= w[1]));
            let counts: Vec<usize> = (1..=top)
                .map(|b| part.iter().filter(|&&l| l == b).count())
                .collect();
            let (lo, hi) = (counts.iter().min().unwrap(), counts.iter().max().unwrap());
            prop_assert!(*lo >= 1 && hi - lo <= 1);
            base += s;
        }
    }

    #[test]
    fn frame_bounds_stay_in_partition(
        sizes in prop::collection::vec(1usize..6, 1..6),
        before in 0i64..4,
        after in 0i64..4,
    ) {
        let mut markers = Vec::new();
        for s in &sizes {
            markers.push(true);
            markers.extend(std::iter::repeat(false).take(s - 1));
        }
        let spec = FrameSpec::rows(FrameBound::Preceding(before), FrameBound::Following(after)).unwrap();
        let (start, end) = spec.bounds(markers.len(), Some(&markers[..]), None).unwrap();
        let mut base = 0i64;
        for s in sizes {
            let limit = base + s as i64;
            for i in base..limit {
                let (st, en) = (start[i as usize], end[i as usize]);
                prop_assert!(base <= st && st <= i);
                prop_assert!(i < en && en <= limit);
            }
            base = limit;
        }
    }
}
