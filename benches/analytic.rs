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

//! Window kernel benchmark suite (criterion).
//!
//! Runs over a synthetic integer column with a NIL every seventh row and
//! partitions of 1000 rows.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use relcore::analytic::{self, FrameBound, FrameSpec, Frames};
use relcore::{Column, TypeId, Value};

const ROWS: [usize; 2] = [10_000, 1_000_000];

fn input(n: usize) -> Column {
    let vals: Vec<Option<i128>> = (0..n)
        .map(|i| (i % 7 != 0).then_some((i % 1000) as i128))
        .collect();
    Column::from_i128s(TypeId::Int, &vals).unwrap()
}

fn markers(n: usize) -> Vec<bool> {
    (0..n).map(|i| i % 1000 == 0).collect()
}

fn bounds(n: usize, start: FrameBound, end: FrameBound) -> (Vec<i64>, Vec<i64>) {
    let spec = FrameSpec::rows(start, end).unwrap();
    let m = markers(n);
    spec.bounds(n, Some(&m[..]), None).unwrap()
}

// ---------------------------------------------------------------------------
// Running frames (UNBOUNDED PRECEDING .. CURRENT ROW)
// ---------------------------------------------------------------------------

fn bench_running(c: &mut Criterion) {
    let mut group = c.benchmark_group("running");
    for n in ROWS {
        let col = input(n);
        let (start, end) = bounds(n, FrameBound::UnboundedPreceding, FrameBound::CurrentRow);
        let frames = Frames::new(&start, &end).unwrap();
        group.bench_with_input(BenchmarkId::new("sum", n), &col, |b, col| {
            b.iter(|| analytic::sum(black_box(col), frames, TypeId::Lng, true).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("avg", n), &col, |b, col| {
            b.iter(|| analytic::avg(black_box(col), frames).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("count", n), &col, |b, col| {
            b.iter(|| analytic::count(black_box(col), frames, true).unwrap())
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Sliding frames (32 PRECEDING .. 32 FOLLOWING)
// ---------------------------------------------------------------------------

fn bench_sliding(c: &mut Criterion) {
    let mut group = c.benchmark_group("sliding");
    for n in ROWS {
        let col = input(n);
        let (start, end) = bounds(n, FrameBound::Preceding(32), FrameBound::Following(32));
        let frames = Frames::new(&start, &end).unwrap();
        group.bench_with_input(BenchmarkId::new("sum", n), &col, |b, col| {
            b.iter(|| analytic::sum(black_box(col), frames, TypeId::Lng, true).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("min", n), &col, |b, col| {
            b.iter(|| analytic::min(black_box(col), frames).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("count", n), &col, |b, col| {
            b.iter(|| analytic::count(black_box(col), frames, true).unwrap())
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Row kernels
// ---------------------------------------------------------------------------

fn bench_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("rows");
    for n in ROWS {
        let col = input(n);
        let m = markers(n);
        group.bench_with_input(BenchmarkId::new("diff", n), &col, |b, col| {
            b.iter(|| analytic::diff(black_box(col), Some(&m[..])).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("lag", n), &col, |b, col| {
            b.iter(|| analytic::lag(black_box(col), Some(&m[..]), Some(1), &Value::Int(0)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_running, bench_sliding, bench_rows);
criterion_main!(benches);
