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

use tracing::trace;

use super::fsum::Partials;
use super::{Frames, Step, Walk};
use crate::column::{Column, ColumnData, Float, Integral};
use crate::error::{Error, Result};
use crate::types::{sum_target_allowed, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fold {
    Add,
    Mul,
}

impl Fold {
    fn op(self) -> &'static str {
        match self {
            Fold::Add => "sum",
            Fold::Mul => "prod",
        }
    }
}

/// Sum of the non-NIL values of each frame, accumulated in `target`.
/// Frames without values yield NIL. A `hge` target needs `have_hge`.
pub fn sum(input: &Column, frames: Frames<'_>, target: TypeId, have_hge: bool) -> Result<Column> {
    fold(input, frames, target, have_hge, Fold::Add)
}

/// Product of the non-NIL values of each frame, accumulated in `target`.
pub fn prod(input: &Column, frames: Frames<'_>, target: TypeId, have_hge: bool) -> Result<Column> {
    fold(input, frames, target, have_hge, Fold::Mul)
}

fn fold(input: &Column, frames: Frames<'_>, target: TypeId, have_hge: bool, fold: Fold) -> Result<Column> {
    let ty = input.type_id();
    trace!(rows = input.len(), %ty, %target, op = fold.op(), "fold");
    if !sum_target_allowed(ty, target, have_hge) {
        return Err(Error::unsupported(fold.op(), format!("{ty}->{target}")));
    }
    frames.check(input.len())?;
    match input.data() {
        ColumnData::Bte(v) => integral(v, frames, target, fold),
        ColumnData::Sht(v) => integral(v, frames, target, fold),
        ColumnData::Int(v) => integral(v, frames, target, fold),
        ColumnData::Lng(v) => integral(v, frames, target, fold),
        ColumnData::Hge(v) => integral(v, frames, target, fold),
        ColumnData::Flt(v) => float(v, frames, target, fold),
        ColumnData::Dbl(v) => float(v, frames, target, fold),
        _ => Err(Error::unsupported(fold.op(), ty)),
    }
}

/// Valid (non-NIL) range of an integer accumulator.
fn bounds(target: TypeId) -> (i128, i128) {
    match target {
        TypeId::Bte => (i8::MIN as i128 + 1, i8::MAX as i128),
        TypeId::Sht => (i16::MIN as i128 + 1, i16::MAX as i128),
        TypeId::Int => (i32::MIN as i128 + 1, i32::MAX as i128),
        TypeId::Lng => (i64::MIN as i128 + 1, i64::MAX as i128),
        _ => (i128::MIN + 1, i128::MAX),
    }
}

fn integral<T: Integral>(v: &[T], frames: Frames<'_>, target: TypeId, fold: Fold) -> Result<Column> {
    let n = v.len();
    let (lo, hi) = bounds(target);
    let overflow = Error::Overflow { op: fold.op() };
    let apply = |acc: &mut Option<i128>, rows: std::ops::Range<usize>| -> Result<()> {
        for j in rows {
            if v[j].is_nil() {
                continue;
            }
            let x = v[j].to_i128();
            *acc = Some(match *acc {
                None => x,
                Some(a) => {
                    let r = match fold {
                        Fold::Add => a.checked_add(x),
                        Fold::Mul => a.checked_mul(x),
                    };
                    r.filter(|r| (lo..=hi).contains(r))
                        .ok_or_else(|| overflow.clone())?
                }
            });
        }
        Ok(())
    };
    let mut out = Vec::new();
    out.try_reserve_exact(n)?;
    let mut walk = Walk::default();
    let mut acc = None;
    for i in 0..n {
        match walk.step(frames.range(i, n)) {
            Step::Same => {}
            Step::Extend(more) => apply(&mut acc, more)?,
            Step::Fresh(rows) => {
                acc = None;
                apply(&mut acc, rows)?;
            }
        }
        out.push(acc);
    }
    Column::from_i128s(target, &out)
}

fn float<T: Float>(v: &[T], frames: Frames<'_>, target: TypeId, fold: Fold) -> Result<Column> {
    let n = v.len();
    let op = fold.op();
    let max = if target == TypeId::Flt { f32::MAX as f64 } else { f64::MAX };
    let mut out = Vec::new();
    out.try_reserve_exact(n)?;
    let mut walk = Walk::default();
    let mut partials = Partials::new();
    let mut product: Option<f64> = None;
    let mut seen = false;
    let mut cur: Option<f64> = None;
    for i in 0..n {
        let rows = match walk.step(frames.range(i, n)) {
            Step::Same => {
                out.push(cur);
                continue;
            }
            Step::Extend(more) => more,
            Step::Fresh(rows) => {
                partials.clear();
                product = None;
                seen = false;
                rows
            }
        };
        for j in rows {
            if v[j].is_nil() {
                continue;
            }
            let x = v[j].to_f64();
            seen = true;
            match fold {
                Fold::Add => partials.add(x)?,
                Fold::Mul => {
                    product = Some(match product {
                        None => x,
                        Some(a) => {
                            if a.abs() > 1.0 && max / x.abs() < a.abs() {
                                return Err(Error::Overflow { op });
                            }
                            a * x
                        }
                    })
                }
            }
        }
        cur = match (seen, fold) {
            (false, _) => None,
            (true, Fold::Add) => Some(partials.sum(op)?),
            (true, Fold::Mul) => product,
        };
        if let Some(r) = cur {
            if !r.is_finite() || r.abs() > max {
                return Err(Error::Overflow { op });
            }
        }
        out.push(cur);
    }
    Column::from_f64s(target, &out)
}
