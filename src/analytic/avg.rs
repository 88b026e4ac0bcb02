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

use super::{Frames, Step, Walk};
use crate::column::{Column, ColumnData, Float, Integral};
use crate::error::{Error, Result};
use crate::types::TypeId;

/// Mean of the non-NIL values of each frame as `dbl`; NIL for frames
/// without values.
pub fn avg(input: &Column, frames: Frames<'_>) -> Result<Column> {
    let ty = input.type_id();
    trace!(rows = input.len(), %ty, "avg");
    frames.check(input.len())?;
    let out = match input.data() {
        ColumnData::Bte(v) => integral(v, frames)?,
        ColumnData::Sht(v) => integral(v, frames)?,
        ColumnData::Int(v) => integral(v, frames)?,
        ColumnData::Lng(v) => integral(v, frames)?,
        ColumnData::Hge(v) => integral(v, frames)?,
        ColumnData::Flt(v) => float(v, frames)?,
        ColumnData::Dbl(v) => float(v, frames)?,
        _ => return Err(Error::unsupported("avg", ty)),
    };
    Column::from_f64s(TypeId::Dbl, &out)
}

/// Integer mean accumulator. Sums exactly in i128 until that overflows,
/// then keeps the mean as `a + r/n` with `0 <= r < n`.
#[derive(Debug, Clone, Copy)]
enum Mean {
    Sum { sum: i128, n: i128 },
    Running { a: i128, r: i128, n: i128 },
}

impl Mean {
    const EMPTY: Mean = Mean::Sum { sum: 0, n: 0 };

    fn add(&mut self, x: i128) -> Result<()> {
        if let Mean::Sum { sum, n } = *self {
            match sum.checked_add(x) {
                Some(s) => {
                    *self = Mean::Sum { sum: s, n: n + 1 };
                    return Ok(());
                }
                None => {
                    let (a, r) = split(sum, n);
                    *self = Mean::Running { a, r, n };
                }
            }
        }
        if let Mean::Running { a, r, n } = *self {
            let n1 = n + 1;
            let overflow = || Error::Overflow { op: "avg" };
            let (qx, rx) = (x.div_euclid(n1), x.rem_euclid(n1));
            let (qa, ra) = (a.div_euclid(n1), a.rem_euclid(n1));
            // rx - ra + r lies in (-n1, 2 * n1).
            let t = rx - ra + r;
            let z = qx
                .checked_sub(qa)
                .and_then(|d| d.checked_add(t.div_euclid(n1)))
                .ok_or_else(overflow)?;
            *self = Mean::Running {
                a: a.checked_add(z).ok_or_else(overflow)?,
                r: t.rem_euclid(n1),
                n: n1,
            };
        }
        Ok(())
    }

    fn value(&self) -> Option<f64> {
        let (a, r, n) = match *self {
            Mean::Sum { n: 0, .. } => return None,
            Mean::Sum { sum, n } => {
                let (a, r) = split(sum, n);
                (a, r, n)
            }
            Mean::Running { a, r, n } => (a, r, n),
        };
        Some(a as f64 + r as f64 / n as f64)
    }
}

fn split(sum: i128, n: i128) -> (i128, i128) {
    if n == 0 {
        (0, 0)
    } else {
        (sum.div_euclid(n), sum.rem_euclid(n))
    }
}

fn integral<T: Integral>(v: &[T], frames: Frames<'_>) -> Result<Vec<Option<f64>>> {
    let n = v.len();
    let mut out = Vec::new();
    out.try_reserve_exact(n)?;
    let mut walk = Walk::default();
    let mut mean = Mean::EMPTY;
    let apply = |mean: &mut Mean, rows: std::ops::Range<usize>| -> Result<()> {
        for j in rows.filter(|&j| !v[j].is_nil()) {
            mean.add(v[j].to_i128())?;
        }
        Ok(())
    };
    for i in 0..n {
        match walk.step(frames.range(i, n)) {
            Step::Same => {}
            Step::Extend(more) => apply(&mut mean, more)?,
            Step::Fresh(rows) => {
                mean = Mean::EMPTY;
                apply(&mut mean, rows)?;
            }
        }
        out.push(mean.value());
    }
    Ok(out)
}

fn float<T: Float>(v: &[T], frames: Frames<'_>) -> Result<Vec<Option<f64>>> {
    let n = v.len();
    let mut out = Vec::new();
    out.try_reserve_exact(n)?;
    let mut walk = Walk::default();
    let (mut a, mut cnt) = (0.0f64, 0u64);
    for i in 0..n {
        let rows = match walk.step(frames.range(i, n)) {
            Step::Same => 0..0,
            Step::Extend(more) => more,
            Step::Fresh(rows) => {
                a = 0.0;
                cnt = 0;
                rows
            }
        };
        for j in rows.filter(|&j| !v[j].is_nil()) {
            cnt += 1;
            a += (v[j].to_f64() - a) / cnt as f64;
        }
        out.push((cnt > 0).then_some(a));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mean_keeps_remainder() {
        let mut m = Mean::EMPTY;
        for x in [i128::MAX, i128::MAX, 1] {
            m.add(x).unwrap();
        }
        assert!(matches!(m, Mean::Running { n: 3, .. }));
        let expected = (i128::MAX / 3 * 2) as f64;
        let got = m.value().unwrap();
        assert!((got - expected).abs() / expected < 1e-12);
    }
}
