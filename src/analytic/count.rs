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
use crate::column::{dispatch_cells, Cells, Column, ColumnData};
use crate::error::Result;

/// Rows per frame; with `ignore_nils` only non-NIL rows are counted.
/// The result is a `lng` column without NILs.
pub fn count(input: &Column, frames: Frames<'_>, ignore_nils: bool) -> Result<Column> {
    let n = input.len();
    trace!(rows = n, ty = %input.type_id(), ignore_nils, "count");
    frames.check(n)?;
    if !ignore_nils || input.nonil() {
        let mut out = Vec::new();
        out.try_reserve_exact(n)?;
        out.extend((0..n).map(|i| frames.range(i, n).len() as i64));
        return Ok(Column::new(ColumnData::Lng(out)));
    }
    // Strings answer from the heap byte at each offset without decoding.
    let out = dispatch_cells!(input.data(), c => count_cells(n, frames, |j| c.is_nil(j)))?;
    Ok(Column::new(ColumnData::Lng(out)))
}

/// Non-NIL rows per frame, decoding every value. Agrees with [`count`]
/// with `ignore_nils` set.
pub fn count_by_value(input: &Column, frames: Frames<'_>) -> Result<Column> {
    let n = input.len();
    frames.check(n)?;
    let out = count_cells(n, frames, |j| input.get(j).is_nil())?;
    Ok(Column::new(ColumnData::Lng(out)))
}

fn count_cells(n: usize, frames: Frames<'_>, is_nil: impl Fn(usize) -> bool) -> Result<Vec<i64>> {
    let mut out = Vec::new();
    out.try_reserve_exact(n)?;
    let mut walk = Walk::default();
    let mut acc = 0i64;
    let live = |rows: std::ops::Range<usize>| rows.filter(|&j| !is_nil(j)).count() as i64;
    for i in 0..n {
        match walk.step(frames.range(i, n)) {
            Step::Same => {}
            Step::Extend(more) => acc += live(more),
            Step::Fresh(rows) => acc = live(rows),
        }
        out.push(acc);
    }
    Ok(out)
}
