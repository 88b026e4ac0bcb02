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

use super::partitions;
use crate::column::{dispatch_cells, Cells, Column, ColumnData};
use crate::error::Result;

/// Mark rows that start a partition or differ (NIL-aware) from the row
/// before them. Row 0 is always marked.
pub fn diff(input: &Column, markers: Option<&[bool]>) -> Result<Column> {
    let n = input.len();
    trace!(rows = n, ty = %input.type_id(), "diff");
    let parts = partitions(markers, n)?;
    let mut out: Vec<i8> = Vec::new();
    out.try_reserve_exact(n)?;
    dispatch_cells!(input.data(), c => fill(c, &parts, &mut out));
    Ok(Column::new(ColumnData::Bit(out)))
}

fn fill<C: Cells + ?Sized>(c: &C, parts: &[std::ops::Range<usize>], out: &mut Vec<i8>) {
    for p in parts {
        for i in p.clone() {
            let changed = i == p.start || !c.same(i, i - 1);
            out.push(changed as i8);
        }
    }
}
