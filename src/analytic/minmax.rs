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

use std::cmp::Ordering;

use tracing::trace;

use super::{Frames, Step, Walk};
use crate::column::{dispatch_cells, Cells, Column, Pick};
use crate::error::Result;
use crate::types::Value;

/// Smallest non-NIL value of each frame.
pub fn min(input: &Column, frames: Frames<'_>) -> Result<Column> {
    extreme(input, frames, Ordering::Less)
}

/// Largest non-NIL value of each frame.
pub fn max(input: &Column, frames: Frames<'_>) -> Result<Column> {
    extreme(input, frames, Ordering::Greater)
}

fn extreme(input: &Column, frames: Frames<'_>, want: Ordering) -> Result<Column> {
    let count = input.len();
    trace!(rows = count, ty = %input.type_id(), ?want, "min/max");
    frames.check(count)?;
    let mut picks = Vec::new();
    picks.try_reserve_exact(count)?;
    dispatch_cells!(input.data(), c => reduce(c, frames, want, &mut picks));
    input.gather(&picks, &Value::nil(input.type_id()))
}

fn reduce<C: Cells + ?Sized>(c: &C, frames: Frames<'_>, want: Ordering, picks: &mut Vec<Pick>) {
    let count = c.len();
    let mut walk = Walk::default();
    let mut best: Option<usize> = None;
    let scan = |rows: std::ops::Range<usize>, best: &mut Option<usize>| {
        for j in rows {
            if c.is_nil(j) {
                continue;
            }
            match best {
                Some(b) if c.order(j, *b) != want => {}
                _ => *best = Some(j),
            }
        }
    };
    for i in 0..count {
        match walk.step(frames.range(i, count)) {
            Step::Same => {}
            Step::Extend(more) => scan(more, &mut best),
            Step::Fresh(rows) => {
                best = None;
                scan(rows, &mut best);
            }
        }
        picks.push(best.map_or(Pick::Nil, Pick::Row));
    }
}
