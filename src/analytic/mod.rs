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

//! Vectorized window functions.
//!
//! Every kernel returns a new column with one row per input row; an error
//! aborts the whole call. Row-oriented kernels (`diff`, `ntile`, `lag`,
//! `lead`) take optional partition markers, where `true` marks the first row
//! of a partition and row 0 always starts one. Frame kernels take per-row
//! half-open `[start, end)` bounds, see [`Frames`].

use std::ops::Range;

use crate::error::{Error, Result};

mod avg;
mod count;
mod diff;
pub mod frame;
pub mod fsum;
mod minmax;
mod ntile;
mod sum;
mod value;
pub mod window;

pub use avg::avg;
pub use count::{count, count_by_value};
pub use diff::diff;
pub use frame::{FrameBound, FrameSpec, FrameType};
pub use minmax::{max, min};
pub use ntile::ntile;
pub use sum::{prod, sum};
pub use value::{first, lag, last, lead, nth_value, NthBound};
pub use window::WindowFunc;

/// Per-row frame bounds. Bounds are clamped to `[0, count]`; `end <= start`
/// is an empty frame.
#[derive(Debug, Clone, Copy)]
pub struct Frames<'a> {
    start: &'a [i64],
    end: &'a [i64],
}

impl<'a> Frames<'a> {
    pub fn new(start: &'a [i64], end: &'a [i64]) -> Result<Self> {
        if start.len() != end.len() {
            return Err(Error::Length {
                expected: start.len(),
                got: end.len(),
            });
        }
        Ok(Frames { start, end })
    }

    pub fn len(&self) -> usize {
        self.start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_empty()
    }

    pub(crate) fn check(&self, count: usize) -> Result<()> {
        if self.len() != count {
            return Err(Error::Length {
                expected: count,
                got: self.len(),
            });
        }
        Ok(())
    }

    /// Clamped row range of frame `i` over a column of `count` rows.
    #[inline]
    pub(crate) fn range(&self, i: usize, count: usize) -> Range<usize> {
        let clamp = |v: i64| v.clamp(0, count as i64) as usize;
        let s = clamp(self.start[i]);
        let e = clamp(self.end[i]);
        if e <= s {
            s..s
        } else {
            s..e
        }
    }
}

/// How the rows of frame `i` relate to those of frame `i - 1`.
pub(crate) enum Step {
    Same,
    /// Same start, more rows at the end.
    Extend(Range<usize>),
    Fresh(Range<usize>),
}

/// Tracks consecutive frames so that reducers can reuse their state for
/// repeated and growing frames.
#[derive(Default)]
pub(crate) struct Walk {
    prev: Option<Range<usize>>,
}

impl Walk {
    pub(crate) fn step(&mut self, cur: Range<usize>) -> Step {
        let step = match &self.prev {
            Some(p) if *p == cur => Step::Same,
            Some(p) if p.start == cur.start && cur.end > p.end => Step::Extend(p.end..cur.end),
            _ => Step::Fresh(cur.clone()),
        };
        self.prev = Some(cur);
        step
    }
}

/// Row ranges of the partitions described by `markers` over `count` rows.
pub(crate) fn partitions(markers: Option<&[bool]>, count: usize) -> Result<Vec<Range<usize>>> {
    let mut out = Vec::new();
    if count == 0 {
        return Ok(out);
    }
    let Some(m) = markers else {
        out.push(0..count);
        return Ok(out);
    };
    if m.len() != count {
        return Err(Error::Length {
            expected: count,
            got: m.len(),
        });
    }
    let mut start = 0;
    for (i, &new) in m.iter().enumerate().skip(1) {
        if new {
            out.push(start..i);
            start = i;
        }
    }
    out.push(start..count);
    Ok(out)
}
