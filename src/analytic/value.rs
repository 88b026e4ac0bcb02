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

//! Value-picking kernels: `first`, `last`, `nth_value`, `lag`, `lead`.
//!
//! Each computes one [`Pick`] per row and gathers the result from the input,
//! so every storage type shares one code path.

use tracing::trace;

use super::{partitions, Frames};
use crate::column::{Column, Pick};
use crate::error::{Error, Result};
use crate::types::Value;

/// The `n` argument of [`nth_value`].
#[derive(Debug, Clone, Copy)]
pub enum NthBound<'a> {
    /// One bound for all rows; `None` is NIL.
    Const(Option<i64>),
    /// One bound per row from an integer column.
    PerRow(&'a Column),
}

pub fn first(input: &Column, frames: Frames<'_>) -> Result<Column> {
    pick_frames(input, frames, "first", |r| {
        if r.is_empty() {
            Pick::Nil
        } else {
            Pick::Row(r.start)
        }
    })
}

pub fn last(input: &Column, frames: Frames<'_>) -> Result<Column> {
    pick_frames(input, frames, "last", |r| {
        if r.is_empty() {
            Pick::Nil
        } else {
            Pick::Row(r.end - 1)
        }
    })
}

/// The `n`-th (1-based) row of each frame; NIL when `n` is NIL, not
/// positive, or past the end of the frame.
pub fn nth_value(input: &Column, frames: Frames<'_>, n: NthBound<'_>) -> Result<Column> {
    let count = input.len();
    trace!(rows = count, ty = %input.type_id(), "nth_value");
    frames.check(count)?;
    let pick = |r: std::ops::Range<usize>, n: Option<i128>| match n {
        Some(n) if n > 0 && n - 1 < r.len() as i128 => Pick::Row(r.start + (n - 1) as usize),
        _ => Pick::Nil,
    };
    let mut picks = Vec::new();
    picks.try_reserve_exact(count)?;
    match n {
        NthBound::Const(n) => {
            let n = n.map(i128::from);
            picks.extend((0..count).map(|i| pick(frames.range(i, count), n)));
        }
        NthBound::PerRow(bounds) => {
            if !bounds.type_id().is_integral() {
                return Err(Error::unsupported("nth_value", bounds.type_id()));
            }
            if bounds.len() != count {
                return Err(Error::Length {
                    expected: count,
                    got: bounds.len(),
                });
            }
            picks.extend((0..count).map(|i| pick(frames.range(i, count), bounds.get(i).as_i128())));
        }
    }
    input.gather(&picks, &Value::nil(input.type_id()))
}

/// Shift each partition down by `offset` rows, filling the head with
/// `default`. `None` offset yields an all-NIL column.
pub fn lag(
    input: &Column,
    markers: Option<&[bool]>,
    offset: Option<usize>,
    default: &Value,
) -> Result<Column> {
    shift(input, markers, offset, default, "lag", |p, i, off| {
        if i - p.start < off {
            Pick::Default
        } else {
            Pick::Row(i - off)
        }
    })
}

/// Shift each partition up by `offset` rows, filling the tail with
/// `default`.
pub fn lead(
    input: &Column,
    markers: Option<&[bool]>,
    offset: Option<usize>,
    default: &Value,
) -> Result<Column> {
    shift(input, markers, offset, default, "lead", |p, i, off| {
        if p.end - i <= off {
            Pick::Default
        } else {
            Pick::Row(i + off)
        }
    })
}

fn shift(
    input: &Column,
    markers: Option<&[bool]>,
    offset: Option<usize>,
    default: &Value,
    op: &'static str,
    pick: impl Fn(&std::ops::Range<usize>, usize, usize) -> Pick,
) -> Result<Column> {
    let count = input.len();
    trace!(rows = count, ty = %input.type_id(), op, "shift");
    let parts = partitions(markers, count)?;
    let mut picks = Vec::new();
    picks.try_reserve_exact(count)?;
    match offset {
        None => picks.resize(count, Pick::Nil),
        Some(off) => {
            for p in &parts {
                picks.extend(p.clone().map(|i| pick(p, i, off)));
            }
        }
    }
    input.gather(&picks, default)
}

fn pick_frames(
    input: &Column,
    frames: Frames<'_>,
    op: &'static str,
    pick: impl Fn(std::ops::Range<usize>) -> Pick,
) -> Result<Column> {
    let count = input.len();
    trace!(rows = count, ty = %input.type_id(), op, "frame pick");
    frames.check(count)?;
    let mut picks = Vec::new();
    picks.try_reserve_exact(count)?;
    picks.extend((0..count).map(|i| pick(frames.range(i, count))));
    input.gather(&picks, &Value::nil(input.type_id()))
}
