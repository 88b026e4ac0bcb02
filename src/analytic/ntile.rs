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
use crate::column::Column;
use crate::error::{Error, Result};
use crate::types::Value;

/// Split each partition into `n` buckets of near-equal size.
///
/// The result has `n`'s type. The first `s % n` buckets of a partition of
/// `s` rows get one extra row; when `n >= s` every row is its own bucket.
/// A NIL `n` yields an all-NIL column.
pub fn ntile(input: &Column, markers: Option<&[bool]>, n: &Value) -> Result<Column> {
    let count = input.len();
    let ty = n.type_id();
    trace!(rows = count, ty = %ty, "ntile");
    if !ty.is_integral() {
        return Err(Error::unsupported("ntile", ty));
    }
    let parts = partitions(markers, count)?;
    let mut out: Vec<Option<i128>> = Vec::new();
    out.try_reserve_exact(count)?;
    let Some(buckets) = n.as_i128() else {
        out.resize(count, None);
        return Column::from_i128s(ty, &out);
    };
    if buckets <= 0 {
        return Err(Error::InvalidArgument(
            "ntile: number of buckets must be positive".into(),
        ));
    }
    for p in parts {
        let size = p.len() as i128;
        if buckets >= size {
            out.extend((1..=size).map(Some));
            continue;
        }
        let base = size / buckets;
        let rem = size % buckets;
        let big = rem * (base + 1);
        for k in 0..size {
            let label = if k < big {
                k / (base + 1) + 1
            } else {
                rem + (k - big) / base + 1
            };
            out.push(Some(label));
        }
    }
    Column::from_i128s(ty, &out)
}
