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

//! Exact floating-point summation over non-overlapping partials
//! (Shewchuk's algorithm), rounded once at the end.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct Partials {
    parts: Vec<f64>,
    /// Sum of non-finite inputs.
    special: f64,
    overflow: bool,
}

impl Partials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.parts.clear();
        self.special = 0.0;
        self.overflow = false;
    }

    pub fn add(&mut self, v: f64) -> Result<()> {
        if !v.is_finite() {
            self.special += v;
            return Ok(());
        }
        let mut x = v;
        let mut kept = 0;
        for j in 0..self.parts.len() {
            let mut y = self.parts[j];
            if x.abs() < y.abs() {
                std::mem::swap(&mut x, &mut y);
            }
            let hi = x + y;
            let lo = y - (hi - x);
            if lo != 0.0 {
                self.parts[kept] = lo;
                kept += 1;
            }
            x = hi;
        }
        if !x.is_finite() {
            self.overflow = true;
            return Ok(());
        }
        self.parts.truncate(kept);
        self.parts.try_reserve(1)?;
        self.parts.push(x);
        Ok(())
    }

    /// Correctly rounded sum; a non-finite result is an overflow.
    pub fn sum(&self, op: &'static str) -> Result<f64> {
        if self.overflow || self.special != 0.0 {
            return Err(Error::Overflow { op });
        }
        let p = &self.parts;
        let mut n = p.len();
        if n == 0 {
            return Ok(0.0);
        }
        n -= 1;
        let mut hi = p[n];
        let mut lo = 0.0;
        while n > 0 {
            let x = hi;
            n -= 1;
            let y = p[n];
            hi = x + y;
            lo = y - (hi - x);
            if lo != 0.0 {
                break;
            }
        }
        // Half-way case: round towards the sign of the remaining partials.
        if n > 0 && ((lo < 0.0 && p[n - 1] < 0.0) || (lo > 0.0 && p[n - 1] > 0.0)) {
            let y = lo * 2.0;
            let x = hi + y;
            if y == x - hi {
                hi = x;
            }
        }
        if !hi.is_finite() {
            return Err(Error::Overflow { op });
        }
        Ok(hi)
    }
}
