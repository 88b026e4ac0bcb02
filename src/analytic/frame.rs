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

//! Window frame specifications and their per-row `[start, end)` bounds.

use sqlparser::ast::{Expr, UnaryOperator, Value as SqlValue, WindowFrameBound, WindowFrameUnits, WindowSpec};

use super::partitions;
use crate::error::{Error, Result};

/// Window frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Rows,
    Range,
}

/// Window frame bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(i64),
    CurrentRow,
    Following(i64),
    UnboundedFollowing,
}

impl FrameBound {
    /// Position relative to the current row (lower = earlier in the window).
    fn order(self) -> i64 {
        match self {
            FrameBound::UnboundedPreceding => i64::MIN,
            FrameBound::Preceding(n) => -n,
            FrameBound::CurrentRow => 0,
            FrameBound::Following(n) => n,
            FrameBound::UnboundedFollowing => i64::MAX,
        }
    }

    fn offset(self) -> Option<i64> {
        match self {
            FrameBound::Preceding(n) | FrameBound::Following(n) => Some(n),
            _ => None,
        }
    }
}

/// A validated frame clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpec {
    pub ty: FrameType,
    pub start: FrameBound,
    pub end: FrameBound,
}

impl FrameSpec {
    pub fn new(ty: FrameType, start: FrameBound, end: FrameBound) -> Result<Self> {
        for b in [start, end] {
            match b.offset() {
                Some(n) if n < 0 => {
                    return Err(Error::InvalidArgument(format!(
                        "window frame offset must not be negative: {n}"
                    )))
                }
                Some(_) if ty == FrameType::Range => {
                    return Err(Error::unsupported("window frame", "RANGE with offset"))
                }
                _ => {}
            }
        }
        if start.order() > end.order() {
            return Err(Error::InvalidArgument(
                "Window frame start must not be after frame end".into(),
            ));
        }
        Ok(FrameSpec { ty, start, end })
    }

    pub fn rows(start: FrameBound, end: FrameBound) -> Result<Self> {
        FrameSpec::new(FrameType::Rows, start, end)
    }

    /// Every row sees its whole partition.
    pub fn whole_partition() -> Self {
        FrameSpec {
            ty: FrameType::Range,
            start: FrameBound::UnboundedPreceding,
            end: FrameBound::UnboundedFollowing,
        }
    }

    /// Translate the frame clause of a parsed window specification. Without
    /// a clause the frame is the whole partition, or everything up to the
    /// current peer group when the window is ordered.
    pub fn from_sql(spec: &WindowSpec) -> Result<Self> {
        let Some(frame) = &spec.window_frame else {
            if spec.order_by.is_empty() {
                return Ok(FrameSpec::whole_partition());
            }
            return FrameSpec::new(
                FrameType::Range,
                FrameBound::UnboundedPreceding,
                FrameBound::CurrentRow,
            );
        };
        let ty = match frame.units {
            WindowFrameUnits::Rows => FrameType::Rows,
            WindowFrameUnits::Range => FrameType::Range,
            WindowFrameUnits::Groups => {
                return Err(Error::unsupported("window frame", "GROUPS"))
            }
        };
        let start = convert_bound(&frame.start_bound)?;
        let end = match &frame.end_bound {
            Some(b) => convert_bound(b)?,
            None => FrameBound::CurrentRow,
        };
        FrameSpec::new(ty, start, end)
    }

    /// Per-row bounds over `count` rows. `peers` marks the first row of each
    /// group of rows with equal ordering keys (see [`super::diff`]); without
    /// it a `Range` frame treats the whole partition as one peer group.
    pub fn bounds(
        &self,
        count: usize,
        markers: Option<&[bool]>,
        peers: Option<&[bool]>,
    ) -> Result<(Vec<i64>, Vec<i64>)> {
        if let Some(p) = peers {
            if p.len() != count {
                return Err(Error::Length {
                    expected: count,
                    got: p.len(),
                });
            }
        }
        let mut start = Vec::new();
        let mut end = Vec::new();
        start.try_reserve_exact(count)?;
        end.try_reserve_exact(count)?;
        for part in partitions(markers, count)? {
            let (ps, pe) = (part.start as i64, part.end as i64);
            let (mut peer_start, mut peer_end) = (ps, pe);
            for i in part.clone() {
                if let Some(p) = peers {
                    if i == part.start || p[i] {
                        peer_start = i as i64;
                        peer_end = (i + 1..part.end).find(|&j| p[j]).unwrap_or(part.end) as i64;
                    }
                }
                let row = i as i64;
                let (cur_start, cur_end) = match self.ty {
                    FrameType::Rows => (row, row + 1),
                    FrameType::Range if peers.is_some() => (peer_start, peer_end),
                    FrameType::Range => (ps, pe),
                };
                let s = match self.start {
                    FrameBound::UnboundedPreceding => ps,
                    FrameBound::Preceding(k) => row.saturating_sub(k).max(ps),
                    FrameBound::CurrentRow => cur_start,
                    FrameBound::Following(k) => row.saturating_add(k).min(pe),
                    FrameBound::UnboundedFollowing => pe,
                };
                let e = match self.end {
                    FrameBound::UnboundedPreceding => ps,
                    FrameBound::Preceding(k) => row.saturating_sub(k).saturating_add(1).max(ps),
                    FrameBound::CurrentRow => cur_end,
                    FrameBound::Following(k) => row.saturating_add(k).saturating_add(1).min(pe),
                    FrameBound::UnboundedFollowing => pe,
                };
                start.push(s);
                end.push(e);
            }
        }
        Ok((start, end))
    }
}

fn convert_bound(b: &WindowFrameBound) -> Result<FrameBound> {
    match b {
        WindowFrameBound::CurrentRow => Ok(FrameBound::CurrentRow),
        WindowFrameBound::Preceding(None) => Ok(FrameBound::UnboundedPreceding),
        WindowFrameBound::Following(None) => Ok(FrameBound::UnboundedFollowing),
        WindowFrameBound::Preceding(Some(expr)) => Ok(FrameBound::Preceding(parse_i64_literal(expr)?)),
        WindowFrameBound::Following(Some(expr)) => Ok(FrameBound::Following(parse_i64_literal(expr)?)),
    }
}

fn parse_i64_literal(expr: &Expr) -> Result<i64> {
    match expr {
        Expr::Value(SqlValue::Number(n, _)) => n
            .parse::<i64>()
            .map_err(|_| Error::InvalidArgument(format!("Expected integer literal, got: {n}"))),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => parse_i64_literal(expr).map(|n| -n),
        Expr::Nested(inner) => parse_i64_literal(inner),
        _ => Err(Error::InvalidArgument(format!(
            "Expected integer literal, got: {expr}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_sliding_window_respects_partitions() {
        let spec = FrameSpec::rows(FrameBound::Preceding(1), FrameBound::Following(1)).unwrap();
        let markers = [true, false, false, true, false];
        let (s, e) = spec.bounds(5, Some(&markers), None).unwrap();
        assert_eq!(s, vec![0, 0, 1, 3, 3]);
        assert_eq!(e, vec![2, 3, 3, 5, 5]);
    }

    #[test]
    fn range_current_row_covers_peers() {
        let spec = FrameSpec::new(
            FrameType::Range,
            FrameBound::UnboundedPreceding,
            FrameBound::CurrentRow,
        )
        .unwrap();
        let peers = [true, false, true, true, false];
        let (s, e) = spec.bounds(5, None, Some(&peers)).unwrap();
        assert_eq!(s, vec![0; 5]);
        assert_eq!(e, vec![2, 2, 3, 5, 5]);
    }

    #[test]
    fn start_after_end_is_rejected() {
        let err = FrameSpec::rows(FrameBound::Following(2), FrameBound::Preceding(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
