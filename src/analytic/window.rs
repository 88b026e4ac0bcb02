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

//! One-call window evaluation: a kernel operation plus its parameters,
//! applied over a column, partition markers and a frame clause.

use sqlparser::ast::{
    Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, UnaryOperator,
};

use super::{
    avg, count, first, frame::FrameSpec, lag, last, lead, max, min, ntile, nth_value, prod,
    sum, Frames, NthBound,
};
use crate::column::Column;
use crate::error::{Error, Result};
use crate::types::{accumulator_type, sum_target_allowed, TypeId, Value};

/// Window function variants.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowFunc {
    Ntile(Value),
    FirstValue,
    LastValue,
    NthValue(Option<i64>),
    /// `default: None` fills with NIL.
    Lag {
        offset: Option<usize>,
        default: Option<Value>,
    },
    Lead {
        offset: Option<usize>,
        default: Option<Value>,
    },
    Min,
    Max,
    Count {
        ignore_nils: bool,
    },
    /// Accumulator type; `None` widens by one step.
    Sum(Option<TypeId>),
    Prod(Option<TypeId>),
    Avg,
}

impl WindowFunc {
    pub fn name(&self) -> &'static str {
        match self {
            WindowFunc::Ntile(_) => "ntile",
            WindowFunc::FirstValue => "first_value",
            WindowFunc::LastValue => "last_value",
            WindowFunc::NthValue(_) => "nth_value",
            WindowFunc::Lag { .. } => "lag",
            WindowFunc::Lead { .. } => "lead",
            WindowFunc::Min => "min",
            WindowFunc::Max => "max",
            WindowFunc::Count { .. } => "count",
            WindowFunc::Sum(_) => "sum",
            WindowFunc::Prod(_) => "prod",
            WindowFunc::Avg => "avg",
        }
    }

    /// Evaluate over `input`. `ntile`, `lag` and `lead` work on partitions
    /// and ignore `frame`.
    pub fn evaluate(
        &self,
        input: &Column,
        markers: Option<&[bool]>,
        peers: Option<&[bool]>,
        frame: &FrameSpec,
        have_hge: bool,
    ) -> Result<Column> {
        let nil = || Value::nil(input.type_id());
        let framed = |f: &dyn Fn(Frames<'_>) -> Result<Column>| -> Result<Column> {
            let (start, end) = frame.bounds(input.len(), markers, peers)?;
            f(Frames::new(&start, &end)?)
        };
        match self {
            WindowFunc::Ntile(n) => ntile(input, markers, n),
            WindowFunc::Lag { offset, default } => {
                lag(input, markers, *offset, &default.clone().unwrap_or_else(nil))
            }
            WindowFunc::Lead { offset, default } => {
                lead(input, markers, *offset, &default.clone().unwrap_or_else(nil))
            }
            WindowFunc::FirstValue => framed(&|fr| first(input, fr)),
            WindowFunc::LastValue => framed(&|fr| last(input, fr)),
            WindowFunc::NthValue(n) => framed(&|fr| nth_value(input, fr, NthBound::Const(*n))),
            WindowFunc::Min => framed(&|fr| min(input, fr)),
            WindowFunc::Max => framed(&|fr| max(input, fr)),
            WindowFunc::Count { ignore_nils } => framed(&|fr| count(input, fr, *ignore_nils)),
            WindowFunc::Sum(t) => {
                let target = self.target(input.type_id(), *t, have_hge)?;
                framed(&|fr| sum(input, fr, target, have_hge))
            }
            WindowFunc::Prod(t) => {
                let target = self.target(input.type_id(), *t, have_hge)?;
                framed(&|fr| prod(input, fr, target, have_hge))
            }
            WindowFunc::Avg => framed(&|fr| avg(input, fr)),
        }
    }

    fn target(&self, input: TypeId, explicit: Option<TypeId>, have_hge: bool) -> Result<TypeId> {
        let target = match explicit {
            Some(t) => t,
            None => accumulator_type(input, have_hge)
                .ok_or_else(|| Error::unsupported(self.name(), input))?,
        };
        if !sum_target_allowed(input, target, have_hge) {
            return Err(Error::unsupported(self.name(), format!("{input}->{target}")));
        }
        Ok(target)
    }

    /// Map a parsed window function call to a kernel operation.
    pub fn from_sql(func: &Function) -> Result<WindowFunc> {
        let name = func.name.to_string().to_lowercase();
        let (args, star) = call_args(func);
        let arg = |i: usize| args.get(i).copied();
        let wf = match name.as_str() {
            "ntile" => {
                let [n] = args[..] else {
                    return Err(Error::InvalidArgument("NTILE requires exactly 1 argument".into()));
                };
                WindowFunc::Ntile(literal(n)?.unwrap_or(Value::nil(TypeId::Int)))
            }
            "first_value" => WindowFunc::FirstValue,
            "last_value" => WindowFunc::LastValue,
            "nth_value" => {
                let [_, n] = args[..] else {
                    return Err(Error::InvalidArgument(
                        "NTH_VALUE requires exactly 2 arguments".into(),
                    ));
                };
                let n = match literal(n)?.and_then(|v| v.as_i128()) {
                    None => None,
                    Some(v) => Some(i64::try_from(v).map_err(|_| {
                        Error::InvalidArgument(format!("invalid nth_value position: {v}"))
                    })?),
                };
                WindowFunc::NthValue(n)
            }
            "lag" | "lead" => {
                let offset = match arg(1) {
                    None => Some(1),
                    Some(e) => match literal(e)? {
                        None => None,
                        Some(v) => Some(
                            v.as_i128()
                                .and_then(|o| usize::try_from(o).ok())
                                .ok_or_else(|| {
                                    Error::InvalidArgument(format!("invalid {name} offset: {v}"))
                                })?,
                        ),
                    },
                };
                let default = match arg(2) {
                    Some(e) => literal(e)?,
                    None => None,
                };
                if name == "lag" {
                    WindowFunc::Lag { offset, default }
                } else {
                    WindowFunc::Lead { offset, default }
                }
            }
            "min" => WindowFunc::Min,
            "max" => WindowFunc::Max,
            "count" => WindowFunc::Count { ignore_nils: !star },
            "sum" => WindowFunc::Sum(None),
            "prod" => WindowFunc::Prod(None),
            "avg" => WindowFunc::Avg,
            _ => {
                return Err(Error::not_found("SELECT", "window function", &name));
            }
        };
        Ok(wf)
    }
}

/// Positional argument expressions and whether the call was `f(*)`.
fn call_args(func: &Function) -> (Vec<&Expr>, bool) {
    let mut exprs = Vec::new();
    let mut star = false;
    if let FunctionArguments::List(list) = &func.args {
        for a in &list.args {
            match a {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => exprs.push(e),
                FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => star = true,
                _ => {}
            }
        }
    }
    (exprs, star)
}

/// A literal, possibly negated or parenthesized; `None` for `NULL`.
pub(crate) fn literal(expr: &Expr) -> Result<Option<Value>> {
    match expr {
        Expr::Value(v) => Value::from_sql(v),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => literal(expr)?.map(|v| v.negate()).transpose(),
        Expr::Nested(inner) => literal(inner),
        other => Err(Error::InvalidArgument(format!(
            "Expected literal, got: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;

    use super::*;
    use crate::analytic::FrameBound;

    fn call(sql: &str) -> Function {
        let expr = Parser::new(&GenericDialect {})
            .try_with_sql(sql)
            .and_then(|mut p| p.parse_expr())
            .unwrap();
        match expr {
            Expr::Function(f) => f,
            other => panic!("expected a call, got {other}"),
        }
    }

    #[test]
    fn nth_value_position_fits_i64() {
        let wf = WindowFunc::from_sql(&call("nth_value(x, 3)")).unwrap();
        assert_eq!(wf, WindowFunc::NthValue(Some(3)));

        let err = WindowFunc::from_sql(&call("nth_value(x, 18446744073709551617)")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn partition_functions_ignore_the_frame() {
        let col = Column::from_i128s(TypeId::Int, &[Some(1), Some(2), Some(3)]).unwrap();
        let frame = FrameSpec::rows(FrameBound::CurrentRow, FrameBound::CurrentRow).unwrap();
        let lag = WindowFunc::from_sql(&call("lag(x)")).unwrap();
        let out = lag.evaluate(&col, None, None, &frame, true).unwrap();
        let vals: Vec<_> = out.values().iter().map(Value::as_i128).collect();
        assert_eq!(vals, vec![None, Some(1), Some(2)]);

        let sum = WindowFunc::Sum(None);
        let out = sum.evaluate(&col, None, None, &frame, true).unwrap();
        let vals: Vec<_> = out.values().iter().map(Value::as_i128).collect();
        assert_eq!(vals, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn hugeint_target_follows_configuration() {
        let col = Column::from_i128s(TypeId::Lng, &[Some(1)]).unwrap();
        let frame = FrameSpec::rows(FrameBound::UnboundedPreceding, FrameBound::CurrentRow).unwrap();
        let wf = WindowFunc::Sum(Some(TypeId::Hge));
        assert!(wf.evaluate(&col, None, None, &frame, true).is_ok());
        let err = wf.evaluate(&col, None, None, &frame, false).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { .. }));

        let (start, end) = frame.bounds(1, None, None).unwrap();
        let frames = Frames::new(&start, &end).unwrap();
        assert!(sum(&col, frames, TypeId::Hge, false).is_err());
        assert!(sum(&col, frames, TypeId::Hge, true).is_ok());
    }
}
