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

//! relcore: columnar window-function kernel and relational plan algebra.
//!
//! Two layers, bottom-up:
//!
//! * [`analytic`]: vectorized window/frame functions over dense typed
//!   columns with explicit NIL handling and optional partition markers.
//! * [`expr`] and [`rel`]: expression and relational plan trees allocated in
//!   a per-query [`Context`], with column binding, structural matching,
//!   predicate push-down and dependency extraction.

pub mod analytic;
pub mod catalog;
pub mod column;
pub mod config;
pub mod context;
pub mod error;
pub mod expr;
pub mod rel;
pub mod types;

pub use catalog::{Catalog, ObjectId};
pub use column::{Column, ColumnData, StrColumn};
pub use config::Config;
pub use context::Context;
pub use error::{Diagnostic, Error, Result, Severity};
pub use expr::{Card, CmpOp, ExpList, Expr, ExprId, ExprKind};
pub use rel::{Clause, DdlOp, JoinKind, ModifyOp, Rel, RelId, RelKind, SetOp, TableSource};
pub use types::{SqlType, TypeId, Value};
