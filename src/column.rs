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

//! Dense typed columns.
//!
//! Fixed-width types are plain vectors holding the type's NIL sentinel for
//! missing values. Strings use an offset table into a heap of NUL-terminated
//! entries; offset 0 always holds the NIL string (`0x80 0x00`).

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};
use crate::types::{TypeId, Value, OID_NIL, STR_NIL_BYTE};

// ---------------------------------------------------------------------------
// Scalar traits
// ---------------------------------------------------------------------------

/// Fixed-width element type with a NIL sentinel.
pub trait Scalar: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    const NIL: Self;

    fn is_nil(self) -> bool;

    /// Equality under which NIL equals NIL.
    fn nil_eq(self, other: Self) -> bool {
        match (self.is_nil(), other.is_nil()) {
            (true, true) => true,
            (false, false) => self == other,
            _ => false,
        }
    }

    /// Total order with NIL first.
    fn order(self, other: Self) -> Ordering;
}

/// Integer scalars usable as sum/prod/avg inputs and accumulators.
pub trait Integral: Scalar {
    fn to_i128(self) -> i128;

    /// `None` when `v` is out of range or lands on the NIL sentinel.
    fn from_i128(v: i128) -> Option<Self>;
}

pub trait Float: Scalar {
    const MAX: Self;

    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
}

macro_rules! signed_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const NIL: Self = <$t>::MIN;

            #[inline]
            fn is_nil(self) -> bool {
                self == <$t>::MIN
            }

            #[inline]
            fn order(self, other: Self) -> Ordering {
                self.cmp(&other)
            }
        }

        impl Integral for $t {
            #[inline]
            fn to_i128(self) -> i128 {
                self as i128
            }

            #[inline]
            fn from_i128(v: i128) -> Option<Self> {
                <$t>::try_from(v).ok().filter(|x| !x.is_nil())
            }
        }
    )*};
}

signed_scalar!(i8, i16, i32, i64, i128);

impl Scalar for u64 {
    const NIL: Self = OID_NIL;

    #[inline]
    fn is_nil(self) -> bool {
        self == OID_NIL
    }

    fn order(self, other: Self) -> Ordering {
        match (self.is_nil(), other.is_nil()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.cmp(&other),
        }
    }
}

macro_rules! float_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const NIL: Self = <$t>::NAN;

            #[inline]
            fn is_nil(self) -> bool {
                self.is_nan()
            }

            fn order(self, other: Self) -> Ordering {
                match (self.is_nil(), other.is_nil()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => self.total_cmp(&other),
                }
            }
        }

        impl Float for $t {
            const MAX: Self = <$t>::MAX;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $t
            }
        }
    )*};
}

float_scalar!(f32, f64);

// ---------------------------------------------------------------------------
// String storage
// ---------------------------------------------------------------------------

/// Offset table of a string column, narrowest width that addresses the heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offsets {
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

impl Offsets {
    fn len(&self) -> usize {
        match self {
            Offsets::U16(v) => v.len(),
            Offsets::U32(v) => v.len(),
            Offsets::U64(v) => v.len(),
        }
    }

    #[inline]
    fn get(&self, i: usize) -> usize {
        match self {
            Offsets::U16(v) => v[i] as usize,
            Offsets::U32(v) => v[i] as usize,
            Offsets::U64(v) => v[i] as usize,
        }
    }

    /// Byte width of one entry.
    pub fn width(&self) -> usize {
        match self {
            Offsets::U16(_) => 2,
            Offsets::U32(_) => 4,
            Offsets::U64(_) => 8,
        }
    }

    fn try_push(&mut self, off: usize) -> Result<()> {
        if let Offsets::U16(v) = self {
            if off > u16::MAX as usize {
                *self = Offsets::U32(widen(v)?);
            }
        }
        if let Offsets::U32(v) = self {
            if off > u32::MAX as usize {
                *self = Offsets::U64(widen(v)?);
            }
        }
        match self {
            Offsets::U16(v) => {
                v.try_reserve(1)?;
                v.push(off as u16);
            }
            Offsets::U32(v) => {
                v.try_reserve(1)?;
                v.push(off as u32);
            }
            Offsets::U64(v) => {
                v.try_reserve(1)?;
                v.push(off as u64);
            }
        }
        Ok(())
    }
}

fn widen<S: Copy, D: From<S>>(src: &[S]) -> Result<Vec<D>> {
    let mut out = Vec::new();
    out.try_reserve_exact(src.len() + 1)?;
    out.extend(src.iter().map(|&x| D::from(x)));
    Ok(out)
}

/// Variable-width string column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrColumn {
    heap: Vec<u8>,
    offsets: Offsets,
}

impl Default for StrColumn {
    fn default() -> Self {
        StrColumn::new()
    }
}

impl StrColumn {
    pub fn new() -> Self {
        StrColumn {
            heap: vec![STR_NIL_BYTE, 0],
            offsets: Offsets::U16(Vec::new()),
        }
    }

    pub fn from_strs<'a, I>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut col = StrColumn::new();
        for s in items {
            col.try_push(s)?;
        }
        Ok(col)
    }

    /// Append a row. Content after an embedded NUL is not retrievable.
    pub fn try_push(&mut self, s: Option<&str>) -> Result<()> {
        let off = match s {
            None => 0,
            Some(s) => {
                let off = self.heap.len();
                self.heap.try_reserve(s.len() + 1)?;
                self.heap.extend_from_slice(s.as_bytes());
                self.heap.push(0);
                off
            }
        };
        self.offsets.try_push(off)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn heap(&self) -> &[u8] {
        &self.heap
    }

    pub fn offsets(&self) -> &Offsets {
        &self.offsets
    }

    #[inline]
    pub fn offset(&self, i: usize) -> usize {
        self.offsets.get(i)
    }

    /// `None` for NIL rows.
    pub fn get(&self, i: usize) -> Option<&str> {
        let off = self.offset(i);
        let bytes = &self.heap[off..];
        if bytes.first() == Some(&STR_NIL_BYTE) {
            return None;
        }
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        // Heap entries are copied from &str, so they are valid UTF-8.
        std::str::from_utf8(&bytes[..end]).ok()
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Bit(Vec<i8>),
    Bte(Vec<i8>),
    Sht(Vec<i16>),
    Int(Vec<i32>),
    Lng(Vec<i64>),
    Hge(Vec<i128>),
    Oid(Vec<u64>),
    Flt(Vec<f32>),
    Dbl(Vec<f64>),
    Str(StrColumn),
}

/// Dense typed column with NIL-presence flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    data: ColumnData,
    nonil: bool,
    nil: bool,
}

/// Source of one output row in [`Column::gather`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    Row(usize),
    Nil,
    Default,
}

/// Run `$body` with `$c` bound to the column's cells, monomorphized per
/// storage type.
macro_rules! dispatch_cells {
    ($data:expr, $c:ident => $body:expr) => {
        match $data {
            $crate::column::ColumnData::Bit(v) | $crate::column::ColumnData::Bte(v) => {
                let $c = v.as_slice();
                $body
            }
            $crate::column::ColumnData::Sht(v) => {
                let $c = v.as_slice();
                $body
            }
            $crate::column::ColumnData::Int(v) => {
                let $c = v.as_slice();
                $body
            }
            $crate::column::ColumnData::Lng(v) => {
                let $c = v.as_slice();
                $body
            }
            $crate::column::ColumnData::Hge(v) => {
                let $c = v.as_slice();
                $body
            }
            $crate::column::ColumnData::Oid(v) => {
                let $c = v.as_slice();
                $body
            }
            $crate::column::ColumnData::Flt(v) => {
                let $c = v.as_slice();
                $body
            }
            $crate::column::ColumnData::Dbl(v) => {
                let $c = v.as_slice();
                $body
            }
            $crate::column::ColumnData::Str(s) => {
                let $c = s;
                $body
            }
        }
    };
}

pub(crate) use dispatch_cells;

impl ColumnData {
    pub fn type_id(&self) -> TypeId {
        match self {
            ColumnData::Bit(_) => TypeId::Bit,
            ColumnData::Bte(_) => TypeId::Bte,
            ColumnData::Sht(_) => TypeId::Sht,
            ColumnData::Int(_) => TypeId::Int,
            ColumnData::Lng(_) => TypeId::Lng,
            ColumnData::Hge(_) => TypeId::Hge,
            ColumnData::Oid(_) => TypeId::Oid,
            ColumnData::Flt(_) => TypeId::Flt,
            ColumnData::Dbl(_) => TypeId::Dbl,
            ColumnData::Str(_) => TypeId::Str,
        }
    }

    pub fn len(&self) -> usize {
        dispatch_cells!(self, c => Cells::len(c))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Column {
    /// Wrap storage, scanning it once for NILs.
    pub fn new(data: ColumnData) -> Self {
        let nil = dispatch_cells!(&data, c => (0..Cells::len(c)).any(|i| c.is_nil(i)));
        Column {
            data,
            nonil: !nil,
            nil,
        }
    }

    pub fn bits(values: &[bool]) -> Self {
        Column::new(ColumnData::Bit(values.iter().map(|&b| b as i8).collect()))
    }

    pub fn strs<'a, I>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        Ok(Column::new(ColumnData::Str(StrColumn::from_strs(items)?)))
    }

    /// Build a column of type `ty` from values of that type (or NIL).
    pub fn from_values(ty: TypeId, values: &[Value]) -> Result<Self> {
        macro_rules! fixed {
            ($variant:ident, $t:ty) => {{
                let mut out: Vec<$t> = Vec::new();
                out.try_reserve_exact(values.len())?;
                for v in values {
                    out.push(match v {
                        Value::$variant(x) => *x,
                        v if v.is_nil() => <$t as Scalar>::NIL,
                        v => return Err(mismatch(v.type_id(), ty)),
                    });
                }
                ColumnData::$variant(out)
            }};
        }
        let data = match ty {
            TypeId::Bit => fixed!(Bit, i8),
            TypeId::Bte => fixed!(Bte, i8),
            TypeId::Sht => fixed!(Sht, i16),
            TypeId::Int => fixed!(Int, i32),
            TypeId::Lng => fixed!(Lng, i64),
            TypeId::Hge => fixed!(Hge, i128),
            TypeId::Oid => fixed!(Oid, u64),
            TypeId::Flt => fixed!(Flt, f32),
            TypeId::Dbl => fixed!(Dbl, f64),
            TypeId::Str => {
                let mut col = StrColumn::new();
                for v in values {
                    match v {
                        Value::Str(s) => col.try_push(s.as_deref())?,
                        v if v.is_nil() => col.try_push(None)?,
                        v => return Err(mismatch(v.type_id(), ty)),
                    }
                }
                ColumnData::Str(col)
            }
        };
        Ok(Column::new(data))
    }

    /// Integer column of type `ty`; `None` entries become NIL.
    pub fn from_i128s(ty: TypeId, values: &[Option<i128>]) -> Result<Self> {
        fn fill<T: Integral>(values: &[Option<i128>], op: &'static str) -> Result<Vec<T>> {
            let mut out = Vec::new();
            out.try_reserve_exact(values.len())?;
            for v in values {
                out.push(match v {
                    None => T::NIL,
                    Some(x) => T::from_i128(*x).ok_or(Error::Overflow { op })?,
                });
            }
            Ok(out)
        }
        let op = "column";
        let data = match ty {
            TypeId::Bte => ColumnData::Bte(fill(values, op)?),
            TypeId::Sht => ColumnData::Sht(fill(values, op)?),
            TypeId::Int => ColumnData::Int(fill(values, op)?),
            TypeId::Lng => ColumnData::Lng(fill(values, op)?),
            TypeId::Hge => ColumnData::Hge(fill(values, op)?),
            other => return Err(Error::unsupported("column", other)),
        };
        Ok(Column::new(data))
    }

    /// Float column of type `ty`; `None` entries become NIL.
    pub fn from_f64s(ty: TypeId, values: &[Option<f64>]) -> Result<Self> {
        fn fill<T: Float>(values: &[Option<f64>]) -> Result<Vec<T>> {
            let mut out = Vec::new();
            out.try_reserve_exact(values.len())?;
            out.extend(values.iter().map(|v| v.map_or(T::NIL, T::from_f64)));
            Ok(out)
        }
        let data = match ty {
            TypeId::Flt => ColumnData::Flt(fill(values)?),
            TypeId::Dbl => ColumnData::Dbl(fill(values)?),
            other => return Err(Error::unsupported("column", other)),
        };
        Ok(Column::new(data))
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn into_data(self) -> ColumnData {
        self.data
    }

    pub fn type_id(&self) -> TypeId {
        self.data.type_id()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when no element is NIL.
    pub fn nonil(&self) -> bool {
        self.nonil
    }

    pub fn has_nil(&self) -> bool {
        self.nil
    }

    pub fn is_nil(&self, i: usize) -> bool {
        dispatch_cells!(&self.data, c => c.is_nil(i))
    }

    pub fn get(&self, i: usize) -> Value {
        match &self.data {
            ColumnData::Bit(v) => Value::Bit(v[i]),
            ColumnData::Bte(v) => Value::Bte(v[i]),
            ColumnData::Sht(v) => Value::Sht(v[i]),
            ColumnData::Int(v) => Value::Int(v[i]),
            ColumnData::Lng(v) => Value::Lng(v[i]),
            ColumnData::Hge(v) => Value::Hge(v[i]),
            ColumnData::Oid(v) => Value::Oid(v[i]),
            ColumnData::Flt(v) => Value::Flt(v[i]),
            ColumnData::Dbl(v) => Value::Dbl(v[i]),
            ColumnData::Str(s) => Value::Str(s.get(i).map(str::to_string)),
        }
    }

    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// Build a column of this type where each row is copied from `self`,
    /// set to NIL, or set to `default` (which must be NIL or of this type).
    pub fn gather(&self, picks: &[Pick], default: &Value) -> Result<Column> {
        let ty = self.type_id();
        macro_rules! fixed {
            ($variant:ident, $t:ty, $v:expr) => {{
                let d = match default {
                    Value::$variant(d) => *d,
                    d if d.is_nil() => <$t as Scalar>::NIL,
                    d => return Err(mismatch(d.type_id(), ty)),
                };
                ColumnData::$variant(gather_fixed($v, picks, d)?)
            }};
        }
        let data = match &self.data {
            ColumnData::Bit(v) => fixed!(Bit, i8, v),
            ColumnData::Bte(v) => fixed!(Bte, i8, v),
            ColumnData::Sht(v) => fixed!(Sht, i16, v),
            ColumnData::Int(v) => fixed!(Int, i32, v),
            ColumnData::Lng(v) => fixed!(Lng, i64, v),
            ColumnData::Hge(v) => fixed!(Hge, i128, v),
            ColumnData::Oid(v) => fixed!(Oid, u64, v),
            ColumnData::Flt(v) => fixed!(Flt, f32, v),
            ColumnData::Dbl(v) => fixed!(Dbl, f64, v),
            ColumnData::Str(s) => {
                let d = match default {
                    Value::Str(d) => d.as_deref(),
                    d if d.is_nil() => None,
                    d => return Err(mismatch(d.type_id(), ty)),
                };
                let mut out = StrColumn::new();
                for pick in picks {
                    match pick {
                        Pick::Row(i) => out.try_push(s.get(*i))?,
                        Pick::Nil => out.try_push(None)?,
                        Pick::Default => out.try_push(d)?,
                    }
                }
                ColumnData::Str(out)
            }
        };
        Ok(Column::new(data))
    }
}

fn gather_fixed<T: Scalar>(src: &[T], picks: &[Pick], default: T) -> Result<Vec<T>> {
    let mut out = Vec::new();
    out.try_reserve_exact(picks.len())?;
    out.extend(picks.iter().map(|p| match p {
        Pick::Row(i) => src[*i],
        Pick::Nil => T::NIL,
        Pick::Default => default,
    }));
    Ok(out)
}

fn mismatch(got: TypeId, want: TypeId) -> Error {
    Error::TypeMismatch {
        left: got.to_string(),
        right: want.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// Row-level access shared by fixed and variable-width storage.
pub trait Cells {
    fn len(&self) -> usize;
    fn is_nil(&self, i: usize) -> bool;
    /// NIL-aware equality of rows `i` and `j`.
    fn same(&self, i: usize, j: usize) -> bool;
    /// Total order of rows `i` and `j`, NIL first.
    fn order(&self, i: usize, j: usize) -> Ordering;
}

impl<T: Scalar> Cells for [T] {
    #[inline]
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    #[inline]
    fn is_nil(&self, i: usize) -> bool {
        self[i].is_nil()
    }

    #[inline]
    fn same(&self, i: usize, j: usize) -> bool {
        self[i].nil_eq(self[j])
    }

    #[inline]
    fn order(&self, i: usize, j: usize) -> Ordering {
        self[i].order(self[j])
    }
}

impl Cells for StrColumn {
    fn len(&self) -> usize {
        StrColumn::len(self)
    }

    #[inline]
    fn is_nil(&self, i: usize) -> bool {
        self.heap[self.offset(i)] == STR_NIL_BYTE
    }

    fn same(&self, i: usize, j: usize) -> bool {
        self.offset(i) == self.offset(j) || self.get(i) == self.get(j)
    }

    fn order(&self, i: usize, j: usize) -> Ordering {
        self.get(i).cmp(&self.get(j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_widen_past_u16() {
        let long = "x".repeat(40_000);
        let col = StrColumn::from_strs([Some(long.as_str()), Some(long.as_str()), None]).unwrap();
        assert_eq!(col.offsets().width(), 4);
        assert_eq!(col.get(1).map(str::len), Some(40_000));
        assert_eq!(col.get(2), None);
    }

    #[test]
    fn nil_flags_follow_content() {
        let c = Column::new(ColumnData::Int(vec![1, i32::MIN, 3]));
        assert!(c.has_nil());
        assert!(!c.nonil());
        let c = Column::new(ColumnData::Dbl(vec![1.0, 2.0]));
        assert!(c.nonil());
    }

    #[test]
    fn gather_rejects_foreign_default() {
        let c = Column::new(ColumnData::Int(vec![1, 2]));
        let err = c.gather(&[Pick::Default], &Value::Lng(7)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }
}
