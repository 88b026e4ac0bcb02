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

//! Scalar type catalog: storage types, NIL sentinels, SQL type descriptors
//! and the accumulator promotion table.

use std::cmp::Ordering;
use std::fmt;

use sqlparser::ast::{DataType, ExactNumberInfo, Value as SqlValue};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Storage types
// ---------------------------------------------------------------------------

/// Physical storage type of a column or atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeId {
    Bit,
    Bte,
    Sht,
    Int,
    Lng,
    Hge,
    Oid,
    Flt,
    Dbl,
    Str,
}

/// Byte width of a storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Fixed(usize),
    /// Offset table plus heap.
    Variable,
}

/// Catalog entry for a storage type.
pub struct TypeInfo {
    pub id: TypeId,
    pub name: &'static str,
    pub width: Width,
    pub nil: Value,
    /// Total order over values of this type; NIL sorts first.
    pub compare: fn(&Value, &Value) -> Ordering,
}

pub const BIT_NIL: i8 = i8::MIN;
pub const OID_NIL: u64 = 1 << 63;
/// First heap byte of the NIL string.
pub const STR_NIL_BYTE: u8 = 0x80;

static TYPES: [TypeInfo; 10] = [
    TypeInfo { id: TypeId::Bit, name: "bit", width: Width::Fixed(1), nil: Value::Bit(BIT_NIL), compare: Value::total_cmp },
    TypeInfo { id: TypeId::Bte, name: "bte", width: Width::Fixed(1), nil: Value::Bte(i8::MIN), compare: Value::total_cmp },
    TypeInfo { id: TypeId::Sht, name: "sht", width: Width::Fixed(2), nil: Value::Sht(i16::MIN), compare: Value::total_cmp },
    TypeInfo { id: TypeId::Int, name: "int", width: Width::Fixed(4), nil: Value::Int(i32::MIN), compare: Value::total_cmp },
    TypeInfo { id: TypeId::Lng, name: "lng", width: Width::Fixed(8), nil: Value::Lng(i64::MIN), compare: Value::total_cmp },
    TypeInfo { id: TypeId::Hge, name: "hge", width: Width::Fixed(16), nil: Value::Hge(i128::MIN), compare: Value::total_cmp },
    TypeInfo { id: TypeId::Oid, name: "oid", width: Width::Fixed(8), nil: Value::Oid(OID_NIL), compare: Value::total_cmp },
    TypeInfo { id: TypeId::Flt, name: "flt", width: Width::Fixed(4), nil: Value::Flt(f32::NAN), compare: Value::total_cmp },
    TypeInfo { id: TypeId::Dbl, name: "dbl", width: Width::Fixed(8), nil: Value::Dbl(f64::NAN), compare: Value::total_cmp },
    TypeInfo { id: TypeId::Str, name: "str", width: Width::Variable, nil: Value::Str(None), compare: Value::total_cmp },
];

impl TypeId {
    pub fn info(self) -> &'static TypeInfo {
        &TYPES[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            TypeId::Bte | TypeId::Sht | TypeId::Int | TypeId::Lng | TypeId::Hge
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, TypeId::Flt | TypeId::Dbl)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integral() || self.is_float()
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Accumulator promotion
// ---------------------------------------------------------------------------

/// Input type -> accumulator types accepted by `sum` and `prod`.
const ACCUMULATORS: &[(TypeId, &[TypeId])] = &[
    (TypeId::Bte, &[TypeId::Bte, TypeId::Sht, TypeId::Int, TypeId::Lng, TypeId::Hge]),
    (TypeId::Sht, &[TypeId::Sht, TypeId::Int, TypeId::Lng, TypeId::Hge]),
    (TypeId::Int, &[TypeId::Int, TypeId::Lng, TypeId::Hge]),
    (TypeId::Lng, &[TypeId::Lng, TypeId::Hge]),
    (TypeId::Hge, &[TypeId::Hge]),
    (TypeId::Flt, &[TypeId::Flt, TypeId::Dbl]),
    (TypeId::Dbl, &[TypeId::Dbl]),
];

/// Whether `input` may be accumulated into `target`.
pub fn sum_target_allowed(input: TypeId, target: TypeId, have_hge: bool) -> bool {
    if target == TypeId::Hge && !have_hge {
        return false;
    }
    ACCUMULATORS
        .iter()
        .any(|(i, targets)| *i == input && targets.contains(&target))
}

/// Default widened accumulator: one step wider than the input, saturating at
/// the widest available integer.
pub fn accumulator_type(input: TypeId, have_hge: bool) -> Option<TypeId> {
    let (_, targets) = ACCUMULATORS.iter().find(|(i, _)| *i == input)?;
    let widest = if have_hge { TypeId::Hge } else { TypeId::Lng };
    targets
        .iter()
        .copied()
        .filter(|t| *t <= widest || t.is_float())
        .nth(1)
        .or_else(|| targets.first().copied().filter(|t| *t <= widest || t.is_float()))
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A single typed scalar. NIL is the type's sentinel (`Str(None)` for strings).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bit(i8),
    Bte(i8),
    Sht(i16),
    Int(i32),
    Lng(i64),
    Hge(i128),
    Oid(u64),
    Flt(f32),
    Dbl(f64),
    Str(Option<String>),
}

impl Value {
    pub fn nil(ty: TypeId) -> Value {
        ty.info().nil.clone()
    }

    pub fn bool(b: bool) -> Value {
        Value::Bit(b as i8)
    }

    pub fn str(s: &str) -> Value {
        Value::Str(Some(s.to_string()))
    }

    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Bit(_) => TypeId::Bit,
            Value::Bte(_) => TypeId::Bte,
            Value::Sht(_) => TypeId::Sht,
            Value::Int(_) => TypeId::Int,
            Value::Lng(_) => TypeId::Lng,
            Value::Hge(_) => TypeId::Hge,
            Value::Oid(_) => TypeId::Oid,
            Value::Flt(_) => TypeId::Flt,
            Value::Dbl(_) => TypeId::Dbl,
            Value::Str(_) => TypeId::Str,
        }
    }

    pub fn is_nil(&self) -> bool {
        match self {
            Value::Bit(v) | Value::Bte(v) => *v == i8::MIN,
            Value::Sht(v) => *v == i16::MIN,
            Value::Int(v) => *v == i32::MIN,
            Value::Lng(v) => *v == i64::MIN,
            Value::Hge(v) => *v == i128::MIN,
            Value::Oid(v) => *v == OID_NIL,
            Value::Flt(v) => v.is_nan(),
            Value::Dbl(v) => v.is_nan(),
            Value::Str(v) => v.is_none(),
        }
    }

    /// Integer payload widened to i128; `None` for NIL and non-integers.
    pub fn as_i128(&self) -> Option<i128> {
        if self.is_nil() {
            return None;
        }
        match self {
            Value::Bit(v) | Value::Bte(v) => Some(*v as i128),
            Value::Sht(v) => Some(*v as i128),
            Value::Int(v) => Some(*v as i128),
            Value::Lng(v) => Some(*v as i128),
            Value::Hge(v) => Some(*v),
            Value::Oid(v) => Some(*v as i128),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        if self.is_nil() {
            return None;
        }
        match self {
            Value::Flt(v) => Some(*v as f64),
            Value::Dbl(v) => Some(*v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Value::Bit(1))
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Flt(v) => *v == 0.0,
            Value::Dbl(v) => *v == 0.0,
            Value::Str(_) | Value::Bit(_) => false,
            _ => self.as_i128() == Some(0),
        }
    }

    /// NIL-aware equality: NIL equals NIL of the same type.
    pub fn same(&self, other: &Value) -> bool {
        self.type_id() == other.type_id() && self.total_cmp(other) == Ordering::Equal
    }

    /// Total order; NIL first, then values. Values of different types order
    /// by their type id.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self.is_nil(), other.is_nil()) {
            (true, true) => return self.type_id().cmp(&other.type_id()),
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        match (self, other) {
            (Value::Str(Some(a)), Value::Str(Some(b))) => a.cmp(b),
            (Value::Flt(a), Value::Flt(b)) => a.total_cmp(b),
            (Value::Dbl(a), Value::Dbl(b)) => a.total_cmp(b),
            (a, b) if a.type_id() == b.type_id() => a.as_i128().cmp(&b.as_i128()),
            (a, b) => a.type_id().cmp(&b.type_id()),
        }
    }

    /// Convert to another storage type; out-of-range integers overflow.
    pub fn cast(&self, to: TypeId) -> Result<Value> {
        if self.type_id() == to {
            return Ok(self.clone());
        }
        if self.is_nil() {
            return Ok(Value::nil(to));
        }
        let overflow = || Error::Overflow { op: "convert" };
        let v = match to {
            TypeId::Bit => Value::Bit((self.as_f64().ok_or_else(|| self.bad_cast(to))? != 0.0) as i8),
            TypeId::Str => Value::Str(Some(self.to_string())),
            TypeId::Flt => Value::Flt(self.numeric(to)? as f32),
            TypeId::Dbl => Value::Dbl(self.numeric(to)?),
            _ => {
                let i = match self {
                    Value::Flt(_) | Value::Dbl(_) => {
                        let f = self.numeric(to)?.round();
                        if !(i128::MIN as f64..=i128::MAX as f64).contains(&f) {
                            return Err(overflow());
                        }
                        f as i128
                    }
                    Value::Str(Some(s)) => s.trim().parse::<i128>().map_err(|_| self.bad_cast(to))?,
                    _ => self.as_i128().ok_or_else(|| self.bad_cast(to))?,
                };
                Value::from_i128(to, i).ok_or_else(overflow)?
            }
        };
        Ok(v)
    }

    /// Integer value of type `ty`, `None` when out of range or on the NIL
    /// sentinel.
    pub fn from_i128(ty: TypeId, v: i128) -> Option<Value> {
        let val = match ty {
            TypeId::Bte => Value::Bte(i8::try_from(v).ok()?),
            TypeId::Sht => Value::Sht(i16::try_from(v).ok()?),
            TypeId::Int => Value::Int(i32::try_from(v).ok()?),
            TypeId::Lng => Value::Lng(i64::try_from(v).ok()?),
            TypeId::Hge => Value::Hge(v),
            TypeId::Oid => Value::Oid(u64::try_from(v).ok()?),
            _ => return None,
        };
        (!val.is_nil()).then_some(val)
    }

    /// Translate a parsed SQL literal; `None` for `NULL`. Integer literals
    /// take the narrowest of `int`, `lng` and `hge` that holds them.
    pub fn from_sql(v: &SqlValue) -> Result<Option<Value>> {
        let val = match v {
            SqlValue::Null => return Ok(None),
            SqlValue::Boolean(b) => Value::bool(*b),
            SqlValue::Number(n, _) if n.contains(['.', 'e', 'E']) => Value::Dbl(
                n.parse()
                    .map_err(|_| Error::Parse(format!("invalid number: {n}")))?,
            ),
            SqlValue::Number(n, _) => {
                let i: i128 = n
                    .parse()
                    .map_err(|_| Error::Parse(format!("invalid number: {n}")))?;
                [TypeId::Int, TypeId::Lng, TypeId::Hge]
                    .into_iter()
                    .find_map(|ty| Value::from_i128(ty, i))
                    .ok_or(Error::Overflow { op: "literal" })?
            }
            SqlValue::SingleQuotedString(s)
            | SqlValue::NationalStringLiteral(s)
            | SqlValue::EscapedStringLiteral(s) => Value::str(s),
            other => return Err(Error::unsupported("literal", other)),
        };
        Ok(Some(val))
    }

    /// Arithmetic negation of a numeric value; NIL stays NIL.
    pub fn negate(&self) -> Result<Value> {
        if self.is_nil() {
            return Ok(self.clone());
        }
        let overflow = || Error::Overflow { op: "negate" };
        Ok(match self {
            Value::Flt(v) => Value::Flt(-v),
            Value::Dbl(v) => Value::Dbl(-v),
            Value::Bte(_) | Value::Sht(_) | Value::Int(_) | Value::Lng(_) | Value::Hge(_) => {
                let i = self.as_i128().ok_or_else(overflow)?;
                Value::from_i128(self.type_id(), -i).ok_or_else(overflow)?
            }
            other => return Err(Error::unsupported("negate", other.type_id())),
        })
    }

    fn numeric(&self, to: TypeId) -> Result<f64> {
        match self {
            Value::Str(Some(s)) => s.trim().parse::<f64>().map_err(|_| self.bad_cast(to)),
            _ => self.as_f64().ok_or_else(|| self.bad_cast(to)),
        }
    }

    fn bad_cast(&self, to: TypeId) -> Error {
        Error::TypeMismatch {
            left: self.type_id().to_string(),
            right: to.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            return f.write_str("NULL");
        }
        match self {
            Value::Bit(v) => f.write_str(if *v != 0 { "true" } else { "false" }),
            Value::Bte(v) => write!(f, "{v}"),
            Value::Sht(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Lng(v) => write!(f, "{v}"),
            Value::Hge(v) => write!(f, "{v}"),
            Value::Oid(v) => write!(f, "{v}@0"),
            Value::Flt(v) => write!(f, "{v}"),
            Value::Dbl(v) => write!(f, "{v}"),
            Value::Str(Some(s)) => f.write_str(s),
            Value::Str(None) => f.write_str("NULL"),
        }
    }
}

// ---------------------------------------------------------------------------
// SQL types
// ---------------------------------------------------------------------------

/// SQL-level type: a catalog name plus digits/scale over a storage type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlType {
    pub name: &'static str,
    pub local: TypeId,
    pub digits: u32,
    pub scale: u32,
}

/// Known SQL type names with their storage type and default digits.
const SQL_TYPES: &[(&str, TypeId, u32)] = &[
    ("boolean", TypeId::Bit, 1),
    ("tinyint", TypeId::Bte, 3),
    ("smallint", TypeId::Sht, 5),
    ("int", TypeId::Int, 9),
    ("bigint", TypeId::Lng, 19),
    ("hugeint", TypeId::Hge, 39),
    ("oid", TypeId::Oid, 63),
    ("real", TypeId::Flt, 24),
    ("double", TypeId::Dbl, 53),
    ("decimal", TypeId::Lng, 18),
    ("varchar", TypeId::Str, 0),
    ("clob", TypeId::Str, 0),
];

impl SqlType {
    /// Look up a SQL type by name. `decimal` picks its storage type from the
    /// number of digits.
    pub fn find(name: &str, digits: u32, scale: u32) -> Option<SqlType> {
        let lower = name.to_ascii_lowercase();
        let (name, local, default_digits) = SQL_TYPES.iter().find(|(n, _, _)| *n == lower)?;
        let digits = if digits == 0 { *default_digits } else { digits };
        let local = if *name == "decimal" {
            match digits {
                0..=2 => TypeId::Bte,
                3..=4 => TypeId::Sht,
                5..=9 => TypeId::Int,
                10..=18 => TypeId::Lng,
                19..=38 => TypeId::Hge,
                _ => return None,
            }
        } else {
            *local
        };
        Some(SqlType {
            name,
            local,
            digits,
            scale,
        })
    }

    /// Storage-level type with default digits, e.g. the type of `%TID%`.
    pub fn local(ty: TypeId) -> SqlType {
        let name = match ty {
            TypeId::Bit => "boolean",
            TypeId::Bte => "tinyint",
            TypeId::Sht => "smallint",
            TypeId::Int => "int",
            TypeId::Lng => "bigint",
            TypeId::Hge => "hugeint",
            TypeId::Oid => "oid",
            TypeId::Flt => "real",
            TypeId::Dbl => "double",
            TypeId::Str => "clob",
        };
        let (_, _, digits) = SQL_TYPES
            .iter()
            .find(|(n, _, _)| *n == name)
            .copied()
            .unwrap_or((name, ty, 0));
        SqlType {
            name,
            local: ty,
            digits,
            scale: 0,
        }
    }

    pub fn boolean() -> SqlType {
        SqlType::local(TypeId::Bit)
    }

    pub fn is_decimal(&self) -> bool {
        self.name == "decimal"
    }

    pub fn is_string(&self) -> bool {
        self.local == TypeId::Str
    }

    /// Common type of two set-operation inputs.
    pub fn supertype(a: &SqlType, b: &SqlType) -> Result<SqlType> {
        if a == b {
            return Ok(a.clone());
        }
        let mismatch = || Error::TypeMismatch {
            left: a.to_string(),
            right: b.to_string(),
        };
        if a.is_string() && b.is_string() {
            if a.name == "clob" || b.name == "clob" {
                return Ok(SqlType::local(TypeId::Str));
            }
            return SqlType::find("varchar", a.digits.max(b.digits), 0).ok_or_else(mismatch);
        }
        if !a.local.is_numeric() || !b.local.is_numeric() {
            return Err(mismatch());
        }
        if a.local.is_float() || b.local.is_float() {
            return Ok(SqlType::local(TypeId::Dbl));
        }
        if a.is_decimal() || b.is_decimal() {
            let scale = a.scale.max(b.scale);
            let int_digits = a.digits.saturating_sub(a.scale).max(b.digits.saturating_sub(b.scale));
            return SqlType::find("decimal", int_digits + scale, scale).ok_or_else(mismatch);
        }
        Ok(if a.local >= b.local { a.clone() } else { b.clone() })
    }

    /// Translate a parsed SQL data type.
    pub fn from_data_type(dt: &DataType) -> Result<SqlType> {
        let found = match dt {
            DataType::Boolean | DataType::Bool => SqlType::find("boolean", 0, 0),
            DataType::TinyInt(_) => SqlType::find("tinyint", 0, 0),
            DataType::SmallInt(_) | DataType::Int2(_) => SqlType::find("smallint", 0, 0),
            DataType::Int(_) | DataType::Integer(_) | DataType::Int4(_) => SqlType::find("int", 0, 0),
            DataType::BigInt(_) | DataType::Int8(_) | DataType::Int64 => SqlType::find("bigint", 0, 0),
            DataType::Real | DataType::Float4 => SqlType::find("real", 0, 0),
            DataType::Double | DataType::DoublePrecision | DataType::Float8 | DataType::Float64 => {
                SqlType::find("double", 0, 0)
            }
            DataType::Float(Some(p)) if *p <= 24 => SqlType::find("real", 0, 0),
            DataType::Float(_) => SqlType::find("double", 0, 0),
            DataType::Decimal(info) | DataType::Numeric(info) => match info {
                ExactNumberInfo::None => SqlType::find("decimal", 18, 3),
                ExactNumberInfo::Precision(p) => SqlType::find("decimal", *p as u32, 0),
                ExactNumberInfo::PrecisionAndScale(p, s) => {
                    SqlType::find("decimal", *p as u32, *s as u32)
                }
            },
            DataType::Varchar(len) | DataType::CharacterVarying(len) => {
                let digits = len
                    .as_ref()
                    .and_then(|l| match l {
                        sqlparser::ast::CharacterLength::IntegerLength { length, .. } => Some(*length as u32),
                        sqlparser::ast::CharacterLength::Max => None,
                    })
                    .unwrap_or(0);
                if digits == 0 {
                    SqlType::find("clob", 0, 0)
                } else {
                    SqlType::find("varchar", digits, 0)
                }
            }
            DataType::Text | DataType::String(_) | DataType::Clob(_) => SqlType::find("clob", 0, 0),
            _ => None,
        };
        found.ok_or_else(|| Error::unsupported("type", dt))
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            "decimal" => write!(f, "decimal({},{})", self.digits, self.scale),
            "varchar" => write!(f, "varchar({})", self.digits),
            name => f.write_str(name),
        }
    }
}
