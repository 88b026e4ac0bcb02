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

//! Error taxonomy shared by the kernel and the plan builder.

use thiserror::Error;

/// Errors produced by analytic kernels, expression algebra and plan builder.
///
/// Every variant maps to a SQLSTATE-like category through [`Error::sqlstate`]
/// so callers can forward it to a client unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A result container could not grow.
    #[error("could not allocate space")]
    OutOfMemory,

    /// An accumulator exceeded the range of its (widened) type.
    #[error("overflow in calculation in {op}")]
    Overflow { op: &'static str },

    /// The operation is not implemented for this scalar type or type pair.
    #[error("{op}: type {ty} not supported")]
    UnsupportedType { op: &'static str, ty: String },

    /// More than one binding with differing relation aliases.
    #[error("SELECT: identifier '{0}' ambiguous")]
    Ambiguous(String),

    /// A column, table or other named object does not exist.
    #[error("{what}: no such {kind} '{name}'")]
    NotFound {
        what: &'static str,
        kind: &'static str,
        name: String,
    },

    #[error("types {left} and {right} are not equal")]
    TypeMismatch { left: String, right: String },

    /// The recursion depth guard tripped.
    #[error("Query too complex: running out of stack space")]
    TooComplex,

    #[error("{0}")]
    InvalidArgument(String),

    /// Partition markers or frame bounds do not match the input length.
    #[error("length mismatch: expected {expected}, got {got}")]
    Length { expected: usize, got: usize },

    /// The statement is not permitted on the target object.
    #[error("{0}")]
    NotAllowed(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// SQLSTATE-like category of this error.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            Error::OutOfMemory => "HY001",
            Error::Overflow { .. } => "22003",
            Error::UnsupportedType { .. } => "42000",
            Error::Ambiguous(_) => "42000",
            Error::NotFound { kind: "table", .. } => "42S02",
            Error::NotFound { .. } => "42S22",
            Error::TypeMismatch { .. } => "42000",
            Error::TooComplex => "42000",
            Error::InvalidArgument(_) => "42000",
            Error::Length { .. } => "42000",
            Error::NotAllowed(_) => "42000",
            Error::Parse(_) => "42000",
            Error::Config(_) => "HY000",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Error::OutOfMemory => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    pub(crate) fn not_found(what: &'static str, kind: &'static str, name: &str) -> Self {
        Error::NotFound {
            what,
            kind,
            name: name.to_string(),
        }
    }

    pub(crate) fn unsupported(op: &'static str, ty: impl std::fmt::Display) -> Self {
        Error::UnsupportedType {
            op,
            ty: ty.to_string(),
        }
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<sqlparser::parser::ParserError> for Error {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        Error::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Severity attached to a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

/// Structured report recorded on a context's diagnostic channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub sqlstate: &'static str,
    pub message: String,
}

impl From<&Error> for Diagnostic {
    fn from(err: &Error) -> Self {
        Diagnostic {
            severity: err.severity(),
            sqlstate: err.sqlstate(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}!{}", self.sqlstate, self.message)
    }
}
