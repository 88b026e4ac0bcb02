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

//! Read-only catalog model: tables, functions and sequences the planner
//! binds against.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{SqlType, TypeId};

pub type ObjectId = u32;

/// Ids below this belong to built-in objects and are never reported as
/// dependencies.
pub const SYSTEM_OBJECT_LIMIT: ObjectId = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Table,
    View,
    /// Merge table without a partitioning scheme.
    Merge,
    RangePartition,
    ListPartition,
    Remote,
    Replica,
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Writable,
    ReadOnly,
    AppendOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Hash,
    /// Order-preserving hash over the leading column.
    OrderedHash,
    Join,
    NoIdx,
}

impl IndexKind {
    pub fn is_hash(self) -> bool {
        matches!(self, IndexKind::Hash | IndexKind::OrderedHash)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub id: ObjectId,
    pub name: String,
    pub ty: SqlType,
    pub nullable: bool,
    pub unique: bool,
    /// SQL literal text.
    pub default: Option<String>,
    pub colnr: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub id: ObjectId,
    pub name: String,
    pub kind: IndexKind,
    /// Column numbers, in key order.
    pub columns: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub id: ObjectId,
    pub schema: String,
    pub name: String,
    pub kind: TableKind,
    pub access: Access,
    pub temp: bool,
    /// Number of member tables of a merge or partitioned table.
    pub members: usize,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<Index>,
    /// Primary key column numbers.
    pub pkey: Vec<usize>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_by_nr(&self, colnr: usize) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.colnr == colnr)
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn is_view(&self) -> bool {
        self.kind == TableKind::View
    }

    pub fn is_partitioned(&self) -> bool {
        matches!(self.kind, TableKind::RangePartition | TableKind::ListPartition)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    Scalar,
    Aggr,
    Filter,
    Analytic,
    /// Table-producing function.
    Union,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub id: ObjectId,
    pub name: String,
    pub kind: FuncKind,
    /// Declared result types; empty means "type of the first argument".
    pub res: Vec<SqlType>,
    pub side_effect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub id: ObjectId,
    pub schema: String,
    pub name: String,
}

/// Tables, functions and sequences, keyed by id.
#[derive(Debug, Clone)]
pub struct Catalog {
    next_id: ObjectId,
    next_system_id: ObjectId,
    tables: Vec<Arc<Table>>,
    funcs: Vec<Arc<Func>>,
    sequences: Vec<Arc<Sequence>>,
    by_id: HashMap<ObjectId, Object>,
}

#[derive(Debug, Clone)]
enum Object {
    Table(usize),
    Func(usize),
    Sequence(usize),
    Column,
    Index,
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            next_id: SYSTEM_OBJECT_LIMIT,
            next_system_id: 1,
            tables: Vec::new(),
            funcs: Vec::new(),
            sequences: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// A catalog holding the functions the plan builder emits itself.
    pub fn with_builtins() -> Self {
        let lng = SqlType::local(TypeId::Lng);
        let mut cat = Catalog::new();
        let builtins: [(&str, FuncKind, Option<SqlType>, bool); 9] = [
            ("identity", FuncKind::Scalar, Some(SqlType::local(TypeId::Oid)), false),
            ("hash", FuncKind::Scalar, Some(lng.clone()), false),
            ("rotate_xor_hash", FuncKind::Scalar, Some(lng.clone()), false),
            ("left_shift", FuncKind::Scalar, Some(lng.clone()), false),
            ("bit_or", FuncKind::Scalar, Some(lng.clone()), false),
            ("sql_add", FuncKind::Scalar, None, false),
            ("sql_sub", FuncKind::Scalar, None, false),
            ("count", FuncKind::Aggr, Some(lng.clone()), false),
            ("next_value_for", FuncKind::Scalar, Some(lng), true),
        ];
        for (name, kind, res, side_effect) in builtins {
            let id = cat.next_system_id;
            cat.next_system_id += 1;
            cat.insert_func(Func {
                id,
                name: name.to_string(),
                kind,
                res: res.into_iter().collect(),
                side_effect,
            });
        }
        cat
    }

    fn next_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert_func(&mut self, f: Func) -> Arc<Func> {
        let f = Arc::new(f);
        self.by_id.insert(f.id, Object::Func(self.funcs.len()));
        self.funcs.push(f.clone());
        f
    }

    /// Register a user function and return it with its assigned id.
    pub fn create_func(
        &mut self,
        name: &str,
        kind: FuncKind,
        res: Vec<SqlType>,
        side_effect: bool,
    ) -> Arc<Func> {
        let id = self.next_id();
        self.insert_func(Func {
            id,
            name: name.to_string(),
            kind,
            res,
            side_effect,
        })
    }

    pub fn create_sequence(&mut self, schema: &str, name: &str) -> Arc<Sequence> {
        let seq = Arc::new(Sequence {
            id: self.next_id(),
            schema: schema.to_string(),
            name: name.to_string(),
        });
        self.by_id.insert(seq.id, Object::Sequence(self.sequences.len()));
        self.sequences.push(seq.clone());
        seq
    }

    pub fn func(&self, name: &str) -> Option<Arc<Func>> {
        self.funcs.iter().find(|f| f.name == name).cloned()
    }

    /// Look up a function that must exist.
    pub fn bind_func(&self, name: &str) -> Result<Arc<Func>> {
        self.func(name)
            .ok_or_else(|| Error::not_found("SELECT", "function", name))
    }

    pub fn table(&self, schema: &str, name: &str) -> Option<Arc<Table>> {
        self.tables
            .iter()
            .find(|t| t.schema == schema && t.name == name)
            .cloned()
    }

    pub fn sequence(&self, schema: &str, name: &str) -> Option<Arc<Sequence>> {
        self.sequences
            .iter()
            .find(|s| s.schema == schema && s.name == name)
            .cloned()
    }

    pub fn table_by_id(&self, id: ObjectId) -> Option<Arc<Table>> {
        match self.by_id.get(&id) {
            Some(Object::Table(i)) => Some(self.tables[*i].clone()),
            _ => None,
        }
    }

    pub fn func_by_id(&self, id: ObjectId) -> Option<Arc<Func>> {
        match self.by_id.get(&id) {
            Some(Object::Func(i)) => Some(self.funcs[*i].clone()),
            _ => None,
        }
    }

    pub fn sequence_by_id(&self, id: ObjectId) -> Option<Arc<Sequence>> {
        match self.by_id.get(&id) {
            Some(Object::Sequence(i)) => Some(self.sequences[*i].clone()),
            _ => None,
        }
    }

    /// Whether `id` names any catalog object, columns and indexes included.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.by_id.contains_key(&id)
    }
}

/// Builds a [`Table`] and registers it with a [`Catalog`].
///
/// ```
/// use relcore::catalog::{Catalog, TableBuilder};
/// use relcore::{SqlType, TypeId};
///
/// let mut cat = Catalog::with_builtins();
/// let t = TableBuilder::new("sys", "t")
///     .column("a", SqlType::local(TypeId::Int))
///     .column("b", SqlType::local(TypeId::Int))
///     .primary_key(&["a"])
///     .build(&mut cat)
///     .unwrap();
/// assert_eq!(t.columns.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct TableBuilder {
    schema: String,
    name: String,
    kind: TableKind,
    access: Access,
    temp: bool,
    members: usize,
    columns: Vec<(String, SqlType, bool, bool, Option<String>)>,
    pkey: Vec<String>,
    indexes: Vec<(String, IndexKind, Vec<String>)>,
}

impl TableBuilder {
    pub fn new(schema: &str, name: &str) -> Self {
        TableBuilder {
            schema: schema.to_string(),
            name: name.to_string(),
            kind: TableKind::Table,
            access: Access::Writable,
            temp: false,
            members: 0,
            columns: Vec::new(),
            pkey: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn kind(mut self, kind: TableKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn temp(mut self) -> Self {
        self.temp = true;
        self
    }

    pub fn members(mut self, n: usize) -> Self {
        self.members = n;
        self
    }

    pub fn column(mut self, name: &str, ty: SqlType) -> Self {
        self.columns.push((name.to_string(), ty, true, false, None));
        self
    }

    /// Mark the last added column NOT NULL.
    pub fn not_null(mut self) -> Self {
        if let Some(c) = self.columns.last_mut() {
            c.2 = false;
        }
        self
    }

    /// Mark the last added column UNIQUE.
    pub fn unique(mut self) -> Self {
        if let Some(c) = self.columns.last_mut() {
            c.3 = true;
        }
        self
    }

    /// Default of the last added column, as SQL literal text.
    pub fn default(mut self, sql: &str) -> Self {
        if let Some(c) = self.columns.last_mut() {
            c.4 = Some(sql.to_string());
        }
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.pkey = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn index(mut self, name: &str, kind: IndexKind, columns: &[&str]) -> Self {
        self.indexes.push((
            name.to_string(),
            kind,
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    pub fn build(self, cat: &mut Catalog) -> Result<Arc<Table>> {
        let colnr = |name: &str| {
            self.columns
                .iter()
                .position(|c| c.0 == name)
                .ok_or_else(|| Error::not_found("CREATE TABLE", "column", name))
        };
        let pkey = self
            .pkey
            .iter()
            .map(|c| colnr(c))
            .collect::<Result<Vec<_>>>()?;
        let mut index_cols = Vec::with_capacity(self.indexes.len());
        for (_, _, cols) in &self.indexes {
            index_cols.push(cols.iter().map(|c| colnr(c)).collect::<Result<Vec<_>>>()?);
        }

        let id = cat.next_id();
        let mut columns = Vec::with_capacity(self.columns.len());
        for (nr, (name, ty, nullable, unique, default)) in self.columns.into_iter().enumerate() {
            let cid = cat.next_id();
            cat.by_id.insert(cid, Object::Column);
            columns.push(ColumnDef {
                id: cid,
                name,
                ty,
                nullable: nullable && !pkey.contains(&nr),
                unique,
                default,
                colnr: nr,
            });
        }
        let mut indexes = Vec::with_capacity(self.indexes.len());
        for ((name, kind, _), cols) in self.indexes.into_iter().zip(index_cols) {
            let iid = cat.next_id();
            cat.by_id.insert(iid, Object::Index);
            indexes.push(Index {
                id: iid,
                name,
                kind,
                columns: cols,
            });
        }
        let table = Arc::new(Table {
            id,
            schema: self.schema,
            name: self.name,
            kind: self.kind,
            access: self.access,
            temp: self.temp,
            members: self.members,
            columns,
            indexes,
            pkey,
        });
        cat.by_id.insert(id, Object::Table(cat.tables.len()));
        cat.tables.push(table.clone());
        Ok(table)
    }
}
