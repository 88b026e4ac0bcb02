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

//! Per-query planning context.
//!
//! A [`Context`] owns everything a single statement builds: the expression
//! arena, the relation arena, the label counter used for generated names and
//! the diagnostic channel. Handles ([`ExprId`], [`RelId`]) are only
//! meaningful for the context that issued them.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{Diagnostic, Error, Result};
use crate::expr::{Expr, ExprId};
use crate::rel::{Rel, RelId};
use crate::types::Value;

struct Slot {
    generation: u32,
    node: Option<Rel>,
}

pub struct Context {
    config: Config,
    catalog: Arc<Catalog>,
    exprs: Vec<Expr>,
    rels: Vec<Slot>,
    free: Vec<u32>,
    label: u32,
    /// Bumped whenever an expression alias changes; name indexes built under
    /// an older epoch are rebuilt on their next lookup.
    epoch: u64,
    args: Vec<Value>,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("exprs", &self.exprs.len())
            .field("rels", &(self.rels.len() - self.free.len()))
            .field("label", &self.label)
            .finish()
    }
}

impl Context {
    pub fn new(catalog: Arc<Catalog>, config: Config) -> Self {
        Context {
            config,
            catalog,
            exprs: Vec::new(),
            rels: Vec::new(),
            free: Vec::new(),
            label: 0,
            epoch: 0,
            args: Vec::new(),
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    // -----------------------------------------------------------------------
    // Expression arena
    // -----------------------------------------------------------------------

    pub fn add_expr(&mut self, e: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(e);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    /// Mutable access to a node. Alias changes must go through the naming
    /// methods (`exp_setname` and friends) so that name indexes stay valid.
    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.0 as usize]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn renamed(&mut self) {
        self.epoch += 1;
    }

    // -----------------------------------------------------------------------
    // Relation arena
    // -----------------------------------------------------------------------

    pub fn alloc_rel(&mut self, rel: Rel) -> RelId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.rels[index as usize];
            slot.node = Some(rel);
            return RelId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.rels.len() as u32;
        self.rels.push(Slot {
            generation: 0,
            node: Some(rel),
        });
        RelId {
            index,
            generation: 0,
        }
    }

    /// The node behind `id`, or `None` when the handle is stale.
    pub fn try_rel(&self, id: RelId) -> Option<&Rel> {
        self.rels
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    /// Whether `id` still refers to a live node.
    pub fn is_live(&self, id: RelId) -> bool {
        self.try_rel(id).is_some()
    }

    /// The node behind `id`.
    ///
    /// # Panics
    ///
    /// Panics when the node was destroyed.
    pub fn rel(&self, id: RelId) -> &Rel {
        match self.try_rel(id) {
            Some(r) => r,
            None => panic!("stale relation handle {id:?}"),
        }
    }

    /// Mutable access to a live node.
    ///
    /// # Panics
    ///
    /// Panics when the node was destroyed.
    pub fn rel_mut(&mut self, id: RelId) -> &mut Rel {
        let slot = self
            .rels
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation);
        match slot.and_then(|s| s.node.as_mut()) {
            Some(r) => r,
            None => panic!("stale relation handle {id:?}"),
        }
    }

    /// Release a slot; outstanding handles to it become stale.
    pub(crate) fn free_rel(&mut self, id: RelId) -> Option<Rel> {
        let slot = self
            .rels
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(node)
    }

    /// Number of live relation nodes.
    pub fn live_rels(&self) -> usize {
        self.rels.len() - self.free.len()
    }

    // -----------------------------------------------------------------------
    // Labels, arguments, depth guard, diagnostics
    // -----------------------------------------------------------------------

    /// Advance the label counter and return the new label.
    pub fn next_label(&mut self) -> u32 {
        self.label += 1;
        self.label
    }

    pub fn label(&self) -> u32 {
        self.label
    }

    /// Bind positional argument values, used by atom references.
    pub fn set_args(&mut self, args: Vec<Value>) {
        self.args = args;
    }

    pub fn arg(&self, nr: usize) -> Option<&Value> {
        self.args.get(nr)
    }

    /// Fail with `TooComplex` once a traversal is deeper than allowed.
    #[inline]
    pub(crate) fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_depth {
            return Err(self.error(Error::TooComplex));
        }
        Ok(())
    }

    /// Record `err` on the diagnostic channel and hand it back for returning.
    pub(crate) fn error(&self, err: Error) -> Error {
        let diag = Diagnostic::from(&err);
        debug!(sqlstate = diag.sqlstate, message = %diag.message, "diagnostic");
        self.diagnostics.lock().push(diag);
        err
    }

    /// Drain the diagnostics recorded so far.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn context_is_send_and_sync() {
        assert_send_sync::<Context>();
    }

    #[test]
    fn depth_guard_records_diagnostic() {
        let cfg = Config {
            max_depth: 3,
            ..Config::default()
        };
        let ctx = Context::new(Arc::new(Catalog::new()), cfg);
        assert!(ctx.check_depth(3).is_ok());
        assert_eq!(ctx.check_depth(4), Err(Error::TooComplex));
        let diags = ctx.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].sqlstate, "42000");
        assert!(ctx.take_diagnostics().is_empty());
    }
}
