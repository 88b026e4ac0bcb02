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

use tracing::debug;

use crate::context::Context;
use crate::error::Result;
use crate::expr::{Card, ExpList};

use super::{RelId, RelKind, SetOp};

impl Context {
    /// Combine the two branches of a disjunction over `rel`.
    ///
    /// With `l == r` and explicit lists the branches become one
    /// or-expression appended to `oexps`. Two unshared selects directly over
    /// `rel` are merged into one select, absorbing the selects below it.
    /// Anything else becomes a distinct union of both branches.
    ///
    /// When both branches filter `rel`, each must hold its own reference to
    /// it.
    pub fn rel_or(
        &mut self,
        rel: Option<RelId>,
        l: RelId,
        r: RelId,
        oexps: Option<ExpList>,
        lexps: Option<ExpList>,
        rexps: Option<ExpList>,
    ) -> Result<RelId> {
        if let (true, Some(lexps)) = (l == r, lexps) {
            let e = self.exp_or(lexps, rexps.unwrap_or_default(), false);
            let mut nl = oexps.unwrap_or_default();
            if self.rel_is_ref(r) {
                self.rel_destroy(r);
            }
            nl.push(e);
            let x = self.rel(l);
            let l = if x.kind.is_outer_join() && x.processed {
                self.rel_select(Some(l), None)?
            } else {
                l
            };
            self.rel_mut(l).exps = Some(nl);
            return Ok(l);
        }

        let (lx, rx) = (self.rel(l), self.rel(r));
        let mergeable = lx.kind.is_select()
            && rx.kind.is_select()
            && lx.kind.left() == rx.kind.left()
            && rel.is_some()
            && lx.kind.left() == rel
            && !self.rel_is_ref(l)
            && !self.rel_is_ref(r);
        if mergeable {
            let ls = lx.exps.clone().unwrap_or_default();
            let rs = rx.exps.clone().unwrap_or_default();
            let e = self.exp_or(ls, rs, false);
            self.rel_destroy(r);
            self.rel_mut(l).exps = Some(ExpList::from(vec![e]));

            let mut absorbed = 0;
            while let Some(ll) = self.rel(l).kind.left() {
                let x = self.rel(ll);
                if !x.kind.is_select() || self.rel_is_ref(ll) {
                    break;
                }
                let below = x.kind.left();
                let exps = x.exps.clone().unwrap_or_default();
                self.rel_mut(l).exps.get_or_insert_with(ExpList::new).extend(exps.iter());
                self.rel_mut(l).kind = RelKind::Select { input: below };
                self.rel_mut(ll).kind = RelKind::Select { input: None };
                self.rel_destroy(ll);
                absorbed += 1;
            }
            debug!(absorbed, "merged disjunction into one select");
            return Ok(l);
        }

        let (ls, rs) = match rel {
            Some(rel) => (
                self.rel_projections(rel, None, true, true)?,
                self.rel_projections(rel, None, true, true)?,
            ),
            None => (
                self.rel_projections(l, None, true, true)?,
                self.rel_projections(r, None, true, true)?,
            ),
        };
        self.rel_mut(l).processed = true;
        self.rel_mut(r).processed = true;
        let lcard = self.exps_card(&self.rel(l).exps.clone().unwrap_or_default());
        let rcard = self.exps_card(&self.rel(r).exps.clone().unwrap_or_default());

        let u = self.rel_setop_check_types(l, r, &ls, &rs, SetOp::Union)?;
        let exps = self.rel_projections(u, None, true, true)?;
        let x = self.rel_mut(u);
        x.exps = Some(exps);
        x.processed = true;
        let u = self.rel_distinct(u);
        if lcard <= Card::Aggr && rcard <= Card::Aggr {
            self.rel_mut(u).card = lcard;
            let exps = self.rel(u).exps.clone().unwrap_or_default();
            self.exps_fix_card(&exps, lcard);
        }
        debug!("disjunction as union");
        Ok(u)
    }
}
