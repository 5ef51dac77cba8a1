//! Fixed-input ledger (spec.md §3, §5 "Shared resources").
//!
//! Each unit evaluation transiently fixes some of the model's free
//! variables so the unit function sees a fully determined input. Those
//! fixes must be released again before the next unit runs, on every exit
//! path — including a constraint error raised mid-evaluation — or a later
//! unit would see a variable the caller never asked to have fixed.
//! [`ScopedFix`] guarantees this with an RAII guard: any scope holding one
//! releases its fixes on drop, whether it falls through, returns early via
//! `?`, or unwinds.

use crate::model::Model;

/// Fixes a set of a model's variables and guarantees their release.
///
/// Call [`ScopedFix::fix`] for each variable to transiently fix, run the
/// unit's evaluation, then call [`ScopedFix::release`] once propagation no
/// longer needs them fixed. If the scope exits before `release` is called
/// for any other reason, `Drop` releases whatever is still held.
pub struct ScopedFix<'a, M: Model> {
    model: &'a mut M,
    held: Vec<M::Var>,
}

impl<'a, M: Model> ScopedFix<'a, M> {
    pub fn new(model: &'a mut M) -> Self {
        ScopedFix {
            model,
            held: Vec::new(),
        }
    }

    pub fn model_mut(&mut self) -> &mut M {
        self.model
    }

    pub fn model(&self) -> &M {
        self.model
    }

    /// Fix `var` to `value` and record it for later release. A no-op if
    /// `var` was already fixed by someone else — this ledger only owns
    /// variables it fixed itself.
    pub fn fix(&mut self, var: M::Var, value: f64) {
        if !self.model.is_fixed(var) {
            self.model.fix(var, value);
            self.held.push(var);
        }
    }

    /// Release every variable this guard fixed. Safe to call more than
    /// once; a second call is a no-op.
    pub fn release(&mut self) {
        for var in self.held.drain(..) {
            self.model.free(var);
        }
    }
}

impl<'a, M: Model> Drop for ScopedFix<'a, M> {
    fn drop(&mut self) {
        self.release();
    }
}
