//! RAII activation of a scope.
//!
//! Entering a function (or a script root) does three things, in order:
//!
//! 1. push one binding onto every declaration the scope owns,
//! 2. record a [`DebugFrame`](crate::debugger::DebugFrame) with the scope's
//!    debug info,
//! 3. push the call site onto the call stack.
//!
//! [`Activation`] performs the exact inverse in reverse order when dropped,
//! whichever way the body was left: normal completion, `return`, a propagated
//! error, a stop request or a panic. If step 2 fails (call depth limit), the
//! bindings from step 1 are popped before the error is returned.
//!
//! The guard holds `&mut dyn Debugger` and derefs to it, so the body is
//! processed through the guard itself.

use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::debugger::Debugger;
use crate::tree::ScopeLayout;
use robo_ir::{InstrId, RobotResult, Value};

/// A live invocation of a scope.
pub struct Activation<'g, 'd, 'l> {
    debugger: &'g mut (dyn Debugger + 'd),
    layout: &'l ScopeLayout,
    call_site: Option<InstrId>,
    owns_bindings: bool,
}

impl<'g, 'd, 'l> Activation<'g, 'd, 'l> {
    /// Bind a fresh invocation of `layout`.
    pub fn enter(
        debugger: &'g mut (dyn Debugger + 'd),
        layout: &'l ScopeLayout,
        call_site: Option<InstrId>,
    ) -> RobotResult<Self> {
        bind_scope(layout);
        Self::open(debugger, layout, call_site, true).inspect_err(|_| unbind_scope(layout))
    }

    /// Re-enter a scope whose bindings are already live (a script that was
    /// initialized as a library before being run). Only the frame and the
    /// call site are undone on drop.
    pub fn reenter(
        debugger: &'g mut (dyn Debugger + 'd),
        layout: &'l ScopeLayout,
        call_site: Option<InstrId>,
    ) -> RobotResult<Self> {
        Self::open(debugger, layout, call_site, false)
    }

    fn open(
        debugger: &'g mut (dyn Debugger + 'd),
        layout: &'l ScopeLayout,
        call_site: Option<InstrId>,
        owns_bindings: bool,
    ) -> RobotResult<Self> {
        debugger.enter_frame(layout.owner(), Rc::clone(layout.debug_info()))?;
        if let Some(site) = call_site {
            debugger.start_instruction(site);
        }
        Ok(Activation {
            debugger,
            layout,
            call_site,
            owns_bindings,
        })
    }

    pub fn layout(&self) -> &'l ScopeLayout {
        self.layout
    }
}

impl Drop for Activation<'_, '_, '_> {
    fn drop(&mut self) {
        if let Some(site) = self.call_site {
            self.debugger.end_instruction(site);
        }
        self.debugger.exit_frame();
        if self.owns_bindings {
            unbind_scope(self.layout);
        }
    }
}

impl<'d> Deref for Activation<'_, 'd, '_> {
    type Target = dyn Debugger + 'd;

    fn deref(&self) -> &Self::Target {
        self.debugger
    }
}

impl DerefMut for Activation<'_, '_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.debugger
    }
}

/// Push a null binding onto every declaration owned by `layout`.
pub(crate) fn bind_scope(layout: &ScopeLayout) {
    for decl in layout.bindings() {
        decl.push(Value::Null);
    }
}

/// Pop one binding from every declaration owned by `layout`, newest first.
pub(crate) fn unbind_scope(layout: &ScopeLayout) {
    for decl in layout.bindings().iter().rev() {
        decl.pop();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap to panic on unexpected state")]
mod tests;
