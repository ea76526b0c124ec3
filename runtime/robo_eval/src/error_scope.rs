//! Scoped error aggregation for `do { } error { }` blocks.
//!
//! An [`ErrorScope`] wraps the debugger of the enclosing block for the
//! duration of the protected body. It absorbs every error handed to it: the
//! first becomes the primary error, attributed to the instruction on top of
//! the parent's call stack, and the rest are attached to it as suppressed.
//! Once an error is recorded the scope reports `should_stop`, so the body
//! unwinds at the next checkpoint. Usage errors and the cancellation signal
//! are not recorded; they pass straight through. Everything else goes to the
//! parent as is.

use std::rc::Rc;

use crate::debugger::Debugger;
use crate::tree::{DebugInfo, ScopeOwner};
use robo_ir::{InstrId, RobotError, RobotResult, RunId, ScriptId, UsageError, Value};

pub struct ErrorScope<'p, 'd> {
    parent: &'p mut (dyn Debugger + 'd),
    error: Option<RobotError>,
    instruction: Option<InstrId>,
}

impl<'p, 'd> ErrorScope<'p, 'd> {
    pub fn new(parent: &'p mut (dyn Debugger + 'd)) -> Self {
        ErrorScope {
            parent,
            error: None,
            instruction: None,
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// The primary error.
    ///
    /// Asking before anything was recorded is a usage error.
    pub fn error(&self) -> Result<&RobotError, UsageError> {
        self.error.as_ref().ok_or(UsageError::NoErrorRecorded)
    }

    /// Instruction on top of the parent's stack when the primary error was recorded.
    pub fn errored_instruction(&self) -> Option<InstrId> {
        self.instruction
    }

    pub fn parent(&self) -> &(dyn Debugger + 'd) {
        &*self.parent
    }

    /// Consume the scope, releasing the parent.
    pub fn into_error(self) -> Option<RobotError> {
        self.error
    }
}

impl Debugger for ErrorScope<'_, '_> {
    fn should_stop(&self) -> bool {
        self.has_error() || self.parent.should_stop()
    }

    fn start_instruction(&mut self, instruction: InstrId) {
        self.parent.start_instruction(instruction);
    }

    fn end_instruction(&mut self, instruction: InstrId) {
        self.parent.end_instruction(instruction);
    }

    fn stack_trace(&self) -> &[InstrId] {
        self.parent.stack_trace()
    }

    fn stack_depth(&self) -> usize {
        self.parent.stack_depth()
    }

    fn current_instruction(&self) -> Option<InstrId> {
        self.parent.current_instruction()
    }

    fn enter_frame(&mut self, scope: ScopeOwner, info: Rc<DebugInfo>) -> RobotResult<()> {
        self.parent.enter_frame(scope, info)
    }

    fn exit_frame(&mut self) {
        self.parent.exit_frame();
    }

    fn variable_value(&self, declaration: InstrId, depth: usize) -> Option<Value> {
        self.parent.variable_value(declaration, depth)
    }

    fn handle(&mut self, error: RobotError) -> RobotResult<()> {
        if error.is_usage() || error.is_cancellation() {
            return Err(error);
        }
        let top = self.parent.current_instruction();
        match &mut self.error {
            Some(primary) => primary.add_suppressed(error.attributed_to(top)),
            None => {
                self.instruction = top;
                self.error = Some(error.attributed_to(top));
            }
        }
        Ok(())
    }

    fn script_started(&mut self, script: &ScriptId, run: RunId) {
        self.parent.script_started(script, run);
    }

    fn script_finished(&mut self, script: &ScriptId, run: RunId) {
        self.parent.script_finished(script, run);
    }
}
