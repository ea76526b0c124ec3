//! Root debugger of a run.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use tracing::{debug, error, trace};

use super::{resolve_variable, DebugFrame, Debugger, DebuggerBuilder, ErrorPolicy, PauseAction, StopHandle};
use crate::tree::{DebugInfo, ScopeOwner};
use robo_ir::errors::stack_overflow;
use robo_ir::{InstrId, RobotError, RobotResult, RunId, ScriptId, Value};

/// Called when a breakpoint instruction is entered.
pub type PauseHook = Box<dyn FnMut(&RobotDebugger, InstrId) -> PauseAction>;

/// A variable in scope at some call-stack position.
#[derive(Clone, Debug, PartialEq)]
pub struct VisibleVariable {
    pub declaration: InstrId,
    pub name: String,
    pub value: Value,
}

/// The debugger that owns a run: call stack, frame log, stop signal and
/// the final say on uncaught errors.
pub struct RobotDebugger {
    stack: Vec<InstrId>,
    frames: Vec<DebugFrame>,
    /// Number of function frames in `frames`.
    call_depth: usize,
    stop: StopHandle,
    policy: ErrorPolicy,
    errors: Vec<RobotError>,
    max_call_depth: Option<usize>,
    breakpoints: FxHashSet<InstrId>,
    pause_hook: Option<PauseHook>,
}

impl RobotDebugger {
    pub fn new() -> Self {
        DebuggerBuilder::new().build()
    }

    pub fn builder() -> DebuggerBuilder {
        DebuggerBuilder::new()
    }

    pub(super) fn from_parts(
        stop: StopHandle,
        policy: ErrorPolicy,
        max_call_depth: Option<usize>,
        breakpoints: FxHashSet<InstrId>,
        pause_hook: Option<PauseHook>,
    ) -> Self {
        RobotDebugger {
            stack: Vec::new(),
            frames: Vec::new(),
            call_depth: 0,
            stop,
            policy,
            errors: Vec::new(),
            max_call_depth,
            breakpoints,
            pause_hook,
        }
    }

    /// Handle that stops this run when raised.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Errors absorbed under a non-propagating policy, oldest first.
    pub fn errors(&self) -> &[RobotError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<RobotError> {
        std::mem::take(&mut self.errors)
    }

    pub fn frames(&self) -> &[DebugFrame] {
        &self.frames
    }

    /// Active user-function invocations.
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    pub fn add_breakpoint(&mut self, instruction: InstrId) {
        self.breakpoints.insert(instruction);
    }

    pub fn remove_breakpoint(&mut self, instruction: InstrId) -> bool {
        self.breakpoints.remove(&instruction)
    }

    pub fn set_pause_hook(&mut self, hook: PauseHook) {
        self.pause_hook = Some(hook);
    }

    /// Label of a declaration recorded in any live frame.
    pub fn variable_name(&self, declaration: InstrId) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.info.get(declaration))
            .map(|decl| decl.name())
    }

    /// Variables in scope at `depth` that have a live binding. Inner scopes
    /// shadow outer ones by name.
    pub fn visible_variables(&self, depth: usize) -> Vec<VisibleVariable> {
        let visible = self.frames.partition_point(|frame| frame.entered_at <= depth);
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut out = Vec::new();

        for frame in self.frames[..visible].iter().rev() {
            let mut declarations: Vec<_> = frame.info.iter().collect();
            declarations.sort_by_key(|(id, _)| *id);
            for (id, decl) in declarations {
                if seen.contains(decl.name()) {
                    continue;
                }
                if let Some(value) = resolve_variable(&self.frames, id, depth) {
                    seen.insert(decl.name());
                    out.push(VisibleVariable {
                        declaration: id,
                        name: decl.name().to_string(),
                        value,
                    });
                }
            }
        }
        out
    }

    fn pause_at(&mut self, instruction: InstrId) {
        let Some(mut hook) = self.pause_hook.take() else {
            return;
        };
        debug!(%instruction, depth = self.stack.len(), "paused at breakpoint");
        if hook(&*self, instruction) == PauseAction::Stop {
            self.stop.stop();
        }
        self.pause_hook = Some(hook);
    }
}

impl Default for RobotDebugger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RobotDebugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobotDebugger")
            .field("stack", &self.stack)
            .field("frames", &self.frames.len())
            .field("stopped", &self.stop.is_stopped())
            .field("policy", &self.policy)
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}

impl Debugger for RobotDebugger {
    fn should_stop(&self) -> bool {
        self.stop.is_stopped()
    }

    fn start_instruction(&mut self, instruction: InstrId) {
        self.stack.push(instruction);
        if self.breakpoints.contains(&instruction) {
            self.pause_at(instruction);
        }
    }

    fn end_instruction(&mut self, instruction: InstrId) {
        let popped = self.stack.pop();
        debug_assert_eq!(popped, Some(instruction), "unbalanced call stack");
    }

    fn stack_trace(&self) -> &[InstrId] {
        &self.stack
    }

    fn enter_frame(&mut self, scope: ScopeOwner, info: Rc<DebugInfo>) -> RobotResult<()> {
        if let ScopeOwner::Function(_) = scope {
            if let Some(max) = self.max_call_depth {
                if self.call_depth >= max {
                    return Err(stack_overflow(max));
                }
            }
            self.call_depth += 1;
        }
        self.frames.push(DebugFrame {
            scope,
            entered_at: self.stack.len(),
            info,
        });
        Ok(())
    }

    fn exit_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            if let ScopeOwner::Function(_) = frame.scope {
                self.call_depth -= 1;
            }
        }
    }

    fn variable_value(&self, declaration: InstrId, depth: usize) -> Option<Value> {
        resolve_variable(&self.frames, declaration, depth)
    }

    fn handle(&mut self, error: RobotError) -> RobotResult<()> {
        if error.is_cancellation() {
            return Err(error);
        }
        let error = error.attributed_to(self.current_instruction());
        if error.is_usage() {
            return Err(error);
        }
        match self.policy {
            ErrorPolicy::Propagate => Err(error),
            ErrorPolicy::LogAndContinue => {
                error!(instruction = ?error.instruction(), "{error}");
                self.errors.push(error);
                Ok(())
            }
            ErrorPolicy::LogAndStop => {
                error!(instruction = ?error.instruction(), "{error}");
                self.errors.push(error);
                self.stop.stop();
                Ok(())
            }
        }
    }

    fn script_started(&mut self, script: &ScriptId, run: RunId) {
        trace!(%script, %run, "debugger attached");
    }

    fn script_finished(&mut self, script: &ScriptId, run: RunId) {
        trace!(%script, %run, depth = self.stack.len(), "debugger detached");
    }
}
