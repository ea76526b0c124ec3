//! The execution context threaded through every instruction.
//!
//! A [`Debugger`] tracks the live call stack of entered instructions, the
//! log of [`DebugFrame`]s recorded on scope entry, cooperative cancellation
//! and the routing of runtime errors. The evaluator only ever talks to the
//! trait, so decorators such as [`crate::ErrorScope`] can change the meaning
//! of a few operations for the duration of a protected block.
//!
//! # Stack-relative lookup
//!
//! `variable_value(declaration, depth)` answers "what was this variable at
//! call-stack position `depth`". Frames record the stack length at the moment
//! they were entered, so the frames visible from `depth` are a prefix of the
//! log. See [`resolve_variable`] for the binding selection rule.

mod builder;
mod robot;

pub use builder::DebuggerBuilder;
pub use robot::{PauseHook, RobotDebugger, VisibleVariable};

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::tree::{DebugInfo, ScopeOwner};
use robo_ir::{InstrId, RobotError, RobotResult, RunId, ScriptId, Value};

/// Execution context of one run.
pub trait Debugger {
    /// Cooperative cancellation checkpoint.
    fn should_stop(&self) -> bool;

    /// Push `instruction` onto the call stack.
    fn start_instruction(&mut self, instruction: InstrId);

    /// Pop `instruction`, which must be on top of the call stack.
    fn end_instruction(&mut self, instruction: InstrId);

    /// Entered instructions, outermost first.
    fn stack_trace(&self) -> &[InstrId];

    fn stack_depth(&self) -> usize {
        self.stack_trace().len()
    }

    fn current_instruction(&self) -> Option<InstrId> {
        self.stack_trace().last().copied()
    }

    /// Record the declarations of a scope that has just been bound.
    /// Fails without recording anything when the call depth limit is hit.
    fn enter_frame(&mut self, scope: ScopeOwner, info: Rc<DebugInfo>) -> RobotResult<()>;

    /// Drop the most recent frame.
    fn exit_frame(&mut self);

    /// Value of `declaration` as seen from call-stack position `depth`.
    fn variable_value(&self, declaration: InstrId, depth: usize) -> Option<Value>;

    /// Route a runtime error raised by the instruction on top of the stack.
    /// `Ok` means the error was absorbed and execution may continue.
    fn handle(&mut self, error: RobotError) -> RobotResult<()>;

    fn script_started(&mut self, _script: &ScriptId, _run: RunId) {}

    fn script_finished(&mut self, _script: &ScriptId, _run: RunId) {}
}

/// One scope entry in the frame log.
#[derive(Clone, Debug)]
pub struct DebugFrame {
    pub scope: ScopeOwner,
    /// Call-stack length when the scope was entered.
    pub entered_at: usize,
    pub info: Rc<DebugInfo>,
}

/// Pick the binding of `declaration` visible from `depth`.
///
/// Script-owned declarations are bound once per run, so the oldest binding is
/// read. Function-owned declarations are read at an offset equal to the
/// number of invocations of the owning function entered after `depth`.
pub fn resolve_variable(frames: &[DebugFrame], declaration: InstrId, depth: usize) -> Option<Value> {
    let visible = frames.partition_point(|frame| frame.entered_at <= depth);
    let considered = &frames[..visible];
    let decl = considered
        .iter()
        .rev()
        .find_map(|frame| frame.info.get(declaration))?;

    match decl.owner() {
        ScopeOwner::Script(_) => decl.peek_root(),
        ScopeOwner::Function(function) => {
            let later = frames[visible..]
                .iter()
                .filter(|frame| frame.scope == ScopeOwner::Function(function))
                .count();
            decl.peek(later)
        }
        ScopeOwner::Detached => None,
    }
}

/// Cloneable, thread-safe cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe from any thread.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// What the root debugger does with an error nobody caught.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Return the error to the caller.
    #[default]
    Propagate,
    /// Log and retain it, then keep running.
    LogAndContinue,
    /// Log and retain it, then stop the run.
    LogAndStop,
}

/// Answer of a pause hook.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PauseAction {
    Resume,
    Stop,
}
