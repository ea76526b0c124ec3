//! `DebuggerBuilder` for configuring a [`RobotDebugger`].

use rustc_hash::FxHashSet;

use super::{ErrorPolicy, PauseAction, PauseHook, RobotDebugger, StopHandle};
use robo_ir::InstrId;

/// Builder for [`RobotDebugger`].
///
/// Defaults: unlimited call depth, [`ErrorPolicy::Propagate`], a fresh stop
/// handle, no breakpoints.
#[derive(Default)]
pub struct DebuggerBuilder {
    stop: Option<StopHandle>,
    policy: ErrorPolicy,
    max_call_depth: Option<usize>,
    breakpoints: FxHashSet<InstrId>,
    pause_hook: Option<PauseHook>,
}

impl DebuggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an externally owned stop signal.
    #[must_use]
    pub fn stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = Some(stop);
        self
    }

    #[must_use]
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Limit on nested user-function invocations. `None` is unlimited.
    #[must_use]
    pub fn max_call_depth(mut self, depth: Option<usize>) -> Self {
        self.max_call_depth = depth;
        self
    }

    #[must_use]
    pub fn breakpoint(mut self, instruction: InstrId) -> Self {
        self.breakpoints.insert(instruction);
        self
    }

    #[must_use]
    pub fn on_pause<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&RobotDebugger, InstrId) -> PauseAction + 'static,
    {
        self.pause_hook = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> RobotDebugger {
        RobotDebugger::from_parts(
            self.stop.unwrap_or_default(),
            self.policy,
            self.max_call_depth,
            self.breakpoints,
            self.pause_hook,
        )
    }
}
