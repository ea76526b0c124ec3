//! Stack growth for recursive robots.
//!
//! User-defined functions recurse on the native stack: every robot call goes
//! through the evaluator's `call_function`, which re-enters `process` for the
//! function body. The evaluator's `process` and `eval` entry points are the
//! guarded re-entries. A robot that recurses a few thousand times would overflow a
//! default thread stack long before any configured call-depth limit fires.
//!
//! [`ensure_sufficient_stack`] wraps them and grows the stack on demand.
//!
//! - **Native targets**: `stacker::maybe_grow` with a 128KB red zone and 2MB segments.
//! - **WASM targets**: direct call, the host manages the stack.

/// Remaining stack below which a new segment is allocated.
///
/// A single robot call walks block, statement, expression and call frames
/// before it reaches the next guarded call, so the red zone is a little larger
/// than a plain expression evaluator would need.
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated stack segment.
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Run `f` with at least [`RED_ZONE`] bytes of stack available.
///
/// ```text
/// pub fn process(&self, id: InstrId, dbg: &mut dyn Debugger) -> RobotResult<Flow> {
///     ensure_sufficient_stack(|| self.process_inner(id, dbg))
/// }
/// ```
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// WASM version: no growth.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
