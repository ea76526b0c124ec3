//! Instruction flow results.
//!
//! Every processed instruction reports how execution should continue.
//! `Return`, `Break` and `Continue` are not errors: they travel up the tree
//! until the enclosing function or loop consumes them.

use crate::Value;

/// Outcome of processing one instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Flow {
    /// Continue with the next instruction, optionally carrying a value.
    Resume(Option<Value>),
    /// Leave the enclosing function (or script).
    Return(Option<Value>),
    /// Leave the enclosing loop.
    Break,
    /// Skip to the next loop iteration.
    Continue,
}

impl Default for Flow {
    fn default() -> Self {
        Flow::Resume(None)
    }
}

impl Flow {
    #[inline]
    pub fn resume() -> Self {
        Flow::Resume(None)
    }

    #[inline]
    pub fn resume_with(value: Value) -> Self {
        Flow::Resume(Some(value))
    }

    #[inline]
    pub fn returning(value: Option<Value>) -> Self {
        Flow::Return(value)
    }

    #[inline]
    pub fn resumes(&self) -> bool {
        matches!(self, Flow::Resume(_))
    }

    #[inline]
    pub fn returns(&self) -> bool {
        matches!(self, Flow::Return(_))
    }

    /// `true` for anything that leaves a loop: `break` or `return`.
    #[inline]
    pub fn breaks(&self) -> bool {
        matches!(self, Flow::Break | Flow::Return(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Flow::Resume(v) | Flow::Return(v) => v,
            Flow::Break | Flow::Continue => None,
        }
    }
}
