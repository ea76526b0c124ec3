//! Error model of the runtime.
//!
//! Two families:
//!
//! - [`RobotError`]: raised while processing instructions. It travels up
//!   through `Debugger::handle`, may be caught by an error scope, and carries
//!   the instruction it is attributed to plus any suppressed follow-up errors.
//! - [`UsageError`]: a broken contract by the embedding code (running a
//!   finished script twice, asking an error scope for an error it never
//!   recorded). Usage errors are returned straight to the caller and are never
//!   handed to a debugger.
//!
//! The factory functions at the bottom are the public way to build runtime
//! errors; they keep message wording in one place.
//!
//! [`RobotErrorKind::Cancelled`] rides the same channel but is not a failure:
//! it unwinds expression evaluation after a stop request until the enclosing
//! block turns it into an early return.

use crate::{BinaryOp, InstrId, ScriptId};

/// Result of processing.
pub type RobotResult<T> = Result<T, RobotError>;

/// Contract violations by the caller of the runtime.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("script {script} cannot run twice; it has to be re-initialized before running")]
    ScriptAlreadyRun { script: ScriptId },
    #[error("no error has been recorded in this error scope")]
    NoErrorRecorded,
    #[error("library {library} was compiled into a different instruction tree than {script}")]
    ForeignLibrary { script: ScriptId, library: ScriptId },
}

/// Typed category of a [`RobotError`].
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RobotErrorKind {
    #[error("reference to unknown variable '{name}', could not assign value")]
    UnboundVariable { name: String },
    #[error("cannot apply operator `{op}` to {left} and {right}")]
    InvalidOperands {
        op: BinaryOp,
        left: &'static str,
        right: &'static str,
    },
    #[error("integer overflow in `{op}`")]
    IntegerOverflow { op: BinaryOp },
    #[error("cannot iterate over {type_name}")]
    NotIterable { type_name: &'static str },
    #[error("instruction {instruction} is not a function")]
    NotCallable { instruction: InstrId },
    #[error("unknown instruction {instruction}")]
    UnknownInstruction { instruction: InstrId },
    #[error("{name} expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("{construct}: {message}")]
    ConstructFailed { construct: String, message: String },
    #[error("maximum call depth of {depth} exceeded")]
    StackOverflow { depth: usize },
    #[error("{message}")]
    Custom { message: String },
    /// A stop request unwinding an expression. Not a failure: blocks turn it
    /// back into an early return and it never reaches `Debugger::handle`.
    #[error("execution cancelled")]
    Cancelled,
    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// An error raised while a robot runs.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{kind}")]
pub struct RobotError {
    kind: RobotErrorKind,
    /// Instruction on top of the call stack when the error was first handled.
    instruction: Option<InstrId>,
    /// Errors raised after this one inside the same error scope, oldest first.
    suppressed: Vec<RobotError>,
}

impl RobotError {
    pub fn new(kind: RobotErrorKind) -> Self {
        RobotError {
            kind,
            instruction: None,
            suppressed: Vec::new(),
        }
    }

    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(RobotErrorKind::Custom {
            message: message.into(),
        })
    }

    pub fn kind(&self) -> &RobotErrorKind {
        &self.kind
    }

    /// `true` for contract violations that must reach the caller untouched.
    pub fn is_usage(&self) -> bool {
        matches!(self.kind, RobotErrorKind::Usage(_))
    }

    /// `true` for the unwind signal raised by a stop request.
    pub fn is_cancellation(&self) -> bool {
        matches!(self.kind, RobotErrorKind::Cancelled)
    }

    pub fn instruction(&self) -> Option<InstrId> {
        self.instruction
    }

    /// Attribute the error to `instruction` unless an earlier handler already did.
    #[must_use]
    pub fn attributed_to(mut self, instruction: Option<InstrId>) -> Self {
        if self.instruction.is_none() {
            self.instruction = instruction;
        }
        self
    }

    pub fn suppressed(&self) -> &[RobotError] {
        &self.suppressed
    }

    pub fn add_suppressed(&mut self, error: RobotError) {
        self.suppressed.push(error);
    }
}

impl From<UsageError> for RobotError {
    fn from(err: UsageError) -> Self {
        RobotError::new(RobotErrorKind::Usage(err))
    }
}

// Factories

#[cold]
pub fn unbound_variable(name: &str) -> RobotError {
    RobotError::new(RobotErrorKind::UnboundVariable {
        name: name.to_string(),
    })
}

#[cold]
pub fn invalid_operands(op: BinaryOp, left: &'static str, right: &'static str) -> RobotError {
    RobotError::new(RobotErrorKind::InvalidOperands { op, left, right })
}

#[cold]
pub fn integer_overflow(op: BinaryOp) -> RobotError {
    RobotError::new(RobotErrorKind::IntegerOverflow { op })
}

#[cold]
pub fn not_iterable(type_name: &'static str) -> RobotError {
    RobotError::new(RobotErrorKind::NotIterable { type_name })
}

#[cold]
pub fn not_callable(instruction: InstrId) -> RobotError {
    RobotError::new(RobotErrorKind::NotCallable { instruction })
}

#[cold]
pub fn unknown_instruction(instruction: InstrId) -> RobotError {
    RobotError::new(RobotErrorKind::UnknownInstruction { instruction })
}

#[cold]
pub fn arity_mismatch(name: &str, expected: usize, got: usize) -> RobotError {
    RobotError::new(RobotErrorKind::ArityMismatch {
        name: name.to_string(),
        expected,
        got,
    })
}

#[cold]
pub fn construct_failed(construct: &str, message: impl Into<String>) -> RobotError {
    RobotError::new(RobotErrorKind::ConstructFailed {
        construct: construct.to_string(),
        message: message.into(),
    })
}

#[cold]
pub fn stack_overflow(depth: usize) -> RobotError {
    RobotError::new(RobotErrorKind::StackOverflow { depth })
}

#[cold]
pub fn cancelled() -> RobotError {
    RobotError::new(RobotErrorKind::Cancelled)
}
