//! Identities used across the runtime.
//!
//! - `InstrId(u32)` indexes the instruction arena. It is also the
//!   declaration-site identity handed to debugger queries.
//! - `ScriptId` names a compiled script (its path or URL).
//! - `RunId` correlates the lifecycle events of one `process` call.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Index into an instruction arena.
///
/// Stable for the lifetime of the compiled tree: the same id always names the
/// same node, however many times that node is executed.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
#[repr(transparent)]
pub struct InstrId(u32);

impl InstrId {
    /// Sentinel for "no instruction".
    pub const INVALID: InstrId = InstrId(u32::MAX);

    #[inline]
    pub const fn new(index: u32) -> Self {
        InstrId(index)
    }

    /// Position in the arena.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Hash for InstrId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "InstrId({})", self.0)
        } else {
            write!(f, "InstrId::INVALID")
        }
    }
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Default for InstrId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Identity of a compiled script.
///
/// Cheap to clone; two ids are equal when they name the same source.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(Arc<str>);

impl ScriptId {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        ScriptId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptId({:?})", &*self.0)
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScriptId {
    fn from(name: &str) -> Self {
        ScriptId::new(name)
    }
}

/// Correlation id for one run of a script.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RunId(uuid::Uuid);

impl RunId {
    /// Fresh random id.
    pub fn new() -> Self {
        RunId(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source position of an instruction, as reported by the compiler.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct CodePosition {
    /// 1-based line number.
    pub line: u32,
}

impl CodePosition {
    pub const fn line(line: u32) -> Self {
        CodePosition { line }
    }
}

impl fmt::Display for CodePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line)
    }
}
