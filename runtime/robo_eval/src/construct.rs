//! Native constructs: the leaf call boundary of the runtime.
//!
//! A construct takes a fixed, positional argument list and either returns one
//! value or fails with a [`ConstructError`]. The evaluator checks arity before
//! invoking and turns failures into `RobotErrorKind::ConstructFailed`.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use robo_ir::Value;

/// Failure reported by a construct.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ConstructError {
    pub message: String,
}

impl ConstructError {
    pub fn new(message: impl Into<String>) -> Self {
        ConstructError {
            message: message.into(),
        }
    }
}

pub type ConstructResult = Result<Value, ConstructError>;

/// A native function callable from robot code.
pub trait Construct: Send + Sync {
    fn name(&self) -> &str;

    /// Number of positional arguments.
    fn arity(&self) -> usize;

    fn invoke(&self, args: &[Value]) -> ConstructResult;
}

/// Shared handle to a construct stored in the instruction tree.
#[derive(Clone)]
pub struct SharedConstruct(Arc<dyn Construct>);

impl SharedConstruct {
    pub fn new(construct: Arc<dyn Construct>) -> Self {
        SharedConstruct(construct)
    }
}

impl Deref for SharedConstruct {
    type Target = dyn Construct;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for SharedConstruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<construct {}/{}>", self.0.name(), self.0.arity())
    }
}

/// Construct backed by a plain function pointer or closure.
pub struct FnConstruct<F> {
    name: String,
    arity: usize,
    func: F,
}

impl<F> FnConstruct<F>
where
    F: Fn(&[Value]) -> ConstructResult + Send + Sync,
{
    pub fn new(name: impl Into<String>, arity: usize, func: F) -> Self {
        FnConstruct {
            name: name.into(),
            arity,
            func,
        }
    }
}

impl<F> Construct for FnConstruct<F>
where
    F: Fn(&[Value]) -> ConstructResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn invoke(&self, args: &[Value]) -> ConstructResult {
        (self.func)(args)
    }
}

impl<F> fmt::Debug for FnConstruct<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConstruct")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}
