//! Robo IR - shared vocabulary of the robot runtime.
//!
//! Everything the execution core exchanges with its collaborators lives here:
//!
//! - `InstrId`, `ScriptId`, `RunId`, `CodePosition`: identities
//! - `Value`: the opaque runtime value
//! - `Flow`: resume / return / break / continue results
//! - `BinaryOp`: operators of the core expression set
//! - `RobotError`, `UsageError`: the error model

pub mod errors;
mod flow;
mod ids;
mod operators;
mod value;

pub use errors::{RobotError, RobotErrorKind, RobotResult, UsageError};
pub use flow::Flow;
pub use ids::{CodePosition, InstrId, RunId, ScriptId};
pub use operators::BinaryOp;
pub use value::Value;
