//! Robo Eval - execution core of the robot runtime.
//!
//! A compiled robot is an [`InstructionTree`]; a [`Script`] names one root
//! block in it plus the library scripts it includes. Running a script walks
//! the tree with an [`Evaluator`] while a [`Debugger`] tracks the call stack,
//! the log of scope frames, cancellation and error routing.
//!
//! # Architecture
//!
//! - `tree`: node arena, per-declaration binding stacks, scope layouts
//! - `activation`: RAII entry/exit of a function or script scope
//! - `evaluator`: instruction processing and expression evaluation
//! - `debugger`: the `Debugger` trait and the root [`RobotDebugger`]
//! - `error_scope`: the decorator behind `do { } error { }` blocks
//! - `script`: script/library lifecycle and instruction path search
//! - `events`: lifecycle notifications
//! - `construct`: the native call boundary
//!
//! # Example
//!
//! ```text
//! let mut b = TreeBuilder::new();
//! let one = b.literal(1i64);
//! let x = b.var_decl("x", Some(one));
//! let root = b.script_root(vec![x]);
//! let tree = Rc::new(b.finish());
//!
//! let script = Script::new("main.robo", tree, root);
//! let mut debugger = RobotDebugger::new();
//! script.process(&mut debugger)?;
//! script.close();
//! ```

mod activation;
pub mod construct;
pub mod debugger;
mod error_scope;
mod evaluator;
pub mod events;
mod operators;
mod script;
pub mod tree;

use std::sync::Once;

pub use activation::Activation;
pub use construct::{Construct, ConstructError, FnConstruct};
pub use debugger::{
    DebugFrame, Debugger, DebuggerBuilder, ErrorPolicy, PauseAction, RobotDebugger, StopHandle,
    VisibleVariable,
};
pub use error_scope::ErrorScope;
pub use evaluator::Evaluator;
pub use events::{EventHost, LifecycleEvent, LifecycleKind};
pub use operators::evaluate_binary;
pub use script::{PathElement, Script};
pub use tree::{
    DeclarationMode, ErrorBlock, InstructionTree, NodeKind, ScopeOwner, TreeBuilder,
    VariableDeclaration,
};

pub use robo_ir::{
    BinaryOp, CodePosition, Flow, InstrId, RobotError, RobotErrorKind, RobotResult, RunId,
    ScriptId, UsageError, Value,
};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
