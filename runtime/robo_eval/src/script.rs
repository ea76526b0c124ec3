//! Scripts and libraries.
//!
//! A [`Script`] is a root block in an instruction tree plus the library
//! scripts it includes. Libraries contribute their top-level variable and
//! function declarations; they are initialized at most once and closed at
//! most once, however many scripts include them, so a diamond-shaped include
//! graph shares one set of library bindings.
//!
//! A script and all of its libraries are compiled into the same
//! [`InstructionTree`], which lets a call site in one script refer to a
//! function declared in another by [`InstrId`].
//!
//! # Lifecycle
//!
//! ```text
//! process ─┬─ started event
//!          ├─ initialize libraries (depth first, once)
//!          ├─ re-enter library frames, run root block in a fresh activation
//!          └─ finished event (also on failure)
//! close ───── release library bindings (once)
//! ```
//!
//! A script runs at most once. Running it again is a usage error.
//!
//! Library bindings outlive a run, but their debug frames do not: the
//! frames of live libraries are re-entered around each activation that needs
//! them and exited with it, so the debugger ends every run with an empty
//! frame log.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::activation::{bind_scope, unbind_scope, Activation};
use crate::debugger::Debugger;
use crate::evaluator::Evaluator;
use crate::events::{EventHost, LifecycleEvent, LifecycleKind};
use crate::tree::{InstructionTree, ScopeLayout};
use robo_ir::errors::unknown_instruction;
use robo_ir::{Flow, InstrId, RobotResult, RunId, ScriptId, UsageError, Value};

/// One step of a path returned by [`Script::path_to_instruction`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathElement {
    Script(ScriptId),
    Instruction(InstrId),
}

pub struct Script {
    id: ScriptId,
    tree: Rc<InstructionTree>,
    root: InstrId,
    libraries: Vec<Rc<Script>>,
    events: EventHost,
    argument: RefCell<Option<Value>>,
    initialized: Cell<bool>,
    closed: Cell<bool>,
    has_run: Cell<bool>,
    /// Set while this script's own library bindings are pushed.
    library_bindings: Cell<bool>,
}

impl Script {
    /// `root` must have been registered with `TreeBuilder::script_root`.
    pub fn new(id: impl Into<ScriptId>, tree: Rc<InstructionTree>, root: InstrId) -> Self {
        Script {
            id: id.into(),
            tree,
            root,
            libraries: Vec::new(),
            events: EventHost::new(),
            argument: RefCell::new(None),
            initialized: Cell::new(false),
            closed: Cell::new(false),
            has_run: Cell::new(false),
            library_bindings: Cell::new(false),
        }
    }

    /// Share a listener registry with other scripts.
    #[must_use]
    pub fn with_events(mut self, events: EventHost) -> Self {
        self.events = events;
        self
    }

    /// Include `library`. It must live in the same instruction tree.
    pub fn add_library(&mut self, library: Rc<Script>) -> Result<(), UsageError> {
        if !Rc::ptr_eq(&self.tree, &library.tree) {
            return Err(UsageError::ForeignLibrary {
                script: self.id.clone(),
                library: library.id.clone(),
            });
        }
        self.libraries.push(library);
        Ok(())
    }

    pub fn id(&self) -> &ScriptId {
        &self.id
    }

    pub fn tree(&self) -> &Rc<InstructionTree> {
        &self.tree
    }

    pub fn root(&self) -> InstrId {
        self.root
    }

    pub fn libraries(&self) -> &[Rc<Script>] {
        &self.libraries
    }

    pub fn events(&self) -> &EventHost {
        &self.events
    }

    pub fn set_argument(&self, argument: Value) {
        *self.argument.borrow_mut() = Some(argument);
    }

    /// The call argument, or null when none was set.
    pub fn argument(&self) -> Value {
        self.argument.borrow().clone().unwrap_or_default()
    }

    pub fn has_argument(&self) -> bool {
        self.argument.borrow().is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn has_run(&self) -> bool {
        self.has_run.get()
    }

    fn layout(&self) -> RobotResult<&ScopeLayout> {
        self.tree
            .root_layout(self.root)
            .ok_or_else(|| unknown_instruction(self.root))
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.tree).with_argument(self.argument.borrow().clone())
    }

    /// Run the script body once.
    ///
    /// Lifecycle events fire on every path, including failures. A second call
    /// fails with [`UsageError::ScriptAlreadyRun`] without running anything.
    pub fn process(&self, dbg: &mut dyn Debugger) -> RobotResult<Flow> {
        if self.has_run.get() {
            return Err(UsageError::ScriptAlreadyRun {
                script: self.id.clone(),
            }
            .into());
        }

        let run = RunId::new();
        debug!(script = %self.id, %run, "script started");
        dbg.script_started(&self.id, run);
        self.emit(LifecycleKind::Started, run);

        let result = self.run(dbg);

        self.emit(LifecycleKind::Finished, run);
        dbg.script_finished(&self.id, run);
        debug!(script = %self.id, %run, ok = result.is_ok(), "script finished");
        result
    }

    fn run(&self, dbg: &mut dyn Debugger) -> RobotResult<Flow> {
        self.has_run.set(true);
        if !self.initialized.get() {
            self.initialize_as_library(dbg, true)?;
        }

        let layout = self.layout()?;
        let reuse = self.library_bindings.get();
        within_frames(dbg, &self.library_layouts(), |dbg: &mut dyn Debugger| {
            let mut scope = if reuse {
                Activation::reenter(dbg, layout, None)?
            } else {
                Activation::enter(dbg, layout, None)?
            };
            self.evaluator().process(self.root, &mut *scope)
        })
    }

    fn emit(&self, kind: LifecycleKind, run: RunId) {
        self.events.emit(&LifecycleEvent {
            kind,
            script: self.id.clone(),
            run,
        });
    }

    /// Initialize every library not yet initialized, depth first, then
    /// (unless `skip_self`) run this script's top-level declarations.
    ///
    /// The script is flagged initialized before anything runs, also when
    /// initialization is later cut short by a stop request or an error.
    /// A failing declaration aborts the remaining declarations of this
    /// script only; the error goes to `Debugger::handle`.
    pub fn initialize_as_library(&self, dbg: &mut dyn Debugger, skip_self: bool) -> RobotResult<()> {
        self.initialized.set(true);
        for library in &self.libraries {
            if !library.is_initialized() {
                library.initialize_as_library(dbg, false)?;
            }
        }
        if skip_self {
            return Ok(());
        }

        debug!(script = %self.id, "initializing library");
        let layout = self.layout()?;
        bind_scope(layout);
        self.library_bindings.set(true);

        within_frames(dbg, &self.library_layouts(), |dbg: &mut dyn Debugger| {
            let mut scope = Activation::reenter(dbg, layout, None)?;
            self.run_declarations(&mut *scope)
        })
    }

    fn run_declarations(&self, dbg: &mut dyn Debugger) -> RobotResult<()> {
        let evaluator = self.evaluator();
        for &statement in self.tree.statements(self.root) {
            if dbg.should_stop() {
                warn!(script = %self.id, "library initialization stopped");
                break;
            }
            if !self.tree.node(statement)?.kind.is_declaration() {
                continue;
            }

            dbg.start_instruction(statement);
            let failed = match evaluator.process(statement, dbg) {
                Ok(_) => Ok(false),
                Err(error) if error.is_cancellation() => {
                    warn!(script = %self.id, "library initialization stopped");
                    Ok(true)
                }
                Err(error) => {
                    debug!(script = %self.id, %error, "library declaration failed");
                    dbg.handle(error).map(|()| true)
                }
            };
            dbg.end_instruction(statement);
            if failed? {
                break;
            }
        }
        Ok(())
    }

    /// Root layouts of every library below this script whose bindings are
    /// live, dependencies before dependents, each once.
    fn library_layouts(&self) -> Vec<&ScopeLayout> {
        let mut seen = FxHashSet::default();
        seen.insert(self.root);
        let mut layouts = Vec::new();
        self.collect_library_layouts(&mut seen, &mut layouts);
        layouts
    }

    fn collect_library_layouts<'s>(
        &'s self,
        seen: &mut FxHashSet<InstrId>,
        layouts: &mut Vec<&'s ScopeLayout>,
    ) {
        for library in &self.libraries {
            if !seen.insert(library.root) {
                continue;
            }
            library.collect_library_layouts(seen, layouts);
            if library.library_bindings.get() {
                if let Some(layout) = library.tree.root_layout(library.root) {
                    layouts.push(layout);
                }
            }
        }
    }

    /// Release library bindings of this script and its libraries.
    ///
    /// Safe after a partial or failed initialization, and after a failed run.
    pub fn close(&self) {
        self.close_as_library();
    }

    pub fn close_as_library(&self) {
        if self.closed.replace(true) {
            return;
        }
        if self.library_bindings.replace(false) {
            if let Some(layout) = self.tree.root_layout(self.root) {
                unbind_scope(layout);
            }
        }
        for library in &self.libraries {
            if !library.is_closed() {
                library.close_as_library();
            }
        }
        debug!(script = %self.id, "closed");
    }

    /// Shortest structural path from this script to `target`, searching the
    /// script's own tree and, as extra children of a script, its libraries.
    /// Empty when `target` is unreachable.
    pub fn path_to_instruction(&self, target: InstrId) -> Vec<PathElement> {
        let start = PathElement::Script(self.id.clone());
        let goal = PathElement::Instruction(target);

        let mut scripts: FxHashMap<ScriptId, &Script> = FxHashMap::default();
        scripts.insert(self.id.clone(), self);
        let mut visited = FxHashSet::default();
        let mut parents: FxHashMap<PathElement, PathElement> = FxHashMap::default();
        let mut fringe = VecDeque::new();
        visited.insert(start.clone());
        fringe.push_back(start);

        while let Some(current) = fringe.pop_front() {
            if current == goal {
                let mut path = vec![current];
                while let Some(parent) = path.last().and_then(|step| parents.get(step)) {
                    path.push(parent.clone());
                }
                path.reverse();
                return path;
            }

            let children: Vec<PathElement> = match &current {
                PathElement::Script(id) => match scripts.get(id).copied() {
                    Some(script) => {
                        let statements = self.tree.statements(script.root).iter();
                        let mut children: Vec<_> =
                            statements.map(|&s| PathElement::Instruction(s)).collect();
                        for library in &script.libraries {
                            scripts.entry(library.id.clone()).or_insert(&**library);
                            children.push(PathElement::Script(library.id.clone()));
                        }
                        children
                    }
                    None => Vec::new(),
                },
                PathElement::Instruction(id) => self
                    .tree
                    .children(*id)
                    .into_iter()
                    .map(PathElement::Instruction)
                    .collect(),
            };

            for child in children {
                if visited.insert(child.clone()) {
                    parents.insert(child.clone(), current.clone());
                    fringe.push_back(child);
                }
            }
        }
        Vec::new()
    }
}

/// Run `body` with a debug frame entered for each of `layouts`, without
/// binding them again. The frames are exited, newest first, on every path.
fn within_frames<R>(
    dbg: &mut dyn Debugger,
    layouts: &[&ScopeLayout],
    body: impl FnOnce(&mut dyn Debugger) -> RobotResult<R>,
) -> RobotResult<R> {
    match layouts.split_first() {
        Some((layout, rest)) => {
            let mut scope = Activation::reenter(dbg, layout, None)?;
            within_frames(&mut *scope, rest, body)
        }
        None => body(dbg),
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("libraries", &self.libraries.iter().map(|l| &l.id).collect::<Vec<_>>())
            .field("initialized", &self.initialized.get())
            .field("closed", &self.closed.get())
            .field("has_run", &self.has_run.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap to panic on unexpected state")]
mod tests;
