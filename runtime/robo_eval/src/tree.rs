//! Instruction tree arena and activation-record storage.
//!
//! A compiled robot is a flat arena of [`Node`]s addressed by [`InstrId`].
//! Parents own their children by id; references that are not ownership
//! (a variable read pointing at its declaration, a call site pointing at its
//! function) are plain ids into the same arena, never a second owner.
//!
//! # Activation records
//!
//! Every [`VariableDeclaration`] owns a stack of bindings, one per active
//! invocation of the scope that lexically contains it (a function or a script
//! root). The stacks are pushed and popped by [`crate::activation`] when a
//! scope is entered and left; instructions only read and replace the top.
//!
//! The per-scope bookkeeping ([`ScopeLayout`]) is computed once when the tree
//! is built: which declarations a scope owns, in source order, and the
//! [`DebugInfo`] handed to the debugger on entry.

mod builder;

pub use builder::TreeBuilder;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::construct::SharedConstruct;
use robo_ir::errors::{unbound_variable, unknown_instruction};
use robo_ir::{BinaryOp, CodePosition, InstrId, RobotResult, Value};

/// Children of a node, in processing order.
pub type Children = SmallVec<[InstrId; 4]>;

/// The scope whose invocations push bindings onto a declaration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ScopeOwner {
    /// Top level of the script whose root block is the given id.
    Script(InstrId),
    /// Body of the function declared by the given id.
    Function(InstrId),
    /// Not reachable from any root or function; never bound.
    #[default]
    Detached,
}

/// How a declaration obtains its initial value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeclarationMode {
    /// `var x = init`.
    Plain,
    /// `argument x = init`: the script's call argument when one is set,
    /// otherwise the initializer.
    Argument,
}

/// A variable declaration and its stack of bindings.
#[derive(Debug)]
pub struct VariableDeclaration {
    /// Debugging label. Not unique.
    name: String,
    initializer: Option<InstrId>,
    mode: DeclarationMode,
    owner: Cell<ScopeOwner>,
    bindings: RefCell<Vec<Value>>,
}

impl VariableDeclaration {
    pub fn new(name: impl Into<String>, initializer: Option<InstrId>, mode: DeclarationMode) -> Self {
        VariableDeclaration {
            name: name.into(),
            initializer,
            mode,
            owner: Cell::new(ScopeOwner::Detached),
            bindings: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initializer(&self) -> Option<InstrId> {
        self.initializer
    }

    pub fn mode(&self) -> DeclarationMode {
        self.mode
    }

    pub fn owner(&self) -> ScopeOwner {
        self.owner.get()
    }

    pub(crate) fn set_owner(&self, owner: ScopeOwner) {
        self.owner.set(owner);
    }

    /// Open a new binding for a fresh invocation of the owning scope.
    pub fn push(&self, value: Value) {
        self.bindings.borrow_mut().push(value);
    }

    /// Close the most recent binding.
    pub fn pop(&self) -> Option<Value> {
        self.bindings.borrow_mut().pop()
    }

    /// Overwrite the current binding.
    pub fn replace(&self, value: Value) -> RobotResult<()> {
        match self.bindings.borrow_mut().last_mut() {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(unbound_variable(&self.name)),
        }
    }

    /// Value of the current binding.
    pub fn current(&self) -> Option<Value> {
        self.bindings.borrow().last().cloned()
    }

    /// Value `offset` bindings below the current one (0 = current).
    pub fn peek(&self, offset: usize) -> Option<Value> {
        let bindings = self.bindings.borrow();
        let index = bindings.len().checked_sub(offset.checked_add(1)?)?;
        bindings.get(index).cloned()
    }

    /// Oldest binding.
    pub fn peek_root(&self) -> Option<Value> {
        self.bindings.borrow().first().cloned()
    }

    /// Number of open bindings.
    pub fn depth(&self) -> usize {
        self.bindings.borrow().len()
    }

    pub fn has_value(&self) -> bool {
        !self.bindings.borrow().is_empty()
    }
}

/// Declaration-site to declaration mapping recorded when a scope is entered.
#[derive(Debug, Default)]
pub struct DebugInfo {
    variables: FxHashMap<InstrId, Rc<VariableDeclaration>>,
}

impl DebugInfo {
    pub fn get(&self, declaration: InstrId) -> Option<&Rc<VariableDeclaration>> {
        self.variables.get(&declaration)
    }

    pub fn contains(&self, declaration: InstrId) -> bool {
        self.variables.contains_key(&declaration)
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstrId, &Rc<VariableDeclaration>)> {
        self.variables.iter().map(|(id, decl)| (*id, decl))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub(crate) fn insert(&mut self, declaration: InstrId, decl: Rc<VariableDeclaration>) {
        self.variables.insert(declaration, decl);
    }
}

/// Declarations owned by one scope, computed at build time.
#[derive(Debug, Default)]
pub struct ScopeLayout {
    owner: ScopeOwner,
    /// In source order.
    bindings: Vec<Rc<VariableDeclaration>>,
    debug_info: Rc<DebugInfo>,
}

impl ScopeLayout {
    pub fn owner(&self) -> ScopeOwner {
        self.owner
    }

    pub fn bindings(&self) -> &[Rc<VariableDeclaration>] {
        &self.bindings
    }

    pub fn debug_info(&self) -> &Rc<DebugInfo> {
        &self.debug_info
    }
}

/// A user-defined function.
#[derive(Debug)]
pub struct FunctionDeclaration {
    name: String,
    /// Parameter declarations, in order.
    parameters: Vec<InstrId>,
    body: InstrId,
    layout: ScopeLayout,
}

impl FunctionDeclaration {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[InstrId] {
        &self.parameters
    }

    pub fn body(&self) -> InstrId {
        self.body
    }

    pub fn layout(&self) -> &ScopeLayout {
        &self.layout
    }
}

/// `do { } error { } success { } finally { }`.
#[derive(Clone, Debug, Default)]
pub struct ErrorBlock {
    pub body: InstrId,
    pub on_error: Option<InstrId>,
    pub on_success: Option<InstrId>,
    pub finally: Option<InstrId>,
    /// Declaration that receives the caught error as an object.
    pub cause: Option<InstrId>,
}

#[derive(Debug)]
pub enum NodeKind {
    // Instructions
    Block(Vec<InstrId>),
    VarDecl(Rc<VariableDeclaration>),
    FunctionDecl(FunctionDeclaration),
    If {
        condition: InstrId,
        then_branch: InstrId,
        else_branch: Option<InstrId>,
    },
    While {
        condition: InstrId,
        body: InstrId,
    },
    Foreach {
        variable: InstrId,
        iterable: InstrId,
        body: InstrId,
    },
    Break,
    Continue,
    Return(Option<InstrId>),
    ErrorBlock(ErrorBlock),

    // Expressions
    Literal(Value),
    List(Vec<InstrId>),
    /// Read of the given declaration.
    Variable(InstrId),
    Assign {
        target: InstrId,
        value: InstrId,
    },
    Binary {
        op: BinaryOp,
        left: InstrId,
        right: InstrId,
    },
    /// Call of the user function declared at `function`.
    Call {
        function: InstrId,
        args: Vec<InstrId>,
    },
    /// Call of a native construct.
    Construct {
        construct: SharedConstruct,
        args: Vec<InstrId>,
    },
}

impl NodeKind {
    /// Owned children in processing order. References (`Variable`, the
    /// target of `Assign`, the function of `Call`) are not children.
    pub fn children(&self) -> Children {
        let mut out = Children::new();
        match self {
            NodeKind::Block(items) | NodeKind::List(items) => out.extend(items.iter().copied()),
            NodeKind::VarDecl(decl) => out.extend(decl.initializer()),
            NodeKind::FunctionDecl(function) => {
                out.extend(function.parameters.iter().copied());
                out.push(function.body);
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                out.push(*condition);
                out.push(*then_branch);
                out.extend(*else_branch);
            }
            NodeKind::While { condition, body } => {
                out.push(*condition);
                out.push(*body);
            }
            NodeKind::Foreach {
                variable,
                iterable,
                body,
            } => {
                out.push(*variable);
                out.push(*iterable);
                out.push(*body);
            }
            NodeKind::Return(value) => out.extend(*value),
            NodeKind::ErrorBlock(block) => {
                out.push(block.body);
                out.extend(block.on_error);
                out.extend(block.on_success);
                out.extend(block.finally);
                out.extend(block.cause);
            }
            NodeKind::Assign { value, .. } => out.push(*value),
            NodeKind::Binary { left, right, .. } => {
                out.push(*left);
                out.push(*right);
            }
            NodeKind::Call { args, .. } | NodeKind::Construct { args, .. } => {
                out.extend(args.iter().copied());
            }
            NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Literal(_)
            | NodeKind::Variable(_) => {}
        }
        out
    }

    /// Declarations are what a library contributes when initialized.
    pub fn is_declaration(&self) -> bool {
        matches!(self, NodeKind::VarDecl(_) | NodeKind::FunctionDecl(_))
    }

    /// Whether entering this statement is reported to the debugger.
    /// Function declarations are inert and never halt execution.
    pub fn is_tracked(&self) -> bool {
        !matches!(self, NodeKind::FunctionDecl(_))
    }
}

#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub position: Option<CodePosition>,
}

/// A compiled instruction arena shared by a script and its libraries.
#[derive(Debug, Default)]
pub struct InstructionTree {
    nodes: Vec<Node>,
    /// Layout of every script root block.
    roots: FxHashMap<InstrId, ScopeLayout>,
}

impl InstructionTree {
    pub fn get(&self, id: InstrId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node(&self, id: InstrId) -> RobotResult<&Node> {
        self.get(id).ok_or_else(|| unknown_instruction(id))
    }

    pub fn children(&self, id: InstrId) -> Children {
        self.get(id)
            .map(|node| node.kind.children())
            .unwrap_or_default()
    }

    pub fn position(&self, id: InstrId) -> Option<CodePosition> {
        self.get(id).and_then(|node| node.position)
    }

    pub fn variable(&self, id: InstrId) -> Option<&Rc<VariableDeclaration>> {
        match &self.get(id)?.kind {
            NodeKind::VarDecl(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn function(&self, id: InstrId) -> Option<&FunctionDeclaration> {
        match &self.get(id)?.kind {
            NodeKind::FunctionDecl(function) => Some(function),
            _ => None,
        }
    }

    /// Statements of a block; empty for anything else.
    pub fn statements(&self, id: InstrId) -> &[InstrId] {
        match self.get(id).map(|node| &node.kind) {
            Some(NodeKind::Block(items)) => items,
            _ => &[],
        }
    }

    /// Layout of a script root registered with [`TreeBuilder::script_root`].
    pub fn root_layout(&self, root: InstrId) -> Option<&ScopeLayout> {
        self.roots.get(&root)
    }

    pub fn is_root(&self, id: InstrId) -> bool {
        self.roots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
