//! Construction of instruction trees.
//!
//! The compiler front end (and tests) allocate nodes through [`TreeBuilder`],
//! then call [`TreeBuilder::finish`] which resolves scope ownership: every
//! variable declaration is assigned to the innermost function or script root
//! that lexically contains it, and each scope gets its [`ScopeLayout`].

use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    Children, DebugInfo, DeclarationMode, ErrorBlock, FunctionDeclaration, InstructionTree, Node,
    NodeKind, ScopeLayout, ScopeOwner, VariableDeclaration,
};
use crate::construct::{Construct, SharedConstruct};
use robo_ir::{BinaryOp, CodePosition, InstrId, Value};

/// Incremental builder for an [`InstructionTree`].
///
/// Every allocating method panics once the arena outgrows `InstrId`'s
/// `u32` range.
///
/// Several scripts (a top-level script and its libraries) may be built into
/// the same tree; each registers its root block with [`Self::script_root`].
#[derive(Default)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
    roots: Vec<InstrId>,
    functions: Vec<InstrId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node without a position.
    ///
    /// # Panics
    /// Panics if the arena already holds `u32::MAX` nodes, the capacity of
    /// an `InstrId`.
    #[track_caller]
    fn alloc(&mut self, kind: NodeKind) -> InstrId {
        let index = u32::try_from(self.nodes.len())
            .unwrap_or_else(|_| panic!("instruction arena exceeds {} nodes", u32::MAX));
        self.nodes.push(Node {
            kind,
            position: None,
        });
        InstrId::new(index)
    }

    /// Attach a source line to an already allocated node.
    pub fn at_line(&mut self, id: InstrId, line: u32) -> InstrId {
        if let Some(node) = self.nodes.get_mut(id.index()) {
            node.position = Some(CodePosition::line(line));
        }
        id
    }

    // Expressions

    pub fn literal(&mut self, value: impl Into<Value>) -> InstrId {
        self.alloc(NodeKind::Literal(value.into()))
    }

    pub fn null(&mut self) -> InstrId {
        self.alloc(NodeKind::Literal(Value::Null))
    }

    pub fn list(&mut self, items: Vec<InstrId>) -> InstrId {
        self.alloc(NodeKind::List(items))
    }

    /// Read of the declaration at `declaration`.
    pub fn variable(&mut self, declaration: InstrId) -> InstrId {
        self.alloc(NodeKind::Variable(declaration))
    }

    pub fn assign(&mut self, target: InstrId, value: InstrId) -> InstrId {
        self.alloc(NodeKind::Assign { target, value })
    }

    pub fn binary(&mut self, op: BinaryOp, left: InstrId, right: InstrId) -> InstrId {
        self.alloc(NodeKind::Binary { op, left, right })
    }

    /// Call of the user function declared at `function`.
    pub fn call(&mut self, function: InstrId, args: Vec<InstrId>) -> InstrId {
        self.alloc(NodeKind::Call { function, args })
    }

    pub fn construct(&mut self, construct: impl Construct + 'static, args: Vec<InstrId>) -> InstrId {
        self.alloc(NodeKind::Construct {
            construct: SharedConstruct::new(Arc::new(construct)),
            args,
        })
    }

    // Declarations

    pub fn var_decl(&mut self, name: &str, initializer: Option<InstrId>) -> InstrId {
        let decl = VariableDeclaration::new(name, initializer, DeclarationMode::Plain);
        self.alloc(NodeKind::VarDecl(Rc::new(decl)))
    }

    /// Declaration bound to the script argument, falling back to `initializer`.
    pub fn argument_decl(&mut self, name: &str, initializer: Option<InstrId>) -> InstrId {
        let decl = VariableDeclaration::new(name, initializer, DeclarationMode::Argument);
        self.alloc(NodeKind::VarDecl(Rc::new(decl)))
    }

    /// Reserve a function node so its body can call it recursively.
    /// Complete it with [`Self::define_function`].
    pub fn declare_function(&mut self, name: &str) -> InstrId {
        let id = self.alloc(NodeKind::FunctionDecl(FunctionDeclaration {
            name: name.to_string(),
            parameters: Vec::new(),
            body: InstrId::INVALID,
            layout: ScopeLayout::default(),
        }));
        self.functions.push(id);
        id
    }

    /// Fill in parameters and body of a function reserved with
    /// [`Self::declare_function`]. Parameters are variable declarations whose
    /// initializer is the default value.
    pub fn define_function(&mut self, function: InstrId, parameters: Vec<InstrId>, body: InstrId) {
        let Some(node) = self.nodes.get_mut(function.index()) else {
            return;
        };
        if let NodeKind::FunctionDecl(decl) = &mut node.kind {
            decl.parameters = parameters;
            decl.body = body;
        } else {
            debug_assert!(false, "{function} is not a function declaration");
        }
    }

    pub fn function(&mut self, name: &str, parameters: Vec<InstrId>, body: InstrId) -> InstrId {
        let id = self.declare_function(name);
        self.define_function(id, parameters, body);
        id
    }

    // Statements

    pub fn block(&mut self, statements: Vec<InstrId>) -> InstrId {
        self.alloc(NodeKind::Block(statements))
    }

    /// Root block of a script. Declarations reachable from it (outside any
    /// function) are owned by the script.
    pub fn script_root(&mut self, statements: Vec<InstrId>) -> InstrId {
        let id = self.block(statements);
        self.roots.push(id);
        id
    }

    pub fn if_else(
        &mut self,
        condition: InstrId,
        then_branch: InstrId,
        else_branch: Option<InstrId>,
    ) -> InstrId {
        self.alloc(NodeKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    pub fn while_loop(&mut self, condition: InstrId, body: InstrId) -> InstrId {
        self.alloc(NodeKind::While { condition, body })
    }

    /// `foreach variable in iterable { body }`; `variable` is a declaration.
    pub fn foreach(&mut self, variable: InstrId, iterable: InstrId, body: InstrId) -> InstrId {
        self.alloc(NodeKind::Foreach {
            variable,
            iterable,
            body,
        })
    }

    pub fn break_loop(&mut self) -> InstrId {
        self.alloc(NodeKind::Break)
    }

    pub fn continue_loop(&mut self) -> InstrId {
        self.alloc(NodeKind::Continue)
    }

    pub fn ret(&mut self, value: Option<InstrId>) -> InstrId {
        self.alloc(NodeKind::Return(value))
    }

    pub fn error_block(&mut self, block: ErrorBlock) -> InstrId {
        self.alloc(NodeKind::ErrorBlock(block))
    }

    /// Resolve scope ownership and freeze the tree.
    pub fn finish(mut self) -> InstructionTree {
        let mut roots = FxHashMap::default();
        for &root in &self.roots {
            let owned = owned_declarations(&self.nodes, self.nodes[root.index()].kind.children());
            roots.insert(root, layout(&self.nodes, ScopeOwner::Script(root), &owned));
        }

        let functions = std::mem::take(&mut self.functions);
        for function in functions {
            let start = self.nodes[function.index()].kind.children();
            let owned = owned_declarations(&self.nodes, start);
            let scope = layout(&self.nodes, ScopeOwner::Function(function), &owned);
            if let NodeKind::FunctionDecl(decl) = &mut self.nodes[function.index()].kind {
                decl.layout = scope;
            }
        }

        InstructionTree {
            nodes: self.nodes,
            roots,
        }
    }
}

/// Declarations reachable from `start` without entering a nested function,
/// in source order.
fn owned_declarations(nodes: &[Node], start: Children) -> Vec<InstrId> {
    let mut owned = Vec::new();
    let mut visited = FxHashSet::default();
    let mut pending: Vec<InstrId> = start.into_iter().rev().collect();

    while let Some(id) = pending.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Some(node) = nodes.get(id.index()) else {
            continue;
        };
        match &node.kind {
            NodeKind::FunctionDecl(_) => continue,
            NodeKind::VarDecl(_) => owned.push(id),
            _ => {}
        }
        pending.extend(node.kind.children().into_iter().rev());
    }
    owned
}

fn layout(nodes: &[Node], owner: ScopeOwner, owned: &[InstrId]) -> ScopeLayout {
    let mut bindings = Vec::with_capacity(owned.len());
    let mut debug_info = DebugInfo::default();
    for &id in owned {
        if let NodeKind::VarDecl(decl) = &nodes[id.index()].kind {
            decl.set_owner(owner);
            bindings.push(Rc::clone(decl));
            debug_info.insert(id, Rc::clone(decl));
        }
    }
    ScopeLayout {
        owner,
        bindings,
        debug_info: Rc::new(debug_info),
    }
}
