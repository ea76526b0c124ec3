//! Tree-walking evaluation of instructions.
//!
//! [`Evaluator`] is a stateless view over an [`InstructionTree`]: all run
//! state lives in the declarations' binding stacks and in the [`Debugger`]
//! passed to every call. Statements go through [`Evaluator::process`] and
//! report a [`Flow`]; expressions go through [`Evaluator::eval`] and produce a
//! [`Value`].
//!
//! Blocks are the cancellation and error checkpoints. Each statement of a
//! block is bracketed by `start_instruction`/`end_instruction`; a failing
//! statement is handed to `Debugger::handle` while it is still on the call
//! stack, so the debugger can attribute the error to it.
//!
//! A stop request observed after a user call or a construct returns raises
//! the `Cancelled` signal instead of a value, so the caller's expression is
//! abandoned rather than evaluated with a placeholder. The enclosing block
//! turns the signal into `Flow::Return(None)` without consulting the
//! debugger.

use robo_stack::ensure_sufficient_stack;

use crate::activation::Activation;
use crate::construct::SharedConstruct;
use crate::debugger::Debugger;
use crate::error_scope::ErrorScope;
use crate::operators::evaluate_binary;
use crate::tree::{DeclarationMode, ErrorBlock, InstructionTree, NodeKind, VariableDeclaration};
use robo_ir::errors::{
    arity_mismatch, cancelled, construct_failed, not_callable, not_iterable, unknown_instruction,
};
use robo_ir::{Flow, InstrId, RobotError, RobotResult, Value};

/// Walks an instruction tree.
pub struct Evaluator<'t> {
    tree: &'t InstructionTree,
    /// Read by argument-mode declarations.
    argument: Option<Value>,
}

impl<'t> Evaluator<'t> {
    pub fn new(tree: &'t InstructionTree) -> Self {
        Evaluator {
            tree,
            argument: None,
        }
    }

    #[must_use]
    pub fn with_argument(mut self, argument: Option<Value>) -> Self {
        self.argument = argument;
        self
    }

    pub fn tree(&self) -> &'t InstructionTree {
        self.tree
    }

    /// Process a statement.
    pub fn process(&self, id: InstrId, dbg: &mut dyn Debugger) -> RobotResult<Flow> {
        ensure_sufficient_stack(|| self.process_inner(id, dbg))
    }

    /// Evaluate an expression.
    pub fn eval(&self, id: InstrId, dbg: &mut dyn Debugger) -> RobotResult<Value> {
        ensure_sufficient_stack(|| self.eval_inner(id, dbg))
    }

    fn process_inner(&self, id: InstrId, dbg: &mut dyn Debugger) -> RobotResult<Flow> {
        let node = self.tree.node(id)?;
        match &node.kind {
            NodeKind::Block(statements) => self.process_block(statements, dbg),
            NodeKind::VarDecl(decl) => {
                let value = self.initial_value(decl, dbg)?;
                decl.replace(value)?;
                Ok(Flow::resume())
            }
            NodeKind::FunctionDecl(_) => Ok(Flow::resume()),
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(*condition, dbg)?.is_truthy() {
                    self.process(*then_branch, dbg)
                } else if let Some(otherwise) = else_branch {
                    self.process(*otherwise, dbg)
                } else {
                    Ok(Flow::resume())
                }
            }
            NodeKind::While { condition, body } => self.process_while(*condition, *body, dbg),
            NodeKind::Foreach {
                variable,
                iterable,
                body,
            } => self.process_foreach(*variable, *iterable, *body, dbg),
            NodeKind::Break => Ok(Flow::Break),
            NodeKind::Continue => Ok(Flow::Continue),
            NodeKind::Return(value) => {
                let value = value.map(|v| self.eval(v, dbg)).transpose()?;
                Ok(Flow::returning(value))
            }
            NodeKind::ErrorBlock(block) => self.process_error_block(block, dbg),
            _ => Ok(Flow::resume_with(self.eval_inner(id, dbg)?)),
        }
    }

    fn eval_inner(&self, id: InstrId, dbg: &mut dyn Debugger) -> RobotResult<Value> {
        let node = self.tree.node(id)?;
        match &node.kind {
            NodeKind::Literal(value) => Ok(value.clone()),
            NodeKind::List(items) => items
                .iter()
                .map(|&item| self.eval(item, dbg))
                .collect::<RobotResult<Vec<_>>>()
                .map(Value::list),
            NodeKind::Variable(declaration) => {
                Ok(self.declaration(*declaration)?.current().unwrap_or_default())
            }
            NodeKind::Assign { target, value } => {
                let value = self.eval(*value, dbg)?;
                self.declaration(*target)?.replace(value.clone())?;
                Ok(value)
            }
            NodeKind::Binary { op, left, right } => {
                let left = self.eval(*left, dbg)?;
                let right = self.eval(*right, dbg)?;
                evaluate_binary(&left, &right, *op)
            }
            NodeKind::Call { function, args } => self.call_function(id, *function, args, dbg),
            NodeKind::Construct { construct, args } => self.call_construct(construct, args, dbg),
            _ => Ok(self.process_inner(id, dbg)?.into_value().unwrap_or_default()),
        }
    }

    /// Run the statements of a block in order.
    ///
    /// Stops early on a non-resuming flow, and returns `Flow::Return(None)`
    /// when the debugger asks to stop.
    pub fn process_block(&self, statements: &[InstrId], dbg: &mut dyn Debugger) -> RobotResult<Flow> {
        for &statement in statements {
            if dbg.should_stop() {
                return Ok(Flow::returning(None));
            }

            let tracked = self.tree.node(statement)?.kind.is_tracked();
            if tracked {
                dbg.start_instruction(statement);
                if dbg.should_stop() {
                    dbg.end_instruction(statement);
                    return Ok(Flow::returning(None));
                }
            }

            let flow = match self.process(statement, dbg) {
                Ok(flow) => Ok(flow),
                Err(error) if error.is_cancellation() => Ok(Flow::returning(None)),
                Err(error) => dbg.handle(error).map(|()| Flow::resume()),
            };

            if tracked {
                dbg.end_instruction(statement);
            }

            let flow = flow?;
            if !flow.resumes() {
                return Ok(flow);
            }
        }
        Ok(Flow::resume())
    }

    fn process_while(&self, condition: InstrId, body: InstrId, dbg: &mut dyn Debugger) -> RobotResult<Flow> {
        loop {
            if dbg.should_stop() || !self.eval(condition, dbg)?.is_truthy() {
                return Ok(Flow::resume());
            }
            let flow = self.process(body, dbg)?;
            if flow.returns() {
                return Ok(flow);
            }
            if flow.breaks() {
                return Ok(Flow::resume());
            }
        }
    }

    fn process_foreach(
        &self,
        variable: InstrId,
        iterable: InstrId,
        body: InstrId,
        dbg: &mut dyn Debugger,
    ) -> RobotResult<Flow> {
        let binding = self.declaration(variable)?;
        let items: Vec<Value> = match self.eval(iterable, dbg)? {
            Value::List(items) => items.iter().cloned().collect(),
            Value::Object(entries) => entries.values().cloned().collect(),
            Value::Null => Vec::new(),
            other => return Err(not_iterable(other.type_name())),
        };

        for item in items {
            if dbg.should_stop() {
                break;
            }
            binding.replace(item)?;
            let flow = self.process(body, dbg)?;
            if flow.returns() {
                return Ok(flow);
            }
            if flow.breaks() {
                break;
            }
        }
        Ok(Flow::resume())
    }

    /// `do` under an error scope, then `error` or `success`, then `finally`.
    ///
    /// Handler flows are not forwarded. A caught error resumes; otherwise
    /// the flow of the `do` block is returned.
    fn process_error_block(&self, block: &ErrorBlock, dbg: &mut dyn Debugger) -> RobotResult<Flow> {
        let (flow, caught) = {
            let mut scope = ErrorScope::new(&mut *dbg);
            let flow = match self.process(block.body, &mut scope) {
                Ok(flow) => flow,
                Err(error) => {
                    scope.handle(error)?;
                    Flow::resume()
                }
            };
            (flow, scope.into_error())
        };

        if let Some(error) = &caught {
            if let Some(cause) = block.cause {
                self.declaration(cause)?.replace(self.error_object(error))?;
            }
            if let Some(on_error) = block.on_error {
                self.process(on_error, dbg)?;
            }
        } else if let Some(on_success) = block.on_success {
            self.process(on_success, dbg)?;
        }

        if let Some(finally) = block.finally {
            self.process(finally, dbg)?;
        }

        Ok(if caught.is_some() { Flow::resume() } else { flow })
    }

    /// `{message, line?}` view of a caught error.
    fn error_object(&self, error: &RobotError) -> Value {
        let mut entries = vec![("message", Value::string(error.to_string()))];
        if let Some(position) = error.instruction().and_then(|id| self.tree.position(id)) {
            entries.push(("line", Value::Int(i64::from(position.line))));
        }
        Value::object(entries)
    }

    #[tracing::instrument(level = "trace", skip_all, fields(%function, %call_site))]
    fn call_function(
        &self,
        call_site: InstrId,
        function: InstrId,
        args: &[InstrId],
        dbg: &mut dyn Debugger,
    ) -> RobotResult<Value> {
        let declaration = self
            .tree
            .function(function)
            .ok_or_else(|| not_callable(function))?;
        let mut values = args
            .iter()
            .map(|&arg| self.eval(arg, dbg))
            .collect::<RobotResult<Vec<_>>>()?
            .into_iter();

        let mut scope = Activation::enter(dbg, declaration.layout(), Some(call_site))?;
        for &parameter in declaration.parameters() {
            let binding = self.declaration(parameter)?;
            let value = match (values.next(), binding.initializer()) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval(default, &mut *scope)?,
                (None, None) => Value::Null,
            };
            binding.replace(value)?;
        }

        let flow = self.process(declaration.body(), &mut *scope)?;
        // A body cut short by a stop request has no result to hand back.
        if scope.should_stop() {
            return Err(cancelled());
        }
        Ok(flow.into_value().unwrap_or_default())
    }

    fn call_construct(
        &self,
        construct: &SharedConstruct,
        args: &[InstrId],
        dbg: &mut dyn Debugger,
    ) -> RobotResult<Value> {
        let values = args
            .iter()
            .map(|&arg| self.eval(arg, dbg))
            .collect::<RobotResult<Vec<_>>>()?;
        if values.len() != construct.arity() {
            return Err(arity_mismatch(construct.name(), construct.arity(), values.len()));
        }
        let value = construct
            .invoke(&values)
            .map_err(|err| construct_failed(construct.name(), err.message))?;
        if dbg.should_stop() {
            return Err(cancelled());
        }
        Ok(value)
    }

    fn initial_value(&self, decl: &VariableDeclaration, dbg: &mut dyn Debugger) -> RobotResult<Value> {
        if decl.mode() == DeclarationMode::Argument {
            if let Some(argument) = &self.argument {
                return Ok(argument.clone());
            }
        }
        match decl.initializer() {
            Some(init) => self.eval(init, dbg),
            None => Ok(Value::Null),
        }
    }

    fn declaration(&self, id: InstrId) -> RobotResult<&'t VariableDeclaration> {
        self.tree
            .variable(id)
            .map(|decl| &**decl)
            .ok_or_else(|| unknown_instruction(id))
    }
}
