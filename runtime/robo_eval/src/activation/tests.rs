use super::*;
use crate::debugger::RobotDebugger;
use crate::tree::{InstructionTree, TreeBuilder};
use pretty_assertions::assert_eq;

/// `f(a) { var b }` inside an otherwise empty script.
fn function_tree() -> (InstructionTree, InstrId, InstrId, InstrId) {
    let mut b = TreeBuilder::new();
    let a = b.var_decl("a", None);
    let local = b.var_decl("b", None);
    let body = b.block(vec![local]);
    let f = b.function("f", vec![a], body);
    b.script_root(vec![f]);
    (b.finish(), f, a, local)
}

#[test]
fn enter_pushes_and_drop_pops() {
    let (tree, f, a, local) = function_tree();
    let layout = tree.function(f).unwrap().layout();
    let call_site = InstrId::new(42);
    let mut dbg = RobotDebugger::new();

    {
        let scope = Activation::enter(&mut dbg, layout, Some(call_site)).unwrap();
        assert_eq!(tree.variable(a).unwrap().depth(), 1);
        assert_eq!(tree.variable(local).unwrap().depth(), 1);
        assert_eq!(scope.stack_trace(), &[call_site]);
    }

    assert_eq!(tree.variable(a).unwrap().depth(), 0);
    assert_eq!(tree.variable(local).unwrap().depth(), 0);
    assert!(dbg.stack_trace().is_empty());
    assert!(dbg.frames().is_empty());
    assert_eq!(dbg.call_depth(), 0);
}

#[test]
fn nested_activations_unwind_in_order() {
    let (tree, f, a, _) = function_tree();
    let layout = tree.function(f).unwrap().layout();
    let mut dbg = RobotDebugger::new();

    {
        let mut outer = Activation::enter(&mut dbg, layout, Some(InstrId::new(1))).unwrap();
        tree.variable(a).unwrap().replace(Value::Int(1)).unwrap();
        {
            let inner = Activation::enter(&mut *outer, layout, Some(InstrId::new(2))).unwrap();
            tree.variable(a).unwrap().replace(Value::Int(2)).unwrap();
            assert_eq!(inner.stack_depth(), 2);
            assert_eq!(tree.variable(a).unwrap().depth(), 2);
        }
        assert_eq!(tree.variable(a).unwrap().current(), Some(Value::Int(1)));
        assert_eq!(outer.stack_depth(), 1);
    }
    assert_eq!(tree.variable(a).unwrap().depth(), 0);
}

#[test]
fn failed_entry_leaves_nothing_behind() {
    let (tree, f, a, local) = function_tree();
    let layout = tree.function(f).unwrap().layout();
    let mut dbg = RobotDebugger::builder().max_call_depth(Some(0)).build();

    let result = Activation::enter(&mut dbg, layout, Some(InstrId::new(1)));
    assert!(result.is_err());
    drop(result);

    assert_eq!(tree.variable(a).unwrap().depth(), 0);
    assert_eq!(tree.variable(local).unwrap().depth(), 0);
    assert!(dbg.stack_trace().is_empty());
    assert!(dbg.frames().is_empty());
}

#[test]
fn drop_runs_during_panic() {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    let (tree, f, a, _) = function_tree();
    let layout = tree.function(f).unwrap().layout();
    let mut dbg = RobotDebugger::new();

    let result = catch_unwind(AssertUnwindSafe(|| {
        let _scope = Activation::enter(&mut dbg, layout, Some(InstrId::new(1))).unwrap();
        panic!("construct blew up");
    }));

    assert!(result.is_err());
    assert_eq!(tree.variable(a).unwrap().depth(), 0);
    assert!(dbg.frames().is_empty());
}

#[test]
fn reenter_keeps_existing_bindings() {
    let (tree, f, a, _) = function_tree();
    let layout = tree.function(f).unwrap().layout();
    let mut dbg = RobotDebugger::new();

    bind_scope(layout);
    {
        let _scope = Activation::reenter(&mut dbg, layout, None).unwrap();
        assert_eq!(tree.variable(a).unwrap().depth(), 1);
    }
    assert_eq!(tree.variable(a).unwrap().depth(), 1);
    unbind_scope(layout);
    assert_eq!(tree.variable(a).unwrap().depth(), 0);
}
