//! Script, library and cancellation behavior across whole runs.

#![allow(clippy::unwrap_used, reason = "Tests can panic")]

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use robo_eval::{
    init_tracing, BinaryOp, Debugger, ErrorPolicy, FnConstruct, Flow, InstrId, RobotDebugger,
    Script, StopHandle, TreeBuilder, Value,
};

/// A construct that counts its invocations.
fn counter(b: &mut TreeBuilder, calls: &Arc<AtomicUsize>) -> InstrId {
    let calls = Arc::clone(calls);
    b.construct(
        FnConstruct::new("tick", 0, move |_: &[Value]| {
            Ok(Value::Int(i64::try_from(calls.fetch_add(1, Ordering::SeqCst)).unwrap_or(0)))
        }),
        vec![],
    )
}

/// A construct that raises the stop signal.
fn halt(b: &mut TreeBuilder, stop: &StopHandle) -> InstrId {
    let stop = stop.clone();
    b.construct(
        FnConstruct::new("halt", 0, move |_: &[Value]| {
            stop.stop();
            Ok(Value::Null)
        }),
        vec![],
    )
}

#[test]
fn init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}

#[test]
fn diamond_library_initializes_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut b = TreeBuilder::new();

    let tick = counter(&mut b, &calls);
    let shared = b.var_decl("shared", Some(tick));
    let base_root = b.script_root(vec![shared]);
    let left_root = b.script_root(vec![]);
    let right_root = b.script_root(vec![]);
    let read = b.variable(shared);
    let ret = b.ret(Some(read));
    let main_root = b.script_root(vec![ret]);
    let tree = Rc::new(b.finish());

    let base = Rc::new(Script::new("base.robo", Rc::clone(&tree), base_root));
    let mut left = Script::new("left.robo", Rc::clone(&tree), left_root);
    let mut right = Script::new("right.robo", Rc::clone(&tree), right_root);
    left.add_library(Rc::clone(&base)).unwrap();
    right.add_library(Rc::clone(&base)).unwrap();
    let mut main = Script::new("main.robo", Rc::clone(&tree), main_root);
    main.add_library(Rc::new(left)).unwrap();
    main.add_library(Rc::new(right)).unwrap();

    let mut dbg = RobotDebugger::new();
    let flow = main.process(&mut dbg).unwrap();

    assert_eq!(flow, Flow::Return(Some(Value::Int(0))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(tree.variable(shared).unwrap().depth(), 1);

    assert!(dbg.frames().is_empty());

    main.close();
    assert!(base.is_closed());
    assert_eq!(tree.variable(shared).unwrap().depth(), 0);
    assert!(dbg.frames().is_empty());
    assert!(dbg.stack_trace().is_empty());
}

#[test]
fn stopped_library_initialization_closes_cleanly() {
    let stop = StopHandle::new();
    let mut b = TreeBuilder::new();

    let halted = halt(&mut b, &stop);
    let first = b.var_decl("first", Some(halted));
    let two = b.literal(2i64);
    let second = b.var_decl("second", Some(two));
    let lib_root = b.script_root(vec![first, second]);
    let three = b.literal(3i64);
    let never = b.var_decl("never", Some(three));
    let main_root = b.script_root(vec![never]);
    let tree = Rc::new(b.finish());

    let lib = Rc::new(Script::new("lib.robo", Rc::clone(&tree), lib_root));
    let mut main = Script::new("main.robo", Rc::clone(&tree), main_root);
    main.add_library(Rc::clone(&lib)).unwrap();

    let mut dbg = RobotDebugger::builder().stop_handle(stop).build();
    let flow = main.process(&mut dbg).unwrap();

    assert_eq!(flow, Flow::Return(None));
    assert!(lib.is_initialized());
    assert_eq!(tree.variable(second).unwrap().current(), Some(Value::Null));
    assert_eq!(tree.variable(never).unwrap().depth(), 0);

    main.close();
    for id in [first, second, never] {
        assert_eq!(tree.variable(id).unwrap().depth(), 0);
    }
}

/// `lib: var bad = "x" * 2; var after = 1`, `main: return 5`.
fn failing_library() -> (Rc<Script>, Script, Rc<robo_eval::InstructionTree>, [InstrId; 2]) {
    let mut b = TreeBuilder::new();
    let text = b.literal("x");
    let two = b.literal(2i64);
    let product = b.binary(BinaryOp::Multiply, text, two);
    let bad = b.var_decl("bad", Some(product));
    let one = b.literal(1i64);
    let after = b.var_decl("after", Some(one));
    let lib_root = b.script_root(vec![bad, after]);
    let five = b.literal(5i64);
    let ret = b.ret(Some(five));
    let main_root = b.script_root(vec![ret]);
    let tree = Rc::new(b.finish());

    let lib = Rc::new(Script::new("lib.robo", Rc::clone(&tree), lib_root));
    let mut main = Script::new("main.robo", Rc::clone(&tree), main_root);
    main.add_library(Rc::clone(&lib)).unwrap();
    (lib, main, tree, [bad, after])
}

#[test]
fn failed_library_initialization_propagates_then_closes() {
    let (lib, main, tree, [bad, after]) = failing_library();
    let mut dbg = RobotDebugger::new();

    let err = main.process(&mut dbg).unwrap_err();
    assert_eq!(err.instruction(), Some(bad));
    assert!(lib.is_initialized());
    assert!(main.has_run());
    assert!(dbg.stack_trace().is_empty());
    assert!(dbg.frames().is_empty());

    main.close();
    assert_eq!(tree.variable(bad).unwrap().depth(), 0);
    assert_eq!(tree.variable(after).unwrap().depth(), 0);
}

#[test]
fn absorbed_library_failure_skips_the_rest_of_that_library() {
    let (_lib, main, tree, [_, after]) = failing_library();
    let mut dbg = RobotDebugger::builder()
        .error_policy(ErrorPolicy::LogAndContinue)
        .build();

    let flow = main.process(&mut dbg).unwrap();
    assert_eq!(flow, Flow::Return(Some(Value::Int(5))));
    assert_eq!(dbg.errors().len(), 1);
    assert_eq!(tree.variable(after).unwrap().current(), Some(Value::Null));
    main.close();
}

#[test]
fn stop_from_another_thread_ends_an_endless_loop() {
    let mut b = TreeBuilder::new();
    let zero = b.literal(0i64);
    let count = b.var_decl("count", Some(zero));
    let read = b.variable(count);
    let one = b.literal(1i64);
    let next = b.binary(BinaryOp::Add, read, one);
    let bump = b.assign(count, next);
    let body = b.block(vec![bump]);
    let forever = b.literal(true);
    let spin = b.while_loop(forever, body);
    let finished = b.literal("finished");
    let marker = b.var_decl("marker", Some(finished));
    let root = b.script_root(vec![count, spin, marker]);
    let tree = Rc::new(b.finish());
    let script = Script::new("spin.robo", Rc::clone(&tree), root);

    let stop = StopHandle::new();
    let remote = stop.clone();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        remote.stop();
    });

    let mut dbg = RobotDebugger::builder().stop_handle(stop).build();
    let flow = script.process(&mut dbg).unwrap();
    stopper.join().unwrap();

    assert_eq!(flow, Flow::Return(None));
    assert!(dbg.should_stop());
    assert!(dbg.stack_trace().is_empty());
    assert_eq!(tree.variable(marker).unwrap().depth(), 0);
}

#[test]
fn stop_inside_a_call_skips_remaining_statements() {
    let stop = StopHandle::new();
    let mut b = TreeBuilder::new();
    let halted = halt(&mut b, &stop);
    let assigned = b.var_decl("assigned", None);
    let yes = b.literal(true);
    let set = b.assign(assigned, yes);
    let body = b.block(vec![halted, set]);
    let f = b.function("f", vec![], body);
    let call = b.call(f, vec![]);
    let seven = b.literal(7i64);
    let ret = b.ret(Some(seven));
    let root = b.script_root(vec![assigned, f, call, ret]);
    let tree = Rc::new(b.finish());
    let script = Script::new("halt.robo", Rc::clone(&tree), root);

    let observed = Rc::new(std::cell::Cell::new(None));
    let sink = Rc::clone(&observed);
    let mut dbg = RobotDebugger::builder()
        .stop_handle(stop)
        .breakpoint(set)
        .on_pause(move |_, at| {
            sink.set(Some(at));
            robo_eval::PauseAction::Resume
        })
        .build();

    let flow = script.process(&mut dbg).unwrap();
    assert_eq!(flow, Flow::Return(None));
    assert_eq!(observed.get(), None);
    assert_eq!(tree.variable(assigned).unwrap().depth(), 0);
}

/// `f(n) { if n < 3 { return f(n + 1) + 1 } else { halt(); return 0 } }`,
/// root `return f(0)`.
#[test]
fn stop_during_recursion_is_not_a_failure() {
    let stop = StopHandle::new();
    let mut b = TreeBuilder::new();
    let f = b.declare_function("f");
    let n = b.var_decl("n", None);

    let n_cond = b.variable(n);
    let three = b.literal(3i64);
    let cond = b.binary(BinaryOp::Less, n_cond, three);
    let n_next = b.variable(n);
    let one = b.literal(1i64);
    let next = b.binary(BinaryOp::Add, n_next, one);
    let recurse = b.call(f, vec![next]);
    let one_more = b.literal(1i64);
    let sum = b.binary(BinaryOp::Add, recurse, one_more);
    let deeper = b.ret(Some(sum));
    let then_block = b.block(vec![deeper]);

    let halted = halt(&mut b, &stop);
    let zero = b.literal(0i64);
    let bottom = b.ret(Some(zero));
    let else_block = b.block(vec![halted, bottom]);
    let branch = b.if_else(cond, then_block, Some(else_block));
    let body = b.block(vec![branch]);
    b.define_function(f, vec![n], body);

    let start = b.literal(0i64);
    let call = b.call(f, vec![start]);
    let ret = b.ret(Some(call));
    let root = b.script_root(vec![f, ret]);
    let tree = Rc::new(b.finish());
    let script = Script::new("recursive.robo", Rc::clone(&tree), root);

    let mut dbg = RobotDebugger::builder().stop_handle(stop).build();
    let flow = script.process(&mut dbg).unwrap();

    assert_eq!(flow, Flow::Return(None));
    assert!(dbg.errors().is_empty());
    assert_eq!(tree.variable(n).unwrap().depth(), 0);
    assert!(dbg.stack_trace().is_empty());
    assert!(dbg.frames().is_empty());
}

#[test]
fn stop_raised_by_a_construct_abandons_the_expression() {
    let stop = StopHandle::new();
    let mut b = TreeBuilder::new();
    let halted = halt(&mut b, &stop);
    let one = b.literal(1i64);
    let sum = b.binary(BinaryOp::Add, halted, one);
    let ret = b.ret(Some(sum));
    let root = b.script_root(vec![ret]);
    let script = Script::new("halt.robo", Rc::new(b.finish()), root);

    let mut dbg = RobotDebugger::builder()
        .stop_handle(stop)
        .error_policy(ErrorPolicy::LogAndContinue)
        .build();
    assert_eq!(script.process(&mut dbg).unwrap(), Flow::Return(None));
    assert!(dbg.errors().is_empty());
}
