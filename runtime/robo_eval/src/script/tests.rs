use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::debugger::{PauseAction, RobotDebugger};
use crate::tree::TreeBuilder;
use pretty_assertions::assert_eq;

fn single(build: impl FnOnce(&mut TreeBuilder) -> Vec<InstrId>) -> Script {
    let mut b = TreeBuilder::new();
    let statements = build(&mut b);
    let root = b.script_root(statements);
    Script::new("main.robo", Rc::new(b.finish()), root)
}

#[test]
fn second_run_is_a_usage_error() {
    let script = single(|b| {
        let one = b.literal(1i64);
        vec![b.var_decl("x", Some(one))]
    });
    let mut dbg = RobotDebugger::new();

    script.process(&mut dbg).unwrap();
    assert!(script.has_run());

    let err = script.process(&mut dbg).unwrap_err();
    assert!(err.is_usage());
    assert_eq!(
        err.kind(),
        &robo_ir::RobotErrorKind::Usage(UsageError::ScriptAlreadyRun {
            script: ScriptId::from("main.robo"),
        })
    );
}

#[test]
fn lifecycle_events_bracket_each_run() {
    let script = single(|b| {
        let value = b.literal(5i64);
        vec![b.ret(Some(value))]
    });
    let seen: Arc<Mutex<Vec<LifecycleEvent>>> = Arc::default();
    let sink = Arc::clone(&seen);
    script.events().subscribe(move |event| sink.lock().push(event.clone()));

    let mut dbg = RobotDebugger::new();
    let flow = script.process(&mut dbg).unwrap();
    assert_eq!(flow, Flow::Return(Some(Value::Int(5))));

    let events = seen.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, LifecycleKind::Started);
    assert_eq!(events[1].kind, LifecycleKind::Finished);
    assert_eq!(events[0].run, events[1].run);
    assert_eq!(events[0].script, ScriptId::from("main.robo"));
}

#[test]
fn finished_fires_when_the_body_fails() {
    let script = single(|b| {
        let text = b.literal("a");
        let one = b.literal(1i64);
        let bad = b.binary(robo_ir::BinaryOp::Multiply, text, one);
        vec![b.var_decl("x", Some(bad))]
    });
    let seen: Arc<Mutex<Vec<LifecycleKind>>> = Arc::default();
    let sink = Arc::clone(&seen);
    script.events().subscribe(move |event| sink.lock().push(event.kind));

    let mut dbg = RobotDebugger::new();
    assert!(script.process(&mut dbg).is_err());
    assert_eq!(
        *seen.lock(),
        vec![LifecycleKind::Started, LifecycleKind::Finished]
    );
    assert!(dbg.stack_trace().is_empty());
}

#[test]
fn argument_slot() {
    let script = single(|b| {
        let fallback = b.literal(0i64);
        let arg = b.argument_decl("input", Some(fallback));
        let read = b.variable(arg);
        let ret = b.ret(Some(read));
        vec![arg, ret]
    });
    assert!(!script.has_argument());
    assert_eq!(script.argument(), Value::Null);

    script.set_argument(Value::from("hello"));
    assert!(script.has_argument());

    let mut dbg = RobotDebugger::new();
    assert_eq!(
        script.process(&mut dbg).unwrap(),
        Flow::Return(Some(Value::from("hello")))
    );
}

#[test]
fn libraries_must_share_the_tree() {
    let lib = Rc::new(single(|_| vec![]));
    let mut main = single(|_| vec![]);
    assert_eq!(
        main.add_library(lib),
        Err(UsageError::ForeignLibrary {
            script: ScriptId::from("main.robo"),
            library: ScriptId::from("main.robo"),
        })
    );
    assert!(main.libraries().is_empty());
}

#[test]
fn library_functions_are_callable_from_the_main_script() {
    let mut b = TreeBuilder::new();
    // lib: var base = 40; function add(n) { return base + n }
    let forty = b.literal(40i64);
    let base = b.var_decl("base", Some(forty));
    let n = b.var_decl("n", None);
    let base_read = b.variable(base);
    let n_read = b.variable(n);
    let sum = b.binary(robo_ir::BinaryOp::Add, base_read, n_read);
    let ret = b.ret(Some(sum));
    let body = b.block(vec![ret]);
    let add = b.function("add", vec![n], body);
    let not_a_declaration = b.literal("ignored");
    let lib_root = b.script_root(vec![base, add, not_a_declaration]);
    // main: return add(2)
    let two = b.literal(2i64);
    let call = b.call(add, vec![two]);
    let main_ret = b.ret(Some(call));
    let main_root = b.script_root(vec![main_ret]);
    let tree = Rc::new(b.finish());

    let lib = Rc::new(Script::new("lib.robo", Rc::clone(&tree), lib_root));
    let mut main = Script::new("main.robo", Rc::clone(&tree), main_root);
    main.add_library(Rc::clone(&lib)).unwrap();

    let mut dbg = RobotDebugger::new();
    assert_eq!(
        main.process(&mut dbg).unwrap(),
        Flow::Return(Some(Value::Int(42)))
    );
    assert!(lib.is_initialized());
    assert_eq!(tree.variable(base).unwrap().depth(), 1);

    main.close();
    assert!(lib.is_closed());
    assert_eq!(tree.variable(base).unwrap().depth(), 0);

    // Closing twice is harmless.
    main.close();
    assert_eq!(tree.variable(base).unwrap().depth(), 0);
}

#[test]
fn script_initialized_as_library_reuses_its_bindings_when_run() {
    let mut b = TreeBuilder::new();
    let seven = b.literal(7i64);
    let x = b.var_decl("x", Some(seven));
    let read = b.variable(x);
    let ret = b.ret(Some(read));
    let root = b.script_root(vec![x, ret]);
    let tree = Rc::new(b.finish());
    let script = Script::new("both.robo", Rc::clone(&tree), root);

    let mut dbg = RobotDebugger::new();
    script.initialize_as_library(&mut dbg, false).unwrap();
    assert_eq!(tree.variable(x).unwrap().depth(), 1);

    assert_eq!(
        script.process(&mut dbg).unwrap(),
        Flow::Return(Some(Value::Int(7)))
    );
    assert_eq!(tree.variable(x).unwrap().depth(), 1);
    script.close();
    assert_eq!(tree.variable(x).unwrap().depth(), 0);
}

#[test]
fn path_follows_the_tree_and_libraries() {
    let mut b = TreeBuilder::new();
    let lib_decl = b.var_decl("shared", None);
    let lib_root = b.script_root(vec![lib_decl]);
    let inner = b.literal(1i64);
    let wrapper = b.block(vec![inner]);
    let sibling = b.literal(2i64);
    let main_root = b.script_root(vec![wrapper, sibling]);
    let stray = b.literal(3i64);
    let tree = Rc::new(b.finish());

    let lib = Rc::new(Script::new("lib.robo", Rc::clone(&tree), lib_root));
    let mut main = Script::new("main.robo", Rc::clone(&tree), main_root);
    main.add_library(lib).unwrap();

    let main_id = PathElement::Script(ScriptId::from("main.robo"));
    assert_eq!(
        main.path_to_instruction(inner),
        vec![
            main_id.clone(),
            PathElement::Instruction(wrapper),
            PathElement::Instruction(inner),
        ]
    );
    assert_eq!(
        main.path_to_instruction(lib_decl),
        vec![
            main_id,
            PathElement::Script(ScriptId::from("lib.robo")),
            PathElement::Instruction(lib_decl),
        ]
    );
    assert!(main.path_to_instruction(stray).is_empty());
}

#[test]
fn library_variables_resolve_while_the_main_script_runs() {
    let mut b = TreeBuilder::new();
    let forty = b.literal(40i64);
    let base = b.var_decl("base", Some(forty));
    let lib_root = b.script_root(vec![base]);
    let marker = b.literal("here");
    let main_root = b.script_root(vec![marker]);
    let tree = Rc::new(b.finish());

    let lib = Rc::new(Script::new("lib.robo", Rc::clone(&tree), lib_root));
    let mut main = Script::new("main.robo", Rc::clone(&tree), main_root);
    main.add_library(lib).unwrap();

    let seen = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    let mut dbg = RobotDebugger::builder()
        .breakpoint(marker)
        .on_pause(move |dbg, _| {
            let depth = dbg.stack_depth() - 1;
            *sink.borrow_mut() = Some((dbg.variable_value(base, depth), dbg.frames().len()));
            PauseAction::Resume
        })
        .build();

    main.process(&mut dbg).unwrap();
    // One frame for the library, one for the main script.
    assert_eq!(*seen.borrow(), Some((Some(Value::Int(40)), 2)));
    assert!(dbg.frames().is_empty());

    main.close();
    assert!(dbg.frames().is_empty());
}
