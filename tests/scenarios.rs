//! End-to-end scenarios, one per test, lifted from `spec.md` §8.

use std::cell::RefCell;
use std::rc::Rc;

use emberscript::{CollectStringPrint, Engine, HostValue};
use pretty_assertions::assert_eq;

#[test]
fn counter_class_scenario() {
    let mut engine = Engine::new();
    engine
        .load(
            r#"
            class TestClass {
                int v;
                TestClass(int start) { v = start; }
                void inc() { v = v + 1; }
            }
            int main(int start) {
                TestClass t = new TestClass(start);
                t.inc(); t.inc(); t.inc();
                return t.v;
            }
            "#,
        )
        .unwrap();

    let result = engine.call("main", vec![HostValue::Int(12)]).unwrap();
    assert!(matches!(result, HostValue::Int(15)));
}

#[test]
fn fall_through_switch_scenario() {
    let mut engine = Engine::new();
    engine
        .load(
            r#"
            int f(int x) {
                switch (x) {
                    case 1:
                    case 2:
                        return 20;
                    case 3:
                        return 30;
                    default:
                        return 0;
                }
            }
            "#,
        )
        .unwrap();

    for (input, expected) in [(1, 20), (2, 20), (3, 30), (9, 0)] {
        let result = engine.call("f", vec![HostValue::Int(input)]).unwrap();
        let HostValue::Int(n) = result else { panic!("f({input}) returned a non-Int: {result:?}") };
        assert_eq!(n, expected, "f({input})");
    }
}

#[test]
fn short_circuit_with_side_effect_marker_scenario() {
    let mut engine = Engine::new();
    engine
        .load(
            r#"
            int c = 0;
            bool side() { c = c + 1; return true; }
            bool r = false && side();
            "#,
        )
        .unwrap();

    assert!(matches!(engine.get_global("c"), Some(HostValue::Int(0))));
    assert!(matches!(engine.get_global("r"), Some(HostValue::Bool(false))));
}

#[test]
fn handle_aliasing_scenario() {
    let mut engine = Engine::new();
    engine
        .load(
            r#"
            class Box { int n; }
            Box a = new Box();
            bool run() {
                a.n = 5;
                Box@ h = @a;
                h.n = 9;
                return a.n == 9;
            }
            "#,
        )
        .unwrap();

    let result = engine.call("run", vec![]).unwrap();
    assert!(matches!(result, HostValue::Bool(true)));
}

#[test]
fn array_operations_scenario() {
    let mut engine = Engine::new();
    engine
        .load(
            r#"
            int[] xs;
            int s;
            int idx;
            void run() {
                xs.push(1);
                xs.push(2);
                xs.push(3);
                s = xs.size();
                idx = xs.find(2);
                xs.removeAt(0);
            }
            "#,
        )
        .unwrap();
    engine.call("run", vec![]).unwrap();

    assert!(matches!(engine.get_global("s"), Some(HostValue::Int(3))));
    assert!(matches!(engine.get_global("idx"), Some(HostValue::Int(1))));
    match engine.get_global("xs") {
        Some(HostValue::Array(elems)) => {
            assert_eq!(elems.len(), 2);
            assert!(matches!(elems[0], HostValue::Int(2)));
        }
        other => panic!("expected an array global, got {other:?}"),
    }
}

#[test]
fn native_bridge_scenario() {
    let sink = Rc::new(RefCell::new(CollectStringPrint::new()));
    let mut engine = Engine::new();
    engine.set_print_writer(sink.clone());
    engine.register_print_function("G_Print");
    engine
        .load(
            r#"
            void run() {
                G_Print("x=" + 3);
            }
            "#,
        )
        .unwrap();
    engine.call("run", vec![]).unwrap();

    assert_eq!(sink.borrow().lines(), vec!["x=3".to_string()]);
}
