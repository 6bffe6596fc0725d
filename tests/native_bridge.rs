//! Host registration and value-marshalling round trips.

use std::any::Any;
use std::rc::Rc;

use emberscript::{Engine, HostValue, NativeMember, NativeObject};

#[test]
fn register_function_marshals_arguments_and_return_value() {
    let mut engine = Engine::new();
    engine.register_function(
        "Sum3",
        Rc::new(|args: &[HostValue]| {
            let total: i64 = args
                .iter()
                .map(|v| match v {
                    HostValue::Int(n) => *n,
                    _ => 0,
                })
                .sum();
            HostValue::Int(total)
        }),
    );
    engine.load("int run() { return Sum3(1, 2, 3); }").unwrap();
    let result = engine.call("run", vec![]).unwrap();
    assert!(matches!(result, HostValue::Int(6)));
}

#[test]
fn register_object_exposes_members_and_methods() {
    struct Point {
        x: i64,
        y: i64,
    }

    impl NativeObject for Point {
        fn get_member(&self, name: &str) -> Option<NativeMember> {
            match name {
                "x" => Some(NativeMember::Value(HostValue::Int(self.x))),
                "y" => Some(NativeMember::Value(HostValue::Int(self.y))),
                "Sum" => Some(NativeMember::Method),
                _ => None,
            }
        }

        fn call_method(&mut self, name: &str, _args: &[HostValue]) -> Result<HostValue, String> {
            match name {
                "Sum" => Ok(HostValue::Int(self.x + self.y)),
                _ => Err(format!("unknown method '{name}'")),
            }
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    let mut engine = Engine::new();
    engine.register_object("origin", "Point", Box::new(Point { x: 3, y: 4 }));
    engine
        .load("int run() { return origin.Sum(); }")
        .unwrap();
    let result = engine.call("run", vec![]).unwrap();
    assert!(matches!(result, HostValue::Int(7)));
}

#[test]
fn host_array_round_trips_through_a_script_call() {
    let mut engine = Engine::new();
    engine
        .load("int sumOf(int[] xs) { int total = 0; for (int i = 0; i < xs.size(); i = i + 1) { total = total + xs[i]; } return total; }")
        .unwrap();
    let result = engine
        .call(
            "sumOf",
            vec![HostValue::Array(vec![HostValue::Int(10), HostValue::Int(20), HostValue::Int(5)])],
        )
        .unwrap();
    assert!(matches!(result, HostValue::Int(35)));
}

#[test]
fn native_method_error_becomes_a_runtime_error() {
    struct Empty;
    impl NativeObject for Empty {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    let mut engine = Engine::new();
    engine.register_object("thing", "Empty", Box::new(Empty));
    engine.load("void run() { thing.DoStuff(); }").unwrap();
    let err = engine.call("run", vec![]).unwrap_err();
    let _ = format!("{err}"); // Display impl must not panic.
}

#[test]
fn register_class_factory_receives_unwrapped_constructor_args() {
    struct Tagged(String);
    impl NativeObject for Tagged {
        fn unwrap_host(&self) -> HostValue {
            HostValue::String(self.0.clone())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    let mut engine = Engine::new();
    engine.register_class(
        "MakeTagged",
        "Tagged",
        Rc::new(|args| match args.first() {
            Some(HostValue::String(s)) => Ok(Box::new(Tagged(s.clone())) as Box<dyn NativeObject>),
            _ => Err("expected a string argument".to_string()),
        }),
    );
    engine
        .load(r#"string run() { var t = MakeTagged("abc"); return "" + t; }"#)
        .unwrap();
    let result = engine.call("run", vec![]).unwrap();
    assert!(matches!(result, HostValue::String(s) if s == "[native Tagged]"));
}
