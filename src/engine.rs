//! Host-facing facade (`spec.md` §6). `Engine` is the only entry point a
//! caller needs: it owns one [`Evaluator`] (so one global environment and
//! one heap, per `SPEC_FULL.md` §5), and wraps the lex/parse/execute
//! pipeline so none of `token`/`ast`/`environment` have to be `pub`.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, trace};

use crate::error::EngineError;
use crate::evaluator::Evaluator;
use crate::interop::{allocate_native, host_fn_to_native, unwrap, wrap, HostFn, HostValue, NativeObject};
use crate::io::{PrintWriter, StdPrint};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::value::{NativeFn, NativeFunction, Value};

const DEFAULT_MAX_CALL_DEPTH: u32 = 256;

/// Produces a host native object from script-supplied constructor
/// arguments, backing [`Engine::register_class`] (`spec.md` §6:
/// "Bind a native callable that, when invoked from script, produces a
/// `Native` via `factory`").
pub type ClassFactory = Rc<dyn Fn(&[HostValue]) -> Result<Box<dyn NativeObject>, String>>;

/// The embeddable interpreter (`spec.md` §1, §6). Load source, register
/// natives, call script functions, read/write globals.
pub struct Engine {
    evaluator: Evaluator,
    print_writer: Rc<RefCell<dyn PrintWriter>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_max_call_depth(DEFAULT_MAX_CALL_DEPTH)
    }

    /// Caps the evaluator's native Rust call-stack recursion through nested
    /// script calls (`SPEC_FULL.md` §4.7), raising `RecursionLimitExceeded`
    /// instead of overflowing the host thread's stack.
    pub fn with_max_call_depth(limit: u32) -> Self {
        Self {
            evaluator: Evaluator::new(limit),
            print_writer: Rc::new(RefCell::new(StdPrint)),
        }
    }

    /// Redirects the sink used by natives registered via
    /// [`Engine::register_print_function`] (`SPEC_FULL.md` §4.8). Takes a
    /// shared handle rather than taking ownership outright, so a caller
    /// (tests, an embedding host) can keep its own clone to inspect what was
    /// written, e.g. `Rc::new(RefCell::new(CollectStringPrint::new()))`.
    pub fn set_print_writer(&mut self, writer: Rc<RefCell<dyn PrintWriter>>) {
        self.print_writer = writer;
    }

    /// Lexes, parses, and executes `source` against this engine's global
    /// environment (`spec.md` §3 "source text → tokens → program AST →
    /// execute(program)").
    pub fn load(&mut self, source: &str) -> Result<(), EngineError> {
        debug!("loading {} byte(s) of source", source.len());
        let tokens = Lexer::new(source).tokenize()?;
        let program = Parser::new(tokens).parse_program()?;
        debug!("parsed {} top-level declaration(s)", program.decls.len());
        self.evaluator.execute_program(&program)?;
        Ok(())
    }

    /// Invokes a previously declared script function by name, marshalling
    /// arguments and the result across the host boundary.
    pub fn call(&mut self, name: &str, args: Vec<HostValue>) -> Result<HostValue, EngineError> {
        trace!("call {name} entry");
        let script_args: Vec<Value> = args.into_iter().map(wrap).collect();
        let result = self.evaluator.call(name, script_args)?;
        let host_result = unwrap(&result, &self.evaluator.heap);
        trace!("call {name} exit");
        Ok(host_result)
    }

    /// Binds a native function in globals (`spec.md` §6 `registerFunction`).
    pub fn register_function(&mut self, name: impl Into<String>, f: HostFn) {
        self.define_native(name, host_fn_to_native(f));
    }

    /// Exposes `name()` to scripts as a one-argument function that
    /// stringifies its argument and writes it through this engine's
    /// `PrintWriter` (`spec.md` §8 scenario 6, the "native bridge" demo).
    /// There is no builtin `print` keyword; a host opts into observable
    /// output by registering one of these.
    pub fn register_print_function(&mut self, name: impl Into<String>) {
        let writer = Rc::clone(&self.print_writer);
        let func: NativeFn = Rc::new(move |heap, args| {
            let text = args.first().map(|v| v.stringify(heap)).unwrap_or_default();
            writer.borrow_mut().write_line(&text);
            Ok(Value::Void)
        });
        self.define_native(name, func);
    }

    /// Binds an arbitrary value in globals (`spec.md` §6 `registerGlobal`).
    pub fn register_global(&mut self, name: impl Into<String>, value: HostValue) {
        self.evaluator.globals.define(name.into(), wrap(value));
    }

    /// `registerGlobal` specialized to integers, matching `spec.md` §6's
    /// `registerInt` convenience entry.
    pub fn register_int(&mut self, name: impl Into<String>, value: i32) {
        self.evaluator.globals.define(name.into(), Value::Int(value));
    }

    /// Binds a host-provided [`NativeObject`] under `name` (`spec.md` §6
    /// `registerObject`).
    pub fn register_object(&mut self, name: impl Into<String>, type_name: impl Into<String>, obj: Box<dyn NativeObject>) {
        let value = allocate_native(&mut self.evaluator.heap, type_name, obj);
        self.evaluator.globals.define(name.into(), value);
    }

    /// Binds a native callable under `name` that, when invoked from script
    /// as `name(args)`, runs `factory` over the unwrapped arguments and
    /// allocates the resulting object as a `Native` (`spec.md` §6
    /// `registerClass`). This is distinct from script-defined `class`
    /// instantiation, which always goes through `new ClassName(args)`.
    pub fn register_class(&mut self, name: impl Into<String>, type_name: impl Into<String>, factory: ClassFactory) {
        let type_name = type_name.into();
        let func: NativeFn = Rc::new(move |heap, args| {
            let host_args: Vec<HostValue> = args.iter().map(|v| unwrap(v, heap)).collect();
            let obj = factory(&host_args).map_err(crate::interop::host_error)?;
            Ok(allocate_native(heap, type_name.clone(), obj))
        });
        self.define_native(name, func);
    }

    /// Reads a global by name (`spec.md` §6 `getGlobal`).
    pub fn get_global(&self, name: &str) -> Option<HostValue> {
        self.evaluator.globals.get(name).map(|v| unwrap(&v, &self.evaluator.heap))
    }

    /// Writes a global by name, defining it if it does not already exist
    /// (`spec.md` §6 `setGlobal`).
    pub fn set_global(&mut self, name: impl Into<String>, value: HostValue) {
        let name = name.into();
        self.evaluator.globals.set(&name, wrap(value));
    }

    fn define_native(&mut self, name: impl Into<String>, func: NativeFn) {
        let name = name.into();
        let native = NativeFunction { name: Rc::from(name.as_str()), func };
        self.evaluator.globals.define(name, Value::NativeFunction(native));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interop::NativeMember;
    use std::any::Any;

    #[test]
    fn load_then_call_round_trips_through_host_values() {
        let mut engine = Engine::new();
        engine.load("int add(int a, int b) { return a + b; }").unwrap();
        let result = engine.call("add", vec![HostValue::Int(2), HostValue::Int(3)]).unwrap();
        assert!(matches!(result, HostValue::Int(5)));
    }

    #[test]
    fn register_function_is_callable_from_script() {
        let mut engine = Engine::new();
        engine.register_function(
            "Double",
            Rc::new(|args: &[HostValue]| match args.first() {
                Some(HostValue::Int(n)) => HostValue::Int(n * 2),
                _ => HostValue::Null,
            }),
        );
        engine.load("int run() { return Double(21); }").unwrap();
        let result = engine.call("run", vec![]).unwrap();
        assert!(matches!(result, HostValue::Int(42)));
    }

    #[test]
    fn register_print_function_collects_output_through_custom_writer() {
        use crate::io::CollectStringPrint;

        let sink = Rc::new(RefCell::new(CollectStringPrint::new()));
        let mut engine = Engine::new();
        engine.set_print_writer(sink.clone());
        engine.register_print_function("G_Print");
        engine
            .load(r#"void run() { G_Print("x=" + 3); }"#)
            .unwrap();
        engine.call("run", vec![]).unwrap();
        assert_eq!(sink.borrow().lines(), vec!["x=3".to_string()]);
    }

    #[test]
    fn register_global_and_get_global_round_trip() {
        let mut engine = Engine::new();
        engine.register_global("LIMIT", HostValue::Int(10));
        assert!(matches!(engine.get_global("LIMIT"), Some(HostValue::Int(10))));
        engine.set_global("LIMIT", HostValue::Int(20));
        assert!(matches!(engine.get_global("LIMIT"), Some(HostValue::Int(20))));
    }

    #[test]
    fn register_class_produces_a_native_via_factory() {
        struct Counter(i64);
        impl NativeObject for Counter {
            fn get_member(&self, name: &str) -> Option<NativeMember> {
                match name {
                    "Bump" => Some(NativeMember::Method),
                    _ => None,
                }
            }
            fn call_method(&mut self, name: &str, _args: &[HostValue]) -> Result<HostValue, String> {
                match name {
                    "Bump" => {
                        self.0 += 1;
                        Ok(HostValue::Int(self.0))
                    }
                    _ => Err("unknown method".to_string()),
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
        engine.register_class(
            "MakeCounter",
            "Counter",
            Rc::new(|_args| Ok(Box::new(Counter(0)) as Box<dyn NativeObject>)),
        );
        engine
            .load("int run() { var c = MakeCounter(); c.Bump(); return c.Bump(); }")
            .unwrap();
        let result = engine.call("run", vec![]).unwrap();
        assert!(matches!(result, HostValue::Int(2)));
    }
}
