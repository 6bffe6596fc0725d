//! Runtime value model (`spec.md` §3 "Runtime Values"): the closed sum type
//! every expression evaluates to, plus truthiness, equality, and
//! stringification.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::FuncDecl;
use crate::error::RuntimeError;
use crate::heap::{Heap, HeapData, HeapId};

/// Which kind of receiver a bound method/function closes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThisBinding {
    Object(HeapId),
    Native(HeapId),
}

/// A host-provided callable, synthesized for builtin methods (array/string
/// operations, `Native` property access) or registered directly via
/// `Engine::register_function`.
///
/// Takes `&mut Heap` so natives that dereference a `HeapId` receiver (or
/// allocate a new one, e.g. `new Foo()` delegated to a native factory) can
/// do so without threading the whole evaluator through every builtin.
pub type NativeFn = Rc<dyn Fn(&mut Heap, &[Value]) -> Result<Value, RuntimeError>>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: Rc<str>,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).finish()
    }
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

/// A scripted function value: the declaration plus an optional bound
/// receiver (`spec.md` §3 "`Function.thisVal`, when present, binds method
/// receiver").
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptFunction {
    pub name: Rc<str>,
    pub decl: Rc<FuncDecl>,
    pub this_val: Option<ThisBinding>,
}

/// Runtime value. `Clone` is cheap for every variant: immediates are `Copy`
/// data, `String`/`Array`/`Function`/`NativeFunction` clone a reference
/// count, and `Object`/`Native`/`Handle` clone a heap index.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Float(f64),
    Bool(bool),
    String(Rc<str>),
    Null,
    Void,
    /// A class instance, addressed by its arena slot. Two `Object` values
    /// are the same instance iff their `HeapId`s match (`spec.md` §3
    /// "objects by identity").
    Object(HeapId),
    /// A host-provided opaque value, addressed by its arena slot.
    Native(HeapId),
    /// A nullable reference to an `Object` or `Native` arena slot
    /// (`spec.md` §3 "`Handle.ref` being absent represents null").
    Handle(Option<HeapId>),
    Array(Rc<RefCell<Vec<Value>>>),
    Function(ScriptFunction),
    NativeFunction(NativeFunction),
}

impl Value {
    pub fn array(elements: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(elements)))
    }

    /// Truthiness per `spec.md` §3.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Null | Self::Void => false,
            Self::Handle(r) => r.is_some(),
            Self::Array(_) => true,
            Self::Object(_) | Self::Native(_) | Self::Function(_) | Self::NativeFunction(_) => true,
        }
    }

    /// Equality per `spec.md` §3: handles by reference identity,
    /// ints/floats with cross-kind numeric promotion, strings/bools by
    /// value, objects by identity, null equals only null.
    pub fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => f64::from(*a) == *b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Null, Self::Null) => true,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Native(a), Self::Native(b)) => a == b,
            (Self::Handle(a), Self::Handle(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Numeric value for arithmetic coercion, or `None` if this value isn't
    /// numeric.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(f64::from(*i)),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// 32-bit two's-complement truncation used for `Int` construction and
    /// bitwise-operator coercion (`spec.md` §3 "Invariants").
    pub fn truncate_to_int(numeric: f64) -> i32 {
        if !numeric.is_finite() {
            return 0;
        }
        numeric as i64 as i32
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::Null => "null",
            Self::Void => "void",
            Self::Object(_) => "object",
            Self::Native(_) => "native",
            Self::Handle(_) => "handle",
            Self::Array(_) => "array",
            Self::Function(_) => "function",
            Self::NativeFunction(_) => "function",
        }
    }

    /// Stringification used by `+` concatenation, `string` casts, and
    /// `print`-style native helpers.
    pub fn stringify(&self, heap: &Heap) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format!("{f}"),
            Self::Bool(b) => b.to_string(),
            Self::String(s) => s.to_string(),
            Self::Null => "null".to_string(),
            Self::Void => String::new(),
            Self::Object(id) => match heap.object(*id) {
                Some(obj) => format!("[object {}]", obj.type_name),
                None => "[object]".to_string(),
            },
            Self::Native(id) => match heap.native(*id) {
                Some(n) => format!("[native {}]", n.type_name),
                None => "[native]".to_string(),
            },
            Self::Handle(None) => "null".to_string(),
            Self::Handle(Some(id)) => match heap.get(*id) {
                HeapData::Object(obj) => format!("[object {}]", obj.type_name),
                HeapData::Native(n) => format!("[native {}]", n.type_name),
            },
            Self::Array(elems) => {
                let elems = elems.borrow();
                let parts: Vec<String> = elems.iter().map(|e| e.stringify(heap)).collect();
                format!("[{}]", parts.join(", "))
            }
            Self::Function(f) => format!("[function {}]", f.name),
            Self::NativeFunction(f) => format!("[function {}]", f.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_spec() {
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::String(Rc::from("")).is_truthy());
        assert!(Value::String(Rc::from("x")).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Void.is_truthy());
        assert!(!Value::Handle(None).is_truthy());
        assert!(Value::array(vec![]).is_truthy());
    }

    #[test]
    fn int_float_equality_cross_promotes() {
        assert!(Value::Int(3).equals(&Value::Float(3.0)));
        assert!(!Value::Int(3).equals(&Value::Float(3.1)));
    }

    #[test]
    fn null_equals_only_null() {
        assert!(Value::Null.equals(&Value::Null));
        assert!(!Value::Null.equals(&Value::Int(0)));
        assert!(!Value::Null.equals(&Value::Handle(None)));
    }

    #[test]
    fn int_truncates_to_32_bits() {
        let over = f64::from(i32::MAX) + 10.0;
        assert_eq!(Value::truncate_to_int(over), i32::MIN + 9);
    }

    #[test]
    fn handle_identity_equality() {
        let id = HeapId(0);
        assert!(Value::Handle(Some(id)).equals(&Value::Handle(Some(id))));
        assert!(!Value::Handle(Some(id)).equals(&Value::Handle(None)));
    }
}

