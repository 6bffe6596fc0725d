//! Native interop: the public, host-facing value type and the `wrap`/
//! `unwrap` conversions between it and the internal [`Value`]
//! (`spec.md` §4.3 "Native interop").

use std::any::Any;
use std::rc::Rc;

use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::heap::{Heap, HeapData, NativeData};
use crate::value::Value;

/// A value crossing the host/script boundary. Unlike the internal [`Value`],
/// this type owns all its data, never names a heap slot, and is what a host
/// passes to `Engine::call`/native functions and gets back as results.
#[derive(Debug, Clone)]
pub enum HostValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Array(Vec<HostValue>),
}

impl HostValue {
    pub fn int(v: impl Into<i64>) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// What a [`NativeObject`]'s member lookup resolved to.
pub enum NativeMember {
    /// A plain value, wrapped back into a script [`Value`] on read.
    Value(HostValue),
    /// A named operation; reading it yields a script [`Value::NativeFunction`]
    /// that invokes [`NativeObject::call_method`] when called.
    Method,
}

/// A host-provided opaque object exposed to scripts (`spec.md` GLOSSARY
/// "Native"). Every method has a default that reports "unsupported" so a
/// host only implements the handful of members it actually wants to expose,
/// mirroring how `spec.md` §4.3 describes member/index/call resolution as
/// independent, optional capabilities of a native value.
pub trait NativeObject: Any {
    fn get_member(&self, _name: &str) -> Option<NativeMember> {
        None
    }

    fn set_member(&mut self, _name: &str, _value: HostValue) -> Result<(), String> {
        Err("member is not settable".to_string())
    }

    fn call_method(&mut self, _name: &str, _args: &[HostValue]) -> Result<HostValue, String> {
        Err("not callable".to_string())
    }

    fn index_get(&self, _index: i64) -> Result<HostValue, String> {
        Err("not indexable".to_string())
    }

    fn index_set(&mut self, _index: i64, _value: HostValue) -> Result<(), String> {
        Err("not indexable".to_string())
    }

    /// Host form of this native, used by [`unwrap`]. Defaults to `Null`;
    /// override when the native wraps something with a sensible host
    /// representation (e.g. a native wrapping a plain number or string).
    fn unwrap_host(&self) -> HostValue {
        HostValue::Null
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Converts a host value into a script [`Value`], allocating a heap slot
/// for arrays-of-natives is never needed here since `HostValue` has no
/// native variant of its own; `register_object`/`register_class` allocate
/// `Native` slots directly instead of going through `wrap`.
pub fn wrap(host: HostValue) -> Value {
    match host {
        HostValue::Null => Value::Null,
        HostValue::Int(n) => Value::Int(n as i32),
        HostValue::Float(f) => Value::Float(f),
        HostValue::Bool(b) => Value::Bool(b),
        HostValue::String(s) => Value::String(Rc::from(s.as_str())),
        HostValue::Array(elems) => Value::array(elems.into_iter().map(wrap).collect()),
    }
}

/// Converts a script [`Value`] into a host value (`spec.md` §4.3
/// `unwrap`): handles unwrap to their referent's underlying host value (or
/// null), arrays unwrap element-wise, function values have no host form.
pub fn unwrap(value: &Value, heap: &Heap) -> HostValue {
    match value {
        Value::Int(i) => HostValue::Int(i64::from(*i)),
        Value::Float(f) => HostValue::Float(*f),
        Value::Bool(b) => HostValue::Bool(*b),
        Value::String(s) => HostValue::String(s.to_string()),
        Value::Null | Value::Void => HostValue::Null,
        Value::Handle(None) => HostValue::Null,
        Value::Handle(Some(id)) => match heap.get(*id) {
            HeapData::Native(n) => n.value.unwrap_host(),
            HeapData::Object(_) => HostValue::Null,
        },
        Value::Object(_) => HostValue::Null,
        Value::Native(id) => heap.native(*id).map_or(HostValue::Null, |n| n.value.unwrap_host()),
        Value::Array(elems) => HostValue::Array(elems.borrow().iter().map(|v| unwrap(v, heap)).collect()),
        Value::Function(_) | Value::NativeFunction(_) => HostValue::Null,
    }
}

/// Allocates a `Native` heap slot wrapping a boxed [`NativeObject`], used by
/// `Engine::register_object`.
pub fn allocate_native(heap: &mut Heap, type_name: impl Into<String>, obj: Box<dyn NativeObject>) -> Value {
    let id = heap.allocate(HeapData::Native(NativeData {
        type_name: type_name.into(),
        value: obj,
    }));
    Value::Native(id)
}

/// Signature for a host function registered via `Engine::register_function`.
pub type HostFn = Rc<dyn Fn(&[HostValue]) -> HostValue>;

/// Wraps a plain host closure into the evaluator's internal `NativeFn`
/// calling convention, marshalling arguments/results through `unwrap`/
/// `wrap`.
pub fn host_fn_to_native(f: HostFn) -> crate::value::NativeFn {
    Rc::new(move |heap: &mut Heap, args: &[Value]| -> Result<Value, RuntimeError> {
        let host_args: Vec<HostValue> = args.iter().map(|v| unwrap(v, heap)).collect();
        Ok(wrap(f(&host_args)))
    })
}

pub(crate) fn host_error(message: impl Into<String>) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::Host(message.into()), None)
}
